pub mod client;
pub mod compare;
pub mod config;
pub mod dryrun;
pub mod fetch;
pub mod gemini;
pub mod orchestrator;
pub mod prompts;
pub mod session;

use provador_contracts::TryOnError;

pub use client::GenerationClient;
pub use config::{ClientKind, EngineConfig};
pub use dryrun::DryrunClient;
pub use gemini::GeminiClient;
pub use orchestrator::{Completion, Orchestrator, PoseChange};
pub use session::{SessionPhase, SessionSnapshot, SessionState};

/// Builds the client named by `config`. Fails when Gemini has no credential.
pub fn build_client(config: &EngineConfig) -> Result<Box<dyn GenerationClient>, TryOnError> {
    config.validate()?;
    let client: Box<dyn GenerationClient> = match config.client {
        ClientKind::Gemini => Box::new(GeminiClient::new(config)?),
        ClientKind::Dryrun => Box::new(DryrunClient::new()),
    };
    tracing::info!(client = client.name(), "generation client ready");
    Ok(client)
}
