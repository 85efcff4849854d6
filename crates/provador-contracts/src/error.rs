use thiserror::Error;

/// Failures surfaced by the try-on workflow.
///
/// Display strings are the user-facing texts; callers show them as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryOnError {
    #[error("{0}")]
    Validation(String),

    #[error("A geração da imagem foi bloqueada por: {reason}. Tente usar outras imagens.")]
    GenerationBlocked { reason: String },

    #[error("A API não retornou uma imagem. A resposta pode estar vazia ou ter sido bloqueada.")]
    EmptyResponse,

    #[error("Não foi possível obter uma resposta do estilista. Tente novamente.")]
    AdviceUnavailable { detail: String },

    #[error("Falha na comunicação com o serviço de geração: {0}")]
    Transport(String),

    #[error("O serviço de geração retornou uma resposta inválida: {0}")]
    InvalidResponse(String),

    #[error("Nenhuma imagem gerada para a pose atual.")]
    MissingResult,

    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl TryOnError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures that never reached the remote service.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::MissingResult | Self::Configuration(_) | Self::Asset(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("O arquivo não é uma imagem válida ({mime_type}).")]
    NotAnImage { mime_type: String },

    #[error("A imagem está vazia.")]
    Empty,

    #[error("Não foi possível decodificar a imagem: {0}")]
    Decode(String),

    #[error("Não foi possível ler {path}: {detail}")]
    Io { path: String, detail: String },
}
