use std::fmt;

use provador_contracts::chat::ChatTranscript;
use provador_contracts::{ClothingDescription, ImageAsset, Pose, PoseCache, TryOnError};
use serde::Serialize;

/// Identity of the current (person, clothing) input pair.
///
/// Bumped on every upload and on every fresh generation; a completion carrying
/// an older token is dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// The generation-class operation currently awaiting a remote reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InFlight {
    Generating,
    ChangingPose { pose: Pose },
    AddingAccessory { pose: Pose },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Generate,
    ChangePose,
    AddAccessory,
}

/// The error currently shown to the user and the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub operation: Operation,
    pub error: TryOnError,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error.is_local() {
            return write!(f, "{}", self.error);
        }
        match self.operation {
            Operation::Generate | Operation::ChangePose => {
                write!(f, "Não foi possível gerar a imagem. {}", self.error)
            }
            Operation::AddAccessory => {
                write!(f, "Não foi possível adicionar o acessório. {}", self.error)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Idle,
    ChangingPose,
    AddingAccessory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "mode", rename_all = "snake_case")]
pub enum SessionPhase {
    AwaitingInputs,
    ReadyToGenerate,
    Generating,
    Displaying(DisplayMode),
    Error,
}

impl SessionPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::AwaitingInputs => "awaiting_inputs",
            Self::ReadyToGenerate => "ready_to_generate",
            Self::Generating => "generating",
            Self::Displaying(DisplayMode::Idle) => "displaying",
            Self::Displaying(DisplayMode::ChangingPose) => "changing_pose",
            Self::Displaying(DisplayMode::AddingAccessory) => "adding_accessory",
            Self::Error => "error",
        }
    }
}

/// Everything one try-on session knows. Only the orchestrator mutates it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) person: Option<ImageAsset>,
    pub(crate) clothing: Option<ImageAsset>,
    pub(crate) description: Option<ClothingDescription>,
    pub(crate) results: PoseCache,
    pub(crate) selected_pose: Pose,
    pub(crate) error: Option<SessionFailure>,
    pub(crate) in_flight: Option<InFlight>,
    pub(crate) describing: bool,
    pub(crate) chat_loading: bool,
    pub(crate) transcript: ChatTranscript,
    pub(crate) token: GenerationToken,
    pub(crate) clothing_revision: u64,
}

impl SessionState {
    pub fn person(&self) -> Option<&ImageAsset> {
        self.person.as_ref()
    }

    pub fn clothing(&self) -> Option<&ImageAsset> {
        self.clothing.as_ref()
    }

    pub fn description(&self) -> Option<&ClothingDescription> {
        self.description.as_ref()
    }

    pub fn results(&self) -> &PoseCache {
        &self.results
    }

    pub fn selected_pose(&self) -> Pose {
        self.selected_pose
    }

    pub fn error(&self) -> Option<&SessionFailure> {
        self.error.as_ref()
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    pub fn is_describing(&self) -> bool {
        self.describing
    }

    pub fn is_chat_loading(&self) -> bool {
        self.chat_loading
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn token(&self) -> GenerationToken {
        self.token
    }

    /// The image shown for the selected pose, if one has been generated.
    pub fn current_result(&self) -> Option<&ImageAsset> {
        self.results.get(self.selected_pose)
    }

    pub fn has_inputs(&self) -> bool {
        self.person.is_some() && self.clothing.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        match self.in_flight {
            Some(InFlight::Generating) => return SessionPhase::Generating,
            Some(InFlight::ChangingPose { .. }) => {
                return SessionPhase::Displaying(DisplayMode::ChangingPose)
            }
            Some(InFlight::AddingAccessory { .. }) => {
                return SessionPhase::Displaying(DisplayMode::AddingAccessory)
            }
            None => {}
        }
        if self.error.is_some() {
            SessionPhase::Error
        } else if self.current_result().is_some() {
            SessionPhase::Displaying(DisplayMode::Idle)
        } else if self.has_inputs() {
            SessionPhase::ReadyToGenerate
        } else {
            SessionPhase::AwaitingInputs
        }
    }

    pub(crate) fn invalidate(&mut self) -> GenerationToken {
        self.token = self.token.next();
        self.token
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            token: self.token,
            person: self.person.as_ref().map(AssetSummary::from),
            clothing: self.clothing.as_ref().map(AssetSummary::from),
            description: self.description.clone(),
            selected_pose: self.selected_pose,
            cached_poses: self.results.poses(),
            current_result: self.current_result().map(AssetSummary::from),
            error: self.error.as_ref().map(ToString::to_string),
            in_flight: self.in_flight,
            describing: self.describing,
            chat_loading: self.chat_loading,
            chat_turns: self.transcript.len(),
        }
    }
}

/// Read-only, serialisable view of [`SessionState`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub token: GenerationToken,
    pub person: Option<AssetSummary>,
    pub clothing: Option<AssetSummary>,
    pub description: Option<ClothingDescription>,
    pub selected_pose: Pose,
    pub cached_poses: Vec<Pose>,
    pub current_result: Option<AssetSummary>,
    pub error: Option<String>,
    pub in_flight: Option<InFlight>,
    pub describing: bool,
    pub chat_loading: bool,
    pub chat_turns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetSummary {
    pub label: String,
    pub mime_type: String,
    pub bytes: usize,
    pub fingerprint: String,
}

impl From<&ImageAsset> for AssetSummary {
    fn from(asset: &ImageAsset) -> Self {
        Self {
            label: asset.label().to_string(),
            mime_type: asset.mime_type().to_string(),
            bytes: asset.len(),
            fingerprint: asset.fingerprint(),
        }
    }
}
