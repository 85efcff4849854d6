use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body poses offered after the first try-on, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Pose {
    #[default]
    Standard,
    HandOnWaist,
    CasualCrossed,
    ThoughtfulProfile,
}

const KEEP_IDENTITY: &str = "Mantenha a pessoa, o rosto, o cabelo e a roupa *exatamente* como na imagem original. A única alteração permitida é a pose corporal.";

impl Pose {
    pub const ALL: [Pose; 4] = [
        Pose::Standard,
        Pose::HandOnWaist,
        Pose::CasualCrossed,
        Pose::ThoughtfulProfile,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Pose::Standard => "standard",
            Pose::HandOnWaist => "hand-on-waist",
            Pose::CasualCrossed => "casual-crossed",
            Pose::ThoughtfulProfile => "thoughtful-profile",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pose::Standard => "Pose Padrão",
            Pose::HandOnWaist => "Mão na Cintura",
            Pose::CasualCrossed => "Casual Cruzada",
            Pose::ThoughtfulProfile => "Perfil Pensativo",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Pose::Standard => "Altere a pose da pessoa para que ela fique em pé com os braços para baixo ao lado do corpo, em uma pose de descanso natural.",
            Pose::HandOnWaist => "Altere a pose da pessoa para que ela fique em pé com uma mão na cintura, de forma natural e confiante.",
            Pose::CasualCrossed => "Altere a pose da pessoa para que ela fique em pé com os braços levemente cruzados, em uma postura casual e descontraída.",
            Pose::ThoughtfulProfile => "Altere a pose da pessoa para que ela fique de perfil, com a cabeça levemente inclinada para baixo em direção à câmera, uma mão na cintura e a outra no queixo.",
        }
    }

    pub fn instruction(self) -> String {
        format!("{} {}", self.body(), KEEP_IDENTITY)
    }

    /// Accepts a slug or a display label, ignoring case and surrounding space.
    pub fn parse(raw: &str) -> Option<Pose> {
        let needle = raw.trim();
        if needle.is_empty() {
            return None;
        }
        Pose::ALL.into_iter().find(|pose| {
            pose.slug().eq_ignore_ascii_case(needle)
                || pose.label().to_lowercase() == needle.to_lowercase()
        })
    }

    pub fn position(self) -> usize {
        Pose::ALL
            .iter()
            .position(|pose| *pose == self)
            .unwrap_or_default()
    }
}

/// Instruction for an arbitrary identifier; unknown values get the default pose.
pub fn instruction_for(raw: &str) -> String {
    Pose::parse(raw).unwrap_or_default().instruction()
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pose '{0}' (expected one of: {known})", known = known_slugs())]
pub struct UnknownPose(pub String);

fn known_slugs() -> String {
    Pose::ALL.map(Pose::slug).join(", ")
}

impl FromStr for Pose {
    type Err = UnknownPose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pose::parse(s).ok_or_else(|| UnknownPose(s.to_string()))
    }
}
