use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Structured metadata about the uploaded clothing item.
///
/// Either the full remote result or the full fallback; never partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClothingDescription {
    pub name: String,
    pub description: String,
    pub occasions: String,
}

impl ClothingDescription {
    pub fn fallback() -> Self {
        Self {
            name: "Peça de Roupa".to_string(),
            description: "Uma peça incrível para compor seu look.".to_string(),
            occasions: "Perfeita para diversas ocasiões especiais.".to_string(),
        }
    }

    /// Parses the structured reply. Missing keys and blank values are rejected.
    pub fn from_json_text(raw: &str) -> Result<Self, String> {
        let parsed: Self = serde_json::from_str(raw.trim())
            .map_err(|err| format!("invalid clothing description payload: {err}"))?;
        for (field, value) in [
            ("name", &parsed.name),
            ("description", &parsed.description),
            ("occasions", &parsed.occasions),
        ] {
            if value.trim().is_empty() {
                return Err(format!("clothing description field '{field}' is empty"));
            }
        }
        Ok(parsed)
    }

    pub fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "description": { "type": "STRING" },
                "occasions": { "type": "STRING" },
            },
            "required": ["name", "description", "occasions"],
        })
    }
}
