use std::env;
use std::time::Duration;

use provador_contracts::TryOnError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

/// Credential lookup order.
pub const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY", "GOOGLE_API_KEY"];

/// Fixed screen shown when the credential is missing. Nothing else runs.
pub const CONFIG_ERROR_SCREEN: &str = "\
Erro de Configuração

A chave da API do Google Gemini (API_KEY) não foi encontrada.

Para que o provador virtual funcione, defina a variável de ambiente com a sua chave:
  1. Gere uma chave no Google AI Studio.
  2. Exporte-a no terminal: export GEMINI_API_KEY=\"sua-chave\"
     (ou adicione GEMINI_API_KEY=sua-chave a um arquivo .env nesta pasta).
  3. Execute o comando novamente.

Para testar sem a chave, use a opção --dryrun.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Gemini,
    Dryrun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub client: ClientKind,
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: String,
    pub text_model: String,
    /// `None` leaves the service's own limits as the only bound.
    pub request_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client: ClientKind::Gemini,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            request_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            client: ClientKind::Gemini,
            api_key: API_KEY_VARS.iter().find_map(|key| non_empty(*key)),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            image_model: non_empty("PROVADOR_IMAGE_MODEL").unwrap_or(defaults.image_model),
            text_model: non_empty("PROVADOR_TEXT_MODEL").unwrap_or(defaults.text_model),
            request_timeout: non_empty("PROVADOR_REQUEST_TIMEOUT_S")
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
                .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok()),
        }
    }

    pub fn dryrun() -> Self {
        Self {
            client: ClientKind::Dryrun,
            ..Self::default()
        }
    }

    pub fn require_api_key(&self) -> Result<&str, TryOnError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| TryOnError::Configuration(CONFIG_ERROR_SCREEN.to_string()))
    }

    /// Dry runs never need the credential.
    pub fn validate(&self) -> Result<(), TryOnError> {
        match self.client {
            ClientKind::Dryrun => Ok(()),
            ClientKind::Gemini => self.require_api_key().map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use provador_contracts::TryOnError;

    use super::{ClientKind, EngineConfig, DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = EngineConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let config = EngineConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")]));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TryOnError::Configuration(_)));
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn key_lookup_order_prefers_gemini_key() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("API_KEY", "from-api-key"),
            ("GEMINI_API_KEY", "from-gemini"),
        ]));
        assert_eq!(config.require_api_key().ok(), Some("from-gemini"));

        let fallback = EngineConfig::from_lookup(lookup(&[("GOOGLE_API_KEY", "from-google")]));
        assert_eq!(fallback.require_api_key().ok(), Some("from-google"));
    }

    #[test]
    fn overrides_are_trimmed() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("GEMINI_API_BASE", "http://localhost:9000/v1/ "),
            ("PROVADOR_IMAGE_MODEL", "custom-image"),
            ("PROVADOR_REQUEST_TIMEOUT_S", "12.5"),
        ]));
        assert_eq!(config.api_base, "http://localhost:9000/v1");
        assert_eq!(config.image_model, "custom-image");
        assert_eq!(config.request_timeout, Some(Duration::from_secs_f64(12.5)));
    }

    #[test]
    fn invalid_timeout_is_ignored() {
        for raw in ["-3", "0", "abc", "inf", "1e300"] {
            let config = EngineConfig::from_lookup(lookup(&[("PROVADOR_REQUEST_TIMEOUT_S", raw)]));
            assert_eq!(config.request_timeout, None, "timeout {raw:?}");
        }
    }

    #[test]
    fn dryrun_needs_no_key() {
        let config = EngineConfig::dryrun();
        assert_eq!(config.client, ClientKind::Dryrun);
        assert!(config.validate().is_ok());
    }
}
