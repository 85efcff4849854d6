use provador_contracts::assets::extension_for_mime;
use provador_contracts::{ClothingDescription, EncodedImage, ImageAsset, Pose, TryOnError};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::client::GenerationClient;
use crate::config::EngineConfig;
use crate::prompts::{stylist_prompt, try_on_prompt, ACCESSORY_PROMPT, DESCRIBE_PROMPT};

/// Blocking client for the Gemini `generateContent` REST endpoint.
///
/// One request per operation. No retries; the timeout is whatever the config
/// says (none by default).
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    image_model: String,
    text_model: String,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: &EngineConfig) -> Result<Self, TryOnError> {
        let api_key = config.require_api_key()?.to_string();
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| TryOnError::Transport(err.to_string()))?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            image_model: config.image_model.clone(),
            text_model: config.text_model.clone(),
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        endpoint_for_model(&self.api_base, model)
    }

    fn generate_content(
        &self,
        model: &str,
        parts: Vec<Value>,
        generation_config: Option<Value>,
    ) -> Result<Value, TryOnError> {
        let endpoint = self.endpoint_for_model(model);
        let mut payload = json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
        });
        if let Some(config) = generation_config {
            payload["generationConfig"] = config;
        }

        tracing::debug!(%model, "gemini generateContent request");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .map_err(|err| {
                tracing::warn!(%model, error = %err, "gemini transport failure");
                TryOnError::Transport(err.without_url().to_string())
            })?;
        response_json_or_error(response)
    }

    fn generate_image(&self, parts: Vec<Value>, label: &str) -> Result<ImageAsset, TryOnError> {
        let payload = self.generate_content(
            &self.image_model,
            parts,
            Some(json!({ "responseModalities": ["IMAGE"] })),
        )?;
        image_from_response(&payload, label)
    }
}

impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn synthesize_try_on(
        &self,
        person: &ImageAsset,
        clothing: &ImageAsset,
        pose: Pose,
    ) -> Result<ImageAsset, TryOnError> {
        let parts = vec![
            image_part(&person.encode()),
            image_part(&clothing.encode()),
            json!({ "text": try_on_prompt(pose) }),
        ];
        self.generate_image(parts, &format!("provador-{}", pose.slug()))
    }

    fn describe(&self, clothing: &ImageAsset) -> Result<ClothingDescription, TryOnError> {
        let parts = vec![
            image_part(&clothing.encode()),
            json!({ "text": DESCRIBE_PROMPT }),
        ];
        let payload = self.generate_content(
            &self.text_model,
            parts,
            Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": ClothingDescription::response_schema(),
            })),
        )?;
        ClothingDescription::from_json_text(&extract_text(&payload))
            .map_err(TryOnError::InvalidResponse)
    }

    fn edit_with_accessory(
        &self,
        base: &EncodedImage,
        accessory: &ImageAsset,
    ) -> Result<ImageAsset, TryOnError> {
        let parts = vec![
            image_part(base),
            image_part(&accessory.encode()),
            json!({ "text": ACCESSORY_PROMPT }),
        ];
        self.generate_image(parts, "provador-acessorio")
    }

    fn chat_advice(&self, image: &EncodedImage, user_text: &str) -> Result<String, TryOnError> {
        let parts = vec![image_part(image), json!({ "text": stylist_prompt(user_text) })];
        let advice = self
            .generate_content(&self.text_model, parts, None)
            .map(|payload| extract_text(&payload))
            .map_err(|err| TryOnError::AdviceUnavailable {
                detail: err.to_string(),
            })?;
        let advice = advice.trim();
        if advice.is_empty() {
            return Err(TryOnError::AdviceUnavailable {
                detail: "empty reply".to_string(),
            });
        }
        Ok(advice.to_string())
    }
}

pub(crate) fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

fn image_part(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data,
        }
    })
}

fn response_json_or_error(response: HttpResponse) -> Result<Value, TryOnError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| TryOnError::Transport(format!("response body read failed: {err}")))?;
    if !status.is_success() {
        return Err(TryOnError::Transport(format!(
            "HTTP {}: {}",
            status.as_u16(),
            service_error_message(&body)
        )));
    }
    serde_json::from_str(&body)
        .map_err(|err| TryOnError::InvalidResponse(format!("invalid JSON payload: {err}")))
}

/// Prefers the service's own `error.message` over the raw body.
fn service_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|parsed| {
            parsed
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 512))
}

fn first_candidate_parts(payload: &Value) -> Vec<Value> {
    payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn extract_first_image(payload: &Value) -> Option<EncodedImage> {
    first_candidate_parts(payload).into_iter().find_map(|part| {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))?
            .as_object()?;
        let data = inline.get("data").and_then(Value::as_str)?;
        if data.is_empty() {
            return None;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        Some(EncodedImage {
            data: data.to_string(),
            mime_type: mime_type.to_string(),
        })
    })
}

pub(crate) fn block_reason(payload: &Value) -> Option<String> {
    payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
}

pub(crate) fn extract_text(payload: &Value) -> String {
    first_candidate_parts(payload)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("")
        .trim()
        .to_string()
}

/// Image first, then block reason, then "nothing came back".
pub(crate) fn image_from_response(payload: &Value, label: &str) -> Result<ImageAsset, TryOnError> {
    if let Some(image) = extract_first_image(payload) {
        let label = format!("{label}.{}", extension_for_mime(&image.mime_type));
        return image.decode(label).map_err(TryOnError::from);
    }
    if let Some(reason) = block_reason(payload) {
        tracing::warn!(%reason, "gemini blocked image generation");
        return Err(TryOnError::GenerationBlocked { reason });
    }
    Err(TryOnError::EmptyResponse)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use provador_contracts::{ClothingDescription, ImageAsset, Pose, TryOnError};
    use serde_json::{json, Value};

    use crate::client::GenerationClient;
    use crate::config::EngineConfig;
    use crate::prompts::{try_on_prompt, ACCESSORY_PROMPT, DESCRIBE_PROMPT};

    use super::{
        block_reason, endpoint_for_model, extract_text, image_from_response, service_error_message,
        GeminiClient,
    };

    struct CapturedRequest {
        request_line: String,
        body: Value,
    }

    /// Answers exactly one HTTP request with `status` and `body`.
    fn serve_once(status: u16, body: Value) -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut raw_body = vec![0u8; content_length];
            reader.read_exact(&mut raw_body).unwrap();

            let payload = body.to_string();
            let response = format!(
                "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            CapturedRequest {
                request_line: request_line.trim_end().to_string(),
                body: serde_json::from_slice(&raw_body).unwrap(),
            }
        });
        (format!("http://{addr}/v1beta"), handle)
    }

    fn client_for(api_base: String) -> GeminiClient {
        GeminiClient::new(&EngineConfig {
            api_key: Some("test-key".to_string()),
            api_base,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn asset(byte: u8, label: &str) -> ImageAsset {
        ImageAsset::new(vec![byte; 6], "image/jpeg", label).unwrap()
    }

    fn image_reply(bytes: &[u8]) -> Value {
        json!({"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png", "data": BASE64.encode(bytes)}}
        ]}}]})
    }

    fn text_reply(text: &str) -> Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    fn rejected_key() -> Value {
        json!({"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}})
    }

    fn part_data(body: &Value, index: usize) -> &str {
        body["contents"][0]["parts"][index]["inlineData"]["data"]
            .as_str()
            .unwrap_or_default()
    }

    fn part_text(body: &Value, index: usize) -> &str {
        body["contents"][0]["parts"][index]["text"]
            .as_str()
            .unwrap_or_default()
    }

    #[test]
    fn try_on_sends_person_clothing_then_prompt() -> anyhow::Result<()> {
        let (base, server) = serve_once(200, image_reply(&[7, 7, 7]));
        let person = asset(1, "eu.jpg");
        let clothing = asset(2, "vestido.jpg");

        let result = client_for(base).synthesize_try_on(&person, &clothing, Pose::HandOnWaist)?;
        assert_eq!(result.bytes(), &[7, 7, 7]);
        assert_eq!(result.label(), "provador-hand-on-waist.png");

        let request = server.join().unwrap();
        assert!(request.request_line.starts_with(
            "POST /v1beta/models/gemini-2.5-flash-image:generateContent?key=test-key "
        ));
        assert_eq!(part_data(&request.body, 0), person.encode().data);
        assert_eq!(part_data(&request.body, 1), clothing.encode().data);
        assert_eq!(part_text(&request.body, 2), try_on_prompt(Pose::HandOnWaist));
        assert_eq!(
            request.body["generationConfig"]["responseModalities"],
            json!(["IMAGE"])
        );
        Ok(())
    }

    #[test]
    fn try_on_block_reason_is_reported() {
        let (base, server) = serve_once(200, json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let err = client_for(base)
            .synthesize_try_on(&asset(1, "eu.jpg"), &asset(2, "vestido.jpg"), Pose::Standard)
            .unwrap_err();
        server.join().unwrap();
        assert_eq!(
            err,
            TryOnError::GenerationBlocked {
                reason: "SAFETY".to_string()
            }
        );
    }

    #[test]
    fn describe_requests_structured_json() -> anyhow::Result<()> {
        let reply = json!({
            "name": "Vestido Azul Midi",
            "description": "Leve e fluido.",
            "occasions": "Casamentos de dia."
        });
        let (base, server) = serve_once(200, text_reply(&reply.to_string()));

        let description = client_for(base).describe(&asset(2, "vestido.jpg"))?;
        assert_eq!(
            description,
            ClothingDescription {
                name: "Vestido Azul Midi".to_string(),
                description: "Leve e fluido.".to_string(),
                occasions: "Casamentos de dia.".to_string(),
            }
        );

        let request = server.join().unwrap();
        assert!(request
            .request_line
            .contains("/models/gemini-2.5-flash:generateContent?key=test-key"));
        assert_eq!(part_text(&request.body, 1), DESCRIBE_PROMPT);
        let config = &request.body["generationConfig"];
        assert_eq!(config["responseMimeType"], json!("application/json"));
        assert_eq!(config["responseSchema"], ClothingDescription::response_schema());
        Ok(())
    }

    #[test]
    fn describe_with_missing_field_is_invalid() {
        let (base, server) = serve_once(200, text_reply(r#"{"name": "Saia"}"#));
        let err = client_for(base).describe(&asset(2, "saia.jpg")).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, TryOnError::InvalidResponse(_)));
    }

    #[test]
    fn accessory_sends_base_then_accessory() -> anyhow::Result<()> {
        let (base, server) = serve_once(200, image_reply(&[9, 9]));
        let current = asset(3, "provador-standard.png").encode();
        let accessory = asset(4, "bolsa.png");

        let edited = client_for(base).edit_with_accessory(&current, &accessory)?;
        assert_eq!(edited.bytes(), &[9, 9]);
        assert_eq!(edited.label(), "provador-acessorio.png");

        let request = server.join().unwrap();
        assert_eq!(part_data(&request.body, 0), current.data);
        assert_eq!(part_data(&request.body, 1), accessory.encode().data);
        assert_eq!(part_text(&request.body, 2), ACCESSORY_PROMPT);
        Ok(())
    }

    #[test]
    fn chat_returns_trimmed_advice() -> anyhow::Result<()> {
        let (base, server) = serve_once(200, text_reply("  Sim, combina muito bem!\n"));
        let image = asset(3, "provador-standard.png").encode();

        let advice = client_for(base).chat_advice(&image, "Combina com tênis branco?")?;
        assert_eq!(advice, "Sim, combina muito bem!");

        let request = server.join().unwrap();
        assert_eq!(part_data(&request.body, 0), image.data);
        assert!(part_text(&request.body, 1).ends_with("\"Combina com tênis branco?\""));
        assert!(request.body.get("generationConfig").is_none());
        Ok(())
    }

    #[test]
    fn rejected_request_surfaces_service_message() {
        let person = asset(1, "eu.jpg");
        let clothing = asset(2, "vestido.jpg");
        let encoded = person.encode();

        let (base, server) = serve_once(400, rejected_key());
        let err = client_for(base)
            .synthesize_try_on(&person, &clothing, Pose::Standard)
            .unwrap_err();
        server.join().unwrap();
        assert_eq!(
            err,
            TryOnError::Transport("HTTP 400: API key not valid.".to_string())
        );

        let (base, server) = serve_once(400, rejected_key());
        let err = client_for(base).describe(&clothing).unwrap_err();
        server.join().unwrap();
        assert_eq!(
            err,
            TryOnError::Transport("HTTP 400: API key not valid.".to_string())
        );

        let (base, server) = serve_once(400, rejected_key());
        let err = client_for(base)
            .edit_with_accessory(&encoded, &clothing)
            .unwrap_err();
        server.join().unwrap();
        assert_eq!(
            err,
            TryOnError::Transport("HTTP 400: API key not valid.".to_string())
        );
    }

    #[test]
    fn rejected_chat_is_advice_unavailable() {
        let (base, server) = serve_once(400, rejected_key());
        let err = client_for(base)
            .chat_advice(&asset(3, "provador-standard.png").encode(), "E com bota?")
            .unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, TryOnError::AdviceUnavailable { .. }));
        assert!(!err.to_string().contains("API key"));
    }

    #[test]
    fn empty_chat_reply_is_advice_unavailable() {
        let (base, server) = serve_once(200, text_reply("   "));
        let err = client_for(base)
            .chat_advice(&asset(3, "provador-standard.png").encode(), "E com bota?")
            .unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, TryOnError::AdviceUnavailable { .. }));
    }

    #[test]
    fn endpoint_accepts_prefixed_and_bare_models() {
        assert_eq!(
            endpoint_for_model("https://api.test/v1beta", "gemini-2.5-flash"),
            "https://api.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            endpoint_for_model("https://api.test/v1beta", " models/custom "),
            "https://api.test/v1beta/models/custom:generateContent"
        );
    }

    #[test]
    fn first_inline_image_is_returned() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "aqui está"},
                        {"inlineData": {"mimeType": "image/jpeg", "data": BASE64.encode([1u8, 2, 3])}},
                        {"inlineData": {"mimeType": "image/png", "data": BASE64.encode([9u8])}}
                    ]
                }
            }]
        });
        let asset = image_from_response(&payload, "provador-standard")?;
        assert_eq!(asset.bytes(), &[1, 2, 3]);
        assert_eq!(asset.mime_type(), "image/jpeg");
        assert_eq!(asset.label(), "provador-standard.jpg");
        Ok(())
    }

    #[test]
    fn snake_case_inline_data_is_accepted() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{"content": {"parts": [
                {"inline_data": {"mime_type": "image/webp", "data": BASE64.encode([4u8, 5])}}
            ]}}]
        });
        let asset = image_from_response(&payload, "x")?;
        assert_eq!(asset.mime_type(), "image/webp");
        Ok(())
    }

    #[test]
    fn block_reason_becomes_generation_blocked() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert_eq!(block_reason(&payload).as_deref(), Some("SAFETY"));
        let err = image_from_response(&payload, "x").unwrap_err();
        assert_eq!(
            err,
            TryOnError::GenerationBlocked {
                reason: "SAFETY".to_string()
            }
        );
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn missing_image_without_reason_is_empty_response() {
        let payload = json!({"candidates": [{"content": {"parts": [{"text": "desculpe"}]}}]});
        assert_eq!(
            image_from_response(&payload, "x").unwrap_err(),
            TryOnError::EmptyResponse
        );
        assert_eq!(
            image_from_response(&json!({}), "x").unwrap_err(),
            TryOnError::EmptyResponse
        );
    }

    #[test]
    fn text_parts_are_joined_and_trimmed() {
        let payload = json!({"candidates": [{"content": {"parts": [
            {"text": "  Sim, "},
            {"text": "combina muito bem!\n"}
        ]}}]});
        assert_eq!(extract_text(&payload), "Sim, combina muito bem!");
    }

    #[test]
    fn service_error_message_prefers_structured_message() {
        let body = json!({"error": {"code": 400, "message": "API key not valid."}}).to_string();
        assert_eq!(service_error_message(&body), "API key not valid.");
        assert_eq!(service_error_message("plain failure"), "plain failure");
    }

    #[test]
    fn client_requires_credential() {
        let err = GeminiClient::new(&EngineConfig::default()).err();
        assert!(matches!(err, Some(TryOnError::Configuration(_))));
    }
}
