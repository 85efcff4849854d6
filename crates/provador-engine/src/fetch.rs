use provador_contracts::{ImageAsset, TryOnError};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

const DEFAULT_FILE_NAME: &str = "image.jpg";

/// Loads an image from an arbitrary URL. Only `image/*` responses are accepted.
pub fn fetch_image(http: &HttpClient, raw_url: &str) -> Result<ImageAsset, TryOnError> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return Err(TryOnError::validation("Por favor, insira uma URL válida."));
    }
    let url = Url::parse(raw_url)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or_else(|| TryOnError::validation("Por favor, insira uma URL válida."))?;

    tracing::debug!(%url, "fetching image from url");
    let response = http.get(url.clone()).send().map_err(|err| {
        tracing::warn!(%url, error = %err, "image fetch failed");
        unreachable_image()
    })?;
    if !response.status().is_success() {
        return Err(unreachable_image());
    }
    let mime_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if !is_image_content_type(&mime_type) {
        return Err(not_an_image());
    }
    let bytes = response.bytes().map_err(|_| unreachable_image())?;
    ImageAsset::new(bytes.to_vec(), mime_type, file_name_from_url(&url))
        .map_err(|_| not_an_image())
}

pub fn is_image_content_type(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

pub(crate) fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

fn unreachable_image() -> TryOnError {
    TryOnError::validation(
        "Não foi possível buscar a imagem. Verifique a URL e as permissões de acesso.",
    )
}

fn not_an_image() -> TryOnError {
    TryOnError::validation("A URL não aponta para uma imagem válida.")
}
