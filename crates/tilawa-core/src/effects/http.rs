//! HTTP effects — the juz content API and streamed recitation audio.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::ContentSource;
use crate::error::FetchError;
use crate::models::{Ayah, Juz};

pub const DEFAULT_API_URL: &str = "https://api.alquran.cloud/v1";

/// Juz lookup against the alquran.cloud REST API:
/// `GET {base}/juz/{n}/{reciter}`.
pub struct AlQuranCloud {
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct JuzData {
    ayahs: Vec<Ayah>,
}

impl AlQuranCloud {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn juz_url(&self, juz: Juz, reciter: &str) -> String {
        format!("{}/juz/{}/{}", self.base_url, juz.number(), reciter)
    }
}

impl Default for AlQuranCloud {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, Duration::from_secs(15))
    }
}

impl ContentSource for AlQuranCloud {
    fn fetch_juz(&self, juz: Juz, reciter: &str) -> Result<Vec<Ayah>, FetchError> {
        let url = self.juz_url(juz, reciter);
        log::debug!("tilawa: GET {}", url);

        let mut response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => FetchError::Status(code),
            other => FetchError::Transport(other.to_string()),
        })?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        parse_juz_response(&body)
    }
}

/// Parse the API envelope `{"code": 200, "data": {"ayahs": [...]}}`.
///
/// Error envelopes carry a non-200 `code` and a string in `data`.
pub fn parse_juz_response(body: &str) -> Result<Vec<Ayah>, FetchError> {
    let envelope: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let code = envelope["code"]
        .as_u64()
        .ok_or_else(|| FetchError::Decode("missing code".into()))?;
    if code != 200 {
        return Err(FetchError::Status(code as u16));
    }

    let data: JuzData = serde_json::from_value(envelope["data"].clone())
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(data.ayahs)
}

/// Open an HTTP/HTTPS URL as a blocking reader, with its advertised
/// length when the server sends one.
pub fn open_url(
    url: &str,
) -> Result<(impl std::io::Read + Send + Sync + 'static, Option<u64>), ureq::Error> {
    let response = ureq::get(url).call()?;
    let length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    Ok((response.into_body().into_reader(), length))
}

/// Extract file extension from a URL, stripping query parameters.
///
/// `"https://cdn.example.com/128/1.mp3?v=2"` → `Some("mp3")`
pub fn extension_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Check if a source looks like an HTTP URL.
pub fn is_http_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ayah_json(number: u32) -> Value {
        serde_json::json!({
            "number": number,
            "audio": format!("https://cdn.example.com/audio/{}.mp3", number),
            "text": "text",
            "numberInSurah": number,
            "surah": { "number": 1, "name": "الفاتحة", "englishName": "Al-Faatiha" },
            "juz": 1
        })
    }

    #[test]
    fn parses_success_envelope() {
        let body = serde_json::json!({
            "code": 200,
            "status": "OK",
            "data": { "number": 1, "ayahs": [ayah_json(1), ayah_json(2)] }
        })
        .to_string();
        let ayahs = parse_juz_response(&body).unwrap();
        assert_eq!(ayahs.len(), 2);
        assert_eq!(ayahs[1].number, 2);
    }

    #[test]
    fn error_envelope_maps_to_status() {
        let body = r#"{"code":404,"status":"NOT FOUND","data":"Not found"}"#;
        assert_eq!(parse_juz_response(body), Err(FetchError::Status(404)));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(parse_juz_response("<html>"), Err(FetchError::Decode(_))));
        assert!(matches!(
            parse_juz_response(r#"{"code":200,"data":{}}"#),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn juz_url_layout() {
        let api = AlQuranCloud::new("https://api.example.com/v1/", Duration::from_secs(1));
        assert_eq!(
            api.juz_url(Juz::new(5).unwrap(), "en.walk"),
            "https://api.example.com/v1/juz/5/en.walk"
        );
    }

    #[test]
    fn extension_from_url_strips_query() {
        assert_eq!(
            extension_from_url("https://cdn.example.com/128/1.mp3?v=2"),
            Some("mp3".into())
        );
        assert_eq!(extension_from_url("https://example.com/stream"), None);
        assert_eq!(extension_from_url("sounds/rain.OGG"), Some("ogg".into()));
    }

    #[test]
    fn is_http_url_checks_scheme() {
        assert!(is_http_url("https://cdn.example.com/1.mp3"));
        assert!(is_http_url("http://cdn.example.com/1.mp3"));
        assert!(!is_http_url("sounds/rain.mp3"));
    }
}
