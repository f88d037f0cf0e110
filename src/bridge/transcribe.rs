//! HTTP client for the transcription backend.
//!
//! Uploads the raw audio as multipart form data and maps the response into
//! the core's span model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::domain::ConfidenceSpan;

use super::http::transport_error;
use super::{BridgeError, Transcriber, Transcription};

const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Transcription service client
pub struct HttpTranscriber {
    endpoint: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeResponse {
    transcript: String,
    #[serde(default)]
    detected_language: String,
    #[serde(default)]
    segments: Vec<WireSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSegment {
    start_ms: u64,
    end_ms: u64,
    text: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

/// Confidence assumed when the backend does not report one
fn default_confidence() -> f64 {
    0.9
}

impl HttpTranscriber {
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.filter(|url| !url.is_empty()),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> Result<Transcription, BridgeError> {
        let endpoint = self.endpoint.as_ref().ok_or(BridgeError::Unconfigured)?;

        let audio_part = Part::bytes(audio.to_vec())
            .file_name("capture")
            .mime_str(mime_type)
            .map_err(|e| BridgeError::Rejected(format!("invalid mime type: {e}")))?;

        let form = Form::new()
            .part("audio", audio_part)
            .text("mimeType", mime_type.to_string());

        let mut request = self
            .client
            .post(endpoint)
            .timeout(TRANSCRIBE_TIMEOUT)
            .multipart(form);

        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_server_error() {
            // Backend trouble is treated like a network failure: the retry
            // budget applies
            return Err(BridgeError::Transport(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(BridgeError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let parsed: TranscribeResponse = serde_json::from_str(&body)
            .map_err(|e| BridgeError::Rejected(format!("malformed transcription response: {e}")))?;

        let spans = parsed
            .segments
            .into_iter()
            .map(|s| ConfidenceSpan {
                start_ms: s.start_ms,
                end_ms: s.end_ms,
                text: s.text,
                confidence: s.confidence,
            })
            .collect();

        let detected_language = if parsed.detected_language.is_empty() {
            "en".to_string()
        } else {
            parsed.detected_language
        };

        Ok(Transcription {
            text: parsed.transcript.trim().to_string(),
            detected_language,
            spans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_transcriber() {
        let transcriber = HttpTranscriber::new(None, None);
        let err = transcriber.transcribe(b"audio", "audio/mp4").await;
        assert!(matches!(err, Err(BridgeError::Unconfigured)));
    }

    #[test]
    fn test_response_parsing_defaults() {
        let json = r#"{
            "transcript": " Toi can mua sua ",
            "segments": [
                {"startMs": 0, "endMs": 900, "text": "mua sua"}
            ]
        }"#;

        let parsed: TranscribeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.detected_language, "");
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].confidence, 0.9);
    }
}
