//! Gemini `generateContent` backend

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CaptureRequest, DescriptionBackend, InferenceError, InferenceResult};
use crate::config::InferenceConfig;

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

// Every field is optional: an odd response shape is a soft failure, not an error
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Longest error text carried into the spoken failure message
const MAX_ERROR_CHARS: usize = 120;

pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model
        );
        info!(%endpoint, "Gemini backend configured");

        Ok(Self {
            client: builder.build()?,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl DescriptionBackend for GeminiBackend {
    async fn describe(&self, request: CaptureRequest) -> Result<InferenceResult, InferenceError> {
        let body = build_request(&request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %text, "service returned an error");
            return Err(InferenceError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)?;
        Ok(extract_description(parsed))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn build_request(request: &CaptureRequest) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: request.instruction.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: request.image.mime_type.to_string(),
                        data: general_purpose::STANDARD.encode(&request.image.bytes),
                    },
                },
            ],
        }],
    }
}

/// Short error text from an error body: `error.message` when present,
/// otherwise the body itself, cut to [`MAX_ERROR_CHARS`]
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|response| response.error.message)
        .unwrap_or_else(|| body.to_string());
    let message = message.trim();

    if message.chars().count() <= MAX_ERROR_CHARS {
        return message.to_string();
    }
    let mut short: String = message.chars().take(MAX_ERROR_CHARS).collect();
    short.push_str("...");
    short
}

/// Take the first candidate's first text part
fn extract_description(response: GeminiResponse) -> InferenceResult {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        warn!(%reason, "request was blocked by the service");
    }

    let Some(candidate) = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
    else {
        return InferenceResult::NoCandidate;
    };

    debug!(finish_reason = ?candidate.finish_reason, "candidate received");

    candidate
        .content
        .and_then(|content| content.parts)
        .and_then(|parts| parts.into_iter().find_map(|part| part.text))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .map(InferenceResult::Description)
        .unwrap_or(InferenceResult::NoCandidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImagePayload;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_test::assert_ok;

    fn request() -> CaptureRequest {
        CaptureRequest {
            image: ImagePayload::jpeg(vec![1, 2, 3]),
            instruction: "describe",
        }
    }

    fn parse(json: &str) -> InferenceResult {
        extract_description(serde_json::from_str(json).unwrap())
    }

    fn config(api_base: String) -> InferenceConfig {
        InferenceConfig {
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            api_base,
            request_timeout_secs: Some(5),
        }
    }

    /// Serve a single canned HTTP response; yields the raw request text
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{addr}/v1beta"), handle)
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(build_request(&request())).unwrap();
        let parts = &json["contents"][0]["parts"];

        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
    }

    #[test]
    fn test_first_candidate_text_is_description() {
        let result = parse(
            r#"{"candidates":[
                {"content":{"parts":[{"text":"  Exit sign ahead \n"}]},"finishReason":"STOP"},
                {"content":{"parts":[{"text":"ignored"}]}}
            ]}"#,
        );
        assert_eq!(result, InferenceResult::Description("Exit sign ahead".to_string()));
    }

    #[test]
    fn test_missing_candidates_is_soft_failure() {
        assert_eq!(parse(r#"{}"#), InferenceResult::NoCandidate);
        assert_eq!(parse(r#"{"candidates":[]}"#), InferenceResult::NoCandidate);
        assert_eq!(
            parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            InferenceResult::NoCandidate
        );
    }

    #[test]
    fn test_malformed_candidate_is_soft_failure() {
        assert_eq!(parse(r#"{"candidates":[{}]}"#), InferenceResult::NoCandidate);
        assert_eq!(
            parse(r#"{"candidates":[{"content":{"parts":[]}}]}"#),
            InferenceResult::NoCandidate
        );
        assert_eq!(
            parse(r#"{"candidates":[{"content":{"parts":[{"text":"   "}]}}]}"#),
            InferenceResult::NoCandidate
        );
    }

    #[tokio::test]
    async fn test_describe_round_trip() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"A hallway"}]}}]}"#,
        )
        .await;
        let backend = GeminiBackend::new(&config(base)).unwrap();

        let result = assert_ok!(backend.describe(request()).await);
        assert_eq!(result, InferenceResult::Description("A hallway".to_string()));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/test-model:generateContent"));
        assert!(raw.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
        assert!(raw.contains("AQID"));
    }

    #[tokio::test]
    async fn test_error_status_reports_service_message() {
        let (base, server) = serve_once(
            "HTTP/1.1 500 Internal Server Error",
            r#"{"error":{"code":500,"message":"Internal error encountered.","status":"INTERNAL"}}"#,
        )
        .await;
        let backend = GeminiBackend::new(&config(base)).unwrap();

        let err = backend.describe(request()).await.unwrap_err();
        match &err {
            InferenceError::Status { status, message } => {
                assert_eq!(*status, 500);
                assert_eq!(message, "Internal error encountered.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains('{'));
        server.await.unwrap();
    }

    #[test]
    fn test_error_message_without_envelope() {
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
        assert_eq!(error_message(r#"{"error":"boom"}"#), r#"{"error":"boom"}"#);

        let long = "x".repeat(500);
        let short = error_message(&long);
        assert_eq!(short.len(), MAX_ERROR_CHARS + 3);
        assert!(short.ends_with("..."));
    }

    #[tokio::test]
    async fn test_invalid_json_is_hard_failure() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", "not json").await;
        let backend = GeminiBackend::new(&config(base)).unwrap();

        let err = backend.describe(request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Decode(_)));
        server.await.unwrap();
    }
}
