use async_trait::async_trait;

use super::{GenerationError, TextGenerator};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` client.
///
/// Uses `ureq` on the blocking pool. The key comes from configuration,
/// normally the `GEMINI_API_KEY` environment variable.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Pull the first candidate's text out of a response body.
fn extract_text(json: &serde_json::Value) -> Result<String, GenerationError> {
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| GenerationError::Parse("no candidates in response".to_string()))?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        return Err(GenerationError::Parse("candidate has no text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.endpoint();
        let api_key = self.api_key.clone();
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let response = agent
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .header("content-type", "application/json")
                .send_json(body);

            match response {
                Ok(resp) => {
                    let json: serde_json::Value = resp
                        .into_body()
                        .read_json()
                        .map_err(|e| GenerationError::Parse(e.to_string()))?;
                    extract_text(&json)
                }
                Err(ureq::Error::StatusCode(status)) => Err(GenerationError::Api {
                    status,
                    message: if status == 429 {
                        "quota exhausted".to_string()
                    } else {
                        "request rejected".to_string()
                    },
                }),
                Err(e) => Err(GenerationError::Network(e.to_string())),
            }
        })
        .await
        .map_err(|e| GenerationError::Network(format!("task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new("k", "gemini-2.5-flash").with_base_url("http://localhost:9/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn text_parts_are_joined() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "board." }] } }]
        });
        assert_eq!(extract_text(&json).unwrap(), "Hello, board.");
    }

    #[test]
    fn empty_response_is_parse_error() {
        let err = extract_text(&serde_json::json!({ "candidates": [] })).unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }
}
