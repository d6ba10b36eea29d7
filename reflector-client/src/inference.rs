use anyhow::{Context, Result};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Non-streaming client for an Ollama-style `generate` endpoint.
pub struct InferenceClient {
    client: Client,
    url: String,
    model: String,
}

impl InferenceClient {
    pub fn new(client: Client, url: String, model: String) -> Self {
        Self { client, url, model }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        debug!("Requesting completion from {} ({})", self.url, self.model);

        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .context("Failed to reach the inference service")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Inference service returned HTTP {}", status);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Inference response had no `response` field")?;

        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn complete_posts_the_prompt_and_returns_the_response_field() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::Json(serde_json::json!({
                "model": "gemma3:1b",
                "prompt": "What is Rust?",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"gemma3:1b","response":"A systems language.","done":true}"#)
            .create_async()
            .await;

        let client = InferenceClient::new(
            Client::new(),
            format!("{}/api/generate", server.url()),
            "gemma3:1b".to_string(),
        );

        let completion = client.complete("What is Rust?").await.unwrap();

        assert_eq!(completion, "A systems language.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn complete_fails_on_http_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(500)
            .create_async()
            .await;

        let client = InferenceClient::new(
            Client::new(),
            format!("{}/api/generate", server.url()),
            "gemma3:1b".to_string(),
        );

        assert!(client.complete("hi").await.is_err());
    }
}
