use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use super::{ build_http, ChatClient, CompletionResponse };
use crate::error::{ ConfigError, ExternalServiceError };
use crate::llm::{ LlmConfig, LlmType };

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        timeout: std::time::Duration
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_http(timeout, HeaderMap::new())?,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
            completion_model: completion_model.unwrap_or_else(|| "llama3".to_string()),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        if config.llm_type != LlmType::Ollama {
            return Err(ConfigError::Invalid("Invalid config type for OllamaClient".into()));
        }

        Self::new(config.base_url.clone(), config.completion_model.clone(), config.timeout)
    }

    pub async fn generate(
        &self,
        system: &str,
        prompt: &str
    ) -> Result<GenerateResponse, ExternalServiceError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let req = GenerateRequest {
            model: &self.completion_model,
            system,
            prompt,
            stream: false,
        };
        let resp = self.http.post(&url).json(&req).send().await?.error_for_status()?;
        let data = resp.json::<GenerateResponse>().await?;
        Ok(data)
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(
        &self,
        system: &str,
        prompt: &str
    ) -> Result<CompletionResponse, ExternalServiceError> {
        let gen_resp = self.generate(system, prompt).await?;
        if gen_resp.response.is_empty() {
            return Err(ExternalServiceError::EmptyResponse("Ollama"));
        }
        Ok(CompletionResponse { response: gen_resp.response })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejects_foreign_config() {
        let config = LlmConfig { llm_type: LlmType::OpenAI, ..Default::default() };
        assert!(OllamaClient::from_config(&config).is_err());
    }

    #[test]
    fn generate_request_is_non_streaming_with_system() {
        let req = GenerateRequest { model: "llama3", system: "sys", prompt: "p", stream: false };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["system"], "sys");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_external_service_error() {
        let client = OllamaClient::new(
            Some("http://127.0.0.1:9".into()),
            None,
            Duration::from_secs(1)
        ).unwrap();
        assert!(client.complete("sys", "hello?").await.is_err());
    }
}
