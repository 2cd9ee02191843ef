//! HTTP inference engine.
//!
//! Sends each normalized window to an external inference service and reads
//! back the model output. Request body: `{"model": "...", "input": [...]}`.
//! Response body: `{"output": [...]}`.

use super::InferenceEngine;
use crate::error::InferenceError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEngineConfig {
    /// Full URL of the inference endpoint
    pub url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Model identifier forwarded with each request
    pub model: String,
}

impl RemoteEngineConfig {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 30,
            model: model.into(),
        }
    }

    /// Health endpoint next to the inference URL.
    pub fn health_url(&self) -> String {
        match self.url.rfind('/') {
            Some(idx) if idx > "https://".len() => format!("{}/health", &self.url[..idx]),
            _ => format!("{}/health", self.url.trim_end_matches('/')),
        }
    }
}

#[derive(Debug, Serialize)]
struct InferRequest<'a> {
    model: &'a str,
    input: &'a [f32],
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    output: Vec<f32>,
}

/// Async client for the inference service.
pub struct RemoteEngineClient {
    config: RemoteEngineConfig,
    client: reqwest::Client,
}

impl RemoteEngineClient {
    pub fn new(config: RemoteEngineConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(InferenceError::engine)?;

        Ok(Self { config, client })
    }

    /// Test connection to the service.
    pub async fn test_connection(&self) -> Result<bool, InferenceError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(InferenceError::engine)?;

        Ok(response.status().is_success())
    }

    /// Run the remote model on one window.
    pub async fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&InferRequest {
                model: &self.config.model,
                input: window,
            })
            .send()
            .await
            .map_err(InferenceError::engine)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InferenceError::engine(format!(
                "inference service returned {status}: {message}"
            )));
        }

        let body: InferResponse = response.json().await.map_err(InferenceError::engine)?;
        Ok(body.output)
    }

    pub fn config(&self) -> &RemoteEngineConfig {
        &self.config
    }
}

/// Blocking wrapper for use from the synchronous pipeline.
pub struct BlockingRemoteEngine {
    inner: RemoteEngineClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingRemoteEngine {
    pub fn new(config: RemoteEngineConfig) -> Result<Self, InferenceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(InferenceError::engine)?;

        Ok(Self {
            inner: RemoteEngineClient::new(config)?,
            runtime,
        })
    }

    pub fn test_connection(&self) -> Result<bool, InferenceError> {
        self.runtime.block_on(self.inner.test_connection())
    }

    pub fn config(&self) -> &RemoteEngineConfig {
        self.inner.config()
    }
}

impl InferenceEngine for BlockingRemoteEngine {
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        self.runtime.block_on(self.inner.infer(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url() {
        let config = RemoteEngineConfig::new("http://127.0.0.1:8500/v1/infer", "STAND");
        assert_eq!(config.health_url(), "http://127.0.0.1:8500/v1/health");

        let bare = RemoteEngineConfig::new("http://127.0.0.1:8500/", "STAND");
        assert_eq!(bare.health_url(), "http://127.0.0.1:8500/health");
    }

    /// Answer one HTTP request with `status` and a JSON `body`, returning the
    /// request text.
    async fn respond_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/infer", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_infer_parses_output() {
        let (url, server) = respond_once("200 OK", r#"{"output":[0.25,-0.5,1.0]}"#).await;
        let client = RemoteEngineClient::new(RemoteEngineConfig::new(url, "SLEEP")).unwrap();

        let output = client.infer(&[0.1, 0.2, 0.3]).await.unwrap();
        assert_eq!(output, vec![0.25, -0.5, 1.0]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/infer"));
        assert!(request.contains(r#""model":"SLEEP""#));
        assert!(request.contains(r#""input":[0.1,0.2,0.3]"#));
    }

    #[tokio::test]
    async fn test_infer_reports_server_error() {
        let (url, server) =
            respond_once("500 Internal Server Error", r#"{"error":"model not loaded"}"#).await;
        let client = RemoteEngineClient::new(RemoteEngineConfig::new(url, "STAND")).unwrap();

        let err = client.infer(&[0.0; 4]).await.unwrap_err();
        assert!(matches!(err, InferenceError::Engine(_)));
        let msg = err.to_string();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("model not loaded"), "{msg}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_infer_rejects_malformed_body() {
        let (url, server) = respond_once("200 OK", r#"{"result":[1.0]}"#).await;
        let client = RemoteEngineClient::new(RemoteEngineConfig::new(url, "DB")).unwrap();

        let err = client.infer(&[0.0; 2]).await.unwrap_err();
        assert!(matches!(err, InferenceError::Engine(_)));
        server.await.unwrap();
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(InferRequest {
            model: "DB",
            input: &[0.5, -0.5],
        })
        .unwrap();
        assert_eq!(body["model"], "DB");
        assert_eq!(body["input"].as_array().unwrap().len(), 2);
    }
}
