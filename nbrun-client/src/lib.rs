//! nbrun HTTP Client
//!
//! A small, typed HTTP client for the remote processing service that executes
//! notebook jobs.
//!
//! The client implements [`ProcessingApi`], the seam the tracker is written
//! against, and classifies rate-limit responses as [`ClientError::Throttled`]
//! so callers can retry them.
//!
//! # Example
//!
//! ```no_run
//! use nbrun_client::{ProcessingApi, ProcessingClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nbrun_client::ClientError> {
//!     let client = ProcessingClient::new("http://localhost:8080");
//!
//!     let desc = client
//!         .describe_processing_job("papermill-report-2024-01-01-00-00-00")
//!         .await?;
//!
//!     println!("{:?}", desc.processing_job_status);
//!     Ok(())
//! }
//! ```

mod api;
pub mod error;
mod jobs;

// Re-export commonly used types
pub use api::ProcessingApi;
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// HTTP client for the processing service API
#[derive(Debug, Clone)]
pub struct ProcessingClient {
    /// Base URL of the service (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default, alias = "__type", alias = "Code")]
    code: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

impl ProcessingClient {
    /// Create a new processing service client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the service API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

/// Maps a failed response to a client error
///
/// HTTP 429 and any body whose error code names a throttling exception are
/// rate-limit signals.
fn classify_error(status: u16, body: String) -> ClientError {
    let parsed = serde_json::from_str::<ServiceErrorBody>(&body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.as_deref()).unwrap_or("");
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.clone());

    let code_name = code.rsplit('#').next().unwrap_or(code);
    if status == 429 || code_name == "ThrottlingException" || code_name == "Throttling" {
        return ClientError::Throttled(message);
    }

    if status == 404 || code_name == "ResourceNotFound" {
        return ClientError::NotFound(message);
    }

    ClientError::api_error(status, message)
}
