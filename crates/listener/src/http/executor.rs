use crate::config::Credentials;
use crate::error::{ListenerError, Result};
use log::{debug, error, info};
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }
}

/// Buffered response of a call that the executor classified as successful.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// 202: the backend took the change but has not applied it yet.
    pub fn is_accepted(&self) -> bool {
        self.status == StatusCode::ACCEPTED
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Issues authenticated calls against the cluster management API.
///
/// Cluster endpoints usually carry self-signed certificates, so certificate
/// verification is disabled. Only 200 and 202 count as success; anything else
/// comes back as [`ListenerError::Request`] with the status and body. Nothing
/// is retried here.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    credentials: Credentials,
}

impl RequestExecutor {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        info!("Processing http request: {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(header::CONTENT_TYPE, "application/json")
            .basic_auth(&self.credentials.username, Some(&self.credentials.password));
        if let Some(body) = request.body {
            debug!("Request data: {body}");
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Request {} {} failed: {}", request.method, request.url, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            error!(
                "Request {} {} failed with HTTP status {}: {}",
                request.method, request.url, status, body
            );
            return Err(ListenerError::Request {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Request {} {} successful with HTTP status {}",
            request.method, request.url, status
        );
        Ok(ApiResponse { status, body })
    }
}
