/// HTTP collaborator: request shapes and the reqwest-backed transport
use crate::error::{BirdfeedError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Account credentials sent with every request
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// One API call: method, path relative to the API root, form parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
            params: Vec::new(),
        }
    }

    pub fn post(path: &str) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `application/x-www-form-urlencoded` rendering of the parameters
    pub fn encoded_params(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Completion of an API call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    /// Only 200 counts as success
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch a request and wait for its completion
    ///
    /// `Err` means no status was received at all; any received status,
    /// including errors, comes back as `Ok`.
    async fn issue(&self, request: ApiRequest, credentials: &Credentials) -> Result<ApiResponse>;
}

/// Transport over `reqwest` with HTTP basic auth
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BirdfeedError::Http)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        format!("{}{}", self.base_url, request.path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(&self, request: ApiRequest, credentials: &Credentials) -> Result<ApiResponse> {
        let mut url = self.url_for(&request);
        let encoded = request.encoded_params();

        let builder = if request.method == Method::GET {
            if !encoded.is_empty() {
                url.push('?');
                url.push_str(&encoded);
            }
            self.client.get(&url)
        } else {
            self.client
                .request(request.method.clone(), &url)
                .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encoded)
        };

        debug!("{} {}", request.method, url);
        let response = builder
            .basic_auth(&credentials.user, Some(&credentials.secret))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_params() {
        let req = ApiRequest::post("/direct_messages/new.xml")
            .param("screen_name", "bob")
            .param("text", "hi there & bye");
        assert_eq!(req.encoded_params(), "screen_name=bob&text=hi%20there%20%26%20bye");
        assert_eq!(req.param_value("screen_name"), Some("bob"));
        assert_eq!(req.param_value("missing"), None);
    }

    #[test]
    fn test_only_200_is_success() {
        let ok = ApiResponse { status: StatusCode::OK, body: Bytes::new() };
        let created = ApiResponse { status: StatusCode::CREATED, body: Bytes::new() };
        assert!(ok.is_success());
        assert!(!created.is_success());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials { user: "me".into(), secret: "hunter2".into() };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
