// src/infrastructure/http/mod.rs
// Thin JSON client over hyper, shared by the HTTP-backed providers

use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::body::{self, Bytes};
use hyper::{header, Body, Client, Method, Request};
use hyper_tls::HttpsConnector;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::errors::HttpError;

// Yahoo rejects requests without a browser-like agent
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Error bodies are truncated to this many characters.
const MAX_ERROR_BODY: usize = 500;

#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    /// Deadline for one request, response body included.
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        let https = HttpsConnector::new();
        Self {
            client: Client::builder().build::<_, Body>(https),
            timeout,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())?;

        let bytes = self.execute(request).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET a page as text, for providers that only publish HTML.
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())?;

        let bytes = self.execute(request).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn post_json<B, T>(
        &self,
        url: &str,
        bearer: &str,
        payload: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
            .body(Body::from(body))?;

        let bytes = self.execute(request).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn execute(&self, request: Request<Body>) -> Result<Bytes, HttpError> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let bytes = body::to_bytes(response.into_body()).await?;
            Ok::<_, HttpError>((status, bytes))
        };
        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                HttpError::Request(format!(
                    "{} {} timed out after {:?}",
                    method,
                    uri.path(),
                    self.timeout
                ))
            })??;

        log::debug!("{} {} ({} bytes)", status, uri.path(), bytes.len());

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes)
                    .chars()
                    .take(MAX_ERROR_BODY)
                    .collect(),
            });
        }

        Ok(bytes)
    }
}

/// Append a query parameter to a URL that may or may not already carry a query.
pub fn with_query_param(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, key, value)
}
