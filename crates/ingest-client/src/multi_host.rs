//! Ordered host failover.
//!
//! The pipeline API is reachable on several equivalent base URLs (e.g.
//! `localhost` and `127.0.0.1`). A request walks the list once, in order:
//! the first 2xx response wins; if nothing succeeds but some host answered,
//! the first non-success response is returned so the caller can inspect the
//! status; only when every host failed at the connection level does the call
//! surface an aggregate [`ApiError::Unavailable`]. No retries happen here —
//! retry cadence belongs to the caller (the session poll loop in practice).

use crate::error::ApiError;
use reqwest::{Client, Method, Response};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MultiHostClient {
    client: Client,
    hosts: Vec<String>,
}

impl MultiHostClient {
    /// Build a client over an ordered list of base hosts. Trailing slashes
    /// are trimmed so paths can always start with `/`.
    pub fn new<S: Into<String>>(hosts: impl IntoIterator<Item = S>) -> Self {
        Self::with_client(Client::new(), hosts)
    }

    pub fn with_client<S: Into<String>>(
        client: Client,
        hosts: impl IntoIterator<Item = S>,
    ) -> Self {
        let hosts = hosts
            .into_iter()
            .map(|h| h.into().trim_end_matches('/').to_string())
            .collect();
        Self { client, hosts }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// One ordered pass over the host list.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        if self.hosts.is_empty() {
            return Err(ApiError::NoHosts);
        }

        let mut first_non_success: Option<Response> = None;
        let mut last_connect_err: Option<reqwest::Error> = None;

        for host in &self.hosts {
            let url = format!("{host}{path}");
            let mut req = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(%url, status = %resp.status(), "API host answered");
                    return Ok(resp);
                }
                Ok(resp) => {
                    debug!(%url, status = %resp.status(), "API host returned non-success");
                    if first_non_success.is_none() {
                        first_non_success = Some(resp);
                    }
                }
                Err(e) => {
                    debug!(%url, error = %e, "API host unreachable");
                    last_connect_err = Some(e);
                }
            }
        }

        if let Some(resp) = first_non_success {
            return Ok(resp);
        }

        // Every host failed at the connection level; hosts is non-empty so a
        // connect error was recorded.
        let source = last_connect_err.ok_or(ApiError::NoHosts)?;
        Err(ApiError::Unavailable {
            attempts: self.hosts.len(),
            source,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.request::<()>(Method::GET, path, None).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }
}
