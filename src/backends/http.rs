//! Keyring-authorized JSON REST client shared by the HTTP collaborators.
//!
//! # Responsibilities
//! - Resolve the collaborator's credential and attach it as `Authorization`
//! - Enforce a per-request timeout
//! - Map HTTP statuses onto `BackendError`
//!
//! # Design Decisions
//! - No retries: one attempt per daemon request
//! - Credentials resolved per call, so cache evictions take effect at once

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::backends::error::{BackendError, BackendResult};
use crate::keyring::{KeyStore, SharedKey};

/// Where a client's credential comes from.
#[derive(Clone)]
pub enum Credential {
    /// Looked up by name on every request (served from cache after the first).
    Keyring {
        keyring: Arc<dyn KeyStore>,
        name: String,
    },
    /// Resolved once up front.
    Fixed(SharedKey),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Keyring { name, .. } => f.debug_tuple("Keyring").field(name).finish(),
            Credential::Fixed(key) => f.debug_tuple("Fixed").field(&key.kind()).finish(),
        }
    }
}

/// JSON REST client bound to one collaborator.
#[derive(Debug, Clone)]
pub struct RestClient {
    service: &'static str,
    base_url: Url,
    http: reqwest::Client,
    credential: Credential,
    timeout: Duration,
}

impl RestClient {
    pub fn new(
        service: &'static str,
        base_url: Url,
        credential: Credential,
        timeout: Duration,
    ) -> BackendResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl {
                service,
                url: base_url.to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("yosaid/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| BackendError::Transport { service, source })?;

        Ok(Self {
            service,
            base_url,
            http,
            credential,
            timeout,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| BackendError::InvalidUrl {
                service: self.service,
                url: self.base_url.to_string(),
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn authorization(&self) -> BackendResult<String> {
        let key = match &self.credential {
            Credential::Fixed(key) => key.clone(),
            Credential::Keyring { keyring, name } => {
                keyring
                    .get_key(name)
                    .await
                    .map_err(|e| BackendError::Credential {
                        service: self.service,
                        reason: e.to_string(),
                    })?
            }
        };
        Ok(key.prepare())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> BackendResult<Response> {
        let url = self.endpoint(segments)?;
        let auth = self.authorization().await?;

        tracing::debug!(service = self.service, method = %method, url = %url, "Backend request");

        let mut request = self
            .http
            .request(method, url.clone())
            .header(reqwest::header::AUTHORIZATION, auth);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        self.check_status(response, &url).await
    }

    fn transport_error(&self, source: reqwest::Error) -> BackendError {
        if source.is_timeout() {
            BackendError::Timeout {
                service: self.service,
                secs: self.timeout.as_secs(),
            }
        } else {
            BackendError::Transport {
                service: self.service,
                source,
            }
        }
    }

    async fn check_status(&self, response: Response, url: &Url) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        tracing::warn!(service = self.service, url = %url, status = status.as_u16(), "Backend request failed");
        match status.as_u16() {
            401 | 403 => Err(BackendError::Unauthorized {
                service: self.service,
                status: status.as_u16(),
            }),
            404 => Err(BackendError::NotFound {
                service: self.service,
                resource: url.path().to_string(),
            }),
            code => {
                let body = response.text().await.unwrap_or_default();
                Err(BackendError::Status {
                    service: self.service,
                    status: code,
                    body,
                })
            }
        }
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> BackendResult<T> {
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode {
            service: self.service,
            reason: e.to_string(),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> BackendResult<T> {
        let response = self.send::<()>(Method::GET, segments, None).await?;
        self.decode(response).await
    }

    pub async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, segments, Some(body)).await?;
        self.decode(response).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> BackendResult<()> {
        self.send(Method::PUT, segments, Some(body)).await?;
        Ok(())
    }

    pub async fn delete(&self, segments: &[&str]) -> BackendResult<()> {
        self.send::<()>(Method::DELETE, segments, None).await?;
        Ok(())
    }
}
