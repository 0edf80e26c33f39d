//! Remote verification service boundary.
//!
//! The service owns protected-route state; this module exposes the three
//! calls the activation workflow drives and an HTTP gateway implementation.
//! Every call is required to be idempotent-safe on the service side, so a
//! caller may retry with identical arguments; no retries happen here.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Error;
use crate::types::TokenRecord;

/// The three operations the verification service exposes.
#[async_trait]
pub trait VerifierClient: Send + Sync {
    /// Registers `path` as a token-protected route of `service_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] on transport failure and
    /// [`Error::RemoteRejected`] when the service refuses the registration.
    async fn register_route(&self, service_id: &str, path: &str) -> Result<(), Error>;

    /// Associates `records` with the protected route at `path`.
    ///
    /// Re-submitting an already-accepted record is harmless on the service
    /// side.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] on transport failure and
    /// [`Error::RemoteRejected`] when the service refuses any record.
    async fn submit_tokens(
        &self,
        service_id: &str,
        path: &str,
        records: &[TokenRecord],
    ) -> Result<(), Error>;

    /// Drops any cached verification state held for `service_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] on transport failure and
    /// [`Error::RemoteRejected`] when the service refuses the invalidation.
    async fn invalidate_cache(&self, service_id: &str) -> Result<(), Error>;
}

const ROUTES_ENDPOINT: &str = "/api/v1/routes";
const TOKENS_ENDPOINT: &str = "/api/v1/tokens";
const CACHE_ENDPOINT: &str = "/api/v1/cache-invalidations";

/// HTTP gateway implementation of [`VerifierClient`].
#[derive(Debug)]
pub struct HttpVerifierClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpVerifierClient {
    /// Creates a client against the gateway at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Posts `body` as JSON and interprets the response status.
    async fn post<T>(&self, endpoint: &str, body: &T) -> Result<(), Error>
    where
        T: Serialize + Send + Sync,
    {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("tagkit-core/{}", env!("CARGO_PKG_VERSION")),
            )
            .json(body)
            .send()
            .await
            .map_err(|err| Error::RemoteUnavailable {
                url: url.clone(),
                error: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(Error::RemoteRejected {
                url,
                status: status.as_u16(),
                error,
            });
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct RegisterRouteBody<'a> {
    service_id: &'a str,
    path: &'a str,
}

#[derive(Serialize)]
struct SubmitTokensBody<'a> {
    service_id: &'a str,
    path: &'a str,
    records: &'a [TokenRecord],
}

#[derive(Serialize)]
struct InvalidateCacheBody<'a> {
    service_id: &'a str,
}

#[async_trait]
impl VerifierClient for HttpVerifierClient {
    async fn register_route(&self, service_id: &str, path: &str) -> Result<(), Error> {
        self.post(ROUTES_ENDPOINT, &RegisterRouteBody { service_id, path })
            .await
    }

    async fn submit_tokens(
        &self,
        service_id: &str,
        path: &str,
        records: &[TokenRecord],
    ) -> Result<(), Error> {
        self.post(
            TOKENS_ENDPOINT,
            &SubmitTokensBody {
                service_id,
                path,
                records,
            },
        )
        .await
    }

    async fn invalidate_cache(&self, service_id: &str) -> Result<(), Error> {
        self.post(CACHE_ENDPOINT, &InvalidateCacheBody { service_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::types::TokenCode;

    use super::*;

    fn sample_records() -> Vec<TokenRecord> {
        vec![
            TokenRecord {
                index: 1,
                code: TokenCode::new([0x11; 8]),
            },
            TokenRecord {
                index: 2,
                code: TokenCode::new([0x22; 8]),
            },
        ]
    }

    #[tokio::test]
    async fn register_route_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ROUTES_ENDPOINT)
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "service_id": "myapp",
                "path": "/secret",
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = HttpVerifierClient::new(&server.url());
        client.register_route("myapp", "/secret").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_tokens_posts_records_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKENS_ENDPOINT)
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "service_id": "myapp",
                "path": "/secret",
                "records": [
                    { "index": 1, "code": "1111111111111111" },
                    { "index": 2, "code": "2222222222222222" },
                ],
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = HttpVerifierClient::new(&server.url());
        client
            .submit_tokens("myapp", "/secret", &sample_records())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_reports_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CACHE_ENDPOINT)
            .with_status(422)
            .with_body("unknown service")
            .create_async()
            .await;

        let client = HttpVerifierClient::new(&server.url());
        let err = client.invalidate_cache("myapp").await.unwrap_err();
        match err {
            Error::RemoteRejected { status, error, .. } => {
                assert_eq!(status, 422);
                assert_eq!(error, "unknown service");
            }
            other => panic!("expected RemoteRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_gateway_is_remote_unavailable() {
        // Port 9 (discard) refuses connections on test hosts.
        let client = HttpVerifierClient::new("http://127.0.0.1:9");
        let err = client.register_route("myapp", "/secret").await.unwrap_err();
        assert!(matches!(err, Error::RemoteUnavailable { .. }));
    }
}
