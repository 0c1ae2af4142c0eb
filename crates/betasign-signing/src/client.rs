// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the signing authority.
//!
//! Provides [`SigningClient`] which submits [`SigningRequest`]s through the
//! shared concurrency limiter, retries transient failures, and classifies
//! the authority's text answer.

use std::time::Duration;

use betasign_config::model::{NetworkConfig, SigningConfig};
use betasign_core::{BetasignError, BuildIdentity, SigningStatus};
use betasign_resilience::{ConcurrencyLimiter, RetryPolicy};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use crate::request::SigningRequest;

const SUCCESS_TOKEN: &str = "MESSAGE=SUCCESS";
const STATUS_TOKEN: &str = "STATUS=";

/// Submits signing requests to the authority.
///
/// Every attempt holds one limiter slot for its whole duration.
#[derive(Debug, Clone)]
pub struct SigningClient {
    client: reqwest::Client,
    endpoint: Url,
    limiter: ConcurrencyLimiter,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl SigningClient {
    /// Creates a client for the configured authority endpoint.
    pub fn new(
        config: &SigningConfig,
        network: &NetworkConfig,
        limiter: ConcurrencyLimiter,
    ) -> Result<Self, BetasignError> {
        let mut endpoint = Url::parse(&config.endpoint).map_err(|e| {
            BetasignError::Config(format!("invalid signing endpoint `{}`: {e}", config.endpoint))
        })?;
        endpoint.query_pairs_mut().append_pair("action", "2");

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=\"utf-8\""),
        );

        let request_timeout = Duration::from_secs(network.request_timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
            .build()
            .map_err(|e| BetasignError::Network {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint,
            limiter,
            retry: RetryPolicy::new(config.max_attempts)
                .with_delay(Duration::from_millis(network.retry_delay_ms)),
            request_timeout,
        })
    }

    /// Endpoint requests are posted to, including the `action` query.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Ask the authority whether `identity` is being signed.
    ///
    /// Never fails: anything short of a well-formed answer is
    /// [`SigningStatus::Unknown`].
    pub async fn check(&self, identity: &BuildIdentity) -> SigningStatus {
        let request = SigningRequest::new(identity);
        let body = match request.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "could not encode signing request");
                return SigningStatus::Unknown;
            }
        };

        match self.submit(body).await {
            Ok(text) => {
                let status = classify_response(&text);
                debug!(
                    chip_id = identity.chip_id,
                    board_id = identity.board_id,
                    %status,
                    "signing authority answered"
                );
                status
            }
            Err(e) => {
                warn!(
                    chip_id = identity.chip_id,
                    board_id = identity.board_id,
                    error = %e,
                    "signing check failed"
                );
                SigningStatus::Unknown
            }
        }
    }

    /// POST `body`, returning the response text of a successful answer.
    async fn submit(&self, body: Vec<u8>) -> Result<String, BetasignError> {
        self.retry
            .run("signing", |attempt| {
                let body = body.clone();
                async move {
                    let _permit = self.limiter.acquire().await?;
                    let response = self
                        .client
                        .post(self.endpoint.clone())
                        .body(body)
                        .send()
                        .await
                        .map_err(|e| self.request_error(e))?;

                    let status = response.status();
                    debug!(%status, attempt, "signing response received");
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        return Err(BetasignError::network(format!(
                            "signing authority returned HTTP {status}"
                        )));
                    }
                    if !status.is_success() {
                        return Err(BetasignError::malformed(format!(
                            "signing authority returned HTTP {status}"
                        )));
                    }

                    let bytes = response.bytes().await.map_err(|e| self.request_error(e))?;
                    String::from_utf8(bytes.to_vec()).map_err(|_| {
                        BetasignError::malformed("signing response is not valid UTF-8")
                    })
                }
            })
            .await
    }

    fn request_error(&self, e: reqwest::Error) -> BetasignError {
        if e.is_timeout() {
            BetasignError::Timeout {
                duration: self.request_timeout,
            }
        } else {
            BetasignError::Network {
                message: format!("signing request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}

/// Classify the text of a successful authority response.
///
/// `MESSAGE=SUCCESS` means a ticket was issued. Any other body carrying a
/// `STATUS=` field is a refusal. A body with neither is not an answer.
pub fn classify_response(body: &str) -> SigningStatus {
    if body.contains(SUCCESS_TOKEN) {
        SigningStatus::Signed
    } else if body.contains(STATUS_TOKEN) {
        SigningStatus::Unsigned
    } else {
        SigningStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betasign_core::RestoreBehavior;
    use plist::Value;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SIGNED_BODY: &str =
        "STATUS=0&MESSAGE=SUCCESS&REQUEST_STRING=<?xml version=\"1.0\"?><plist/>";
    const UNSIGNED_BODY: &str = "STATUS=94&MESSAGE=This device isn't eligible for the requested build.";

    fn client(server: &MockServer, max_attempts: u32, limiter: ConcurrencyLimiter) -> SigningClient {
        let config = SigningConfig {
            endpoint: format!("{}/TSS/controller", server.uri()),
            max_attempts,
            ..SigningConfig::default()
        };
        SigningClient::new(&config, &NetworkConfig::default(), limiter).unwrap()
    }

    fn identity(chip_id: u64) -> BuildIdentity {
        BuildIdentity {
            board_config: "d22ap".into(),
            restore_behavior: RestoreBehavior::Erase,
            chip_id,
            board_id: 0x06,
            unique_build_id: vec![0x5A; 20],
        }
    }

    async fn mount(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/TSS/controller"))
            .and(query_param("action", "2"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[test]
    fn classification() {
        assert_eq!(classify_response(SIGNED_BODY), SigningStatus::Signed);
        assert_eq!(classify_response(UNSIGNED_BODY), SigningStatus::Unsigned);
        assert_eq!(classify_response("<html>gateway</html>"), SigningStatus::Unknown);
        assert_eq!(classify_response(""), SigningStatus::Unknown);
    }

    #[tokio::test]
    async fn success_token_is_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/TSS/controller"))
            .and(query_param("action", "2"))
            .and(header("cache-control", "no-cache"))
            .and(header("content-type", "text/xml; charset=\"utf-8\""))
            .and(header("user-agent", "InetURL/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SIGNED_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let status = client(&server, 3, ConcurrencyLimiter::new(4))
            .check(&identity(0x8015))
            .await;
        assert_eq!(status, SigningStatus::Signed);
    }

    #[tokio::test]
    async fn refusal_is_unsigned() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200).set_body_string(UNSIGNED_BODY)).await;
        let status = client(&server, 3, ConcurrencyLimiter::new(4))
            .check(&identity(0x8015))
            .await;
        assert_eq!(status, SigningStatus::Unsigned);
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;
        let limiter = ConcurrencyLimiter::new(4);
        let status = client(&server, 3, limiter.clone())
            .check(&identity(0x8015))
            .await;
        assert_eq!(status, SigningStatus::Unknown);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn configured_retry_delay_spaces_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;
        let config = SigningConfig {
            endpoint: format!("{}/TSS/controller", server.uri()),
            max_attempts: 3,
            ..SigningConfig::default()
        };
        let network = NetworkConfig {
            retry_delay_ms: 100,
            ..NetworkConfig::default()
        };
        let c = SigningClient::new(&config, &network, ConcurrencyLimiter::new(1)).unwrap();

        let started = std::time::Instant::now();
        assert_eq!(c.check(&identity(0x8015)).await, SigningStatus::Unknown);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn retry_recovers_from_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount(&server, ResponseTemplate::new(200).set_body_string(SIGNED_BODY)).await;

        let status = client(&server, 2, ConcurrencyLimiter::new(4))
            .check(&identity(0x8015))
            .await;
        assert_eq!(status, SigningStatus::Signed);
    }

    #[tokio::test]
    async fn client_error_status_is_unknown_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("STATUS=1"))
            .expect(1)
            .mount(&server)
            .await;
        let status = client(&server, 3, ConcurrencyLimiter::new(4))
            .check(&identity(0x8015))
            .await;
        assert_eq!(status, SigningStatus::Unknown);
    }

    #[tokio::test]
    async fn unreachable_authority_is_unknown() {
        let server = MockServer::start().await;
        let c = client(&server, 2, ConcurrencyLimiter::new(4));
        drop(server);
        assert_eq!(c.check(&identity(0x8015)).await, SigningStatus::Unknown);
    }

    #[tokio::test]
    async fn non_utf8_body_is_unknown() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFE, 0x00])).await;
        let status = client(&server, 1, ConcurrencyLimiter::new(4))
            .check(&identity(0x8015))
            .await;
        assert_eq!(status, SigningStatus::Unknown);
    }

    #[tokio::test]
    async fn posted_body_is_binary_plist_with_ticket_fields() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200).set_body_string(SIGNED_BODY)).await;
        let c = client(&server, 1, ConcurrencyLimiter::new(4));
        c.check(&identity(0x8950)).await;
        c.check(&identity(0x8015)).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);

        let legacy = Value::from_reader(std::io::Cursor::new(requests[0].body.clone())).unwrap();
        let legacy = legacy.as_dictionary().unwrap();
        assert!(legacy.contains_key("@APTicket"));
        assert!(!legacy.contains_key("@ApImg4Ticket"));

        let modern = Value::from_reader(std::io::Cursor::new(requests[1].body.clone())).unwrap();
        let modern = modern.as_dictionary().unwrap();
        assert!(modern.contains_key("@ApImg4Ticket"));
        assert!(modern.contains_key("SepNonce"));
        assert!(!modern.contains_key("@APTicket"));
    }

    #[test]
    fn endpoint_carries_action_query() {
        let config = SigningConfig::default();
        let c = SigningClient::new(&config, &NetworkConfig::default(), ConcurrencyLimiter::new(1))
            .unwrap();
        assert_eq!(
            c.endpoint().as_str(),
            "https://gs.apple.com/TSS/controller?action=2"
        );
    }
}
