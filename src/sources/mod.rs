//! Upstream source clients and shared HTTP plumbing.
//!
//! Every client uses the shared pooled client, bounded retries with
//! backoff, limited body reads, and body excerpts in error messages. Base
//! URLs are overridable per API through environment variables so tests can
//! point clients at a local mock server.

pub mod clinvar;
pub mod hpo;
pub mod pubmed;
pub mod uniprot;

pub use clinvar::ClinVarClient;
pub use hpo::HpoClient;
pub use pubmed::PubMedClient;
pub use uniprot::UniProtClient;

use std::borrow::Cow;
use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::warn;

use crate::error::HarvestError;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Shared HTTP client with conservative timeouts.
pub(crate) fn http_client() -> Result<reqwest::Client, HarvestError> {
    static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("bioharvest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(HarvestError::HttpClientInit)?;

    Ok(HTTP_CLIENT.get_or_init(|| client).clone())
}

/// Resolve an API base URL, preferring the environment override.
pub(crate) fn env_base(default: &'static str, env_var: &str) -> Cow<'static, str> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Cow::Owned(value),
        _ => Cow::Borrowed(default),
    }
}

/// Join a base URL and a path without doubled slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Send a request with bounded retries on transient failures.
///
/// Retries request errors and 429/5xx responses with linear backoff. The
/// final failure is classified into the recoverable error taxonomy.
pub(crate) async fn retry_send<F, Fut>(
    api: &str,
    attempts: usize,
    build_request: F,
) -> Result<reqwest::Response, HarvestError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let attempts = attempts.max(1);
    let mut last_error: Option<HarvestError> = None;

    for attempt in 1..=attempts {
        match build_request().await {
            Ok(response) => {
                let status = response.status();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if !retryable || attempt == attempts {
                    return Ok(response);
                }
                warn!(api, %status, attempt, "transient upstream status, retrying");
            }
            Err(err) => {
                let classified = classify_request_error(api, &err);
                if attempt == attempts {
                    return Err(classified);
                }
                warn!(api, attempt, "request failed, retrying: {err}");
                last_error = Some(classified);
            }
        }
        tokio::time::sleep(RETRY_BASE_DELAY * attempt as u32).await;
    }

    Err(last_error.unwrap_or_else(|| HarvestError::Api {
        api: api.to_string(),
        message: "request retries exhausted".to_string(),
    }))
}

fn classify_request_error(api: &str, err: &reqwest::Error) -> HarvestError {
    if err.is_timeout() {
        HarvestError::Timeout {
            api: api.to_string(),
        }
    } else if err.is_connect() {
        HarvestError::Network {
            api: api.to_string(),
            message: err.to_string(),
        }
    } else {
        HarvestError::Api {
            api: api.to_string(),
            message: err.to_string(),
        }
    }
}

/// Check the response status and read a size-capped body, transparently
/// decoding gzip payloads some mirrors return regardless of headers.
pub(crate) async fn read_success_body(
    api: &str,
    response: reqwest::Response,
) -> Result<Vec<u8>, HarvestError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(|err| HarvestError::Api {
        api: api.to_string(),
        message: format!("Failed to read response body: {err}"),
    })?;

    if bytes.len() > MAX_BODY_BYTES {
        return Err(HarvestError::Api {
            api: api.to_string(),
            message: format!("Response body exceeds {MAX_BODY_BYTES} bytes"),
        });
    }

    let mut payload = bytes.to_vec();
    if payload.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(payload.as_slice());
        let mut decoded = Vec::new();
        decoder
            .read_to_end(&mut decoded)
            .map_err(|err| HarvestError::Api {
                api: api.to_string(),
                message: format!("Failed to decode gzip response: {err}"),
            })?;
        payload = decoded;
    }

    if !status.is_success() {
        let excerpt = body_excerpt(&payload);
        return Err(match status.as_u16() {
            429 => HarvestError::RateLimited {
                api: api.to_string(),
            },
            503 => HarvestError::ServiceUnavailable {
                api: api.to_string(),
            },
            _ => HarvestError::Api {
                api: api.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            },
        });
    }

    Ok(payload)
}

/// Short, whitespace-collapsed body excerpt for error messages.
pub(crate) fn body_excerpt(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() > 200 {
        let mut end = 200;
        while !collapsed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &collapsed[..end])
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn endpoint_joins_without_doubled_slashes() {
        assert_eq!(endpoint("https://x.test/", "/a/b"), "https://x.test/a/b");
        assert_eq!(endpoint("https://x.test", "a/b"), "https://x.test/a/b");
    }

    #[test]
    fn body_excerpt_collapses_and_truncates() {
        assert_eq!(body_excerpt(b"a  b\n\tc"), "a b c");
        let long = "x".repeat(400);
        let excerpt = body_excerpt(long.as_bytes());
        assert_eq!(excerpt.len(), 203);
        assert!(excerpt.ends_with("..."));
    }

    #[tokio::test]
    async fn retry_send_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = http_client().expect("client");
        let url = format!("{}/flaky", server.uri());
        let response = retry_send("test", 3, || client.get(&url).send())
            .await
            .expect("response");
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn read_success_body_classifies_rate_limits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = http_client().expect("client");
        let url = format!("{}/limited", server.uri());
        let response = retry_send("test", 1, || client.get(&url).send())
            .await
            .expect("response");
        let err = read_success_body("test", response)
            .await
            .expect_err("rate limited");
        assert_eq!(err.error_type(), "rate_limit");
    }

    #[tokio::test]
    async fn read_success_body_includes_excerpt_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = http_client().expect("client");
        let url = format!("{}/broken", server.uri());
        let response = retry_send("test", 1, || client.get(&url).send())
            .await
            .expect("response");
        let err = read_success_body("test", response)
            .await
            .expect_err("server error");
        assert!(err.to_string().contains("upstream exploded"));
    }
}
