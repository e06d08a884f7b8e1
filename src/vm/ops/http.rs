//! Outbound HTTP with bounded retries
//!
//! Webhook and append calls are not idempotent, so a request is retried only
//! when the server cannot have acted on it: connection failures and
//! `429`/`503` responses. A timeout may fire after the server accepted the
//! request and is never retried. Other statuses, `500` included, are returned
//! to the caller on the first attempt.

use log::{debug, warn};
use reqwest::{RequestBuilder, StatusCode};

use crate::vm::services::Services;

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Send the request built by `build`, retrying per the runtime config
pub(crate) async fn send_with_retry<F>(
    services: &Services,
    build: F,
) -> Result<StatusCode, reqwest::Error>
where
    F: Fn() -> RequestBuilder,
{
    let retries = services.config.http_retries;
    let mut attempt = 0;

    loop {
        let outcome = build().send().await;
        let retryable = match &outcome {
            Ok(response) => is_retryable_status(response.status()),
            Err(err) => err.is_connect(),
        };

        if !retryable || attempt >= retries {
            return outcome.map(|response| response.status());
        }

        attempt += 1;
        let backoff = services.config.retry_backoff(attempt);
        match &outcome {
            Ok(response) => warn!(
                "HTTP {} from {}, retry {} of {} in {:?}",
                response.status(),
                response.url(),
                attempt,
                retries,
                backoff
            ),
            Err(err) => warn!("HTTP request failed: {}, retry {} of {} in {:?}", err, attempt, retries, backoff),
        }
        tokio::time::sleep(backoff).await;
        debug!("retrying request, attempt {}", attempt + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::vm::test_services;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_retries_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let services = test_services();
        let url = format!("{}/busy", server.uri());
        let status = send_with_retry(&services, || services.http.post(&url))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_server_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let services = test_services();
        let url = format!("{}/broken", server.uri());
        let status = send_with_retry(&services, || services.http.post(&url))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_timeout_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
            .expect(1)
            .mount(&server)
            .await;

        let services = Services::new(RuntimeConfig {
            http_timeout_secs: 1,
            retry_backoff_ms: 1,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let url = format!("{}/slow", server.uri());
        let err = send_with_retry(&services, || services.http.post(&url))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
