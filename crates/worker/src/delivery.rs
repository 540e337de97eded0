//! Partner delivery client.
//!
//! Thin wrapper over `reqwest` that POSTs a document to the partner endpoint
//! and classifies the response: accepted, refused outright, or worth another
//! attempt after redelivery.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use relay_core::config::PartnerConfig;

use crate::error::ProcessError;

/// Content type sent when the upload did not declare one.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// How much of a rejection body is kept for the status marker.
const MAX_DETAIL_CHARS: usize = 200;

/// What became of a delivery attempt that reached a verdict.
///
/// Transient conditions (throttling, 5xx, transport failures) never produce a
/// verdict; they surface as [`ProcessError::Transient`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryVerdict {
    /// The partner accepted the document.
    Delivered { status: u16 },
    /// The partner refused the document and retrying cannot help.
    Rejected { status: u16, detail: String },
}

pub struct PartnerClient {
    client: reqwest::Client,
    endpoint: String,
}

impl PartnerClient {
    pub fn from_config(config: &PartnerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.delivery_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// POST the raw document bytes to the partner with a bearer token.
    ///
    /// Status mapping:
    /// - 2xx is a delivery;
    /// - 408 and 429 are throttling, transient;
    /// - any other 4xx is a rejection the queue must not retry;
    /// - 5xx and transport errors are transient.
    pub async fn deliver(
        &self,
        document: Bytes,
        content_type: Option<&str>,
        token: &str,
    ) -> Result<DeliveryVerdict, ProcessError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type.unwrap_or(FALLBACK_CONTENT_TYPE))
            .body(document)
            .send()
            .await
            .map_err(|e| ProcessError::Transient(format!("partner unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(DeliveryVerdict::Delivered {
                status: status.as_u16(),
            });
        }
        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProcessError::Transient(format!(
                "partner throttled with {status}"
            )));
        }
        if status.is_client_error() {
            let detail = rejection_detail(response).await;
            return Ok(DeliveryVerdict::Rejected {
                status: status.as_u16(),
                detail,
            });
        }
        Err(ProcessError::Transient(format!("partner returned {status}")))
    }
}

async fn rejection_detail(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => body.trim().chars().take(MAX_DETAIL_CHARS).collect(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn partner(endpoint: String) -> PartnerClient {
        PartnerClient::from_config(&PartnerConfig {
            endpoint,
            token_override: None,
            token_secret_name: "partner-api-token".to_string(),
            delivery_timeout_secs: 5,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn delivery_sends_bearer_token_and_content_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/invoices")
                    .header("authorization", "Bearer secret-token")
                    .header("content-type", "application/pdf")
                    .body("%PDF-1.7");
                then.status(200);
            })
            .await;

        let partner = partner(format!("{}/invoices", server.base_url()));
        let verdict = partner
            .deliver(
                Bytes::from_static(b"%PDF-1.7"),
                Some("application/pdf"),
                "secret-token",
            )
            .await
            .unwrap();

        mock.assert();
        assert_eq!(verdict, DeliveryVerdict::Delivered { status: 200 });
    }

    #[tokio::test]
    async fn missing_content_type_falls_back_to_octet_stream() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .header("content-type", "application/octet-stream");
                then.status(202);
            })
            .await;

        let partner = partner(server.base_url());
        let verdict = partner
            .deliver(Bytes::from_static(b"data"), None, "secret-token")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(verdict, DeliveryVerdict::Delivered { status: 202 });
    }

    #[tokio::test]
    async fn client_errors_are_rejections() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(422).body("invalid tax id");
            })
            .await;

        let partner = partner(server.base_url());
        let verdict = partner
            .deliver(Bytes::from_static(b"data"), None, "secret-token")
            .await
            .unwrap();

        match verdict {
            DeliveryVerdict::Rejected { status, detail } => {
                assert_eq!(status, 422);
                assert_eq!(detail, "invalid tax id");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn throttling_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429);
            })
            .await;

        let partner = partner(server.base_url());
        let err = partner
            .deliver(Bytes::from_static(b"data"), None, "secret-token")
            .await
            .unwrap_err();
        assert!(!err.is_terminal());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503);
            })
            .await;

        let partner = partner(server.base_url());
        let err = partner
            .deliver(Bytes::from_static(b"data"), None, "secret-token")
            .await
            .unwrap_err();
        assert!(!err.is_terminal());
    }

    #[tokio::test]
    async fn unreachable_partner_is_transient() {
        let partner = partner("http://127.0.0.1:1/invoices".to_string());
        let err = partner
            .deliver(Bytes::from_static(b"data"), None, "secret-token")
            .await
            .unwrap_err();
        assert!(!err.is_terminal());
        assert!(err.to_string().contains("unreachable"));
    }
}
