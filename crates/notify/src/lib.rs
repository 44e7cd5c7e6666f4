//! Notification gateway adapters.
//!
//! Implements the [`casework::NotificationGateway`] trait two ways:
//!
//! - [`WebhookNotifier`] posts each notice as JSON to an HTTP endpoint owned by
//!   the email/SMS delivery service. That service resolves recipients to
//!   addresses, renders templates, and retries on its own schedule.
//! - [`LogNotifier`] writes each notice to the `tracing` log. Used when no
//!   webhook is configured (local development).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, and status mapping
//! live here. The [`casework`] crate sees only
//! [`casework::NotificationGateway`].

use std::time::Duration;

use async_trait::async_trait;
use casework::{Notice, NotificationError, NotificationGateway};
use serde::Serialize;

/// Body posted to the delivery webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEnvelope<'a> {
    event: &'static str,
    notice: &'a Notice,
}

/// Delivers notices by POSTing them to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    /// Creates a notifier for `endpoint` with a per-request `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotifier {
    async fn send(&self, notice: &Notice) -> Result<(), NotificationError> {
        let envelope = WebhookEnvelope {
            event: "case.notice",
            notice,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| NotificationError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(notice_id = %notice.id, status = status.as_u16(), "Notice delivered");
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(NotificationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationGateway for LogNotifier {
    async fn send(&self, notice: &Notice) -> Result<(), NotificationError> {
        tracing::info!(
            notice_id = %notice.id,
            kind = ?notice.kind,
            recipient = %notice.recipient,
            case_id = %notice.case_id,
            confirmation_number = %notice.confirmation_number,
            "Notice (log delivery)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use casework::{
        Case, CaseId, CaseIntake, ConfirmationPrefix, IntakeChannel, NoticeId, NoticeKind,
        PatientDetails, PersonName, PhysicianId, Recipient, RegionName, Timestamp,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn notice() -> Notice {
        let name = PersonName::new("Ada", "Lovelace").unwrap();
        let created_on = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let case = Case::open(
            CaseId::new(1),
            ConfirmationPrefix::build(Some("MD"), created_on, &name).with_sequence(1),
            CaseIntake {
                patient: PatientDetails {
                    name,
                    email: None,
                    phone: None,
                    date_of_birth: None,
                    address: None,
                },
                region: RegionName::new("Maryland").unwrap(),
                symptoms: None,
                channel: IntakeChannel::Admin,
            },
            Timestamp::now(),
        );
        Notice {
            id: NoticeId::new_random(),
            kind: NoticeKind::CaseAssigned,
            recipient: Recipient::Physician(PhysicianId::new(7)),
            case_id: case.id,
            confirmation_number: case.confirmation_number,
            payload: serde_json::json!({}),
        }
    }

    /// Reads headers and a `Content-Length` body so the reply is never sent
    /// while the client is still writing.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut received = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            received.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&received);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    /// Serves one request with a canned HTTP response and returns its address.
    async fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/notices")
    }

    #[tokio::test]
    async fn test_success_status_is_delivered() {
        let url = one_shot_server(
            "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();
        notifier.send(&notice()).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_retryable_rejection() {
        let url = one_shot_server(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\n\
             Connection: close\r\n\r\nbusy",
        )
        .await;
        let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();
        let err = notifier.send(&notice()).await.unwrap_err();
        assert_eq!(
            err,
            NotificationError::Rejected {
                status: 503,
                message: "busy".into()
            }
        );
        assert!(err.retry_policy().is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier =
            WebhookNotifier::new(format!("http://{addr}/"), Duration::from_secs(2)).unwrap();
        let err = notifier.send(&notice()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        LogNotifier.send(&notice()).await.unwrap();
    }
}
