use std::time::Duration;

use async_trait::async_trait;
use engine::{Notification, Notifier, NotifyError};
use reqwest::Client;

/// Hands notifications to an HTTP push gateway as JSON.
///
/// A 2xx answer means the gateway accepted the message. Delivery and
/// retries happen on the other side.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| NotifyError(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|err| NotifyError(format!("network error: {err}")))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(%status, "notification accepted");
            return Ok(());
        }
        Err(NotifyError(format!("push gateway answered {status}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use engine::Destination;
    use tokio::net::TcpListener;

    fn notification() -> Notification {
        Notification {
            title: "Trip".to_string(),
            body: "You owe 30 to carol!".to_string(),
            destination: Destination::Single("device-bob".to_string()),
        }
    }

    #[derive(Clone)]
    struct GatewayState {
        status: StatusCode,
        received: Arc<Mutex<Vec<Notification>>>,
    }

    async fn push(
        State(state): State<GatewayState>,
        Json(notification): Json<Notification>,
    ) -> StatusCode {
        state.received.lock().unwrap().push(notification);
        state.status
    }

    /// Push gateway answering every request with `status`.
    async fn gateway(status: StatusCode) -> (String, Arc<Mutex<Vec<Notification>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route("/push", post(push))
            .with_state(GatewayState {
                status,
                received: received.clone(),
            });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/push", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, router).await });
        (url, received)
    }

    #[tokio::test]
    async fn posts_notification_as_json() {
        let (url, received) = gateway(StatusCode::ACCEPTED).await;
        let notifier = WebhookNotifier::new(&url, Duration::from_secs(5)).unwrap();

        notifier.send(&notification()).await.unwrap();

        assert_eq!(*received.lock().unwrap(), vec![notification()]);
    }

    #[tokio::test]
    async fn rejected_notification_is_an_error() {
        let (url, received) = gateway(StatusCode::SERVICE_UNAVAILABLE).await;
        let notifier = WebhookNotifier::new(&url, Duration::from_secs(5)).unwrap();

        let err = notifier.send(&notification()).await.unwrap_err();
        assert!(err.0.contains("503"));
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/push", listener.local_addr().unwrap());
        drop(listener);
        let notifier = WebhookNotifier::new(&url, Duration::from_secs(5)).unwrap();

        let err = notifier.send(&notification()).await.unwrap_err();
        assert!(err.0.starts_with("network error"));
    }
}
