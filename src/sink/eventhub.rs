use crate::config::types::SinkConfig;
use crate::normalize::NormalizedEvent;
use crate::sink::{DeliveryAck, DeliveryError, Sender};
use async_trait::async_trait;
use serde::Serialize;

/// HTTP sender for an Event Hubs-compatible sink.
///
/// Posts each batch to the `/{hub}/messages` endpoint with one message unit
/// per event. Authentication uses a pre-issued SAS token supplied through
/// config; token issuance and renewal live outside this process.
#[derive(Debug)]
pub struct EventHubSender {
    client: reqwest::Client,
    endpoint: String,
    sas_token: String,
}

/// One message unit in the batched send body.
#[derive(Serialize)]
struct MessageUnit {
    #[serde(rename = "Body")]
    body: String,
}

impl EventHubSender {
    pub fn new(config: &SinkConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let endpoint = format!(
            "https://{}/{}/messages",
            config.namespace.trim_end_matches('/'),
            config.hub
        );

        Ok(Self {
            client,
            endpoint,
            sas_token: config.sas_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Sender for EventHubSender {
    async fn deliver(&self, batch: Vec<NormalizedEvent>) -> Result<DeliveryAck, DeliveryError> {
        let messages = batch
            .iter()
            .map(|event| {
                Ok(MessageUnit {
                    body: serde_json::to_string(event)?,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.sas_token)
            .header("Content-Type", "application/vnd.microsoft.servicebus.json")
            .body(serde_json::to_string(&messages)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::Rejected {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(DeliveryAck {
            accepted: messages.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> SinkConfig {
        SinkConfig {
            namespace: "mynamespace.servicebus.windows.net".to_string(),
            hub: "nw-flowlogs".to_string(),
            sas_token: "SharedAccessSignature sr=...".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_endpoint_construction() {
        let sender = EventHubSender::new(&test_config()).unwrap();
        assert_eq!(
            sender.endpoint(),
            "https://mynamespace.servicebus.windows.net/nw-flowlogs/messages"
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let mut config = test_config();
        config.namespace = "mynamespace.servicebus.windows.net/".to_string();
        let sender = EventHubSender::new(&config).unwrap();
        assert_eq!(
            sender.endpoint(),
            "https://mynamespace.servicebus.windows.net/nw-flowlogs/messages"
        );
    }
}
