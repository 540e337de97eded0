//! AWS SQS transport, used for publishing by the gateway and polling by the
//! worker.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::BehaviorVersion;
use aws_sdk_sqs::types::{
    Message, MessageAttributeValue, MessageSystemAttributeName, QueueAttributeName,
};
use aws_sdk_sqs::Client;
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use relay_core::config::{AwsConfig, QueueConfig};
use relay_core::event::InvoiceEvent;

use crate::consumer::{QueueConsumer, QueueHealth, QueueMessage};
use crate::error::QueueError;
use crate::publisher::EventPublisher;

/// SQS long-poll wait. Twenty seconds is the SQS maximum and keeps the worker
/// from hammering an idle queue.
const LONG_POLL_SECS: i32 = 20;

/// SQS-backed queue, shared by the gateway (publish) and the worker (poll).
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    visibility_timeout_secs: i32,
    fifo: bool,
}

impl SqsQueue {
    /// Create a new SQS queue handle from project config.
    ///
    /// With static credentials in the config the client is built directly.
    /// Without them the default provider chain is used, so the process can
    /// run under an instance profile or an exported SSO session.
    pub async fn new(aws: &AwsConfig, queue: &QueueConfig) -> Result<Self, QueueError> {
        let region = aws_sdk_sqs::config::Region::new(aws.region.clone());
        let endpoint = aws
            .endpoint_url
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(normalize_endpoint);

        let client = if let (Some(key_id), Some(secret)) =
            (&aws.access_key_id, &aws.secret_access_key)
        {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "relay-queue-static",
            );
            let mut sqs_config = aws_sdk_sqs::Config::builder()
                .region(region)
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(creds);
            if let Some(ref url) = endpoint {
                sqs_config = sqs_config.endpoint_url(url);
            }
            Client::from_conf(sqs_config.build())
        } else {
            let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
            if let Some(ref url) = endpoint {
                loader = loader.endpoint_url(url);
            }
            let shared = loader.load().await;
            Client::new(&shared)
        };

        let fifo = queue.is_fifo();

        info!(
            queue_url = %queue.queue_url,
            region = %aws.region,
            fifo,
            "SQS queue initialized"
        );

        Ok(Self {
            client,
            queue_url: queue.queue_url.clone(),
            visibility_timeout_secs: queue.visibility_timeout_secs as i32,
            fifo,
        })
    }

    pub fn is_fifo(&self) -> bool {
        self.fifo
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

fn string_attribute(value: &str) -> Result<MessageAttributeValue, QueueError> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| QueueError::Publish(format!("invalid message attribute: {e}")))
}

/// Map one received SQS message onto the transport-neutral shape.
fn into_queue_message(msg: Message) -> Result<QueueMessage, QueueError> {
    let receipt = msg
        .receipt_handle()
        .ok_or_else(|| QueueError::Parse("missing receipt handle".into()))?
        .to_string();

    let system = |name: MessageSystemAttributeName| {
        msg.attributes().and_then(|attrs| attrs.get(&name)).cloned()
    };

    // SentTimestamp is epoch millis; fall back to now if SQS omits it.
    let sent_utc = system(MessageSystemAttributeName::SentTimestamp)
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    let delivery_attempt = system(MessageSystemAttributeName::ApproximateReceiveCount)
        .and_then(|c| c.parse::<u32>().ok())
        .unwrap_or(1);

    Ok(QueueMessage {
        message_id: msg.message_id().unwrap_or("unknown").to_string(),
        body: msg.body().unwrap_or("").to_string(),
        receipt,
        sent_utc,
        delivery_attempt,
    })
}

#[async_trait]
impl EventPublisher for SqsQueue {
    async fn publish(&self, event: &InvoiceEvent) -> Result<(), QueueError> {
        let body = serde_json::to_string(event)
            .map_err(|e| QueueError::Publish(format!("event encode failed: {e}")))?;

        let mut request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_attributes("invoiceId", string_attribute(&event.invoice_id)?)
            .message_attributes("correlationId", string_attribute(&event.correlation_id)?);

        // FIFO queues require a group id; deduplicating on the invoice id
        // keeps accidental double-publishes of the same upload out of the queue.
        if self.fifo {
            request = request
                .message_group_id(&event.invoice_id)
                .message_deduplication_id(&event.invoice_id);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| QueueError::Publish(format!("SQS send failed: {e:?}")))?;

        debug!(
            invoice_id = %event.invoice_id,
            message_id = ?resp.message_id(),
            "Published invoice event"
        );

        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for SqsQueue {
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        // SQS caps at 10 messages per request.
        let capped = max_messages.min(10) as i32;

        debug!(max_messages = capped, "Polling SQS");

        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(capped)
            .wait_time_seconds(LONG_POLL_SECS)
            .visibility_timeout(self.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS receive failed: {e:?}")))?;

        let received = resp.messages.unwrap_or_default();
        debug!(count = received.len(), "Received SQS messages");

        received.into_iter().map(into_queue_message).collect()
    }

    async fn ack(&self, receipt: &str) -> Result<(), QueueError> {
        debug!(receipt, "Acking SQS message");

        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| QueueError::Ack(format!("SQS delete failed: {e:?}")))?;

        Ok(())
    }

    async fn nack(&self, receipt: &str) -> Result<(), QueueError> {
        debug!(receipt, "Nacking SQS message (visibility=0)");

        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|e| QueueError::Provider(format!("SQS visibility change failed: {e:?}")))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS health check failed: {e:?}")))?;

        let count = resp
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse::<u64>().ok());

        Ok(QueueHealth {
            connected: true,
            approximate_message_count: count,
            provider: "sqs".to_string(),
        })
    }
}
