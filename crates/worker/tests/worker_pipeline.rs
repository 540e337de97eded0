//! Worker pipeline tests: scripted queue batches against a tempdir-backed
//! blob store and a mock partner endpoint.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use httpmock::{Method::POST, MockServer};
use tokio::sync::Mutex;

use relay_core::config::PartnerConfig;
use relay_core::event::{new_invoice_id, InvoiceEvent, InvoiceStatus, StatusRecord};
use relay_queue::{QueueConsumer, QueueError, QueueHealth, QueueMessage};
use relay_secrets::{EnvOverrideSource, SecretResolver};
use relay_storage::{blob_key, BlobStore, LocalBackend, StatusStore, StorageBackend};
use relay_worker::{runner, InvoiceProcessor, PartnerClient};

// ── Fixtures ────────────────────────────────────────────────────────

/// Queue fake: yields scripted batches in order, then hangs like an idle
/// long-poll. Tests observe the recorded acks and nacks instead of waiting
/// for the loop to exit.
struct ScriptedConsumer {
    batches: Mutex<VecDeque<Vec<QueueMessage>>>,
    acked: Mutex<Vec<String>>,
    nacked: Mutex<Vec<String>>,
}

impl ScriptedConsumer {
    fn new(batches: Vec<Vec<QueueMessage>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            acked: Mutex::new(Vec::new()),
            nacked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl QueueConsumer for ScriptedConsumer {
    async fn poll_batch(&self, _max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        if let Some(batch) = self.batches.lock().await.pop_front() {
            return Ok(batch);
        }
        std::future::pending().await
    }

    async fn ack(&self, receipt: &str) -> Result<(), QueueError> {
        self.acked.lock().await.push(receipt.to_string());
        Ok(())
    }

    async fn nack(&self, receipt: &str) -> Result<(), QueueError> {
        self.nacked.lock().await.push(receipt.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: None,
            provider: "scripted".to_string(),
        })
    }
}

/// Queue fake whose polls always fail.
struct DeadQueue;

#[async_trait]
impl QueueConsumer for DeadQueue {
    async fn poll_batch(&self, _max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        Err(QueueError::Connection("connection refused".to_string()))
    }

    async fn ack(&self, _receipt: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn nack(&self, _receipt: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        Err(QueueError::Connection("connection refused".to_string()))
    }
}

fn stores(tmp: &tempfile::TempDir) -> (Arc<BlobStore>, StatusStore) {
    let backend = StorageBackend::Local(LocalBackend::new(tmp.path()).unwrap());
    let blobs = Arc::new(BlobStore::new(backend, "invoices"));
    let status = StatusStore::new(blobs.clone());
    (blobs, status)
}

fn processor(blobs: Arc<BlobStore>, status: StatusStore, endpoint: String) -> InvoiceProcessor {
    let secrets = SecretResolver::new(vec![Box::new(EnvOverrideSource::new(Some(
        "test-token".to_string(),
    )))]);
    let partner = PartnerClient::from_config(&PartnerConfig {
        endpoint,
        token_override: None,
        token_secret_name: "partner-api-token".to_string(),
        delivery_timeout_secs: 5,
    })
    .unwrap();
    InvoiceProcessor::new(blobs, status, secrets, partner, "partner-api-token")
}

/// Store a document and build the event the gateway would have published.
async fn seeded_event(blobs: &BlobStore, content: &[u8]) -> InvoiceEvent {
    blobs.ensure_container().await.unwrap();
    let invoice_id = new_invoice_id();
    let key = blob_key(Utc::now(), &invoice_id, Some("doc.pdf"));
    blobs
        .put_new(&key, Bytes::copy_from_slice(content))
        .await
        .unwrap();
    InvoiceEvent::new(
        invoice_id,
        blobs.url_for(&key),
        Some("doc.pdf".to_string()),
        Some("application/pdf".to_string()),
    )
}

fn message(event: &InvoiceEvent) -> QueueMessage {
    QueueMessage {
        message_id: format!("msg-{}", event.invoice_id),
        body: serde_json::to_string(event).unwrap(),
        receipt: format!("rh-{}", event.invoice_id),
        sent_utc: Utc::now(),
        delivery_attempt: 1,
    }
}

async fn wait_for_acks(consumer: &ScriptedConsumer, count: usize) {
    wait_for(&consumer.acked, count, "ack").await;
}

async fn wait_for_nacks(consumer: &ScriptedConsumer, count: usize) {
    wait_for(&consumer.nacked, count, "nack").await;
}

async fn wait_for(record: &Mutex<Vec<String>>, count: usize, what: &str) {
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if record.lock().await.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    waited.unwrap_or_else(|_| panic!("timed out waiting for {count} {what}(s)"));
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn delivered_invoice_is_acked_and_marked() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .header("authorization", "Bearer test-token")
                .header("content-type", "application/pdf")
                .body("%PDF-1.7 invoice");
            then.status(200);
        })
        .await;

    let event = seeded_event(&blobs, b"%PDF-1.7 invoice").await;
    let consumer = Arc::new(ScriptedConsumer::new(vec![vec![message(&event)]]));
    let worker = tokio::spawn(runner::run(
        consumer.clone(),
        processor(blobs, status.clone(), server.base_url()),
        10,
    ));

    wait_for_acks(&consumer, 1).await;
    worker.abort();

    mock.assert();
    assert!(consumer.nacked.lock().await.is_empty());

    let record = status.read(&event.invoice_id).await.unwrap().unwrap();
    assert_eq!(record.status, InvoiceStatus::Delivered);
    assert_eq!(record.correlation_id, event.correlation_id);
}

#[tokio::test]
async fn partner_rejection_is_terminal_with_marker() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(404).body("unknown supplier");
        })
        .await;

    let event = seeded_event(&blobs, b"%PDF-1.7 invoice").await;
    let consumer = Arc::new(ScriptedConsumer::new(vec![vec![message(&event)]]));
    let worker = tokio::spawn(runner::run(
        consumer.clone(),
        processor(blobs, status.clone(), server.base_url()),
        10,
    ));

    // Rejections are acked: redelivery cannot make the partner accept.
    wait_for_acks(&consumer, 1).await;
    worker.abort();

    assert_eq!(mock.hits(), 1);
    assert!(consumer.nacked.lock().await.is_empty());

    let record = status.read(&event.invoice_id).await.unwrap().unwrap();
    assert_eq!(record.status, InvoiceStatus::Rejected);
    let detail = record.detail.unwrap();
    assert!(detail.contains("404"), "detail was: {detail}");
    assert!(detail.contains("unknown supplier"), "detail was: {detail}");
}

#[tokio::test]
async fn partner_outage_returns_message_to_queue() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500);
        })
        .await;

    let event = seeded_event(&blobs, b"%PDF-1.7 invoice").await;
    let consumer = Arc::new(ScriptedConsumer::new(vec![vec![message(&event)]]));
    let worker = tokio::spawn(runner::run(
        consumer.clone(),
        processor(blobs, status.clone(), server.base_url()),
        10,
    ));

    wait_for_nacks(&consumer, 1).await;
    worker.abort();

    assert!(consumer.acked.lock().await.is_empty());
    // No verdict yet, so redelivery will try the partner again.
    assert!(status.read(&event.invoice_id).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_blob_is_retried_later() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let event = InvoiceEvent::new(
        new_invoice_id(),
        blobs.url_for("2024/03/05/missing.pdf"),
        Some("missing.pdf".to_string()),
        Some("application/pdf".to_string()),
    );
    let consumer = Arc::new(ScriptedConsumer::new(vec![vec![message(&event)]]));
    let worker = tokio::spawn(runner::run(
        consumer.clone(),
        processor(blobs, status, server.base_url()),
        10,
    ));

    wait_for_nacks(&consumer, 1).await;
    worker.abort();

    // The partner must never see an invoice we could not download.
    assert_eq!(mock.hits(), 0);
    assert!(consumer.acked.lock().await.is_empty());
}

#[tokio::test]
async fn poison_message_is_dropped() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let poison = QueueMessage {
        message_id: "msg-poison".to_string(),
        body: "not an invoice event".to_string(),
        receipt: "rh-poison".to_string(),
        sent_utc: Utc::now(),
        delivery_attempt: 3,
    };
    let consumer = Arc::new(ScriptedConsumer::new(vec![vec![poison]]));
    let worker = tokio::spawn(runner::run(
        consumer.clone(),
        processor(blobs, status, server.base_url()),
        10,
    ));

    // Unparseable bodies can never succeed; they are acked so the queue
    // stops redelivering them.
    wait_for_acks(&consumer, 1).await;
    worker.abort();

    assert_eq!(mock.hits(), 0);
    assert!(consumer.nacked.lock().await.is_empty());
}

#[tokio::test]
async fn redelivered_invoice_is_not_sent_twice() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let event = seeded_event(&blobs, b"%PDF-1.7 invoice").await;
    // The broker redelivers the same event in a later batch.
    let consumer = Arc::new(ScriptedConsumer::new(vec![
        vec![message(&event)],
        vec![message(&event)],
    ]));
    let worker = tokio::spawn(runner::run(
        consumer.clone(),
        processor(blobs, status.clone(), server.base_url()),
        10,
    ));

    wait_for_acks(&consumer, 2).await;
    worker.abort();

    assert_eq!(mock.hits(), 1);
    let record = status.read(&event.invoice_id).await.unwrap().unwrap();
    assert_eq!(record.status, InvoiceStatus::Delivered);
}

#[tokio::test]
async fn delivered_marker_from_an_earlier_run_short_circuits() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let event = seeded_event(&blobs, b"%PDF-1.7 invoice").await;
    status
        .write(&StatusRecord::new(&event, InvoiceStatus::Delivered, None))
        .await
        .unwrap();

    let consumer = Arc::new(ScriptedConsumer::new(vec![vec![message(&event)]]));
    let worker = tokio::spawn(runner::run(
        consumer.clone(),
        processor(blobs, status, server.base_url()),
        10,
    ));

    wait_for_acks(&consumer, 1).await;
    worker.abort();

    assert_eq!(mock.hits(), 0);
}

#[tokio::test(start_paused = true)]
async fn runner_stops_after_repeated_poll_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let (blobs, status) = stores(&tmp);
    let processor = processor(blobs, status, "http://127.0.0.1:1".to_string());

    let err = runner::run(Arc::new(DeadQueue), processor, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Connection(_)));
    assert!(err.to_string().contains("consecutive poll errors"));
}
