pub mod consumer;
pub mod error;
pub mod parser;
pub mod publisher;
pub mod sqs;

pub use consumer::{QueueConsumer, QueueHealth, QueueMessage};
pub use error::QueueError;
pub use parser::parse_event;
pub use publisher::EventPublisher;
pub use sqs::SqsQueue;
