//! Ingestion Coordinator and Source Collectors (§4.6, §4.7).

pub mod collectors;
pub mod coordinator;

pub use collectors::{
    verify_webhook_signature, AdminUploadCollector, SlackCollector, TelegramCollector, TelegramTransport,
    WebhookCollector, WhatsappCollector,
};
pub use coordinator::{IngestionConfig, IngestionCoordinator, RawItem};
