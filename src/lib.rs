// Medical Registry - Core Library
// Versioned create/update/soft-delete of medical items and services.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod i18n;
pub mod logging;
pub mod registry;
pub mod services;
pub mod signals;
pub mod store;
pub mod temporal;

// Re-export commonly used types
pub use config::Config;
pub use db::{get_events_for_entity, insert_event, setup_database, Event, SqlRecord, SqliteStore};
pub use entities::{
    Item, ItemData, MedicalRecord, PriceListDetail, RecordKind, Service, ServiceData,
};
pub use error::{MedicalError, MedicalResult, StoreError, StoreResult};
pub use i18n::{Catalog, Translator};
pub use logging::{init_logging, LogFormat};
pub use registry::{PriceListRegistry, Registry};
pub use services::{DeleteFailure, FailureDetail, RecordService, UserContext};
pub use signals::{Listener, Outcome, Phase, Signal, SignalBus};
pub use store::{PriceListDetailStore, RecordStore};
pub use temporal::Validity;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
