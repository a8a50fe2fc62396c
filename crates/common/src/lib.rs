//! Smokefleet Common Library
//!
//! Shared vocabulary for the smokefleet harness: service and check
//! definitions, captured session snapshots, credentials and configuration.

pub mod config;
pub mod credentials;
pub mod error;
pub mod service;
pub mod session;

// Re-export commonly used types
pub use config::{HarnessConfig, ServiceOverride};
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use service::{
    Check, FieldValue, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step,
    SuccessCondition, TitleMatch, USERNAME_PLACEHOLDER,
};
pub use session::{SnapshotStore, StorageSnapshot};

/// Smokefleet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
