//! DAP report submission over Oblivious HTTP.
//!
//! This crate decides *what* to submit and *where*: it builds the task
//! descriptor and histogram measurement, resolves the OHTTP relay and the
//! gateway's HPKE key configuration, and hands the result to a
//! [`DapTransport`] under a deadline. Sharding, sealing and encapsulation
//! belong to the transport.
//!
//! # Key Types
//!
//! - [`ReportSender`] - Builds and submits one report
//! - [`KeyManager`] - Cached, deadline-bounded gateway key lookup
//! - [`GatewayKeys`] - Parsed `application/ohttp-keys` body
//! - [`DapTransport`] - Trait for the encrypted uploader

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod keys;
pub mod manager;
pub mod sender;
pub mod task;
pub mod transport;

pub use cache::KeyCache;
pub use config::DapConfig;
pub use error::{DapError, Result};
pub use fetcher::{HttpKeyFetcher, KeyFetcher, OHTTP_KEYS_MEDIA_TYPE, StaticKeyFetcher};
pub use keys::{GatewayKeys, Kem, KeyConfig, SymmetricSuite};
pub use manager::KeyManager;
pub use sender::ReportSender;
pub use task::{DapTask, MEASUREMENT_TYPE_VECU8, TIME_PRECISION_SECS, one_hot};
pub use transport::{DapTransport, OhttpRoute, RecordingTransport, Submission};
