//! Common utilities and shared types for photowall.
//!
//! This crate provides foundational components used across all photowall crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Cryptography**: Event password obfuscation and HMAC helpers
//! - **ID Generation**: ULID-based identifiers and join codes via [`IdGenerator`]
//! - **Storage**: Object storage backends with signed URLs
//!
//! # Example
//!
//! ```no_run
//! use photowall_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let code = id_gen.generate_join_code();
//!     println!("Join with code {code} on {}", config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use crypto::{hmac_sha256_hex, obfuscate_event_password, reveal_event_password, verify_hmac_sha256_hex};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{
    LocalStorage, MemoryStorage, StorageBackend, StorageService, StoredObject,
    content_type_for_key, generate_storage_key,
};
