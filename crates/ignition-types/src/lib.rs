//! Shared types for the Ignition engine core: function identity, persisted
//! metadata, dynamic config maps, and the domain-tagged error taxonomy.

pub mod config;
pub mod error;
pub mod key;
pub mod metadata;

pub use config::Config;
pub use error::{Domain, Error, Result};
pub use key::FunctionKey;
pub use metadata::{short_hash_of, Metadata, Settings, Version};
