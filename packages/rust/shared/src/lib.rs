//! Shared types, error model, and configuration for PharmAI.
//!
//! This crate is the foundation depended on by all other PharmAI crates.
//! It provides:
//! - [`PharmaiError`], the unified error type
//! - Domain types ([`SectionId`], [`DocumentRecord`], [`Collection`], [`Fragment`])
//! - Configuration ([`AppConfig`], [`BatchDefaults`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchDefaults, ExtractionConfig, RetrievalConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{PharmaiError, Result};
pub use types::{
    Collection, CollectionEntry, DocumentRecord, Fragment, RetrievedFragment, SectionId,
};
