//! Batch orchestration and retrieval plumbing for PharmAI.
//!
//! This crate ties the extractor to the filesystem (batch runs and artifact
//! persistence) and shapes extracted records for the external retrieval step.

pub mod assembler;
pub mod context;
pub mod pipeline;
pub mod retrieval;
