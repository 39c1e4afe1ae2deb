//! # Application Module
//!
//! The upload orchestrator.

pub mod service;

pub use service::UploadService;
