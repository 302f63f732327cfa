//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and content store calls into use-case APIs.
//! - Keep CLI and transport layers decoupled from storage details.

pub mod document_service;
pub mod error;
pub mod permission_gate;
pub mod version_manager;
