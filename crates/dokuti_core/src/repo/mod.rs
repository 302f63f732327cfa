//! Metadata store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Define the use-case oriented metadata store contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Multi-statement writes run inside one transaction scope.

pub mod document_repo;
