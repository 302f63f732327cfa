//! Document listing predicates and pagination.
//!
//! # Responsibility
//! - Compose conjunctive document predicates into bound SQL.
//! - Normalize page requests and carry page results.
//!
//! # Invariants
//! - Predicates always combine with logical AND.
//! - User-supplied values are bound as parameters, never spliced into SQL.

pub mod filter;
pub mod page;

pub use filter::{CompiledFilter, DocumentFilter, DocumentPredicate};
pub use page::{DocumentSort, Page, PageRequest, SortDirection, SortField};
