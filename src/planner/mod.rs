//! Change planning for synthesized templates.
//!
//! This module compares a freshly assembled template with the one stored in
//! the assembly, listing the resources that would be created, updated or
//! deleted.

mod diff;

pub use diff::{DiffEngine, DiffResult, DiffType, ResourceDiff};
