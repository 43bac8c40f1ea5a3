//! CloudFormation document model.
//!
//! This module provides the pieces the assembler writes into:
//! - [`Template`] and its [`Resource`], [`Parameter`] and [`Output`] entries
//! - [`Expr`] intrinsic values and [`TokenizedJson`] for JSON-in-string properties
//! - [`ConstructPath`] for logical id allocation

mod document;
mod expr;
mod logical_id;

pub use document::{FORMAT_VERSION, Output, PATH_METADATA_KEY, Parameter, Resource, Template};
pub use expr::{Expr, PSEUDO_PARAMETERS, TokenizedJson};
pub use logical_id::ConstructPath;
