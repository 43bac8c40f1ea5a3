// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is reported
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are reported
#![warn(unused_variables)]            // Unused variables are reported
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # appmetrics stack
//!
//! Assembles the application-metrics infrastructure into a `CloudFormation`
//! template.
//!
//! ## Overview
//!
//! The stack collects events from client applications and serves per-day
//! counts back:
//!
//! - A REST API whose `PUT` route writes events straight into a table
//! - A `POST` route backed by a function that counts events per day
//! - Alarms and dashboards on the function, the API and the table
//! - An alert topic with one email subscription per configured address
//!
//! The only input that changes the resource graph is the list of notification
//! emails. The same configuration always renders to the same bytes.
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`template`]: Template document model, expressions and logical ids
//! - [`stack`]: The resource graph itself
//! - [`assembly`]: Storage backends for rendered templates (local, S3)
//! - [`planner`]: Diffs between a fresh and a stored template
//! - [`handler`]: Logic of the read-path function
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! stack:
//!   name: applicationmetrics
//!   region: us-west-2
//!
//! notifications:
//!   emails:
//!     - ops@example.com
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod assembly;
pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod planner;
pub mod stack;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use assembly::{AssemblyStore, LocalAssemblyStore, S3AssemblyStore, StoredAssembly};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, StackConfig};
pub use error::{Result, StackError};
pub use planner::{DiffEngine, DiffResult};
pub use stack::{StackAssembler, StackSummary, assemble};
pub use template::Template;
