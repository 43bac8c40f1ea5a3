//! Configuration module for the stack assembler.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `appmetrics.stack.yaml`
//! - Validation of the notification destination list and backend settings
//! - Computing hashes of configurations and rendered templates

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    AssemblyBackend, AssemblyConfig, NotificationConfig, StackConfig, StackSettings,
    DEFAULT_REGION, DEFAULT_STACK_NAME,
};
pub use parser::{find_config_file, split_email_list, ConfigParser, DEFAULT_CONFIG_FILES};
pub use validator::{is_valid_email, ConfigValidator, ValidationError, ValidationResult};
pub use hash::ConfigHasher;
