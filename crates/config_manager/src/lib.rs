//! Configuration management for branch-guard.
//!
//! This crate turns loosely typed inputs (command-line flags, environment
//! variables, terminal answers) into a validated [`ResolvedConfig`], and
//! expands the configured branches into the concrete patterns to protect.
//!
//! ## Architecture
//!
//! - [`ConfigSource`] abstracts where values come from; [`SourceChain`]
//!   composes several sources by precedence.
//! - [`resolve`] gathers, defaults and validates all values.
//! - [`expand_branch_patterns`] maps a [`BranchSelection`] to patterns.

pub mod branch_types;
pub mod errors;
pub mod keys;
pub mod resolver;
pub mod source;

pub use branch_types::{
    expand_branch_patterns, parse_branch_types, BranchSelection, BranchType,
};
pub use errors::{ConfigurationError, ConfigurationResult};
pub use resolver::{
    parse_yes_no, resolve, split_list, AccessMode, Credentials, ResolvedConfig,
};
pub use source::{ConfigKey, ConfigSource, EnvSource, MapSource, SourceChain};
