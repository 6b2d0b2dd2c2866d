//! Configuration management for formloop
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. The TOML file has `[engine]`, `[cache]`,
//! `[sessions]` and `[llm]` sections, all optional.

mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use model::*;
