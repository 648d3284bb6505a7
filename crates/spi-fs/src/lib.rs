//! Configuration sources for the SPI extension registry.
//!
//! Provides the raw configuration blocks an extension loader discovers:
//! resource path resolution, text I/O, and the [`ConfigSource`] boundary
//! with directory-backed and in-memory implementations.

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;
pub mod source;

pub use config::ConfigStore;
pub use constants::ResourcePath;
pub use error::{Error, Result};
pub use path::{NormalizedPath, validate_identifier};
pub use source::{ConfigBlock, ConfigSource, DirectorySource, SourceConfig, StaticSource};
