//! Shared test utilities for the SPI workspace.
//!
//! This crate provides on-disk fixtures for extension discovery tests. It is
//! a dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`tree`]: [`ResourceTree`] builder for `META-INF/ext` layouts

pub mod tree;

pub use tree::{EXTENSION_DIR, ResourceTree};
