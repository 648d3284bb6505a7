//! Extension-point registry.
//!
//! Implementations of an abstract capability (an *extension point*) are
//! selected by name from declarative configuration instead of being wired
//! in code. For an extension point with identifier `com.example.Codec`,
//! every search root may carry a `META-INF/ext/com.example.Codec` file:
//!
//! ```text
//! # name=implementation identifier
//! json=codec.Json
//! yaml=codec.Yaml   # trailing comments are fine
//! ```
//!
//! Identifiers resolve against implementations registered with
//! [`implementation!`] (or [`ImplementationTable::register`]). Each loaded
//! implementation is a process-wide singleton per concrete type.
//!
//! # Example
//!
//! ```ignore
//! pub trait Codec: Send + Sync {
//!     fn encode(&self, value: &str) -> Vec<u8>;
//! }
//! spi_core::extension_point!(dyn Codec, "com.example.Codec", default = "json");
//!
//! #[derive(Default)]
//! struct JsonCodec;
//! impl Codec for JsonCodec { /* ... */ }
//! spi_core::implementation!("codec.Json", JsonCodec => [dyn Codec]);
//!
//! let codecs = spi_core::for_type::<dyn Codec>()?;
//! let json = codecs.get("json")?;
//! let default = codecs.get_default()?;
//! ```

pub mod cache;
pub mod directory;
pub mod error;
pub mod loader;
pub mod logging;
pub mod parser;
pub mod point;
pub mod resolver;

pub use cache::InstanceCache;
pub use directory::{LoaderDirectory, for_type};
pub use error::{BoxError, Error, Result};
pub use loader::ExtensionLoader;
pub use parser::{ParsedBlock, Registration, SkipReason, SkippedLine};
pub use point::{ExtensionPoint, ExtensionPointInfo};
pub use resolver::{
    ImplementationBuilder, ImplementationReg, ImplementationTable, ImplementationType, Instance,
};
pub use spi_fs::{ConfigBlock, ConfigSource, DirectorySource, SourceConfig, StaticSource};

#[doc(hidden)]
pub use inventory;
