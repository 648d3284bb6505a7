/// Boxed cause carried by [`Error::Instantiation`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while loading extensions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested type is not a marked, abstract extension point.
    #[error("invalid extension point '{type_name}': {reason}")]
    InvalidExtensionPoint { type_name: String, reason: String },

    /// Blank extension name passed to a lookup.
    #[error("invalid extension name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// No implementation is registered under the name.
    #[error("unknown extension '{name}' for extension point '{point}'")]
    UnknownExtension { point: String, name: String },

    /// Default lookup on an extension point that declares no default.
    #[error("extension point '{point}' declares no default extension")]
    MissingDefault { point: String },

    /// The implementation identifier is not registered.
    #[error("implementation type not found: {identifier}")]
    TypeNotFound { identifier: String },

    /// The implementation does not provide the extension point.
    #[error("implementation '{identifier}' does not provide extension point '{point}'")]
    TypeMismatch { identifier: String, point: String },

    /// Constructing the implementation failed.
    #[error("failed to instantiate '{identifier}': {source}")]
    Instantiation {
        identifier: String,
        #[source]
        source: BoxError,
    },

    /// Reading extension configuration failed.
    #[error("configuration source error: {0}")]
    Source(#[from] spi_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
