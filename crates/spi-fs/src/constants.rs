//! Well-known resource locations.

use std::path::Path;

/// Standard locations used when discovering extension configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePath {
    /// Directory (relative to a search root) holding one file per extension point
    ExtensionDir,
    /// Environment variable listing search roots
    SearchPathEnv,
    /// Environment variable overriding the extension directory
    ResourceDirEnv,
    /// Environment variable naming a config file to load before the overrides
    ConfigFileEnv,
}

impl ResourcePath {
    /// Get the string representation of the location.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtensionDir => "META-INF/ext",
            Self::SearchPathEnv => "SPI_SEARCH_PATH",
            Self::ResourceDirEnv => "SPI_RESOURCE_DIR",
            Self::ConfigFileEnv => "SPI_CONFIG",
        }
    }
}

impl AsRef<Path> for ResourcePath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
