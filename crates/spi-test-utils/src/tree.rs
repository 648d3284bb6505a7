//! [`ResourceTree`] builder for extension discovery scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directory below the root where extension resources live by default.
///
/// Mirrors `spi_fs::ResourcePath::ExtensionDir`. Fixtures write the literal
/// layout a deployment would ship, so this crate does not depend on spi-fs;
/// `spi-fs` tests assert the two stay equal.
pub const EXTENSION_DIR: &str = "META-INF/ext";

/// A temporary search root holding extension configuration files.
///
/// # Example
///
/// ```rust,no_run
/// use spi_test_utils::ResourceTree;
///
/// let tree = ResourceTree::new()
///     .with_resource("com.example.Codec", "json=codec.Json\n");
/// tree.assert_file_exists("META-INF/ext/com.example.Codec");
/// ```
pub struct ResourceTree {
    temp_dir: TempDir,
}

impl Default for ResourceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTree {
    /// Create an empty temporary search root.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the resource file for `identifier` under the default directory.
    pub fn resource_path(&self, identifier: &str) -> PathBuf {
        self.root().join(EXTENSION_DIR).join(identifier)
    }

    /// Write the resource file for `identifier` (builder pattern).
    pub fn with_resource(self, identifier: &str, content: &str) -> Self {
        self.write_resource(identifier, content);
        self
    }

    /// Write the resource file for `identifier`, replacing any previous content.
    pub fn write_resource(&self, identifier: &str, content: &str) {
        self.write_file(&format!("{EXTENSION_DIR}/{identifier}"), content);
    }

    /// Write an arbitrary file relative to the root, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("Could not write {}: {}", path.display(), e));
    }

    /// Make the resource for `identifier` unreadable as a file by creating a
    /// directory in its place.
    pub fn block_resource(&self, identifier: &str) {
        fs::create_dir_all(self.resource_path(identifier)).unwrap();
    }

    /// Assert that `path` (relative to the root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }
}
