//! Extension-point marker and metadata.
//!
//! An extension point is a trait object type marked with [`ExtensionPoint`].
//! The trait must have `Send + Sync` as supertraits so that the loaded
//! singletons can be shared across threads:
//!
//! ```ignore
//! pub trait Codec: Send + Sync {
//!     fn encode(&self, value: &str) -> Vec<u8>;
//! }
//!
//! spi_core::extension_point!(dyn Codec, "com.example.Codec", default = "json");
//! ```

use std::any::TypeId;
use std::mem;

use crate::{Error, Result};

/// Marker for types whose implementations are selected by name at runtime.
///
/// Implement it on `dyn Trait`, usually through [`extension_point!`].
///
/// [`extension_point!`]: crate::extension_point
pub trait ExtensionPoint: Send + Sync + 'static {
    /// Stable identifier; also the resource file name searched for.
    const IDENTIFIER: &'static str;

    /// Name looked up by `get_default`.
    const DEFAULT_NAME: Option<&'static str> = None;
}

/// Type-level metadata of an extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionPointInfo {
    pub identifier: &'static str,
    pub type_name: &'static str,
    pub type_id: TypeId,
    declared_default: Option<&'static str>,
}

impl ExtensionPointInfo {
    pub fn of<T: ?Sized + ExtensionPoint>() -> Self {
        Self {
            identifier: T::IDENTIFIER,
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            declared_default: T::DEFAULT_NAME,
        }
    }

    /// Declared default name. A blank declaration counts as none.
    pub fn default_name(&self) -> Option<&'static str> {
        self.declared_default.filter(|name| !name.trim().is_empty())
    }
}

/// Check that `T` is usable as an extension point.
///
/// Sized types are rejected. The check looks at pointer width only, so an
/// unsized concrete type (a slice or `str` newtype) that carries the marker
/// still passes; the marker belongs on `dyn Trait` types.
pub fn validate<T: ?Sized + ExtensionPoint>() -> Result<ExtensionPointInfo> {
    let info = ExtensionPointInfo::of::<T>();
    let invalid = |reason: String| Error::InvalidExtensionPoint {
        type_name: info.type_name.to_string(),
        reason,
    };

    if mem::size_of::<*const T>() == mem::size_of::<*const ()>() {
        return Err(invalid(
            "concrete types cannot be extension points; mark the trait object instead".into(),
        ));
    }
    spi_fs::validate_identifier(info.identifier).map_err(|e| invalid(e.to_string()))?;

    Ok(info)
}

/// Marks a trait object type as an extension point.
///
/// ```ignore
/// extension_point!(dyn Codec, "com.example.Codec");
/// extension_point!(dyn Codec, "com.example.Codec", default = "json");
/// ```
#[macro_export]
macro_rules! extension_point {
    ($point:ty, $identifier:expr, default = $default:expr $(,)?) => {
        impl $crate::ExtensionPoint for $point {
            const IDENTIFIER: &'static str = $identifier;
            const DEFAULT_NAME: ::core::option::Option<&'static str> =
                ::core::option::Option::Some($default);
        }
    };
    ($point:ty, $identifier:expr $(,)?) => {
        impl $crate::ExtensionPoint for $point {
            const IDENTIFIER: &'static str = $identifier;
        }
    };
}
