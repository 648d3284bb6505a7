//! Implementation resolution.
//!
//! An [`ImplementationTable`] maps implementation identifiers (the right-hand
//! side of a configuration line) to [`ImplementationType`] handles. A handle
//! knows how to construct its concrete type with no arguments and which
//! extension points that type provides.
//!
//! Implementations are registered either at link time with
//! [`implementation!`](crate::implementation) or at runtime with
//! [`ImplementationTable::register`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::BoxError;
use crate::point::{ExtensionPoint, ExtensionPointInfo};
use crate::{Error, Result};

/// A constructed implementation, erased to its concrete type.
pub type Instance = Arc<dyn Any + Send + Sync>;

type Constructor = Box<dyn Fn() -> std::result::Result<Instance, BoxError> + Send + Sync>;
type Upcast = Box<dyn Fn(Instance) -> Option<Box<dyn Any>> + Send + Sync>;

struct Capability {
    point: &'static str,
    upcast: Upcast,
}

/// Opaque handle to a concrete implementation type.
pub struct ImplementationType {
    identifier: String,
    type_id: TypeId,
    type_name: &'static str,
    constructor: Constructor,
    capabilities: HashMap<TypeId, Capability>,
}

impl ImplementationType {
    /// Describe `C`, constructed through [`Default`].
    pub fn of<C>(identifier: impl Into<String>) -> ImplementationBuilder<C>
    where
        C: Default + Send + Sync + 'static,
    {
        Self::with_constructor(identifier, || {
            Ok::<C, std::convert::Infallible>(C::default())
        })
    }

    /// Describe `C`, constructed through a fallible zero-argument function.
    pub fn with_constructor<C, E, F>(
        identifier: impl Into<String>,
        constructor: F,
    ) -> ImplementationBuilder<C>
    where
        C: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> std::result::Result<C, E> + Send + Sync + 'static,
    {
        let constructor: Constructor = Box::new(move || {
            constructor()
                .map(|value| Arc::new(value) as Instance)
                .map_err(Into::into)
        });

        ImplementationBuilder {
            ty: Self {
                identifier: identifier.into(),
                type_id: TypeId::of::<C>(),
                type_name: std::any::type_name::<C>(),
                constructor,
                capabilities: HashMap::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Identity of the concrete type; the key of the global instance cache.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether this type provides the extension point `P`.
    pub fn provides<P: ?Sized + ExtensionPoint>(&self) -> bool {
        self.capabilities.contains_key(&TypeId::of::<P>())
    }

    /// Identifiers of every extension point this type provides (sorted).
    pub fn provided_points(&self) -> Vec<&'static str> {
        let mut points: Vec<_> = self.capabilities.values().map(|c| c.point).collect();
        points.sort_unstable();
        points
    }

    /// Run the zero-argument constructor.
    ///
    /// Both an error and a panic from the constructor become
    /// [`Error::Instantiation`].
    pub fn construct(&self) -> Result<Instance> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.constructor)()));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(panic_message(payload).into()),
        };
        result.map_err(|source| Error::Instantiation {
            identifier: self.identifier.clone(),
            source,
        })
    }

    /// View a constructed instance of this type as the extension point `P`.
    pub fn upcast<P: ?Sized + ExtensionPoint>(&self, instance: Instance) -> Result<Arc<P>> {
        let mismatch = || Error::TypeMismatch {
            identifier: self.identifier.clone(),
            point: P::IDENTIFIER.to_string(),
        };

        let capability = self
            .capabilities
            .get(&TypeId::of::<P>())
            .ok_or_else(mismatch)?;
        let erased = (capability.upcast)(instance).ok_or_else(mismatch)?;
        erased
            .downcast::<Arc<P>>()
            .map(|boxed| *boxed)
            .map_err(|_| mismatch())
    }

    fn provides_info(&self, point: &ExtensionPointInfo) -> bool {
        self.capabilities.contains_key(&point.type_id)
    }
}

impl fmt::Debug for ImplementationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationType")
            .field("identifier", &self.identifier)
            .field("type_name", &self.type_name)
            .field("provides", &self.provided_points())
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("constructor panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("constructor panicked: {message}")
    } else {
        "constructor panicked".to_string()
    }
}

/// Builder returned by [`ImplementationType::of`] and
/// [`ImplementationType::with_constructor`].
pub struct ImplementationBuilder<C> {
    ty: ImplementationType,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> ImplementationBuilder<C> {
    /// Declare that `C` provides the extension point `P`.
    ///
    /// `upcast` is normally the identity closure, which coerces `Arc<C>` to
    /// `Arc<dyn Trait>`: `.provides::<dyn Codec>(|c| -> Arc<dyn Codec> { c })`.
    pub fn provides<P: ?Sized + ExtensionPoint>(mut self, upcast: fn(Arc<C>) -> Arc<P>) -> Self {
        let erased: Upcast = Box::new(move |instance: Instance| {
            instance
                .downcast::<C>()
                .ok()
                .map(|concrete| Box::new(upcast(concrete)) as Box<dyn Any>)
        });
        self.ty.capabilities.insert(
            TypeId::of::<P>(),
            Capability {
                point: P::IDENTIFIER,
                upcast: erased,
            },
        );
        self
    }

    pub fn build(self) -> ImplementationType {
        self.ty
    }
}

/// Link-time registration collected by [`ImplementationTable::from_inventory`].
pub struct ImplementationReg(pub fn() -> ImplementationType);

inventory::collect!(ImplementationReg);

/// Registry of implementation types, keyed by identifier.
#[derive(Default)]
pub struct ImplementationTable {
    types: RwLock<HashMap<String, Arc<ImplementationType>>>,
}

impl ImplementationTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding every [`implementation!`](crate::implementation)
    /// registration linked into the binary.
    pub fn from_inventory() -> Self {
        let table = Self::new();
        for reg in inventory::iter::<ImplementationReg> {
            table.register(reg.0());
        }
        table
    }

    /// Register an implementation type.
    ///
    /// Returns `false` and keeps the existing entry if the identifier is
    /// already registered.
    pub fn register(&self, ty: ImplementationType) -> bool {
        let mut types = self.types.write();
        if let Some(existing) = types.get(&ty.identifier) {
            tracing::warn!(
                identifier = %ty.identifier,
                kept = existing.type_name,
                ignored = ty.type_name,
                "Duplicate implementation identifier; keeping the first registration"
            );
            return false;
        }
        types.insert(ty.identifier.clone(), Arc::new(ty));
        true
    }

    /// Look up an implementation by identifier.
    pub fn get(&self, identifier: &str) -> Option<Arc<ImplementationType>> {
        self.types.read().get(identifier).cloned()
    }

    /// Check if an identifier is registered.
    pub fn contains(&self, identifier: &str) -> bool {
        self.types.read().contains_key(identifier)
    }

    /// Number of registered implementations.
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// List all registered identifiers (sorted).
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.types.read().keys().cloned().collect();
        identifiers.sort();
        identifiers
    }

    /// Resolve `identifier` for the extension point `P`.
    pub fn resolve<P: ?Sized + ExtensionPoint>(
        &self,
        identifier: &str,
    ) -> Result<Arc<ImplementationType>> {
        self.resolve_for(identifier, &ExtensionPointInfo::of::<P>())
    }

    /// Resolve `identifier`, failing with [`Error::TypeNotFound`] if it is
    /// unknown or [`Error::TypeMismatch`] if it does not provide `point`.
    pub fn resolve_for(
        &self,
        identifier: &str,
        point: &ExtensionPointInfo,
    ) -> Result<Arc<ImplementationType>> {
        let ty = self.get(identifier).ok_or_else(|| Error::TypeNotFound {
            identifier: identifier.to_string(),
        })?;
        if !ty.provides_info(point) {
            return Err(Error::TypeMismatch {
                identifier: identifier.to_string(),
                point: point.identifier.to_string(),
            });
        }
        Ok(ty)
    }
}

impl fmt::Debug for ImplementationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationTable")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}

/// Registers an implementation at link time.
///
/// The type is constructed through [`Default`] unless a `construct` function
/// returning `Result<Type, E>` is given.
///
/// ```ignore
/// implementation!("codec.Json", JsonCodec => [dyn Codec]);
/// implementation!(
///     "codec.Pooled",
///     PooledCodec => [dyn Codec, dyn Pool],
///     construct = PooledCodec::connect,
/// );
/// ```
#[macro_export]
macro_rules! implementation {
    ($identifier:expr, $ty:ty => [$($point:ty),+ $(,)?], construct = $ctor:expr $(,)?) => {
        $crate::inventory::submit! {
            $crate::ImplementationReg({
                fn build() -> $crate::ImplementationType {
                    $crate::ImplementationType::with_constructor($identifier, $ctor)
                        $(.provides::<$point>(
                            |instance: ::std::sync::Arc<$ty>| -> ::std::sync::Arc<$point> {
                                instance
                            }
                        ))+
                        .build()
                }
                build
            })
        }
    };
    ($identifier:expr, $ty:ty => [$($point:ty),+ $(,)?] $(,)?) => {
        $crate::inventory::submit! {
            $crate::ImplementationReg({
                fn build() -> $crate::ImplementationType {
                    $crate::ImplementationType::of::<$ty>($identifier)
                        $(.provides::<$point>(
                            |instance: ::std::sync::Arc<$ty>| -> ::std::sync::Arc<$point> {
                                instance
                            }
                        ))+
                        .build()
                }
                build
            })
        }
    };
}
