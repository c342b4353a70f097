use alloc::sync::{Arc, Weak};
use core::fmt::{self, Debug, Formatter};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    container::{Container, ContainerInner},
    context::ResolutionContext,
    errors::ResolveErrorKind,
    resolver::Request,
};

/// Type-erased part of a deferred reference
#[derive(Clone)]
pub(crate) struct Deferred {
    pub(crate) container: Weak<ContainerInner>,
    pub(crate) request: Request,
    /// Type whose construction has to finish before the reference can be forced
    pub(crate) blocked_on: TypeInfo,
    pub(crate) context: ResolutionContext,
    /// Requested by a deferred parameter, `blocked_on` is the owner of the parameter
    pub(crate) explicit: bool,
}

impl Deferred {
    pub(crate) fn force<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>, ResolveErrorKind> {
        let type_info = self.request.type_info;

        if self.context.contains(&self.blocked_on) {
            let path = self.context.snapshot();
            let err = if self.explicit {
                ResolveErrorKind::EarlyAccess {
                    type_info,
                    owner: self.blocked_on,
                    path,
                }
            } else {
                ResolveErrorKind::CyclicDependency { type_info, path }
            };
            error!("{}", err);
            return Err(err);
        }

        let Some(inner) = self.container.upgrade() else {
            let err = ResolveErrorKind::ContainerDropped { type_info };
            error!("{}", err);
            return Err(err);
        };

        debug!(dependency = type_info.name, "Forcing deferred");
        Container { inner }.resolve_request::<I>(&self.request)
    }
}

/// Deferred reference: resolves its type on the first [`Lazy::get`] and keeps the result.
///
/// The container hands out a `Lazy` instead of an instance when resolving eagerly would
/// re-enter a type that is still being constructed, or when a deferred parameter was requested.
/// A `Lazy` doesn't keep its container alive.
pub struct Lazy<I: ?Sized> {
    deferred: Deferred,
    value: Mutex<Option<Arc<I>>>,
}

impl<I: ?Sized + Send + Sync + 'static> Lazy<I> {
    #[inline]
    #[must_use]
    pub(crate) fn new(deferred: Deferred) -> Self {
        Self {
            deferred,
            value: Mutex::new(None),
        }
    }

    /// Resolves the dependency on the first call, later calls return the same instance
    ///
    /// # Errors
    /// - [`ResolveErrorKind::CyclicDependency`] if called while the cyclic partner is still being constructed,
    ///   e.g. from a constructor in the cycle
    /// - [`ResolveErrorKind::EarlyAccess`] if the reference was requested by a deferred parameter
    ///   and is forced in the constructor of the parameter's owner
    /// - [`ResolveErrorKind::ContainerDropped`] if the container no longer exists
    /// - any error of the resolution itself
    pub fn get(&self) -> Result<Arc<I>, ResolveErrorKind> {
        if let Some(value) = self.value.lock().as_ref() {
            return Ok(value.clone());
        }

        // The lock isn't held during resolution, the resolved graph may force this reference again
        let value = self.deferred.force::<I>()?;
        Ok(self.value.lock().get_or_insert(value).clone())
    }

    #[inline]
    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.value.lock().is_some()
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.deferred.request.type_info
    }

    #[inline]
    #[must_use]
    pub fn qualifier(&self) -> Option<&'static str> {
        self.deferred.request.qualifier
    }
}

impl<I: ?Sized> Debug for Lazy<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("type", &self.deferred.request.type_info.name)
            .field("qualifier", &self.deferred.request.qualifier)
            .field("forced", &self.value.lock().is_some())
            .finish()
    }
}

/// Dependency received by a constructor
pub enum Inject<I: ?Sized> {
    Resolved(Arc<I>),
    Deferred(Lazy<I>),
}

impl<I: ?Sized + Send + Sync + 'static> Inject<I> {
    /// Returns the instance, forcing the deferred reference if needed
    ///
    /// # Errors
    /// See [`Lazy::get`]
    #[inline]
    pub fn get(&self) -> Result<Arc<I>, ResolveErrorKind> {
        match self {
            Inject::Resolved(value) => Ok(value.clone()),
            Inject::Deferred(lazy) => lazy.get(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Inject::Deferred(_))
    }

    #[inline]
    #[must_use]
    pub const fn as_resolved(&self) -> Option<&Arc<I>> {
        match self {
            Inject::Resolved(value) => Some(value),
            Inject::Deferred(_) => None,
        }
    }
}

impl<I: ?Sized> From<Arc<I>> for Inject<I> {
    #[inline]
    fn from(value: Arc<I>) -> Self {
        Inject::Resolved(value)
    }
}

impl<I: ?Sized> Debug for Inject<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Inject::Resolved(_) => f.write_str("Resolved"),
            Inject::Deferred(lazy) => f.debug_tuple("Deferred").field(lazy).finish(),
        }
    }
}
