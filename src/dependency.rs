use alloc::{boxed::Box, vec::Vec};
use core::fmt::{self, Debug, Formatter};

use crate::{
    any::{BoxAny, RcAny, TypeInfo},
    instantiator::Injectable,
    registry::{default_registration, DefaultRegistration, Registry},
    resolver::Request,
    scope::cached_as,
};

/// Gathers the cached instances of one type into a boxed `Vec<Arc<I>>`
#[derive(Clone, Copy)]
pub(crate) struct Collector(pub(crate) fn(&Registry, &[(TypeInfo, RcAny)]) -> BoxAny);

impl Debug for Collector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Collector")
    }
}

fn collect<I: ?Sized + Send + Sync + 'static>(registry: &Registry, cached: &[(TypeInfo, RcAny)]) -> BoxAny {
    Box::new(cached_as::<I>(registry, cached))
}

/// One declared constructor parameter.
///
/// Parameters are matched to [`crate::Arguments`] by name.
#[derive(Debug, Clone, Copy)]
pub struct Parameter {
    pub(crate) name: &'static str,
    pub(crate) type_info: Option<TypeInfo>,
    pub(crate) has_default: bool,
    pub(crate) deferred: bool,
    pub(crate) qualifier: Option<&'static str>,
    pub(crate) default_registration: Option<DefaultRegistration>,
    pub(crate) collector: Option<Collector>,
}

impl Parameter {
    /// Parameter of a concrete injectable type, it can be built even if it isn't registered
    #[inline]
    #[must_use]
    pub fn of<T: Injectable>(name: &'static str) -> Self {
        Self {
            name,
            type_info: Some(TypeInfo::of::<T>()),
            has_default: false,
            deferred: false,
            qualifier: None,
            default_registration: Some(default_registration::<T>),
            collector: None,
        }
    }

    /// Parameter of an abstract type (usually `dyn Trait`) or of a type that is only constructible through a registration
    #[inline]
    #[must_use]
    pub fn of_dyn<I: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_info: Some(TypeInfo::of::<I>()),
            has_default: false,
            deferred: false,
            qualifier: None,
            default_registration: None,
            collector: None,
        }
    }

    /// Parameter without a declared type.
    /// It's never injected, the value comes from the registration's fixed arguments or the factory's own default.
    #[inline]
    #[must_use]
    pub const fn value(name: &'static str) -> Self {
        Self {
            name,
            type_info: None,
            has_default: false,
            deferred: false,
            qualifier: None,
            default_registration: None,
            collector: None,
        }
    }

    /// Every instance cached in the active scopes that can be served as `I`, from the root scope to the innermost one.
    /// Nothing is built for it, an empty collection is a valid value.
    /// Taken with [`crate::Arguments::all`].
    #[inline]
    #[must_use]
    pub fn all<I: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_info: Some(TypeInfo::of::<I>()),
            has_default: false,
            deferred: false,
            qualifier: None,
            default_registration: None,
            collector: Some(Collector(collect::<I>)),
        }
    }

    /// The factory has a default for this parameter, resolution failures fall back to it
    #[inline]
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Inject a deferred reference instead of resolving eagerly.
    ///
    /// The reference can't be forced inside the owner's own constructor,
    /// [`crate::Lazy::get`] returns [`crate::ResolveErrorKind::EarlyAccess`] until the owner is built.
    #[inline]
    #[must_use]
    pub const fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    #[inline]
    #[must_use]
    pub const fn qualified(mut self, qualifier: &'static str) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> Option<TypeInfo> {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.has_default
    }

    #[inline]
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        self.collector.is_some()
    }
}

/// Ordered constructor parameters of a type
#[derive(Debug, Clone, Default)]
pub struct Signature {
    parameters: Vec<Parameter>,
}

impl Signature {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { parameters: Vec::new() }
    }

    #[inline]
    #[must_use]
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl FromIterator<Parameter> for Signature {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            parameters: iter.into_iter().collect(),
        }
    }
}

/// A typed parameter that the engine has to resolve
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    pub name: &'static str,
    pub type_info: TypeInfo,
    pub has_default: bool,
    pub deferred: bool,
    pub qualifier: Option<&'static str>,
    pub(crate) default_registration: Option<DefaultRegistration>,
    pub(crate) collector: Option<Collector>,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        self.collector.is_some()
    }

    #[inline]
    #[must_use]
    pub(crate) const fn request(&self) -> Request {
        Request {
            type_info: self.type_info,
            qualifier: self.qualifier,
            default_registration: self.default_registration,
        }
    }
}
