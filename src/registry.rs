use alloc::{boxed::Box, collections::BTreeMap, sync::Arc, vec::Vec};
use core::marker::PhantomData;

use crate::{
    any::{BoxAny, RcAny, TypeInfo},
    arguments::Arguments,
    config::Config,
    dependency::Signature,
    errors::InstantiateErrorKind,
    finalizer::{boxed_finalizer, BoxedCloneFinalizer, Finalizer},
    instantiator::{boxed_instantiator, BoxedCloneInstantiator, Injectable, Instantiator},
};

/// Builds the registration used for an unregistered injectable type
pub(crate) type DefaultRegistration = fn() -> Registration;

/// Turns a cached instance of the concrete type into a boxed `Arc<I>` of a type it's served as
pub(crate) type Caster = Arc<dyn Fn(&RcAny) -> Option<BoxAny> + Send + Sync>;

/// Construction policy of one concrete type
#[derive(Clone)]
pub struct Registration {
    pub(crate) type_info: TypeInfo,
    pub(crate) aliases: Vec<&'static str>,
    pub(crate) instantiator: BoxedCloneInstantiator,
    pub(crate) signature: Signature,
    pub(crate) config: Config,
    pub(crate) fixed: BTreeMap<&'static str, RcAny>,
    pub(crate) casts: BTreeMap<TypeInfo, Caster>,
    pub(crate) finalizer: Option<BoxedCloneFinalizer>,
}

impl Registration {
    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.type_info.short_name()
    }

    /// Whether the registration is known under the name, either the short type name or an alias
    #[inline]
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.name() == name || self.aliases.iter().any(|alias| *alias == name)
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> Config {
        self.config
    }

    #[inline]
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    #[must_use]
    pub fn has_fixed_argument(&self, name: &str) -> bool {
        self.fixed.contains_key(name)
    }

    /// Whether instances can be served as the type
    #[inline]
    #[must_use]
    pub fn provides(&self, type_info: &TypeInfo) -> bool {
        self.casts.contains_key(type_info)
    }

    /// Types instances can be served as, the concrete type included
    pub fn provided_types(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.casts.keys().copied()
    }

    #[inline]
    pub(crate) fn cast(&self, instance: &RcAny, to: &TypeInfo) -> Option<BoxAny> {
        self.casts.get(to).and_then(|cast| cast(instance))
    }
}

/// Typed builder of a [`Registration`]
pub struct Provider<T> {
    registration: Registration,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    fn new(instantiator: BoxedCloneInstantiator, signature: Signature) -> Self {
        let type_info = TypeInfo::of::<T>();
        let mut casts = BTreeMap::new();
        casts.insert(
            type_info,
            Arc::new(|instance: &RcAny| instance.clone().downcast::<T>().ok().map(|value| Box::new(value) as BoxAny)) as Caster,
        );

        Self {
            registration: Registration {
                type_info,
                aliases: Vec::new(),
                instantiator,
                signature,
                config: Config::default(),
                fixed: BTreeMap::new(),
                casts,
                finalizer: None,
            },
            _marker: PhantomData,
        }
    }

    /// Serves instances as `I` too, usually a trait object implemented by `T`.
    /// Requests for `I` find this registration through subtype search.
    ///
    /// ```rust
    /// # use pluck::{instance, Registration};
    /// # use std::sync::Arc;
    /// trait Animal: Send + Sync {}
    ///
    /// #[derive(Clone)]
    /// struct Dog;
    ///
    /// impl Animal for Dog {}
    ///
    /// let registration: Registration = instance(Dog).bind::<dyn Animal>(|dog| dog).into();
    /// ```
    #[inline]
    #[must_use]
    pub fn bind<I>(mut self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.registration.casts.insert(
            TypeInfo::of::<I>(),
            Arc::new(move |instance: &RcAny| {
                instance
                    .clone()
                    .downcast::<T>()
                    .ok()
                    .map(|value| Box::new(cast(value)) as BoxAny)
            }),
        );
        self
    }

    #[inline]
    #[must_use]
    pub fn cache(mut self, cache_provides: bool) -> Self {
        self.registration.config.cache_provides = cache_provides;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.registration.config = config;
        self
    }

    /// Fixed argument passed to the factory on every construction.
    /// It takes precedence over a resolved dependency of the same name.
    #[inline]
    #[must_use]
    pub fn arg<V: Send + Sync + 'static>(mut self, name: &'static str, value: V) -> Self {
        self.registration.fixed.insert(name, Arc::new(value));
        self
    }

    /// Extra name the registration can be selected by with a qualifier
    #[inline]
    #[must_use]
    pub fn named(mut self, alias: &'static str) -> Self {
        self.registration.aliases.push(alias);
        self
    }

    #[inline]
    #[must_use]
    pub fn finalizer(mut self, finalizer: impl Finalizer<T>) -> Self {
        self.registration.finalizer = Some(boxed_finalizer(finalizer));
        self
    }
}

impl<T> From<Provider<T>> for Registration {
    #[inline]
    fn from(provider: Provider<T>) -> Self {
        provider.registration
    }
}

/// Registration built with [`Injectable::construct`] and [`Injectable::signature`]
#[inline]
#[must_use]
pub fn provide<T: Injectable>() -> Provider<T> {
    Provider::new(boxed_instantiator(T::construct), T::signature())
}

/// Registration built with a custom factory.
/// The factory receives the dependencies declared by `signature`.
#[inline]
#[must_use]
pub fn provide_with<Inst: Instantiator>(instantiator: Inst, signature: Signature) -> Provider<Inst::Provides> {
    Provider::new(boxed_instantiator(instantiator), signature)
}

/// Registration that just returns a clone of the passed value.
/// It can be used when the value was created outside the container.
#[inline]
#[must_use]
pub fn instance<T: Clone + Send + Sync + 'static>(value: T) -> Provider<T> {
    Provider::new(
        boxed_instantiator(move |_: &mut Arguments| Ok::<_, InstantiateErrorKind>(value.clone())),
        Signature::new(),
    )
}

#[inline]
#[must_use]
pub(crate) fn default_registration<T: Injectable>() -> Registration {
    provide::<T>().into()
}

/// Registrations keyed by concrete type, at most one per type
#[derive(Default, Clone)]
pub struct Registry {
    registrations: BTreeMap<TypeInfo, Registration>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registrations: BTreeMap::new(),
        }
    }

    /// Stores the registration, returns the one it replaced
    #[inline]
    pub fn register(&mut self, registration: impl Into<Registration>) -> Option<Registration> {
        let registration = registration.into();
        self.registrations.insert(registration.type_info, registration)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, type_info: &TypeInfo) -> Option<&Registration> {
        self.registrations.get(type_info)
    }

    /// Stored registration, or the default one if the type is injectable
    #[inline]
    #[must_use]
    pub(crate) fn lookup(&self, type_info: &TypeInfo, default: Option<DefaultRegistration>) -> Option<Registration> {
        match self.registrations.get(type_info) {
            Some(registration) => Some(registration.clone()),
            None => default.map(|default| default()),
        }
    }

    /// Registrations of other types whose instances can be served as `type_info`
    pub fn candidates<'a>(&'a self, type_info: &'a TypeInfo) -> impl Iterator<Item = &'a Registration> + 'a {
        self.registrations
            .values()
            .filter(move |registration| registration.type_info != *type_info && registration.provides(type_info))
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Registration> {
        self.registrations.values().find(|registration| registration.matches_name(name))
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_info: &TypeInfo) -> bool {
        self.registrations.contains_key(type_info)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.values()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    #[inline]
    pub fn reset(&mut self) {
        self.registrations.clear();
    }
}
