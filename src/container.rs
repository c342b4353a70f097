use alloc::{boxed::Box, sync::Arc, vec::Vec};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info_span};

use crate::{
    analyzer::{collect_dependencies, get_dependencies, DeclaredSignature, SignatureIntrospector},
    any::{BoxAny, RcAny, TypeInfo},
    arguments::{Argument, Arguments},
    context::ResolutionContext,
    dependency::{Collector, Dependency, Signature},
    errors::{InstantiateErrorKind, ResolveErrorKind, ScopeErrorKind},
    inject::{Deferred, Lazy},
    instantiator::Injectable,
    registry::{instance, Provider, Registration, Registry},
    resolver::{Position, Request, ResolverChain, ResolverStrategy},
    scope::{cached_as, finalize_scopes, ScopeGuard, ScopeStack},
    service::Service as _,
};

/// Outcome of resolving one request
pub(crate) enum Resolution {
    /// Boxed `Arc<I>` of the requested type
    Resolved(BoxAny),
    Deferred(Deferred),
}

/// Object-construction container.
///
/// A cheap handle: clones share the registry, the scope stack and the resolver chain.
///
/// ```rust
/// use pluck::{instance, Container};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> &'static str;
/// }
///
/// #[derive(Clone)]
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> &'static str {
///         "hello"
///     }
/// }
///
/// let container = Container::new();
/// container.register(instance(English).bind::<dyn Greeter>(|english| english));
///
/// let greeter: Arc<dyn Greeter> = container.resolve_dyn().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) registry: RwLock<Arc<Registry>>,
    pub(crate) scopes: Mutex<ScopeStack>,
    pub(crate) resolvers: RwLock<Arc<ResolverChain>>,
    pub(crate) introspector: Box<dyn SignatureIntrospector>,
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        finalize_scopes(self.scopes.get_mut().reset());
        debug!("Container closed on drop");
    }
}

pub struct ContainerBuilder {
    registry: Registry,
    resolvers: ResolverChain,
    introspector: Box<dyn SignatureIntrospector>,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self {
            registry: Registry::new(),
            resolvers: ResolverChain::new(),
            introspector: Box::new(DeclaredSignature),
        }
    }
}

impl ContainerBuilder {
    #[inline]
    #[must_use]
    pub fn introspector(mut self, introspector: impl SignatureIntrospector) -> Self {
        self.introspector = Box::new(introspector);
        self
    }

    #[inline]
    #[must_use]
    pub fn resolvers(mut self, resolvers: ResolverChain) -> Self {
        self.resolvers = resolvers;
        self
    }

    #[inline]
    #[must_use]
    pub fn register(mut self, registration: impl Into<Registration>) -> Self {
        self.registry.register(registration);
        self
    }

    #[must_use]
    pub fn build(self) -> Container {
        Container {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(Arc::new(self.registry)),
                scopes: Mutex::new(ScopeStack::new()),
                resolvers: RwLock::new(Arc::new(self.resolvers)),
                introspector: self.introspector,
            }),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Container with the default resolver chain and declared signatures
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Stores the registration, replacing the one of the same type
    pub fn register(&self, registration: impl Into<Registration>) -> &Self {
        let registration = registration.into();
        debug!(dependency = registration.type_info().name, "Registered");
        Arc::make_mut(&mut *self.inner.registry.write()).register(registration);
        self
    }

    /// Places an already built value into the innermost scope.
    /// The value is resolvable only while the scope is active.
    #[inline]
    pub fn add<T: Clone + Send + Sync + 'static>(&self, value: T) -> &Self {
        self.add_with(value, |provider| provider)
    }

    /// Same as [`Self::add`], `configure` can bind the value to the types it's served as
    ///
    /// ```rust
    /// # use pluck::Container;
    /// trait Port: Send + Sync {}
    ///
    /// #[derive(Clone)]
    /// struct Http;
    ///
    /// impl Port for Http {}
    ///
    /// let container = Container::new();
    /// let _scope = container.enter_scope();
    /// container.add_with(Http, |provider| provider.bind::<dyn Port>(|http| http));
    /// assert!(container.resolve_dyn::<dyn Port>().is_ok());
    /// ```
    pub fn add_with<T: Clone + Send + Sync + 'static>(&self, value: T, configure: impl FnOnce(Provider<T>) -> Provider<T>) -> &Self {
        let registration: Registration = configure(instance(value.clone())).into();
        debug!(dependency = registration.type_info().name, "Added to scope");
        self.inner.scopes.lock().add(registration, Arc::new(value));
        self
    }

    /// Snapshot of the registry, later registrations aren't visible in it.
    /// Values added to scopes aren't in it.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        self.inner.registry.read().clone()
    }

    pub fn add_resolver(&self, strategy: impl ResolverStrategy, position: Position) -> &Self {
        Arc::make_mut(&mut *self.inner.resolvers.write()).add(strategy, position);
        self
    }

    /// Resolves a concrete injectable type
    ///
    /// # Errors
    /// - [`ResolveErrorKind::UnresolvedDependency`] or [`ResolveErrorKind::AmbiguousDependency`]
    ///   if the type or one of its required dependencies can't be mapped to a concrete type
    /// - [`ResolveErrorKind::Analysis`] if a signature can't be analyzed
    /// - [`ResolveErrorKind::Factory`] if a factory fails
    #[inline]
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_request(&Request::of::<T>())
    }

    /// Resolves a type that's only provided by registrations, usually a trait object
    ///
    /// # Errors
    /// See [`Self::resolve`]
    #[inline]
    pub fn resolve_dyn<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>, ResolveErrorKind> {
        self.resolve_request(&Request::of_dyn::<I>())
    }

    /// Resolves the registration of `I` known under the name.
    /// The name is the short type name or an alias set with [`crate::Provider::named`].
    ///
    /// # Errors
    /// See [`Self::resolve`]
    #[inline]
    pub fn resolve_qualified<I: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<I>, ResolveErrorKind> {
        self.resolve_request(&Request::of_dyn::<I>().qualified(name))
    }

    /// Deferred reference to a concrete injectable type, resolved on the first [`Lazy::get`]
    #[inline]
    #[must_use]
    pub fn resolve_deferred<T: Injectable>(&self) -> Lazy<T> {
        Lazy::new(self.defer(Request::of::<T>(), TypeInfo::of::<T>(), &ResolutionContext::new(), false))
    }

    #[inline]
    #[must_use]
    pub fn resolve_deferred_dyn<I: ?Sized + Send + Sync + 'static>(&self, qualifier: Option<&'static str>) -> Lazy<I> {
        let mut request = Request::of_dyn::<I>();
        request.qualifier = qualifier;
        Lazy::new(self.defer(request, request.type_info, &ResolutionContext::new(), false))
    }

    /// Builds a new instance with per-call arguments.
    /// The arguments take precedence over fixed arguments and resolved dependencies of the same name.
    /// The instance is never cached, its dependencies are cached as usual.
    ///
    /// # Errors
    /// See [`Self::resolve`]
    pub fn resolve_with_args<T: Injectable>(&self, arguments: Arguments) -> Result<Arc<T>, ResolveErrorKind> {
        let request = Request::of::<T>();
        let context = ResolutionContext::new();
        match self.resolve_in(&request, &context, Some(arguments))? {
            Resolution::Resolved(value) => downcast::<T>(value, request.type_info),
            Resolution::Deferred(deferred) => deferred.force(),
        }
    }

    /// Instances of every active scope that can be served as `I`, from the root scope to the innermost one
    #[must_use]
    pub fn resolve_all<I: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<I>> {
        let registry = self.effective_registry();
        let cached = self.inner.scopes.lock().snapshot();
        cached_as::<I>(&registry, &cached)
    }

    /// Resolves the dependencies declared by the signature and calls the function with them.
    /// The result isn't cached.
    ///
    /// # Errors
    /// See [`Self::resolve`], errors of the function are returned as [`ResolveErrorKind::Factory`]
    pub fn invoke<R, F>(&self, signature: &Signature, f: F) -> Result<R, ResolveErrorKind>
    where
        R: 'static,
        F: FnOnce(&mut Arguments) -> Result<R, InstantiateErrorKind>,
    {
        let owner = TypeInfo::of::<R>();
        let span = info_span!("invoke", returns = owner.name);
        let _guard = span.enter();

        let context = ResolutionContext::new();
        let dependencies = collect_dependencies(owner, signature, |_| false)?;
        let mut arguments = self.resolve_arguments(owner, dependencies, &context, &Arguments::new())?;

        f(&mut arguments).map_err(|err| factory_error(owner, err))
    }

    /// Whether an active scope holds an instance of the type
    #[inline]
    #[must_use]
    pub fn is_cached<I: ?Sized + 'static>(&self) -> bool {
        self.inner.scopes.lock().contains(&TypeInfo::of::<I>())
    }

    /// Pushes a new scope, returns the depth of it. The root scope is at depth 1.
    #[inline]
    pub fn push_scope(&self) -> usize {
        self.inner.scopes.lock().push()
    }

    /// Removes the innermost scope and runs finalizers of its instances
    ///
    /// # Errors
    /// [`ScopeErrorKind::PopRootScope`] if only the root scope is active
    pub fn pop_scope(&self) -> Result<(), ScopeErrorKind> {
        let mut scope = self.inner.scopes.lock().pop()?;
        scope.take_resolved_set().finalize();
        Ok(())
    }

    /// Pushes a new scope that's popped when the guard is dropped
    ///
    /// ```rust
    /// # use pluck::Container;
    /// let container = Container::new();
    /// {
    ///     let _scope = container.enter_scope();
    ///     assert_eq!(container.scope_depth(), 2);
    /// }
    /// assert_eq!(container.scope_depth(), 1);
    /// ```
    #[inline]
    pub fn enter_scope(&self) -> ScopeGuard {
        let depth = self.push_scope();
        ScopeGuard::new(self.clone(), depth)
    }

    #[inline]
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.inner.scopes.lock().depth()
    }

    /// Runs finalizers of the instances cached in the root scope, in LIFO order.
    ///
    /// # Warning
    /// This method can be called multiple times, but it only finalizes instances cached since the last call.
    pub fn close(&self) {
        let resolved = self.inner.scopes.lock().take_root_resolved();
        debug!(finalizers = resolved.len(), "Closing root scope");
        resolved.finalize();
    }

    /// Removes every registration, cached instances stay
    pub fn reset_registry(&self) {
        Arc::make_mut(&mut *self.inner.registry.write()).reset();
    }

    /// Removes every registration and every scope, finalizing the cached instances
    pub fn reset(&self) {
        self.reset_registry();
        let removed = self.inner.scopes.lock().reset();
        finalize_scopes(removed);
    }
}

impl Container {
    /// Top-level resolution of the request
    pub(crate) fn resolve_request<I: ?Sized + Send + Sync + 'static>(&self, request: &Request) -> Result<Arc<I>, ResolveErrorKind> {
        let context = ResolutionContext::new();
        match self.resolve_in(request, &context, None)? {
            Resolution::Resolved(value) => downcast::<I>(value, request.type_info),
            Resolution::Deferred(deferred) => deferred.force(),
        }
    }

    /// Resolves the request in the context, `overrides` bypass the cache
    fn resolve_in(&self, request: &Request, context: &ResolutionContext, overrides: Option<Arguments>) -> Result<Resolution, ResolveErrorKind> {
        let span = info_span!("resolve", dependency = request.type_info.name);
        let _guard = span.enter();

        if context.contains(&request.type_info) {
            return Ok(Resolution::Deferred(self.defer(*request, request.type_info, context, false)));
        }

        let registry = self.effective_registry();
        let resolvers = self.inner.resolvers.read().clone();
        let concrete = resolvers
            .resolve_type(request, &registry)
            .map_err(|err| err.with_path(context.snapshot()))?;

        if concrete != request.type_info && context.contains(&concrete) {
            return Ok(Resolution::Deferred(self.defer(*request, concrete, context, false)));
        }

        let default = if concrete == request.type_info {
            request.default_registration
        } else {
            None
        };
        let Some(registration) = registry.lookup(&concrete, default) else {
            let err = ResolveErrorKind::UnresolvedDependency {
                type_info: concrete,
                path: context.snapshot(),
            };
            error!("{}", err);
            return Err(err);
        };
        drop(registry);

        let cache_provides = registration.config().cache_provides && overrides.is_none();
        if cache_provides {
            if let Some(dependency) = self.inner.scopes.lock().get(&concrete) {
                debug!("Found in cache");
                return cast(&registration, &dependency, request.type_info).map(Resolution::Resolved);
            }
            debug!("Not found in cache");
        }

        let dependency = {
            let _path = context.enter(request.type_info, concrete);
            self.construct(&registration, context, overrides.unwrap_or_default())?
        };

        let dependency = if cache_provides {
            let dependency = self
                .inner
                .scopes
                .lock()
                .store(concrete, dependency, registration.finalizer.clone());
            debug!("Cached");
            dependency
        } else {
            dependency
        };

        cast(&registration, &dependency, request.type_info).map(Resolution::Resolved)
    }

    /// Resolves the dependencies of the registration and calls its factory
    fn construct(&self, registration: &Registration, context: &ResolutionContext, overrides: Arguments) -> Result<RcAny, ResolveErrorKind> {
        let type_info = registration.type_info();
        let dependencies = get_dependencies(&*self.inner.introspector, registration)?;
        let mut arguments = self.resolve_arguments(type_info, dependencies, context, &overrides)?;

        arguments.extend_fixed(registration.fixed.iter());
        for (name, value) in overrides.into_fixed() {
            arguments.insert(name, Argument::Fixed(value));
        }

        let mut instantiator = registration.instantiator.clone();
        instantiator.call(arguments).map_err(|err| factory_error(type_info, err))
    }

    fn resolve_arguments(
        &self,
        owner: TypeInfo,
        dependencies: Vec<Dependency>,
        context: &ResolutionContext,
        overrides: &Arguments,
    ) -> Result<Arguments, ResolveErrorKind> {
        let mut arguments = Arguments::new();

        for dependency in dependencies {
            if overrides.contains(dependency.name) {
                continue;
            }

            if let Some(Collector(collect)) = dependency.collector {
                let registry = self.effective_registry();
                let cached = self.inner.scopes.lock().snapshot();
                debug!(parameter = dependency.name, cached = cached.len(), "Collecting instances");
                arguments.insert(dependency.name, Argument::Resolved(collect(&registry, &cached)));
                continue;
            }

            if dependency.deferred {
                let deferred = self.defer(dependency.request(), owner, context, true);
                arguments.insert(dependency.name, Argument::Deferred(deferred));
                continue;
            }

            match self.resolve_in(&dependency.request(), context, None) {
                Ok(Resolution::Resolved(value)) => arguments.insert(dependency.name, Argument::Resolved(value)),
                Ok(Resolution::Deferred(deferred)) => arguments.insert(dependency.name, Argument::Deferred(deferred)),
                Err(err) if dependency.has_default && err.is_recoverable() => {
                    debug!(parameter = dependency.name, "Optional dependency isn't resolved, using default");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(arguments)
    }

    /// Registry as seen by resolution: registrations of added values layered over the container's ones
    fn effective_registry(&self) -> Arc<Registry> {
        let base = self.registry();
        self.inner.scopes.lock().overlay(base)
    }

    /// `explicit` marks a deferral requested by a parameter rather than one breaking a cycle
    fn defer(&self, request: Request, blocked_on: TypeInfo, context: &ResolutionContext, explicit: bool) -> Deferred {
        debug!(dependency = request.type_info.name, blocked_on = blocked_on.name, explicit, "Deferred");
        Deferred {
            container: Arc::downgrade(&self.inner),
            request,
            blocked_on,
            context: context.clone(),
            explicit,
        }
    }
}

fn cast(registration: &Registration, dependency: &RcAny, to: TypeInfo) -> Result<BoxAny, ResolveErrorKind> {
    registration.cast(dependency, &to).ok_or_else(|| {
        let err = ResolveErrorKind::IncorrectType {
            expected: to,
            actual: registration.type_info(),
        };
        error!("{}", err);
        err
    })
}

fn downcast<I: ?Sized + Send + Sync + 'static>(value: BoxAny, actual: TypeInfo) -> Result<Arc<I>, ResolveErrorKind> {
    value.downcast::<Arc<I>>().map(|value| *value).map_err(|_| {
        let err = ResolveErrorKind::IncorrectType {
            expected: TypeInfo::of::<I>(),
            actual,
        };
        error!("{}", err);
        err
    })
}

fn factory_error(type_info: TypeInfo, err: InstantiateErrorKind) -> ResolveErrorKind {
    let err = ResolveErrorKind::Factory {
        type_info,
        source: Box::new(err),
    };
    error!("{}", err);
    err
}
