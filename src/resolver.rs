use alloc::{sync::Arc, vec, vec::Vec};
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    context::ResolutionPath,
    errors::ResolveErrorKind,
    instantiator::Injectable,
    registry::{default_registration, DefaultRegistration, Registration, Registry},
};

/// A requested type, optionally narrowed by a name
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub type_info: TypeInfo,
    pub qualifier: Option<&'static str>,
    pub(crate) default_registration: Option<DefaultRegistration>,
}

impl Request {
    /// Request of a concrete injectable type
    #[inline]
    #[must_use]
    pub fn of<T: Injectable>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: None,
            default_registration: Some(default_registration::<T>),
        }
    }

    /// Request of a type that can only be served by registrations
    #[inline]
    #[must_use]
    pub fn of_dyn<I: ?Sized + 'static>() -> Self {
        Self {
            type_info: TypeInfo::of::<I>(),
            qualifier: None,
            default_registration: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn qualified(mut self, qualifier: &'static str) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Whether the type can be built without a registration
    #[inline]
    #[must_use]
    pub const fn is_injectable(&self) -> bool {
        self.default_registration.is_some()
    }

    #[inline]
    fn accepts(&self, registration: &Registration) -> bool {
        self.qualifier.map_or(true, |qualifier| registration.matches_name(qualifier))
    }
}

/// Outcome of one resolver strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Resolved(TypeInfo),
    Declined,
    Ambiguous(Vec<TypeInfo>),
}

/// Attempt made by an earlier strategy of the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorAttempt {
    pub strategy: &'static str,
    pub attempt: Attempt,
}

/// Rule mapping a requested type to the concrete type that will be built.
///
/// Closures of the shape `Fn(&Request, &Registry, &[PriorAttempt]) -> Attempt` implement it too.
pub trait ResolverStrategy: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn resolve_type(&self, request: &Request, registry: &Registry, attempts: &[PriorAttempt]) -> Attempt;
}

impl<F> ResolverStrategy for F
where
    F: Fn(&Request, &Registry, &[PriorAttempt]) -> Attempt + Send + Sync + 'static,
{
    #[inline]
    fn resolve_type(&self, request: &Request, registry: &Registry, attempts: &[PriorAttempt]) -> Attempt {
        self(request, registry, attempts)
    }
}

/// Resolves a type to itself if it's registered or injectable.
/// A qualifier must match the registration's name or alias, or the short type name of an unregistered type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl ResolverStrategy for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn resolve_type(&self, request: &Request, registry: &Registry, _attempts: &[PriorAttempt]) -> Attempt {
        let type_info = request.type_info;
        let accepted = match registry.get(&type_info) {
            Some(registration) => request.accepts(registration),
            None if request.is_injectable() => request.qualifier.map_or(true, |qualifier| type_info.short_name() == qualifier),
            None => false,
        };

        if accepted {
            Attempt::Resolved(type_info)
        } else {
            Attempt::Declined
        }
    }
}

/// Resolves a type to the registration bound to it, see [`crate::Provider::bind`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtypeSearch;

impl ResolverStrategy for SubtypeSearch {
    fn name(&self) -> &'static str {
        "subtype"
    }

    fn resolve_type(&self, request: &Request, registry: &Registry, _attempts: &[PriorAttempt]) -> Attempt {
        let mut candidates = registry
            .candidates(&request.type_info)
            .filter(|registration| request.accepts(registration))
            .map(Registration::type_info);

        match (candidates.next(), candidates.next()) {
            (None, _) => Attempt::Declined,
            (Some(candidate), None) => Attempt::Resolved(candidate),
            (Some(first), Some(second)) => {
                let mut all = vec![first, second];
                all.extend(candidates);
                Attempt::Ambiguous(all)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Start,
    End,
}

/// Ordered resolver strategies, the first resolved attempt wins
#[derive(Clone)]
pub struct ResolverChain {
    strategies: Vec<Arc<dyn ResolverStrategy>>,
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverChain {
    /// Chain of [`ExactMatch`] and [`SubtypeSearch`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: vec![Arc::new(ExactMatch), Arc::new(SubtypeSearch)],
        }
    }

    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self { strategies: Vec::new() }
    }

    #[inline]
    #[must_use]
    pub fn with(mut self, strategy: impl ResolverStrategy, position: Position) -> Self {
        self.add(strategy, position);
        self
    }

    pub fn add(&mut self, strategy: impl ResolverStrategy, position: Position) {
        let strategy = Arc::new(strategy);
        match position {
            Position::Start => self.strategies.insert(0, strategy),
            Position::End => self.strategies.push(strategy),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs the strategies in order until one of them resolves the request.
    /// Ambiguous attempts don't stop the chain, a later strategy may break the tie.
    ///
    /// # Errors
    /// - [`ResolveErrorKind::AmbiguousDependency`] if nothing resolved and some attempt was ambiguous
    /// - [`ResolveErrorKind::UnresolvedDependency`] otherwise, with an empty path
    pub fn resolve_type(&self, request: &Request, registry: &Registry) -> Result<TypeInfo, ResolveErrorKind> {
        let mut attempts: Vec<PriorAttempt> = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let attempt = strategy.resolve_type(request, registry, &attempts);
            if let Attempt::Resolved(concrete) = attempt {
                debug!(strategy = strategy.name(), concrete = concrete.name, "Resolved type");
                return Ok(concrete);
            }
            attempts.push(PriorAttempt {
                strategy: strategy.name(),
                attempt,
            });
        }

        let ambiguous = attempts.into_iter().find_map(|prior| match prior.attempt {
            Attempt::Ambiguous(candidates) => Some(candidates),
            Attempt::Resolved(_) | Attempt::Declined => None,
        });

        let err = match ambiguous {
            Some(candidates) => ResolveErrorKind::AmbiguousDependency {
                type_info: request.type_info,
                candidates,
            },
            None => ResolveErrorKind::UnresolvedDependency {
                type_info: request.type_info,
                path: ResolutionPath::default(),
            },
        };
        error!("{}", err);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{Attempt, PriorAttempt, Position, Request, ResolverChain};
    use crate::{
        any::TypeInfo,
        arguments::Arguments,
        dependency::Signature,
        errors::{InstantiateErrorKind, ResolveErrorKind},
        instantiator::Injectable,
        registry::{instance, Registry},
    };

    use alloc::vec;
    use tracing_test::traced_test;

    trait Animal: Send + Sync {}

    #[derive(Clone)]
    struct Dog;
    #[derive(Clone)]
    struct Cat;

    impl Animal for Dog {}
    impl Animal for Cat {}

    struct Kennel;

    impl Injectable for Kennel {
        fn signature() -> Signature {
            Signature::new()
        }

        fn construct(_: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
            Ok(Self)
        }
    }

    fn animals() -> Registry {
        let mut registry = Registry::new();
        registry.register(instance(Dog).bind::<dyn Animal>(|dog| dog));
        registry.register(instance(Cat).bind::<dyn Animal>(|cat| cat).named("tom"));
        registry
    }

    #[test]
    fn test_exact_match() {
        let chain = ResolverChain::new();
        let registry = Registry::new();

        assert_eq!(chain.resolve_type(&Request::of::<Kennel>(), &registry).unwrap(), TypeInfo::of::<Kennel>());
        assert_eq!(
            chain.resolve_type(&Request::of::<Kennel>().qualified("Kennel"), &registry).unwrap(),
            TypeInfo::of::<Kennel>()
        );
        assert!(matches!(
            chain.resolve_type(&Request::of::<Kennel>().qualified("barn"), &registry),
            Err(ResolveErrorKind::UnresolvedDependency { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_subtype_ambiguity() {
        let chain = ResolverChain::new();
        let registry = animals();
        let request = Request::of_dyn::<dyn Animal>();

        let Err(ResolveErrorKind::AmbiguousDependency { type_info, candidates }) = chain.resolve_type(&request, &registry) else {
            panic!("expected ambiguity");
        };
        assert_eq!(type_info, TypeInfo::of::<dyn Animal>());
        assert_eq!(candidates.len(), 2);

        assert_eq!(chain.resolve_type(&request.qualified("tom"), &registry).unwrap(), TypeInfo::of::<Cat>());
        assert_eq!(chain.resolve_type(&request.qualified("Dog"), &registry).unwrap(), TypeInfo::of::<Dog>());
    }

    #[test]
    fn test_unbound_abstract_type() {
        let chain = ResolverChain::new();
        let registry = Registry::new();

        assert!(matches!(
            chain.resolve_type(&Request::of_dyn::<dyn Animal>(), &registry),
            Err(ResolveErrorKind::UnresolvedDependency { .. })
        ));
    }

    #[test]
    fn test_custom_strategy_breaks_tie() {
        let chain = ResolverChain::new().with(
            |request: &Request, _: &Registry, attempts: &[PriorAttempt]| {
                let tie = attempts.iter().any(|prior| matches!(prior.attempt, Attempt::Ambiguous(_)));
                if tie && request.type_info == TypeInfo::of::<dyn Animal>() {
                    Attempt::Resolved(TypeInfo::of::<Dog>())
                } else {
                    Attempt::Declined
                }
            },
            Position::End,
        );

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.resolve_type(&Request::of_dyn::<dyn Animal>(), &animals()).unwrap(), TypeInfo::of::<Dog>());
    }

    #[test]
    fn test_strategy_at_start_sees_no_attempts() {
        let chain = ResolverChain::new().with(
            |_: &Request, _: &Registry, attempts: &[PriorAttempt]| {
                assert!(attempts.is_empty());
                Attempt::Resolved(TypeInfo::of::<Cat>())
            },
            Position::Start,
        );

        assert_eq!(chain.resolve_type(&Request::of::<Kennel>(), &animals()).unwrap(), TypeInfo::of::<Cat>());
    }

    #[test]
    fn test_attempts_are_passed_along() {
        let chain = ResolverChain::new().with(
            |_: &Request, _: &Registry, attempts: &[PriorAttempt]| {
                assert_eq!(
                    attempts.iter().map(|prior| prior.strategy).collect::<std::vec::Vec<_>>(),
                    vec!["exact", "subtype"]
                );
                Attempt::Declined
            },
            Position::End,
        );

        assert!(chain.resolve_type(&Request::of_dyn::<dyn Animal>(), &Registry::new()).is_err());
    }
}
