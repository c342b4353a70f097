use alloc::{sync::Arc, vec::Vec};
use tracing::{debug, error};

use crate::{
    any::{RcAny, TypeInfo},
    cache::{Cache, ResolvedSet},
    container::Container,
    errors::ScopeErrorKind,
    finalizer::BoxedCloneFinalizer,
    registry::{Registration, Registry},
};

/// Stack of scope caches, the root scope is at the bottom and is never popped
pub(crate) struct ScopeStack {
    scopes: Vec<Cache>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    #[must_use]
    pub(crate) fn new() -> Self {
        let mut scopes = Vec::with_capacity(4);
        scopes.push(Cache::new());
        Self { scopes }
    }

    /// Pushes an empty scope, returns the new depth
    pub(crate) fn push(&mut self) -> usize {
        self.scopes.push(Cache::new());
        debug!(depth = self.scopes.len(), "Scope pushed");
        self.scopes.len()
    }

    /// Removes the innermost scope
    ///
    /// # Errors
    /// [`ScopeErrorKind::PopRootScope`] if only the root scope is left
    pub(crate) fn pop(&mut self) -> Result<Cache, ScopeErrorKind> {
        if self.scopes.len() == 1 {
            let err = ScopeErrorKind::PopRootScope;
            error!("{}", err);
            return Err(err);
        }

        let scope = self.scopes.pop().ok_or(ScopeErrorKind::PopRootScope)?;
        debug!(depth = self.scopes.len(), cached = scope.len(), "Scope popped");
        Ok(scope)
    }

    /// Removes scopes above the depth, returns them innermost first.
    /// The root scope is kept even if the depth is zero.
    pub(crate) fn truncate(&mut self, depth: usize) -> Vec<Cache> {
        let depth = depth.max(1);
        let mut popped = Vec::new();
        while self.scopes.len() > depth {
            if let Some(scope) = self.scopes.pop() {
                popped.push(scope);
            }
        }
        if !popped.is_empty() {
            debug!(depth, popped = popped.len(), "Scopes truncated");
        }
        popped
    }

    /// Replaces every scope with a fresh root, returns the removed ones innermost first
    pub(crate) fn reset(&mut self) -> Vec<Cache> {
        let mut removed = self.truncate(1);
        removed.extend(self.scopes.pop());
        self.scopes.push(Cache::new());
        removed
    }

    #[inline]
    #[must_use]
    pub(crate) fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Searches from the innermost scope to the root
    #[must_use]
    pub(crate) fn get(&self, type_info: &TypeInfo) -> Option<RcAny> {
        self.scopes.iter().rev().find_map(|scope| scope.get(type_info))
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, type_info: &TypeInfo) -> bool {
        self.scopes.iter().any(|scope| scope.contains(type_info))
    }

    /// Stores into the innermost scope, see [`Cache::store`]
    pub(crate) fn store(&mut self, type_info: TypeInfo, dependency: RcAny, finalizer: Option<BoxedCloneFinalizer>) -> RcAny {
        match self.scopes.last_mut() {
            Some(scope) => scope.store(type_info, dependency, finalizer),
            None => dependency,
        }
    }

    /// Adds a built value to the innermost scope, see [`Cache::add`]
    pub(crate) fn add(&mut self, registration: Registration, dependency: RcAny) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.add(registration, dependency);
        }
    }

    /// Registry with the registrations of added values layered over it, inner scopes win
    #[must_use]
    pub(crate) fn overlay(&self, base: Arc<Registry>) -> Arc<Registry> {
        let mut scoped = self.scopes.iter().flat_map(Cache::registrations).peekable();
        if scoped.peek().is_none() {
            return base;
        }

        let mut registry = (*base).clone();
        for registration in scoped {
            registry.register(registration.clone());
        }
        Arc::new(registry)
    }

    /// Takes the finalizable instances of the root scope, the cached instances stay
    pub(crate) fn take_root_resolved(&mut self) -> ResolvedSet {
        self.scopes.first_mut().map(Cache::take_resolved_set).unwrap_or_default()
    }

    /// Cached instances of every scope, from the root to the innermost one
    #[must_use]
    pub(crate) fn snapshot(&self) -> Vec<(TypeInfo, RcAny)> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.iter().map(|(type_info, dependency)| (*type_info, dependency.clone())))
            .collect()
    }
}

/// Cached instances that the registry can serve as `I`, in the order of `cached`
#[must_use]
pub(crate) fn cached_as<I: ?Sized + Send + Sync + 'static>(registry: &Registry, cached: &[(TypeInfo, RcAny)]) -> Vec<Arc<I>> {
    let target = TypeInfo::of::<I>();
    cached
        .iter()
        .filter_map(|(type_info, dependency)| registry.get(type_info)?.cast(dependency, &target))
        .filter_map(|value| value.downcast::<Arc<I>>().ok().map(|value| *value))
        .collect()
}

/// Runs finalizers of removed scopes, innermost scope first
pub(crate) fn finalize_scopes(scopes: Vec<Cache>) {
    for mut scope in scopes {
        scope.take_resolved_set().finalize();
    }
}

/// Active scope of a container.
/// Dropping the guard pops its scope and every scope pushed above it, running their finalizers.
#[must_use = "the scope is popped when the guard is dropped"]
pub struct ScopeGuard {
    container: Container,
    depth: usize,
}

impl ScopeGuard {
    #[inline]
    pub(crate) const fn new(container: Container, depth: usize) -> Self {
        Self { container, depth }
    }

    /// Depth of the guarded scope, the root scope is at depth 1
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let popped = self.container.inner.scopes.lock().truncate(self.depth - 1);
        finalize_scopes(popped);
        debug!(depth = self.depth, "Scope guard dropped");
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{cached_as, ScopeStack};
    use crate::{
        any::TypeInfo,
        errors::ScopeErrorKind,
        registry::{instance, Registry},
    };

    use alloc::sync::Arc;

    #[test]
    fn test_lookup_innermost_first() {
        let mut stack = ScopeStack::new();
        let type_info = TypeInfo::of::<u8>();

        stack.store(type_info, Arc::new(1u8), None);
        assert_eq!(stack.push(), 2);
        assert_eq!(*stack.get(&type_info).unwrap().downcast::<u8>().unwrap(), 1);

        stack.store(type_info, Arc::new(2u8), None);
        assert_eq!(*stack.get(&type_info).unwrap().downcast::<u8>().unwrap(), 2);

        let popped = stack.pop().unwrap();
        assert_eq!(popped.len(), 1);
        assert_eq!(*stack.get(&type_info).unwrap().downcast::<u8>().unwrap(), 1);
    }

    #[test]
    fn test_pop_root_scope() {
        let mut stack = ScopeStack::new();
        assert_eq!(stack.pop().err(), Some(ScopeErrorKind::PopRootScope));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_truncate_keeps_root() {
        let mut stack = ScopeStack::new();
        stack.push();
        stack.push();
        stack.store(TypeInfo::of::<u8>(), Arc::new(1u8), None);

        assert_eq!(stack.truncate(0).len(), 2);
        assert_eq!(stack.depth(), 1);
        assert!(!stack.contains(&TypeInfo::of::<u8>()));

        stack.store(TypeInfo::of::<u8>(), Arc::new(1u8), None);
        assert_eq!(stack.reset().len(), 1);
        assert_eq!(stack.depth(), 1);
        assert!(stack.get(&TypeInfo::of::<u8>()).is_none());
    }

    #[test]
    fn test_overlay_added_registrations() {
        let base = Arc::new(Registry::new());
        let mut stack = ScopeStack::new();
        assert!(Arc::ptr_eq(&stack.overlay(base.clone()), &base));

        stack.add(instance(1u8).into(), Arc::new(1u8));
        stack.push();
        stack.add(instance(2u8).into(), Arc::new(2u8));
        stack.add(instance(3u16).into(), Arc::new(3u16));

        let registry = stack.overlay(base.clone());
        assert_eq!(registry.len(), 2);
        assert!(base.is_empty());

        let all = cached_as::<u8>(&registry, &stack.snapshot());
        assert_eq!(all.iter().map(|value| **value).collect::<alloc::vec::Vec<_>>(), [1, 2]);

        stack.pop().unwrap();
        let registry = stack.overlay(base);
        assert!(registry.contains(&TypeInfo::of::<u8>()));
        assert!(!registry.contains(&TypeInfo::of::<u16>()));
    }
}
