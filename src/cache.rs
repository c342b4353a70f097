use alloc::{collections::BTreeMap, vec::Vec};
use core::mem;
use tracing::debug;

use crate::{
    any::{self, RcAny, TypeInfo},
    finalizer::BoxedCloneFinalizer,
    registry::Registration,
    service::Service as _,
};

/// Instances cached by one scope
#[derive(Default)]
pub(crate) struct Cache {
    map: any::Map,
    resolved: ResolvedSet,
    /// Registrations of values added to this scope, they go away with it
    registrations: BTreeMap<TypeInfo, Registration>,
}

impl Cache {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, type_info: &TypeInfo) -> Option<RcAny> {
        self.map.get(type_info).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, type_info: &TypeInfo) -> bool {
        self.map.contains_key(type_info)
    }

    /// Stores the instance unless the scope already holds one of the type.
    /// Returns the instance that ends up in the scope.
    pub(crate) fn store(&mut self, type_info: TypeInfo, dependency: RcAny, finalizer: Option<BoxedCloneFinalizer>) -> RcAny {
        if let Some(existing) = self.map.get(&type_info) {
            debug!(dependency = type_info.name, "Instance was stored concurrently, keeping the stored one");
            return existing.clone();
        }

        self.map.insert(type_info, dependency.clone());
        if let Some(finalizer) = finalizer {
            self.resolved.push(Resolved {
                type_info,
                dependency: dependency.clone(),
                finalizer,
            });
        }
        dependency
    }

    /// Stores an already built value together with the registration it's served by
    pub(crate) fn add(&mut self, registration: Registration, dependency: RcAny) {
        let type_info = registration.type_info();
        self.map.insert(type_info, dependency);
        self.registrations.insert(type_info, registration);
    }

    pub(crate) fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.values()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&TypeInfo, &RcAny)> {
        self.map.iter()
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub(crate) fn take_resolved_set(&mut self) -> ResolvedSet {
        mem::take(&mut self.resolved)
    }
}

/// Cached instance that has a finalizer
pub(crate) struct Resolved {
    pub(crate) type_info: TypeInfo,
    pub(crate) dependency: RcAny,
    pub(crate) finalizer: BoxedCloneFinalizer,
}

/// Finalizable instances in order of resolution
#[derive(Default)]
pub(crate) struct ResolvedSet(pub(crate) Vec<Resolved>);

impl ResolvedSet {
    #[inline]
    pub(crate) fn push(&mut self, resolved: Resolved) {
        self.0.push(resolved);
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Runs finalizers, the last resolved instance first
    pub(crate) fn finalize(self) {
        for Resolved {
            type_info,
            dependency,
            mut finalizer,
        } in self.0.into_iter().rev()
        {
            if finalizer.call(dependency).is_ok() {
                debug!(dependency = type_info.name, "Finalizer called");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::Cache;
    use crate::{
        any::{RcAny, TypeInfo},
        finalizer::boxed_finalizer,
        registry::instance,
    };

    use alloc::{sync::Arc, vec::Vec};
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    #[test]
    fn test_first_store_wins() {
        let mut cache = Cache::new();
        let type_info = TypeInfo::of::<u8>();

        let first = cache.store(type_info, Arc::new(1u8), None);
        let second = cache.store(type_info, Arc::new(2u8), None);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*cache.get(&type_info).unwrap().downcast::<u8>().unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_finalize_lifo() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let finalizer = |order: Arc<Mutex<Vec<u8>>>| {
            boxed_finalizer(move |value: Arc<u8>| {
                order.lock().push(*value);
            })
        };

        let mut cache = Cache::new();
        cache.store(TypeInfo::of::<u8>(), Arc::new(1u8) as RcAny, Some(finalizer(order.clone())));
        cache.store(TypeInfo::of::<u16>(), Arc::new(7u16) as RcAny, None);
        cache.add(instance(3u32).into(), Arc::new(3u32));
        assert_eq!(cache.registrations().count(), 1);

        let resolved = cache.take_resolved_set();
        assert_eq!(resolved.len(), 1);
        resolved.finalize();
        assert!(cache.take_resolved_set().0.is_empty());

        assert_eq!(*order.lock(), [1]);
        assert!(logs_contain("Finalizer called"));
    }
}
