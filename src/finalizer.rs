use alloc::sync::Arc;
use tracing::error;

use crate::{
    any::{RcAny, TypeInfo},
    service::{service_fn, BoxCloneService},
};

/// Called for a cached instance when the scope holding it is closed.
///
/// Finalizers of one scope run in LIFO order of resolution, not of registration.
/// Transient instances aren't tracked, so their finalizers never run.
pub trait Finalizer<Dep>: Clone + Send + Sync + 'static {
    fn finalize(&mut self, dependency: Arc<Dep>);
}

impl<F, Dep> Finalizer<Dep> for F
where
    F: FnMut(Arc<Dep>) + Clone + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&mut self, dependency: Arc<Dep>) {
        self(dependency);
    }
}

pub(crate) type BoxedCloneFinalizer = BoxCloneService<RcAny, (), ()>;

#[must_use]
pub(crate) fn boxed_finalizer<Dep, Fin>(mut finalizer: Fin) -> BoxedCloneFinalizer
where
    Dep: Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    BoxCloneService::new(service_fn(move |dependency: RcAny| match dependency.downcast::<Dep>() {
        Ok(dependency) => {
            finalizer.finalize(dependency);
            Ok(())
        }
        Err(_) => {
            error!(dependency = TypeInfo::of::<Dep>().name, "Finalizer received an instance of another type");
            Err(())
        }
    }))
}
