use alloc::{sync::Arc, vec::Vec};
use core::fmt::{self, Display, Formatter};
use parking_lot::Mutex;

use crate::any::TypeInfo;

/// Chain of types being constructed, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPath(pub Vec<TypeInfo>);

impl ResolutionPath {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_info: &TypeInfo) -> bool {
        self.0.contains(type_info)
    }
}

impl Display for ResolutionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<top level>");
        }
        for (index, type_info) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{type_info}")?;
        }
        Ok(())
    }
}

/// Types currently under construction for one top-level request.
///
/// Each top-level resolution creates its own context, so unrelated requests never see each other's path.
/// The path is shared with deferred references created during the request,
/// which lets them detect being forced before their target is built.
#[derive(Clone, Default)]
pub(crate) struct ResolutionContext {
    path: Arc<Mutex<Vec<TypeInfo>>>,
}

impl ResolutionContext {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, type_info: &TypeInfo) -> bool {
        self.path.lock().contains(type_info)
    }

    #[inline]
    #[must_use]
    pub(crate) fn snapshot(&self) -> ResolutionPath {
        ResolutionPath(self.path.lock().clone())
    }

    /// Marks the types as in progress until the returned guard is dropped
    #[must_use]
    pub(crate) fn enter(&self, requested: TypeInfo, concrete: TypeInfo) -> PathGuard {
        let mut path = self.path.lock();
        let len = path.len();
        path.push(requested);
        if concrete != requested {
            path.push(concrete);
        }

        PathGuard {
            path: self.path.clone(),
            len,
        }
    }
}

pub(crate) struct PathGuard {
    path: Arc<Mutex<Vec<TypeInfo>>>,
    len: usize,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.path.lock().truncate(self.len);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{ResolutionContext, ResolutionPath};
    use crate::any::TypeInfo;

    use alloc::{string::ToString as _, vec};

    struct A;
    struct B;
    trait Port {}

    #[test]
    fn test_enter_marks_until_guard_dropped() {
        let context = ResolutionContext::new();
        let a = TypeInfo::of::<A>();
        let b = TypeInfo::of::<B>();
        let port = TypeInfo::of::<dyn Port>();

        {
            let _outer = context.enter(a, a);
            {
                let _inner = context.enter(port, b);
                assert!(context.contains(&port));
                assert!(context.contains(&b));
                assert_eq!(context.snapshot(), ResolutionPath(vec![a, port, b]));
            }
            assert!(!context.contains(&b));
            assert!(context.contains(&a));
        }
        assert!(context.snapshot().is_empty());
    }

    #[test]
    fn test_path_display() {
        let path = ResolutionPath(vec![TypeInfo::of::<A>(), TypeInfo::of::<B>(), TypeInfo::of::<A>()]);
        assert_eq!(path.to_string(), "A -> B -> A");
        assert_eq!(ResolutionPath::default().to_string(), "<top level>");
    }
}
