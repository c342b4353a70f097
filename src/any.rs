use alloc::{boxed::Box, collections::BTreeMap, sync::Arc};
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

pub(crate) type RcAny = Arc<dyn Any + Send + Sync>;
pub(crate) type BoxAny = Box<dyn Any + Send + Sync>;

pub(crate) type Map = BTreeMap<TypeInfo, RcAny>;

/// Identity of a type as seen by the container.
///
/// Equality and ordering use only the [`TypeId`], the name is kept for logs and errors.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Name without the module path. Generic arguments are kept.
    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let name = self.name.split('<').next().unwrap_or(self.name);
        let short = name.rsplit_once("::").map_or(name, |(_, short)| short);
        if name.len() == self.name.len() {
            short
        } else {
            let offset = name.len() - short.len();
            &self.name[offset..]
        }
    }
}
