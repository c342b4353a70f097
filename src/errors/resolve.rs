use alloc::{boxed::Box, vec::Vec};
use core::fmt::{self, Display, Formatter};

use super::{AnalysisErrorKind, InstantiateErrorKind};
use crate::{any::TypeInfo, context::ResolutionPath};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No concrete type can be resolved for {type_info} (path: {path})")]
    UnresolvedDependency { type_info: TypeInfo, path: ResolutionPath },
    #[error("Several concrete types can be resolved for {type_info}: {}", Candidates(.candidates))]
    AmbiguousDependency { type_info: TypeInfo, candidates: Vec<TypeInfo> },
    #[error(transparent)]
    Analysis(#[from] AnalysisErrorKind),
    #[error("Deferred {type_info} was accessed while it's still being constructed (path: {path})")]
    CyclicDependency { type_info: TypeInfo, path: ResolutionPath },
    #[error("Resolved {actual} can't be provided as {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error("Deferred {type_info} was accessed while its owner {owner} is still being constructed (path: {path})")]
    EarlyAccess {
        type_info: TypeInfo,
        owner: TypeInfo,
        path: ResolutionPath,
    },
    #[error("Container of deferred {type_info} was dropped")]
    ContainerDropped { type_info: TypeInfo },
    #[error("Factory of {type_info} failed: {source}")]
    Factory {
        type_info: TypeInfo,
        #[source]
        source: Box<InstantiateErrorKind>,
    },
}

impl ResolveErrorKind {
    /// Whether an optional dependency may fall back to its default on this error
    #[inline]
    #[must_use]
    pub(crate) const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnresolvedDependency { .. } | Self::AmbiguousDependency { .. })
    }

    #[must_use]
    pub(crate) fn with_path(self, path: ResolutionPath) -> Self {
        match self {
            Self::UnresolvedDependency { type_info, path: current } if current.is_empty() => Self::UnresolvedDependency { type_info, path },
            err => err,
        }
    }
}

struct Candidates<'a>(&'a [TypeInfo]);

impl Display for Candidates<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, candidate) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{candidate}")?;
        }
        Ok(())
    }
}
