#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub(crate) mod analyzer;
pub(crate) mod any;
pub(crate) mod arguments;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod global;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod service;

pub use analyzer::{get_dependencies, DeclaredSignature, ExplicitSignatures, SignatureIntrospector};
pub use any::TypeInfo;
pub use arguments::Arguments;
pub use config::Config;
pub use container::{Container, ContainerBuilder};
pub use context::ResolutionPath;
pub use dependency::{Dependency, Parameter, Signature};
pub use errors::{AnalysisErrorKind, InstantiateErrorKind, ResolveErrorKind, ScopeErrorKind};
pub use finalizer::Finalizer;
pub use global::{global, reset_global};
pub use inject::{Inject, Lazy};
pub use instantiator::{Injectable, Instantiator};
pub use registry::{instance, provide, provide_with, Provider, Registration, Registry};
pub use resolver::{Attempt, ExactMatch, Position, PriorAttempt, Request, ResolverChain, ResolverStrategy, SubtypeSearch};
pub use scope::ScopeGuard;
