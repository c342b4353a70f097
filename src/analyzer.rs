use alloc::{collections::BTreeMap, vec::Vec};
use tracing::error;

use crate::{
    any::TypeInfo,
    dependency::{Dependency, Signature},
    errors::AnalysisErrorKind,
    registry::Registration,
};

/// Source of constructor signatures
pub trait SignatureIntrospector: Send + Sync + 'static {
    /// # Errors
    /// [`AnalysisErrorKind::Uninspectable`] if there's no signature for the registered type
    fn introspect(&self, registration: &Registration) -> Result<Signature, AnalysisErrorKind>;
}

/// Uses the signature declared with the registration
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredSignature;

impl SignatureIntrospector for DeclaredSignature {
    #[inline]
    fn introspect(&self, registration: &Registration) -> Result<Signature, AnalysisErrorKind> {
        Ok(registration.signature().clone())
    }
}

/// Signatures kept apart from registrations.
/// Types without an entry can't be introspected.
#[derive(Debug, Clone, Default)]
pub struct ExplicitSignatures {
    signatures: BTreeMap<TypeInfo, Signature>,
}

impl ExplicitSignatures {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signatures: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with<T: ?Sized + 'static>(mut self, signature: Signature) -> Self {
        self.insert::<T>(signature);
        self
    }

    #[inline]
    pub fn insert<T: ?Sized + 'static>(&mut self, signature: Signature) -> Option<Signature> {
        self.signatures.insert(TypeInfo::of::<T>(), signature)
    }
}

impl SignatureIntrospector for ExplicitSignatures {
    fn introspect(&self, registration: &Registration) -> Result<Signature, AnalysisErrorKind> {
        self.signatures
            .get(&registration.type_info())
            .cloned()
            .ok_or(AnalysisErrorKind::Uninspectable {
                type_info: registration.type_info(),
            })
    }
}

/// Dependencies the container has to resolve to build the registered type, in declaration order.
///
/// Untyped parameters and parameters supplied by fixed arguments are skipped.
///
/// # Errors
/// - [`AnalysisErrorKind::Uninspectable`] if the introspector has no signature for the type
/// - [`AnalysisErrorKind::DuplicateParameter`] if a parameter name is declared twice
pub fn get_dependencies(introspector: &dyn SignatureIntrospector, registration: &Registration) -> Result<Vec<Dependency>, AnalysisErrorKind> {
    let signature = introspector.introspect(registration).map_err(|err| {
        error!("{}", err);
        err
    })?;

    collect_dependencies(registration.type_info(), &signature, |name| registration.has_fixed_argument(name))
}

/// Typed parameters of the signature that aren't supplied in advance
pub(crate) fn collect_dependencies(
    owner: TypeInfo,
    signature: &Signature,
    is_supplied: impl Fn(&str) -> bool,
) -> Result<Vec<Dependency>, AnalysisErrorKind> {
    let parameters = signature.parameters();
    let mut dependencies = Vec::with_capacity(parameters.len());

    for (index, parameter) in parameters.iter().enumerate() {
        if parameters[..index].iter().any(|prior| prior.name == parameter.name) {
            let err = AnalysisErrorKind::DuplicateParameter {
                type_info: owner,
                name: parameter.name,
            };
            error!("{}", err);
            return Err(err);
        }

        let Some(type_info) = parameter.type_info else {
            continue;
        };
        if is_supplied(parameter.name) {
            continue;
        }

        dependencies.push(Dependency {
            name: parameter.name,
            type_info,
            has_default: parameter.has_default,
            deferred: parameter.deferred,
            qualifier: parameter.qualifier,
            default_registration: parameter.default_registration,
            collector: parameter.collector,
        });
    }

    Ok(dependencies)
}
