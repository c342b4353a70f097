mod analysis;
mod instantiate;
mod resolve;
mod scope;

pub use analysis::AnalysisErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use resolve::ResolveErrorKind;
pub use scope::ScopeErrorKind;
