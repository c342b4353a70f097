#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeErrorKind {
    #[error("Root scope can't be popped, it lives as long as the container")]
    PopRootScope,
}
