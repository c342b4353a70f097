/// Error returned by a factory.
///
/// Factories may return any error convertible to [`anyhow::Error`] through [`InstantiateErrorKind::Custom`].
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Argument `{name}` wasn't supplied")]
    MissingArgument { name: &'static str },
    #[error("Argument `{name}` isn't of expected type {expected}")]
    IncorrectArgumentType { name: &'static str, expected: &'static str },
    #[error("Argument `{name}` is deferred, use `Arguments::take` to accept a deferred reference")]
    DeferredArgument { name: &'static str },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
