use alloc::sync::Arc;
use tracing::debug;

use crate::{
    any::RcAny,
    arguments::Arguments,
    dependency::Signature,
    errors::InstantiateErrorKind,
    service::{service_fn, BoxCloneService},
};

/// A type that the container can build without a registration.
///
/// [`Injectable::signature`] declares the constructor parameters,
/// the container resolves them and passes the result to [`Injectable::construct`].
///
/// ```rust
/// use pluck::{Arguments, Container, Inject, Injectable, InstantiateErrorKind, Parameter, Signature};
///
/// struct Database;
///
/// impl Injectable for Database {
///     fn signature() -> Signature {
///         Signature::new()
///     }
///
///     fn construct(_: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
///         Ok(Self)
///     }
/// }
///
/// struct UserRepo {
///     database: Inject<Database>,
/// }
///
/// impl Injectable for UserRepo {
///     fn signature() -> Signature {
///         Signature::new().param(Parameter::of::<Database>("database"))
///     }
///
///     fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
///         Ok(Self {
///             database: arguments.take("database")?,
///         })
///     }
/// }
///
/// let container = Container::new();
/// let repo = container.resolve::<UserRepo>().unwrap();
/// assert!(!repo.database.is_deferred());
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    fn signature() -> Signature;

    /// # Errors
    /// Returns an error if an argument is missing or invalid, or construction itself fails
    fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind>;
}

/// A factory of a registration
pub trait Instantiator: Clone + Send + Sync + 'static {
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns an error if the instance can't be built
    fn instantiate(&mut self, arguments: &mut Arguments) -> Result<Self::Provides, Self::Error>;
}

impl<F, Response, Err> Instantiator for F
where
    F: FnMut(&mut Arguments) -> Result<Response, Err> + Clone + Send + Sync + 'static,
    Response: Send + Sync + 'static,
    Err: Into<InstantiateErrorKind>,
{
    type Provides = Response;
    type Error = Err;

    #[inline]
    fn instantiate(&mut self, arguments: &mut Arguments) -> Result<Self::Provides, Self::Error> {
        self(arguments)
    }
}

pub(crate) type BoxedCloneInstantiator = BoxCloneService<Arguments, RcAny, InstantiateErrorKind>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst>(mut instantiator: Inst) -> BoxedCloneInstantiator
where
    Inst: Instantiator,
{
    BoxCloneService::new(service_fn(move |mut arguments: Arguments| {
        let dependency = instantiator.instantiate(&mut arguments).map_err(Into::into)?;
        if !arguments.is_empty() {
            debug!(unused = arguments.len(), "Instantiated with unused arguments");
        }
        Ok(Arc::new(dependency) as RcAny)
    }))
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{boxed_instantiator, Injectable};
    use crate::{
        arguments::{Argument, Arguments},
        dependency::{Parameter, Signature},
        errors::InstantiateErrorKind,
        service::Service as _,
    };

    use alloc::{boxed::Box, sync::Arc};
    use core::sync::atomic::{AtomicU8, Ordering};
    use tracing::debug;
    use tracing_test::traced_test;

    struct Request(bool);
    struct Response(bool);

    impl Injectable for Response {
        fn signature() -> Signature {
            Signature::new().param(Parameter::of_dyn::<Request>("request"))
        }

        fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
            let request = arguments.resolved::<Request>("request")?;
            Ok(Self(request.0))
        }
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator() {
        let call_count = Arc::new(AtomicU8::new(0));

        let mut instantiator = boxed_instantiator({
            let call_count = call_count.clone();
            move |arguments: &mut Arguments| {
                call_count.fetch_add(1, Ordering::SeqCst);

                debug!("Call instantiator response");
                Response::construct(arguments)
            }
        });

        for _ in 0..2 {
            let mut arguments = Arguments::new();
            arguments.insert("request", Argument::Resolved(Box::new(Arc::new(Request(true)))));

            let response = instantiator.call(arguments).unwrap();
            assert!(response.downcast::<Response>().unwrap().0);
        }
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_boxed_instantiator_missing_argument() {
        let mut instantiator = boxed_instantiator(Response::construct);

        let err = instantiator.call(Arguments::new()).err().unwrap();
        assert!(matches!(err, InstantiateErrorKind::MissingArgument { name: "request" }));
    }

    #[test]
    fn test_custom_error() {
        let mut instantiator = boxed_instantiator(|_: &mut Arguments| Err::<Request, _>(anyhow::anyhow!("connection refused")));

        let err = instantiator.call(Arguments::new()).err().unwrap();
        assert!(matches!(err, InstantiateErrorKind::Custom(_)));
    }
}
