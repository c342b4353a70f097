use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::any::{type_name, Any};

use crate::{
    any::{BoxAny, RcAny, TypeInfo},
    errors::InstantiateErrorKind,
    inject::{Deferred, Inject, Lazy},
};

pub(crate) enum Argument {
    /// Resolved dependency, boxed `Arc<I>` of the requested type
    Resolved(BoxAny),
    Deferred(Deferred),
    /// Fixed argument of a registration or a per-call override
    Fixed(RcAny),
}

/// Named arguments passed to a factory.
///
/// Values are taken out by name: typed dependencies with [`Self::take`] or [`Self::resolved`],
/// plain values (fixed arguments) with [`Self::value`].
#[derive(Default)]
pub struct Arguments {
    values: BTreeMap<&'static str, Argument>,
}

impl Arguments {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed argument.
    /// To fill a typed parameter the value has to be an `Arc` of the parameter type.
    #[inline]
    #[must_use]
    pub fn with<V: Send + Sync + 'static>(mut self, name: &'static str, value: V) -> Self {
        self.insert(name, Argument::Fixed(Arc::new(value)));
        self
    }

    #[inline]
    pub(crate) fn insert(&mut self, name: &'static str, argument: Argument) {
        self.values.insert(name, argument);
    }

    #[inline]
    pub(crate) fn extend_fixed<'a>(&mut self, fixed: impl IntoIterator<Item = (&'a &'static str, &'a RcAny)>) {
        for (name, value) in fixed {
            self.values.insert(*name, Argument::Fixed(value.clone()));
        }
    }

    #[inline]
    pub(crate) fn into_fixed(self) -> impl Iterator<Item = (&'static str, RcAny)> {
        self.values.into_iter().filter_map(|(name, argument)| match argument {
            Argument::Fixed(value) => Some((name, value)),
            Argument::Resolved(_) | Argument::Deferred(_) => None,
        })
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes a dependency, which may be a deferred reference if it's a part of a cycle
    ///
    /// # Errors
    /// - [`InstantiateErrorKind::MissingArgument`] if the argument wasn't supplied
    /// - [`InstantiateErrorKind::IncorrectArgumentType`] if it isn't an `I`
    pub fn take<I: ?Sized + Send + Sync + 'static>(&mut self, name: &'static str) -> Result<Inject<I>, InstantiateErrorKind> {
        let incorrect_type = || InstantiateErrorKind::IncorrectArgumentType {
            name,
            expected: type_name::<I>(),
        };

        match self.values.remove(name) {
            None => Err(InstantiateErrorKind::MissingArgument { name }),
            Some(Argument::Resolved(value)) => value.downcast::<Arc<I>>().map(|value| Inject::Resolved(*value)).map_err(|_| incorrect_type()),
            Some(Argument::Deferred(deferred)) => {
                if deferred.request.type_info == TypeInfo::of::<I>() {
                    Ok(Inject::Deferred(Lazy::new(deferred)))
                } else {
                    Err(incorrect_type())
                }
            }
            Some(Argument::Fixed(value)) => value.downcast_ref::<Arc<I>>().cloned().map(Inject::Resolved).ok_or_else(incorrect_type),
        }
    }

    /// Same as [`Self::take`], but a missing argument means the factory should use its default
    ///
    /// # Errors
    /// - [`InstantiateErrorKind::IncorrectArgumentType`] if it isn't an `I`
    pub fn take_optional<I: ?Sized + Send + Sync + 'static>(&mut self, name: &'static str) -> Result<Option<Inject<I>>, InstantiateErrorKind> {
        if self.contains(name) {
            self.take(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Takes an eagerly resolved dependency
    ///
    /// # Errors
    /// Same as [`Self::take`], and [`InstantiateErrorKind::DeferredArgument`] if the dependency was deferred
    pub fn resolved<I: ?Sized + Send + Sync + 'static>(&mut self, name: &'static str) -> Result<Arc<I>, InstantiateErrorKind> {
        match self.take(name)? {
            Inject::Resolved(value) => Ok(value),
            Inject::Deferred(_) => Err(InstantiateErrorKind::DeferredArgument { name }),
        }
    }

    /// Takes the instances collected for a [`crate::Parameter::all`] parameter
    ///
    /// # Errors
    /// - [`InstantiateErrorKind::MissingArgument`] if the argument wasn't supplied
    /// - [`InstantiateErrorKind::IncorrectArgumentType`] if it isn't a collection of `I`
    /// - [`InstantiateErrorKind::DeferredArgument`] if it's a deferred dependency
    pub fn all<I: ?Sized + Send + Sync + 'static>(&mut self, name: &'static str) -> Result<Vec<Arc<I>>, InstantiateErrorKind> {
        let incorrect_type = || InstantiateErrorKind::IncorrectArgumentType {
            name,
            expected: type_name::<Vec<Arc<I>>>(),
        };
        match self.values.remove(name) {
            None => Err(InstantiateErrorKind::MissingArgument { name }),
            Some(Argument::Resolved(value)) => value.downcast::<Vec<Arc<I>>>().map(|value| *value).map_err(|_| incorrect_type()),
            Some(Argument::Fixed(value)) => value.downcast_ref::<Vec<Arc<I>>>().cloned().ok_or_else(incorrect_type),
            Some(Argument::Deferred(_)) => Err(InstantiateErrorKind::DeferredArgument { name }),
        }
    }

    /// Takes a plain value, usually a fixed argument of the registration
    ///
    /// # Errors
    /// - [`InstantiateErrorKind::MissingArgument`] if the argument wasn't supplied
    /// - [`InstantiateErrorKind::IncorrectArgumentType`] if it isn't a `V`
    /// - [`InstantiateErrorKind::DeferredArgument`] if it's a deferred dependency
    pub fn value<V: Clone + Any>(&mut self, name: &'static str) -> Result<V, InstantiateErrorKind> {
        let incorrect_type = || InstantiateErrorKind::IncorrectArgumentType {
            name,
            expected: type_name::<V>(),
        };

        match self.values.remove(name) {
            None => Err(InstantiateErrorKind::MissingArgument { name }),
            Some(Argument::Fixed(value)) => value.downcast_ref::<V>().cloned().ok_or_else(incorrect_type),
            Some(Argument::Resolved(value)) => value.downcast::<V>().map(|value| *value).map_err(|_| incorrect_type()),
            Some(Argument::Deferred(_)) => Err(InstantiateErrorKind::DeferredArgument { name }),
        }
    }

    /// Same as [`Self::value`], but returns `default` if the argument wasn't supplied
    ///
    /// # Errors
    /// Same as [`Self::value`], except for [`InstantiateErrorKind::MissingArgument`]
    pub fn value_or<V: Clone + Any>(&mut self, name: &'static str, default: V) -> Result<V, InstantiateErrorKind> {
        if self.contains(name) {
            self.value(name)
        } else {
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{Argument, Arguments};
    use crate::{errors::InstantiateErrorKind, Inject};

    use alloc::{boxed::Box, string::String, sync::Arc, vec, vec::Vec};

    struct Sink(u8);
    trait Port: Send + Sync {
        fn port(&self) -> u16;
    }
    impl Port for Sink {
        fn port(&self) -> u16 {
            u16::from(self.0)
        }
    }

    #[test]
    fn test_take_resolved() {
        let mut arguments = Arguments::new();
        arguments.insert("sink", Argument::Resolved(Box::new(Arc::new(Sink(1)))));
        arguments.insert("port", Argument::Resolved(Box::new(Arc::new(Sink(2)) as Arc<dyn Port>)));

        let Inject::Resolved(sink) = arguments.take::<Sink>("sink").unwrap() else {
            panic!("expected resolved sink");
        };
        assert_eq!(sink.0, 1);
        assert_eq!(arguments.resolved::<dyn Port>("port").unwrap().port(), 2);
        assert!(arguments.is_empty());
    }

    #[test]
    fn test_take_errors() {
        let mut arguments = Arguments::new().with("name", String::from("app"));

        assert!(matches!(
            arguments.take::<Sink>("missing"),
            Err(InstantiateErrorKind::MissingArgument { name: "missing" })
        ));
        assert!(matches!(
            arguments.take::<Sink>("name"),
            Err(InstantiateErrorKind::IncorrectArgumentType { name: "name", .. })
        ));
        assert!(arguments.take_optional::<Sink>("name").unwrap().is_none());
    }

    #[test]
    fn test_take_all() {
        let sinks: Vec<Arc<dyn Port>> = vec![Arc::new(Sink(1)), Arc::new(Sink(2))];
        let mut arguments = Arguments::new();
        arguments.insert("sinks", Argument::Resolved(Box::new(sinks)));

        assert!(matches!(
            arguments.all::<Sink>("sinks"),
            Err(InstantiateErrorKind::IncorrectArgumentType { name: "sinks", .. })
        ));

        arguments.insert("sinks", Argument::Resolved(Box::new(Vec::<Arc<dyn Port>>::new())));
        assert!(arguments.all::<dyn Port>("sinks").unwrap().is_empty());
        assert!(matches!(
            arguments.all::<dyn Port>("sinks"),
            Err(InstantiateErrorKind::MissingArgument { name: "sinks" })
        ));
    }

    #[test]
    fn test_fixed_values() {
        let mut arguments = Arguments::new()
            .with("name", String::from("app"))
            .with("sink", Arc::new(Sink(3)));

        assert_eq!(arguments.value::<String>("name").unwrap(), "app");
        assert_eq!(arguments.value_or("retries", 3u8).unwrap(), 3);
        assert_eq!(arguments.resolved::<Sink>("sink").unwrap().0, 3);
    }
}
