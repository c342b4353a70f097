use pluck::{global, provide, reset_global, Arguments, Container, Inject, Injectable, InstantiateErrorKind, Parameter, ResolveErrorKind, Signature};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

trait Audit: Send + Sync {}

struct Session;

impl Injectable for Session {
    fn signature() -> Signature {
        Signature::new()
    }

    fn construct(_: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
        Ok(Self)
    }
}

struct Handler(Arc<Session>);

impl Injectable for Handler {
    fn signature() -> Signature {
        Signature::new().param(Parameter::of::<Session>("session"))
    }

    fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
        Ok(Self(arguments.resolved("session")?))
    }
}

struct Parent(Inject<Child>);
struct Child(Inject<Parent>);

impl Injectable for Parent {
    fn signature() -> Signature {
        Signature::new().param(Parameter::of::<Child>("child"))
    }

    fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
        Ok(Self(arguments.take("child")?))
    }
}

impl Injectable for Child {
    fn signature() -> Signature {
        Signature::new().param(Parameter::of::<Parent>("parent"))
    }

    fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
        Ok(Self(arguments.take("parent")?))
    }
}

struct Report(Inject<Session>);

impl Injectable for Report {
    fn signature() -> Signature {
        Signature::new().param(Parameter::of::<Session>("session").deferred())
    }

    fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
        Ok(Self(arguments.take("session")?))
    }
}

#[test]
fn test_scope_release() {
    let container = Container::new();

    let (session, handler) = {
        let _scope = container.enter_scope();
        let handler = container.resolve::<Handler>().unwrap();
        let session = container.resolve::<Session>().unwrap();
        assert!(Arc::ptr_eq(&handler.0, &session));
        (session, handler)
    };

    assert!(!container.is_cached::<Session>());
    let next = container.resolve::<Handler>().unwrap();
    assert!(!Arc::ptr_eq(&next, &handler));
    assert!(!Arc::ptr_eq(&next.0, &session));
}

#[test]
fn test_outer_scope_instances_are_shared() {
    let container = Container::new();
    let session = container.resolve::<Session>().unwrap();

    let _scope = container.enter_scope();
    assert!(Arc::ptr_eq(&container.resolve::<Handler>().unwrap().0, &session));
}

#[test]
fn test_guard_pops_leaked_scopes_on_panic() {
    let finalized = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container.register(provide::<Session>().finalizer({
        let finalized = finalized.clone();
        move |_: Arc<Session>| {
            finalized.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _scope = container.enter_scope();
        container.push_scope();
        let _ = container.resolve::<Session>().unwrap();
        panic!("handler failed");
    }));

    assert!(result.is_err());
    assert_eq!(container.scope_depth(), 1);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cycle_resolves_to_constructed_instance() {
    let container = Container::new();

    let parent = container.resolve::<Parent>().unwrap();
    let child = parent.0.get().unwrap();

    assert!(!parent.0.is_deferred());
    assert!(child.0.is_deferred());
    assert!(Arc::ptr_eq(&child.0.get().unwrap(), &parent));
    assert!(Arc::ptr_eq(&container.resolve::<Child>().unwrap().0.get().unwrap(), &parent));
}

#[test]
fn test_cycle_from_other_side() {
    let container = Container::new();

    let child = container.resolve::<Child>().unwrap();
    assert!(!child.0.is_deferred());
    assert!(child.0.get().unwrap().0.is_deferred());
}

#[test]
fn test_deferred_parameter() {
    let container = Container::new();

    let report = container.resolve::<Report>().unwrap();
    let Inject::Deferred(lazy) = &report.0 else {
        panic!("expected deferred session");
    };
    assert!(!lazy.is_forced());
    assert!(!container.is_cached::<Session>());

    let session = report.0.get().unwrap();
    assert!(lazy.is_forced());
    assert!(Arc::ptr_eq(&session, &container.resolve::<Session>().unwrap()));
}

#[test]
fn test_resolve_deferred() {
    let container = Container::new();

    let lazy = container.resolve_deferred::<Handler>();
    assert!(!container.is_cached::<Handler>());
    assert!(Arc::ptr_eq(&lazy.get().unwrap(), &lazy.get().unwrap()));
    assert!(container.is_cached::<Handler>());

    let missing = container.resolve_deferred_dyn::<dyn Audit>(Some("audit"));
    assert!(matches!(missing.get(), Err(ResolveErrorKind::UnresolvedDependency { .. })));
}

#[test]
fn test_global_container() {
    let order = Arc::new(Mutex::new(Vec::new()));

    global().register(provide::<Session>().finalizer({
        let order = order.clone();
        move |_: Arc<Session>| order.lock().unwrap().push("session")
    }));
    let session = global().resolve::<Session>().unwrap();
    assert!(Arc::ptr_eq(&session, &global().resolve::<Session>().unwrap()));

    reset_global();
    assert_eq!(*order.lock().unwrap(), ["session"]);
    assert!(!Arc::ptr_eq(&session, &global().resolve::<Session>().unwrap()));
}
