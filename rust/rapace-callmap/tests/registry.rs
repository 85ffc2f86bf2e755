//! Name resolution across functions, named services and the default service.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use rapace_callmap::{BoxError, CallError, CallMap, RegistrationError, is_unknown_method};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct Calculator {
    calls: AtomicU64,
}

rapace_callmap::service! {
    #[allow(non_snake_case)]
    impl Calculator {
        pub fn Double(&self, n: i64) -> Result<i64, BoxError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(n * 2)
        }

        pub fn Calls(&self) -> Result<u64, BoxError> {
            Ok(self.calls.load(Ordering::Relaxed))
        }
    }
}

#[derive(Default)]
pub struct Clock;

rapace_callmap::service! {
    #[allow(non_snake_case)]
    impl Clock {
        pub fn Now(&self) -> Result<u64, BoxError> {
            Ok(1_700_000_000)
        }

        pub fn Double(&self, n: i64) -> Result<i64, BoxError> {
            Ok(n + n)
        }
    }
}

fn as_i64(value: Option<rapace_callmap::Value>) -> i64 {
    *value.unwrap().downcast::<i64>().unwrap()
}

#[test]
fn dotted_names_resolve_to_service_methods() {
    init_tracing();
    let mut map = CallMap::new();
    map.service(Calculator::default());

    let out = map
        .call_method("Calculator.double", None, Box::new(21i64))
        .unwrap();
    assert_eq!(as_i64(out), 42);

    let method = map.get_service_method("Calculator.calls").unwrap();
    assert_eq!(method.name(), "Calls");
    assert_eq!(method.mapped_name(), "calls");
}

#[test]
fn bare_names_use_the_default_service() {
    init_tracing();
    let mut map = CallMap::new();
    map.default_service(Clock);
    map.service(Calculator::default());

    assert_eq!(map.get_default_service().unwrap().name(), "Clock");
    assert!(map.get_service_method("now").is_some());
    assert!(map.get_service_method("calls").is_none());

    let out = map.call_method("double", None, Box::new(4i64)).unwrap();
    assert_eq!(as_i64(out), 8);
}

#[test]
fn functions_take_precedence_over_the_default_service() {
    let mut map = CallMap::new();
    map.default_service(Clock);
    map.func("now", || -> Result<u64, BoxError> { Ok(0) });

    let callable = map.get_callable("now").unwrap();
    let out = callable.call(None, Box::new(())).unwrap().unwrap();
    assert_eq!(*out.downcast::<u64>().unwrap(), 0);

    let out = map.call_method("now", None, Box::new(())).unwrap().unwrap();
    assert_eq!(*out.downcast::<u64>().unwrap(), 1_700_000_000);
}

#[test]
fn unknown_names() {
    let mut map = CallMap::new();
    map.service(Calculator::default());

    for name in ["Calculator.triple", "Nope.double", "double", ""] {
        let err = map.call_method(name, None, Box::new(1i64)).unwrap_err();
        assert!(is_unknown_method(&err), "{name}");
        assert_eq!(err.downcast_ref::<CallError>(), Some(&CallError::UnknownMethod));
    }
    assert!(map.get_callable("Calculator.triple").is_none());
}

#[test]
fn target_errors_are_not_unknown_method() {
    let mut map = CallMap::new();
    map.func("fail", |_: i64| -> Result<(), BoxError> { Err("unknown method".into()) });
    let err = map.call_func("fail", None, Box::new(1i64)).unwrap_err();
    assert!(!is_unknown_method(&err));
}

#[test]
fn duplicate_services_are_rejected() {
    let mut map = CallMap::new();
    map.service(Clock);

    let err = map.try_service(Arc::new(Clock)).unwrap_err();
    assert_eq!(err, RegistrationError::DuplicateService("Clock".into()));

    let err = map.try_default_service("", Arc::new(Clock)).unwrap_err();
    assert_eq!(err, RegistrationError::DuplicateService("Clock".into()));
    assert!(map.get_default_service().is_none());

    map.named_service("Clock2", Clock);
    assert_eq!(
        map.list_services()
            .into_iter()
            .map(|service| service.name())
            .collect::<Vec<_>>(),
        ["Clock", "Clock2"]
    );
}

#[test]
#[should_panic(expected = "service \"Clock\" is already registered")]
fn duplicate_service_panics() {
    let mut map = CallMap::new();
    map.service(Clock);
    map.service(Clock);
}

#[test]
fn mapper_applies_to_later_services_only() {
    let mut map = CallMap::new();
    map.service(Clock);
    map.set_name_mapper(|name: &str| format!("calc_{}", name.to_lowercase()));
    map.service(Calculator::default());

    assert!(map.get_service_method("Clock.now").is_some());
    assert!(map.get_service_method("Calculator.calc_double").is_some());
    assert!(map.get_service_method("Calculator.double").is_none());
}

#[test]
fn listings_are_sorted() {
    let mut map = CallMap::new();
    map.func("zeta", || -> Result<(), BoxError> { Ok(()) });
    map.func("alpha", |i: i64| -> Result<i64, BoxError> { Ok(i) });
    map.service(Clock);
    map.service(Calculator::default());

    assert_eq!(map.list_functions(), ["alpha", "zeta"]);
    let services: Vec<&str> = map.list_services().into_iter().map(|s| s.name()).collect();
    assert_eq!(services, ["Calculator", "Clock"]);
}

#[test]
fn concurrent_calls_share_the_receiver() {
    init_tracing();
    let mut map = CallMap::new();
    map.service(Calculator::default());
    let double = map.get_service_method("Calculator.double").unwrap();

    thread::scope(|scope| {
        for t in 0..4i64 {
            let double = Arc::clone(&double);
            scope.spawn(move || {
                for i in 0..25i64 {
                    let out = double.call(None, Box::new(t * 100 + i)).unwrap();
                    assert_eq!(as_i64(out), (t * 100 + i) * 2);
                }
            });
        }
    });

    let out = map.call_method("Calculator.calls", None, Box::new(())).unwrap();
    assert_eq!(*out.unwrap().downcast::<u64>().unwrap(), 100);
}
