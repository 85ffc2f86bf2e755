//! Name resolution over registered functions and services.
//!
//! A [`CallMap`] holds two tables: free functions by name, and services by
//! name. Names of the form `Service.method` resolve to a method of that
//! service. A bare name resolves to a function first, then to a method of
//! the default service, if one was registered.
//!
//! # Example
//!
//! ```rust
//! use std::convert::Infallible;
//! use rapace_callmap::{CallMap, Callable};
//!
//! let mut map = CallMap::new();
//! map.func("hi", |i: i32| -> Result<String, Infallible> { Ok(format!("Hi,{}", i)) });
//!
//! let f = map.get_callable("hi").unwrap();
//! let out = f.call(None, Box::new(7i32)).unwrap().unwrap();
//! assert_eq!(*out.downcast::<String>().unwrap(), "Hi,7");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::callable::{CallResult, Callable, FuncCallable, Handler, Value};
use crate::error::{CallError, RegistrationError};
use crate::method::{Method, Reflect};
use crate::service::{NameMapper, ServiceDef, default_name_mapper};

/// Registry of callable functions and services.
pub struct CallMap {
    funcs: HashMap<String, Arc<FuncCallable>>,
    services: HashMap<String, ServiceDef>,
    default_service: Option<String>,
    mapper: NameMapper,
}

impl CallMap {
    /// Create an empty registry with the default (lower-casing) name mapper.
    pub fn new() -> Self {
        CallMap {
            funcs: HashMap::new(),
            services: HashMap::new(),
            default_service: None,
            mapper: default_name_mapper(),
        }
    }

    /// Use `mapper` for services registered from now on.
    pub fn with_name_mapper(
        mut self,
        mapper: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.set_name_mapper(mapper);
        self
    }

    /// Replace the name mapper. Services already registered keep their names.
    pub fn set_name_mapper(&mut self, mapper: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.mapper = Arc::new(mapper);
    }

    /// Register a free function under `name`, panicking if its shape is
    /// rejected.
    ///
    /// Registering the same name again replaces the previous function.
    #[track_caller]
    pub fn func<Args, H: Handler<Args>>(
        &mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Arc<FuncCallable> {
        match self.try_func(name, handler) {
            Ok(callable) => callable,
            Err(err) => panic!("{}", err),
        }
    }

    /// Register a free function under `name`.
    pub fn try_func<Args, H: Handler<Args>>(
        &mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<Arc<FuncCallable>, RegistrationError> {
        let name = name.into();
        let callable = FuncCallable::try_new(handler).map_err(|err| match err {
            RegistrationError::InvalidSignature { signature, .. } => {
                RegistrationError::InvalidSignature {
                    name: name.clone(),
                    signature,
                }
            }
            other => other,
        })?;
        let callable = Arc::new(callable);

        if self
            .funcs
            .insert(name.clone(), Arc::clone(&callable))
            .is_some()
        {
            tracing::warn!(func = %name, "replacing registered function");
        } else {
            tracing::debug!(func = %name, signature = %callable.signature(), "registered function");
        }
        Ok(callable)
    }

    /// Register a service named after the receiver's type.
    #[track_caller]
    pub fn service<S: Reflect>(&mut self, receiver: S) -> &mut ServiceDef {
        self.named_service("", receiver)
    }

    /// Register a service under an explicit name (empty: the receiver's type name).
    #[track_caller]
    pub fn named_service<S: Reflect>(&mut self, name: &str, receiver: S) -> &mut ServiceDef {
        match self.try_named_service(name, Arc::new(receiver)) {
            Ok(service) => service,
            Err(err) => panic!("{}", err),
        }
    }

    /// Register a service and make it the target of bare method names.
    #[track_caller]
    pub fn default_service<S: Reflect>(&mut self, receiver: S) -> &mut ServiceDef {
        match self.try_default_service("", Arc::new(receiver)) {
            Ok(service) => service,
            Err(err) => panic!("{}", err),
        }
    }

    /// Register a service over a receiver that is already shared.
    pub fn try_service<S: Reflect>(
        &mut self,
        receiver: Arc<S>,
    ) -> Result<&mut ServiceDef, RegistrationError> {
        self.try_named_service("", receiver)
    }

    pub fn try_named_service<S: Reflect>(
        &mut self,
        name: &str,
        receiver: Arc<S>,
    ) -> Result<&mut ServiceDef, RegistrationError> {
        let service = ServiceDef::try_new(&*self.mapper, name, receiver)?;
        self.insert_service(service)
    }

    pub fn try_default_service<S: Reflect>(
        &mut self,
        name: &str,
        receiver: Arc<S>,
    ) -> Result<&mut ServiceDef, RegistrationError> {
        let service = ServiceDef::try_new(&*self.mapper, name, receiver)?;
        let name = service.name().to_string();
        if self.services.contains_key(&name) {
            return Err(RegistrationError::DuplicateService(name));
        }
        if let Some(previous) = self.default_service.replace(name.clone()) {
            tracing::warn!(previous = %previous, service = %name, "replacing default service");
        }
        self.insert_service(service)
    }

    fn insert_service(&mut self, service: ServiceDef) -> Result<&mut ServiceDef, RegistrationError> {
        use std::collections::hash_map::Entry;

        match self.services.entry(service.name().to_string()) {
            Entry::Occupied(entry) => Err(RegistrationError::DuplicateService(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::info!(
                    service = %service.name(),
                    methods = service.len(),
                    "registered service"
                );
                Ok(entry.insert(service))
            }
        }
    }

    pub fn get_func(&self, name: &str) -> Option<Arc<FuncCallable>> {
        self.funcs.get(name).cloned()
    }

    pub fn get_service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.get(name)
    }

    /// Mutable access, e.g. to [`filter`](ServiceDef::filter) after registration.
    pub fn get_service_mut(&mut self, name: &str) -> Option<&mut ServiceDef> {
        self.services.get_mut(name)
    }

    /// The default service, if one was registered.
    pub fn get_default_service(&self) -> Option<&ServiceDef> {
        self.services.get(self.default_service.as_deref()?)
    }

    /// Resolve `Service.method`, or a bare `method` of the default service.
    ///
    /// Splits on the last `.`, so service names may themselves be dotted.
    pub fn get_service_method(&self, name: &str) -> Option<Arc<dyn Method>> {
        match name.rsplit_once('.') {
            Some((service, method)) => self.services.get(service)?.get_method(method),
            None => self.get_default_service()?.get_method(name),
        }
    }

    /// Resolve `name` to anything callable: a function first, then a service method.
    pub fn get_callable(&self, name: &str) -> Option<Arc<dyn Callable>> {
        if let Some(func) = self.funcs.get(name) {
            return Some(Arc::clone(func) as Arc<dyn Callable>);
        }
        self.get_service_method(name)
            .map(|method| method as Arc<dyn Callable>)
    }

    /// Call a registered function by name.
    pub fn call_func(&self, name: &str, ctx: Option<&dyn Any>, input: Value) -> CallResult {
        let Some(func) = self.funcs.get(name) else {
            tracing::debug!(func = %name, "unknown function");
            return Err(CallError::UnknownMethod.boxed());
        };
        func.call(ctx, input)
    }

    /// Call a service method by `Service.method` or bare default-service name.
    pub fn call_method(&self, name: &str, ctx: Option<&dyn Any>, input: Value) -> CallResult {
        let Some(method) = self.get_service_method(name) else {
            tracing::debug!(method = %name, "unknown method");
            return Err(CallError::UnknownMethod.boxed());
        };
        method.call(ctx, input)
    }

    /// Names of registered functions, sorted.
    pub fn list_functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered services, sorted by name.
    pub fn list_services(&self) -> Vec<&ServiceDef> {
        let mut services: Vec<&ServiceDef> = self.services.values().collect();
        services.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        services
    }
}

impl Default for CallMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallMap")
            .field("functions", &self.list_functions())
            .field(
                "services",
                &self
                    .list_services()
                    .iter()
                    .map(|service| service.name())
                    .collect::<Vec<_>>(),
            )
            .field("default_service", &self.default_service)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_unknown_method;
    use std::convert::Infallible;

    #[test]
    fn unknown_names_share_one_error() {
        let map = CallMap::new();
        let err = map.call_func("nope", None, Box::new(())).unwrap_err();
        assert!(is_unknown_method(&err));
        let err = map.call_method("Svc.nope", None, Box::new(())).unwrap_err();
        assert!(is_unknown_method(&err));
        assert!(map.get_callable("nope").is_none());
    }

    #[test]
    fn function_replacement() {
        let mut map = CallMap::new();
        map.func("v", || -> Result<u8, Infallible> { Ok(1) });
        map.func("v", || -> Result<u8, Infallible> { Ok(2) });
        assert_eq!(map.list_functions(), ["v"]);
        let out = map.call_func("v", None, Box::new(())).unwrap().unwrap();
        assert_eq!(*out.downcast::<u8>().unwrap(), 2);
    }

    #[test]
    fn bare_name_without_default_service() {
        let map = CallMap::new();
        assert!(map.get_service_method("anything").is_none());
        assert!(map.get_default_service().is_none());
    }
}
