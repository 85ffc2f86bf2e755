//! Service reflection: every exported, well-shaped method of one receiver.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistrationError;
use crate::method::{Method, MethodCallable, Reflect};
use crate::signature::{Signature, accepts};

/// Translates a declared method name into its registered name.
///
/// Returning an empty string keeps the method out of the service.
pub type NameMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The default mapper: lower-cases the declared name.
pub fn default_name_mapper() -> NameMapper {
    Arc::new(|name: &str| name.to_lowercase())
}

/// Returns true if `name` starts with an uppercase letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Why a method candidate was left out of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The method is not `pub`.
    NotExported,
    /// The declaration cannot be described: a `&mut self` or by-value
    /// receiver, generic parameters, `async` or `unsafe`.
    Unsupported,
    /// The method does not match an accepted calling shape.
    InvalidSignature(Signature),
    /// The shape is accepted but its parameter types cannot be supplied
    /// through the callable contract.
    NotInvocable,
    /// The name mapper returned an empty name.
    MappedOut,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotExported => write!(f, "not exported"),
            SkipReason::Unsupported => write!(f, "unsupported declaration"),
            SkipReason::InvalidSignature(signature) => {
                write!(f, "unsupported signature {}", signature)
            }
            SkipReason::NotInvocable => write!(f, "parameter types not invocable"),
            SkipReason::MappedOut => write!(f, "excluded by name mapper"),
        }
    }
}

/// A method candidate that did not make it into the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: &'static str,
    pub reason: SkipReason,
}

/// A named collection of methods bound to one shared receiver.
pub struct ServiceDef {
    name: String,
    receiver: Arc<dyn Any + Send + Sync>,
    methods: HashMap<String, Arc<dyn Method>>,
    skipped: Vec<Skipped>,
}

impl ServiceDef {
    /// Reflect over `receiver`, panicking on a registration fault.
    ///
    /// See [`try_new`](Self::try_new).
    #[track_caller]
    pub fn new<S: Reflect>(mapper: &dyn Fn(&str) -> String, name: &str, receiver: Arc<S>) -> Self {
        match Self::try_new(mapper, name, receiver) {
            Ok(service) => service,
            Err(err) => panic!("{}", err),
        }
    }

    /// Reflect over `receiver`.
    ///
    /// An empty `name` means "use the receiver's type name", which must then
    /// be exported. A non-empty `name` is used verbatim.
    ///
    /// Candidates are visited in lexicographic order of their declared
    /// name, so when two methods map to the same registered name the
    /// greater declared name wins.
    pub fn try_new<S: Reflect>(
        mapper: &dyn Fn(&str) -> String,
        name: &str,
        receiver: Arc<S>,
    ) -> Result<Self, RegistrationError> {
        let name = if name.is_empty() {
            let derived = S::type_name();
            if derived.is_empty() {
                return Err(RegistrationError::EmptyServiceName);
            }
            if !is_exported(derived) {
                return Err(RegistrationError::UnexportedService(derived.to_string()));
            }
            derived.to_string()
        } else {
            name.to_string()
        };

        let mut candidates = S::method_set();
        candidates.sort_by_key(|candidate| candidate.name);

        let mut methods: HashMap<String, Arc<dyn Method>> = HashMap::new();
        let mut skipped = Vec::new();

        for candidate in candidates {
            let method = candidate.name;
            let reason = if !candidate.exported {
                Some(SkipReason::NotExported)
            } else if !candidate.supported {
                Some(SkipReason::Unsupported)
            } else if !accepts(&candidate.signature, 1) {
                Some(SkipReason::InvalidSignature(candidate.signature.clone()))
            } else {
                None
            };
            if let Some(reason) = reason {
                tracing::debug!(service = %name, method, %reason, "skipping method");
                skipped.push(Skipped { name: method, reason });
                continue;
            }

            let Some(target) = candidate.target else {
                tracing::debug!(service = %name, method, "skipping method: not invocable");
                skipped.push(Skipped {
                    name: method,
                    reason: SkipReason::NotInvocable,
                });
                continue;
            };

            let mapped = mapper(method);
            if mapped.is_empty() {
                tracing::debug!(service = %name, method, "skipping method: mapped out");
                skipped.push(Skipped {
                    name: method,
                    reason: SkipReason::MappedOut,
                });
                continue;
            }

            let callable = MethodCallable::new(
                method,
                mapped.clone(),
                candidate.signature,
                target,
                Arc::clone(&receiver),
            );
            if let Some(previous) = methods.insert(mapped.clone(), Arc::new(callable)) {
                tracing::warn!(
                    service = %name,
                    mapped = %mapped,
                    replaced = previous.name(),
                    by = method,
                    "method name collision"
                );
            }
        }

        tracing::debug!(
            service = %name,
            methods = methods.len(),
            skipped = skipped.len(),
            "service reflected"
        );

        Ok(ServiceDef {
            name,
            receiver,
            methods,
            skipped,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a method by its registered (mapped) name.
    pub fn get_method(&self, name: &str) -> Option<Arc<dyn Method>> {
        self.methods.get(name).cloned()
    }

    /// Every registered method, ordered by registered name.
    pub fn list_methods(&self) -> Vec<Arc<dyn Method>> {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort_unstable();
        names
            .into_iter()
            .map(|name| Arc::clone(&self.methods[name]))
            .collect()
    }

    /// Keep only the methods for which `keep` returns true.
    pub fn filter(&mut self, mut keep: impl FnMut(&dyn Method) -> bool) {
        let before = self.methods.len();
        self.methods.retain(|_, method| keep(method.as_ref()));
        tracing::debug!(
            service = %self.name,
            removed = before - self.methods.len(),
            "filtered methods"
        );
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Candidates that were not registered, in visiting order.
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    /// The receiver shared by every method of this service.
    pub fn receiver(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.receiver
    }

    /// The receiver, if it is of type `S`.
    pub fn receiver_as<S: Any + Send + Sync>(&self) -> Option<Arc<S>> {
        Arc::clone(&self.receiver).downcast::<S>().ok()
    }
}

impl fmt::Debug for ServiceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("ServiceDef")
            .field("name", &self.name)
            .field("methods", &methods)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}
