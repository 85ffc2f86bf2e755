//! Error types for registration and invocation.
//!
//! Registration faults ([`RegistrationError`]) are programming errors found at
//! startup. The plain registration entry points panic with them; the `try_*`
//! variants hand them back instead.
//!
//! Call-time failures ([`CallError`]) travel through the same [`BoxError`]
//! channel as the errors returned by the targets themselves, so a caller can
//! tell them apart with a downcast.

use std::fmt;

/// Boxed error returned by every call.
///
/// Errors produced by a target are boxed as-is and can be recovered with
/// `downcast_ref`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised while building a descriptor, a service or a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The candidate does not match any accepted calling shape.
    InvalidSignature {
        /// Name of the rejected function or method.
        name: String,
        /// Rendered signature of the candidate.
        signature: String,
    },
    /// No service name was given and none could be derived from the receiver type.
    EmptyServiceName,
    /// The name derived from the receiver type is not exported.
    UnexportedService(String),
    /// A service with this name is already registered.
    DuplicateService(String),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidSignature { name, signature } => {
                write!(f, "invalid signature for {}: {}", name, signature)
            }
            RegistrationError::EmptyServiceName => write!(f, "no service name for receiver"),
            RegistrationError::UnexportedService(name) => {
                write!(f, "type {:?} is not exported", name)
            }
            RegistrationError::DuplicateService(name) => {
                write!(f, "service {:?} is already registered", name)
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Failure detected by the dispatch layer itself rather than by a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// No function or method is registered under the requested name.
    UnknownMethod,
    /// The target takes a context but none was supplied.
    MissingContext {
        /// Type the target expects.
        expected: &'static str,
    },
    /// The supplied context is not of the type the target expects.
    ContextMismatch {
        /// Type the target expects.
        expected: &'static str,
    },
    /// The supplied input is not of the type the target expects.
    InputMismatch {
        /// Type the target expects.
        expected: &'static str,
    },
}

impl CallError {
    /// Box this error for the call result channel.
    pub fn boxed(self) -> BoxError {
        Box::new(self)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::UnknownMethod => write!(f, "unknown method"),
            CallError::MissingContext { expected } => {
                write!(f, "missing context, expected {}", expected)
            }
            CallError::ContextMismatch { expected } => {
                write!(f, "context type mismatch, expected {}", expected)
            }
            CallError::InputMismatch { expected } => {
                write!(f, "input type mismatch, expected {}", expected)
            }
        }
    }
}

impl std::error::Error for CallError {}

/// Returns true if `err` is the shared "unknown method" indicator.
pub fn is_unknown_method(err: &BoxError) -> bool {
    matches!(err.downcast_ref::<CallError>(), Some(CallError::UnknownMethod))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_is_identifiable() {
        let err = CallError::UnknownMethod.boxed();
        assert!(is_unknown_method(&err));
        assert_eq!(err.to_string(), "unknown method");

        let other: BoxError = "Hi,7".into();
        assert!(!is_unknown_method(&other));

        let mismatch = CallError::InputMismatch { expected: "i32" }.boxed();
        assert!(!is_unknown_method(&mismatch));
    }

    #[test]
    fn registration_error_messages() {
        assert_eq!(
            RegistrationError::UnexportedService("hidden".into()).to_string(),
            "type \"hidden\" is not exported"
        );
        assert_eq!(
            RegistrationError::DuplicateService("Calc".into()).to_string(),
            "service \"Calc\" is already registered"
        );
    }
}
