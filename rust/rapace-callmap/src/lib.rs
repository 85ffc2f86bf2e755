#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod callable;
pub mod error;
pub mod metadata;
pub mod method;
pub mod registry;
pub mod service;
pub mod signature;

mod macros;
mod shape;

pub use callable::{
    Borrowed, CallResult, Callable, FuncCallable, Handler, Invoker, Owned, Value, WithContext,
};
pub use error::{BoxError, CallError, RegistrationError, is_unknown_method};
pub use metadata::{Meta, Metadata};
pub use method::{
    Method, MethodCallable, MethodCandidate, MethodHandler, MethodInvoker, MethodTarget, Reflect,
};
pub use registry::CallMap;
pub use service::{NameMapper, ServiceDef, SkipReason, Skipped, default_name_mapper, is_exported};
pub use signature::{Convention, NoArg, Outcome, Signature, TypeDesc, accepts};

#[doc(hidden)]
pub mod __private {
    pub use crate::shape::*;
}
