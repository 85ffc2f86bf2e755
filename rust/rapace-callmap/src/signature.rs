//! Calling shapes and the signature validator.
//!
//! A [`Signature`] is the runtime description of a candidate function: the
//! types of its declared parameters and of its declared return values. Rust
//! return types map onto return counts as follows:
//!
//! | Rust return type   | returns                   |
//! |--------------------|---------------------------|
//! | `()`               | none                      |
//! | `Result<(), E>`    | `E` (fallible)            |
//! | `Result<T, E>`     | `T`, `E` (fallible)       |
//! | anything else `T`  | `T` (not fallible)        |
//!
//! where `E` counts as fallible when it converts into [`BoxError`].

use std::any::{Any, TypeId, type_name};
use std::fmt;

use crate::callable::Value;
use crate::error::BoxError;

/// Input type used by targets that take no input.
///
/// [`Callable::make_arg`](crate::Callable::make_arg) returns an instance of
/// this type for them, so a decoder always has something to fill.
pub type NoArg = ();

/// Description of one parameter or return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDesc {
    name: &'static str,
    fallible: bool,
}

impl TypeDesc {
    /// Describe a plain type.
    pub fn of<T: ?Sized>() -> Self {
        TypeDesc {
            name: type_name::<T>(),
            fallible: false,
        }
    }

    /// Describe an error type that satisfies the fallible-result contract.
    pub fn fallible<E: ?Sized>() -> Self {
        TypeDesc {
            name: type_name::<E>(),
            fallible: true,
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this type can stand as the last return value.
    pub fn is_fallible(&self) -> bool {
        self.fallible
    }
}

/// Declared parameter and return types of a candidate function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<TypeDesc>,
    results: Vec<TypeDesc>,
}

impl Signature {
    pub fn new(params: Vec<TypeDesc>, results: Vec<TypeDesc>) -> Self {
        Signature { params, results }
    }

    /// Declared parameters, including any receiver.
    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    /// Declared return values.
    pub fn results(&self) -> &[TypeDesc] {
        &self.results
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param.name)?;
        }
        write!(f, ")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [only] => write!(f, " -> {}", only.name),
            many => {
                write!(f, " -> (")?;
                for (i, result) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", result.name)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Returns true if `signature` matches an accepted calling shape.
///
/// `implicit_leading` is the number of leading parameters supplied by the
/// dispatcher rather than the caller: 0 for free functions, 1 for methods.
/// What remains must be 0, 1 or 2 parameters; there must be one or two
/// return values and the last one must be fallible.
///
/// ```rust
/// use rapace_callmap::{Signature, TypeDesc, accepts};
///
/// let sig = Signature::new(
///     vec![TypeDesc::of::<i32>()],
///     vec![TypeDesc::of::<String>(), TypeDesc::fallible::<std::io::Error>()],
/// );
/// assert!(accepts(&sig, 0));
/// assert!(!accepts(&sig, 2));
/// ```
pub fn accepts(signature: &Signature, implicit_leading: usize) -> bool {
    let Some(inputs) = signature.params.len().checked_sub(implicit_leading) else {
        return false;
    };
    if inputs > 2 {
        return false;
    }
    match signature.results.as_slice() {
        [.., last] if signature.results.len() <= 2 => last.fallible,
        _ => false,
    }
}

/// How the caller-visible arguments are laid out, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    /// No input; context and input are ignored.
    NoArg,
    /// Input only; context is ignored.
    InputOnly,
    /// Context first, then input.
    ContextAndInput,
}

impl Convention {
    /// Convention for a caller-visible parameter count.
    pub fn from_inputs(inputs: usize) -> Option<Self> {
        match inputs {
            0 => Some(Convention::NoArg),
            1 => Some(Convention::InputOnly),
            2 => Some(Convention::ContextAndInput),
            _ => None,
        }
    }

    /// Caller-visible parameter count, context included.
    pub fn inputs(self) -> usize {
        match self {
            Convention::NoArg => 0,
            Convention::InputOnly => 1,
            Convention::ContextAndInput => 2,
        }
    }
}

/// Return type of an invocable target.
///
/// Implemented for `Result<T, E>`. `T = ()` means the target produces no
/// result besides its error.
pub trait Outcome: Sized + 'static {
    /// Declared return values, in [`Signature`] form.
    fn results() -> Vec<TypeDesc>;

    /// Whether a value is produced in addition to the error.
    fn has_result() -> bool;

    /// Split into the erased result and the boxed error.
    fn into_call_result(self) -> Result<Option<Value>, BoxError>;
}

impl<T, E> Outcome for Result<T, E>
where
    T: Any + Send,
    E: Into<BoxError> + 'static,
{
    fn results() -> Vec<TypeDesc> {
        if Self::has_result() {
            vec![TypeDesc::of::<T>(), TypeDesc::fallible::<E>()]
        } else {
            vec![TypeDesc::fallible::<E>()]
        }
    }

    fn has_result() -> bool {
        TypeId::of::<T>() != TypeId::of::<()>()
    }

    fn into_call_result(self) -> Result<Option<Value>, BoxError> {
        match self {
            Ok(value) if Self::has_result() => Ok(Some(Box::new(value))),
            Ok(_) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn sig(params: usize, results: Vec<TypeDesc>) -> Signature {
        Signature::new(vec![TypeDesc::of::<u8>(); params], results)
    }

    fn err() -> TypeDesc {
        TypeDesc::fallible::<std::io::Error>()
    }

    #[test]
    fn accepts_every_shape() {
        for params in 0..=2 {
            assert!(accepts(&sig(params, vec![err()]), 0));
            assert!(accepts(&sig(params, vec![TypeDesc::of::<String>(), err()]), 0));
        }
    }

    #[test]
    fn rejects_too_many_inputs() {
        assert!(!accepts(&sig(3, vec![err()]), 0));
        assert!(accepts(&sig(3, vec![err()]), 1));
        assert!(!accepts(&sig(4, vec![err()]), 1));
    }

    #[test]
    fn rejects_missing_receiver() {
        assert!(!accepts(&sig(0, vec![err()]), 1));
    }

    #[test]
    fn rejects_bad_returns() {
        assert!(!accepts(&sig(1, vec![]), 0));
        assert!(!accepts(&sig(1, vec![TypeDesc::of::<String>()]), 0));
        assert!(!accepts(&sig(1, vec![err(), TypeDesc::of::<String>()]), 0));
        assert!(!accepts(&sig(1, vec![TypeDesc::of::<u8>(), TypeDesc::of::<u8>(), err()]), 0));
    }

    #[test]
    fn outcome_shapes() {
        assert!(!<Result<(), Infallible> as Outcome>::has_result());
        assert_eq!(<Result<(), Infallible> as Outcome>::results().len(), 1);
        assert!(<Result<String, Infallible> as Outcome>::has_result());

        let results = <Result<String, std::io::Error> as Outcome>::results();
        assert_eq!(results[0].name(), type_name::<String>());
        assert!(results[1].is_fallible());
    }

    #[test]
    fn outcome_translation() {
        let ok: Result<String, String> = Ok("hi".into());
        let value = ok.into_call_result().unwrap().unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hi"));

        let unit: Result<(), String> = Ok(());
        assert!(unit.into_call_result().unwrap().is_none());

        let failed: Result<(), String> = Err("boom".into());
        assert_eq!(failed.into_call_result().unwrap_err().to_string(), "boom");
    }

    #[test]
    fn signature_display() {
        let sig = Signature::new(
            vec![TypeDesc::of::<i32>()],
            vec![TypeDesc::of::<String>(), TypeDesc::fallible::<Infallible>()],
        );
        assert_eq!(
            sig.to_string(),
            "fn(i32) -> (alloc::string::String, core::convert::Infallible)"
        );
    }

    #[test]
    fn convention_roundtrip() {
        assert_eq!(Convention::from_inputs(0), Some(Convention::NoArg));
        assert_eq!(Convention::from_inputs(2).map(Convention::inputs), Some(2));
        assert_eq!(Convention::from_inputs(3), None);
    }
}
