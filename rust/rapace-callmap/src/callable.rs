//! The uniform callable contract and its free-function descriptor.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{BoxError, CallError, RegistrationError};
use crate::metadata::{Meta, Metadata};
use crate::signature::{Convention, NoArg, Outcome, Signature, TypeDesc, accepts};

/// Type-erased input or result value.
pub type Value = Box<dyn Any + Send>;

/// Result of a call: the optional result value, or the target's error.
pub type CallResult = Result<Option<Value>, BoxError>;

/// Uniform invocation contract shared by functions and methods.
///
/// A transport typically obtains a fresh input with [`make_arg`](Self::make_arg),
/// decodes a request payload into it, passes it to [`call`](Self::call) and
/// encodes whatever comes back.
pub trait Callable: Send + Sync {
    /// Invoke the target.
    ///
    /// `ctx` is only looked at when [`in_args`](Self::in_args) is 2, so
    /// callers may always pass `None` to targets that take no context.
    /// A panicking target unwinds through this call.
    fn call(&self, ctx: Option<&dyn Any>, input: Value) -> CallResult;

    /// A new default-valued instance of the declared input type.
    fn make_arg(&self) -> Value;

    /// Number of caller-visible parameters: 0, 1 (input) or 2 (context and input).
    fn in_args(&self) -> usize;

    /// Whether the target produces a value besides its error.
    fn has_out_arg(&self) -> bool;

    /// Metadata attached to this callable.
    fn metadata(&self) -> &Metadata;

    fn set(&self, key: &str, value: Meta) {
        self.metadata().set(key, value);
    }

    fn get(&self, key: &str) -> Option<Meta> {
        self.metadata().get(key)
    }
}

/// Marker for handlers whose first parameter is a borrowed context of type `C`.
pub struct WithContext<C>(PhantomData<fn(&C)>);

/// Marker for handlers that take their input `I` by value.
pub struct Owned<I>(PhantomData<fn() -> I>);

/// Marker for handlers that take their input as `&I`.
///
/// The erased input is still an owned `I`; the handler borrows it for the
/// duration of the call.
pub struct Borrowed<I>(PhantomData<fn(&I)>);

type NoArgFn = Box<dyn Fn() -> CallResult + Send + Sync>;
type InputFn = Box<dyn Fn(Value) -> CallResult + Send + Sync>;
type ContextFn = Box<dyn Fn(Option<&dyn Any>, Value) -> CallResult + Send + Sync>;

/// Normalized invocation target of a function, one variant per convention.
///
/// Argument downcasts are compiled into each variant at registration.
pub enum Invoker {
    NoArg(NoArgFn),
    InputOnly(InputFn),
    ContextAndInput(ContextFn),
}

impl Invoker {
    pub fn convention(&self) -> Convention {
        match self {
            Invoker::NoArg(_) => Convention::NoArg,
            Invoker::InputOnly(_) => Convention::InputOnly,
            Invoker::ContextAndInput(_) => Convention::ContextAndInput,
        }
    }
}

/// A function or closure in one of the accepted shapes:
///
/// - `Fn() -> Result<T, E>`
/// - `Fn(I) -> Result<T, E>` or `Fn(&I) -> Result<T, E>`
/// - `Fn(&C, I) -> Result<T, E>` or `Fn(&C, &I) -> Result<T, E>`
///
/// `I` must implement [`Default`] so that an empty input can be allocated
/// for decoding. A borrowed input is allocated as `I` and lent to the
/// handler. Use `T = ()` for targets that only report success or
/// failure.
pub trait Handler<Args>: Send + Sync + Sized + 'static {
    /// Declared shape of the handler.
    fn signature() -> Signature;

    /// Whether the handler produces a value besides its error.
    fn has_result() -> bool;

    /// Allocate a default input.
    fn make_arg() -> Value;

    /// Erase the handler into its invoker.
    fn into_invoker(self) -> Invoker;
}

pub(crate) fn make_default<I: Default + Send + 'static>() -> Value {
    Box::new(I::default())
}

pub(crate) fn downcast_input<I: Any>(input: Value) -> Result<I, CallError> {
    input
        .downcast::<I>()
        .map(|input| *input)
        .map_err(|_| CallError::InputMismatch {
            expected: type_name::<I>(),
        })
}

pub(crate) fn downcast_context<C: Any>(ctx: Option<&dyn Any>) -> Result<&C, CallError> {
    let expected = type_name::<C>();
    ctx.ok_or(CallError::MissingContext { expected })?
        .downcast_ref::<C>()
        .ok_or(CallError::ContextMismatch { expected })
}

impl<F, R> Handler<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(Vec::new(), R::results())
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<NoArg>()
    }

    fn into_invoker(self) -> Invoker {
        Invoker::NoArg(Box::new(move || self().into_call_result()))
    }
}

impl<F, I, R> Handler<(Owned<I>,)> for F
where
    F: Fn(I) -> R + Send + Sync + 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(vec![TypeDesc::of::<I>()], R::results())
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> Invoker {
        Invoker::InputOnly(Box::new(move |input: Value| -> CallResult {
            let input = downcast_input::<I>(input)?;
            self(input).into_call_result()
        }))
    }
}

impl<F, I, R> Handler<(Borrowed<I>,)> for F
where
    F: Fn(&I) -> R + Send + Sync + 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(vec![TypeDesc::of::<&I>()], R::results())
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> Invoker {
        Invoker::InputOnly(Box::new(move |input: Value| -> CallResult {
            let input = downcast_input::<I>(input)?;
            self(&input).into_call_result()
        }))
    }
}

impl<F, C, I, R> Handler<(WithContext<C>, Owned<I>)> for F
where
    F: Fn(&C, I) -> R + Send + Sync + 'static,
    C: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(vec![TypeDesc::of::<&C>(), TypeDesc::of::<I>()], R::results())
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> Invoker {
        Invoker::ContextAndInput(Box::new(
            move |ctx: Option<&dyn Any>, input: Value| -> CallResult {
                let ctx = downcast_context::<C>(ctx)?;
                let input = downcast_input::<I>(input)?;
                self(ctx, input).into_call_result()
            },
        ))
    }
}

impl<F, C, I, R> Handler<(WithContext<C>, Borrowed<I>)> for F
where
    F: Fn(&C, &I) -> R + Send + Sync + 'static,
    C: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(vec![TypeDesc::of::<&C>(), TypeDesc::of::<&I>()], R::results())
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> Invoker {
        Invoker::ContextAndInput(Box::new(
            move |ctx: Option<&dyn Any>, input: Value| -> CallResult {
                let ctx = downcast_context::<C>(ctx)?;
                let input = downcast_input::<I>(input)?;
                self(ctx, &input).into_call_result()
            },
        ))
    }
}

/// Descriptor of a registered free function.
pub struct FuncCallable {
    signature: Signature,
    input: TypeDesc,
    has_result: bool,
    make_arg: fn() -> Value,
    invoker: Invoker,
    metadata: Metadata,
}

impl FuncCallable {
    /// Build a descriptor, panicking if the handler's shape is rejected.
    #[track_caller]
    pub fn new<Args, H: Handler<Args>>(handler: H) -> Self {
        match Self::try_new(handler) {
            Ok(callable) => callable,
            Err(err) => panic!("{}", err),
        }
    }

    /// Build a descriptor, reporting a rejected shape as an error.
    pub fn try_new<Args, H: Handler<Args>>(handler: H) -> Result<Self, RegistrationError> {
        let signature = H::signature();
        if !accepts(&signature, 0) {
            return Err(RegistrationError::InvalidSignature {
                name: type_name::<H>().to_string(),
                signature: signature.to_string(),
            });
        }

        let input = signature
            .params()
            .last()
            .copied()
            .unwrap_or_else(TypeDesc::of::<NoArg>);

        Ok(FuncCallable {
            input,
            has_result: H::has_result(),
            make_arg: H::make_arg,
            invoker: handler.into_invoker(),
            metadata: Metadata::new(),
            signature,
        })
    }

    pub fn convention(&self) -> Convention {
        self.invoker.convention()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Declared input type, `&I` for a borrowed input ([`NoArg`] when the
    /// function takes none).
    pub fn input_type(&self) -> TypeDesc {
        self.input
    }
}

impl Callable for FuncCallable {
    fn call(&self, ctx: Option<&dyn Any>, input: Value) -> CallResult {
        tracing::trace!(signature = %self.signature, "calling function");
        match &self.invoker {
            Invoker::NoArg(f) => f(),
            Invoker::InputOnly(f) => f(input),
            Invoker::ContextAndInput(f) => f(ctx, input),
        }
    }

    fn make_arg(&self) -> Value {
        (self.make_arg)()
    }

    fn in_args(&self) -> usize {
        self.convention().inputs()
    }

    fn has_out_arg(&self) -> bool {
        self.has_result
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl fmt::Debug for FuncCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncCallable")
            .field("signature", &self.signature)
            .field("convention", &self.convention())
            .field("has_result", &self.has_result)
            .finish_non_exhaustive()
    }
}
