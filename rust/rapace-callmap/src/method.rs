//! Method descriptors: one validated method bound to a shared receiver.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::callable::{
    Borrowed, CallResult, Callable, Owned, Value, WithContext, downcast_context, downcast_input,
    make_default,
};
use crate::metadata::Metadata;
use crate::signature::{NoArg, Outcome, Signature, TypeDesc};

type NoArgFn<S> = Box<dyn Fn(&S) -> CallResult + Send + Sync>;
type InputFn<S> = Box<dyn Fn(&S, Value) -> CallResult + Send + Sync>;
type ContextFn<S> = Box<dyn Fn(&S, Option<&dyn Any>, Value) -> CallResult + Send + Sync>;

/// Normalized invocation target of a method on receiver `S`.
pub enum MethodInvoker<S> {
    /// `fn(&S)`.
    NoArg(NoArgFn<S>),
    /// `fn(&S, I)` or `fn(&S, &I)`.
    InputOnly(InputFn<S>),
    /// `fn(&S, &C, I)` or `fn(&S, &C, &I)`.
    ContextAndInput(ContextFn<S>),
}

impl<S> MethodInvoker<S> {
    /// Declared parameter count, receiver included.
    pub fn argno(&self) -> usize {
        match self {
            MethodInvoker::NoArg(_) => 1,
            MethodInvoker::InputOnly(_) => 2,
            MethodInvoker::ContextAndInput(_) => 3,
        }
    }
}

/// A method of `S` in one of the accepted shapes (receiver first, then the
/// same shapes as [`Handler`](crate::Handler)).
pub trait MethodHandler<S, Args>: Send + Sync + Sized + 'static {
    /// Declared shape, receiver included.
    fn signature() -> Signature;

    fn has_result() -> bool;

    fn make_arg() -> Value;

    fn into_invoker(self) -> MethodInvoker<S>;
}

impl<S, F, R> MethodHandler<S, ()> for F
where
    F: Fn(&S) -> R + Send + Sync + 'static,
    S: 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(vec![TypeDesc::of::<&S>()], R::results())
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<NoArg>()
    }

    fn into_invoker(self) -> MethodInvoker<S> {
        MethodInvoker::NoArg(Box::new(move |receiver: &S| -> CallResult {
            self(receiver).into_call_result()
        }))
    }
}

impl<S, F, I, R> MethodHandler<S, (Owned<I>,)> for F
where
    F: Fn(&S, I) -> R + Send + Sync + 'static,
    S: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(
            vec![TypeDesc::of::<&S>(), TypeDesc::of::<I>()],
            R::results(),
        )
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> MethodInvoker<S> {
        MethodInvoker::InputOnly(Box::new(move |receiver: &S, input: Value| -> CallResult {
            let input = downcast_input::<I>(input)?;
            self(receiver, input).into_call_result()
        }))
    }
}

impl<S, F, I, R> MethodHandler<S, (Borrowed<I>,)> for F
where
    F: Fn(&S, &I) -> R + Send + Sync + 'static,
    S: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(
            vec![TypeDesc::of::<&S>(), TypeDesc::of::<&I>()],
            R::results(),
        )
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> MethodInvoker<S> {
        MethodInvoker::InputOnly(Box::new(move |receiver: &S, input: Value| -> CallResult {
            let input = downcast_input::<I>(input)?;
            self(receiver, &input).into_call_result()
        }))
    }
}

impl<S, F, C, I, R> MethodHandler<S, (WithContext<C>, Owned<I>)> for F
where
    F: Fn(&S, &C, I) -> R + Send + Sync + 'static,
    S: 'static,
    C: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(
            vec![TypeDesc::of::<&S>(), TypeDesc::of::<&C>(), TypeDesc::of::<I>()],
            R::results(),
        )
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> MethodInvoker<S> {
        MethodInvoker::ContextAndInput(Box::new(
            move |receiver: &S, ctx: Option<&dyn Any>, input: Value| -> CallResult {
                let ctx = downcast_context::<C>(ctx)?;
                let input = downcast_input::<I>(input)?;
                self(receiver, ctx, input).into_call_result()
            },
        ))
    }
}

impl<S, F, C, I, R> MethodHandler<S, (WithContext<C>, Borrowed<I>)> for F
where
    F: Fn(&S, &C, &I) -> R + Send + Sync + 'static,
    S: 'static,
    C: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    fn signature() -> Signature {
        Signature::new(
            vec![TypeDesc::of::<&S>(), TypeDesc::of::<&C>(), TypeDesc::of::<&I>()],
            R::results(),
        )
    }

    fn has_result() -> bool {
        R::has_result()
    }

    fn make_arg() -> Value {
        make_default::<I>()
    }

    fn into_invoker(self) -> MethodInvoker<S> {
        MethodInvoker::ContextAndInput(Box::new(
            move |receiver: &S, ctx: Option<&dyn Any>, input: Value| -> CallResult {
                let ctx = downcast_context::<C>(ctx)?;
                let input = downcast_input::<I>(input)?;
                self(receiver, ctx, &input).into_call_result()
            },
        ))
    }
}

/// The invocable part of a method candidate.
pub struct MethodTarget<S> {
    invoker: MethodInvoker<S>,
    make_arg: fn() -> Value,
    has_result: bool,
}

impl<S> MethodTarget<S> {
    pub fn new<Args, H: MethodHandler<S, Args>>(handler: H) -> Self {
        MethodTarget {
            make_arg: H::make_arg,
            has_result: H::has_result(),
            invoker: handler.into_invoker(),
        }
    }
}

/// A method as enumerated on a receiver type, before validation.
///
/// `target` is `None` when the method's shape cannot be invoked through the
/// callable contract at all; such candidates are skipped by the reflector.
/// An unsupported candidate has no usable signature either: its declaration
/// (a `&mut self` or by-value receiver, generics, `async`) is outside what
/// can be described.
pub struct MethodCandidate<S> {
    pub(crate) name: &'static str,
    pub(crate) exported: bool,
    pub(crate) supported: bool,
    pub(crate) signature: Signature,
    pub(crate) target: Option<MethodTarget<S>>,
}

impl<S> MethodCandidate<S> {
    pub fn new(
        name: &'static str,
        exported: bool,
        signature: Signature,
        target: Option<MethodTarget<S>>,
    ) -> Self {
        MethodCandidate {
            name,
            exported,
            supported: true,
            signature,
            target,
        }
    }

    /// An exported, invocable method.
    pub fn exported<Args, H: MethodHandler<S, Args>>(name: &'static str, handler: H) -> Self {
        Self::new(name, true, H::signature(), Some(MethodTarget::new(handler)))
    }

    /// A method that is not part of the receiver's public surface.
    pub fn private<Args, H: MethodHandler<S, Args>>(name: &'static str, handler: H) -> Self {
        Self::new(name, false, H::signature(), Some(MethodTarget::new(handler)))
    }

    /// A method known only by its shape, with no way to invoke it.
    pub fn opaque(name: &'static str, exported: bool, signature: Signature) -> Self {
        Self::new(name, exported, signature, None)
    }

    /// A method whose declaration cannot be described or invoked.
    pub fn unsupported(name: &'static str, exported: bool) -> Self {
        MethodCandidate {
            supported: false,
            ..Self::new(name, exported, Signature::new(Vec::new(), Vec::new()), None)
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_invocable(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }
}

/// A receiver type whose methods can be enumerated.
///
/// Usually implemented by the [`service!`](crate::service) macro.
pub trait Reflect: Send + Sync + Sized + 'static {
    /// Name of the receiver type, used as the default service name.
    fn type_name() -> &'static str {
        let full = type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Every method declared on the receiver, in any order.
    fn method_set() -> Vec<MethodCandidate<Self>>;
}

/// A registered method, as exposed by a [`ServiceDef`](crate::ServiceDef).
pub trait Method: Callable {
    /// Name as declared on the receiver type.
    fn name(&self) -> &str;

    /// Externally visible name produced by the name mapper.
    fn mapped_name(&self) -> &str;

    fn signature(&self) -> &Signature;
}

/// Descriptor of one method bound to a receiver shared by the whole service.
pub struct MethodCallable<S> {
    name: String,
    mapped_name: String,
    signature: Signature,
    input: TypeDesc,
    has_result: bool,
    make_arg: fn() -> Value,
    invoker: MethodInvoker<S>,
    receiver: Arc<S>,
    metadata: Metadata,
}

impl<S: Send + Sync + 'static> MethodCallable<S> {
    pub(crate) fn new(
        name: &str,
        mapped_name: String,
        signature: Signature,
        target: MethodTarget<S>,
        receiver: Arc<S>,
    ) -> Self {
        let input = match target.invoker {
            MethodInvoker::NoArg(_) => TypeDesc::of::<NoArg>(),
            _ => signature
                .params()
                .last()
                .copied()
                .unwrap_or_else(TypeDesc::of::<NoArg>),
        };
        MethodCallable {
            name: name.to_string(),
            mapped_name,
            signature,
            input,
            has_result: target.has_result,
            make_arg: target.make_arg,
            invoker: target.invoker,
            receiver,
            metadata: Metadata::new(),
        }
    }

    /// Declared parameter count, receiver included.
    pub fn argno(&self) -> usize {
        self.invoker.argno()
    }

    pub fn input_type(&self) -> TypeDesc {
        self.input
    }

    pub fn receiver(&self) -> &Arc<S> {
        &self.receiver
    }
}

impl<S: Send + Sync + 'static> Callable for MethodCallable<S> {
    fn call(&self, ctx: Option<&dyn Any>, input: Value) -> CallResult {
        tracing::trace!(method = %self.mapped_name, "calling method");
        let receiver = &*self.receiver;
        match &self.invoker {
            MethodInvoker::NoArg(f) => f(receiver),
            MethodInvoker::InputOnly(f) => f(receiver, input),
            MethodInvoker::ContextAndInput(f) => f(receiver, ctx, input),
        }
    }

    fn make_arg(&self) -> Value {
        (self.make_arg)()
    }

    fn in_args(&self) -> usize {
        self.argno() - 1
    }

    fn has_out_arg(&self) -> bool {
        self.has_result
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl<S: Send + Sync + 'static> Method for MethodCallable<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn mapped_name(&self) -> &str {
        &self.mapped_name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl<S> fmt::Debug for MethodCallable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCallable")
            .field("name", &self.name)
            .field("mapped_name", &self.mapped_name)
            .field("signature", &self.signature)
            .field("has_result", &self.has_result)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct Counter {
        base: i64,
    }

    impl Counter {
        fn add(&self, n: i64) -> Result<i64, Infallible> {
            Ok(self.base + n)
        }

        fn scaled(&self, factor: &i64, n: i64) -> Result<i64, String> {
            if *factor == 0 {
                return Err("zero factor".to_string());
            }
            Ok((self.base + n) * factor)
        }

        fn base(&self) -> Result<i64, Infallible> {
            Ok(self.base)
        }

        fn sum(&self, terms: &Vec<i64>) -> Result<i64, Infallible> {
            Ok(self.base + terms.iter().sum::<i64>())
        }

        fn offset(&self, factor: &i64, terms: &Vec<i64>) -> Result<i64, Infallible> {
            Ok(self.base * factor + terms.len() as i64)
        }
    }

    fn bind<Args, H: MethodHandler<Counter, Args>>(
        receiver: &Arc<Counter>,
        name: &str,
        handler: H,
    ) -> MethodCallable<Counter> {
        MethodCallable::new(
            name,
            name.to_string(),
            H::signature(),
            MethodTarget::new(handler),
            Arc::clone(receiver),
        )
    }

    #[test]
    fn argno_counts_receiver() {
        let receiver = Arc::new(Counter { base: 10 });
        let base = bind(&receiver, "base", Counter::base);
        let add = bind(&receiver, "add", Counter::add);
        let scaled = bind(&receiver, "scaled", Counter::scaled);

        assert_eq!((base.argno(), add.argno(), scaled.argno()), (1, 2, 3));
        assert_eq!((base.in_args(), add.in_args(), scaled.in_args()), (0, 1, 2));
        assert_eq!(add.input_type(), TypeDesc::of::<i64>());
        assert_eq!(base.input_type(), TypeDesc::of::<NoArg>());
    }

    #[test]
    fn receiver_is_shared() {
        let receiver = Arc::new(Counter { base: 10 });
        let add = bind(&receiver, "add", Counter::add);
        let scaled = bind(&receiver, "scaled", Counter::scaled);
        assert!(Arc::ptr_eq(add.receiver(), scaled.receiver()));
        assert_eq!(Arc::strong_count(&receiver), 3);
    }

    #[test]
    fn calls_pass_receiver_context_and_input() {
        let receiver = Arc::new(Counter { base: 10 });
        let base = bind(&receiver, "base", Counter::base);
        let scaled = bind(&receiver, "scaled", Counter::scaled);

        let out = base.call(None, Box::new(())).unwrap().unwrap();
        assert_eq!(*out.downcast::<i64>().unwrap(), 10);

        let out = scaled.call(Some(&3i64), Box::new(2i64)).unwrap().unwrap();
        assert_eq!(*out.downcast::<i64>().unwrap(), 36);

        let err = scaled.call(Some(&0i64), Box::new(2i64)).unwrap_err();
        assert_eq!(err.to_string(), "zero factor");
    }

    #[test]
    fn borrowed_inputs_allocate_the_pointee() {
        let receiver = Arc::new(Counter { base: 10 });
        let sum = bind(&receiver, "sum", Counter::sum);
        let offset = bind(&receiver, "offset", Counter::offset);

        assert_eq!((sum.argno(), offset.argno()), (2, 3));
        assert_eq!(sum.input_type(), TypeDesc::of::<&Vec<i64>>());

        let mut terms = sum.make_arg();
        terms.downcast_mut::<Vec<i64>>().unwrap().extend([1, 2, 3]);
        let out = sum.call(None, terms).unwrap().unwrap();
        assert_eq!(*out.downcast::<i64>().unwrap(), 16);

        let out = offset
            .call(Some(&2i64), Box::new(vec![0i64; 4]))
            .unwrap()
            .unwrap();
        assert_eq!(*out.downcast::<i64>().unwrap(), 24);
    }

    #[test]
    fn unsupported_candidates_carry_no_target() {
        let candidate = MethodCandidate::<Counter>::unsupported("reset", true);
        assert!(!candidate.is_supported());
        assert!(!candidate.is_invocable());
        assert!(candidate.is_exported());
        assert!(MethodCandidate::exported("add", Counter::add).is_supported());
    }

    #[test]
    fn default_type_name_strips_path_and_generics() {
        struct Wrapper<T>(T);

        impl<T: Send + Sync + 'static> Reflect for Wrapper<T> {
            fn method_set() -> Vec<MethodCandidate<Self>> {
                Vec::new()
            }
        }

        let _ = Wrapper(0u8).0;
        assert_eq!(<Wrapper<u8> as Reflect>::type_name(), "Wrapper");
    }
}
