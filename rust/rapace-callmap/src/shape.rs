//! Compile-time shape detection used by the [`service!`](crate::service) macro.
//!
//! The macro sees every method of an `impl` block, including ones whose shape
//! is not accepted. It describes each of them through a [`ShapeOf`] and relies
//! on method resolution through references: an impl on a more-referenced
//! `ShapeOf` wins over one on a less-referenced `ShapeOf`, so each call
//! falls back level by level until a shape matches.
//!
//! Return shapes, from the first level tried to the last:
//!
//! 1. `()` and `Result<(), E>`
//! 2. `Result<T, E>`
//! 3. anything else
//!
//! Invocation targets, from the first level tried to the last:
//!
//! 1. a method taking its input as `&I`
//! 2. a method taking its input by value
//! 3. anything else (not invocable)
//!
//! A borrowed `&str` or `&[T]` input fails the first level (the pointee is
//! unsized) and never matches the second, so it ends up not invocable.

use std::marker::PhantomData;

use crate::callable::{Borrowed, Owned, WithContext};
use crate::error::BoxError;
use crate::method::MethodTarget;
use crate::signature::{Outcome, TypeDesc};

pub struct ShapeOf<T>(PhantomData<fn() -> T>);

impl<T> ShapeOf<T> {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        ShapeOf(PhantomData)
    }
}

pub trait UnitShape {
    fn results(&self) -> Vec<TypeDesc>;
}

impl UnitShape for &&ShapeOf<()> {
    fn results(&self) -> Vec<TypeDesc> {
        Vec::new()
    }
}

pub trait UnitResultShape {
    fn results(&self) -> Vec<TypeDesc>;
}

impl<E: Into<BoxError>> UnitResultShape for &&ShapeOf<Result<(), E>> {
    fn results(&self) -> Vec<TypeDesc> {
        vec![TypeDesc::fallible::<E>()]
    }
}

pub trait ResultShape {
    fn results(&self) -> Vec<TypeDesc>;
}

impl<T, E: Into<BoxError>> ResultShape for &ShapeOf<Result<T, E>> {
    fn results(&self) -> Vec<TypeDesc> {
        vec![TypeDesc::of::<T>(), TypeDesc::fallible::<E>()]
    }
}

pub trait PlainShape {
    fn results(&self) -> Vec<TypeDesc>;
}

impl<T> PlainShape for ShapeOf<T> {
    fn results(&self) -> Vec<TypeDesc> {
        vec![TypeDesc::of::<T>()]
    }
}

pub trait BorrowedShape {
    type Receiver;
    type Func;

    fn target(&self, f: Self::Func) -> Option<MethodTarget<Self::Receiver>>;
}

impl<S, I, R> BorrowedShape for &&ShapeOf<fn(&S, &I) -> R>
where
    S: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    type Receiver = S;
    type Func = fn(&S, &I) -> R;

    fn target(&self, f: Self::Func) -> Option<MethodTarget<S>> {
        Some(MethodTarget::new::<(Borrowed<I>,), _>(f))
    }
}

impl<S, C, I, R> BorrowedShape for &&ShapeOf<fn(&S, &C, &I) -> R>
where
    S: 'static,
    C: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    type Receiver = S;
    type Func = fn(&S, &C, &I) -> R;

    fn target(&self, f: Self::Func) -> Option<MethodTarget<S>> {
        Some(MethodTarget::new::<(WithContext<C>, Borrowed<I>), _>(f))
    }
}

pub trait InvocableShape {
    type Receiver;
    type Func;

    fn target(&self, f: Self::Func) -> Option<MethodTarget<Self::Receiver>>;
}

impl<S, R> InvocableShape for &ShapeOf<fn(&S) -> R>
where
    S: 'static,
    R: Outcome,
{
    type Receiver = S;
    type Func = fn(&S) -> R;

    fn target(&self, f: Self::Func) -> Option<MethodTarget<S>> {
        Some(MethodTarget::new::<(), _>(f))
    }
}

impl<S, I, R> InvocableShape for &ShapeOf<fn(&S, I) -> R>
where
    S: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    type Receiver = S;
    type Func = fn(&S, I) -> R;

    fn target(&self, f: Self::Func) -> Option<MethodTarget<S>> {
        Some(MethodTarget::new::<(Owned<I>,), _>(f))
    }
}

impl<S, C, I, R> InvocableShape for &ShapeOf<fn(&S, &C, I) -> R>
where
    S: 'static,
    C: 'static,
    I: Default + Send + 'static,
    R: Outcome,
{
    type Receiver = S;
    type Func = fn(&S, &C, I) -> R;

    fn target(&self, f: Self::Func) -> Option<MethodTarget<S>> {
        Some(MethodTarget::new::<(WithContext<C>, Owned<I>), _>(f))
    }
}

pub trait OpaqueShape {
    type Func;

    fn target<S>(&self, f: Self::Func) -> Option<MethodTarget<S>>;
}

impl<F> OpaqueShape for ShapeOf<F> {
    type Func = F;

    fn target<S>(&self, _f: F) -> Option<MethodTarget<S>> {
        None
    }
}
