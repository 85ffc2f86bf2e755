/// Declare an inherent `impl` block and make its methods enumerable.
///
/// The block is emitted unchanged, together with a [`Reflect`](crate::Reflect)
/// impl that lists its methods: name, whether it is `pub`, signature and,
/// when the shape allows it, an invocation target. Methods that do not fit
/// an accepted shape are still listed, and the service reflector skips them.
///
/// Methods taking `&self` and plain `name: Type` parameters are described
/// fully. Inputs may be owned or borrowed (`&I`); a borrowed context comes
/// first after the receiver. Other items are kept in the block as written:
///
/// - `&mut self`, `self`, generic, `async` and `unsafe` methods are listed
///   as unsupported,
/// - associated functions without a receiver (constructors) and associated
///   constants are not listed.
///
/// ```rust
/// use std::convert::Infallible;
///
/// pub struct Greeter {
///     greeting: String,
/// }
///
/// rapace_callmap::service! {
///     impl Greeter {
///         pub fn new(greeting: &str) -> Self {
///             Greeter { greeting: greeting.to_string() }
///         }
///
///         pub fn greet(&self, name: &String) -> Result<String, Infallible> {
///             Ok(format!("{}, {}", self.greeting, name))
///         }
///
///         fn helper(&self) -> usize {
///             self.greeting.len()
///         }
///     }
/// }
///
/// let mut map = rapace_callmap::CallMap::new();
/// map.service(Greeter::new("Hi"));
/// let out = map.call_method("Greeter.greet", None, Box::new(String::from("Ann"))).unwrap();
/// assert_eq!(*out.unwrap().downcast::<String>().unwrap(), "Hi, Ann");
/// ```
#[macro_export]
macro_rules! service {
    (
        $(#[$impl_attr:meta])*
        impl $recv:ident {
            $($items:tt)*
        }
    ) => {
        $(#[$impl_attr])*
        impl $recv {
            $($items)*
        }

        impl $crate::Reflect for $recv {
            fn type_name() -> &'static str {
                ::core::stringify!($recv)
            }

            fn method_set() -> ::std::vec::Vec<$crate::MethodCandidate<Self>> {
                #[allow(unused_mut)]
                let mut methods = ::std::vec::Vec::new();
                $crate::__callmap_methods!(methods; $($items)*);
                methods
            }
        }
    };
}

/// Walks the items of an `impl` block and pushes one candidate per method.
#[doc(hidden)]
#[macro_export]
macro_rules! __callmap_methods {
    // skip the rest of an item up to its body
    (@body $out:ident; { $($body:tt)* } $($rest:tt)*) => {
        $crate::__callmap_methods!($out; $($rest)*);
    };
    (@body $out:ident; $skip:tt $($rest:tt)*) => {
        $crate::__callmap_methods!(@body $out; $($rest)*);
    };

    // skip the rest of an item up to its semicolon
    (@semi $out:ident; ; $($rest:tt)*) => {
        $crate::__callmap_methods!($out; $($rest)*);
    };
    (@semi $out:ident; $skip:tt $($rest:tt)*) => {
        $crate::__callmap_methods!(@semi $out; $($rest)*);
    };

    ($out:ident;) => {};

    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? fn $name:ident(
            &self $(, $arg:ident : $arg_ty:ty)* $(,)?
        ) $(-> $ret:ty)? $body:block
        $($rest:tt)*
    ) => {
        $out.push({
            #[allow(unused_imports)]
            use $crate::__private::{
                BorrowedShape as _, InvocableShape as _, OpaqueShape as _, PlainShape as _,
                ResultShape as _, UnitResultShape as _, UnitShape as _,
            };

            $crate::MethodCandidate::new(
                ::core::stringify!($name),
                $crate::__callmap_exported!($(pub $(($($restrict)*))?)?),
                $crate::Signature::new(
                    ::std::vec![
                        $crate::TypeDesc::of::<&Self>()
                        $(, $crate::TypeDesc::of::<$arg_ty>())*
                    ],
                    (&&&$crate::__private::ShapeOf::<$crate::__callmap_ret!($($ret)?)>::new())
                        .results(),
                ),
                (&&&$crate::__private::ShapeOf::<
                    fn(&Self $(, $arg_ty)*) -> $crate::__callmap_ret!($($ret)?)
                >::new())
                .target(
                    Self::$name as fn(&Self $(, $arg_ty)*) -> $crate::__callmap_ret!($($ret)?),
                ),
            )
        });
        $crate::__callmap_methods!($out; $($rest)*);
    };

    // a receiver that is not a plain `&self`, or parameters that are not
    // plain `name: Type`
    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? fn $name:ident(& $($params:tt)*)
        $($rest:tt)*
    ) => {
        $crate::__callmap_unsupported!($out; $name; $(pub $(($($restrict)*))?)?);
        $crate::__callmap_methods!(@body $out; $($rest)*);
    };
    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? fn $name:ident($(mut)? self $($params:tt)*)
        $($rest:tt)*
    ) => {
        $crate::__callmap_unsupported!($out; $name; $(pub $(($($restrict)*))?)?);
        $crate::__callmap_methods!(@body $out; $($rest)*);
    };

    // no receiver
    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? fn $name:ident($($params:tt)*)
        $($rest:tt)*
    ) => {
        $crate::__callmap_methods!(@body $out; $($rest)*);
    };

    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? fn $name:ident < $($rest:tt)*
    ) => {
        $crate::__callmap_unsupported!($out; $name; $(pub $(($($restrict)*))?)?);
        $crate::__callmap_methods!(@body $out; $($rest)*);
    };

    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? const fn $($rest:tt)*
    ) => {
        $crate::__callmap_methods!($out; $(pub $(($($restrict)*))?)? fn $($rest)*);
    };
    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? $(async)? $(unsafe)? fn $name:ident $($rest:tt)*
    ) => {
        $crate::__callmap_unsupported!($out; $name; $(pub $(($($restrict)*))?)?);
        $crate::__callmap_methods!(@body $out; $($rest)*);
    };

    (
        $out:ident;
        $(#[$attr:meta])*
        $(pub $(($($restrict:tt)*))?)? const $($rest:tt)*
    ) => {
        $crate::__callmap_methods!(@semi $out; $($rest)*);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __callmap_unsupported {
    ($out:ident; $name:ident; $($vis:tt)*) => {
        $out.push($crate::MethodCandidate::unsupported(
            ::core::stringify!($name),
            $crate::__callmap_exported!($($vis)*),
        ));
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __callmap_exported {
    () => {
        false
    };
    (pub) => {
        true
    };
    (pub ($($restrict:tt)*)) => {
        false
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __callmap_ret {
    () => { () };
    ($ret:ty) => { $ret };
}
