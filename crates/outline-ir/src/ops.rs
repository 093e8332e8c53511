//! Typed operation wrappers.
//!
//! A dialect operation is a `Copy` newtype over [`OpRef`] implementing
//! [`DialectOp`]. [`define_op!`](crate::define_op) generates the struct and
//! the trait impl; accessors and constructors live next to it in the
//! dialect module.

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::symbol::Symbol;

/// Error when wrapping an operation as a dialect-specific type.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[display("expected `{expected}` but found `{actual}`")]
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    #[display("missing attribute `{_0}`")]
    MissingAttribute(#[error(not(source))] &'static str),
    #[display("attribute `{_0}` has the wrong kind")]
    WrongAttributeType(#[error(not(source))] &'static str),
    #[display("expected exactly one region")]
    MissingRegion,
}

/// Trait for typed dialect operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError>;
    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        ctx.op_is(
            op,
            Symbol::new(Self::DIALECT_NAME),
            Symbol::new(Self::OP_NAME),
        )
    }
}

/// Define a wrapper struct for `dialect.op` and implement [`DialectOp`] for it.
///
/// ```ignore
/// define_op! {
///     /// `func.call`: direct call by symbol.
///     pub struct Call = "func"."call";
/// }
/// ```
#[macro_export]
macro_rules! define_op {
    ($($(#[$meta:meta])* pub struct $name:ident = $dialect:literal . $op:literal;)*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq)]
            pub struct $name($crate::OpRef);

            impl $crate::ops::DialectOp for $name {
                const DIALECT_NAME: &'static str = $dialect;
                const OP_NAME: &'static str = $op;

                fn from_op(
                    ctx: &$crate::IrContext,
                    op: $crate::OpRef,
                ) -> Result<Self, $crate::ops::ConversionError> {
                    if !<Self as $crate::ops::DialectOp>::matches(ctx, op) {
                        return Err($crate::ops::ConversionError::WrongOperation {
                            expected: concat!($dialect, ".", $op),
                            actual: format!("{}.{}", ctx.op(op).dialect, ctx.op(op).name),
                        });
                    }
                    Ok(Self(op))
                }

                fn op_ref(&self) -> $crate::OpRef {
                    self.0
                }
            }

            impl $name {
                pub fn op_ref(&self) -> $crate::OpRef {
                    self.0
                }
            }
        )*
    };
}
