//! `arith` dialect: constants and integer arithmetic.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::refs::{TypeRef, ValueRef};
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "arith",
    CONST => "const",
    ADD => "add",
    MUL => "mul",
    ATTR_VALUE => "value",
}

crate::define_op! {
    pub struct Const = "arith"."const";
    pub struct Add = "arith"."add";
    pub struct Mul = "arith"."mul";
}

impl Const {
    pub fn value(&self, ctx: &IrContext) -> Attribute {
        ctx.attr(self.0, ATTR_VALUE()).cloned().unwrap_or(Attribute::Unit)
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

pub fn r#const(
    ctx: &mut IrContext,
    location: Location,
    result_ty: TypeRef,
    value: Attribute,
) -> Const {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), CONST())
        .result(result_ty)
        .attr(ATTR_VALUE(), value)
        .build(ctx);
    Const(ctx.create_op(data))
}

macro_rules! binary_ops {
    ($($name:ident => $ctor:ident, $sym:ident;)*) => {
        $(
            impl $name {
                pub fn lhs(&self, ctx: &IrContext) -> ValueRef {
                    ctx.op_operands(self.0)[0]
                }

                pub fn rhs(&self, ctx: &IrContext) -> ValueRef {
                    ctx.op_operands(self.0)[1]
                }

                pub fn result(&self, ctx: &IrContext) -> ValueRef {
                    ctx.op_result(self.0, 0)
                }
            }

            pub fn $ctor(
                ctx: &mut IrContext,
                location: Location,
                lhs: ValueRef,
                rhs: ValueRef,
                result_ty: TypeRef,
            ) -> $name {
                let data = OperationDataBuilder::new(location, DIALECT_NAME(), $sym())
                    .operand(lhs)
                    .operand(rhs)
                    .result(result_ty)
                    .build(ctx);
                $name(ctx.create_op(data))
            }
        )*
    };
}

binary_ops! {
    Add => add, ADD;
    Mul => mul, MUL;
}
