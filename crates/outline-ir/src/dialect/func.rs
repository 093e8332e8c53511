//! `func` dialect: functions, direct calls and returns.

use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::core::FunctionType;
use crate::location::Location;
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "func",
    FUNC => "func",
    CALL => "call",
    RETURN => "return",
    ATTR_SYM_NAME => "sym_name",
    ATTR_TYPE => "type",
    ATTR_SYM_VISIBILITY => "sym_visibility",
    ATTR_CALLEE => "callee",
}

/// Value of `sym_visibility` for functions not visible outside their module.
pub const PRIVATE: &str = "private";

crate::define_op! {
    /// `func.func @name(...) -> (...) { ... }`
    pub struct Func = "func"."func";
    /// `func.call`: direct call through the `callee` symbol.
    pub struct Call = "func"."call";
    /// `func.return`: terminator of a function body.
    pub struct Return = "func"."return";
}

impl Func {
    pub fn sym_name(&self, ctx: &IrContext) -> Symbol {
        match ctx.attr(self.0, ATTR_SYM_NAME()) {
            Some(Attribute::Symbol(s)) => *s,
            _ => panic!("func.func {} has no sym_name", self.0),
        }
    }

    pub fn r#type(&self, ctx: &IrContext) -> TypeRef {
        match ctx.attr(self.0, ATTR_TYPE()) {
            Some(Attribute::Type(t)) => *t,
            _ => panic!("func.func {} has no type", self.0),
        }
    }

    pub fn function_type(&self, ctx: &IrContext) -> Option<FunctionType> {
        FunctionType::from_type(ctx, self.r#type(ctx))
    }

    pub fn body(&self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn entry_block(&self, ctx: &IrContext) -> BlockRef {
        ctx.region(self.body(ctx)).blocks[0]
    }

    pub fn is_private(&self, ctx: &IrContext) -> bool {
        ctx.attr(self.0, ATTR_SYM_VISIBILITY())
            .and_then(Attribute::as_str)
            .is_some_and(|v| v == PRIVATE)
    }

    pub fn set_private(&self, ctx: &mut IrContext) {
        ctx.set_attr(self.0, ATTR_SYM_VISIBILITY(), Attribute::from(PRIVATE));
    }
}

pub fn func(
    ctx: &mut IrContext,
    location: Location,
    sym_name: Symbol,
    r#type: TypeRef,
    body: RegionRef,
) -> Func {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), FUNC())
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(sym_name))
        .attr(ATTR_TYPE(), Attribute::Type(r#type))
        .region(body)
        .build(ctx);
    Func(ctx.create_op(data))
}

impl Call {
    pub fn args<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.op_operands(self.0)
    }

    pub fn callee(&self, ctx: &IrContext) -> Option<Symbol> {
        ctx.attr(self.0, ATTR_CALLEE()).and_then(Attribute::as_symbol)
    }
}

pub fn call(
    ctx: &mut IrContext,
    location: Location,
    args: impl IntoIterator<Item = ValueRef>,
    result_types: impl IntoIterator<Item = TypeRef>,
    callee: Symbol,
) -> Call {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), CALL())
        .operands(args)
        .results(result_types)
        .attr(ATTR_CALLEE(), Attribute::Symbol(callee))
        .build(ctx);
    Call(ctx.create_op(data))
}

impl Return {
    pub fn values<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.op_operands(self.0)
    }
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), RETURN())
        .operands(values)
        .build(ctx);
    Return(ctx.create_op(data))
}
