//! `core` dialect: modules and function types.

use smallvec::SmallVec;

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::refs::{RegionRef, TypeRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeDataBuilder};

crate::symbols! {
    DIALECT_NAME => "core",
    MODULE => "module",
    FUNC => "func",
    ATTR_SYM_NAME => "sym_name",
    ATTR_RESULTS => "results",
}

crate::define_op! {
    /// `core.module @name { ... }`: top-level container of symbol operations.
    pub struct Module = "core"."module";
}

impl Module {
    pub fn sym_name(&self, ctx: &IrContext) -> Option<Symbol> {
        ctx.attr(self.0, ATTR_SYM_NAME()).and_then(Attribute::as_symbol)
    }

    pub fn body(&self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }
}

pub fn module(
    ctx: &mut IrContext,
    location: Location,
    sym_name: Symbol,
    body: RegionRef,
) -> Module {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), MODULE())
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(sym_name))
        .region(body)
        .build(ctx);
    Module(ctx.create_op(data))
}

/// Signature of a function: `core.func(inputs...) {results = [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionType {
    pub inputs: SmallVec<[TypeRef; 4]>,
    pub results: SmallVec<[TypeRef; 2]>,
}

impl FunctionType {
    pub fn new(
        inputs: impl IntoIterator<Item = TypeRef>,
        results: impl IntoIterator<Item = TypeRef>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    /// Decode a `core.func` type. Returns `None` for any other type.
    pub fn from_type(ctx: &IrContext, ty: TypeRef) -> Option<Self> {
        let data = ctx.types.get(ty);
        if data.dialect != DIALECT_NAME() || data.name != FUNC() {
            return None;
        }
        let results = match data.attrs.get(&ATTR_RESULTS()) {
            Some(Attribute::List(items)) => items
                .iter()
                .map(Attribute::as_type)
                .collect::<Option<SmallVec<_>>>()?,
            Some(_) => return None,
            None => SmallVec::new(),
        };
        Some(Self {
            inputs: data.params.iter().copied().collect(),
            results,
        })
    }

    /// Intern this signature as a `core.func` type.
    pub fn to_type(&self, ctx: &mut IrContext) -> TypeRef {
        let results = self.results.iter().map(|&t| Attribute::Type(t)).collect();
        ctx.types.intern(
            TypeDataBuilder::new(DIALECT_NAME(), FUNC())
                .params(self.inputs.iter().copied())
                .attr(ATTR_RESULTS(), Attribute::List(results))
                .build(),
        )
    }
}
