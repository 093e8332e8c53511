//! `core.module` wrapper.

use crate::context::IrContext;
use crate::dialect::core;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::symbol::Symbol;

/// Thin wrapper around an `OpRef` pointing to a `core.module` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Module(OpRef);

impl Module {
    /// Wrap `op`, returning `None` unless it is a `core.module`.
    pub fn new(ctx: &IrContext, op: OpRef) -> Option<Self> {
        core::Module::matches(ctx, op).then_some(Module(op))
    }

    pub fn op(self) -> OpRef {
        self.0
    }

    pub fn body(self, ctx: &IrContext) -> Option<RegionRef> {
        ctx.op(self.0).regions.first().copied()
    }

    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        let region = self.body(ctx)?;
        ctx.region(region).blocks.first().copied()
    }

    /// Top-level operations in the module's first block.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        self.first_block(ctx)
            .map(|b| ctx.block(b).ops.to_vec())
            .unwrap_or_default()
    }

    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.attr(self.0, Symbol::new("sym_name"))
            .and_then(|a| a.as_symbol())
    }
}
