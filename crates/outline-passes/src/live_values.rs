//! Values flowing into a region from outside.
//!
//! A value is *captured* by a region when an operation nested in the region
//! (at any depth) uses it as an operand, but the value is defined outside the
//! region. Block arguments of the region's blocks and results of operations
//! inside it are local.

use std::collections::HashSet;

use outline_ir::{IrContext, RegionRef, ValueRef};

/// Values used inside `region` but defined outside it.
///
/// The order is the order of first use during a pre-order walk of the
/// region's operations, operands left to right. Each value appears once.
pub fn captured_values(ctx: &IrContext, region: RegionRef) -> Vec<ValueRef> {
    let mut captures = Vec::new();
    let mut seen = HashSet::new();
    collect_region(ctx, region, region, &mut captures, &mut seen);
    captures
}

fn collect_region(
    ctx: &IrContext,
    root: RegionRef,
    region: RegionRef,
    captures: &mut Vec<ValueRef>,
    seen: &mut HashSet<ValueRef>,
) {
    for &block in &ctx.region(region).blocks {
        for &op in &ctx.block(block).ops {
            for &operand in ctx.op_operands(op) {
                if !defined_in_region(ctx, operand, root) && seen.insert(operand) {
                    captures.push(operand);
                }
            }
            for &nested in &ctx.op(op).regions {
                collect_region(ctx, root, nested, captures, seen);
            }
        }
    }
}

/// Whether `value` is defined in `region` or in a region nested in it.
pub fn defined_in_region(ctx: &IrContext, value: ValueRef, region: RegionRef) -> bool {
    let Some(block) = ctx.value_block(value) else {
        return false;
    };
    let mut current = ctx.block(block).parent_region;
    while let Some(r) = current {
        if r == region {
            return true;
        }
        current = ctx.region(r).parent_op.and_then(|op| ctx.op_parent_region(op));
    }
    false
}
