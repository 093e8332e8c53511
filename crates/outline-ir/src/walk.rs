//! Recursive operation traversal.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Controls whether to descend into children during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Continue walking and descend into nested regions.
    Advance,
    /// Skip the nested regions of the current operation.
    Skip,
}

/// Walk all operations in a region, pre-order.
pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &block in &ctx.region(region).blocks {
        walk_block(ctx, block, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk all operations in a block, pre-order.
pub fn walk_block<B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &op in &ctx.block(block).ops {
        walk_op(ctx, op, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk an operation and its nested regions, pre-order.
pub fn walk_op<B>(
    ctx: &IrContext,
    op: OpRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(op) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    for &region in &ctx.op(op).regions {
        walk_region(ctx, region, f)?;
    }
    ControlFlow::Continue(())
}

/// Snapshot every operation of type `T` nested in `region`, post-order.
///
/// Nested matches come before the match enclosing them. The result holds
/// plain handles, so callers may mutate or erase the matches while
/// iterating over it.
pub fn collect_ops_post_order<T: DialectOp>(ctx: &IrContext, region: RegionRef) -> Vec<T> {
    let mut out = Vec::new();
    collect_region(ctx, region, &mut out);
    out
}

fn collect_region<T: DialectOp>(ctx: &IrContext, region: RegionRef, out: &mut Vec<T>) {
    for &block in &ctx.region(region).blocks {
        for &op in &ctx.block(block).ops {
            for &nested in &ctx.op(op).regions {
                collect_region(ctx, nested, out);
            }
            if let Ok(typed) = T::from_op(ctx, op) {
                out.push(typed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::device;
    use crate::parser::parse_test_module;

    const NESTED: &str = r#"core.module @m {
  func.func @main(%x: core.i32) -> core.i32 {
    %0 = device.cluster : core.i32 {
      %1 = device.launch : core.i32 {
        %2 = arith.add %x, %x : core.i32
        device.return %2
      }
      device.return %1
    }
    func.return %0
  }
}
"#;

    #[test]
    fn walk_visits_pre_order_and_skips() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, NESTED);
        let body = module.body(&ctx).unwrap();

        let mut names = Vec::new();
        let _ = walk_region::<()>(&ctx, body, &mut |op| {
            let data = ctx.op(op);
            names.push(format!("{}.{}", data.dialect, data.name));
            if data.name == "cluster" {
                ControlFlow::Continue(WalkAction::Skip)
            } else {
                ControlFlow::Continue(WalkAction::Advance)
            }
        });
        assert_eq!(names, ["func.func", "device.cluster", "func.return"]);
    }

    #[test]
    fn walk_breaks_early() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, NESTED);
        let body = module.body(&ctx).unwrap();

        let found = walk_region(&ctx, body, &mut |op| {
            if device::Launch::matches(&ctx, op) {
                ControlFlow::Break(op)
            } else {
                ControlFlow::Continue(WalkAction::Advance)
            }
        });
        assert!(matches!(found, ControlFlow::Break(op) if device::Launch::matches(&ctx, op)));
    }

    #[test]
    fn collect_is_post_order() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, NESTED);
        let body = module.body(&ctx).unwrap();

        let launches: Vec<device::Launch> = collect_ops_post_order(&ctx, body);
        let clusters: Vec<device::Cluster> = collect_ops_post_order(&ctx, body);
        assert_eq!(launches.len(), 1);
        assert_eq!(clusters.len(), 1);
        assert!(ctx.is_ancestor_region(clusters[0].body(&ctx), launches[0].op_ref()));
    }
}
