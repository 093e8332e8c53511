//! Dialect definitions.

pub mod arith;
pub mod core;
pub mod device;
pub mod func;

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::core::FunctionType;
    use super::{arith, device, func};
    use crate::location::{Location, Span};
    use crate::ops::{ConversionError, DialectOp};
    use crate::refs::{PathRef, TypeRef};
    use crate::{Attribute, BlockData, IrContext, RegionData, Symbol, TypeDataBuilder};

    fn dummy_location() -> Location {
        Location::new(PathRef::from_u32(0), Span::default())
    }

    fn i32_type(ctx: &mut IrContext) -> TypeRef {
        ctx.types
            .intern(TypeDataBuilder::new(Symbol::new("core"), Symbol::new("i32")).build())
    }

    fn f32_type(ctx: &mut IrContext) -> TypeRef {
        ctx.types
            .intern(TypeDataBuilder::new(Symbol::new("core"), Symbol::new("f32")).build())
    }

    #[test]
    fn arith_const_round_trip() {
        let mut ctx = IrContext::new();
        let loc = dummy_location();
        let i32_ty = i32_type(&mut ctx);

        let op = arith::r#const(&mut ctx, loc, i32_ty, Attribute::IntBits(42));
        let again = arith::Const::from_op(&ctx, op.op_ref()).expect("should match arith.const");
        assert_eq!(op, again);
        assert_eq!(op.value(&ctx), Attribute::IntBits(42));
        assert_eq!(ctx.value_ty(op.result(&ctx)), i32_ty);
    }

    #[test]
    fn from_op_rejects_other_kinds() {
        let mut ctx = IrContext::new();
        let loc = dummy_location();
        let i32_ty = i32_type(&mut ctx);
        let op = arith::r#const(&mut ctx, loc, i32_ty, Attribute::IntBits(1));

        let err = device::Cluster::from_op(&ctx, op.op_ref()).unwrap_err();
        assert_eq!(
            err,
            ConversionError::WrongOperation {
                expected: "device.cluster",
                actual: "arith.const".to_owned(),
            }
        );
        assert_eq!(
            err.to_string(),
            "expected `device.cluster` but found `arith.const`"
        );
    }

    #[test]
    fn function_type_round_trip() {
        let mut ctx = IrContext::new();
        let i32_ty = i32_type(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let sig = FunctionType::new([i32_ty, f32_ty], [f32_ty, i32_ty]);
        let ty = sig.to_type(&mut ctx);
        assert_eq!(FunctionType::from_type(&ctx, ty), Some(sig.clone()));
        assert_eq!(sig.to_type(&mut ctx), ty);

        let empty = FunctionType::default().to_type(&mut ctx);
        assert_ne!(empty, ty);
        assert_eq!(
            FunctionType::from_type(&ctx, empty),
            Some(FunctionType::default())
        );
        assert_eq!(FunctionType::from_type(&ctx, i32_ty), None);
    }

    #[test]
    fn func_visibility() {
        let mut ctx = IrContext::new();
        let loc = dummy_location();
        let ty = FunctionType::default().to_type(&mut ctx);
        let entry = ctx.create_block(BlockData::new(loc, []));
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());
        let body = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![entry],
            parent_op: None,
        });
        let f = func::func(&mut ctx, loc, Symbol::new("helper"), ty, body);

        assert_eq!(f.sym_name(&ctx), "helper");
        assert!(!f.is_private(&ctx));
        f.set_private(&mut ctx);
        assert!(f.is_private(&ctx));
        assert_eq!(f.entry_block(&ctx), entry);
        assert_eq!(f.function_type(&ctx), Some(FunctionType::default()));
    }

    #[test]
    fn launch_carries_device_and_region() {
        let mut ctx = IrContext::new();
        let loc = dummy_location();
        let i32_ty = i32_type(&mut ctx);

        let block = ctx.create_block(BlockData::new(loc, []));
        let c = arith::r#const(&mut ctx, loc, i32_ty, Attribute::IntBits(7));
        ctx.push_op(block, c.op_ref());
        let cv = c.result(&ctx);
        let ret = device::r#return(&mut ctx, loc, [cv]);
        ctx.push_op(block, ret.op_ref());
        let region = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![block],
            parent_op: None,
        });

        let launch = device::launch(&mut ctx, loc, [i32_ty], "/device:CPU:0", region);
        assert_eq!(launch.device(&ctx), Some("/device:CPU:0"));
        assert_eq!(launch.body(&ctx), region);
        assert_eq!(launch.block(&ctx), block);
        assert_eq!(launch.results(&ctx).len(), 1);
        assert_eq!(ctx.region(region).parent_op, Some(launch.op_ref()));
        let ret = device::Return::from_op(&ctx, ctx.block_terminator(block).unwrap()).unwrap();
        assert_eq!(ret.values(&ctx), &[cv]);
    }

    #[test]
    fn cluster_func_keeps_given_attrs() {
        let mut ctx = IrContext::new();
        let loc = dummy_location();
        let i32_ty = i32_type(&mut ctx);
        let arg = arith::r#const(&mut ctx, loc, i32_ty, Attribute::IntBits(3)).result(&ctx);

        let call = device::cluster_func(
            &mut ctx,
            loc,
            [arg],
            [i32_ty],
            [
                (device::ATTR_FUNC(), Attribute::Symbol(Symbol::new("_func"))),
                (device::ATTR_DEVICE(), Attribute::from("tpu")),
            ],
        );
        assert_eq!(call.args(&ctx), &[arg]);
        assert_eq!(call.func(&ctx), Some(Symbol::new("_func")));
        assert_eq!(call.device(&ctx), Some("tpu"));
        assert!(device::ClusterFunc::matches(&ctx, call.op_ref()));
        assert!(!device::LaunchFunc::matches(&ctx, call.op_ref()));
    }
}
