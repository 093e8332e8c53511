//! Region outlining for `device.cluster` and `device.launch`.
//!
//! Each matching operation has its single-block body moved into a new
//! private `func.func` appended to the module. Values the body used from
//! outside become the function's parameters, and the `device.return`
//! terminator becomes a `func.return`. The operation itself is replaced by a
//! `device.cluster_func` / `device.launch_func` call that passes the captured
//! values and names the function through its `func` attribute.
//!
//! ## Example
//!
//! ```text
//! // Before
//! func.func @main(%x: core.i32) -> core.i32 {
//!   %0 = device.cluster : core.i32 {
//!     %1 = arith.const {value = 1} : core.i32
//!     %2 = arith.add %x, %1 : core.i32
//!     device.return %2
//!   }
//!   func.return %0
//! }
//!
//! // After
//! func.func @main(%x: core.i32) -> core.i32 {
//!   %0 = device.cluster_func %x {func = @_func} : core.i32
//!   func.return %0
//! }
//! func.func @_func(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
//!   %1 = arith.const {value = 1} : core.i32
//!   %2 = arith.add %0, %1 : core.i32
//!   func.return %2
//! }
//! ```

use std::marker::PhantomData;

use outline_ir::dialect::core::FunctionType;
use outline_ir::dialect::{device, func};
use outline_ir::equivalence::compute_hash;
use outline_ir::walk::collect_ops_post_order;
use outline_ir::{
    Attribute, BlockData, BlockRef, DialectOp, IrContext, Location, Module, OpRef, RegionData,
    RegionRef, Symbol, SymbolTable, TypeRef, ValueRef,
};
use smallvec::smallvec;

use crate::live_values::captured_values;

/// Name of every outlined function, before uniquing.
pub const FUNC_NAME_PREFIX: &str = "_func";

/// Configuration for region outlining.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutlineOptions {
    /// Name each function `_func_<hash>` after the structural hash of the
    /// outlined operation instead of plain `_func`. Default: false.
    pub globally_unique_func_names: bool,
}

/// Result of running an outlining pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineResult {
    /// Number of operations outlined.
    pub outlined_count: usize,
    /// Final names of the created functions, in outlining order.
    pub outlined_functions: Vec<Symbol>,
}

/// The operation kind an outlining pass looks for and the call it emits.
pub trait OutlineTarget {
    /// The region-bearing operation to outline.
    type Op: DialectOp;

    /// The body region of `op`.
    fn body(ctx: &IrContext, op: Self::Op) -> RegionRef;

    /// Build the detached call operation replacing `op`.
    fn build_call(
        ctx: &mut IrContext,
        location: Location,
        args: Vec<ValueRef>,
        result_types: Vec<TypeRef>,
        attrs: Vec<(Symbol, Attribute)>,
    ) -> OpRef;

    /// The placement attribute to carry over to the call, if any.
    fn forwarded_device(ctx: &IrContext, op: Self::Op) -> Option<Attribute>;
}

/// Outlines `device.cluster` into `device.cluster_func`.
#[derive(Debug, Clone, Copy)]
pub struct ClusterTarget;

impl OutlineTarget for ClusterTarget {
    type Op = device::Cluster;

    fn body(ctx: &IrContext, op: Self::Op) -> RegionRef {
        op.body(ctx)
    }

    fn build_call(
        ctx: &mut IrContext,
        location: Location,
        args: Vec<ValueRef>,
        result_types: Vec<TypeRef>,
        attrs: Vec<(Symbol, Attribute)>,
    ) -> OpRef {
        device::cluster_func(ctx, location, args, result_types, attrs).op_ref()
    }

    fn forwarded_device(ctx: &IrContext, op: Self::Op) -> Option<Attribute> {
        // An empty string means unplaced.
        ctx.attr(op.op_ref(), device::ATTR_DEVICE())
            .filter(|device| device.as_str() != Some(""))
            .cloned()
    }
}

/// Outlines `device.launch` into `device.launch_func`.
#[derive(Debug, Clone, Copy)]
pub struct LaunchTarget;

impl OutlineTarget for LaunchTarget {
    type Op = device::Launch;

    fn body(ctx: &IrContext, op: Self::Op) -> RegionRef {
        op.body(ctx)
    }

    fn build_call(
        ctx: &mut IrContext,
        location: Location,
        args: Vec<ValueRef>,
        result_types: Vec<TypeRef>,
        attrs: Vec<(Symbol, Attribute)>,
    ) -> OpRef {
        device::launch_func(ctx, location, args, result_types, attrs).op_ref()
    }

    fn forwarded_device(_ctx: &IrContext, _op: Self::Op) -> Option<Attribute> {
        None
    }
}

/// Module pass outlining every operation selected by `T`.
pub struct OutliningPass<T> {
    options: OutlineOptions,
    _target: PhantomData<T>,
}

pub type ClusterOutliningPass = OutliningPass<ClusterTarget>;
pub type LaunchOutliningPass = OutliningPass<LaunchTarget>;

impl<T: OutlineTarget> OutliningPass<T> {
    pub fn new(globally_unique_func_names: bool) -> Self {
        Self::with_options(OutlineOptions {
            globally_unique_func_names,
        })
    }

    pub fn with_options(options: OutlineOptions) -> Self {
        Self {
            options,
            _target: PhantomData,
        }
    }

    pub fn options(&self) -> OutlineOptions {
        self.options
    }

    /// Outline every matching operation nested anywhere in `module`.
    pub fn run(&self, ctx: &mut IrContext, module: Module) -> OutlineResult {
        let op_name = format!(
            "{}.{}",
            <T::Op as DialectOp>::DIALECT_NAME,
            <T::Op as DialectOp>::OP_NAME
        );
        let mut result = OutlineResult::default();

        let Some(body) = module.body(ctx) else {
            tracing::debug!("{op_name} outlining: module has no body");
            return result;
        };
        if module.first_block(ctx).is_none() {
            tracing::debug!("{op_name} outlining: module body is empty");
            return result;
        }

        // Snapshot first: outlining erases the matched operations.
        let targets: Vec<T::Op> = collect_ops_post_order(ctx, body);
        if targets.is_empty() {
            return result;
        }

        let mut symbols = SymbolTable::new(ctx, module);
        for op in targets {
            let name = self.outline_op(ctx, &mut symbols, op);
            result.outlined_count += 1;
            result.outlined_functions.push(name);
        }

        tracing::info!(
            "{op_name} outlining: outlined {} operation(s)",
            result.outlined_count
        );
        result
    }

    fn outline_op(&self, ctx: &mut IrContext, symbols: &mut SymbolTable, op: T::Op) -> Symbol {
        let op_ref = op.op_ref();
        let location = ctx.op(op_ref).location;
        let region = T::body(ctx, op);
        let block = single_block(ctx, op_ref, region);

        let name = if self.options.globally_unique_func_names {
            Symbol::from_dynamic(&format!(
                "{FUNC_NAME_PREFIX}_{}",
                compute_hash(ctx, op_ref)
            ))
        } else {
            Symbol::new(FUNC_NAME_PREFIX)
        };

        let captures = captured_values(ctx, region);
        let input_types: Vec<TypeRef> = captures.iter().map(|&v| ctx.value_ty(v)).collect();
        let result_types: Vec<TypeRef> = ctx.op_result_types(op_ref).to_vec();

        // Function body: one argument per capture, uses inside the region
        // redirected to it.
        let entry = ctx.create_block(BlockData::new(location, input_types.iter().copied()));
        for (index, &captured) in captures.iter().enumerate() {
            let arg = ctx.block_arg(entry, index as u32);
            ctx.replace_all_uses_in_region(captured, arg, region);
        }
        ctx.move_ops(block, entry);
        rewrite_terminator(ctx, op_ref, entry);

        let body = ctx.create_region(RegionData {
            location,
            blocks: smallvec![entry],
            parent_op: None,
        });
        let signature = FunctionType::new(input_types, result_types.iter().copied());
        let func_type = signature.to_type(ctx);
        let function = func::func(ctx, location, name, func_type, body);
        function.set_private(ctx);
        let name = symbols.insert(ctx, function.op_ref());

        // Call site.
        ctx.set_attr(op_ref, device::ATTR_FUNC(), Attribute::Symbol(name));
        let device_attr = T::forwarded_device(ctx, op);
        let mut attrs: Vec<(Symbol, Attribute)> = ctx
            .op(op_ref)
            .attributes
            .iter()
            .filter(|(key, _)| **key != device::ATTR_DEVICE())
            .map(|(key, value)| (*key, value.clone()))
            .collect();
        if let Some(device_attr) = device_attr {
            attrs.push((device::ATTR_DEVICE(), device_attr));
        }

        let Some(parent) = ctx.op(op_ref).parent_block else {
            panic!("outlining: {op_ref} is not attached to a block");
        };
        let capture_count = captures.len();
        let call = T::build_call(ctx, location, captures, result_types, attrs);
        ctx.insert_op_before(parent, op_ref, call);
        ctx.replace_op_uses(op_ref, call);
        ctx.erase_op(op_ref);

        tracing::debug!(
            "outlined {}.{} into @{name} ({capture_count} capture(s))",
            <T::Op as DialectOp>::DIALECT_NAME,
            <T::Op as DialectOp>::OP_NAME,
        );
        name
    }
}

/// Outline every `device.cluster` in `module`.
pub fn outline_clusters(
    ctx: &mut IrContext,
    module: Module,
    options: OutlineOptions,
) -> OutlineResult {
    ClusterOutliningPass::with_options(options).run(ctx, module)
}

/// Outline every `device.launch` in `module`.
pub fn outline_launches(
    ctx: &mut IrContext,
    module: Module,
    options: OutlineOptions,
) -> OutlineResult {
    LaunchOutliningPass::with_options(options).run(ctx, module)
}

/// The only block of `region`.
///
/// # Panics
///
/// Panics unless `region` has exactly one block.
fn single_block(ctx: &IrContext, op: OpRef, region: RegionRef) -> BlockRef {
    let blocks = &ctx.region(region).blocks;
    assert_eq!(
        blocks.len(),
        1,
        "outlining: body of {op} must have exactly one block, found {}",
        blocks.len(),
    );
    blocks[0]
}

/// Replace the trailing `device.return` of `block` with a `func.return`
/// carrying the same values.
///
/// # Panics
///
/// Panics if the block does not end with `device.return`.
fn rewrite_terminator(ctx: &mut IrContext, op: OpRef, block: BlockRef) {
    let terminator = ctx
        .block_terminator(block)
        .and_then(|t| device::Return::from_op(ctx, t).ok());
    let Some(terminator) = terminator else {
        panic!("outlining: body of {op} must end with device.return");
    };
    let values: Vec<ValueRef> = terminator.values(ctx).to_vec();
    let location = ctx.op(terminator.op_ref()).location;
    let ret = func::r#return(ctx, location, values);
    ctx.insert_op_before(block, terminator.op_ref(), ret.op_ref());
    ctx.erase_op(terminator.op_ref());
}
