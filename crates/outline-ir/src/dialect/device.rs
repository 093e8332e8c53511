//! `device` dialect: regions placed on a device and their outlined calls.
//!
//! `device.cluster` and `device.launch` each own one single-block region
//! terminated by `device.return`; their results are the values returned
//! from it. Once outlined, they become `device.cluster_func` /
//! `device.launch_func` operations naming the function through the `func`
//! attribute.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "device",
    CLUSTER => "cluster",
    LAUNCH => "launch",
    RETURN => "return",
    CLUSTER_FUNC => "cluster_func",
    LAUNCH_FUNC => "launch_func",
    ATTR_DEVICE => "device",
    ATTR_FUNC => "func",
}

crate::define_op! {
    /// `device.cluster`: computation to be compiled as one unit.
    pub struct Cluster = "device"."cluster";
    /// `device.launch`: computation pinned to the device named by `device`.
    pub struct Launch = "device"."launch";
    /// `device.return`: terminator of cluster and launch bodies.
    pub struct Return = "device"."return";
    /// `device.cluster_func`: call of an outlined cluster body.
    pub struct ClusterFunc = "device"."cluster_func";
    /// `device.launch_func`: call of an outlined launch body.
    pub struct LaunchFunc = "device"."launch_func";
}

fn device_attr(ctx: &IrContext, op: OpRef) -> Option<&str> {
    ctx.attr(op, ATTR_DEVICE()).and_then(Attribute::as_str)
}

fn func_attr(ctx: &IrContext, op: OpRef) -> Option<Symbol> {
    ctx.attr(op, ATTR_FUNC()).and_then(Attribute::as_symbol)
}

macro_rules! region_op_accessors {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn body(&self, ctx: &IrContext) -> RegionRef {
                    ctx.op(self.0).regions[0]
                }

                /// The single block of the body.
                pub fn block(&self, ctx: &IrContext) -> BlockRef {
                    ctx.region(self.body(ctx)).blocks[0]
                }

                pub fn device<'a>(&self, ctx: &'a IrContext) -> Option<&'a str> {
                    device_attr(ctx, self.0)
                }

                pub fn results<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
                    ctx.op_results(self.0)
                }
            }
        )*
    };
}

macro_rules! call_op_accessors {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn args<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
                    ctx.op_operands(self.0)
                }

                pub fn func(&self, ctx: &IrContext) -> Option<Symbol> {
                    func_attr(ctx, self.0)
                }

                pub fn device<'a>(&self, ctx: &'a IrContext) -> Option<&'a str> {
                    device_attr(ctx, self.0)
                }
            }
        )*
    };
}

region_op_accessors!(Cluster, Launch);
call_op_accessors!(ClusterFunc, LaunchFunc);

impl Return {
    pub fn values<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.op_operands(self.0)
    }
}

pub fn cluster(
    ctx: &mut IrContext,
    location: Location,
    result_types: impl IntoIterator<Item = TypeRef>,
    body: RegionRef,
) -> Cluster {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), CLUSTER())
        .results(result_types)
        .region(body)
        .build(ctx);
    Cluster(ctx.create_op(data))
}

pub fn launch(
    ctx: &mut IrContext,
    location: Location,
    result_types: impl IntoIterator<Item = TypeRef>,
    device: &str,
    body: RegionRef,
) -> Launch {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), LAUNCH())
        .results(result_types)
        .attr(ATTR_DEVICE(), Attribute::from(device))
        .region(body)
        .build(ctx);
    Launch(ctx.create_op(data))
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

pub fn cluster_func(
    ctx: &mut IrContext,
    location: Location,
    args: impl IntoIterator<Item = ValueRef>,
    result_types: impl IntoIterator<Item = TypeRef>,
    attrs: impl IntoIterator<Item = (Symbol, Attribute)>,
) -> ClusterFunc {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), CLUSTER_FUNC())
        .operands(args)
        .results(result_types)
        .attrs(attrs)
        .build(ctx);
    ClusterFunc(ctx.create_op(data))
}

pub fn launch_func(
    ctx: &mut IrContext,
    location: Location,
    args: impl IntoIterator<Item = ValueRef>,
    result_types: impl IntoIterator<Item = TypeRef>,
    attrs: impl IntoIterator<Item = (Symbol, Attribute)>,
) -> LaunchFunc {
    let data = OperationDataBuilder::new(location, DIALECT_NAME(), LAUNCH_FUNC())
        .operands(args)
        .results(result_types)
        .attrs(attrs)
        .build(ctx);
    LaunchFunc(ctx.create_op(data))
}
