//! Structural hashing of operations.
//!
//! Two operations with the same dialect, name, attributes, operand types and
//! result types hash the same, no matter which context they live in or in
//! which order their symbols were interned. Nested regions and the identity
//! of operands are not part of the hash.
//!
//! NOTE: Uses `FxHasher` from `rustc-hash` over symbol text and type
//! structure, so a hash is reproducible across runs of the same binary.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::context::IrContext;
use crate::refs::{OpRef, TypeRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Compute the structural hash of `op`.
pub fn compute_hash(ctx: &IrContext, op: OpRef) -> u64 {
    let mut hasher = FxHasher::default();
    let data = ctx.op(op);

    hash_symbol(data.dialect, &mut hasher);
    hash_symbol(data.name, &mut hasher);

    let mut attrs: Vec<(String, &Attribute)> = data
        .attributes
        .iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    attrs.len().hash(&mut hasher);
    for (key, value) in attrs {
        key.hash(&mut hasher);
        hash_attribute(ctx, value, &mut hasher);
    }

    let operands = ctx.op_operands(op);
    operands.len().hash(&mut hasher);
    for &v in operands {
        hash_type(ctx, ctx.value_ty(v), &mut hasher);
    }

    let results = ctx.op_result_types(op);
    results.len().hash(&mut hasher);
    for &ty in results {
        hash_type(ctx, ty, &mut hasher);
    }

    hasher.finish()
}

fn hash_symbol(sym: Symbol, hasher: &mut impl Hasher) {
    sym.with_str(|s| s.hash(hasher));
}

fn hash_type(ctx: &IrContext, ty: TypeRef, hasher: &mut impl Hasher) {
    let data = ctx.types.get(ty);
    hash_symbol(data.dialect, hasher);
    hash_symbol(data.name, hasher);
    data.params.len().hash(hasher);
    for &param in &data.params {
        hash_type(ctx, param, hasher);
    }
    let mut attrs: Vec<(String, &Attribute)> =
        data.attrs.iter().map(|(k, v)| (k.to_string(), v)).collect();
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    attrs.len().hash(hasher);
    for (key, value) in attrs {
        key.hash(hasher);
        hash_attribute(ctx, value, hasher);
    }
}

fn hash_attribute(ctx: &IrContext, attr: &Attribute, hasher: &mut impl Hasher) {
    std::mem::discriminant(attr).hash(hasher);
    match attr {
        Attribute::Unit => {}
        Attribute::Bool(b) => b.hash(hasher),
        Attribute::IntBits(bits) | Attribute::FloatBits(bits) => bits.hash(hasher),
        Attribute::String(s) => s.hash(hasher),
        Attribute::Symbol(sym) => hash_symbol(*sym, hasher),
        Attribute::Type(ty) => hash_type(ctx, *ty, hasher),
        Attribute::List(items) => {
            items.len().hash(hasher);
            for item in items {
                hash_attribute(ctx, item, hasher);
            }
        }
    }
}
