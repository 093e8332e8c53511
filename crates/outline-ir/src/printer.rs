//! Text format printer.
//!
//! ```text
//! core.module @graph {
//!   func.func @main(%0: core.i32) -> core.i32 {
//!     %1 = device.cluster_func %0 {func = @_func} : core.i32
//!     func.return %1
//!   }
//!   func.func @_func(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
//!     %1 = arith.add %0, %0 : core.i32
//!     func.return %1
//!   }
//! }
//! ```
//!
//! Values of a module body share one numbering. Every `func.func` and nested
//! `core.module` starts its own, since names from outside are not visible
//! in it.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write;

use crate::context::IrContext;
use crate::dialect::core::{self, FunctionType};
use crate::dialect::func;
use crate::ops::DialectOp;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;

struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, String>,
    block_labels: HashMap<BlockRef, String>,
    next_value_num: usize,
    next_block_num: usize,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            block_labels: HashMap::new(),
            next_value_num: 0,
            next_block_num: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let name = format!("%{}", self.next_value_num);
        self.next_value_num += 1;
        self.value_names.insert(v, name.clone());
        name
    }

    fn value_name(&self, v: ValueRef) -> &str {
        self.value_names.get(&v).map(String::as_str).unwrap_or("%?")
    }

    fn assign_block_label(&mut self, b: BlockRef) {
        let label = format!("^bb{}", self.next_block_num);
        self.next_block_num += 1;
        self.block_labels.insert(b, label);
    }

    fn block_label(&self, b: BlockRef) -> &str {
        self.block_labels.get(&b).map(String::as_str).unwrap_or("^bb?")
    }

    /// Run `f` with fresh numbering, then put the outer numbering back.
    fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = (
            std::mem::take(&mut self.value_names),
            std::mem::take(&mut self.block_labels),
            self.next_value_num,
            self.next_block_num,
        );
        self.next_value_num = 0;
        self.next_block_num = 0;
        let result = f(self);
        (
            self.value_names,
            self.block_labels,
            self.next_value_num,
            self.next_block_num,
        ) = saved;
        result
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print a single operation (and everything nested in it).
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    print_operation(&mut state, &mut out, op, 0).expect("fmt::Write to String never fails");
    out
}

pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    write_type(ctx, &mut out, ty).expect("fmt::Write to String never fails");
    out
}

/// Print a `core.module` operation.
pub fn print_module(ctx: &IrContext, root: OpRef) -> String {
    print_op(ctx, root)
}

// ============================================================================
// Types and attributes
// ============================================================================

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    let data = ctx.types.get(ty);
    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        f.write_char('(')?;
        write_separated(f, &data.params, |f, &param| write_type(ctx, f, param))?;
        f.write_char(')')?;
    } else if !data.attrs.is_empty() {
        // `()` announces the attribute dict.
        f.write_str("()")?;
    }
    if !data.attrs.is_empty() {
        f.write_char(' ')?;
        write_attr_dict(ctx, f, data.attrs.iter())?;
    }
    Ok(())
}

fn write_attribute(ctx: &IrContext, f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(v) => write!(f, "{v}"),
        Attribute::FloatBits(bits) => {
            let v = f64::from_bits(*bits);
            let s = format!("{v}");
            f.write_str(&s)?;
            if v.is_finite() && !s.contains(['.', 'e', 'E']) {
                f.write_str(".0")?;
            }
            Ok(())
        }
        Attribute::String(s) => {
            f.write_char('"')?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        }
        Attribute::Symbol(sym) => write_symbol(f, *sym),
        Attribute::Type(ty) => write_type(ctx, f, *ty),
        Attribute::List(list) => {
            f.write_char('[')?;
            write_separated(f, list, |f, item| write_attribute(ctx, f, item))?;
            f.write_char(']')
        }
    }
}

fn write_attr_dict<'a>(
    ctx: &IrContext,
    f: &mut impl Write,
    attrs: impl Iterator<Item = (&'a Symbol, &'a Attribute)>,
) -> fmt::Result {
    // Symbol order is interning order; print by name.
    let mut attrs: Vec<(String, &Attribute)> = attrs.map(|(k, v)| (k.to_string(), v)).collect();
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    f.write_char('{')?;
    for (i, (key, val)) in attrs.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key} = ")?;
        write_attribute(ctx, f, val)?;
    }
    f.write_char('}')
}

fn write_escaped_string(f: &mut impl Write, s: &str) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

fn write_symbol(f: &mut impl Write, sym: Symbol) -> fmt::Result {
    sym.with_str(|s| {
        let bare = !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if bare {
            write!(f, "@{s}")
        } else {
            f.write_str("@\"")?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        }
    })
}

fn write_separated<W: Write, T>(
    f: &mut W,
    items: &[T],
    mut each: impl FnMut(&mut W, &T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

// ============================================================================
// Operations
// ============================================================================

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    if core::Module::matches(state.ctx, op) {
        return print_module_op(state, f, op, indent);
    }
    if let Ok(func) = func::Func::from_op(state.ctx, op) {
        if let Some(sig) = func_signature(state.ctx, func) {
            return state.scoped(|state| print_func_op(state, f, func, &sig, indent));
        }
    }
    print_generic_op(state, f, op, indent)
}

/// The signature of a well-formed `func.func`, or `None` if it has to be
/// printed in the generic form.
fn func_signature(ctx: &IrContext, func: func::Func) -> Option<FunctionType> {
    let data = ctx.op(func.op_ref());
    data.attributes.get(&func::ATTR_SYM_NAME())?.as_symbol()?;
    let ty = data.attributes.get(&func::ATTR_TYPE())?.as_type()?;
    let sig = FunctionType::from_type(ctx, ty)?;
    let [region] = data.regions.as_slice() else {
        return None;
    };
    let entry = *ctx.region(*region).blocks.first()?;
    let arg_types: Vec<TypeRef> = ctx
        .block_args(entry)
        .iter()
        .map(|&a| ctx.value_ty(a))
        .collect();
    (arg_types.as_slice() == sig.inputs.as_slice()).then_some(sig)
}

fn print_generic_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    write!(f, "{:indent$}", "")?;

    let results = ctx.op_results(op);
    if !results.is_empty() {
        for (i, &v) in results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let name = state.assign_value_name(v);
            f.write_str(&name)?;
        }
        f.write_str(" = ")?;
    }

    let data = ctx.op(op);
    write!(f, "{}.{}", data.dialect, data.name)?;

    let operands = ctx.op_operands(op);
    if !operands.is_empty() {
        f.write_char(' ')?;
        write_separated(f, operands, |f, &v| f.write_str(state.value_name(v)))?;
    }

    if !data.attributes.is_empty() {
        f.write_char(' ')?;
        write_attr_dict(ctx, f, data.attributes.iter())?;
    }

    let result_types = ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        write_separated(f, result_types, |f, &ty| write_type(ctx, f, ty))?;
    }

    for &region in &data.regions {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent, false)?;
        write!(f, "{:indent$}}}", "")?;
    }

    f.write_char('\n')
}

/// Print the blocks of a region. Ops go at `indent + 2`, block labels at
/// `indent`. The entry label is left out when it carries no information:
/// for function bodies (arguments are in the signature) or when the entry
/// block has no arguments.
fn print_region(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    region: RegionRef,
    indent: usize,
    entry_args_in_signature: bool,
) -> fmt::Result {
    let ctx = state.ctx;
    let blocks = &ctx.region(region).blocks;
    for &block in blocks {
        state.assign_block_label(block);
    }

    for (i, &block) in blocks.iter().enumerate() {
        let args = ctx.block_args(block);
        let elide_label = i == 0 && (entry_args_in_signature || args.is_empty());
        if !elide_label {
            write!(f, "{:indent$}{}", "", state.block_label(block))?;
            if !args.is_empty() {
                f.write_char('(')?;
                for (j, &arg) in args.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    let name = state.assign_value_name(arg);
                    write!(f, "{name}: ")?;
                    write_type(ctx, f, ctx.value_ty(arg))?;
                }
                f.write_char(')')?;
            }
            f.write_str(":\n")?;
        }
        for &op in &ctx.block(block).ops {
            print_operation(state, f, op, indent + 2)?;
        }
    }
    Ok(())
}

fn print_module_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.op(op);
    write!(f, "{:indent$}core.module", "")?;
    if let Some(name) = data.attributes.get(&core::ATTR_SYM_NAME()).and_then(Attribute::as_symbol) {
        f.write_char(' ')?;
        write_symbol(f, name)?;
    }
    let extra: Vec<_> = data
        .attributes
        .iter()
        .filter(|(k, _)| **k != core::ATTR_SYM_NAME())
        .collect();
    if !extra.is_empty() {
        f.write_str(" attributes ")?;
        write_attr_dict(ctx, f, extra.into_iter())?;
    }

    for &region in &data.regions {
        f.write_str(" {\n")?;
        state.scoped(|state| -> fmt::Result {
            for &block in &ctx.region(region).blocks {
                for &child in &ctx.block(block).ops {
                    print_operation(state, f, child, indent + 2)?;
                }
            }
            Ok(())
        })?;
        write!(f, "{:indent$}}}", "")?;
    }
    f.write_char('\n')
}

fn print_func_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    func: func::Func,
    sig: &FunctionType,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let op = func.op_ref();
    write!(f, "{:indent$}func.func ", "")?;
    write_symbol(f, func.sym_name(ctx))?;

    let entry = func.entry_block(ctx);
    f.write_char('(')?;
    for (i, &arg) in ctx.block_args(entry).iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        let name = state.assign_value_name(arg);
        write!(f, "{name}: ")?;
        write_type(ctx, f, ctx.value_ty(arg))?;
    }
    f.write_char(')')?;

    match sig.results.as_slice() {
        [] => {}
        [single] => {
            f.write_str(" -> ")?;
            write_type(ctx, f, *single)?;
        }
        many => {
            f.write_str(" -> (")?;
            write_separated(f, many, |f, &ty| write_type(ctx, f, ty))?;
            f.write_char(')')?;
        }
    }

    let extra: Vec<_> = ctx
        .op(op)
        .attributes
        .iter()
        .filter(|(k, _)| **k != func::ATTR_SYM_NAME() && **k != func::ATTR_TYPE())
        .collect();
    if !extra.is_empty() {
        f.write_str(" attributes ")?;
        write_attr_dict(ctx, f, extra.into_iter())?;
    }

    f.write_str(" {\n")?;
    print_region(state, f, func.body(ctx), indent, true)?;
    writeln!(f, "{:indent$}}}", "")
}
