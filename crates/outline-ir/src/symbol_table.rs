//! Per-module symbol table.
//!
//! Maps the `sym_name` of every top-level symbol operation in a module to
//! its `OpRef`. Names are unique within a table; inserting a clashing
//! symbol renames it.

use std::collections::HashMap;

use crate::context::IrContext;
use crate::module::Module;
use crate::refs::{BlockRef, OpRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    ATTR_SYM_NAME => "sym_name",
}

pub struct SymbolTable {
    block: BlockRef,
    symbols: HashMap<Symbol, OpRef>,
    /// Suffix counter shared by every rename performed through this table.
    uniquing_counter: u32,
}

impl SymbolTable {
    /// Build a table from the top-level operations of `module`.
    ///
    /// # Panics
    ///
    /// Panics if the module has no body block.
    pub fn new(ctx: &IrContext, module: Module) -> Self {
        let Some(block) = module.first_block(ctx) else {
            panic!("SymbolTable::new: module {} has no body block", module.op());
        };
        let mut symbols = HashMap::new();
        for &op in &ctx.block(block).ops {
            if let Some(name) = symbol_name(ctx, op) {
                symbols.entry(name).or_insert(op);
            }
        }
        Self {
            block,
            symbols,
            uniquing_counter: 0,
        }
    }

    pub fn lookup(&self, name: Symbol) -> Option<OpRef> {
        self.symbols.get(&name).copied()
    }

    pub fn contains(&self, name: Symbol) -> bool {
        self.symbols.contains_key(&name)
    }

    /// Append a detached symbol operation to the module body and register it.
    ///
    /// If its name is already taken, the operation is renamed to
    /// `<name>_<n>` with the first free counter value. Returns the final name.
    ///
    /// # Panics
    ///
    /// Panics if `op` has no `sym_name` symbol attribute.
    pub fn insert(&mut self, ctx: &mut IrContext, op: OpRef) -> Symbol {
        let Some(name) = symbol_name(ctx, op) else {
            panic!("SymbolTable::insert: {op} has no sym_name");
        };
        let name = if self.symbols.contains_key(&name) {
            let unique = self.unique_name(name);
            ctx.set_attr(op, ATTR_SYM_NAME(), Attribute::Symbol(unique));
            unique
        } else {
            name
        };
        ctx.push_op(self.block, op);
        self.symbols.insert(name, op);
        name
    }

    fn unique_name(&mut self, base: Symbol) -> Symbol {
        loop {
            let candidate = base.with_str(|s| format!("{s}_{}", self.uniquing_counter));
            self.uniquing_counter += 1;
            let candidate = Symbol::from_dynamic(&candidate);
            if !self.symbols.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

fn symbol_name(ctx: &IrContext, op: OpRef) -> Option<Symbol> {
    ctx.attr(op, ATTR_SYM_NAME()).and_then(Attribute::as_symbol)
}
