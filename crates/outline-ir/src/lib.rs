//! Arena-based mutable IR for region outlining.
//!
//! Operations, values, blocks and regions are owned by an [`IrContext`] and
//! referenced through `Copy` handles (`cranelift-entity`). The context keeps
//! use-chains up to date, which makes in-place rewrites such as
//! "replace all uses inside this region" cheap.

// === IR infrastructure ===
pub mod context;
pub mod equivalence;
pub mod location;
pub mod module;
pub mod ops;
pub mod parser;
pub mod printer;
pub mod refs;
pub mod symbol;
pub mod symbol_table;
pub mod types;
pub mod walk;

// === Dialect modules ===
pub mod dialect;

// Re-export smallvec for use in macros and external crates
pub use smallvec;

pub use context::{
    BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use, ValueData,
};
pub use location::{Location, Span};
pub use module::Module;
pub use ops::{ConversionError, DialectOp};
pub use parser::ParseError;
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use symbol::Symbol;
pub use symbol_table::SymbolTable;
pub use types::{Attribute, PathInterner, TypeData, TypeDataBuilder, TypeInterner};
pub use walk::WalkAction;
