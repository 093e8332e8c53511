//! Text format parser.
//!
//! Parses the format produced by [`crate::printer`] in two stages:
//!
//! 1. **Raw parse**: `winnow` combinators in [`raw`] turn text into `Raw*`
//!    structures with names left unresolved.
//! 2. **IR build**: `IrBuilder` resolves value names and creates operations,
//!    blocks and regions in an [`IrContext`].

pub(crate) mod raw;

use std::collections::{HashMap, HashSet};

use derive_more::{Display, Error};
use smallvec::SmallVec;
use winnow::prelude::*;

use crate::context::{BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::dialect::core::FunctionType;
use crate::dialect::func;
use crate::location::{Location, Span};
use crate::module::Module;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;
use raw::{RawAttribute, RawBlock, RawOperation, RawRegion, RawType};

/// Parse error for the text format.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("parse error at offset {offset}: {message}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn build(message: String) -> Self {
        Self { message, offset: 0 }
    }
}

// ============================================================================
// IrBuilder (Raw -> IR)
// ============================================================================

struct IrBuilder<'a> {
    ctx: &'a mut IrContext,
    location: Location,
    /// Value name (without `%`) -> value, for the scopes currently open.
    values: HashMap<String, ValueRef>,
}

impl<'a> IrBuilder<'a> {
    fn new(ctx: &'a mut IrContext, path: &str) -> Self {
        let path = ctx.paths.intern(path);
        Self {
            ctx,
            location: Location::new(path, Span::default()),
            values: HashMap::new(),
        }
    }

    fn build_type(&mut self, raw: &RawType<'_>) -> TypeRef {
        let params: Vec<TypeRef> = raw.params.iter().map(|p| self.build_type(p)).collect();
        let mut builder =
            TypeDataBuilder::new(Symbol::from_dynamic(raw.dialect), Symbol::from_dynamic(raw.name))
                .params(params);
        for (key, value) in &raw.attrs {
            let value = self.build_attribute(value);
            builder = builder.attr(Symbol::from_dynamic(key), value);
        }
        self.ctx.types.intern(builder.build())
    }

    fn build_attribute(&mut self, raw: &RawAttribute<'_>) -> Attribute {
        match raw {
            RawAttribute::Bool(b) => Attribute::Bool(*b),
            RawAttribute::Int(n) => Attribute::IntBits(*n),
            RawAttribute::Float(v) => Attribute::FloatBits(v.to_bits()),
            RawAttribute::String(s) => Attribute::String(s.clone()),
            RawAttribute::Symbol(s) => Attribute::Symbol(Symbol::from_dynamic(s)),
            RawAttribute::Type(t) => Attribute::Type(self.build_type(t)),
            RawAttribute::List(items) => {
                Attribute::List(items.iter().map(|a| self.build_attribute(a)).collect())
            }
            RawAttribute::Unit => Attribute::Unit,
        }
    }

    fn resolve_value(&self, name: &str, raw: &RawOperation<'_>) -> Result<ValueRef, ParseError> {
        self.values.get(name).copied().ok_or_else(|| {
            ParseError::build(format!(
                "undefined value '%{name}' in operation '{}.{}'",
                raw.dialect, raw.op_name
            ))
        })
    }

    fn define_value(&mut self, name: &str, value: ValueRef) -> Result<(), ParseError> {
        if self.values.insert(name.to_owned(), value).is_some() {
            return Err(ParseError::build(format!("duplicate SSA name '%{name}'")));
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Regions and blocks
    // ----------------------------------------------------------------

    /// Build a region. Names defined inside are dropped when it closes.
    /// Names from enclosing regions stay visible inside unless `isolated`
    /// (function and module bodies, which the printer numbers afresh).
    ///
    /// `entry_args` come from a function signature and become the entry
    /// block's arguments.
    fn build_region(
        &mut self,
        raw: &RawRegion<'_>,
        entry_args: Option<&[(&str, RawType<'_>)]>,
        isolated: bool,
    ) -> Result<RegionRef, ParseError> {
        let saved = if isolated {
            std::mem::take(&mut self.values)
        } else {
            self.values.clone()
        };
        let result = self.build_region_inner(raw, entry_args);
        self.values = saved;
        result
    }

    fn build_region_inner(
        &mut self,
        raw: &RawRegion<'_>,
        entry_args: Option<&[(&str, RawType<'_>)]>,
    ) -> Result<RegionRef, ParseError> {
        let mut labels = HashSet::new();
        let mut blocks: SmallVec<[BlockRef; 4]> = SmallVec::new();

        // A function body printed without operations still has its entry block.
        let empty_entry;
        let raw_blocks = if entry_args.is_some() && raw.blocks.is_empty() {
            empty_entry = [RawBlock {
                label: None,
                args: Vec::new(),
                ops: Vec::new(),
            }];
            &empty_entry[..]
        } else {
            &raw.blocks[..]
        };

        for (i, raw_block) in raw_blocks.iter().enumerate() {
            if let Some(label) = raw_block.label {
                if !labels.insert(label) {
                    return Err(ParseError::build(format!("duplicate block label '^{label}'")));
                }
            }

            let args = match entry_args {
                Some(params) if i == 0 => {
                    if !raw_block.args.is_empty() {
                        return Err(ParseError::build(
                            "entry block of a function must take its arguments from the signature"
                                .to_owned(),
                        ));
                    }
                    params
                }
                _ => raw_block.args.as_slice(),
            };

            let arg_types: Vec<TypeRef> = args.iter().map(|(_, ty)| self.build_type(ty)).collect();
            let block = self.ctx.create_block(BlockData::new(self.location, arg_types));
            for (j, (name, _)) in args.iter().enumerate() {
                let value = self.ctx.block_arg(block, j as u32);
                self.define_value(name, value)?;
            }
            blocks.push(block);
        }

        for (raw_block, &block) in raw_blocks.iter().zip(&blocks) {
            for raw_op in &raw_block.ops {
                let op = self.build_operation(raw_op)?;
                self.ctx.push_op(block, op);
            }
        }

        Ok(self.ctx.create_region(RegionData {
            location: self.location,
            blocks,
            parent_op: None,
        }))
    }

    // ----------------------------------------------------------------
    // Operations
    // ----------------------------------------------------------------

    fn build_operation(&mut self, raw: &RawOperation<'_>) -> Result<OpRef, ParseError> {
        let operands = raw
            .operands
            .iter()
            .map(|name| self.resolve_value(name, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let result_types: Vec<TypeRef> =
            raw.result_types.iter().map(|t| self.build_type(t)).collect();
        if !raw.results.is_empty() && raw.results.len() != result_types.len() {
            return Err(ParseError::build(format!(
                "operation '{}.{}' declares {} result names but {} result types",
                raw.dialect,
                raw.op_name,
                raw.results.len(),
                result_types.len()
            )));
        }

        let mut builder = OperationDataBuilder::new(
            self.location,
            Symbol::from_dynamic(raw.dialect),
            Symbol::from_dynamic(raw.op_name),
        )
        .operands(operands)
        .results(result_types);

        for (key, value) in &raw.attributes {
            let value = self.build_attribute(value);
            builder = builder.attr(Symbol::from_dynamic(key), value);
        }
        if let Some(name) = &raw.sym_name {
            builder = builder.attr(
                func::ATTR_SYM_NAME(),
                Attribute::Symbol(Symbol::from_dynamic(name)),
            );
        }
        if raw.has_signature() {
            let inputs: Vec<TypeRef> = raw
                .func_params
                .iter()
                .flatten()
                .map(|(_, ty)| self.build_type(ty))
                .collect();
            let results: Vec<TypeRef> = raw
                .return_types
                .iter()
                .flatten()
                .map(|ty| self.build_type(ty))
                .collect();
            let ty = FunctionType::new(inputs, results).to_type(self.ctx);
            builder = builder.attr(func::ATTR_TYPE(), Attribute::Type(ty));
        }

        let isolated = raw.has_signature() || (raw.dialect == "core" && raw.op_name == "module");
        for (i, raw_region) in raw.regions.iter().enumerate() {
            let entry_args = match &raw.func_params {
                Some(params) if i == 0 => Some(params.as_slice()),
                _ if i == 0 && raw.has_signature() => Some(&[][..]),
                _ => None,
            };
            let region = self.build_region(raw_region, entry_args, isolated)?;
            builder = builder.region(region);
        }

        let data = builder.build(self.ctx);
        let op = self.ctx.create_op(data);

        for (i, name) in raw.results.iter().enumerate() {
            let value = self.ctx.op_result(op, i as u32);
            self.define_value(name, value)?;
        }
        Ok(op)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse one top-level operation (normally a `core.module`).
pub fn parse_module(ctx: &mut IrContext, input: &str) -> Result<OpRef, ParseError> {
    parse_module_with_path(ctx, input, "<input>")
}

/// Like [`parse_module`], recording `path` in the locations of the built IR.
pub fn parse_module_with_path(
    ctx: &mut IrContext,
    input: &str,
    path: &str,
) -> Result<OpRef, ParseError> {
    let mut remaining = input;
    let offset = |remaining: &str| input.len() - remaining.len();

    let raw_op = raw::raw_operation
        .parse_next(&mut remaining)
        .map_err(|e| ParseError {
            message: format!("syntax error: {e}"),
            offset: offset(remaining),
        })?;

    let _ = raw::ws.parse_next(&mut remaining);
    if !remaining.is_empty() {
        return Err(ParseError {
            message: "trailing input after top-level operation".to_owned(),
            offset: offset(remaining),
        });
    }

    IrBuilder::new(ctx, path).build_operation(&raw_op)
}

/// Parse textual IR into a [`Module`], panicking on failure.
///
/// Convenience wrapper around [`parse_module`] for tests.
pub fn parse_test_module(ctx: &mut IrContext, input: &str) -> Module {
    let op = parse_module(ctx, input).unwrap_or_else(|e| {
        panic!("failed to parse test IR: {e}\n\nInput:\n{input}");
    });
    Module::new(ctx, op)
        .unwrap_or_else(|| panic!("parsed operation is not a core.module\n\nInput:\n{input}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::device;
    use crate::ops::DialectOp;
    use crate::printer::print_module;

    fn assert_roundtrip(input: &str) {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, input);
        let printed = print_module(&ctx, module.op());
        assert_eq!(printed, input, "printing the parsed module changed it");

        let mut ctx2 = IrContext::new();
        let reparsed = parse_test_module(&mut ctx2, &printed);
        assert_eq!(print_module(&ctx2, reparsed.op()), printed);
    }

    #[test]
    fn roundtrip_outlined_module() {
        assert_roundtrip(
            r#"core.module @graph {
  func.func @main(%0: core.i32) -> core.i32 {
    %1 = device.cluster_func %0 {device = "tpu", func = @_func} : core.i32
    func.return %1
  }
  func.func @_func(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
    %1 = arith.add %0, %0 : core.i32
    func.return %1
  }
}
"#,
        );
    }

    #[test]
    fn roundtrip_module_level_values() {
        assert_roundtrip(
            r#"core.module @m {
  %0 = arith.const {value = 1} : core.i32
  %1 = arith.add %0, %0 : core.i32
}
"#,
        );
    }

    #[test]
    fn function_bodies_start_a_fresh_scope() {
        assert_roundtrip(
            r#"core.module @m {
  %0 = arith.const {value = 1} : core.i32
  %1 = device.launch_func %0 {func = @_func} : core.i32
  func.func @_func(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
    %1 = arith.add %0, %0 : core.i32
    func.return %1
  }
}
"#,
        );
    }

    #[test]
    fn module_values_are_not_visible_in_functions() {
        let mut ctx = IrContext::new();
        let err = parse_module(
            &mut ctx,
            r#"core.module @m {
  %k = arith.const {value = 1} : core.i32
  func.func @f() -> core.i32 {
    func.return %k
  }
}
"#,
        )
        .unwrap_err();
        assert!(err.message.contains("undefined value '%k'"), "{err}");
    }

    #[test]
    fn roundtrip_nested_regions_and_multiple_results() {
        assert_roundtrip(
            r#"core.module @m {
  func.func @main(%0: core.i32, %1: core.f32) -> (core.i32, core.f32) {
    %2, %3 = device.launch {device = "gpu:0"} : core.i32, core.f32 {
      %4 = arith.mul %0, %0 : core.i32
      device.return %4, %1
    }
    func.return %2, %3
  }
}
"#,
        );
    }

    #[test]
    fn roundtrip_labeled_blocks() {
        assert_roundtrip(
            r#"core.module @m {
  test.region {
  ^bb0(%0: core.i32):
    test.use %0
  ^bb1:
    test.end
  }
  func.func @empty() {
    func.return
  }
}
"#,
        );
    }

    #[test]
    fn signature_becomes_function_type() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(
            &mut ctx,
            "core.module @m {\n  func.func @f(%a: core.i32) -> core.f32 {\n    func.return\n  }\n}\n",
        );
        let f = func::Func::from_op(&ctx, module.ops(&ctx)[0]).unwrap();
        let sig = f.function_type(&ctx).unwrap();
        assert_eq!(sig.inputs.len(), 1);
        assert_eq!(sig.results.len(), 1);
        assert_eq!(ctx.block_args(f.entry_block(&ctx)).len(), 1);
        assert_eq!(module.name(&ctx), Some(Symbol::new("m")));
    }

    #[test]
    fn values_from_enclosing_regions_are_visible() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(
            &mut ctx,
            r#"core.module @m {
  func.func @f(%x: core.i32) {
    device.cluster {
      %y = arith.add %x, %x : core.i32
      device.return
    }
    func.return
  }
}
"#,
        );
        let f = func::Func::from_op(&ctx, module.ops(&ctx)[0]).unwrap();
        let x = ctx.block_arg(f.entry_block(&ctx), 0);
        let first = ctx.block(f.entry_block(&ctx)).ops[0];
        let cluster = device::Cluster::from_op(&ctx, first).unwrap();
        let add = ctx.block(cluster.block(&ctx)).ops[0];
        assert_eq!(ctx.op_operands(add), &[x, x]);
        assert_eq!(ctx.uses(x).len(), 2);
    }

    #[test]
    fn values_from_inner_regions_are_not_visible() {
        let mut ctx = IrContext::new();
        let err = parse_module(
            &mut ctx,
            r#"core.module @m {
  device.cluster {
    %y = arith.const {value = 1} : core.i32
    device.return
  }
  test.use %y
}
"#,
        )
        .unwrap_err();
        assert!(err.message.contains("undefined value '%y'"), "{err}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut ctx = IrContext::new();
        let err = parse_module(
            &mut ctx,
            "core.module @m {\n  %a = test.x : core.i32\n  %a = test.y : core.i32\n}\n",
        )
        .unwrap_err();
        assert!(err.message.contains("duplicate SSA name"), "{err}");
    }

    #[test]
    fn result_count_mismatch_is_rejected() {
        let mut ctx = IrContext::new();
        let err = parse_module(&mut ctx, "core.module @m {\n  %a, %b = test.x : core.i32\n}\n")
            .unwrap_err();
        assert!(err.message.contains("2 result names but 1 result types"), "{err}");
    }

    #[test]
    fn syntax_errors_report_offset() {
        let mut ctx = IrContext::new();
        let err = parse_module(&mut ctx, "core.module @m {\n  ???\n}\n").unwrap_err();
        assert!(err.offset > 0);
        assert!(err.to_string().starts_with("parse error at offset"));

        let err = parse_module(&mut ctx, "core.module @m {\n}\ntrailing.op\n").unwrap_err();
        assert_eq!(err.message, "trailing input after top-level operation");
    }
}
