//! End-to-end tests for the outlining passes over textual IR.

use std::ops::ControlFlow;

use outline_ir::dialect::{device, func};
use outline_ir::equivalence::compute_hash;
use outline_ir::parser::parse_test_module;
use outline_ir::printer::print_module;
use outline_ir::walk::{WalkAction, collect_ops_post_order, walk_op};
use outline_ir::{DialectOp, IrContext, Module, Symbol, SymbolTable};
use outline_passes::{
    ClusterOutliningPass, LaunchOutliningPass, OutlineOptions, OutlineResult, outline_clusters,
    outline_launches,
};

fn lookup_func(ctx: &IrContext, module: Module, name: &str) -> func::Func {
    let table = SymbolTable::new(ctx, module);
    let op = table
        .lookup(Symbol::from_dynamic(name))
        .unwrap_or_else(|| panic!("no symbol @{name}"));
    func::Func::from_op(ctx, op).unwrap()
}

fn count_ops<T: DialectOp>(ctx: &IrContext, module: Module) -> usize {
    let mut count = 0;
    let _ = walk_op::<()>(ctx, module.op(), &mut |op| {
        if T::matches(ctx, op) {
            count += 1;
        }
        ControlFlow::Continue(WalkAction::Advance)
    });
    count
}

const SINGLE_CLUSTER: &str = r#"core.module @m {
  func.func @main(%0: core.i32) -> core.i32 {
    %1 = device.cluster {device = "gpu:0"} : core.i32 {
      %2 = arith.const {value = 2} : core.i32
      %3 = arith.mul %0, %2 : core.i32
      device.return %3
    }
    %4 = arith.add %1, %1 : core.i32
    func.return %4
  }
}
"#;

#[test]
fn cluster_with_external_input_becomes_call() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(&mut ctx, SINGLE_CLUSTER);

    let result = ClusterOutliningPass::new(false).run(&mut ctx, module);
    assert_eq!(result.outlined_count, 1);

    insta::assert_snapshot!(print_module(&ctx, module.op()), @r#"
    core.module @m {
      func.func @main(%0: core.i32) -> core.i32 {
        %1 = device.cluster_func %0 {device = "gpu:0", func = @_func} : core.i32
        %2 = arith.add %1, %1 : core.i32
        func.return %2
      }
      func.func @_func(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %1 = arith.const {value = 2} : core.i32
        %2 = arith.mul %0, %1 : core.i32
        func.return %2
      }
    }
    "#);

    let outlined = lookup_func(&ctx, module, "_func");
    assert!(outlined.is_private(&ctx));
    let sig = outlined.function_type(&ctx).unwrap();
    assert_eq!(sig.inputs.len(), 1);
    assert_eq!(sig.results.len(), 1);

    // The call's only result feeds both operands of the add.
    let main = lookup_func(&ctx, module, "main");
    let calls: Vec<device::ClusterFunc> = collect_ops_post_order(&ctx, main.body(&ctx));
    assert_eq!(calls.len(), 1);
    let call = calls[0];
    assert_eq!(call.args(&ctx), [ctx.block_arg(main.entry_block(&ctx), 0)]);
    assert_eq!(call.func(&ctx), Some(Symbol::new("_func")));
    let call_result = ctx.op_result(call.op_ref(), 0);
    assert_eq!(ctx.uses(call_result).len(), 2);
    assert_eq!(count_ops::<device::Cluster>(&ctx, module), 0);
}

#[test]
fn second_run_changes_nothing() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(&mut ctx, SINGLE_CLUSTER);

    outline_clusters(&mut ctx, module, OutlineOptions::default());
    let once = print_module(&ctx, module.op());

    let again = outline_clusters(&mut ctx, module, OutlineOptions::default());
    assert_eq!(again, OutlineResult::default());
    assert_eq!(print_module(&ctx, module.op()), once);
}

#[test]
fn parameter_and_argument_order_follow_first_use() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(
        &mut ctx,
        r#"core.module @m {
  func.func @main(%0: core.i32, %1: core.f32, %2: core.i64) -> core.i64 {
    %3 = device.launch {device = "gpu:0"} : core.i64 {
      %4 = arith.add %2, %2 : core.i64
      %5 = test.use %0, %1, %2 : core.i64
      %6 = arith.mul %4, %5 : core.i64
      device.return %6
    }
    func.return %3
  }
}
"#,
    );
    outline_launches(&mut ctx, module, OutlineOptions::default());

    let main = lookup_func(&ctx, module, "main");
    let entry = main.entry_block(&ctx);
    let (a, b, c) = (
        ctx.block_arg(entry, 0),
        ctx.block_arg(entry, 1),
        ctx.block_arg(entry, 2),
    );
    let calls: Vec<device::LaunchFunc> = collect_ops_post_order(&ctx, main.body(&ctx));
    assert_eq!(calls[0].args(&ctx), [c, a, b]);

    let outlined = lookup_func(&ctx, module, "_func");
    let sig = outlined.function_type(&ctx).unwrap();
    let expected: Vec<_> = [c, a, b].iter().map(|&v| ctx.value_ty(v)).collect();
    assert_eq!(sig.inputs.as_slice(), expected.as_slice());
    let params: Vec<_> = ctx
        .block_args(outlined.entry_block(&ctx))
        .iter()
        .map(|&v| ctx.value_ty(v))
        .collect();
    assert_eq!(params, expected);
}

#[test]
fn self_contained_launch_with_several_results() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(
        &mut ctx,
        r#"core.module @m {
  func.func @main() -> (core.i32, core.f32) {
    %0, %1 = device.launch {device = "cpu"} : core.i32, core.f32 {
      %2 = arith.const {value = 4} : core.i32
      %3 = arith.const {value = 1.5} : core.f32
      device.return %2, %3
    }
    func.return %0, %1
  }
}
"#,
    );
    LaunchOutliningPass::new(false).run(&mut ctx, module);

    insta::assert_snapshot!(print_module(&ctx, module.op()), @r#"
    core.module @m {
      func.func @main() -> (core.i32, core.f32) {
        %0, %1 = device.launch_func {func = @_func} : core.i32, core.f32
        func.return %0, %1
      }
      func.func @_func() -> (core.i32, core.f32) attributes {sym_visibility = "private"} {
        %0 = arith.const {value = 4} : core.i32
        %1 = arith.const {value = 1.5} : core.f32
        func.return %0, %1
      }
    }
    "#);
}

#[test]
fn reused_name_is_renamed_on_collision() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(
        &mut ctx,
        r#"core.module @m {
  func.func @_func() {
    func.return
  }
  func.func @main(%0: core.i32) -> core.i32 {
    %1 = device.cluster : core.i32 {
      device.return %0
    }
    %2 = device.cluster : core.i32 {
      %3 = arith.add %1, %1 : core.i32
      device.return %3
    }
    func.return %2
  }
}
"#,
    );
    let result = outline_clusters(&mut ctx, module, OutlineOptions::default());
    let names: Vec<String> = result
        .outlined_functions
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(names, ["_func_0", "_func_1"]);

    insta::assert_snapshot!(print_module(&ctx, module.op()), @r#"
    core.module @m {
      func.func @_func() {
        func.return
      }
      func.func @main(%0: core.i32) -> core.i32 {
        %1 = device.cluster_func %0 {func = @_func_0} : core.i32
        %2 = device.cluster_func %1 {func = @_func_1} : core.i32
        func.return %2
      }
      func.func @_func_0(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        func.return %0
      }
      func.func @_func_1(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %1 = arith.add %0, %0 : core.i32
        func.return %1
      }
    }
    "#);
}

#[test]
fn launch_inside_cluster_is_outlined_in_two_steps() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(
        &mut ctx,
        r#"core.module @m {
  func.func @main(%0: core.i32, %1: core.i32) -> core.i32 {
    %2 = device.cluster : core.i32 {
      %3 = arith.add %0, %0 : core.i32
      %4 = device.launch {device = "gpu:1"} : core.i32 {
        %5 = arith.mul %3, %1 : core.i32
        device.return %5
      }
      device.return %4
    }
    func.return %2
  }
}
"#,
    );

    outline_clusters(&mut ctx, module, OutlineOptions::default());
    insta::assert_snapshot!(print_module(&ctx, module.op()), @r#"
    core.module @m {
      func.func @main(%0: core.i32, %1: core.i32) -> core.i32 {
        %2 = device.cluster_func %0, %1 {func = @_func} : core.i32
        func.return %2
      }
      func.func @_func(%0: core.i32, %1: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %2 = arith.add %0, %0 : core.i32
        %3 = device.launch {device = "gpu:1"} : core.i32 {
          %4 = arith.mul %2, %1 : core.i32
          device.return %4
        }
        func.return %3
      }
    }
    "#);

    outline_launches(&mut ctx, module, OutlineOptions::default());
    insta::assert_snapshot!(print_module(&ctx, module.op()), @r#"
    core.module @m {
      func.func @main(%0: core.i32, %1: core.i32) -> core.i32 {
        %2 = device.cluster_func %0, %1 {func = @_func} : core.i32
        func.return %2
      }
      func.func @_func(%0: core.i32, %1: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %2 = arith.add %0, %0 : core.i32
        %3 = device.launch_func %2, %1 {func = @_func_0} : core.i32
        func.return %3
      }
      func.func @_func_0(%0: core.i32, %1: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %2 = arith.mul %0, %1 : core.i32
        func.return %2
      }
    }
    "#);
}

#[test]
fn nested_clusters_are_outlined_inner_first() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(
        &mut ctx,
        r#"core.module @m {
  func.func @main(%0: core.i32) -> core.i32 {
    %1 = device.cluster {device = "tpu:0"} : core.i32 {
      %2 = device.cluster : core.i32 {
        %3 = arith.add %0, %0 : core.i32
        device.return %3
      }
      device.return %2
    }
    func.return %1
  }
}
"#,
    );
    let result = outline_clusters(&mut ctx, module, OutlineOptions::default());
    assert_eq!(result.outlined_count, 2);

    insta::assert_snapshot!(print_module(&ctx, module.op()), @r#"
    core.module @m {
      func.func @main(%0: core.i32) -> core.i32 {
        %1 = device.cluster_func %0 {device = "tpu:0", func = @_func_0} : core.i32
        func.return %1
      }
      func.func @_func(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %1 = arith.add %0, %0 : core.i32
        func.return %1
      }
      func.func @_func_0(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %1 = device.cluster_func %0 {func = @_func} : core.i32
        func.return %1
      }
    }
    "#);
}

const HASHED: &str = r#"core.module @m {
  func.func @main(%0: core.i32, %1: core.f32) -> core.i32 {
    %2 = device.cluster {device = "gpu:0"} : core.i32 {
      device.return %0
    }
    %3 = device.cluster {device = "gpu:0"} : core.i32 {
      %4 = arith.add %2, %2 : core.i32
      device.return %4
    }
    %5 = device.cluster {device = "gpu:1"} : core.i32 {
      device.return %3
    }
    func.return %5
  }
}
"#;

#[test]
fn unique_names_follow_structure() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(&mut ctx, HASHED);
    let clusters: Vec<device::Cluster> = collect_ops_post_order(&ctx, module.body(&ctx).unwrap());
    let hashes: Vec<u64> = clusters
        .iter()
        .map(|c| compute_hash(&ctx, c.op_ref()))
        .collect();
    assert_eq!(hashes[0], hashes[1]);
    assert_ne!(hashes[0], hashes[2]);

    let result = ClusterOutliningPass::new(true).run(&mut ctx, module);
    let names: Vec<String> = result
        .outlined_functions
        .iter()
        .map(ToString::to_string)
        .collect();
    // Identical shapes derive the same name; the table renames the second.
    assert_eq!(
        names,
        [
            format!("_func_{}", hashes[0]),
            format!("_func_{}_0", hashes[0]),
            format!("_func_{}", hashes[2]),
        ]
    );
}

#[test]
fn unique_names_are_stable_across_runs() {
    let names = |input: &str| {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, input);
        let result = outline_clusters(
            &mut ctx,
            module,
            OutlineOptions {
                globally_unique_func_names: true,
            },
        );
        result
            .outlined_functions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    };
    assert_eq!(names(HASHED), names(HASHED));
    assert_eq!(names(SINGLE_CLUSTER).len(), 1);
    assert!(names(SINGLE_CLUSTER)[0].starts_with("_func_"));
}

#[test]
fn cluster_pass_leaves_launches_alone() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(
        &mut ctx,
        r#"core.module @m {
  func.func @main(%0: core.i32) -> core.i32 {
    %1 = device.launch {device = "gpu:0"} : core.i32 {
      device.return %0
    }
    func.return %1
  }
}
"#,
    );
    let before = print_module(&ctx, module.op());
    let result = outline_clusters(&mut ctx, module, OutlineOptions::default());
    assert_eq!(result.outlined_count, 0);
    assert_eq!(print_module(&ctx, module.op()), before);
    assert_eq!(count_ops::<device::Launch>(&ctx, module), 1);
}

#[test]
fn module_level_launch_keeps_value_names() {
    let mut ctx = IrContext::new();
    let module = parse_test_module(
        &mut ctx,
        r#"core.module @m {
  %0 = arith.const {value = 1} : core.i32
  %1 = device.launch {device = "gpu:0"} : core.i32 {
    %2 = arith.add %0, %0 : core.i32
    device.return %2
  }
}
"#,
    );

    outline_clusters(&mut ctx, module, OutlineOptions::default());
    outline_launches(&mut ctx, module, OutlineOptions::default());
    let printed = print_module(&ctx, module.op());
    insta::assert_snapshot!(printed, @r#"
    core.module @m {
      %0 = arith.const {value = 1} : core.i32
      %1 = device.launch_func %0 {func = @_func} : core.i32
      func.func @_func(%0: core.i32) -> core.i32 attributes {sym_visibility = "private"} {
        %1 = arith.add %0, %0 : core.i32
        func.return %1
      }
    }
    "#);

    let mut reparsed_ctx = IrContext::new();
    let reparsed = parse_test_module(&mut reparsed_ctx, &printed);
    assert_eq!(print_module(&reparsed_ctx, reparsed.op()), printed);
}
