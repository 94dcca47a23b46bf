//! Integration tests for the obfuscation scheduler's ordering, enablement,
//! and cleanup guarantees.

use veil::{
    EffectiveConfig, Module, ObfuscationOptions, ObfuscationScheduler, PassKind, StageScope,
    MARKER_PREFIX,
};

const SAMPLE: &str = r#"
; two definitions, one declaration, some data
@msg = "secret"
@objc_class_Widget = bytes [1, 2, 3]
extern puts

main(%argc) {
entry:
  %a = add %argc, 1
  %b = add %a, 2
  br ^exit
exit:
  %s = load @msg
  call puts, %s
  ret %b
}

helper(%x) {
entry:
  %y = add %x, 40
  %z = xor %y, 5
  ret %z
}
"#;

fn sample_module() -> Module {
    Module::parse(SAMPLE).expect("sample module should parse")
}

/// Scheduler over a fixed options set, resolved without touching the process
/// environment.
fn scheduler_for(opts: &ObfuscationOptions) -> ObfuscationScheduler {
    ObfuscationScheduler::with_config(EffectiveConfig::resolve_with(opts, |_| false))
}

fn options_with(kind: PassKind) -> ObfuscationOptions {
    let mut opts = ObfuscationOptions {
        ir_obfuscation: true,
        seed: 0x42,
        ..Default::default()
    };
    match kind {
        PassKind::AntiHooking => opts.anti_hooking = true,
        PassKind::AntiClassDump => opts.anti_class_dump = true,
        PassKind::FunctionCallObfuscate => opts.function_call_obfuscate = true,
        PassKind::AntiDebugging => opts.anti_debugging = true,
        PassKind::StringEncryption => opts.string_encryption = true,
        PassKind::SplitBasicBlock => opts.split_basic_block = true,
        PassKind::BogusControlFlow => opts.bogus_control_flow = true,
        PassKind::Flattening => opts.flattening = true,
        PassKind::Substitution => opts.substitution = true,
        PassKind::ConstantEncryption => opts.constant_encryption = true,
        PassKind::IndirectBranch => opts.indirect_branch = true,
        PassKind::FunctionWrapper => opts.function_wrapper = true,
    }
    opts
}

#[test]
fn each_flag_alone_enables_exactly_one_kind() {
    for target in PassKind::ALL {
        let mut module = sample_module();
        let mut scheduler = scheduler_for(&options_with(target));
        scheduler.run_on_module(&mut module);

        for record in scheduler.stats().records() {
            assert_eq!(
                record.enabled,
                record.kind == target,
                "flag {} alone: unexpected enablement for {}",
                target.name(),
                record.kind.name()
            );
        }
        // every kind but the call-site-gated one is applied even when off
        for kind in PassKind::ALL {
            let applied = scheduler.stats().records_for(kind).count();
            if kind == PassKind::AntiClassDump && target != PassKind::AntiClassDump {
                assert_eq!(applied, 0, "anti-class-dump must be skipped when off");
            } else {
                assert!(applied > 0, "{} was never applied", kind.name());
            }
        }
    }
}

#[test]
fn master_flag_equals_union_of_individual_flags() {
    let master = ObfuscationOptions {
        ir_obfuscation: true,
        enable_all: true,
        ..Default::default()
    };
    let cfg = EffectiveConfig::resolve_with(&master, |_| false);
    for kind in PassKind::ALL {
        let individual =
            EffectiveConfig::resolve_with(&options_with(kind), |_| false).flag(kind);
        assert_eq!(cfg.flag(kind), individual);
        assert!(cfg.flag(kind));
    }
}

#[test]
fn top_level_switch_off_means_zero_work() {
    let mut module = sample_module();
    let before = module.print();
    let opts = ObfuscationOptions {
        ir_obfuscation: false,
        enable_all: true,
        ..Default::default()
    };
    let mut scheduler = scheduler_for(&opts);
    assert!(!scheduler.run_on_module(&mut module));
    assert!(scheduler.stats().records().is_empty());
    assert_eq!(module.print(), before);
}

#[test]
fn declaration_only_module_skips_per_function_stages() {
    let mut module = Module::parse("extern a\nextern b\n").unwrap();
    let opts = ObfuscationOptions { ir_obfuscation: true, ..Default::default() };
    let mut scheduler = scheduler_for(&opts);
    assert!(!scheduler.run_on_module(&mut module));

    assert!(scheduler
        .stats()
        .records()
        .iter()
        .all(|r| r.scope == StageScope::Module));
    assert_eq!(module.functions.len(), 2);
}

#[test]
fn body_transforms_run_nested_per_function() {
    let body_order = [
        PassKind::SplitBasicBlock,
        PassKind::BogusControlFlow,
        PassKind::Flattening,
        PassKind::Substitution,
    ];
    let mut opts = ObfuscationOptions {
        ir_obfuscation: true,
        seed: 0x42,
        ..Default::default()
    };
    opts.split_basic_block = true;
    opts.bogus_control_flow = true;
    opts.flattening = true;
    opts.substitution = true;

    let mut module = sample_module();
    let mut scheduler = scheduler_for(&opts);
    scheduler.run_on_module(&mut module);

    let applications: Vec<(PassKind, String)> = scheduler
        .stats()
        .records()
        .iter()
        .filter(|r| r.scope == StageScope::Function && body_order.contains(&r.kind))
        .map(|r| (r.kind, r.function.clone().unwrap()))
        .collect();

    let expected: Vec<(PassKind, String)> = ["main", "helper"]
        .iter()
        .flat_map(|func| body_order.iter().map(|kind| (*kind, func.to_string())))
        .collect();
    assert_eq!(
        applications, expected,
        "body transforms must complete for one function before the next"
    );
}

#[test]
fn markers_never_survive_a_run() {
    for opts in [
        ObfuscationOptions { ir_obfuscation: true, ..Default::default() },
        ObfuscationOptions { ir_obfuscation: true, enable_all: true, seed: 0x42, ..Default::default() },
    ] {
        let mut module = Module::parse(
            "extern hikari_marker0\nf() {\nentry:\n  call hikari_marker0, 0\n  ret\n}\n",
        )
        .unwrap();
        let mut scheduler = scheduler_for(&opts);
        assert!(scheduler.run_on_module(&mut module));
        assert!(!module.print().contains(MARKER_PREFIX));
    }
}

#[test]
fn call_site_scenario_with_single_marker() {
    let mut module = Module::parse(
        "extern hikari_marker0\nextern puts\nf() {\nentry:\n  call hikari_marker0, 0\n  call puts\n  ret\n}\n",
    )
    .unwrap();
    let opts = options_with(PassKind::FunctionCallObfuscate);
    let mut scheduler = scheduler_for(&opts);
    assert!(scheduler.run_on_module(&mut module));

    let fco: Vec<_> = scheduler
        .stats()
        .records_for(PassKind::FunctionCallObfuscate)
        .collect();
    assert_eq!(fco.len(), 1);
    assert!(fco[0].enabled && fco[0].changed);
    assert_eq!(fco[0].function.as_deref(), Some("f"));

    for record in scheduler.stats().records() {
        if record.kind != PassKind::FunctionCallObfuscate {
            assert!(!record.changed, "{} must not mutate", record.kind.name());
        }
    }

    let printed = module.print();
    assert!(!printed.contains(MARKER_PREFIX));
    assert!(printed.contains("__veil_dlsym"));
    let f = module.find_function("f").unwrap();
    assert_eq!(f.blocks[0].insts.len(), 2, "marker call must be purged");
}

#[test]
fn identical_seed_gives_identical_output() {
    let opts = ObfuscationOptions {
        ir_obfuscation: true,
        enable_all: true,
        seed: 0x1338,
        ..Default::default()
    };
    let mut first = sample_module();
    let mut second = sample_module();
    scheduler_for(&opts).run_on_module(&mut first);
    scheduler_for(&opts).run_on_module(&mut second);
    assert_eq!(first.print(), second.print());
}

#[test]
fn reused_scheduler_matches_a_fresh_run() {
    let opts = ObfuscationOptions {
        ir_obfuscation: true,
        enable_all: true,
        seed: 0x42,
        ..Default::default()
    };
    let mut scheduler = scheduler_for(&opts);

    let mut first = sample_module();
    scheduler.run_on_module(&mut first);
    let first_records = scheduler.stats().records().len();

    let mut second = sample_module();
    scheduler.run_on_module(&mut second);
    assert_eq!(first.print(), second.print());
    assert_eq!(
        scheduler.stats().records().len(),
        first_records,
        "record log must cover only the most recent run"
    );
}

#[test]
fn master_flag_with_sentinel_seed_runs_to_completion() {
    let opts = ObfuscationOptions {
        ir_obfuscation: true,
        enable_all: true,
        ..Default::default()
    };
    let cfg = EffectiveConfig::resolve_with(&opts, |_| false);
    for kind in PassKind::ALL {
        assert!(cfg.flag(kind));
    }

    let mut module = sample_module();
    let mut scheduler = ObfuscationScheduler::with_config(cfg);
    assert!(scheduler.run_on_module(&mut module));
    assert!(!module.print().contains(MARKER_PREFIX));
}

#[test]
fn purge_alone_reports_changed() {
    // no flags set, but a marker is present: cleanup still mutates
    let mut module = Module::parse(
        "extern hikari_marker0\nf() {\nentry:\n  call hikari_marker0, 0\n  ret\n}\n",
    )
    .unwrap();
    let opts = ObfuscationOptions { ir_obfuscation: true, ..Default::default() };
    let mut scheduler = scheduler_for(&opts);
    assert!(scheduler.run_on_module(&mut module));
    assert!(module.find_function("hikari_marker0").is_none());
}
