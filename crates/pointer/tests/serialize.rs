mod common;

use std::{io::Cursor, sync::Arc};

use common::{eager_engine, lazy_config};

use kestrel_ir::{
    DataLayout, GlobalVariableData, Linkage, Program, ProgramBuilder, Signature, Type, ValueRef,
};
use kestrel_pointer::{
    traverse_values, AliasInfo, LoadError, PointsToEngine,
};

fn sample_program() -> (Arc<Program>, Vec<ValueRef>) {
    let mut pb = ProgramBuilder::new();
    let i8_ptr = pb.ptr_type(Type::I8);
    let module = pb.make_module("m0", DataLayout::default());
    let g = pb.make_global(
        module,
        GlobalVariableData::new("g".into(), Type::I32, Linkage::Private, false, None),
    );
    let func = pb.declare_function(
        module,
        Signature::new("f", Linkage::Public, &[], Type::Unit),
    );
    let mut fb = pb.func_builder(func);
    let p = fb.alloca(Type::I32);
    let q = fb.bitcast(p, i8_ptr);
    let r = fb.alloca(Type::I64);
    fb.load(g, Type::I32);
    fb.ret(None);

    (Arc::new(pb.build()), vec![g, p, q, r])
}

#[test]
fn save_load_round_trips_the_equivalence_relation() {
    let (prog, _) = sample_program();
    let engine = eager_engine(&prog);

    let mut buf = Vec::new();
    engine.save(&mut buf).unwrap();

    let loaded =
        PointsToEngine::load(prog.clone(), lazy_config(), Cursor::new(buf)).unwrap();

    let mut analyzed: Vec<_> = engine.analyzed_functions().collect();
    analyzed.sort();
    let mut loaded_analyzed: Vec<_> = loaded.analyzed_functions().collect();
    loaded_analyzed.sort();
    assert_eq!(analyzed, loaded_analyzed);

    let mut values = Vec::new();
    traverse_values(&prog, |v| values.push(v));
    for &a in &values {
        for &b in &values {
            assert_eq!(
                engine.same_set(a, b),
                loaded.same_set(a, b),
                "{a:?} / {b:?} disagree after round trip"
            );
        }
    }
}

#[test]
fn loaded_sets_share_one_handle_per_line() {
    let (prog, values) = sample_program();
    let engine = eager_engine(&prog);
    // p and q were merged by the function analysis.
    let p = values[1];
    let q = values[2];
    assert!(engine.same_set(p, q));

    let mut buf = Vec::new();
    engine.save(&mut buf).unwrap();
    let loaded =
        PointsToEngine::load(prog.clone(), lazy_config(), Cursor::new(buf)).unwrap();

    assert_eq!(loaded.set_of(p), loaded.set_of(q));
    assert_ne!(loaded.set_of(p), None);
}

#[test]
fn out_of_range_id_aborts_the_load() {
    let (prog, _) = sample_program();

    let text = "[ValueIds]\n[AnalyzedFunctions]\n\n[PointsToSets]\n999999\n";
    let err = PointsToEngine::load(prog, lazy_config(), Cursor::new(text)).unwrap_err();
    assert!(matches!(err, LoadError::UnknownId(999999)));
}

#[test]
fn malformed_id_aborts_the_load() {
    let (prog, _) = sample_program();

    let text = "[ValueIds]\n[AnalyzedFunctions]\n\n[PointsToSets]\nnot-a-number\n";
    let err = PointsToEngine::load(prog, lazy_config(), Cursor::new(text)).unwrap_err();
    assert!(matches!(err, LoadError::MalformedId(_)));
}

#[test]
fn missing_segment_aborts_the_load() {
    let (prog, _) = sample_program();

    let err =
        PointsToEngine::load(prog.clone(), lazy_config(), Cursor::new("[ValueIds]\n"))
            .unwrap_err();
    assert!(matches!(err, LoadError::MissingSegment("[AnalyzedFunctions]")));

    let err = PointsToEngine::load(
        prog,
        lazy_config(),
        Cursor::new("[ValueIds]\n[AnalyzedFunctions]\n"),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::MissingSegment("[PointsToSets]")));
}

#[test]
fn analyzed_segment_rejects_non_function_ids() {
    let (prog, _) = sample_program();

    // Id 0 is the global `g` under the canonical traversal.
    let text = "[ValueIds]\n[AnalyzedFunctions]\n0\n[PointsToSets]\n";
    let err = PointsToEngine::load(prog, lazy_config(), Cursor::new(text)).unwrap_err();
    assert!(matches!(err, LoadError::NotAFunction(0)));
}

#[test]
fn print_and_reports_cover_every_binding() {
    let (prog, values) = sample_program();
    let mut engine = eager_engine(&prog);
    engine.points_to_set(values[0]);

    let mut out = Vec::new();
    engine.print(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("V: %g"));
    assert!(text.contains("points to ->"));

    let mut out = Vec::new();
    engine.distribution_report(&mut out, 1).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Distribution"));
    assert!(text.contains("peek into one of the biggest points-to sets:"));

    let mut out = Vec::new();
    engine.print_as_json(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().trim(), "null");
}
