//! The same identity function is called from two call sites with two
//! different function values. Under k=1 call-string sensitivity each site
//! gets its own contour and only learns about its own argument; collapsing
//! both sites onto the shared contour (the `context_policy` driver hook set
//! to always-false) lets the two arguments mix, and each indirect call site
//! ends up reaching both callees instead of just its own.

mod support;

use ssapta::ssa::{CallCommon, CallTarget, FuncId, InstKind, Operand};
use ssapta::AnalysisOptions;
use support::*;

fn build_program() -> FakeProgram {
    let thunk = thunk_type();
    let id_sig = no_receiver_sig(vec![thunk.clone()], vec![thunk.clone()]);

    let id = FakeFunction::new("Id", "main", id_sig.clone()).with_block(vec![inst(
        None,
        InstKind::Return {
            results: vec![Operand::Param(0)],
        },
    )]);

    let f1 = FakeFunction::new("F1", "main", no_receiver_sig(vec![], vec![]))
        .with_block(vec![inst(None, InstKind::Return { results: vec![] })]);
    let f2 = FakeFunction::new("F2", "main", no_receiver_sig(vec![], vec![]))
        .with_block(vec![inst(None, InstKind::Return { results: vec![] })]);

    let start = FakeFunction::new("Start", "main", no_receiver_sig(vec![], vec![]))
        .with_value(vid(0), thunk.clone())
        .with_value(vid(1), thunk.clone())
        .with_block(vec![
            inst(
                Some(vid(0)),
                InstKind::Call {
                    call: CallCommon {
                        target: CallTarget::Static(FuncId(0)),
                        args: vec![Operand::Function(FuncId(1))],
                        signature: id_sig.clone(),
                    },
                },
            ),
            inst(
                Some(vid(1)),
                InstKind::Call {
                    call: CallCommon {
                        target: CallTarget::Static(FuncId(0)),
                        args: vec![Operand::Function(FuncId(2))],
                        signature: id_sig.clone(),
                    },
                },
            ),
            inst(
                None,
                InstKind::Call {
                    call: CallCommon {
                        target: CallTarget::Indirect(local(vid(0))),
                        args: vec![],
                        signature: no_receiver_sig(vec![], vec![]),
                    },
                },
            ),
            inst(
                None,
                InstKind::Call {
                    call: CallCommon {
                        target: CallTarget::Indirect(local(vid(1))),
                        args: vec![],
                        signature: no_receiver_sig(vec![], vec![]),
                    },
                },
            ),
            inst(None, InstKind::Return { results: vec![] }),
        ]);

    FakeProgram::new(vec![
        Box::new(id),
        Box::new(f1),
        Box::new(f2),
        Box::new(start),
    ])
}

#[test]
fn shared_contour_is_less_precise_than_call_string_sensitivity() {
    let program = build_program();

    let context_sensitive = ssapta::analyze(
        &program,
        AnalysisOptions::default().with_explicit_entries(vec![FuncId(3)]),
    )
    .expect("k=1 analysis should succeed");

    let context_insensitive = ssapta::analyze(
        &program,
        AnalysisOptions::default()
            .with_explicit_entries(vec![FuncId(3)])
            .with_context_policy(std::rc::Rc::new(|_| false)),
    )
    .expect("shared-contour analysis should succeed");

    for cg in [&context_sensitive, &context_insensitive] {
        let callees = cg.callees(FuncId(3));
        assert!(callees.contains(&FuncId(0)), "Start should call Id");
        assert!(callees.contains(&FuncId(1)), "F1 should still be reachable");
        assert!(callees.contains(&FuncId(2)), "F2 should still be reachable");
    }

    assert!(
        context_insensitive.edge_count() > context_sensitive.edge_count(),
        "collapsing both call sites onto one contour should record strictly more \
         (caller, site, callee) edges than keeping them apart: {} vs {}",
        context_insensitive.edge_count(),
        context_sensitive.edge_count()
    );
}
