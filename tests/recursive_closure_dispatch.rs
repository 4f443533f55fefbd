//! A function wraps itself in a closure and calls that closure indirectly,
//! producing a call-graph self-loop discovered only once the solver
//! propagates the closure's function value back into its own parameter.

mod support;

use ssapta::ssa::{CallCommon, CallTarget, FuncId, InstKind, Operand};
use ssapta::AnalysisOptions;
use support::*;

#[test]
fn a_closure_over_its_own_function_produces_a_call_graph_self_loop() {
    let thunk = thunk_type();
    let call_sig = no_receiver_sig(vec![thunk.clone()], vec![]);

    let f = FakeFunction::new("F", "main", call_sig.clone())
        .with_value(vid(0), thunk.clone())
        .with_block(vec![
            inst(
                Some(vid(0)),
                InstKind::MakeClosure {
                    func: FuncId(0),
                    bindings: vec![],
                },
            ),
            inst(
                None,
                InstKind::Call {
                    call: CallCommon {
                        target: CallTarget::Indirect(Operand::Param(0)),
                        args: vec![local(vid(0))],
                        signature: call_sig.clone(),
                    },
                },
            ),
            inst(None, InstKind::Return { results: vec![] }),
        ]);

    let start = FakeFunction::new("Start", "main", no_receiver_sig(vec![], vec![])).with_block(vec![
        inst(
            None,
            InstKind::Call {
                call: CallCommon {
                    target: CallTarget::Static(FuncId(0)),
                    args: vec![Operand::Function(FuncId(0))],
                    signature: call_sig.clone(),
                },
            },
        ),
        inst(None, InstKind::Return { results: vec![] }),
    ]);

    let program = FakeProgram::new(vec![Box::new(f), Box::new(start)]);
    let options = AnalysisOptions::default().with_explicit_entries(vec![FuncId(1)]);
    let cg = ssapta::analyze(&program, options).expect("analysis should succeed");

    assert!(cg.callees(FuncId(1)).contains(&FuncId(0)), "Start should call F");
    assert!(
        cg.callees(FuncId(0)).contains(&FuncId(0)),
        "F's closure over itself should produce a self-loop"
    );
}
