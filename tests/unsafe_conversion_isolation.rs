//! A function value is written through an `*int`, then round-tripped
//! through `unsafe.Pointer` and back to a function-valued pointer. The
//! `unsafe.Pointer -> *T` conversion always manufactures a fresh, unrelated
//! object rather than recovering the original pointee, so the function
//! written before the round trip must never become callable afterward.

mod support;

use ssapta::ssa::{CallCommon, CallTarget, FuncId, InstKind, Operand, UnOpKind};
use ssapta::types::{BasicKind, Type};
use ssapta::AnalysisOptions;
use support::*;

#[test]
fn unsafe_pointer_round_trip_never_leaks_the_original_function() {
    let thunk = thunk_type();
    let niladic = no_receiver_sig(vec![], vec![]);

    let f = FakeFunction::new("F", "main", niladic.clone())
        .with_block(vec![inst(None, InstKind::Return { results: vec![] })]);

    let start = FakeFunction::new("Start", "main", niladic.clone())
        .with_value(vid(0), Type::ptr(Type::Basic(BasicKind::Int)))
        .with_value(vid(1), Type::Basic(BasicKind::UnsafePointer))
        .with_value(vid(2), Type::ptr(thunk.clone()))
        .with_value(vid(3), thunk.clone())
        .with_block(vec![
            inst(Some(vid(0)), InstKind::Alloc { ty: Type::Basic(BasicKind::Int) }),
            inst(
                None,
                InstKind::Store {
                    addr: local(vid(0)),
                    val: Operand::Function(FuncId(0)),
                    val_ty: Type::Basic(BasicKind::Int),
                },
            ),
            inst(
                Some(vid(1)),
                InstKind::Convert {
                    x: local(vid(0)),
                    from: Type::ptr(Type::Basic(BasicKind::Int)),
                    to: Type::Basic(BasicKind::UnsafePointer),
                },
            ),
            inst(
                Some(vid(2)),
                InstKind::Convert {
                    x: local(vid(1)),
                    from: Type::Basic(BasicKind::UnsafePointer),
                    to: Type::ptr(thunk.clone()),
                },
            ),
            inst(
                Some(vid(3)),
                InstKind::UnOp {
                    kind: UnOpKind::Deref,
                    x: local(vid(2)),
                    ty: thunk.clone(),
                },
            ),
            inst(
                None,
                InstKind::Call {
                    call: CallCommon {
                        target: CallTarget::Indirect(local(vid(3))),
                        args: vec![],
                        signature: niladic.clone(),
                    },
                },
            ),
            inst(None, InstKind::Return { results: vec![] }),
        ]);

    let program = FakeProgram::new(vec![Box::new(f), Box::new(start)]);
    let options = AnalysisOptions::default().with_explicit_entries(vec![FuncId(1)]);
    let cg = ssapta::analyze(&program, options).expect("the unsafe round trip must not panic");

    assert!(
        !cg.callees(FuncId(1)).contains(&FuncId(0)),
        "F's address was written before the round trip but must not resurface after it"
    );
}
