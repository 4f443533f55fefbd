//! A struct used as a two-entry dispatch table: each field holds a distinct
//! function value, written and read back through `FieldAddr` + `Store`/
//! `UnOp::Deref` at its own offset, then called indirectly.

mod support;

use ssapta::ssa::{CallCommon, CallTarget, FuncId, InstKind, Operand, UnOpKind};
use ssapta::types::Type;
use ssapta::AnalysisOptions;
use support::*;

#[test]
fn each_vtable_slot_dispatches_to_its_own_function() {
    let thunk = thunk_type();
    let vtable_ty = Type::strct("VTable", vec![("a", thunk.clone()), ("b", thunk.clone())]);
    let niladic = no_receiver_sig(vec![], vec![]);

    let f1 = FakeFunction::new("F1", "main", niladic.clone())
        .with_block(vec![inst(None, InstKind::Return { results: vec![] })]);
    let f2 = FakeFunction::new("F2", "main", niladic.clone())
        .with_block(vec![inst(None, InstKind::Return { results: vec![] })]);

    let start = FakeFunction::new("Start", "main", niladic.clone())
        .with_value(vid(0), Type::ptr(vtable_ty.clone()))
        .with_value(vid(1), Type::ptr(thunk.clone()))
        .with_value(vid(2), Type::ptr(thunk.clone()))
        .with_value(vid(3), thunk.clone())
        .with_value(vid(4), thunk.clone())
        .with_block(vec![
            inst(Some(vid(0)), InstKind::Alloc { ty: vtable_ty.clone() }),
            inst(
                Some(vid(1)),
                InstKind::FieldAddr {
                    x: local(vid(0)),
                    field: 0,
                    struct_ty: vtable_ty.clone(),
                },
            ),
            inst(
                None,
                InstKind::Store {
                    addr: local(vid(1)),
                    val: Operand::Function(FuncId(0)),
                    val_ty: thunk.clone(),
                },
            ),
            inst(
                Some(vid(2)),
                InstKind::FieldAddr {
                    x: local(vid(0)),
                    field: 1,
                    struct_ty: vtable_ty.clone(),
                },
            ),
            inst(
                None,
                InstKind::Store {
                    addr: local(vid(2)),
                    val: Operand::Function(FuncId(1)),
                    val_ty: thunk.clone(),
                },
            ),
            inst(
                Some(vid(3)),
                InstKind::UnOp {
                    kind: UnOpKind::Deref,
                    x: local(vid(1)),
                    ty: thunk.clone(),
                },
            ),
            inst(
                Some(vid(4)),
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
            inst(
                None,
                InstKind::Call {
                    call: CallCommon {
                        target: CallTarget::Indirect(local(vid(4))),
                        args: vec![],
                        signature: niladic.clone(),
                    },
                },
            ),
            inst(None, InstKind::Return { results: vec![] }),
        ]);

    let program = FakeProgram::new(vec![Box::new(f1), Box::new(f2), Box::new(start)]);
    let options = AnalysisOptions::default().with_explicit_entries(vec![FuncId(2)]);
    let cg = ssapta::analyze(&program, options).expect("analysis should succeed");

    let callees = cg.callees(FuncId(2));
    assert!(callees.contains(&FuncId(0)), "slot a's stored function should be reachable");
    assert!(callees.contains(&FuncId(1)), "slot b's stored function should be reachable");
}
