//! The constraint generator: walks one function's SSA body under one
//! context and turns every instruction into permanent flow edges, deferred
//! `Rule`s, or fresh allocation sites on the arena owned by
//! `solver::Engine`. Grounded directly on `original_source/gen_rule.go`'s
//! `genFunc`/`genInstr`/`genCall` family; the giant Go switch over
//! instruction kinds becomes the match in `gen_instr` below.

use crate::context::ContextId;
use crate::pag::{ObjectData, SENTINEL};
use crate::rule::Rule;
use crate::solver::Engine;
use crate::ssa::{
    BlockId, CallCommon, CallSiteId, CallTarget, FuncId, Instruction, InstKind, Operand,
    UnOpKind,
};
use crate::types::{BasicKind, Signature, Type};
use crate::util::points_to::PointsToSet;

/// Generates constraints for every instruction of `func` under `ctx`. Value
/// nodes for every result in the function are allocated up front, since SSA
/// permits forward references within a function (a `Phi` can reference a
/// value defined in a block generated later).
pub fn generate_function(engine: &mut Engine, func: FuncId, ctx: ContextId) {
    let f = engine.program.function(func);
    if f.is_generic_without_args() {
        return;
    }
    let fn_obj = engine.func_object(func, ctx);

    for block in f.basic_blocks() {
        for inst in &block.instructions {
            if let Some(v) = inst.result {
                let ty = f.value_type(v);
                let n = engine.arena.add_nodes(&engine.flattener, &ty);
                engine.set_value_node(func, ctx, v, n);
            }
        }
    }

    let blocks = f.basic_blocks().len();
    for bi in 0..blocks {
        let block_len = f.basic_blocks()[bi].instructions.len();
        for ii in 0..block_len {
            let site = CallSiteId {
                func,
                block: BlockId(bi as u32),
                index: ii as u32,
            };
            let inst = f.basic_blocks()[bi].instructions[ii].clone();
            gen_instr(engine, func, ctx, fn_obj, site, &inst);
        }
    }
}

fn operand_node(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    op: &Operand,
) -> crate::pag::NodeId {
    match op {
        Operand::Local(v) => engine.value_node(func, ctx, *v).unwrap_or(SENTINEL),
        Operand::Param(i) => engine.param_node(fn_obj, *i),
        Operand::FreeVar(i) => engine.free_var_node(func, *i),
        Operand::Global(g) => engine.global_node(*g),
        Operand::Function(f) => engine.function_value_node(*f),
        Operand::Const => SENTINEL,
    }
}

fn gen_instr(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    site: CallSiteId,
    inst: &Instruction,
) {
    let dst = inst
        .result
        .and_then(|v| engine.value_node(func, ctx, v))
        .unwrap_or(SENTINEL);

    match &inst.kind {
        InstKind::Alloc { ty } | InstKind::MakeSlice { ty } | InstKind::MakeChan { ty } | InstKind::MakeMap { ty } => {
            engine.add_allocation_site(dst, ty, ObjectData::Value { func, value: inst.result.unwrap() });
        }

        InstKind::MakeInterface { payload, .. } => {
            if let Some((op, payload_ty)) = payload {
                let v = operand_node(engine, func, ctx, fn_obj, op);
                let obj = engine
                    .arena
                    .make_interface_obj(&engine.flattener, payload_ty, ObjectData::Value { func, value: inst.result.unwrap() });
                let w = engine.sizeof(payload_ty);
                engine.addflow(obj.offset(1), v, w);
                engine.arena.node_mut(dst).pts.insert(obj);
                engine.add_work(dst);
                engine.materialize_methods_of(payload_ty);
            }
        }

        InstKind::MakeClosure { func: target, bindings } => {
            let target = *target;
            let fn_val = engine.function_value_node(target);
            engine.addflow(dst, fn_val, 1);
            for (i, b) in bindings.iter().enumerate() {
                let fv = engine.free_var_node(target, i);
                let bnode = operand_node(engine, func, ctx, fn_obj, b);
                let ty = engine.program.function(target).free_vars()[i].clone();
                let w = engine.sizeof(&ty);
                engine.addflow(fv, bnode, w);
            }
        }

        InstKind::UnOp { kind, x, ty } => match kind {
            UnOpKind::Deref | UnOpKind::Recv => {
                let ptr = operand_node(engine, func, ctx, fn_obj, x);
                let w = engine.sizeof(ty);
                engine.gen_load(dst, ptr, 0, w);
            }
            UnOpKind::Other => {}
        },

        InstKind::BinOp | InstKind::Jump | InstKind::If { .. } | InstKind::RunDefers | InstKind::DebugRef | InstKind::Range { .. } => {}

        InstKind::FieldAddr { x, field, struct_ty } => {
            let ptr = operand_node(engine, func, ctx, fn_obj, x);
            let off = struct_field_offset(engine, struct_ty, *field);
            engine.gen_offset_addr(dst, ptr, off);
        }

        InstKind::IndexAddr { x } => {
            let ptr = operand_node(engine, func, ctx, fn_obj, x);
            engine.gen_offset_addr(dst, ptr, 1);
        }

        InstKind::Field { x, field, struct_ty, ty } => {
            let base = operand_node(engine, func, ctx, fn_obj, x);
            let off = struct_field_offset(engine, struct_ty, *field);
            let w = engine.sizeof(ty);
            engine.addflow(dst, base.offset(off), w);
        }

        InstKind::Index { x, ty } => {
            let base = operand_node(engine, func, ctx, fn_obj, x);
            let w = engine.sizeof(ty);
            engine.addflow(dst, base.offset(1), w);
        }

        InstKind::Extract { tuple, index, tuple_ty } => {
            let base = operand_node(engine, func, ctx, fn_obj, tuple);
            if let Type::Tuple(elems) = tuple_ty.underlying_for_flatten() {
                let off = engine.flattener.tuple_offset(elems, *index) as u32;
                let w = engine.sizeof(&elems[*index]);
                engine.addflow(dst, base.offset(off), w);
            }
        }

        InstKind::Convert { x, from, to } => gen_conv(engine, func, ctx, fn_obj, dst, x, from, to, inst.result),

        InstKind::ChangeType { x } | InstKind::ChangeInterface { x } | InstKind::Slice { x } | InstKind::SliceToArrayPointer { x } => {
            let xn = operand_node(engine, func, ctx, fn_obj, x);
            engine.addflow(dst, xn, 1);
        }

        InstKind::TypeAssert { x, assert_ty } => {
            let xn = operand_node(engine, func, ctx, fn_obj, x);
            engine.type_assert(assert_ty, dst, xn, true);
        }

        InstKind::Phi { edges, ty } => {
            let w = engine.sizeof(ty);
            for e in edges {
                let en = operand_node(engine, func, ctx, fn_obj, e);
                engine.addflow(dst, en, w);
            }
        }

        InstKind::Call { call } | InstKind::Go { call } | InstKind::Defer { call } => {
            gen_call(engine, func, ctx, fn_obj, site, dst, call);
        }

        InstKind::Lookup { map, key_ty, val_ty } => {
            let ptr = operand_node(engine, func, ctx, fn_obj, map);
            let ksize = engine.sizeof(key_ty);
            let vsize = engine.sizeof(val_ty);
            engine.gen_load(dst, ptr, ksize as u32, vsize);
        }

        InstKind::Next { iter, is_map, key_ty, val_ty } => {
            if *is_map {
                let ptr = operand_node(engine, func, ctx, fn_obj, iter);
                let ksize = engine.sizeof(key_ty);
                let vsize = engine.sizeof(val_ty);
                let tuple_ty = Type::Tuple(vec![Type::Basic(BasicKind::Bool), key_ty.clone(), val_ty.clone()]);
                if let Type::Tuple(elems) = &tuple_ty {
                    let koff = engine.flattener.tuple_offset(elems, 1) as u32;
                    let voff = engine.flattener.tuple_offset(elems, 2) as u32;
                    engine.gen_load(dst.offset(koff), ptr, 0, ksize);
                    engine.gen_load(dst.offset(voff), ptr, ksize as u32, vsize);
                }
            }
        }

        InstKind::Select { states } => {
            for state in states {
                let chan = operand_node(engine, func, ctx, fn_obj, &state.chan);
                let w = engine.sizeof(&state.elem_ty);
                if state.is_send {
                    if let Some(v) = &state.send_value {
                        let vn = operand_node(engine, func, ctx, fn_obj, v);
                        engine.gen_store(chan, vn, 0, w);
                    }
                } else {
                    engine.gen_load(dst, chan, 0, w);
                }
            }
        }

        InstKind::Store { addr, val, val_ty } => {
            let ptr = operand_node(engine, func, ctx, fn_obj, addr);
            let vn = operand_node(engine, func, ctx, fn_obj, val);
            let w = engine.sizeof(val_ty);
            engine.gen_store(ptr, vn, 0, w);
        }

        InstKind::Send { chan, val, val_ty } => {
            let ptr = operand_node(engine, func, ctx, fn_obj, chan);
            let vn = operand_node(engine, func, ctx, fn_obj, val);
            let w = engine.sizeof(val_ty);
            engine.gen_store(ptr, vn, 0, w);
        }

        InstKind::MapUpdate { map, key, key_ty, val, val_ty } => {
            let ptr = operand_node(engine, func, ctx, fn_obj, map);
            let kn = operand_node(engine, func, ctx, fn_obj, key);
            let vn = operand_node(engine, func, ctx, fn_obj, val);
            let ksize = engine.sizeof(key_ty);
            let vsize = engine.sizeof(val_ty);
            engine.gen_store(ptr, kn, 0, ksize);
            engine.gen_store(ptr, vn, ksize as u32, vsize);
        }

        InstKind::Return { results } => {
            let sig = engine.signature_of(fn_obj).clone();
            let mut off = 0u32;
            for (r, rty) in results.iter().zip(sig.results.iter()) {
                let w = engine.sizeof(rty);
                let rn = operand_node(engine, func, ctx, fn_obj, r);
                let base = engine.func_results(fn_obj);
                engine.addflow(base.offset(off), rn, w);
                off += w as u32;
            }
        }

        InstKind::Panic { x } => {
            let xn = operand_node(engine, func, ctx, fn_obj, x);
            let panic_node = engine.panic_node;
            engine.addflow(panic_node, xn, 1);
        }
    }
}

fn struct_field_offset(engine: &Engine, struct_ty: &Type, field: usize) -> u32 {
    match struct_ty.underlying_for_flatten() {
        Type::Struct(s) => engine.flattener.struct_field_offset(&s.fields, field) as u32,
        _ => 0,
    }
}

fn gen_conv(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    dst: crate::pag::NodeId,
    x: &Operand,
    from: &Type,
    to: &Type,
    result: Option<crate::ssa::ValueId>,
) {
    match (from.underlying_for_flatten(), to.underlying_for_flatten()) {
        (Type::Slice(_), Type::Basic(BasicKind::String)) => {
            let xn = operand_node(engine, func, ctx, fn_obj, x);
            engine.addflow(dst, xn, 1);
        }
        // *T -> unsafe.Pointer: deliberately drops pointer identity
        // (`gen_rule.go`'s documented unsoundness for this direction).
        (Type::Pointer(_), Type::Basic(BasicKind::UnsafePointer)) => {}
        (Type::Basic(BasicKind::UnsafePointer), Type::Pointer(inner)) => {
            let inner = (**inner).clone();
            engine.add_allocation_site(dst, &inner, ObjectData::Value { func, value: result.unwrap() });
        }
        (Type::Basic(BasicKind::String), Type::Slice(elem)) => {
            let elem = (**elem).clone();
            engine.add_allocation_site(dst, &elem, ObjectData::Value { func, value: result.unwrap() });
        }
        (Type::Basic(_), Type::Basic(_)) => {}
        _ => {}
    }
}

fn gen_call(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    site: CallSiteId,
    dst: crate::pag::NodeId,
    call: &CallCommon,
) {
    match &call.target {
        CallTarget::Static(callee) => gen_static_call(engine, func, ctx, fn_obj, site, dst, *callee, call),
        CallTarget::Invoke { receiver, method } => {
            gen_invoke(engine, func, ctx, fn_obj, site, dst, receiver, method, call)
        }
        CallTarget::Indirect(target) => gen_indirect_call(engine, func, ctx, fn_obj, site, dst, target, call),
        CallTarget::Builtin(name) => gen_builtin_call(engine, func, ctx, fn_obj, dst, name, call),
    }
}

fn gen_static_call(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    site: CallSiteId,
    dst: crate::pag::NodeId,
    callee: FuncId,
    call: &CallCommon,
) {
    if engine.program.is_reflect_or_runtime(callee) {
        return;
    }
    let callee_ctx = engine.callee_context(callee, ctx, site);
    let callee_obj = engine.func_object(callee, callee_ctx);
    engine.call_graph.add_edge(func, Some(site), callee);

    let mut param_types: Vec<Type> = Vec::new();
    if let Some(r) = &call.signature.receiver {
        param_types.push(r.clone());
    }
    param_types.extend(call.signature.params.iter().cloned());

    let params_base = engine.func_params(callee_obj);
    let mut off = 0u32;
    for (arg, pty) in call.args.iter().zip(param_types.iter()) {
        let w = engine.sizeof(pty);
        let an = operand_node(engine, func, ctx, fn_obj, arg);
        engine.addflow(params_base.offset(off), an, w);
        off += w as u32;
    }

    if dst != SENTINEL {
        let results_base = engine.func_results(callee_obj);
        let mut roff = 0u32;
        for rty in &call.signature.results {
            let w = engine.sizeof(rty);
            engine.addflow(dst.offset(roff), results_base.offset(roff), w);
            roff += w as u32;
        }
    }
}

/// Builds a disposable call frame of `[fn-slot][params...][results...]` for
/// an interface dispatch site; the `Invoke` rule fills the fn-slot and
/// copies into/out of the blocks once the dynamic target is known (matches
/// the node layout `rule.go`'s `invokeRule.addflow` walks).
fn build_call_frame(engine: &mut Engine, sig: &Signature) -> crate::pag::NodeId {
    let start = engine.arena.next_id();
    engine.arena.add_one_node(Type::Tuple(vec![]), None);
    for p in &sig.params {
        engine.arena.add_nodes(&engine.flattener, p);
    }
    for r in &sig.results {
        engine.arena.add_nodes(&engine.flattener, r);
    }
    start
}

fn gen_invoke(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    site: CallSiteId,
    dst: crate::pag::NodeId,
    receiver: &Operand,
    method: &str,
    call: &CallCommon,
) {
    let recv_node = operand_node(engine, func, ctx, fn_obj, receiver);
    let frame = build_call_frame(engine, &call.signature);

    let params_base = frame.offset(1);
    let mut off = 0u32;
    for (arg, pty) in call.args.iter().zip(call.signature.params.iter()) {
        let w = engine.sizeof(pty);
        let an = operand_node(engine, func, ctx, fn_obj, arg);
        engine.addflow(params_base.offset(off), an, w);
        off += w as u32;
    }

    let params_w: usize = call.signature.params.iter().map(|t| engine.sizeof(t)).sum();
    if dst != SENTINEL {
        let results_off = 1 + params_w as u32;
        let mut roff = 0u32;
        for rty in &call.signature.results {
            let w = engine.sizeof(rty);
            engine.addflow(dst.offset(roff), frame.offset(results_off + roff), w);
            roff += w as u32;
        }
    }

    let rule = Rule::Invoke {
        method: method.to_string(),
        params: frame,
        caller: func,
        site,
    };
    engine.arena.node_mut(recv_node).rules.push(rule);
}

fn gen_indirect_call(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    site: CallSiteId,
    dst: crate::pag::NodeId,
    target: &Operand,
    call: &CallCommon,
) {
    let target_node = operand_node(engine, func, ctx, fn_obj, target);

    let mut args = Vec::new();
    for (arg, pty) in call.args.iter().zip(call.signature.params.iter()) {
        let w = engine.sizeof(pty);
        let an = operand_node(engine, func, ctx, fn_obj, arg);
        args.push((an, w));
    }

    let result = if dst != SENTINEL && !call.signature.results.is_empty() {
        let total_w: usize = call.signature.results.iter().map(|t| engine.sizeof(t)).sum();
        Some((dst, total_w))
    } else {
        None
    };

    let rule = Rule::FpCall {
        caller: func,
        site,
        args,
        result,
    };
    engine.arena.node_mut(target_node).rules.push(rule);
}

fn gen_builtin_call(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    dst: crate::pag::NodeId,
    name: &str,
    call: &CallCommon,
) {
    match name {
        "append" => gen_append(engine, func, ctx, fn_obj, dst, call),
        "panic" => {
            if let Some(arg) = call.args.first() {
                let an = operand_node(engine, func, ctx, fn_obj, arg);
                let panic_node = engine.panic_node;
                engine.addflow(panic_node, an, 1);
            }
        }
        "recover" => {
            if dst != SENTINEL {
                let panic_node = engine.panic_node;
                engine.addflow(dst, panic_node, 1);
            }
        }
        "ssa:wrapnilchk" => {
            if let Some(arg) = call.args.first() {
                let an = operand_node(engine, func, ctx, fn_obj, arg);
                if dst != SENTINEL {
                    engine.addflow(dst, an, 1);
                }
            }
        }
        // "copy", "print", and any other builtin create no new objects and
        // move no pointers at the node granularity this analysis tracks.
        _ => {}
    }
}

/// `append(x)` aliases `x`; `append(x, y...)` may additionally reallocate,
/// so a fresh backing-array object for the element type is folded into the
/// destination's points-to set alongside whatever `y` already aliases
/// (`gen_rule.go`'s `genAppend`).
fn gen_append(
    engine: &mut Engine,
    func: FuncId,
    ctx: ContextId,
    fn_obj: crate::pag::NodeId,
    dst: crate::pag::NodeId,
    call: &CallCommon,
) {
    if call.args.is_empty() || dst == SENTINEL {
        return;
    }
    let x = operand_node(engine, func, ctx, fn_obj, &call.args[0]);
    engine.addflow(dst, x, 1);

    if call.args.len() > 1 {
        let elem_ty = call
            .signature
            .params
            .get(1)
            .cloned()
            .unwrap_or(Type::Tuple(vec![]));
        engine.add_allocation_site(dst, &elem_ty, ObjectData::None);
        let y = operand_node(engine, func, ctx, fn_obj, &call.args[1]);
        engine.addflow(dst, y, 1);
    }
}
