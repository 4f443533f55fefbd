//! The analysis engine: owns the node/object arena together with the
//! context table, global-value maps and call graph that sit one level
//! above it, and runs the on-the-fly fixpoint loop.
//! Grounded on `rustanlys-rupta/src/pta/andersen.rs`'s `AndersenPTA`
//! (the `processed_funcs`/`rf_iter`/`propagate` shape) and on
//! `original_source/rule.go`'s `analysis` god-object for which maps the
//! original keeps alongside its node table.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::call_graph::CallGraph;
use crate::context::{Context, ContextCache, ContextId};
use crate::error::{self, AnalysisError};
use crate::flatten::Flattener;
use crate::options::AnalysisOptions;
use crate::pag::{Arena, NodeId, ObjectData, ObjectTags, SENTINEL};
use crate::rule::RuleContext;
use crate::ssa::{CallSiteId, FuncId, GlobalId, Program, ValueId};
use crate::types::{Signature, Type};
use crate::util::chunked_queue::{ChunkedQueue, IterCopied};
use crate::util::points_to::PointsToSet;

pub struct Engine<'p> {
    pub(crate) program: &'p dyn Program,
    pub(crate) arena: Arena,
    pub(crate) flattener: Flattener,
    pub(crate) ctx_cache: ContextCache,
    pub(crate) options: AnalysisOptions,
    pub(crate) call_graph: CallGraph,

    worklist: BTreeSet<u32>,
    pending: ChunkedQueue<(FuncId, ContextId)>,
    pending_iter: IterCopied<(FuncId, ContextId)>,

    /// `ctx_table[fn][ctx]`: one function object per pair.
    ctx_table: HashMap<(FuncId, ContextId), NodeId>,
    func_obj_signature: HashMap<NodeId, Signature>,
    /// Shared-contour identity node per function: the object materialized
    /// under the all-null context, the one `invoke`'s dynamic dispatch
    /// always targets regardless of `context_policy` (`rule.go`'s
    /// `invokeRule.addflow`, "dynamic calls use shared contour").
    globalobj: HashMap<FuncId, NodeId>,
    globalval: HashMap<GlobalId, NodeId>,
    value_nodes: HashMap<(FuncId, ContextId, ValueId), NodeId>,
    /// Free variables are treated like global variables: one node per
    /// `(function, index)`, shared across every context the closure is
    /// instantiated under (`gen_rule.go`'s `MakeClosure` case).
    free_var_nodes: HashMap<(FuncId, usize), NodeId>,
    pub(crate) panic_node: NodeId,
    processed: HashSet<(FuncId, ContextId)>,
}

impl<'p> Engine<'p> {
    pub fn new(program: &'p dyn Program, options: AnalysisOptions) -> Self {
        let mut arena = Arena::new();
        let flattener = Flattener::new();
        let panic_node = arena.add_one_node(Type::iface("any", vec![]), None);
        let pending = ChunkedQueue::new();
        let pending_iter = pending.iter_copied();
        Engine {
            program,
            arena,
            flattener,
            ctx_cache: ContextCache::new(),
            options,
            call_graph: CallGraph::new(),
            worklist: BTreeSet::new(),
            pending,
            pending_iter,
            ctx_table: HashMap::new(),
            func_obj_signature: HashMap::new(),
            globalobj: HashMap::new(),
            globalval: HashMap::new(),
            value_nodes: HashMap::new(),
            free_var_nodes: HashMap::new(),
            panic_node,
            processed: HashSet::new(),
        }
    }

    pub fn sizeof(&self, ty: &Type) -> usize {
        self.flattener.width(ty)
    }

    pub fn new_context_id(&self) -> ContextId {
        self.ctx_cache.new_context_id()
    }

    pub fn global_node(&mut self, id: GlobalId) -> NodeId {
        if let Some(&n) = self.globalval.get(&id) {
            return n;
        }
        let ty = self.program.global_type(id);
        let n = self.arena.add_nodes(&self.flattener, &ty);
        if n != SENTINEL {
            let obj_start = n;
            self.arena.end_object(obj_start, ObjectData::Global(id), ObjectTags::empty());
            self.arena.node_mut(n).pts.insert(obj_start);
            self.add_work(obj_start);
        }
        self.globalval.insert(id, n);
        n
    }

    pub fn value_node(
        &self,
        func: FuncId,
        ctx: ContextId,
        value: ValueId,
    ) -> Option<NodeId> {
        self.value_nodes.get(&(func, ctx, value)).copied()
    }

    pub fn set_value_node(&mut self, func: FuncId, ctx: ContextId, value: ValueId, node: NodeId) {
        self.value_nodes.insert((func, ctx, value), node);
    }

    /// The identity node of `func`'s materialized object under `ctx`,
    /// creating it (and enqueuing the pair for constraint generation) if
    /// this is the first time it's been requested.
    pub fn func_object(&mut self, func: FuncId, ctx: ContextId) -> NodeId {
        if let Some(&n) = self.ctx_table.get(&(func, ctx)) {
            return n;
        }
        let f = self.program.function(func);
        let sig = f.signature().clone();
        let start = self.arena.next_id();
        self.arena.add_one_node(Type::Signature(std::rc::Rc::new(sig.clone())), None);
        if let Some(recv) = &sig.receiver {
            self.arena.add_nodes(&self.flattener, recv);
        }
        for p in &sig.params {
            self.arena.add_nodes(&self.flattener, p);
        }
        for r in &sig.results {
            self.arena.add_nodes(&self.flattener, r);
        }
        let obj_id = self
            .arena
            .end_object(start, ObjectData::Function(func), ObjectTags::FUNCTION);
        self.arena.new_func_node(func, ctx, obj_id);
        self.func_obj_signature.insert(start, sig);
        self.ctx_table.insert((func, ctx), start);
        // Only the shared (all-null) contour counts as the function's
        // `globalobj` entry; an ordinary context-sensitive call must never
        // race ahead and plant a context-specific object there. Dynamic
        // dispatch through `invoke`/`fp_call` always targets this entry
        // regardless of `context_policy`, so it must resolve to the
        // NEW-context object specifically, never whichever context
        // happened to materialize the function first.
        if ctx == self.ctx_cache.new_context_id() {
            self.globalobj.insert(func, start);
        }
        self.call_graph.add_func(func);
        self.pending.push((func, ctx));
        start
    }

    /// The node holding the `index`-th positional parameter of the function
    /// currently materialized as `fn_obj` (receiver excluded).
    pub fn param_node(&self, fn_obj: NodeId, index: usize) -> NodeId {
        let sig = self.signature_of(fn_obj);
        let recv = sig.receiver.as_ref().map(|t| self.flattener.width(t)).unwrap_or(0);
        let mut off = recv as u32;
        for p in &sig.params[..index] {
            off += self.flattener.width(p) as u32;
        }
        self.func_params(fn_obj).offset(off)
    }

    /// The node holding the receiver parameter of a method's function
    /// object (the first slot of its params block).
    pub fn receiver_node(&self, fn_obj: NodeId) -> NodeId {
        self.func_params(fn_obj)
    }

    /// The node for free variable `idx` of `func`, shared across every
    /// context that function is instantiated under.
    pub fn free_var_node(&mut self, func: FuncId, idx: usize) -> NodeId {
        if let Some(&n) = self.free_var_nodes.get(&(func, idx)) {
            return n;
        }
        let f = self.program.function(func);
        let ty = f.free_vars()[idx].clone();
        let n = self.arena.add_nodes(&self.flattener, &ty);
        if n != SENTINEL {
            self.arena.end_object(n, ObjectData::Value { func, value: ValueId(u32::MAX - idx as u32) }, ObjectTags::empty());
        }
        self.free_var_nodes.insert((func, idx), n);
        n
    }

    /// The node representing a bare reference to `f` as a first-class
    /// value (a `MakeClosure` target or a function passed by address):
    /// the shared-contour identity node, self-labeled so its own pts
    /// contains itself (the reference is, itself, the one object an
    /// `fp_call` through it can ever resolve to when `f` isn't wrapped in
    /// a closure).
    pub fn function_value_node(&mut self, f: FuncId) -> NodeId {
        let ctx = self.new_context_id();
        let obj = self.func_object(f, ctx);
        if self.arena.add_label(obj, obj) {
            self.add_work(obj);
        }
        obj
    }

    /// The context a call at `site` (made from `caller_ctx`) should use for
    /// `callee`, per `context_policy` and the k-limited call string.
    pub fn callee_context(&mut self, callee: FuncId, caller_ctx: ContextId, site: CallSiteId) -> ContextId {
        if (self.options.context_policy)(callee) {
            let caller: Context = self.ctx_cache.get(caller_ctx).clone();
            let next = caller.generate(site, self.options.level);
            self.ctx_cache.intern(next)
        } else {
            self.new_context_id()
        }
    }

    pub fn func_params(&self, fn_obj: NodeId) -> NodeId {
        fn_obj.offset(1)
    }

    pub fn func_results(&self, fn_obj: NodeId) -> NodeId {
        let (recv, params, _) = self.signature_sizes(fn_obj);
        fn_obj.offset(1 + (recv + params) as u32)
    }

    pub fn signature_of(&self, fn_obj: NodeId) -> &Signature {
        self.func_obj_signature
            .get(&fn_obj)
            .expect("function object created without a signature entry")
    }

    pub fn signature_sizes(&self, fn_obj: NodeId) -> (usize, usize, usize) {
        let sig = self.signature_of(fn_obj);
        let recv = sig.receiver.as_ref().map(|t| self.flattener.width(t)).unwrap_or(0);
        let params = sig.params.iter().map(|t| self.flattener.width(t)).sum();
        let results = sig.results.iter().map(|t| self.flattener.width(t)).sum();
        (recv, params, results)
    }

    /// `d = s` for a `sizeof`-wide copy: a permanent flow edge, seeded
    /// immediately with whatever is already in `pts(src)`.
    pub fn addflow(&mut self, dst: NodeId, src: NodeId, sizeof: usize) {
        if src == dst || sizeof == 0 {
            return;
        }
        if src == SENTINEL || dst == SENTINEL {
            panic!("ill-typed copy dst=n{} src=n{}", dst.0, src.0);
        }
        for i in 0..sizeof as u32 {
            let (d, s) = (dst.offset(i), src.offset(i));
            if self.arena.node_mut(s).flow_to.insert(d) && self.arena.online_copy(d, s) {
                self.add_work(d);
            }
        }
    }

    pub fn gen_load(&mut self, dst: NodeId, ptr: NodeId, offset: u32, sizeof: usize) {
        if dst == SENTINEL {
            return;
        }
        if ptr == SENTINEL {
            panic!("ill-typed load dst=n{} ptr=n{}", dst.0, ptr.0);
        }
        for i in 0..sizeof as u32 {
            self.arena
                .node_mut(ptr)
                .rules
                .push(crate::rule::Rule::Load {
                    offset: offset + i,
                    dst: dst.offset(i),
                });
        }
    }

    pub fn gen_store(&mut self, ptr: NodeId, src: NodeId, offset: u32, sizeof: usize) {
        if src == SENTINEL {
            return;
        }
        if ptr == SENTINEL {
            panic!("ill-typed store ptr=n{} src=n{}", ptr.0, src.0);
        }
        for i in 0..sizeof as u32 {
            self.arena
                .node_mut(ptr)
                .rules
                .push(crate::rule::Rule::Store {
                    offset: offset + i,
                    src: src.offset(i),
                });
        }
    }

    pub fn gen_offset_addr(&mut self, dst: NodeId, ptr: NodeId, offset: u32) {
        if offset == 0 {
            self.addflow(dst, ptr, 1);
        } else {
            self.arena
                .node_mut(ptr)
                .rules
                .push(crate::rule::Rule::OffsetAddr { offset, dst });
        }
    }

    pub fn type_assert(&mut self, asserted: &Type, dst: NodeId, src: NodeId, exact: bool) {
        let rule = if asserted.as_interface().is_some() {
            crate::rule::Rule::TypeFilter {
                typ: asserted.clone(),
                dst,
            }
        } else {
            crate::rule::Rule::Untag {
                typ: asserted.clone(),
                dst,
                exact,
            }
        };
        self.arena.node_mut(src).rules.push(rule);
    }

    pub fn add_allocation_site(&mut self, result: NodeId, ty: &Type, data: ObjectData) {
        if result == SENTINEL {
            return;
        }
        let obj = self.arena.add_nodes(&self.flattener, ty);
        self.arena.end_object(obj, data, ObjectTags::empty());
        self.arena.node_mut(result).pts.insert(obj);
        self.add_work(result);
    }

    pub(crate) fn add_work(&mut self, n: NodeId) {
        self.worklist.insert(n.0);
    }

    /// Eagerly materializes every method of `ty`'s method set under the
    /// shared contour, so an `invoke` rule always has a function object to
    /// attach edges to (the reference's `genMethodsOf`).
    pub fn materialize_methods_of(&mut self, ty: &Type) {
        for method in self.program.method_names(ty) {
            if let Some(func) = self.program.resolve_method(ty, &method) {
                let ctx = self.new_context_id();
                self.func_object(func, ctx);
            }
        }
    }

    /// Runs the on-the-fly loop: drain pending `(fn, ctx)` pairs through
    /// the constraint generator, drain the worklist to a fixpoint, repeat
    /// until both are empty.
    pub fn run_to_fixpoint(&mut self) {
        loop {
            let mut made_progress = false;
            while let Some((func, ctx)) = self.pending_iter.next() {
                made_progress = true;
                if self.processed.insert((func, ctx)) {
                    crate::gen::generate_function(self, func, ctx);
                }
            }
            self.solve_worklist();
            if !made_progress {
                break;
            }
        }
    }

    fn solve_worklist(&mut self) {
        while let Some(&id) = self.worklist.iter().next() {
            self.worklist.remove(&id);
            self.propagate_node(NodeId(id));
        }
    }

    fn propagate_node(&mut self, n: NodeId) {
        let delta: Vec<NodeId> = {
            let node = self.arena.node(n);
            node.pts.iter().filter(|e| !node.prev_pts.contains(*e)).collect()
        };
        if delta.is_empty() {
            return;
        }
        let snapshot = self.arena.node(n).pts.clone();
        self.arena.node_mut(n).prev_pts = snapshot;

        let rules = self.arena.node(n).rules.clone();
        for rule in &rules {
            rule.apply(self, &delta);
        }

        let targets: Vec<NodeId> = self.arena.node(n).flow_to.iter().collect();
        for dst in targets {
            let mut changed = false;
            for &d in &delta {
                if self.arena.add_label(dst, d) {
                    changed = true;
                }
            }
            if changed {
                self.add_work(dst);
            }
        }
    }

    /// `pts(0)` (the sentinel) must stay empty throughout; asserted once at
    /// the end of the run as a last sanity check before producing output.
    pub fn finish(mut self) -> error::Result<CallGraph> {
        if !self.arena.node(SENTINEL).pts.is_empty() {
            return Err(AnalysisError::Internal(
                "sentinel node acquired a points-to set".into(),
            ));
        }
        Ok(std::mem::take(&mut self.call_graph))
    }
}

impl<'p> RuleContext for Engine<'p> {
    fn tagged_value(&self, obj: NodeId) -> (Type, NodeId) {
        self.arena.tagged_value(obj)
    }

    fn online_copy(&mut self, dst: NodeId, src: NodeId) -> bool {
        self.arena.online_copy(dst, src)
    }

    fn online_copy_n(&mut self, dst: NodeId, src: NodeId, n: usize) -> bool {
        self.arena.online_copy_n(dst, src, n)
    }

    fn add_label(&mut self, dst: NodeId, obj: NodeId) -> bool {
        self.arena.add_label(dst, obj)
    }

    fn add_work(&mut self, n: NodeId) {
        self.worklist.insert(n.0);
    }

    fn sizeof(&self, ty: &Type) -> usize {
        self.flattener.width(ty)
    }

    fn resolve_method(&self, dyn_ty: &Type, method: &str) -> Option<NodeId> {
        let func = self.program.resolve_method(dyn_ty, method)?;
        self.globalobj.get(&func).copied()
    }

    fn func_params(&self, fn_obj: NodeId) -> NodeId {
        fn_obj.offset(1)
    }

    fn func_results(&self, fn_obj: NodeId) -> NodeId {
        Engine::func_results(self, fn_obj)
    }

    fn signature_sizes(&self, fn_obj: NodeId) -> (usize, usize, usize) {
        Engine::signature_sizes(self, fn_obj)
    }

    fn record_call_edge(&mut self, caller: FuncId, site: CallSiteId, callee_identity: NodeId) {
        let obj = self.arena.enclosing_object(callee_identity);
        if let ObjectData::Function(callee) = self.arena.object(obj).data {
            self.call_graph.add_edge(caller, Some(site), callee);
        }
    }
}
