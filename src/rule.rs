//! Deferred constraints: a `Rule` is attached to the node whose points-to
//! set it watches and fires with exactly the delta — the newly added
//! elements — each time that set grows. Grounded directly
//! on `original_source/rule.go`'s seven `addflow` methods; the Go
//! implementation reaches back into a single `*analysis` god-object, so
//! here the handful of operations a rule needs are pulled out into the
//! `RuleContext` trait that `solver::Engine` implements, keeping this
//! module free of any dependency on the arena's internal layout.

use crate::pag::NodeId;
use crate::ssa::{CallSiteId, FuncId};
use crate::types::{self, Type};

/// The operations a `Rule` needs from the surrounding solver. Implemented
/// by `solver::Engine`.
pub trait RuleContext {
    /// `(dynamic type, payload node)` of a tagged object, i.e. the `obj`
    /// encoding of a boxed interface value.
    fn tagged_value(&self, obj: NodeId) -> (Type, NodeId);
    /// `pts(dst) |= pts(src)`. Returns whether `dst`'s set changed.
    fn online_copy(&mut self, dst: NodeId, src: NodeId) -> bool;
    /// `n`-wide struct copy: `online_copy(dst+i, src+i)` for `i in 0..n`.
    /// Returns whether any destination node changed.
    fn online_copy_n(&mut self, dst: NodeId, src: NodeId, n: usize) -> bool;
    /// Adds `obj` to `pts(dst)`. Returns whether it was newly added.
    fn add_label(&mut self, dst: NodeId, obj: NodeId) -> bool;
    /// Re-enqueues `n` on the worklist.
    fn add_work(&mut self, n: NodeId);
    /// `|flatten(ty)|`.
    fn sizeof(&self, ty: &Type) -> usize;
    /// Looks up the concrete method implementing `method` on `dyn_ty`,
    /// returning the method's function-object node.
    fn resolve_method(&self, dyn_ty: &Type, method: &str) -> Option<NodeId>;
    /// The node at which a function object's flattened parameter block
    /// begins (receiver first, for a method).
    fn func_params(&self, fn_obj: NodeId) -> NodeId;
    /// The node at which a function object's flattened results block
    /// begins.
    fn func_results(&self, fn_obj: NodeId) -> NodeId;
    /// `(receiver width, params width, results width)` of the function
    /// object's signature, in flattened node units.
    fn signature_sizes(&self, fn_obj: NodeId) -> (usize, usize, usize);
    /// Records a `caller --site--> callee` call-graph edge once `callee`'s
    /// identity node (the resolved function object) is known, for the
    /// indirect-call case where the callee is only discovered as the
    /// points-to set of a function value grows.
    fn record_call_edge(&mut self, caller: FuncId, site: CallSiteId, callee_identity: NodeId);
}

#[derive(Clone, Debug)]
pub enum Rule {
    /// `d = s[offset]`.
    Load { offset: u32, dst: NodeId },
    /// `d[offset] = s`.
    Store { offset: u32, src: NodeId },
    /// `d = &s.[offset]`.
    OffsetAddr { offset: u32, dst: NodeId },
    /// `d = s.(typ)` where `typ` is an interface.
    TypeFilter { typ: Type, dst: NodeId },
    /// `d = s.(typ)` where `typ` is concrete; `exact` selects identity vs
    /// assignability (the latter used for interface-to-interface checks
    /// with a concrete target).
    Untag { typ: Type, dst: NodeId, exact: bool },
    /// `src.method(params...)`.
    Invoke {
        method: String,
        params: NodeId,
        caller: FuncId,
        site: CallSiteId,
    },
    /// A call through a function value: `f(args...)` where `f`'s points-to
    /// set ranges over the (possibly several) functions it may hold.
    /// Attached to the node holding `f`'s pts; fires once per newly
    /// discovered callee. Grounded on `gen_rule.go`'s `genDynamicCall`.
    FpCall {
        caller: FuncId,
        site: CallSiteId,
        /// Caller-side argument nodes and their flattened widths, in
        /// declaration order.
        args: Vec<(NodeId, usize)>,
        /// Caller-side node to receive the call's result, and its width.
        result: Option<(NodeId, usize)>,
    },
}

impl Rule {
    /// Applies this rule to `delta`, the set of nodes newly added to the
    /// points-to set the rule is attached to.
    pub fn apply(&self, ctx: &mut dyn RuleContext, delta: &[NodeId]) {
        match self {
            Rule::Load { offset, dst } => {
                let mut changed = false;
                for &k in delta {
                    if ctx.online_copy(*dst, k.offset(*offset)) {
                        changed = true;
                    }
                }
                if changed {
                    ctx.add_work(*dst);
                }
            }
            Rule::Store { offset, src } => {
                for &k in delta {
                    let koff = k.offset(*offset);
                    if ctx.online_copy(koff, *src) {
                        ctx.add_work(koff);
                    }
                }
            }
            Rule::OffsetAddr { offset, dst } => {
                let mut changed = false;
                for &k in delta {
                    if ctx.add_label(*dst, k.offset(*offset)) {
                        changed = true;
                    }
                }
                if changed {
                    ctx.add_work(*dst);
                }
            }
            Rule::TypeFilter { typ, dst } => {
                let mut changed = false;
                for &iface_obj in delta {
                    let (t_dyn, _v) = ctx.tagged_value(iface_obj);
                    if assignable(&t_dyn, typ) && ctx.add_label(*dst, iface_obj) {
                        changed = true;
                    }
                }
                if changed {
                    ctx.add_work(*dst);
                }
            }
            Rule::Untag { typ, dst, exact } => {
                for &iface_obj in delta {
                    let (t_dyn, v) = ctx.tagged_value(iface_obj);
                    let matches = if *exact {
                        types::identical(&t_dyn, typ)
                    } else {
                        assignable(&t_dyn, typ)
                    };
                    if matches {
                        let n = ctx.sizeof(&t_dyn);
                        ctx.online_copy_n(*dst, v, n);
                    }
                }
            }
            Rule::Invoke {
                method,
                params,
                caller,
                site,
            } => {
                for &iface_obj in delta {
                    let (t_dyn, v) = ctx.tagged_value(iface_obj);
                    let fn_obj = ctx
                        .resolve_method(&t_dyn, method)
                        .unwrap_or_else(|| panic!("no concrete method {} on {}", method, t_dyn));

                    ctx.record_call_edge(*caller, *site, fn_obj);

                    // Make the call site's fn slot point at the identity of
                    // the concrete method; never re-enqueued, since an
                    // identity node carries no Rules of its own.
                    ctx.add_label(*params, fn_obj);

                    let arg0 = ctx.func_params(fn_obj);
                    let (recv_size, params_size, results_size) = ctx.signature_sizes(fn_obj);

                    // Receiver payload -> method's receiver parameter.
                    ctx.online_copy_n(arg0, v, recv_size);

                    let caller_args = params.offset(1);
                    let callee_params = arg0.offset(recv_size as u32);
                    ctx.online_copy_n(callee_params, caller_args, params_size);

                    let caller_results = caller_args.offset(params_size as u32);
                    let callee_results = callee_params.offset(params_size as u32);
                    ctx.online_copy_n(caller_results, callee_results, results_size);
                }
            }
            Rule::FpCall {
                caller,
                site,
                args,
                result,
            } => {
                for &callee in delta {
                    ctx.record_call_edge(*caller, *site, callee);

                    let mut params = ctx.func_params(callee);
                    for &(arg_node, width) in args {
                        ctx.online_copy_n(params, arg_node, width);
                        params = params.offset(width as u32);
                    }

                    if let Some((res_node, width)) = result {
                        let results = ctx.func_results(callee);
                        if ctx.online_copy_n(*res_node, results, *width) {
                            ctx.add_work(*res_node);
                        }
                    }
                }
            }
        }
    }
}

fn assignable(concrete: &Type, iface_or_named: &Type) -> bool {
    match iface_or_named.as_interface().or(concrete.as_interface()) {
        Some(iface) => types::assignable_to_interface(concrete, iface),
        None => types::identical(concrete, iface_or_named),
    }
}
