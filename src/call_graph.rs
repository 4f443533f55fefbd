//! The output call graph. Adapted from
//! `rustanlys-rupta/src/graph/call_graph.rs`'s `CallGraph<F, S>`: the
//! solve-time graph is keyed by `(FuncId, ContextId)`, but distinct
//! contexts of the same function collapse to the same node here, so the
//! type parameter is dropped in favor of a concrete `FuncId` key and a
//! `SYNTHETIC_ROOT` sentinel.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{EdgeIndex, Graph, NodeIndex};

use crate::ssa::{CallSiteId, FuncId};

pub type CgNodeId = NodeIndex;
pub type CgEdgeId = EdgeIndex;

/// The synthetic root: edges from here with `site = None` reach every
/// entry function.
pub const SYNTHETIC_ROOT: FuncId = FuncId(u32::MAX);

struct CgNode {
    func: FuncId,
}

struct CgEdge {
    /// `None` only for a synthetic-root-to-entry edge.
    site: Option<CallSiteId>,
}

pub struct CallGraph {
    graph: Graph<CgNode, CgEdge>,
    func_nodes: HashMap<FuncId, CgNodeId>,
    /// `(caller, site, callee)` dedup key, so re-discovering an already
    /// known edge (e.g. from a growing points-to set) is a no-op.
    seen_edges: HashSet<(FuncId, Option<CallSiteId>, FuncId)>,
}

impl CallGraph {
    pub fn new() -> Self {
        CallGraph {
            graph: Graph::new(),
            func_nodes: HashMap::new(),
            seen_edges: HashSet::new(),
        }
    }

    fn node(&mut self, func: FuncId) -> CgNodeId {
        *self
            .func_nodes
            .entry(func)
            .or_insert_with(|| self.graph.add_node(CgNode { func }))
    }

    /// Adds the edge `caller --site--> callee`, collapsing duplicate
    /// `(caller, site, callee)` triples. Returns whether a new edge was
    /// added.
    pub fn add_edge(&mut self, caller: FuncId, site: Option<CallSiteId>, callee: FuncId) -> bool {
        let key = (caller, site, callee);
        if !self.seen_edges.insert(key) {
            return false;
        }
        let caller_node = self.node(caller);
        let callee_node = self.node(callee);
        self.graph.add_edge(caller_node, callee_node, CgEdge { site });
        true
    }

    /// Ensures `func` has a node in the graph, with no edges implied.
    pub fn add_func(&mut self, func: FuncId) {
        self.node(func);
    }

    /// Registers `entries` as reachable from the synthetic root, each via
    /// a `site = None` edge.
    pub fn add_entries(&mut self, entries: impl IntoIterator<Item = FuncId>) {
        for entry in entries {
            self.add_edge(SYNTHETIC_ROOT, None, entry);
        }
    }

    pub fn contains_func(&self, func: FuncId) -> bool {
        self.func_nodes.contains_key(&func)
    }

    pub fn callees(&self, caller: FuncId) -> HashSet<FuncId> {
        match self.func_nodes.get(&caller) {
            Some(&node) => self
                .graph
                .neighbors(node)
                .map(|n| self.graph[n].func)
                .collect(),
            None => HashSet::new(),
        }
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn funcs(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.func_nodes.keys().copied()
    }
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}
