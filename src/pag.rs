//! The node/object arena. Every `NodeId` is a dense index into a single
//! growable table; node 0 is the sentinel node that carries no data and
//! marks "no value". Grounded on
//! `original_source/pfg.go`'s `node`/`object`/`nodeid` structs, with the
//! points-to sets backed by `util::points_to::HybridPointsToSet` the way
//! `rustanlys-rupta`'s own PAG nodes are.

use crate::context::ContextId;
use crate::flatten::{Flattener, Op};
use crate::rule::Rule;
use crate::ssa::{FuncId, GlobalId, ValueId};
use crate::types::Type;
use crate::util::bit_vec::Idx;
use crate::util::points_to::{HybridPointsToSet, PointsToSet};

/// A tiny hand-rolled bitflags type: three fixed bits don't warrant
/// pulling in a dedicated bitflags crate.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
        pub struct $name($repr);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(pub u32);

/// The pre-allocated sentinel: "no value" / "type with no pointerlike
/// sub-elements".
pub const SENTINEL: NodeId = NodeId(0);

impl NodeId {
    pub fn offset(self, off: u32) -> NodeId {
        NodeId(self.0 + off)
    }
}

impl Idx for NodeId {
    fn new(idx: usize) -> Self {
        NodeId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObjectId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FuncNodeId(pub u32);

/// Identifies what produced a value node, needed by `fp_call`'s "read the
/// underlying function back out of the object" step and by debugging
/// output.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjectData {
    None,
    Value { func: FuncId, value: ValueId },
    Global(GlobalId),
    Function(FuncId),
}

bitflags_lite! {
    /// `otTagged`/`otFunction` in the original; a third, permanently unset
    /// bit is kept as a placeholder for the `indirect` tagged-object flag
    /// this analysis never sets.
    pub struct ObjectTags: u8 {
        const TAGGED = 0b001;
        const FUNCTION = 0b010;
        const INDIRECT = 0b100;
    }
}

/// A contiguous run of nodes denoting one allocation site.
pub struct Object {
    pub size: u32,
    pub tags: ObjectTags,
    pub data: ObjectData,
    pub funcn: Option<FuncNodeId>,
}

impl Object {
    pub fn is_tagged(&self) -> bool {
        self.tags.contains(ObjectTags::TAGGED)
    }
    pub fn is_function(&self) -> bool {
        self.tags.contains(ObjectTags::FUNCTION)
    }
}

/// A `(function, context)` pair together with the node range of its
/// materialized function object (unique per pair).
#[derive(Clone, Copy, Debug)]
pub struct FuncNode {
    pub func: FuncId,
    pub ctx: ContextId,
    pub obj: ObjectId,
}

pub struct Node {
    pub typ: Type,
    /// `Some` for a node that is a sub-element of some enclosing object,
    /// naming its relation to the parent (struct field, array element,
    /// tuple index); `None` for the sentinel and for identity nodes.
    pub sub_element: Option<Op>,
    pub pts: HybridPointsToSet<NodeId>,
    pub prev_pts: HybridPointsToSet<NodeId>,
    pub flow_to: HybridPointsToSet<NodeId>,
    pub rules: Vec<Rule>,
    /// `Some` only for the first node of an object's range.
    pub obj: Option<ObjectId>,
}

/// The node/object arena. Owns node and object storage and the primitive
/// allocation operations; the context table, global-value maps, and call
/// graph live one level up, on the analysis engine.
pub struct Arena {
    nodes: Vec<Node>,
    objects: Vec<Object>,
    func_nodes: Vec<FuncNode>,
}

impl Arena {
    pub fn new() -> Self {
        let mut arena = Arena {
            nodes: Vec::new(),
            objects: Vec::new(),
            func_nodes: Vec::new(),
        };
        // Node 0: the sentinel.
        arena.nodes.push(Node {
            typ: Type::Tuple(vec![]),
            sub_element: None,
            pts: HybridPointsToSet::new(),
            prev_pts: HybridPointsToSet::new(),
            flow_to: HybridPointsToSet::new(),
            rules: Vec::new(),
            obj: None,
        });
        arena
    }

    pub fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub fn func_node(&self, id: FuncNodeId) -> &FuncNode {
        &self.func_nodes[id.0 as usize]
    }

    /// Allocates one bare node with no identity, e.g. a local SSA value
    /// that is not itself the head of an object.
    pub fn add_one_node(&mut self, typ: Type, sub_element: Option<Op>) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Node {
            typ,
            sub_element,
            pts: HybridPointsToSet::new(),
            prev_pts: HybridPointsToSet::new(),
            flow_to: HybridPointsToSet::new(),
            rules: Vec::new(),
            obj: None,
        });
        id
    }

    /// Allocates `|flatten(ty)|` contiguous nodes, one per descriptor in
    /// preorder, returning the first. A type with no pointerlike
    /// sub-elements yields no nodes at all and returns the sentinel.
    pub fn add_nodes(&mut self, flattener: &Flattener, ty: &Type) -> NodeId {
        let descriptors = flattener.flatten(ty);
        if descriptors.is_empty() {
            return SENTINEL;
        }
        let start = self.next_id();
        for d in descriptors.iter() {
            self.add_one_node(d.typ.clone(), Some(d.op.clone()));
        }
        start
    }

    /// Closes off the object beginning at `start`: marks it and tags it.
    /// An object with computed width 0 is still padded to one node, since
    /// every object must be addressable by at least one `NodeId`.
    pub fn end_object(&mut self, start: NodeId, data: ObjectData, tags: ObjectTags) -> ObjectId {
        let mut size = self.next_id().0.saturating_sub(start.0);
        if size == 0 {
            self.add_one_node(Type::Tuple(vec![]), None);
            size = 1;
        }
        let obj_id = ObjectId(self.objects.len() as u32);
        self.objects.push(Object {
            size,
            tags,
            data,
            funcn: None,
        });
        self.node_mut(start).obj = Some(obj_id);
        obj_id
    }

    /// The object whose range `id` falls within, found by walking
    /// backwards to the nearest node carrying an `obj` marker. Falling off
    /// the start of the arena without finding one means a node was created
    /// without ever being closed off by `end_object`: every live node
    /// belongs to some object.
    pub fn enclosing_object(&self, id: NodeId) -> ObjectId {
        let mut cur = id.0;
        loop {
            if let Some(obj) = self.nodes[cur as usize].obj {
                return obj;
            }
            if cur == 0 {
                panic!("node {} does not belong to any object", id.0);
            }
            cur -= 1;
        }
    }

    /// Allocates a boxed interface payload object: one identity node
    /// carrying `ObjectTags::TAGGED`, with `width` payload nodes following.
    pub fn make_interface_obj(
        &mut self,
        flattener: &Flattener,
        payload_ty: &Type,
        data: ObjectData,
    ) -> NodeId {
        let start = self.next_id();
        self.add_one_node(payload_ty.clone(), None);
        self.add_nodes(flattener, payload_ty);
        self.end_object(start, data, ObjectTags::TAGGED);
        start
    }

    /// `(dynamic type, payload node)` of a tagged object's identity node.
    pub fn tagged_value(&self, ident: NodeId) -> (Type, NodeId) {
        let typ = self.node(ident).typ.clone();
        (typ, ident.offset(1))
    }

    /// `pts(dst) |= pts(src)`, computed on a clone of `pts(src)` to avoid
    /// aliasing the same `Vec` slot twice. Returns whether `dst` changed.
    pub fn online_copy(&mut self, dst: NodeId, src: NodeId) -> bool {
        if dst == src {
            return false;
        }
        let src_pts = self.node(src).pts.clone();
        self.node_mut(dst).pts.union(&src_pts)
    }

    /// `n`-wide struct copy: `online_copy(dst+i, src+i)` for `i in 0..n`.
    pub fn online_copy_n(&mut self, dst: NodeId, src: NodeId, n: usize) -> bool {
        let mut changed = false;
        for i in 0..n as u32 {
            changed |= self.online_copy(dst.offset(i), src.offset(i));
        }
        changed
    }

    /// Adds `obj` to `pts(dst)`. Returns whether it was newly added.
    pub fn add_label(&mut self, dst: NodeId, obj: NodeId) -> bool {
        self.node_mut(dst).pts.insert(obj)
    }

    pub fn new_func_node(&mut self, func: FuncId, ctx: ContextId, obj: ObjectId) -> FuncNodeId {
        let id = FuncNodeId(self.func_nodes.len() as u32);
        self.func_nodes.push(FuncNode { func, ctx, obj });
        self.object_mut(obj).funcn = Some(id);
        id
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicKind;

    #[test]
    fn node_zero_is_the_sentinel() {
        let arena = Arena::new();
        assert_eq!(arena.num_nodes(), 1);
        assert_eq!(arena.next_id(), NodeId(1));
    }

    #[test]
    fn add_nodes_of_empty_tuple_yields_sentinel() {
        let mut arena = Arena::new();
        let flattener = Flattener::new();
        let id = arena.add_nodes(&flattener, &Type::Tuple(vec![]));
        assert_eq!(id, SENTINEL);
    }

    #[test]
    fn add_nodes_allocates_contiguous_range() {
        let mut arena = Arena::new();
        let flattener = Flattener::new();
        let s = Type::strct(
            "S",
            vec![("a", Type::Basic(BasicKind::Int)), ("b", Type::ptr(Type::Basic(BasicKind::Int)))],
        );
        let start = arena.add_nodes(&flattener, &s);
        assert_eq!(start, NodeId(1));
        assert_eq!(arena.num_nodes(), 4); // sentinel + identity + a + b
    }

    #[test]
    fn end_object_pads_zero_width_objects() {
        let mut arena = Arena::new();
        let start = arena.next_id();
        let obj = arena.end_object(start, ObjectData::None, ObjectTags::empty());
        assert_eq!(arena.object(obj).size, 1);
        assert_eq!(arena.enclosing_object(start), obj);
    }

    #[test]
    fn enclosing_object_walks_back_to_owner() {
        let mut arena = Arena::new();
        let flattener = Flattener::new();
        let s = Type::strct("S", vec![("a", Type::Basic(BasicKind::Int))]);
        let start = arena.add_nodes(&flattener, &s);
        let obj = arena.end_object(start, ObjectData::None, ObjectTags::empty());
        // the field node, one past `start`, still resolves to the same object.
        assert_eq!(arena.enclosing_object(start.offset(1)), obj);
    }

    #[test]
    #[should_panic]
    fn enclosing_object_panics_when_orphaned() {
        let arena = Arena::new();
        // node 0 (the sentinel) carries no `obj` marker and there is
        // nothing before it to walk back to.
        let _ = arena.enclosing_object(NodeId(0));
    }

    #[test]
    fn make_interface_obj_is_tagged_with_identity_plus_payload() {
        let mut arena = Arena::new();
        let flattener = Flattener::new();
        let ident = arena.make_interface_obj(
            &flattener,
            &Type::ptr(Type::Basic(BasicKind::Int)),
            ObjectData::None,
        );
        let obj = arena.enclosing_object(ident);
        assert!(arena.object(obj).is_tagged());
        let (_typ, payload) = arena.tagged_value(ident);
        assert_eq!(payload, ident.offset(1));
    }
}
