//! Type flattening: expands a source type into a preorder list of scalar
//! sub-element descriptors, with identity markers for structs and arrays.
//! Memoized, since the same type is flattened repeatedly while walking a
//! function's instructions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::Type;

/// The position of a sub-element within its enclosing aggregate, mirroring
/// `original_source/pfg.go`'s `subEleInfo.op`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Op {
    None,
    ArrayElem,
    TupleIndex(usize),
    StructField(String),
}

/// One entry of a flattened type: the sub-element's own type, its relation
/// to its parent aggregate, and the index of that parent's descriptor
/// within the same flattened list (identity/array/struct descriptors are
/// always their own parent-less entry).
#[derive(Clone, Debug)]
pub struct SubElement {
    pub typ: Type,
    pub op: Op,
    pub parent: Option<usize>,
}

#[derive(Default)]
pub struct Flattener {
    cache: RefCell<HashMap<Type, Rc<Vec<SubElement>>>>,
}

impl Flattener {
    pub fn new() -> Self {
        Flattener {
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// `flatten(T)`: preorder list of sub-element descriptors.
    pub fn flatten(&self, t: &Type) -> Rc<Vec<SubElement>> {
        if let Some(hit) = self.cache.borrow().get(t) {
            return hit.clone();
        }
        let mut out = Vec::new();
        flatten_into(t, Op::None, None, &mut out);
        let out = Rc::new(out);
        self.cache.borrow_mut().insert(t.clone(), out.clone());
        out
    }

    /// Width of `T` in node units: `|flatten(T)|`.
    pub fn width(&self, t: &Type) -> usize {
        self.flatten(t).len()
    }

    /// Offset of field `idx` within a struct's flattened node range:
    /// `1 + Σ_{j<idx} width(field_j)`.
    pub fn struct_field_offset(&self, fields: &[(String, Type)], idx: usize) -> usize {
        let mut off = 1;
        for (_, fty) in &fields[..idx] {
            off += self.width(fty);
        }
        off
    }

    /// Offset of element `idx` within a tuple's flattened node range:
    /// `Σ_{j<idx} width(elem_j)`.
    pub fn tuple_offset(&self, elems: &[Type], idx: usize) -> usize {
        let mut off = 0;
        for ety in &elems[..idx] {
            off += self.width(ety);
        }
        off
    }
}

fn flatten_into(t: &Type, op: Op, parent: Option<usize>, out: &mut Vec<SubElement>) {
    match t {
        Type::Named(n) => {
            if matches!(n.underlying, Type::Interface(_)) {
                out.push(SubElement {
                    typ: t.clone(),
                    op,
                    parent,
                });
            } else {
                flatten_into(&n.underlying, op, parent, out);
            }
        }
        Type::Struct(s) => {
            let idx = out.len();
            out.push(SubElement {
                typ: t.clone(),
                op,
                parent,
            });
            for (name, fty) in &s.fields {
                flatten_into(fty, Op::StructField(name.clone()), Some(idx), out);
            }
        }
        Type::Array(elem, _len) => {
            let idx = out.len();
            out.push(SubElement {
                typ: t.clone(),
                op,
                parent,
            });
            flatten_into(elem, Op::ArrayElem, Some(idx), out);
        }
        Type::Tuple(elems) => {
            if elems.len() == 1 {
                // Singleton tuples are transparent.
                flatten_into(&elems[0], op, parent, out);
            } else {
                for (i, e) in elems.iter().enumerate() {
                    flatten_into(e, Op::TupleIndex(i), parent, out);
                }
            }
        }
        // Scalars: basic, pointer, channel, map, interface, slice, signature.
        _ => out.push(SubElement {
            typ: t.clone(),
            op,
            parent,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BasicKind, Signature, Type};

    fn int_ty() -> Type {
        Type::Basic(BasicKind::Int)
    }

    #[test]
    fn scalar_is_one_descriptor() {
        let f = Flattener::new();
        assert_eq!(f.width(&int_ty()), 1);
        assert_eq!(f.width(&Type::ptr(int_ty())), 1);
    }

    #[test]
    fn empty_tuple_has_no_pointerlike_subelements() {
        let f = Flattener::new();
        assert_eq!(f.width(&Type::Tuple(vec![])), 0);
    }

    #[test]
    fn singleton_tuple_is_transparent() {
        let f = Flattener::new();
        let singleton = Type::Tuple(vec![Type::ptr(int_ty())]);
        assert_eq!(f.flatten(&singleton).len(), f.flatten(&Type::ptr(int_ty())).len());
    }

    #[test]
    fn struct_gets_identity_plus_fields() {
        let f = Flattener::new();
        let s = Type::strct("S", vec![("a", int_ty()), ("b", Type::ptr(int_ty()))]);
        // identity + a + b = 3
        assert_eq!(f.width(&s), 3);
        if let Type::Struct(st) = &s {
            assert_eq!(f.struct_field_offset(&st.fields, 0), 1);
            assert_eq!(f.struct_field_offset(&st.fields, 1), 2);
        }
    }

    #[test]
    fn array_is_identity_plus_single_element() {
        let f = Flattener::new();
        let arr = Type::Array(std::rc::Rc::new(Type::ptr(int_ty())), 10);
        // modeled as length-1: identity + one element descriptor
        assert_eq!(f.width(&arr), 2);
    }

    #[test]
    fn named_interface_keeps_named_head() {
        let f = Flattener::new();
        let iface = Type::iface(
            "I",
            vec![(
                "f",
                Signature {
                    receiver: None,
                    params: vec![],
                    results: vec![],
                },
            )],
        );
        assert_eq!(f.width(&iface), 1);
    }

    #[test]
    fn flatten_is_memoized() {
        let f = Flattener::new();
        let s = Type::strct("S", vec![("a", int_ty())]);
        let a = f.flatten(&s);
        let b = f.flatten(&s);
        assert!(Rc::ptr_eq(&a, &b));
    }
}
