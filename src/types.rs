//! The small type algebra the flattener and the assignability checks in
//! `type_filter`/`untag` operate over. This is not a general type checker —
//! the opaque SSA program supplying instructions has already resolved
//! overload sets, generic instantiation, and full type checking; this enum
//! only carries the structural information the pointer analysis needs.

use std::fmt;
use std::rc::Rc;

/// Scalar kinds that carry no further pointer-like structure of their own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BasicKind {
    Bool,
    Int,
    Float,
    String,
    UnsafePointer,
    Invalid,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Signature {
    pub receiver: Option<Type>,
    pub params: Vec<Type>,
    pub results: Vec<Type>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StructType {
    pub name_hint: String,
    pub fields: Vec<(String, Type)>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct InterfaceType {
    pub name_hint: String,
    pub methods: Vec<(String, Rc<Signature>)>,
}

/// A named type: carries a method set (used for assignability and method
/// resolution) on top of some underlying structural type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct NamedType {
    pub name: String,
    pub underlying: Type,
    /// Method names declared with this type as receiver, in declaration
    /// order. Method bodies are looked up by name via `Program`.
    pub methods: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    Basic(BasicKind),
    Pointer(Rc<Type>),
    Interface(Rc<InterfaceType>),
    Channel(Rc<Type>),
    Map(Rc<Type>, Rc<Type>),
    Slice(Rc<Type>),
    Signature(Rc<Signature>),
    Named(Rc<NamedType>),
    Struct(Rc<StructType>),
    Array(Rc<Type>, usize),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn named(name: impl Into<String>, underlying: Type, methods: Vec<String>) -> Type {
        Type::Named(Rc::new(NamedType {
            name: name.into(),
            underlying,
            methods,
        }))
    }

    pub fn iface(name_hint: impl Into<String>, methods: Vec<(&str, Signature)>) -> Type {
        Type::Interface(Rc::new(InterfaceType {
            name_hint: name_hint.into(),
            methods: methods
                .into_iter()
                .map(|(n, sig)| (n.to_string(), Rc::new(sig)))
                .collect(),
        }))
    }

    pub fn strct(name_hint: impl Into<String>, fields: Vec<(&str, Type)>) -> Type {
        Type::Struct(Rc::new(StructType {
            name_hint: name_hint.into(),
            fields: fields.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        }))
    }

    pub fn ptr(to: Type) -> Type {
        Type::Pointer(Rc::new(to))
    }

    /// Peel `Named` wrappers whose underlying type is not itself an
    /// interface — the flattener keeps a Named head only when the
    /// underlying type is an interface.
    pub fn underlying_for_flatten(&self) -> &Type {
        match self {
            Type::Named(n) if !matches!(n.underlying, Type::Interface(_)) => {
                n.underlying.underlying_for_flatten()
            }
            other => other,
        }
    }

    /// The method-set-bearing interface this type names, if any, after
    /// unwrapping `Named`.
    pub fn as_interface(&self) -> Option<&InterfaceType> {
        match self {
            Type::Interface(i) => Some(i),
            Type::Named(n) => n.underlying.as_interface(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(k) => write!(f, "{:?}", k),
            Type::Pointer(t) => write!(f, "*{}", t),
            Type::Interface(i) => write!(f, "{}", i.name_hint),
            Type::Channel(t) => write!(f, "chan {}", t),
            Type::Map(k, v) => write!(f, "map[{}]{}", k, v),
            Type::Slice(t) => write!(f, "[]{}", t),
            Type::Signature(_) => write!(f, "func"),
            Type::Named(n) => write!(f, "{}", n.name),
            Type::Struct(s) => write!(f, "{}", s.name_hint),
            Type::Array(t, n) => write!(f, "[{}]{}", n, t),
            Type::Tuple(ts) => {
                write!(f, "(")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A resolved method: which declared type the method belongs to, and its
/// signature. Used by `gen`'s invoke-rule resolution.
#[derive(Clone, Debug)]
pub struct MethodSet {
    pub methods: Vec<(String, Type)>,
}

/// Is `concrete` assignable to `iface`? Matching is by method name only
/// (method signatures beyond arity are the opaque SSA program's concern,
/// not this analysis's).
pub fn assignable_to_interface(concrete: &Type, iface: &InterfaceType) -> bool {
    let concrete_methods: Vec<&str> = match concrete {
        Type::Named(n) => n.methods.iter().map(|s| s.as_str()).collect(),
        _ => Vec::new(),
    };
    iface
        .methods
        .iter()
        .all(|(name, _)| concrete_methods.contains(&name.as_str()))
}

/// Type identity for `untag`'s `exact` predicate.
pub fn identical(a: &Type, b: &Type) -> bool {
    a == b
}
