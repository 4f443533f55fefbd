//! The opaque SSA program abstraction. SSA construction
//! and typing of the input program are out of scope: this module only
//! declares the trait/ADT boundary the constraint generator (`gen`) walks.
//! A driver — out of scope here — is responsible for building a
//! `Program` from whatever source language front-end it has.

use std::fmt;

use crate::types::{Signature, Type};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FuncId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ValueId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GlobalId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BlockId(pub u32);

/// A call site identity: the defining function plus its position in that
/// function's instruction stream. Used both as a context element (the
/// call-string) and as a call-graph edge label.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CallSiteId {
    pub func: FuncId,
    pub block: BlockId,
    pub index: u32,
}

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.func.0, self.block.0, self.index)
    }
}

/// A reference to a value usable as an operand of an instruction.
#[derive(Clone, Debug)]
pub enum Operand {
    /// A value defined earlier (or later — SSA allows forward refs within
    /// a function) in the same function.
    Local(ValueId),
    /// A function parameter, addressed by position.
    Param(usize),
    /// A free variable captured by a closure, addressed by capture
    /// position; only meaningful inside the closure's own body.
    FreeVar(usize),
    /// A package-level global (variable or named constant-with-identity).
    Global(GlobalId),
    /// A function used as a first-class value (for `MakeClosure`'s target
    /// or a bare function-value reference).
    Function(FuncId),
    /// A constant carrying no pointer identity (int/float/bool literal,
    /// the nil value of any type, an unbound type parameter, etc).
    Const,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnOpKind {
    /// Pointer dereference `*p`.
    Deref,
    /// Channel receive `<-ch`.
    Recv,
    /// Any other unary operator (`-`, `!`, `^`): never pointer-producing.
    Other,
}

#[derive(Clone, Debug)]
pub struct SelectState {
    pub chan: Operand,
    pub is_send: bool,
    pub send_value: Option<Operand>,
    pub elem_ty: Type,
}

/// A resolved or to-be-resolved call target.
#[derive(Clone, Debug)]
pub enum CallTarget {
    /// The callee function is known statically.
    Static(FuncId),
    /// An interface method call: `recv.method(...)`.
    Invoke { receiver: Operand, method: String },
    /// A call through a function value (function pointer, closure, or a
    /// bound method value).
    Indirect(Operand),
    /// A built-in (`append`, `copy`, `panic`, `recover`, `print`,
    /// `ssa:wrapnilchk`, or any other no-op built-in).
    Builtin(String),
}

#[derive(Clone, Debug)]
pub struct CallCommon {
    pub target: CallTarget,
    pub args: Vec<Operand>,
    pub signature: Signature,
}

impl CallCommon {
    pub fn is_invoke(&self) -> bool {
        matches!(self.target, CallTarget::Invoke { .. })
    }

    pub fn static_callee(&self) -> Option<FuncId> {
        match &self.target {
            CallTarget::Static(f) => Some(*f),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum InstKind {
    Alloc { ty: Type },
    MakeSlice { ty: Type },
    MakeChan { ty: Type },
    MakeMap { ty: Type },
    /// `ty` is the interface type; `payload` is `None` for a nil interface
    /// value, `Some(x)` when a concrete value `x` of type `payload_ty` is
    /// boxed.
    MakeInterface {
        ty: Type,
        payload: Option<(Operand, Type)>,
    },
    MakeClosure {
        func: FuncId,
        bindings: Vec<Operand>,
    },
    UnOp {
        kind: UnOpKind,
        x: Operand,
        /// Result type (element type for Deref/Recv).
        ty: Type,
    },
    BinOp,
    FieldAddr {
        x: Operand,
        field: usize,
        struct_ty: Type,
    },
    IndexAddr {
        x: Operand,
    },
    Field {
        x: Operand,
        field: usize,
        struct_ty: Type,
        ty: Type,
    },
    Index {
        x: Operand,
        ty: Type,
    },
    Extract {
        tuple: Operand,
        index: usize,
        tuple_ty: Type,
    },
    Convert {
        x: Operand,
        from: Type,
        to: Type,
    },
    ChangeType {
        x: Operand,
    },
    ChangeInterface {
        x: Operand,
    },
    Slice {
        x: Operand,
    },
    SliceToArrayPointer {
        x: Operand,
    },
    TypeAssert {
        x: Operand,
        assert_ty: Type,
    },
    Phi {
        edges: Vec<Operand>,
        ty: Type,
    },
    Call {
        call: CallCommon,
    },
    Go {
        call: CallCommon,
    },
    Defer {
        call: CallCommon,
    },
    Lookup {
        map: Operand,
        key_ty: Type,
        val_ty: Type,
    },
    /// Iterator step over a map (`is_map = true`) or a channel/range value.
    Next {
        iter: Operand,
        is_map: bool,
        key_ty: Type,
        val_ty: Type,
    },
    Range {
        x: Operand,
    },
    Select {
        states: Vec<SelectState>,
    },
    Store {
        addr: Operand,
        val: Operand,
        val_ty: Type,
    },
    Send {
        chan: Operand,
        val: Operand,
        val_ty: Type,
    },
    MapUpdate {
        map: Operand,
        key: Operand,
        key_ty: Type,
        val: Operand,
        val_ty: Type,
    },
    Return {
        results: Vec<Operand>,
    },
    Panic {
        x: Operand,
    },
    Jump,
    If {
        cond: Operand,
    },
    RunDefers,
    DebugRef,
}

#[derive(Clone, Debug)]
pub struct Instruction {
    /// `Some` for every value-producing instruction kind; `None` for
    /// `Store`/`Send`/`MapUpdate`/`Return`/`Panic`/`Jump`/`If`/
    /// `RunDefers`/`DebugRef`.
    pub result: Option<ValueId>,
    pub kind: InstKind,
}

pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
}

pub trait Function {
    fn name(&self) -> &str;
    fn package(&self) -> &str;
    fn signature(&self) -> &Signature;
    /// Types of free variables in capture order (empty for non-closures).
    fn free_vars(&self) -> &[Type];
    fn basic_blocks(&self) -> &[BasicBlock];
    /// The type of a value produced somewhere in this function (by a
    /// parameter, a free-variable capture, or an instruction result).
    fn value_type(&self, v: ValueId) -> Type;
    fn is_synthetic(&self) -> bool {
        false
    }
    /// True for a generic function template with no supplied type
    /// arguments — skipped entirely by generation.
    fn is_generic_without_args(&self) -> bool {
        false
    }
}

/// Packages named this way contribute their `main`/`init` members only as
/// analysis entry points; other packages contribute every exported
/// top-level function/method/initializer.
pub const MAIN_PACKAGE: &str = "main";

pub trait Program {
    fn functions(&self) -> &[Box<dyn Function>];
    fn function(&self, id: FuncId) -> &dyn Function {
        &*self.functions()[id.0 as usize]
    }
    fn global_type(&self, id: GlobalId) -> Type;
    /// Resolve `method` against the method set of a dynamic (Named) type,
    /// returning the implementing function, if any.
    fn resolve_method(&self, dynamic_type: &Type, method: &str) -> Option<FuncId>;
    /// All method names declared on the method set of `iface`/`named`
    /// type — used to eagerly materialize dispatch targets.
    fn method_names(&self, ty: &Type) -> Vec<String>;
    fn is_reflect_or_runtime(&self, f: FuncId) -> bool {
        let _ = f;
        false
    }
}
