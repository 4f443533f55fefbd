//! Shared fixture types for the end-to-end tests: a minimal `Program`/
//! `Function` pair built directly from struct literals, the way a real
//! front-end would hand a finished SSA program to `analyze`, but small
//! enough to write by hand for one scenario at a time.

#![allow(dead_code)]

use std::collections::HashMap;

use ssapta::ssa::{BasicBlock, Function, GlobalId, Instruction, InstKind, Operand, Program, ValueId};
use ssapta::types::{Signature, Type};

pub struct FakeFunction {
    pub name: &'static str,
    pub package: &'static str,
    pub signature: Signature,
    pub free_vars: Vec<Type>,
    pub blocks: Vec<BasicBlock>,
    pub value_types: HashMap<u32, Type>,
}

impl FakeFunction {
    pub fn new(name: &'static str, package: &'static str, signature: Signature) -> Self {
        FakeFunction {
            name,
            package,
            signature,
            free_vars: Vec::new(),
            blocks: Vec::new(),
            value_types: HashMap::new(),
        }
    }

    pub fn with_free_vars(mut self, free_vars: Vec<Type>) -> Self {
        self.free_vars = free_vars;
        self
    }

    pub fn with_block(mut self, instructions: Vec<Instruction>) -> Self {
        self.blocks.push(BasicBlock { instructions });
        self
    }

    pub fn with_value(mut self, value: ValueId, ty: Type) -> Self {
        self.value_types.insert(value.0, ty);
        self
    }
}

impl Function for FakeFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn package(&self) -> &str {
        self.package
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn free_vars(&self) -> &[Type] {
        &self.free_vars
    }

    fn basic_blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    fn value_type(&self, v: ValueId) -> Type {
        self.value_types
            .get(&v.0)
            .cloned()
            .unwrap_or(Type::Tuple(vec![]))
    }
}

/// A method set keyed by the declaring named type's name, resolved by
/// `FakeProgram::resolve_method`/`method_names` against `Type::Named`.
pub struct FakeProgram {
    pub funcs: Vec<Box<dyn Function>>,
    pub methods: HashMap<(String, String), usize>,
    pub method_sets: HashMap<String, Vec<String>>,
}

impl FakeProgram {
    pub fn new(funcs: Vec<Box<dyn Function>>) -> Self {
        FakeProgram {
            funcs,
            methods: HashMap::new(),
            method_sets: HashMap::new(),
        }
    }

    pub fn with_method(mut self, type_name: &str, method: &str, func: ssapta::ssa::FuncId) -> Self {
        self.methods
            .insert((type_name.to_string(), method.to_string()), func.0 as usize);
        self.method_sets
            .entry(type_name.to_string())
            .or_default()
            .push(method.to_string());
        self
    }
}

impl Program for FakeProgram {
    fn functions(&self) -> &[Box<dyn Function>] {
        &self.funcs
    }

    fn global_type(&self, _id: GlobalId) -> Type {
        Type::Tuple(vec![])
    }

    fn resolve_method(&self, dynamic_type: &Type, method: &str) -> Option<ssapta::ssa::FuncId> {
        let name = named_type_name(dynamic_type)?;
        self.methods
            .get(&(name, method.to_string()))
            .map(|&i| ssapta::ssa::FuncId(i as u32))
    }

    fn method_names(&self, ty: &Type) -> Vec<String> {
        match named_type_name(ty) {
            Some(name) => self.method_sets.get(&name).cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

fn named_type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Named(n) => Some(n.name.clone()),
        _ => None,
    }
}

pub fn vid(n: u32) -> ValueId {
    ValueId(n)
}

pub fn inst(result: Option<ValueId>, kind: InstKind) -> Instruction {
    Instruction { result, kind }
}

pub fn no_receiver_sig(params: Vec<Type>, results: Vec<Type>) -> Signature {
    Signature {
        receiver: None,
        params,
        results,
    }
}

pub fn thunk_type() -> Type {
    Type::Signature(std::rc::Rc::new(Signature {
        receiver: None,
        params: vec![],
        results: vec![],
    }))
}

pub fn local(v: ValueId) -> Operand {
    Operand::Local(v)
}
