//! Module, type, method, and instruction-stream data types.
//!
//! Instruction identity is modeled as per-body arena handles
//! ([`InstrId`]): branch operands and exception-handler boundaries refer
//! to ids, never to stream positions, so inserting or removing
//! instructions needs no reference fix-ups. The one invariant every pass
//! must keep is that an id referenced by a branch or handler boundary
//! stays present in the body — such an instruction may be degraded to a
//! `Nop` but never physically deleted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Stable handle to one instruction inside one method body.
///
/// Ids are allocated sequentially per body and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InstrId(pub u32);

/// Identity of a method defined in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodId {
    pub type_index: usize,
    pub method_index: usize,
}

/// Call target: either a method defined in this module or an external
/// member reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callee {
    Def(MethodId),
    Ref(usize),
}

/// Semantic opcode set.
///
/// The codec normalizes encoding variants (short-form loads, macro
/// branches) into these opcodes with explicit operands; anything the
/// passes never interpret arrives as [`OpCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    Nop,
    Ret,
    /// Static-dispatch call; operand is a [`Operand::Callee`].
    Call,
    /// Virtual-dispatch call; operand is a [`Operand::Callee`].
    CallVirt,
    /// Push a string literal; operand is [`Operand::Str`].
    LoadString,
    /// Push argument N; operand is [`Operand::Int32`] with the index.
    LoadArg,
    /// Push a 32-bit integer constant; operand is [`Operand::Int32`].
    LoadConstI32,
    Add,
    Sub,
    Mul,
    Xor,
    And,
    Or,
    /// Unconditional branch; operand is [`Operand::Target`].
    Branch,
    BranchIfTrue,
    BranchIfFalse,
    /// Multi-way branch; operand is [`Operand::Switch`].
    Switch,
    /// Any opcode the pipelines treat as opaque, keyed by mnemonic.
    Other(String),
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    None,
    Int32(i32),
    Str(String),
    Callee(Callee),
    Target(InstrId),
    Switch(Vec<InstrId>),
}

/// One instruction in a method body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstrId,
    pub opcode: OpCode,
    pub operand: Operand,
}

/// Protected region; all bounds reference instruction ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub try_start: InstrId,
    pub try_end: InstrId,
    pub handler_start: InstrId,
    pub handler_end: InstrId,
    pub filter_start: Option<InstrId>,
}

/// Ordered instruction stream plus its exception handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    next_id: u32,
    pub instructions: Vec<Instruction>,
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction, allocating a fresh id.
    pub fn push(&mut self, opcode: OpCode, operand: Operand) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        self.instructions.push(Instruction {
            id,
            opcode,
            operand,
        });
        id
    }

    /// Ids referenced by any branch operand or handler boundary.
    ///
    /// Instructions in this set must never be removed from the body.
    pub fn referenced_ids(&self) -> HashSet<InstrId> {
        let mut set = HashSet::new();
        for instr in &self.instructions {
            match &instr.operand {
                Operand::Target(id) => {
                    set.insert(*id);
                }
                Operand::Switch(ids) => {
                    set.extend(ids.iter().copied());
                }
                _ => {}
            }
        }
        for handler in &self.handlers {
            set.insert(handler.try_start);
            set.insert(handler.try_end);
            set.insert(handler.handler_start);
            set.insert(handler.handler_end);
            if let Some(filter) = handler.filter_start {
                set.insert(filter);
            }
        }
        set
    }

    /// Position of the instruction with the given id, if present.
    pub fn position_of(&self, id: InstrId) -> Option<usize> {
        self.instructions.iter().position(|i| i.id == id)
    }
}

/// Method flavor; constructors are exempt from renaming passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodKind {
    Normal,
    Ctor,
    StaticCtor,
}

/// Explicit parameter (the hidden `this` is not listed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
}

/// A method defined in this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub kind: MethodKind,
    pub is_virtual: bool,
    pub has_this: bool,
    pub params: Vec<Param>,
    pub body: Option<MethodBody>,
}

impl MethodDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: MethodKind::Normal,
            is_virtual: false,
            has_this: false,
            params: Vec::new(),
            body: None,
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, MethodKind::Ctor | MethodKind::StaticCtor)
    }
}

/// Named member without further structure (field, property, event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
}

impl Member {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// A type defined in this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub namespace: String,
    /// The `<Module>` global type; exempt from renaming.
    pub is_global: bool,
    pub methods: Vec<MethodDef>,
    pub fields: Vec<Member>,
    pub properties: Vec<Member>,
    pub events: Vec<Member>,
}

impl TypeDef {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            is_global: false,
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// External member reference (a call target outside this module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub name: String,
    pub declaring_type: String,
    pub param_count: usize,
    pub has_this: bool,
    pub is_virtual: bool,
}

impl MemberRef {
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }
}

/// Embedded resource payload, mutable in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub data: Vec<u8>,
}

/// Resolved facts about a call target, uniform over defs and refs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeInfo {
    pub name: String,
    pub declaring_type: String,
    pub param_count: usize,
    pub has_this: bool,
    pub is_virtual: bool,
}

impl CalleeInfo {
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }
}

/// A managed module: assembly identity, types, member refs, resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BytecodeModule {
    pub name: String,
    pub assembly_full_name: String,
    pub runtime_version: String,
    /// Custom-attribute type names on the assembly, for signature scans.
    pub attribute_type_names: Vec<String>,
    pub types: Vec<TypeDef>,
    pub member_refs: Vec<MemberRef>,
    pub resources: Vec<Resource>,
}

impl BytecodeModule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            assembly_full_name: name.to_string(),
            runtime_version: String::new(),
            ..Self::default()
        }
    }

    /// Add a type, returning its index.
    pub fn push_type(&mut self, ty: TypeDef) -> usize {
        self.types.push(ty);
        self.types.len() - 1
    }

    /// Add a member reference, returning a [`Callee::Ref`] for it.
    pub fn push_member_ref(&mut self, r: MemberRef) -> Callee {
        self.member_refs.push(r);
        Callee::Ref(self.member_refs.len() - 1)
    }

    pub fn method(&self, id: MethodId) -> Option<&MethodDef> {
        self.types
            .get(id.type_index)
            .and_then(|t| t.methods.get(id.method_index))
    }

    pub fn method_count(&self) -> usize {
        self.types.iter().map(|t| t.methods.len()).sum()
    }

    /// Resolve the facts needed to reason about a call target.
    ///
    /// Returns `None` for dangling indices; passes skip such call sites.
    pub fn callee_info(&self, callee: &Callee) -> Option<CalleeInfo> {
        match callee {
            Callee::Def(id) => {
                let ty = self.types.get(id.type_index)?;
                let method = ty.methods.get(id.method_index)?;
                Some(CalleeInfo {
                    name: method.name.clone(),
                    declaring_type: ty.full_name(),
                    param_count: method.params.len(),
                    has_this: method.has_this,
                    is_virtual: method.is_virtual,
                })
            }
            Callee::Ref(index) => {
                let r = self.member_refs.get(*index)?;
                Some(CalleeInfo {
                    name: r.name.clone(),
                    declaring_type: r.declaring_type.clone(),
                    param_count: r.param_count,
                    has_this: r.has_this,
                    is_virtual: r.is_virtual,
                })
            }
        }
    }
}
