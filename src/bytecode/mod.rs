//! Mutable in-memory model of a managed bytecode module.
//!
//! The model owns types, members, instruction streams, exception-handler
//! ranges, and embedded resources. Reading and writing the on-disk
//! metadata format is the job of an external [`MetadataCodec`]; every
//! transformation pass in this crate mutates the model in place.

pub mod codec;
pub mod model;

pub use codec::MetadataCodec;
pub use model::{
    BytecodeModule, Callee, ExceptionHandler, InstrId, Instruction, Member, MemberRef, MethodBody,
    MethodDef, MethodId, MethodKind, OpCode, Operand, Param, Resource, TypeDef,
};
