// src/core/classfile/code.rs
//! Instruction model and `Code` array decoding.
//!
//! Raw bytecode is decoded into a closed [`InsnKind`] enum. Two pseudo
//! instructions are interleaved: [`InsnKind::Label`] at every branch or
//! exception-handler target and [`InsnKind::LineNumber`] where the line
//! number table starts a new line. Both share the offset of the instruction
//! that follows them.

use std::collections::{BTreeMap, BTreeSet};

use super::constant_pool::{ConstValue, ConstantPool, MemberRef, MethodHandle};
use super::opcodes::*;
use super::reader::ByteReader;
use super::DecodeError;
use crate::core::types::{JvmType, Primitive};

const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
    Byte,
    Char,
    Short,
}

impl ValueKind {
    fn from_slot_order(i: u8) -> Self {
        match i {
            0 => Self::Int,
            1 => Self::Long,
            2 => Self::Float,
            3 => Self::Double,
            _ => Self::Reference,
        }
    }

    fn from_array_order(i: u8) -> Self {
        match i {
            0 => Self::Int,
            1 => Self::Long,
            2 => Self::Float,
            3 => Self::Double,
            4 => Self::Reference,
            5 => Self::Byte,
            6 => Self::Char,
            _ => Self::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOp {
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOp {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    pub handle: MethodHandle,
    pub args: Vec<ConstValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicCall {
    pub name: String,
    pub descriptor: String,
    pub bootstrap: Option<BootstrapMethod>,
}

impl DynamicCall {
    /// Implementation method of a `LambdaMetafactory` call site
    pub fn lambda_target(&self) -> Option<&MethodHandle> {
        let bootstrap = self.bootstrap.as_ref()?;
        if bootstrap.handle.member.owner != LAMBDA_METAFACTORY {
            return None;
        }
        bootstrap.args.iter().find_map(|arg| match arg {
            ConstValue::MethodHandle(handle) => Some(handle),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsnKind {
    Label,
    LineNumber(u16),
    Nop,
    Const(ConstValue),
    Load { kind: ValueKind, var: u16 },
    Store { kind: ValueKind, var: u16 },
    ArrayLoad(ValueKind),
    ArrayStore(ValueKind),
    Stack(StackOp),
    /// Arithmetic, conversion and comparison opcodes, kept verbatim
    Math(u8),
    Iinc { var: u16, delta: i16 },
    Jump { opcode: u8, target: u32 },
    Switch { default: u32, targets: Vec<u32> },
    /// `None` for a plain `return`
    Return(Option<ValueKind>),
    Field { op: FieldOp, field: MemberRef },
    Invoke { op: InvokeOp, method: MemberRef },
    InvokeDynamic(DynamicCall),
    New(String),
    /// Element type of a one-dimensional `newarray`/`anewarray`
    NewArray(JvmType),
    MultiNewArray { class: String, dims: u8 },
    CheckCast(String),
    InstanceOf(String),
    ArrayLength,
    Throw,
    Monitor { enter: bool },
    Ret(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insn {
    pub offset: u32,
    pub kind: InsnKind,
}

impl Insn {
    pub fn new(offset: u32, kind: InsnKind) -> Self {
        Self { offset, kind }
    }

    /// Label and line-number markers plus `nop`
    pub fn is_marker(&self) -> bool {
        matches!(self.kind, InsnKind::Label | InsnKind::LineNumber(_) | InsnKind::Nop)
    }

    pub fn as_invoke(&self) -> Option<(InvokeOp, &MemberRef)> {
        match &self.kind {
            InsnKind::Invoke { op, method } => Some((*op, method)),
            _ => None,
        }
    }

    pub fn as_string_const(&self) -> Option<&str> {
        match &self.kind {
            InsnKind::Const(ConstValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_class_const(&self) -> Option<&str> {
        match &self.kind {
            InsnKind::Const(ConstValue::Class(c)) => Some(c),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, InsnKind::Return(_))
    }

    /// Instructions that end an expression statement
    pub fn ends_statement(&self) -> bool {
        matches!(
            self.kind,
            InsnKind::Stack(StackOp::Pop | StackOp::Pop2)
                | InsnKind::Store { .. }
                | InsnKind::Return(_)
                | InsnKind::Throw
        )
    }
}

/// Inputs the decoder needs beyond the raw code bytes
pub struct CodeContext<'a> {
    pub pool: &'a ConstantPool,
    pub bootstrap_methods: &'a [BootstrapMethod],
    pub handler_offsets: &'a [u32],
    pub line_numbers: &'a [(u32, u16)],
}

pub fn decode(code: &[u8], ctx: &CodeContext<'_>) -> Result<Vec<Insn>, DecodeError> {
    let raw = decode_raw(code, ctx)?;

    let mut labels: BTreeSet<u32> = ctx.handler_offsets.iter().copied().collect();
    for insn in &raw {
        match &insn.kind {
            InsnKind::Jump { target, .. } => {
                labels.insert(*target);
            }
            InsnKind::Switch { default, targets } => {
                labels.insert(*default);
                labels.extend(targets.iter().copied());
            }
            _ => {}
        }
    }
    let lines: BTreeMap<u32, u16> = ctx.line_numbers.iter().copied().collect();

    let mut out = Vec::with_capacity(raw.len() + labels.len() + lines.len());
    for insn in raw {
        if labels.contains(&insn.offset) {
            out.push(Insn::new(insn.offset, InsnKind::Label));
        }
        if let Some(line) = lines.get(&insn.offset) {
            out.push(Insn::new(insn.offset, InsnKind::LineNumber(*line)));
        }
        out.push(insn);
    }
    Ok(out)
}

fn decode_raw(code: &[u8], ctx: &CodeContext<'_>) -> Result<Vec<Insn>, DecodeError> {
    let mut reader = ByteReader::new(code);
    let mut out = Vec::new();

    while reader.remaining() > 0 {
        let offset = reader.position();
        let opcode = reader.u8()?;
        let branch = |delta: i32| (offset as i64 + delta as i64) as u32;

        let kind = match opcode {
            NOP => InsnKind::Nop,
            ACONST_NULL => InsnKind::Const(ConstValue::Null),
            ICONST_M1..=ICONST_5 => InsnKind::Const(ConstValue::Int(opcode as i32 - 3)),
            LCONST_0 | LCONST_1 => InsnKind::Const(ConstValue::Long((opcode - LCONST_0) as i64)),
            FCONST_0..=FCONST_2 => InsnKind::Const(ConstValue::Float((opcode - FCONST_0) as f32)),
            DCONST_0 | DCONST_1 => InsnKind::Const(ConstValue::Double((opcode - DCONST_0) as f64)),
            BIPUSH => InsnKind::Const(ConstValue::Int(reader.i8()? as i32)),
            SIPUSH => InsnKind::Const(ConstValue::Int(reader.i16()? as i32)),
            LDC => InsnKind::Const(ctx.pool.loadable(reader.u8()? as u16)?),
            LDC_W | LDC2_W => InsnKind::Const(ctx.pool.loadable(reader.u16()?)?),
            ILOAD..=ALOAD => InsnKind::Load {
                kind: ValueKind::from_slot_order(opcode - ILOAD),
                var: reader.u8()? as u16,
            },
            ILOAD_0..=ALOAD_3 => {
                let rel = opcode - ILOAD_0;
                InsnKind::Load {
                    kind: ValueKind::from_slot_order(rel / 4),
                    var: (rel % 4) as u16,
                }
            }
            IALOAD..=SALOAD => InsnKind::ArrayLoad(ValueKind::from_array_order(opcode - IALOAD)),
            ISTORE..=ASTORE => InsnKind::Store {
                kind: ValueKind::from_slot_order(opcode - ISTORE),
                var: reader.u8()? as u16,
            },
            ISTORE_0..=ASTORE_3 => {
                let rel = opcode - ISTORE_0;
                InsnKind::Store {
                    kind: ValueKind::from_slot_order(rel / 4),
                    var: (rel % 4) as u16,
                }
            }
            IASTORE..=SASTORE => InsnKind::ArrayStore(ValueKind::from_array_order(opcode - IASTORE)),
            POP => InsnKind::Stack(StackOp::Pop),
            POP2 => InsnKind::Stack(StackOp::Pop2),
            DUP => InsnKind::Stack(StackOp::Dup),
            DUP_X1 => InsnKind::Stack(StackOp::DupX1),
            DUP_X2 => InsnKind::Stack(StackOp::DupX2),
            DUP2 => InsnKind::Stack(StackOp::Dup2),
            DUP2_X1 => InsnKind::Stack(StackOp::Dup2X1),
            DUP2_X2 => InsnKind::Stack(StackOp::Dup2X2),
            SWAP => InsnKind::Stack(StackOp::Swap),
            IINC => InsnKind::Iinc {
                var: reader.u8()? as u16,
                delta: reader.i8()? as i16,
            },
            IADD..=DCMPG => InsnKind::Math(opcode),
            IFEQ..=JSR | IFNULL | IFNONNULL => InsnKind::Jump {
                opcode,
                target: branch(reader.i16()? as i32),
            },
            GOTO_W | JSR_W => InsnKind::Jump {
                opcode,
                target: branch(reader.i32()?),
            },
            RET => InsnKind::Ret(reader.u8()? as u16),
            TABLESWITCH => {
                reader.align(0)?;
                let default = branch(reader.i32()?);
                let low = reader.i32()?;
                let high = reader.i32()?;
                let count = (high as i64 - low as i64 + 1).max(0) as u64;
                let count = switch_size(&reader, count, 4, offset)?;
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(branch(reader.i32()?));
                }
                InsnKind::Switch { default, targets }
            }
            LOOKUPSWITCH => {
                reader.align(0)?;
                let default = branch(reader.i32()?);
                let pairs = reader.i32()?.max(0) as u64;
                let pairs = switch_size(&reader, pairs, 8, offset)?;
                let mut targets = Vec::with_capacity(pairs);
                for _ in 0..pairs {
                    reader.i32()?;
                    targets.push(branch(reader.i32()?));
                }
                InsnKind::Switch { default, targets }
            }
            IRETURN..=ARETURN => InsnKind::Return(Some(ValueKind::from_slot_order(opcode - IRETURN))),
            RETURN => InsnKind::Return(None),
            GETSTATIC..=PUTFIELD => {
                let op = match opcode {
                    GETSTATIC => FieldOp::GetStatic,
                    PUTSTATIC => FieldOp::PutStatic,
                    GETFIELD => FieldOp::GetField,
                    _ => FieldOp::PutField,
                };
                InsnKind::Field {
                    op,
                    field: ctx.pool.member_ref(reader.u16()?)?,
                }
            }
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => {
                let op = match opcode {
                    INVOKEVIRTUAL => InvokeOp::Virtual,
                    INVOKESPECIAL => InvokeOp::Special,
                    _ => InvokeOp::Static,
                };
                InsnKind::Invoke {
                    op,
                    method: ctx.pool.member_ref(reader.u16()?)?,
                }
            }
            INVOKEINTERFACE => {
                let method = ctx.pool.member_ref(reader.u16()?)?;
                reader.skip(2)?;
                InsnKind::Invoke {
                    op: InvokeOp::Interface,
                    method,
                }
            }
            INVOKEDYNAMIC => {
                let (bootstrap, name, descriptor) = ctx.pool.invoke_dynamic(reader.u16()?)?;
                reader.skip(2)?;
                InsnKind::InvokeDynamic(DynamicCall {
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    bootstrap: ctx.bootstrap_methods.get(bootstrap as usize).cloned(),
                })
            }
            NEW => InsnKind::New(ctx.pool.class_name(reader.u16()?)?.to_string()),
            NEWARRAY => InsnKind::NewArray(JvmType::Primitive(primitive_array_type(reader.u8()?)?)),
            ANEWARRAY => InsnKind::NewArray(JvmType::from_internal_name(ctx.pool.class_name(reader.u16()?)?)),
            ARRAYLENGTH => InsnKind::ArrayLength,
            ATHROW => InsnKind::Throw,
            CHECKCAST => InsnKind::CheckCast(ctx.pool.class_name(reader.u16()?)?.to_string()),
            INSTANCEOF => InsnKind::InstanceOf(ctx.pool.class_name(reader.u16()?)?.to_string()),
            MONITORENTER => InsnKind::Monitor { enter: true },
            MONITOREXIT => InsnKind::Monitor { enter: false },
            MULTIANEWARRAY => InsnKind::MultiNewArray {
                class: ctx.pool.class_name(reader.u16()?)?.to_string(),
                dims: reader.u8()?,
            },
            WIDE => decode_wide(&mut reader, offset)?,
            other => {
                return Err(DecodeError::UnknownOpcode {
                    opcode: other,
                    offset,
                })
            }
        };
        out.push(Insn::new(offset as u32, kind));
    }

    Ok(out)
}

/// Entry count of a switch table, rejected when the table cannot fit in the
/// remaining code bytes
fn switch_size(reader: &ByteReader<'_>, count: u64, entry_len: u64, offset: usize) -> Result<usize, DecodeError> {
    if count.saturating_mul(entry_len) > reader.remaining() as u64 {
        return Err(DecodeError::BadSwitch(offset));
    }
    Ok(count as usize)
}

fn decode_wide(reader: &mut ByteReader<'_>, offset: usize) -> Result<InsnKind, DecodeError> {
    let opcode = reader.u8()?;
    Ok(match opcode {
        ILOAD..=ALOAD => InsnKind::Load {
            kind: ValueKind::from_slot_order(opcode - ILOAD),
            var: reader.u16()?,
        },
        ISTORE..=ASTORE => InsnKind::Store {
            kind: ValueKind::from_slot_order(opcode - ISTORE),
            var: reader.u16()?,
        },
        IINC => InsnKind::Iinc {
            var: reader.u16()?,
            delta: reader.i16()?,
        },
        RET => InsnKind::Ret(reader.u16()?),
        other => {
            return Err(DecodeError::UnknownOpcode {
                opcode: other,
                offset,
            })
        }
    })
}

fn primitive_array_type(atype: u8) -> Result<Primitive, DecodeError> {
    Ok(match atype {
        4 => Primitive::Boolean,
        5 => Primitive::Char,
        6 => Primitive::Float,
        7 => Primitive::Double,
        8 => Primitive::Byte,
        9 => Primitive::Short,
        10 => Primitive::Int,
        11 => Primitive::Long,
        other => return Err(DecodeError::BadArrayType(other)),
    })
}
