// src/core/classfile/mod.rs
//! Class file decoding.
//!
//! [`parse_class`] turns raw `.class` bytes into an immutable [`ClassModel`].
//! Only the attributes route discovery needs are decoded; everything else is
//! skipped by length.

pub mod annotations;
pub mod code;
pub mod constant_pool;
pub mod model;
pub mod opcodes;
pub mod reader;

#[cfg(test)]
pub mod testing;

use std::cell::OnceCell;

use thiserror::Error;

pub use annotations::{Annotation, ElementValue};
pub use code::{BootstrapMethod, DynamicCall, FieldOp, Insn, InsnKind, InvokeOp, StackOp, ValueKind};
pub use constant_pool::{ConstValue, ConstantPool, MemberRef, MethodHandle};
pub use model::{ClassModel, FieldModel, LocalVariable, MethodModel};

use code::CodeContext;
use reader::ByteReader;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("unexpected end of data at byte {0}")]
    Truncated(usize),

    #[error("bad magic number 0x{0:08X}")]
    BadMagic(u32),

    #[error("invalid constant pool reference #{0}")]
    BadConstant(u16),

    #[error("unknown tag {0}")]
    UnknownTag(u8),

    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("unknown newarray element type {0}")]
    BadArrayType(u8),

    #[error("switch table at offset {0} exceeds the code array")]
    BadSwitch(usize),

    #[error("malformed modified UTF-8")]
    BadUtf8,
}

struct RawCode<'a> {
    bytes: &'a [u8],
    handler_offsets: Vec<u32>,
    line_numbers: Vec<(u32, u16)>,
}

struct PendingMethod<'a> {
    model: MethodModel,
    code: Option<RawCode<'a>>,
    method_parameters: Option<Vec<Option<String>>>,
}

/// Decode a complete class file.
pub fn parse_class(bytes: &[u8]) -> Result<ClassModel, DecodeError> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    reader.skip(4)?; // minor + major version

    let pool = ConstantPool::parse(&mut reader)?;
    let access = reader.u16()?;
    let name = pool.class_name(reader.u16()?)?.to_string();
    let super_name = pool.optional_class_name(reader.u16()?)?;

    let interface_count = reader.u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(reader.u16()?)?.to_string());
    }

    let field_count = reader.u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(parse_field(&mut reader, &pool)?);
    }

    let method_count = reader.u16()?;
    let mut pending = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        pending.push(parse_method(&mut reader, &pool)?);
    }

    let mut signature = None;
    let mut class_annotations = Vec::new();
    let mut bootstrap_methods = Vec::new();
    for_each_attribute(&mut reader, &pool, |attr, body| {
        match attr {
            "Signature" => signature = Some(pool.utf8(body.u16()?)?.to_string()),
            "RuntimeVisibleAnnotations" => {
                class_annotations.extend(annotations::parse_annotations(body, &pool, true)?)
            }
            "RuntimeInvisibleAnnotations" => {
                class_annotations.extend(annotations::parse_annotations(body, &pool, false)?)
            }
            "BootstrapMethods" => bootstrap_methods = parse_bootstrap_methods(body, &pool)?,
            _ => {}
        }
        Ok(())
    })?;

    // invokedynamic operands need the class-level BootstrapMethods table
    let mut methods = Vec::with_capacity(pending.len());
    for PendingMethod {
        mut model,
        code,
        method_parameters,
    } in pending
    {
        if let Some(code) = code {
            let ctx = CodeContext {
                pool: &pool,
                bootstrap_methods: &bootstrap_methods,
                handler_offsets: &code.handler_offsets,
                line_numbers: &code.line_numbers,
            };
            model.instructions = code::decode(code.bytes, &ctx)?;
        }
        model.parameter_names = match method_parameters {
            Some(names) if names.iter().all(Option::is_some) => names.into_iter().flatten().collect(),
            _ => model::names_from_locals(&model),
        };
        methods.push(model);
    }

    Ok(ClassModel {
        name,
        super_name,
        interfaces,
        access,
        signature,
        annotations: class_annotations,
        methods,
        fields,
    })
}

fn for_each_attribute<'a, F>(reader: &mut ByteReader<'a>, pool: &ConstantPool, mut f: F) -> Result<(), DecodeError>
where
    F: FnMut(&str, &mut ByteReader<'a>) -> Result<(), DecodeError>,
{
    let count = reader.u16()?;
    for _ in 0..count {
        let name = pool.utf8(reader.u16()?)?;
        let len = reader.u32()? as usize;
        let mut body = ByteReader::new(reader.bytes(len)?);
        f(name, &mut body)?;
    }
    Ok(())
}

fn parse_field(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<FieldModel, DecodeError> {
    let access = reader.u16()?;
    let name = pool.utf8(reader.u16()?)?.to_string();
    let descriptor = pool.utf8(reader.u16()?)?.to_string();
    let mut signature = None;
    for_each_attribute(reader, pool, |attr, body| {
        if attr == "Signature" {
            signature = Some(pool.utf8(body.u16()?)?.to_string());
        }
        Ok(())
    })?;
    Ok(FieldModel {
        name,
        descriptor,
        access,
        signature,
    })
}

fn parse_method<'a>(reader: &mut ByteReader<'a>, pool: &ConstantPool) -> Result<PendingMethod<'a>, DecodeError> {
    let access = reader.u16()?;
    let name = pool.utf8(reader.u16()?)?.to_string();
    let descriptor = pool.utf8(reader.u16()?)?.to_string();

    let mut model = MethodModel {
        name,
        descriptor,
        access,
        signature: None,
        instructions: Vec::new(),
        local_variables: Vec::new(),
        parameter_names: Vec::new(),
        annotations: Vec::new(),
        parameter_annotations: Vec::new(),
        noise: OnceCell::new(),
    };
    let mut code = None;
    let mut method_parameters = None;

    for_each_attribute(reader, pool, |attr, body| {
        match attr {
            "Code" => code = Some(parse_code(body, pool, &mut model.local_variables)?),
            "Signature" => model.signature = Some(pool.utf8(body.u16()?)?.to_string()),
            "MethodParameters" => {
                let count = body.u8()?;
                let mut names = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let index = body.u16()?;
                    body.u16()?;
                    names.push(match index {
                        0 => None,
                        i => Some(pool.utf8(i)?.to_string()),
                    });
                }
                method_parameters = Some(names);
            }
            "RuntimeVisibleAnnotations" => model
                .annotations
                .extend(annotations::parse_annotations(body, pool, true)?),
            "RuntimeInvisibleAnnotations" => model
                .annotations
                .extend(annotations::parse_annotations(body, pool, false)?),
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let visible = attr == "RuntimeVisibleParameterAnnotations";
                let per_param = annotations::parse_parameter_annotations(body, pool, visible)?;
                if model.parameter_annotations.len() < per_param.len() {
                    model.parameter_annotations.resize(per_param.len(), Vec::new());
                }
                for (slot, found) in model.parameter_annotations.iter_mut().zip(per_param) {
                    slot.extend(found);
                }
            }
            _ => {}
        }
        Ok(())
    })?;

    Ok(PendingMethod {
        model,
        code,
        method_parameters,
    })
}

fn parse_code<'a>(
    body: &mut ByteReader<'a>,
    pool: &ConstantPool,
    locals: &mut Vec<LocalVariable>,
) -> Result<RawCode<'a>, DecodeError> {
    body.skip(4)?; // max_stack + max_locals
    let len = body.u32()? as usize;
    let bytes = body.bytes(len)?;

    let handlers = body.u16()?;
    let mut handler_offsets = Vec::with_capacity(handlers as usize);
    for _ in 0..handlers {
        body.skip(4)?;
        handler_offsets.push(body.u16()? as u32);
        body.skip(2)?;
    }

    let mut line_numbers = Vec::new();
    let mut type_signatures: Vec<(u16, u32, String)> = Vec::new();
    for_each_attribute(body, pool, |attr, table| {
        match attr {
            "LineNumberTable" => {
                let count = table.u16()?;
                for _ in 0..count {
                    let pc = table.u16()? as u32;
                    line_numbers.push((pc, table.u16()?));
                }
            }
            "LocalVariableTable" => {
                let count = table.u16()?;
                for _ in 0..count {
                    let start = table.u16()? as u32;
                    let length = table.u16()? as u32;
                    let name = pool.utf8(table.u16()?)?.to_string();
                    let descriptor = pool.utf8(table.u16()?)?.to_string();
                    let index = table.u16()?;
                    locals.push(LocalVariable {
                        start,
                        length,
                        name,
                        descriptor,
                        signature: None,
                        index,
                    });
                }
            }
            "LocalVariableTypeTable" => {
                let count = table.u16()?;
                for _ in 0..count {
                    let start = table.u16()? as u32;
                    table.u16()?;
                    table.u16()?;
                    let signature = pool.utf8(table.u16()?)?.to_string();
                    let index = table.u16()?;
                    type_signatures.push((index, start, signature));
                }
            }
            _ => {}
        }
        Ok(())
    })?;

    for (index, start, signature) in type_signatures {
        if let Some(local) = locals.iter_mut().find(|l| l.index == index && l.start == start) {
            local.signature = Some(signature);
        }
    }

    Ok(RawCode {
        bytes,
        handler_offsets,
        line_numbers,
    })
}

fn parse_bootstrap_methods(body: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Vec<BootstrapMethod>, DecodeError> {
    let count = body.u16()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let handle = pool.method_handle(body.u16()?)?;
        let arg_count = body.u16()?;
        let mut args = Vec::with_capacity(arg_count as usize);
        for _ in 0..arg_count {
            args.push(pool.loadable(body.u16()?)?);
        }
        methods.push(BootstrapMethod { handle, args });
    }
    Ok(methods)
}
