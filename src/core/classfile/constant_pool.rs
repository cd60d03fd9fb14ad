// src/core/classfile/constant_pool.rs
//! Constant pool decoding and typed lookups

use super::reader::{decode_modified_utf8, ByteReader};
use super::DecodeError;

mod tags {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

#[derive(Debug, Clone)]
pub enum Constant {
    /// Slot 0 and the second slot of long/double entries
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

/// Symbolic reference to a field or method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Internal name of the declaring type
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
}

impl MemberRef {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface: false,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

/// Method handle reference kinds (JVMS 5.4.3.5)
pub mod ref_kind {
    pub const GET_FIELD: u8 = 1;
    pub const GET_STATIC: u8 = 2;
    pub const INVOKE_VIRTUAL: u8 = 5;
    pub const INVOKE_STATIC: u8 = 6;
    pub const INVOKE_SPECIAL: u8 = 7;
    pub const NEW_INVOKE_SPECIAL: u8 = 8;
    pub const INVOKE_INTERFACE: u8 = 9;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodHandle {
    pub kind: u8,
    pub member: MemberRef,
}

impl MethodHandle {
    pub fn is_constructor(&self) -> bool {
        self.kind == ref_kind::NEW_INVOKE_SPECIAL
    }
}

/// Loadable constant value
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Internal name, or an array descriptor
    Class(String),
    MethodType(String),
    MethodHandle(MethodHandle),
    /// Dynamically computed constant; only the descriptor is kept
    Dynamic(String),
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        use tags::*;

        let count = reader.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let tag = reader.u8()?;
            let constant = match tag {
                UTF8 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(decode_modified_utf8(reader.bytes(len)?)?)
                }
                INTEGER => Constant::Integer(reader.i32()?),
                FLOAT => Constant::Float(f32::from_bits(reader.u32()?)),
                LONG => Constant::Long(reader.i64()?),
                DOUBLE => Constant::Double(f64::from_bits(reader.i64()? as u64)),
                CLASS => Constant::Class(reader.u16()?),
                STRING => Constant::String(reader.u16()?),
                FIELDREF => Constant::FieldRef(reader.u16()?, reader.u16()?),
                METHODREF => Constant::MethodRef(reader.u16()?, reader.u16()?),
                INTERFACE_METHODREF => Constant::InterfaceMethodRef(reader.u16()?, reader.u16()?),
                NAME_AND_TYPE => Constant::NameAndType(reader.u16()?, reader.u16()?),
                METHOD_HANDLE => Constant::MethodHandle(reader.u8()?, reader.u16()?),
                METHOD_TYPE => Constant::MethodType(reader.u16()?),
                DYNAMIC => Constant::Dynamic(reader.u16()?, reader.u16()?),
                INVOKE_DYNAMIC => Constant::InvokeDynamic(reader.u16()?, reader.u16()?),
                MODULE => Constant::Module(reader.u16()?),
                PACKAGE => Constant::Package(reader.u16()?),
                other => return Err(DecodeError::UnknownTag(other)),
            };
            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(constant);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant, DecodeError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(DecodeError::BadConstant(index)),
            Some(c) => Ok(c),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(DecodeError::BadConstant(index)),
        }
    }

    /// Internal name of a CONSTANT_Class entry
    pub fn class_name(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => Err(DecodeError::BadConstant(index)),
        }
    }

    /// Like `class_name` but index 0 means "none" (e.g. java/lang/Object's super)
    pub fn optional_class_name(&self, index: u16) -> Result<Option<String>, DecodeError> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(|s| Some(s.to_string()))
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), DecodeError> {
        match self.get(index)? {
            Constant::NameAndType(name, descriptor) => Ok((self.utf8(*name)?, self.utf8(*descriptor)?)),
            _ => Err(DecodeError::BadConstant(index)),
        }
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef, DecodeError> {
        let (class, nat, interface) = match self.get(index)? {
            Constant::FieldRef(c, n) | Constant::MethodRef(c, n) => (*c, *n, false),
            Constant::InterfaceMethodRef(c, n) => (*c, *n, true),
            _ => return Err(DecodeError::BadConstant(index)),
        };
        let (name, descriptor) = self.name_and_type(nat)?;
        Ok(MemberRef {
            owner: self.class_name(class)?.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface,
        })
    }

    pub fn method_handle(&self, index: u16) -> Result<MethodHandle, DecodeError> {
        match self.get(index)? {
            Constant::MethodHandle(kind, reference) => Ok(MethodHandle {
                kind: *kind,
                member: self.member_ref(*reference)?,
            }),
            _ => Err(DecodeError::BadConstant(index)),
        }
    }

    /// Value of an entry usable by `ldc` or as a bootstrap argument
    pub fn loadable(&self, index: u16) -> Result<ConstValue, DecodeError> {
        Ok(match self.get(index)? {
            Constant::Integer(v) => ConstValue::Int(*v),
            Constant::Float(v) => ConstValue::Float(*v),
            Constant::Long(v) => ConstValue::Long(*v),
            Constant::Double(v) => ConstValue::Double(*v),
            Constant::String(s) => ConstValue::String(self.utf8(*s)?.to_string()),
            Constant::Class(name) => ConstValue::Class(self.utf8(*name)?.to_string()),
            Constant::MethodType(d) => ConstValue::MethodType(self.utf8(*d)?.to_string()),
            Constant::MethodHandle(..) => ConstValue::MethodHandle(self.method_handle(index)?),
            Constant::Dynamic(_, nat) => ConstValue::Dynamic(self.name_and_type(*nat)?.1.to_string()),
            _ => return Err(DecodeError::BadConstant(index)),
        })
    }

    /// (bootstrap index, name, descriptor) of a CONSTANT_InvokeDynamic entry
    pub fn invoke_dynamic(&self, index: u16) -> Result<(u16, &str, &str), DecodeError> {
        match self.get(index)? {
            Constant::InvokeDynamic(bootstrap, nat) => {
                let (name, descriptor) = self.name_and_type(*nat)?;
                Ok((*bootstrap, name, descriptor))
            }
            _ => Err(DecodeError::BadConstant(index)),
        }
    }
}
