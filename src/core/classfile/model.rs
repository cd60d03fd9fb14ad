// src/core/classfile/model.rs
//! Immutable per-type view produced by [`super::parse_class`].

use std::cell::OnceCell;

use super::annotations::Annotation;
use super::code::{Insn, InsnKind, ValueKind};
use crate::core::cursor::noise_mask;
use crate::core::types::{dotted, ClassSignature, JvmType, MethodType, Primitive};

pub mod access {
    pub const STATIC: u16 = 0x0008;
    pub const BRIDGE: u16 = 0x0040;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ENUM: u16 = 0x4000;
}

#[derive(Debug, Clone)]
pub struct ClassModel {
    /// Internal name (`com/acme/App`)
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access: u16,
    pub signature: Option<String>,
    pub annotations: Vec<Annotation>,
    pub methods: Vec<MethodModel>,
    pub fields: Vec<FieldModel>,
}

impl ClassModel {
    pub fn dotted_name(&self) -> String {
        dotted(&self.name)
    }

    pub fn method_index(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodModel> {
        self.method_index(name, descriptor).map(|i| &self.methods[i])
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodModel> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }

    pub fn class_signature(&self) -> Option<ClassSignature> {
        self.signature.as_deref().and_then(ClassSignature::parse)
    }

    pub fn is_interface(&self) -> bool {
        self.access & access::INTERFACE != 0
    }

    pub fn is_enum(&self) -> bool {
        self.access & access::ENUM != 0
    }
}

#[derive(Debug, Clone)]
pub struct FieldModel {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
}

impl FieldModel {
    pub fn field_type(&self) -> Option<JvmType> {
        self.signature
            .as_deref()
            .and_then(JvmType::from_signature)
            .or_else(|| JvmType::from_descriptor(&self.descriptor))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub start: u32,
    pub length: u32,
    pub name: String,
    pub descriptor: String,
    /// From LocalVariableTypeTable, when present
    pub signature: Option<String>,
    pub index: u16,
}

impl LocalVariable {
    pub fn covers(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.start.saturating_add(self.length)
    }

    pub fn declared_type(&self) -> Option<JvmType> {
        self.signature
            .as_deref()
            .and_then(JvmType::from_signature)
            .or_else(|| JvmType::from_descriptor(&self.descriptor))
    }
}

#[derive(Debug, Clone)]
pub struct MethodModel {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
    pub instructions: Vec<Insn>,
    pub local_variables: Vec<LocalVariable>,
    pub parameter_names: Vec<String>,
    pub annotations: Vec<Annotation>,
    /// Visible and invisible parameter annotations merged per parameter
    pub parameter_annotations: Vec<Vec<Annotation>>,
    pub(super) noise: OnceCell<Vec<bool>>,
}

impl MethodModel {
    /// Stand-in body for a handler whose implementation is not in the module:
    /// a single return of the declared type.
    pub fn placeholder(name: &str, descriptor: &str) -> Self {
        let kind = MethodType::from_descriptor(descriptor).map(|m| match m.ret {
            JvmType::Primitive(Primitive::Void) => None,
            JvmType::Primitive(Primitive::Long) => Some(ValueKind::Long),
            JvmType::Primitive(Primitive::Float) => Some(ValueKind::Float),
            JvmType::Primitive(Primitive::Double) => Some(ValueKind::Double),
            JvmType::Primitive(_) => Some(ValueKind::Int),
            _ => Some(ValueKind::Reference),
        });
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: 0,
            signature: None,
            instructions: vec![Insn::new(0, InsnKind::Return(kind.unwrap_or(None)))],
            local_variables: Vec::new(),
            parameter_names: Vec::new(),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            noise: OnceCell::new(),
        }
    }

    /// Instructions the positional scans skip, computed once per method
    pub fn noise_mask(&self) -> &[bool] {
        self.noise.get_or_init(|| noise_mask(&self.instructions))
    }

    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access & access::SYNTHETIC != 0
    }

    pub fn is_bridge(&self) -> bool {
        self.access & access::BRIDGE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & access::ABSTRACT != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }

    pub fn method_type(&self) -> Option<MethodType> {
        MethodType::resolve(self.signature.as_deref(), &self.descriptor)
    }

    /// Declared return type with type variables replaced by their bounds
    pub fn return_type(&self) -> Option<JvmType> {
        self.method_type().map(|m| m.ret.erase_vars(&m.bounds()))
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }

    pub fn parameter_annotations(&self, index: usize) -> &[Annotation] {
        self.parameter_annotations
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Local-variable entry for slot `var` around `offset`. A store happens
    /// just before the variable's scope opens, so the nearest following
    /// entry is accepted as well. Entries that ended before `offset` never
    /// match.
    pub fn local_at(&self, var: u16, offset: u32) -> Option<&LocalVariable> {
        let candidates = || self.local_variables.iter().filter(move |l| l.index == var);
        candidates()
            .find(|l| l.covers(offset))
            .or_else(|| {
                candidates()
                    .filter(|l| l.start >= offset)
                    .min_by_key(|l| l.start)
            })
    }
}

/// Parameter names from the local-variable table, honoring two-slot
/// long/double parameters and the receiver slot of instance methods.
pub(super) fn names_from_locals(method: &MethodModel) -> Vec<String> {
    let Some(shape) = MethodType::from_descriptor(&method.descriptor) else {
        return Vec::new();
    };
    let mut slot: u16 = if method.is_static() { 0 } else { 1 };
    let mut names = Vec::with_capacity(shape.params.len());
    for param in &shape.params {
        let name = method
            .local_variables
            .iter()
            .filter(|l| l.index == slot)
            .min_by_key(|l| l.start)
            .map(|l| l.name.clone());
        match name {
            Some(name) => names.push(name),
            None => return Vec::new(),
        }
        slot += match param {
            JvmType::Primitive(Primitive::Long | Primitive::Double) => 2,
            _ => 1,
        };
    }
    names
}
