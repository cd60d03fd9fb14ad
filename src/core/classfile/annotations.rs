// src/core/classfile/annotations.rs
use super::constant_pool::{Constant, ConstantPool};
use super::reader::ByteReader;
use super::DecodeError;
use crate::core::types::{dotted, simple_name};

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Enum { type_name: String, constant: String },
    /// Class literal as a field descriptor (`Ljava/lang/String;`, `V`)
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Internal name of the annotation interface
    pub type_name: String,
    pub visible: bool,
    pub values: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub fn value(&self, name: &str) -> Option<&ElementValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// String elements of `name`, flattening a single value or an array
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.value(name) {
            Some(ElementValue::String(s)) => vec![s.clone()],
            Some(ElementValue::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    ElementValue::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.type_name)
    }

    pub fn dotted_name(&self) -> String {
        dotted(&self.type_name)
    }
}

pub(super) fn parse_annotations(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<Vec<Annotation>, DecodeError> {
    let count = reader.u16()?;
    (0..count).map(|_| parse_annotation(reader, pool, visible)).collect()
}

pub(super) fn parse_parameter_annotations(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<Vec<Vec<Annotation>>, DecodeError> {
    let params = reader.u8()?;
    (0..params)
        .map(|_| parse_annotations(reader, pool, visible))
        .collect()
}

fn parse_annotation(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<Annotation, DecodeError> {
    let type_name = strip_descriptor(pool.utf8(reader.u16()?)?);
    let pairs = reader.u16()?;
    let mut values = Vec::with_capacity(pairs as usize);
    for _ in 0..pairs {
        let name = pool.utf8(reader.u16()?)?.to_string();
        values.push((name, parse_element(reader, pool, visible)?));
    }
    Ok(Annotation {
        type_name,
        visible,
        values,
    })
}

fn parse_element(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<ElementValue, DecodeError> {
    let tag = reader.u8()?;
    Ok(match tag {
        b'B' | b'I' | b'S' | b'J' | b'C' | b'Z' => {
            let index = reader.u16()?;
            let value = match pool.get(index)? {
                Constant::Integer(v) => *v as i64,
                Constant::Long(v) => *v,
                _ => return Err(DecodeError::BadConstant(index)),
            };
            match tag {
                b'Z' => ElementValue::Bool(value != 0),
                b'C' => ElementValue::Char(char::from_u32(value as u32).unwrap_or('\u{fffd}')),
                _ => ElementValue::Int(value),
            }
        }
        b'F' | b'D' => {
            let index = reader.u16()?;
            match pool.get(index)? {
                Constant::Float(v) => ElementValue::Float(*v as f64),
                Constant::Double(v) => ElementValue::Float(*v),
                _ => return Err(DecodeError::BadConstant(index)),
            }
        }
        b's' => ElementValue::String(pool.utf8(reader.u16()?)?.to_string()),
        b'e' => ElementValue::Enum {
            type_name: strip_descriptor(pool.utf8(reader.u16()?)?),
            constant: pool.utf8(reader.u16()?)?.to_string(),
        },
        b'c' => ElementValue::Class(pool.utf8(reader.u16()?)?.to_string()),
        b'@' => ElementValue::Annotation(parse_annotation(reader, pool, visible)?),
        b'[' => {
            let count = reader.u16()?;
            ElementValue::Array(
                (0..count)
                    .map(|_| parse_element(reader, pool, visible))
                    .collect::<Result<_, _>>()?,
            )
        }
        other => return Err(DecodeError::UnknownTag(other)),
    })
}

fn strip_descriptor(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(descriptor)
        .to_string()
}
