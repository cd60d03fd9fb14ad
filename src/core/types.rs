// src/core/types.rs
//! JVM type model plus descriptor and generic-signature decoding.
//!
//! Descriptors (`(Ljava/lang/String;I)V`) carry erased types; generic signatures
//! (`(Ljava/util/List<Ljava/lang/String;>;)V`) keep type arguments. Both decode
//! into [`JvmType`]. Wildcards collapse to their bound and unbounded `*`
//! collapses to `java.lang.Object`.

use std::collections::HashMap;
use std::fmt;

pub const OBJECT: &str = "java.lang.Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl Primitive {
    pub fn from_descriptor(c: u8) -> Option<Self> {
        Some(match c {
            b'Z' => Self::Boolean,
            b'C' => Self::Char,
            b'B' => Self::Byte,
            b'S' => Self::Short,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'F' => Self::Float,
            b'D' => Self::Double,
            b'V' => Self::Void,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Void => "void",
        }
    }

    /// Boxed counterpart, `None` for void
    pub fn boxed(&self) -> Option<&'static str> {
        Some(match self {
            Self::Boolean => "java.lang.Boolean",
            Self::Char => "java.lang.Character",
            Self::Byte => "java.lang.Byte",
            Self::Short => "java.lang.Short",
            Self::Int => "java.lang.Integer",
            Self::Long => "java.lang.Long",
            Self::Float => "java.lang.Float",
            Self::Double => "java.lang.Double",
            Self::Void => return None,
        })
    }
}

/// A (possibly parametrized) JVM type. Class names are dotted binary names
/// (`io.jooby.Route$Handler`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JvmType {
    Primitive(Primitive),
    Class { name: String, args: Vec<JvmType> },
    Array(Box<JvmType>),
    TypeVar(String),
}

impl JvmType {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class {
            name: dotted(&name.into()),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<JvmType>) -> Self {
        Self::Class {
            name: dotted(&name.into()),
            args,
        }
    }

    pub fn object() -> Self {
        Self::class(OBJECT)
    }

    pub fn string() -> Self {
        Self::class("java.lang.String")
    }

    pub fn void() -> Self {
        Self::Primitive(Primitive::Void)
    }

    pub fn array_of(element: JvmType) -> Self {
        Self::Array(Box::new(element))
    }

    /// Decode a single field descriptor such as `Ljava/lang/String;` or `[I`
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let mut parser = SigParser::new(descriptor);
        let ty = parser.parse_type()?;
        parser.at_end().then_some(ty)
    }

    /// Decode a field-level generic signature (`Ljava/util/List<TT;>;`)
    pub fn from_signature(signature: &str) -> Option<Self> {
        Self::from_descriptor(signature)
    }

    /// Type for an internal name as found in a CONSTANT_Class entry, which
    /// is either a plain internal name or an array descriptor.
    pub fn from_internal_name(internal: &str) -> Self {
        if internal.starts_with('[') {
            Self::from_descriptor(internal).unwrap_or_else(Self::object)
        } else {
            Self::class(internal)
        }
    }

    /// Dotted raw name without type arguments; arrays render as `T[]`.
    pub fn raw_name(&self) -> String {
        match self {
            Self::Primitive(p) => p.name().to_string(),
            Self::Class { name, .. } => name.clone(),
            Self::Array(element) => format!("{}[]", element.raw_name()),
            Self::TypeVar(_) => OBJECT.to_string(),
        }
    }

    /// Internal (slash separated) name of a class type
    pub fn internal_name(&self) -> Option<String> {
        match self {
            Self::Class { name, .. } => Some(name.replace('.', "/")),
            _ => None,
        }
    }

    pub fn args(&self) -> &[JvmType] {
        match self {
            Self::Class { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Void))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Class { name, args } if name == OBJECT && args.is_empty())
    }

    pub fn is_class(&self, dotted_name: &str) -> bool {
        matches!(self, Self::Class { name, .. } if name == dotted_name)
    }

    pub fn contains_type_vars(&self) -> bool {
        match self {
            Self::TypeVar(_) => true,
            Self::Class { args, .. } => args.iter().any(|a| a.contains_type_vars()),
            Self::Array(element) => element.contains_type_vars(),
            Self::Primitive(_) => false,
        }
    }

    /// Replace type variables by their bound (or `Object` when unknown)
    pub fn erase_vars(&self, bounds: &HashMap<String, JvmType>) -> JvmType {
        match self {
            Self::TypeVar(name) => bounds.get(name).cloned().unwrap_or_else(Self::object),
            Self::Class { name, args } => Self::Class {
                name: name.clone(),
                args: args.iter().map(|a| a.erase_vars(bounds)).collect(),
            },
            Self::Array(element) => Self::Array(Box::new(element.erase_vars(bounds))),
            Self::Primitive(_) => self.clone(),
        }
    }

    /// Simple name: `java.util.List<java.lang.String>` -> `List`
    pub fn simple_name(&self) -> String {
        match self {
            Self::Class { name, .. } => simple_name(name).to_string(),
            Self::Array(element) => format!("{}[]", element.simple_name()),
            _ => self.raw_name(),
        }
    }
}

impl fmt::Display for JvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::TypeVar(name) => f.write_str(name),
            Self::Array(element) => write!(f, "{}[]", element),
            Self::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

/// Declared type parameter with its first bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParam {
    pub name: String,
    pub bound: JvmType,
}

/// Decoded method shape, from either a descriptor or a generic signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodType {
    pub type_params: Vec<TypeParam>,
    pub params: Vec<JvmType>,
    pub ret: JvmType,
}

impl MethodType {
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let mut parser = SigParser::new(descriptor);
        let (params, ret) = parser.parse_method_shape()?;
        parser.at_end().then_some(Self {
            type_params: Vec::new(),
            params,
            ret,
        })
    }

    pub fn from_signature(signature: &str) -> Option<Self> {
        let mut parser = SigParser::new(signature);
        let type_params = parser.parse_type_params()?;
        let (params, ret) = parser.parse_method_shape()?;
        // throws clauses carry nothing we need
        while parser.eat(b'^') {
            parser.parse_type()?;
        }
        parser.at_end().then_some(Self {
            type_params,
            params,
            ret,
        })
    }

    /// Generic signature when it parses, raw descriptor otherwise
    pub fn resolve(signature: Option<&str>, descriptor: &str) -> Option<Self> {
        signature
            .and_then(Self::from_signature)
            .or_else(|| Self::from_descriptor(descriptor))
    }

    pub fn bounds(&self) -> HashMap<String, JvmType> {
        self.type_params
            .iter()
            .map(|p| (p.name.clone(), p.bound.clone()))
            .collect()
    }
}

/// Decoded class-level generic signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_params: Vec<TypeParam>,
    pub superclass: JvmType,
    pub interfaces: Vec<JvmType>,
}

impl ClassSignature {
    pub fn parse(signature: &str) -> Option<Self> {
        let mut parser = SigParser::new(signature);
        let type_params = parser.parse_type_params()?;
        let superclass = parser.parse_type()?;
        let mut interfaces = Vec::new();
        while !parser.at_end() {
            interfaces.push(parser.parse_type()?);
        }
        Some(Self {
            type_params,
            superclass,
            interfaces,
        })
    }
}

/// `io/jooby/Context` -> `io.jooby.Context`
pub fn dotted(name: &str) -> String {
    name.replace('/', ".")
}

/// `io.jooby.Context` -> `io/jooby/Context`
pub fn internal(name: &str) -> String {
    name.replace('.', "/")
}

/// Last segment of a binary name, nested classes included: `a.b.Outer$Inner` -> `Inner`
pub fn simple_name(name: &str) -> &str {
    let tail = name.rsplit(['.', '/']).next().unwrap_or(name);
    tail.rsplit('$').next().unwrap_or(tail)
}

struct SigParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> SigParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn identifier(&mut self, stops: &[u8]) -> Option<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .map(str::to_string)
    }

    fn parse_type(&mut self) -> Option<JvmType> {
        let c = self.peek()?;
        if let Some(p) = Primitive::from_descriptor(c) {
            self.pos += 1;
            return Some(JvmType::Primitive(p));
        }
        match c {
            b'[' => {
                self.pos += 1;
                Some(JvmType::array_of(self.parse_type()?))
            }
            b'T' => {
                self.pos += 1;
                let name = self.identifier(b";")?;
                self.eat(b';').then_some(JvmType::TypeVar(name))
            }
            b'L' => {
                self.pos += 1;
                self.parse_class_body()
            }
            _ => None,
        }
    }

    fn parse_class_body(&mut self) -> Option<JvmType> {
        let mut name = self.identifier(b"<;.")?;
        let mut args = self.parse_type_args()?;
        // inner class of a parametrized outer: Outer<TT;>.Inner<TU;>
        while self.eat(b'.') {
            let inner = self.identifier(b"<;.")?;
            name = format!("{}${}", name, inner);
            args = self.parse_type_args()?;
        }
        self.eat(b';').then(|| JvmType::generic(name, args))
    }

    fn parse_type_args(&mut self) -> Option<Vec<JvmType>> {
        let mut args = Vec::new();
        if !self.eat(b'<') {
            return Some(args);
        }
        while !self.eat(b'>') {
            let arg = match self.peek()? {
                b'*' => {
                    self.pos += 1;
                    JvmType::object()
                }
                b'+' | b'-' => {
                    self.pos += 1;
                    self.parse_type()?
                }
                _ => self.parse_type()?,
            };
            args.push(arg);
        }
        Some(args)
    }

    fn parse_type_params(&mut self) -> Option<Vec<TypeParam>> {
        let mut params = Vec::new();
        if !self.eat(b'<') {
            return Some(params);
        }
        while !self.eat(b'>') {
            let name = self.identifier(b":")?;
            let mut bound = None;
            // class bound may be empty, interface bounds follow with extra ':'
            while self.eat(b':') {
                if matches!(self.peek(), Some(b':')) {
                    continue;
                }
                let ty = self.parse_type()?;
                bound.get_or_insert(ty);
            }
            params.push(TypeParam {
                name,
                bound: bound.unwrap_or_else(JvmType::object),
            });
        }
        Some(params)
    }

    fn parse_method_shape(&mut self) -> Option<(Vec<JvmType>, JvmType)> {
        if !self.eat(b'(') {
            return None;
        }
        let mut params = Vec::new();
        while !self.eat(b')') {
            params.push(self.parse_type()?);
        }
        let ret = self.parse_type()?;
        Some((params, ret))
    }
}
