// src/core/routes/params.rs
//! Request parameter extraction.
//!
//! A handler declares its inputs by calling accessors on the request context
//! (`ctx.query("q")`, `ctx.body(Person.class)`) and converting the result
//! (`.intValue(10)`, `.toOptional(Integer.class)`). Both halves are read back
//! from the instruction stream.

use tracing::debug;

use super::handler::HandlerBody;
use super::{DefaultValue, ParameterDescriptor, ParameterOrigin, RequestBody};
use crate::core::classfile::{ConstValue, FieldOp, Insn, InsnKind, MemberRef, MethodModel};
use crate::core::cursor::Cursor;
use crate::core::matcher::matches;
use crate::core::session::AnalysisSession;
use crate::core::types::{JvmType, MethodType, Primitive};

const CONVERSIONS: [&str; 9] = [
    "value",
    "valueOrNull",
    "to",
    "toEnum",
    "toList",
    "toSet",
    "toOptional",
    "toMap",
    "toMultimap",
];

const MULTI_VALUED: [&str; 4] = ["toList", "toSet", "toMap", "toMultimap"];

/// Parameters and request body read by one handler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedParameters {
    pub parameters: Vec<ParameterDescriptor>,
    pub body: Option<RequestBody>,
}

impl ExtractedParameters {
    fn add(&mut self, parameter: ParameterDescriptor) {
        if parameter.origin == ParameterOrigin::Body {
            if self.body.is_none() {
                self.body = Some(RequestBody {
                    type_name: parameter.type_name,
                    required: parameter.required,
                });
            }
            return;
        }
        let duplicate = self
            .parameters
            .iter()
            .any(|p| p.name == parameter.name && p.origin == parameter.origin);
        if !duplicate {
            self.parameters.push(parameter);
        }
    }
}

/// Decoded conversion call
#[derive(Debug, Clone, PartialEq)]
struct Conversion {
    ty: JvmType,
    required: bool,
    multi: bool,
    default: Option<DefaultValue>,
}

pub fn extract_parameters(session: &AnalysisSession<'_>, body: &HandlerBody) -> ExtractedParameters {
    let method = body.method();
    let mut extracted = ExtractedParameters::default();

    for (index, insn) in method.instructions.iter().enumerate() {
        let Some(origin) = accessor_origin(session, insn) else {
            continue;
        };
        let Some((_, call)) = insn.as_invoke() else {
            continue;
        };
        let Some(shape) = MethodType::from_descriptor(&call.descriptor) else {
            continue;
        };

        let parameter = match shape.params.as_slice() {
            [p] if p.is_class("java.lang.String") => named(session, method, index, origin),
            [p] if p.is_class("java.lang.Class") => typed(method, index, origin),
            [] => bare(session, method, index, origin, &shape.ret),
            _ => None,
        };
        match parameter {
            Some(parameter) => extracted.add(parameter),
            None => debug!("Unrecognized {} accessor at offset {} of {}", call.name, insn.offset, method.name),
        }
    }
    extracted
}

fn accessor_origin(session: &AnalysisSession<'_>, insn: &Insn) -> Option<ParameterOrigin> {
    let (_, call) = insn.as_invoke()?;
    if !session.is_context_type(&call.owner) {
        return None;
    }
    ParameterOrigin::from_accessor(&call.name)
}

/// `ctx.query("name")` followed by a conversion
fn named(
    session: &AnalysisSession<'_>,
    method: &MethodModel,
    index: usize,
    origin: ParameterOrigin,
) -> Option<ParameterDescriptor> {
    let (_, previous) = Cursor::at(method, index).previous_meaningful()?;
    let name = previous.as_string_const()?.to_string();
    let conversion = find_conversion(session, method, index).and_then(|c| decode_conversion(method, c))?;
    Some(ParameterDescriptor {
        name,
        origin,
        type_name: conversion.ty.to_string(),
        multi: conversion.multi,
        required: conversion.required,
        default: conversion.default,
    })
}

/// `ctx.query(Filter.class)`: the whole source bound to one type
fn typed(method: &MethodModel, index: usize, origin: ParameterOrigin) -> Option<ParameterDescriptor> {
    let (_, previous) = Cursor::at(method, index).previous_meaningful()?;
    let ty = JvmType::from_internal_name(previous.as_class_const()?);
    Some(bound_object(ty, origin))
}

fn bound_object(ty: JvmType, origin: ParameterOrigin) -> ParameterDescriptor {
    ParameterDescriptor {
        name: ty.simple_name(),
        origin,
        type_name: ty.to_string(),
        multi: true,
        required: true,
        default: None,
    }
}

/// `ctx.body()`, `ctx.query()`, `ctx.form()` and what follows them
fn bare(
    session: &AnalysisSession<'_>,
    method: &MethodModel,
    index: usize,
    origin: ParameterOrigin,
    accessor_type: &JvmType,
) -> Option<ParameterDescriptor> {
    if origin == ParameterOrigin::Body {
        let conversion = find_conversion(session, method, index).and_then(|c| decode_conversion(method, c));
        let (ty, required) = match conversion {
            Some(c) => (c.ty, c.required),
            None => (accessor_type.clone(), true),
        };
        return Some(ParameterDescriptor {
            name: "body".to_string(),
            origin,
            type_name: ty.to_string(),
            multi: false,
            required,
            default: None,
        });
    }

    // ctx.query().get("q") reads one value; ctx.query().to(Filter.class) binds all
    let (next, call) = Cursor::at(method, index)
        .successors()
        .take_while(|(_, insn)| accessor_origin(session, insn).is_none())
        .find_map(|(i, insn)| insn.as_invoke().map(|(_, call)| (i, call)))?;
    if matches(&session.cache, call, Some("get"), &["java.lang.String"]) {
        return named(session, method, next, origin);
    }
    if matches(&session.cache, call, Some("to"), &["java.lang.Class"]) {
        return typed(method, next, origin);
    }
    None
}

/// First conversion call after `accessor` and before the next accessor
fn find_conversion(session: &AnalysisSession<'_>, method: &MethodModel, accessor: usize) -> Option<usize> {
    Cursor::at(method, accessor)
        .successors()
        .take_while(|(_, insn)| accessor_origin(session, insn).is_none())
        .find(|(_, insn)| {
            insn.as_invoke()
                .is_some_and(|(_, call)| !session.is_context_type(&call.owner) && is_conversion(call))
        })
        .map(|(i, _)| i)
}

fn is_conversion(call: &MemberRef) -> bool {
    call.owner.starts_with("io/jooby/")
        && (CONVERSIONS.contains(&call.name.as_str()) || call.name.ends_with("Value"))
}

fn decode_conversion(method: &MethodModel, index: usize) -> Option<Conversion> {
    let (_, call) = method.instructions.get(index)?.as_invoke()?;
    let shape = MethodType::from_descriptor(&call.descriptor)?;
    let name = call.name.as_str();
    let operand = Cursor::at(method, index).previous_meaningful();
    let type_operand = operand
        .and_then(|(_, insn)| insn.as_class_const())
        .filter(|_| shape.params.first().is_some_and(|p| p.is_class("java.lang.Class")))
        .map(JvmType::from_internal_name);
    let element = || type_operand.clone().unwrap_or_else(JvmType::string);

    let ty = match name {
        "to" => type_operand.clone().unwrap_or_else(|| shape.ret.clone()),
        "toOptional" => JvmType::generic("java.util.Optional", vec![element()]),
        "toList" => JvmType::generic("java.util.List", vec![element()]),
        "toSet" => JvmType::generic("java.util.Set", vec![element()]),
        "toMap" => JvmType::generic("java.util.Map", vec![JvmType::string(), JvmType::string()]),
        "toMultimap" => JvmType::generic(
            "java.util.Map",
            vec![JvmType::string(), JvmType::generic("java.util.List", vec![JvmType::string()])],
        ),
        "toEnum" => operand
            .and_then(|(_, insn)| enum_reference(insn))
            .unwrap_or_else(|| shape.ret.clone()),
        _ => shape.ret.clone(),
    };

    let multi = MULTI_VALUED.contains(&name);
    let default_param = shape
        .params
        .last()
        .filter(|p| !p.is_class("java.lang.Class") && !p.is_class("java.util.function.Function"));

    let (required, default) = match default_param {
        Some(param) => (false, operand.and_then(|(i, _)| decode_default(method, i, param))),
        None if name == "toOptional" => (false, or_else_default(method, index)),
        None if name == "valueOrNull" || multi => (false, None),
        None => (true, None),
    };

    Some(Conversion {
        ty,
        required,
        multi,
        default,
    })
}

/// Enum type behind `toEnum(Color::valueOf)`
fn enum_reference(insn: &Insn) -> Option<JvmType> {
    let InsnKind::InvokeDynamic(call) = &insn.kind else {
        return None;
    };
    let handle = call.lambda_target()?;
    Some(JvmType::from_internal_name(&handle.member.owner))
}

/// `toOptional(...).orElse(c)`: accepted only when the constant load sits
/// directly between the conversion and `orElse`, optionally boxed.
fn or_else_default(method: &MethodModel, conversion: usize) -> Option<DefaultValue> {
    let mut following = Cursor::at(method, conversion).meaningful_successors();
    let (value, _) = following.next()?;
    let (_, mut next) = following.next()?;
    if next.as_invoke().is_some_and(|(_, call)| is_boxing(call)) {
        next = following.next()?.1;
    }
    let (_, call) = next.as_invoke()?;
    if call.owner != "java/util/Optional" || call.name != "orElse" {
        return None;
    }
    decode_default(method, value, &JvmType::object())
}

fn is_boxing(call: &MemberRef) -> bool {
    call.name == "valueOf" && call.owner.starts_with("java/lang/")
}

/// Literal pushed by the instruction at `index`; `expected` disambiguates
/// `iconst_0/1` between integers and booleans.
fn decode_default(method: &MethodModel, index: usize, expected: &JvmType) -> Option<DefaultValue> {
    let insn = method.instructions.get(index)?;
    let boolean = matches!(expected, JvmType::Primitive(Primitive::Boolean)) || expected.is_class("java.lang.Boolean");
    Some(match &insn.kind {
        InsnKind::Const(ConstValue::String(s)) => DefaultValue::String(s.clone()),
        InsnKind::Const(ConstValue::Class(c)) => DefaultValue::Class(JvmType::from_internal_name(c).to_string()),
        InsnKind::Const(ConstValue::Int(v)) if boolean => DefaultValue::Boolean(*v != 0),
        InsnKind::Const(ConstValue::Int(v)) => DefaultValue::Integer(*v as i64),
        InsnKind::Const(ConstValue::Long(v)) => DefaultValue::Integer(*v),
        InsnKind::Const(ConstValue::Float(v)) => DefaultValue::Float(*v as f64),
        InsnKind::Const(ConstValue::Double(v)) => DefaultValue::Float(*v),
        InsnKind::Field {
            op: FieldOp::GetStatic,
            field,
        } => {
            if field.owner == "java/lang/Boolean" && (field.name == "TRUE" || field.name == "FALSE") {
                DefaultValue::Boolean(field.name == "TRUE")
            } else if field.descriptor == format!("L{};", field.owner) {
                DefaultValue::Enum(field.name.clone())
            } else {
                return None;
            }
        }
        InsnKind::Invoke { method: call, .. } if is_boxing(call) => {
            let shape = MethodType::from_descriptor(&call.descriptor)?;
            let (previous, _) = Cursor::at(method, index).previous_meaningful()?;
            return decode_default(method, previous, shape.params.first()?);
        }
        _ => return None,
    })
}
