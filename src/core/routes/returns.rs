// src/core/routes/returns.rs
//! Response type inference.
//!
//! Every return site of a handler body is classified by the instruction that
//! produced the returned value. Async and reactive wrappers are unwrapped once.

use std::collections::HashMap;

use tracing::debug;

use super::handler::{self, HandlerBody, Target};
use super::ResponseTypeSet;
use crate::core::classfile::{ClassModel, ConstValue, FieldOp, InsnKind, MemberRef, MethodModel, ValueKind};
use crate::core::cursor::Cursor;
use crate::core::matcher::callee_type;
use crate::core::session::AnalysisSession;
use crate::core::types::{JvmType, MethodType, Primitive};

const MAX_DEPTH: usize = 6;

/// Suspension marker returned by compiled coroutines
const COROUTINE_INTRINSICS: &str = "kotlin/coroutines/intrinsics/IntrinsicsKt";

pub fn infer_responses(session: &AnalysisSession<'_>, body: &HandlerBody) -> ResponseTypeSet {
    return_types(session, body.method(), 0)
        .into_iter()
        .map(|ty| unwrap_async(session, ty).to_string())
        .collect()
}

/// Discards one known async wrapper; a raw wrapper degrades to `Object`.
pub fn unwrap_async(session: &AnalysisSession<'_>, ty: JvmType) -> JvmType {
    match ty {
        JvmType::Class { name, mut args } if session.is_async_wrapper(&name) => match args.len() {
            0 => JvmType::object(),
            1 => args.remove(0),
            _ => JvmType::Class { name, args },
        },
        other => other,
    }
}

/// Distinct types reaching the return sites of `method`, first appearance first
fn return_types(session: &AnalysisSession<'_>, method: &MethodModel, depth: usize) -> Vec<JvmType> {
    let mut types: Vec<JvmType> = Vec::new();
    for (index, insn) in method.instructions.iter().enumerate() {
        let InsnKind::Return(kind) = &insn.kind else {
            continue;
        };
        let inferred = match kind {
            None => Some(declared_return(method)),
            Some(_) => match Cursor::at(method, index).previous_meaningful() {
                Some((producer, _)) => value_type(session, method, producer, depth),
                None => Some(declared_return(method)),
            },
        };
        match inferred {
            Some(ty) if !types.contains(&ty) => types.push(ty),
            Some(_) => {}
            None => debug!("Return at offset {} of {} is opaque", insn.offset, method.name),
        }
    }
    types
}

fn declared_return(method: &MethodModel) -> JvmType {
    method.return_type().unwrap_or_else(JvmType::void)
}

/// Static type of the value pushed by the instruction at `index`
fn value_type(session: &AnalysisSession<'_>, method: &MethodModel, index: usize, depth: usize) -> Option<JvmType> {
    if depth > MAX_DEPTH {
        return None;
    }
    let insn = method.instructions.get(index)?;
    match &insn.kind {
        InsnKind::Invoke { method: call, .. } if call.is_constructor() => Some(JvmType::from_internal_name(&call.owner)),
        InsnKind::Invoke { method: call, .. } => call_type(session, method, index, call, depth),
        InsnKind::InvokeDynamic(call) => MethodType::from_descriptor(&call.descriptor).map(|m| m.ret),
        InsnKind::Const(value) => const_type(value),
        InsnKind::Load { kind, var } => local_type(session, method, index, *kind, *var, depth),
        InsnKind::ArrayStore(_) => Cursor::at(method, index).predecessors().find_map(|(_, p)| match &p.kind {
            InsnKind::NewArray(element) => Some(JvmType::array_of(element.clone())),
            _ => None,
        }),
        InsnKind::NewArray(element) => Some(JvmType::array_of(element.clone())),
        InsnKind::MultiNewArray { class, .. } | InsnKind::CheckCast(class) => Some(JvmType::from_internal_name(class)),
        InsnKind::Field {
            op: FieldOp::GetStatic | FieldOp::GetField,
            field,
        } => field_type(session, field),
        _ => None,
    }
}

fn call_type(
    session: &AnalysisSession<'_>,
    method: &MethodModel,
    index: usize,
    call: &MemberRef,
    depth: usize,
) -> Option<JvmType> {
    if call.owner == COROUTINE_INTRINSICS {
        return None;
    }
    let shape = callee_type(&session.cache, call)?;
    let mut vars = shape.bounds();
    if shape.ret.contains_type_vars() {
        vars.extend(argument_bindings(session, method, index, &shape, depth));
    }
    let ret = shape.ret.erase_vars(&vars);

    // CompletableFuture.supplyAsync(() -> ...) seen only through its descriptor
    if ret.args().is_empty() && session.is_async_wrapper(&ret.raw_name()) {
        let inner = Cursor::at(method, index)
            .previous_meaningful()
            .and_then(|(arg, _)| closure_result(session, method, arg, depth));
        if let Some(inner) = inner {
            return Some(JvmType::generic(ret.raw_name(), vec![inner]));
        }
    }
    Some(ret)
}

/// Binds the type variable of the call's last parameter from its argument:
/// a bare `T` takes the argument's type, `Supplier<T>` takes what the
/// closure argument returns.
fn argument_bindings(
    session: &AnalysisSession<'_>,
    method: &MethodModel,
    index: usize,
    shape: &MethodType,
    depth: usize,
) -> HashMap<String, JvmType> {
    let mut bindings = HashMap::new();
    let (Some(last), Some((arg, _))) = (shape.params.last(), Cursor::at(method, index).previous_meaningful()) else {
        return bindings;
    };
    match last {
        JvmType::TypeVar(var) => {
            if let Some(ty) = value_type(session, method, arg, depth + 1) {
                bindings.insert(var.clone(), boxed(ty));
            }
        }
        JvmType::Class { args, .. } => {
            if let Some(JvmType::TypeVar(var)) = args.last() {
                if let Some(ty) = closure_result(session, method, arg, depth) {
                    bindings.insert(var.clone(), ty);
                }
            }
        }
        _ => {}
    }
    bindings
}

/// First concrete type returned by the closure pushed at `index`
fn closure_result(session: &AnalysisSession<'_>, method: &MethodModel, index: usize, depth: usize) -> Option<JvmType> {
    if depth >= MAX_DEPTH {
        return None;
    }
    let target = closure_target(session, method, index)?;
    let body = handler::resolve_body(session, &target);
    return_types(session, body.method(), depth + 1)
        .into_iter()
        .find(|ty| !ty.is_void() && !ty.is_object())
        .map(boxed)
}

/// Target of a closure value: a lambda call site or a compiled lambda class
fn closure_target(session: &AnalysisSession<'_>, method: &MethodModel, index: usize) -> Option<Target> {
    let insn = method.instructions.get(index)?;
    if let InsnKind::InvokeDynamic(call) = &insn.kind {
        call.lambda_target()?;
        return handler::resolve_value(session, method, index, 0);
    }
    match handler::resolve_value(session, method, index, 0)? {
        Target::Instance(name) if lambda_class(session, &name).is_some() => Some(Target::Instance(name)),
        _ => None,
    }
}

fn lambda_class(session: &AnalysisSession<'_>, name: &str) -> Option<std::rc::Rc<ClassModel>> {
    session.cache.try_model(name).filter(|c| handler::is_lambda_class(c))
}

fn local_type(
    session: &AnalysisSession<'_>,
    method: &MethodModel,
    index: usize,
    kind: ValueKind,
    var: u16,
    depth: usize,
) -> Option<JvmType> {
    let offset = method.instructions.get(index)?.offset;
    let declared = method.local_at(var, offset).and_then(|l| l.declared_type());
    let stored = handler::defining_store(method, index, var)
        .and_then(|(store, _)| Cursor::at(method, store).previous_meaningful())
        .map(|(value, _)| value);

    match (declared, stored) {
        (Some(ty), Some(value)) if ty.is_object() => Some(widen_closure(session, method, value).unwrap_or(ty)),
        (Some(ty), _) => Some(ty),
        (None, Some(value)) => value_type(session, method, value, depth + 1).or_else(|| primitive(kind)),
        (None, None) => primitive(kind),
    }
}

/// More specific type for an `Object` local holding a closure
fn widen_closure(session: &AnalysisSession<'_>, method: &MethodModel, value: usize) -> Option<JvmType> {
    if let InsnKind::InvokeDynamic(call) = &method.instructions.get(value)?.kind {
        call.lambda_target()?;
        return MethodType::from_descriptor(&call.descriptor)
            .map(|m| m.ret)
            .filter(|ty| !ty.is_object());
    }
    let Target::Instance(name) = handler::resolve_value(session, method, value, 0)? else {
        return None;
    };
    let class = lambda_class(session, &name)?;
    let supertypes: Vec<JvmType> = match class.class_signature() {
        Some(sig) => std::iter::once(sig.superclass).chain(sig.interfaces).collect(),
        None => class
            .super_name
            .iter()
            .chain(class.interfaces.iter())
            .map(|n| JvmType::class(n.as_str()))
            .collect(),
    };
    supertypes
        .into_iter()
        .find(|ty| !ty.is_object() && !session.is_marker_interface(&ty.raw_name()))
}

fn field_type(session: &AnalysisSession<'_>, field: &MemberRef) -> Option<JvmType> {
    session
        .cache
        .try_model(&field.owner)
        .and_then(|class| class.field(&field.name).and_then(|f| f.field_type()))
        .or_else(|| JvmType::from_descriptor(&field.descriptor))
}

fn const_type(value: &ConstValue) -> Option<JvmType> {
    Some(match value {
        ConstValue::String(_) => JvmType::string(),
        ConstValue::Int(_) => JvmType::class("java.lang.Integer"),
        ConstValue::Long(_) => JvmType::class("java.lang.Long"),
        ConstValue::Float(_) => JvmType::class("java.lang.Float"),
        ConstValue::Double(_) => JvmType::class("java.lang.Double"),
        ConstValue::Class(name) => JvmType::from_internal_name(name),
        _ => return None,
    })
}

fn primitive(kind: ValueKind) -> Option<JvmType> {
    let p = match kind {
        ValueKind::Int => Primitive::Int,
        ValueKind::Long => Primitive::Long,
        ValueKind::Float => Primitive::Float,
        ValueKind::Double => Primitive::Double,
        ValueKind::Byte => Primitive::Byte,
        ValueKind::Char => Primitive::Char,
        ValueKind::Short => Primitive::Short,
        ValueKind::Reference => return None,
    };
    Some(JvmType::Primitive(p))
}

fn boxed(ty: JvmType) -> JvmType {
    match ty {
        JvmType::Primitive(p) => p.boxed().map(JvmType::class).unwrap_or_else(JvmType::object),
        other => other,
    }
}
