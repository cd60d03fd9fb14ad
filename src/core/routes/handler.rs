// src/core/routes/handler.rs
//! Resolution of a handler argument to the method body implementing it.

use std::rc::Rc;

use tracing::debug;

use super::HandlerRef;
use crate::core::classfile::{ClassModel, ConstValue, FieldOp, InsnKind, MethodModel, ValueKind};
use crate::core::cursor::Cursor;
use crate::core::matcher::find_method;
use crate::core::session::AnalysisSession;
use crate::core::types::{dotted, JvmType};

const MAX_ALIAS_DEPTH: usize = 8;

/// Preferred single-abstract-method implementations, best first
const SAM_NAMES: [&str; 6] = ["invokeSuspend", "apply", "invoke", "run", "handle", "get"];

const LAMBDA_BASES: [&str; 3] = [
    "kotlin/jvm/internal/Lambda",
    "kotlin/coroutines/jvm/internal/SuspendLambda",
    "kotlin/coroutines/jvm/internal/RestrictedSuspendLambda",
];

/// What a handler-valued expression refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A concrete method: lambda body or method reference
    Method {
        owner: String,
        name: String,
        descriptor: String,
    },
    /// An object of a type whose single abstract method is the body
    Instance(String),
}

/// Method body implementing a route
#[derive(Debug, Clone)]
pub enum HandlerBody {
    Resolved { class: Rc<ClassModel>, index: usize },
    /// The implementation is outside the analyzed module
    Placeholder {
        owner: String,
        method: MethodModel,
        synthetic: bool,
    },
}

impl HandlerBody {
    pub fn method(&self) -> &MethodModel {
        match self {
            HandlerBody::Resolved { class, index } => &class.methods[*index],
            HandlerBody::Placeholder { method, .. } => method,
        }
    }

    /// Internal name of the declaring type
    pub fn owner(&self) -> &str {
        match self {
            HandlerBody::Resolved { class, .. } => &class.name,
            HandlerBody::Placeholder { owner, .. } => owner,
        }
    }

    pub fn class(&self) -> Option<&Rc<ClassModel>> {
        match self {
            HandlerBody::Resolved { class, .. } => Some(class),
            HandlerBody::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, HandlerBody::Placeholder { .. })
    }

    pub fn handler_ref(&self) -> HandlerRef {
        let method = self.method();
        let synthetic = match self {
            HandlerBody::Resolved { class, .. } => {
                method.is_synthetic() || method.name.contains('$') || is_lambda_class(class)
            }
            HandlerBody::Placeholder { synthetic, .. } => *synthetic,
        };
        HandlerRef {
            owner: dotted(self.owner()),
            method: method.name.clone(),
            descriptor: method.descriptor.clone(),
            synthetic,
        }
    }
}

pub fn is_lambda_class(class: &ClassModel) -> bool {
    class
        .super_name
        .as_deref()
        .is_some_and(|s| LAMBDA_BASES.contains(&s))
}

/// Target of the value consumed last by the call at `call_index`
pub fn resolve_argument(session: &AnalysisSession<'_>, method: &MethodModel, call_index: usize) -> Option<Target> {
    let (index, _) = Cursor::at(method, call_index).previous_meaningful()?;
    resolve_value(session, method, index, 0)
}

/// Target of the value produced by the instruction at `index`
pub fn resolve_value(session: &AnalysisSession<'_>, method: &MethodModel, index: usize, depth: usize) -> Option<Target> {
    if depth > MAX_ALIAS_DEPTH {
        return None;
    }
    let insn = method.instructions.get(index)?;
    match &insn.kind {
        InsnKind::InvokeDynamic(call) => {
            let handle = call.lambda_target()?;
            if handle.is_constructor() {
                Some(Target::Instance(handle.member.owner.clone()))
            } else {
                Some(Target::Method {
                    owner: handle.member.owner.clone(),
                    name: handle.member.name.clone(),
                    descriptor: handle.member.descriptor.clone(),
                })
            }
        }
        InsnKind::Invoke { method: call, .. } if call.is_constructor() => Some(Target::Instance(call.owner.clone())),
        InsnKind::Invoke { method: call, .. } => {
            // factory method returning a module type
            let ret = JvmType::from_descriptor(call.descriptor.rsplit(')').next()?)?;
            let name = ret.internal_name()?;
            let class = session.cache.try_model(&name)?;
            (!class.is_interface()).then(|| Target::Instance(name))
        }
        InsnKind::Field {
            op: FieldOp::GetStatic | FieldOp::GetField,
            field,
        } => {
            if field.name == "INSTANCE" {
                return Some(Target::Instance(field.owner.clone()));
            }
            let ty = JvmType::from_descriptor(&field.descriptor)?;
            let name = ty.internal_name()?;
            session.cache.try_model(&name).map(|_| Target::Instance(name))
        }
        InsnKind::Const(ConstValue::Class(name)) => Some(Target::Instance(name.clone())),
        InsnKind::CheckCast(_) => {
            let (previous, _) = Cursor::at(method, index).previous_meaningful()?;
            resolve_value(session, method, previous, depth + 1)
        }
        InsnKind::Load {
            kind: ValueKind::Reference,
            var,
        } => {
            let (store, _) = defining_store(method, index, *var)?;
            let (value, _) = Cursor::at(method, store).previous_meaningful()?;
            resolve_value(session, method, value, depth + 1)
        }
        _ => None,
    }
}

/// Nearest store into `var` before `index`
pub fn defining_store(method: &MethodModel, index: usize, var: u16) -> Option<(usize, ValueKind)> {
    Cursor::at(method, index).predecessors().find_map(|(i, insn)| match insn.kind {
        InsnKind::Store { kind, var: v } if v == var => Some((i, kind)),
        _ => None,
    })
}

/// Index of the single-abstract-method implementation of a handler type
pub fn sam_method(class: &ClassModel) -> Option<usize> {
    let candidates: Vec<usize> = class
        .methods
        .iter()
        .enumerate()
        .filter(|(_, m)| {
            !m.is_static()
                && !m.is_bridge()
                && !m.is_constructor()
                && !m.is_abstract()
                && !m.instructions.is_empty()
        })
        .map(|(i, _)| i)
        .collect();

    for name in SAM_NAMES {
        if let Some(i) = candidates.iter().copied().find(|i| class.methods[*i].name == name) {
            return Some(i);
        }
    }
    match candidates.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

/// Body for a resolved target; targets outside the module become placeholders
pub fn resolve_body(session: &AnalysisSession<'_>, target: &Target) -> HandlerBody {
    match target {
        Target::Method {
            owner,
            name,
            descriptor,
        } => match find_method(&session.cache, owner, name, descriptor) {
            Some((class, index)) if !class.methods[index].instructions.is_empty() => {
                HandlerBody::Resolved { class, index }
            }
            _ => {
                debug!("Handler {}.{} is outside the module", dotted(owner), name);
                HandlerBody::Placeholder {
                    owner: owner.clone(),
                    method: MethodModel::placeholder(name, descriptor),
                    synthetic: name.starts_with("lambda$"),
                }
            }
        },
        Target::Instance(type_name) => {
            let resolved = session
                .cache
                .try_model(type_name)
                .and_then(|class| sam_method(&class).map(|index| HandlerBody::Resolved { class, index }));
            resolved.unwrap_or_else(|| {
                debug!("No handler method found on {}", dotted(type_name));
                opaque_placeholder(type_name)
            })
        }
    }
}

/// Placeholder for a handler value nothing is known about
pub fn opaque_placeholder(owner: &str) -> HandlerBody {
    HandlerBody::Placeholder {
        owner: owner.to_string(),
        method: MethodModel::placeholder("apply", "(Lio/jooby/Context;)Ljava/lang/Object;"),
        synthetic: true,
    }
}
