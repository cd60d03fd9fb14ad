// src/core/routes/mvc.rs
//! Annotated controllers registered with `mvc(...)`.
//!
//! Routes come straight from declared metadata: verb and path annotations on
//! the method, the class-level `@Path` prefix, parameter annotations and the
//! declared return type. No instruction scanning is needed.

use tracing::{debug, warn};

use super::{
    add_path_variables, join_path, operation_id, DefaultValue, HandlerRef, HttpVerb, ParameterDescriptor,
    ParameterOrigin, RequestBody, ResponseTypeSet, RouteDescriptor,
};
use crate::core::classfile::{Annotation, ClassModel, MethodModel};
use crate::core::routes::returns::unwrap_async;
use crate::core::session::AnalysisSession;
use crate::core::types::{internal, JvmType};

const ANNOTATION_PACKAGES: [&str; 4] = [
    "io/jooby/annotation/",
    "io/jooby/annotations/",
    "javax/ws/rs/",
    "jakarta/ws/rs/",
];

const CONTINUATION: &str = "kotlin.coroutines.Continuation";

/// Routes of one controller mounted under `prefix`
pub fn controller_routes(session: &AnalysisSession<'_>, controller: &str, prefix: &str) -> Vec<RouteDescriptor> {
    let Some(class) = controller_class(session, controller) else {
        warn!("Controller {} is not in the analyzed classes", controller);
        return Vec::new();
    };
    debug!("Reading controller {}", class.dotted_name());

    let class_paths = paths_or_root(annotation(&class.annotations, "Path").map(|a| a.strings("value")));
    let class_produces = media_types(&class.annotations, None, "Produces", "produces");
    let class_consumes = media_types(&class.annotations, None, "Consumes", "consumes");

    let mut routes = Vec::new();
    for method in &class.methods {
        if method.is_synthetic() || method.is_bridge() || method.is_constructor() {
            continue;
        }
        for verb_annotation in method.annotations.iter().filter(|a| is_framework(a)) {
            let Some(verb) = HttpVerb::parse(verb_annotation.simple_name()) else {
                continue;
            };
            let mut method_paths = verb_annotation.strings("value");
            method_paths.extend(verb_annotation.strings("path"));
            if method_paths.is_empty() {
                method_paths = paths_or_root(annotation(&method.annotations, "Path").map(|a| a.strings("value")));
            }

            let produces = media_types(&method.annotations, Some(verb_annotation), "Produces", "produces");
            let consumes = media_types(&method.annotations, Some(verb_annotation), "Consumes", "consumes");
            let (parameters, request_body) = declared_parameters(session, method);
            let responses = declared_responses(session, method);
            let handler = HandlerRef {
                owner: class.dotted_name(),
                method: method.name.clone(),
                descriptor: method.descriptor.clone(),
                synthetic: false,
            };

            for class_path in &class_paths {
                for method_path in &method_paths {
                    let path = join_path(&join_path(prefix, class_path), method_path);
                    let mut route = RouteDescriptor {
                        verb: Some(verb),
                        operation_id: operation_id(Some(verb), &path, &handler),
                        path,
                        parameters: parameters.clone(),
                        request_body: request_body.clone(),
                        responses: responses.clone(),
                        produces: if produces.is_empty() { class_produces.clone() } else { produces.clone() },
                        consumes: if consumes.is_empty() { class_consumes.clone() } else { consumes.clone() },
                        handler: handler.clone(),
                    };
                    if session.settings.declare_path_variables {
                        add_path_variables(&mut route);
                    }
                    routes.push(route);
                }
            }
        }
    }
    routes
}

/// The annotated controller; generated `Foo_` extensions map back to `Foo`
fn controller_class(session: &AnalysisSession<'_>, controller: &str) -> Option<std::rc::Rc<ClassModel>> {
    let name = internal(controller);
    if let Some(source) = name.strip_suffix('_') {
        if let Some(class) = session.cache.try_model(source) {
            return Some(class);
        }
    }
    session.cache.try_model(&name)
}

fn is_framework(annotation: &Annotation) -> bool {
    ANNOTATION_PACKAGES
        .iter()
        .any(|p| annotation.type_name.starts_with(p))
}

fn annotation<'a>(annotations: &'a [Annotation], simple: &str) -> Option<&'a Annotation> {
    annotations
        .iter()
        .find(|a| is_framework(a) && a.simple_name() == simple)
}

fn paths_or_root(paths: Option<Vec<String>>) -> Vec<String> {
    match paths {
        Some(paths) if !paths.is_empty() => paths,
        _ => vec![String::new()],
    }
}

/// Media types from the verb annotation element, else the standalone annotation
fn media_types(annotations: &[Annotation], verb: Option<&Annotation>, standalone: &str, element: &str) -> Vec<String> {
    let inline = verb.map(|a| a.strings(element)).unwrap_or_default();
    if !inline.is_empty() {
        return inline;
    }
    annotation(annotations, standalone)
        .map(|a| a.strings("value"))
        .unwrap_or_default()
}

fn parameter_origin(annotation: &Annotation) -> Option<ParameterOrigin> {
    if !is_framework(annotation) {
        return None;
    }
    Some(match annotation.simple_name() {
        "PathParam" => ParameterOrigin::Path,
        "QueryParam" => ParameterOrigin::Query,
        "FormParam" => ParameterOrigin::Form,
        "HeaderParam" => ParameterOrigin::Header,
        "CookieParam" => ParameterOrigin::Cookie,
        "ContextParam" => ParameterOrigin::Context,
        _ => return None,
    })
}

fn declared_parameters(
    session: &AnalysisSession<'_>,
    method: &MethodModel,
) -> (Vec<ParameterDescriptor>, Option<RequestBody>) {
    let mut parameters = Vec::new();
    let mut body = None;
    let Some(shape) = method.method_type() else {
        return (parameters, body);
    };
    let bounds = shape.bounds();

    for (i, declared) in shape.params.iter().enumerate() {
        let ty = declared.erase_vars(&bounds);
        let raw = ty.raw_name();
        if raw == CONTINUATION {
            continue;
        }
        let annotations = method.parameter_annotations(i);
        let nullable = annotations.iter().any(|a| a.simple_name() == "Nullable");
        let default = annotation(annotations, "DefaultValue")
            .and_then(|a| a.strings("value").into_iter().next())
            .map(DefaultValue::String);
        let optional = raw == "java.util.Optional";

        let Some((origin, source)) = annotations
            .iter()
            .find_map(|a| parameter_origin(a).map(|origin| (origin, a)))
        else {
            if session.is_context_type(&internal(&raw)) {
                continue;
            }
            if body.is_none() {
                body = Some(RequestBody {
                    type_name: ty.to_string(),
                    required: !nullable && !optional,
                });
            }
            continue;
        };

        let name = source
            .strings("value")
            .into_iter()
            .chain(source.strings("name"))
            .find(|n| !n.is_empty())
            .or_else(|| method.parameter_names.get(i).cloned())
            .unwrap_or_else(|| format!("arg{}", i));
        parameters.push(ParameterDescriptor {
            name,
            origin,
            multi: is_multi(&ty),
            required: !nullable && !optional && default.is_none(),
            type_name: ty.to_string(),
            default,
        });
    }
    (parameters, body)
}

fn is_multi(ty: &JvmType) -> bool {
    matches!(ty, JvmType::Array(_))
        || ["java.util.List", "java.util.Set", "java.util.Collection"]
            .iter()
            .any(|n| ty.is_class(n))
}

/// Declared return type; a `suspend` function's comes from its continuation
fn declared_responses(session: &AnalysisSession<'_>, method: &MethodModel) -> ResponseTypeSet {
    let Some(shape) = method.method_type() else {
        return ResponseTypeSet::new();
    };
    let bounds = shape.bounds();
    let suspended = shape
        .params
        .last()
        .filter(|p| p.is_class(CONTINUATION))
        .and_then(|p| p.args().first().cloned());
    let ret = suspended.unwrap_or(shape.ret).erase_vars(&bounds);
    std::iter::once(unwrap_async(session, ret).to_string()).collect()
}
