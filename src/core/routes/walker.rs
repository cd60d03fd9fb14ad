// src/core/routes/walker.rs
//! Route discovery.
//!
//! The entry router's methods are scanned for calls to the routing API.
//! Grouping blocks are walked in place under a longer prefix; mounted routers
//! are walked in a fresh scope so that a router mounted twice yields two
//! independent route sets. Every walk returns its own list, merged by the
//! caller.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::handler::{self, HandlerBody, Target};
use super::{add_path_variables, join_path, mvc, operation_id, params, returns, HttpVerb, RouteDescriptor};
use crate::core::classfile::{ClassModel, ConstValue, FieldOp, Insn, InsnKind, InvokeOp, MemberRef, MethodModel, StackOp};
use crate::core::cursor::Cursor;
use crate::core::matcher::callee_type;
use crate::core::session::{AnalysisSession, InsnId};
use crate::core::types::MethodType;
use crate::error::{Result, RouteLensError};

const STRING: &str = "java.lang.String";
const ROUTE: &str = "io.jooby.Route";
const ROUTE_OWNER: &str = "io/jooby/Route";
const MEDIA_TYPE: &str = "io/jooby/MediaType";

/// Application base classes whose constructor may take the route block
const ROUTER_BASES: [&str; 2] = ["io/jooby/Jooby", "io/jooby/kt/Kooby"];

const ROUTERS: [&str; 3] = ["io.jooby.Router", "io.jooby.Jooby", "io.jooby.kt.Kooby"];

const SUPPLIERS: [&str; 4] = [
    "java.util.function.Supplier",
    "io.jooby.SneakyThrows$Supplier",
    "kotlin.jvm.functions.Function0",
    "java.lang.Class",
];

const BLOCKS: [&str; 4] = [
    "java.lang.Runnable",
    "kotlin.jvm.functions.Function0",
    "kotlin.jvm.functions.Function1",
    "kotlin.jvm.functions.Function2",
];

/// Routing API calls, in classification order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Idiom {
    Verb(HttpVerb),
    Route,
    Mount { prefixed: bool },
    Group,
    Block,
    Mvc,
    Produces,
    Consumes,
}

/// Discover every route reachable from the session's entry router.
pub fn discover_routes(session: &mut AnalysisSession<'_>) -> Result<Vec<RouteDescriptor>> {
    let entry = session.entry.clone();
    let class = session.cache.model(&entry)?;
    info!("🔍 Walking routes of {}", class.dotted_name());

    session.enter_router(&entry);
    let routes = walk_router(session, &class, "");
    session.exit_router();

    let routes = routes?;
    info!("✅ Found {} routes", routes.len());
    Ok(routes)
}

fn walk_router(session: &mut AnalysisSession<'_>, class: &Rc<ClassModel>, prefix: &str) -> Result<Vec<RouteDescriptor>> {
    let mut routes = Vec::new();
    for index in walk_order(class) {
        routes.extend(walk_method(session, class, index, prefix)?);
    }
    Ok(routes)
}

/// Methods walked at the router's own prefix: constructors, static
/// initializer and `main` first, then the rest in declaration order.
/// Lambda bodies and method-reference targets are left out; they are
/// reached through the call that receives them, under that call's prefix.
fn walk_order(class: &ClassModel) -> Vec<usize> {
    let referenced: HashSet<(&str, &str)> = class
        .methods
        .iter()
        .flat_map(|m| m.instructions.iter())
        .filter_map(|insn| match &insn.kind {
            InsnKind::InvokeDynamic(call) => call.lambda_target(),
            _ => None,
        })
        .filter(|handle| handle.member.owner == class.name && !handle.is_constructor())
        .map(|handle| (handle.member.name.as_str(), handle.member.descriptor.as_str()))
        .collect();

    let (mut first, rest): (Vec<usize>, Vec<usize>) = class
        .methods
        .iter()
        .enumerate()
        .filter(|(_, m)| {
            !m.is_synthetic()
                && !m.is_bridge()
                && !m.name.starts_with("lambda$")
                && !referenced.contains(&(m.name.as_str(), m.descriptor.as_str()))
        })
        .map(|(i, _)| i)
        .partition(|i| matches!(class.methods[*i].name.as_str(), "<init>" | "<clinit>" | "main"));
    first.extend(rest);
    first
}

fn walk_method(
    session: &mut AnalysisSession<'_>,
    class: &Rc<ClassModel>,
    method_index: usize,
    prefix: &str,
) -> Result<Vec<RouteDescriptor>> {
    let method = &class.methods[method_index];
    let mut routes: Vec<RouteDescriptor> = Vec::new();
    let mut last_route: Option<usize> = None;

    for (index, insn) in method.instructions.iter().enumerate() {
        let Some((_, call)) = insn.as_invoke() else {
            continue;
        };
        let id = InsnId {
            owner: class.name.clone(),
            method: method_index,
            index,
        };
        if session.is_processed(&id) {
            continue;
        }
        let Some(idiom) = classify(session, call) else {
            continue;
        };
        session.mark_processed(id);
        debug!("{:?} at offset {} of {}.{}", idiom, insn.offset, class.dotted_name(), method.name);

        match idiom {
            Idiom::Verb(verb) => {
                let Some((_, pattern)) = recover_pattern(method, index) else {
                    missing_pattern(session, class, method, index, verb.as_str())?;
                    continue;
                };
                routes.push(build_route(session, class, method, index, Some(verb), &join_path(prefix, &pattern)));
                last_route = Some(routes.len() - 1);
            }
            Idiom::Route => {
                let Some((at, pattern)) = recover_pattern(method, index) else {
                    missing_pattern(session, class, method, index, "route")?;
                    continue;
                };
                let verb = string_before(method, at).and_then(|(_, v)| HttpVerb::parse(&v));
                routes.push(build_route(session, class, method, index, verb, &join_path(prefix, &pattern)));
                last_route = Some(routes.len() - 1);
            }
            Idiom::Group => {
                let Some((_, pattern)) = recover_pattern(method, index) else {
                    missing_pattern(session, class, method, index, "path")?;
                    continue;
                };
                routes.extend(walk_closure(session, method, index, &join_path(prefix, &pattern))?);
                last_route = None;
            }
            Idiom::Block => {
                routes.extend(walk_closure(session, method, index, prefix)?);
                last_route = None;
            }
            Idiom::Mount { prefixed } => {
                let nested = if prefixed {
                    match recover_pattern(method, index) {
                        Some((_, pattern)) => join_path(prefix, &pattern),
                        None => {
                            missing_pattern(session, class, method, index, &call.name)?;
                            continue;
                        }
                    }
                } else {
                    prefix.to_string()
                };
                routes.extend(mount(session, method, index, &nested)?);
                last_route = None;
            }
            Idiom::Mvc => {
                match controller_name(session, method, index) {
                    Some(controller) => routes.extend(mvc::controller_routes(session, &controller, prefix)),
                    None => debug!("mvc(...) argument at offset {} is not a known type", insn.offset),
                }
                last_route = None;
            }
            Idiom::Produces | Idiom::Consumes => {
                let Some(route) = last_route.and_then(|i| routes.get_mut(i)) else {
                    debug!("{} with no preceding route", call.name);
                    continue;
                };
                let target = if idiom == Idiom::Produces {
                    &mut route.produces
                } else {
                    &mut route.consumes
                };
                for media_type in media_types(method, index) {
                    if !target.contains(&media_type) {
                        target.push(media_type);
                    }
                }
            }
        }
    }
    Ok(routes)
}

fn classify(session: &AnalysisSession<'_>, call: &MemberRef) -> Option<Idiom> {
    let shape = callee_type(&session.cache, call)?;
    let bounds = shape.bounds();
    let params: Vec<String> = shape.params.iter().map(|p| p.erase_vars(&bounds).raw_name()).collect();
    let ret = shape.ret.raw_name();
    let params: Vec<&str> = params.iter().map(String::as_str).collect();

    if call.is_constructor() {
        let is_block = ROUTER_BASES.contains(&call.owner.as_str()) && matches!(params.as_slice(), [p] if BLOCKS.contains(p));
        return is_block.then_some(Idiom::Block);
    }

    let idiom = match (call.name.as_str(), params.as_slice()) {
        ("route", [STRING, STRING, _]) if ret == ROUTE => Idiom::Route,
        (name, [STRING, _]) if ret == ROUTE && HttpVerb::parse(name).is_some() => Idiom::Verb(HttpVerb::parse(name)?),
        ("use" | "mount" | "install", [router]) if is_mountable(router) => Idiom::Mount { prefixed: false },
        ("use" | "mount" | "install", [STRING, router]) if is_mountable(router) => Idiom::Mount { prefixed: true },
        ("runApp", ["java.lang.String[]", .., last]) if is_mountable(last) || BLOCKS.contains(last) => {
            Idiom::Mount { prefixed: false }
        }
        ("path", [STRING, block]) if BLOCKS.contains(block) => Idiom::Group,
        ("routes" | "coroutine", [block]) if BLOCKS.contains(block) => Idiom::Block,
        ("mvc", [_, ..]) => Idiom::Mvc,
        ("produces", _) if call.owner == ROUTE_OWNER => Idiom::Produces,
        ("consumes", _) if call.owner == ROUTE_OWNER => Idiom::Consumes,
        _ => return None,
    };
    Some(idiom)
}

fn is_mountable(param: &str) -> bool {
    ROUTERS.contains(&param) || SUPPLIERS.contains(&param)
}

/// Route for the handler argument of the call at `index`
fn build_route(
    session: &AnalysisSession<'_>,
    class: &ClassModel,
    method: &MethodModel,
    index: usize,
    verb: Option<HttpVerb>,
    path: &str,
) -> RouteDescriptor {
    let body = handler::resolve_argument(session, method, index)
        .map(|target| handler::resolve_body(session, &target))
        .unwrap_or_else(|| handler::opaque_placeholder(&class.name));
    let extracted = params::extract_parameters(session, &body);
    let handler = body.handler_ref();

    let mut route = RouteDescriptor {
        verb,
        path: path.to_string(),
        operation_id: operation_id(verb, path, &handler),
        parameters: extracted.parameters,
        request_body: extracted.body,
        responses: returns::infer_responses(session, &body),
        produces: Vec::new(),
        consumes: Vec::new(),
        handler,
    };
    if session.settings.declare_path_variables {
        add_path_variables(&mut route);
    }
    route
}

fn missing_pattern(
    session: &mut AnalysisSession<'_>,
    class: &ClassModel,
    method: &MethodModel,
    index: usize,
    verb: &str,
) -> Result<()> {
    let error = RouteLensError::PatternNotFound {
        owner: class.dotted_name(),
        method: method.name.clone(),
        verb: verb.to_string(),
        offset: method.instructions.get(index).map(|i| i.offset).unwrap_or_default(),
    };
    if session.settings.strict_patterns {
        return Err(error);
    }
    warn!("⚠️  Skipping route: {}", error);
    session.skip(&class.name, &method.name, error.to_string());
    Ok(())
}

/// Nearest string constant before the last argument of the call at `index`,
/// within the same statement
fn recover_pattern(method: &MethodModel, index: usize) -> Option<(usize, String)> {
    string_before(method, argument_start(method, index))
}

fn string_before(method: &MethodModel, index: usize) -> Option<(usize, String)> {
    Cursor::at(method, index)
        .meaningful_predecessors()
        .take_while(|(_, insn)| !insn.ends_statement())
        .find_map(|(i, insn)| insn.as_string_const().map(|s| (i, s.to_string())))
}

/// First instruction of the expression that leaves the last argument of the
/// call at `index` on the stack, found by walking back until exactly one
/// value is produced. Stops at the first instruction with no known stack
/// effect.
fn argument_start(method: &MethodModel, index: usize) -> usize {
    let mut needed: isize = 1;
    let mut start = index;
    for (i, insn) in Cursor::at(method, index).meaningful_predecessors() {
        let Some((pops, pushes)) = stack_effect(insn) else {
            break;
        };
        needed += pops as isize - pushes as isize;
        start = i;
        if needed <= 0 {
            break;
        }
    }
    start
}

/// Values popped and pushed by `insn`, counting one per value. Statement
/// ends and branches have none.
fn stack_effect(insn: &Insn) -> Option<(usize, usize)> {
    let arity = |descriptor: &str| MethodType::from_descriptor(descriptor).map(|m| (m.params.len(), !m.ret.is_void()));
    let effect = match &insn.kind {
        InsnKind::Const(_) | InsnKind::Load { .. } | InsnKind::New(_) => (0, 1),
        InsnKind::ArrayLoad(_) => (2, 1),
        InsnKind::Stack(StackOp::Dup) => (1, 2),
        InsnKind::Stack(StackOp::DupX1) => (2, 3),
        InsnKind::Stack(StackOp::Swap) => (2, 2),
        InsnKind::Field {
            op: FieldOp::GetStatic, ..
        } => (0, 1),
        InsnKind::Field {
            op: FieldOp::GetField, ..
        } => (1, 1),
        InsnKind::Invoke { op, method } => {
            let (params, returns) = arity(method.descriptor.as_str())?;
            let receiver = usize::from(*op != InvokeOp::Static);
            (params + receiver, usize::from(returns))
        }
        InsnKind::InvokeDynamic(call) => {
            let (params, returns) = arity(call.descriptor.as_str())?;
            (params, usize::from(returns))
        }
        InsnKind::NewArray(_) | InsnKind::CheckCast(_) | InsnKind::InstanceOf(_) | InsnKind::ArrayLength => (1, 1),
        InsnKind::MultiNewArray { dims, .. } => (usize::from(*dims), 1),
        _ => return None,
    };
    Some(effect)
}

/// Walks the body of the closure passed to the call at `index` in place
fn walk_closure(
    session: &mut AnalysisSession<'_>,
    method: &MethodModel,
    index: usize,
    prefix: &str,
) -> Result<Vec<RouteDescriptor>> {
    let Some(target) = handler::resolve_argument(session, method, index) else {
        debug!("Route block at offset {} could not be resolved", offset(method, index));
        return Ok(Vec::new());
    };
    match handler::resolve_body(session, &target) {
        HandlerBody::Resolved { class, index } => walk_method(session, &class, index, prefix),
        HandlerBody::Placeholder { owner, .. } => {
            debug!("Route block {} is outside the module", owner);
            Ok(Vec::new())
        }
    }
}

/// `use(router)`, `install(Sub::new)`, `runApp(args, App::new)` and friends
fn mount(
    session: &mut AnalysisSession<'_>,
    method: &MethodModel,
    index: usize,
    prefix: &str,
) -> Result<Vec<RouteDescriptor>> {
    let Some(target) = handler::resolve_argument(session, method, index) else {
        debug!("Mounted router at offset {} could not be resolved", offset(method, index));
        return Ok(Vec::new());
    };
    match &target {
        Target::Instance(name) => match session.cache.try_model(name) {
            Some(router) if handler::is_lambda_class(&router) => walk_closure(session, method, index, prefix),
            Some(router) => mount_router(session, &router, prefix),
            None => {
                debug!("Router {} is outside the module", name);
                Ok(Vec::new())
            }
        },
        Target::Method { .. } => {
            let HandlerBody::Resolved { class, index } = handler::resolve_body(session, &target) else {
                return Ok(Vec::new());
            };
            match constructed_router(session, &class.methods[index]) {
                Some(router) => mount_router(session, &router, prefix),
                None => walk_method(session, &class, index, prefix),
            }
        }
    }
}

fn mount_router(
    session: &mut AnalysisSession<'_>,
    router: &Rc<ClassModel>,
    prefix: &str,
) -> Result<Vec<RouteDescriptor>> {
    if !session.enter_router(&router.name) {
        return Ok(Vec::new());
    }
    debug!("Mounting {} at {}", router.dotted_name(), if prefix.is_empty() { "/" } else { prefix });
    let routes = session.with_fresh_scope(|s| walk_router(s, router, prefix));
    session.exit_router();
    routes
}

/// Router type a supplier body constructs and returns
fn constructed_router(session: &AnalysisSession<'_>, method: &MethodModel) -> Option<Rc<ClassModel>> {
    method.instructions.iter().enumerate().find_map(|(i, insn)| {
        if !insn.is_return() {
            return None;
        }
        let (_, previous) = Cursor::at(method, i).previous_meaningful()?;
        let (_, call) = previous.as_invoke()?;
        if !call.is_constructor() {
            return None;
        }
        session
            .cache
            .try_model(&call.owner)
            .filter(|c| !handler::is_lambda_class(c))
    })
}

/// Controller type given to `mvc(...)`
fn controller_name(session: &AnalysisSession<'_>, method: &MethodModel, index: usize) -> Option<String> {
    match handler::resolve_argument(session, method, index) {
        Some(Target::Instance(name)) => Some(name),
        // mvc(Controller.class, Controller::new)
        _ => Cursor::at(method, index)
            .meaningful_predecessors()
            .take_while(|(_, insn)| !insn.ends_statement())
            .find_map(|(_, insn)| insn.as_class_const().map(str::to_string)),
    }
}

/// Media types loaded for a `produces`/`consumes` call, in source order
fn media_types(method: &MethodModel, index: usize) -> Vec<String> {
    let mut found = Vec::new();
    for (_, insn) in Cursor::at(method, index).meaningful_predecessors() {
        match &insn.kind {
            InsnKind::Field {
                op: FieldOp::GetStatic,
                field,
            } if field.owner == MEDIA_TYPE => found.push(media_type_constant(&field.name)),
            InsnKind::Invoke { method: call, .. } if call.owner == MEDIA_TYPE && call.name == "valueOf" => {}
            InsnKind::Const(ConstValue::String(s)) => found.push(s.clone()),
            InsnKind::Invoke { .. } | InsnKind::InvokeDynamic(_) => break,
            _ if insn.ends_statement() => break,
            _ => {}
        }
    }
    found.reverse();
    found
}

fn media_type_constant(field: &str) -> String {
    match field {
        "json" => "application/json",
        "xml" => "application/xml",
        "text" => "text/plain",
        "html" => "text/html",
        "js" => "application/javascript",
        "css" => "text/css",
        "octetStream" => "application/octet-stream",
        "form" => "application/x-www-form-urlencoded",
        "multipart" => "multipart/form-data",
        "yaml" => "text/yaml",
        "all" => "*/*",
        other => other,
    }
    .to_string()
}

fn offset(method: &MethodModel, index: usize) -> u32 {
    method.instructions.get(index).map(|i| i.offset).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::core::classfile::opcodes::*;
    use crate::core::classfile::parse_class;
    use crate::core::classfile::testing::{AnnValue, ClassBuilder, MethodSpec, Op};
    use crate::core::classpath::MemorySource;
    use crate::core::routes::ParameterOrigin;

    const GET: &str = "(Ljava/lang/String;Lio/jooby/Route$Handler;)Lio/jooby/Route;";
    const HANDLER: &str = "(Lio/jooby/Context;)Ljava/lang/Object;";
    const INDY_HANDLER: &str = "()Lio/jooby/Route$Handler;";

    fn handler(owner: &'static str, name: &'static str) -> Op {
        Op::lambda("apply", INDY_HANDLER, HANDLER, owner, name, HANDLER)
    }

    fn get(owner: &'static str, path: &'static str, lambda: &'static str) -> Vec<Op> {
        vec![
            Op::Raw(ALOAD_0),
            Op::Ldc(path),
            handler(owner, lambda),
            Op::Invoke(INVOKEVIRTUAL, owner, "get", GET),
            Op::Raw(POP),
        ]
    }

    fn constructor(super_name: &'static str, body: Vec<Op>) -> MethodSpec {
        let mut ops = vec![Op::Raw(ALOAD_0), Op::Invoke(INVOKESPECIAL, super_name, "<init>", "()V")];
        ops.extend(body);
        ops.push(Op::Raw(RETURN));
        MethodSpec::new("<init>", "()V").ops(ops)
    }

    fn constant_handler(name: &str, value: &'static str) -> MethodSpec {
        MethodSpec::new(name, HANDLER)
            .access(0x100A)
            .ops(vec![Op::Ldc(value), Op::Raw(ARETURN)])
    }

    fn run(source: &MemorySource, settings: AnalysisConfig) -> (Result<Vec<RouteDescriptor>>, usize) {
        let mut session = AnalysisSession::new(source, "com/acme/App", settings);
        let routes = discover_routes(&mut session);
        (routes, session.skipped().len())
    }

    fn routes(source: &MemorySource) -> Vec<RouteDescriptor> {
        run(source, AnalysisConfig::default()).0.unwrap()
    }

    fn paths(routes: &[RouteDescriptor]) -> Vec<&str> {
        routes.iter().map(|r| r.path.as_str()).collect()
    }

    fn grouped_app() -> MemorySource {
        let mut body = get("com/acme/App", "/hello", "lambda$new$0");
        body.extend([
            Op::Raw(ALOAD_0),
            Op::Ldc("/api"),
            Op::Raw(ALOAD_0),
            Op::lambda_handle(
                7,
                "run",
                "(Lcom/acme/App;)Ljava/lang/Runnable;",
                "()V",
                "com/acme/App",
                "lambda$new$1",
                "()V",
            ),
            Op::Invoke(INVOKEVIRTUAL, "com/acme/App", "path", "(Ljava/lang/String;Ljava/lang/Runnable;)Lio/jooby/Route$Set;"),
            Op::Raw(POP),
        ]);
        let mut group = get("com/acme/App", "/people/{id}", "lambda$new$2");
        group.push(Op::Raw(RETURN));

        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", body))
            .method(constant_handler("lambda$new$0", "hi"))
            .method(MethodSpec::new("lambda$new$1", "()V").access(0x1002).ops(group))
            .method(constant_handler("lambda$new$2", "person"))
            .build();
        MemorySource::new().with("com/acme/App", app)
    }

    #[test]
    fn groups_join_prefixes() {
        let routes = routes(&grouped_app());
        assert_eq!(paths(&routes), vec!["/hello", "/api/people/{id}"]);
        assert_eq!(routes[0].verb, Some(HttpVerb::Get));
        assert_eq!(routes[0].responses.as_slice(), ["java.lang.String"]);
        assert_eq!(routes[0].operation_id, "getHello");

        let id = &routes[1].parameters[0];
        assert_eq!((id.name.as_str(), id.origin, id.required), ("id", ParameterOrigin::Path, true));
    }

    #[test]
    fn separate_sessions_agree() {
        let source = grouped_app();
        assert_eq!(routes(&source), routes(&source));
    }

    #[test]
    fn router_mounted_twice_yields_both_prefixes() {
        let sub_body = get("com/acme/Sub", "/x", "lambda$new$0");
        let sub = ClassBuilder::new("com/acme/Sub")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", sub_body))
            .method(constant_handler("lambda$new$0", "x"))
            .build();

        let use_sub = |prefix: &'static str| {
            vec![
                Op::Raw(ALOAD_0),
                Op::Ldc(prefix),
                Op::Type(NEW, "com/acme/Sub"),
                Op::Raw(DUP),
                Op::Invoke(INVOKESPECIAL, "com/acme/Sub", "<init>", "()V"),
                Op::Invoke(INVOKEVIRTUAL, "com/acme/App", "use", "(Ljava/lang/String;Lio/jooby/Router;)Lio/jooby/Jooby;"),
                Op::Raw(POP),
            ]
        };
        let mut body = use_sub("/sub");
        body.extend(use_sub("/other"));
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", body))
            .build();

        let source = MemorySource::new().with("com/acme/App", app).with("com/acme/Sub", sub);
        assert_eq!(paths(&routes(&source)), vec!["/sub/x", "/other/x"]);
    }

    #[test]
    fn self_mount_from_main_is_ignored() {
        let body = get("com/acme/App", "/", "lambda$new$0");
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", body))
            .method(constant_handler("lambda$new$0", "home"))
            .method(
                MethodSpec::new("main", "([Ljava/lang/String;)V").static_method().ops(vec![
                    Op::Var(ALOAD, 0),
                    Op::LdcClass("com/acme/App"),
                    Op::Invoke(INVOKESTATIC, "io/jooby/Jooby", "runApp", "([Ljava/lang/String;Ljava/lang/Class;)V"),
                    Op::Raw(RETURN),
                ]),
            )
            .build();
        let source = MemorySource::new().with("com/acme/App", app);
        assert_eq!(paths(&routes(&source)), vec!["/"]);
    }

    #[test]
    fn produces_and_consumes_patch_the_last_route() {
        let mut body = get("com/acme/App", "/doc", "lambda$new$0");
        body.pop();
        body.extend([
            Op::Raw(ICONST_1),
            Op::Type(ANEWARRAY, "io/jooby/MediaType"),
            Op::Raw(DUP),
            Op::Raw(ICONST_0),
            Op::Field(GETSTATIC, "io/jooby/MediaType", "json", "Lio/jooby/MediaType;"),
            Op::Raw(AASTORE),
            Op::Invoke(INVOKEINTERFACE, "io/jooby/Route", "produces", "([Lio/jooby/MediaType;)Lio/jooby/Route;"),
            Op::Ldc("application/yaml"),
            Op::Invoke(INVOKESTATIC, "io/jooby/MediaType", "valueOf", "(Ljava/lang/String;)Lio/jooby/MediaType;"),
            Op::Invoke(INVOKEINTERFACE, "io/jooby/Route", "consumes", "(Lio/jooby/MediaType;)Lio/jooby/Route;"),
            Op::Raw(POP),
        ]);
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", body))
            .method(constant_handler("lambda$new$0", "doc"))
            .build();
        let routes = routes(&MemorySource::new().with("com/acme/App", app));
        assert_eq!(routes[0].produces, vec!["application/json"]);
        assert_eq!(routes[0].consumes, vec!["application/yaml"]);
    }

    fn computed_path_app() -> MemorySource {
        let mut body = vec![
            Op::Ldc("/dyn"),
            Op::Var(ASTORE, 1),
            Op::Raw(ALOAD_0),
            Op::Var(ALOAD, 1),
            handler("com/acme/App", "lambda$new$0"),
            Op::Invoke(INVOKEVIRTUAL, "com/acme/App", "get", GET),
            Op::Raw(POP),
        ];
        body.extend(get("com/acme/App", "/static", "lambda$new$0"));
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", body))
            .method(constant_handler("lambda$new$0", "x"))
            .build();
        MemorySource::new().with("com/acme/App", app)
    }

    #[test]
    fn computed_path_is_skipped_or_fatal() {
        let source = computed_path_app();
        let (routes, skipped) = run(&source, AnalysisConfig::default());
        assert_eq!(paths(&routes.unwrap()), vec!["/static"]);
        assert_eq!(skipped, 1);

        let strict = AnalysisConfig {
            strict_patterns: true,
            ..AnalysisConfig::default()
        };
        let (routes, _) = run(&source, strict);
        assert!(matches!(routes, Err(RouteLensError::PatternNotFound { .. })));
    }

    #[test]
    fn missing_entry_is_fatal() {
        let source = MemorySource::new();
        let (routes, _) = run(&source, AnalysisConfig::default());
        assert!(matches!(routes, Err(RouteLensError::ClassNotFound(_))));
    }

    #[test]
    fn kotlin_application_block() {
        const FUNCTION1: &str = "kotlin/jvm/functions/Function1";
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/kt/Kooby")
            .method(MethodSpec::new("<init>", "()V").ops(vec![
                Op::Raw(ALOAD_0),
                Op::Field(GETSTATIC, "com/acme/App$1", "INSTANCE", "Lcom/acme/App$1;"),
                Op::Type(CHECKCAST, FUNCTION1),
                Op::Invoke(INVOKESPECIAL, "io/jooby/kt/Kooby", "<init>", "(Lkotlin/jvm/functions/Function1;)V"),
                Op::Raw(RETURN),
            ]))
            .build();
        let block = ClassBuilder::new("com/acme/App$1")
            .extends("kotlin/jvm/internal/Lambda")
            .implements(FUNCTION1)
            .method(MethodSpec::new("invoke", "(Lio/jooby/kt/Kooby;)V").ops(vec![
                Op::Var(ALOAD, 1),
                Op::Ldc("$this$null"),
                Op::Invoke(INVOKESTATIC, "kotlin/jvm/internal/Intrinsics", "checkNotNullParameter", "(Ljava/lang/Object;Ljava/lang/String;)V"),
                Op::Var(ALOAD, 1),
                Op::Ldc("/k"),
                Op::Field(GETSTATIC, "com/acme/App$1$1", "INSTANCE", "Lcom/acme/App$1$1;"),
                Op::Type(CHECKCAST, FUNCTION1),
                Op::Invoke(INVOKEVIRTUAL, "io/jooby/kt/Kooby", "get", "(Ljava/lang/String;Lkotlin/jvm/functions/Function1;)Lio/jooby/Route;"),
                Op::Raw(POP),
                Op::Raw(RETURN),
            ]))
            .method(
                MethodSpec::new("invoke", "(Ljava/lang/Object;)Ljava/lang/Object;")
                    .access(0x1041)
                    .ops(vec![Op::Raw(ACONST_NULL), Op::Raw(ARETURN)]),
            )
            .build();
        let handler = ClassBuilder::new("com/acme/App$1$1")
            .extends("kotlin/jvm/internal/Lambda")
            .implements(FUNCTION1)
            .method(
                MethodSpec::new("invoke", "(Lio/jooby/kt/HandlerContext;)Ljava/lang/Object;")
                    .ops(vec![Op::Ldc("kotlin"), Op::Raw(ARETURN)]),
            )
            .build();
        let source = MemorySource::new()
            .with("com/acme/App", app)
            .with("com/acme/App$1", block)
            .with("com/acme/App$1$1", handler);

        let routes = routes(&source);
        assert_eq!(paths(&routes), vec!["/k"]);
        assert_eq!(routes[0].responses.as_slice(), ["java.lang.String"]);
        assert_eq!(routes[0].handler.owner, "com.acme.App$1$1");
        assert_eq!(routes[0].operation_id, "getK");
    }

    #[test]
    fn controllers_and_generic_routes() {
        let controller = ClassBuilder::new("com/acme/Ping")
            .annotation(
                "Lio/jooby/annotation/Path;",
                vec![("value", AnnValue::Array(vec![AnnValue::Str("/ping".into())]))],
            )
            .method(MethodSpec::new("ping", "()Ljava/lang/String;").annotation("Lio/jooby/annotation/GET;", vec![]))
            .build();
        let body = vec![
            Op::Raw(ALOAD_0),
            Op::LdcClass("com/acme/Ping"),
            Op::Invoke(INVOKEVIRTUAL, "com/acme/App", "mvc", "(Ljava/lang/Class;)Lio/jooby/Jooby;"),
            Op::Raw(POP),
            Op::Raw(ALOAD_0),
            Op::Ldc("PATCH"),
            Op::Ldc("/items"),
            handler("com/acme/App", "lambda$new$0"),
            Op::Invoke(
                INVOKEVIRTUAL,
                "com/acme/App",
                "route",
                "(Ljava/lang/String;Ljava/lang/String;Lio/jooby/Route$Handler;)Lio/jooby/Route;",
            ),
            Op::Raw(POP),
        ];
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", body))
            .method(constant_handler("lambda$new$0", "patched"))
            .build();
        let source = MemorySource::new()
            .with("com/acme/App", app)
            .with("com/acme/Ping", controller);

        let routes = routes(&source);
        assert_eq!(paths(&routes), vec!["/ping", "/items"]);
        assert_eq!(routes[0].operation_id, "ping");
        assert_eq!(routes[1].verb, Some(HttpVerb::Patch));
    }

    #[test]
    fn method_reference_group_keeps_its_prefix() {
        let mut api = get("com/acme/App", "/x", "lambda$api$0");
        api.push(Op::Raw(RETURN));
        let body = vec![
            Op::Raw(ALOAD_0),
            Op::Ldc("/api"),
            Op::Raw(ALOAD_0),
            Op::lambda_handle(5, "run", "(Lcom/acme/App;)Ljava/lang/Runnable;", "()V", "com/acme/App", "api", "()V"),
            Op::Invoke(INVOKEVIRTUAL, "com/acme/App", "path", "(Ljava/lang/String;Ljava/lang/Runnable;)Lio/jooby/Route$Set;"),
            Op::Raw(POP),
        ];
        // helper declared ahead of the constructor that groups it
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(MethodSpec::new("api", "()V").access(0x0002).ops(api))
            .method(constructor("io/jooby/Jooby", body))
            .method(constant_handler("lambda$api$0", "x"))
            .build();
        let source = MemorySource::new().with("com/acme/App", app);

        assert_eq!(paths(&routes(&source)), vec!["/api/x"]);
    }

    #[test]
    fn pattern_comes_from_before_a_factory_handler() {
        let body = vec![
            Op::Raw(ALOAD_0),
            Op::Ldc("/x"),
            Op::Ldc("/other"),
            Op::Invoke(INVOKESTATIC, "com/acme/Handlers", "redirect", "(Ljava/lang/String;)Lio/jooby/Route$Handler;"),
            Op::Invoke(INVOKEVIRTUAL, "com/acme/App", "get", GET),
            Op::Raw(POP),
        ];
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(constructor("io/jooby/Jooby", body))
            .build();
        let source = MemorySource::new().with("com/acme/App", app);

        assert_eq!(paths(&routes(&source)), vec!["/x"]);
    }

    #[test]
    fn constructor_reference_does_not_hide_the_constructor() {
        let main = MethodSpec::new("main", "([Ljava/lang/String;)V").static_method().ops(vec![
            Op::Raw(ALOAD_0),
            Op::lambda_handle(
                8,
                "get",
                "()Ljava/util/function/Supplier;",
                "()Ljava/lang/Object;",
                "com/acme/App",
                "<init>",
                "()V",
            ),
            Op::Invoke(INVOKESTATIC, "io/jooby/Jooby", "runApp", "([Ljava/lang/String;Ljava/util/function/Supplier;)V"),
            Op::Raw(RETURN),
        ]);
        let app = ClassBuilder::new("com/acme/App")
            .extends("io/jooby/Jooby")
            .method(main)
            .method(constructor("io/jooby/Jooby", get("com/acme/App", "/home", "lambda$new$0")))
            .method(constant_handler("lambda$new$0", "home"))
            .build();
        let class = parse_class(&app).unwrap();

        let order: Vec<&str> = walk_order(&class).into_iter().map(|i| class.methods[i].name.as_str()).collect();
        assert_eq!(order, vec!["main", "<init>"]);
    }
}
