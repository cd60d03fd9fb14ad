// src/core/matcher.rs
//! Call-site signature matching.
//!
//! Expected parameter lists use dotted raw type names (`java.lang.String`,
//! `int`, `io.jooby.Route$Handler`), `"*"` for any type and a trailing
//! `"..."` to accept extra trailing parameters.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use super::cache::ClassModelCache;
use super::classfile::{ClassModel, MemberRef};
use super::types::MethodType;

pub const ANY: &str = "*";
pub const VARIADIC: &str = "...";

/// Locate the declaration of `name descriptor` starting at `owner` and
/// walking resolvable superclasses and interfaces breadth first.
pub fn find_method(
    cache: &ClassModelCache<'_>,
    owner: &str,
    name: &str,
    descriptor: &str,
) -> Option<(Rc<ClassModel>, usize)> {
    let mut queue = VecDeque::from([owner.to_string()]);
    let mut seen = HashSet::new();
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let Some(class) = cache.try_model(&current) else {
            continue;
        };
        if let Some(index) = class.method_index(name, descriptor) {
            return Some((class, index));
        }
        queue.extend(class.super_name.iter().cloned());
        queue.extend(class.interfaces.iter().cloned());
    }
    None
}

/// Shape of the called method: the callee's generic signature when its
/// declaration is in the module, the call's raw descriptor otherwise.
pub fn callee_type(cache: &ClassModelCache<'_>, call: &MemberRef) -> Option<MethodType> {
    find_method(cache, &call.owner, &call.name, &call.descriptor)
        .and_then(|(class, index)| class.methods[index].method_type())
        .or_else(|| MethodType::from_descriptor(&call.descriptor))
}

/// True when `call` has the given name (if any) and its parameter types
/// match `expected`. Never fails: undecodable shapes simply do not match.
pub fn matches(cache: &ClassModelCache<'_>, call: &MemberRef, name: Option<&str>, expected: &[&str]) -> bool {
    if name.is_some_and(|n| n != call.name) {
        return false;
    }
    let Some(shape) = callee_type(cache, call) else {
        return false;
    };
    let bounds = shape.bounds();
    let actual: Vec<String> = shape.params.iter().map(|p| p.erase_vars(&bounds).raw_name()).collect();
    params_match(&actual, expected)
}

fn params_match(actual: &[String], expected: &[&str]) -> bool {
    let (expected, variadic) = match expected.split_last() {
        Some((&VARIADIC, rest)) => (rest, true),
        _ => (expected, false),
    };
    if actual.len() < expected.len() || (!variadic && actual.len() != expected.len()) {
        return false;
    }
    expected
        .iter()
        .zip(actual)
        .all(|(want, have)| *want == ANY || *want == have)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classfile::testing::{ClassBuilder, MethodSpec};
    use crate::core::classpath::MemorySource;

    fn get_call() -> MemberRef {
        MemberRef::new("com/acme/App", "get", "(Ljava/lang/String;Lio/jooby/Route$Handler;)Lio/jooby/Route;")
    }

    #[test]
    fn matches_raw_descriptor_for_unknown_owner() {
        let source = MemorySource::new();
        let cache = ClassModelCache::new(&source);
        let call = get_call();
        assert!(matches(&cache, &call, Some("get"), &["java.lang.String", "io.jooby.Route$Handler"]));
        assert!(matches(&cache, &call, None, &["java.lang.String", ANY]));
        assert!(matches(&cache, &call, None, &["java.lang.String", VARIADIC]));
        assert!(!matches(&cache, &call, Some("post"), &["java.lang.String", ANY]));
        assert!(!matches(&cache, &call, None, &["java.lang.String"]));
    }

    #[test]
    fn prefers_generic_signature_of_inherited_declaration() {
        let base = ClassBuilder::new("com/acme/Base")
            .method(
                MethodSpec::new("use", "(Ljava/lang/Object;)V")
                    .signature("<R:Lio/jooby/Router;>(TR;)V"),
            )
            .build();
        let app = ClassBuilder::new("com/acme/App").extends("com/acme/Base").build();
        let source = MemorySource::new().with("com/acme/Base", base).with("com/acme/App", app);
        let cache = ClassModelCache::new(&source);

        let call = MemberRef::new("com/acme/App", "use", "(Ljava/lang/Object;)V");
        assert!(matches(&cache, &call, Some("use"), &["io.jooby.Router"]));
        assert!(!matches(&cache, &call, Some("use"), &["java.lang.Object"]));
    }

    #[test]
    fn undecodable_descriptor_never_matches() {
        let source = MemorySource::new();
        let cache = ClassModelCache::new(&source);
        let call = MemberRef::new("x/Y", "get", "garbage");
        assert!(!matches(&cache, &call, None, &[VARIADIC]));
    }

    #[test]
    fn primitive_parameters_use_source_names() {
        let source = MemorySource::new();
        let cache = ClassModelCache::new(&source);
        let call = MemberRef::new("io/jooby/Value", "intValue", "(I)I");
        assert!(matches(&cache, &call, Some("intValue"), &["int"]));
    }
}
