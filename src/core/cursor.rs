// src/core/cursor.rs
//! Positional scans over a method's instruction list.

use super::classfile::{Insn, InsnKind, InvokeOp, MethodModel};
use super::types::MethodType;

const KOTLIN_INTRINSICS: &str = "kotlin/jvm/internal/Intrinsics";

/// A position inside one method body
#[derive(Clone, Copy)]
pub struct Cursor<'m> {
    insns: &'m [Insn],
    /// Parallel to `insns`; see [`noise_mask`]
    noise: &'m [bool],
    index: usize,
}

impl<'m> Cursor<'m> {
    pub fn new(insns: &'m [Insn], noise: &'m [bool], index: usize) -> Self {
        Self { insns, noise, index }
    }

    pub fn at(method: &'m MethodModel, index: usize) -> Self {
        Self::new(&method.instructions, method.noise_mask(), index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn insn(&self) -> Option<&'m Insn> {
        self.insns.get(self.index)
    }

    /// Instructions before this one, nearest first. Never wraps.
    pub fn predecessors(&self) -> impl Iterator<Item = (usize, &'m Insn)> + 'm {
        let insns = self.insns;
        (0..self.index.min(insns.len())).rev().map(move |i| (i, &insns[i]))
    }

    pub fn successors(&self) -> impl Iterator<Item = (usize, &'m Insn)> + 'm {
        let insns = self.insns;
        (self.index + 1..insns.len()).map(move |i| (i, &insns[i]))
    }

    /// Instructions in `[self, to)`; empty when `to` is not after this position
    pub fn range(&self, to: usize) -> impl Iterator<Item = (usize, &'m Insn)> + 'm {
        let insns = self.insns;
        (self.index..to.min(insns.len())).map(move |i| (i, &insns[i]))
    }

    /// Predecessors without markers and compiler-inserted null checks
    pub fn meaningful_predecessors(&self) -> impl Iterator<Item = (usize, &'m Insn)> + 'm {
        let noise = self.noise;
        self.predecessors().filter(move |(i, _)| !noise.get(*i).copied().unwrap_or(false))
    }

    pub fn meaningful_successors(&self) -> impl Iterator<Item = (usize, &'m Insn)> + 'm {
        let noise = self.noise;
        self.successors().filter(move |(i, _)| !noise.get(*i).copied().unwrap_or(false))
    }

    pub fn previous_meaningful(&self) -> Option<(usize, &'m Insn)> {
        self.meaningful_predecessors().next()
    }

    pub fn next_meaningful(&self) -> Option<(usize, &'m Insn)> {
        self.meaningful_successors().next()
    }
}

/// Marks pseudo instructions, `nop`, and `Intrinsics.check*` calls together
/// with the instructions that load their arguments.
pub fn noise_mask(insns: &[Insn]) -> Vec<bool> {
    let mut noise: Vec<bool> = insns.iter().map(Insn::is_marker).collect();
    for (i, insn) in insns.iter().enumerate() {
        let InsnKind::Invoke {
            op: InvokeOp::Static,
            method,
        } = &insn.kind
        else {
            continue;
        };
        if method.owner != KOTLIN_INTRINSICS || !method.descriptor.ends_with(")V") {
            continue;
        }
        noise[i] = true;
        let mut operands = MethodType::from_descriptor(&method.descriptor)
            .map(|m| m.params.len())
            .unwrap_or(0);
        let mut j = i;
        while operands > 0 && j > 0 {
            j -= 1;
            if !insns[j].is_marker() {
                noise[j] = true;
                operands -= 1;
            }
        }
    }
    noise
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classfile::{ConstValue, MemberRef, StackOp, ValueKind};

    fn insn(kind: InsnKind) -> Insn {
        Insn::new(0, kind)
    }

    fn body() -> Vec<Insn> {
        vec![
            insn(InsnKind::Label),
            insn(InsnKind::Load {
                kind: ValueKind::Reference,
                var: 1,
            }),
            insn(InsnKind::Const(ConstValue::String("ctx".into()))),
            insn(InsnKind::Invoke {
                op: InvokeOp::Static,
                method: MemberRef::new(KOTLIN_INTRINSICS, "checkNotNullParameter", "(Ljava/lang/Object;Ljava/lang/String;)V"),
            }),
            insn(InsnKind::LineNumber(7)),
            insn(InsnKind::Const(ConstValue::String("/hello".into()))),
            insn(InsnKind::Stack(StackOp::Dup)),
            insn(InsnKind::Const(ConstValue::String("expr".into()))),
            insn(InsnKind::Invoke {
                op: InvokeOp::Static,
                method: MemberRef::new(KOTLIN_INTRINSICS, "checkNotNullExpressionValue", "(Ljava/lang/Object;Ljava/lang/String;)V"),
            }),
            insn(InsnKind::Return(Some(ValueKind::Reference))),
        ]
    }

    #[test]
    fn predecessors_are_nearest_first_and_never_wrap() {
        let insns = body();
        let noise = noise_mask(&insns);
        let cursor = Cursor::new(&insns, &noise, 2);
        let seen: Vec<usize> = cursor.predecessors().map(|(i, _)| i).collect();
        assert_eq!(seen, vec![1, 0]);
        assert_eq!(Cursor::new(&insns, &noise, 0).predecessors().count(), 0);
    }

    #[test]
    fn meaningful_scan_skips_markers_and_null_checks() {
        let insns = body();
        let noise = noise_mask(&insns);
        let at_return = Cursor::new(&insns, &noise, 9);
        let (index, previous) = at_return.previous_meaningful().unwrap();
        assert_eq!(index, 5);
        assert_eq!(previous.as_string_const(), Some("/hello"));

        let at_start = Cursor::new(&insns, &noise, 0);
        assert_eq!(at_start.next_meaningful().map(|(i, _)| i), Some(5));
    }

    #[test]
    fn range_is_bounded() {
        let insns = body();
        let noise = noise_mask(&insns);
        let cursor = Cursor::new(&insns, &noise, 7);
        assert_eq!(cursor.range(100).count(), 3);
        assert_eq!(cursor.range(3).count(), 0);
        assert_eq!(cursor.successors().count(), 2);
    }

    #[test]
    fn method_mask_is_computed_once() {
        let method = MethodModel::placeholder("handle", "()Ljava/lang/String;");
        let first = method.noise_mask();
        let second = Cursor::at(&method, 0).noise;
        assert!(std::ptr::eq(first, second));
        assert_eq!(first, &[false]);
    }
}
