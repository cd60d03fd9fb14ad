// src/core/classfile/testing.rs
//! Minimal class-file assembler for tests. Emits real class bytes so the
//! decoder and everything above it run against the same input shape the
//! compiler produces.

use std::collections::HashMap;

use super::opcodes::*;

const METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

#[derive(Debug, Clone)]
pub enum AnnValue {
    Str(String),
    Int(i32),
    Bool(bool),
    Enum(&'static str, &'static str),
    Class(&'static str),
    Array(Vec<AnnValue>),
}

#[derive(Debug, Clone)]
pub struct LambdaSpec {
    pub name: &'static str,
    pub indy_desc: &'static str,
    pub sam_desc: &'static str,
    pub kind: u8,
    pub owner: &'static str,
    pub impl_name: &'static str,
    pub impl_desc: &'static str,
}

#[derive(Debug, Clone)]
pub enum Op {
    Raw(u8),
    Ldc(&'static str),
    LdcInt(i32),
    LdcLong(i64),
    LdcFloat(f32),
    LdcClass(&'static str),
    Bipush(i8),
    Sipush(i16),
    /// Long-form load/store: `Var(ALOAD, 4)`
    Var(u8, u8),
    Invoke(u8, &'static str, &'static str, &'static str),
    Field(u8, &'static str, &'static str, &'static str),
    /// `new`, `checkcast`, `instanceof`, `anewarray`
    Type(u8, &'static str),
    Lambda(Box<LambdaSpec>),
    Jump(u8, u32),
    Label(u32),
    Line(u16),
}

impl Op {
    /// Static-method lambda through `LambdaMetafactory`
    pub fn lambda(
        name: &'static str,
        indy_desc: &'static str,
        sam_desc: &'static str,
        owner: &'static str,
        impl_name: &'static str,
        impl_desc: &'static str,
    ) -> Self {
        Self::lambda_handle(6, name, indy_desc, sam_desc, owner, impl_name, impl_desc)
    }

    pub fn lambda_handle(
        kind: u8,
        name: &'static str,
        indy_desc: &'static str,
        sam_desc: &'static str,
        owner: &'static str,
        impl_name: &'static str,
        impl_desc: &'static str,
    ) -> Self {
        Self::Lambda(Box::new(LambdaSpec {
            name,
            indy_desc,
            sam_desc,
            kind,
            owner,
            impl_name,
            impl_desc,
        }))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodSpec {
    name: String,
    desc: String,
    access: u16,
    signature: Option<String>,
    ops: Vec<Op>,
    locals: Vec<(u16, String, String, Option<String>)>,
    annotations: Vec<(String, Vec<(&'static str, AnnValue)>)>,
    param_annotations: Vec<(usize, String, Vec<(&'static str, AnnValue)>)>,
    parameters: Option<Vec<String>>,
}

impl MethodSpec {
    pub fn new(name: &str, desc: &str) -> Self {
        Self {
            name: name.to_string(),
            desc: desc.to_string(),
            access: 0x0001,
            ..Default::default()
        }
    }

    pub fn static_method(mut self) -> Self {
        self.access |= 0x0008;
        self
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn ops(mut self, ops: Vec<Op>) -> Self {
        self.ops = ops;
        self
    }

    /// Local variable covering the whole method body
    pub fn local(mut self, index: u16, name: &str, desc: &str, signature: Option<&str>) -> Self {
        self.locals
            .push((index, name.to_string(), desc.to_string(), signature.map(str::to_string)));
        self
    }

    pub fn annotation(mut self, desc: &str, values: Vec<(&'static str, AnnValue)>) -> Self {
        self.annotations.push((desc.to_string(), values));
        self
    }

    pub fn param_annotation(mut self, param: usize, desc: &str, values: Vec<(&'static str, AnnValue)>) -> Self {
        self.param_annotations.push((param, desc.to_string(), values));
        self
    }

    pub fn parameters(mut self, names: &[&str]) -> Self {
        self.parameters = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }
}

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    next: u16,
    index: HashMap<String, u16>,
}

impl PoolWriter {
    fn new() -> Self {
        Self {
            next: 1,
            ..Default::default()
        }
    }

    fn intern(&mut self, key: String, slots: u16, encode: impl FnOnce(&mut Self) -> Vec<u8>) -> u16 {
        if let Some(i) = self.index.get(&key) {
            return *i;
        }
        let encoded = encode(self);
        let i = self.next;
        self.bytes.extend(encoded);
        self.next += slots;
        self.index.insert(key, i);
        i
    }

    fn utf8(&mut self, s: &str) -> u16 {
        self.intern(format!("u:{s}"), 1, |_| {
            let mut b = vec![1];
            b.extend((s.len() as u16).to_be_bytes());
            b.extend(s.as_bytes());
            b
        })
    }

    fn ref1(tag: u8, a: u16) -> Vec<u8> {
        let mut b = vec![tag];
        b.extend(a.to_be_bytes());
        b
    }

    fn ref2(tag: u8, a: u16, c: u16) -> Vec<u8> {
        let mut b = vec![tag];
        b.extend(a.to_be_bytes());
        b.extend(c.to_be_bytes());
        b
    }

    fn class(&mut self, name: &str) -> u16 {
        self.intern(format!("c:{name}"), 1, |p| {
            let n = p.utf8(name);
            Self::ref1(7, n)
        })
    }

    fn string(&mut self, s: &str) -> u16 {
        self.intern(format!("s:{s}"), 1, |p| {
            let n = p.utf8(s);
            Self::ref1(8, n)
        })
    }

    fn int(&mut self, v: i32) -> u16 {
        self.intern(format!("i:{v}"), 1, |_| {
            let mut b = vec![3];
            b.extend(v.to_be_bytes());
            b
        })
    }

    fn float(&mut self, v: f32) -> u16 {
        self.intern(format!("f:{}", v.to_bits()), 1, |_| {
            let mut b = vec![4];
            b.extend(v.to_bits().to_be_bytes());
            b
        })
    }

    fn long(&mut self, v: i64) -> u16 {
        self.intern(format!("j:{v}"), 2, |_| {
            let mut b = vec![5];
            b.extend(v.to_be_bytes());
            b
        })
    }

    fn name_and_type(&mut self, name: &str, desc: &str) -> u16 {
        self.intern(format!("nt:{name}:{desc}"), 1, |p| {
            let n = p.utf8(name);
            let d = p.utf8(desc);
            Self::ref2(12, n, d)
        })
    }

    fn member(&mut self, tag: u8, owner: &str, name: &str, desc: &str) -> u16 {
        self.intern(format!("m{tag}:{owner}.{name}:{desc}"), 1, |p| {
            let c = p.class(owner);
            let nt = p.name_and_type(name, desc);
            Self::ref2(tag, c, nt)
        })
    }

    fn method_handle(&mut self, kind: u8, owner: &str, name: &str, desc: &str) -> u16 {
        self.intern(format!("mh{kind}:{owner}.{name}:{desc}"), 1, |p| {
            let tag = if kind == 9 { 11 } else { 10 };
            let m = p.member(tag, owner, name, desc);
            let mut b = vec![15, kind];
            b.extend(m.to_be_bytes());
            b
        })
    }

    fn method_type(&mut self, desc: &str) -> u16 {
        self.intern(format!("mt:{desc}"), 1, |p| {
            let d = p.utf8(desc);
            Self::ref1(16, d)
        })
    }

    fn invoke_dynamic(&mut self, bootstrap: u16, name: &str, desc: &str) -> u16 {
        self.intern(format!("indy:{bootstrap}:{name}:{desc}"), 1, |p| {
            let nt = p.name_and_type(name, desc);
            Self::ref2(18, bootstrap, nt)
        })
    }
}

pub struct ClassBuilder {
    name: String,
    super_name: String,
    interfaces: Vec<String>,
    access: u16,
    signature: Option<String>,
    annotations: Vec<(String, Vec<(&'static str, AnnValue)>)>,
    fields: Vec<(String, String, u16, Option<String>)>,
    methods: Vec<MethodSpec>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: "java/lang/Object".to_string(),
            interfaces: Vec::new(),
            access: 0x0021,
            signature: None,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = super_name.to_string();
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn annotation(mut self, desc: &str, values: Vec<(&'static str, AnnValue)>) -> Self {
        self.annotations.push((desc.to_string(), values));
        self
    }

    pub fn field(mut self, name: &str, desc: &str, access: u16, signature: Option<&str>) -> Self {
        self.fields
            .push((name.to_string(), desc.to_string(), access, signature.map(str::to_string)));
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pool = PoolWriter::new();
        let mut bootstraps: Vec<Vec<u8>> = Vec::new();
        let mut bootstrap_keys: HashMap<String, u16> = HashMap::new();
        let mut body = Vec::new();

        let this_class = pool.class(&self.name);
        let super_class = pool.class(&self.super_name);
        body.extend(self.access.to_be_bytes());
        body.extend(this_class.to_be_bytes());
        body.extend(super_class.to_be_bytes());
        body.extend((self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            body.extend(pool.class(interface).to_be_bytes());
        }

        body.extend((self.fields.len() as u16).to_be_bytes());
        for (name, desc, access, signature) in &self.fields {
            body.extend(access.to_be_bytes());
            body.extend(pool.utf8(name).to_be_bytes());
            body.extend(pool.utf8(desc).to_be_bytes());
            let mut attrs = Vec::new();
            if let Some(sig) = signature {
                let idx = pool_index(&mut pool, sig);
                attrs.push(attribute(&mut pool, "Signature", idx));
            }
            write_attributes(&mut body, attrs);
        }

        body.extend((self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            let mut ctx = EncodeCtx {
                pool: &mut pool,
                bootstraps: &mut bootstraps,
                bootstrap_keys: &mut bootstrap_keys,
            };
            write_method(&mut body, method, &mut ctx);
        }

        let mut attrs = Vec::new();
        if let Some(sig) = &self.signature {
            let idx = pool_index(&mut pool, sig);
            attrs.push(attribute(&mut pool, "Signature", idx));
        }
        if !self.annotations.is_empty() {
            let encoded = encode_annotations(&mut pool, &self.annotations);
            attrs.push(attribute(&mut pool, "RuntimeVisibleAnnotations", encoded));
        }
        if !bootstraps.is_empty() {
            let mut table = (bootstraps.len() as u16).to_be_bytes().to_vec();
            for b in &bootstraps {
                table.extend(b);
            }
            attrs.push(attribute(&mut pool, "BootstrapMethods", table));
        }
        write_attributes(&mut body, attrs);

        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52];
        out.extend(pool.next.to_be_bytes());
        out.extend(&pool.bytes);
        out.extend(body);
        out
    }
}

struct EncodeCtx<'a> {
    pool: &'a mut PoolWriter,
    bootstraps: &'a mut Vec<Vec<u8>>,
    bootstrap_keys: &'a mut HashMap<String, u16>,
}

fn pool_index(pool: &mut PoolWriter, s: &str) -> Vec<u8> {
    pool.utf8(s).to_be_bytes().to_vec()
}

fn attribute(pool: &mut PoolWriter, name: &str, data: Vec<u8>) -> Vec<u8> {
    let mut out = pool.utf8(name).to_be_bytes().to_vec();
    out.extend((data.len() as u32).to_be_bytes());
    out.extend(data);
    out
}

fn write_attributes(out: &mut Vec<u8>, attrs: Vec<Vec<u8>>) {
    out.extend((attrs.len() as u16).to_be_bytes());
    for a in attrs {
        out.extend(a);
    }
}

fn encode_annotations(pool: &mut PoolWriter, annotations: &[(String, Vec<(&'static str, AnnValue)>)]) -> Vec<u8> {
    let mut out = (annotations.len() as u16).to_be_bytes().to_vec();
    for (desc, values) in annotations {
        encode_annotation(pool, &mut out, desc, values);
    }
    out
}

fn encode_annotation(pool: &mut PoolWriter, out: &mut Vec<u8>, desc: &str, values: &[(&'static str, AnnValue)]) {
    out.extend(pool.utf8(desc).to_be_bytes());
    out.extend((values.len() as u16).to_be_bytes());
    for (name, value) in values {
        out.extend(pool.utf8(name).to_be_bytes());
        encode_element(pool, out, value);
    }
}

fn encode_element(pool: &mut PoolWriter, out: &mut Vec<u8>, value: &AnnValue) {
    match value {
        AnnValue::Str(s) => {
            out.push(b's');
            out.extend(pool.utf8(s).to_be_bytes());
        }
        AnnValue::Int(v) => {
            out.push(b'I');
            out.extend(pool.int(*v).to_be_bytes());
        }
        AnnValue::Bool(v) => {
            out.push(b'Z');
            out.extend(pool.int(*v as i32).to_be_bytes());
        }
        AnnValue::Enum(desc, name) => {
            out.push(b'e');
            out.extend(pool.utf8(desc).to_be_bytes());
            out.extend(pool.utf8(name).to_be_bytes());
        }
        AnnValue::Class(desc) => {
            out.push(b'c');
            out.extend(pool.utf8(desc).to_be_bytes());
        }
        AnnValue::Array(items) => {
            out.push(b'[');
            out.extend((items.len() as u16).to_be_bytes());
            for item in items {
                encode_element(pool, out, item);
            }
        }
    }
}

fn write_method(out: &mut Vec<u8>, method: &MethodSpec, ctx: &mut EncodeCtx<'_>) {
    out.extend(method.access.to_be_bytes());
    out.extend(ctx.pool.utf8(&method.name).to_be_bytes());
    out.extend(ctx.pool.utf8(&method.desc).to_be_bytes());

    let mut attrs = Vec::new();
    if !method.ops.is_empty() {
        let code = encode_code(method, ctx);
        attrs.push(attribute(ctx.pool, "Code", code));
    }
    if let Some(sig) = &method.signature {
        let idx = pool_index(ctx.pool, sig);
        attrs.push(attribute(ctx.pool, "Signature", idx));
    }
    if let Some(names) = &method.parameters {
        let mut data = vec![names.len() as u8];
        for name in names {
            data.extend(ctx.pool.utf8(name).to_be_bytes());
            data.extend(0u16.to_be_bytes());
        }
        attrs.push(attribute(ctx.pool, "MethodParameters", data));
    }
    if !method.annotations.is_empty() {
        let encoded = encode_annotations(ctx.pool, &method.annotations);
        attrs.push(attribute(ctx.pool, "RuntimeVisibleAnnotations", encoded));
    }
    if !method.param_annotations.is_empty() {
        let count = method.param_annotations.iter().map(|(i, ..)| i + 1).max().unwrap_or(0);
        let mut data = vec![count as u8];
        for param in 0..count {
            let found: Vec<(String, Vec<(&'static str, AnnValue)>)> = method
                .param_annotations
                .iter()
                .filter(|(i, ..)| *i == param)
                .map(|(_, desc, values)| (desc.clone(), values.clone()))
                .collect();
            data.extend(encode_annotations(ctx.pool, &found));
        }
        attrs.push(attribute(ctx.pool, "RuntimeVisibleParameterAnnotations", data));
    }
    write_attributes(out, attrs);
}

fn encode_code(method: &MethodSpec, ctx: &mut EncodeCtx<'_>) -> Vec<u8> {
    // first pass sizes instructions so labels get offsets
    let mut labels = HashMap::new();
    let mut offset = 0usize;
    for op in &method.ops {
        if let Op::Label(id) = op {
            labels.insert(*id, offset);
        }
        offset += encode_op(op, ctx, offset, &labels).len();
    }

    let mut code = Vec::new();
    let mut lines = Vec::new();
    for op in &method.ops {
        if let Op::Line(line) = op {
            lines.push((code.len() as u16, *line));
        }
        let bytes = encode_op(op, ctx, code.len(), &labels);
        code.extend(bytes);
    }

    let mut data = Vec::new();
    data.extend(16u16.to_be_bytes());
    data.extend(16u16.to_be_bytes());
    data.extend((code.len() as u32).to_be_bytes());
    data.extend(&code);
    data.extend(0u16.to_be_bytes());

    let mut attrs = Vec::new();
    if !lines.is_empty() {
        let mut table = (lines.len() as u16).to_be_bytes().to_vec();
        for (pc, line) in lines {
            table.extend(pc.to_be_bytes());
            table.extend(line.to_be_bytes());
        }
        attrs.push(attribute(ctx.pool, "LineNumberTable", table));
    }
    if !method.locals.is_empty() {
        let mut table = (method.locals.len() as u16).to_be_bytes().to_vec();
        let mut types = Vec::new();
        for (index, name, desc, signature) in &method.locals {
            table.extend(0u16.to_be_bytes());
            table.extend((code.len() as u16).to_be_bytes());
            table.extend(ctx.pool.utf8(name).to_be_bytes());
            table.extend(ctx.pool.utf8(desc).to_be_bytes());
            table.extend(index.to_be_bytes());
            if let Some(sig) = signature {
                types.extend(0u16.to_be_bytes());
                types.extend((code.len() as u16).to_be_bytes());
                types.extend(ctx.pool.utf8(name).to_be_bytes());
                types.extend(ctx.pool.utf8(sig).to_be_bytes());
                types.extend(index.to_be_bytes());
            }
        }
        attrs.push(attribute(ctx.pool, "LocalVariableTable", table));
        if !types.is_empty() {
            let count = method.locals.iter().filter(|l| l.3.is_some()).count() as u16;
            let mut type_table = count.to_be_bytes().to_vec();
            type_table.extend(types);
            attrs.push(attribute(ctx.pool, "LocalVariableTypeTable", type_table));
        }
    }
    write_attributes(&mut data, attrs);
    data
}

fn encode_op(op: &Op, ctx: &mut EncodeCtx<'_>, offset: usize, labels: &HashMap<u32, usize>) -> Vec<u8> {
    let with_index = |opcode: u8, index: u16| {
        let mut b = vec![opcode];
        b.extend(index.to_be_bytes());
        b
    };
    match op {
        Op::Raw(opcode) => vec![*opcode],
        Op::Ldc(s) => {
            let i = ctx.pool.string(s);
            if i < 256 {
                vec![LDC, i as u8]
            } else {
                with_index(LDC_W, i)
            }
        }
        Op::LdcInt(v) => with_index(LDC_W, ctx.pool.int(*v)),
        Op::LdcLong(v) => with_index(LDC2_W, ctx.pool.long(*v)),
        Op::LdcFloat(v) => with_index(LDC_W, ctx.pool.float(*v)),
        Op::LdcClass(c) => with_index(LDC_W, ctx.pool.class(c)),
        Op::Bipush(v) => vec![BIPUSH, *v as u8],
        Op::Sipush(v) => {
            let mut b = vec![SIPUSH];
            b.extend(v.to_be_bytes());
            b
        }
        Op::Var(opcode, var) => vec![*opcode, *var],
        Op::Invoke(opcode, owner, name, desc) => {
            if *opcode == INVOKEINTERFACE {
                let mut b = with_index(*opcode, ctx.pool.member(11, owner, name, desc));
                let args = crate::core::types::MethodType::from_descriptor(desc)
                    .map(|m| m.params.len() as u8 + 1)
                    .unwrap_or(1);
                b.extend([args, 0]);
                b
            } else {
                with_index(*opcode, ctx.pool.member(10, owner, name, desc))
            }
        }
        Op::Field(opcode, owner, name, desc) => with_index(*opcode, ctx.pool.member(9, owner, name, desc)),
        Op::Type(opcode, name) => with_index(*opcode, ctx.pool.class(name)),
        Op::Lambda(spec) => {
            let key = format!(
                "{}:{}:{}.{}{}",
                spec.sam_desc, spec.kind, spec.owner, spec.impl_name, spec.impl_desc
            );
            let bootstrap = match ctx.bootstrap_keys.get(&key) {
                Some(i) => *i,
                None => {
                    let factory = ctx.pool.method_handle(6, "java/lang/invoke/LambdaMetafactory", "metafactory", METAFACTORY_DESC);
                    let erased = ctx.pool.method_type(spec.sam_desc);
                    let target = ctx.pool.method_handle(spec.kind, spec.owner, spec.impl_name, spec.impl_desc);
                    let mut entry = factory.to_be_bytes().to_vec();
                    entry.extend(3u16.to_be_bytes());
                    entry.extend(erased.to_be_bytes());
                    entry.extend(target.to_be_bytes());
                    entry.extend(erased.to_be_bytes());
                    let i = ctx.bootstraps.len() as u16;
                    ctx.bootstraps.push(entry);
                    ctx.bootstrap_keys.insert(key, i);
                    i
                }
            };
            let mut b = with_index(INVOKEDYNAMIC, ctx.pool.invoke_dynamic(bootstrap, spec.name, spec.indy_desc));
            b.extend([0, 0]);
            b
        }
        Op::Jump(opcode, label) => {
            let target = labels.get(label).copied().unwrap_or(offset) as i64;
            let mut b = vec![*opcode];
            b.extend(((target - offset as i64) as i16).to_be_bytes());
            b
        }
        Op::Label(_) | Op::Line(_) => Vec::new(),
    }
}
