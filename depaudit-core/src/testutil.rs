//! In-process class-file and jar assembly for tests.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh empty directory under the system temp dir.
pub fn create_temp_dir(name: &str) -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir()
        .join("depaudit_tests")
        .join(format!("{}_{}_{}", name, timestamp, id));
    if dir.exists() {
        fs::remove_dir_all(&dir).ok();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a jar containing the given `(entry name, bytes)` pairs.
pub fn write_jar(path: &Path, entries: &[(String, Vec<u8>)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// Jar entry for a class built by [`ClassBuilder`].
pub fn class_entry(class: ClassBuilder) -> (String, Vec<u8>) {
    (format!("{}.class", class.name), class.build())
}

#[derive(Debug, Clone)]
pub enum ElementValue {
    Int(i32),
    Str(String),
    Enum(String, String),
    Class(String),
    Nested(Annotation),
    Array(Vec<ElementValue>),
}

#[derive(Debug, Clone)]
pub struct Annotation {
    descriptor: String,
    values: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub fn new(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            values: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, value: ElementValue) -> Self {
        self.values.push((name.to_string(), value));
        self
    }
}

#[derive(Debug, Clone)]
pub enum Insn {
    Op(u8),
    New(String),
    Anewarray(String),
    Checkcast(String),
    Instanceof(String),
    Multianewarray(String, u8),
    Field {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
    },
    Invoke {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
    },
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap_owner: String,
        bootstrap_name: String,
        bootstrap_descriptor: String,
    },
    LdcClass(String),
    LdcLong(i64),
    TableSwitch { low: i32, high: i32 },
    LookupSwitch { pairs: u32 },
    WideIinc,
}

impl Insn {
    pub fn invokevirtual(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::invoke(0xb6, owner, name, descriptor)
    }

    pub fn invokestatic(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::invoke(0xb8, owner, name, descriptor)
    }

    pub fn invokeinterface(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::invoke(0xb9, owner, name, descriptor)
    }

    pub fn getstatic(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::Field {
            opcode: 0xb2,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    pub fn new_object(class: &str) -> Self {
        Self::New(class.to_string())
    }

    fn invoke(opcode: u8, owner: &str, name: &str, descriptor: &str) -> Self {
        Self::Invoke {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldDef {
    name: String,
    descriptor: String,
    annotations: Vec<Annotation>,
    type_annotations: Vec<String>,
}

impl FieldDef {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            ..Default::default()
        }
    }

    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn type_annotation(mut self, descriptor: &str) -> Self {
        self.type_annotations.push(descriptor.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodDef {
    name: String,
    descriptor: String,
    code: Option<Vec<Insn>>,
    handlers: Vec<Option<String>>,
    locals: Vec<(String, String)>,
    annotations: Vec<Annotation>,
    parameter_annotations: Vec<Annotation>,
    default_value: Option<ElementValue>,
    local_type_annotations: Vec<String>,
    insn_type_annotations: Vec<String>,
}

impl MethodDef {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            ..Default::default()
        }
    }

    pub fn code(mut self, insns: Vec<Insn>) -> Self {
        self.code = Some(insns);
        self
    }

    /// Exception handler covering the whole body; `None` is a `finally`.
    pub fn catch(mut self, class: Option<&str>) -> Self {
        self.handlers.push(class.map(str::to_string));
        self
    }

    pub fn local(mut self, name: &str, descriptor: &str) -> Self {
        self.locals.push((name.to_string(), descriptor.to_string()));
        self
    }

    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn parameter_annotation(mut self, annotation: Annotation) -> Self {
        self.parameter_annotations.push(annotation);
        self
    }

    pub fn default_value(mut self, value: ElementValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn local_type_annotation(mut self, descriptor: &str) -> Self {
        self.local_type_annotations.push(descriptor.to_string());
        self
    }

    pub fn insn_type_annotation(mut self, descriptor: &str) -> Self {
        self.insn_type_annotations.push(descriptor.to_string());
        self
    }
}

/// Builder for a minimal, structurally valid class file.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    inner_classes: Vec<(String, Option<String>)>,
    annotations: Vec<Annotation>,
}

impl ClassBuilder {
    /// A class extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn super_class(mut self, name: Option<&str>) -> Self {
        self.super_class = name.map(str::to_string);
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    pub fn inner_class(mut self, inner: &str, outer: Option<&str>) -> Self {
        self.inner_classes
            .push((inner.to_string(), outer.map(str::to_string)));
        self
    }

    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pool = Pool::default();
        let mut bootstrap: Vec<u16> = Vec::new();

        let this_class = pool.class(&self.name);
        let super_class = self.super_class.as_deref().map_or(0, |s| pool.class(s));
        let interfaces: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();

        let mut fields = Vec::new();
        for field in &self.fields {
            let mut attributes = Vec::new();
            if !field.annotations.is_empty() {
                let body = annotations_body(&mut pool, &field.annotations);
                attributes.push(attribute(&mut pool, "RuntimeVisibleAnnotations", body));
            }
            if !field.type_annotations.is_empty() {
                let mut body = u16_bytes(field.type_annotations.len() as u16).to_vec();
                for descriptor in &field.type_annotations {
                    // field target, empty type path
                    body.extend([0x13, 0]);
                    encode_annotation(&mut pool, &Annotation::new(descriptor), &mut body);
                }
                attributes.push(attribute(&mut pool, "RuntimeVisibleTypeAnnotations", body));
            }
            fields.push(member(&mut pool, &field.name, &field.descriptor, attributes));
        }

        let mut methods = Vec::new();
        for method in &self.methods {
            let mut attributes = Vec::new();
            if let Some(insns) = &method.code {
                let body = code_body(&mut pool, &mut bootstrap, method, insns);
                attributes.push(attribute(&mut pool, "Code", body));
            }
            if !method.annotations.is_empty() {
                let body = annotations_body(&mut pool, &method.annotations);
                attributes.push(attribute(&mut pool, "RuntimeVisibleAnnotations", body));
            }
            if !method.parameter_annotations.is_empty() {
                let mut body = vec![1u8];
                body.extend(annotations_body(&mut pool, &method.parameter_annotations));
                attributes.push(attribute(
                    &mut pool,
                    "RuntimeInvisibleParameterAnnotations",
                    body,
                ));
            }
            if let Some(value) = &method.default_value {
                let mut body = Vec::new();
                encode_value(&mut pool, value, &mut body);
                attributes.push(attribute(&mut pool, "AnnotationDefault", body));
            }
            methods.push(member(&mut pool, &method.name, &method.descriptor, attributes));
        }

        let mut class_attributes = Vec::new();
        if !self.annotations.is_empty() {
            let body = annotations_body(&mut pool, &self.annotations);
            class_attributes.push(attribute(&mut pool, "RuntimeVisibleAnnotations", body));
        }
        if !self.inner_classes.is_empty() {
            let mut body = u16_bytes(self.inner_classes.len() as u16).to_vec();
            for (inner, outer) in &self.inner_classes {
                body.extend(u16_bytes(pool.class(inner)));
                body.extend(u16_bytes(outer.as_deref().map_or(0, |o| pool.class(o))));
                body.extend([0, 0, 0, 0]);
            }
            class_attributes.push(attribute(&mut pool, "InnerClasses", body));
        }
        if !bootstrap.is_empty() {
            let mut body = u16_bytes(bootstrap.len() as u16).to_vec();
            for handle in &bootstrap {
                body.extend(u16_bytes(*handle));
                body.extend(u16_bytes(0));
            }
            class_attributes.push(attribute(&mut pool, "BootstrapMethods", body));
        }

        let mut out = Vec::new();
        out.extend(0xCAFE_BABEu32.to_be_bytes());
        out.extend(u16_bytes(0));
        out.extend(u16_bytes(61));
        out.extend(u16_bytes(pool.count));
        out.extend(&pool.bytes);
        out.extend(u16_bytes(0x0021));
        out.extend(u16_bytes(this_class));
        out.extend(u16_bytes(super_class));
        out.extend(u16_bytes(interfaces.len() as u16));
        for i in interfaces {
            out.extend(u16_bytes(i));
        }
        for members in [fields, methods] {
            out.extend(u16_bytes(members.len() as u16));
            for m in members {
                out.extend(m);
            }
        }
        out.extend(u16_bytes(class_attributes.len() as u16));
        for a in class_attributes {
            out.extend(a);
        }
        out
    }
}

#[derive(Debug)]
struct Pool {
    bytes: Vec<u8>,
    count: u16,
    index: HashMap<Vec<u8>, u16>,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            count: 1,
            index: HashMap::new(),
        }
    }
}

impl Pool {
    fn add(&mut self, entry: Vec<u8>, slots: u16) -> u16 {
        if let Some(index) = self.index.get(&entry) {
            return *index;
        }
        let index = self.count;
        self.count += slots;
        self.bytes.extend(&entry);
        self.index.insert(entry, index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let mut entry = vec![1];
        entry.extend(u16_bytes(value.len() as u16));
        entry.extend(value.as_bytes());
        self.add(entry, 1)
    }

    fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend(value.to_be_bytes());
        self.add(entry, 1)
    }

    fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend(value.to_be_bytes());
        self.add(entry, 2)
    }

    fn refs(&mut self, tag: u8, refs: &[u16]) -> u16 {
        let mut entry = vec![tag];
        for r in refs {
            entry.extend(u16_bytes(*r));
        }
        self.add(entry, 1)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.refs(7, &[name])
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.refs(12, &[name, descriptor])
    }

    fn member(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.refs(tag, &[class, nat])
    }

    fn static_handle(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let reference = self.member(10, owner, name, descriptor);
        let mut entry = vec![15, 6];
        entry.extend(u16_bytes(reference));
        self.add(entry, 1)
    }
}

fn u16_bytes(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

fn attribute(pool: &mut Pool, name: &str, body: Vec<u8>) -> Vec<u8> {
    let mut out = u16_bytes(pool.utf8(name)).to_vec();
    out.extend((body.len() as u32).to_be_bytes());
    out.extend(body);
    out
}

fn member(pool: &mut Pool, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = u16_bytes(0x0001).to_vec();
    out.extend(u16_bytes(pool.utf8(name)));
    out.extend(u16_bytes(pool.utf8(descriptor)));
    out.extend(u16_bytes(attributes.len() as u16));
    for a in attributes {
        out.extend(a);
    }
    out
}

fn annotations_body(pool: &mut Pool, annotations: &[Annotation]) -> Vec<u8> {
    let mut body = u16_bytes(annotations.len() as u16).to_vec();
    for annotation in annotations {
        encode_annotation(pool, annotation, &mut body);
    }
    body
}

fn encode_annotation(pool: &mut Pool, annotation: &Annotation, out: &mut Vec<u8>) {
    out.extend(u16_bytes(pool.utf8(&annotation.descriptor)));
    out.extend(u16_bytes(annotation.values.len() as u16));
    for (name, value) in &annotation.values {
        out.extend(u16_bytes(pool.utf8(name)));
        encode_value(pool, value, out);
    }
}

fn encode_value(pool: &mut Pool, value: &ElementValue, out: &mut Vec<u8>) {
    match value {
        ElementValue::Int(i) => {
            out.push(b'I');
            out.extend(u16_bytes(pool.integer(*i)));
        }
        ElementValue::Str(s) => {
            out.push(b's');
            out.extend(u16_bytes(pool.utf8(s)));
        }
        ElementValue::Enum(descriptor, constant) => {
            out.push(b'e');
            out.extend(u16_bytes(pool.utf8(descriptor)));
            out.extend(u16_bytes(pool.utf8(constant)));
        }
        ElementValue::Class(descriptor) => {
            out.push(b'c');
            out.extend(u16_bytes(pool.utf8(descriptor)));
        }
        ElementValue::Nested(annotation) => {
            out.push(b'@');
            encode_annotation(pool, annotation, out);
        }
        ElementValue::Array(values) => {
            out.push(b'[');
            out.extend(u16_bytes(values.len() as u16));
            for v in values {
                encode_value(pool, v, out);
            }
        }
    }
}

fn assemble(pool: &mut Pool, bootstrap: &mut Vec<u16>, insns: &[Insn]) -> Vec<u8> {
    let mut code = Vec::new();
    for insn in insns {
        match insn {
            Insn::Op(op) => code.push(*op),
            Insn::New(c) => type_insn(&mut code, 0xbb, pool.class(c)),
            Insn::Anewarray(c) => type_insn(&mut code, 0xbd, pool.class(c)),
            Insn::Checkcast(c) => type_insn(&mut code, 0xc0, pool.class(c)),
            Insn::Instanceof(c) => type_insn(&mut code, 0xc1, pool.class(c)),
            Insn::Multianewarray(descriptor, dims) => {
                type_insn(&mut code, 0xc5, pool.class(descriptor));
                code.push(*dims);
            }
            Insn::Field {
                opcode,
                owner,
                name,
                descriptor,
            } => type_insn(&mut code, *opcode, pool.member(9, owner, name, descriptor)),
            Insn::Invoke {
                opcode,
                owner,
                name,
                descriptor,
            } => {
                let tag = if *opcode == 0xb9 { 11 } else { 10 };
                type_insn(&mut code, *opcode, pool.member(tag, owner, name, descriptor));
                if *opcode == 0xb9 {
                    code.extend([1, 0]);
                }
            }
            Insn::InvokeDynamic {
                name,
                descriptor,
                bootstrap_owner,
                bootstrap_name,
                bootstrap_descriptor,
            } => {
                let handle =
                    pool.static_handle(bootstrap_owner, bootstrap_name, bootstrap_descriptor);
                let index = bootstrap.len() as u16;
                bootstrap.push(handle);
                let nat = pool.name_and_type(name, descriptor);
                let indy = pool.refs(18, &[index, nat]);
                type_insn(&mut code, 0xba, indy);
                code.extend([0, 0]);
            }
            Insn::LdcClass(c) => type_insn(&mut code, 0x13, pool.class(c)),
            Insn::LdcLong(v) => type_insn(&mut code, 0x14, pool.long(*v)),
            Insn::TableSwitch { low, high } => {
                code.push(0xaa);
                pad(&mut code);
                code.extend(0i32.to_be_bytes());
                code.extend(low.to_be_bytes());
                code.extend(high.to_be_bytes());
                for _ in *low..=*high {
                    code.extend(0i32.to_be_bytes());
                }
            }
            Insn::LookupSwitch { pairs } => {
                code.push(0xab);
                pad(&mut code);
                code.extend(0i32.to_be_bytes());
                code.extend(pairs.to_be_bytes());
                for key in 0..*pairs {
                    code.extend(key.to_be_bytes());
                    code.extend(0i32.to_be_bytes());
                }
            }
            Insn::WideIinc => code.extend([0xc4, 0x84, 0, 1, 0, 1]),
        }
    }
    code
}

fn type_insn(code: &mut Vec<u8>, opcode: u8, index: u16) {
    code.push(opcode);
    code.extend(u16_bytes(index));
}

fn pad(code: &mut Vec<u8>) {
    while code.len() % 4 != 0 {
        code.push(0);
    }
}

fn code_body(
    pool: &mut Pool,
    bootstrap: &mut Vec<u16>,
    method: &MethodDef,
    insns: &[Insn],
) -> Vec<u8> {
    let code = assemble(pool, bootstrap, insns);
    let code_length = code.len() as u16;

    let mut body = Vec::new();
    body.extend(u16_bytes(10));
    body.extend(u16_bytes(10));
    body.extend((code.len() as u32).to_be_bytes());
    body.extend(&code);

    body.extend(u16_bytes(method.handlers.len() as u16));
    for handler in &method.handlers {
        body.extend(u16_bytes(0));
        body.extend(u16_bytes(code_length));
        body.extend(u16_bytes(0));
        body.extend(u16_bytes(handler.as_deref().map_or(0, |c| pool.class(c))));
    }

    let mut attributes = Vec::new();
    if !method.locals.is_empty() {
        let mut table = u16_bytes(method.locals.len() as u16).to_vec();
        for (slot, (name, descriptor)) in method.locals.iter().enumerate() {
            table.extend(u16_bytes(0));
            table.extend(u16_bytes(code_length));
            table.extend(u16_bytes(pool.utf8(name)));
            table.extend(u16_bytes(pool.utf8(descriptor)));
            table.extend(u16_bytes(slot as u16));
        }
        attributes.push(attribute(pool, "LocalVariableTable", table));
    }
    let type_annotation_count =
        method.local_type_annotations.len() + method.insn_type_annotations.len();
    if type_annotation_count > 0 {
        let mut table = u16_bytes(type_annotation_count as u16).to_vec();
        for descriptor in &method.local_type_annotations {
            // localvar target with one range
            table.extend([0x40, 0, 1]);
            table.extend(u16_bytes(0));
            table.extend(u16_bytes(code_length));
            table.extend(u16_bytes(0));
            table.push(0);
            encode_annotation(pool, &Annotation::new(descriptor), &mut table);
        }
        for descriptor in &method.insn_type_annotations {
            // cast target at offset 0, empty type path
            table.extend([0x47, 0, 0, 0, 0]);
            encode_annotation(pool, &Annotation::new(descriptor), &mut table);
        }
        attributes.push(attribute(pool, "RuntimeVisibleTypeAnnotations", table));
    }

    body.extend(u16_bytes(attributes.len() as u16));
    for a in attributes {
        body.extend(a);
    }
    body
}
