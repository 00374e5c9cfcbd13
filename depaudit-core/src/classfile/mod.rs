//! Class-file symbol extraction.
//!
//! A single class file is decoded into two sets of internal names
//! (`java/lang/String` form): the classes it defines and the classes it
//! references. Only what the JVM would have to load is recorded, so
//! generic signatures, `ldc` class literals and the `Exceptions`
//! attribute are not considered.

mod annotations;
mod code;
pub mod descriptor;
pub(crate) mod reader;
mod visitor;

use std::collections::BTreeSet;

use thiserror::Error;

pub use descriptor::to_external_name;

/// Name of the module descriptor pseudo-class, never recorded as a definition.
pub const MODULE_INFO: &str = "module-info";

/// Low-level decoding failure inside one class file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("not a class file (magic {0:#010x})")]
    BadMagic(u32),

    #[error("truncated class file at offset {offset}")]
    Truncated { offset: usize },

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: usize },

    #[error("constant pool index {index} is not a {expected}")]
    BadConstant { index: u16, expected: &'static str },

    #[error("malformed descriptor {0:?}")]
    Descriptor(String),

    #[error("unknown opcode {opcode:#04x} at code offset {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("malformed switch at code offset {pc}")]
    MalformedSwitch { pc: usize },

    #[error("unknown annotation element tag {0:?}")]
    ElementTag(char),

    #[error("unknown type annotation target {0:#04x}")]
    TypeAnnotationTarget(u8),

    #[error("bootstrap method {0} is not declared")]
    MissingBootstrap(u16),

    /// An array descriptor was passed where a plain class name is required.
    #[error("expected a class name, got array type {0:?}")]
    ArrayClassName(String),
}

/// Knobs for [`extract_symbols`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Ignore `LocalVariableTable` entries.
    pub skip_debug: bool,
}

/// Classes defined and used by one or more class files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassSymbols {
    pub defined: BTreeSet<String>,
    pub used: BTreeSet<String>,
}

impl ClassSymbols {
    pub fn add_definition(&mut self, name: &str) {
        if name != MODULE_INFO {
            self.defined.insert(name.to_string());
        }
    }

    /// Record a plain internal class name as used.
    pub fn add_class(&mut self, name: &str) -> Result<(), ClassFileError> {
        if name.starts_with('[') {
            return Err(ClassFileError::ArrayClassName(name.to_string()));
        }
        self.used.insert(name.to_string());
        Ok(())
    }

    /// Record the owner of a member access or type instruction.
    ///
    /// Owners may be array descriptors (`[Ljava/lang/Object;`), in which
    /// case the element type is recorded.
    pub fn add_owner(&mut self, owner: &str) -> Result<(), ClassFileError> {
        if owner.starts_with('[') {
            self.add_descriptor(owner)
        } else {
            self.add_class(owner)
        }
    }

    /// Record every object type mentioned in a field or method descriptor.
    pub fn add_descriptor(&mut self, descriptor: &str) -> Result<(), ClassFileError> {
        let used = &mut self.used;
        descriptor::for_each_class(descriptor, |name| {
            used.insert(name.to_string());
        })
    }

    pub fn merge(&mut self, other: ClassSymbols) {
        self.defined.extend(other.defined);
        self.used.extend(other.used);
    }

    /// Drop self-references: classes used only by the code that defines them.
    pub fn without_defined(mut self) -> Self {
        let defined = &self.defined;
        self.used.retain(|name| !defined.contains(name));
        self
    }
}

/// Decode one class file and collect its defined and used classes.
pub fn extract_symbols(
    bytes: &[u8],
    options: &ExtractOptions,
) -> Result<ClassSymbols, ClassFileError> {
    let mut symbols = ClassSymbols::default();
    visitor::visit_class(bytes, options, &mut symbols)?;
    Ok(symbols)
}
