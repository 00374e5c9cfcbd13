//! Big-endian byte cursor and constant pool for the class-file format.

use super::ClassFileError;

/// Cursor over a slice of class-file bytes.
///
/// `base` is the absolute offset of the slice inside the class file so
/// that errors raised from nested attribute readers still point at the
/// right byte.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassFileError::Truncated {
                offset: self.offset(),
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.bytes(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, ClassFileError> {
        Ok(self.u32()? as i32)
    }

    /// Split off the next `len` bytes as an independent reader.
    pub(crate) fn sub(&mut self, len: usize) -> Result<ByteReader<'a>, ClassFileError> {
        let base = self.offset();
        let data = self.bytes(len)?;
        Ok(ByteReader { data, pos: 0, base })
    }
}

/// One constant pool slot.
///
/// Numeric and string literals carry no type references and are kept as
/// opaque placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Constant {
    /// Index 0 and the upper half of `Long` / `Double` entries.
    Unusable,
    Utf8(String),
    Literal,
    Class { name: u16 },
    String { value: u16 },
    MemberRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let index = entries.len();
            let tag = reader.u8()?;
            let constant = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(decode_modified_utf8(reader.bytes(len)?))
                }
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Literal
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Literal);
                    Constant::Unusable
                }
                7 => Constant::Class { name: reader.u16()? },
                8 => Constant::String {
                    value: reader.u16()?,
                },
                9..=11 => Constant::MemberRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                12 => Constant::NameAndType {
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                },
                15 => Constant::MethodHandle {
                    kind: reader.u8()?,
                    reference: reader.u16()?,
                },
                16 => Constant::MethodType {
                    descriptor: reader.u16()?,
                },
                17 => Constant::Dynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                19 => Constant::Module { name: reader.u16()? },
                20 => Constant::Package { name: reader.u16()? },
                _ => return Err(ClassFileError::UnknownConstantTag { tag, index }),
            };
            entries.push(constant);
        }

        // A trailing Long/Double may push one placeholder past `count`.
        entries.truncate(count.max(1));
        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(ClassFileError::BadConstant {
                index,
                expected: "usable entry",
            }),
            Some(constant) => Ok(constant),
        }
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal name (or array descriptor) referenced by a `Class` entry.
    pub(crate) fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// `(name, descriptor)` of a `NameAndType` entry.
    pub(crate) fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// `(owner, descriptor)` of a field, method or interface method reference.
    pub(crate) fn member_ref(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            Constant::MemberRef {
                class,
                name_and_type,
            } => {
                let owner = self.class_name(*class)?;
                let (_, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((owner, descriptor))
            }
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "Fieldref/Methodref",
            }),
        }
    }

    /// `(owner, descriptor)` of the member a `MethodHandle` entry points at.
    pub(crate) fn method_handle(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            Constant::MethodHandle { reference, .. } => self.member_ref(*reference),
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "MethodHandle",
            }),
        }
    }

    /// `(bootstrap method attribute index, descriptor)` of an `InvokeDynamic` entry.
    pub(crate) fn invoke_dynamic(&self, index: u16) -> Result<(u16, &str), ClassFileError> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                let (_, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((*bootstrap, descriptor))
            }
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "InvokeDynamic",
            }),
        }
    }
}

/// Decode the JVM's modified UTF-8 (`0xC0 0x80` for NUL, surrogate pairs
/// encoded as two three-byte sequences).
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            units.push((((b & 0x1F) as u16) << 6) | (bytes[i + 1] & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            units.push(
                (((b & 0x0F) as u16) << 12)
                    | (((bytes[i + 1] & 0x3F) as u16) << 6)
                    | (bytes[i + 2] & 0x3F) as u16,
            );
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}
