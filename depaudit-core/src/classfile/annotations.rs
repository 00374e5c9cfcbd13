//! Walkers for the annotation attributes.
//!
//! Annotation types, enum constant types and nested annotations all need
//! their classes loaded, so each descriptor is recorded. Class literals
//! (`c` elements) and primitive constants are not.

use super::reader::{ByteReader, ConstantPool};
use super::{ClassFileError, ClassSymbols};

/// `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations`.
pub(super) fn annotations(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let count = reader.u16()?;
    for _ in 0..count {
        annotation(reader, pool, symbols)?;
    }
    Ok(())
}

/// `RuntimeVisibleParameterAnnotations` / `RuntimeInvisibleParameterAnnotations`.
pub(super) fn parameter_annotations(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let parameters = reader.u8()?;
    for _ in 0..parameters {
        annotations(reader, pool, symbols)?;
    }
    Ok(())
}

/// `RuntimeVisibleTypeAnnotations` / `RuntimeInvisibleTypeAnnotations`.
///
/// Annotations targeting a single instruction are parsed but not recorded.
pub(super) fn type_annotations(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let count = reader.u16()?;
    for _ in 0..count {
        let target = reader.u8()?;
        skip_target_info(reader, target)?;
        let path_length = reader.u8()? as usize;
        reader.skip(path_length * 2)?;

        if is_instruction_target(target) {
            annotation(reader, pool, &mut ClassSymbols::default())?;
        } else {
            annotation(reader, pool, symbols)?;
        }
    }
    Ok(())
}

/// One `element_value`, also the body of `AnnotationDefault`.
pub(super) fn element_value(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let tag = reader.u8()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            reader.skip(2)?;
        }
        b'e' => {
            let type_name = reader.u16()?;
            reader.skip(2)?;
            symbols.add_descriptor(pool.utf8(type_name)?)?;
        }
        b'@' => annotation(reader, pool, symbols)?,
        b'[' => {
            let count = reader.u16()?;
            for _ in 0..count {
                element_value(reader, pool, symbols)?;
            }
        }
        other => return Err(ClassFileError::ElementTag(other as char)),
    }
    Ok(())
}

fn annotation(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let type_index = reader.u16()?;
    symbols.add_descriptor(pool.utf8(type_index)?)?;
    let pairs = reader.u16()?;
    for _ in 0..pairs {
        reader.skip(2)?;
        element_value(reader, pool, symbols)?;
    }
    Ok(())
}

fn is_instruction_target(target: u8) -> bool {
    (0x43..=0x4B).contains(&target)
}

fn skip_target_info(reader: &mut ByteReader<'_>, target: u8) -> Result<(), ClassFileError> {
    match target {
        0x00 | 0x01 | 0x16 => reader.skip(1),
        0x10..=0x12 | 0x17 | 0x42..=0x46 => reader.skip(2),
        0x13..=0x15 => Ok(()),
        0x40 | 0x41 => {
            let entries = reader.u16()? as usize;
            reader.skip(entries * 6)
        }
        0x47..=0x4B => reader.skip(3),
        other => Err(ClassFileError::TypeAnnotationTarget(other)),
    }
}
