//! `Code` attribute walker.

use super::annotations;
use super::reader::{ByteReader, ConstantPool};
use super::{ClassFileError, ClassSymbols, ExtractOptions};

mod opcodes {
    pub const IINC: u8 = 0x84;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const GETSTATIC: u8 = 0xb2;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const WIDE: u8 = 0xc4;
    pub const MULTIANEWARRAY: u8 = 0xc5;
}

use opcodes::*;

/// Context shared by every method body of one class.
pub(super) struct CodeContext<'p> {
    pub pool: &'p ConstantPool,
    /// Method handle constant of each `BootstrapMethods` entry.
    pub bootstrap: &'p [u16],
    pub options: &'p ExtractOptions,
}

pub(super) fn visit_code(
    body: &mut ByteReader<'_>,
    cx: &CodeContext<'_>,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    body.skip(4)?;
    let code_length = body.u32()? as usize;
    let mut code = body.sub(code_length)?;
    instructions(&mut code, cx, symbols)?;

    let handlers = body.u16()?;
    for _ in 0..handlers {
        body.skip(6)?;
        // catch_type 0 is a `finally` block
        let catch_type = body.u16()?;
        if catch_type != 0 {
            symbols.add_class(cx.pool.class_name(catch_type)?)?;
        }
    }

    let attributes = body.u16()?;
    for _ in 0..attributes {
        let name = cx.pool.utf8(body.u16()?)?;
        let length = body.u32()? as usize;
        let mut attribute = body.sub(length)?;
        match name {
            "LocalVariableTable" if !cx.options.skip_debug => {
                local_variables(&mut attribute, cx.pool, symbols)?
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                annotations::type_annotations(&mut attribute, cx.pool, symbols)?
            }
            _ => {}
        }
    }
    Ok(())
}

fn instructions(
    code: &mut ByteReader<'_>,
    cx: &CodeContext<'_>,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let pool = cx.pool;
    while !code.is_empty() {
        let pc = code.position();
        let opcode = code.u8()?;
        match opcode {
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                symbols.add_owner(pool.class_name(code.u16()?)?)?;
            }
            GETSTATIC..=INVOKESTATIC | INVOKEINTERFACE => {
                let (owner, descriptor) = pool.member_ref(code.u16()?)?;
                symbols.add_owner(owner)?;
                symbols.add_descriptor(descriptor)?;
                if opcode == INVOKEINTERFACE {
                    code.skip(2)?;
                }
            }
            INVOKEDYNAMIC => {
                let (bootstrap, descriptor) = pool.invoke_dynamic(code.u16()?)?;
                code.skip(2)?;
                symbols.add_descriptor(descriptor)?;
                let handle = cx
                    .bootstrap
                    .get(bootstrap as usize)
                    .ok_or(ClassFileError::MissingBootstrap(bootstrap))?;
                let (owner, handle_descriptor) = pool.method_handle(*handle)?;
                symbols.add_class(owner)?;
                symbols.add_descriptor(handle_descriptor)?;
            }
            MULTIANEWARRAY => {
                symbols.add_owner(pool.class_name(code.u16()?)?)?;
                code.skip(1)?;
            }
            TABLESWITCH => {
                skip_padding(code, pc)?;
                code.skip(4)?;
                let low = code.i32()? as i64;
                let high = code.i32()? as i64;
                let targets = high - low + 1;
                if targets < 0 {
                    return Err(ClassFileError::MalformedSwitch { pc });
                }
                code.skip(targets as usize * 4)?;
            }
            LOOKUPSWITCH => {
                skip_padding(code, pc)?;
                code.skip(4)?;
                let pairs = code.i32()?;
                if pairs < 0 {
                    return Err(ClassFileError::MalformedSwitch { pc });
                }
                code.skip(pairs as usize * 8)?;
            }
            WIDE => {
                let modified = code.u8()?;
                code.skip(if modified == IINC { 4 } else { 2 })?;
            }
            _ => {
                let len = operand_length(opcode)
                    .ok_or(ClassFileError::UnknownOpcode { opcode, pc })?;
                code.skip(len)?;
            }
        }
    }
    Ok(())
}

/// Switch operands start at the next multiple of four from the code start.
fn skip_padding(code: &mut ByteReader<'_>, pc: usize) -> Result<(), ClassFileError> {
    code.skip(3 - pc % 4)
}

/// Operand bytes of every fixed-length instruction without type references.
fn operand_length(opcode: u8) -> Option<usize> {
    let len = match opcode {
        0x00..=0x0f | 0x1a..=0x35 | 0x3b..=0x83 | 0x85..=0x98 | 0xac..=0xb1 => 0,
        0xbe | 0xbf | 0xc2 | 0xc3 => 0,
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 1,
        0x11 | 0x13 | 0x14 | IINC | 0x99..=0xa8 | 0xc6 | 0xc7 => 2,
        0xc8 | 0xc9 => 4,
        _ => return None,
    };
    Some(len)
}

fn local_variables(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let count = reader.u16()?;
    for _ in 0..count {
        reader.skip(6)?;
        let descriptor = reader.u16()?;
        reader.skip(2)?;
        symbols.add_descriptor(pool.utf8(descriptor)?)?;
    }
    Ok(())
}
