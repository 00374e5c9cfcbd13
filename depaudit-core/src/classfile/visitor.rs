//! Single pass over a class file, pushing names into a [`ClassSymbols`].

use super::annotations;
use super::code::{self, CodeContext};
use super::reader::{ByteReader, ConstantPool};
use super::{ClassFileError, ClassSymbols, ExtractOptions};

const MAGIC: u32 = 0xCAFE_BABE;

struct Attribute<'p, 'a> {
    name: &'p str,
    body: ByteReader<'a>,
}

struct Member<'p, 'a> {
    descriptor: &'p str,
    attributes: Vec<Attribute<'p, 'a>>,
}

pub(super) fn visit_class(
    bytes: &[u8],
    options: &ExtractOptions,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }
    reader.skip(4)?;
    let pool = ConstantPool::parse(&mut reader)?;

    reader.skip(2)?;
    let this_class = pool.class_name(reader.u16()?)?;
    symbols.add_definition(this_class);

    // java/lang/Object and module-info have no superclass
    let super_class = reader.u16()?;
    if super_class != 0 {
        symbols.add_class(pool.class_name(super_class)?)?;
    }
    let interfaces = reader.u16()?;
    for _ in 0..interfaces {
        symbols.add_class(pool.class_name(reader.u16()?)?)?;
    }

    // Method bodies need BootstrapMethods, which trails the members.
    let fields = members(&mut reader, &pool)?;
    let methods = members(&mut reader, &pool)?;
    let class_attributes = attributes(&mut reader, &pool)?;

    let mut bootstrap = Vec::new();
    for mut attribute in class_attributes {
        match attribute.name {
            "BootstrapMethods" => bootstrap = bootstrap_methods(&mut attribute.body)?,
            "InnerClasses" => inner_classes(&mut attribute.body, &pool, this_class, symbols)?,
            _ => visit_annotation_attribute(&mut attribute, &pool, symbols)?,
        }
    }

    for field in fields {
        symbols.add_descriptor(field.descriptor)?;
        for mut attribute in field.attributes {
            visit_annotation_attribute(&mut attribute, &pool, symbols)?;
        }
    }

    let cx = CodeContext {
        pool: &pool,
        bootstrap: &bootstrap,
        options,
    };
    for method in methods {
        symbols.add_descriptor(method.descriptor)?;
        for mut attribute in method.attributes {
            match attribute.name {
                "Code" => code::visit_code(&mut attribute.body, &cx, symbols)?,
                "AnnotationDefault" => {
                    annotations::element_value(&mut attribute.body, &pool, symbols)?
                }
                "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                    annotations::parameter_annotations(&mut attribute.body, &pool, symbols)?
                }
                _ => visit_annotation_attribute(&mut attribute, &pool, symbols)?,
            }
        }
    }
    Ok(())
}

/// Handle the annotation attributes shared by classes, fields and methods.
fn visit_annotation_attribute(
    attribute: &mut Attribute<'_, '_>,
    pool: &ConstantPool,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    match attribute.name {
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
            annotations::annotations(&mut attribute.body, pool, symbols)
        }
        "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
            annotations::type_annotations(&mut attribute.body, pool, symbols)
        }
        _ => Ok(()),
    }
}

fn members<'p, 'a>(
    reader: &mut ByteReader<'a>,
    pool: &'p ConstantPool,
) -> Result<Vec<Member<'p, 'a>>, ClassFileError> {
    let count = reader.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        reader.skip(4)?;
        let descriptor = pool.utf8(reader.u16()?)?;
        let attributes = attributes(reader, pool)?;
        members.push(Member {
            descriptor,
            attributes,
        });
    }
    Ok(members)
}

fn attributes<'p, 'a>(
    reader: &mut ByteReader<'a>,
    pool: &'p ConstantPool,
) -> Result<Vec<Attribute<'p, 'a>>, ClassFileError> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(reader.u16()?)?;
        let length = reader.u32()? as usize;
        let body = reader.sub(length)?;
        attributes.push(Attribute { name, body });
    }
    Ok(attributes)
}

fn bootstrap_methods(reader: &mut ByteReader<'_>) -> Result<Vec<u16>, ClassFileError> {
    let count = reader.u16()?;
    let mut handles = Vec::with_capacity(count as usize);
    for _ in 0..count {
        handles.push(reader.u16()?);
        let arguments = reader.u16()? as usize;
        reader.skip(arguments * 2)?;
    }
    Ok(handles)
}

/// Record nested classes declared by this class, and anonymous or local
/// classes (no outer class) listed in its own InnerClasses table.
fn inner_classes(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    this_class: &str,
    symbols: &mut ClassSymbols,
) -> Result<(), ClassFileError> {
    let count = reader.u16()?;
    for _ in 0..count {
        let inner = reader.u16()?;
        let outer = reader.u16()?;
        reader.skip(4)?;
        let declared_here = outer == 0 || pool.class_name(outer)? == this_class;
        if declared_here {
            symbols.add_definition(pool.class_name(inner)?);
        }
    }
    Ok(())
}
