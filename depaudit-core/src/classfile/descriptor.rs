//! Field and method descriptor decoding.

use super::ClassFileError;

/// Call `f` with the internal name of every object type mentioned by a
/// field or method descriptor.
///
/// Array element types are unwrapped; primitive types and `V` produce
/// nothing.
pub(crate) fn for_each_class<F>(descriptor: &str, mut f: F) -> Result<(), ClassFileError>
where
    F: FnMut(&str),
{
    let bytes = descriptor.as_bytes();
    let malformed = || ClassFileError::Descriptor(descriptor.to_string());

    let end = if bytes.first() == Some(&b'(') {
        let mut pos = 1;
        while bytes.get(pos).is_some_and(|b| *b != b')') {
            pos = field_type(descriptor, pos, &mut f)?;
        }
        if pos >= bytes.len() {
            return Err(malformed());
        }
        pos += 1;
        match bytes.get(pos) {
            Some(b'V') => pos + 1,
            Some(_) => field_type(descriptor, pos, &mut f)?,
            None => return Err(malformed()),
        }
    } else {
        field_type(descriptor, 0, &mut f)?
    };

    if end != bytes.len() {
        return Err(malformed());
    }
    Ok(())
}

/// Decode one field type starting at `pos`, returning the position after it.
fn field_type<F>(descriptor: &str, mut pos: usize, f: &mut F) -> Result<usize, ClassFileError>
where
    F: FnMut(&str),
{
    let bytes = descriptor.as_bytes();
    while bytes.get(pos) == Some(&b'[') {
        pos += 1;
    }
    match bytes.get(pos) {
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => Ok(pos + 1),
        Some(b'L') => {
            let start = pos + 1;
            let semi = descriptor[start..]
                .find(';')
                .map(|i| start + i)
                .filter(|semi| *semi > start)
                .ok_or_else(|| ClassFileError::Descriptor(descriptor.to_string()))?;
            f(&descriptor[start..semi]);
            Ok(semi + 1)
        }
        _ => Err(ClassFileError::Descriptor(descriptor.to_string())),
    }
}

/// `java/util/Map$Entry` -> `java.util.Map$Entry`
pub fn to_external_name(internal: &str) -> String {
    internal.replace('/', ".")
}
