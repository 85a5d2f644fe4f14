//! Lossless parse and canonical serialization of one class file.

use crate::error::FormatError;
use crate::pool::ConstantPool;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

/// The class-file magic number.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Declared public.
pub const ACC_PUBLIC: u16 = 0x0001;
/// Declared private.
pub const ACC_PRIVATE: u16 = 0x0002;
/// Declared protected.
pub const ACC_PROTECTED: u16 = 0x0004;
/// Declared static.
pub const ACC_STATIC: u16 = 0x0008;
/// Declared final.
pub const ACC_FINAL: u16 = 0x0010;
/// Treat superclass methods specially in `invokespecial`.
pub const ACC_SUPER: u16 = 0x0020;
/// The type is an interface.
pub const ACC_INTERFACE: u16 = 0x0200;
/// Declared abstract.
pub const ACC_ABSTRACT: u16 = 0x0400;
/// Not present in the source code.
pub const ACC_SYNTHETIC: u16 = 0x1000;
/// Declared as an enum.
pub const ACC_ENUM: u16 = 0x4000;

/// Declared format version of a class file.
///
/// Field order matches the file layout (minor before major), so the struct
/// deliberately carries no ordering; version policy compares majors only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassVersion {
    /// Minor version (preview releases use 0xFFFF).
    pub minor: u16,
    /// Major version (45 = Java 1.1, 65 = Java 21).
    pub major: u16,
}

/// One attribute with its payload kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Pool index of the attribute's Utf8 name.
    pub name_index: u16,
    /// Raw payload bytes.
    pub info: Vec<u8>,
}

/// One field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Access and property flags.
    pub access_flags: u16,
    /// Pool index of the Utf8 name.
    pub name_index: u16,
    /// Pool index of the Utf8 descriptor.
    pub descriptor_index: u16,
    /// Member attributes, payloads raw.
    pub attributes: Vec<AttributeInfo>,
}

/// The class declaration: everything between the constant pool and the
/// member tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    /// Declared format version.
    pub version: ClassVersion,
    /// Class access and property flags.
    pub access_flags: u16,
    /// Pool index of this class's Class entry.
    pub this_class: u16,
    /// Pool index of the superclass's Class entry, 0 for `java/lang/Object`.
    pub super_class: u16,
    /// Pool indices of directly implemented interfaces.
    pub interfaces: Vec<u16>,
}

/// A fully parsed class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// The constant pool.
    pub constant_pool: ConstantPool,
    /// Version, flags, hierarchy.
    pub decl: ClassDecl,
    /// Declared fields.
    pub fields: Vec<MemberInfo>,
    /// Declared methods.
    pub methods: Vec<MemberInfo>,
    /// Class-level attributes.
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Parses a complete class file, rejecting trailing bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = Cursor::new(bytes);
        let magic = cursor.read_u32::<BigEndian>()?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic(magic));
        }
        let minor = cursor.read_u16::<BigEndian>()?;
        let major = cursor.read_u16::<BigEndian>()?;
        let constant_pool = ConstantPool::parse(&mut cursor)?;
        let access_flags = cursor.read_u16::<BigEndian>()?;
        let this_class = cursor.read_u16::<BigEndian>()?;
        let super_class = cursor.read_u16::<BigEndian>()?;
        let interface_count = cursor.read_u16::<BigEndian>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(cursor.read_u16::<BigEndian>()?);
        }
        let fields = parse_members(&mut cursor)?;
        let methods = parse_members(&mut cursor)?;
        let attributes = parse_attributes(&mut cursor)?;
        let remaining = bytes.len() as u64 - cursor.position();
        if remaining != 0 {
            return Err(FormatError::TrailingBytes(remaining as usize));
        }
        Ok(Self {
            constant_pool,
            decl: ClassDecl {
                version: ClassVersion { minor, major },
                access_flags,
                this_class,
                super_class,
                interfaces,
            },
            fields,
            methods,
            attributes,
        })
    }

    /// Serializes canonically: reparsing the output yields an equal value,
    /// and a buffer produced by this method round-trips byte-identically.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(MAGIC)?;
        out.write_u16::<BigEndian>(self.decl.version.minor)?;
        out.write_u16::<BigEndian>(self.decl.version.major)?;
        self.constant_pool.write(&mut out)?;
        out.write_u16::<BigEndian>(self.decl.access_flags)?;
        out.write_u16::<BigEndian>(self.decl.this_class)?;
        out.write_u16::<BigEndian>(self.decl.super_class)?;
        write_count(&mut out, self.decl.interfaces.len(), "interfaces")?;
        for interface in &self.decl.interfaces {
            out.write_u16::<BigEndian>(*interface)?;
        }
        write_members(&mut out, &self.fields, "fields")?;
        write_members(&mut out, &self.methods, "methods")?;
        write_attributes(&mut out, &self.attributes, "class attributes")?;
        Ok(out)
    }

    /// Whether the class declares itself interface-like.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.decl.access_flags & ACC_INTERFACE != 0
    }

    /// Internal (slash-separated) name of this class.
    pub fn class_name(&self) -> Result<String, FormatError> {
        self.constant_pool.class_name_at(self.decl.this_class)
    }
}

fn parse_attributes(cursor: &mut Cursor<&[u8]>) -> Result<Vec<AttributeInfo>, FormatError> {
    let count = cursor.read_u16::<BigEndian>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = cursor.read_u16::<BigEndian>()?;
        let length = cursor.read_u32::<BigEndian>()? as usize;
        let mut info = vec![0u8; length];
        cursor.read_exact(&mut info)?;
        attributes.push(AttributeInfo { name_index, info });
    }
    Ok(attributes)
}

fn parse_members(cursor: &mut Cursor<&[u8]>) -> Result<Vec<MemberInfo>, FormatError> {
    let count = cursor.read_u16::<BigEndian>()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = cursor.read_u16::<BigEndian>()?;
        let name_index = cursor.read_u16::<BigEndian>()?;
        let descriptor_index = cursor.read_u16::<BigEndian>()?;
        let attributes = parse_attributes(cursor)?;
        members.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

fn write_count(out: &mut Vec<u8>, len: usize, kind: &'static str) -> Result<(), FormatError> {
    if len > u16::MAX as usize {
        return Err(FormatError::CountOverflow(kind));
    }
    out.write_u16::<BigEndian>(len as u16)?;
    Ok(())
}

fn write_attributes(
    out: &mut Vec<u8>,
    attributes: &[AttributeInfo],
    kind: &'static str,
) -> Result<(), FormatError> {
    write_count(out, attributes.len(), kind)?;
    for attribute in attributes {
        if attribute.info.len() > u32::MAX as usize {
            return Err(FormatError::CountOverflow("attribute payload bytes"));
        }
        out.write_u16::<BigEndian>(attribute.name_index)?;
        out.write_u32::<BigEndian>(attribute.info.len() as u32)?;
        out.extend_from_slice(&attribute.info);
    }
    Ok(())
}

fn write_members(
    out: &mut Vec<u8>,
    members: &[MemberInfo],
    kind: &'static str,
) -> Result<(), FormatError> {
    write_count(out, members.len(), kind)?;
    for member in members {
        out.write_u16::<BigEndian>(member.access_flags)?;
        out.write_u16::<BigEndian>(member.name_index)?;
        out.write_u16::<BigEndian>(member.descriptor_index)?;
        write_attributes(out, &member.attributes, "member attributes")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ConstantEntry;
    use pretty_assertions::assert_eq;

    fn sample_class(major: u16, access_flags: u16) -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class("demo/Sample").unwrap();
        let super_class = pool.intern_class("java/lang/Object").unwrap();
        let greeting = pool.intern_utf8("greeting").unwrap();
        pool.push(ConstantEntry::String {
            utf8_index: greeting,
        })
        .unwrap();
        ClassFile {
            constant_pool: pool,
            decl: ClassDecl {
                version: ClassVersion { minor: 0, major },
                access_flags,
                this_class,
                super_class,
                interfaces: Vec::new(),
            },
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn parse_rejects_bad_magic() {
        let bytes = vec![0u8; 16];
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(FormatError::BadMagic(0))
        ));
    }

    #[test]
    fn parse_rejects_trailing_bytes() {
        let mut bytes = sample_class(52, ACC_PUBLIC).serialize().unwrap();
        bytes.push(0xFF);
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(FormatError::TrailingBytes(1))
        ));
    }

    #[test]
    fn serialize_then_parse_is_lossless() {
        let class = sample_class(61, ACC_PUBLIC | ACC_SUPER);
        let bytes = class.serialize().unwrap();
        let reparsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class, reparsed);
        // Canonical: a second serialization is byte-identical.
        assert_eq!(bytes, reparsed.serialize().unwrap());
    }

    #[test]
    fn interface_flag_is_reported() {
        let class = sample_class(52, ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
        assert!(class.is_interface());
        assert!(!sample_class(52, ACC_PUBLIC).is_interface());
    }

    #[test]
    fn class_name_resolves_through_the_pool() {
        let class = sample_class(52, ACC_PUBLIC);
        assert_eq!(class.class_name().unwrap(), "demo/Sample");
    }

    #[test]
    fn truncated_input_is_an_io_error() {
        let bytes = sample_class(52, ACC_PUBLIC).serialize().unwrap();
        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 3]),
            Err(FormatError::Io(_))
        ));
    }
}
