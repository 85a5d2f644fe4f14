//! Constant pool model: typed entries, wide-slot bookkeeping, interning.

use crate::error::FormatError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

/// One constant pool entry.
///
/// `Utf8` keeps the raw modified-UTF-8 bytes so unusual encodings survive a
/// parse/serialize round trip. `Float`/`Double` keep raw IEEE-754 bits for
/// the same reason (NaN payloads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantEntry {
    /// Tag 1.
    Utf8(Vec<u8>),
    /// Tag 3.
    Integer(i32),
    /// Tag 4, raw bits.
    Float(u32),
    /// Tag 5, occupies two slots.
    Long(i64),
    /// Tag 6, raw bits, occupies two slots.
    Double(u64),
    /// Tag 7.
    Class {
        /// Index of the Utf8 internal name.
        name_index: u16,
    },
    /// Tag 8, a textual literal.
    String {
        /// Index of the Utf8 text.
        utf8_index: u16,
    },
    /// Tag 9.
    Fieldref {
        /// Index of the owning Class entry.
        class_index: u16,
        /// Index of the NameAndType entry.
        name_and_type_index: u16,
    },
    /// Tag 10.
    Methodref {
        /// Index of the owning Class entry.
        class_index: u16,
        /// Index of the NameAndType entry.
        name_and_type_index: u16,
    },
    /// Tag 11.
    InterfaceMethodref {
        /// Index of the owning Class entry.
        class_index: u16,
        /// Index of the NameAndType entry.
        name_and_type_index: u16,
    },
    /// Tag 12.
    NameAndType {
        /// Index of the Utf8 name.
        name_index: u16,
        /// Index of the Utf8 descriptor.
        descriptor_index: u16,
    },
    /// Tag 15.
    MethodHandle {
        /// Reference kind (1-9).
        kind: u8,
        /// Index of the referenced member entry.
        reference_index: u16,
    },
    /// Tag 16.
    MethodType {
        /// Index of the Utf8 descriptor.
        descriptor_index: u16,
    },
    /// Tag 17.
    Dynamic {
        /// Index into the BootstrapMethods attribute.
        bootstrap_method_attr_index: u16,
        /// Index of the NameAndType entry.
        name_and_type_index: u16,
    },
    /// Tag 18.
    InvokeDynamic {
        /// Index into the BootstrapMethods attribute.
        bootstrap_method_attr_index: u16,
        /// Index of the NameAndType entry.
        name_and_type_index: u16,
    },
    /// Tag 19.
    Module {
        /// Index of the Utf8 module name.
        name_index: u16,
    },
    /// Tag 20.
    Package {
        /// Index of the Utf8 package name.
        name_index: u16,
    },
}

impl ConstantEntry {
    /// Long and Double entries occupy two pool slots.
    fn is_wide(&self) -> bool {
        matches!(self, ConstantEntry::Long(_) | ConstantEntry::Double(_))
    }
}

/// The class file's constant pool.
///
/// Slot 0 is unusable and wide entries (Long/Double) shadow the slot after
/// them; both are held as `None` so stored indices match file indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Option<ConstantEntry>>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// An empty pool (count 1: only the unusable slot 0).
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![None],
        }
    }

    /// The count field as written to the file.
    #[must_use]
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    /// Entry at a file index, `None` for slot 0, shadow slots, and
    /// out-of-range indices.
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&ConstantEntry> {
        self.entries.get(index as usize).and_then(Option::as_ref)
    }

    /// Raw bytes of the Utf8 entry at `index`.
    pub fn utf8_at(&self, index: u16) -> Result<&[u8], FormatError> {
        match self.get(index) {
            Some(ConstantEntry::Utf8(bytes)) => Ok(bytes),
            _ => Err(FormatError::BadPoolIndex {
                index,
                expected: "a Utf8 entry",
            }),
        }
    }

    /// Internal name referenced by the Class entry at `index`.
    pub fn class_name_at(&self, index: u16) -> Result<String, FormatError> {
        match self.get(index) {
            Some(ConstantEntry::Class { name_index }) => Ok(String::from_utf8_lossy(
                self.utf8_at(*name_index)?,
            )
            .into_owned()),
            _ => Err(FormatError::BadPoolIndex {
                index,
                expected: "a Class entry",
            }),
        }
    }

    /// Appends an entry, reserving the shadow slot for wide entries.
    pub fn push(&mut self, entry: ConstantEntry) -> Result<u16, FormatError> {
        let width = if entry.is_wide() { 2 } else { 1 };
        if self.entries.len() + width > u16::MAX as usize {
            return Err(FormatError::PoolExhausted);
        }
        let index = self.entries.len() as u16;
        let wide = entry.is_wide();
        self.entries.push(Some(entry));
        if wide {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Index of a Utf8 entry with this text, reusing an existing entry.
    pub fn intern_utf8(&mut self, text: &str) -> Result<u16, FormatError> {
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(ConstantEntry::Utf8(bytes)) = entry {
                if bytes.as_slice() == text.as_bytes() {
                    return Ok(index as u16);
                }
            }
        }
        self.push(ConstantEntry::Utf8(text.as_bytes().to_vec()))
    }

    /// Index of a Class entry for this internal name, reusing existing
    /// entries.
    pub fn intern_class(&mut self, internal_name: &str) -> Result<u16, FormatError> {
        let name_index = self.intern_utf8(internal_name)?;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry == &Some(ConstantEntry::Class { name_index }) {
                return Ok(index as u16);
            }
        }
        self.push(ConstantEntry::Class { name_index })
    }

    /// Index of a NameAndType entry, reusing existing entries.
    pub fn intern_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, FormatError> {
        let name_index = self.intern_utf8(name)?;
        let descriptor_index = self.intern_utf8(descriptor)?;
        let wanted = ConstantEntry::NameAndType {
            name_index,
            descriptor_index,
        };
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.as_ref() == Some(&wanted) {
                return Ok(index as u16);
            }
        }
        self.push(wanted)
    }

    /// Index of a Methodref entry, reusing existing entries.
    pub fn intern_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, FormatError> {
        let class_index = self.intern_class(owner)?;
        let name_and_type_index = self.intern_name_and_type(name, descriptor)?;
        let wanted = ConstantEntry::Methodref {
            class_index,
            name_and_type_index,
        };
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.as_ref() == Some(&wanted) {
                return Ok(index as u16);
            }
        }
        self.push(wanted)
    }

    /// Every `CONSTANT_String` text in table order, duplicates preserved.
    pub fn string_constants(&self) -> Result<Vec<String>, FormatError> {
        let mut strings = Vec::new();
        for entry in self.entries.iter().flatten() {
            if let ConstantEntry::String { utf8_index } = entry {
                strings.push(String::from_utf8_lossy(self.utf8_at(*utf8_index)?).into_owned());
            }
        }
        Ok(strings)
    }

    pub(crate) fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, FormatError> {
        let count = cursor.read_u16::<BigEndian>()?;
        let mut entries: Vec<Option<ConstantEntry>> = Vec::with_capacity(count as usize);
        entries.push(None);
        // u32 so a wide entry in the last slot cannot wrap the counter.
        let mut index = 1u32;
        while index < u32::from(count) {
            let tag = cursor.read_u8()?;
            let entry = match tag {
                1 => {
                    let length = cursor.read_u16::<BigEndian>()? as usize;
                    let mut bytes = vec![0u8; length];
                    cursor.read_exact(&mut bytes)?;
                    ConstantEntry::Utf8(bytes)
                }
                3 => ConstantEntry::Integer(cursor.read_i32::<BigEndian>()?),
                4 => ConstantEntry::Float(cursor.read_u32::<BigEndian>()?),
                5 => ConstantEntry::Long(cursor.read_i64::<BigEndian>()?),
                6 => ConstantEntry::Double(cursor.read_u64::<BigEndian>()?),
                7 => ConstantEntry::Class {
                    name_index: cursor.read_u16::<BigEndian>()?,
                },
                8 => ConstantEntry::String {
                    utf8_index: cursor.read_u16::<BigEndian>()?,
                },
                9 => ConstantEntry::Fieldref {
                    class_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                10 => ConstantEntry::Methodref {
                    class_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                11 => ConstantEntry::InterfaceMethodref {
                    class_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                12 => ConstantEntry::NameAndType {
                    name_index: cursor.read_u16::<BigEndian>()?,
                    descriptor_index: cursor.read_u16::<BigEndian>()?,
                },
                15 => ConstantEntry::MethodHandle {
                    kind: cursor.read_u8()?,
                    reference_index: cursor.read_u16::<BigEndian>()?,
                },
                16 => ConstantEntry::MethodType {
                    descriptor_index: cursor.read_u16::<BigEndian>()?,
                },
                17 => ConstantEntry::Dynamic {
                    bootstrap_method_attr_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                18 => ConstantEntry::InvokeDynamic {
                    bootstrap_method_attr_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                19 => ConstantEntry::Module {
                    name_index: cursor.read_u16::<BigEndian>()?,
                },
                20 => ConstantEntry::Package {
                    name_index: cursor.read_u16::<BigEndian>()?,
                },
                tag => {
                    return Err(FormatError::UnknownTag {
                        tag,
                        index: index as u16,
                    })
                }
            };
            let wide = entry.is_wide();
            entries.push(Some(entry));
            if wide {
                entries.push(None);
                index += 2;
            } else {
                index += 1;
            }
        }
        // A wide entry in the final slot would need a shadow slot beyond the
        // u16 index space.
        if entries.len() > u16::MAX as usize {
            return Err(FormatError::PoolExhausted);
        }
        Ok(Self { entries })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), FormatError> {
        out.write_u16::<BigEndian>(self.count())?;
        for entry in self.entries.iter().flatten() {
            match entry {
                ConstantEntry::Utf8(bytes) => {
                    if bytes.len() > u16::MAX as usize {
                        return Err(FormatError::CountOverflow("Utf8 bytes"));
                    }
                    out.write_u8(1)?;
                    out.write_u16::<BigEndian>(bytes.len() as u16)?;
                    out.extend_from_slice(bytes);
                }
                ConstantEntry::Integer(value) => {
                    out.write_u8(3)?;
                    out.write_i32::<BigEndian>(*value)?;
                }
                ConstantEntry::Float(bits) => {
                    out.write_u8(4)?;
                    out.write_u32::<BigEndian>(*bits)?;
                }
                ConstantEntry::Long(value) => {
                    out.write_u8(5)?;
                    out.write_i64::<BigEndian>(*value)?;
                }
                ConstantEntry::Double(bits) => {
                    out.write_u8(6)?;
                    out.write_u64::<BigEndian>(*bits)?;
                }
                ConstantEntry::Class { name_index } => {
                    out.write_u8(7)?;
                    out.write_u16::<BigEndian>(*name_index)?;
                }
                ConstantEntry::String { utf8_index } => {
                    out.write_u8(8)?;
                    out.write_u16::<BigEndian>(*utf8_index)?;
                }
                ConstantEntry::Fieldref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.write_u8(9)?;
                    out.write_u16::<BigEndian>(*class_index)?;
                    out.write_u16::<BigEndian>(*name_and_type_index)?;
                }
                ConstantEntry::Methodref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.write_u8(10)?;
                    out.write_u16::<BigEndian>(*class_index)?;
                    out.write_u16::<BigEndian>(*name_and_type_index)?;
                }
                ConstantEntry::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.write_u8(11)?;
                    out.write_u16::<BigEndian>(*class_index)?;
                    out.write_u16::<BigEndian>(*name_and_type_index)?;
                }
                ConstantEntry::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    out.write_u8(12)?;
                    out.write_u16::<BigEndian>(*name_index)?;
                    out.write_u16::<BigEndian>(*descriptor_index)?;
                }
                ConstantEntry::MethodHandle {
                    kind,
                    reference_index,
                } => {
                    out.write_u8(15)?;
                    out.write_u8(*kind)?;
                    out.write_u16::<BigEndian>(*reference_index)?;
                }
                ConstantEntry::MethodType { descriptor_index } => {
                    out.write_u8(16)?;
                    out.write_u16::<BigEndian>(*descriptor_index)?;
                }
                ConstantEntry::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.write_u8(17)?;
                    out.write_u16::<BigEndian>(*bootstrap_method_attr_index)?;
                    out.write_u16::<BigEndian>(*name_and_type_index)?;
                }
                ConstantEntry::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.write_u8(18)?;
                    out.write_u16::<BigEndian>(*bootstrap_method_attr_index)?;
                    out.write_u16::<BigEndian>(*name_and_type_index)?;
                }
                ConstantEntry::Module { name_index } => {
                    out.write_u8(19)?;
                    out.write_u16::<BigEndian>(*name_index)?;
                }
                ConstantEntry::Package { name_index } => {
                    out.write_u8(20)?;
                    out.write_u16::<BigEndian>(*name_index)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn intern_utf8_reuses_existing_entry() {
        let mut pool = ConstantPool::new();
        let first = pool.intern_utf8("hello").unwrap();
        let second = pool.intern_utf8("hello").unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn intern_class_builds_utf8_and_class_entries() {
        let mut pool = ConstantPool::new();
        let index = pool.intern_class("java/lang/Object").unwrap();
        assert_eq!(pool.class_name_at(index).unwrap(), "java/lang/Object");
        // Interning again adds nothing.
        let again = pool.intern_class("java/lang/Object").unwrap();
        assert_eq!(index, again);
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn wide_entries_occupy_two_slots() {
        let mut pool = ConstantPool::new();
        let long_index = pool.push(ConstantEntry::Long(7)).unwrap();
        let next = pool.intern_utf8("after").unwrap();
        assert_eq!(long_index, 1);
        assert_eq!(next, 3);
        assert!(pool.get(2).is_none());
    }

    #[test]
    fn string_constants_preserve_order_and_duplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_utf8("alpha").unwrap();
        let b = pool.intern_utf8("beta").unwrap();
        pool.push(ConstantEntry::String { utf8_index: b }).unwrap();
        pool.push(ConstantEntry::String { utf8_index: a }).unwrap();
        pool.push(ConstantEntry::String { utf8_index: b }).unwrap();
        assert_eq!(
            pool.string_constants().unwrap(),
            vec!["beta".to_string(), "alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn string_with_dangling_utf8_index_is_an_error() {
        let mut pool = ConstantPool::new();
        pool.push(ConstantEntry::String { utf8_index: 99 }).unwrap();
        assert!(matches!(
            pool.string_constants(),
            Err(FormatError::BadPoolIndex { index: 99, .. })
        ));
    }

    #[test]
    fn wide_entry_in_the_final_slot_is_rejected() {
        // count 65535 with a Long at index 65534: its shadow slot would sit
        // outside the u16 index space.
        let mut bytes = Vec::new();
        bytes.write_u16::<BigEndian>(u16::MAX).unwrap();
        for value in 0..i32::from(u16::MAX) - 2 {
            bytes.write_u8(3).unwrap();
            bytes.write_i32::<BigEndian>(value).unwrap();
        }
        bytes.write_u8(5).unwrap();
        bytes.write_i64::<BigEndian>(0).unwrap();
        let mut cursor = Cursor::new(bytes.as_slice());
        assert!(matches!(
            ConstantPool::parse(&mut cursor),
            Err(FormatError::PoolExhausted)
        ));
    }

    #[test]
    fn round_trip_preserves_entries() {
        let mut pool = ConstantPool::new();
        pool.intern_method_ref("java/lang/Object", "<init>", "()V")
            .unwrap();
        pool.push(ConstantEntry::Double(std::f64::consts::PI.to_bits()))
            .unwrap();
        let mut bytes = Vec::new();
        pool.write(&mut bytes).unwrap();
        let mut cursor = Cursor::new(bytes.as_slice());
        let reparsed = ConstantPool::parse(&mut cursor).unwrap();
        assert_eq!(pool, reparsed);
    }
}
