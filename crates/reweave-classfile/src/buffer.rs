//! The per-artifact buffer with memoized structural views.

use crate::classfile::{ClassFile, ClassVersion};
use crate::error::FormatError;
use std::cell::OnceCell;

/// An immutable-until-replaced class buffer.
///
/// The parsed view and the constant-string extraction are both produced
/// lazily on first access and memoized; [`ClassBuffer::replace`] installs a
/// new buffer and clears both memos in the same `&mut self` call, so a stale
/// view can never be observed after a mutation.
///
/// Owned exclusively by one pipeline invocation; never shared across
/// threads.
#[derive(Debug)]
pub struct ClassBuffer {
    bytes: Vec<u8>,
    parsed: OnceCell<ClassFile>,
    constants: OnceCell<Vec<String>>,
}

impl ClassBuffer {
    /// Wraps raw class bytes. Nothing is parsed until a view is requested.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            parsed: OnceCell::new(),
            constants: OnceCell::new(),
        }
    }

    /// The current raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer, returning the current bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The parsed class file, memoized until the next replacement.
    ///
    /// A parse failure is not memoized; every call over a broken buffer
    /// reports the error again.
    pub fn parsed(&self) -> Result<&ClassFile, FormatError> {
        if let Some(class) = self.parsed.get() {
            return Ok(class);
        }
        let class = ClassFile::parse(&self.bytes)?;
        Ok(self.parsed.get_or_init(|| class))
    }

    /// Whether the buffer declares an interface-like type.
    pub fn is_interface(&self) -> Result<bool, FormatError> {
        Ok(self.parsed()?.is_interface())
    }

    /// The declared format version.
    pub fn version(&self) -> Result<ClassVersion, FormatError> {
        Ok(self.parsed()?.decl.version)
    }

    /// Every textual constant-table literal in table order, duplicates
    /// preserved; memoized until the next replacement.
    pub fn constant_strings(&self) -> Result<&[String], FormatError> {
        if let Some(strings) = self.constants.get() {
            return Ok(strings);
        }
        let strings = self.parsed()?.constant_pool.string_constants()?;
        Ok(self.constants.get_or_init(|| strings))
    }

    /// Installs a new buffer, invalidating both memoized views.
    pub fn replace(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
        self.parsed = OnceCell::new();
        self.constants = OnceCell::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{ClassDecl, ACC_PUBLIC, ACC_SUPER};
    use crate::pool::{ConstantEntry, ConstantPool};
    use pretty_assertions::assert_eq;

    fn class_with_strings(strings: &[&str]) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class("demo/Cached").unwrap();
        let super_class = pool.intern_class("java/lang/Object").unwrap();
        for text in strings {
            let utf8_index = pool.intern_utf8(text).unwrap();
            pool.push(ConstantEntry::String { utf8_index }).unwrap();
        }
        ClassFile {
            constant_pool: pool,
            decl: ClassDecl {
                version: ClassVersion {
                    minor: 0,
                    major: 52,
                },
                access_flags: ACC_PUBLIC | ACC_SUPER,
                this_class,
                super_class,
                interfaces: Vec::new(),
            },
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
        .serialize()
        .unwrap()
    }

    #[test]
    fn views_are_memoized() {
        let buffer = ClassBuffer::new(class_with_strings(&["one"]));
        let first: *const ClassFile = buffer.parsed().unwrap();
        let second: *const ClassFile = buffer.parsed().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn replace_invalidates_both_views() {
        let mut buffer = ClassBuffer::new(class_with_strings(&["before"]));
        assert_eq!(buffer.constant_strings().unwrap(), ["before".to_string()]);
        assert!(!buffer.is_interface().unwrap());

        buffer.replace(class_with_strings(&["after", "after"]));
        assert_eq!(
            buffer.constant_strings().unwrap(),
            ["after".to_string(), "after".to_string()]
        );
        assert_eq!(buffer.version().unwrap().major, 52);
    }

    #[test]
    fn parse_failure_is_not_memoized() {
        let mut buffer = ClassBuffer::new(vec![0, 1, 2, 3]);
        assert!(buffer.parsed().is_err());
        buffer.replace(class_with_strings(&[]));
        assert!(buffer.parsed().is_ok());
    }
}
