//! Error types for class-file parsing and serialization.

use thiserror::Error;

/// Errors raised while parsing or rebuilding a class file.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The buffer does not start with `0xCAFEBABE`.
    #[error("bad magic number 0x{0:08x}")]
    BadMagic(u32),

    /// A constant pool entry carries a tag this model does not know.
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag {
        /// The unrecognized tag byte.
        tag: u8,
        /// Pool index the entry would have occupied.
        index: u16,
    },

    /// A pool index does not resolve to the expected entry kind.
    #[error("constant pool index {index} does not resolve to {expected}")]
    BadPoolIndex {
        /// The offending index.
        index: u16,
        /// What the caller needed the index to be.
        expected: &'static str,
    },

    /// The pool's u16 index space cannot hold another entry.
    #[error("constant pool exhausted ({} slots)", u16::MAX)]
    PoolExhausted,

    /// A u16/u32 count field cannot represent the collection being written.
    #[error("too many {0} for the class-file count field")]
    CountOverflow(&'static str),

    /// Bytes remained after the class attributes were consumed.
    #[error("{0} trailing bytes after class attributes")]
    TrailingBytes(usize),

    /// A visitor chain finished without emitting a class declaration.
    #[error("visitor chain dropped the class declaration")]
    MissingDeclaration,

    /// Truncated input or a short read while decoding.
    #[error("malformed class file: {0}")]
    Io(#[from] std::io::Error),
}
