//! Lossless JVM class-file model with a structural visitor pipeline.
//!
//! This crate carries the artifact layer of the rewrite engine:
//!
//! - [`ClassFile`] — a lossless parse of one class file (constant pool,
//!   declaration, members with raw attribute payloads) that serializes back
//!   canonically, so a single-field edit produces a minimal byte diff.
//! - [`ClassBuffer`] — an immutable-until-replaced byte buffer with lazily
//!   memoized structural views, invalidated together on every replacement.
//! - [`ClassVisitor`] — the structural event stream one parse is driven
//!   through; stages wrap each other and forward events inward until the
//!   terminal [`ClassWriter`] rebuilds the buffer.
//!
//! ## Wire format
//!
//! ```text
//! +---------+---------------+---------------+----------------------+
//! |  magic  | minor | major | constant_pool | access | this | super |
//! | (4 b)   | (2 b) | (2 b) |   (varies)    | (2 b)  | (2b) | (2b)  |
//! +---------+---------------+---------------+----------------------+
//! | interfaces | fields | methods | attributes                     |
//! +------------+--------+---------+--------------------------------+
//! ```
//!
//! All integers are big-endian. Attribute payloads are kept as raw bytes;
//! the pipeline never needs to look inside attributes it did not create.

pub mod buffer;
pub mod classfile;
pub mod error;
pub mod pool;
pub mod visitor;

pub use buffer::ClassBuffer;
pub use classfile::{
    AttributeInfo, ClassDecl, ClassFile, ClassVersion, MemberInfo, ACC_ABSTRACT, ACC_ENUM,
    ACC_FINAL, ACC_INTERFACE, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, ACC_SUPER,
    ACC_SYNTHETIC, MAGIC,
};
pub use error::FormatError;
pub use pool::{ConstantEntry, ConstantPool};
pub use visitor::{drive, ClassVisitor, ClassWriter, SharedOutput};
