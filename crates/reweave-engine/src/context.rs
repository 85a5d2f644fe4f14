//! Per-rule, per-pass side-effect tracking.

use crate::bootstrap::{BOOTSTRAP_METHOD_DESCRIPTOR, BOOTSTRAP_METHOD_NAME};
use reweave_classfile::{ClassBuffer, FormatError};
use std::cell::Cell;

/// Method-handle reference kinds, as the format numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Read an instance field.
    GetField,
    /// Read a static field.
    GetStatic,
    /// Write an instance field.
    PutField,
    /// Write a static field.
    PutStatic,
    /// `invokevirtual` dispatch.
    InvokeVirtual,
    /// `invokestatic` dispatch.
    InvokeStatic,
    /// `invokespecial` dispatch.
    InvokeSpecial,
    /// Constructor invocation.
    NewInvokeSpecial,
    /// `invokeinterface` dispatch.
    InvokeInterface,
}

impl HandleKind {
    /// The format's reference_kind byte.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        }
    }
}

/// A symbolic method-handle reference a rule can embed in the call sites it
/// materializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandleRef {
    /// Dispatch kind.
    pub kind: HandleKind,
    /// Internal name of the owning class.
    pub owner: String,
    /// Method name.
    pub name: String,
    /// Method descriptor.
    pub descriptor: String,
    /// Whether the owner is interface-like.
    pub owner_is_interface: bool,
}

/// One rule's side-effect record for one pass.
///
/// Created fresh when the chain is built, shared between the rule's stage
/// and the dispatcher, folded into the pipeline aggregates at pass end, then
/// discarded. Version requests fold monotonically (max); the bootstrap
/// request is sticky.
pub struct TransformContext<'a> {
    buffer: &'a ClassBuffer,
    class_name: &'a str,
    modified: Cell<bool>,
    min_version: Cell<Option<u16>>,
    upgrade_version: Cell<Option<u16>>,
    bootstrap_requested: Cell<bool>,
}

impl<'a> TransformContext<'a> {
    pub(crate) fn new(buffer: &'a ClassBuffer, class_name: &'a str) -> Self {
        Self {
            buffer,
            class_name,
            modified: Cell::new(false),
            min_version: Cell::new(None),
            upgrade_version: Cell::new(None),
            bootstrap_requested: Cell::new(false),
        }
    }

    /// Declares that this rule changed the class.
    ///
    /// Without this mark a rule's pass output is discarded and none of its
    /// other requests take effect.
    pub fn mark_modified(&self) {
        self.modified.set(true);
    }

    /// Requires at least this major format version; keeps the running max.
    pub fn require_minimum_version(&self, major: u16) {
        if self.min_version.get().map_or(true, |cur| major > cur) {
            self.min_version.set(Some(major));
        }
    }

    /// Requests an explicit upgrade to this major version; keeps the
    /// running max.
    pub fn request_upgrade(&self, major: u16) {
        if self.upgrade_version.get().map_or(true, |cur| major > cur) {
            self.upgrade_version.set(Some(major));
        }
    }

    /// Requests the shared bootstrap method and returns a handle reference
    /// targeting it.
    ///
    /// However many rules ask, the reconciliation pass injects the method
    /// exactly once.
    pub fn request_bootstrap(&self) -> Result<MethodHandleRef, FormatError> {
        self.bootstrap_requested.set(true);
        Ok(MethodHandleRef {
            kind: HandleKind::InvokeStatic,
            owner: self.class_name.replace('.', "/"),
            name: BOOTSTRAP_METHOD_NAME.to_string(),
            descriptor: BOOTSTRAP_METHOD_DESCRIPTOR.to_string(),
            owner_is_interface: self.buffer.is_interface()?,
        })
    }

    /// Whether the class under transformation is interface-like.
    pub fn is_interface(&self) -> Result<bool, FormatError> {
        self.buffer.is_interface()
    }

    /// The class's textual constant-table literals, in table order.
    pub fn constant_strings(&self) -> Result<&'a [String], FormatError> {
        self.buffer.constant_strings()
    }

    /// Dotted name of the class under transformation.
    #[must_use]
    pub fn class_name(&self) -> &'a str {
        self.class_name
    }

    pub(crate) fn requests(&self) -> ContextRequests {
        ContextRequests {
            modified: self.modified.get(),
            min_version: self.min_version.get(),
            upgrade_version: self.upgrade_version.get(),
            bootstrap: self.bootstrap_requested.get(),
        }
    }
}

/// Snapshot of one context, folded into the pipeline aggregates.
pub(crate) struct ContextRequests {
    pub(crate) modified: bool,
    pub(crate) min_version: Option<u16>,
    pub(crate) upgrade_version: Option<u16>,
    pub(crate) bootstrap: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reweave_testkit::sample_class_bytes;

    fn buffer() -> ClassBuffer {
        ClassBuffer::new(sample_class_bytes("demo/Ctx", 52, &[]))
    }

    #[test]
    fn version_requests_keep_the_running_max() {
        let buffer = buffer();
        let ctx = TransformContext::new(&buffer, "demo.Ctx");
        ctx.require_minimum_version(50);
        ctx.require_minimum_version(10);
        ctx.require_minimum_version(0);
        ctx.request_upgrade(55);
        ctx.request_upgrade(54);
        let requests = ctx.requests();
        assert_eq!(requests.min_version, Some(50));
        assert_eq!(requests.upgrade_version, Some(55));
        assert!(!requests.modified);
    }

    #[test]
    fn bootstrap_request_is_sticky_and_mints_a_static_handle() {
        let buffer = buffer();
        let ctx = TransformContext::new(&buffer, "demo.Ctx");
        let handle = ctx.request_bootstrap().unwrap();
        assert_eq!(handle.kind, HandleKind::InvokeStatic);
        assert_eq!(handle.owner, "demo/Ctx");
        assert_eq!(handle.name, BOOTSTRAP_METHOD_NAME);
        assert!(!handle.owner_is_interface);
        assert!(ctx.requests().bootstrap);
    }

    proptest! {
        #[test]
        fn folded_floor_is_the_sequence_max(requests in proptest::collection::vec(0u16..100, 1..20)) {
            let buffer = buffer();
            let ctx = TransformContext::new(&buffer, "demo.Ctx");
            for &version in &requests {
                ctx.require_minimum_version(version);
            }
            prop_assert_eq!(ctx.requests().min_version, requests.iter().copied().max());
        }
    }
}
