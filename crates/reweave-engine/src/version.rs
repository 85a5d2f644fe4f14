//! Format-version reconciliation.

use crate::context::TransformContext;
use crate::engine::LoaderId;
use crate::rule::{RewriteRule, WrapOutcome};
use reweave_classfile::{
    AttributeInfo, ClassDecl, ClassVisitor, ConstantPool, FormatError, MemberInfo,
};
use std::rc::Rc;
use thiserror::Error;

/// Highest class-file major version the engine will produce (Java 21).
pub const DEFAULT_VERSION_CEILING: u16 = 65;

/// The expected, per-artifact recoverable failure: some rule requires a
/// format version newer than the engine supports.
///
/// The reconciliation controller consumes this by abandoning the rewrite;
/// it is never surfaced as a general fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("required class version {floor} exceeds supported ceiling {ceiling}")]
pub struct PolicyConflict {
    /// The aggregated minimum-version floor.
    pub floor: u16,
    /// The configured ceiling.
    pub ceiling: u16,
}

/// Rejects floors above the ceiling before the version pass runs.
pub(crate) fn check_floor(floor: Option<u16>, ceiling: u16) -> Result<(), PolicyConflict> {
    match floor {
        Some(floor) if floor > ceiling => Err(PolicyConflict { floor, ceiling }),
        _ => Ok(()),
    }
}

/// Built-in rule that rewrites the declared major version to
/// `max(current, floor, target)`.
///
/// Only the reconciliation controller constructs this, with the aggregates
/// folded across every prior pass.
#[derive(Debug)]
pub(crate) struct VersionReconciler {
    floor: Option<u16>,
    target: Option<u16>,
}

impl VersionReconciler {
    pub(crate) fn new(floor: Option<u16>, target: Option<u16>) -> Self {
        Self { floor, target }
    }
}

impl RewriteRule for VersionReconciler {
    fn name(&self) -> &str {
        "version-reconciler"
    }

    fn try_wrap<'a>(
        &self,
        _loader: LoaderId,
        _class_name: &str,
        next: Box<dyn ClassVisitor + 'a>,
        ctx: Rc<TransformContext<'a>>,
    ) -> WrapOutcome<'a> {
        WrapOutcome::Wrap(Box::new(VersionStage {
            required: self.floor.into_iter().chain(self.target).max(),
            next,
            ctx,
        }))
    }
}

struct VersionStage<'a> {
    required: Option<u16>,
    next: Box<dyn ClassVisitor + 'a>,
    ctx: Rc<TransformContext<'a>>,
}

impl ClassVisitor for VersionStage<'_> {
    fn visit_pool(&mut self, pool: ConstantPool) -> Result<(), FormatError> {
        self.next.visit_pool(pool)
    }

    fn visit_class(&mut self, mut decl: ClassDecl) -> Result<(), FormatError> {
        if let Some(required) = self.required {
            if required > decl.version.major {
                decl.version.major = required;
                // A preview-flagged minor cannot survive a newer major.
                decl.version.minor = 0;
                self.ctx.mark_modified();
            }
        }
        self.next.visit_class(decl)
    }

    fn visit_field(&mut self, field: MemberInfo) -> Result<(), FormatError> {
        self.next.visit_field(field)
    }

    fn visit_method(&mut self, method: MemberInfo) -> Result<(), FormatError> {
        self.next.visit_method(method)
    }

    fn visit_attribute(&mut self, attribute: AttributeInfo) -> Result<(), FormatError> {
        self.next.visit_attribute(attribute)
    }

    fn visit_end(&mut self) -> Result<(), FormatError> {
        self.next.visit_end()
    }

    fn pool_mut(&mut self) -> &mut ConstantPool {
        self.next.pool_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_at_or_below_the_ceiling_pass() {
        assert!(check_floor(None, 65).is_ok());
        assert!(check_floor(Some(65), 65).is_ok());
        assert!(check_floor(Some(50), 65).is_ok());
    }

    #[test]
    fn floor_above_ceiling_is_a_policy_conflict() {
        let conflict = check_floor(Some(9999), 65).unwrap_err();
        assert_eq!(conflict.floor, 9999);
        assert_eq!(conflict.ceiling, 65);
    }
}
