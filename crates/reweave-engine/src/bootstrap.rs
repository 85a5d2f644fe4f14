//! Synthetic bootstrap-method injection.
//!
//! Rules that materialize dynamic call sites share one bootstrap target per
//! class: a `public static synthetic` method with a fixed name and the
//! standard metafactory signature. The reconciliation controller runs this
//! rule at most once per load event, so however many rules requested the
//! method, exactly one copy is injected.

use crate::context::TransformContext;
use crate::engine::LoaderId;
use crate::rule::{RewriteRule, WrapOutcome};
use byteorder::{BigEndian, WriteBytesExt};
use reweave_classfile::{
    AttributeInfo, ClassDecl, ClassVisitor, ConstantPool, FormatError, MemberInfo, ACC_PUBLIC,
    ACC_STATIC, ACC_SYNTHETIC,
};
use std::rc::Rc;

/// Name of the injected bootstrap method.
pub const BOOTSTRAP_METHOD_NAME: &str = "reweave$metafactory";

/// Descriptor of the injected bootstrap method.
pub const BOOTSTRAP_METHOD_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;\
Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;)\
Ljava/lang/invoke/CallSite;";

/// Built-in rule that appends the shared bootstrap method.
///
/// Only the reconciliation controller constructs this; it never sits in the
/// ordinary rule registry.
#[derive(Debug, Default)]
pub(crate) struct BootstrapInjector;

impl RewriteRule for BootstrapInjector {
    fn name(&self) -> &str {
        "bootstrap-injector"
    }

    fn try_wrap<'a>(
        &self,
        _loader: LoaderId,
        _class_name: &str,
        next: Box<dyn ClassVisitor + 'a>,
        ctx: Rc<TransformContext<'a>>,
    ) -> WrapOutcome<'a> {
        WrapOutcome::Wrap(Box::new(InjectStage { next, ctx }))
    }
}

struct InjectStage<'a> {
    next: Box<dyn ClassVisitor + 'a>,
    ctx: Rc<TransformContext<'a>>,
}

impl ClassVisitor for InjectStage<'_> {
    fn visit_pool(&mut self, pool: ConstantPool) -> Result<(), FormatError> {
        self.next.visit_pool(pool)
    }

    fn visit_class(&mut self, decl: ClassDecl) -> Result<(), FormatError> {
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
        let method = build_bootstrap_method(self.next.pool_mut())?;
        self.next.visit_method(method)?;
        self.ctx.mark_modified();
        self.next.visit_end()
    }

    fn pool_mut(&mut self) -> &mut ConstantPool {
        self.next.pool_mut()
    }
}

/// Builds the metafactory method: wraps the implementation handle (argument
/// 3) in a `ConstantCallSite` and returns it.
///
/// ```text
/// new java/lang/invoke/ConstantCallSite
/// dup
/// aload_3
/// invokespecial ConstantCallSite.<init>(Ljava/lang/invoke/MethodHandle;)V
/// areturn
/// ```
fn build_bootstrap_method(pool: &mut ConstantPool) -> Result<MemberInfo, FormatError> {
    const CALL_SITE: &str = "java/lang/invoke/ConstantCallSite";

    let name_index = pool.intern_utf8(BOOTSTRAP_METHOD_NAME)?;
    let descriptor_index = pool.intern_utf8(BOOTSTRAP_METHOD_DESCRIPTOR)?;
    let code_name_index = pool.intern_utf8("Code")?;
    let call_site_class = pool.intern_class(CALL_SITE)?;
    let call_site_ctor =
        pool.intern_method_ref(CALL_SITE, "<init>", "(Ljava/lang/invoke/MethodHandle;)V")?;

    let mut code = Vec::with_capacity(9);
    code.push(0xBB); // new
    code.write_u16::<BigEndian>(call_site_class)?;
    code.push(0x59); // dup
    code.push(0x2D); // aload_3
    code.push(0xB7); // invokespecial
    code.write_u16::<BigEndian>(call_site_ctor)?;
    code.push(0xB0); // areturn

    let mut info = Vec::with_capacity(12 + code.len());
    info.write_u16::<BigEndian>(3)?; // max_stack
    info.write_u16::<BigEndian>(4)?; // max_locals: the four reference args
    info.write_u32::<BigEndian>(code.len() as u32)?;
    info.extend_from_slice(&code);
    info.write_u16::<BigEndian>(0)?; // exception_table_length
    info.write_u16::<BigEndian>(0)?; // attributes_count

    Ok(MemberInfo {
        access_flags: ACC_PUBLIC | ACC_STATIC | ACC_SYNTHETIC,
        name_index,
        descriptor_index,
        attributes: vec![AttributeInfo {
            name_index: code_name_index,
            info,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_method_is_static_synthetic_with_one_code_attribute() {
        let mut pool = ConstantPool::new();
        let method = build_bootstrap_method(&mut pool).unwrap();
        assert_eq!(
            method.access_flags,
            ACC_PUBLIC | ACC_STATIC | ACC_SYNTHETIC
        );
        assert_eq!(
            pool.utf8_at(method.name_index).unwrap(),
            BOOTSTRAP_METHOD_NAME.as_bytes()
        );
        assert_eq!(
            pool.utf8_at(method.descriptor_index).unwrap(),
            BOOTSTRAP_METHOD_DESCRIPTOR.as_bytes()
        );
        assert_eq!(method.attributes.len(), 1);
        // max_stack, max_locals, code_length, 9 opcode bytes, two empty
        // trailing counts.
        assert_eq!(method.attributes[0].info.len(), 21);
    }

    #[test]
    fn building_twice_reuses_pool_entries() {
        let mut pool = ConstantPool::new();
        build_bootstrap_method(&mut pool).unwrap();
        let count = pool.count();
        build_bootstrap_method(&mut pool).unwrap();
        assert_eq!(pool.count(), count);
    }
}
