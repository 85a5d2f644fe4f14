//! The structural visitor chain: one parse drives an ordered stack of
//! rewrite stages, ending in a writer that rebuilds the buffer.

use crate::classfile::{AttributeInfo, ClassDecl, ClassFile, MemberInfo};
use crate::error::FormatError;
use crate::pool::ConstantPool;
use std::cell::RefCell;
use std::rc::Rc;

/// Where the terminal [`ClassWriter`] deposits the rebuilt buffer.
///
/// The writer is boxed into the bottom of the chain, so the caller keeps a
/// clone of this slot to retrieve the bytes after the drive completes.
pub type SharedOutput = Rc<RefCell<Option<Vec<u8>>>>;

/// One stage of the structural rewrite pipeline.
///
/// Events arrive in a fixed order: `visit_pool`, `visit_class`, each field,
/// each method, each class attribute, then `visit_end`. A stage forwards
/// every event to the stage it wraps, editing or injecting along the way;
/// `pool_mut` delegates inward so any stage can intern constants into the
/// writer's pool.
pub trait ClassVisitor {
    /// Receives the constant pool before any other event.
    fn visit_pool(&mut self, pool: ConstantPool) -> Result<(), FormatError>;
    /// Receives the class declaration.
    fn visit_class(&mut self, decl: ClassDecl) -> Result<(), FormatError>;
    /// Receives one field.
    fn visit_field(&mut self, field: MemberInfo) -> Result<(), FormatError>;
    /// Receives one method.
    fn visit_method(&mut self, method: MemberInfo) -> Result<(), FormatError>;
    /// Receives one class-level attribute.
    fn visit_attribute(&mut self, attribute: AttributeInfo) -> Result<(), FormatError>;
    /// Last event of the drive.
    fn visit_end(&mut self) -> Result<(), FormatError>;
    /// The pool the rebuilt class will carry.
    fn pool_mut(&mut self) -> &mut ConstantPool;
}

/// Drives one parsed class through the chain.
pub fn drive(class: ClassFile, visitor: &mut dyn ClassVisitor) -> Result<(), FormatError> {
    let ClassFile {
        constant_pool,
        decl,
        fields,
        methods,
        attributes,
    } = class;
    visitor.visit_pool(constant_pool)?;
    visitor.visit_class(decl)?;
    for field in fields {
        visitor.visit_field(field)?;
    }
    for method in methods {
        visitor.visit_method(method)?;
    }
    for attribute in attributes {
        visitor.visit_attribute(attribute)?;
    }
    visitor.visit_end()
}

/// Terminal sink: collects the event stream back into a [`ClassFile`] and
/// serializes it into the shared output slot on `visit_end`.
#[derive(Debug)]
pub struct ClassWriter {
    pool: ConstantPool,
    decl: Option<ClassDecl>,
    fields: Vec<MemberInfo>,
    methods: Vec<MemberInfo>,
    attributes: Vec<AttributeInfo>,
    output: SharedOutput,
}

impl ClassWriter {
    /// A writer depositing into `output`.
    #[must_use]
    pub fn new(output: SharedOutput) -> Self {
        Self {
            pool: ConstantPool::new(),
            decl: None,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            output,
        }
    }
}

impl ClassVisitor for ClassWriter {
    fn visit_pool(&mut self, pool: ConstantPool) -> Result<(), FormatError> {
        self.pool = pool;
        Ok(())
    }

    fn visit_class(&mut self, decl: ClassDecl) -> Result<(), FormatError> {
        self.decl = Some(decl);
        Ok(())
    }

    fn visit_field(&mut self, field: MemberInfo) -> Result<(), FormatError> {
        self.fields.push(field);
        Ok(())
    }

    fn visit_method(&mut self, method: MemberInfo) -> Result<(), FormatError> {
        self.methods.push(method);
        Ok(())
    }

    fn visit_attribute(&mut self, attribute: AttributeInfo) -> Result<(), FormatError> {
        self.attributes.push(attribute);
        Ok(())
    }

    fn visit_end(&mut self) -> Result<(), FormatError> {
        let decl = self.decl.take().ok_or(FormatError::MissingDeclaration)?;
        let class = ClassFile {
            constant_pool: std::mem::take(&mut self.pool),
            decl,
            fields: std::mem::take(&mut self.fields),
            methods: std::mem::take(&mut self.methods),
            attributes: std::mem::take(&mut self.attributes),
        };
        let bytes = class.serialize()?;
        *self.output.borrow_mut() = Some(bytes);
        Ok(())
    }

    fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{ClassVersion, ACC_PUBLIC, ACC_SUPER};
    use pretty_assertions::assert_eq;

    fn sample() -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class("demo/Visited").unwrap();
        let super_class = pool.intern_class("java/lang/Object").unwrap();
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
    }

    #[test]
    fn writer_alone_reproduces_the_input() {
        let class = sample();
        let expected = class.serialize().unwrap();
        let output: SharedOutput = Rc::new(RefCell::new(None));
        let mut writer = ClassWriter::new(Rc::clone(&output));
        drive(class, &mut writer).unwrap();
        assert_eq!(output.borrow_mut().take().unwrap(), expected);
    }

    struct FlagFlipper {
        mask: u16,
        next: ClassWriter,
    }

    impl ClassVisitor for FlagFlipper {
        fn visit_pool(&mut self, pool: ConstantPool) -> Result<(), FormatError> {
            self.next.visit_pool(pool)
        }
        fn visit_class(&mut self, mut decl: ClassDecl) -> Result<(), FormatError> {
            decl.access_flags ^= self.mask;
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

    #[test]
    fn stage_edit_flows_through_to_the_writer() {
        let class = sample();
        let original = class.serialize().unwrap();
        let output: SharedOutput = Rc::new(RefCell::new(None));
        let mut chain = FlagFlipper {
            mask: crate::classfile::ACC_FINAL,
            next: ClassWriter::new(Rc::clone(&output)),
        };
        drive(class, &mut chain).unwrap();
        let rebuilt = output.borrow_mut().take().unwrap();
        assert_eq!(original.len(), rebuilt.len());
        let reparsed = ClassFile::parse(&rebuilt).unwrap();
        assert_eq!(
            reparsed.decl.access_flags,
            ACC_PUBLIC | ACC_SUPER | crate::classfile::ACC_FINAL
        );
    }

    #[test]
    fn missing_declaration_is_detected() {
        let output: SharedOutput = Rc::new(RefCell::new(None));
        let mut writer = ClassWriter::new(Rc::clone(&output));
        assert!(matches!(
            writer.visit_end(),
            Err(FormatError::MissingDeclaration)
        ));
        assert!(output.borrow().is_none());
    }
}
