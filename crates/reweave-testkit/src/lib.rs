//! Shared fixtures for reweave tests: sample class builders, configurable
//! probe rules, and recording sinks.
//!
//! Everything here panics freely on malformed fixtures; it never ships in a
//! production build.

use anyhow::bail;
use parking_lot::Mutex;
use reweave_classfile::{
    AttributeInfo, ClassDecl, ClassFile, ClassVersion, ClassVisitor, ConstantEntry, ConstantPool,
    FormatError, MemberInfo, ACC_PUBLIC, ACC_SUPER, ACC_SYNTHETIC,
};
use reweave_engine::{
    LoaderId, NotificationSink, RewriteRule, TransformContext, WrapOutcome,
};
use std::rc::Rc;
use std::sync::Arc;

/// Serialized bytes of a minimal class: `name` (slashed), the given major
/// version, and one string-table literal per entry of `strings`.
#[must_use]
pub fn sample_class_bytes(name: &str, major: u16, strings: &[&str]) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let this_class = pool.intern_class(name).unwrap();
    let super_class = pool.intern_class("java/lang/Object").unwrap();
    for text in strings {
        let utf8_index = pool.intern_utf8(text).unwrap();
        pool.push(ConstantEntry::String { utf8_index }).unwrap();
    }
    ClassFile {
        constant_pool: pool,
        decl: ClassDecl {
            version: ClassVersion { minor: 0, major },
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

/// One delivery observed by a [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct SinkEvent {
    /// Loader the class arrived under.
    pub loader: LoaderId,
    /// Dotted class name as the sink saw it.
    pub class_name: String,
    /// Final bytes delivered to the sink.
    pub bytes: Vec<u8>,
    /// Names of the applied rules, in reported order.
    pub applied: Vec<String>,
}

/// Sink that records every delivery for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    /// A sink with no recorded events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn on_class_processed(
        &self,
        loader: LoaderId,
        class_name: &str,
        final_bytes: &[u8],
        applied: &[Arc<dyn RewriteRule>],
    ) -> anyhow::Result<()> {
        self.events.lock().push(SinkEvent {
            loader,
            class_name: class_name.to_string(),
            bytes: final_bytes.to_vec(),
            applied: applied.iter().map(|rule| rule.name().to_string()).collect(),
        });
        Ok(())
    }
}

/// Sink that fails every delivery.
#[derive(Debug, Default)]
pub struct FailingSink;

impl NotificationSink for FailingSink {
    fn on_class_processed(
        &self,
        _loader: LoaderId,
        class_name: &str,
        _final_bytes: &[u8],
        _applied: &[Arc<dyn RewriteRule>],
    ) -> anyhow::Result<()> {
        bail!("sink rejected {class_name}");
    }
}

/// Rule that declines every class.
#[derive(Debug)]
pub struct DecliningRule {
    name: String,
}

impl DecliningRule {
    /// A declining rule with the given report name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl RewriteRule for DecliningRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_wrap<'a>(
        &self,
        _loader: LoaderId,
        _class_name: &str,
        next: Box<dyn ClassVisitor + 'a>,
        _ctx: Rc<TransformContext<'a>>,
    ) -> WrapOutcome<'a> {
        WrapOutcome::Decline(next)
    }
}

/// Configurable probe rule.
///
/// The default shape ([`MarkingRule::new`]) wraps every class and reports a
/// modification without changing any bytes; builder methods add an access
/// flag flip, version requests, a bootstrap request, or make the rule
/// passive (wraps but never reports).
#[derive(Debug)]
pub struct MarkingRule {
    name: String,
    mark: bool,
    flip_access: bool,
    floor: Option<u16>,
    upgrade: Option<u16>,
    bootstrap: bool,
    visit_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl MarkingRule {
    /// A rule that marks itself modified and requests nothing else.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mark: true,
            flip_access: false,
            floor: None,
            upgrade: None,
            bootstrap: false,
            visit_log: None,
        }
    }

    /// A rule that wraps the chain but never reports a modification.
    #[must_use]
    pub fn passive(name: &str) -> Self {
        Self {
            mark: false,
            ..Self::new(name)
        }
    }

    /// Also toggle `ACC_SYNTHETIC` on the class declaration.
    #[must_use]
    pub fn flipping_access_flag(mut self) -> Self {
        self.flip_access = true;
        self
    }

    /// Also require at least this major version.
    #[must_use]
    pub fn with_floor(mut self, major: u16) -> Self {
        self.floor = Some(major);
        self
    }

    /// Also request an upgrade to this major version.
    #[must_use]
    pub fn with_upgrade(mut self, major: u16) -> Self {
        self.upgrade = Some(major);
        self
    }

    /// Also request the shared bootstrap method.
    #[must_use]
    pub fn requesting_bootstrap(mut self) -> Self {
        self.bootstrap = true;
        self
    }

    /// Record this rule's name into `log` when its stage sees the class
    /// declaration; outer stages record first.
    #[must_use]
    pub fn logging_visits(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.visit_log = Some(log);
        self
    }
}

impl RewriteRule for MarkingRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_wrap<'a>(
        &self,
        _loader: LoaderId,
        _class_name: &str,
        next: Box<dyn ClassVisitor + 'a>,
        ctx: Rc<TransformContext<'a>>,
    ) -> WrapOutcome<'a> {
        WrapOutcome::Wrap(Box::new(MarkingStage {
            name: self.name.clone(),
            mark: self.mark,
            flip_access: self.flip_access,
            floor: self.floor,
            upgrade: self.upgrade,
            bootstrap: self.bootstrap,
            visit_log: self.visit_log.clone(),
            next,
            ctx,
        }))
    }
}

struct MarkingStage<'a> {
    name: String,
    mark: bool,
    flip_access: bool,
    floor: Option<u16>,
    upgrade: Option<u16>,
    bootstrap: bool,
    visit_log: Option<Arc<Mutex<Vec<String>>>>,
    next: Box<dyn ClassVisitor + 'a>,
    ctx: Rc<TransformContext<'a>>,
}

impl ClassVisitor for MarkingStage<'_> {
    fn visit_pool(&mut self, pool: ConstantPool) -> Result<(), FormatError> {
        self.next.visit_pool(pool)
    }

    fn visit_class(&mut self, mut decl: ClassDecl) -> Result<(), FormatError> {
        if let Some(log) = &self.visit_log {
            log.lock().push(self.name.clone());
        }
        if self.flip_access {
            decl.access_flags ^= ACC_SYNTHETIC;
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
        if self.mark {
            self.ctx.mark_modified();
            if let Some(major) = self.floor {
                self.ctx.require_minimum_version(major);
            }
            if let Some(major) = self.upgrade {
                self.ctx.request_upgrade(major);
            }
            if self.bootstrap {
                self.ctx.request_bootstrap()?;
            }
        }
        self.next.visit_end()
    }

    fn pool_mut(&mut self) -> &mut ConstantPool {
        self.next.pool_mut()
    }
}
