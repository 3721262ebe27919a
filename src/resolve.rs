//! Host-side class binding for stream descriptors.
//!
//! The format core never instantiates host types itself. Descriptors are
//! handed to a [`ClassResolver`], which binds them to a [`Class`]: a name
//! plus optional per-class behavior ([`ClassSpec`]) such as a custom
//! `read_object` hook or an externalizable payload reader. The default
//! resolver, [`ClassRegistry`], materializes unknown classes as dynamic
//! records so arbitrary streams decode without prior registration.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::desc::ClassDesc;
use crate::error::Error;
use crate::reader::HookInput;
use crate::value::{EnumValue, Value};

/// Custom `read_object`-style hook, run per hierarchy level.
pub type ReadObjectFn = Rc<dyn Fn(&mut dyn HookInput, &Value) -> Result<(), Error>>;
/// Externalizable payload reader, run once per instance.
pub type ReadExternalFn = Rc<dyn Fn(&mut dyn HookInput, &Value) -> Result<(), Error>>;
/// Hook invoked for a hierarchy level that has no local counterpart.
pub type ReadNoDataFn = Rc<dyn Fn(&Value) -> Result<(), Error>>;

/// The nine primitive type names a class literal may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Char,
    Void,
}

const PRIMITIVE_CLASSES: [(&str, Primitive); 9] = [
    ("byte", Primitive::Byte),
    ("short", Primitive::Short),
    ("int", Primitive::Int),
    ("long", Primitive::Long),
    ("boolean", Primitive::Boolean),
    ("char", Primitive::Char),
    ("float", Primitive::Float),
    ("double", Primitive::Double),
    ("void", Primitive::Void),
];

/// Looks a primitive type up by its source-level name.
pub fn primitive_by_name(name: &str) -> Option<Primitive> {
    PRIMITIVE_CLASSES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, p)| *p)
}

/// Host behavior attached to a class name.
#[derive(Default)]
pub struct ClassSpec {
    serial_uid: Option<i64>,
    read_object: Option<ReadObjectFn>,
    read_external: Option<ReadExternalFn>,
    read_object_no_data: Option<ReadNoDataFn>,
}

impl ClassSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the local serial version uid; streams with a different
    /// uid for this class are rejected.
    pub fn with_serial_uid(mut self, uid: i64) -> Self {
        self.serial_uid = Some(uid);
        self
    }

    /// Installs a custom `read_object` hook for this class's hierarchy
    /// level.
    pub fn with_read_object(
        mut self,
        f: impl Fn(&mut dyn HookInput, &Value) -> Result<(), Error> + 'static,
    ) -> Self {
        self.read_object = Some(Rc::new(f));
        self
    }

    /// Installs the externalizable payload reader.
    pub fn with_read_external(
        mut self,
        f: impl Fn(&mut dyn HookInput, &Value) -> Result<(), Error> + 'static,
    ) -> Self {
        self.read_external = Some(Rc::new(f));
        self
    }

    /// Installs the hook run for hierarchy levels without stream data.
    pub fn with_read_object_no_data(
        mut self,
        f: impl Fn(&Value) -> Result<(), Error> + 'static,
    ) -> Self {
        self.read_object_no_data = Some(Rc::new(f));
        self
    }

    pub fn serial_uid(&self) -> Option<i64> {
        self.serial_uid
    }

    pub fn read_object(&self) -> Option<&ReadObjectFn> {
        self.read_object.as_ref()
    }

    pub fn read_external(&self) -> Option<&ReadExternalFn> {
        self.read_external.as_ref()
    }

    pub fn read_object_no_data(&self) -> Option<&ReadNoDataFn> {
        self.read_object_no_data.as_ref()
    }
}

impl fmt::Debug for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSpec")
            .field("serial_uid", &self.serial_uid)
            .field("read_object", &self.read_object.is_some())
            .field("read_external", &self.read_external.is_some())
            .field("read_object_no_data", &self.read_object_no_data.is_some())
            .finish()
    }
}

struct ClassInner {
    name: String,
    primitive: Option<Primitive>,
    spec: Option<Rc<ClassSpec>>,
}

/// A local class binding produced by a resolver.
#[derive(Clone)]
pub struct Class {
    inner: Rc<ClassInner>,
}

impl Class {
    /// A class with optional host behavior.
    pub fn new(name: impl Into<String>, spec: Option<Rc<ClassSpec>>) -> Self {
        Self {
            inner: Rc::new(ClassInner {
                name: name.into(),
                primitive: None,
                spec,
            }),
        }
    }

    /// The class literal of a primitive type.
    pub fn primitive(prim: Primitive, name: &str) -> Self {
        Self {
            inner: Rc::new(ClassInner {
                name: name.to_owned(),
                primitive: Some(prim),
                spec: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        self.inner.primitive
    }

    pub fn spec(&self) -> Option<&Rc<ClassSpec>> {
        self.inner.spec.as_ref()
    }

    /// Identity comparison between two bindings.
    pub fn same_class(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Class").field(&self.inner.name).finish()
    }
}

/// Host-supplied resolution hooks.
pub trait ClassResolver {
    /// Binds a stream descriptor to a local class.
    fn resolve_class(&self, desc: &Rc<ClassDesc>) -> Result<Class, Error>;

    /// Fabricates the class for a dynamic-interface descriptor.
    fn resolve_proxy_class(&self, interfaces: &[String]) -> Result<Class, Error>;

    /// Substitutes a freshly read value. Identity by default; only
    /// consulted when substitution was enabled on the reader.
    fn resolve_object(&self, value: Value) -> Result<Value, Error> {
        Ok(value)
    }

    /// Resolves an enum constant to its singleton value.
    fn resolve_enum(&self, desc: &Rc<ClassDesc>, constant: &str) -> Result<Value, Error> {
        Ok(Value::Enum(Rc::new(EnumValue::new(desc.clone(), constant))))
    }
}

/// The default resolver: a registry of [`ClassSpec`]s by class name.
///
/// Unregistered names materialize as plain dynamic classes unless the
/// registry is strict, in which case they fail with
/// [`Error::ClassNotFound`]. Enum constants are interned so repeated
/// constants of one class share identity.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    specs: RefCell<HashMap<String, Rc<ClassSpec>>>,
    enums: RefCell<HashMap<(String, String), Value>>,
    strict: bool,
}

impl ClassRegistry {
    /// A registry that materializes unknown classes dynamically.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that refuses classes it has no spec for.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Attaches behavior to a class name.
    pub fn register(&self, name: impl Into<String>, spec: ClassSpec) {
        self.specs.borrow_mut().insert(name.into(), Rc::new(spec));
    }
}

impl ClassResolver for ClassRegistry {
    fn resolve_class(&self, desc: &Rc<ClassDesc>) -> Result<Class, Error> {
        let name = desc.name();
        if let Some(prim) = primitive_by_name(name) {
            return Ok(Class::primitive(prim, name));
        }

        let spec = self.specs.borrow().get(name).cloned();
        match spec {
            Some(spec) => {
                if let Some(uid) = spec.serial_uid() {
                    if uid != desc.uid() {
                        return Err(Error::InvalidClass {
                            class: name.to_owned(),
                            reason: format!(
                                "serial version uid mismatch: stream has {:#018x}, local declares {uid:#018x}",
                                desc.uid()
                            ),
                        });
                    }
                }
                Ok(Class::new(name, Some(spec)))
            }
            None if self.strict => Err(Error::ClassNotFound(name.to_owned())),
            None => Ok(Class::new(name, None)),
        }
    }

    fn resolve_proxy_class(&self, interfaces: &[String]) -> Result<Class, Error> {
        if self.strict {
            return Err(Error::ClassNotFound(format!(
                "proxy for [{}]",
                interfaces.join(", ")
            )));
        }
        Ok(Class::new(format!("$Proxy[{}]", interfaces.join(",")), None))
    }

    fn resolve_enum(&self, desc: &Rc<ClassDesc>, constant: &str) -> Result<Value, Error> {
        let key = (desc.name().to_owned(), constant.to_owned());
        let mut enums = self.enums.borrow_mut();
        let value = enums
            .entry(key)
            .or_insert_with(|| Value::Enum(Rc::new(EnumValue::new(desc.clone(), constant))));
        Ok(value.clone())
    }
}
