//! Dynamic value graph produced by the reader.
//!
//! Every registerable item is a shared cell ([`Rc`]) owned by the handle
//! table for the duration of the read and by every referent afterwards.
//! Cyclic graphs work because a container's cell is registered before its
//! contents are read; identity is cell identity.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::desc::ClassDesc;
use crate::resolve::Class;

/// A reconstructed item from the stream.
#[derive(Clone)]
pub enum Value {
    /// A null element.
    Null,
    /// A string; back-references alias the same allocation.
    String(Rc<str>),
    /// An object instance.
    Object(Rc<ObjectValue>),
    /// An array.
    Array(Rc<ArrayValue>),
    /// An enum constant.
    Enum(Rc<EnumValue>),
    /// A class literal.
    Class(Class),
    /// A class descriptor read as a stream item.
    Desc(Rc<ClassDesc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<ObjectValue>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Rc<ArrayValue>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Rc<EnumValue>> {
        match self {
            Self::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_desc(&self) -> Option<&Rc<ClassDesc>> {
        match self {
            Self::Desc(d) => Some(d),
            _ => None,
        }
    }

    /// Whether two values are the same graph node.
    ///
    /// This is identity, not structural equality: two decoded items are
    /// the same exactly when the stream introduced them under one handle.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::String(a), Self::String(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Enum(a), Self::Enum(b)) => Rc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => a.same_class(b),
            (Self::Desc(a), Self::Desc(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// shallow by hand: derived Debug would recurse into cyclic graphs
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Object(o) => write!(f, "Object({})", o.desc().name()),
            Self::Array(a) => write!(f, "Array({}, len {})", a.desc().name(), a.len()),
            Self::Enum(e) => write!(f, "Enum({}.{})", e.desc().name(), e.constant()),
            Self::Class(c) => write!(f, "Class({})", c.name()),
            Self::Desc(d) => write!(f, "Desc({})", d.name()),
        }
    }
}

/// A primitive field or array element value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    /// A UTF-16 code unit, as on the wire.
    Char(u16),
}

/// A field slot of a reconstructed object.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Prim(PrimValue),
    Ref(Value),
}

impl FieldValue {
    pub fn as_prim(&self) -> Option<PrimValue> {
        match self {
            Self::Prim(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&Value> {
        match self {
            Self::Ref(v) => Some(v),
            _ => None,
        }
    }
}

/// Field values of one hierarchy level of an object.
#[derive(Debug, Clone)]
pub struct LevelValues {
    class_name: String,
    values: IndexMap<Rc<str>, FieldValue>,
}

impl LevelValues {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Fields in stream declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (&**k, v))
    }
}

/// A reconstructed object instance: its stream descriptor, the local
/// class binding, and per-level field values filled in as the hierarchy
/// walk proceeds.
pub struct ObjectValue {
    desc: Rc<ClassDesc>,
    class: Option<Class>,
    levels: RefCell<Vec<LevelValues>>,
}

impl ObjectValue {
    pub(crate) fn new(desc: Rc<ClassDesc>, class: Option<Class>) -> Self {
        Self {
            desc,
            class,
            levels: RefCell::new(Vec::new()),
        }
    }

    /// The leaf stream descriptor this instance was read from.
    pub fn desc(&self) -> &Rc<ClassDesc> {
        &self.desc
    }

    /// The resolved local class, if the hook had one.
    pub fn class(&self) -> Option<&Class> {
        self.class.as_ref()
    }

    /// Looks a field up by name, leaf level first.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.levels
            .borrow()
            .iter()
            .rev()
            .find_map(|level| level.get(name).cloned())
    }

    /// All hierarchy levels in root-to-leaf order.
    pub fn levels(&self) -> Ref<'_, [LevelValues]> {
        Ref::map(self.levels.borrow(), Vec::as_slice)
    }

    pub(crate) fn push_level(&self, class_name: &str, values: IndexMap<Rc<str>, FieldValue>) {
        self.levels.borrow_mut().push(LevelValues {
            class_name: class_name.to_owned(),
            values,
        });
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("class", &self.desc.name())
            .field("levels", &self.levels.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Typed element storage of an array.
#[derive(Debug, Clone)]
pub enum ArrayData {
    Bytes(Vec<i8>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
    Booleans(Vec<bool>),
    Chars(Vec<u16>),
    Refs(Vec<Value>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(v) => v.len(),
            Self::Shorts(v) => v.len(),
            Self::Ints(v) => v.len(),
            Self::Longs(v) => v.len(),
            Self::Floats(v) => v.len(),
            Self::Doubles(v) => v.len(),
            Self::Booleans(v) => v.len(),
            Self::Chars(v) => v.len(),
            Self::Refs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reconstructed array.
pub struct ArrayValue {
    desc: Rc<ClassDesc>,
    elements: RefCell<ArrayData>,
}

impl ArrayValue {
    pub(crate) fn new(desc: Rc<ClassDesc>, elements: ArrayData) -> Self {
        Self {
            desc,
            elements: RefCell::new(elements),
        }
    }

    pub fn desc(&self) -> &Rc<ClassDesc> {
        &self.desc
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elements(&self) -> Ref<'_, ArrayData> {
        self.elements.borrow()
    }

    pub(crate) fn replace_elements(&self, data: ArrayData) {
        *self.elements.borrow_mut() = data;
    }

    pub(crate) fn push_ref(&self, value: Value) {
        if let ArrayData::Refs(refs) = &mut *self.elements.borrow_mut() {
            refs.push(value);
        }
    }
}

impl fmt::Debug for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayValue")
            .field("class", &self.desc.name())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// A reconstructed enum constant.
#[derive(Debug)]
pub struct EnumValue {
    desc: Rc<ClassDesc>,
    constant: Rc<str>,
}

impl EnumValue {
    pub(crate) fn new(desc: Rc<ClassDesc>, constant: &str) -> Self {
        Self {
            desc,
            constant: Rc::from(constant),
        }
    }

    pub fn desc(&self) -> &Rc<ClassDesc> {
        &self.desc
    }

    /// The constant's declared name.
    pub fn constant(&self) -> &str {
        &self.constant
    }
}
