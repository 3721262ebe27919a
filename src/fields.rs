//! Keyed view over one hierarchy level's persistent fields.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::desc::ClassDesc;
use crate::error::Error;
use crate::value::{FieldValue, PrimValue, Value};

/// Access to the field values of the hierarchy level currently being
/// read, detached from the instance.
///
/// Produced by `read_fields` inside a custom read hook. All declared
/// primitive fields were buffered and all reference fields read before
/// this view was returned, so accessors never touch the stream.
pub struct GetField {
    desc: Rc<ClassDesc>,
    values: IndexMap<Rc<str>, FieldValue>,
}

impl GetField {
    pub(crate) fn new(desc: Rc<ClassDesc>, values: IndexMap<Rc<str>, FieldValue>) -> Self {
        Self { desc, values }
    }

    /// The stream descriptor this view was read against.
    pub fn desc(&self) -> &Rc<ClassDesc> {
        &self.desc
    }

    /// Whether the named field has no value in this stream.
    pub fn defaulted(&self, name: &str) -> bool {
        !self.values.contains_key(name)
    }

    fn prim(&self, name: &str) -> Result<Option<PrimValue>, Error> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::Prim(p)) => Ok(Some(*p)),
            Some(FieldValue::Ref(_)) => Err(Error::FieldAccess {
                name: name.to_owned(),
                reason: "field holds a reference, not a primitive",
            }),
        }
    }

    fn mismatch(name: &str) -> Error {
        Error::FieldAccess {
            name: name.to_owned(),
            reason: "field has a different primitive type",
        }
    }

    pub fn get_boolean(&self, name: &str, default: bool) -> Result<bool, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Boolean(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    pub fn get_byte(&self, name: &str, default: i8) -> Result<i8, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Byte(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    pub fn get_char(&self, name: &str, default: u16) -> Result<u16, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Char(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    pub fn get_short(&self, name: &str, default: i16) -> Result<i16, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Short(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    pub fn get_int(&self, name: &str, default: i32) -> Result<i32, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Int(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    pub fn get_long(&self, name: &str, default: i64) -> Result<i64, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Long(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    pub fn get_float(&self, name: &str, default: f32) -> Result<f32, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Float(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    pub fn get_double(&self, name: &str, default: f64) -> Result<f64, Error> {
        match self.prim(name)? {
            None => Ok(default),
            Some(PrimValue::Double(v)) => Ok(v),
            Some(_) => Err(Self::mismatch(name)),
        }
    }

    /// Gets a reference field, or `default` when the stream has no value
    /// for it.
    pub fn get_ref(&self, name: &str, default: Value) -> Result<Value, Error> {
        match self.values.get(name) {
            None => Ok(default),
            Some(FieldValue::Ref(v)) => Ok(v.clone()),
            Some(FieldValue::Prim(_)) => Err(Error::FieldAccess {
                name: name.to_owned(),
                reason: "field holds a primitive, not a reference",
            }),
        }
    }
}
