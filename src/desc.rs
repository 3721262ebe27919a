//! Class descriptors as they appear on the wire.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::Error;
use crate::resolve::Class;
use crate::value::PrimValue;

bitflags::bitflags! {
    /// Flags byte of a class descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DescFlags: u8 {
        /// The class declared a custom write hook; its data is terminated
        /// by an ENDBLOCKDATA token.
        const WRITE_METHOD = 0x01;
        /// The class is serializable.
        const SERIALIZABLE = 0x02;
        /// The class writes its own payload through an external hook.
        const EXTERNALIZABLE = 0x04;
        /// Externalizable payload is block-data framed.
        const BLOCK_DATA = 0x08;
        /// The class is an enum type.
        const ENUM = 0x10;
    }
}

/// Declared type of a serializable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// A reference to another object (`L...;` signature).
    Object,
    /// An array reference (`[` signature).
    Array,
}

impl FieldType {
    /// Maps a wire type code to a field type.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'D' => Self::Double,
            b'F' => Self::Float,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'S' => Self::Short,
            b'Z' => Self::Boolean,
            b'L' => Self::Object,
            b'[' => Self::Array,
            _ => return None,
        })
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, Self::Object | Self::Array)
    }

    /// Packed byte width of a primitive field value. 0 for references.
    pub fn packed_size(self) -> usize {
        match self {
            Self::Byte | Self::Boolean => 1,
            Self::Char | Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
            Self::Object | Self::Array => 0,
        }
    }

    /// Decodes one packed primitive value from the front of `buf`.
    pub(crate) fn decode_prim(self, buf: &mut &[u8]) -> Option<PrimValue> {
        fn take<const N: usize>(buf: &mut &[u8]) -> Option<[u8; N]> {
            let (head, rest) = buf.split_first_chunk::<N>()?;
            *buf = rest;
            Some(*head)
        }

        Some(match self {
            Self::Byte => PrimValue::Byte(take::<1>(buf)?[0] as i8),
            Self::Boolean => PrimValue::Boolean(take::<1>(buf)?[0] != 0),
            Self::Char => PrimValue::Char(u16::from_be_bytes(take(buf)?)),
            Self::Short => PrimValue::Short(i16::from_be_bytes(take(buf)?)),
            Self::Int => PrimValue::Int(i32::from_be_bytes(take(buf)?)),
            Self::Float => PrimValue::Float(f32::from_be_bytes(take(buf)?)),
            Self::Long => PrimValue::Long(i64::from_be_bytes(take(buf)?)),
            Self::Double => PrimValue::Double(f64::from_be_bytes(take(buf)?)),
            Self::Object | Self::Array => return None,
        })
    }
}

/// One field declared by a class descriptor.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    name: Rc<str>,
    ty: FieldType,
    signature: Option<Rc<str>>,
}

impl FieldDesc {
    pub(crate) fn new(name: String, ty: FieldType, signature: Option<Rc<str>>) -> Self {
        Self {
            name: Rc::from(name),
            ty,
            signature,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> Rc<str> {
        self.name.clone()
    }

    pub fn ty(&self) -> FieldType {
        self.ty
    }

    /// The class-signature string for reference-typed fields.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }
}

/// The serialized schema of one class: name, uid, flags, ordered fields,
/// and the super-descriptor chain.
///
/// A descriptor is registered in the handle table before its body has
/// been parsed so that its own annotation subgraph may reference it;
/// everything past name and uid is therefore interior-mutable and filled
/// in as parsing proceeds.
pub struct ClassDesc {
    name: String,
    uid: i64,
    /// Interface names for proxy descriptors, empty otherwise.
    interfaces: Vec<String>,
    flags: Cell<DescFlags>,
    fields: RefCell<Vec<FieldDesc>>,
    super_desc: OnceCell<Option<Rc<ClassDesc>>>,
    /// Local binding, or `None` when the resolution hook had no match.
    local: OnceCell<Option<Class>>,
}

impl ClassDesc {
    pub(crate) fn new(name: String, uid: i64) -> Self {
        Self {
            name,
            uid,
            interfaces: Vec::new(),
            flags: Cell::new(DescFlags::empty()),
            fields: RefCell::new(Vec::new()),
            super_desc: OnceCell::new(),
            local: OnceCell::new(),
        }
    }

    pub(crate) fn new_proxy(interfaces: Vec<String>) -> Self {
        let name = format!("$Proxy[{}]", interfaces.join(","));
        Self {
            name,
            uid: 0,
            interfaces,
            // proxies carry serializable instance data but no fields
            flags: Cell::new(DescFlags::SERIALIZABLE),
            fields: RefCell::new(Vec::new()),
            super_desc: OnceCell::new(),
            local: OnceCell::new(),
        }
    }

    /// Fully-qualified class name from the stream.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serial version uid from the stream.
    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn flags(&self) -> DescFlags {
        self.flags.get()
    }

    pub(crate) fn set_flags(&self, flags: DescFlags) {
        self.flags.set(flags);
    }

    pub fn is_proxy(&self) -> bool {
        !self.interfaces.is_empty()
    }

    /// Interface names of a proxy descriptor.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Declared fields in stream order.
    pub fn fields(&self) -> Vec<FieldDesc> {
        self.fields.borrow().clone()
    }

    pub(crate) fn set_fields(&self, fields: Vec<FieldDesc>) {
        *self.fields.borrow_mut() = fields;
    }

    pub fn super_desc(&self) -> Option<Rc<ClassDesc>> {
        self.super_desc.get().cloned().flatten()
    }

    /// Installs the super-descriptor, refusing chains that loop back to
    /// this descriptor.
    pub(crate) fn set_super(&self, sup: Option<Rc<ClassDesc>>) -> Result<(), Error> {
        let mut walk = sup.clone();
        while let Some(d) = walk {
            if std::ptr::eq(self, Rc::as_ptr(&d)) {
                return Err(Error::StreamCorrupted(format!(
                    "class descriptor {:?} appears in its own super chain",
                    self.name
                )));
            }
            walk = d.super_desc();
        }
        let _ = self.super_desc.set(sup);
        Ok(())
    }

    /// The class this descriptor resolved to, if the hook had a match.
    pub fn local_class(&self) -> Option<Class> {
        self.local.get().cloned().flatten()
    }

    pub(crate) fn bind_local(&self, class: Option<Class>) {
        let _ = self.local.set(class);
    }
}

impl fmt::Debug for ClassDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDesc")
            .field("name", &self.name)
            .field("uid", &self.uid)
            .field("flags", &self.flags.get())
            .finish_non_exhaustive()
    }
}

/// Collapses the `[L[...;;` wire quirk in field signatures by stripping
/// matched `[L`/`;` pairs, e.g. `[L[Ljava.lang.String;;` becomes
/// `[Ljava.lang.String;`.
pub(crate) fn format_class_sig(sig: &str) -> String {
    let bytes = sig.as_bytes();
    let mut start = 0;
    let mut end = bytes.len();

    if end == 0 {
        return String::new();
    }

    while bytes[start..].starts_with(b"[L") && bytes[end - 1] == b';' {
        start += 2;
        end -= 1;
    }

    if start > 0 {
        start -= 2;
        end += 1;
    }
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}
