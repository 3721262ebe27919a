//! The reader facade: drives the token protocol and materializes items.

use std::io;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::data::DataInput;
use crate::desc::{format_class_sig, ClassDesc, DescFlags, FieldDesc, FieldType};
use crate::error::Error;
use crate::fields::GetField;
use crate::frame::{BlockFrame, FrameMode, Refill};
use crate::handles::{Handle, HandleTable};
use crate::resolve::{ClassRegistry, ClassResolver};
use crate::token::{Token, TokenBuf, STREAM_MAGIC, STREAM_VERSION};
use crate::validate::{ValidationFn, ValidationQueue};
use crate::value::{ArrayData, ArrayValue, FieldValue, ObjectValue, Value};

/// The instance and hierarchy level a custom read hook is running for.
#[derive(Clone)]
struct HookContext {
    object: Rc<ObjectValue>,
    level: Rc<ClassDesc>,
}

/// The stream surface a custom read hook sees.
///
/// Hooks receive this instead of the concrete reader so per-class
/// behavior stays object-safe: framed primitive reads, nested object
/// reads, and the in-hook operations (`default_read_object`,
/// `read_fields`, `register_validation`).
pub trait HookInput {
    fn read_object(&mut self) -> Result<Value, Error>;
    fn read_unshared(&mut self) -> Result<Value, Error>;
    fn default_read_object(&mut self) -> Result<(), Error>;
    fn read_fields(&mut self) -> Result<GetField, Error>;
    fn register_validation(&mut self, callback: ValidationFn, priority: i32) -> Result<(), Error>;
    fn read_bool(&mut self) -> Result<bool, Error>;
    fn read_i8(&mut self) -> Result<i8, Error>;
    fn read_u8(&mut self) -> Result<u8, Error>;
    fn read_i16(&mut self) -> Result<i16, Error>;
    fn read_u16(&mut self) -> Result<u16, Error>;
    fn read_char(&mut self) -> Result<u16, Error>;
    fn read_i32(&mut self) -> Result<i32, Error>;
    fn read_i64(&mut self) -> Result<i64, Error>;
    fn read_f32(&mut self) -> Result<f32, Error>;
    fn read_f64(&mut self) -> Result<f64, Error>;
    fn read_utf(&mut self) -> Result<String, Error>;
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<(), Error>;
    fn available(&mut self) -> Result<usize, Error>;
    fn skip(&mut self, n: usize) -> Result<usize, Error>;
}

/// Reads a serialization stream and reconstructs its object graph.
///
/// A reader is single-use and single-threaded: one instance drives one
/// stream, and all state (frame mode, handle table, validation queue,
/// nesting depth) belongs to the active `read_object` call chain.
pub struct ObjectReader<R> {
    data: DataInput<R>,
    tokens: TokenBuf,
    frame: BlockFrame,
    handles: HandleTable,
    resolver: Rc<dyn ClassResolver>,
    validations: Option<ValidationQueue>,
    contexts: Vec<HookContext>,
    depth: u32,
    /// Cleared while annotation subgraphs are discarded so unresolvable
    /// classes inside them don't fail the read.
    must_resolve: bool,
    enable_resolve: bool,
}

impl<R: io::Read> ObjectReader<R> {
    /// Creates a reader with the default [`ClassRegistry`] resolver and
    /// consumes the stream header.
    pub fn new(reader: R) -> Result<Self, Error> {
        Self::with_resolver(reader, Rc::new(ClassRegistry::new()))
    }

    /// Creates a reader with a host-supplied resolver and consumes the
    /// stream header.
    pub fn with_resolver(reader: R, resolver: Rc<dyn ClassResolver>) -> Result<Self, Error> {
        let mut data = DataInput::new(reader);
        let magic = data.read_u16()?;
        let version = data.read_u16()?;
        if magic != STREAM_MAGIC || version != STREAM_VERSION {
            return Err(Error::StreamCorrupted(format!(
                "bad stream header: magic {magic:#06x}, version {version:#06x}"
            )));
        }

        Ok(Self {
            data,
            tokens: TokenBuf::new(),
            frame: BlockFrame::new(),
            handles: HandleTable::new(),
            resolver,
            validations: None,
            contexts: Vec::new(),
            depth: 0,
            must_resolve: true,
            enable_resolve: false,
        })
    }

    /// Returns the underlying byte source.
    pub fn into_inner(self) -> R {
        self.data.into_inner()
    }

    /// Reads the next item from the stream.
    pub fn read_object(&mut self) -> Result<Value, Error> {
        self.read_object_impl(false)
    }

    /// Reads the next item unshared: later back-references to it fail.
    pub fn read_unshared(&mut self) -> Result<Value, Error> {
        self.read_object_impl(true)
    }

    /// Enables or disables object substitution through the resolver's
    /// `resolve_object` hook, returning the previous setting.
    pub fn enable_resolve_object(&mut self, enable: bool) -> bool {
        std::mem::replace(&mut self.enable_resolve, enable)
    }

    fn read_object_impl(&mut self, unshared: bool) -> Result<Value, Error> {
        // a raw-mirroring frame (externalizable payloads) is parked for
        // the duration of the nested item and restored afterwards
        let restore_raw = self.frame.is_raw();
        if restore_raw {
            self.frame.set_empty();
        }

        self.depth += 1;
        let mut result = self.read_item(unshared);
        self.depth -= 1;

        if result.is_ok() && restore_raw {
            self.frame.set_raw();
        }

        if self.depth == 0 {
            let pending = self.validations.take();
            self.contexts.clear();
            if result.is_ok() {
                if let Some(queue) = pending {
                    if let Err(e) = queue.run() {
                        result = Err(e);
                    }
                }
            }
            // entries registered before a failure are dropped uninvoked
        }
        result
    }

    fn read_item(&mut self, unshared: bool) -> Result<Value, Error> {
        let remaining = self.frame.block_remaining();
        if remaining > 0 {
            return Err(Error::OptionalData {
                remaining,
                at_end: false,
            });
        }
        self.frame.set_empty();

        loop {
            let tok = self.tokens.next_token(&mut self.data)?;
            match tok {
                Token::Reset => {
                    log::trace!("reset token at object boundary");
                    self.reset_state();
                }
                Token::BlockData => {
                    let len = self.data.read_u8()? as usize;
                    self.frame.start_block(len);
                    return Err(Error::OptionalData {
                        remaining: len,
                        at_end: false,
                    });
                }
                Token::BlockDataLong => {
                    let len = self.data.read_u32()? as usize;
                    self.frame.start_block(len);
                    return Err(Error::OptionalData {
                        remaining: len,
                        at_end: false,
                    });
                }
                Token::EndBlockData => {
                    self.tokens.push_back(Token::EndBlockData as u8);
                    return Err(Error::OptionalData {
                        remaining: 0,
                        at_end: true,
                    });
                }
                _ => return self.read_nonprimitive(tok, unshared),
            }
        }
    }

    /// Dispatch for tokens that introduce an item.
    fn read_nonprimitive(&mut self, tok: Token, unshared: bool) -> Result<Value, Error> {
        match tok {
            Token::Null => Ok(Value::Null),
            Token::Reference => self.read_reference(unshared),
            Token::Class => self.read_new_class(unshared),
            Token::ClassDesc => Ok(Value::Desc(self.read_new_class_desc()?)),
            Token::ProxyClassDesc => Ok(Value::Desc(self.read_new_proxy_desc()?)),
            Token::String => self.read_new_string(unshared, false),
            Token::LongString => self.read_new_string(unshared, true),
            Token::Array => self.read_new_array(unshared),
            Token::Object => self.read_new_object(unshared),
            Token::Enum => self.read_new_enum(unshared),
            Token::Exception => self.read_exception(),
            Token::BlockData | Token::BlockDataLong | Token::EndBlockData | Token::Reset => {
                Err(Error::StreamCorrupted(format!(
                    "token {:#04x} does not introduce an item",
                    tok as u8
                )))
            }
        }
    }

    /// Item dispatch for discarded content, where block data is legal.
    fn read_content(&mut self, tok: Token) -> Result<Value, Error> {
        match tok {
            Token::BlockData => {
                let len = self.data.read_u8()? as usize;
                self.data.skip(len)?;
                Ok(Value::Null)
            }
            Token::BlockDataLong => {
                let len = self.data.read_u32()? as usize;
                self.data.skip(len)?;
                Ok(Value::Null)
            }
            Token::Reset => {
                self.reset_state();
                Ok(Value::Null)
            }
            _ => self.read_nonprimitive(tok, false),
        }
    }

    // --- back-references and resets ---

    fn read_reference(&mut self, unshared: bool) -> Result<Value, Error> {
        let raw = self.data.read_u32()?;
        if unshared {
            return Err(Error::InvalidObject(
                "cannot read a back-reference as unshared".to_owned(),
            ));
        }
        self.handles.lookup(Handle::from_raw(raw))
    }

    fn reset_seen(&mut self) {
        self.handles.reset();
        self.frame.set_empty();
    }

    fn reset_state(&mut self) {
        log::trace!("stream state reset; handle table discarded");
        self.reset_seen();
        self.tokens.clear();
    }

    /// Captures the exception subgraph that aborted the original write.
    /// The handle table is cleared on both sides of the capture.
    fn read_exception(&mut self) -> Result<Value, Error> {
        log::debug!("exception token: reading embedded throwable graph");
        self.reset_seen();
        let cause = self.read_object_impl(false)?;
        self.reset_seen();
        Err(Error::WriteAborted(cause))
    }

    // --- class descriptors ---

    /// Reads a descriptor reference: NULL, a back-reference, or a new
    /// (possibly proxy) descriptor.
    fn read_class_desc(&mut self) -> Result<Option<Rc<ClassDesc>>, Error> {
        let tok = self.tokens.next_token(&mut self.data)?;
        match tok {
            Token::Null => Ok(None),
            Token::ClassDesc => Ok(Some(self.read_new_class_desc()?)),
            Token::ProxyClassDesc => Ok(Some(self.read_new_proxy_desc()?)),
            Token::Reference => match self.read_reference(false)? {
                Value::Desc(desc) => Ok(Some(desc)),
                _ => Err(Error::StreamCorrupted(
                    "back-reference does not name a class descriptor".to_owned(),
                )),
            },
            _ => Err(Error::StreamCorrupted(format!(
                "unexpected token {:#04x} where a class descriptor was expected",
                tok as u8
            ))),
        }
    }

    fn read_new_class_desc(&mut self) -> Result<Rc<ClassDesc>, Error> {
        let name = self.data.read_utf()?;
        if name.is_empty() {
            return Err(Error::StreamCorrupted("zero-length class name".to_owned()));
        }
        let uid = self.data.read_i64()?;

        // register before the body is parsed so the descriptor's own
        // annotation subgraph may reference it
        let handle = self.handles.assign();
        let desc = Rc::new(ClassDesc::new(name, uid));
        self.handles.register(handle, Value::Desc(desc.clone()), false);

        let flags = DescFlags::from_bits_retain(self.data.read_u8()?);
        desc.set_flags(flags);

        let count = self.data.read_u16()? as usize;
        let mut fields = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let code = self.data.read_u8()?;
            let ty = FieldType::from_code(code).ok_or_else(|| {
                Error::StreamCorrupted(format!("invalid field type code {code:#04x}"))
            })?;
            let field_name = self.data.read_utf()?;
            let signature = if ty.is_primitive() {
                None
            } else {
                Some(self.read_type_string()?)
            };
            fields.push(FieldDesc::new(field_name, ty, signature));
        }
        desc.set_fields(fields);
        log::trace!("class descriptor {} ({count} fields)", desc.name());

        self.discard_data()?;
        let sup = self.read_class_desc()?;
        desc.set_super(sup)?;

        self.bind_descriptor(&desc)?;
        Ok(desc)
    }

    fn read_new_proxy_desc(&mut self) -> Result<Rc<ClassDesc>, Error> {
        let count = self.data.read_u32()? as usize;
        let mut interfaces = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            interfaces.push(self.data.read_utf()?);
        }

        let resolved = match self.resolver.resolve_proxy_class(&interfaces) {
            Ok(class) => Some(class),
            Err(Error::ClassNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let handle = self.handles.assign();
        let desc = Rc::new(ClassDesc::new_proxy(interfaces));
        desc.bind_local(resolved);
        self.handles.register(handle, Value::Desc(desc.clone()), false);

        self.discard_data()?;
        let sup = self.read_class_desc()?;
        desc.set_super(sup)?;
        Ok(desc)
    }

    /// Resolves a descriptor's local binding. A missing class is not an
    /// error until something needs the binding.
    fn bind_descriptor(&mut self, desc: &Rc<ClassDesc>) -> Result<(), Error> {
        match self.resolver.resolve_class(desc) {
            Ok(class) => desc.bind_local(Some(class)),
            Err(Error::ClassNotFound(_)) => desc.bind_local(None),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Reads a field signature, written as a string object reference.
    fn read_type_string(&mut self) -> Result<Rc<str>, Error> {
        let tok = self.tokens.next_token(&mut self.data)?;
        let value = match tok {
            Token::String => self.read_new_string(false, false)?,
            Token::LongString => self.read_new_string(false, true)?,
            Token::Reference => self.read_reference(false)?,
            _ => {
                return Err(Error::StreamCorrupted(format!(
                    "unexpected token {:#04x} for a field signature",
                    tok as u8
                )))
            }
        };
        match value {
            Value::String(s) => Ok(Rc::from(format_class_sig(&s))),
            _ => Err(Error::StreamCorrupted(
                "field signature back-reference is not a string".to_owned(),
            )),
        }
    }

    /// Reads and discards annotation content up to ENDBLOCKDATA.
    fn discard_data(&mut self) -> Result<(), Error> {
        // a hook may leave part of its current frame unread
        let remaining = self.frame.block_remaining();
        if remaining > 0 {
            self.data.skip(remaining)?;
        }
        self.frame.set_empty();
        let saved = self.must_resolve;
        self.must_resolve = false;
        let result = self.discard_until_end();
        self.must_resolve = saved;
        result
    }

    fn discard_until_end(&mut self) -> Result<(), Error> {
        loop {
            let tok = self.tokens.next_token(&mut self.data)?;
            if tok == Token::EndBlockData {
                return Ok(());
            }
            self.read_content(tok)?;
        }
    }

    // --- strings, classes, arrays ---

    fn read_new_string(&mut self, unshared: bool, long: bool) -> Result<Value, Error> {
        let s = if long {
            self.data.read_utf_long()?
        } else {
            self.data.read_utf()?
        };
        let mut value = Value::String(Rc::from(s));
        if self.enable_resolve {
            value = self.resolver.resolve_object(value)?;
        }
        let handle = self.handles.assign();
        self.handles.register(handle, value.clone(), unshared);
        Ok(value)
    }

    fn read_new_class(&mut self, unshared: bool) -> Result<Value, Error> {
        let desc = self.read_class_desc()?.ok_or_else(|| Error::InvalidClass {
            class: "(unknown)".to_owned(),
            reason: "null class descriptor for a class literal".to_owned(),
        })?;
        let handle = self.handles.assign();
        let value = match desc.local_class() {
            Some(class) => Value::Class(class),
            None if self.must_resolve => {
                return Err(Error::ClassNotFound(desc.name().to_owned()))
            }
            None => Value::Null,
        };
        self.handles.register(handle, value.clone(), unshared);
        Ok(value)
    }

    fn read_new_array(&mut self, unshared: bool) -> Result<Value, Error> {
        let desc = self.read_class_desc()?.ok_or_else(|| Error::InvalidClass {
            class: "(unknown)".to_owned(),
            reason: "null class descriptor for an array".to_owned(),
        })?;
        let handle = self.handles.assign();

        let len = self.data.read_i32()?;
        let len = usize::try_from(len).map_err(|_| {
            Error::StreamCorrupted(format!("negative array length {len}"))
        })?;

        let name = desc.name();
        if !name.starts_with('[') {
            return Err(Error::InvalidClass {
                class: name.to_owned(),
                reason: "descriptor does not name an array type".to_owned(),
            });
        }
        let component = name.as_bytes()[1..].first().copied().ok_or_else(|| {
            Error::InvalidClass {
                class: name.to_owned(),
                reason: "array descriptor has no component type".to_owned(),
            }
        })?;

        let initial = match component {
            b'B' => ArrayData::Bytes(Vec::new()),
            b'S' => ArrayData::Shorts(Vec::new()),
            b'I' => ArrayData::Ints(Vec::new()),
            b'J' => ArrayData::Longs(Vec::new()),
            b'F' => ArrayData::Floats(Vec::new()),
            b'D' => ArrayData::Doubles(Vec::new()),
            b'Z' => ArrayData::Booleans(Vec::new()),
            b'C' => ArrayData::Chars(Vec::new()),
            b'L' | b'[' => ArrayData::Refs(Vec::new()),
            other => {
                return Err(Error::InvalidClass {
                    class: name.to_owned(),
                    reason: format!("unresolved array component type {:?}", other as char),
                })
            }
        };

        let arr = Rc::new(ArrayValue::new(desc.clone(), initial));
        let value = Value::Array(arr.clone());
        self.handles.register(handle, value.clone(), unshared);

        // element payload is raw, not block-framed
        match component {
            b'B' => {
                let raw = self.data.read_byte_vec(len)?;
                arr.replace_elements(ArrayData::Bytes(raw.into_iter().map(|b| b as i8).collect()));
            }
            b'S' => {
                let mut v = Vec::with_capacity(len.min(0x1000));
                for _ in 0..len {
                    v.push(self.data.read_i16()?);
                }
                arr.replace_elements(ArrayData::Shorts(v));
            }
            b'I' => {
                let mut v = Vec::with_capacity(len.min(0x1000));
                for _ in 0..len {
                    v.push(self.data.read_i32()?);
                }
                arr.replace_elements(ArrayData::Ints(v));
            }
            b'J' => {
                let mut v = Vec::with_capacity(len.min(0x1000));
                for _ in 0..len {
                    v.push(self.data.read_i64()?);
                }
                arr.replace_elements(ArrayData::Longs(v));
            }
            b'F' => {
                let mut v = Vec::with_capacity(len.min(0x1000));
                for _ in 0..len {
                    v.push(self.data.read_f32()?);
                }
                arr.replace_elements(ArrayData::Floats(v));
            }
            b'D' => {
                let mut v = Vec::with_capacity(len.min(0x1000));
                for _ in 0..len {
                    v.push(self.data.read_f64()?);
                }
                arr.replace_elements(ArrayData::Doubles(v));
            }
            b'Z' => {
                let mut v = Vec::with_capacity(len.min(0x1000));
                for _ in 0..len {
                    v.push(self.data.read_u8()? != 0);
                }
                arr.replace_elements(ArrayData::Booleans(v));
            }
            b'C' => {
                let mut v = Vec::with_capacity(len.min(0x1000));
                for _ in 0..len {
                    v.push(self.data.read_u16()?);
                }
                arr.replace_elements(ArrayData::Chars(v));
            }
            _ => {
                for _ in 0..len {
                    let element = self.read_object_impl(false)?;
                    arr.push_ref(element);
                }
            }
        }

        if self.enable_resolve {
            let replaced = self.resolver.resolve_object(value.clone())?;
            if !replaced.same_identity(&value) {
                self.handles.register(handle, replaced.clone(), false);
                return Ok(replaced);
            }
        }
        Ok(value)
    }

    // --- enums ---

    fn read_enum_desc(&mut self) -> Result<Option<Rc<ClassDesc>>, Error> {
        let tok = self.tokens.next_token(&mut self.data)?;
        match tok {
            Token::Null => Ok(None),
            Token::Reference => match self.read_reference(false)? {
                Value::Desc(desc) => Ok(Some(desc)),
                _ => Err(Error::StreamCorrupted(
                    "enum descriptor back-reference is not a class descriptor".to_owned(),
                )),
            },
            Token::ClassDesc => {
                let desc = self.read_new_class_desc()?;
                if desc.uid() != 0 {
                    return Err(Error::InvalidClass {
                        class: desc.name().to_owned(),
                        reason: "enum descriptors must have serial version uid 0".to_owned(),
                    });
                }
                if let Some(sup) = desc.super_desc() {
                    if sup.uid() != 0 {
                        return Err(Error::InvalidClass {
                            class: sup.name().to_owned(),
                            reason: "enum super descriptors must have serial version uid 0"
                                .to_owned(),
                        });
                    }
                }
                // some writers emit a stray terminator after the enum
                // super chain
                if let Some(b) = self.tokens.try_next_byte(&mut self.data)? {
                    if b != Token::EndBlockData as u8 {
                        self.tokens.push_back(b);
                    }
                }
                Ok(Some(desc))
            }
            _ => Err(Error::StreamCorrupted(format!(
                "unexpected token {:#04x} where an enum descriptor was expected",
                tok as u8
            ))),
        }
    }

    fn read_new_enum(&mut self, unshared: bool) -> Result<Value, Error> {
        let desc = self.read_enum_desc()?.ok_or_else(|| {
            Error::StreamCorrupted("null class descriptor for an enum constant".to_owned())
        })?;
        let handle = self.handles.assign();

        let tok = self.tokens.next_token(&mut self.data)?;
        let name_value = match tok {
            Token::String => self.read_new_string(unshared, false)?,
            Token::Reference => self.read_reference(unshared)?,
            _ => {
                return Err(Error::StreamCorrupted(format!(
                    "unexpected token {:#04x} for an enum constant name",
                    tok as u8
                )))
            }
        };
        let name = match &name_value {
            Value::String(s) => s.clone(),
            _ => {
                return Err(Error::StreamCorrupted(
                    "enum constant name is not a string".to_owned(),
                ))
            }
        };

        let value = self.resolver.resolve_enum(&desc, &name)?;
        self.handles.register(handle, value.clone(), unshared);
        Ok(value)
    }

    // --- objects ---

    fn read_new_object(&mut self, unshared: bool) -> Result<Value, Error> {
        let desc = self.read_class_desc()?.ok_or_else(|| {
            Error::StreamCorrupted("null class descriptor for an object".to_owned())
        })?;
        let handle = self.handles.assign();

        let class = desc.local_class();
        if class.is_none() && self.must_resolve {
            return Err(Error::ClassNotFound(desc.name().to_owned()));
        }

        let obj = Rc::new(ObjectValue::new(desc.clone(), class));
        let value = Value::Object(obj.clone());
        self.handles.register(handle, value.clone(), unshared);

        if desc.flags().contains(DescFlags::EXTERNALIZABLE) {
            self.read_external_data(&obj, &desc)?;
        } else {
            self.read_serial_data(&obj, &desc)?;
        }

        if self.enable_resolve {
            let replaced = self.resolver.resolve_object(value.clone())?;
            if !replaced.same_identity(&value) {
                self.handles.register(handle, replaced.clone(), false);
                return Ok(replaced);
            }
        }
        Ok(value)
    }

    /// Externalizable payload: one hook call for the whole instance,
    /// framed only when the descriptor's flags say so.
    fn read_external_data(
        &mut self,
        obj: &Rc<ObjectValue>,
        desc: &Rc<ClassDesc>,
    ) -> Result<(), Error> {
        let hook = obj
            .class()
            .and_then(|c| c.spec())
            .and_then(|s| s.read_external())
            .cloned();
        let framed = desc.flags().contains(DescFlags::BLOCK_DATA);

        if framed {
            self.frame.set_empty();
        } else {
            self.frame.set_raw();
        }

        let value = Value::Object(obj.clone());
        match hook {
            Some(f) => f(self, &value)?,
            None if framed => {
                // skippable: the frame terminator bounds the payload
                log::debug!(
                    "skipping externalizable payload of {} (no host reader)",
                    desc.name()
                );
            }
            None => {
                self.frame.set_empty();
                return Err(Error::InvalidClass {
                    class: desc.name().to_owned(),
                    reason: "externalizable payload is unframed and no host reader is registered"
                        .to_owned(),
                });
            }
        }

        if framed {
            self.discard_data()?;
        } else {
            self.frame.set_empty();
        }
        Ok(())
    }

    /// Hierarchy walk root-to-leaf over the descriptor chain.
    fn read_serial_data(
        &mut self,
        obj: &Rc<ObjectValue>,
        leaf: &Rc<ClassDesc>,
    ) -> Result<(), Error> {
        let mut chain = Vec::new();
        let mut cur = Some(leaf.clone());
        while let Some(d) = cur {
            cur = d.super_desc();
            chain.push(d);
        }

        let value = Value::Object(obj.clone());
        for level in chain.iter().rev() {
            let flags = level.flags();
            if !flags.contains(DescFlags::SERIALIZABLE) {
                continue;
            }

            match level.local_class() {
                None => {
                    // level with no local counterpart: skim its values
                    // using the stream shape, then tell the instance
                    let _ = self.read_level_values(level)?;
                    let no_data = obj
                        .class()
                        .and_then(|c| c.spec())
                        .and_then(|s| s.read_object_no_data())
                        .cloned();
                    if let Some(hook) = no_data {
                        hook(&value)?;
                    }
                }
                Some(class) => {
                    let hook = class.spec().and_then(|s| s.read_object()).cloned();
                    match hook {
                        Some(f) => {
                            self.frame.set_empty();
                            self.contexts.push(HookContext {
                                object: obj.clone(),
                                level: level.clone(),
                            });
                            let result = f(self, &value);
                            self.contexts.pop();
                            result?;
                        }
                        None => self.default_read_fields(level, obj)?,
                    }
                }
            }

            if flags.contains(DescFlags::WRITE_METHOD) {
                // custom-written level data is bounded by ENDBLOCKDATA
                self.discard_data()?;
            } else {
                self.frame.set_empty();
            }
        }
        Ok(())
    }

    fn default_read_fields(
        &mut self,
        level: &Rc<ClassDesc>,
        obj: &Rc<ObjectValue>,
    ) -> Result<(), Error> {
        let values = self.read_level_values(level)?;
        obj.push_level(level.name(), values);
        Ok(())
    }

    /// Reads one level's field section: all packed primitives, then all
    /// reference fields, in declared order.
    fn read_level_values(
        &mut self,
        level: &Rc<ClassDesc>,
    ) -> Result<IndexMap<Rc<str>, FieldValue>, Error> {
        let fields = level.fields();
        let prim_len: usize = fields
            .iter()
            .filter(|f| f.ty().is_primitive())
            .map(|f| f.ty().packed_size())
            .sum();
        let mut buf = vec![0u8; prim_len];
        self.data.read_exact(&mut buf)?;

        let mut out = IndexMap::new();
        let mut cursor: &[u8] = &buf;
        for field in fields.iter().filter(|f| f.ty().is_primitive()) {
            let value = field.ty().decode_prim(&mut cursor).ok_or_else(|| {
                Error::StreamCorrupted("primitive field buffer underrun".to_owned())
            })?;
            out.insert(field.name_rc(), FieldValue::Prim(value));
        }
        for field in fields.iter().filter(|f| !f.ty().is_primitive()) {
            let value = self.read_object_impl(false)?;
            out.insert(field.name_rc(), FieldValue::Ref(value));
        }
        Ok(out)
    }

    // --- in-hook operations ---

    /// Reads the current level's fields into the instance. Only valid
    /// from within a custom read hook.
    pub fn default_read_object(&mut self) -> Result<(), Error> {
        let ctx = self
            .contexts
            .last()
            .cloned()
            .ok_or(Error::NotActive("default_read_object"))?;
        let remaining = self.frame.block_remaining();
        if remaining > 0 {
            return Err(Error::OptionalData {
                remaining,
                at_end: false,
            });
        }
        self.frame.set_empty();
        self.default_read_fields(&ctx.level, &ctx.object)
    }

    /// Reads the current level's fields into a detached [`GetField`]
    /// view. Only valid from within a custom read hook.
    pub fn read_fields(&mut self) -> Result<GetField, Error> {
        let ctx = self
            .contexts
            .last()
            .cloned()
            .ok_or(Error::NotActive("read_fields"))?;
        let remaining = self.frame.block_remaining();
        if remaining > 0 {
            return Err(Error::OptionalData {
                remaining,
                at_end: false,
            });
        }
        self.frame.set_empty();
        let values = self.read_level_values(&ctx.level)?;
        Ok(GetField::new(ctx.level, values))
    }

    /// Defers a consistency check until the outermost read completes.
    /// Only valid while a read is active.
    pub fn register_validation(
        &mut self,
        callback: ValidationFn,
        priority: i32,
    ) -> Result<(), Error> {
        if self.depth == 0 && self.contexts.is_empty() {
            return Err(Error::NotActive("register_validation"));
        }
        self.validations
            .get_or_insert_with(ValidationQueue::new)
            .register(callback, priority);
        Ok(())
    }

    // --- framed primitive reads ---

    /// Starts the next block-data frame if one is pending. `false` means
    /// the next token is object-level (or the stream ended).
    fn refill_primitive(&mut self) -> Result<bool, Error> {
        loop {
            match self.frame.try_refill(&mut self.tokens, &mut self.data)? {
                Refill::Data => return Ok(true),
                Refill::Reset => {
                    log::trace!("in-band reset while refilling primitive data");
                    self.reset_state();
                }
                Refill::Empty => return Ok(false),
            }
        }
    }

    fn framed_read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let mut pos = 0;
        while pos < buf.len() {
            match self.frame.mode() {
                FrameMode::Raw => {
                    self.data.read_exact(&mut buf[pos..])?;
                    pos = buf.len();
                }
                FrameMode::Block { remaining } if remaining > 0 => {
                    let take = remaining.min(buf.len() - pos);
                    self.data.read_exact(&mut buf[pos..pos + take])?;
                    self.frame.consume(take);
                    pos += take;
                }
                _ => {
                    if !self.refill_primitive()? {
                        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                    }
                }
            }
        }
        Ok(())
    }

    fn framed_bytes<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut buf = [0u8; N];
        self.framed_read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads one primitive byte, or `None` when no primitive data is
    /// available before the next object-level token.
    fn try_framed_u8(&mut self) -> Result<Option<u8>, Error> {
        loop {
            match self.frame.mode() {
                FrameMode::Raw => return Ok(self.data.try_read_u8()?),
                FrameMode::Block { remaining } if remaining > 0 => {
                    let b = self.data.read_u8()?;
                    self.frame.consume(1);
                    return Ok(Some(b));
                }
                _ => {
                    if !self.refill_primitive()? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.framed_bytes::<1>()?[0] != 0)
    }

    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.framed_bytes::<1>()?[0] as i8)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.framed_bytes::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_be_bytes(self.framed_bytes()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.framed_bytes()?))
    }

    /// Reads a UTF-16 code unit.
    pub fn read_char(&mut self) -> Result<u16, Error> {
        self.read_u16()
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.framed_bytes()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_be_bytes(self.framed_bytes()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_be_bytes(self.framed_bytes()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_be_bytes(self.framed_bytes()?))
    }

    /// Reads a length-prefixed modified UTF-8 string from primitive data.
    pub fn read_utf(&mut self) -> Result<String, Error> {
        let len = self.read_u16()? as usize;
        let mut buf = vec![0u8; len];
        self.framed_read_exact(&mut buf)?;
        crate::data::decode_modified_utf8(&buf)
    }

    /// Fills `buf` from primitive data.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.framed_read_exact(buf)
    }

    /// Reads a line of Latin-1 bytes terminated by `\n` (a preceding
    /// `\r` is stripped) or by the end of primitive data. Returns `None`
    /// when no bytes remain.
    pub fn read_line(&mut self) -> Result<Option<String>, Error> {
        let mut bytes = Vec::new();
        loop {
            match self.try_framed_u8()? {
                None => break,
                Some(b'\n') => {
                    if bytes.last() == Some(&b'\r') {
                        bytes.pop();
                    }
                    return Ok(Some(latin1(&bytes)));
                }
                Some(b) => bytes.push(b),
            }
        }
        if bytes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(latin1(&bytes)))
        }
    }

    /// Bytes of primitive data readable before the next object-level
    /// token. Never consumes object-level data.
    pub fn available(&mut self) -> Result<usize, Error> {
        match self.frame.mode() {
            FrameMode::Raw => Ok(0),
            FrameMode::Block { remaining } if remaining > 0 => Ok(remaining),
            _ => {
                if self.refill_primitive()? {
                    Ok(self.frame.block_remaining())
                } else {
                    Ok(0)
                }
            }
        }
    }

    /// Skips up to `n` bytes of primitive data, returning the count
    /// actually skipped.
    pub fn skip(&mut self, n: usize) -> Result<usize, Error> {
        let mut skipped = 0;
        while skipped < n {
            match self.frame.mode() {
                FrameMode::Raw => {
                    self.data.skip(n - skipped)?;
                    skipped = n;
                }
                FrameMode::Block { remaining } if remaining > 0 => {
                    let take = remaining.min(n - skipped);
                    self.data.skip(take)?;
                    self.frame.consume(take);
                    skipped += take;
                }
                _ => {
                    if !self.refill_primitive()? {
                        break;
                    }
                }
            }
        }
        Ok(skipped)
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

impl<R: io::Read> HookInput for ObjectReader<R> {
    fn read_object(&mut self) -> Result<Value, Error> {
        ObjectReader::read_object(self)
    }

    fn read_unshared(&mut self) -> Result<Value, Error> {
        ObjectReader::read_unshared(self)
    }

    fn default_read_object(&mut self) -> Result<(), Error> {
        ObjectReader::default_read_object(self)
    }

    fn read_fields(&mut self) -> Result<GetField, Error> {
        ObjectReader::read_fields(self)
    }

    fn register_validation(&mut self, callback: ValidationFn, priority: i32) -> Result<(), Error> {
        ObjectReader::register_validation(self, callback, priority)
    }

    fn read_bool(&mut self) -> Result<bool, Error> {
        ObjectReader::read_bool(self)
    }

    fn read_i8(&mut self) -> Result<i8, Error> {
        ObjectReader::read_i8(self)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        ObjectReader::read_u8(self)
    }

    fn read_i16(&mut self) -> Result<i16, Error> {
        ObjectReader::read_i16(self)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        ObjectReader::read_u16(self)
    }

    fn read_char(&mut self) -> Result<u16, Error> {
        ObjectReader::read_char(self)
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        ObjectReader::read_i32(self)
    }

    fn read_i64(&mut self) -> Result<i64, Error> {
        ObjectReader::read_i64(self)
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        ObjectReader::read_f32(self)
    }

    fn read_f64(&mut self) -> Result<f64, Error> {
        ObjectReader::read_f64(self)
    }

    fn read_utf(&mut self) -> Result<String, Error> {
        ObjectReader::read_utf(self)
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        ObjectReader::read_fully(self, buf)
    }

    fn available(&mut self) -> Result<usize, Error> {
        ObjectReader::available(self)
    }

    fn skip(&mut self, n: usize) -> Result<usize, Error> {
        ObjectReader::skip(self, n)
    }
}
