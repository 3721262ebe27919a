//! Hand-built serialization streams for the integration tests.

/// Builds a stream byte-by-byte, starting from a valid header.
pub struct StreamBuilder {
    buf: Vec<u8>,
}

#[allow(dead_code)]
impl StreamBuilder {
    pub fn new() -> Self {
        Self {
            buf: vec![0xAC, 0xED, 0x00, 0x05],
        }
    }

    /// An empty buffer without the header.
    pub fn headerless() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn byte(mut self, b: u8) -> Self {
        self.buf.push(b);
        self
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn u16(self, v: u16) -> Self {
        self.bytes(&v.to_be_bytes())
    }

    pub fn u32(self, v: u32) -> Self {
        self.bytes(&v.to_be_bytes())
    }

    pub fn i32(self, v: i32) -> Self {
        self.bytes(&v.to_be_bytes())
    }

    pub fn i64(self, v: i64) -> Self {
        self.bytes(&v.to_be_bytes())
    }

    pub fn u64(self, v: u64) -> Self {
        self.bytes(&v.to_be_bytes())
    }

    /// A 2-byte length-prefixed string (tests only use ASCII).
    pub fn utf(self, s: &str) -> Self {
        let b = self.u16(s.len() as u16);
        b.bytes(s.as_bytes())
    }

    /// A STRING item.
    pub fn string(self, s: &str) -> Self {
        self.byte(0x74).utf(s)
    }

    /// A REFERENCE to a prior handle.
    pub fn reference(self, handle: u32) -> Self {
        self.byte(0x71).u32(handle)
    }

    /// A CLASSDESC with the given fields, an empty annotation block, and
    /// a null super descriptor. Reference-typed fields consume a handle
    /// for their signature string.
    pub fn plain_desc(self, name: &str, uid: i64, flags: u8, fields: &[(u8, &str)]) -> Self {
        self.open_desc(name, uid, flags, fields).byte(0x78).byte(0x70)
    }

    /// Like [`Self::plain_desc`] but leaves annotation terminator and
    /// super descriptor to the caller.
    pub fn open_desc(self, name: &str, uid: i64, flags: u8, fields: &[(u8, &str)]) -> Self {
        let mut b = self
            .byte(0x72)
            .utf(name)
            .i64(uid)
            .byte(flags)
            .u16(fields.len() as u16);
        for (code, field_name) in fields {
            b = b.byte(*code).utf(field_name);
            if *code == b'L' || *code == b'[' {
                // signature string; the exact text is irrelevant here
                b = b.string("Ljava/lang/Object;");
            }
        }
        b
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// First handle value assigned in a fresh stream.
pub const BASE: u32 = 0x7E_0000;
