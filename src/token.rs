//! Wire constants and the token protocol.

use std::io;

use num_enum::TryFromPrimitive;

use crate::data::DataInput;
use crate::error::Error;

/// Stream header magic, big-endian.
pub const STREAM_MAGIC: u16 = 0xACED;
/// Stream protocol version, big-endian.
pub const STREAM_VERSION: u16 = 0x0005;
/// First handle value assigned to a registered item.
pub const BASE_WIRE_HANDLE: u32 = 0x7E_0000;

/// Type code introducing the next item in the stream.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum Token {
    /// A null element.
    Null = 0x70,
    /// A back-reference; the next 4 bytes name the handle.
    Reference = 0x71,
    /// A regular class descriptor.
    ClassDesc = 0x72,
    /// An object instance.
    Object = 0x73,
    /// A UTF-8 string of at most 65535 bytes.
    String = 0x74,
    /// An array.
    Array = 0x75,
    /// A class literal.
    Class = 0x76,
    /// A block-data frame with a 1-byte length.
    BlockData = 0x77,
    /// Terminator for annotation and custom-data block sequences.
    EndBlockData = 0x78,
    /// Discards the handle table.
    Reset = 0x79,
    /// A block-data frame with a 4-byte length.
    BlockDataLong = 0x7A,
    /// The subgraph of an exception that aborted the original write.
    Exception = 0x7B,
    /// A UTF-8 string with an 8-byte length.
    LongString = 0x7C,
    /// A dynamic-interface (proxy) class descriptor.
    ProxyClassDesc = 0x7D,
    /// An enum constant.
    Enum = 0x7E,
}

/// One-deep pushback buffer over the stream's token bytes.
///
/// `peek`-style use is split into [`TokenBuf::next_byte`] plus
/// [`TokenBuf::push_back`]; at most one byte is ever buffered.
#[derive(Debug, Default)]
pub(crate) struct TokenBuf {
    pending: Option<u8>,
}

impl TokenBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the next token byte, consuming a pushed-back byte first.
    pub fn next_byte<R: io::Read>(&mut self, data: &mut DataInput<R>) -> Result<u8, Error> {
        match self.pending.take() {
            Some(b) => Ok(b),
            None => Ok(data.read_u8()?),
        }
    }

    /// Like [`Self::next_byte`], but a clean end of input yields `None`.
    pub fn try_next_byte<R: io::Read>(
        &mut self,
        data: &mut DataInput<R>,
    ) -> Result<Option<u8>, Error> {
        match self.pending.take() {
            Some(b) => Ok(Some(b)),
            None => Ok(data.try_read_u8()?),
        }
    }

    /// Reads and classifies the next token code.
    pub fn next_token<R: io::Read>(&mut self, data: &mut DataInput<R>) -> Result<Token, Error> {
        let b = self.next_byte(data)?;
        Token::try_from(b)
            .map_err(|_| Error::StreamCorrupted(format!("unknown token code {b:#04x}")))
    }

    /// Pushes the last byte back so the next read sees it again.
    pub fn push_back(&mut self, byte: u8) {
        debug_assert!(self.pending.is_none(), "token pushback buffer is single-slot");
        self.pending = Some(byte);
    }

    /// Drops any pushed-back byte.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushback_round_trip() {
        let mut buf = TokenBuf::new();
        let mut data = DataInput::new(&[0x70u8, 0x71][..]);

        let b = buf.next_byte(&mut data).expect("must read");
        assert_eq!(b, 0x70);
        buf.push_back(b);
        assert_eq!(
            buf.next_token(&mut data).expect("must classify"),
            Token::Null,
            "pushed-back byte must be seen again"
        );
        assert_eq!(
            buf.next_token(&mut data).expect("must classify"),
            Token::Reference
        );
    }

    #[test]
    fn unknown_token_code() {
        let mut buf = TokenBuf::new();
        let mut data = DataInput::new(&[0x42u8][..]);
        assert!(
            matches!(
                buf.next_token(&mut data),
                Err(Error::StreamCorrupted(_))
            ),
            "byte outside the token range must be rejected"
        );
    }
}
