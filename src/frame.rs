//! Block-data framing between primitive and object stream modes.

use std::io;

use crate::data::DataInput;
use crate::error::Error;
use crate::token::{Token, TokenBuf};

/// Where primitive bytes currently come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameMode {
    /// Bytes mirror the underlying stream directly. Only used while the
    /// header is read and for unframed externalizable payloads.
    Raw,
    /// No primitive bytes are buffered; the next token decides.
    Empty,
    /// Bytes come from the current block-data frame.
    Block {
        /// Unread bytes left in the frame.
        remaining: usize,
    },
}

/// Outcome of trying to start the next block-data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refill {
    /// A frame with at least its length header was started.
    Data,
    /// A RESET token was consumed; the driver must reset and retry.
    Reset,
    /// The next token introduces an object (pushed back), or the stream
    /// ended. No primitive bytes are available.
    Empty,
}

/// Mode machine gating primitive reads against object-level tokens.
///
/// The frame never buffers payload bytes; it only tracks how many may
/// still be taken from the underlying stream before the next token.
#[derive(Debug)]
pub(crate) struct BlockFrame {
    mode: FrameMode,
}

impl BlockFrame {
    pub fn new() -> Self {
        Self { mode: FrameMode::Empty }
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    pub fn is_raw(&self) -> bool {
        self.mode == FrameMode::Raw
    }

    pub fn set_raw(&mut self) {
        self.mode = FrameMode::Raw;
    }

    pub fn set_empty(&mut self) {
        self.mode = FrameMode::Empty;
    }

    /// Unread bytes in the current frame, 0 outside block mode.
    pub fn block_remaining(&self) -> usize {
        match self.mode {
            FrameMode::Block { remaining } => remaining,
            _ => 0,
        }
    }

    /// Begins a frame whose length header was already consumed.
    pub fn start_block(&mut self, len: usize) {
        debug_assert_eq!(self.block_remaining(), 0, "frame started over buffered bytes");
        self.mode = FrameMode::Block { remaining: len };
    }

    /// Marks `n` frame bytes as consumed from the underlying stream.
    pub fn consume(&mut self, n: usize) {
        if let FrameMode::Block { remaining } = &mut self.mode {
            *remaining = remaining.saturating_sub(n);
        }
    }

    /// Attempts to begin the next block-data frame.
    ///
    /// Consumes BLOCKDATA / BLOCKDATALONG headers. RESET is reported to
    /// the caller (resetting is a driver concern); any other token is
    /// pushed back untouched.
    pub fn try_refill<R: io::Read>(
        &mut self,
        tokens: &mut TokenBuf,
        data: &mut DataInput<R>,
    ) -> Result<Refill, Error> {
        debug_assert_eq!(self.block_remaining(), 0, "refill with buffered frame bytes");

        let Some(byte) = tokens.try_next_byte(data)? else {
            return Ok(Refill::Empty);
        };

        match Token::try_from(byte) {
            Ok(Token::BlockData) => {
                let len = data.read_u8()? as usize;
                self.mode = FrameMode::Block { remaining: len };
                Ok(Refill::Data)
            }
            Ok(Token::BlockDataLong) => {
                let len = data.read_u32()? as usize;
                self.mode = FrameMode::Block { remaining: len };
                Ok(Refill::Data)
            }
            Ok(Token::Reset) => Ok(Refill::Reset),
            // not primitive data; leave it for the object-level reader,
            // even if the byte is not a valid token code
            _ => {
                tokens.push_back(byte);
                self.mode = FrameMode::Empty;
                Ok(Refill::Empty)
            }
        }
    }
}
