//! Per-call encoding and decoding state.
//!
//! A context lives for exactly one `write_value`/`read_value` call. It carries the
//! shared [`Schema`], the output buffer or input source, and the bookkeeping needed
//! for cycle detection (encoder) and nesting limits (decoder).

use crate::core::{LEN_INLINE_MAX, LEN_U16, LEN_U32, LEN_U64};
use crate::*;
use bytes::{BufMut, BytesMut};
use std::any::TypeId;
use std::io::{ErrorKind, Read};

/// Upper bound on bytes reserved up front for a length read from the stream.
const READ_PREALLOC_LIMIT: usize = 1024;

/// Encoder state for a single top-level value.
pub struct WriteContext<'a> {
    schema: &'a Schema,
    writer: &'a mut BytesMut,
    /// Objects currently being written, outermost first.
    path: Vec<(usize, TypeId)>,
}

impl<'a> WriteContext<'a> {
    pub fn new(schema: &'a Schema, writer: &'a mut BytesMut) -> Self {
        Self {
            schema,
            writer,
            path: Vec::new(),
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn writer(&mut self) -> &mut BytesMut {
        self.writer
    }

    #[inline]
    pub fn put_u8(&mut self, byte: u8) {
        self.writer.put_u8(byte);
    }

    #[inline]
    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.writer.put_slice(bytes);
    }

    #[inline]
    pub fn write_len(&mut self, len: usize) {
        crate::core::write_len(self.writer, len);
    }

    /// Marks `obj` as being written.
    ///
    /// Fails with `CyclicGraphUnsupported` if the same object (address and runtime type)
    /// is already on the current path.
    pub(crate) fn enter(&mut self, obj: &dyn Object) -> Result<()> {
        let key = (
            obj as *const dyn Object as *const () as usize,
            obj.as_any().type_id(),
        );
        if self.path.contains(&key) {
            return Err(SerDesError::CyclicGraphUnsupported {
                type_name: obj.type_name(),
            });
        }
        self.path.push(key);
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }

    /// Number of objects currently being written.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Decoder state for a single top-level value.
pub struct ReadContext<'a> {
    schema: &'a Schema,
    resolver: Option<&'a dyn TypeResolver>,
    reader: &'a mut dyn Read,
    depth: usize,
    max_depth: usize,
}

impl<'a> ReadContext<'a> {
    pub fn new(schema: &'a Schema, reader: &'a mut dyn Read) -> Self {
        Self {
            schema,
            resolver: None,
            reader,
            depth: 0,
            max_depth: Config::default().max_depth,
        }
    }

    pub fn with_resolver(mut self, resolver: Option<&'a dyn TypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn resolver(&self) -> Option<&'a dyn TypeResolver> {
        self.resolver
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => SerDesError::TruncatedStream,
            _ => SerDesError::Io(e),
        })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte)?;
        Ok(byte[0])
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Reads exactly `len` bytes without trusting `len` for the allocation size.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(READ_PREALLOC_LIMIT));
        (&mut *self.reader)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(SerDesError::Io)?;
        if buf.len() < len {
            return Err(SerDesError::TruncatedStream);
        }
        Ok(buf)
    }

    /// Reads a value written with [`crate::core::write_len`].
    pub fn read_len(&mut self) -> Result<usize> {
        let first = self.read_u8()?;
        let len = match first {
            0..=LEN_INLINE_MAX => first as u64,
            LEN_U16 => u16::from_le_bytes(self.read_array::<2>()?) as u64,
            LEN_U32 => u32::from_le_bytes(self.read_array::<4>()?) as u64,
            LEN_U64 => u64::from_le_bytes(self.read_array::<8>()?),
        };
        usize::try_from(len)
            .map_err(|_| SerDesError::InvalidData(format!("length {} does not fit in usize", len)))
    }

    /// Enters one nesting level (object or container).
    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(SerDesError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
