use crate::collection::{decode_text_element, encode_text_element};
use crate::*;
use bytes::{BufMut, BytesMut};
use std::sync::Arc;

/// Type tags used in the netser binary format.
///
/// These tags are written as the first byte of each encoded value to identify its kind.
/// Registered object types are tagged with their registry id (see `TAG_OBJECT_BASE`),
/// which keeps them disjoint from every built-in tag.
///
/// - Primitives are fixed-width little-endian after the tag.
/// - `TAG_STRING_REF_*` and `TAG_SMALL_INT_*` only appear as collection elements.
/// - Tags are stable and part of the wire format.

///< null reference (nested value, boxed primitive, text, element, key or value)
pub const TAG_NULL: u8 = 0x00;
pub const TAG_FALSE: u8 = 0x01;
pub const TAG_TRUE: u8 = 0x02;
pub const TAG_I8: u8 = 0x03;
pub const TAG_I16: u8 = 0x04;
pub const TAG_I32: u8 = 0x05;
pub const TAG_I64: u8 = 0x06;
pub const TAG_U8: u8 = 0x07;
pub const TAG_U16: u8 = 0x08;
pub const TAG_U32: u8 = 0x09;
pub const TAG_U64: u8 = 0x0A;
pub const TAG_F32: u8 = 0x0B;
pub const TAG_F64: u8 = 0x0C;
///< Unicode scalar value as u32
pub const TAG_CHAR: u8 = 0x0D;
///< UTF-8 text (length encoded)
pub const TAG_STRING: u8 = 0x0E;
///< Ordered sequence (Vec, VecDeque, LinkedList)
pub const TAG_LIST: u8 = 0x0F;
///< Unique set (HashSet, BTreeSet, IndexSet, FxHashSet, AHashSet)
pub const TAG_SET: u8 = 0x10;
///< Association (HashMap, BTreeMap, IndexMap, FxHashMap, AHashMap)
pub const TAG_MAP: u8 = 0x11;
///< Type literal of a built-in kind
pub const TAG_TYPE_BUILTIN: u8 = 0x12;
///< Type literal of a registered type
pub const TAG_TYPE_REGISTERED: u8 = 0x13;
///< Type literal resolved by name
pub const TAG_TYPE_NAMED: u8 = 0x14;
///< Registered object whose id does not fit in the tag
pub const TAG_OBJECT_LONG: u8 = 0x15;
///< Collection element: index into the per-collection string table
pub const TAG_STRING_REF_BASE: u8 = 0x20;
pub const TAG_STRING_REF_LAST: u8 = 0x2F;
///< Collection element: i32 value 0..=63 carried in the tag
pub const TAG_SMALL_INT_BASE: u8 = 0x40;
pub const TAG_SMALL_INT_LAST: u8 = 0x7F;
///< Registered object, ids 0..=127 carried in the tag
pub const TAG_OBJECT_BASE: u8 = 0x80;

/// Largest length written as a single byte.
pub const LEN_INLINE_MAX: u8 = 0xFC;
pub const LEN_U16: u8 = 0xFD;
pub const LEN_U32: u8 = 0xFE;
pub const LEN_U64: u8 = 0xFF;

/// Returns true if `tag` belongs to any assigned tag range.
pub fn is_assigned_tag(tag: u8) -> bool {
    matches!(
        tag,
        TAG_NULL..=TAG_OBJECT_LONG | TAG_STRING_REF_BASE..=TAG_STRING_REF_LAST | TAG_SMALL_INT_BASE..=u8::MAX
    )
}

/// Human readable name of a tag, used in error messages.
pub fn tag_name(tag: u8) -> String {
    let name = match tag {
        TAG_NULL => "null",
        TAG_FALSE | TAG_TRUE => "bool",
        TAG_I8 => "i8",
        TAG_I16 => "i16",
        TAG_I32 => "i32",
        TAG_I64 => "i64",
        TAG_U8 => "u8",
        TAG_U16 => "u16",
        TAG_U32 => "u32",
        TAG_U64 => "u64",
        TAG_F32 => "f32",
        TAG_F64 => "f64",
        TAG_CHAR => "char",
        TAG_STRING => "text",
        TAG_LIST => "sequence",
        TAG_SET => "set",
        TAG_MAP => "map",
        TAG_TYPE_BUILTIN | TAG_TYPE_REGISTERED | TAG_TYPE_NAMED => "type literal",
        TAG_OBJECT_LONG => "object",
        TAG_STRING_REF_BASE..=TAG_STRING_REF_LAST => "string table reference",
        TAG_SMALL_INT_BASE..=TAG_SMALL_INT_LAST => "small i32 element",
        TAG_OBJECT_BASE..=u8::MAX => return format!("object #{}", tag - TAG_OBJECT_BASE),
        other => return format!("unassigned tag 0x{:02X}", other),
    };
    name.to_string()
}

/// Builds the error for a tag that cannot start the expected value.
///
/// Unassigned tags are reported as `UnknownTypeId`, assigned ones as `TypeMismatch`.
pub fn unexpected_tag(expected: &str, tag: u8) -> SerDesError {
    if is_assigned_tag(tag) {
        SerDesError::type_mismatch(expected, tag_name(tag))
    } else {
        SerDesError::UnknownTypeId(tag as u64)
    }
}

/// Writes a length or id using the compact length encoding.
///
/// - `0..=0xFC` is a single byte
/// - Larger values use `LEN_U16`, `LEN_U32` or `LEN_U64` followed by the value in little-endian
pub fn write_len(writer: &mut BytesMut, len: usize) {
    if len <= LEN_INLINE_MAX as usize {
        writer.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        writer.put_u8(LEN_U16);
        writer.put_u16_le(len as u16);
    } else if len <= u32::MAX as usize {
        writer.put_u8(LEN_U32);
        writer.put_u32_le(len as u32);
    } else {
        writer.put_u8(LEN_U64);
        writer.put_u64_le(len as u64);
    }
}

// --- bool ---
/// Encodes a `bool` as a single tag byte: `TAG_FALSE` or `TAG_TRUE`.
impl Encoder for bool {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.put_u8(if *self { TAG_TRUE } else { TAG_FALSE });
        Ok(())
    }

    fn kind() -> ValueKind {
        ValueKind::Primitive(PrimitiveKind::Bool)
    }
}
impl Decoder for bool {
    fn decode_tagged(tag: u8, _ctx: &mut ReadContext<'_>) -> Result<Self> {
        match tag {
            TAG_FALSE => Ok(false),
            TAG_TRUE => Ok(true),
            other => Err(unexpected_tag("bool", other)),
        }
    }
}

// --- Fixed-width numbers ---
/// Encodes a number as its tag followed by the little-endian bytes.
macro_rules! impl_fixed_number {
    ($ty:ty, $tag:expr, $kind:expr, $put:ident, $size:expr) => {
        impl Encoder for $ty {
            fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
                ctx.put_u8($tag);
                ctx.writer().$put(*self);
                Ok(())
            }

            fn kind() -> ValueKind {
                ValueKind::Primitive($kind)
            }
        }
        impl Decoder for $ty {
            fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
                if tag != $tag {
                    return Err(unexpected_tag(stringify!($ty), tag));
                }
                Ok(<$ty>::from_le_bytes(ctx.read_array::<$size>()?))
            }
        }
    };
}

impl_fixed_number!(i8, TAG_I8, PrimitiveKind::I8, put_i8, 1);
impl_fixed_number!(i16, TAG_I16, PrimitiveKind::I16, put_i16_le, 2);
impl_fixed_number!(i64, TAG_I64, PrimitiveKind::I64, put_i64_le, 8);
impl_fixed_number!(u8, TAG_U8, PrimitiveKind::U8, put_u8, 1);
impl_fixed_number!(u16, TAG_U16, PrimitiveKind::U16, put_u16_le, 2);
impl_fixed_number!(u32, TAG_U32, PrimitiveKind::U32, put_u32_le, 4);
impl_fixed_number!(u64, TAG_U64, PrimitiveKind::U64, put_u64_le, 8);
impl_fixed_number!(f32, TAG_F32, PrimitiveKind::F32, put_f32_le, 4);
impl_fixed_number!(f64, TAG_F64, PrimitiveKind::F64, put_f64_le, 8);

// --- i32 ---
/// `i32` is the only number taking part in the collection tag optimization:
/// elements in `0..=63` are written as the single byte `TAG_SMALL_INT_BASE + v`.
impl Encoder for i32 {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.put_u8(TAG_I32);
        ctx.writer().put_i32_le(*self);
        Ok(())
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, _table: &mut ElementTable) -> Result<()> {
        match small_int_tag(*self) {
            Some(tag) => {
                ctx.put_u8(tag);
                Ok(())
            }
            None => self.encode(ctx),
        }
    }

    fn kind() -> ValueKind {
        ValueKind::Primitive(PrimitiveKind::I32)
    }
}
impl Decoder for i32 {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        if tag != TAG_I32 {
            return Err(unexpected_tag("i32", tag));
        }
        Ok(i32::from_le_bytes(ctx.read_array::<4>()?))
    }

    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, _table: &mut ElementTable) -> Result<Self> {
        if (TAG_SMALL_INT_BASE..=TAG_SMALL_INT_LAST).contains(&tag) {
            Ok((tag - TAG_SMALL_INT_BASE) as i32)
        } else {
            Self::decode_tagged(tag, ctx)
        }
    }
}

/// Returns the compact element tag for `value`, if it qualifies.
#[inline]
pub(crate) fn small_int_tag(value: i32) -> Option<u8> {
    let max = (TAG_SMALL_INT_LAST - TAG_SMALL_INT_BASE) as i32;
    if (0..=max).contains(&value) {
        Some(TAG_SMALL_INT_BASE + value as u8)
    } else {
        None
    }
}

// --- char ---
impl Encoder for char {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.put_u8(TAG_CHAR);
        ctx.writer().put_u32_le(*self as u32);
        Ok(())
    }

    fn kind() -> ValueKind {
        ValueKind::Primitive(PrimitiveKind::Char)
    }
}
impl Decoder for char {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        if tag != TAG_CHAR {
            return Err(unexpected_tag("char", tag));
        }
        let raw = u32::from_le_bytes(ctx.read_array::<4>()?);
        char::from_u32(raw)
            .ok_or_else(|| SerDesError::InvalidData(format!("invalid char scalar 0x{:X}", raw)))
    }
}

// --- String ---
/// Writes `TAG_STRING`, the compact byte length and the UTF-8 bytes.
pub(crate) fn write_text(text: &str, ctx: &mut WriteContext<'_>) {
    ctx.put_u8(TAG_STRING);
    ctx.write_len(text.len());
    ctx.put_slice(text.as_bytes());
}

/// Reads the length and UTF-8 bytes following a `TAG_STRING`.
pub(crate) fn read_text_payload(ctx: &mut ReadContext<'_>) -> Result<String> {
    let len = ctx.read_len()?;
    let bytes = ctx.read_bytes(len)?;
    String::from_utf8(bytes).map_err(|e| SerDesError::InvalidData(e.to_string()))
}

/// Encodes a `String` as text. Inside collections repeated strings are table references.
impl Encoder for String {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_text(self, ctx);
        Ok(())
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        encode_text_element(self, ctx, table);
        Ok(())
    }

    fn kind() -> ValueKind {
        ValueKind::Text
    }
}
impl Decoder for String {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        if tag != TAG_STRING {
            return Err(unexpected_tag("text", tag));
        }
        read_text_payload(ctx)
    }

    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, table: &mut ElementTable) -> Result<Self> {
        decode_text_element(tag, ctx, table)
    }
}

// --- Option ---
/// Encodes an `Option<T>` as `TAG_NULL` or the value itself.
///
/// Every value starts with a non-null tag, so the value's own tag marks presence.
impl<T: Encoder> Encoder for Option<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        match self {
            Some(value) => value.encode(ctx),
            None => {
                ctx.put_u8(TAG_NULL);
                Ok(())
            }
        }
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        match self {
            Some(value) => value.encode_element(ctx, table),
            None => {
                ctx.put_u8(TAG_NULL);
                Ok(())
            }
        }
    }

    fn kind() -> ValueKind {
        match T::kind() {
            ValueKind::Primitive(p) => ValueKind::Boxed(p),
            other => other,
        }
    }
}
impl<T: Decoder> Decoder for Option<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        if tag == TAG_NULL {
            Ok(None)
        } else {
            T::decode_tagged(tag, ctx).map(Some)
        }
    }

    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, table: &mut ElementTable) -> Result<Self> {
        if tag == TAG_NULL {
            Ok(None)
        } else {
            T::decode_element(tag, ctx, table).map(Some)
        }
    }
}

// --- Box<T> ---
/// Encodes a `Box<T>` by encoding the inner value.
impl<T: Encoder> Encoder for Box<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        (**self).encode(ctx)
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        (**self).encode_element(ctx, table)
    }

    fn kind() -> ValueKind {
        T::kind()
    }
}
impl<T: Decoder> Decoder for Box<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Box::new(T::decode_tagged(tag, ctx)?))
    }

    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, table: &mut ElementTable) -> Result<Self> {
        Ok(Box::new(T::decode_element(tag, ctx, table)?))
    }
}

// --- Arc<T> ---
/// Encodes an `Arc<T>` by encoding the inner value. Sharing is not preserved.
impl<T: Encoder> Encoder for Arc<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        (**self).encode(ctx)
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        (**self).encode_element(ctx, table)
    }

    fn kind() -> ValueKind {
        T::kind()
    }
}
impl<T: Decoder> Decoder for Arc<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Arc::new(T::decode_tagged(tag, ctx)?))
    }

    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, table: &mut ElementTable) -> Result<Self> {
        Ok(Arc::new(T::decode_element(tag, ctx, table)?))
    }
}

/// Implementation for references - delegates to the referenced value
impl<T: Encoder> Encoder for &T {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        (**self).encode(ctx)
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        (**self).encode_element(ctx, table)
    }

    fn kind() -> ValueKind {
        T::kind()
    }
}
