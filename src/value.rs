//! A dynamically typed value, able to hold anything the wire format can carry.

use crate::collection::{
    decode_elements, decode_entries, decode_text_element, encode_elements, encode_entries,
    encode_text_element,
};
use crate::core::*;
use crate::object::{decode_object, encode_object, is_object_tag};
use crate::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::mem;

/// Any value read from, or written to, the netser format.
///
/// Decoding into `Value` needs no knowledge of the static shape of the data: integers keep
/// their exact width, sets are deduplicated and later duplicate map keys overwrite earlier
/// ones. Sets and maps keep their entries in stream order and compare order-insensitively.
#[derive(Debug)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Text(String),
    Object(Box<dyn Object>),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Type(TypeRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object<T: Object>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Looks up a map entry by key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.eq_object(b.as_ref()),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.iter().all(|item| b.contains(item)) && b.iter().all(|item| a.contains(item))
            }
            (Value::Map(a), Value::Map(b)) => a
                .iter()
                .chain(b.iter())
                .all(|(k, _)| self.get(k) == other.get(k)),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Feeds a hash consistent with `PartialEq` into `state`.
    ///
    /// Objects, sets, maps and type literals contribute only their variant and share a bucket.
    fn hash_shallow<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::I8(v) => v.hash(state),
            Value::I16(v) => v.hash(state),
            Value::I32(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::U8(v) => v.hash(state),
            Value::U16(v) => v.hash(state),
            Value::U32(v) => v.hash(state),
            Value::U64(v) => v.hash(state),
            // 0.0 and -0.0 are equal; NaN equals nothing, so any hash will do.
            Value::F32(v) if *v != 0.0 => v.to_bits().hash(state),
            Value::F64(v) if *v != 0.0 => v.to_bits().hash(state),
            Value::Char(v) => v.hash(state),
            Value::Text(v) => v.hash(state),
            Value::Object(obj) => obj.as_any().type_id().hash(state),
            Value::List(items) => {
                items.len().hash(state);
                for item in items {
                    item.hash_shallow(state);
                }
            }
            _ => {}
        }
    }
}

/// Hash buckets over the keys of a set or map being decoded, so deduplication does not
/// rescan every earlier entry.
#[derive(Default)]
struct KeyIndex {
    buckets: HashMap<u64, Vec<usize>>,
}

impl KeyIndex {
    fn digest(key: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash_shallow(&mut hasher);
        hasher.finish()
    }

    fn find<E>(
        &self,
        digest: u64,
        key: &Value,
        entries: &[E],
        key_of: fn(&E) -> &Value,
    ) -> Option<usize> {
        self.buckets
            .get(&digest)?
            .iter()
            .copied()
            .find(|&i| key_of(&entries[i]) == key)
    }

    fn insert(&mut self, digest: u64, position: usize) {
        self.buckets.entry(digest).or_default().push(position);
    }
}

fn set_key(item: &Value) -> &Value {
    item
}

fn map_key(entry: &(Value, Value)) -> &Value {
    &entry.0
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => Text,
    Box<dyn Object> => Object,
    TypeRef => Type,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Encoder for Value {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        match self {
            Value::Null => {
                ctx.put_u8(TAG_NULL);
                Ok(())
            }
            Value::Bool(v) => v.encode(ctx),
            Value::I8(v) => v.encode(ctx),
            Value::I16(v) => v.encode(ctx),
            Value::I32(v) => v.encode(ctx),
            Value::I64(v) => v.encode(ctx),
            Value::U8(v) => v.encode(ctx),
            Value::U16(v) => v.encode(ctx),
            Value::U32(v) => v.encode(ctx),
            Value::U64(v) => v.encode(ctx),
            Value::F32(v) => v.encode(ctx),
            Value::F64(v) => v.encode(ctx),
            Value::Char(v) => v.encode(ctx),
            Value::Text(v) => v.encode(ctx),
            Value::Object(obj) => encode_object(obj.as_ref(), ctx),
            Value::List(items) => encode_elements(TAG_LIST, items.len(), items, ctx),
            Value::Set(items) => encode_elements(TAG_SET, items.len(), items, ctx),
            Value::Map(entries) => {
                encode_entries(entries.len(), entries.iter().map(|(k, v)| (k, v)), ctx)
            }
            Value::Type(t) => t.encode(ctx),
        }
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        match self {
            Value::I32(v) => v.encode_element(ctx, table),
            Value::Text(v) => {
                encode_text_element(v, ctx, table);
                Ok(())
            }
            other => other.encode(ctx),
        }
    }

    fn kind() -> ValueKind {
        ValueKind::Dynamic
    }
}

impl Decoder for Value {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_FALSE | TAG_TRUE => Value::Bool(bool::decode_tagged(tag, ctx)?),
            TAG_I8 => Value::I8(i8::decode_tagged(tag, ctx)?),
            TAG_I16 => Value::I16(i16::decode_tagged(tag, ctx)?),
            TAG_I32 => Value::I32(i32::decode_tagged(tag, ctx)?),
            TAG_I64 => Value::I64(i64::decode_tagged(tag, ctx)?),
            TAG_U8 => Value::U8(u8::decode_tagged(tag, ctx)?),
            TAG_U16 => Value::U16(u16::decode_tagged(tag, ctx)?),
            TAG_U32 => Value::U32(u32::decode_tagged(tag, ctx)?),
            TAG_U64 => Value::U64(u64::decode_tagged(tag, ctx)?),
            TAG_F32 => Value::F32(f32::decode_tagged(tag, ctx)?),
            TAG_F64 => Value::F64(f64::decode_tagged(tag, ctx)?),
            TAG_CHAR => Value::Char(char::decode_tagged(tag, ctx)?),
            TAG_STRING => Value::Text(String::decode_tagged(tag, ctx)?),
            TAG_LIST => Value::List(decode_elements(
                tag,
                TAG_LIST,
                "sequence",
                ctx,
                Vec::with_capacity,
                Vec::push,
            )?),
            TAG_SET => {
                let (items, _) = decode_elements(
                    tag,
                    TAG_SET,
                    "set",
                    ctx,
                    |n| (Vec::with_capacity(n), KeyIndex::default()),
                    |(set, index): &mut (Vec<Value>, KeyIndex), item: Value| {
                        let digest = KeyIndex::digest(&item);
                        if index.find(digest, &item, &set[..], set_key).is_none() {
                            index.insert(digest, set.len());
                            set.push(item);
                        }
                    },
                )?;
                Value::Set(items)
            }
            TAG_MAP => {
                let (entries, _) = decode_entries(
                    tag,
                    ctx,
                    |n| (Vec::with_capacity(n), KeyIndex::default()),
                    |(map, index): &mut (Vec<(Value, Value)>, KeyIndex), key: Value, value: Value| {
                        let digest = KeyIndex::digest(&key);
                        match index.find(digest, &key, &map[..], map_key) {
                            Some(position) => map[position].1 = value,
                            None => {
                                index.insert(digest, map.len());
                                map.push((key, value));
                            }
                        }
                    },
                )?;
                Value::Map(entries)
            }
            TAG_TYPE_BUILTIN | TAG_TYPE_REGISTERED | TAG_TYPE_NAMED => {
                Value::Type(TypeRef::decode_tagged(tag, ctx)?)
            }
            t if is_object_tag(t) => Value::Object(decode_object(t, ctx)?),
            other => return Err(unexpected_tag("value", other)),
        };
        Ok(value)
    }

    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, table: &mut ElementTable) -> Result<Self> {
        match tag {
            TAG_SMALL_INT_BASE..=TAG_SMALL_INT_LAST => {
                Ok(Value::I32(i32::decode_element(tag, ctx, table)?))
            }
            TAG_STRING | TAG_STRING_REF_BASE..=TAG_STRING_REF_LAST => {
                Ok(Value::Text(decode_text_element(tag, ctx, table)?))
            }
            _ => Self::decode_tagged(tag, ctx),
        }
    }
}
