//! Sequence, set and map encoding, including the per-collection tag optimization.
//!
//! Every container writes its tag, the compact element count, and then each element
//! through [`Encoder::encode_element`]. Two element shapes get a one-byte encoding:
//!
//! - `i32` values in `0..=63` become `TAG_SMALL_INT_BASE + v`.
//! - Text already seen in the same container becomes `TAG_STRING_REF_BASE + index`.
//!
//! The string table is rebuilt by the decoder from the bytes it has already read, so the
//! optimization never depends on anything outside the stream.

use crate::core::{
    read_text_payload, unexpected_tag, write_text, TAG_LIST, TAG_MAP, TAG_SET, TAG_STRING,
    TAG_STRING_REF_BASE, TAG_STRING_REF_LAST,
};
use crate::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::Hash;

/// Number of distinct strings a single container can reference by index.
pub const ELEMENT_TABLE_CAPACITY: usize = (TAG_STRING_REF_LAST - TAG_STRING_REF_BASE) as usize + 1;

/// Upper bound on capacity reserved from an untrusted element count.
const PREALLOC_LIMIT: usize = 1024;

/// Per-container table of strings that later elements may reference by index.
#[derive(Debug, Default, Clone)]
pub struct ElementTable {
    strings: Vec<String>,
}

impl ElementTable {
    /// An empty table, as at the start of every container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of strings held.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// True until the first text element of the container.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Index of `text`, if it is in the table.
    pub fn position(&self, text: &str) -> Option<usize> {
        self.strings.iter().position(|s| s == text)
    }

    /// The string referenced by `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Adds `text` while the table has room and does not hold it yet.
    pub fn remember(&mut self, text: &str) {
        if self.strings.len() < ELEMENT_TABLE_CAPACITY && self.position(text).is_none() {
            self.strings.push(text.to_owned());
        }
    }
}

/// Writes a text element, as a table reference when the container already holds it.
pub(crate) fn encode_text_element(text: &str, ctx: &mut WriteContext<'_>, table: &mut ElementTable) {
    match table.position(text) {
        Some(index) => ctx.put_u8(TAG_STRING_REF_BASE + index as u8),
        None => {
            write_text(text, ctx);
            table.remember(text);
        }
    }
}

/// Reads a text element written by [`encode_text_element`].
pub(crate) fn decode_text_element(
    tag: u8,
    ctx: &mut ReadContext<'_>,
    table: &mut ElementTable,
) -> Result<String> {
    if (TAG_STRING_REF_BASE..=TAG_STRING_REF_LAST).contains(&tag) {
        let index = (tag - TAG_STRING_REF_BASE) as usize;
        return table.get(index).map(str::to_owned).ok_or_else(|| {
            SerDesError::InvalidData(format!("string table reference {} is not defined", index))
        });
    }
    if tag != TAG_STRING {
        return Err(unexpected_tag("text", tag));
    }
    let text = read_text_payload(ctx)?;
    table.remember(&text);
    Ok(text)
}

/// Writes a sequence or set: tag, count, then every element through the element path.
pub fn encode_elements<'v, T, I>(tag: u8, len: usize, items: I, ctx: &mut WriteContext<'_>) -> Result<()>
where
    T: Encoder + 'v,
    I: IntoIterator<Item = &'v T>,
{
    ctx.put_u8(tag);
    ctx.write_len(len);
    let mut table = ElementTable::new();
    for item in items {
        item.encode_element(ctx, &mut table)?;
    }
    Ok(())
}

/// Writes a map: `TAG_MAP`, count, then key and value of every entry.
pub fn encode_entries<'v, K, V, I>(len: usize, entries: I, ctx: &mut WriteContext<'_>) -> Result<()>
where
    K: Encoder + 'v,
    V: Encoder + 'v,
    I: IntoIterator<Item = (&'v K, &'v V)>,
{
    ctx.put_u8(TAG_MAP);
    ctx.write_len(len);
    let mut table = ElementTable::new();
    for (key, value) in entries {
        key.encode_element(ctx, &mut table)?;
        value.encode_element(ctx, &mut table)?;
    }
    Ok(())
}

/// Reads a sequence or set into a freshly made collection.
///
/// `make` receives a capacity hint; `insert` decides the collection semantics
/// (duplicates kept for sequences, collapsed for sets).
pub fn decode_elements<T, C>(
    tag: u8,
    expected_tag: u8,
    expected: &str,
    ctx: &mut ReadContext<'_>,
    make: impl FnOnce(usize) -> C,
    mut insert: impl FnMut(&mut C, T),
) -> Result<C>
where
    T: Decoder,
{
    if tag != expected_tag {
        return Err(unexpected_tag(expected, tag));
    }
    let len = ctx.read_len()?;
    ctx.enter()?;
    let mut collection = make(len.min(PREALLOC_LIMIT));
    let mut table = ElementTable::new();
    for _ in 0..len {
        let tag = ctx.read_u8()?;
        insert(&mut collection, T::decode_element(tag, ctx, &mut table)?);
    }
    ctx.leave();
    Ok(collection)
}

/// Reads a map into a freshly made collection. Later duplicate keys overwrite earlier ones.
pub fn decode_entries<K, V, C>(
    tag: u8,
    ctx: &mut ReadContext<'_>,
    make: impl FnOnce(usize) -> C,
    mut insert: impl FnMut(&mut C, K, V),
) -> Result<C>
where
    K: Decoder,
    V: Decoder,
{
    if tag != TAG_MAP {
        return Err(unexpected_tag("map", tag));
    }
    let len = ctx.read_len()?;
    ctx.enter()?;
    let mut map = make(len.min(PREALLOC_LIMIT));
    let mut table = ElementTable::new();
    for _ in 0..len {
        let key_tag = ctx.read_u8()?;
        let key = K::decode_element(key_tag, ctx, &mut table)?;
        let value_tag = ctx.read_u8()?;
        let value = V::decode_element(value_tag, ctx, &mut table)?;
        insert(&mut map, key, value);
    }
    ctx.leave();
    Ok(map)
}

// --- Vec<T> ---
impl<T: Encoder> Encoder for Vec<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_LIST, self.len(), self, ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Sequence(Box::new(T::kind()))
    }
}
impl<T: Decoder> Decoder for Vec<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(tag, TAG_LIST, "sequence", ctx, Vec::with_capacity, Vec::push)
    }
}

// --- VecDeque<T> ---
impl<T: Encoder> Encoder for VecDeque<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_LIST, self.len(), self, ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Sequence(Box::new(T::kind()))
    }
}
impl<T: Decoder> Decoder for VecDeque<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(tag, TAG_LIST, "sequence", ctx, VecDeque::with_capacity, VecDeque::push_back)
    }
}

// --- LinkedList<T> ---
impl<T: Encoder> Encoder for LinkedList<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_LIST, self.len(), self, ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Sequence(Box::new(T::kind()))
    }
}
impl<T: Decoder> Decoder for LinkedList<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(tag, TAG_LIST, "sequence", ctx, |_| LinkedList::new(), LinkedList::push_back)
    }
}

// --- HashSet<T> ---
impl<T: Encoder + Eq + Hash> Encoder for HashSet<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_SET, self.len(), self, ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::UniqueSet(Box::new(T::kind()))
    }
}
impl<T: Decoder + Eq + Hash> Decoder for HashSet<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(tag, TAG_SET, "set", ctx, HashSet::with_capacity, |set, value| {
            set.insert(value);
        })
    }
}

// --- BTreeSet<T> ---
impl<T: Encoder + Ord> Encoder for BTreeSet<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_SET, self.len(), self, ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::UniqueSet(Box::new(T::kind()))
    }
}
impl<T: Decoder + Ord> Decoder for BTreeSet<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(tag, TAG_SET, "set", ctx, |_| BTreeSet::new(), |set, value| {
            set.insert(value);
        })
    }
}

// --- HashMap<K, V> ---
impl<K: Encoder + Eq + Hash, V: Encoder> Encoder for HashMap<K, V> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_entries(self.len(), self, ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Association(Box::new(K::kind()), Box::new(V::kind()))
    }
}
impl<K: Decoder + Eq + Hash, V: Decoder> Decoder for HashMap<K, V> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_entries(tag, ctx, HashMap::with_capacity, |map, key, value| {
            map.insert(key, value);
        })
    }
}

// --- BTreeMap<K, V> ---
impl<K: Encoder + Ord, V: Encoder> Encoder for BTreeMap<K, V> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_entries(self.len(), self, ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Association(Box::new(K::kind()), Box::new(V::kind()))
    }
}
impl<K: Decoder + Ord, V: Decoder> Decoder for BTreeMap<K, V> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_entries(tag, ctx, |_| BTreeMap::new(), |map, key, value| {
            map.insert(key, value);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_remembers_until_full() {
        let mut table = ElementTable::new();
        for i in 0..ELEMENT_TABLE_CAPACITY + 4 {
            table.remember(&format!("s{}", i));
        }
        assert_eq!(table.len(), ELEMENT_TABLE_CAPACITY);
        assert_eq!(table.get(0), Some("s0"));
        assert_eq!(table.position("s15"), Some(15));
        assert_eq!(table.position("s16"), None);
    }

    #[test]
    fn test_table_ignores_duplicates() {
        let mut table = ElementTable::new();
        table.remember("a");
        table.remember("a");
        table.remember("b");
        assert_eq!(table.len(), 2);
        assert_eq!(table.position("b"), Some(1));
    }
}
