#[cfg(feature = "ahash")]
use ahash::{AHashMap, AHashSet};
#[cfg(feature = "fxhash")]
use fxhash::{FxHashMap, FxHashSet};
#[cfg(feature = "indexmap")]
use indexmap::{IndexMap, IndexSet};
#[cfg(feature = "smol_str")]
use smol_str::SmolStr;

#[allow(unused_imports)]
use crate::collection::{
    decode_elements, decode_entries, decode_text_element, encode_elements, encode_entries,
    encode_text_element,
};
#[allow(unused_imports)]
use crate::core::*;
#[allow(unused_imports)]
use crate::*;

// --- IndexSet ---
/// Insertion order is kept on both sides.
#[cfg(feature = "indexmap")]
impl<T: Encoder + Eq + std::hash::Hash> Encoder for IndexSet<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_SET, self.len(), self.iter(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::UniqueSet(Box::new(T::kind()))
    }
}
#[cfg(feature = "indexmap")]
impl<T: Decoder + Eq + std::hash::Hash> Decoder for IndexSet<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(tag, TAG_SET, "set", ctx, IndexSet::with_capacity, |set, value| {
            set.insert(value);
        })
    }
}

// --- IndexMap ---
#[cfg(feature = "indexmap")]
impl<K: Encoder + Eq + std::hash::Hash, V: Encoder> Encoder for IndexMap<K, V> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_entries(self.len(), self.iter(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Association(Box::new(K::kind()), Box::new(V::kind()))
    }
}
#[cfg(feature = "indexmap")]
impl<K: Decoder + Eq + std::hash::Hash, V: Decoder> Decoder for IndexMap<K, V> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_entries(tag, ctx, IndexMap::with_capacity, |map, key, value| {
            map.insert(key, value);
        })
    }
}

// --- FxHashMap ---
#[cfg(feature = "fxhash")]
impl<K: Encoder + Eq + std::hash::Hash, V: Encoder> Encoder for FxHashMap<K, V> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_entries(self.len(), self.iter(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Association(Box::new(K::kind()), Box::new(V::kind()))
    }
}
#[cfg(feature = "fxhash")]
impl<K: Decoder + Eq + std::hash::Hash, V: Decoder> Decoder for FxHashMap<K, V> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_entries(
            tag,
            ctx,
            |len| FxHashMap::with_capacity_and_hasher(len, Default::default()),
            |map, key, value| {
                map.insert(key, value);
            },
        )
    }
}

// --- AHashMap ---
#[cfg(feature = "ahash")]
impl<K: Encoder + Eq + std::hash::Hash, V: Encoder> Encoder for AHashMap<K, V> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_entries(self.len(), self.iter(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Association(Box::new(K::kind()), Box::new(V::kind()))
    }
}
#[cfg(feature = "ahash")]
impl<K: Decoder + Eq + std::hash::Hash, V: Decoder> Decoder for AHashMap<K, V> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_entries(tag, ctx, AHashMap::with_capacity, |map, key, value| {
            map.insert(key, value);
        })
    }
}

// --- FxHashSet ---
#[cfg(feature = "fxhash")]
impl<T: Encoder + Eq + std::hash::Hash> Encoder for FxHashSet<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_SET, self.len(), self.iter(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::UniqueSet(Box::new(T::kind()))
    }
}
#[cfg(feature = "fxhash")]
impl<T: Decoder + Eq + std::hash::Hash> Decoder for FxHashSet<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(
            tag,
            TAG_SET,
            "set",
            ctx,
            |len| FxHashSet::with_capacity_and_hasher(len, Default::default()),
            |set, value| {
                set.insert(value);
            },
        )
    }
}

// --- AHashSet ---
#[cfg(feature = "ahash")]
impl<T: Encoder + Eq + std::hash::Hash> Encoder for AHashSet<T> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_elements(TAG_SET, self.len(), self.iter(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::UniqueSet(Box::new(T::kind()))
    }
}
#[cfg(feature = "ahash")]
impl<T: Decoder + Eq + std::hash::Hash> Decoder for AHashSet<T> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_elements(tag, TAG_SET, "set", ctx, AHashSet::with_capacity, |set, value| {
            set.insert(value);
        })
    }
}

// --- SmolStr ---
/// Encodes a `SmolStr` exactly like `String`, including the collection string table.
#[cfg(feature = "smol_str")]
impl Encoder for SmolStr {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_text(self.as_str(), ctx);
        Ok(())
    }

    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        encode_text_element(self.as_str(), ctx, table);
        Ok(())
    }

    fn kind() -> ValueKind {
        ValueKind::Text
    }
}
#[cfg(feature = "smol_str")]
impl Decoder for SmolStr {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        String::decode_tagged(tag, ctx).map(SmolStr::new)
    }

    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, table: &mut ElementTable) -> Result<Self> {
        decode_text_element(tag, ctx, table).map(SmolStr::new)
    }
}
