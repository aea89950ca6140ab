//! Encoding and decoding of registered value types.
//!
//! An object is written as its *runtime* registry id followed by the non-constant fields
//! of its flattened layout, ancestors first. Decoding allocates a bare instance through the
//! descriptor and installs every field directly, immutable ones included.

use crate::core::{unexpected_tag, TAG_OBJECT_BASE, TAG_OBJECT_LONG};
use crate::model::{ancestor, ancestor_mut, FieldSlot};
use crate::*;
use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

/// Largest id carried directly in the tag byte.
const INLINE_ID_MAX: u32 = (u8::MAX - TAG_OBJECT_BASE) as u32;

pub fn is_object_tag(tag: u8) -> bool {
    tag == TAG_OBJECT_LONG || tag >= TAG_OBJECT_BASE
}

fn write_object_tag(id: u32, ctx: &mut WriteContext<'_>) {
    if id <= INLINE_ID_MAX {
        ctx.put_u8(TAG_OBJECT_BASE + id as u8);
    } else {
        ctx.put_u8(TAG_OBJECT_LONG);
        ctx.write_len(id as usize);
    }
}

fn access_of(type_name: &'static str, slot: &FieldSlot) -> Result<FieldAccess> {
    slot.field.access.ok_or_else(|| SerDesError::UnsupportedField {
        type_name,
        field: slot.field.name,
        reason: "field has no accessor".to_string(),
    })
}

/// Writes `obj` with its runtime type id and all of its non-constant fields.
pub fn encode_object(obj: &dyn Object, ctx: &mut WriteContext<'_>) -> Result<()> {
    let schema = ctx.schema();
    let id = schema
        .registry()
        .id_of(obj.as_any().type_id(), obj.type_name())?;
    let layout = schema
        .model()
        .layout_at(id)
        .ok_or(SerDesError::UnknownTypeId(id as u64))?;

    ctx.enter(obj)?;
    write_object_tag(id, ctx);
    for slot in layout.wire_slots() {
        let access = access_of(layout.descriptor.name, slot)?;
        let owner = ancestor(obj, slot.depth)?;
        (access.write)(owner, ctx)?;
    }
    ctx.leave();
    Ok(())
}

/// Reads an object whose tag has already been consumed.
pub fn decode_object(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Box<dyn Object>> {
    let raw = match tag {
        TAG_OBJECT_LONG => ctx.read_len()? as u64,
        t if t >= TAG_OBJECT_BASE => (t - TAG_OBJECT_BASE) as u64,
        other => return Err(unexpected_tag("object", other)),
    };
    let id = u32::try_from(raw).map_err(|_| SerDesError::UnknownTypeId(raw))?;
    let schema = ctx.schema();
    let descriptor = schema.registry().descriptor_of(id)?;
    let layout = schema
        .model()
        .layout_at(id)
        .ok_or(SerDesError::UnknownTypeId(raw))?;

    ctx.enter()?;
    let mut obj = (descriptor.bare)();
    for slot in layout.wire_slots() {
        let access = access_of(descriptor.name, slot)?;
        let owner = ancestor_mut(obj.as_mut(), slot.depth)?;
        (access.read)(owner, ctx)?;
    }
    ctx.leave();
    Ok(obj)
}

// --- Box<dyn Object> ---
/// Any registered value type, whatever its runtime type.
impl Encoder for Box<dyn Object> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        encode_object(self.as_ref(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Nested {
            declared: None,
            polymorphic: true,
        }
    }
}
impl Decoder for Box<dyn Object> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        decode_object(tag, ctx)
    }
}

/// A nested value declared as `B` whose runtime type may be `B` or any registered type
/// that extends it.
///
/// ```rust
/// use netser::{Poly, SerDes, Serializable};
///
/// #[derive(Serializable, Debug, PartialEq, Default)]
/// struct Shape {
///     id: u32,
/// }
///
/// #[derive(Serializable, Debug, PartialEq, Default)]
/// struct Circle {
///     #[netser(extends)]
///     shape: Shape,
///     radius: f64,
/// }
///
/// #[derive(Serializable, Debug, PartialEq, Default)]
/// struct Scene {
///     main: Option<Poly<Shape>>,
/// }
///
/// let serdes = SerDes::builder()
///     .register::<Shape>()
///     .register::<Circle>()
///     .register::<Scene>()
///     .build()
///     .unwrap();
/// let scene = Scene {
///     main: Some(Poly::new(Circle { shape: Shape { id: 7 }, radius: 1.5 })),
/// };
/// let decoded: Scene = serdes.decode(&serdes.encode(&scene).unwrap()).unwrap();
/// let circle = decoded.main.as_ref().and_then(|p| p.downcast_ref::<Circle>()).unwrap();
/// assert_eq!(circle.radius, 1.5);
/// ```
pub struct Poly<B: Object> {
    inner: Box<dyn Object>,
    _base: PhantomData<fn() -> B>,
}

impl<B: Object> Poly<B> {
    pub fn new<T: Object>(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    pub fn from_box(inner: Box<dyn Object>) -> Self {
        Self {
            inner,
            _base: PhantomData,
        }
    }

    pub fn as_object(&self) -> &dyn Object {
        self.inner.as_ref()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Object>(&self) -> bool {
        self.inner.as_any().is::<T>()
    }

    pub fn into_inner(self) -> Box<dyn Object> {
        self.inner
    }

    /// Checks that the runtime type is registered and is `B` or one of its descendants.
    fn check(obj: &dyn Object, schema: &Schema) -> Result<()> {
        let type_id = obj.as_any().type_id();
        if !schema.registry().contains(type_id) {
            return Err(SerDesError::UnregisteredType {
                type_name: obj.type_name(),
            });
        }
        if schema.model().is_a(type_id, TypeId::of::<B>()) {
            Ok(())
        } else {
            Err(SerDesError::type_mismatch(type_name::<B>(), obj.type_name()))
        }
    }
}

impl<B: Object> Deref for Poly<B> {
    type Target = dyn Object;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl<B: Object> fmt::Debug for Poly<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner.as_ref(), f)
    }
}

impl<B: Object> PartialEq for Poly<B> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.eq_object(other.inner.as_ref())
    }
}

impl<B: Object> Encoder for Poly<B> {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        Self::check(self.inner.as_ref(), ctx.schema())?;
        encode_object(self.inner.as_ref(), ctx)
    }

    fn kind() -> ValueKind {
        ValueKind::Nested {
            declared: Some(TypeKey::of::<B>()),
            polymorphic: true,
        }
    }
}

impl<B: Object> Decoder for Poly<B> {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        let inner = decode_object(tag, ctx)?;
        Self::check(inner.as_ref(), ctx.schema())?;
        Ok(Self::from_box(inner))
    }
}
