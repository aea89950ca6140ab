//! Value-type descriptors and the flattened per-type field model.
//!
//! `#[derive(Serializable)]` produces a [`TypeDescriptor`] for every struct: its name,
//! its declared fields with their [`ValueKind`] and [`Mutability`], a typed accessor pair
//! for each field and the bare-allocation function used by the decoder. The
//! [`FieldModel`] is computed once from the registry and flattens each registered type's
//! ancestor chain into a single root-first list of [`FieldSlot`]s.

use crate::*;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Fixed-width scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
}

/// The closed set of field kinds understood by the encoder and decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Never null, fixed width.
    Primitive(PrimitiveKind),
    /// Nullable wrapper of a primitive (`Option<i32>`, ...).
    Boxed(PrimitiveKind),
    /// Text, nullable when wrapped in `Option`.
    Text,
    /// A registered value type. `declared` is the static type of the field, if it has one.
    /// When `polymorphic` the runtime type on the wire may be any registered descendant of
    /// it; otherwise it is exactly `declared`, which must then be registered itself.
    Nested {
        declared: Option<TypeKey>,
        polymorphic: bool,
    },
    Sequence(Box<ValueKind>),
    UniqueSet(Box<ValueKind>),
    Association(Box<ValueKind>, Box<ValueKind>),
    TypeLiteral,
    /// Any value at all ([`Value`]).
    Dynamic,
}

impl ValueKind {
    /// Declared nested types reachable from this kind, including through containers, each
    /// with its `polymorphic` flag.
    fn visit_nested<'k>(&'k self, out: &mut Vec<(&'k TypeKey, bool)>) {
        match self {
            ValueKind::Nested {
                declared: Some(key),
                polymorphic,
            } => out.push((key, *polymorphic)),
            ValueKind::Sequence(inner) | ValueKind::UniqueSet(inner) => inner.visit_nested(out),
            ValueKind::Association(key, value) => {
                key.visit_nested(out);
                value.visit_nested(out);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    Mutable,
    /// Set only at construction; the decoder installs it directly.
    Immutable,
    /// Identical on every instance; never on the wire.
    Constant,
}

/// A registered value type. Implemented by the derive macro.
///
/// `Object` is object safe: nested values are carried as `Box<dyn Object>` and report their
/// runtime type through [`Object::as_any`], independently of the declared field type.
pub trait Object: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn type_name(&self) -> &'static str;

    /// The embedded ancestor value, for types declared with `#[netser(extends)]`.
    fn parent(&self) -> Option<&dyn Object> {
        None
    }

    fn parent_mut(&mut self) -> Option<&mut dyn Object> {
        None
    }

    /// Field-by-field equality against an object of any runtime type.
    fn eq_object(&self, other: &dyn Object) -> bool;
}

impl PartialEq for dyn Object {
    fn eq(&self, other: &dyn Object) -> bool {
        self.eq_object(other)
    }
}

/// A value type that can be registered with a [`SerDes`].
pub trait Serializable: Object + Sized {
    /// Name reported in descriptors and errors.
    const TYPE_NAME: &'static str;

    fn descriptor() -> TypeDescriptor;

    /// Bare allocation: an instance built without the type's ordinary constructors.
    /// Constant fields hold their literal, everything else its default.
    fn bare() -> Self;
}

pub type WriteFn = fn(&dyn Object, &mut WriteContext<'_>) -> Result<()>;
pub type ReadFn = fn(&mut dyn Object, &mut ReadContext<'_>) -> Result<()>;

/// Typed accessor and mutator of a single field, generated per field.
#[derive(Clone, Copy)]
pub struct FieldAccess {
    pub write: WriteFn,
    pub read: ReadFn,
}

impl fmt::Debug for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldAccess")
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub declaring_type: &'static str,
    pub kind: ValueKind,
    pub mutability: Mutability,
    /// `None` for constant fields, which are never read or written.
    pub access: Option<FieldAccess>,
}

impl FieldDescriptor {
    pub fn is_constant(&self) -> bool {
        self.mutability == Mutability::Constant
    }

    pub fn is_immutable(&self) -> bool {
        self.mutability == Mutability::Immutable
    }
}

/// Link from a derived type to the ancestor it embeds.
#[derive(Clone, Copy)]
pub struct ParentLink {
    /// Name of the embedding field.
    pub field: &'static str,
    pub descriptor: fn() -> TypeDescriptor,
}

#[derive(Clone)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub type_id: TypeId,
    pub parent: Option<ParentLink>,
    /// Fields declared by this type only, in declaration order.
    pub fields: Vec<FieldDescriptor>,
    pub bare: fn() -> Box<dyn Object>,
    /// CRC-64 over the type name and its declared fields.
    pub layout_hash: u64,
}

impl TypeDescriptor {
    pub fn of<T: Serializable>() -> Self {
        T::descriptor()
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::new(self.type_id, self.name)
    }

    pub fn parent_descriptor(&self) -> Option<TypeDescriptor> {
        self.parent.map(|link| (link.descriptor)())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("parent", &self.parent.map(|link| link.field))
            .field("fields", &self.fields)
            .field("layout_hash", &format_args!("{:016x}", self.layout_hash))
            .finish()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// A field of the flattened layout. `depth` is the number of `parent()` hops from the
/// most-derived object to the object that declares the field.
#[derive(Debug, Clone)]
pub struct FieldSlot {
    pub field: FieldDescriptor,
    pub depth: usize,
}

/// The flattened layout of one registered type.
#[derive(Debug, Clone)]
pub struct TypeLayout {
    pub descriptor: TypeDescriptor,
    /// The type itself followed by its ancestors, nearest first.
    pub ancestry: Vec<TypeKey>,
    /// Ancestor fields before descendant fields.
    pub slots: Vec<FieldSlot>,
}

impl TypeLayout {
    /// Slots that appear on the wire.
    pub fn wire_slots(&self) -> impl Iterator<Item = &FieldSlot> {
        self.slots.iter().filter(|slot| !slot.field.is_constant())
    }
}

/// Field layouts of every registered type, indexed like the registry.
#[derive(Debug, Default)]
pub struct FieldModel {
    layouts: Vec<TypeLayout>,
    index: HashMap<TypeId, usize>,
}

impl FieldModel {
    pub fn build(registry: &TypeRegistry) -> Result<Self> {
        let mut layouts = Vec::with_capacity(registry.len());
        let mut index = HashMap::with_capacity(registry.len());
        for (position, descriptor) in registry.iter().enumerate() {
            let layout = Self::flatten(descriptor)?;
            log::debug!(
                "field model: {} has {} fields across {} levels",
                descriptor.name,
                layout.slots.len(),
                layout.ancestry.len()
            );
            index.insert(descriptor.type_id, position);
            layouts.push(layout);
        }
        let model = Self { layouts, index };
        model.check_nested_fields()?;
        Ok(model)
    }

    fn flatten(descriptor: &TypeDescriptor) -> Result<TypeLayout> {
        let mut chain = vec![descriptor.clone()];
        let mut seen = HashSet::from([descriptor.type_id]);
        while let Some(link) = chain.last().and_then(|d| d.parent) {
            let parent = (link.descriptor)();
            if !seen.insert(parent.type_id) {
                return Err(SerDesError::UnsupportedField {
                    type_name: descriptor.name,
                    field: link.field,
                    reason: format!("ancestor chain revisits {}", parent.name),
                });
            }
            chain.push(parent);
        }

        let slots = chain
            .iter()
            .enumerate()
            .rev()
            .flat_map(|(depth, level)| {
                level.fields.iter().map(move |field| FieldSlot {
                    field: field.clone(),
                    depth,
                })
            })
            .collect::<Vec<_>>();

        Ok(TypeLayout {
            descriptor: descriptor.clone(),
            ancestry: chain.iter().map(TypeDescriptor::key).collect(),
            slots,
        })
    }

    /// A by-value nested type must be registered. A polymorphic one must be registered or be
    /// an ancestor of a registered type.
    fn check_nested_fields(&self) -> Result<()> {
        let ancestors: HashSet<TypeId> = self
            .layouts
            .iter()
            .flat_map(|layout| layout.ancestry.iter().map(|key| key.type_id))
            .collect();
        for layout in &self.layouts {
            for slot in &layout.slots {
                let mut nested = Vec::new();
                slot.field.kind.visit_nested(&mut nested);
                for (key, polymorphic) in nested {
                    let encodable = if polymorphic {
                        ancestors.contains(&key.type_id)
                    } else {
                        self.index.contains_key(&key.type_id)
                    };
                    if !encodable {
                        return Err(SerDesError::UnsupportedField {
                            type_name: layout.descriptor.name,
                            field: slot.field.name,
                            reason: format!("nested type {} is not registered", key.name),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Layout by registry id.
    pub fn layout_at(&self, id: u32) -> Option<&TypeLayout> {
        self.layouts.get(id as usize)
    }

    pub fn layout(&self, type_id: TypeId) -> Option<&TypeLayout> {
        self.index.get(&type_id).map(|&i| &self.layouts[i])
    }

    /// The ordered field list of a registered type, ancestors first.
    pub fn fields_of(&self, type_id: TypeId, type_name: &'static str) -> Result<&[FieldSlot]> {
        self.layout(type_id)
            .map(|layout| layout.slots.as_slice())
            .ok_or(SerDesError::UnregisteredType { type_name })
    }

    /// True if the registered type `type_id` is `base` or has it as an ancestor.
    pub fn is_a(&self, type_id: TypeId, base: TypeId) -> bool {
        self.layout(type_id)
            .map(|layout| layout.ancestry.iter().any(|key| key.type_id == base))
            .unwrap_or(false)
    }
}

pub fn downcast_ref<T: Object>(obj: &dyn Object) -> Result<&T> {
    obj.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SerDesError::type_mismatch(std::any::type_name::<T>(), obj.type_name()))
}

pub fn downcast_mut<T: Object>(obj: &mut dyn Object) -> Result<&mut T> {
    let found = obj.type_name();
    obj.as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| SerDesError::type_mismatch(std::any::type_name::<T>(), found))
}

pub fn downcast_box<T: Object>(obj: Box<dyn Object>) -> Result<T> {
    let found = obj.type_name();
    obj.into_any()
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| SerDesError::type_mismatch(std::any::type_name::<T>(), found))
}

/// Follows `depth` parent links.
pub fn ancestor(obj: &dyn Object, depth: usize) -> Result<&dyn Object> {
    let mut current = obj;
    for _ in 0..depth {
        let name = current.type_name();
        current = current.parent().ok_or_else(|| missing_ancestor(name))?;
    }
    Ok(current)
}

pub fn ancestor_mut(obj: &mut dyn Object, depth: usize) -> Result<&mut dyn Object> {
    if depth == 0 {
        return Ok(obj);
    }
    let name = obj.type_name();
    match obj.parent_mut() {
        Some(parent) => ancestor_mut(parent, depth - 1),
        None => Err(missing_ancestor(name)),
    }
}

fn missing_ancestor(type_name: &str) -> SerDesError {
    SerDesError::InvalidData(format!("{} does not embed an ancestor value", type_name))
}
