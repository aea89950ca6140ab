//! Type literals: values that denote a type rather than an instance of it.

use crate::core::{
    read_text_payload, unexpected_tag, TAG_TYPE_BUILTIN, TAG_TYPE_NAMED, TAG_TYPE_REGISTERED,
};
use crate::*;
use bytes::BufMut;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Built-in kinds, resolved without a registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
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
    Text,
    List,
    Set,
    Map,
    Type,
}

impl BuiltinType {
    const ALL: [BuiltinType; 17] = [
        BuiltinType::Bool,
        BuiltinType::I8,
        BuiltinType::I16,
        BuiltinType::I32,
        BuiltinType::I64,
        BuiltinType::U8,
        BuiltinType::U16,
        BuiltinType::U32,
        BuiltinType::U64,
        BuiltinType::F32,
        BuiltinType::F64,
        BuiltinType::Char,
        BuiltinType::Text,
        BuiltinType::List,
        BuiltinType::Set,
        BuiltinType::Map,
        BuiltinType::Type,
    ];

    /// Wire code of the built-in kind.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Bool => "bool",
            BuiltinType::I8 => "i8",
            BuiltinType::I16 => "i16",
            BuiltinType::I32 => "i32",
            BuiltinType::I64 => "i64",
            BuiltinType::U8 => "u8",
            BuiltinType::U16 => "u16",
            BuiltinType::U32 => "u32",
            BuiltinType::U64 => "u64",
            BuiltinType::F32 => "f32",
            BuiltinType::F64 => "f64",
            BuiltinType::Char => "char",
            BuiltinType::Text => "text",
            BuiltinType::List => "list",
            BuiltinType::Set => "set",
            BuiltinType::Map => "map",
            BuiltinType::Type => "type",
        }
    }

    /// The built-in kind of a Rust scalar or text type, if it is one.
    pub fn of<T: ?Sized + 'static>() -> Option<Self> {
        let id = TypeId::of::<T>();
        let scalars = [
            (TypeId::of::<bool>(), BuiltinType::Bool),
            (TypeId::of::<i8>(), BuiltinType::I8),
            (TypeId::of::<i16>(), BuiltinType::I16),
            (TypeId::of::<i32>(), BuiltinType::I32),
            (TypeId::of::<i64>(), BuiltinType::I64),
            (TypeId::of::<u8>(), BuiltinType::U8),
            (TypeId::of::<u16>(), BuiltinType::U16),
            (TypeId::of::<u32>(), BuiltinType::U32),
            (TypeId::of::<u64>(), BuiltinType::U64),
            (TypeId::of::<f32>(), BuiltinType::F32),
            (TypeId::of::<f64>(), BuiltinType::F64),
            (TypeId::of::<char>(), BuiltinType::Char),
            (TypeId::of::<String>(), BuiltinType::Text),
            (TypeId::of::<str>(), BuiltinType::Text),
            (TypeId::of::<TypeRef>(), BuiltinType::Type),
        ];
        scalars
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, builtin)| *builtin)
    }
}

/// Identity of a Rust type plus a readable name. Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl TypeKey {
    pub fn new(type_id: TypeId, name: &'static str) -> Self {
        Self { type_id, name }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeId::of::<T>(), std::any::type_name::<T>())
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Builtin(BuiltinType),
    Registered(TypeKey),
    /// A type known only by name; decoding resolves it through the [`TypeResolver`].
    Named(String),
}

impl TypeRef {
    pub fn of<T: ?Sized + 'static>() -> Self {
        match BuiltinType::of::<T>() {
            Some(builtin) => TypeRef::Builtin(builtin),
            None => TypeRef::Registered(TypeKey::of::<T>()),
        }
    }

    pub fn text() -> Self {
        TypeRef::Builtin(BuiltinType::Text)
    }

    pub fn name(&self) -> &str {
        match self {
            TypeRef::Builtin(builtin) => builtin.name(),
            TypeRef::Registered(key) => key.name,
            TypeRef::Named(name) => name,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves type names for named type literals.
pub trait TypeResolver: Send + Sync {
    /// Fails with `NameNotFound` if the name is unknown.
    fn resolve(&self, name: &str) -> Result<TypeRef>;
}

/// A fixed name-to-type table.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<String, TypeRef>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, target: TypeRef) -> Self {
        self.insert(name, target);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, target: TypeRef) {
        self.names.insert(name.into(), target);
    }

    /// Maps the descriptor name of `T` to the registered type.
    pub fn with_type<T: Serializable>(self) -> Self {
        let descriptor = T::descriptor();
        let name = descriptor.name;
        self.with(name, TypeRef::Registered(descriptor.key()))
    }
}

impl TypeResolver for NameTable {
    fn resolve(&self, name: &str) -> Result<TypeRef> {
        self.names
            .get(name)
            .cloned()
            .ok_or_else(|| SerDesError::NameNotFound(name.to_string()))
    }
}

impl Encoder for TypeRef {
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        match self {
            TypeRef::Builtin(builtin) => {
                ctx.put_u8(TAG_TYPE_BUILTIN);
                ctx.writer().put_u8(builtin.code());
            }
            TypeRef::Registered(key) => {
                let id = ctx.schema().registry().id_of(key.type_id, key.name)?;
                ctx.put_u8(TAG_TYPE_REGISTERED);
                ctx.write_len(id as usize);
            }
            TypeRef::Named(name) => {
                ctx.put_u8(TAG_TYPE_NAMED);
                ctx.write_len(name.len());
                ctx.put_slice(name.as_bytes());
            }
        }
        Ok(())
    }

    fn kind() -> ValueKind {
        ValueKind::TypeLiteral
    }
}

impl Decoder for TypeRef {
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self> {
        match tag {
            TAG_TYPE_BUILTIN => {
                let code = ctx.read_u8()?;
                BuiltinType::from_code(code)
                    .map(TypeRef::Builtin)
                    .ok_or_else(|| SerDesError::InvalidData(format!("unknown builtin type code {}", code)))
            }
            TAG_TYPE_REGISTERED => {
                let raw = ctx.read_len()?;
                let id = u32::try_from(raw).map_err(|_| SerDesError::UnknownTypeId(raw as u64))?;
                let descriptor = ctx.schema().registry().descriptor_of(id)?;
                Ok(TypeRef::Registered(descriptor.key()))
            }
            TAG_TYPE_NAMED => {
                let name = read_text_payload(ctx)?;
                match ctx.resolver() {
                    Some(resolver) => resolver.resolve(&name),
                    None => Err(SerDesError::NameNotFound(name)),
                }
            }
            other => Err(unexpected_tag("type literal", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_codes_are_dense() {
        for (code, builtin) in BuiltinType::ALL.iter().enumerate() {
            assert_eq!(builtin.code() as usize, code);
            assert_eq!(BuiltinType::from_code(code as u8), Some(*builtin));
        }
        assert_eq!(BuiltinType::from_code(BuiltinType::ALL.len() as u8), None);
    }

    #[test]
    fn test_type_ref_of_scalars() {
        assert_eq!(TypeRef::of::<String>(), TypeRef::text());
        assert_eq!(TypeRef::of::<str>(), TypeRef::text());
        assert_eq!(TypeRef::of::<u16>(), TypeRef::Builtin(BuiltinType::U16));
        assert_ne!(TypeRef::of::<Vec<u8>>(), TypeRef::text());
    }

    #[test]
    fn test_name_table_resolves() {
        let table = NameTable::new().with("text", TypeRef::text());
        assert_eq!(table.resolve("text").unwrap(), TypeRef::text());
        assert!(matches!(
            table.resolve("missing"),
            Err(SerDesError::NameNotFound(name)) if name == "missing"
        ));
    }
}
