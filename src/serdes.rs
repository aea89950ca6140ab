//! The `SerDes` facade: an immutable schema plus the two value operations.

use crate::model::FieldSlot;
use crate::*;
use bytes::{Bytes, BytesMut};
use std::any::TypeId;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Type registry and field model, built once and read-only afterwards.
#[derive(Debug, Default)]
pub struct Schema {
    registry: TypeRegistry,
    model: FieldModel,
}

impl Schema {
    pub fn new(types: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self> {
        let registry = TypeRegistry::new(types)?;
        let model = FieldModel::build(&registry)?;
        log::debug!(
            "schema ready: {} types, fingerprint {:016x}",
            registry.len(),
            registry.fingerprint()
        );
        Ok(Self { registry, model })
    }

    /// A schema without registered types; only built-in kinds can be written.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn model(&self) -> &FieldModel {
        &self.model
    }

    /// Flattened field list of `T`, ancestor fields first.
    pub fn fields_of<T: Serializable>(&self) -> Result<&[FieldSlot]> {
        self.model.fields_of(TypeId::of::<T>(), T::TYPE_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum nesting of objects and containers accepted by the decoder.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

/// A registry-bound serializer. Cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct SerDes {
    schema: Arc<Schema>,
    resolver: Option<Arc<dyn TypeResolver>>,
    config: Config,
}

impl SerDes {
    /// Builds the registry and field model from `types`, ids following their order.
    pub fn new(
        resolver: Option<Arc<dyn TypeResolver>>,
        types: impl IntoIterator<Item = TypeDescriptor>,
    ) -> Result<Self> {
        Ok(Self {
            schema: Arc::new(Schema::new(types)?),
            resolver,
            config: Config::default(),
        })
    }

    pub fn builder() -> SerDesBuilder {
        SerDesBuilder::default()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Encodes `value` and writes it to `sink`.
    ///
    /// The value is encoded into memory first, so nothing reaches the sink when encoding fails.
    pub fn write_value<T, W>(&self, value: &T, sink: &mut W) -> Result<()>
    where
        T: Encoder + ?Sized,
        W: Write,
    {
        let bytes = self.encode(value)?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    /// Reads one value from `source`.
    pub fn read_value<T, R>(&self, source: &mut R) -> Result<T>
    where
        T: Decoder,
        R: Read,
    {
        let mut ctx = ReadContext::new(&self.schema, source)
            .with_resolver(self.resolver.as_deref())
            .with_max_depth(self.config.max_depth);
        let value = T::decode(&mut ctx)?;
        log::trace!("read {}", std::any::type_name::<T>());
        Ok(value)
    }

    pub fn encode<T: Encoder + ?Sized>(&self, value: &T) -> Result<Bytes> {
        let mut writer = BytesMut::new();
        let mut ctx = WriteContext::new(&self.schema, &mut writer);
        value.encode(&mut ctx)?;
        log::trace!(
            "wrote {} ({} bytes)",
            std::any::type_name::<T>(),
            writer.len()
        );
        Ok(writer.freeze())
    }

    pub fn decode<T: Decoder>(&self, bytes: &[u8]) -> Result<T> {
        let mut source = bytes;
        self.read_value(&mut source)
    }
}

impl fmt::Debug for SerDes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerDes")
            .field("types", &self.schema.registry().len())
            .field("resolver", &self.resolver.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Collects registered types in order, then builds a [`SerDes`].
#[derive(Default)]
pub struct SerDesBuilder {
    types: Vec<TypeDescriptor>,
    resolver: Option<Arc<dyn TypeResolver>>,
    config: Config,
}

impl SerDesBuilder {
    /// Registers `T` with the next free id.
    pub fn register<T: Serializable>(mut self) -> Self {
        self.types.push(T::descriptor());
        self
    }

    pub fn descriptor(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    pub fn resolver(mut self, resolver: impl TypeResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn build(self) -> Result<SerDes> {
        let mut serdes = SerDes::new(self.resolver, self.types)?;
        serdes.config = self.config;
        Ok(serdes)
    }
}
