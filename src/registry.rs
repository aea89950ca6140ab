//! The ordered, immutable table of registered value types.
//!
//! Ids are dense and zero-based, assigned in registration order. They are never derived
//! from names or hashes: two registries built from the same list in the same order agree
//! on every id.

use crate::*;
use std::any::TypeId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: Vec<TypeDescriptor>,
    ids: HashMap<TypeId, u32>,
}

impl TypeRegistry {
    pub fn new(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self> {
        let mut entries = Vec::new();
        let mut ids = HashMap::new();
        for descriptor in descriptors {
            let id = u32::try_from(entries.len()).map_err(|_| {
                SerDesError::InvalidData("too many registered types".to_string())
            })?;
            if ids.insert(descriptor.type_id, id).is_some() {
                return Err(SerDesError::DuplicateType {
                    type_name: descriptor.name,
                });
            }
            log::debug!("registered type {} as id {}", descriptor.name, id);
            entries.push(descriptor);
        }
        Ok(Self { entries, ids })
    }

    /// Fails with `UnregisteredType` if the type was never registered.
    pub fn id_of(&self, type_id: TypeId, type_name: &'static str) -> Result<u32> {
        self.ids
            .get(&type_id)
            .copied()
            .ok_or(SerDesError::UnregisteredType { type_name })
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.ids.contains_key(&type_id)
    }

    /// Fails with `UnknownTypeId` if `id` is outside the registered range.
    pub fn descriptor_of(&self, id: u32) -> Result<&TypeDescriptor> {
        self.entries
            .get(id as usize)
            .ok_or(SerDesError::UnknownTypeId(id as u64))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.entries.iter()
    }

    /// Order-sensitive digest of every registered layout.
    ///
    /// Peers whose fingerprints differ do not share a compatible registry.
    pub fn fingerprint(&self) -> u64 {
        self.entries
            .iter()
            .fold(self.entries.len() as u64, |acc, descriptor| {
                acc.rotate_left(7) ^ descriptor.layout_hash
            })
    }
}
