//! Registry of the types known to one compilation.
//!
//! The registry is the metadata oracle the compiler actually runs against:
//! primitives are answered by [`BuiltinOracle`], registered value types and
//! enums are sized by recursing into the layout resolver, and registered
//! reference types (and interfaces) occupy one pointer wherever they appear
//! as a field.

use hashbrown::HashMap;
use std::cell::Cell;

use super::{parse_types, BuiltinOracle, MetadataOracle, TypeDescriptor, TypeKind};
use crate::core::{CompileError, CompileResult};
use crate::ir::InternalType;
use crate::layout::{TypeLayoutResolver, UNKNOWN_SIZE};

/// Deepest nesting of value types the oracle follows before giving up.
pub const MAX_TYPE_NESTING: u32 = 64;

/// Identity of a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
    builtin: BuiltinOracle,
    /// Current recursion depth through nested value types.
    depth: Cell<u32>,
}

impl TypeRegistry {
    pub fn new(pointer_size: u32) -> Self {
        Self {
            types: Vec::new(),
            by_name: HashMap::new(),
            builtin: BuiltinOracle::new(pointer_size),
            depth: Cell::new(0),
        }
    }

    /// Build a registry from a type description text.
    pub fn from_source(text: &str, pointer_size: u32) -> CompileResult<Self> {
        let mut registry = Self::new(pointer_size);
        for descriptor in parse_types(text)? {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Register a type under its declared full name.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> CompileResult<TypeId> {
        let name = descriptor.full_name();
        if self.by_name.contains_key(&name) {
            return Err(CompileError::DuplicateType { name });
        }

        let id = TypeId(self.types.len() as u32);
        log::trace!("Registered {} as type #{}", descriptor, id.0);
        self.types.push(descriptor);
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn lookup(&self, full_name: &str) -> Option<TypeId> {
        self.by_name.get(full_name).copied()
    }

    pub fn require(&self, full_name: &str) -> CompileResult<TypeId> {
        self.lookup(full_name).ok_or_else(|| CompileError::TypeNotFound {
            name: full_name.to_string(),
        })
    }

    pub fn descriptor(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    /// Registered types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDescriptor)> {
        self.types
            .iter()
            .enumerate()
            .map(|(index, descriptor)| (TypeId(index as u32), descriptor))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn pointer_size(&self) -> i32 {
        self.builtin.pointer_size()
    }

    /// Run `f` one nesting level deeper, or return `None` past the limit.
    fn nested<T>(&self, type_name: &str, f: impl FnOnce() -> T) -> Option<T> {
        let depth = self.depth.get();
        if depth >= MAX_TYPE_NESTING {
            log::warn!("Value type nesting too deep (cyclic?) at {type_name}");
            return None;
        }

        self.depth.set(depth + 1);
        let result = f();
        self.depth.set(depth);
        Some(result)
    }
}

impl MetadataOracle for TypeRegistry {
    fn size_of_leaf_type(&self, type_name: &str) -> i32 {
        if self.builtin.knows(type_name) {
            return self.builtin.size_of_leaf_type(type_name);
        }

        let Some(id) = self.lookup(type_name) else {
            log::debug!("No size for unknown type {type_name}");
            return UNKNOWN_SIZE;
        };

        let descriptor = self.descriptor(id);
        match descriptor.kind {
            TypeKind::ReferenceType | TypeKind::Interface => self.pointer_size(),
            TypeKind::Enum | TypeKind::ValueType => self
                .nested(type_name, || TypeLayoutResolver::new(self).resolve_size(descriptor))
                .unwrap_or(UNKNOWN_SIZE),
        }
    }

    fn internal_type_of_leaf_type(&self, type_name: &str) -> InternalType {
        if self.builtin.knows(type_name) {
            return self.builtin.internal_type_of_leaf_type(type_name);
        }

        let Some(id) = self.lookup(type_name) else {
            return InternalType::NotSet;
        };

        let descriptor = self.descriptor(id);
        match descriptor.kind {
            TypeKind::ReferenceType | TypeKind::Interface => InternalType::O,
            TypeKind::Enum | TypeKind::ValueType => self
                .nested(type_name, || {
                    TypeLayoutResolver::new(self).resolve_internal_type(descriptor)
                })
                .unwrap_or(InternalType::NotSet),
        }
    }
}
