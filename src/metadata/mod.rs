// This module defines the metadata model the compiler consumes: TypeDescriptor and
// FieldDescriptor describe a type the way the ingestion stage hands it over (kind,
// ordered fields with declared type names, static and runtime-special flags, explicit
// offsets, and the namespace override resolved from the type's attributes at ingestion
// time). MetadataOracle is the seam through which layout resolution asks about leaf
// types. BuiltinOracle answers for the primitive types of the runtime, TypeRegistry
// composes it with registered types so nested value types are sized recursively, and
// the parser reads the small textual type description format used by tests and tools.

//! Type metadata consumed by layout resolution.

pub mod builtin;
pub mod parser;
pub mod registry;

use std::fmt;

use crate::ir::InternalType;

pub use builtin::BuiltinOracle;
pub use parser::parse_types;
pub use registry::{TypeId, TypeRegistry};

/// The oracle layout resolution falls back to for leaf types.
///
/// Both queries are soft: a type name the oracle does not know answers with
/// `-1` respectively [`InternalType::NotSet`], never with an error.
pub trait MetadataOracle {
    /// Size in bytes of the named type, or `-1` if it cannot be determined.
    fn size_of_leaf_type(&self, type_name: &str) -> i32;

    /// Internal type of the named type, or `NotSet` if it cannot be determined.
    fn internal_type_of_leaf_type(&self, type_name: &str) -> InternalType;
}

/// Kind of a type as reported by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Enum,
    ValueType,
    ReferenceType,
    Interface,
}

impl TypeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Enum => "enum",
            TypeKind::ValueType => "struct",
            TypeKind::ReferenceType => "class",
            TypeKind::Interface => "interface",
        }
    }
}

/// A field as declared on its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Full name of the declared field type.
    pub type_name: String,
    pub is_static: bool,
    /// Marks the backing field of an enum.
    pub is_runtime_special: bool,
    /// Offset given by an explicit layout, if any.
    pub offset: Option<u32>,
}

impl FieldDescriptor {
    pub fn instance(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_static: false,
            is_runtime_special: false,
            offset: None,
        }
    }

    pub fn static_field(name: &str, type_name: &str) -> Self {
        Self {
            is_static: true,
            ..Self::instance(name, type_name)
        }
    }

    /// The runtime-special backing field of an enum.
    pub fn enum_backing(type_name: &str) -> Self {
        Self {
            is_runtime_special: true,
            ..Self::instance("value__", type_name)
        }
    }

    pub fn at(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A type as handed over by metadata ingestion. The compiler never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<FieldDescriptor>,
    pub explicit_layout: bool,
    /// Namespace the type is emitted under instead of its own.
    pub override_namespace: Option<String>,
}

impl TypeDescriptor {
    pub fn new(namespace: &str, name: &str, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
            fields: Vec::new(),
            explicit_layout: false,
            override_namespace: None,
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn explicit(mut self) -> Self {
        self.explicit_layout = true;
        self
    }

    pub fn with_override_namespace(mut self, namespace: &str) -> Self {
        self.override_namespace = Some(namespace.to_string());
        self
    }

    /// Name as declared in metadata.
    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    /// Name the type is emitted under, honoring the namespace override.
    pub fn target_full_name(&self) -> String {
        match &self.override_namespace {
            Some(namespace) => qualify(namespace, &self.name),
            None => self.full_name(),
        }
    }

    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    pub fn is_value_type(&self) -> bool {
        self.kind == TypeKind::ValueType
    }

    pub fn is_reference_type(&self) -> bool {
        self.kind == TypeKind::ReferenceType
    }

    /// Linear lookup of a declared field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Instance fields in declaration order.
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| !field.is_static)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.keyword(), self.full_name())
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}
