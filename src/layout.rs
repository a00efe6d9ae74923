// This module implements type layout resolution: given a TypeDescriptor and a metadata
// oracle for leaf types, it classifies the type into an InternalType and computes its
// in-memory size. Enums resolve through their runtime-special backing field, value types
// are sized either by explicit offsets (the furthest end of any instance field) or
// sequentially (the sum of instance field sizes in declaration order), and reference
// types are classified as object references without being sized here. Results are
// recomputed on every query; callers such as CompilationSession cache them per type.
// Unknown sizes travel as the -1 sentinel rather than as errors.

//! Per-type size and internal type resolution.

use crate::ir::InternalType;
use crate::metadata::{FieldDescriptor, MetadataOracle, TypeDescriptor};

/// Sentinel size for types this resolver does not size.
pub const UNKNOWN_SIZE: i32 = -1;

/// Derived layout of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLayout {
    pub internal_type: InternalType,
    /// Size in bytes, or [`UNKNOWN_SIZE`].
    pub size: i32,
}

impl ClassLayout {
    pub fn is_sized(&self) -> bool {
        self.size >= 0
    }
}

/// Resolves layouts against a metadata oracle.
pub struct TypeLayoutResolver<'a, O: MetadataOracle + ?Sized> {
    oracle: &'a O,
}

impl<'a, O: MetadataOracle + ?Sized> TypeLayoutResolver<'a, O> {
    pub fn new(oracle: &'a O) -> Self {
        Self { oracle }
    }

    pub fn layout(&self, ty: &TypeDescriptor) -> ClassLayout {
        ClassLayout {
            internal_type: self.resolve_internal_type(ty),
            size: self.resolve_size(ty),
        }
    }

    /// Classify `ty`.
    ///
    /// Enums take the internal type of their backing field. An enum without
    /// a backing field falls through to `NotSet`, while [`Self::resolve_size`]
    /// reports 0 for it (see [`Self::enum_backing_size`]).
    pub fn resolve_internal_type(&self, ty: &TypeDescriptor) -> InternalType {
        if ty.is_enum() {
            if let Some(field) = enum_backing_field(ty) {
                return self.oracle.internal_type_of_leaf_type(&field.type_name);
            }
        } else if ty.is_value_type() {
            return InternalType::ValueType;
        } else if ty.is_reference_type() {
            return InternalType::O;
        }

        InternalType::NotSet
    }

    /// Size of `ty` in bytes.
    ///
    /// Reference types and interfaces are not sized by this resolver and
    /// answer [`UNKNOWN_SIZE`]; the size of a reference is the caller's
    /// pointer size. Any field of unknown size makes the whole value type
    /// unknown.
    pub fn resolve_size(&self, ty: &TypeDescriptor) -> i32 {
        if ty.is_enum() {
            self.enum_backing_size(ty)
        } else if ty.is_value_type() {
            if ty.explicit_layout {
                self.explicit_size(ty)
            } else {
                self.sequential_size(ty)
            }
        } else {
            UNKNOWN_SIZE
        }
    }

    /// Size of an enum's backing field.
    ///
    /// An enum declaring no runtime-special field is reported as 0 bytes even
    /// though its internal type stays `NotSet`. Callers relying on enum sizes
    /// must check the internal type as well.
    pub fn enum_backing_size(&self, ty: &TypeDescriptor) -> i32 {
        match enum_backing_field(ty) {
            Some(field) => self.oracle.size_of_leaf_type(&field.type_name),
            None => 0,
        }
    }

    /// Internal type of the named field, `NotSet` if `ty` declares no such field.
    pub fn field_type(&self, ty: &TypeDescriptor, field_name: &str) -> InternalType {
        match ty.field(field_name) {
            Some(field) => self.oracle.internal_type_of_leaf_type(&field.type_name),
            None => InternalType::NotSet,
        }
    }

    /// Size of a single field's declared type.
    pub fn field_size(&self, field: &FieldDescriptor) -> i32 {
        self.oracle.size_of_leaf_type(&field.type_name)
    }

    fn explicit_size(&self, ty: &TypeDescriptor) -> i32 {
        let mut result = 0;

        for field in ty.instance_fields() {
            let size = self.field_size(field);
            if size < 0 {
                log::debug!("{}: field {} has no size", ty.full_name(), field.name);
                return UNKNOWN_SIZE;
            }

            let end = i32::try_from(field.offset.unwrap_or(0))
                .ok()
                .and_then(|offset| offset.checked_add(size));
            let Some(end) = end else {
                log::debug!("{}: field {} ends past the addressable range", ty.full_name(), field.name);
                return UNKNOWN_SIZE;
            };
            result = result.max(end);
        }

        result
    }

    fn sequential_size(&self, ty: &TypeDescriptor) -> i32 {
        let mut result: i32 = 0;

        for field in ty.instance_fields() {
            let size = self.field_size(field);
            if size < 0 {
                log::debug!("{}: field {} has no size", ty.full_name(), field.name);
                return UNKNOWN_SIZE;
            }

            let Some(total) = result.checked_add(size) else {
                log::debug!("{}: size overflows at field {}", ty.full_name(), field.name);
                return UNKNOWN_SIZE;
            };
            result = total;
        }

        result
    }
}

/// The first runtime-special field of an enum.
pub fn enum_backing_field(ty: &TypeDescriptor) -> Option<&FieldDescriptor> {
    ty.fields.iter().find(|field| field.is_runtime_special)
}
