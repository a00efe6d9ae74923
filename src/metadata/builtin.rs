//! Primitive types of the runtime.
//!
//! Every primitive is reachable both by its full metadata name
//! (`System.Int32`) and by its bytecode keyword (`int32`). Unmanaged pointers
//! (`T*`) and managed references (`T&`) are pointer-sized.

use super::MetadataOracle;
use crate::ir::InternalType;

/// Size of a primitive, fixed or tied to the target's pointer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimitiveSize {
    Fixed(i32),
    Pointer,
}

struct Primitive {
    name: &'static str,
    keyword: &'static str,
    size: PrimitiveSize,
    internal_type: InternalType,
}

const PRIMITIVES: &[Primitive] = &[
    Primitive { name: "System.Boolean", keyword: "bool", size: PrimitiveSize::Fixed(1), internal_type: InternalType::U1 },
    Primitive { name: "System.Char", keyword: "char", size: PrimitiveSize::Fixed(2), internal_type: InternalType::U2 },
    Primitive { name: "System.SByte", keyword: "int8", size: PrimitiveSize::Fixed(1), internal_type: InternalType::I1 },
    Primitive { name: "System.Byte", keyword: "uint8", size: PrimitiveSize::Fixed(1), internal_type: InternalType::U1 },
    Primitive { name: "System.Int16", keyword: "int16", size: PrimitiveSize::Fixed(2), internal_type: InternalType::I2 },
    Primitive { name: "System.UInt16", keyword: "uint16", size: PrimitiveSize::Fixed(2), internal_type: InternalType::U2 },
    Primitive { name: "System.Int32", keyword: "int32", size: PrimitiveSize::Fixed(4), internal_type: InternalType::I4 },
    Primitive { name: "System.UInt32", keyword: "uint32", size: PrimitiveSize::Fixed(4), internal_type: InternalType::U4 },
    Primitive { name: "System.Int64", keyword: "int64", size: PrimitiveSize::Fixed(8), internal_type: InternalType::I8 },
    Primitive { name: "System.UInt64", keyword: "uint64", size: PrimitiveSize::Fixed(8), internal_type: InternalType::U8 },
    Primitive { name: "System.Single", keyword: "float32", size: PrimitiveSize::Fixed(4), internal_type: InternalType::R4 },
    Primitive { name: "System.Double", keyword: "float64", size: PrimitiveSize::Fixed(8), internal_type: InternalType::R8 },
    Primitive { name: "System.IntPtr", keyword: "native int", size: PrimitiveSize::Pointer, internal_type: InternalType::I },
    Primitive { name: "System.UIntPtr", keyword: "native uint", size: PrimitiveSize::Pointer, internal_type: InternalType::U },
    Primitive { name: "System.Object", keyword: "object", size: PrimitiveSize::Pointer, internal_type: InternalType::O },
    Primitive { name: "System.String", keyword: "string", size: PrimitiveSize::Pointer, internal_type: InternalType::O },
];

/// Oracle answering for primitive types only.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOracle {
    pointer_size: i32,
}

impl BuiltinOracle {
    pub const fn new(pointer_size: u32) -> Self {
        Self {
            pointer_size: pointer_size as i32,
        }
    }

    pub fn pointer_size(&self) -> i32 {
        self.pointer_size
    }

    /// Whether `type_name` names a primitive or a pointer.
    pub fn knows(&self, type_name: &str) -> bool {
        is_pointer(type_name) || lookup(type_name).is_some()
    }
}

impl MetadataOracle for BuiltinOracle {
    fn size_of_leaf_type(&self, type_name: &str) -> i32 {
        if is_pointer(type_name) {
            return self.pointer_size;
        }

        match lookup(type_name).map(|primitive| primitive.size) {
            Some(PrimitiveSize::Fixed(size)) => size,
            Some(PrimitiveSize::Pointer) => self.pointer_size,
            None => -1,
        }
    }

    fn internal_type_of_leaf_type(&self, type_name: &str) -> InternalType {
        if is_pointer(type_name) {
            return InternalType::U;
        }

        lookup(type_name)
            .map(|primitive| primitive.internal_type)
            .unwrap_or(InternalType::NotSet)
    }
}

fn lookup(type_name: &str) -> Option<&'static Primitive> {
    PRIMITIVES
        .iter()
        .find(|primitive| primitive.name == type_name || primitive.keyword == type_name)
}

fn is_pointer(type_name: &str) -> bool {
    type_name.len() > 1 && (type_name.ends_with('*') || type_name.ends_with('&'))
}
