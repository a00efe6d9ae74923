//! Layout resolution over parsed type descriptions.

use bumpalo::Bump;
use kaot::layout::UNKNOWN_SIZE;
use kaot::metadata::{FieldDescriptor, TypeKind};
use kaot::{
    CompilationSession, CompileError, CompilerOptions, InternalType, MetadataOracle, TypeDescriptor,
    TypeLayoutResolver, TypeRegistry,
};

const KERNEL_TYPES: &str = r#"
namespace Kernel

struct Pair {
    a : int32
    b : int32
}

struct Packed explicit {
    a : int32 @ 0
    b : uint8 @ 4
}

enum Mode {
    special value__ : int16
    static Text : Kernel.Mode
    static Graphics : Kernel.Mode
}

enum Empty {
    static Nothing : Kernel.Empty
}

struct Cell {
    ch : char
    attr : Kernel.Mode
    next : Kernel.Node
}

class Node [target_namespace = SharpOS.Kernel] {
    value : int32
    next : Kernel.Node
}
"#;

fn registry() -> TypeRegistry {
    TypeRegistry::from_source(KERNEL_TYPES, 4).unwrap()
}

fn layout_of(registry: &TypeRegistry, name: &str) -> (InternalType, i32) {
    let resolver = TypeLayoutResolver::new(registry);
    let descriptor = registry.descriptor(registry.require(name).unwrap());
    (
        resolver.resolve_internal_type(descriptor),
        resolver.resolve_size(descriptor),
    )
}

#[test]
fn test_sequential_pair_is_eight_bytes() {
    let _ = env_logger::builder().is_test(true).try_init();
    assert_eq!(layout_of(&registry(), "Kernel.Pair"), (InternalType::ValueType, 8));
}

#[test]
fn test_explicit_layout_takes_furthest_field() {
    assert_eq!(layout_of(&registry(), "Kernel.Packed"), (InternalType::ValueType, 5));
}

#[test]
fn test_enum_follows_backing_field() {
    assert_eq!(layout_of(&registry(), "Kernel.Mode"), (InternalType::I2, 2));
}

#[test]
fn test_enum_without_backing_field_keeps_asymmetry() {
    let registry = registry();
    let (internal_type, size) = layout_of(&registry, "Kernel.Empty");
    assert_eq!(internal_type, InternalType::NotSet);
    assert_eq!(size, 0);

    let resolver = TypeLayoutResolver::new(&registry);
    let empty = registry.descriptor(registry.require("Kernel.Empty").unwrap());
    assert_eq!(resolver.enum_backing_size(empty), 0);
}

#[test]
fn test_nested_fields_resolve_through_registry() {
    let registry = registry();
    // char + enum(int16) + reference
    assert_eq!(layout_of(&registry, "Kernel.Cell"), (InternalType::ValueType, 8));
    assert_eq!(registry.size_of_leaf_type("Kernel.Node"), 4);
    assert_eq!(registry.internal_type_of_leaf_type("Kernel.Mode"), InternalType::I2);
}

#[test]
fn test_reference_types_are_not_sized() {
    let (internal_type, size) = layout_of(&registry(), "Kernel.Node");
    assert_eq!(internal_type, InternalType::O);
    assert_eq!(size, UNKNOWN_SIZE);
}

#[test]
fn test_field_type_soft_miss() {
    let registry = registry();
    let resolver = TypeLayoutResolver::new(&registry);
    let cell = registry.descriptor(registry.require("Kernel.Cell").unwrap());
    assert_eq!(resolver.field_type(cell, "ch"), InternalType::U2);
    assert_eq!(resolver.field_type(cell, "attr"), InternalType::I2);
    assert_eq!(resolver.field_type(cell, "missing"), InternalType::NotSet);
}

#[test]
fn test_explicit_size_ignores_declaration_order() {
    let forward = TypeDescriptor::new("Kernel", "Forward", TypeKind::ValueType)
        .explicit()
        .with_field(FieldDescriptor::instance("a", "int32").at(0))
        .with_field(FieldDescriptor::instance("b", "uint8").at(4));
    let backward = TypeDescriptor::new("Kernel", "Backward", TypeKind::ValueType)
        .explicit()
        .with_field(FieldDescriptor::instance("b", "uint8").at(4))
        .with_field(FieldDescriptor::instance("a", "int32").at(0));

    let registry = TypeRegistry::new(4);
    let resolver = TypeLayoutResolver::new(&registry);
    assert_eq!(resolver.resolve_size(&forward), resolver.resolve_size(&backward));
}

#[test]
fn test_static_fields_take_no_space() {
    let ty = TypeDescriptor::new("Kernel", "Counter", TypeKind::ValueType)
        .with_field(FieldDescriptor::instance("count", "uint32"))
        .with_field(FieldDescriptor::static_field("total", "uint64"));

    let registry = TypeRegistry::new(4);
    assert_eq!(TypeLayoutResolver::new(&registry).resolve_size(&ty), 4);
}

#[test]
fn test_unknown_field_type_poisons_size() {
    let ty = TypeDescriptor::new("Kernel", "Opaque", TypeKind::ValueType)
        .with_field(FieldDescriptor::instance("handle", "Vendor.Handle"));

    let registry = TypeRegistry::new(4);
    assert_eq!(TypeLayoutResolver::new(&registry).resolve_size(&ty), UNKNOWN_SIZE);
}

#[test]
fn test_session_caches_layouts() {
    let registry = registry();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena, CompilerOptions::default());

    for (id, _) in registry.iter() {
        session.class_layout(&registry, id);
        session.class_layout(&registry, id);
    }
    assert_eq!(session.stats().layouts_resolved, registry.len());
}

#[test]
fn test_parse_errors_carry_line_numbers() {
    let err = TypeRegistry::from_source("namespace Kernel\nstruct Broken {\n  a int32\n}\n", 4)
        .err()
        .unwrap();
    assert!(matches!(err, CompileError::Parse { line: 3, .. }));

    let err = TypeRegistry::from_source("struct A {\n}\nstruct A {\n}\n", 4).err().unwrap();
    assert!(matches!(err, CompileError::DuplicateType { ref name } if name == "A"));
}

#[test]
fn test_offsets_past_address_range_are_unsized() {
    let registry = TypeRegistry::from_source(
        "namespace Kernel\nstruct Far explicit {\n  a : int32 @ 4294967295\n}\nstruct Edge explicit {\n  a : int32 @ 2147483647\n}\n",
        4,
    )
    .unwrap();
    assert_eq!(layout_of(&registry, "Kernel.Far").1, UNKNOWN_SIZE);
    assert_eq!(layout_of(&registry, "Kernel.Edge").1, UNKNOWN_SIZE);
}
