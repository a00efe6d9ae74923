//! End-to-end compilation of a small kernel program into an object image.

use bumpalo::Bump;
use kaot::image::{compile_program, read_boundary_table, Image, BOUNDARIES_SECTION, NAMES_SECTION};
use kaot::ir::{Condition, Constant, Identifier, Relation};
use kaot::runtime::SyntheticStack;
use kaot::{
    capture_call_stack, CompilationSession, CompilerOptions, Instruction, InternalType, Method,
    Program, TypeRegistry,
};
use object::{Object, ObjectSection, ObjectSymbol};

const BOOT_TYPES: &str = r#"
namespace Kernel

class Boot [target_namespace = SharpOS.Kernel] {
    ticks : uint32
}
"#;

fn boot_program() -> Program {
    let registry = TypeRegistry::from_source(BOOT_TYPES, 4).unwrap();
    let mut program = Program::new();
    let boot = program.add_class(&registry, registry.require("Kernel.Boot").unwrap());

    // while (counter < 100) {} return counter
    let counter = Identifier::argument(0, InternalType::I4);
    let mut spin = Method::new("Spin", vec![InternalType::I4]);
    spin.push_branch(
        Instruction::conditional_jump(Condition::compare(
            Relation::GreaterOrEqual,
            counter.into(),
            Constant::i4(100).into(),
        )
        .unwrap()),
        2,
    ).unwrap();
    spin.push_branch(Instruction::jump(), 0).unwrap();
    spin.push(Instruction::ret(Some(counter.into())));
    program.add_method(boot, spin);

    let mode = Identifier::argument(0, InternalType::U2);
    let mut dispatch = Method::new("Dispatch", vec![InternalType::U2]);
    dispatch.push_switch(Instruction::switch(mode.into()), vec![2, 3, 3]).unwrap();
    dispatch.push(Instruction::ret(Some(Constant::i4(0).into())));
    dispatch.push(Instruction::ret(Some(Constant::i4(1).into())));
    dispatch.push(Instruction::ret(Some(Constant::i4(2).into())));
    program.add_method(boot, dispatch);

    let mut store = Method::new("Store", Vec::new());
    store.push(Instruction::pop(Identifier::local(0, InternalType::U4)));
    store.push(Instruction::pop(Identifier::local(1, InternalType::I8)));
    store.push(Instruction::ret(None));
    program.add_method(boot, store);

    program
}

fn compile(program: &Program) -> (Image, kaot::SessionStats) {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena, CompilerOptions::default());
    let image = compile_program(&session, program).unwrap();
    (image, session.stats())
}

#[test]
fn test_program_compiles_in_arena_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let program = boot_program();
    let (image, stats) = compile(&program);

    assert_eq!(stats.methods_compiled, 3);
    assert_eq!(stats.instruction_counts["Switch"], 1);
    assert_eq!(stats.instruction_counts["Pop"], 2);
    assert_eq!(stats.total_code_size, image.table.entries().iter().map(|b| b.len() as usize).sum());

    let names: Vec<_> = image
        .table
        .entries()
        .iter()
        .map(|boundary| image.table.name_of(boundary.method).unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "SharpOS.Kernel.Boot::Spin",
            "SharpOS.Kernel.Boot::Dispatch",
            "SharpOS.Kernel.Boot::Store"
        ]
    );

    assert_eq!(image.table.entries()[0].begin, image.base);
    for boundary in image.table.entries() {
        assert_eq!(boundary.begin % 16, 0);
        // push ebp / mov ebp, esp
        assert_eq!(&image.method_code(boundary)[..3], &[0x55, 0x89, 0xE5]);
        assert_eq!(image.method_code(boundary).last(), Some(&0xC3));
    }
}

#[test]
fn test_object_carries_code_table_and_symbols() {
    let (image, _) = compile(&boot_program());
    let data = image.to_object().unwrap();

    let file = object::File::parse(&*data).unwrap();
    assert_eq!(file.architecture(), object::Architecture::I386);

    let text = file.section_by_name(".text").unwrap();
    assert_eq!(text.data().unwrap(), image.code.as_slice());
    assert!(file.section_by_name(BOUNDARIES_SECTION).is_some());
    assert!(file.section_by_name(NAMES_SECTION).is_some());

    let dispatch = &image.table.entries()[1];
    let symbol = file
        .symbols()
        .find(|symbol| symbol.name().ok() == Some("SharpOS.Kernel.Boot::Dispatch"))
        .unwrap();
    assert_eq!(symbol.address(), (dispatch.begin - image.base) as u64);
    assert_eq!(symbol.size(), dispatch.len() as u64);

    assert_eq!(read_boundary_table(&data).unwrap(), image.table);
}

#[test]
fn test_walk_through_compiled_methods() {
    let (image, _) = compile(&boot_program());
    let entries = image.table.entries();

    // Store called from Dispatch called from Spin.
    let ips = [entries[2].begin + 3, entries[1].begin + 7, entries[0].end - 1];
    let (stack, ip, bp) = SyntheticStack::with_call_chain(0x0009_F000, &ips);

    let frames = capture_call_stack(ip, bp, &stack, entries);
    let names: Vec<_> = frames
        .iter()
        .map(|frame| image.table.name_of(frame.boundary.unwrap().method).unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "SharpOS.Kernel.Boot::Store",
            "SharpOS.Kernel.Boot::Dispatch",
            "SharpOS.Kernel.Boot::Spin"
        ]
    );
}
