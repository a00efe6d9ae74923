//! Stack walking over synthetic frame chains.

use kaot::runtime::{FrameMemory, SyntheticStack, WORD_SIZE};
use kaot::{capture_call_stack, MethodBoundaryTable};

fn boundary_table() -> MethodBoundaryTable {
    let mut table = MethodBoundaryTable::new();
    table.push(0x1000, 0x1010, "A").unwrap();
    table.push(0x1010, 0x1020, "B").unwrap();
    table
}

#[test]
fn test_frames_resolve_to_methods_innermost_first() {
    let table = boundary_table();
    let (stack, ip, bp) = SyntheticStack::with_call_chain(0x7000, &[0x1005, 0x1015]);

    let frames = capture_call_stack(ip, bp, &stack, table.entries());
    assert_eq!(frames.len(), 2);

    let names: Vec<_> = frames
        .iter()
        .map(|frame| table.name_of(frame.boundary.unwrap().method).unwrap())
        .collect();
    assert_eq!(names, ["A", "B"]);
}

#[test]
fn test_chain_length_matches_frame_count() {
    let table = boundary_table();
    for depth in 1..=12u32 {
        let ips: Vec<u32> = (0..depth).map(|i| 0x1000 + i * 8).collect();
        let (stack, ip, bp) = SyntheticStack::with_call_chain(0x9000, &ips);

        let frames = capture_call_stack(ip, bp, &stack, table.entries());
        assert_eq!(frames.len(), depth as usize);
        for (frame, &expected) in frames.iter().zip(&ips) {
            assert_eq!(frame.ip, expected);
            assert_eq!(frame.boundary.is_some(), table.find(expected).is_some());
        }
    }
}

#[test]
fn test_hand_built_chain() {
    // main -> Kernel.Boot -> fault handler
    let mut stack = SyntheticStack::new();
    stack.write_word(0x2000, 0x2040);
    stack.write_word(0x2000 + WORD_SIZE, 0x1018);
    stack.write_word(0x2040, 0);
    stack.write_word(0x2040 + WORD_SIZE, 0xDEAD);
    assert_eq!(stack.read_word(0x2004), 0x1018);

    let table = boundary_table();
    let frames = capture_call_stack(0x1002, 0x2000, &stack, table.entries());

    assert_eq!(frames.len(), 2);
    assert_eq!((frames[0].ip, frames[0].bp), (0x1002, 0x2000));
    assert_eq!((frames[1].ip, frames[1].bp), (0x1018, 0x2040));
    assert_eq!(frames[1].boundary.map(|b| b.begin), Some(0x1010));
}

#[test]
fn test_frames_outside_table_have_no_boundary() {
    let (stack, ip, bp) = SyntheticStack::with_call_chain(0x7000, &[0x4000, 0x1001]);
    let table = boundary_table();
    let frames = capture_call_stack(ip, bp, &stack, table.entries());
    assert!(frames[0].boundary.is_none());
    assert!(frames[1].boundary.is_some());
}
