//! Frame-pointer stack walker.
//!
//! Every compiled method saves the caller's frame pointer at `[ebp]` and is
//! entered with its return address at `[ebp + 4]`, so the call stack is a
//! linked list the walker can follow without debug information. The chain
//! ends at a frame whose saved frame pointer is zero.
//!
//! The walk runs in fault context, so it makes two passes: the first only
//! counts frames, the second fills a result allocated once at exactly that
//! size. A chain that never reaches zero makes the walk loop forever; keeping
//! the chain intact is the job of frame construction, not of this module.

use std::collections::HashMap;

use super::boundary::MethodBoundary;

/// Size of a saved frame pointer or return address.
pub const WORD_SIZE: u32 = 4;

/// Word-granular view of the memory holding the stack.
pub trait FrameMemory {
    fn read_word(&self, address: u32) -> u32;
}

/// One frame of a captured call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame<'t> {
    pub ip: u32,
    pub bp: u32,
    /// Method executing at `ip`, if the boundary table knows it.
    pub boundary: Option<&'t MethodBoundary>,
}

/// Walk the frame chain starting at `ip`/`bp`.
///
/// Frames come back innermost first. Each frame is matched against the
/// first boundary whose range contains its instruction pointer.
pub fn capture_call_stack<'t, M>(
    ip: u32,
    bp: u32,
    memory: &M,
    boundaries: &'t [MethodBoundary],
) -> Box<[StackFrame<'t>]>
where
    M: FrameMemory + ?Sized,
{
    let count = walk(ip, bp, memory, |_, _| {});

    let mut frames = Vec::with_capacity(count);
    walk(ip, bp, memory, |ip, bp| {
        frames.push(StackFrame {
            ip,
            bp,
            boundary: boundaries.iter().find(|boundary| boundary.contains(ip)),
        });
    });

    debug_assert_eq!(frames.len(), count);
    frames.into_boxed_slice()
}

fn walk<M>(mut ip: u32, mut bp: u32, memory: &M, mut visit: impl FnMut(u32, u32)) -> usize
where
    M: FrameMemory + ?Sized,
{
    let mut count = 0;
    loop {
        visit(ip, bp);
        count += 1;

        // A zero starting frame pointer has no caller to read.
        if bp == 0 {
            return count;
        }

        ip = memory.read_word(bp.wrapping_add(WORD_SIZE));
        bp = memory.read_word(bp);
        if bp == 0 {
            return count;
        }
    }
}

/// Sparse in-memory stack for tools and tests.
///
/// Unwritten words read as zero.
#[derive(Debug, Clone, Default)]
pub struct SyntheticStack {
    words: HashMap<u32, u32>,
}

impl SyntheticStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        self.words.insert(address, value);
    }

    /// Build a frame chain whose frames execute at `ips`, innermost first.
    ///
    /// Frames are spaced 16 bytes apart upwards from `base`. Returns the
    /// stack together with the instruction and frame pointer to start the
    /// walk from.
    pub fn with_call_chain(base: u32, ips: &[u32]) -> (Self, u32, u32) {
        let mut stack = Self::new();
        let Some(&first_ip) = ips.first() else {
            return (stack, 0, 0);
        };

        let frame_pointer = |depth: usize| base + 16 * depth as u32;
        for depth in 0..ips.len() {
            let bp = frame_pointer(depth);
            match ips.get(depth + 1) {
                Some(&return_address) => {
                    stack.write_word(bp, frame_pointer(depth + 1));
                    stack.write_word(bp + WORD_SIZE, return_address);
                }
                None => {
                    stack.write_word(bp, 0);
                    stack.write_word(bp + WORD_SIZE, 0);
                }
            }
        }

        (stack, first_ip, base)
    }
}

impl FrameMemory for SyntheticStack {
    fn read_word(&self, address: u32) -> u32 {
        self.words.get(&address).copied().unwrap_or(0)
    }
}

/// Reads the live stack of the running kernel.
#[cfg(target_arch = "x86")]
pub struct NativeMemory(());

#[cfg(target_arch = "x86")]
impl NativeMemory {
    /// # Safety
    ///
    /// Every address the walk reads must be mapped and readable, i.e. the
    /// frame chain must be intact.
    pub unsafe fn new() -> Self {
        Self(())
    }
}

#[cfg(target_arch = "x86")]
impl FrameMemory for NativeMemory {
    fn read_word(&self, address: u32) -> u32 {
        // SAFETY: guaranteed by the contract of `NativeMemory::new`.
        unsafe { std::ptr::read_volatile(address as usize as *const u32) }
    }
}

/// Capture the call stack of the caller.
///
/// # Safety
///
/// Every frame on the current stack must have been built with a frame
/// pointer, and the outermost one must hold a zero saved frame pointer.
#[cfg(target_arch = "x86")]
#[inline(never)]
pub unsafe fn capture_current(boundaries: &[MethodBoundary]) -> Box<[StackFrame<'_>]> {
    let ip: u32;
    let bp: u32;
    std::arch::asm!(
        "call 2f",
        "2:",
        "pop {ip}",
        "mov {bp}, ebp",
        ip = out(reg) ip,
        bp = out(reg) bp,
    );
    capture_call_stack(ip, bp, &NativeMemory::new(), boundaries)
}
