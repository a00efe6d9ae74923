// This module holds the compiler's typed intermediate representation. Operands are
// immutable values that carry their own InternalType; instructions are a closed tagged
// variant sharing one header (an optional principal operand plus the diagnostic index the
// owning method assigns); methods own their instructions in program order together with
// the branch and switch target tables keyed by instruction index; and Program is the
// arena that owns every class and method of one compilation, with classes referring to
// their methods through MethodId handles.

//! Intermediate representation.

pub mod class;
pub mod instruction;
pub mod method;
pub mod operand;

pub use class::{Class, ClassId, MethodId, Program};
pub use instruction::{Instruction, InstructionKind};
pub use method::Method;
pub use operand::{Condition, Constant, Identifier, IdentifierKind, InternalType, Operand, Relation};
