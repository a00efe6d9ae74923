// This module models the x86 registers the compiler can name in a lowered instruction:
// the eight 32-bit general-purpose registers with their 16-bit and 8-bit views, and the
// control registers CR0, CR2, CR3 and CR4. Every register has a fixed printable name
// and encoding index. RegisterIdentity is the closed set of ways another component can
// refer to a register at the boundary of this module; ControlRegister::by_identity is
// idempotent for control registers and otherwise resolves the identity by its textual
// name, failing with CompileError::UnknownRegister. Conversions into iced-x86 register
// values feed the encoder.

//! x86 register model.

use std::fmt;

use iced_x86::code_asm::{AsmRegister16, AsmRegister32, AsmRegister8};
use iced_x86::Register;

use crate::core::{CompileError, CompileResult};

/// 32-bit general-purpose register, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum R32 {
    EAX = 0,
    ECX = 1,
    EDX = 2,
    EBX = 3,
    ESP = 4,
    EBP = 5,
    ESI = 6,
    EDI = 7,
}

impl R32 {
    pub const ALL: [R32; 8] = [
        R32::EAX,
        R32::ECX,
        R32::EDX,
        R32::EBX,
        R32::ESP,
        R32::EBP,
        R32::ESI,
        R32::EDI,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        ["EAX", "ECX", "EDX", "EBX", "ESP", "EBP", "ESI", "EDI"][self as usize]
    }

    /// Exact, case-sensitive match on the canonical name.
    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|register| register.name() == name)
    }

    /// Low 16 bits.
    pub fn word(self) -> R16 {
        R16(self)
    }

    /// Low byte; only EAX through EBX have one.
    pub fn low_byte(self) -> Option<R8> {
        match self {
            R32::EAX => Some(R8::AL),
            R32::ECX => Some(R8::CL),
            R32::EDX => Some(R8::DL),
            R32::EBX => Some(R8::BL),
            _ => None,
        }
    }

    pub fn iced(self) -> Register {
        use Register::*;
        [EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI][self as usize]
    }

    pub(crate) fn asm(self) -> AsmRegister32 {
        use iced_x86::code_asm::*;
        const GP32_REGS: [AsmRegister32; 8] = [eax, ecx, edx, ebx, esp, ebp, esi, edi];
        GP32_REGS[self as usize]
    }
}

impl fmt::Display for R32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 16-bit view of a general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct R16(pub R32);

impl R16 {
    pub fn name(self) -> &'static str {
        ["AX", "CX", "DX", "BX", "SP", "BP", "SI", "DI"][self.0 as usize]
    }

    pub fn iced(self) -> Register {
        use Register::*;
        [AX, CX, DX, BX, SP, BP, SI, DI][self.0 as usize]
    }

    pub(crate) fn asm(self) -> AsmRegister16 {
        use iced_x86::code_asm::*;
        const GP16_REGS: [AsmRegister16; 8] = [ax, cx, dx, bx, sp, bp, si, di];
        GP16_REGS[self.0 as usize]
    }
}

impl fmt::Display for R16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 8-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum R8 {
    AL = 0,
    CL = 1,
    DL = 2,
    BL = 3,
    AH = 4,
    CH = 5,
    DH = 6,
    BH = 7,
}

impl R8 {
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        ["AL", "CL", "DL", "BL", "AH", "CH", "DH", "BH"][self as usize]
    }

    pub fn iced(self) -> Register {
        use Register::*;
        [AL, CL, DL, BL, AH, CH, DH, BH][self as usize]
    }

    pub(crate) fn asm(self) -> AsmRegister8 {
        use iced_x86::code_asm::*;
        const GP8_REGS: [AsmRegister8; 8] = [al, cl, dl, bl, ah, ch, dh, bh];
        GP8_REGS[self as usize]
    }
}

impl fmt::Display for R8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Control register. CR1 is reserved and not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlRegister {
    CR0 = 0,
    CR2 = 2,
    CR3 = 3,
    CR4 = 4,
}

impl ControlRegister {
    pub const ALL: [ControlRegister; 4] = [
        ControlRegister::CR0,
        ControlRegister::CR2,
        ControlRegister::CR3,
        ControlRegister::CR4,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlRegister::CR0 => "CR0",
            ControlRegister::CR2 => "CR2",
            ControlRegister::CR3 => "CR3",
            ControlRegister::CR4 => "CR4",
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|register| register.name() == name)
    }

    /// Resolve a register identity to a control register.
    ///
    /// A control register is returned unchanged. Any other identity is
    /// matched by its name, so a register that merely prints as a control
    /// register still resolves.
    pub fn by_identity(identity: &RegisterIdentity) -> CompileResult<Self> {
        if let RegisterIdentity::Control(register) = identity {
            return Ok(*register);
        }

        let name = identity.name();
        Self::by_name(&name).ok_or(CompileError::UnknownRegister { name })
    }

    pub fn iced(self) -> Register {
        match self {
            ControlRegister::CR0 => Register::CR0,
            ControlRegister::CR2 => Register::CR2,
            ControlRegister::CR3 => Register::CR3,
            ControlRegister::CR4 => Register::CR4,
        }
    }
}

impl fmt::Display for ControlRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any register reference handed across the module boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegisterIdentity {
    Control(ControlRegister),
    General32(R32),
    General16(R16),
    General8(R8),
    /// A register known only by name, e.g. from an inline assembly plug.
    Named(String),
}

impl RegisterIdentity {
    pub fn name(&self) -> String {
        match self {
            RegisterIdentity::Control(register) => register.name().to_string(),
            RegisterIdentity::General32(register) => register.name().to_string(),
            RegisterIdentity::General16(register) => register.name().to_string(),
            RegisterIdentity::General8(register) => register.name().to_string(),
            RegisterIdentity::Named(name) => name.clone(),
        }
    }
}

impl From<ControlRegister> for RegisterIdentity {
    fn from(register: ControlRegister) -> Self {
        RegisterIdentity::Control(register)
    }
}

impl From<R32> for RegisterIdentity {
    fn from(register: R32) -> Self {
        RegisterIdentity::General32(register)
    }
}

impl fmt::Display for RegisterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_register_indices() {
        let indices: Vec<_> = ControlRegister::ALL.iter().map(|r| r.index()).collect();
        assert_eq!(indices, [0, 2, 3, 4]);
        assert_eq!(ControlRegister::CR3.to_string(), "CR3");
    }

    #[test]
    fn test_by_identity_is_idempotent() {
        for register in ControlRegister::ALL {
            let resolved = ControlRegister::by_identity(&register.into()).unwrap();
            assert_eq!(resolved, register);
            let again = ControlRegister::by_identity(&resolved.into()).unwrap();
            assert_eq!(again, register);
        }
    }

    #[test]
    fn test_by_identity_resolves_names() {
        let named = RegisterIdentity::Named("CR4".to_string());
        assert_eq!(ControlRegister::by_identity(&named).unwrap(), ControlRegister::CR4);

        for name in ["cr4", "cr0", "Cr3", " CR2"] {
            let err = ControlRegister::by_identity(&RegisterIdentity::Named(name.into())).unwrap_err();
            assert!(matches!(err, CompileError::UnknownRegister { name: ref n } if n == name));
        }
    }

    #[test]
    fn test_by_identity_unknown() {
        let err = ControlRegister::by_identity(&R32::EAX.into()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown CR Register 'EAX'");

        let err = ControlRegister::by_identity(&RegisterIdentity::Named("CR1".into())).unwrap_err();
        assert!(matches!(err, CompileError::UnknownRegister { ref name } if name == "CR1"));
    }

    #[test]
    fn test_general_register_views() {
        assert_eq!(R32::by_name("EBP"), Some(R32::EBP));
        assert_eq!(R32::by_name("ebp"), None);
        assert_eq!(R32::ESI.word().name(), "SI");
        assert_eq!(R32::EBX.low_byte(), Some(R8::BL));
        assert_eq!(R32::EDI.low_byte(), None);
        assert_eq!(R32::ESP.iced(), Register::ESP);
        assert_eq!(R8::AH.iced(), Register::AH);
        assert_eq!(R32::ALL.iter().map(|r| r.index()).sum::<u8>(), 28);
    }
}
