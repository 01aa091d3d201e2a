//! Program status registers (CPSR and the banked SPSRs).
//!
//! ```text
//! 31 30 29 28 27 ........ 8 7 6 5 4 ... 0
//! ┌──┬──┬──┬──┬────────────┬─┬─┬─┬───────┐
//! │N │Z │C │V │  reserved  │I│F│T│ mode  │
//! └──┴──┴──┴──┴────────────┴─┴─┴─┴───────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;

/// Execution state selected by the T bit.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CpuState {
    /// 32-bit instructions, word-aligned PC.
    Arm,
    /// 16-bit instructions, halfword-aligned PC.
    Thumb,
}

impl CpuState {
    /// Width of one instruction in bytes.
    #[must_use]
    pub fn instruction_size(self) -> u32 {
        match self {
            Self::Arm => 4,
            Self::Thumb => 2,
        }
    }
}

#[derive(Default, Clone, Copy, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    const SIGN: u8 = 31;
    const ZERO: u8 = 30;
    const CARRY: u8 = 29;
    const OVERFLOW: u8 = 28;
    const IRQ_DISABLE: u8 = 7;
    const FIQ_DISABLE: u8 = 6;
    const STATE: u8 = 5;

    #[must_use]
    pub fn from_mode(mode: Mode) -> Self {
        Self(mode as u32)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Evaluates a condition code against the current flags.
    #[must_use]
    pub fn satisfies(self, condition: Condition) -> bool {
        use Condition::*;
        match condition {
            EQ => self.zero(),
            NE => !self.zero(),
            CS => self.carry(),
            CC => !self.carry(),
            MI => self.sign(),
            PL => !self.sign(),
            VS => self.overflow(),
            VC => !self.overflow(),
            HI => self.carry() && !self.zero(),
            LS => !self.carry() || self.zero(),
            GE => self.sign() == self.overflow(),
            LT => self.sign() != self.overflow(),
            GT => !self.zero() && self.sign() == self.overflow(),
            LE => self.zero() || self.sign() != self.overflow(),
            AL => true,
            NV => false,
        }
    }

    #[must_use]
    pub fn sign(self) -> bool {
        self.0.get_bit(Self::SIGN)
    }

    #[must_use]
    pub fn zero(self) -> bool {
        self.0.get_bit(Self::ZERO)
    }

    #[must_use]
    pub fn carry(self) -> bool {
        self.0.get_bit(Self::CARRY)
    }

    #[must_use]
    pub fn overflow(self) -> bool {
        self.0.get_bit(Self::OVERFLOW)
    }

    #[must_use]
    pub fn irq_disabled(self) -> bool {
        self.0.get_bit(Self::IRQ_DISABLE)
    }

    #[must_use]
    pub fn fiq_disabled(self) -> bool {
        self.0.get_bit(Self::FIQ_DISABLE)
    }

    #[must_use]
    pub fn state(self) -> CpuState {
        if self.0.get_bit(Self::STATE) {
            CpuState::Thumb
        } else {
            CpuState::Arm
        }
    }

    /// The mode field. Invalid encodings (the BIOS writes 0 into SPSRs
    /// on occasion) fall back to System rather than poisoning the core.
    #[must_use]
    pub fn mode(self) -> Mode {
        Mode::try_from(self.0).unwrap_or_else(|invalid| {
            tracing::warn!("{invalid} in PSR {:#010X}, assuming System", self.0);
            Mode::System
        })
    }

    pub fn set_sign(&mut self, value: bool) {
        self.0.set_bit(Self::SIGN, value);
    }

    pub fn set_zero(&mut self, value: bool) {
        self.0.set_bit(Self::ZERO, value);
    }

    pub fn set_carry(&mut self, value: bool) {
        self.0.set_bit(Self::CARRY, value);
    }

    pub fn set_overflow(&mut self, value: bool) {
        self.0.set_bit(Self::OVERFLOW, value);
    }

    /// N and Z from a result value (logical operations).
    pub fn set_nz(&mut self, result: u32) {
        self.set_sign(result.get_bit(31));
        self.set_zero(result == 0);
    }

    /// All four flags from an arithmetic result.
    pub fn set_nzcv(&mut self, result: u32, carry: bool, overflow: bool) {
        self.set_nz(result);
        self.set_carry(carry);
        self.set_overflow(overflow);
    }

    pub fn set_irq_disabled(&mut self, value: bool) {
        self.0.set_bit(Self::IRQ_DISABLE, value);
    }

    pub fn set_fiq_disabled(&mut self, value: bool) {
        self.0.set_bit(Self::FIQ_DISABLE, value);
    }

    pub fn set_state(&mut self, state: CpuState) {
        self.0.set_bit(Self::STATE, state == CpuState::Thumb);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.set_mode_raw(mode as u32);
    }

    /// Writes the mode field without validation; the SPSR may legally
    /// hold garbage the guest put there.
    pub fn set_mode_raw(&mut self, bits: u32) {
        self.0 = (self.0 & !0b11111) | (bits & 0b11111);
    }

    /// Whole-register write as performed by MSR, honoring privilege:
    /// User mode can only touch the flag byte.
    pub fn write(&mut self, value: u32, privileged: bool) {
        if privileged {
            self.0 = value;
        } else {
            self.0 = (self.0 & 0x0FFF_FFFF) | (value & 0xF000_0000);
        }
    }

    /// Field-masked write as performed by MSR with a field list: bit 3
    /// of `field_mask` selects the flag byte, bit 0 the control byte.
    /// (Bits 1-2 address the reserved middle bytes.)
    pub fn write_fields(&mut self, value: u32, field_mask: u32, privileged: bool) {
        let mut byte_mask = 0u32;
        for field in 0..4 {
            if field_mask.get_bit(field) {
                byte_mask |= 0xFF << (field * 8);
            }
        }
        if !privileged {
            byte_mask &= 0xF000_0000;
        }
        self.0 = (self.0 & !byte_mask) | (value & byte_mask);
    }
}

impl From<Psr> for u32 {
    fn from(psr: Psr) -> Self {
        psr.0
    }
}

impl From<u32> for Psr {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Debug for Psr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Psr({:#010X} {}{}{}{} {:?} {:?})",
            self.0,
            if self.sign() { 'N' } else { '-' },
            if self.zero() { 'Z' } else { '-' },
            if self.carry() { 'C' } else { '-' },
            if self.overflow() { 'V' } else { '-' },
            self.state(),
            self.mode(),
        )
    }
}
