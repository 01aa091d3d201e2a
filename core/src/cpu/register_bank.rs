//! Banked register storage for the seven operating modes.
//!
//! r0-r7 and r15 are never banked. r13/r14 have one copy per bank; FIQ
//! additionally banks r8-r12. The five exception banks each hold an
//! SPSR. The visible [`Registers`] array is the working set; on a mode
//! switch the outgoing mode's registers are parked here and the incoming
//! mode's are loaded.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;
use crate::cpu::registers::Registers;

/// Index into the r13/r14 bank tables. User and System share a bank.
#[must_use]
pub const fn bank_index(mode: Mode) -> usize {
    match mode {
        Mode::User | Mode::System => 0,
        Mode::Fiq => 1,
        Mode::Irq => 2,
        Mode::Supervisor => 3,
        Mode::Abort => 4,
        Mode::Undefined => 5,
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterBank {
    r13: [u32; 6],
    r14: [u32; 6],
    /// FIQ's private r8-r12 and the User-set copies they displace.
    r8_r12_fiq: [u32; 5],
    r8_r12_user: [u32; 5],
    /// SPSR per exception bank ([`bank_index`] minus one).
    spsr: [Psr; 5],
}

impl RegisterBank {
    /// Parks the visible registers of `mode` before switching away.
    pub fn save(&mut self, mode: Mode, registers: &Registers, spsr: Psr) {
        let index = bank_index(mode);
        self.r13[index] = registers.at(13);
        self.r14[index] = registers.at(14);
        if index > 0 {
            self.spsr[index - 1] = spsr;
        }

        let high_bank = if mode == Mode::Fiq {
            &mut self.r8_r12_fiq
        } else {
            &mut self.r8_r12_user
        };
        for (slot, reg) in high_bank.iter_mut().zip(8..) {
            *slot = registers.at(reg);
        }
    }

    /// Loads the banked registers of `mode` into the visible set and
    /// returns the mode's SPSR, if it has one.
    pub fn restore(&self, mode: Mode, registers: &mut Registers) -> Option<Psr> {
        let index = bank_index(mode);
        registers.set(13, self.r13[index]);
        registers.set(14, self.r14[index]);

        let high_bank = if mode == Mode::Fiq {
            &self.r8_r12_fiq
        } else {
            &self.r8_r12_user
        };
        for (slot, reg) in high_bank.iter().zip(8..) {
            registers.set(reg, *slot);
        }

        (index > 0).then(|| self.spsr[index - 1])
    }

    /// User-bank r13/r14 as seen by LDM/STM with the S bit while in an
    /// exception mode.
    #[must_use]
    pub fn user_r13_r14(&self) -> (u32, u32) {
        (self.r13[0], self.r14[0])
    }

    pub fn set_user_r13_r14(&mut self, r13: u32, r14: u32) {
        self.r13[0] = r13;
        self.r14[0] = r14;
    }

    /// User-bank r8-r12 (only distinct from the visible set in FIQ).
    #[must_use]
    pub fn user_r8_r12(&self, reg: usize) -> u32 {
        self.r8_r12_user[reg - 8]
    }

    pub fn set_user_r8_r12(&mut self, reg: usize, value: u32) {
        self.r8_r12_user[reg - 8] = value;
    }

    pub fn spsr_for(&self, mode: Mode) -> Option<Psr> {
        let index = bank_index(mode);
        (index > 0).then(|| self.spsr[index - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn user_and_system_share_a_bank() {
        assert_eq!(bank_index(Mode::User), bank_index(Mode::System));
        assert_ne!(bank_index(Mode::Irq), bank_index(Mode::Supervisor));
    }

    #[test]
    fn save_restore_round_trip() {
        let mut bank = RegisterBank::default();
        let mut registers = Registers::default();
        registers.set(13, 0x0300_7F00);
        registers.set(14, 0x0800_0120);

        let mut spsr = Psr::default();
        spsr.set_carry(true);
        bank.save(Mode::Irq, &registers, spsr);

        registers.set(13, 0);
        registers.set(14, 0);
        let restored = bank.restore(Mode::Irq, &mut registers).unwrap();
        assert_eq!(registers.at(13), 0x0300_7F00);
        assert_eq!(registers.at(14), 0x0800_0120);
        assert!(restored.carry());
    }

    #[test]
    fn fiq_banks_the_high_registers() {
        let mut bank = RegisterBank::default();
        let mut registers = Registers::default();
        for reg in 8..=12 {
            registers.set(reg, reg as u32 * 10);
        }
        bank.save(Mode::System, &registers, Psr::default());

        for reg in 8..=12 {
            registers.set(reg, 0xF1F1_0000 + reg as u32);
        }
        bank.save(Mode::Fiq, &registers, Psr::default());

        bank.restore(Mode::System, &mut registers);
        for reg in 8..=12 {
            assert_eq!(registers.at(reg), reg as u32 * 10);
        }

        bank.restore(Mode::Fiq, &mut registers);
        for reg in 8..=12 {
            assert_eq!(registers.at(reg), 0xF1F1_0000 + reg as u32);
        }
    }

    #[test]
    fn user_modes_have_no_spsr() {
        let bank = RegisterBank::default();
        let mut registers = Registers::default();
        assert!(bank.restore(Mode::User, &mut registers).is_none());
        assert!(bank.restore(Mode::System, &mut registers).is_none());
        assert!(bank.restore(Mode::Undefined, &mut registers).is_some());
    }
}
