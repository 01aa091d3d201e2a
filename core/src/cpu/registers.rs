use serde::{Deserialize, Serialize};

/// Stack pointer, by convention.
pub const REG_SP: usize = 13;
/// Link register: subroutine and exception return address.
pub const REG_LR: usize = 14;
/// Program counter. Reads run ahead of the executing instruction by two
/// instruction widths; writes redirect control flow.
pub const REG_PC: usize = 15;

/// The sixteen visible registers. Mode banking is handled by
/// [`RegisterBank`](super::register_bank::RegisterBank); this array
/// always holds the set the current mode sees.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Registers([u32; 16]);

impl Registers {
    #[must_use]
    pub fn at(&self, reg: usize) -> u32 {
        self.0[reg]
    }

    pub fn set(&mut self, reg: usize, value: u32) {
        debug_assert!(reg < 16, "register index {reg} out of range");
        self.0[reg] = value;
    }

    #[must_use]
    pub fn pc(&self) -> u32 {
        self.0[REG_PC]
    }

    pub fn set_pc(&mut self, value: u32) {
        self.0[REG_PC] = value;
    }

    pub fn advance_pc(&mut self, amount: u32) {
        self.0[REG_PC] = self.0[REG_PC].wrapping_add(amount);
    }
}
