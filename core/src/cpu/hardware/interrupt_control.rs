use serde::{Deserialize, Serialize};

/// Interrupt sources, by bit position in IE and IF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCounterMatch = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

/// IE / IF / IME plus the system-control stragglers that share their
/// register page (WAITCNT, POSTFLG, HALTCNT).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InterruptControl {
    pub interrupt_enable: u16,
    pub interrupt_request: u16,
    pub interrupt_master_enable: u16,
    pub wait_state_control: u16,
    pub post_boot_flag: u8,
    /// Set by a HALTCNT write; cleared when an enabled interrupt fires.
    pub halted: bool,
}

impl InterruptControl {
    /// Latches an interrupt request into IF. The CPU samples the line at
    /// its next instruction boundary.
    pub fn request(&mut self, source: Interrupt) {
        self.interrupt_request |= 1 << source as u16;
    }

    /// OR a raw bitset into IF (host-facing `raise_irq`).
    pub fn request_raw(&mut self, source_bits: u16) {
        self.interrupt_request |= source_bits & 0x3FFF;
    }

    /// IF is acknowledged by writing 1s to the bits to clear.
    pub fn acknowledge(&mut self, mask: u16) {
        self.interrupt_request &= !mask;
    }

    /// True when an enabled interrupt is pending and IME is set. The
    /// CPSR I flag is the CPU's own business.
    #[must_use]
    pub fn irq_line(&self) -> bool {
        self.interrupt_master_enable & 1 != 0 && self.pending()
    }

    /// True when an enabled interrupt is pending, regardless of IME.
    /// This is the condition that releases a halted CPU.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.interrupt_enable & self.interrupt_request != 0
    }
}
