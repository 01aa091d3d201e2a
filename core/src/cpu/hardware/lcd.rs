//! Display timing and the display I/O registers.
//!
//! Rendering happens outside the core; what the CPU and the DMA
//! controller need from the display is its clock: DISPSTAT flags,
//! VCOUNT, and the HBlank/VBlank edges that trigger DMA channels and
//! interrupts. One dot takes 4 CPU cycles, a scanline is 308 dots
//! (240 visible + 68 HBlank), a frame is 228 lines (160 visible + 68
//! VBlank).

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

pub const CYCLES_PER_DOT: u32 = 4;
pub const DOTS_PER_LINE: u32 = 308;
pub const CYCLES_PER_LINE: u32 = DOTS_PER_LINE * CYCLES_PER_DOT;
pub const VISIBLE_DOTS: u32 = 240;
pub const HBLANK_START_CYCLE: u32 = VISIBLE_DOTS * CYCLES_PER_DOT;
pub const VISIBLE_LINES: u16 = 160;
pub const TOTAL_LINES: u16 = 228;

/// What happened while the display clock advanced. Blanking edges feed
/// the DMA controller; the request bits feed IF.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdStepOutput {
    pub entered_hblank: bool,
    pub entered_vblank: bool,
    pub request_hblank_irq: bool,
    pub request_vblank_irq: bool,
    pub request_vcount_irq: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Lcd {
    pub dispcnt: u16,
    pub green_swap: u16,
    pub dispstat: u16,
    pub vcount: u16,
    cycle_in_line: u32,
}

impl Lcd {
    pub fn step(&mut self, cycles: u32) -> LcdStepOutput {
        let mut output = LcdStepOutput::default();
        let mut remaining = cycles;

        while remaining > 0 {
            let target = if self.cycle_in_line < HBLANK_START_CYCLE {
                HBLANK_START_CYCLE
            } else {
                CYCLES_PER_LINE
            };

            let chunk = remaining.min(target - self.cycle_in_line);
            self.cycle_in_line += chunk;
            remaining -= chunk;

            if self.cycle_in_line == HBLANK_START_CYCLE {
                self.set_hblank_flag(true);
                if self.dispstat.get_bit(4) {
                    output.request_hblank_irq = true;
                }
                // HBlank DMA only fires during the visible frame.
                if self.vcount < VISIBLE_LINES {
                    output.entered_hblank = true;
                }
            }

            if self.cycle_in_line == CYCLES_PER_LINE {
                self.cycle_in_line = 0;
                self.set_hblank_flag(false);
                self.vcount += 1;

                if self.vcount == TOTAL_LINES {
                    self.vcount = 0;
                    self.set_vblank_flag(false);
                } else if self.vcount == VISIBLE_LINES {
                    self.set_vblank_flag(true);
                    output.entered_vblank = true;
                    if self.dispstat.get_bit(3) {
                        output.request_vblank_irq = true;
                    }
                }

                let matched = self.vcount.get_byte(0) == self.dispstat.get_byte(1);
                self.dispstat.set_bit(2, matched);
                if matched && self.dispstat.get_bit(5) {
                    output.request_vcount_irq = true;
                }
            }
        }

        output
    }

    /// DISPSTAT bits 0-2 are hardware status; writes only land on the
    /// IRQ enables and the VCOUNT match setting.
    pub fn write_dispstat_byte(&mut self, byte_idx: u8, value: u8) {
        match byte_idx {
            0 => {
                let status = self.dispstat.get_byte(0) & 0b111;
                self.dispstat.set_byte(0, (value & !0b111) | status);
            }
            _ => self.dispstat.set_byte(1, value),
        }
    }

    fn set_vblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(0, value);
    }

    fn set_hblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(1, value);
    }
}
