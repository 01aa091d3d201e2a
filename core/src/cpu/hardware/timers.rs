use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// One of the four 16-bit timers.
///
/// TMxCNT_L reads the live counter and writes the reload value; TMxCNT_H
/// is the control word: bits 0-1 prescaler (1/64/256/1024), bit 2
/// count-up cascade (timers 1-3), bit 6 overflow IRQ enable, bit 7
/// enable.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Timer {
    pub counter: u16,
    pub reload: u16,
    pub control: u16,
    /// Cycles accumulated toward the next prescaler tick.
    residue: u32,
}

impl Timer {
    fn enabled(&self) -> bool {
        self.control.get_bit(7)
    }

    fn count_up(&self) -> bool {
        self.control.get_bit(2)
    }

    fn irq_enabled(&self) -> bool {
        self.control.get_bit(6)
    }

    fn prescaler(&self) -> u32 {
        match self.control.get_bits(0..=1) {
            0 => 1,
            1 => 64,
            2 => 256,
            _ => 1024,
        }
    }

    pub fn write_control(&mut self, value: u16) {
        let was_enabled = self.enabled();
        self.control = value & 0x00C7;

        // The counter reloads on the 0-to-1 edge of the enable bit.
        if !was_enabled && self.enabled() {
            self.counter = self.reload;
            self.residue = 0;
        }
    }

    /// Advances the counter by `ticks` and returns how many times it
    /// overflowed (reloading each time).
    fn advance(&mut self, ticks: u32) -> u32 {
        if ticks == 0 {
            return 0;
        }

        let until_overflow = 0x1_0000 - u32::from(self.counter);
        if ticks < until_overflow {
            self.counter += ticks as u16;
            return 0;
        }

        let period = 0x1_0000 - u32::from(self.reload);
        let past = ticks - until_overflow;
        self.counter = self.reload + (past % period) as u16;
        1 + past / period
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Timers {
    pub timers: [Timer; 4],
}

impl Timers {
    /// Runs all four timers for `cycles` CPU cycles. Returns the IF bits
    /// (3-6) of timers that overflowed with their IRQ enabled.
    pub fn step(&mut self, cycles: u32) -> u16 {
        let mut irq_bits = 0;
        let mut previous_overflows = 0;

        for (index, timer) in self.timers.iter_mut().enumerate() {
            if !timer.enabled() {
                previous_overflows = 0;
                continue;
            }

            let ticks = if index > 0 && timer.count_up() {
                previous_overflows
            } else {
                timer.residue += cycles;
                let prescaler = timer.prescaler();
                let ticks = timer.residue / prescaler;
                timer.residue %= prescaler;
                ticks
            };

            let overflows = timer.advance(ticks);
            if overflows > 0 && timer.irq_enabled() {
                irq_bits |= 1 << (3 + index);
            }

            previous_overflows = overflows;
        }

        irq_bits
    }
}
