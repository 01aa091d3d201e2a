use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Button bit positions in KEYINPUT. Active-low: pressed reads as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Right = 4,
    Left = 5,
    Up = 6,
    Down = 7,
    R = 8,
    L = 9,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Keypad {
    pub key_input: u16,
    pub key_interrupt_control: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self {
            // All ten buttons released.
            key_input: 0x03FF,
            key_interrupt_control: 0,
        }
    }
}

impl Keypad {
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.key_input.set_bit(button as u8, !pressed);
    }

    /// Evaluates the KEYCNT match condition: bit 14 enables the
    /// interrupt, bit 15 selects AND (all selected keys down) versus OR
    /// (any selected key down).
    #[must_use]
    pub fn interrupt_requested(&self) -> bool {
        if !self.key_interrupt_control.get_bit(14) {
            return false;
        }

        let selected = self.key_interrupt_control.get_bits(0..=9);
        let pressed = !self.key_input & 0x03FF;

        if self.key_interrupt_control.get_bit(15) {
            selected != 0 && pressed & selected == selected
        } else {
            pressed & selected != 0
        }
    }
}
