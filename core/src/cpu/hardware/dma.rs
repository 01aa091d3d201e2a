//! The four DMA channels and their register-level state machine.
//!
//! A channel is **idle** until software writes a rising edge on the
//! enable bit, which latches source, destination and count and leaves the
//! channel **armed**. An armed channel waits for its trigger (immediate
//! arming, VBlank, HBlank, or the audio-FIFO/video special events) and is
//! then marked triggered. The bus drains triggered channels between CPU
//! instructions, lowest channel number first; the transfer loop itself
//! lives in [`Bus::run_pending_dma`](crate::bus::Bus::run_pending_dma)
//! because it needs the whole memory map.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Destination/source address adjustment, control word bits 5-6 / 7-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    /// Increment during the transfer, restore the latched address when
    /// the channel repeats. Destination only.
    IncrementReload,
}

impl From<u16> for AddressControl {
    fn from(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Increment,
            1 => Self::Decrement,
            2 => Self::Fixed,
            _ => Self::IncrementReload,
        }
    }
}

/// Start timing, control word bits 12-13.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Immediate,
    VBlank,
    HBlank,
    /// Audio FIFO refill on channels 1/2, video capture on channel 3.
    Special,
}

impl From<u16> for Timing {
    fn from(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Immediate,
            1 => Self::VBlank,
            2 => Self::HBlank,
            _ => Self::Special,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DmaChannel {
    index: usize,

    // Register values as written by the CPU.
    pub source_address: u32,
    pub destination_address: u32,
    pub word_count: u16,
    pub control: u16,

    // Working copies captured on the enable edge and advanced by the
    // transfer loop.
    pub(crate) internal_source: u32,
    pub(crate) internal_destination: u32,
    pub(crate) internal_count: u32,

    /// Latched-and-waiting, distinct from the visible enable bit so a
    /// rewrite of an already-running control word does not re-arm.
    pub(crate) armed: bool,
    /// Trigger observed; the bus will service the channel at the next
    /// opportunity.
    pub(crate) triggered: bool,
}

impl DmaChannel {
    fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.control.get_bit(15)
    }

    pub fn irq_on_end(&self) -> bool {
        self.control.get_bit(14)
    }

    pub fn timing(&self) -> Timing {
        self.control.get_bits(12..=13).into()
    }

    /// Transfer width flag: false = 16-bit units, true = 32-bit units.
    pub fn word_transfer(&self) -> bool {
        self.control.get_bit(10)
    }

    pub fn repeat(&self) -> bool {
        self.control.get_bit(9)
    }

    pub fn source_control(&self) -> AddressControl {
        self.control.get_bits(7..=8).into()
    }

    pub fn destination_control(&self) -> AddressControl {
        self.control.get_bits(5..=6).into()
    }

    /// Channels 0-2 count 14 bits, channel 3 counts 16; zero requests
    /// the maximum.
    fn count_mask(&self) -> u32 {
        if self.index == 3 { 0xFFFF } else { 0x3FFF }
    }

    /// Internal memory only for channel 0, any bus address elsewhere.
    fn source_mask(&self) -> u32 {
        if self.index == 0 {
            0x07FF_FFFF
        } else {
            0x0FFF_FFFF
        }
    }

    fn destination_mask(&self) -> u32 {
        if self.index == 3 {
            0x0FFF_FFFF
        } else {
            0x07FF_FFFF
        }
    }

    pub fn write_source_byte(&mut self, byte_idx: u8, value: u8) {
        self.source_address.set_byte(byte_idx, value);
        self.source_address &= self.source_mask();
    }

    pub fn write_destination_byte(&mut self, byte_idx: u8, value: u8) {
        self.destination_address.set_byte(byte_idx, value);
        self.destination_address &= self.destination_mask();
    }

    pub fn write_count_byte(&mut self, byte_idx: u8, value: u8) {
        self.word_count.set_byte(byte_idx, value);
    }

    pub fn write_control_byte(&mut self, byte_idx: u8, value: u8) {
        let was_enabled = self.enabled();
        self.control.set_byte(byte_idx, value);
        self.control &= 0xFFE0;

        if !was_enabled && self.enabled() {
            self.latch();
        } else if !self.enabled() {
            self.armed = false;
            self.triggered = false;
        }
    }

    /// Captures the working copies on the 0-to-1 enable transition.
    fn latch(&mut self) {
        self.internal_source = self.source_address;
        self.internal_destination = self.destination_address;
        self.reload_count();
        self.armed = true;
        self.triggered = self.timing() == Timing::Immediate;

        tracing::debug!(
            "DMA{} armed: src={:#010X} dst={:#010X} count={} timing={:?}",
            self.index,
            self.internal_source,
            self.internal_destination,
            self.internal_count,
            self.timing(),
        );
    }

    pub(crate) fn reload_count(&mut self) {
        let masked = u32::from(self.word_count) & self.count_mask();
        self.internal_count = if masked == 0 {
            self.count_mask() + 1
        } else {
            masked
        };
    }

    fn trigger_on(&mut self, timing: Timing) {
        if self.armed && self.timing() == timing {
            self.triggered = true;
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Dma {
    pub channels: [DmaChannel; 4],
}

impl Default for Dma {
    fn default() -> Self {
        Self {
            channels: [
                DmaChannel::new(0),
                DmaChannel::new(1),
                DmaChannel::new(2),
                DmaChannel::new(3),
            ],
        }
    }
}

impl Dma {
    pub fn on_vblank(&mut self) {
        for channel in &mut self.channels {
            channel.trigger_on(Timing::VBlank);
        }
    }

    /// Channel 0 has no HBlank timing; its armed state is left alone.
    pub fn on_hblank(&mut self) {
        for channel in &mut self.channels[1..] {
            channel.trigger_on(Timing::HBlank);
        }
    }

    /// Audio FIFO refill request from the (external) audio unit:
    /// `fifo` 0 = FIFO A / channel 1, 1 = FIFO B / channel 2.
    pub fn on_fifo_refill(&mut self, fifo: usize) {
        assert!(fifo < 2, "there are two audio FIFOs");
        self.channels[fifo + 1].trigger_on(Timing::Special);
    }

    /// Lowest-numbered triggered channel wins arbitration.
    pub fn next_triggered(&self) -> Option<usize> {
        self.channels
            .iter()
            .position(|channel| channel.triggered)
    }
}
