//! The system bus: everything between the CPU core and the rest of the
//! machine.
//!
//! The bus owns the [address decoder](decode_address), the
//! [memory regions](crate::cpu::hardware::internal_memory), the sparse
//! I/O register file, the [DMA controller](crate::cpu::hardware::dma) and
//! the machine clock. Every access advances the clock by the region's
//! wait states, which in turn advances the display timing and the
//! timers, so hardware events stay deterministic relative to the
//! instruction stream.
//!
//! ## Memory map
//!
//! | Window | Range                     | Mirror mask        |
//! |--------|---------------------------|--------------------|
//! | BIOS   | `0x0000_0000-0x0000_3FFF` | none               |
//! | EWRAM  | `0x0200_0000-0x02FF_FFFF` | `0x3FFFF`          |
//! | IWRAM  | `0x0300_0000-0x03FF_FFFF` | `0x7FFF`           |
//! | I/O    | `0x0400_0000-0x0400_03FF` | none (sparse)      |
//! | PALRAM | `0x0500_0000-0x05FF_FFFF` | `0x3FF`            |
//! | VRAM   | `0x0600_0000-0x06FF_FFFF` | `0x1FFFF`, folded  |
//! | OAM    | `0x0700_0000-0x07FF_FFFF` | `0x3FF`            |
//! | ROM    | `0x0800_0000-0x0DFF_FFFF` | `0x01FF_FFFF`      |
//! | SRAM   | `0x0E00_0000-0x0EFF_FFFF` | `0xFFFF`           |
//!
//! Anything else is open bus: reads return the prefetch latch, writes
//! vanish.

use crate::bitwise::Bits;
use crate::cpu::hardware::dma::{AddressControl, Dma, Timing};
use crate::cpu::hardware::internal_memory::InternalMemory;
use crate::cpu::hardware::interrupt_control::{Interrupt, InterruptControl};
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::lcd::Lcd;
use crate::cpu::hardware::serial::Serial;
use crate::cpu::hardware::timers::Timers;

/// 8-bit VRAM writes land in the background character/map area and are
/// dropped in the OBJ tile area above this offset.
const VRAM_OBJ_BASE: u32 = 0x1_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MemoryRegion {
    Bios,
    Ewram,
    Iwram,
    Io,
    Palram,
    Vram,
    Oam,
    Rom,
    Sram,
    Unmapped,
}

/// Classifies an address by its top byte and folds mirrors into a
/// region-relative offset.
#[must_use]
pub fn decode_address(address: u32) -> (MemoryRegion, u32) {
    match address >> 24 {
        0x00 if address < 0x4000 => (MemoryRegion::Bios, address),
        0x02 => (MemoryRegion::Ewram, address & 0x3_FFFF),
        0x03 => (MemoryRegion::Iwram, address & 0x7FFF),
        0x04 if address & 0x00FF_FFFF < 0x400 => (MemoryRegion::Io, address & 0x3FF),
        0x05 => (MemoryRegion::Palram, address & 0x3FF),
        0x06 => {
            // 96 KiB is not a power of two: the upper 64 KiB of each
            // 128 KiB mirror folds onto the top 32 KiB (OBJ) bank.
            let mut offset = address & 0x1_FFFF;
            if offset >= 0x1_8000 {
                offset -= 0x8000;
            }
            (MemoryRegion::Vram, offset)
        }
        0x07 => (MemoryRegion::Oam, address & 0x3FF),
        0x08..=0x0D => (MemoryRegion::Rom, address & 0x01FF_FFFF),
        0x0E => (MemoryRegion::Sram, address & 0xFFFF),
        _ => (MemoryRegion::Unmapped, 0),
    }
}

/// Wait states for one access, in CPU cycles. A deliberately flat model:
/// one entry per region and width, no sequential-access discount.
const fn access_cycles(region: MemoryRegion, width: u32) -> u64 {
    match region {
        MemoryRegion::Bios | MemoryRegion::Iwram | MemoryRegion::Io | MemoryRegion::Oam => 1,
        // 16-bit buses pay double for word access.
        MemoryRegion::Ewram => {
            if width == 4 {
                6
            } else {
                3
            }
        }
        MemoryRegion::Palram | MemoryRegion::Vram => {
            if width == 4 {
                2
            } else {
                1
            }
        }
        MemoryRegion::Rom => {
            if width == 4 {
                8
            } else {
                5
            }
        }
        MemoryRegion::Sram => 5,
        MemoryRegion::Unmapped => 1,
    }
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Bus {
    pub memory: InternalMemory,
    pub lcd: Lcd,
    pub timers: Timers,
    pub keypad: Keypad,
    pub serial: Serial,
    pub interrupt_control: InterruptControl,
    pub dma: Dma,

    cycles: u64,
    /// Last instruction word on the bus; unmapped reads observe it.
    open_bus: u32,
    /// Last word fetched from the BIOS; data reads of the BIOS from
    /// outside return it instead of the ROM bytes.
    bios_latch: u32,
    executing_in_bios: bool,
}

impl Bus {
    #[must_use]
    pub fn with_memory(memory: InternalMemory) -> Self {
        Self {
            memory,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Advances the machine clock and everything that runs off it.
    pub fn add_cycles(&mut self, cycles: u64) {
        self.cycles += cycles;

        let ticks = cycles as u32;
        let lcd_events = self.lcd.step(ticks);
        if lcd_events.entered_vblank {
            self.dma.on_vblank();
        }
        if lcd_events.entered_hblank {
            self.dma.on_hblank();
        }
        if lcd_events.request_vblank_irq {
            self.interrupt_control.request(Interrupt::VBlank);
        }
        if lcd_events.request_hblank_irq {
            self.interrupt_control.request(Interrupt::HBlank);
        }
        if lcd_events.request_vcount_irq {
            self.interrupt_control.request(Interrupt::VCounterMatch);
        }

        let timer_irqs = self.timers.step(ticks);
        self.interrupt_control.request_raw(timer_irqs);
    }

    // --- CPU instruction fetches -------------------------------------

    /// Word fetch for the prefetch latch. Keeps the open-bus and BIOS
    /// latches in sync with what the pipeline last saw.
    pub fn fetch_word(&mut self, address: u32) -> u32 {
        let (region, _) = decode_address(address);
        self.add_cycles(access_cycles(region, 4));
        self.executing_in_bios = region == MemoryRegion::Bios;

        let value = self.read_word_raw(address & !3);
        self.open_bus = value;
        if region == MemoryRegion::Bios {
            self.bios_latch = value;
        }
        value
    }

    /// Halfword fetch in Thumb state.
    pub fn fetch_half_word(&mut self, address: u32) -> u16 {
        let (region, _) = decode_address(address);
        self.add_cycles(access_cycles(region, 2));
        self.executing_in_bios = region == MemoryRegion::Bios;

        let value = self.read_half_word_raw(address & !1);
        self.open_bus = u32::from(value) << 16 | u32::from(value);
        if region == MemoryRegion::Bios {
            self.bios_latch = self.open_bus;
        }
        value
    }

    // --- Data accesses -----------------------------------------------

    pub fn read_byte(&mut self, address: u32) -> u8 {
        let (region, _) = decode_address(address);
        self.add_cycles(access_cycles(region, 1));
        self.read_byte_raw(address)
    }

    /// 16-bit read. Force-aligned; a misaligned address rotates the
    /// fetched halfword right by 8.
    pub fn read_half_word(&mut self, address: u32) -> u16 {
        let (region, _) = decode_address(address);
        self.add_cycles(access_cycles(region, 2));

        let value = self.read_half_word_raw(address & !1);
        value.rotate_right(u32::from((address as u8 & 1) * 8))
    }

    /// 32-bit read. Force-aligned; a misaligned address rotates the
    /// fetched word right by `(address & 3) * 8`.
    pub fn read_word(&mut self, address: u32) -> u32 {
        let (region, _) = decode_address(address);
        self.add_cycles(access_cycles(region, 4));

        let value = self.read_word_raw(address & !3);
        value.rotate_right((address & 3) * 8)
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        let (region, offset) = decode_address(address);
        self.add_cycles(access_cycles(region, 1));

        match region {
            // The 16-bit video buses ignore byte writes...
            MemoryRegion::Palram | MemoryRegion::Oam => {
                tracing::debug!("ignored 8-bit write to {address:#010X}");
            }
            // ...except background VRAM, which mirrors the byte across
            // the whole halfword.
            MemoryRegion::Vram => {
                if offset < VRAM_OBJ_BASE {
                    let aligned = offset & !1;
                    self.memory.write(region, aligned, value);
                    self.memory.write(region, aligned + 1, value);
                } else {
                    tracing::debug!("ignored 8-bit write to OBJ VRAM at {address:#010X}");
                }
            }
            _ => self.write_byte_raw(address, value),
        }
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) {
        let (region, offset) = decode_address(address);
        self.add_cycles(access_cycles(region, 2));

        if region == MemoryRegion::Sram {
            // 8-bit bus: the rotated low byte lands on the exact address.
            let byte = value.rotate_right(u32::from(address as u8 & 1) * 8) as u8;
            self.memory.write(region, offset, byte);
            return;
        }

        let aligned = address & !1;
        self.write_byte_raw(aligned, value.get_byte(0));
        self.write_byte_raw(aligned + 1, value.get_byte(1));
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        let (region, offset) = decode_address(address);
        self.add_cycles(access_cycles(region, 4));

        if region == MemoryRegion::Sram {
            let byte = value.rotate_right((address & 3) * 8) as u8;
            self.memory.write(region, offset, byte);
            return;
        }

        let aligned = address & !3;
        for i in 0..4 {
            self.write_byte_raw(aligned + i, value.get_byte(i as u8));
        }
    }

    // --- Raw (quirk- and clock-free) byte lanes ----------------------

    fn read_byte_raw(&mut self, address: u32) -> u8 {
        let (region, offset) = decode_address(address);
        match region {
            MemoryRegion::Io => self.read_io_byte(offset),
            MemoryRegion::Unmapped => {
                tracing::debug!("open-bus read at {address:#010X}");
                self.open_bus.get_byte(address as u8 & 3)
            }
            MemoryRegion::Bios if !self.executing_in_bios => {
                // The BIOS bus only answers while the pipeline runs
                // inside it; everyone else sees the boot-time latch.
                self.bios_latch.get_byte(address as u8 & 3)
            }
            _ => self.memory.read(region, offset),
        }
    }

    fn read_half_word_raw(&mut self, address: u32) -> u16 {
        let (region, _) = decode_address(address);
        if region == MemoryRegion::Sram {
            let byte = u16::from(self.read_byte_raw(address));
            return byte * 0x0101;
        }
        u16::from_le_bytes([self.read_byte_raw(address), self.read_byte_raw(address + 1)])
    }

    fn read_word_raw(&mut self, address: u32) -> u32 {
        let (region, _) = decode_address(address);
        if region == MemoryRegion::Sram {
            let byte = u32::from(self.read_byte_raw(address));
            return byte * 0x0101_0101;
        }
        u32::from_le_bytes([
            self.read_byte_raw(address),
            self.read_byte_raw(address + 1),
            self.read_byte_raw(address + 2),
            self.read_byte_raw(address + 3),
        ])
    }

    fn write_byte_raw(&mut self, address: u32, value: u8) {
        let (region, offset) = decode_address(address);
        match region {
            MemoryRegion::Io => self.write_io_byte(offset, value),
            MemoryRegion::Unmapped => {
                tracing::debug!("dropped write to unmapped {address:#010X}");
            }
            _ => self.memory.write(region, offset, value),
        }
    }

    // --- I/O register file -------------------------------------------

    /// Byte read from the 1 KiB I/O window. Write-only registers and
    /// unmapped offsets read as zero.
    fn read_io_byte(&mut self, offset: u32) -> u8 {
        match offset {
            0x000..=0x001 => self.lcd.dispcnt.get_byte(offset as u8),
            0x002..=0x003 => self.lcd.green_swap.get_byte(offset as u8 - 0x02),
            0x004..=0x005 => self.lcd.dispstat.get_byte(offset as u8 - 0x04),
            0x006..=0x007 => self.lcd.vcount.get_byte(offset as u8 - 0x06),

            0x0B0..=0x0DF => {
                let channel = ((offset - 0x0B0) / 12) as usize;
                let register = (offset - 0x0B0) % 12;
                match register {
                    // Source, destination and count are write-only.
                    0..=9 => 0,
                    _ => self.dma.channels[channel]
                        .control
                        .get_byte(register as u8 - 10),
                }
            }

            0x100..=0x10F => {
                let timer = &self.timers.timers[((offset - 0x100) / 4) as usize];
                match (offset - 0x100) % 4 {
                    0 => timer.counter.get_byte(0),
                    1 => timer.counter.get_byte(1),
                    2 => timer.control.get_byte(0),
                    _ => timer.control.get_byte(1),
                }
            }

            0x120..=0x123 => self.serial.data32.get_byte(offset as u8 - 0x20),
            0x124..=0x125 => self.serial.multi_data2.get_byte(offset as u8 - 0x24),
            0x126..=0x127 => self.serial.multi_data3.get_byte(offset as u8 - 0x26),
            0x128..=0x129 => self.serial.control.get_byte(offset as u8 - 0x28),
            0x12A..=0x12B => self.serial.data8.get_byte(offset as u8 - 0x2A),
            0x134..=0x135 => self.serial.mode_select.get_byte(offset as u8 - 0x34),
            0x140..=0x141 => self.serial.joy_control.get_byte(offset as u8 - 0x40),
            0x150..=0x153 => self.serial.joy_receive.get_byte(offset as u8 - 0x50),
            0x154..=0x157 => self.serial.joy_transmit.get_byte(offset as u8 - 0x54),
            0x158..=0x159 => self.serial.joy_status.get_byte(offset as u8 - 0x58),

            0x130..=0x131 => self.keypad.key_input.get_byte(offset as u8 - 0x30),
            0x132..=0x133 => self
                .keypad
                .key_interrupt_control
                .get_byte(offset as u8 - 0x32),

            0x200..=0x201 => self
                .interrupt_control
                .interrupt_enable
                .get_byte(offset as u8),
            0x202..=0x203 => self
                .interrupt_control
                .interrupt_request
                .get_byte(offset as u8 - 0x02),
            0x204..=0x205 => self
                .interrupt_control
                .wait_state_control
                .get_byte(offset as u8 - 0x04),
            0x208..=0x209 => self
                .interrupt_control
                .interrupt_master_enable
                .get_byte(offset as u8 - 0x08),
            0x300 => self.interrupt_control.post_boot_flag,

            _ => {
                tracing::debug!("read of unmapped I/O offset {offset:#05X}");
                0
            }
        }
    }

    fn write_io_byte(&mut self, offset: u32, value: u8) {
        match offset {
            0x000..=0x001 => self.lcd.dispcnt.set_byte(offset as u8, value),
            0x002..=0x003 => self.lcd.green_swap.set_byte(offset as u8 - 0x02, value),
            0x004..=0x005 => self.lcd.write_dispstat_byte(offset as u8 - 0x04, value),
            // VCOUNT is read-only.
            0x006..=0x007 => {}

            0x0B0..=0x0DF => {
                let channel = &mut self.dma.channels[((offset - 0x0B0) / 12) as usize];
                let register = (offset - 0x0B0) % 12;
                match register {
                    0..=3 => channel.write_source_byte(register as u8, value),
                    4..=7 => channel.write_destination_byte(register as u8 - 4, value),
                    8..=9 => channel.write_count_byte(register as u8 - 8, value),
                    _ => channel.write_control_byte(register as u8 - 10, value),
                }
            }

            0x100..=0x10F => {
                let timer = &mut self.timers.timers[((offset - 0x100) / 4) as usize];
                match (offset - 0x100) % 4 {
                    0 => timer.reload.set_byte(0, value),
                    1 => timer.reload.set_byte(1, value),
                    byte => {
                        let mut control = timer.control;
                        control.set_byte(byte as u8 - 2, value);
                        timer.write_control(control);
                    }
                }
            }

            0x120..=0x123 => self.serial.data32.set_byte(offset as u8 - 0x20, value),
            0x124..=0x125 => self.serial.multi_data2.set_byte(offset as u8 - 0x24, value),
            0x126..=0x127 => self.serial.multi_data3.set_byte(offset as u8 - 0x26, value),
            0x128..=0x129 => self.serial.control.set_byte(offset as u8 - 0x28, value),
            0x12A..=0x12B => self.serial.data8.set_byte(offset as u8 - 0x2A, value),
            0x134..=0x135 => self.serial.mode_select.set_byte(offset as u8 - 0x34, value),
            0x140..=0x141 => self.serial.joy_control.set_byte(offset as u8 - 0x40, value),
            0x150..=0x153 => self.serial.joy_receive.set_byte(offset as u8 - 0x50, value),
            0x154..=0x157 => self.serial.joy_transmit.set_byte(offset as u8 - 0x54, value),
            0x158..=0x159 => self.serial.joy_status.set_byte(offset as u8 - 0x58, value),

            // KEYINPUT is read-only; KEYCNT is not.
            0x130..=0x131 => {}
            0x132..=0x133 => self
                .keypad
                .key_interrupt_control
                .set_byte(offset as u8 - 0x32, value),

            0x200..=0x201 => {
                self.interrupt_control
                    .interrupt_enable
                    .set_byte(offset as u8, value);
                self.interrupt_control.interrupt_enable &= 0x3FFF;
            }
            // IF: writing 1 clears the bit.
            0x202 => self.interrupt_control.acknowledge(u16::from(value)),
            0x203 => self.interrupt_control.acknowledge(u16::from(value) << 8),
            0x204..=0x205 => self
                .interrupt_control
                .wait_state_control
                .set_byte(offset as u8 - 0x04, value),
            0x208 => self.interrupt_control.interrupt_master_enable = u16::from(value) & 1,
            0x209 => {}
            0x300 => self.interrupt_control.post_boot_flag = value & 1,
            0x301 => {
                // HALTCNT: any write parks the CPU until an enabled
                // interrupt is requested.
                self.interrupt_control.halted = true;
            }

            _ => {
                tracing::debug!("dropped write to unmapped I/O offset {offset:#05X}");
            }
        }
    }

    // --- DMA ----------------------------------------------------------

    /// Drains every triggered channel, lowest number first. The CPU is
    /// stalled for the whole burst; returns the cycles it took.
    pub fn run_pending_dma(&mut self) -> u64 {
        let start = self.cycles;
        while let Some(index) = self.dma.next_triggered() {
            self.run_dma_channel(index);
        }
        self.cycles - start
    }

    fn run_dma_channel(&mut self, index: usize) {
        let channel = &self.dma.channels[index];
        // Audio FIFO service forces a fixed-profile transfer.
        let fifo_mode =
            channel.timing() == Timing::Special && (index == 1 || index == 2);

        let width: u32 = if fifo_mode || channel.word_transfer() {
            4
        } else {
            2
        };
        let count = if fifo_mode { 4 } else { channel.internal_count };
        let source_control = channel.source_control();
        let destination_control = if fifo_mode {
            AddressControl::Fixed
        } else {
            channel.destination_control()
        };
        let repeat = channel.repeat();
        let timing = channel.timing();
        let irq_on_end = channel.irq_on_end();

        let mut source = channel.internal_source & !(width - 1);
        let mut destination = channel.internal_destination & !(width - 1);

        tracing::debug!(
            "DMA{index} burst: {count} x {width} bytes {source:#010X} -> {destination:#010X}"
        );

        // Bus handover overhead.
        self.add_cycles(2);

        for _ in 0..count {
            if width == 4 {
                let value = self.read_word(source);
                self.write_word(destination, value);
            } else {
                let value = self.read_half_word(source);
                self.write_half_word(destination, value);
            }

            match source_control {
                AddressControl::Increment | AddressControl::IncrementReload => {
                    source = source.wrapping_add(width);
                }
                AddressControl::Decrement => source = source.wrapping_sub(width),
                AddressControl::Fixed => {}
            }
            match destination_control {
                AddressControl::Increment | AddressControl::IncrementReload => {
                    destination = destination.wrapping_add(width);
                }
                AddressControl::Decrement => destination = destination.wrapping_sub(width),
                AddressControl::Fixed => {}
            }
        }

        let channel = &mut self.dma.channels[index];
        channel.triggered = false;
        channel.internal_source = source;
        channel.internal_destination = destination;

        if repeat && timing != Timing::Immediate {
            // Stay armed for the next trigger. FIFO transfers do not
            // consume the programmed count.
            if !fifo_mode {
                channel.reload_count();
                if destination_control == AddressControl::IncrementReload {
                    channel.internal_destination = channel.destination_address;
                }
            }
        } else {
            channel.control.set_bit(15, false);
            channel.armed = false;
        }

        if irq_on_end {
            let source_bit = match index {
                0 => Interrupt::Dma0,
                1 => Interrupt::Dma1,
                2 => Interrupt::Dma2,
                _ => Interrupt::Dma3,
            };
            self.interrupt_control.request(source_bit);
        }
    }
}
