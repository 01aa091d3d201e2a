//! Backing storage for every memory region of the system.
//!
//! | Region | Size   | Notes                                     |
//! |--------|--------|-------------------------------------------|
//! | BIOS   | 16 KiB | read-only                                 |
//! | EWRAM  | 256 KiB| on-board work RAM                         |
//! | IWRAM  | 32 KiB | on-chip work RAM                          |
//! | PALRAM | 1 KiB  | palette RAM                               |
//! | VRAM   | 96 KiB | video RAM                                 |
//! | OAM    | 1 KiB  | object attributes                         |
//! | ROM    | ≤32 MiB| cartridge, read-only                      |
//! | SRAM   | 64 KiB | cartridge backup, 8-bit bus               |
//!
//! Address mirroring and width quirks live in the [`bus`](crate::bus);
//! this module only deals in region-relative offsets that are already
//! folded into range.

use serde::{Deserialize, Serialize};

use crate::bus::MemoryRegion;

pub const BIOS_SIZE: usize = 0x4000;
pub const EWRAM_SIZE: usize = 0x4_0000;
pub const IWRAM_SIZE: usize = 0x8000;
pub const PALRAM_SIZE: usize = 0x400;
pub const VRAM_SIZE: usize = 0x1_8000;
pub const OAM_SIZE: usize = 0x400;
pub const ROM_MAX_SIZE: usize = 0x200_0000;
pub const SRAM_SIZE: usize = 0x1_0000;

#[derive(Debug, Serialize, Deserialize)]
pub struct InternalMemory {
    bios: Vec<u8>,
    ewram: Vec<u8>,
    iwram: Vec<u8>,
    palram: Vec<u8>,
    vram: Vec<u8>,
    oam: Vec<u8>,
    rom: Vec<u8>,
    sram: Vec<u8>,
}

impl Default for InternalMemory {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

impl InternalMemory {
    /// Builds the memory with the given BIOS and cartridge images. Slices
    /// shorter than the region are allowed (reads past the ROM end follow
    /// the Game Pak bus echo, reads past a short BIOS return zero).
    #[must_use]
    pub fn new(bios: &[u8], rom: &[u8]) -> Self {
        let mut bios_image = vec![0; BIOS_SIZE];
        bios_image[..bios.len()].copy_from_slice(bios);

        Self {
            bios: bios_image,
            ewram: vec![0; EWRAM_SIZE],
            iwram: vec![0; IWRAM_SIZE],
            palram: vec![0; PALRAM_SIZE],
            vram: vec![0; VRAM_SIZE],
            oam: vec![0; OAM_SIZE],
            rom: rom.to_vec(),
            // Backup media reads as erased until the game programs it.
            sram: vec![0xFF; SRAM_SIZE],
        }
    }

    pub fn read(&self, region: MemoryRegion, offset: u32) -> u8 {
        let offset = offset as usize;
        match region {
            MemoryRegion::Bios => self.bios[offset],
            MemoryRegion::Ewram => self.ewram[offset],
            MemoryRegion::Iwram => self.iwram[offset],
            MemoryRegion::Palram => self.palram[offset],
            MemoryRegion::Vram => self.vram[offset],
            MemoryRegion::Oam => self.oam[offset],
            MemoryRegion::Rom => self.read_rom(offset),
            MemoryRegion::Sram => self.sram[offset],
            MemoryRegion::Io | MemoryRegion::Unmapped => {
                unreachable!("I/O and open-bus reads are resolved by the bus")
            }
        }
    }

    pub fn write(&mut self, region: MemoryRegion, offset: u32, value: u8) {
        let offset = offset as usize;
        match region {
            MemoryRegion::Ewram => self.ewram[offset] = value,
            MemoryRegion::Iwram => self.iwram[offset] = value,
            MemoryRegion::Palram => self.palram[offset] = value,
            MemoryRegion::Vram => self.vram[offset] = value,
            MemoryRegion::Oam => self.oam[offset] = value,
            MemoryRegion::Sram => self.sram[offset] = value,
            MemoryRegion::Bios | MemoryRegion::Rom => {
                tracing::debug!("dropped write to read-only region at offset {offset:#X}");
            }
            MemoryRegion::Io | MemoryRegion::Unmapped => {
                unreachable!("I/O and open-bus writes are resolved by the bus")
            }
        }
    }

    fn read_rom(&self, offset: usize) -> u8 {
        if offset < self.rom.len() {
            self.rom[offset]
        } else {
            // The Game Pak bus multiplexes data and the low half of the
            // halfword address on the same pins. Reads past the end of the
            // chip leave the address sitting on the bus, so the CPU sees
            // the halfword index echoed back.
            let echo = ((offset >> 1) & 0xFFFF) as u16;
            (echo >> ((offset & 1) * 8)) as u8
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bios_is_read_only() {
        let mut memory = InternalMemory::new(&[0xAA, 0xBB], &[]);
        memory.write(MemoryRegion::Bios, 0, 0x11);
        assert_eq!(memory.read(MemoryRegion::Bios, 0), 0xAA);
    }

    #[test]
    fn rom_is_read_only() {
        let mut memory = InternalMemory::new(&[], &[1, 2, 3, 4]);
        memory.write(MemoryRegion::Rom, 2, 0x55);
        assert_eq!(memory.read(MemoryRegion::Rom, 2), 3);
    }

    #[test]
    fn rom_reads_past_end_echo_the_address_bus() {
        let memory = InternalMemory::new(&[], &[1, 2, 3, 4]);

        // Halfword index 0xFFFF at the very end of the window.
        assert_eq!(memory.read(MemoryRegion::Rom, 0x01FF_FFFE), 0xFF);
        assert_eq!(memory.read(MemoryRegion::Rom, 0x01FF_FFFF), 0xFF);

        // Halfword index 0x0123 -> bytes 0x23, 0x01.
        assert_eq!(memory.read(MemoryRegion::Rom, 0x246), 0x23);
        assert_eq!(memory.read(MemoryRegion::Rom, 0x247), 0x01);
    }

    #[test]
    fn sram_powers_up_erased() {
        let memory = InternalMemory::default();
        assert_eq!(memory.read(MemoryRegion::Sram, 0), 0xFF);
        assert_eq!(memory.read(MemoryRegion::Sram, SRAM_SIZE as u32 - 1), 0xFF);
    }

    #[test]
    fn work_ram_round_trip() {
        let mut memory = InternalMemory::default();
        memory.write(MemoryRegion::Iwram, 0x7FFF, 5);
        memory.write(MemoryRegion::Ewram, 0x3_FFFF, 7);
        assert_eq!(memory.read(MemoryRegion::Iwram, 0x7FFF), 5);
        assert_eq!(memory.read(MemoryRegion::Ewram, 0x3_FFFF), 7);
    }
}
