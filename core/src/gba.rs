//! The machine handle a host drives.
//!
//! The host owns a [`Gba`], feeds it cycle budgets through
//! [`Gba::run_for`], and pokes at it between slices: registers for a
//! debugger, buttons, interrupt lines, audio FIFO refills. The PPU and
//! audio mixer live outside; they see memory the CPU already committed
//! and talk back only through interrupt requests and DMA triggers.

use std::sync::{Arc, Mutex};

use crate::bus::Bus;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::hardware::internal_memory::{InternalMemory, BIOS_SIZE, ROM_MAX_SIZE};
use crate::cpu::hardware::keypad::Button;
use crate::cpu::hardware::interrupt_control::Interrupt;

/// Host-misuse errors. Guest faults never surface here; they vector
/// through the emulated exception handlers instead.
#[derive(Debug, PartialEq, Eq)]
pub enum CoreError {
    BiosTooLarge(usize),
    RomTooLarge(usize),
    InvalidRegister(usize),
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BiosTooLarge(size) => {
                write!(f, "BIOS image is {size} bytes, the limit is {BIOS_SIZE}")
            }
            Self::RomTooLarge(size) => {
                write!(f, "ROM image is {size} bytes, the limit is {ROM_MAX_SIZE}")
            }
            Self::InvalidRegister(index) => {
                write!(f, "register index {index} out of range (0-15)")
            }
        }
    }
}

impl std::error::Error for CoreError {}

#[derive(Debug)]
pub struct Gba {
    pub cpu: Arm7tdmi,
    pub bus: Arc<Mutex<Bus>>,
}

impl Gba {
    /// Builds a machine around the given BIOS and cartridge images and
    /// resets it to the cartridge entry point.
    pub fn new(bios: &[u8], rom: &[u8]) -> Result<Self, CoreError> {
        if bios.len() > BIOS_SIZE {
            return Err(CoreError::BiosTooLarge(bios.len()));
        }
        if rom.len() > ROM_MAX_SIZE {
            return Err(CoreError::RomTooLarge(rom.len()));
        }

        let bus = Arc::new(Mutex::new(Bus::with_memory(InternalMemory::new(bios, rom))));
        let cpu = Arm7tdmi::new(Arc::clone(&bus));
        Ok(Self { cpu, bus })
    }

    /// Back to the power-on state. Memory contents survive, the CPU and
    /// its banks do not.
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Runs instructions (and the DMA bursts they trigger) until at
    /// least `cycles` cycles have elapsed. Returns the cycles actually
    /// consumed; the tail of the last instruction may overshoot.
    pub fn run_for(&mut self, cycles: u64) -> u64 {
        let start = self.bus.lock().unwrap().cycles();

        loop {
            let spent = self.bus.lock().unwrap().cycles() - start;
            if spent >= cycles {
                return spent;
            }

            if self.tick_halted() {
                continue;
            }

            self.cpu.step();

            // Armed-and-triggered channels own the bus before the CPU
            // gets another instruction.
            self.bus.lock().unwrap().run_pending_dma();
        }
    }

    /// Burns idle time while HALTCNT has parked the CPU. Returns true
    /// if the machine is (still) halted.
    fn tick_halted(&mut self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        if !bus.interrupt_control.halted {
            return false;
        }
        if bus.interrupt_control.pending() {
            bus.interrupt_control.halted = false;
            return false;
        }
        // Nothing to do until a timer or the display raises a line.
        bus.add_cycles(8);
        drop(bus);
        self.bus.lock().unwrap().run_pending_dma();
        true
    }

    /// Debugger peek at r0-r15.
    pub fn read_register(&self, index: usize) -> Result<u32, CoreError> {
        if index > 15 {
            return Err(CoreError::InvalidRegister(index));
        }
        Ok(self.cpu.registers.at(index))
    }

    /// Debugger poke at r0-r15. A write to r15 redirects control flow
    /// and reloads the pipeline like any other PC write.
    pub fn write_register(&mut self, index: usize, value: u32) -> Result<(), CoreError> {
        if index > 15 {
            return Err(CoreError::InvalidRegister(index));
        }
        self.cpu.write_register(index, value);
        Ok(())
    }

    #[must_use]
    pub fn read_cpsr(&self) -> u32 {
        self.cpu.cpsr.raw()
    }

    /// ORs a bitset into IF; the core samples it at the next
    /// instruction boundary. This is how external collaborators (PPU,
    /// serial, cartridge) assert their lines.
    pub fn raise_irq(&mut self, source_bits: u16) {
        self.bus.lock().unwrap().interrupt_control.request_raw(source_bits);
    }

    /// Host input path; evaluates the KEYCNT condition.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        let mut bus = self.bus.lock().unwrap();
        bus.keypad.set_button(button, pressed);
        if bus.keypad.interrupt_requested() {
            bus.interrupt_control.request(Interrupt::Keypad);
        }
    }

    /// Audio FIFO drain notification from the (external) mixer:
    /// `fifo` 0 = FIFO A, 1 = FIFO B.
    pub fn on_fifo_refill(&mut self, fifo: usize) {
        let mut bus = self.bus.lock().unwrap();
        bus.dma.on_fifo_refill(fifo);
        drop(bus);
        self.bus.lock().unwrap().run_pending_dma();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::cpu_modes::Mode;
    use pretty_assertions::assert_eq;

    /// Builds a machine whose cartridge starts with the given words.
    fn gba_with_program(words: &[u32]) -> Gba {
        let mut rom = Vec::new();
        for word in words {
            rom.extend_from_slice(&word.to_le_bytes());
        }
        Gba::new(&[], &rom).unwrap()
    }

    #[test]
    fn rejects_oversized_images() {
        let big = vec![0u8; BIOS_SIZE + 1];
        assert_eq!(
            Gba::new(&big, &[]).unwrap_err(),
            CoreError::BiosTooLarge(BIOS_SIZE + 1)
        );
    }

    #[test]
    fn register_index_is_validated() {
        let mut gba = gba_with_program(&[0xEAFF_FFFE]);
        assert_eq!(gba.read_register(16), Err(CoreError::InvalidRegister(16)));
        assert_eq!(
            gba.write_register(99, 0),
            Err(CoreError::InvalidRegister(99))
        );
        assert!(gba.read_register(0).is_ok());
    }

    #[test]
    fn straight_line_arithmetic() {
        // MOV r0, #1; MOV r1, #2; ADD r2, r0, r1; B .
        let mut gba = gba_with_program(&[
            0xE3A0_0001,
            0xE3A0_1002,
            0xE080_2001,
            0xEAFF_FFFE,
        ]);
        gba.run_for(1_000);
        assert_eq!(gba.read_register(2).unwrap(), 3);
    }

    #[test]
    fn movs_zero_takes_the_beq() {
        // MOVS r0, #0; BEQ +4 (skips MOV r4); MOV r4, #1; MOV r5, #1; B .
        let mut gba = gba_with_program(&[
            0xE3B0_0000,
            0x0A00_0000,
            0xE3A0_4001,
            0xE3A0_5001,
            0xEAFF_FFFE,
        ]);
        gba.run_for(1_000);
        assert_eq!(gba.read_register(4).unwrap(), 0);
        assert_eq!(gba.read_register(5).unwrap(), 1);
    }

    #[test]
    fn shift_round_trip_preserves_the_byte() {
        // MOV r0, #0xFF; MOVS r0, r0, LSL #24; MOVS r0, r0, LSR #24; B .
        let mut gba = gba_with_program(&[
            0xE3A0_00FF,
            0xE1B0_0C00,
            0xE1B0_0C20,
            0xEAFF_FFFE,
        ]);
        gba.run_for(1_000);
        assert_eq!(gba.read_register(0).unwrap(), 0xFF);
        // Last bit shifted out of LSR #24 on 0xFF000000 is zero.
        assert_eq!(gba.read_cpsr() >> 29 & 1, 0);
    }

    #[test]
    fn immediate_dma_runs_between_instructions() {
        let mut gba = gba_with_program(&[0xEAFF_FFFE]);
        {
            let mut bus = gba.bus.lock().unwrap();
            for i in 0..16u32 {
                bus.write_word(0x0200_0000 + i * 4, 0x1234_0000 + i);
            }
            bus.write_word(0x0400_00B0, 0x0200_0000);
            bus.write_word(0x0400_00B4, 0x0200_1000);
            bus.write_word(0x0400_00B8, (1 << 31) | (1 << 26) | 16);
        }

        gba.run_for(1);

        let mut bus = gba.bus.lock().unwrap();
        for i in 0..16u32 {
            assert_eq!(bus.read_word(0x0200_1000 + i * 4), 0x1234_0000 + i);
        }
        assert_eq!(bus.read_half_word(0x0400_00BA) & (1 << 15), 0);
    }

    #[test]
    fn dma_end_irq_vectors_before_the_next_instruction() {
        let mut gba = gba_with_program(&[0xE1A0_0000; 8]);
        {
            let mut bus = gba.bus.lock().unwrap();
            bus.write_word(0x0400_00B0, 0x0200_0000);
            bus.write_word(0x0400_00B4, 0x0200_0100);
            // 1 unit, IRQ on end, immediate.
            bus.write_word(0x0400_00B8, (1 << 31) | (1 << 30) | 1);
            // IE: DMA0, IME on.
            bus.write_half_word(0x0400_0200, 1 << 8);
            bus.write_byte(0x0400_0208, 1);
        }

        // One instruction, then the burst, then the vector.
        gba.run_for(1);
        gba.run_for(1);

        assert_eq!(gba.cpu.cpsr.mode(), Mode::Irq);
        assert_eq!(gba.cpu.spsr.mode(), Mode::System);
    }

    #[test]
    fn halt_parks_until_an_enabled_interrupt() {
        // MOV r0, #1; B .
        let mut gba = gba_with_program(&[0xE3A0_0001, 0xEAFF_FFFE]);
        {
            let mut bus = gba.bus.lock().unwrap();
            bus.interrupt_control.interrupt_enable = 1 << 12;
            bus.write_byte(0x0400_0301, 0);
        }

        let pc_before = gba.read_register(15).unwrap();
        let spent = gba.run_for(500);
        assert!(spent >= 500);
        assert_eq!(gba.read_register(15).unwrap(), pc_before);

        // An enabled source releases the core (IME does not matter).
        gba.raise_irq(1 << 12);
        gba.run_for(100);
        assert!(!gba.bus.lock().unwrap().interrupt_control.halted);
        assert_ne!(gba.read_register(15).unwrap(), pc_before);
    }

    #[test]
    fn keypad_interrupt_follows_keycnt() {
        let mut gba = gba_with_program(&[0xEAFF_FFFE]);
        {
            let mut bus = gba.bus.lock().unwrap();
            // IRQ on A, OR mode.
            bus.write_half_word(0x0400_0132, (1 << 14) | 1);
        }

        gba.set_button(Button::B, true);
        assert_eq!(
            gba.bus.lock().unwrap().interrupt_control.interrupt_request,
            0
        );

        gba.set_button(Button::A, true);
        assert_eq!(
            gba.bus.lock().unwrap().interrupt_control.interrupt_request,
            1 << 12
        );
    }

    #[test]
    fn run_for_reports_cycles_spent() {
        let mut gba = gba_with_program(&[0xEAFF_FFFE]);
        let spent = gba.run_for(100);
        assert!(spent >= 100);

        // A zero budget runs nothing.
        let spent = gba.run_for(0);
        assert_eq!(spent, 0);
    }

    #[test]
    fn vblank_advances_on_the_cycle_clock() {
        // Spin long enough for a full frame.
        let mut gba = gba_with_program(&[0xEAFF_FFFE]);
        gba.run_for(280_896); // one frame: 1232 cycles x 228 lines
        let vcount = gba.bus.lock().unwrap().lcd.vcount;
        assert!(vcount < 228);
        // DISPSTAT vblank flag toggled at some point; after a whole
        // frame the counter wrapped back into the visible area or
        // vblank depending on overshoot, so just check it moved.
        assert!(gba.bus.lock().unwrap().cycles() >= 280_896);
    }

    #[test]
    fn machine_state_serializes() {
        let mut gba = gba_with_program(&[0xE3A0_0001, 0xEAFF_FFFE]);
        gba.run_for(100);

        let bus = gba.bus.lock().unwrap();
        let snapshot = serde_json::to_string(&*bus).unwrap();
        drop(bus);

        let restored: Bus = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(restored.cycles(), gba.bus.lock().unwrap().cycles());
    }
}
