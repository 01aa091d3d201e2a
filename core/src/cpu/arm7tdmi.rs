//! The ARM7TDMI core: pipeline, exceptions and mode switching.
//!
//! The pipeline is modeled with a single prefetch latch. One `step`:
//!
//! 1. take the instruction word out of the latch;
//! 2. refill the latch from r15 and advance r15 one instruction width;
//! 3. test the condition (ARM state) and execute.
//!
//! While an instruction executes, r15 therefore reads two widths ahead
//! of it, which is exactly the visible pipeline effect on hardware. Any
//! write to r15 goes through [`Arm7tdmi::set_pc_and_reload`], the single
//! place that refills the latch, so control transfers cannot forget the
//! reload.

use std::sync::{Arc, Mutex};

use crate::bus::Bus;
use crate::cpu::arm::instructions::ArmInstruction;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{Registers, REG_LR, REG_PC};
use crate::cpu::thumb::instruction::ThumbInstruction;

/// Exception vectors in the BIOS region.
pub const VECTOR_RESET: u32 = 0x0000_0000;
pub const VECTOR_UNDEFINED: u32 = 0x0000_0004;
pub const VECTOR_SWI: u32 = 0x0000_0008;
pub const VECTOR_IRQ: u32 = 0x0000_0018;

#[derive(Debug)]
pub struct Arm7tdmi {
    pub bus: Arc<Mutex<Bus>>,

    pub cpsr: Psr,
    /// SPSR of the current mode; meaningless in User/System.
    pub spsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,

    /// The one-ahead instruction word. In Thumb state the upper half is
    /// unused.
    prefetch: u32,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        Self::new(Arc::new(Mutex::new(Bus::default())))
    }
}

impl Arm7tdmi {
    #[must_use]
    pub fn new(bus: Arc<Mutex<Bus>>) -> Self {
        let mut cpu = Self {
            bus,
            cpsr: Psr::from_mode(Mode::System),
            spsr: Psr::default(),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            prefetch: 0,
        };
        cpu.reset();
        cpu
    }

    /// Power-on state: all registers zero, System mode, ARM state, PC at
    /// the cartridge entry point.
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.register_bank = RegisterBank::default();
        self.cpsr = Psr::from_mode(Mode::System);
        self.spsr = Psr::default();
        self.registers.set_pc(0x0800_0000);
        self.reload_pipeline();
    }

    /// Executes one instruction. Interrupt delivery happens only here,
    /// at the boundary before the fetch; an accepted IRQ consumes the
    /// whole step, so the first handler instruction runs on the next
    /// one.
    pub fn step(&mut self) {
        if self.poll_interrupts() {
            // Exception entry time on top of the vector fetch.
            self.bus.lock().unwrap().add_cycles(2);
            return;
        }

        match self.cpsr.state() {
            CpuState::Arm => {
                let op_code = self.prefetch;
                let pc = self.registers.pc();
                self.prefetch = self.bus.lock().unwrap().fetch_word(pc);
                self.registers.advance_pc(4);

                let condition = Condition::from((op_code >> 28) as u8);
                if self.cpsr.satisfies(condition) {
                    let instruction = ArmInstruction::from(op_code);
                    tracing::trace!(
                        "{:08X}: {instruction}{condition}",
                        pc.wrapping_sub(4)
                    );
                    self.execute_arm(instruction);
                }
            }
            CpuState::Thumb => {
                let op_code = self.prefetch as u16;
                let pc = self.registers.pc();
                self.prefetch = u32::from(self.bus.lock().unwrap().fetch_half_word(pc));
                self.registers.advance_pc(2);

                let instruction = ThumbInstruction::from(op_code);
                tracing::trace!("{:08X}: {instruction:?}", pc.wrapping_sub(2));
                self.execute_thumb(instruction);
            }
        }

        // One internal cycle per executed instruction on top of the
        // memory traffic.
        self.bus.lock().unwrap().add_cycles(1);
    }

    /// Refills the prefetch latch from r15 and advances r15 by one
    /// instruction width. Must run after every control transfer.
    pub fn reload_pipeline(&mut self) {
        match self.cpsr.state() {
            CpuState::Arm => {
                let pc = self.registers.pc() & !3;
                self.prefetch = self.bus.lock().unwrap().fetch_word(pc);
                self.registers.set_pc(pc.wrapping_add(4));
            }
            CpuState::Thumb => {
                let pc = self.registers.pc() & !1;
                self.prefetch = u32::from(self.bus.lock().unwrap().fetch_half_word(pc));
                self.registers.set_pc(pc.wrapping_add(2));
            }
        }
    }

    /// The single PC-write helper: aligns, sets, reloads.
    pub(crate) fn set_pc_and_reload(&mut self, value: u32) {
        self.registers.set_pc(value);
        self.reload_pipeline();
    }

    /// Register write that routes r15 through the pipeline reload.
    pub(crate) fn write_register(&mut self, reg: usize, value: u32) {
        if reg == REG_PC {
            self.set_pc_and_reload(value);
        } else {
            self.registers.set(reg, value);
        }
    }

    /// Banks registers in and out on a mode change. The CPSR mode field
    /// is updated; everything else in the CPSR is untouched.
    pub fn swap_mode(&mut self, new_mode: Mode) {
        let current = self.cpsr.mode();
        if current == new_mode {
            return;
        }

        self.register_bank.save(current, &self.registers, self.spsr);
        if let Some(spsr) = self.register_bank.restore(new_mode, &mut self.registers) {
            self.spsr = spsr;
        }
        self.cpsr.set_mode(new_mode);
    }

    /// Restores the CPSR from the current SPSR, switching mode banks.
    /// This is the exception-return path (`MOVS pc, lr` and friends).
    pub(crate) fn restore_cpsr(&mut self) {
        let saved = self.spsr;
        self.swap_mode(saved.mode());
        self.cpsr = saved;
    }

    /// Hardware exception entry: bank to `mode`, save CPSR into the new
    /// SPSR, stash the return address in the banked r14, mask IRQs,
    /// drop to ARM state and jump to the vector.
    pub(crate) fn exception(&mut self, mode: Mode, vector: u32, return_address: u32) {
        let old_cpsr = self.cpsr;
        self.swap_mode(mode);
        self.spsr = old_cpsr;
        self.registers.set(REG_LR, return_address);
        self.cpsr.set_irq_disabled(true);
        self.cpsr.set_state(CpuState::Arm);
        self.set_pc_and_reload(vector);
    }

    /// Samples the IRQ line; returns true when an exception was taken.
    /// Called once per instruction boundary.
    fn poll_interrupts(&mut self) -> bool {
        let line = self.bus.lock().unwrap().interrupt_control.irq_line();
        if !line || self.cpsr.irq_disabled() {
            return false;
        }

        // The next instruction sits one width behind r15; hardware
        // banks its address + 4 so `SUBS pc, lr, #4` returns to it.
        let width = self.cpsr.state().instruction_size();
        let return_address = self.registers.pc().wrapping_sub(width).wrapping_add(4);
        tracing::trace!("IRQ taken, return address {return_address:08X}");
        self.exception(Mode::Irq, VECTOR_IRQ, return_address);
        true
    }
}
