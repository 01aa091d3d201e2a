//! Execution of the ARM instruction set against the core.

use crate::bitwise::Bits;
use crate::cpu::arm::alu::{self, shift, ShiftSource};
use crate::cpu::arm::instructions::{
    AluOperation, ArmInstruction, HalfwordKind, HalfwordOffset, PsrOp, SecondOperand, ShiftBy,
    TransferOffset,
};
use crate::cpu::arm7tdmi::{Arm7tdmi, VECTOR_SWI, VECTOR_UNDEFINED};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind};
use crate::cpu::psr::CpuState;
use crate::cpu::registers::{REG_LR, REG_PC};

impl Arm7tdmi {
    pub fn execute_arm(&mut self, instruction: ArmInstruction) {
        match instruction {
            ArmInstruction::DataProcessing {
                operation,
                set_flags,
                rn,
                rd,
                operand2,
            } => self.data_processing(operation, set_flags, rn, rd, operand2),
            ArmInstruction::Multiply {
                accumulate,
                set_flags,
                rd,
                rn,
                rs,
                rm,
            } => self.multiply(accumulate, set_flags, rd, rn, rs, rm),
            ArmInstruction::MultiplyLong {
                signed,
                accumulate,
                set_flags,
                rd_hi,
                rd_lo,
                rs,
                rm,
            } => self.multiply_long(signed, accumulate, set_flags, rd_hi, rd_lo, rs, rm),
            ArmInstruction::SingleDataSwap { byte, rn, rd, rm } => {
                self.single_data_swap(byte, rn, rd, rm);
            }
            ArmInstruction::BranchAndExchange { rn } => self.branch_and_exchange(rn),
            ArmInstruction::HalfwordTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                kind,
                offset,
                rn,
                rd,
            } => self.halfword_transfer(
                indexing, offsetting, write_back, load_store, kind, offset, rn, rd,
            ),
            ArmInstruction::SingleDataTransfer {
                indexing,
                offsetting,
                width,
                write_back,
                load_store,
                rn,
                rd,
                offset,
            } => self.single_data_transfer(
                indexing, offsetting, width, write_back, load_store, rn, rd, offset,
            ),
            ArmInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                s_bit,
                write_back,
                load_store,
                rn,
                register_list,
            } => self.block_data_transfer(
                indexing,
                offsetting,
                s_bit,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmInstruction::Branch { link, offset } => self.branch(link, offset),
            ArmInstruction::PsrTransfer { use_spsr, op } => self.psr_transfer(use_spsr, op),
            ArmInstruction::SoftwareInterrupt { comment } => self.software_interrupt(comment),
            ArmInstruction::Coprocessor | ArmInstruction::Undefined => {
                self.undefined_instruction();
            }
        }
    }

    // --- Data processing ---------------------------------------------

    /// Resolves the flexible second operand. Returns the value and the
    /// barrel shifter's carry-out.
    fn resolve_second_operand(&self, operand2: SecondOperand) -> (u32, bool) {
        let carry_in = self.cpsr.carry();
        match operand2 {
            SecondOperand::Immediate { value, rotate } => {
                if rotate == 0 {
                    (value, carry_in)
                } else {
                    let rotated = value.rotate_right(rotate);
                    (rotated, rotated.get_bit(31))
                }
            }
            SecondOperand::Register {
                rm,
                shift_kind,
                shift_by,
            } => match shift_by {
                ShiftBy::Immediate(amount) => {
                    let value = self.registers.at(rm);
                    let result =
                        shift(shift_kind, amount, value, carry_in, ShiftSource::Immediate);
                    (result.value, result.carry)
                }
                ShiftBy::Register(rs) => {
                    // The extra operand-fetch cycle makes r15 read 12
                    // ahead instead of 8.
                    let value = self
                        .registers
                        .at(rm)
                        .wrapping_add(if rm == REG_PC { 4 } else { 0 });
                    let amount = self.registers.at(rs) & 0xFF;
                    let result = shift(shift_kind, amount, value, carry_in, ShiftSource::Register);
                    (result.value, result.carry)
                }
            },
        }
    }

    fn data_processing(
        &mut self,
        operation: AluOperation,
        set_flags: bool,
        rn: usize,
        rd: usize,
        operand2: SecondOperand,
    ) {
        let shift_by_register = matches!(
            operand2,
            SecondOperand::Register {
                shift_by: ShiftBy::Register(_),
                ..
            }
        );
        let (op2, shifter_carry) = self.resolve_second_operand(operand2);
        let op1 = self
            .registers
            .at(rn)
            .wrapping_add(if rn == REG_PC && shift_by_register { 4 } else { 0 });

        let carry_in = self.cpsr.carry();
        use AluOperation::*;
        let (result, arithmetic) = match operation {
            And | Tst => (op1 & op2, None),
            Eor | Teq => (op1 ^ op2, None),
            Sub | Cmp => {
                let r = alu::sub(op1, op2);
                (r.value, Some(r))
            }
            Rsb => {
                let r = alu::sub(op2, op1);
                (r.value, Some(r))
            }
            Add | Cmn => {
                let r = alu::add(op1, op2);
                (r.value, Some(r))
            }
            Adc => {
                let r = alu::adc(op1, op2, carry_in);
                (r.value, Some(r))
            }
            Sbc => {
                let r = alu::sbc(op1, op2, carry_in);
                (r.value, Some(r))
            }
            Rsc => {
                let r = alu::sbc(op2, op1, carry_in);
                (r.value, Some(r))
            }
            Orr => (op1 | op2, None),
            Mov => (op2, None),
            Bic => (op1 & !op2, None),
            Mvn => (!op2, None),
        };

        if set_flags {
            if rd == REG_PC && operation.writes_result() {
                // S with r15: the exception-return idiom; CPSR comes
                // back from the SPSR instead of flag computation.
                self.restore_cpsr();
            } else {
                match arithmetic {
                    Some(r) => self.cpsr.set_nzcv(r.value, r.carry, r.overflow),
                    None => {
                        self.cpsr.set_nz(result);
                        self.cpsr.set_carry(shifter_carry);
                    }
                }
            }
        }

        if operation.writes_result() {
            self.write_register(rd, result);
        }
    }

    fn psr_transfer(&mut self, use_spsr: bool, op: PsrOp) {
        if use_spsr && !self.cpsr.mode().has_spsr() {
            tracing::warn!("SPSR access in {:?} mode", self.cpsr.mode());
            return;
        }

        match op {
            PsrOp::Mrs { rd } => {
                let value = if use_spsr { self.spsr } else { self.cpsr };
                self.write_register(rd, value.raw());
            }
            PsrOp::Msr {
                operand,
                field_mask,
            } => {
                let (value, _) = self.resolve_second_operand(operand);
                let privileged = self.cpsr.mode().is_privileged();

                if use_spsr {
                    self.spsr.write_fields(value, field_mask, privileged);
                } else {
                    let old_state = self.cpsr.state();
                    // A control-field write may change mode; route it
                    // through the bank switch first.
                    if field_mask.get_bit(0) && privileged {
                        if let Ok(mode) = Mode::try_from(value) {
                            self.swap_mode(mode);
                        }
                    }
                    self.cpsr.write_fields(value, field_mask, privileged);
                    if self.cpsr.state() != old_state {
                        // Software must never flip T through MSR; the
                        // result is unpredictable on hardware, so keep
                        // the old state instead of derailing the
                        // pipeline.
                        tracing::warn!("MSR attempted to change the T bit");
                        self.cpsr.set_state(old_state);
                    }
                }
            }
        }
    }

    // --- Multiplies ---------------------------------------------------

    fn multiply(
        &mut self,
        accumulate: bool,
        set_flags: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    ) {
        let mut result = self
            .registers
            .at(rm)
            .wrapping_mul(self.registers.at(rs));
        if accumulate {
            result = result.wrapping_add(self.registers.at(rn));
        }
        self.registers.set(rd, result);

        if set_flags {
            // C is architecturally meaningless after MUL; N/Z track the
            // result.
            self.cpsr.set_nz(result);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn multiply_long(
        &mut self,
        signed: bool,
        accumulate: bool,
        set_flags: bool,
        rd_hi: usize,
        rd_lo: usize,
        rs: usize,
        rm: usize,
    ) {
        let mut result = if signed {
            let product = i64::from(self.registers.at(rm) as i32)
                .wrapping_mul(i64::from(self.registers.at(rs) as i32));
            product as u64
        } else {
            u64::from(self.registers.at(rm)).wrapping_mul(u64::from(self.registers.at(rs)))
        };

        if accumulate {
            let acc =
                (u64::from(self.registers.at(rd_hi)) << 32) | u64::from(self.registers.at(rd_lo));
            result = result.wrapping_add(acc);
        }

        self.registers.set(rd_lo, result as u32);
        self.registers.set(rd_hi, (result >> 32) as u32);

        if set_flags {
            self.cpsr.set_sign(result.get_bit(63));
            self.cpsr.set_zero(result == 0);
        }
    }

    // --- Branches -----------------------------------------------------

    fn branch(&mut self, link: bool, offset: i32) {
        let pc = self.registers.pc();
        if link {
            // r15 reads the instruction + 8; the return address is + 4.
            self.registers.set(REG_LR, pc.wrapping_sub(4));
        }
        self.set_pc_and_reload(pc.wrapping_add(offset as u32));
    }

    fn branch_and_exchange(&mut self, rn: usize) {
        let target = self.registers.at(rn);
        let state = if target.get_bit(0) {
            CpuState::Thumb
        } else {
            CpuState::Arm
        };
        self.cpsr.set_state(state);
        // The reload aligns per the new state.
        self.set_pc_and_reload(target & !1);
    }

    fn software_interrupt(&mut self, comment: u32) {
        tracing::trace!("SWI {comment:#08X}");
        let width = self.cpsr.state().instruction_size();
        // Return to the instruction after the SWI.
        let return_address = self.registers.pc().wrapping_sub(width);
        self.exception(Mode::Supervisor, VECTOR_SWI, return_address);
    }

    pub(crate) fn undefined_instruction(&mut self) {
        tracing::error!(
            "undefined instruction near {:08X}",
            self.registers.pc().wrapping_sub(8)
        );
        let width = self.cpsr.state().instruction_size();
        let return_address = self.registers.pc().wrapping_sub(width);
        self.exception(Mode::Undefined, VECTOR_UNDEFINED, return_address);
    }

    // --- Data transfers -----------------------------------------------

    /// Base-plus-offset address arithmetic shared by the single and
    /// halfword transfers. Returns the transfer address and the value
    /// the base register takes if indexing says to write it back.
    fn transfer_addresses(
        base: u32,
        offset: u32,
        indexing: Indexing,
        offsetting: Offsetting,
    ) -> (u32, u32) {
        let stepped = match offsetting {
            Offsetting::Up => base.wrapping_add(offset),
            Offsetting::Down => base.wrapping_sub(offset),
        };
        match indexing {
            Indexing::Pre => (stepped, stepped),
            Indexing::Post => (base, stepped),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn single_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        width: ReadWriteKind,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        rd: usize,
        offset: TransferOffset,
    ) {
        let amount = match offset {
            TransferOffset::Immediate(value) => value,
            TransferOffset::Register {
                rm,
                shift_kind,
                amount,
            } => {
                shift(
                    shift_kind,
                    amount,
                    self.registers.at(rm),
                    self.cpsr.carry(),
                    ShiftSource::Immediate,
                )
                .value
            }
        };

        let base = self.registers.at(rn);
        let (address, written_back) =
            Self::transfer_addresses(base, amount, indexing, offsetting);

        // Post-indexing always writes the base back.
        if indexing == Indexing::Post || write_back {
            self.registers.set(rn, written_back);
        }

        match load_store {
            LoadStoreKind::Load => {
                let value = match width {
                    ReadWriteKind::Byte => u32::from(self.bus.lock().unwrap().read_byte(address)),
                    ReadWriteKind::Word => self.bus.lock().unwrap().read_word(address),
                };
                // A load into the base register overrides the writeback.
                self.write_register(rd, value);
            }
            LoadStoreKind::Store => {
                // STR of r15 stores the instruction + 12.
                let value = self
                    .registers
                    .at(rd)
                    .wrapping_add(if rd == REG_PC { 4 } else { 0 });
                match width {
                    ReadWriteKind::Byte => {
                        self.bus.lock().unwrap().write_byte(address, value as u8);
                    }
                    ReadWriteKind::Word => self.bus.lock().unwrap().write_word(address, value),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn halfword_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        kind: HalfwordKind,
        offset: HalfwordOffset,
        rn: usize,
        rd: usize,
    ) {
        let amount = match offset {
            HalfwordOffset::Immediate(value) => value,
            HalfwordOffset::Register(rm) => self.registers.at(rm),
        };

        let base = self.registers.at(rn);
        let (address, written_back) =
            Self::transfer_addresses(base, amount, indexing, offsetting);

        if indexing == Indexing::Post || write_back {
            self.registers.set(rn, written_back);
        }

        match load_store {
            LoadStoreKind::Store => {
                let value = self
                    .registers
                    .at(rd)
                    .wrapping_add(if rd == REG_PC { 4 } else { 0 });
                self.bus.lock().unwrap().write_half_word(address, value as u16);
            }
            LoadStoreKind::Load => {
                let value = match kind {
                    HalfwordKind::UnsignedHalfword => {
                        u32::from(self.bus.lock().unwrap().read_half_word(address))
                    }
                    HalfwordKind::SignedByte => {
                        u32::from(self.bus.lock().unwrap().read_byte(address)).sign_extended(8)
                    }
                    HalfwordKind::SignedHalfword => {
                        // A misaligned signed halfword degrades to a
                        // sign-extended byte load on the ARM7.
                        if address.get_bit(0) {
                            u32::from(self.bus.lock().unwrap().read_byte(address))
                                .sign_extended(8)
                        } else {
                            u32::from(self.bus.lock().unwrap().read_half_word(address))
                                .sign_extended(16)
                        }
                    }
                };
                self.write_register(rd, value);
            }
        }
    }

    fn single_data_swap(&mut self, byte: bool, rn: usize, rd: usize, rm: usize) {
        let address = self.registers.at(rn);
        let source = self.registers.at(rm);

        let loaded = {
            let mut bus = self.bus.lock().unwrap();
            if byte {
                let loaded = u32::from(bus.read_byte(address));
                bus.write_byte(address, source as u8);
                loaded
            } else {
                let loaded = bus.read_word(address);
                bus.write_word(address, source);
                loaded
            }
        };
        self.write_register(rd, loaded);
    }

    #[allow(clippy::too_many_arguments)]
    fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        s_bit: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    ) {
        let base = self.registers.at(rn);
        let count = u32::from(register_list.count_ones());

        // Regardless of direction the lowest register lands at the
        // lowest address; walk upward from the resolved start.
        let (mut address, written_back) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(count * 4)),
            (Offsetting::Up, Indexing::Pre) => {
                (base.wrapping_add(4), base.wrapping_add(count * 4))
            }
            (Offsetting::Down, Indexing::Post) => (
                base.wrapping_sub(count * 4).wrapping_add(4),
                base.wrapping_sub(count * 4),
            ),
            (Offsetting::Down, Indexing::Pre) => (
                base.wrapping_sub(count * 4),
                base.wrapping_sub(count * 4),
            ),
        };

        let loads_pc = load_store == LoadStoreKind::Load && register_list.get_bit(15);
        // S without a PC load transfers the User-mode bank instead of
        // the current one.
        let user_bank = s_bit && !loads_pc;

        match load_store {
            LoadStoreKind::Store => {
                for reg in 0..16 {
                    if !register_list.get_bit(reg) {
                        continue;
                    }
                    let value = if user_bank {
                        self.user_bank_register(reg as usize)
                    } else {
                        self.registers
                            .at(reg as usize)
                            .wrapping_add(if reg as usize == REG_PC { 4 } else { 0 })
                    };
                    self.bus.lock().unwrap().write_word(address, value);
                    address = address.wrapping_add(4);
                }
                if write_back {
                    self.registers.set(rn, written_back);
                }
            }
            LoadStoreKind::Load => {
                if write_back && !register_list.get_bit(rn as u8) {
                    self.registers.set(rn, written_back);
                }
                for reg in 0..16 {
                    if !register_list.get_bit(reg) {
                        continue;
                    }
                    let value = self.bus.lock().unwrap().read_word(address);
                    address = address.wrapping_add(4);
                    if user_bank {
                        self.set_user_bank_register(reg as usize, value);
                    } else if reg == 15 {
                        if s_bit {
                            // LDM with PC and S: exception return.
                            self.restore_cpsr();
                        }
                        self.set_pc_and_reload(value);
                    } else {
                        self.registers.set(reg as usize, value);
                    }
                }
            }
        }
    }

    /// Reads a register out of the User bank while in an exception mode
    /// (STM with the S bit).
    fn user_bank_register(&self, reg: usize) -> u32 {
        let mode = self.cpsr.mode();
        match reg {
            13 | 14 if mode.has_spsr() => {
                let (r13, r14) = self.register_bank.user_r13_r14();
                if reg == 13 { r13 } else { r14 }
            }
            8..=12 if mode == Mode::Fiq => self.register_bank.user_r8_r12(reg),
            REG_PC => self.registers.pc().wrapping_add(4),
            _ => self.registers.at(reg),
        }
    }

    fn set_user_bank_register(&mut self, reg: usize, value: u32) {
        let mode = self.cpsr.mode();
        match reg {
            13 | 14 if mode.has_spsr() => {
                let (mut r13, mut r14) = self.register_bank.user_r13_r14();
                if reg == 13 {
                    r13 = value;
                } else {
                    r14 = value;
                }
                self.register_bank.set_user_r13_r14(r13, r14);
            }
            8..=12 if mode == Mode::Fiq => self.register_bank.set_user_r8_r12(reg, value),
            _ => self.registers.set(reg, value),
        }
    }
}
