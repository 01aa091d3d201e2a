use crate::bitwise::Bits;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind, ShiftKind};

/// The sixteen data-processing opcodes, bits 21-24.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOperation {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl AluOperation {
    /// Logical operations take their carry from the barrel shifter;
    /// arithmetic ones produce it themselves.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Eor
                | Self::Tst
                | Self::Teq
                | Self::Orr
                | Self::Mov
                | Self::Bic
                | Self::Mvn
        )
    }

    /// TST/TEQ/CMP/CMN only update flags.
    #[must_use]
    pub fn writes_result(self) -> bool {
        !matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for AluOperation {
    fn from(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Sub,
            0x3 => Self::Rsb,
            0x4 => Self::Add,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Rsc,
            0x8 => Self::Tst,
            0x9 => Self::Teq,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mov,
            0xE => Self::Bic,
            _ => Self::Mvn,
        }
    }
}

impl std::fmt::Display for AluOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{self:?}").to_uppercase())
    }
}

/// How a shift amount is encoded inside a register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftBy {
    Immediate(u32),
    Register(usize),
}

/// The flexible second operand of data-processing instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondOperand {
    /// 8-bit value rotated right by twice the 4-bit rotate field.
    Immediate { value: u32, rotate: u32 },
    /// Register, run through the barrel shifter.
    Register {
        rm: usize,
        shift_kind: ShiftKind,
        shift_by: ShiftBy,
    },
}

/// LDRH/STRH/LDRSB/LDRSH flavor, bits 5-6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfwordKind {
    UnsignedHalfword,
    SignedByte,
    SignedHalfword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfwordOffset {
    Immediate(u32),
    Register(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOffset {
    Immediate(u32),
    /// Register offset, shifted by an immediate amount.
    Register {
        rm: usize,
        shift_kind: ShiftKind,
        amount: u32,
    },
}

/// PSR transfer flavor. The field mask of MSR selects which PSR bytes
/// are written (bit 3 = flags, bit 0 = control).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsrOp {
    Mrs { rd: usize },
    Msr { operand: SecondOperand, field_mask: u32 },
}

/// A decoded ARM instruction. The condition code is stripped before
/// decoding; see `Arm7tdmi::step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmInstruction {
    DataProcessing {
        operation: AluOperation,
        set_flags: bool,
        rn: usize,
        rd: usize,
        operand2: SecondOperand,
    },
    Multiply {
        accumulate: bool,
        set_flags: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    },
    MultiplyLong {
        signed: bool,
        accumulate: bool,
        set_flags: bool,
        rd_hi: usize,
        rd_lo: usize,
        rs: usize,
        rm: usize,
    },
    SingleDataSwap {
        byte: bool,
        rn: usize,
        rd: usize,
        rm: usize,
    },
    BranchAndExchange {
        rn: usize,
    },
    HalfwordTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        kind: HalfwordKind,
        offset: HalfwordOffset,
        rn: usize,
        rd: usize,
    },
    SingleDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        width: ReadWriteKind,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        rd: usize,
        offset: TransferOffset,
    },
    BlockDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        s_bit: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    },
    Branch {
        link: bool,
        /// Already shifted left twice and sign-extended.
        offset: i32,
    },
    PsrTransfer {
        use_spsr: bool,
        op: PsrOp,
    },
    SoftwareInterrupt {
        comment: u32,
    },
    /// CDP/LDC/STC/MCR/MRC. The GBA has no coprocessors; these trap.
    Coprocessor,
    Undefined,
}

impl From<u32> for ArmInstruction {
    fn from(op_code: u32) -> Self {
        use ArmInstruction::*;

        // Most-specific patterns first: several encodings live inside
        // the data-processing format.
        if op_code.get_bits(4..=27) == 0b0001_0010_1111_1111_1111_0001 {
            return BranchAndExchange {
                rn: op_code.get_bits(0..=3) as usize,
            };
        }

        if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(20..=21) == 0b00
            && op_code.get_bits(4..=11) == 0b0000_1001
        {
            return SingleDataSwap {
                byte: op_code.get_bit(22),
                rn: op_code.get_bits(16..=19) as usize,
                rd: op_code.get_bits(12..=15) as usize,
                rm: op_code.get_bits(0..=3) as usize,
            };
        }

        if op_code.get_bits(23..=27) == 0b00001 && op_code.get_bits(4..=7) == 0b1001 {
            return MultiplyLong {
                signed: op_code.get_bit(22),
                accumulate: op_code.get_bit(21),
                set_flags: op_code.get_bit(20),
                rd_hi: op_code.get_bits(16..=19) as usize,
                rd_lo: op_code.get_bits(12..=15) as usize,
                rs: op_code.get_bits(8..=11) as usize,
                rm: op_code.get_bits(0..=3) as usize,
            };
        }

        if op_code.get_bits(22..=27) == 0b000000 && op_code.get_bits(4..=7) == 0b1001 {
            return Multiply {
                accumulate: op_code.get_bit(21),
                set_flags: op_code.get_bit(20),
                rd: op_code.get_bits(16..=19) as usize,
                rn: op_code.get_bits(12..=15) as usize,
                rs: op_code.get_bits(8..=11) as usize,
                rm: op_code.get_bits(0..=3) as usize,
            };
        }

        if op_code.get_bits(25..=27) == 0b000 && op_code.get_bit(7) && op_code.get_bit(4) {
            let kind = match op_code.get_bits(5..=6) {
                0b01 => HalfwordKind::UnsignedHalfword,
                0b10 => HalfwordKind::SignedByte,
                0b11 => HalfwordKind::SignedHalfword,
                // SH=00 with bits 7 and 4 set is the multiply/swap
                // space, consumed above; anything left is undefined.
                _ => return Undefined,
            };

            let offset = if op_code.get_bit(22) {
                HalfwordOffset::Immediate(
                    (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                )
            } else {
                HalfwordOffset::Register(op_code.get_bits(0..=3) as usize)
            };

            return HalfwordTransfer {
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                kind,
                offset,
                rn: op_code.get_bits(16..=19) as usize,
                rd: op_code.get_bits(12..=15) as usize,
            };
        }

        // MRS: the TST/TEQ/CMP/CMN space without the S bit.
        if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(16..=21) == 0b001111
            && op_code.get_bits(0..=11) == 0
        {
            return PsrTransfer {
                use_spsr: op_code.get_bit(22),
                op: PsrOp::Mrs {
                    rd: op_code.get_bits(12..=15) as usize,
                },
            };
        }

        // MSR, register or immediate form, with its 4-bit field mask.
        if op_code.get_bits(26..=27) == 0b00
            && op_code.get_bits(23..=24) == 0b10
            && op_code.get_bits(20..=21) == 0b10
            && op_code.get_bits(12..=15) == 0b1111
        {
            let operand = if op_code.get_bit(25) {
                SecondOperand::Immediate {
                    value: op_code.get_bits(0..=7),
                    rotate: op_code.get_bits(8..=11) * 2,
                }
            } else {
                SecondOperand::Register {
                    rm: op_code.get_bits(0..=3) as usize,
                    shift_kind: ShiftKind::Lsl,
                    shift_by: ShiftBy::Immediate(0),
                }
            };

            return PsrTransfer {
                use_spsr: op_code.get_bit(22),
                op: PsrOp::Msr {
                    operand,
                    field_mask: op_code.get_bits(16..=19),
                },
            };
        }

        match op_code.get_bits(25..=27) {
            0b011 if op_code.get_bit(4) => Undefined,
            0b010 | 0b011 => {
                let offset = if op_code.get_bit(25) {
                    TransferOffset::Register {
                        rm: op_code.get_bits(0..=3) as usize,
                        shift_kind: op_code.get_bits(5..=6).into(),
                        amount: op_code.get_bits(7..=11),
                    }
                } else {
                    TransferOffset::Immediate(op_code.get_bits(0..=11))
                };

                SingleDataTransfer {
                    indexing: op_code.get_bit(24).into(),
                    offsetting: op_code.get_bit(23).into(),
                    width: op_code.get_bit(22).into(),
                    write_back: op_code.get_bit(21),
                    load_store: op_code.get_bit(20).into(),
                    rn: op_code.get_bits(16..=19) as usize,
                    rd: op_code.get_bits(12..=15) as usize,
                    offset,
                }
            }
            0b100 => BlockDataTransfer {
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                s_bit: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19) as usize,
                register_list: op_code.get_bits(0..=15) as u16,
            },
            0b101 => Branch {
                link: op_code.get_bit(24),
                offset: (op_code.get_bits(0..=23) << 2).sign_extended(26) as i32,
            },
            0b110 => Coprocessor,
            0b111 => {
                if op_code.get_bits(24..=27) == 0b1111 {
                    SoftwareInterrupt {
                        comment: op_code.get_bits(0..=23),
                    }
                } else {
                    Coprocessor
                }
            }
            // 0b000 / 0b001: data processing.
            _ => {
                let operand2 = if op_code.get_bit(25) {
                    SecondOperand::Immediate {
                        value: op_code.get_bits(0..=7),
                        rotate: op_code.get_bits(8..=11) * 2,
                    }
                } else {
                    SecondOperand::Register {
                        rm: op_code.get_bits(0..=3) as usize,
                        shift_kind: op_code.get_bits(5..=6).into(),
                        shift_by: if op_code.get_bit(4) {
                            ShiftBy::Register(op_code.get_bits(8..=11) as usize)
                        } else {
                            ShiftBy::Immediate(op_code.get_bits(7..=11))
                        },
                    }
                };

                DataProcessing {
                    operation: op_code.get_bits(21..=24).into(),
                    set_flags: op_code.get_bit(20),
                    rn: op_code.get_bits(16..=19) as usize,
                    rd: op_code.get_bits(12..=15) as usize,
                    operand2,
                }
            }
        }
    }
}

impl std::fmt::Display for ArmInstruction {
    /// Compact mnemonic for trace logs; not a full disassembler.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataProcessing {
                operation,
                set_flags,
                rn,
                rd,
                operand2,
            } => {
                let s = if *set_flags { "S" } else { "" };
                write!(f, "{operation}{s} r{rd}, r{rn}, {operand2:?}")
            }
            Self::Multiply { accumulate, rd, .. } => {
                write!(f, "{} r{rd}", if *accumulate { "MLA" } else { "MUL" })
            }
            Self::MultiplyLong {
                signed, accumulate, ..
            } => {
                let sign = if *signed { "S" } else { "U" };
                let op = if *accumulate { "MLAL" } else { "MULL" };
                write!(f, "{sign}{op}")
            }
            Self::SingleDataSwap { byte, rd, rn, rm } => {
                let b = if *byte { "B" } else { "" };
                write!(f, "SWP{b} r{rd}, r{rm}, [r{rn}]")
            }
            Self::BranchAndExchange { rn } => write!(f, "BX r{rn}"),
            Self::HalfwordTransfer {
                load_store, kind, rd, rn, ..
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let suffix = match kind {
                    HalfwordKind::UnsignedHalfword => "H",
                    HalfwordKind::SignedByte => "SB",
                    HalfwordKind::SignedHalfword => "SH",
                };
                write!(f, "{op}{suffix} r{rd}, [r{rn}]")
            }
            Self::SingleDataTransfer {
                load_store, width, rd, rn, ..
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let b = match width {
                    ReadWriteKind::Byte => "B",
                    ReadWriteKind::Word => "",
                };
                write!(f, "{op}{b} r{rd}, [r{rn}]")
            }
            Self::BlockDataTransfer {
                load_store,
                rn,
                register_list,
                ..
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDM",
                    LoadStoreKind::Store => "STM",
                };
                write!(f, "{op} r{rn}, {register_list:#06X}")
            }
            Self::Branch { link, offset } => {
                write!(f, "B{} {offset:+}", if *link { "L" } else { "" })
            }
            Self::PsrTransfer { use_spsr, op } => {
                let psr = if *use_spsr { "SPSR" } else { "CPSR" };
                match op {
                    PsrOp::Mrs { rd } => write!(f, "MRS r{rd}, {psr}"),
                    PsrOp::Msr { field_mask, .. } => write!(f, "MSR {psr}_{field_mask:04b}"),
                }
            }
            Self::SoftwareInterrupt { comment } => write!(f, "SWI {comment:#08X}"),
            Self::Coprocessor => f.write_str("coprocessor"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        let decoded = ArmInstruction::from(0b1110_1011_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            decoded,
            ArmInstruction::Branch {
                link: true,
                offset: 508,
            }
        );

        // Negative offset: -9 words.
        let decoded = ArmInstruction::from(0b1110_1010_1111_1111_1111_1111_1111_0111);
        assert_eq!(
            decoded,
            ArmInstruction::Branch {
                link: false,
                offset: -36,
            }
        );
    }

    #[test]
    fn decode_branch_and_exchange() {
        let decoded = ArmInstruction::from(0b1110_0001_0010_1111_1111_1111_0001_0001);
        assert_eq!(decoded, ArmInstruction::BranchAndExchange { rn: 1 });
    }

    #[test]
    fn decode_data_processing_immediate() {
        // MOV r0, #1
        let decoded = ArmInstruction::from(0b1110_0011_1010_0000_0000_0000_0000_0001);
        assert_eq!(
            decoded,
            ArmInstruction::DataProcessing {
                operation: AluOperation::Mov,
                set_flags: false,
                rn: 0,
                rd: 0,
                operand2: SecondOperand::Immediate { value: 1, rotate: 0 },
            }
        );
    }

    #[test]
    fn decode_data_processing_shifted_register() {
        // ADDS r2, r0, r1, LSL #3
        let decoded = ArmInstruction::from(0b1110_0000_1001_0000_0010_0001_1000_0001);
        assert_eq!(
            decoded,
            ArmInstruction::DataProcessing {
                operation: AluOperation::Add,
                set_flags: true,
                rn: 0,
                rd: 2,
                operand2: SecondOperand::Register {
                    rm: 1,
                    shift_kind: ShiftKind::Lsl,
                    shift_by: ShiftBy::Immediate(3),
                },
            }
        );

        // MOV r0, r0, LSR r4
        let decoded = ArmInstruction::from(0b1110_0001_1010_0000_0000_0100_0011_0000);
        assert_eq!(
            decoded,
            ArmInstruction::DataProcessing {
                operation: AluOperation::Mov,
                set_flags: false,
                rn: 0,
                rd: 0,
                operand2: SecondOperand::Register {
                    rm: 0,
                    shift_kind: ShiftKind::Lsr,
                    shift_by: ShiftBy::Register(4),
                },
            }
        );
    }

    #[test]
    fn decode_mrs_and_msr_are_not_compares() {
        // MRS r3, CPSR
        let decoded = ArmInstruction::from(0b1110_0001_0000_1111_0011_0000_0000_0000);
        assert_eq!(
            decoded,
            ArmInstruction::PsrTransfer {
                use_spsr: false,
                op: PsrOp::Mrs { rd: 3 },
            }
        );

        // MSR SPSR_fc, r14
        let decoded = ArmInstruction::from(0b1110_0001_0110_1001_1111_0000_0000_1110);
        assert_eq!(
            decoded,
            ArmInstruction::PsrTransfer {
                use_spsr: true,
                op: PsrOp::Msr {
                    operand: SecondOperand::Register {
                        rm: 14,
                        shift_kind: ShiftKind::Lsl,
                        shift_by: ShiftBy::Immediate(0),
                    },
                    field_mask: 0b1001,
                },
            }
        );

        // MSR CPSR_f, #0xF0000000 (immediate form)
        let decoded = ArmInstruction::from(0b1110_0011_0010_1000_1111_0010_0000_1111);
        assert_eq!(
            decoded,
            ArmInstruction::PsrTransfer {
                use_spsr: false,
                op: PsrOp::Msr {
                    operand: SecondOperand::Immediate {
                        value: 0xF,
                        rotate: 4,
                    },
                    field_mask: 0b1000,
                },
            }
        );

        // CMP r1, r2 still decodes as a compare.
        let decoded = ArmInstruction::from(0b1110_0001_0101_0001_0000_0000_0000_0010);
        assert!(matches!(
            decoded,
            ArmInstruction::DataProcessing {
                operation: AluOperation::Cmp,
                set_flags: true,
                ..
            }
        ));
    }

    #[test]
    fn decode_multiplies() {
        // MUL r0, r1, r2
        let decoded = ArmInstruction::from(0b1110_0000_0000_0000_0000_0010_1001_0001);
        assert_eq!(
            decoded,
            ArmInstruction::Multiply {
                accumulate: false,
                set_flags: false,
                rd: 0,
                rn: 0,
                rs: 2,
                rm: 1,
            }
        );

        // SMLALS r4, r5, r6, r7
        let decoded = ArmInstruction::from(0b1110_0000_1111_0101_0100_0111_1001_0110);
        assert_eq!(
            decoded,
            ArmInstruction::MultiplyLong {
                signed: true,
                accumulate: true,
                set_flags: true,
                rd_hi: 5,
                rd_lo: 4,
                rs: 7,
                rm: 6,
            }
        );
    }

    #[test]
    fn decode_halfword_transfers() {
        // STRH r0, [r2, +r1]
        let decoded = ArmInstruction::from(0b1110_0001_1000_0010_0000_0000_1011_0001);
        assert_eq!(
            decoded,
            ArmInstruction::HalfwordTransfer {
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store: LoadStoreKind::Store,
                kind: HalfwordKind::UnsignedHalfword,
                offset: HalfwordOffset::Register(1),
                rn: 2,
                rd: 0,
            }
        );

        // LDRSB r1, [r0, #-0x1F]
        let decoded = ArmInstruction::from(0b1110_0001_0101_0000_0001_0001_1101_1111);
        assert_eq!(
            decoded,
            ArmInstruction::HalfwordTransfer {
                indexing: Indexing::Pre,
                offsetting: Offsetting::Down,
                write_back: false,
                load_store: LoadStoreKind::Load,
                kind: HalfwordKind::SignedByte,
                offset: HalfwordOffset::Immediate(0x1F),
                rn: 0,
                rd: 1,
            }
        );
    }

    #[test]
    fn decode_swap() {
        // SWPB r2, r3, [r4]
        let decoded = ArmInstruction::from(0b1110_0001_0100_0100_0010_0000_1001_0011);
        assert_eq!(
            decoded,
            ArmInstruction::SingleDataSwap {
                byte: true,
                rn: 4,
                rd: 2,
                rm: 3,
            }
        );
    }

    #[test]
    fn decode_block_transfer() {
        // LDMIA r13!, {r1, r5, r7}
        let decoded = ArmInstruction::from(0b1110_1000_1011_1101_0000_0000_1010_0010);
        assert_eq!(
            decoded,
            ArmInstruction::BlockDataTransfer {
                indexing: Indexing::Post,
                offsetting: Offsetting::Up,
                s_bit: false,
                write_back: true,
                load_store: LoadStoreKind::Load,
                rn: 13,
                register_list: 0b0000_0000_1010_0010,
            }
        );
    }

    #[test]
    fn decode_swi_undefined_and_coprocessor() {
        assert_eq!(
            ArmInstruction::from(0b1110_1111_0000_0000_0000_0000_0001_0000),
            ArmInstruction::SoftwareInterrupt { comment: 0x10 }
        );
        // Format 011 with bit 4 set.
        assert_eq!(
            ArmInstruction::from(0b1110_0110_0000_0000_0000_0000_0001_0000),
            ArmInstruction::Undefined
        );
        // MCR p15
        assert_eq!(
            ArmInstruction::from(0b1110_1110_0000_0001_0000_1111_0001_0000),
            ArmInstruction::Coprocessor
        );
    }
}
