use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, ReadWriteKind, ShiftKind};

/// Format 2's third operand: a low register or a 3-bit immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddSubOperand {
    Register(usize),
    Immediate(u32),
}

/// Format 3 operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateOp {
    Mov,
    Cmp,
    Add,
    Sub,
}

impl From<u16> for ImmediateOp {
    fn from(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Mov,
            1 => Self::Cmp,
            2 => Self::Add,
            _ => Self::Sub,
        }
    }
}

/// Format 4: the register-to-register ALU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbAluOp {
    And = 0x0,
    Eor = 0x1,
    Lsl = 0x2,
    Lsr = 0x3,
    Asr = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Ror = 0x7,
    Tst = 0x8,
    Neg = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mul = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl From<u16> for ThumbAluOp {
    fn from(bits: u16) -> Self {
        match bits & 0xF {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Lsl,
            0x3 => Self::Lsr,
            0x4 => Self::Asr,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Ror,
            0x8 => Self::Tst,
            0x9 => Self::Neg,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mul,
            0xE => Self::Bic,
            _ => Self::Mvn,
        }
    }
}

/// Format 5 operations on the full register set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiRegisterOp {
    Add,
    Cmp,
    Mov,
    Bx,
}

impl From<u16> for HiRegisterOp {
    fn from(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Add,
            1 => Self::Cmp,
            2 => Self::Mov,
            _ => Self::Bx,
        }
    }
}

/// A decoded Thumb instruction, one variant per format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbInstruction {
    /// Format 1: LSL/LSR/ASR by a 5-bit immediate.
    MoveShifted {
        shift_kind: ShiftKind,
        amount: u32,
        rs: usize,
        rd: usize,
    },
    /// Format 2.
    AddSubtract {
        subtract: bool,
        operand: AddSubOperand,
        rs: usize,
        rd: usize,
    },
    /// Format 3: MOV/CMP/ADD/SUB with an 8-bit immediate.
    Immediate {
        op: ImmediateOp,
        rd: usize,
        value: u32,
    },
    /// Format 4.
    Alu { op: ThumbAluOp, rs: usize, rd: usize },
    /// Format 5: ADD/CMP/MOV/BX with access to r8-r15.
    HiRegister {
        op: HiRegisterOp,
        rs: usize,
        rd: usize,
    },
    /// Format 6: LDR rd, [pc, #imm].
    PcRelativeLoad { rd: usize, offset: u32 },
    /// Format 7.
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        width: ReadWriteKind,
        ro: usize,
        rb: usize,
        rd: usize,
    },
    /// Format 8: halfword and sign-extended transfers.
    LoadStoreSignExtended {
        halfword: bool,
        sign_extend: bool,
        ro: usize,
        rb: usize,
        rd: usize,
    },
    /// Format 9.
    LoadStoreImmediateOffset {
        load_store: LoadStoreKind,
        width: ReadWriteKind,
        offset: u32,
        rb: usize,
        rd: usize,
    },
    /// Format 10.
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        rb: usize,
        rd: usize,
    },
    /// Format 11.
    SpRelativeLoadStore {
        load_store: LoadStoreKind,
        rd: usize,
        offset: u32,
    },
    /// Format 12: ADD rd, pc/sp, #imm.
    LoadAddress {
        from_sp: bool,
        rd: usize,
        offset: u32,
    },
    /// Format 13: ADD sp, #±imm.
    AddOffsetToSp { negative: bool, offset: u32 },
    /// Format 14: PUSH/POP, optionally with LR/PC.
    PushPop {
        load_store: LoadStoreKind,
        with_link: bool,
        register_list: u8,
    },
    /// Format 15: LDMIA/STMIA rb!.
    MultipleLoadStore {
        load_store: LoadStoreKind,
        rb: usize,
        register_list: u8,
    },
    /// Format 16.
    ConditionalBranch { condition: Condition, offset: i32 },
    /// Format 17.
    SoftwareInterrupt { comment: u32 },
    /// Format 18.
    UnconditionalBranch { offset: i32 },
    /// Format 19, split across two halfwords.
    LongBranchLink { high: bool, offset: u32 },
    Undefined,
}

impl From<u16> for ThumbInstruction {
    fn from(op_code: u16) -> Self {
        use ThumbInstruction::*;

        if op_code.get_bits(8..=15) == 0b1101_1111 {
            SoftwareInterrupt {
                comment: u32::from(op_code.get_bits(0..=7)),
            }
        } else if op_code.get_bits(8..=15) == 0b1011_0000 {
            AddOffsetToSp {
                negative: op_code.get_bit(7),
                offset: u32::from(op_code.get_bits(0..=6)) << 2,
            }
        } else if op_code.get_bits(10..=15) == 0b010000 {
            Alu {
                op: op_code.get_bits(6..=9).into(),
                rs: op_code.get_bits(3..=5) as usize,
                rd: op_code.get_bits(0..=2) as usize,
            }
        } else if op_code.get_bits(10..=15) == 0b010001 {
            // H1 extends rd, H2 extends rs; reading bits 3-6 picks up
            // H2 for free.
            let rd_low = op_code.get_bits(0..=2) as usize;
            HiRegister {
                op: op_code.get_bits(8..=9).into(),
                rs: op_code.get_bits(3..=6) as usize,
                rd: if op_code.get_bit(7) { rd_low | 8 } else { rd_low },
            }
        } else if op_code.get_bits(12..=15) == 0b1011 && op_code.get_bits(9..=10) == 0b10 {
            PushPop {
                load_store: op_code.get_bit(11).into(),
                with_link: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7) as u8,
            }
        } else if op_code.get_bits(11..=15) == 0b00011 {
            let value = op_code.get_bits(6..=8);
            AddSubtract {
                subtract: op_code.get_bit(9),
                operand: if op_code.get_bit(10) {
                    AddSubOperand::Immediate(u32::from(value))
                } else {
                    AddSubOperand::Register(value as usize)
                },
                rs: op_code.get_bits(3..=5) as usize,
                rd: op_code.get_bits(0..=2) as usize,
            }
        } else if op_code.get_bits(11..=15) == 0b01001 {
            PcRelativeLoad {
                rd: op_code.get_bits(8..=10) as usize,
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b0101 {
            if op_code.get_bit(9) {
                LoadStoreSignExtended {
                    halfword: op_code.get_bit(11),
                    sign_extend: op_code.get_bit(10),
                    ro: op_code.get_bits(6..=8) as usize,
                    rb: op_code.get_bits(3..=5) as usize,
                    rd: op_code.get_bits(0..=2) as usize,
                }
            } else {
                LoadStoreRegisterOffset {
                    load_store: op_code.get_bit(11).into(),
                    width: op_code.get_bit(10).into(),
                    ro: op_code.get_bits(6..=8) as usize,
                    rb: op_code.get_bits(3..=5) as usize,
                    rd: op_code.get_bits(0..=2) as usize,
                }
            }
        } else if op_code.get_bits(11..=15) == 0b11100 {
            UnconditionalBranch {
                offset: (u32::from(op_code.get_bits(0..=10)) << 1).sign_extended(12) as i32,
            }
        } else if op_code.get_bits(13..=15) == 0b011 {
            let width: ReadWriteKind = op_code.get_bit(12).into();
            let offset5 = u32::from(op_code.get_bits(6..=10));
            LoadStoreImmediateOffset {
                load_store: op_code.get_bit(11).into(),
                width,
                offset: match width {
                    ReadWriteKind::Word => offset5 << 2,
                    ReadWriteKind::Byte => offset5,
                },
                rb: op_code.get_bits(3..=5) as usize,
                rd: op_code.get_bits(0..=2) as usize,
            }
        } else if op_code.get_bits(12..=15) == 0b1000 {
            LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset: u32::from(op_code.get_bits(6..=10)) << 1,
                rb: op_code.get_bits(3..=5) as usize,
                rd: op_code.get_bits(0..=2) as usize,
            }
        } else if op_code.get_bits(12..=15) == 0b1001 {
            SpRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                rd: op_code.get_bits(8..=10) as usize,
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1010 {
            LoadAddress {
                from_sp: op_code.get_bit(11),
                rd: op_code.get_bits(8..=10) as usize,
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1100 {
            MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                rb: op_code.get_bits(8..=10) as usize,
                register_list: op_code.get_bits(0..=7) as u8,
            }
        } else if op_code.get_bits(12..=15) == 0b1101 {
            ConditionalBranch {
                condition: Condition::from(op_code.get_bits(8..=11) as u8),
                offset: (u32::from(op_code.get_bits(0..=7)) << 1).sign_extended(9) as i32,
            }
        } else if op_code.get_bits(12..=15) == 0b1111 {
            LongBranchLink {
                high: op_code.get_bit(11),
                offset: u32::from(op_code.get_bits(0..=10)),
            }
        } else if op_code.get_bits(13..=15) == 0b000 {
            MoveShifted {
                shift_kind: u32::from(op_code.get_bits(11..=12)).into(),
                amount: u32::from(op_code.get_bits(6..=10)),
                rs: op_code.get_bits(3..=5) as usize,
                rd: op_code.get_bits(0..=2) as usize,
            }
        } else if op_code.get_bits(13..=15) == 0b001 {
            Immediate {
                op: op_code.get_bits(11..=12).into(),
                rd: op_code.get_bits(8..=10) as usize,
                value: u32::from(op_code.get_bits(0..=7)),
            }
        } else {
            tracing::debug!("unrecognized Thumb encoding {op_code:#06X}");
            Undefined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_move_shifted() {
        // LSL r1, r2, #4
        let decoded = ThumbInstruction::from(0b000_00_00100_010_001);
        assert_eq!(
            decoded,
            ThumbInstruction::MoveShifted {
                shift_kind: ShiftKind::Lsl,
                amount: 4,
                rs: 2,
                rd: 1,
            }
        );
    }

    #[test]
    fn decode_add_subtract() {
        // SUB r1, r0, #7
        let decoded = ThumbInstruction::from(0b00011_1_1_111_000_001);
        assert_eq!(
            decoded,
            ThumbInstruction::AddSubtract {
                subtract: true,
                operand: AddSubOperand::Immediate(7),
                rs: 0,
                rd: 1,
            }
        );

        // ADD r1, r0, r2
        let decoded = ThumbInstruction::from(0b00011_0_0_010_000_001);
        assert_eq!(
            decoded,
            ThumbInstruction::AddSubtract {
                subtract: false,
                operand: AddSubOperand::Register(2),
                rs: 0,
                rd: 1,
            }
        );
    }

    #[test]
    fn decode_immediate_ops() {
        // MOV r0, #0
        let decoded = ThumbInstruction::from(0b001_00_000_00000000);
        assert_eq!(
            decoded,
            ThumbInstruction::Immediate {
                op: ImmediateOp::Mov,
                rd: 0,
                value: 0,
            }
        );

        // CMP r3, #200
        let decoded = ThumbInstruction::from(0b001_01_011_11001000);
        assert_eq!(
            decoded,
            ThumbInstruction::Immediate {
                op: ImmediateOp::Cmp,
                rd: 3,
                value: 200,
            }
        );
    }

    #[test]
    fn decode_alu_and_hi_register() {
        // MUL r0, r4
        let decoded = ThumbInstruction::from(0b010000_1101_100_000);
        assert_eq!(
            decoded,
            ThumbInstruction::Alu {
                op: ThumbAluOp::Mul,
                rs: 4,
                rd: 0,
            }
        );

        // BX r14 (H2 set)
        let decoded = ThumbInstruction::from(0b010001_11_0_1_110_000);
        assert_eq!(
            decoded,
            ThumbInstruction::HiRegister {
                op: HiRegisterOp::Bx,
                rs: 14,
                rd: 0,
            }
        );

        // ADD r9, r1 (H1 set)
        let decoded = ThumbInstruction::from(0b010001_00_1_0_001_001);
        assert_eq!(
            decoded,
            ThumbInstruction::HiRegister {
                op: HiRegisterOp::Add,
                rs: 1,
                rd: 9,
            }
        );
    }

    #[test]
    fn decode_loads_and_stores() {
        // LDR r1, [pc, #0x58]
        let decoded = ThumbInstruction::from(0b01001_001_00010110);
        assert_eq!(
            decoded,
            ThumbInstruction::PcRelativeLoad { rd: 1, offset: 0x58 }
        );

        // STR r2, [r1, r0]
        let decoded = ThumbInstruction::from(0b0101_00_0_000_001_010);
        assert_eq!(
            decoded,
            ThumbInstruction::LoadStoreRegisterOffset {
                load_store: LoadStoreKind::Store,
                width: ReadWriteKind::Word,
                ro: 0,
                rb: 1,
                rd: 2,
            }
        );

        // LDSH r2, [r1, r0]
        let decoded = ThumbInstruction::from(0b0101_11_1_000_001_010);
        assert_eq!(
            decoded,
            ThumbInstruction::LoadStoreSignExtended {
                halfword: true,
                sign_extend: true,
                ro: 0,
                rb: 1,
                rd: 2,
            }
        );

        // LDR r7, [r1, #0x3C] (word offsets scale by 4)
        let decoded = ThumbInstruction::from(0b011_0_1_01111_001_111);
        assert_eq!(
            decoded,
            ThumbInstruction::LoadStoreImmediateOffset {
                load_store: LoadStoreKind::Load,
                width: ReadWriteKind::Word,
                offset: 0x3C,
                rb: 1,
                rd: 7,
            }
        );

        // STRH r0, [r3, #0x14]
        let decoded = ThumbInstruction::from(0b1000_0_01010_011_000);
        assert_eq!(
            decoded,
            ThumbInstruction::LoadStoreHalfword {
                load_store: LoadStoreKind::Store,
                offset: 0x14,
                rb: 3,
                rd: 0,
            }
        );
    }

    #[test]
    fn decode_stack_ops() {
        // PUSH {r4-r7, lr}
        let decoded = ThumbInstruction::from(0b1011_0_10_1_11110000);
        assert_eq!(
            decoded,
            ThumbInstruction::PushPop {
                load_store: LoadStoreKind::Store,
                with_link: true,
                register_list: 0xF0,
            }
        );

        // ADD sp, #-28
        let decoded = ThumbInstruction::from(0b10110000_1_0000111);
        assert_eq!(
            decoded,
            ThumbInstruction::AddOffsetToSp {
                negative: true,
                offset: 28,
            }
        );

        // STR r0, [sp, #0x1C]
        let decoded = ThumbInstruction::from(0b1001_0_000_00000111);
        assert_eq!(
            decoded,
            ThumbInstruction::SpRelativeLoadStore {
                load_store: LoadStoreKind::Store,
                rd: 0,
                offset: 0x1C,
            }
        );
    }

    #[test]
    fn decode_branches() {
        // BMI -8
        let decoded = ThumbInstruction::from(0b1101_0100_11111100);
        assert_eq!(
            decoded,
            ThumbInstruction::ConditionalBranch {
                condition: Condition::MI,
                offset: -8,
            }
        );

        // B +0x12E
        let decoded = ThumbInstruction::from(0b11100_00010010111);
        assert_eq!(
            decoded,
            ThumbInstruction::UnconditionalBranch { offset: 0x12E }
        );

        // SWI 0x0B
        let decoded = ThumbInstruction::from(0b11011111_00001011);
        assert_eq!(
            decoded,
            ThumbInstruction::SoftwareInterrupt { comment: 0x0B }
        );

        // BL halves
        let decoded = ThumbInstruction::from(0b1111_0_00000000001);
        assert_eq!(
            decoded,
            ThumbInstruction::LongBranchLink {
                high: false,
                offset: 1,
            }
        );
        let decoded = ThumbInstruction::from(0b1111_1_00000000001);
        assert_eq!(
            decoded,
            ThumbInstruction::LongBranchLink {
                high: true,
                offset: 1,
            }
        );
    }
}
