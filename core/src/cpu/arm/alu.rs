//! The barrel shifter and the flag-producing arithmetic shared by both
//! instruction sets.
//!
//! The shifter sits in front of the ALU's second operand. Its zero-amount
//! encodings are repurposed (LSR #0 means LSR #32, ROR #0 means RRX, and
//! so on), and a shift amount taken from a register follows a different
//! table again, so callers must say where the amount came from.

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// Where a shift amount was encoded; the zero-amount special cases
/// differ between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftSource {
    Immediate,
    Register,
}

/// Output of the barrel shifter: the shifted value and the carry that
/// fell out. Logical operations with the S bit adopt the carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftResult {
    pub value: u32,
    pub carry: bool,
}

/// Result of an arithmetic ALU operation. N and Z are derived from
/// `value` by the flag setter; C and V must be computed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u32,
    pub carry: bool,
    pub overflow: bool,
}

/// Runs the barrel shifter.
///
/// `carry` is the current CPSR C flag, consumed by RRX and passed
/// through whenever the value is not shifted at all.
#[must_use]
pub fn shift(
    kind: ShiftKind,
    amount: u32,
    value: u32,
    carry: bool,
    source: ShiftSource,
) -> ShiftResult {
    match source {
        // An amount of zero read from a register leaves everything
        // untouched, for every shift type.
        ShiftSource::Register if amount == 0 => ShiftResult { value, carry },
        ShiftSource::Register => shift_by(kind, amount, value, carry),
        ShiftSource::Immediate => match (kind, amount) {
            (ShiftKind::Lsl, 0) => ShiftResult { value, carry },
            // LSR #0 and ASR #0 encode a shift by 32.
            (ShiftKind::Lsr | ShiftKind::Asr, 0) => shift_by(kind, 32, value, carry),
            // ROR #0 encodes RRX: a 33-bit rotate through the carry.
            (ShiftKind::Ror, 0) => ShiftResult {
                value: (value >> 1) | (u32::from(carry) << 31),
                carry: value.get_bit(0),
            },
            _ => shift_by(kind, amount, value, carry),
        },
    }
}

/// A plain shift by `amount` >= 1, covering the over-32 cases from the
/// register-specified table.
fn shift_by(kind: ShiftKind, amount: u32, value: u32, _carry: bool) -> ShiftResult {
    debug_assert!(amount >= 1);
    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => ShiftResult {
                value: value << amount,
                carry: value.get_bit((32 - amount) as u8),
            },
            32 => ShiftResult {
                value: 0,
                carry: value.get_bit(0),
            },
            _ => ShiftResult {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Lsr => match amount {
            1..=31 => ShiftResult {
                value: value >> amount,
                carry: value.get_bit((amount - 1) as u8),
            },
            32 => ShiftResult {
                value: 0,
                carry: value.get_bit(31),
            },
            _ => ShiftResult {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Asr => match amount {
            1..=31 => ShiftResult {
                value: ((value as i32) >> amount) as u32,
                carry: value.get_bit((amount - 1) as u8),
            },
            // 32 and beyond fill with the sign bit.
            _ => ShiftResult {
                value: ((value as i32) >> 31) as u32,
                carry: value.get_bit(31),
            },
        },
        ShiftKind::Ror => {
            let effective = amount % 32;
            if effective == 0 {
                // ROR #32 (or a multiple): value unchanged, carry from
                // the bit that rotated through.
                ShiftResult {
                    value,
                    carry: value.get_bit(31),
                }
            } else {
                ShiftResult {
                    value: value.rotate_right(effective),
                    carry: value.get_bit((effective - 1) as u8),
                }
            }
        }
    }
}

/// `a + b`. Carry is the unsigned carry out of bit 31, overflow the
/// signed one.
#[must_use]
pub fn add(a: u32, b: u32) -> AluResult {
    adc(a, b, false)
}

/// `a + b + carry_in`.
#[must_use]
pub fn adc(a: u32, b: u32, carry_in: bool) -> AluResult {
    let wide = u64::from(a) + u64::from(b) + u64::from(carry_in);
    let value = wide as u32;
    AluResult {
        value,
        carry: wide > u64::from(u32::MAX),
        // Overflow: both operands share a sign the result lost.
        overflow: (!(a ^ b) & (a ^ value)).get_bit(31),
    }
}

/// `a - b`. Per the ARM convention, carry is NOT-borrow: set when
/// `a >= b` unsigned.
#[must_use]
pub fn sub(a: u32, b: u32) -> AluResult {
    sbc(a, b, true)
}

/// `a - b - (1 - carry_in)`, the SBC/RSC primitive.
#[must_use]
pub fn sbc(a: u32, b: u32, carry_in: bool) -> AluResult {
    let borrow = u64::from(!carry_in);
    let value = a.wrapping_sub(b).wrapping_sub(!carry_in as u32);
    AluResult {
        value,
        carry: u64::from(a) >= u64::from(b) + borrow,
        overflow: ((a ^ b) & (a ^ value)).get_bit(31),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn imm(kind: ShiftKind, amount: u32, value: u32, carry: bool) -> ShiftResult {
        shift(kind, amount, value, carry, ShiftSource::Immediate)
    }

    fn reg(kind: ShiftKind, amount: u32, value: u32, carry: bool) -> ShiftResult {
        shift(kind, amount, value, carry, ShiftSource::Register)
    }

    #[test]
    fn lsl_zero_keeps_value_and_carry() {
        let result = imm(ShiftKind::Lsl, 0, 0xDEAD_BEEF, true);
        assert_eq!(result.value, 0xDEAD_BEEF);
        assert!(result.carry);
    }

    #[test]
    fn lsl_shifts_the_top_bit_into_carry() {
        let result = imm(ShiftKind::Lsl, 1, 0x8000_0001, false);
        assert_eq!(result.value, 2);
        assert!(result.carry);

        let result = imm(ShiftKind::Lsl, 4, 0x0800_0000, false);
        assert_eq!(result.value, 0x8000_0000);
        assert!(!result.carry);
    }

    #[test]
    fn lsr_zero_encodes_lsr_32() {
        let result = imm(ShiftKind::Lsr, 0, 0x8000_0000, false);
        assert_eq!(result.value, 0);
        assert!(result.carry);

        let result = imm(ShiftKind::Lsr, 0, 0x7FFF_FFFF, true);
        assert_eq!(result.value, 0);
        assert!(!result.carry);
    }

    #[test]
    fn asr_zero_encodes_asr_32() {
        let result = imm(ShiftKind::Asr, 0, 0x8000_0000, false);
        assert_eq!(result.value, 0xFFFF_FFFF);
        assert!(result.carry);

        let result = imm(ShiftKind::Asr, 0, 0x7FFF_FFFF, false);
        assert_eq!(result.value, 0);
        assert!(!result.carry);
    }

    #[test]
    fn ror_zero_is_rrx() {
        let result = imm(ShiftKind::Ror, 0, 0b11, true);
        assert_eq!(result.value, 0x8000_0001);
        assert!(result.carry);

        let result = imm(ShiftKind::Ror, 0, 0b10, false);
        assert_eq!(result.value, 0b1);
        assert!(!result.carry);
    }

    #[test]
    fn register_amount_zero_changes_nothing() {
        for kind in [ShiftKind::Lsl, ShiftKind::Lsr, ShiftKind::Asr, ShiftKind::Ror] {
            let result = reg(kind, 0, 0x1234_5678, true);
            assert_eq!(result.value, 0x1234_5678);
            assert!(result.carry);
        }
    }

    #[test]
    fn register_amounts_beyond_32() {
        let result = reg(ShiftKind::Lsl, 32, 1, false);
        assert_eq!((result.value, result.carry), (0, true));
        let result = reg(ShiftKind::Lsl, 33, u32::MAX, true);
        assert_eq!((result.value, result.carry), (0, false));

        let result = reg(ShiftKind::Lsr, 32, 0x8000_0000, false);
        assert_eq!((result.value, result.carry), (0, true));
        let result = reg(ShiftKind::Lsr, 100, u32::MAX, true);
        assert_eq!((result.value, result.carry), (0, false));

        let result = reg(ShiftKind::Asr, 64, 0x8000_0000, false);
        assert_eq!((result.value, result.carry), (0xFFFF_FFFF, true));

        // ROR reduces modulo 32; exact multiples behave like ROR #32.
        let result = reg(ShiftKind::Ror, 36, 0xF000_000F, false);
        assert_eq!(result.value, 0xFF00_0000);
        let result = reg(ShiftKind::Ror, 32, 0x8000_0001, false);
        assert_eq!((result.value, result.carry), (0x8000_0001, true));
    }

    #[test]
    fn ror_rotates() {
        let result = imm(ShiftKind::Ror, 4, 0x0000_00AB, false);
        assert_eq!(result.value, 0xB000_000A);
        assert!(result.carry); // bit 3 of 0xB was set
    }

    #[test]
    fn addition_carry_and_overflow() {
        let result = add(u32::MAX, 1);
        assert_eq!(result.value, 0);
        assert!(result.carry);
        assert!(!result.overflow);

        let result = add(0x7FFF_FFFF, 1);
        assert_eq!(result.value, 0x8000_0000);
        assert!(!result.carry);
        assert!(result.overflow);
    }

    #[test]
    fn subtraction_carry_is_not_borrow() {
        // 5 - 3: no borrow, carry set.
        let result = sub(5, 3);
        assert_eq!(result.value, 2);
        assert!(result.carry);

        // 3 - 5: borrow, carry clear.
        let result = sub(3, 5);
        assert_eq!(result.value, -2_i32 as u32);
        assert!(!result.carry);

        // Equal operands: carry set, zero result.
        let result = sub(7, 7);
        assert_eq!(result.value, 0);
        assert!(result.carry);
    }

    #[test]
    fn subtraction_overflow() {
        let result = sub(0x8000_0000, 1);
        assert_eq!(result.value, 0x7FFF_FFFF);
        assert!(result.overflow);

        let result = sub(0x7FFF_FFFF, 0xFFFF_FFFF);
        assert!(result.overflow);
    }

    #[test]
    fn adc_chains_the_carry() {
        let result = adc(u32::MAX, 0, true);
        assert_eq!(result.value, 0);
        assert!(result.carry);

        let result = adc(1, 2, true);
        assert_eq!(result.value, 4);
        assert!(!result.carry);
    }

    #[test]
    fn sbc_subtracts_the_inverted_carry() {
        // Carry set: plain subtraction.
        let result = sbc(10, 4, true);
        assert_eq!(result.value, 6);
        assert!(result.carry);

        // Carry clear: one extra comes off.
        let result = sbc(10, 4, false);
        assert_eq!(result.value, 5);
        assert!(result.carry);

        let result = sbc(0, 0, false);
        assert_eq!(result.value, u32::MAX);
        assert!(!result.carry);
    }
}
