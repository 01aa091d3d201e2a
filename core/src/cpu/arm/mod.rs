//! The 32-bit ARM instruction set.
//!
//! Every instruction carries a condition code in bits 28-31, tested
//! before execution. Bits 25-27 select the broad format; the decoder in
//! [`instructions`] narrows overlapping encodings in priority order
//! (BX and the multiplies hide inside the data-processing space, the
//! PSR transfers inside the compare opcodes).
//!
//! - [`instructions`] - decoding (`From<u32>`)
//! - [`operations`] - execution against the core
//! - [`alu`] - barrel shifter and flag arithmetic

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod alu;

#[allow(clippy::cast_possible_truncation)]
pub mod instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod operations;
