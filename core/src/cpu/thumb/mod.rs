//! The 16-bit Thumb instruction set.
//!
//! A compressed re-encoding of a subset of ARM: most operations touch
//! only r0-r7 and set flags unconditionally; conditional execution
//! exists only in the conditional-branch format. r15 reads as the
//! executing instruction + 4.

#[allow(clippy::cast_possible_truncation)]
pub mod instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod operations;
