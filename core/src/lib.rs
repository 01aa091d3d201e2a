//! # Vermilion Emulation Core
//!
//! Game Boy Advance hardware emulation: the ARM7TDMI processor, the system
//! bus with its memory map, and the DMA controller. No UI, no host I/O.
//!
//! ## Module Overview
//!
//! | Module  | Description                                        |
//! |---------|----------------------------------------------------|
//! | [`gba`] | Top-level machine handle and host contract         |
//! | [`cpu`] | ARM7TDMI processor and both instruction sets       |
//! | [`bus`] | Memory bus: address decoding, I/O dispatch, DMA    |
//!
//! ## Quick Start
//!
//! ```
//! use vermilion_core::gba::Gba;
//!
//! // B 0x08000000 (branch-to-self at the cartridge entry point)
//! let rom: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xEA];
//! let mut gba = Gba::new(&[], &rom).unwrap();
//! gba.run_for(1_000);
//! ```
//!
//! The host drives the core through [`gba::Gba::run_for`] and observes it
//! through the register accessors; the PPU and audio backend are external
//! collaborators that raise interrupt lines via [`gba::Gba::raise_irq`]
//! and the blanking hooks.

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_lossless)]
mod bitwise;

#[allow(clippy::missing_panics_doc)]
#[allow(clippy::cast_possible_truncation)]
pub mod bus;

pub mod cpu;
pub mod gba;
