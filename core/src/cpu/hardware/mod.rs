//! Memory-mapped hardware blocks reachable through the [`bus`](crate::bus).
//!
//! Each submodule owns the raw register words for one I/O cluster; the bus
//! applies the per-address read/write masks and byte dispatch.

pub mod dma;
pub mod internal_memory;
pub mod interrupt_control;
pub mod keypad;
pub mod lcd;
pub mod serial;
pub mod timers;
