//! Small decode enums shared by the ARM and Thumb instruction sets.

/// Access width of a data transfer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReadWriteKind {
    #[default]
    Word,
    Byte,
}

impl From<bool> for ReadWriteKind {
    fn from(bit: bool) -> Self {
        if bit { Self::Byte } else { Self::Word }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStoreKind {
    Store,
    Load,
}

impl From<bool> for LoadStoreKind {
    fn from(bit: bool) -> Self {
        if bit { Self::Load } else { Self::Store }
    }
}

/// Whether the offset applies before or after the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexing {
    Post,
    Pre,
}

impl From<bool> for Indexing {
    fn from(bit: bool) -> Self {
        if bit { Self::Pre } else { Self::Post }
    }
}

/// Whether the offset is added to or subtracted from the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offsetting {
    Down,
    Up,
}

impl From<bool> for Offsetting {
    fn from(bit: bool) -> Self {
        if bit { Self::Up } else { Self::Down }
    }
}

/// Barrel shifter operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl From<u32> for ShiftKind {
    fn from(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Self::Lsl,
            1 => Self::Lsr,
            2 => Self::Asr,
            _ => Self::Ror,
        }
    }
}

impl std::fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Ror => f.write_str("ROR"),
        }
    }
}
