use serde::{Deserialize, Serialize};

/// CPU operating mode, bits 0-4 of a PSR.
///
/// The five exception modes each bank r13/r14 and carry an SPSR; FIQ
/// additionally banks r8-r12. System shares the User register set but is
/// privileged.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Mode {
    User = 0b10000,
    Fiq = 0b10001,
    Irq = 0b10010,
    Supervisor = 0b10011,
    Abort = 0b10111,
    Undefined = 0b11011,
    System = 0b11111,
}

impl Mode {
    /// Privileged modes may rewrite the CPSR control bits.
    #[must_use]
    pub fn is_privileged(self) -> bool {
        self != Self::User
    }

    /// User and System have no SPSR.
    #[must_use]
    pub fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }
}

impl From<Mode> for u32 {
    fn from(mode: Mode) -> Self {
        mode as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = InvalidModeBits;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits & 0b11111 {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            other => Err(InvalidModeBits(other)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidModeBits(pub u32);

impl std::fmt::Display for InvalidModeBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid CPU mode bits {:#07b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
        ] {
            assert_eq!(Mode::try_from(mode as u32), Ok(mode));
        }
    }

    #[test]
    fn invalid_bits_are_rejected() {
        assert_eq!(Mode::try_from(0), Err(InvalidModeBits(0)));
        assert_eq!(Mode::try_from(0b10100), Err(InvalidModeBits(0b10100)));
    }

    #[test]
    fn privilege_and_spsr() {
        assert!(!Mode::User.is_privileged());
        assert!(Mode::System.is_privileged());
        assert!(!Mode::System.has_spsr());
        assert!(Mode::Irq.has_spsr());
    }
}
