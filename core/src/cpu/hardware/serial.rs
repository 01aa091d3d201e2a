use serde::{Deserialize, Serialize};

/// Serial/link-port register block. Link-cable emulation is out of scope;
/// the registers are plain storage so ROM probes read back what they
/// wrote instead of tripping over a hole in the map.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Serial {
    // SIODATA32 in normal mode, SIOMULTI0/1 in multiplayer mode.
    pub data32: u32,
    pub multi_data2: u16,
    pub multi_data3: u16,
    pub control: u16,
    // SIOMLT_SEND / SIODATA8.
    pub data8: u16,
    pub mode_select: u16,
    pub joy_control: u16,
    pub joy_receive: u32,
    pub joy_transmit: u32,
    pub joy_status: u16,
}
