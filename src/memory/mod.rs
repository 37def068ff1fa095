pub mod chip;
pub mod controller;

/// Highest address reachable with the 12 address bits of an instruction
pub const MAX_ADDRESS: u16 = 0xFFF;

/// Base address of the chip's RAM segment. Used for verifying memory accesses
/// and calculating FIFO pointer addresses.
pub const RAM_BASE_ADDRESS: u32 = 0x400;

/// First address past the end of the chip's RAM segment (2 KiB)
pub const RAM_END_ADDRESS: u32 = 0xC00;

/// Calculates whether a RAM address range is valid without making any IO calls
pub fn is_valid_ram_address(address: u32, data_size: usize) -> bool {
    address >= RAM_BASE_ADDRESS && (address + data_size as u32) <= RAM_END_ADDRESS
}

/// Whether an address falls into message object RAM rather than SFR space.
/// The CRC instructions count their length in words inside RAM and in bytes
/// everywhere else.
pub fn is_ram_address(address: u16) -> bool {
    (RAM_BASE_ADDRESS..RAM_END_ADDRESS).contains(&(address as u32))
}

/// Represents an SFR register that has a single unique memory location
pub trait Register {
    const ADDRESS: u16;
}

/// Represents an SFR register who's structure is reused in several locations in memory
pub trait RepeatedRegister {
    type Index: Copy;

    fn address_for(index: Self::Index) -> u16;
}

/// SFR addresses of the CAN FD controller module and the chip level CRC
/// register
pub mod address {
    pub const CICON: u16 = 0x000;
    pub const CINBTCFG: u16 = 0x004;
    pub const CIDBTCFG: u16 = 0x008;
    pub const CITDC: u16 = 0x00C;
    pub const CIVEC: u16 = 0x018;
    pub const CIINT: u16 = 0x01C;
    /// Upper half of CiINT holding the interrupt enables
    pub const CIINTENABLE: u16 = 0x01E;
    pub const CIRXIF: u16 = 0x020;
    pub const CITXIF: u16 = 0x024;
    pub const CIRXOVIF: u16 = 0x028;
    pub const CITXATIF: u16 = 0x02C;
    pub const CITXREQ: u16 = 0x030;
    pub const CITREC: u16 = 0x034;
    pub const CIBDIAG0: u16 = 0x038;
    pub const CIBDIAG1: u16 = 0x03C;
    pub const CITEFCON: u16 = 0x040;
    pub const CITEFSTA: u16 = 0x044;
    pub const CITEFUA: u16 = 0x048;

    /// CiFIFOCON of channel 0, which is the transmit queue (CiTXQCON)
    pub const CIFIFOCON: u16 = 0x050;
    pub const CIFIFOSTA: u16 = 0x054;
    pub const CIFIFOUA: u16 = 0x058;
    /// Distance between the register groups of two consecutive channels
    pub const CIFIFO_OFFSET: u16 = 12;

    /// Filter control registers are byte addressed, one byte per filter
    pub const CIFLTCON: u16 = 0x1D0;
    pub const CIFLTOBJ: u16 = 0x1F0;
    pub const CIMASK: u16 = 0x1F4;
    pub const CIFILTER_OFFSET: u16 = 8;

    pub const CRC: u16 = 0xE08;
}

/// Register values after a power on or SPI reset, indexed by address / 4 for
/// the controller block 0x000..0x07C.
pub static CONTROLLER_RESET_VALUES: [u32; 32] = [
    // 0x000 - 0x00C
    0x0498_0760,
    0x003E_0F0F,
    0x000E_0303,
    0x0002_1000,
    // 0x010 - 0x01C
    0x0000_0000,
    0x0000_0000,
    0x4040_0040,
    0x0000_0000,
    // 0x020 - 0x02C
    0x0000_0000,
    0x0000_0000,
    0x0000_0000,
    0x0000_0000,
    // 0x030 - 0x03C
    0x0000_0000,
    0x0020_0000,
    0x0000_0000,
    0x0000_0000,
    // 0x040 - 0x04C
    0x0000_0400,
    0x0000_0000,
    0x0000_0000,
    0x0000_0000,
    // 0x050 - 0x05C
    0x0060_0400,
    0x0000_0000,
    0x0000_0000,
    0x0060_0400,
    // 0x060 - 0x06C
    0x0000_0000,
    0x0000_0000,
    0x0060_0400,
    0x0000_0000,
    // 0x070 - 0x07C
    0x0000_0000,
    0x0060_0400,
    0x0000_0000,
    0x0000_0000,
];

/// Reset value of a controller register, `None` outside the tabulated block
pub fn reset_value(address: u16) -> Option<u32> {
    if address % 4 != 0 {
        return None;
    }

    CONTROLLER_RESET_VALUES
        .get(address as usize / 4)
        .copied()
}
