use bitfield::bitfield;

use crate::memory::address::CRC;
use crate::{impl_register, impl_to_from_u32};

bitfield! {
    /// SPI CRC status. The flags live in byte 2 and the enables in byte 3,
    /// both are accessed as single bytes by the event decoder.
    pub struct CrcRegister(u32);
    impl Debug;
    u8;
    pub u16, crc, _: 15, 0;
    _crcerrif, _set_crcerrif: 16;
    _ferrif, _set_ferrif: 17;
    pub crcerrie, set_crcerrie: 24;
    pub ferrie, set_ferrie: 25;
}

impl CrcRegister {
    /// Byte holding CRCERRIF and FERRIF
    pub const FLAGS_ADDRESS: u16 = CRC + 2;
    /// Byte holding CRCERRIE and FERRIE
    pub const ENABLES_ADDRESS: u16 = CRC + 3;

    pub fn crcerrif(&self) -> bool {
        self._crcerrif()
    }

    pub fn clear_crcerrif(&mut self) {
        self._set_crcerrif(false)
    }

    pub fn ferrif(&self) -> bool {
        self._ferrif()
    }

    pub fn clear_ferrif(&mut self) {
        self._set_ferrif(false)
    }
}

impl_to_from_u32!(CrcRegister);
impl_register!(CrcRegister, CRC);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_register_fields() {
        let mut reg = CrcRegister::from(0x0103_BEEF);

        assert_eq!(reg.crc(), 0xBEEF);
        assert!(reg.crcerrif());
        assert!(reg.ferrif());
        assert!(reg.crcerrie());
        assert!(!reg.ferrie());

        reg.clear_ferrif();
        assert!(!reg.ferrif());
        assert_eq!(u32::from(reg), 0x0101_BEEF);
    }
}
