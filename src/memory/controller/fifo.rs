use arbitrary_int::{u5, Number};
use bitfield::bitfield;
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::memory::address::{
    CIFIFOCON, CIFIFOSTA, CIFIFOUA, CIFIFO_OFFSET, CITEFCON, CITEFSTA, CITEFUA,
};
use crate::memory::{RepeatedRegister, RAM_BASE_ADDRESS};
use crate::{impl_register, impl_to_from_u32, software_clearable, software_settable};

pub const HIGHEST_FIFO_PRIORITY: u5 = u5::MAX;
pub const LOWEST_FIFO_PRIORITY: u5 = u5::MIN;

/// Largest number of message objects a single FIFO can hold
pub const MAX_FIFO_DEPTH: u8 = 32;

/// Message queue channels. Channel 0 is the transmit queue, the other 31
/// channels can each be configured for transmission or reception.
#[derive(Debug, Clone, Copy, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FifoChannel {
    TxQueue = 0,
    Fifo1 = 1,
    Fifo2 = 2,
    Fifo3 = 3,
    Fifo4 = 4,
    Fifo5 = 5,
    Fifo6 = 6,
    Fifo7 = 7,
    Fifo8 = 8,
    Fifo9 = 9,
    Fifo10 = 10,
    Fifo11 = 11,
    Fifo12 = 12,
    Fifo13 = 13,
    Fifo14 = 14,
    Fifo15 = 15,
    Fifo16 = 16,
    Fifo17 = 17,
    Fifo18 = 18,
    Fifo19 = 19,
    Fifo20 = 20,
    Fifo21 = 21,
    Fifo22 = 22,
    Fifo23 = 23,
    Fifo24 = 24,
    Fifo25 = 25,
    Fifo26 = 26,
    Fifo27 = 27,
    Fifo28 = 28,
    Fifo29 = 29,
    Fifo30 = 30,
    Fifo31 = 31,
}

impl FifoChannel {
    /// Address of CiFIFOCONm, the first of the channel's three registers
    pub fn control_address(self) -> u16 {
        CIFIFOCON + CIFIFO_OFFSET * u8::from(self) as u16
    }

    pub fn status_address(self) -> u16 {
        CIFIFOSTA + CIFIFO_OFFSET * u8::from(self) as u16
    }

    pub fn user_address_address(self) -> u16 {
        CIFIFOUA + CIFIFO_OFFSET * u8::from(self) as u16
    }

    /// Bit of this channel in the CiTXREQ / CiRXIF / CiTXIF style registers
    pub fn mask(self) -> u32 {
        1 << u8::from(self)
    }
}

bitflags! {
    /// Self clearing command bits in byte 1 of CiFIFOCONm and CiTEFCON.
    /// Writing just this byte leaves the configuration in byte 0 and bytes 2..4
    /// untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FifoCommand: u8 {
        /// Increment the head/tail pointer
        const UINC = 1 << 0;
        /// Request transmission of all loaded objects
        const TXREQ = 1 << 1;
        /// Reset the FIFO
        const FRESET = 1 << 2;
    }
}

bitfield! {
    pub struct UserAddressRegister(u32);
    u32;
    pub fifoua, _: 31, 0;
}

impl_to_from_u32!(UserAddressRegister);

impl UserAddressRegister {
    /// Absolute RAM address of the next message object. Some silicon
    /// revisions report the offset in words rather than bytes.
    ///
    /// `None` when the register holds an offset that overflows the 32 bit
    /// address, which only a corrupt read produces.
    pub fn ram_address(&self) -> Option<u32> {
        let offset = self.fifoua();

        #[cfg(feature = "user-address-times-four")]
        let offset = offset.checked_mul(4)?;

        offset.checked_add(RAM_BASE_ADDRESS)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UserAddressKind {
    TxEventFifo,
    Channel(FifoChannel),
}

impl RepeatedRegister for UserAddressRegister {
    type Index = UserAddressKind;

    fn address_for(index: Self::Index) -> u16 {
        match index {
            UserAddressKind::TxEventFifo => CITEFUA,
            UserAddressKind::Channel(channel) => channel.user_address_address(),
        }
    }
}

bitfield! {
    pub struct TxEventFifoControlRegister(u32);
    impl Debug;
    u8;
    pub tefneie, set_tefneie: 0;
    pub tefhie, set_tefhie: 1;
    pub teffie, set_teffie: 2;
    pub tefovie, set_tefovie: 3;
    pub teftsen, set_teftsen: 5;

    _uinc, _set_uinc: 8;
    _freset, _set_freset: 10;

    _fsize, _set_fsize: 28, 24;
}

impl TxEventFifoControlRegister {
    software_settable!(uinc, set_uinc);
    software_settable!(freset, set_freset);

    /// Byte holding UINC and FRESET
    pub const COMMAND_ADDRESS: u16 = CITEFCON + 1;

    pub fn fifo_size(&self) -> u8 {
        self._fsize() + 1
    }

    /// Valid depths are 1..=32, anything outside is clamped
    pub fn set_fifo_size(&mut self, size: u8) {
        self._set_fsize(size.clamp(1, MAX_FIFO_DEPTH) - 1);
    }
}

impl_register!(TxEventFifoControlRegister, CITEFCON);
impl_to_from_u32!(TxEventFifoControlRegister);

bitfield! {
    pub struct TxEventFifoStatusRegister(u32);
    impl Debug;
    u8;
    pub tefneif, _: 0;
    pub tefhif, _: 1;
    pub teffif, _: 2;
    _tefovif, _set_tefovif: 3;
    pub flags, _: 7, 0;
}

impl_register!(TxEventFifoStatusRegister, CITEFSTA);
impl_to_from_u32!(TxEventFifoStatusRegister);

impl TxEventFifoStatusRegister {
    software_clearable!(tefovif, clear_tefovif);
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RetransmissionAttempts {
    Disabled = 0,
    ThreeRetries = 1,
    #[default]
    #[num_enum(alternatives = [3])]
    UnlimitedRetries = 2,
}

/// Payload capacity of every message object in a FIFO
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PayloadSize {
    #[default]
    Bytes8 = 0,
    Bytes12 = 1,
    Bytes16 = 2,
    Bytes20 = 3,
    Bytes24 = 4,
    Bytes32 = 5,
    Bytes48 = 6,
    Bytes64 = 7,
}

impl PayloadSize {
    pub fn num_bytes(&self) -> usize {
        match self {
            Self::Bytes8 => 8,
            Self::Bytes12 => 12,
            Self::Bytes16 => 16,
            Self::Bytes20 => 20,
            Self::Bytes24 => 24,
            Self::Bytes32 => 32,
            Self::Bytes48 => 48,
            Self::Bytes64 => 64,
        }
    }
}

bitfield! {
    /// CiFIFOCONm. For channel 0 this is CiTXQCON, which shares the layout
    /// with TXEN hardwired to 1 and no receive specific bits.
    #[derive(Clone, Copy)]
    pub struct FifoControlRegister(u32);
    impl Debug;
    u8;
    pub tfnrfnie, set_tfnrfnie: 0;
    pub tfhrfhie, set_tfhrfhie: 1;
    pub tferffie, set_tferffie: 2;
    pub rxovie, set_rxovie: 3;
    pub txatie, set_txatie: 4;
    pub rxtsen, set_rxtsen: 5;
    pub rtren, set_rtren: 6;
    pub txen, set_txen: 7;
    _uinc, _set_uinc: 8;
    pub txreq, set_txreq: 9;
    _freset, _set_freset: 10;
    _txpri, _set_txpri: 20, 16;
    _txat, _set_txat: 22, 21;
    _fsize, _set_fsize: 28, 24;
    _plsize, _set_plsize: 31, 29;
}

impl_to_from_u32!(FifoControlRegister);

impl FifoControlRegister {
    software_settable!(uinc, set_uinc);
    software_settable!(freset, set_freset);

    pub fn txpri(&self) -> u5 {
        u5::new(self._txpri())
    }

    pub fn set_txpri(&mut self, priority: u5) {
        self._set_txpri(priority.value())
    }

    pub fn retransmission_attempts(&self) -> RetransmissionAttempts {
        RetransmissionAttempts::try_from(self._txat())
            .unwrap_or(RetransmissionAttempts::UnlimitedRetries)
    }

    pub fn set_retransmission_attempts(&mut self, value: RetransmissionAttempts) {
        self._set_txat(value.into())
    }

    pub fn fifo_size(&self) -> u8 {
        self._fsize() + 1
    }

    /// Valid depths are 1..=32, anything outside is clamped
    pub fn set_fifo_size(&mut self, size: u8) {
        self._set_fsize(size.clamp(1, MAX_FIFO_DEPTH) - 1);
    }

    pub fn payload_size(&self) -> PayloadSize {
        PayloadSize::try_from(self._plsize()).unwrap_or(PayloadSize::Bytes8)
    }

    pub fn set_payload_size(&mut self, size: PayloadSize) {
        self._set_plsize(size.into());
    }
}

impl RepeatedRegister for FifoControlRegister {
    type Index = FifoChannel;

    fn address_for(channel: Self::Index) -> u16 {
        channel.control_address()
    }
}

bitfield! {
    pub struct FifoStatusRegister(u32);
    impl Debug;
    u8;
    pub tfnrfnif, _: 0;
    pub tfhrfhif, _: 1;
    pub tferffif, _: 2;
    _rxovif, _set_rxovif: 3;
    _txatif, _set_txatif: 4;
    _txerr, _set_txerr: 5;
    _txlarb, _set_txlarb: 6;
    _txabt, _set_txabt: 7;
    pub flags, _: 7, 0;
    pub fifoci, _: 12, 8;
}

impl_to_from_u32!(FifoStatusRegister);

impl FifoStatusRegister {
    software_clearable!(rxovif, clear_rxovif);
    software_clearable!(txatif, clear_txatif);
    software_clearable!(txerr, clear_txerr);
    software_clearable!(txlarb, clear_txlarb);
    software_clearable!(txabt, clear_txabt);
}

impl RepeatedRegister for FifoStatusRegister {
    type Index = FifoChannel;

    fn address_for(channel: Self::Index) -> u16 {
        channel.status_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{reset_value, RAM_BASE_ADDRESS, RAM_END_ADDRESS};

    #[test]
    fn channel_addresses() {
        assert_eq!(FifoChannel::TxQueue.control_address(), 0x050);
        assert_eq!(FifoChannel::TxQueue.status_address(), 0x054);
        assert_eq!(FifoChannel::TxQueue.user_address_address(), 0x058);
        assert_eq!(FifoChannel::Fifo1.control_address(), 0x05C);
        assert_eq!(FifoChannel::Fifo31.control_address(), 0x050 + 12 * 31);
        assert_eq!(FifoChannel::Fifo31.user_address_address(), 0x1CC);

        assert_eq!(
            UserAddressRegister::address_for(UserAddressKind::TxEventFifo),
            0x048
        );
        assert_eq!(FifoStatusRegister::address_for(FifoChannel::Fifo2), 0x06C);
    }

    #[test]
    fn channel_from_index() {
        assert_eq!(FifoChannel::try_from(0u8), Ok(FifoChannel::TxQueue));
        assert_eq!(FifoChannel::try_from(17u8), Ok(FifoChannel::Fifo17));
        assert!(FifoChannel::try_from(32u8).is_err());
        assert_eq!(FifoChannel::Fifo3.mask(), 0b1000);
    }

    #[test]
    fn control_register_fields() {
        let mut con = FifoControlRegister::from(reset_value(0x05C).unwrap_or_default());

        assert!(con.freset());
        assert_eq!(con.fifo_size(), 1);
        assert_eq!(con.payload_size(), PayloadSize::Bytes8);
        assert_eq!(con.retransmission_attempts(), RetransmissionAttempts::UnlimitedRetries);

        con.set_fifo_size(8);
        con.set_payload_size(PayloadSize::Bytes64);
        con.set_txpri(u5::new(31));
        con.set_txen(true);

        assert_eq!(con.fifo_size(), 8);
        assert_eq!(con.payload_size().num_bytes(), 64);
        assert_eq!(con.txpri(), HIGHEST_FIFO_PRIORITY);
        assert_eq!(u32::from(con) >> 24, 0b1110_0111);

        con.set_fifo_size(0);
        assert_eq!(con.fifo_size(), 1);
        con.set_fifo_size(200);
        assert_eq!(con.fifo_size(), 32);
    }

    #[test]
    fn command_byte_layout() {
        let mut con = FifoControlRegister::from(0);
        con.set_uinc();
        con.set_txreq(true);
        con.set_freset();

        let byte1 = (u32::from(con) >> 8) as u8;
        assert_eq!(
            byte1,
            (FifoCommand::UINC | FifoCommand::TXREQ | FifoCommand::FRESET).bits()
        );
    }

    #[test]
    fn user_address_translation() {
        let ua = UserAddressRegister::from(0x10);

        #[cfg(not(feature = "user-address-times-four"))]
        assert_eq!(ua.ram_address(), Some(0x410));
        #[cfg(feature = "user-address-times-four")]
        assert_eq!(ua.ram_address(), Some(0x440));

        assert!(ua.ram_address().is_some_and(|address| address < RAM_END_ADDRESS));

        assert_eq!(UserAddressRegister::from(u32::MAX).ram_address(), None);
        assert_eq!(
            UserAddressRegister::from(u32::MAX - RAM_BASE_ADDRESS + 1).ram_address(),
            None
        );
    }

    #[test]
    fn payload_sizes_are_monotonic() {
        let sizes: std::vec::Vec<usize> = (0u8..8)
            .filter_map(|b| PayloadSize::try_from(b).ok())
            .map(|p| p.num_bytes())
            .collect();

        assert_eq!(sizes, [8, 12, 16, 20, 24, 32, 48, 64]);
    }
}
