use bitfield::{bitfield, Bit};

use crate::{impl_register, impl_to_from_u32};
use crate::memory::address::{CIINT, CIINTENABLE, CIRXIF, CIRXOVIF, CITXATIF, CITXIF, CIVEC};

use super::{fifo::FifoChannel, filter::FilterNumber};

/// Code used by every ICODE/TXCODE/RXCODE field when nothing is pending
const NO_INTERRUPT: u8 = 0b0100_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxInterruptFlagCode {
    NoInterrupt,
    FifoInterrupt(FifoChannel),
    Reserved,
}

impl From<u8> for RxInterruptFlagCode {
    fn from(value: u8) -> Self {
        match value {
            NO_INTERRUPT => Self::NoInterrupt,
            // The transmit queue can not receive
            0 => Self::Reserved,
            _ => FifoChannel::try_from(value).map_or(Self::Reserved, Self::FifoInterrupt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxInterruptFlagCode {
    NoInterrupt,
    /// Channel 0 is the transmit queue
    FifoInterrupt(FifoChannel),
    Reserved,
}

impl From<u8> for TxInterruptFlagCode {
    fn from(value: u8) -> Self {
        match value {
            NO_INTERRUPT => Self::NoInterrupt,
            _ => FifoChannel::try_from(value).map_or(Self::Reserved, Self::FifoInterrupt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptFlagCode {
    NoInterrupt,
    TransmitAttemptInterrupt,
    TransmitEventFifoInterrupt,
    InvalidMessageOccurred,
    OperationModeChangeOccurred,
    TbcOverflow,
    RxTxMabOverOrUnderflow,
    AddressErrorInterrupt,
    ReceiveFifoOverflowInterrupt,
    WakeUpInterrupt,
    ErrorInterrupt,
    /// Channel 0 is the transmit queue
    FifoInterrupt(FifoChannel),
    Reserved,
}

impl From<u8> for InterruptFlagCode {
    fn from(value: u8) -> Self {
        match value {
            0..=31 => FifoChannel::try_from(value).map_or(Self::Reserved, Self::FifoInterrupt),
            NO_INTERRUPT => Self::NoInterrupt,
            0x41 => Self::ErrorInterrupt,
            0x42 => Self::WakeUpInterrupt,
            0x43 => Self::ReceiveFifoOverflowInterrupt,
            0x44 => Self::AddressErrorInterrupt,
            0x45 => Self::RxTxMabOverOrUnderflow,
            0x46 => Self::TbcOverflow,
            0x47 => Self::OperationModeChangeOccurred,
            0x48 => Self::InvalidMessageOccurred,
            0x49 => Self::TransmitEventFifoInterrupt,
            0x4A => Self::TransmitAttemptInterrupt,
            _ => Self::Reserved,
        }
    }
}

bitfield! {
    pub struct InterruptCodeRegister(u32);
    impl Debug;
    u8;
    _icode, _: 6, 0;
    _filhit, _: 12, 8;
    _txcode, _: 22, 16;
    _rxcode, _: 30, 24;
}

impl InterruptCodeRegister {
    /// Gets the generic interrupt code. Useful for determining which interrupt
    /// was raised when the nINT pin is triggered.
    pub fn generic_code(&self) -> InterruptFlagCode {
        self._icode().into()
    }

    /// Gets the number of the filter that matched the last received message.
    /// Only meaningful while an RX interrupt is pending.
    pub fn filter_hit(&self) -> Option<FilterNumber> {
        FilterNumber::try_from(self._filhit()).ok()
    }

    pub fn tx_code(&self) -> TxInterruptFlagCode {
        self._txcode().into()
    }

    pub fn rx_code(&self) -> RxInterruptFlagCode {
        self._rxcode().into()
    }
}

impl_to_from_u32!(InterruptCodeRegister);
impl_register!(InterruptCodeRegister, CIVEC);

bitfield! {
    /// CiINT. The flags are the low half word and the enables the high half
    /// word, each matching the bit layout of the module event set.
    pub struct InterruptRegister(u32);
    impl Debug;
    u16;
    pub flags, _: 15, 0;
    pub enables, _: 31, 16;
}

impl InterruptRegister {
    /// Half word holding the HS/C interrupt flags
    pub const FLAGS_ADDRESS: u16 = CIINT;
    /// Half word holding the interrupt enables
    pub const ENABLES_ADDRESS: u16 = CIINTENABLE;
}

impl_to_from_u32!(InterruptRegister);
impl_register!(InterruptRegister, CIINT);

/// Registers holding one read only flag per channel
macro_rules! channel_flags_register {
    ($(#[$meta:meta])* $ident:ident, $address:expr) => {
        bitfield! {
            $(#[$meta])*
            pub struct $ident(u32);
            impl Debug;
            u32;
            pub flags, _: 31, 0;
        }

        impl $ident {
            pub fn is_set(&self, channel: FifoChannel) -> bool {
                self.bit(u8::from(channel) as usize)
            }
        }

        impl_to_from_u32!($ident);
        impl_register!($ident, $address);
    };
}

channel_flags_register!(
    /// CiRXIF, OR of the per FIFO receive flags
    RxInterruptStatusRegister,
    CIRXIF
);
channel_flags_register!(
    /// CiRXOVIF
    RxOverflowInterruptStatusRegister,
    CIRXOVIF
);
channel_flags_register!(
    /// CiTXIF, bit 0 is the transmit queue
    TxInterruptStatusRegister,
    CITXIF
);
channel_flags_register!(
    /// CiTXATIF, bit 0 is the transmit queue
    TxAttemptInterruptStatusRegister,
    CITXATIF
);
