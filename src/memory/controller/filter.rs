use bitfield::bitfield;
use embedded_can::Id;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{impl_repeated_register, impl_to_from_u32};
use crate::memory::address::{CIFILTER_OFFSET, CIFLTCON, CIFLTOBJ, CIMASK};
use crate::message::split_id;

use super::fifo::FifoChannel;

#[derive(Debug, Clone, Copy, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FilterNumber {
    Filter0 = 0,
    Filter1 = 1,
    Filter2 = 2,
    Filter3 = 3,
    Filter4 = 4,
    Filter5 = 5,
    Filter6 = 6,
    Filter7 = 7,
    Filter8 = 8,
    Filter9 = 9,
    Filter10 = 10,
    Filter11 = 11,
    Filter12 = 12,
    Filter13 = 13,
    Filter14 = 14,
    Filter15 = 15,
    Filter16 = 16,
    Filter17 = 17,
    Filter18 = 18,
    Filter19 = 19,
    Filter20 = 20,
    Filter21 = 21,
    Filter22 = 22,
    Filter23 = 23,
    Filter24 = 24,
    Filter25 = 25,
    Filter26 = 26,
    Filter27 = 27,
    Filter28 = 28,
    Filter29 = 29,
    Filter30 = 30,
    Filter31 = 31,
}

impl FilterNumber {
    /// The CiFLTCONm registers pack four filters, one byte each, so every
    /// filter is addressed by its own byte.
    pub fn control_address(self) -> u16 {
        CIFLTCON + u8::from(self) as u16
    }
}

bitfield! {
    /// One filter's byte of CiFLTCONm
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FilterControl(u8);
    impl Debug;
    u8;
    _bp, _set_bp: 4, 0;
    pub flten, set_flten: 7;
}

impl FilterControl {
    pub fn new(channel: FifoChannel, enabled: bool) -> Self {
        let mut control = Self(0);
        control.set_buffer_pointer(channel);
        control.set_flten(enabled);
        control
    }

    /// FIFO that receives frames accepted by this filter
    pub fn buffer_pointer(&self) -> FifoChannel {
        FifoChannel::try_from(self._bp()).unwrap_or(FifoChannel::TxQueue)
    }

    pub fn set_buffer_pointer(&mut self, channel: FifoChannel) {
        self._set_bp(channel.into())
    }
}

impl From<FilterControl> for u8 {
    fn from(control: FilterControl) -> Self {
        control.0
    }
}

impl From<u8> for FilterControl {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

bitfield! {
    pub struct FilterObjectRegister(u32);
    impl Debug;
    u8;
    pub u16, sid, set_sid: 10, 0;
    pub u32, eid, set_eid: 28, 11;
    pub sid11, set_sid11: 29;
    pub exide, set_exide: 30;
}

impl FilterObjectRegister {
    /// Filter bits for `id`. Extended identifiers also set EXIDE, so only
    /// extended frames match.
    pub fn for_id(id: Id) -> Self {
        let (sid, eid) = split_id(id);
        let mut register = Self(0);

        register.set_sid(sid);
        register.set_eid(eid);
        register.set_exide(matches!(id, Id::Extended(_)));
        register
    }
}

impl_to_from_u32!(FilterObjectRegister);

impl_repeated_register!(FilterObjectRegister, FilterNumber, CIFLTOBJ, CIFILTER_OFFSET);

bitfield! {
    pub struct MaskRegister(u32);
    impl Debug;
    u8;
    pub u16, msid, set_msid: 10, 0;
    pub u32, meid, set_meid: 28, 11;
    pub msid11, set_msid11: 29;
    pub mide, set_mide: 30;
}

impl MaskRegister {
    /// Mask bits for `mask`. With `match_ide` set only frames whose IDE bit
    /// equals the filter's EXIDE are accepted.
    pub fn for_id(mask: Id, match_ide: bool) -> Self {
        let (sid, eid) = split_id(mask);
        let mut register = Self(0);

        register.set_msid(sid);
        register.set_meid(eid);
        register.set_mide(match_ide);
        register
    }
}

impl_to_from_u32!(MaskRegister);

impl_repeated_register!(MaskRegister, FilterNumber, CIMASK, CIFILTER_OFFSET);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RepeatedRegister;
    use embedded_can::{ExtendedId, StandardId};

    #[test]
    fn filter_addresses() {
        assert_eq!(FilterNumber::Filter0.control_address(), 0x1D0);
        assert_eq!(FilterNumber::Filter5.control_address(), 0x1D5);
        assert_eq!(FilterObjectRegister::address_for(FilterNumber::Filter0), 0x1F0);
        assert_eq!(MaskRegister::address_for(FilterNumber::Filter0), 0x1F4);
        assert_eq!(FilterObjectRegister::address_for(FilterNumber::Filter31), 0x2E8);
        assert_eq!(MaskRegister::address_for(FilterNumber::Filter31), 0x2EC);
    }

    #[test]
    fn control_byte() {
        let control = FilterControl::new(FifoChannel::Fifo2, true);

        assert_eq!(u8::from(control), 0x82);
        assert_eq!(control.buffer_pointer(), FifoChannel::Fifo2);
        assert!(control.flten());
    }

    #[test]
    fn extended_filter_bits() {
        let id = ExtendedId::new(0x1ABC_DEF0 & ExtendedId::MAX.as_raw()).unwrap();
        let filter = FilterObjectRegister::for_id(Id::Extended(id));

        assert_eq!(filter.sid(), id.standard_id().as_raw());
        assert_eq!(filter.eid(), id.as_raw() & 0x3FFFF);
        assert!(filter.exide());

        let std = StandardId::new(0x123).unwrap();
        let mask = MaskRegister::for_id(Id::Standard(std), true);
        assert_eq!(mask.msid(), 0x123);
        assert_eq!(mask.meid(), 0);
        assert!(mask.mide());
    }
}
