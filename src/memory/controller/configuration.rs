use num_enum::{IntoPrimitive, TryFromPrimitive, TryFromPrimitiveError};

use bitfield::bitfield;

use crate::memory::address::{CICON, CIDBTCFG, CINBTCFG, CITDC};
use crate::{impl_register, impl_to_from_u32};

/// Number of data bytes (in bits) matched against the EID filter bits of
/// standard frames (DeviceNet filtering)
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataBits {
    Bits1 = 1,
    Bits2 = 2,
    Bits3 = 3,
    Bits4 = 4,
    Bits5 = 5,
    Bits6 = 6,
    Bits7 = 7,
    Bits8 = 8,
    Bits9 = 9,
    Bits10 = 10,
    Bits11 = 11,
    Bits12 = 12,
    Bits13 = 13,
    Bits14 = 14,
    Bits15 = 15,
    Bits16 = 16,
    Bits17 = 17,
    Bits18 = 18,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WakeupFilterTime {
    T00Filter = 0,
    T01Filter = 1,
    T10Filter = 2,
    #[default]
    T11Filter = 3,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OperationMode {
    NormalCanFD = 0,
    Sleep = 1,
    InternalLoopback = 2,
    ListenOnly = 3,
    Configuration = 4,
    ExternalLoopback = 5,
    NormalCan2 = 6,
    Restricted = 7,
}

impl OperationMode {
    /// Decodes a 3 bit OPMOD/REQOP field, upper bits are ignored
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::NormalCanFD,
            1 => Self::Sleep,
            2 => Self::InternalLoopback,
            3 => Self::ListenOnly,
            4 => Self::Configuration,
            5 => Self::ExternalLoopback,
            6 => Self::NormalCan2,
            _ => Self::Restricted,
        }
    }
}

/// All times are in arbitration bit times
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum InterTransmissionDelay {
    #[default]
    NoDelay = 0,
    Delay2 = 1,
    Delay4 = 2,
    Delay8 = 3,
    Delay16 = 4,
    Delay32 = 5,
    Delay64 = 6,
    Delay128 = 7,
    Delay256 = 8,
    Delay512 = 9,
    Delay1024 = 10,
    Delay2048 = 11,
    #[num_enum(alternatives = [13, 14, 15])]
    Delay4096 = 12,
}

bitfield! {
    pub struct CanControlRegister(u32);
    impl Debug;
    u8;
    _dncnt, _set_dncnt: 4, 0;
    pub isocrcen, set_isocrcen: 5;
    pub pxedis, set_pxedis: 6;
    pub wakfil, set_wakfil: 8;
    _wft, _set_wft: 10, 9;
    pub busy, _: 11;
    pub brsdis, set_brsdis: 12;
    pub rtxat, set_rtxat: 16;
    pub esigm, set_esigm: 17;
    pub serr2lom, set_serr2lom: 18;
    pub stef, set_stef: 19;
    pub txqen, set_txqen: 20;
    _opmod, _: 23, 21;
    _reqop, _set_reqop: 26, 24;
    pub abat, set_abat: 27;
    _txbws, _set_txbws: 31, 28;
}

impl_to_from_u32!(CanControlRegister);
impl_register!(CanControlRegister, CICON);

impl CanControlRegister {
    /// Byte holding OPMOD (bits 7:5)
    pub const OPMOD_ADDRESS: u16 = CICON + 2;
    /// Byte holding REQOP (bits 2:0), ABAT (bit 3) and TXBWS (bits 7:4)
    pub const REQOP_ADDRESS: u16 = CICON + 3;

    pub const ABAT_MASK: u8 = 0x08;

    pub fn dncnt(&self) -> Option<DataBits> {
        DataBits::try_from(self._dncnt()).ok()
    }

    /// `None` disables DeviceNet filtering
    pub fn set_dncnt(&mut self, bits: Option<DataBits>) {
        self._set_dncnt(bits.map_or(0, u8::from))
    }

    pub fn wft(&self) -> Result<WakeupFilterTime, TryFromPrimitiveError<WakeupFilterTime>> {
        WakeupFilterTime::try_from(self._wft())
    }

    pub fn set_wft(&mut self, filter: WakeupFilterTime) {
        self._set_wft(filter.into())
    }

    pub fn opmode(&self) -> OperationMode {
        OperationMode::from_bits(self._opmod())
    }

    pub fn reqop(&self) -> OperationMode {
        OperationMode::from_bits(self._reqop())
    }

    pub fn set_reqop(&mut self, mode: OperationMode) {
        self._set_reqop(mode.into());
    }

    pub fn txbws(&self) -> InterTransmissionDelay {
        InterTransmissionDelay::try_from(self._txbws()).unwrap_or(InterTransmissionDelay::Delay4096)
    }

    pub fn set_txbws(&mut self, delay: InterTransmissionDelay) {
        self._set_txbws(delay.into());
    }
}

bitfield! {
    pub struct NominalBitTimeConfigurationRegister(u32);
    impl Debug;
    u8;
    pub sjw, set_sjw: 6, 0;
    pub tseg2, set_tseg2: 14, 8;
    pub tseg1, set_tseg1: 23, 16;
    pub brp, set_brp: 31, 24;
}

impl_to_from_u32!(NominalBitTimeConfigurationRegister);
impl_register!(NominalBitTimeConfigurationRegister, CINBTCFG);

bitfield! {
    pub struct DataBitTimeConfigurationRegister(u32);
    impl Debug;
    u8;
    pub sjw, set_sjw: 3, 0;
    pub tseg2, set_tseg2: 11, 8;
    pub tseg1, set_tseg1: 20, 16;
    pub brp, set_brp: 31, 24;
}

impl_to_from_u32!(DataBitTimeConfigurationRegister);
impl_register!(DataBitTimeConfigurationRegister, CIDBTCFG);

/// Transmitter delay compensation, which places the secondary sample point
/// used during the data phase
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SecondarySamplePointMode {
    Off = 0,
    Manual = 1,
    #[default]
    #[num_enum(alternatives = [3])]
    Auto = 2,
}

bitfield! {
    #[derive(Clone, Copy)]
    pub struct TransmitterDelayCompensationRegister(u32);
    impl Debug;
    u8;
    pub tdcv, set_tdcv: 5, 0;
    pub tdco, set_tdco: 13, 8;
    _tdcmod, _set_tdcmod: 17, 16;
    pub sid11en, set_sid11en: 24;
    pub edgflten, set_edgflten: 25;
}

impl TransmitterDelayCompensationRegister {
    pub fn tdcmod(&self) -> SecondarySamplePointMode {
        SecondarySamplePointMode::try_from(self._tdcmod()).unwrap_or_default()
    }

    pub fn set_tdcmod(&mut self, mode: SecondarySamplePointMode) {
        self._set_tdcmod(mode.into())
    }
}

impl_to_from_u32!(TransmitterDelayCompensationRegister);
impl_register!(TransmitterDelayCompensationRegister, CITDC);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{reset_value, Register};

    #[test]
    fn can_control_reset_value() {
        let cicon = CanControlRegister::from(reset_value(CanControlRegister::ADDRESS).unwrap_or(0));

        assert_eq!(cicon.opmode(), OperationMode::Configuration);
        assert_eq!(cicon.reqop(), OperationMode::Configuration);
        assert_eq!(cicon.dncnt(), None);
        assert!(cicon.isocrcen());
        assert!(cicon.pxedis());
        assert!(cicon.wakfil());
        assert_eq!(cicon.wft().ok(), Some(WakeupFilterTime::T11Filter));
        assert!(!cicon.rtxat());
        assert!(cicon.stef());
        assert!(cicon.txqen());
        assert!(!cicon.abat());
        assert_eq!(cicon.txbws(), InterTransmissionDelay::NoDelay);
    }

    #[test]
    fn request_operation_mode_bits() {
        let mut cicon = CanControlRegister::from(0);
        cicon.set_reqop(OperationMode::NormalCan2);
        cicon.set_txbws(InterTransmissionDelay::Delay16);
        cicon.set_abat(true);

        let byte3 = (u32::from(cicon) >> 24) as u8;
        assert_eq!(byte3, 0x4E);
        assert_eq!(byte3 & CanControlRegister::ABAT_MASK, CanControlRegister::ABAT_MASK);
    }

    #[test]
    fn operation_mode_decoding_ignores_upper_bits() {
        assert_eq!(OperationMode::from_bits(0b1000_0100), OperationMode::Configuration);
        assert_eq!(OperationMode::from_bits(7), OperationMode::Restricted);
    }

    #[test]
    fn timing_register_layouts() {
        let mut nbt = NominalBitTimeConfigurationRegister::from(0);
        nbt.set_brp(0);
        nbt.set_tseg1(62);
        nbt.set_tseg2(15);
        nbt.set_sjw(15);
        assert_eq!(u32::from(nbt), 0x003E_0F0F);

        let mut dbt = DataBitTimeConfigurationRegister::from(0);
        dbt.set_tseg1(14);
        dbt.set_tseg2(3);
        dbt.set_sjw(3);
        assert_eq!(u32::from(dbt), 0x000E_0303);

        let mut tdc = TransmitterDelayCompensationRegister::from(0);
        tdc.set_tdcmod(SecondarySamplePointMode::Auto);
        tdc.set_tdco(15);
        assert_eq!(u32::from(tdc), 0x0002_0F00);
        assert_eq!(tdc.tdcmod(), SecondarySamplePointMode::Auto);
    }
}
