//! Nominal and data phase bit timing.
//!
//! Timings come from a fixed table of nominal/data rate pairs for the three
//! supported system clocks. All values are register encodings, i.e. one less
//! than the number of time quanta. Sample points sit at 80% for the nominal
//! phase and 75% to 80% for the data phase.

use core::fmt::Debug;

#[cfg(not(feature = "async"))]
use embedded_hal::spi::SpiDevice;
#[cfg(feature = "async")]
use embedded_hal_async::spi::SpiDevice;

use crate::memory::controller::configuration::{
    DataBitTimeConfigurationRegister, NominalBitTimeConfigurationRegister,
    SecondarySamplePointMode, TransmitterDelayCompensationRegister,
};
use crate::memory::reset_value;
use crate::memory::Register;
use crate::spi::{Error, MCP2517FD};

/// Nominal (arbitration) and data phase bit rate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitTimeSetup {
    Nominal500KData1M,
    Nominal500KData2M,
    Nominal500KData3M,
    Nominal500KData4M,
    Nominal500KData5M,
    Nominal500KData6M7,
    Nominal500KData8M,
    Nominal500KData10M,
    Nominal250KData500K,
    Nominal250KData833K,
    Nominal250KData1M,
    Nominal250KData1M5,
    Nominal250KData2M,
    Nominal250KData3M,
    Nominal250KData4M,
    Nominal1000KData4M,
    Nominal1000KData8M,
    Nominal125KData500K,
}

/// Frequency of SYSCLK after the PLL and divider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemClock {
    Clock40MHz,
    Clock20MHz,
    Clock10MHz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NominalBitTime {
    pub baud_rate_prescaler: u8,
    pub time_segment_1: u8,
    pub time_segment_2: u8,
    pub synchronization_jump_width: u8,
}

impl NominalBitTime {
    const fn new(time_segment_1: u8, time_segment_2: u8, synchronization_jump_width: u8) -> Self {
        Self {
            baud_rate_prescaler: 0,
            time_segment_1,
            time_segment_2,
            synchronization_jump_width,
        }
    }

    pub fn to_register(&self) -> NominalBitTimeConfigurationRegister {
        let mut nbtcfg = NominalBitTimeConfigurationRegister::from(
            reset_value(NominalBitTimeConfigurationRegister::ADDRESS).unwrap_or_default(),
        );

        nbtcfg.set_brp(self.baud_rate_prescaler);
        nbtcfg.set_tseg1(self.time_segment_1);
        nbtcfg.set_tseg2(self.time_segment_2);
        nbtcfg.set_sjw(self.synchronization_jump_width);
        nbtcfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataBitTime {
    pub baud_rate_prescaler: u8,
    pub time_segment_1: u8,
    pub time_segment_2: u8,
    pub synchronization_jump_width: u8,
    pub transmitter_delay_compensation_offset: u8,
    pub transmitter_delay_compensation_value: u8,
    /// `Off` for rates slow enough to not need a secondary sample point
    pub transmitter_delay_compensation_mode: SecondarySamplePointMode,
}

impl DataBitTime {
    /// Rows needing delay compensation, offset placed at the sample point
    const fn new(time_segment_1: u8, time_segment_2: u8, synchronization_jump_width: u8) -> Self {
        Self {
            baud_rate_prescaler: 0,
            time_segment_1,
            time_segment_2,
            synchronization_jump_width,
            transmitter_delay_compensation_offset: time_segment_1 + 1,
            transmitter_delay_compensation_value: 0,
            transmitter_delay_compensation_mode: SecondarySamplePointMode::Auto,
        }
    }

    const fn with_prescaler(mut self, baud_rate_prescaler: u8) -> Self {
        self.baud_rate_prescaler = baud_rate_prescaler;
        self
    }

    const fn with_delay_value(mut self, value: u8) -> Self {
        self.transmitter_delay_compensation_value = value;
        self
    }

    const fn without_compensation(mut self) -> Self {
        self.transmitter_delay_compensation_mode = SecondarySamplePointMode::Off;
        self
    }

    pub fn to_register(&self) -> DataBitTimeConfigurationRegister {
        let mut dbtcfg = DataBitTimeConfigurationRegister::from(
            reset_value(DataBitTimeConfigurationRegister::ADDRESS).unwrap_or_default(),
        );

        dbtcfg.set_brp(self.baud_rate_prescaler);
        dbtcfg.set_tseg1(self.time_segment_1);
        dbtcfg.set_tseg2(self.time_segment_2);
        dbtcfg.set_sjw(self.synchronization_jump_width);
        dbtcfg
    }

    /// CiTDC for this row. Rows without compensation stay off whatever the
    /// caller asks for.
    pub fn delay_compensation(
        &self,
        mode: SecondarySamplePointMode,
    ) -> TransmitterDelayCompensationRegister {
        let mut tdc = TransmitterDelayCompensationRegister::from(0);

        tdc.set_tdcmod(match self.transmitter_delay_compensation_mode {
            SecondarySamplePointMode::Off => SecondarySamplePointMode::Off,
            _ => mode,
        });
        tdc.set_tdco(self.transmitter_delay_compensation_offset);
        tdc.set_tdcv(self.transmitter_delay_compensation_value);
        tdc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTimeConfiguration {
    pub nominal: NominalBitTime,
    pub data: DataBitTime,
}

const NOMINAL_320_TQ: NominalBitTime = NominalBitTime::new(254, 63, 63);
const NOMINAL_160_TQ: NominalBitTime = NominalBitTime::new(126, 31, 31);
const NOMINAL_80_TQ: NominalBitTime = NominalBitTime::new(62, 15, 15);
const NOMINAL_40_TQ: NominalBitTime = NominalBitTime::new(30, 7, 7);
const NOMINAL_20_TQ: NominalBitTime = NominalBitTime::new(14, 3, 3);
const NOMINAL_12_TQ: NominalBitTime = NominalBitTime::new(7, 2, 2);

const DATA_40_TQ: DataBitTime = DataBitTime::new(30, 7, 7);
const DATA_24_TQ: DataBitTime = DataBitTime::new(18, 5, 5);
const DATA_24_TQ_SLOW: DataBitTime = DataBitTime::new(17, 4, 4);
const DATA_20_TQ: DataBitTime = DataBitTime::new(14, 3, 3);
const DATA_12_TQ: DataBitTime = DataBitTime::new(8, 2, 2);
const DATA_11_TQ: DataBitTime = DataBitTime::new(7, 2, 2);
const DATA_8_TQ: DataBitTime = DataBitTime::new(6, 1, 1);
const DATA_6_TQ: DataBitTime = DataBitTime::new(4, 1, 1);
const DATA_5_TQ: DataBitTime = DataBitTime::new(3, 0, 0);
const DATA_4_TQ: DataBitTime = DataBitTime::new(2, 0, 0);
const DATA_3_TQ: DataBitTime = DataBitTime::new(1, 0, 0);

impl BitTimeConfiguration {
    /// Table entry for `setup` at `clock`, `None` if either phase can not be
    /// reached with this clock
    pub fn lookup(setup: BitTimeSetup, clock: SystemClock) -> Option<Self> {
        Some(Self {
            nominal: nominal_bit_time(setup, clock)?,
            data: data_bit_time(setup, clock)?,
        })
    }
}

fn nominal_bit_time(setup: BitTimeSetup, clock: SystemClock) -> Option<NominalBitTime> {
    use BitTimeSetup::*;
    use SystemClock::*;

    let bit_time = match (clock, setup) {
        (Clock40MHz, Nominal125KData500K) => NOMINAL_320_TQ,
        (Clock40MHz, Nominal1000KData4M | Nominal1000KData8M) => NOMINAL_40_TQ,
        (
            Clock40MHz,
            Nominal500KData1M | Nominal500KData2M | Nominal500KData3M | Nominal500KData4M
            | Nominal500KData5M | Nominal500KData6M7 | Nominal500KData8M | Nominal500KData10M,
        ) => NOMINAL_80_TQ,
        (Clock40MHz, _) => NOMINAL_160_TQ,

        // 500K/3M has no entry below 40 MHz
        (Clock20MHz | Clock10MHz, Nominal500KData3M) => return None,

        (Clock20MHz, Nominal125KData500K) => NOMINAL_160_TQ,
        (Clock20MHz, Nominal1000KData4M | Nominal1000KData8M) => NOMINAL_20_TQ,
        (
            Clock20MHz,
            Nominal500KData1M | Nominal500KData2M | Nominal500KData4M | Nominal500KData5M
            | Nominal500KData6M7 | Nominal500KData8M | Nominal500KData10M,
        ) => NOMINAL_40_TQ,
        (Clock20MHz, _) => NOMINAL_80_TQ,

        (Clock10MHz, Nominal125KData500K) => NOMINAL_80_TQ,
        (Clock10MHz, Nominal1000KData4M | Nominal1000KData8M) => NOMINAL_12_TQ,
        (
            Clock10MHz,
            Nominal500KData1M | Nominal500KData2M | Nominal500KData4M | Nominal500KData5M
            | Nominal500KData6M7 | Nominal500KData8M | Nominal500KData10M,
        ) => NOMINAL_20_TQ,
        (Clock10MHz, _) => NOMINAL_40_TQ,
    };

    Some(bit_time)
}

fn data_bit_time(setup: BitTimeSetup, clock: SystemClock) -> Option<DataBitTime> {
    use BitTimeSetup::*;
    use SystemClock::*;

    let bit_time = match (clock, setup) {
        (Clock40MHz, Nominal500KData1M | Nominal250KData1M) => DATA_40_TQ,
        (Clock40MHz, Nominal500KData2M | Nominal250KData2M) => DATA_20_TQ,
        (Clock40MHz, Nominal500KData3M | Nominal250KData3M) => DATA_12_TQ,
        (Clock40MHz, Nominal500KData4M | Nominal1000KData4M | Nominal250KData4M) => DATA_8_TQ,
        (Clock40MHz, Nominal500KData5M) => DATA_6_TQ,
        (Clock40MHz, Nominal500KData6M7) => DATA_5_TQ,
        (Clock40MHz, Nominal500KData8M | Nominal1000KData8M) => DATA_4_TQ.with_delay_value(1),
        (Clock40MHz, Nominal500KData10M) => DATA_3_TQ,
        (Clock40MHz, Nominal250KData500K | Nominal125KData500K) => {
            DATA_40_TQ.with_prescaler(1).without_compensation()
        }
        (Clock40MHz, Nominal250KData833K) => {
            DATA_24_TQ_SLOW.with_prescaler(1).without_compensation()
        }
        (Clock40MHz, Nominal250KData1M5) => DATA_24_TQ,

        (Clock20MHz, Nominal500KData1M | Nominal250KData1M) => DATA_20_TQ,
        (Clock20MHz, Nominal500KData2M | Nominal250KData2M) => DATA_8_TQ,
        (Clock20MHz, Nominal500KData4M | Nominal1000KData4M | Nominal250KData4M) => DATA_4_TQ,
        (Clock20MHz, Nominal500KData5M) => DATA_3_TQ,
        (Clock20MHz, Nominal250KData500K | Nominal125KData500K) => {
            DATA_40_TQ.without_compensation()
        }
        (Clock20MHz, Nominal250KData833K) => DATA_24_TQ_SLOW.without_compensation(),
        (Clock20MHz, Nominal250KData1M5) => DATA_12_TQ,
        (
            Clock20MHz,
            Nominal500KData3M | Nominal500KData6M7 | Nominal500KData8M | Nominal500KData10M
            | Nominal1000KData8M | Nominal250KData3M,
        ) => return None,

        (Clock10MHz, Nominal500KData1M | Nominal250KData1M) => DATA_8_TQ,
        (Clock10MHz, Nominal500KData2M | Nominal250KData2M) => DATA_4_TQ,
        (Clock10MHz, Nominal250KData500K | Nominal125KData500K) => {
            DATA_20_TQ.without_compensation()
        }
        (Clock10MHz, Nominal250KData833K) => DATA_11_TQ.without_compensation(),
        (Clock10MHz, _) => return None,
    };

    Some(bit_time)
}

#[cfg_attr(not(feature = "async"), maybe_async::maybe_async)]
impl<SPI, SPIE> MCP2517FD<SPI>
where
    SPI: SpiDevice<u8, Error = SPIE>,
    SPIE: Debug,
{
    /// Programs CiNBTCFG, CiDBTCFG and CiTDC, in that order, from the bit
    /// time table. Nothing is written when the table has no entry for
    /// `setup` at `clock`.
    ///
    /// Only takes effect in configuration mode.
    pub async fn configure_bit_time(
        &mut self,
        setup: BitTimeSetup,
        ssp_mode: SecondarySamplePointMode,
        clock: SystemClock,
    ) -> Result<(), Error> {
        let Some(config) = BitTimeConfiguration::lookup(setup, clock) else {
            #[cfg(feature = "defmt")]
            defmt::warn!("bit time {} not feasible at {}", setup, clock);

            return Err(Error::BitTimeInfeasible);
        };

        self.write_register(config.nominal.to_register()).await?;
        self.write_register(config.data.to_register()).await?;
        self.write_register(config.data.delay_compensation(ssp_mode))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SETUPS: [BitTimeSetup; 18] = [
        BitTimeSetup::Nominal500KData1M,
        BitTimeSetup::Nominal500KData2M,
        BitTimeSetup::Nominal500KData3M,
        BitTimeSetup::Nominal500KData4M,
        BitTimeSetup::Nominal500KData5M,
        BitTimeSetup::Nominal500KData6M7,
        BitTimeSetup::Nominal500KData8M,
        BitTimeSetup::Nominal500KData10M,
        BitTimeSetup::Nominal250KData500K,
        BitTimeSetup::Nominal250KData833K,
        BitTimeSetup::Nominal250KData1M,
        BitTimeSetup::Nominal250KData1M5,
        BitTimeSetup::Nominal250KData2M,
        BitTimeSetup::Nominal250KData3M,
        BitTimeSetup::Nominal250KData4M,
        BitTimeSetup::Nominal1000KData4M,
        BitTimeSetup::Nominal1000KData8M,
        BitTimeSetup::Nominal125KData500K,
    ];

    fn quanta(nominal: &NominalBitTime) -> u32 {
        3 + nominal.time_segment_1 as u32 + nominal.time_segment_2 as u32
    }

    #[test]
    fn every_setup_fits_at_40_mhz() {
        for setup in ALL_SETUPS {
            assert!(
                BitTimeConfiguration::lookup(setup, SystemClock::Clock40MHz).is_some(),
                "{setup:?}"
            );
        }
    }

    #[test]
    fn nominal_rate_matches_clock() {
        let cases = [
            (SystemClock::Clock40MHz, 40_000_000),
            (SystemClock::Clock20MHz, 20_000_000),
            (SystemClock::Clock10MHz, 10_000_000),
        ];

        for (clock, hz) in cases {
            for setup in ALL_SETUPS {
                let Some(config) = BitTimeConfiguration::lookup(setup, clock) else {
                    continue;
                };

                let rate = match setup {
                    BitTimeSetup::Nominal125KData500K => 125_000,
                    BitTimeSetup::Nominal1000KData4M | BitTimeSetup::Nominal1000KData8M => {
                        1_000_000
                    }
                    BitTimeSetup::Nominal250KData500K
                    | BitTimeSetup::Nominal250KData833K
                    | BitTimeSetup::Nominal250KData1M
                    | BitTimeSetup::Nominal250KData1M5
                    | BitTimeSetup::Nominal250KData2M
                    | BitTimeSetup::Nominal250KData3M
                    | BitTimeSetup::Nominal250KData4M => 250_000,
                    _ => 500_000,
                };

                assert_eq!(hz / quanta(&config.nominal), rate, "{setup:?} {clock:?}");
            }
        }
    }

    #[test]
    fn known_rows() {
        let config = BitTimeConfiguration::lookup(
            BitTimeSetup::Nominal500KData2M,
            SystemClock::Clock40MHz,
        )
        .unwrap();

        assert_eq!(config.nominal, NominalBitTime::new(62, 15, 15));
        assert_eq!(config.data.time_segment_1, 14);
        assert_eq!(config.data.time_segment_2, 3);
        assert_eq!(config.data.synchronization_jump_width, 3);
        assert_eq!(config.data.transmitter_delay_compensation_offset, 15);

        let config = BitTimeConfiguration::lookup(
            BitTimeSetup::Nominal500KData8M,
            SystemClock::Clock40MHz,
        )
        .unwrap();
        assert_eq!(config.data.transmitter_delay_compensation_offset, 3);
        assert_eq!(config.data.transmitter_delay_compensation_value, 1);

        let config = BitTimeConfiguration::lookup(
            BitTimeSetup::Nominal250KData833K,
            SystemClock::Clock40MHz,
        )
        .unwrap();
        assert_eq!(config.data.baud_rate_prescaler, 1);
        assert_eq!(config.data.transmitter_delay_compensation_offset, 18);
    }

    #[test]
    fn infeasible_rows() {
        use BitTimeSetup::*;

        for setup in [Nominal500KData3M, Nominal500KData8M, Nominal1000KData8M, Nominal250KData3M] {
            assert_eq!(BitTimeConfiguration::lookup(setup, SystemClock::Clock20MHz), None);
        }

        for setup in [Nominal500KData4M, Nominal1000KData4M, Nominal250KData1M5, Nominal250KData4M] {
            assert_eq!(BitTimeConfiguration::lookup(setup, SystemClock::Clock10MHz), None);
        }

        assert!(BitTimeConfiguration::lookup(Nominal250KData4M, SystemClock::Clock20MHz).is_some());
    }

    #[test]
    fn delay_compensation_mode() {
        let slow = BitTimeConfiguration::lookup(
            BitTimeSetup::Nominal250KData500K,
            SystemClock::Clock20MHz,
        )
        .unwrap();
        let fast = BitTimeConfiguration::lookup(
            BitTimeSetup::Nominal500KData2M,
            SystemClock::Clock20MHz,
        )
        .unwrap();

        let tdc = slow.data.delay_compensation(SecondarySamplePointMode::Manual);
        assert_eq!(tdc.tdcmod(), SecondarySamplePointMode::Off);
        assert_eq!(tdc.tdco(), 31);

        let tdc = fast.data.delay_compensation(SecondarySamplePointMode::Manual);
        assert_eq!(tdc.tdcmod(), SecondarySamplePointMode::Manual);
        assert_eq!(tdc.tdco(), 7);
        assert_eq!(u32::from(tdc), 0x0001_0700);
    }
}
