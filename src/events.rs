//! Interrupt and status flags of the controller.
//!
//! Flags are HS/C: hardware sets them and they are cleared by writing a 0.
//! Every clear below is a narrow write (a single byte or half word) so flags
//! outside the requested set are never touched.

use core::fmt::Debug;

use bitflags::bitflags;

#[cfg(not(feature = "async"))]
use embedded_hal::spi::SpiDevice;
#[cfg(feature = "async")]
use embedded_hal_async::spi::SpiDevice;

use crate::memory::address::CIBDIAG0;
use crate::memory::chip::CrcRegister;
use crate::memory::controller::{
    diagnostic::{BusDiagnosticRegister0, BusDiagnosticRegister1, TransmitReceiveErrorCountRegister},
    fifo::{FifoChannel, TxEventFifoControlRegister, TxEventFifoStatusRegister},
    interrupt::{
        InterruptCodeRegister, InterruptRegister, RxInterruptStatusRegister,
        RxOverflowInterruptStatusRegister, TxAttemptInterruptStatusRegister,
        TxInterruptStatusRegister,
    },
};
use crate::memory::Register;
use crate::spi::{Error, MCP2517FD};

/// Implements `defmt::Format` by printing the raw bits
macro_rules! format_bits {
    ($ident:ident) => {
        #[cfg(feature = "defmt")]
        impl defmt::Format for $ident {
            fn format(&self, f: defmt::Formatter) {
                defmt::write!(f, "{=str}({:#x})", stringify!($ident), self.bits())
            }
        }
    };
}

bitflags! {
    /// Module level interrupts, low half word of CiINT (flags) and high half
    /// word (enables)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleEvent: u16 {
        const TX = 1 << 0;
        const RX = 1 << 1;
        const TIME_BASE_COUNTER = 1 << 2;
        const OPERATION_MODE_CHANGE = 1 << 3;
        const TX_EVENT_FIFO = 1 << 4;
        const RAM_ECC = 1 << 8;
        const SPI_CRC = 1 << 9;
        const TX_ATTEMPTS = 1 << 10;
        const RX_OVERFLOW = 1 << 11;
        const SYSTEM_ERROR = 1 << 12;
        const BUS_ERROR = 1 << 13;
        const BUS_WAKEUP = 1 << 14;
        const INVALID_MESSAGE = 1 << 15;
    }
}

format_bits!(ModuleEvent);

bitflags! {
    /// Interrupt sources of a transmit channel, bits of CiFIFOCONm/CiFIFOSTAm
    /// byte 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxFifoEvent: u8 {
        const NOT_FULL = 1 << 0;
        const HALF_EMPTY = 1 << 1;
        const EMPTY = 1 << 2;
        const ATTEMPTS_EXHAUSTED = 1 << 4;
    }
}

format_bits!(TxFifoEvent);

bitflags! {
    /// Full status of a transmit channel, CiFIFOSTAm byte 0 plus the pending
    /// transmit request from CiFIFOCONm
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxFifoStatus: u16 {
        const NOT_FULL = 1 << 0;
        const HALF_EMPTY = 1 << 1;
        const EMPTY = 1 << 2;
        const ATTEMPTS_EXHAUSTED = 1 << 4;
        const ERROR = 1 << 5;
        const ARBITRATION_LOST = 1 << 6;
        const ABORTED = 1 << 7;
        const TRANSMITTING = 1 << 8;
    }
}

format_bits!(TxFifoStatus);

bitflags! {
    /// Interrupt sources and status of a receive channel
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxFifoEvent: u8 {
        const NOT_EMPTY = 1 << 0;
        const HALF_FULL = 1 << 1;
        const FULL = 1 << 2;
        const OVERFLOW = 1 << 3;
    }
}

format_bits!(RxFifoEvent);

bitflags! {
    /// Interrupt sources and status of the transmit event FIFO
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TefEvent: u8 {
        const NOT_EMPTY = 1 << 0;
        const HALF_FULL = 1 << 1;
        const FULL = 1 << 2;
        const OVERFLOW = 1 << 3;
    }
}

format_bits!(TefEvent);

bitflags! {
    /// Fault confinement state, CiTREC byte 2
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorState: u8 {
        const WARNING = 1 << 0;
        const RX_WARNING = 1 << 1;
        const TX_WARNING = 1 << 2;
        const RX_PASSIVE = 1 << 3;
        const TX_PASSIVE = 1 << 4;
        const TX_BUS_OFF = 1 << 5;
    }
}

format_bits!(ErrorState);

bitflags! {
    /// SPI CRC failures reported in the CRC register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CrcEvent: u8 {
        /// A CRC or safe write arrived with a wrong checksum
        const CRC_ERROR = 1 << 0;
        /// A CRC transaction was cut short or had the wrong length
        const FORMAT_ERROR = 1 << 1;
    }
}

format_bits!(CrcEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounts {
    pub transmit: u8,
    pub receive: u8,
    pub state: ErrorState,
}

impl From<TransmitReceiveErrorCountRegister> for ErrorCounts {
    fn from(trec: TransmitReceiveErrorCountRegister) -> Self {
        Self {
            transmit: trec.tec(),
            receive: trec.rec(),
            state: ErrorState::from_bits_truncate(trec.state()),
        }
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusDiagnostics {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub counters: BusDiagnosticRegister0,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub flags: BusDiagnosticRegister1,
}

/// Mask byte 0 of CiFIFOSTAm with only `clear` zeroed, every other flag is
/// written back as 1 and stays untouched
fn clear_mask(status: u8, clear: u8) -> u8 {
    status & !clear
}

#[cfg_attr(not(feature = "async"), maybe_async::maybe_async)]
impl<SPI, SPIE> MCP2517FD<SPI>
where
    SPI: SpiDevice<u8, Error = SPIE>,
    SPIE: Debug,
{
    /* Interrupt vector and summaries */

    pub async fn interrupt_codes(&mut self) -> Result<InterruptCodeRegister, Error> {
        self.read_register::<InterruptCodeRegister>().await
    }

    pub async fn rx_interrupt_flags(&mut self) -> Result<RxInterruptStatusRegister, Error> {
        self.read_register::<RxInterruptStatusRegister>().await
    }

    pub async fn rx_overflow_flags(
        &mut self,
    ) -> Result<RxOverflowInterruptStatusRegister, Error> {
        self.read_register::<RxOverflowInterruptStatusRegister>()
            .await
    }

    pub async fn tx_interrupt_flags(&mut self) -> Result<TxInterruptStatusRegister, Error> {
        self.read_register::<TxInterruptStatusRegister>().await
    }

    pub async fn tx_attempt_flags(&mut self) -> Result<TxAttemptInterruptStatusRegister, Error> {
        self.read_register::<TxAttemptInterruptStatusRegister>()
            .await
    }

    /* Module events */

    pub async fn module_events(&mut self) -> Result<ModuleEvent, Error> {
        let flags = self.read_word(InterruptRegister::FLAGS_ADDRESS).await?;

        Ok(ModuleEvent::from_bits_truncate(flags))
    }

    pub async fn enable_module_events(&mut self, events: ModuleEvent) -> Result<(), Error> {
        let address = InterruptRegister::ENABLES_ADDRESS;
        let enables = self.read_word(address).await?;

        self.write_word(address, enables | events.bits()).await
    }

    pub async fn disable_module_events(&mut self, events: ModuleEvent) -> Result<(), Error> {
        let address = InterruptRegister::ENABLES_ADDRESS;
        let enables = self.read_word(address).await?;

        self.write_word(address, enables & !events.bits()).await
    }

    /// Clears the given flags. Only the writable flags can be cleared, the
    /// others mirror channel state and clear with it.
    pub async fn clear_module_events(&mut self, events: ModuleEvent) -> Result<(), Error> {
        let keep = ModuleEvent::all().difference(events);

        self.write_word(InterruptRegister::FLAGS_ADDRESS, keep.bits())
            .await
    }

    /* Transmit channel events */

    pub async fn transmit_channel_events(
        &mut self,
        channel: FifoChannel,
    ) -> Result<TxFifoEvent, Error> {
        let status = self.read_byte(channel.status_address()).await?;

        Ok(TxFifoEvent::from_bits_truncate(status))
    }

    pub async fn enable_transmit_channel_events(
        &mut self,
        channel: FifoChannel,
        events: TxFifoEvent,
    ) -> Result<(), Error> {
        let address = channel.control_address();
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables | events.bits()).await
    }

    pub async fn disable_transmit_channel_events(
        &mut self,
        channel: FifoChannel,
        events: TxFifoEvent,
    ) -> Result<(), Error> {
        let address = channel.control_address();
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables & !events.bits()).await
    }

    pub async fn clear_transmit_channel_attempts(
        &mut self,
        channel: FifoChannel,
    ) -> Result<(), Error> {
        let address = channel.status_address();
        let status = self.read_byte(address).await?;

        self.write_byte(
            address,
            clear_mask(status, TxFifoEvent::ATTEMPTS_EXHAUSTED.bits()),
        )
        .await
    }

    /* Receive channel events */

    pub async fn receive_channel_events(
        &mut self,
        channel: FifoChannel,
    ) -> Result<RxFifoEvent, Error> {
        let status = self.read_byte(channel.status_address()).await?;

        Ok(RxFifoEvent::from_bits_truncate(status))
    }

    pub async fn enable_receive_channel_events(
        &mut self,
        channel: FifoChannel,
        events: RxFifoEvent,
    ) -> Result<(), Error> {
        let address = channel.control_address();
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables | events.bits()).await
    }

    pub async fn disable_receive_channel_events(
        &mut self,
        channel: FifoChannel,
        events: RxFifoEvent,
    ) -> Result<(), Error> {
        let address = channel.control_address();
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables & !events.bits()).await
    }

    pub async fn clear_receive_channel_overflow(
        &mut self,
        channel: FifoChannel,
    ) -> Result<(), Error> {
        let address = channel.status_address();
        let status = self.read_byte(address).await?;

        self.write_byte(address, clear_mask(status, RxFifoEvent::OVERFLOW.bits()))
            .await
    }

    /* Transmit event FIFO events */

    pub async fn tx_event_fifo_events(&mut self) -> Result<TefEvent, Error> {
        let status = self.read_byte(TxEventFifoStatusRegister::ADDRESS).await?;

        Ok(TefEvent::from_bits_truncate(status))
    }

    pub async fn enable_tx_event_fifo_events(&mut self, events: TefEvent) -> Result<(), Error> {
        let address = TxEventFifoControlRegister::ADDRESS;
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables | events.bits()).await
    }

    pub async fn disable_tx_event_fifo_events(&mut self, events: TefEvent) -> Result<(), Error> {
        let address = TxEventFifoControlRegister::ADDRESS;
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables & !events.bits()).await
    }

    pub async fn clear_tx_event_fifo_overflow(&mut self) -> Result<(), Error> {
        let address = TxEventFifoStatusRegister::ADDRESS;
        let status = self.read_byte(address).await?;

        self.write_byte(address, clear_mask(status, TefEvent::OVERFLOW.bits()))
            .await
    }

    /* Error counters and bus diagnostics */

    pub async fn error_counts(&mut self) -> Result<ErrorCounts, Error> {
        let trec = self
            .read_register::<TransmitReceiveErrorCountRegister>()
            .await?;

        Ok(trec.into())
    }

    pub async fn bus_diagnostics(&mut self) -> Result<BusDiagnostics, Error> {
        let mut words = [0u32; 2];
        self.read_dword_array(CIBDIAG0, &mut words).await?;

        Ok(BusDiagnostics {
            counters: BusDiagnosticRegister0::from(words[0]),
            flags: BusDiagnosticRegister1::from(words[1]),
        })
    }

    pub async fn clear_bus_diagnostics(&mut self) -> Result<(), Error> {
        self.write_dword_array(CIBDIAG0, &[0, 0]).await
    }

    /* SPI CRC events */

    pub async fn crc_events(&mut self) -> Result<CrcEvent, Error> {
        let flags = self.read_byte(CrcRegister::FLAGS_ADDRESS).await?;

        Ok(CrcEvent::from_bits_truncate(flags))
    }

    pub async fn enable_crc_events(&mut self, events: CrcEvent) -> Result<(), Error> {
        let address = CrcRegister::ENABLES_ADDRESS;
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables | events.bits()).await
    }

    pub async fn disable_crc_events(&mut self, events: CrcEvent) -> Result<(), Error> {
        let address = CrcRegister::ENABLES_ADDRESS;
        let enables = self.read_byte(address).await?;

        self.write_byte(address, enables & !events.bits()).await
    }

    pub async fn clear_crc_events(&mut self, events: CrcEvent) -> Result<(), Error> {
        let address = CrcRegister::FLAGS_ADDRESS;
        let flags = self.read_byte(address).await?;

        self.write_byte(address, clear_mask(flags, events.bits()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_event_layout() {
        assert_eq!(ModuleEvent::all().bits(), 0xFF1F);
        assert_eq!(
            ModuleEvent::all().difference(ModuleEvent::RX | ModuleEvent::SPI_CRC).bits(),
            0xFD1D
        );
    }

    #[test]
    fn status_bits_match_fifo_registers() {
        assert_eq!(TxFifoEvent::all().bits(), 0x17);
        assert_eq!(RxFifoEvent::all().bits(), 0x0F);
        assert_eq!(TxFifoStatus::TRANSMITTING.bits(), 0x100);
        assert_eq!(TxFifoStatus::from_bits_truncate(0x00E5), {
            TxFifoStatus::NOT_FULL
                | TxFifoStatus::EMPTY
                | TxFifoStatus::ERROR
                | TxFifoStatus::ARBITRATION_LOST
                | TxFifoStatus::ABORTED
        });
    }

    #[test]
    fn error_counts_from_register() {
        let counts = ErrorCounts::from(TransmitReceiveErrorCountRegister::from(0x0019_8012));

        assert_eq!(counts.transmit, 0x80);
        assert_eq!(counts.receive, 0x12);
        assert_eq!(
            counts.state,
            ErrorState::WARNING | ErrorState::RX_PASSIVE | ErrorState::TX_PASSIVE
        );
    }

    #[test]
    fn clear_mask_only_zeroes_requested_bits() {
        assert_eq!(clear_mask(0xFF, RxFifoEvent::OVERFLOW.bits()), 0xF7);
        assert_eq!(clear_mask(0x03, CrcEvent::all().bits()), 0x00);
        assert_eq!(clear_mask(0x13, TxFifoEvent::ATTEMPTS_EXHAUSTED.bits()), 0x03);
    }
}
