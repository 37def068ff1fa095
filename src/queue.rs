//! Message FIFOs, the transmit queue, the transmit event FIFO and acceptance
//! filters.
//!
//! Channel state is always read fresh from the chip before acting on it: one
//! DWORD array read of the CON/STA/UA registers, then the RAM transfer, then
//! a single byte write to the command byte of CON.

use core::fmt::Debug;

use embedded_can::Id;

#[cfg(not(feature = "async"))]
use embedded_hal::spi::SpiDevice;
#[cfg(feature = "async")]
use embedded_hal_async::spi::SpiDevice;

use crate::events::{RxFifoEvent, TefEvent, TxFifoStatus};
use crate::memory::address::{CIFIFOCON, CITEFCON};
use crate::memory::controller::{
    configuration::CanControlRegister,
    fifo::{
        FifoChannel, FifoCommand, FifoControlRegister, FifoStatusRegister,
        TxEventFifoControlRegister, TxEventFifoStatusRegister, UserAddressRegister,
        MAX_FIFO_DEPTH,
    },
    filter::{FilterControl, FilterNumber, FilterObjectRegister, MaskRegister},
    status::TransmitRequestRegister,
};
use crate::memory::{is_ram_address, reset_value};
use crate::message::rx::{RxHeaderWords, RxMessage, RxObject};
use crate::message::tx::{TxEventObject, TxHeaderWords, TxMessage};
use crate::message::{
    padded_len, HEADER_SIZE, MAX_FD_BUFFER_SIZE, MAX_MESSAGE_SIZE, TIMESTAMP_SIZE,
};
use crate::settings::{
    FilterConfiguration, FilterMatchMode, RxFifoConfiguration, TxEventFifoConfiguration,
    TxFifoConfiguration, TxQueueConfiguration,
};
use crate::spi::{Error, MCP2517FD};

fn check_fifo_size(size: u8) -> Result<(), Error> {
    if !(1..=MAX_FIFO_DEPTH).contains(&size) {
        return Err(Error::InvalidFifoSize(size));
    }

    Ok(())
}

fn fifo_reset_register() -> FifoControlRegister {
    FifoControlRegister::from(reset_value(CIFIFOCON).unwrap_or_default())
}

/// Absolute RAM address of the next message object of a FIFO. Addresses
/// beyond the 16 bit range are reported as `u16::MAX`.
fn message_address(ua: &UserAddressRegister) -> Result<u16, Error> {
    let address = ua
        .ram_address()
        .and_then(|address| u16::try_from(address).ok())
        .unwrap_or(u16::MAX);

    if !is_ram_address(address) {
        return Err(Error::InvalidRamAddress(address));
    }

    Ok(address)
}

fn header_bytes(buf: &[u8]) -> [u8; HEADER_SIZE] {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes.copy_from_slice(&buf[..HEADER_SIZE]);
    bytes
}

fn timestamp_at(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

#[cfg_attr(not(feature = "async"), maybe_async::maybe_async)]
impl<SPI, SPIE> MCP2517FD<SPI>
where
    SPI: SpiDevice<u8, Error = SPIE>,
    SPIE: Debug,
{
    /* Channel configuration */

    /// Configures a channel for transmission. The control word is built from
    /// the reset value, so the FIFO is reset as part of the write.
    ///
    /// Please keep in mind that the total RAM size is 2K and this code does
    /// not validate that the sum of all FIFOs fits. The documentation
    /// recommends configuring the TEF first, then the TXQ, then the FIFOs.
    pub async fn configure_transmit_channel(
        &mut self,
        channel: FifoChannel,
        config: &TxFifoConfiguration,
    ) -> Result<(), Error> {
        check_fifo_size(config.fifo_size)?;

        let mut fifocon = fifo_reset_register();
        fifocon.set_txen(true);
        fifocon.set_rtren(config.enable_auto_rtr);
        fifocon.set_txpri(config.priority);
        fifocon.set_retransmission_attempts(config.retransmission_attempts);
        fifocon.set_fifo_size(config.fifo_size);
        fifocon.set_payload_size(config.payload_size);

        self.write_repeated_register(channel, fifocon).await
    }

    pub async fn configure_tx_queue(&mut self, config: &TxQueueConfiguration) -> Result<(), Error> {
        check_fifo_size(config.fifo_size)?;

        let mut txqcon = fifo_reset_register();
        txqcon.set_txen(true);
        txqcon.set_txpri(config.message_priority);
        txqcon.set_retransmission_attempts(config.retransmission_attempts);
        txqcon.set_fifo_size(config.fifo_size);
        txqcon.set_payload_size(config.payload_size);

        self.write_repeated_register(FifoChannel::TxQueue, txqcon)
            .await
    }

    /// Configures a channel for reception. The transmit queue can not
    /// receive.
    pub async fn configure_receive_channel(
        &mut self,
        channel: FifoChannel,
        config: &RxFifoConfiguration,
    ) -> Result<(), Error> {
        if channel == FifoChannel::TxQueue {
            return Err(Error::FifoNotRx);
        }

        check_fifo_size(config.fifo_size)?;

        let mut fifocon = fifo_reset_register();
        fifocon.set_txen(false);
        fifocon.set_rxtsen(config.enable_message_timestamps);
        fifocon.set_fifo_size(config.fifo_size);
        fifocon.set_payload_size(config.payload_size);

        self.write_repeated_register(channel, fifocon).await
    }

    /// Configures the transmit event FIFO. Events are only stored while
    /// CiCON.STEF is set, see [`crate::settings::CanConfiguration`].
    pub async fn configure_tx_event_fifo(
        &mut self,
        config: &TxEventFifoConfiguration,
    ) -> Result<(), Error> {
        check_fifo_size(config.fifo_size)?;

        let mut tefcon = TxEventFifoControlRegister::from(reset_value(CITEFCON).unwrap_or_default());
        tefcon.set_teftsen(config.enable_timestamps);
        tefcon.set_fifo_size(config.fifo_size);

        self.write_register(tefcon).await
    }

    /* Transmission */

    /// Copies a message into the next free object of a transmit channel and
    /// increments the tail pointer. With `flush` set transmission is
    /// requested in the same command write.
    ///
    /// `data` may be shorter than the DLC of `header`, the controller sends
    /// whatever the message object holds past it.
    pub async fn transmit_channel_load(
        &mut self,
        channel: FifoChannel,
        header: &TxHeaderWords,
        data: &[u8],
        flush: bool,
    ) -> Result<(), Error> {
        let (fifocon, fifosta, fifoua) = self.fifo_registers(channel).await?;

        /* Make sure it's a transmit FIFO */

        if !fifocon.txen() {
            #[cfg(feature = "defmt")]
            defmt::debug!("{} is not a transmit channel", channel);

            return Err(Error::FifoNotTx);
        }

        /* Make sure the data fits the DLC and the FIFO */

        if data.len() > header.data_len() {
            return Err(Error::PayloadTooLarge);
        }

        if data.len() > fifocon.payload_size().num_bytes() {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "{=usize} bytes do not fit the payload of {}",
                data.len(),
                channel
            );

            return Err(Error::FifoTooSmall);
        }

        /* Make sure FIFO is not full */

        if !fifosta.tfnrfnif() {
            return Err(Error::FifoFull);
        }

        /* Write message to RAM */

        let address = message_address(&fifoua)?;

        let mut buf = [0u8; HEADER_SIZE + MAX_FD_BUFFER_SIZE];
        buf[..HEADER_SIZE].copy_from_slice(&header.to_le_bytes());
        buf[HEADER_SIZE..HEADER_SIZE + data.len()].copy_from_slice(data);

        self.write_ram(address, &buf[..padded_len(HEADER_SIZE + data.len())])
            .await?;

        self.transmit_channel_update(channel, flush).await
    }

    /// Loads a message and immediately requests its transmission
    pub async fn transmit_message(
        &mut self,
        channel: FifoChannel,
        message: &TxMessage,
    ) -> Result<(), Error> {
        self.transmit_channel_load(channel, message.header(), message.data(), true)
            .await
    }

    /// Increments the tail pointer of a transmit channel, optionally also
    /// requesting transmission
    pub async fn transmit_channel_update(
        &mut self,
        channel: FifoChannel,
        flush: bool,
    ) -> Result<(), Error> {
        let mut command = FifoCommand::UINC;
        command.set(FifoCommand::TXREQ, flush);

        self.write_fifo_command(channel, command).await
    }

    /// Requests transmission of everything loaded into a channel
    pub async fn transmit_channel_flush(&mut self, channel: FifoChannel) -> Result<(), Error> {
        self.write_fifo_command(channel, FifoCommand::TXREQ).await
    }

    /// Clears the transmit request of a channel. Frames already on the bus
    /// finish, the others stay in the FIFO.
    pub async fn transmit_channel_abort(&mut self, channel: FifoChannel) -> Result<(), Error> {
        self.write_fifo_command(channel, FifoCommand::empty()).await
    }

    /// Aborts all pending transmissions by setting CiCON.ABAT
    pub async fn transmit_abort_all(&mut self) -> Result<(), Error> {
        let address = CanControlRegister::REQOP_ADDRESS;
        let byte = self.read_byte(address).await?;

        self.write_byte(address, byte | CanControlRegister::ABAT_MASK)
            .await
    }

    /// Requests transmission of several channels at once
    pub async fn transmit_request_set(
        &mut self,
        request: TransmitRequestRegister,
    ) -> Result<(), Error> {
        self.write_register(request).await
    }

    pub async fn transmit_request_get(&mut self) -> Result<TransmitRequestRegister, Error> {
        self.read_register::<TransmitRequestRegister>().await
    }

    /* Reception */

    /// Reads the next message object of a receive channel and increments the
    /// head pointer. Up to `data.len()` payload bytes are copied into `data`.
    ///
    /// Returns `None` when the FIFO is empty.
    pub async fn receive_message_get(
        &mut self,
        channel: FifoChannel,
        data: &mut [u8],
    ) -> Result<Option<RxObject>, Error> {
        let (fifocon, fifosta, fifoua) = self.fifo_registers(channel).await?;

        /* Make sure it's a receive FIFO */

        if channel == FifoChannel::TxQueue || fifocon.txen() {
            #[cfg(feature = "defmt")]
            defmt::debug!("{} is not a receive channel", channel);

            return Err(Error::FifoNotRx);
        }

        if !fifosta.tfnrfnif() {
            return Ok(None);
        }

        /* Read header, timestamp and payload in one transfer */

        let header_len = if fifocon.rxtsen() {
            HEADER_SIZE + TIMESTAMP_SIZE
        } else {
            HEADER_SIZE
        };

        let read_len = padded_len(header_len + data.len());

        if read_len > MAX_MESSAGE_SIZE {
            return Err(Error::ReadTooLarge);
        }

        let address = message_address(&fifoua)?;

        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        self.read_ram(address, &mut buf[..read_len]).await?;

        let header = RxHeaderWords::from_le_bytes(&header_bytes(&buf));
        let timestamp = fifocon
            .rxtsen()
            .then(|| timestamp_at(&buf[HEADER_SIZE..]));

        let payload_len = data.len();
        data.copy_from_slice(&buf[header_len..header_len + payload_len]);

        /* Increment the head pointer */

        self.write_fifo_command(channel, FifoCommand::UINC).await?;

        Ok(Some(RxObject { header, timestamp }))
    }

    /// Reads the next message of a receive channel with the full payload
    /// capacity of the channel
    pub async fn receive_message(
        &mut self,
        channel: FifoChannel,
    ) -> Result<Option<RxMessage>, Error> {
        let fifocon = self
            .read_repeated_register::<FifoControlRegister>(channel)
            .await?;

        let mut data = [0u8; MAX_FD_BUFFER_SIZE];
        let len = fifocon.payload_size().num_bytes();

        let object = self.receive_message_get(channel, &mut data[..len]).await?;

        Ok(object.and_then(|object| RxMessage::new(object, &data[..len])))
    }

    /* Transmit event FIFO */

    /// Pops the next event from the transmit event FIFO, `None` when empty
    pub async fn tx_event_fifo_get(&mut self) -> Result<Option<TxEventObject>, Error> {
        let mut words = [0u32; 3];
        self.read_dword_array(CITEFCON, &mut words).await?;

        let tefcon = TxEventFifoControlRegister::from(words[0]);
        let tefsta = TxEventFifoStatusRegister::from(words[1]);
        let tefua = UserAddressRegister::from(words[2]);

        if !tefsta.tefneif() {
            return Ok(None);
        }

        let len = if tefcon.teftsen() {
            HEADER_SIZE + TIMESTAMP_SIZE
        } else {
            HEADER_SIZE
        };

        let address = message_address(&tefua)?;

        let mut buf = [0u8; HEADER_SIZE + TIMESTAMP_SIZE];
        self.read_ram(address, &mut buf[..len]).await?;

        let header = TxHeaderWords::from_le_bytes(&header_bytes(&buf));
        let timestamp = tefcon.teftsen().then(|| timestamp_at(&buf[HEADER_SIZE..]));

        self.write_byte(
            TxEventFifoControlRegister::COMMAND_ADDRESS,
            FifoCommand::UINC.bits(),
        )
        .await?;

        Ok(Some(TxEventObject { header, timestamp }))
    }

    /// Empties the transmit event FIFO
    pub async fn tx_event_fifo_reset(&mut self) -> Result<(), Error> {
        self.write_byte(
            TxEventFifoControlRegister::COMMAND_ADDRESS,
            FifoCommand::FRESET.bits(),
        )
        .await
    }

    /* Channel state */

    /// Resets a FIFO, dropping its content. Safe to call in any state.
    pub async fn fifo_reset(&mut self, channel: FifoChannel) -> Result<(), Error> {
        self.write_fifo_command(channel, FifoCommand::FRESET).await
    }

    pub async fn transmit_channel_status(
        &mut self,
        channel: FifoChannel,
    ) -> Result<TxFifoStatus, Error> {
        let mut words = [0u32; 2];
        self.read_dword_array(channel.control_address(), &mut words)
            .await?;

        let fifocon = FifoControlRegister::from(words[0]);
        let fifosta = FifoStatusRegister::from(words[1]);

        let mut status = TxFifoStatus::from_bits_truncate(fifosta.flags() as u16);
        status.set(TxFifoStatus::TRANSMITTING, fifocon.txreq());

        Ok(status)
    }

    pub async fn receive_channel_status(
        &mut self,
        channel: FifoChannel,
    ) -> Result<RxFifoEvent, Error> {
        let status = self.read_byte(channel.status_address()).await?;

        Ok(RxFifoEvent::from_bits_truncate(status))
    }

    pub async fn tef_status(&mut self) -> Result<TefEvent, Error> {
        let tefsta = self.read_register::<TxEventFifoStatusRegister>().await?;

        Ok(TefEvent::from_bits_truncate(tefsta.flags()))
    }

    /// Index of the message object the controller will use next (FIFOCI)
    pub async fn fifo_index(&mut self, channel: FifoChannel) -> Result<u8, Error> {
        let index = self.read_byte(channel.status_address() + 1).await?;

        Ok(index & 0x1F)
    }

    /* Filters */

    pub async fn configure_filter_object(
        &mut self,
        filter: FilterNumber,
        id: Id,
    ) -> Result<(), Error> {
        self.write_repeated_register(filter, FilterObjectRegister::for_id(id))
            .await
    }

    pub async fn configure_filter_mask(
        &mut self,
        filter: FilterNumber,
        mask: Id,
        match_ide: bool,
    ) -> Result<(), Error> {
        self.write_repeated_register(filter, MaskRegister::for_id(mask, match_ide))
            .await
    }

    /// Routes frames accepted by `filter` into `channel`
    pub async fn link_filter_to_fifo(
        &mut self,
        filter: FilterNumber,
        channel: FifoChannel,
        enable: bool,
    ) -> Result<(), Error> {
        let control = FilterControl::new(channel, enable);

        self.write_byte(filter.control_address(), control.into())
            .await
    }

    pub async fn enable_filter(&mut self, filter: FilterNumber) -> Result<(), Error> {
        self.set_filter_enabled(filter, true).await
    }

    pub async fn disable_filter(&mut self, filter: FilterNumber) -> Result<(), Error> {
        self.set_filter_enabled(filter, false).await
    }

    /// Configures one of the 32 acceptance filters. If the filter_config is
    /// None, the filter will be disabled instead.
    ///
    /// When receiving standard frames, the EID component of the filter can be
    /// used to match against (up to) the first 18 bits of the message's data
    /// segment. The number of bits used is configured by `CiCON.DNCNT`.
    pub async fn configure_filter(
        &mut self,
        filter: FilterNumber,
        filter_config: Option<FilterConfiguration>,
    ) -> Result<(), Error> {
        // Filters can only be changed while disabled
        self.disable_filter(filter).await?;

        let Some(filter_config) = filter_config else {
            return Ok(());
        };

        let mut object = FilterObjectRegister::for_id(filter_config.filter_bits);
        object.set_exide(filter_config.mode == FilterMatchMode::ExtendedOnly);

        let mask = MaskRegister::for_id(
            filter_config.mask_bits,
            filter_config.mode != FilterMatchMode::Both,
        );

        self.write_repeated_register(filter, object).await?;
        self.write_repeated_register(filter, mask).await?;

        self.link_filter_to_fifo(filter, filter_config.buffer_pointer, true)
            .await
    }

    async fn set_filter_enabled(&mut self, filter: FilterNumber, enabled: bool) -> Result<(), Error> {
        let address = filter.control_address();
        let mut control = FilterControl::from(self.read_byte(address).await?);
        control.set_flten(enabled);

        self.write_byte(address, control.into()).await
    }

    /* Helpers */

    async fn fifo_registers(
        &mut self,
        channel: FifoChannel,
    ) -> Result<(FifoControlRegister, FifoStatusRegister, UserAddressRegister), Error> {
        let mut words = [0u32; 3];
        self.read_dword_array(channel.control_address(), &mut words)
            .await?;

        Ok((
            FifoControlRegister::from(words[0]),
            FifoStatusRegister::from(words[1]),
            UserAddressRegister::from(words[2]),
        ))
    }

    async fn write_fifo_command(
        &mut self,
        channel: FifoChannel,
        command: FifoCommand,
    ) -> Result<(), Error> {
        self.write_byte(channel.control_address() + 1, command.bits())
            .await
    }
}
