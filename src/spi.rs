use core::fmt::Debug;

use bitfield::bitfield;

use embedded_hal::spi::Operation;
#[cfg(not(feature = "async"))]
use embedded_hal::spi::SpiDevice;

#[cfg(feature = "async")]
use embedded_hal_async::spi::SpiDevice;

use crate::crc::Crc16;
use crate::memory::address::CICON;
use crate::memory::controller::configuration::{
    CanControlRegister, DataBits, InterTransmissionDelay, OperationMode,
};
use crate::memory::{is_ram_address, is_valid_ram_address, Register, RepeatedRegister, MAX_ADDRESS};
use crate::settings::CanConfiguration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Failed to read from the chip over SPI
    SPIRead,
    /// Failed to write to the chip over SPI
    SPIWrite,
    /// Transfer would run past the end of the 12 bit address space
    InvalidAddress(u16),
    /// Attempted to access an invalid RAM address
    InvalidRamAddress(u16),
    /// Tried to read data from ram that was not a multiple of 4 bytes
    InvalidReadLength(usize),
    /// Tried to write data to ram that was not a multiple of 4 bytes
    InvalidWriteLength(usize),
    /// The length of a CRC transfer does not fit its 8 bit length field, or a
    /// DWORD array exceeds the transfer buffer
    TransferTooLong(usize),
    /// Tried to transmit a message with a FIFO not configured for transmission
    FifoNotTx,
    /// Tried to read a message from a FIFO not configured for reception
    FifoNotRx,
    /// Payload is longer than the DLC of the supplied header
    PayloadTooLarge,
    /// Tried to send a message that was too big for the FIFO
    FifoTooSmall,
    /// FIFO is already full and can not take any more messages
    FifoFull,
    /// Requested receive buffer would need a transfer larger than a complete
    /// message object
    ReadTooLarge,
    /// FIFO depth outside of 1..=32
    InvalidFifoSize(u8),
    /// No bit time table entry for the requested rate at this clock
    BitTimeInfeasible,
}

/// Largest DWORD array moved with [`MCP2517FD::read_dword_array`] or
/// [`MCP2517FD::write_dword_array`]
pub const MAX_DWORD_ARRAY_LEN: usize = 32;

/// Driver for the MCP2517FD / MCP2518FD. Every method issues complete SPI
/// transactions and caches nothing, so the chip is always the source of truth.
pub struct MCP2517FD<SPI> {
    pub(crate) spi: SPI,
}

#[cfg_attr(not(feature = "async"), maybe_async::maybe_async)]
impl<SPI, SPIE> MCP2517FD<SPI>
where
    SPI: SpiDevice<u8, Error = SPIE>,
    SPIE: Debug,
{
    /// Constructs a new controller handle from an SPI device
    pub fn new(spi: SPI) -> MCP2517FD<SPI> {
        Self { spi }
    }

    /// Releases ownership of the SPI resources
    pub fn free(self) -> SPI {
        self.spi
    }

    /// Performs a software reset of the chip over SPI (this puts it in
    /// configuration mode)
    pub async fn reset(&mut self) -> Result<(), Error> {
        let instruction = Instruction::new(OpCode::RESET, 0);

        self.spi
            .write(&instruction.into_spi_data())
            .await
            .map_err(|_| Error::SPIWrite)?;

        Ok(())
    }

    /* Device wide configuration */

    /// Writes CiCON in a single transfer. Fields not covered by `config`
    /// take their reset values, which keeps the chip requesting
    /// configuration mode.
    pub async fn configure(&mut self, config: &CanConfiguration) -> Result<(), Error> {
        self.write_register(config.to_register()).await
    }

    /// Current operation mode as reported by CiCON.OPMOD
    pub async fn operation_mode(&mut self) -> Result<OperationMode, Error> {
        let opmod = self.read_byte(CanControlRegister::OPMOD_ADDRESS).await?;

        Ok(OperationMode::from_bits(opmod >> 5))
    }

    /// Requests a new operation mode. The chip switches once the bus is idle,
    /// poll [`MCP2517FD::operation_mode`] to find out when.
    pub async fn request_operation_mode(&mut self, mode: OperationMode) -> Result<(), Error> {
        let address = CanControlRegister::REQOP_ADDRESS;
        let byte = self.read_byte(address).await?;

        self.write_byte(address, (byte & !0x07) | u8::from(mode))
            .await
    }

    /// Sets the delay between two consecutive transmissions (CiCON.TXBWS)
    pub async fn set_tx_bandwidth_sharing(
        &mut self,
        delay: InterTransmissionDelay,
    ) -> Result<(), Error> {
        let address = CanControlRegister::REQOP_ADDRESS;
        let byte = self.read_byte(address).await?;

        self.write_byte(address, (byte & 0x0F) | u8::from(delay) << 4)
            .await
    }

    /// Number of data bits matched by DeviceNet filtering, `None` turns it off
    pub async fn set_device_net_filter_count(
        &mut self,
        bits: Option<DataBits>,
    ) -> Result<(), Error> {
        let byte = self.read_byte(CICON).await?;
        let count = bits.map_or(0, u8::from);

        self.write_byte(CICON, (byte & !0x1F) | count).await
    }

    /* Generic register ops with mapping */

    pub async fn modify_repeated_register<R, F>(
        &mut self,
        index: R::Index,
        transform: F,
    ) -> Result<(), Error>
    where
        R: RepeatedRegister + From<u32> + Into<u32>,
        F: FnOnce(R) -> R,
    {
        let register = self.read_repeated_register::<R>(index).await?;

        self.write_repeated_register::<R>(index, transform(register))
            .await
    }

    pub async fn read_repeated_register<R>(&mut self, index: R::Index) -> Result<R, Error>
    where
        R: RepeatedRegister + From<u32>,
    {
        self.read_dword(R::address_for(index)).await.map(R::from)
    }

    pub async fn write_repeated_register<R>(
        &mut self,
        index: R::Index,
        value: R,
    ) -> Result<(), Error>
    where
        R: RepeatedRegister + Into<u32>,
    {
        self.write_dword(R::address_for(index), value.into()).await
    }

    pub async fn modify_register<R, F>(&mut self, transform: F) -> Result<(), Error>
    where
        R: Register + From<u32> + Into<u32>,
        F: FnOnce(R) -> R,
    {
        let register = self.read_register::<R>().await?;

        self.write_register::<R>(transform(register)).await
    }

    pub async fn read_register<R>(&mut self) -> Result<R, Error>
    where
        R: Register + From<u32>,
    {
        self.read_dword(R::ADDRESS).await.map(R::from)
    }

    pub async fn write_register<R>(&mut self, value: R) -> Result<(), Error>
    where
        R: Register + Into<u32>,
    {
        self.write_dword(R::ADDRESS, value.into()).await
    }

    /* Scalar access. Multi byte values are little endian on the chip. */

    pub async fn read_byte(&mut self, address: u16) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read_array(address, &mut buf).await?;

        Ok(buf[0])
    }

    pub async fn write_byte(&mut self, address: u16, value: u8) -> Result<(), Error> {
        self.write_array(address, &[value]).await
    }

    pub async fn read_word(&mut self, address: u16) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.read_array(address, &mut buf).await?;

        Ok(u16::from_le_bytes(buf))
    }

    pub async fn write_word(&mut self, address: u16, value: u16) -> Result<(), Error> {
        self.write_array(address, &value.to_le_bytes()).await
    }

    pub async fn read_dword(&mut self, address: u16) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.read_array(address, &mut buf).await?;

        Ok(u32::from_le_bytes(buf))
    }

    pub async fn write_dword(&mut self, address: u16, value: u32) -> Result<(), Error> {
        self.write_array(address, &value.to_le_bytes()).await
    }

    /* Array access */

    /// Reads consecutive bytes starting at `address` in one transaction
    pub async fn read_array(&mut self, address: u16, data: &mut [u8]) -> Result<(), Error> {
        check_range(address, data.len())?;

        let instruction = Instruction::new(OpCode::READ, address);

        self.spi
            .transaction(&mut [
                Operation::Write(&instruction.into_spi_data()),
                Operation::Read(data),
            ])
            .await
            .map_err(|_| Error::SPIRead)?;

        Ok(())
    }

    /// Writes consecutive bytes starting at `address` in one transaction
    pub async fn write_array(&mut self, address: u16, data: &[u8]) -> Result<(), Error> {
        check_range(address, data.len())?;

        let instruction = Instruction::new(OpCode::WRITE, address);

        self.spi
            .transaction(&mut [
                Operation::Write(&instruction.into_spi_data()),
                Operation::Write(data),
            ])
            .await
            .map_err(|_| Error::SPIWrite)?;

        Ok(())
    }

    /// Reads consecutive registers in one transaction
    pub async fn read_dword_array(&mut self, address: u16, data: &mut [u32]) -> Result<(), Error> {
        if data.len() > MAX_DWORD_ARRAY_LEN {
            return Err(Error::TransferTooLong(data.len() * 4));
        }

        let mut buf = [0u8; MAX_DWORD_ARRAY_LEN * 4];
        let bytes = &mut buf[..data.len() * 4];

        self.read_array(address, bytes).await?;

        for (dword, chunk) in data.iter_mut().zip(bytes.chunks_exact(4)) {
            *dword = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        Ok(())
    }

    /// Writes consecutive registers in one transaction
    pub async fn write_dword_array(&mut self, address: u16, data: &[u32]) -> Result<(), Error> {
        if data.len() > MAX_DWORD_ARRAY_LEN {
            return Err(Error::TransferTooLong(data.len() * 4));
        }

        let mut buf = [0u8; MAX_DWORD_ARRAY_LEN * 4];

        for (dword, chunk) in data.iter().zip(buf.chunks_exact_mut(4)) {
            chunk.copy_from_slice(&dword.to_le_bytes());
        }

        self.write_array(address, &buf[..data.len() * 4]).await
    }

    /* RAM related functions */

    /// Reads a contiguous range from RAM into the provided buffer
    pub async fn read_ram(&mut self, address: u16, data: &mut [u8]) -> Result<(), Error> {
        is_valid_ram_address(address as u32, data.len())
            .then_some(())
            .ok_or(Error::InvalidRamAddress(address))?;

        if data.len() % 4 != 0 {
            return Err(Error::InvalidReadLength(data.len()));
        }

        self.read_array(address, data).await
    }

    /// Writes to a contiguous range in RAM from the provided buffer
    pub async fn write_ram(&mut self, address: u16, data: &[u8]) -> Result<(), Error> {
        is_valid_ram_address(address as u32, data.len())
            .then_some(())
            .ok_or(Error::InvalidRamAddress(address))?;

        if data.len() % 4 != 0 {
            return Err(Error::InvalidWriteLength(data.len()));
        }

        self.write_array(address, data).await
    }

    /* CRC protected access */

    /// Reads with a CRC trailer. The buffer is filled either way, `Ok(false)`
    /// means the received CRC did not match and the data should not be
    /// trusted.
    ///
    /// The length byte counts DWORDs when `address` lies in message RAM
    /// (0x400..0xC00) and bytes everywhere else.
    pub async fn read_array_with_crc(
        &mut self,
        address: u16,
        data: &mut [u8],
    ) -> Result<bool, Error> {
        check_range(address, data.len())?;

        let length = crc_length_field(address, data.len(), Error::InvalidReadLength)?;
        let instruction = Instruction::new(OpCode::READ_CRC, address).into_spi_data();
        let command = [instruction[0], instruction[1], length];
        let mut trailer = [0u8; 2];

        self.spi
            .transaction(&mut [
                Operation::Write(&command),
                Operation::Read(data),
                Operation::Read(&mut trailer),
            ])
            .await
            .map_err(|_| Error::SPIRead)?;

        let mut crc = Crc16::new();
        crc.update(&command);
        crc.update(data);

        let matches = crc.finalize() == u16::from_be_bytes(trailer);

        #[cfg(feature = "defmt")]
        if !matches {
            defmt::warn!("CRC mismatch reading {} bytes at {=u16:#x}", data.len(), address);
        }

        Ok(matches)
    }

    /// Writes with a CRC trailer. The chip drops the write and raises
    /// CRCERRIF if the trailer does not match.
    ///
    /// The length byte counts DWORDs when `address` lies in message RAM
    /// (0x400..0xC00) and bytes everywhere else.
    pub async fn write_array_with_crc(&mut self, address: u16, data: &[u8]) -> Result<(), Error> {
        check_range(address, data.len())?;

        let length = crc_length_field(address, data.len(), Error::InvalidWriteLength)?;
        let instruction = Instruction::new(OpCode::WRITE_CRC, address).into_spi_data();
        let command = [instruction[0], instruction[1], length];

        let mut crc = Crc16::new();
        crc.update(&command);
        crc.update(data);
        let trailer = crc.finalize().to_be_bytes();

        self.spi
            .transaction(&mut [
                Operation::Write(&command),
                Operation::Write(data),
                Operation::Write(&trailer),
            ])
            .await
            .map_err(|_| Error::SPIWrite)?;

        Ok(())
    }

    /// Single byte write the chip only commits if the CRC matches
    pub async fn write_byte_safe(&mut self, address: u16, value: u8) -> Result<(), Error> {
        self.write_safe(address, &[value]).await
    }

    /// Single register write the chip only commits if the CRC matches
    pub async fn write_dword_safe(&mut self, address: u16, value: u32) -> Result<(), Error> {
        self.write_safe(address, &value.to_le_bytes()).await
    }

    async fn write_safe(&mut self, address: u16, data: &[u8]) -> Result<(), Error> {
        check_range(address, data.len())?;

        let command = Instruction::new(OpCode::WRITE_SAFE, address).into_spi_data();

        let mut crc = Crc16::new();
        crc.update(&command);
        crc.update(data);
        let trailer = crc.finalize().to_be_bytes();

        self.spi
            .transaction(&mut [
                Operation::Write(&command),
                Operation::Write(data),
                Operation::Write(&trailer),
            ])
            .await
            .map_err(|_| Error::SPIWrite)?;

        Ok(())
    }
}

fn check_range(address: u16, len: usize) -> Result<(), Error> {
    if address as usize + len > MAX_ADDRESS as usize + 1 {
        return Err(Error::InvalidAddress(address));
    }

    Ok(())
}

/// Length byte of READ_CRC/WRITE_CRC. RAM is counted in DWORDs, SFR space in
/// bytes.
fn crc_length_field(
    address: u16,
    len: usize,
    invalid_length: fn(usize) -> Error,
) -> Result<u8, Error> {
    let count = if is_ram_address(address) {
        if len % 4 != 0 {
            return Err(invalid_length(len));
        }
        len >> 2
    } else {
        len
    };

    u8::try_from(count).map_err(|_| Error::TransferTooLong(len))
}

/* Low level SPI instruction encoding */

bitfield! {
    struct Instruction(u16);
    impl Debug;
    u16;
    pub op_code, set_op_code: 15, 12;
    pub address, set_address: 11, 0;
}

impl Instruction {
    fn new(op_code: u16, address: u16) -> Self {
        let mut instruction = Instruction(0);
        instruction.set_op_code(op_code);
        instruction.set_address(address);
        instruction
    }

    pub fn into_spi_data(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

pub(crate) struct OpCode;

impl OpCode {
    pub const RESET: u16 = 0b0000;
    pub const WRITE: u16 = 0b0010;
    pub const READ: u16 = 0b0011;
    pub const WRITE_CRC: u16 = 0b1010;
    pub const READ_CRC: u16 = 0b1011;
    pub const WRITE_SAFE: u16 = 0b1100;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_encoding() {
        assert_eq!(Instruction::new(OpCode::READ, 0x0E14).into_spi_data(), [0x3E, 0x14]);
        assert_eq!(Instruction::new(OpCode::WRITE, 0x0051).into_spi_data(), [0x20, 0x51]);
        assert_eq!(Instruction::new(OpCode::WRITE_SAFE, 0x0FFF).into_spi_data(), [0xCF, 0xFF]);
        assert_eq!(Instruction::new(OpCode::RESET, 0).into_spi_data(), [0, 0]);
    }

    #[test]
    fn crc_length_counts_words_in_ram() {
        assert_eq!(crc_length_field(0x400, 76, Error::InvalidReadLength), Ok(19));
        assert_eq!(crc_length_field(0x004, 4, Error::InvalidReadLength), Ok(4));
        assert_eq!(
            crc_length_field(0x400, 6, Error::InvalidReadLength),
            Err(Error::InvalidReadLength(6))
        );
        assert_eq!(
            crc_length_field(0x000, 256, Error::InvalidReadLength),
            Err(Error::TransferTooLong(256))
        );
    }

    #[test]
    fn address_range() {
        assert!(check_range(0xFFC, 4).is_ok());
        assert_eq!(check_range(0xFFD, 4), Err(Error::InvalidAddress(0xFFD)));
    }
}
