//! Simulated controller for tests. Decodes the SPI instruction set against a
//! flat 4 KiB address space and logs every transaction.

use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};

use crate::crc::crc16;
use crate::memory::chip::CrcRegister;
use crate::memory::{is_ram_address, reset_value, MAX_ADDRESS};
use crate::spi::OpCode;

const MEMORY_SIZE: usize = MAX_ADDRESS as usize + 1;

/// One chip select cycle as seen on MOSI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub op_code: u16,
    pub address: u16,
    pub mosi: Vec<u8>,
}

impl Transaction {
    pub fn is_write(&self) -> bool {
        matches!(
            self.op_code,
            OpCode::WRITE | OpCode::WRITE_CRC | OpCode::WRITE_SAFE
        )
    }

    /// Bytes following the two instruction bytes
    pub fn data(&self) -> &[u8] {
        self.mosi.get(2..).unwrap_or(&[])
    }
}

pub struct MockController {
    memory: [u8; MEMORY_SIZE],
    pub log: Vec<Transaction>,
    /// Every transaction fails with a bus error
    pub fail: bool,
    /// Trailers of CRC reads are corrupted
    pub corrupt_crc: bool,
}

impl MockController {
    pub fn new() -> Self {
        let mut mock = Self {
            memory: [0; MEMORY_SIZE],
            log: Vec::new(),
            fail: false,
            corrupt_crc: false,
        };
        mock.load_reset_values();
        mock
    }

    fn load_reset_values(&mut self) {
        self.memory = [0; MEMORY_SIZE];

        for address in (0..0x80).step_by(4) {
            if let Some(value) = reset_value(address) {
                self.set_u32(address, value);
            }
        }
    }

    pub fn set_u32(&mut self, address: u16, value: u32) {
        self.set_bytes(address, &value.to_le_bytes());
    }

    pub fn set_bytes(&mut self, address: u16, bytes: &[u8]) {
        let start = address as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn u32_at(&self, address: u16) -> u32 {
        let a = address as usize;
        u32::from_le_bytes([
            self.memory[a],
            self.memory[a + 1],
            self.memory[a + 2],
            self.memory[a + 3],
        ])
    }

    pub fn byte_at(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    pub fn bytes_at(&self, address: u16, len: usize) -> &[u8] {
        &self.memory[address as usize..address as usize + len]
    }

    pub fn writes(&self) -> impl Iterator<Item = &Transaction> {
        self.log.iter().filter(|t| t.is_write())
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn decode(mosi: &[u8]) -> (u16, u16) {
        let instruction = u16::from_be_bytes([mosi[0], mosi[1]]);
        (instruction >> 12, instruction & MAX_ADDRESS)
    }

    /// Number of data bytes announced by the length byte of a CRC instruction
    fn crc_data_len(address: u16, length: u8) -> usize {
        if is_ram_address(address) {
            length as usize * 4
        } else {
            length as usize
        }
    }

    fn respond(&self, mosi: &[u8], offset: usize) -> u8 {
        if mosi.len() < 2 {
            return 0xFF;
        }

        let (op_code, address) = Self::decode(mosi);
        let at = |i: usize| self.memory[(address as usize + i) % MEMORY_SIZE];

        match op_code {
            OpCode::READ => at(offset),
            OpCode::READ_CRC if mosi.len() >= 3 => {
                let n = Self::crc_data_len(address, mosi[2]);

                if offset < n {
                    return at(offset);
                }

                let mut frame = mosi[..3].to_vec();
                frame.extend((0..n).map(at));

                let mut crc = crc16(&frame);
                if self.corrupt_crc {
                    crc ^= 0x0001;
                }

                crc.to_be_bytes().get(offset - n).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn store(&mut self, address: u16, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.memory[(address as usize + i) % MEMORY_SIZE] = *byte;
        }
    }

    fn flag_crc_error(&mut self, flag: u8) {
        self.memory[CrcRegister::FLAGS_ADDRESS as usize] |= flag;
    }

    fn commit(&mut self, mosi: &[u8]) {
        let (op_code, address) = Self::decode(mosi);

        match op_code {
            OpCode::RESET => self.load_reset_values(),
            OpCode::WRITE => self.store(address, &mosi[2..]),
            OpCode::WRITE_CRC => {
                let Some(&length) = mosi.get(2) else {
                    return self.flag_crc_error(0b10);
                };
                let n = Self::crc_data_len(address, length);

                if mosi.len() != n + 5 {
                    return self.flag_crc_error(0b10);
                }

                let expected = u16::from_be_bytes([mosi[n + 3], mosi[n + 4]]);
                if crc16(&mosi[..n + 3]) != expected {
                    return self.flag_crc_error(0b01);
                }

                self.store(address, &mosi[3..n + 3]);
            }
            OpCode::WRITE_SAFE => {
                if mosi.len() < 4 {
                    return self.flag_crc_error(0b10);
                }

                let n = mosi.len() - 4;
                let expected = u16::from_be_bytes([mosi[n + 2], mosi[n + 3]]);

                if crc16(&mosi[..n + 2]) != expected {
                    return self.flag_crc_error(0b01);
                }

                self.store(address, &mosi[2..n + 2]);
            }
            _ => {}
        }
    }
}

impl ErrorType for MockController {
    type Error = ErrorKind;
}

impl SpiDevice<u8> for MockController {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Other);
        }

        let mut mosi = Vec::new();
        let mut offset = 0;

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => mosi.extend_from_slice(bytes),
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.respond(&mosi, offset);
                        offset += 1;
                    }
                }
                Operation::DelayNs(_) => {}
                _ => return Err(ErrorKind::Other),
            }
        }

        if mosi.len() < 2 {
            return Err(ErrorKind::Other);
        }

        self.commit(&mosi);

        let (op_code, address) = Self::decode(&mosi);
        self.log.push(Transaction {
            op_code,
            address,
            mosi,
        });

        Ok(())
    }
}
