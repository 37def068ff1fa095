use bitfield::bitfield;
use embedded_can::Id;

use crate::memory::controller::filter::FilterNumber;

use super::{join_id, len_for_dlc, HEADER_SIZE, HEADER_SIZE_DWORDS, MAX_FD_BUFFER_SIZE};

bitfield! {
    pub struct RxHeader([u32]);
    impl Debug;
    u8;

    /* R0 */

    /// Standard ID
    pub u16, sid, _: 10, 0;
    /// Extended ID
    pub u32, eid, _: 28, 11;
    pub sid11, _: 29;

    /* R1 */

    /// Data Length Code
    pub dlc, _: 35, 32;
    /// ID Extension
    pub ide, _: 36;
    /// Remote Transmission Request
    pub rtr, _: 37;
    /// Bit Rate Switched
    pub brs, _: 38;
    /// FD Frame
    pub fdf, _: 39;
    /// Error Status Indicator
    pub esi, _: 40;
    /// Filter Hit (number of the filter that matched)
    _filhit, _: 47, 43;
}

/// Owned header of a received message object
pub type RxHeaderWords = RxHeader<[u32; HEADER_SIZE_DWORDS]>;

impl RxHeaderWords {
    /// Parses the first two little endian DWORDs of a message object
    pub fn from_le_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        RxHeader([
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        ])
    }
}

impl<T: AsRef<[u32]>> RxHeader<T> {
    /// Returns which filter was matched when receiving this message
    pub fn filter_hit(&self) -> Option<FilterNumber> {
        FilterNumber::try_from(self._filhit()).ok()
    }

    pub fn id(&self) -> Option<Id> {
        join_id(self.sid(), self.eid(), self.ide())
    }

    /// Number of payload bytes announced by the DLC
    pub fn data_len(&self) -> usize {
        len_for_dlc(self.dlc(), self.fdf()).unwrap_or(0)
    }
}

/// Header and timestamp of a dequeued message object, the payload is copied
/// into a caller supplied buffer.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxObject {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub header: RxHeaderWords,
    /// Present when the FIFO captures timestamps
    pub timestamp: Option<u32>,
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxMessage {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    header: RxHeaderWords,
    timestamp: Option<u32>,
    data: [u8; MAX_FD_BUFFER_SIZE],
    data_len: usize,
}

impl RxMessage {
    /// Constructs a new RxMessage from the data found in the chip's RAM.
    /// `data` holds what was read from the message object, which may be
    /// less than the DLC announces when the FIFO payload is smaller.
    pub fn new(object: RxObject, data: &[u8]) -> Option<RxMessage> {
        if data.len() > MAX_FD_BUFFER_SIZE {
            return None;
        }

        let mut buffer = [0u8; MAX_FD_BUFFER_SIZE];
        buffer[..data.len()].copy_from_slice(data);

        Some(Self {
            data_len: object.header.data_len().min(data.len()),
            header: object.header,
            timestamp: object.timestamp,
            data: buffer,
        })
    }

    /// Gets the message header to inspect the low level control bits
    pub fn header(&self) -> &RxHeaderWords {
        &self.header
    }

    /// Gets the message timestamp if the FIFO was configured to include one
    pub fn timestamp(&self) -> Option<u32> {
        self.timestamp
    }

    pub fn id(&self) -> Option<Id> {
        self.header.id()
    }

    /// Creates a slice over the data associated with this message with the
    /// correct length calculated from the DLC
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_len]
    }

    /// Determines from the header whether or not this message is a CAN FD frame
    pub fn is_fd(&self) -> bool {
        self.header.fdf()
    }
}
