use bitfield::bitfield;
use embedded_can::Id;

use super::{
    dlc_for_len, join_id, len_for_dlc, split_id, HEADER_SIZE, HEADER_SIZE_DWORDS,
    MAX_FD_BUFFER_SIZE,
};

bitfield! {
    pub struct TxHeader([u32]);
    impl Debug;
    u8;

    // T0
    pub u16, sid, set_sid: 10, 0;
    pub u32, eid, set_eid: 28, 11;
    pub sid11, set_sid11: 29;

    // T1
    pub dlc, set_dlc: 35, 32;
    pub ide, set_ide: 36;
    pub rtr, set_rtr: 37;
    pub brs, set_brs: 38;
    pub fdf, set_fdf: 39;
    pub esi, set_esi: 40;
    pub u32, seq, set_seq: 63, 41;
}

/// Owned header of a transmit or transmit event object
pub type TxHeaderWords = TxHeader<[u32; HEADER_SIZE_DWORDS]>;

impl TxHeaderWords {
    pub fn new(identifier: Id, dlc: u8, is_fd: bool) -> Self {
        let mut header = TxHeader([0u32; HEADER_SIZE_DWORDS]);
        let (sid, eid) = split_id(identifier);

        header.set_sid(sid);
        header.set_eid(eid);
        header.set_ide(matches!(identifier, Id::Extended(_)));
        header.set_dlc(dlc);
        header.set_fdf(is_fd);
        header
    }

    /// Parses the first two little endian DWORDs of a message object
    pub fn from_le_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        TxHeader([
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        ])
    }

    pub fn to_le_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.0[0].to_le_bytes());
        bytes[4..].copy_from_slice(&self.0[1].to_le_bytes());
        bytes
    }

    pub fn id(&self) -> Option<Id> {
        join_id(self.sid(), self.eid(), self.ide())
    }

    /// Number of payload bytes announced by the DLC
    pub fn data_len(&self) -> usize {
        len_for_dlc(self.dlc(), self.fdf()).unwrap_or(0)
    }
}

impl Clone for TxHeaderWords {
    fn clone(&self) -> Self {
        TxHeader(self.0)
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxMessage {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    header: TxHeaderWords,
    data: [u8; MAX_FD_BUFFER_SIZE],
}

impl TxMessage {
    pub fn new_fd(identifier: Id, data: &[u8]) -> Option<Self> {
        Self::new(identifier, data, true)
    }

    pub fn new_2_0(identifier: Id, data: &[u8]) -> Option<Self> {
        Self::new(identifier, data, false)
    }

    /// Lengths without an exact DLC are padded with zeros up to the next
    /// DLC size.
    fn new(identifier: Id, data: &[u8], is_fd: bool) -> Option<Self> {
        let dlc = dlc_for_len(data.len(), is_fd)?;

        let mut data_buf = [0u8; MAX_FD_BUFFER_SIZE];
        data_buf[..data.len()].copy_from_slice(data);

        Some(Self {
            header: TxHeaderWords::new(identifier, dlc, is_fd),
            data: data_buf,
        })
    }

    pub fn with_remote(mut self, rtr: bool) -> Self {
        self.header.set_rtr(rtr);
        self
    }

    pub fn with_bit_rate_switched(mut self, brs: bool) -> Self {
        self.header.set_brs(brs);
        self
    }

    pub fn with_error_status_indicator(mut self, esi: bool) -> Self {
        self.header.set_esi(esi);
        self
    }

    /// Sequence number echoed into the transmit event FIFO
    pub fn with_sequence_number(mut self, seq: u32) -> Self {
        self.header.set_seq(seq);
        self
    }

    pub fn header(&self) -> &TxHeaderWords {
        &self.header
    }

    /// Payload including the zero padding implied by the DLC
    pub fn data(&self) -> &[u8] {
        &self.data[..self.header.data_len()]
    }
}

/// Entry of the transmit event FIFO describing a frame that left the
/// controller
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxEventObject {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub header: TxHeaderWords,
    pub timestamp: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_can::{ExtendedId, StandardId};

    #[test]
    fn standard_header_layout() {
        let id = Id::Standard(StandardId::new(0x123).unwrap());
        let msg = TxMessage::new_fd(id, &[1, 2, 3]).unwrap();

        assert_eq!(msg.header().0[0], 0x123);
        assert_eq!(msg.header().dlc(), 3);
        assert!(msg.header().fdf());
        assert!(!msg.header().ide());
        assert_eq!(msg.header().id(), Some(id));
        assert_eq!(msg.data(), &[1, 2, 3]);
    }

    #[test]
    fn extended_header_layout() {
        let raw = 0x1234_5678 & ExtendedId::MAX.as_raw();
        let id = Id::Extended(ExtendedId::new(raw).unwrap());
        let msg = TxMessage::new_2_0(id, &[0xAA; 8])
            .unwrap()
            .with_sequence_number(0x55);

        assert!(msg.header().ide());
        assert!(!msg.header().fdf());
        assert_eq!(msg.header().sid(), (raw >> 18) as u16);
        assert_eq!(msg.header().eid(), raw & 0x3_FFFF);
        assert_eq!(msg.header().seq(), 0x55);
        assert_eq!(msg.header().0[1] >> 9, 0x55);
        assert_eq!(msg.header().id(), Some(id));
    }

    #[test]
    fn payload_padded_to_dlc() {
        let id = Id::Standard(StandardId::ZERO);
        let msg = TxMessage::new_fd(id, &[7; 10]).unwrap();

        assert_eq!(msg.header().dlc(), 9);
        assert_eq!(msg.data().len(), 12);
        assert_eq!(&msg.data()[10..], &[0, 0]);

        assert!(TxMessage::new_2_0(id, &[0; 9]).is_none());
        assert!(TxMessage::new_fd(id, &[0; 65]).is_none());
    }

    #[test]
    fn header_bytes_are_little_endian() {
        let id = Id::Standard(StandardId::new(0x7FF).unwrap());
        let header = TxHeaderWords::new(id, 8, false);
        let bytes = header.to_le_bytes();

        assert_eq!(bytes, [0xFF, 0x07, 0, 0, 0x08, 0, 0, 0]);
        assert_eq!(TxHeaderWords::from_le_bytes(&bytes).0, header.0);
    }
}
