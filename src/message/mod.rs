use embedded_can::{ExtendedId, Id, StandardId};

pub mod rx;
pub mod tx;

/// The length in DWORDs of the TX and RX header objects
pub const HEADER_SIZE_DWORDS: usize = 2;

/// The length in bytes of the TX and RX header objects
pub const HEADER_SIZE: usize = HEADER_SIZE_DWORDS * 4;

/// Size of the optional timestamp following the header
pub const TIMESTAMP_SIZE: usize = 4;

/// The maximum data buffer (payload) size in bytes
pub const MAX_FD_BUFFER_SIZE: usize = 64;

/// Largest message object that is moved over the bus in one transfer:
/// header, timestamp and a full CAN FD payload
pub const MAX_MESSAGE_SIZE: usize = HEADER_SIZE + TIMESTAMP_SIZE + MAX_FD_BUFFER_SIZE;

/// Payload length of every data length code
pub static DLC_TO_LEN: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Smallest DLC able to carry `len` bytes, `None` when the frame format has
/// no DLC that large.
pub fn dlc_for_len(len: usize, is_fd: bool) -> Option<u8> {
    let max_dlc = if is_fd { 15 } else { 8 };
    let dlc = DLC_TO_LEN.partition_point(|&n| n < len);

    (dlc <= max_dlc).then_some(dlc as u8)
}

/// Payload length of a DLC. Classic CAN frames carry at most 8 bytes, DLCs
/// above 8 are treated as 8.
pub fn len_for_dlc(dlc: u8, is_fd: bool) -> Option<usize> {
    let len = *DLC_TO_LEN.get(dlc as usize)?;

    Some(if is_fd { len } else { len.min(8) })
}

/// Rounds a RAM transfer length up to the next DWORD boundary
pub const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Low 18 bits of a 29 bit identifier
const EID_MASK: u32 = 0x3_FFFF;

/// Splits an identifier into the SID and EID fields used by message objects,
/// filters and masks
pub(crate) fn split_id(id: Id) -> (u16, u32) {
    match id {
        Id::Standard(id) => (id.as_raw(), 0),
        Id::Extended(id) => (id.standard_id().as_raw(), id.as_raw() & EID_MASK),
    }
}

/// Inverse of [`split_id`]
pub(crate) fn join_id(sid: u16, eid: u32, ide: bool) -> Option<Id> {
    if ide {
        let raw = (sid as u32) << 18 | (eid & EID_MASK);
        ExtendedId::new(raw).map(Id::Extended)
    } else {
        StandardId::new(sid).map(Id::Standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlc_round_trip() {
        for dlc in 0u8..16 {
            let len = len_for_dlc(dlc, true).unwrap();
            assert_eq!(dlc_for_len(len, true), Some(dlc));
        }
    }

    #[test]
    fn dlc_selects_smallest_fit() {
        assert_eq!(dlc_for_len(0, true), Some(0));
        assert_eq!(dlc_for_len(8, true), Some(8));
        assert_eq!(dlc_for_len(9, true), Some(9));
        assert_eq!(dlc_for_len(13, true), Some(10));
        assert_eq!(dlc_for_len(33, true), Some(14));
        assert_eq!(dlc_for_len(49, true), Some(15));
        assert_eq!(dlc_for_len(64, true), Some(15));
        assert_eq!(dlc_for_len(65, true), None);

        for len in 0..=64 {
            let dlc = dlc_for_len(len, true).unwrap();
            assert!(len_for_dlc(dlc, true).unwrap() >= len);
            if dlc > 0 {
                assert!(len_for_dlc(dlc - 1, true).unwrap() < len);
            }
        }
    }

    #[test]
    fn classic_frames_stop_at_eight() {
        assert_eq!(dlc_for_len(8, false), Some(8));
        assert_eq!(dlc_for_len(9, false), None);
        assert_eq!(len_for_dlc(15, false), Some(8));
        assert_eq!(len_for_dlc(16, true), None);
    }

    #[test]
    fn padding() {
        assert_eq!(padded_len(8 + 3), 12);
        assert_eq!(padded_len(8 + 4), 12);
        assert_eq!(padded_len(8 + 0), 8);
        assert_eq!(padded_len(MAX_MESSAGE_SIZE), 76);
    }

    #[test]
    fn identifier_split() {
        let id = ExtendedId::new(0x18DA_F110).unwrap();
        let (sid, eid) = split_id(Id::Extended(id));

        assert_eq!(sid, (0x18DA_F110_u32 >> 18) as u16);
        assert_eq!(eid, 0x18DA_F110 & 0x3_FFFF);
        assert_eq!(join_id(sid, eid, true), Some(Id::Extended(id)));

        let id = StandardId::new(0x7FF).unwrap();
        assert_eq!(split_id(Id::Standard(id)), (0x7FF, 0));
        assert_eq!(join_id(0x7FF, 0, false), Some(Id::Standard(id)));
    }
}
