use bitfield::{bitfield, Bit, BitMut};

use crate::memory::address::CITXREQ;
use crate::{impl_register, impl_to_from_u32};

use super::fifo::FifoChannel;

bitfield! {
    /// CiTXREQ. Writing a 1 requests transmission of a channel, writing 0 has
    /// no effect. The controller clears a bit once its FIFO has been sent.
    pub struct TransmitRequestRegister(u32);
    impl Debug;
    u32;
    pub txreq, _: 31, 0;
}

impl TransmitRequestRegister {
    pub fn is_requested(&self, channel: FifoChannel) -> bool {
        self.bit(u8::from(channel) as usize)
    }

    pub fn request(&mut self, channel: FifoChannel) {
        self.set_bit(u8::from(channel) as usize, true)
    }
}

impl FromIterator<FifoChannel> for TransmitRequestRegister {
    fn from_iter<I: IntoIterator<Item = FifoChannel>>(channels: I) -> Self {
        let mut register = Self(0);
        for channel in channels {
            register.request(channel);
        }
        register
    }
}

impl_to_from_u32!(TransmitRequestRegister);
impl_register!(TransmitRequestRegister, CITXREQ);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_mask() {
        let txreq: TransmitRequestRegister =
            [FifoChannel::TxQueue, FifoChannel::Fifo2, FifoChannel::Fifo31]
                .into_iter()
                .collect();

        assert_eq!(txreq.txreq(), 0x8000_0005);
        assert!(txreq.is_requested(FifoChannel::Fifo2));
        assert!(!txreq.is_requested(FifoChannel::Fifo1));
    }
}
