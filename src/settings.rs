use arbitrary_int::u5;
use embedded_can::Id;

use crate::memory::address::{CICON, CIFIFOCON, CITEFCON};
use crate::memory::controller::{
    configuration::{CanControlRegister, DataBits, InterTransmissionDelay, WakeupFilterTime},
    fifo::{
        FifoChannel, FifoControlRegister, PayloadSize, RetransmissionAttempts,
        TxEventFifoControlRegister,
    },
};
use crate::memory::reset_value;

/// Device wide settings held in CiCON
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanConfiguration {
    /// DeviceNet filter bit count, `None` disables DeviceNet filtering
    pub data_bits_to_match: Option<DataBits>,
    pub iso_crc_enable: bool,
    pub protocol_exception_event_disable: bool,
    pub wake_up_filter_enable: bool,
    pub wake_up_filter_time: WakeupFilterTime,
    pub bit_rate_switch_disable: bool,
    pub restrict_retransmission_attempts: bool,
    pub esi_in_gateway_mode: bool,
    pub system_error_to_listen_only: bool,
    pub store_in_tef: bool,
    pub tx_queue_enable: bool,
    pub tx_bandwidth_sharing: InterTransmissionDelay,
}

impl CanConfiguration {
    /// Settings as they are after a reset of the controller
    pub fn from_reset_values() -> Self {
        Self::from(CanControlRegister::from(reset_value(CICON).unwrap_or_default()))
    }

    pub fn with_data_bits_to_match(mut self, data_bits_to_match: Option<DataBits>) -> Self {
        self.data_bits_to_match = data_bits_to_match;
        self
    }

    pub fn with_iso_crc(mut self, iso_crc_enable: bool) -> Self {
        self.iso_crc_enable = iso_crc_enable;
        self
    }

    pub fn with_protocol_exception_event_disable(mut self, disable: bool) -> Self {
        self.protocol_exception_event_disable = disable;
        self
    }

    pub fn with_wake_up_filter(mut self, enable: bool, time: WakeupFilterTime) -> Self {
        self.wake_up_filter_enable = enable;
        self.wake_up_filter_time = time;
        self
    }

    pub fn with_bit_rate_switch_disable(mut self, bit_rate_switch_disable: bool) -> Self {
        self.bit_rate_switch_disable = bit_rate_switch_disable;
        self
    }

    /// When set, the per FIFO retransmission attempt limits apply, otherwise
    /// retransmission is unlimited
    pub fn with_restricted_retransmission_attempts(mut self, restrict: bool) -> Self {
        self.restrict_retransmission_attempts = restrict;
        self
    }

    pub fn with_esi_in_gateway_mode(mut self, esi_in_gateway_mode: bool) -> Self {
        self.esi_in_gateway_mode = esi_in_gateway_mode;
        self
    }

    pub fn with_system_error_to_listen_only(mut self, system_error_to_listen_only: bool) -> Self {
        self.system_error_to_listen_only = system_error_to_listen_only;
        self
    }

    pub fn with_store_in_tef(mut self, store_in_tef: bool) -> Self {
        self.store_in_tef = store_in_tef;
        self
    }

    pub fn with_tx_queue(mut self, tx_queue_enable: bool) -> Self {
        self.tx_queue_enable = tx_queue_enable;
        self
    }

    pub fn with_tx_bandwidth_sharing(mut self, delay: InterTransmissionDelay) -> Self {
        self.tx_bandwidth_sharing = delay;
        self
    }

    /// Control word to write, starting from the reset value so REQOP keeps
    /// requesting configuration mode
    pub fn to_register(&self) -> CanControlRegister {
        let mut cicon = CanControlRegister::from(reset_value(CICON).unwrap_or_default());

        cicon.set_dncnt(self.data_bits_to_match);
        cicon.set_isocrcen(self.iso_crc_enable);
        cicon.set_pxedis(self.protocol_exception_event_disable);
        cicon.set_wakfil(self.wake_up_filter_enable);
        cicon.set_wft(self.wake_up_filter_time);
        cicon.set_brsdis(self.bit_rate_switch_disable);
        cicon.set_rtxat(self.restrict_retransmission_attempts);
        cicon.set_esigm(self.esi_in_gateway_mode);
        cicon.set_serr2lom(self.system_error_to_listen_only);
        cicon.set_stef(self.store_in_tef);
        cicon.set_txqen(self.tx_queue_enable);
        cicon.set_txbws(self.tx_bandwidth_sharing);

        cicon
    }
}

impl From<CanControlRegister> for CanConfiguration {
    fn from(cicon: CanControlRegister) -> Self {
        Self {
            data_bits_to_match: cicon.dncnt(),
            iso_crc_enable: cicon.isocrcen(),
            protocol_exception_event_disable: cicon.pxedis(),
            wake_up_filter_enable: cicon.wakfil(),
            wake_up_filter_time: cicon.wft().unwrap_or_default(),
            bit_rate_switch_disable: cicon.brsdis(),
            restrict_retransmission_attempts: cicon.rtxat(),
            esi_in_gateway_mode: cicon.esigm(),
            system_error_to_listen_only: cicon.serr2lom(),
            store_in_tef: cicon.stef(),
            tx_queue_enable: cicon.txqen(),
            tx_bandwidth_sharing: cicon.txbws(),
        }
    }
}

fn fifo_reset_register() -> FifoControlRegister {
    FifoControlRegister::from(reset_value(CIFIFOCON).unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxEventFifoConfiguration {
    /// Number of event objects (1 to 32)
    pub fifo_size: u8,
    pub enable_timestamps: bool,
}

impl TxEventFifoConfiguration {
    pub fn new(fifo_size: u8) -> Self {
        Self {
            fifo_size,
            ..Self::from_reset_values()
        }
    }

    pub fn from_reset_values() -> Self {
        let tefcon = TxEventFifoControlRegister::from(reset_value(CITEFCON).unwrap_or_default());

        Self {
            fifo_size: tefcon.fifo_size(),
            enable_timestamps: tefcon.teftsen(),
        }
    }

    pub fn with_timestamps(mut self, enable_timestamps: bool) -> Self {
        self.enable_timestamps = enable_timestamps;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxQueueConfiguration {
    pub message_priority: u5,
    pub retransmission_attempts: RetransmissionAttempts,
    /// Number of message objects (1 to 32)
    pub fifo_size: u8,
    pub payload_size: PayloadSize,
}

impl TxQueueConfiguration {
    pub fn new(message_priority: u5, fifo_size: u8, payload_size: PayloadSize) -> Self {
        Self {
            message_priority,
            fifo_size,
            payload_size,
            ..Self::from_reset_values()
        }
    }

    pub fn from_reset_values() -> Self {
        let txqcon = fifo_reset_register();

        Self {
            message_priority: txqcon.txpri(),
            retransmission_attempts: txqcon.retransmission_attempts(),
            fifo_size: txqcon.fifo_size(),
            payload_size: txqcon.payload_size(),
        }
    }

    pub fn with_retransmission_attempts(
        mut self,
        retransmission_attempts: RetransmissionAttempts,
    ) -> Self {
        self.retransmission_attempts = retransmission_attempts;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxFifoConfiguration {
    /// See [`crate::memory::controller::fifo::HIGHEST_FIFO_PRIORITY`]
    pub priority: u5,
    pub retransmission_attempts: RetransmissionAttempts,
    pub enable_auto_rtr: bool,
    /// Number of message objects (1 to 32)
    pub fifo_size: u8,
    pub payload_size: PayloadSize,
}

impl TxFifoConfiguration {
    pub fn new(priority: u5, fifo_size: u8, payload_size: PayloadSize) -> Self {
        Self {
            priority,
            fifo_size,
            payload_size,
            ..Self::from_reset_values()
        }
    }

    pub fn from_reset_values() -> Self {
        let fifocon = fifo_reset_register();

        Self {
            priority: fifocon.txpri(),
            retransmission_attempts: fifocon.retransmission_attempts(),
            enable_auto_rtr: fifocon.rtren(),
            fifo_size: fifocon.fifo_size(),
            payload_size: fifocon.payload_size(),
        }
    }

    pub fn with_retransmission_attempts(
        mut self,
        retransmission_attempts: RetransmissionAttempts,
    ) -> Self {
        self.retransmission_attempts = retransmission_attempts;
        self
    }

    pub fn with_auto_rtr(mut self, enable_auto_rtr: bool) -> Self {
        self.enable_auto_rtr = enable_auto_rtr;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxFifoConfiguration {
    /// Number of message objects (1 to 32)
    pub fifo_size: u8,
    pub payload_size: PayloadSize,
    pub enable_message_timestamps: bool,
}

impl RxFifoConfiguration {
    pub fn new(fifo_size: u8, payload_size: PayloadSize) -> Self {
        Self {
            fifo_size,
            payload_size,
            ..Self::from_reset_values()
        }
    }

    pub fn from_reset_values() -> Self {
        let fifocon = fifo_reset_register();

        Self {
            fifo_size: fifocon.fifo_size(),
            payload_size: fifocon.payload_size(),
            enable_message_timestamps: fifocon.rxtsen(),
        }
    }

    pub fn with_message_timestamps(mut self, enable_message_timestamps: bool) -> Self {
        self.enable_message_timestamps = enable_message_timestamps;
        self
    }
}

/// Acceptance filter routing frames into a receive FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfiguration {
    pub buffer_pointer: FifoChannel,
    pub mode: FilterMatchMode,
    pub filter_bits: Id,
    pub mask_bits: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterMatchMode {
    StandardOnly,
    ExtendedOnly,
    Both,
}
