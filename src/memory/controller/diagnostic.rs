use bitfield::bitfield;

use crate::memory::address::{CIBDIAG0, CIBDIAG1, CITREC};
use crate::{impl_register, impl_to_from_u32};

bitfield! {
    pub struct TransmitReceiveErrorCountRegister(u32);
    impl Debug;
    u8;
    pub rec, _: 7, 0;
    pub tec, _: 15, 8;
    pub ewarn, _: 16;
    pub rxwarn, _: 17;
    pub txwarn, _: 18;
    pub rxbp, _: 19;
    pub txbp, _: 20;
    pub txbo, _: 21;
    /// EWARN through TXBO as one field
    pub state, _: 21, 16;
}

impl_to_from_u32!(TransmitReceiveErrorCountRegister);
impl_register!(TransmitReceiveErrorCountRegister, CITREC);

bitfield! {
    /// Error counters of both bit rates, read only
    pub struct BusDiagnosticRegister0(u32);
    impl Debug;
    u8;
    pub nrerrcnt, _: 7, 0;
    pub nterrcnt, _: 15, 8;
    pub drerrcnt, _: 23, 16;
    pub dterrcnt, _: 31, 24;
}

impl_to_from_u32!(BusDiagnosticRegister0);
impl_register!(BusDiagnosticRegister0, CIBDIAG0);

bitfield! {
    /// Error free message counter and sticky error flags of the last frames
    pub struct BusDiagnosticRegister1(u32);
    impl Debug;
    u8;
    pub u16, efmsgcnt, _: 15, 0;
    pub u16, flags, _: 31, 16;
    pub nbit0err, _: 16;
    pub nbit1err, _: 17;
    pub nackerr, _: 18;
    pub nformerr, _: 19;
    pub nstuferr, _: 20;
    pub ncrcerr, _: 21;
    pub txboerr, _: 23;
    pub dbit0err, _: 24;
    pub dbit1err, _: 25;
    pub dformerr, _: 27;
    pub dstuferr, _: 28;
    pub dcrcerr, _: 29;
    pub esi, _: 30;
    pub dlcmm, _: 31;
}

impl_to_from_u32!(BusDiagnosticRegister1);
impl_register!(BusDiagnosticRegister1, CIBDIAG1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_counters() {
        // TXWARN | EWARN, TEC 0x60, REC 0x03
        let trec = TransmitReceiveErrorCountRegister::from(0x0005_6003);

        assert_eq!(trec.tec(), 0x60);
        assert_eq!(trec.rec(), 0x03);
        assert!(trec.ewarn());
        assert!(trec.txwarn());
        assert!(!trec.txbo());
        assert_eq!(trec.state(), 0b101);
    }

    #[test]
    fn reset_state_is_bus_off() {
        let trec = TransmitReceiveErrorCountRegister::from(0x0020_0000);
        assert!(trec.txbo());
    }

    #[test]
    fn diagnostic_split() {
        let bdiag1 = BusDiagnosticRegister1::from(0x2004_1234);

        assert_eq!(bdiag1.efmsgcnt(), 0x1234);
        assert_eq!(bdiag1.flags(), 0x2004);
        assert!(bdiag1.nackerr());
        assert!(bdiag1.dcrcerr());
    }
}
