/// Raw conversions between a 32 bit register struct and its DWORD
macro_rules! impl_to_from_u32 {
    ($ident:ident) => {
        impl From<$ident> for u32 {
            fn from(reg: $ident) -> Self {
                reg.0
            }
        }

        impl From<u32> for $ident {
            fn from(int: u32) -> Self {
                Self(int)
            }
        }
    };
}

/// Binds a register struct to its fixed SFR address
macro_rules! impl_register {
    ($ident:ident, $address:expr) => {
        impl $crate::memory::Register for $ident {
            const ADDRESS: u16 = $address;
        }
    };
}

/// Binds a register struct to a block of identical registers, `stride` bytes
/// apart and indexed by a `u8` backed enum
macro_rules! impl_repeated_register {
    ($ident:ident, $index:ty, $base:expr, $stride:expr) => {
        impl $crate::memory::RepeatedRegister for $ident {
            type Index = $index;

            fn address_for(index: Self::Index) -> u16 {
                $base + $stride * u8::from(index) as u16
            }
        }
    };
}

/// Public getter plus a one way setter for a private `_flag` field. The
/// setter can only ever write `$value`.
macro_rules! one_way_flag {
    ($flag:ident, $setter:ident, $value:literal) => {
        concat_idents::concat_idents!(get_name = _, $flag {
            pub fn $flag(&self) -> bool {
                self.get_name()
            }
        });

        concat_idents::concat_idents!(set_name = _set_, $flag {
            pub fn $setter(&mut self) {
                self.set_name($value)
            }
        });
    };
}

/// Status flags that hardware sets and software may only clear (HS/C)
macro_rules! software_clearable {
    ($flag:ident, $clear_name:ident) => {
        $crate::macros::one_way_flag!($flag, $clear_name, false);
    };
}

/// Command bits that software may only set (S/HC), the controller clears them
/// once the command has been carried out.
macro_rules! software_settable {
    ($flag:ident, $set_name:ident) => {
        $crate::macros::one_way_flag!($flag, $set_name, true);
    };
}

pub(crate) use impl_register;
pub(crate) use impl_repeated_register;
pub(crate) use impl_to_from_u32;
pub(crate) use one_way_flag;
pub(crate) use software_clearable;
pub(crate) use software_settable;
