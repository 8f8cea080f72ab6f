//! The `Get<T>` trait and its implementations in this module allow a single generic, overloaded
//! function `get<T>()` for all fixed width values. Values are read from the buffer only, the
//! flash is not accessed.

use crate::Eeprom;
use crate::platform::Platform;
use core::mem::size_of;

pub trait Get<R> {
    /// Returns `None` if the value doesn't fit into the buffer at `address`.
    fn get(&self, address: usize) -> Option<R>;
}

macro_rules! impl_get_le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<T: Platform> Get<$ty> for Eeprom<T> {
                fn get(&self, address: usize) -> Option<$ty> {
                    let bytes = self.bytes(address, size_of::<$ty>())?;
                    Some(<$ty>::from_le_bytes(bytes.try_into().ok()?))
                }
            }
        )*
    };
}

impl_get_le!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl<T: Platform> Get<bool> for Eeprom<T> {
    fn get(&self, address: usize) -> Option<bool> {
        self.bytes(address, 1).map(|bytes| bytes[0] != 0)
    }
}

impl<T: Platform, const N: usize> Get<[u8; N]> for Eeprom<T> {
    fn get(&self, address: usize) -> Option<[u8; N]> {
        self.bytes(address, N)?.try_into().ok()
    }
}
