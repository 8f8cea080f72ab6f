use crate::Eeprom;
use crate::platform::Platform;

/// Counterpart of [`crate::Get`]. Writing a value that is already in the buffer does not mark
/// it as modified.
pub trait Put<R> {
    fn put(&mut self, address: usize, value: R);
}

macro_rules! impl_put_le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<T: Platform> Put<$ty> for Eeprom<T> {
                fn put(&mut self, address: usize, value: $ty) {
                    self.store(address, &value.to_le_bytes())
                }
            }
        )*
    };
}

impl_put_le!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl<T: Platform> Put<bool> for Eeprom<T> {
    fn put(&mut self, address: usize, value: bool) {
        self.store(address, &[value as u8])
    }
}

impl<T: Platform> Put<&[u8]> for Eeprom<T> {
    fn put(&mut self, address: usize, value: &[u8]) {
        self.store(address, value)
    }
}

impl<T: Platform, const N: usize> Put<[u8; N]> for Eeprom<T> {
    fn put(&mut self, address: usize, value: [u8; N]) {
        self.store(address, &value)
    }
}

impl<T: Platform, const N: usize> Put<&[u8; N]> for Eeprom<T> {
    fn put(&mut self, address: usize, value: &[u8; N]) {
        self.store(address, value)
    }
}
