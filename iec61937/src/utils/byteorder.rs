//! Byte-order helpers for IEC 61937 payloads.
//!
//! S/PDIF carries 16-bit words; the capture side delivers them with the two
//! bytes of every word swapped relative to the byte order the codecs expect.

/// Swaps the bytes of every complete 16-bit word in place.
///
/// A trailing odd byte is left untouched.
pub fn swap_words16(buf: &mut [u8]) {
    for word in buf.chunks_exact_mut(2) {
        word.swap(0, 1);
    }
}

pub trait WriteBytesLe {
    fn write_le(&self, dst: &mut Vec<u8>);
}

macro_rules! impl_num_le {
    ($($t:ty),+) => { $(
        impl WriteBytesLe for $t {
            #[inline]
            fn write_le(&self, dst: &mut Vec<u8>) {
                dst.extend_from_slice(&self.to_le_bytes());
            }
        }
    )+ }
}

impl_num_le!(u8, i8, u16, i16, u32, i32);

impl<T: WriteBytesLe> WriteBytesLe for [T] {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }
}

impl<T: WriteBytesLe, const N: usize> WriteBytesLe for [T; N] {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }
}

#[macro_export]
macro_rules! join_bytes_le {
    ( $($value:expr),+ $(,)? ) => {{
        #[allow(unused_imports)]
        use $crate::utils::byteorder::WriteBytesLe;
        let mut vec = Vec::<u8>::new();
        $( $value.write_le(&mut vec); )+
        vec
    }};
}

#[cfg(test)]
mod tests {
    use super::swap_words16;

    #[test]
    fn swaps_whole_words_only() {
        let mut buf = [0x0B, 0x77, 0x12, 0x34, 0xAA];
        swap_words16(&mut buf);
        assert_eq!(buf, [0x77, 0x0B, 0x34, 0x12, 0xAA]);
    }

    #[test]
    fn join_le_words() {
        let bytes = crate::join_bytes_le!(0xF872u16, 0x4E1Fu16, [0x01u8, 0x02]);
        assert_eq!(bytes, [0x72, 0xF8, 0x1F, 0x4E, 0x01, 0x02]);
    }
}
