use std::ops::RangeInclusive;

pub trait GetBit {
    #[must_use]
    fn bit(self, i: u8) -> bool;

    /// Extract the inclusive bit range, shifted down to bit 0.
    #[must_use]
    fn bits(self, range: RangeInclusive<u8>) -> Self;
}

macro_rules! impl_get_bit {
    ($($t:ty),*) => {
        $(
            impl GetBit for $t {
                #[inline]
                fn bit(self, i: u8) -> bool {
                    debug_assert!(u32::from(i) < <$t>::BITS);
                    self & (1 << i) != 0
                }

                #[inline]
                fn bits(self, range: RangeInclusive<u8>) -> Self {
                    let (start, end) = (*range.start(), *range.end());
                    debug_assert!(start <= end && u32::from(end) < <$t>::BITS);

                    let len = u32::from(end - start + 1);
                    let mask = <$t>::MAX.checked_shr(<$t>::BITS - len).unwrap_or(0);
                    (self >> start) & mask
                }
            }
        )*
    };
}

impl_get_bit!(u8, u16);
