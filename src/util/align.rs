//! Utilities for aligning addresses

use std::ops::{Add, BitAnd, Not, Sub};

/// Round a value up to the next multiple of `alignment`, which must be a power of two.
pub fn align_up<T>(value: T, alignment: T) -> T
where
    T: Add<T, Output = T> + Sub<T, Output = T> + BitAnd<T, Output = T> + Not<Output = T> + From<u8> + Copy, {
    let mask = alignment - T::from(1u8);
    (value + mask) & !mask
}

/// Whether a value is a multiple of `alignment`, which must be a power of two.
pub fn is_aligned<T>(value: T, alignment: T) -> bool
where
    T: Sub<T, Output = T> + BitAnd<T, Output = T> + From<u8> + PartialEq + Copy, {
    value & (alignment - T::from(1u8)) == T::from(0u8)
}
