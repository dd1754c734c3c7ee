//! Sizing constants and the growth rule.

/// Capacity used when the caller passes a hint of zero.
pub const DEFAULT_CAPACITY: usize = 256;

/// Smallest bucket count a table is created with.
pub const MIN_CAPACITY: usize = 8;

/// Growth triggers once `len / capacity` exceeds
/// `MAX_LOAD_NUMERATOR / MAX_LOAD_DENOMINATOR`.
pub const MAX_LOAD_NUMERATOR: usize = 3;
pub const MAX_LOAD_DENOMINATOR: usize = 4;

/// Each growth multiplies the bucket count by this factor.
pub const GROWTH_FACTOR: usize = 2;

const MAX_CAPACITY: usize = 1 << (usize::BITS - 1);

/// Turn a caller hint into a bucket count: zero means default, small hints
/// are raised to the minimum, and the result is always a power of two.
pub fn normalize_capacity(hint: usize) -> usize {
    if hint == 0 {
        return DEFAULT_CAPACITY;
    }
    hint.max(MIN_CAPACITY)
        .checked_next_power_of_two()
        .unwrap_or(MAX_CAPACITY)
}

/// Capacity to grow to from `capacity`, or `None` at the ceiling.
pub(crate) fn grown_capacity(capacity: usize) -> Option<usize> {
    capacity.checked_mul(GROWTH_FACTOR)
}

#[inline]
pub(crate) fn exceeds_load(len: usize, capacity: usize) -> bool {
    len.saturating_mul(MAX_LOAD_DENOMINATOR) > capacity.saturating_mul(MAX_LOAD_NUMERATOR)
}

/// `capacity` is a power of two.
#[inline]
pub(crate) fn bucket_index(hash: u64, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash as usize) & (capacity - 1)
}
