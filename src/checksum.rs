//! Pre/post transfer integrity check: a cheap running byte-sum over a
//! record slice, compared before and after the all-to-all exchange so a
//! dropped or duplicated record is caught immediately instead of silently
//! producing a wrong-but-plausible sorted output.

/// Sums every byte of every record's representation, wrapping on overflow.
/// Not a cryptographic checksum — just enough to catch transport bugs.
pub fn byte_checksum<T>(items: &[T]) -> u64 {
    let bytes: &[u8] =
        unsafe { std::slice::from_raw_parts(items.as_ptr() as *const u8, std::mem::size_of_val(items)) };
    bytes.iter().fold(0u64, |acc, &b| acc.wrapping_add(b as u64))
}
