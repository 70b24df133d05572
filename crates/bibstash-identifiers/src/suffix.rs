//! Bijective base-26 letter suffixes
//!
//! Citation key collisions are resolved by appending a lowercase letter
//! suffix drawn from the bijective base-26 sequence: `a, b, ..., z, aa,
//! ab, ..., az, ba, ..., zz, aaa, ...`. Bijective means every positive
//! index maps to exactly one suffix and no suffix is skipped or repeated,
//! which keeps suffixed keys dense and predictable.

/// Return the 1-indexed bijective base-26 suffix for `n`.
///
/// `1 -> "a"`, `26 -> "z"`, `27 -> "aa"`, `702 -> "zz"`, `703 -> "aaa"`.
pub fn letter_suffix(n: u32) -> String {
    debug_assert!(n >= 1, "suffix indices are 1-based");
    let mut n = n as u64;
    let mut digits = Vec::new();
    while n > 0 {
        n -= 1;
        digits.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    digits.reverse();
    // Digits are always ASCII lowercase letters
    String::from_utf8(digits).unwrap()
}
