//! UTF-16-counted slicing for the textual sub-formats.

/// Split after `n` UTF-16 code units, the unit the on-disk lengths are
/// written in. `None` if `s` is shorter or the split would fall inside a
/// surrogate pair.
pub(crate) fn split_utf16(s: &str, n: usize) -> Option<(&str, &str)> {
    let mut units = 0;
    for (i, c) in s.char_indices() {
        if units == n {
            return Some(s.split_at(i));
        }
        units += c.len_utf16();
        if units > n {
            return None;
        }
    }
    (units == n).then_some((s, ""))
}

/// Length in UTF-16 code units.
pub(crate) fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Strict hexadecimal: digits only, no sign, no prefix.
pub(crate) fn parse_hex(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}
