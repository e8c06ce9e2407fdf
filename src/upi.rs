//! User Product Identifier sanitizing.

/// Printable prefix of a raw UPI field.
///
/// Scans from the start keeping ASCII letters, digits, `-` and `_`. The
/// first NUL or any other non-kept byte terminates the scan; it is not
/// skipped over. An empty result is valid and means the caller should
/// substitute a fallback token.
#[must_use]
pub fn user_info(upi: &[u8]) -> String {
    upi.iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        .map(|&b| char::from(b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(b"AB\x00CDEF", "AB" ; "nul terminates, not skips")]
    #[test_case(b"SMD-FLOW_2", "SMD-FLOW_2" ; "kept charset")]
    #[test_case(b"\x00WXYZ", "" ; "leading nul")]
    #[test_case(b"CAM 2", "CAM" ; "space terminates")]
    #[test_case(b"", "" ; "empty field")]
    fn sanitizes(raw: &[u8], want: &str) {
        assert_eq!(user_info(raw), want);
    }

    #[test]
    fn full_width_field() {
        let mut upi = [b'A'; 32];
        upi[31] = b'9';
        assert_eq!(user_info(&upi).len(), 32);
    }
}
