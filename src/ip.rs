//! Dotted-quad IPv4 parsing
//!
//! The lookup pipeline works on plain `u32` addresses. These helpers turn
//! the caller's text into that form and never fail loudly: anything that
//! is not a well-formed `a.b.c.d` comes back as `None`.

use std::net::Ipv4Addr;

/// Parse a dotted-quad string into its big-endian 32-bit value
///
/// Returns `None` for a wrong segment count, a non-numeric segment, or an
/// octet outside 0-255. The result is unsigned, with no sign extension.
///
/// ```
/// assert_eq!(sxgeo::ip::parse_ipv4("8.8.8.8"), Some(0x08080808));
/// assert_eq!(sxgeo::ip::parse_ipv4("255.255.255.255"), Some(u32::MAX));
/// assert_eq!(sxgeo::ip::parse_ipv4("1.2.3"), None);
/// assert_eq!(sxgeo::ip::parse_ipv4("999.1.1.1"), None);
/// ```
pub fn parse_ipv4(text: &str) -> Option<u32> {
    text.parse::<Ipv4Addr>().ok().map(u32::from)
}

/// Parse only the first octet of a dotted-quad string
///
/// This is the cheap syntactic gate run before full conversion: the text
/// up to the first `.` must be a decimal integer in 0-255.
pub fn first_octet(text: &str) -> Option<u8> {
    let head = text.split('.').next()?;
    if head.is_empty() || head.len() > 3 || !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    head.parse::<u8>().ok()
}

/// Format a 32-bit address back into dotted-quad text
pub fn format_ipv4(ip: u32) -> String {
    Ipv4Addr::from(ip).to_string()
}
