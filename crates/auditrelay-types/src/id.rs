//! Entry identifiers.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

const ID_BYTES: usize = 16;

static FALLBACK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a new entry identifier.
///
/// The identifier is 16 bytes from the operating system RNG, hex encoded.
/// If the RNG is unavailable the identifier is derived from the clock and a
/// process-wide sequence number instead, so generation never fails.
pub fn new_entry_id() -> String {
    let mut buf = [0u8; ID_BYTES];
    match OsRng.try_fill_bytes(&mut buf) {
        Ok(()) => encode_hex(&buf),
        Err(_) => fallback_id(),
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{:02x}", b);
    }
    out
}

fn fallback_id() -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let seq = FALLBACK_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}{:04}", nanos, seq % 10_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_is_32_hex_chars() {
        let id = new_entry_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_distinct() {
        let ids: HashSet<_> = (0..1000).map(|_| new_entry_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_fallback_ids_are_distinct() {
        let a = fallback_id();
        let b = fallback_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_hex() {
        assert_eq!(encode_hex(&[0x00, 0x0f, 0xab, 0xff]), "000fabff");
    }
}
