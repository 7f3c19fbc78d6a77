//! Ticket and booking codes printed on tickets and encoded in QR images.
//!
//! Codes are sampled at random and made unique by the database: inserts use
//! `ON CONFLICT (...) DO NOTHING` and a collision simply draws again.

use rand::Rng;

/// Upper-case letters and digits minus the look-alikes `0 O 1 I`.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

const CODE_BODY_LENGTH: usize = 10;

/// Draws per insert before giving up.
pub const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// One per order.
    Ticket,
    /// One per order item.
    Booking,
}

impl CodeKind {
    pub fn prefix(self) -> &'static str {
        match self {
            CodeKind::Ticket => "TKT-",
            CodeKind::Booking => "BK-",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CodeKind::Ticket => "ticket code",
            CodeKind::Booking => "booking code",
        }
    }
}

pub fn generate<R: Rng + ?Sized>(kind: CodeKind, rng: &mut R) -> String {
    let mut code = String::with_capacity(kind.prefix().len() + CODE_BODY_LENGTH);
    code.push_str(kind.prefix());
    code.extend((0..CODE_BODY_LENGTH).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char));
    code
}

/// Which table a scanned code points at, judged by its prefix.
pub fn classify(code: &str) -> Option<CodeKind> {
    let code = code.trim();
    [CodeKind::Ticket, CodeKind::Booking]
        .into_iter()
        .find(|kind| code.len() == kind.prefix().len() + CODE_BODY_LENGTH && code.starts_with(kind.prefix()))
}

/// Scanners and people type codes in any case.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_code_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        let ticket = generate(CodeKind::Ticket, &mut rng);
        assert!(ticket.starts_with("TKT-"));
        assert_eq!(ticket.len(), 14);

        let booking = generate(CodeKind::Booking, &mut rng);
        assert!(booking.starts_with("BK-"));
        assert!(booking[3..].bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_no_ambiguous_characters() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let code = generate(CodeKind::Booking, &mut rng);
            assert!(!code[3..].contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn test_codes_rarely_collide() {
        let mut rng = StdRng::seed_from_u64(9);
        let codes: HashSet<String> = (0..5_000)
            .map(|_| generate(CodeKind::Ticket, &mut rng))
            .collect();
        assert_eq!(codes.len(), 5_000);
    }

    #[test]
    fn test_classify() {
        let mut rng = StdRng::seed_from_u64(3);
        let ticket = generate(CodeKind::Ticket, &mut rng);
        let booking = generate(CodeKind::Booking, &mut rng);
        assert_eq!(classify(&ticket), Some(CodeKind::Ticket));
        assert_eq!(classify(&booking), Some(CodeKind::Booking));
        assert_eq!(classify("BK-123"), None);
        assert_eq!(classify("hello"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  bk-abcdefghjk "), "BK-ABCDEFGHJK");
    }
}
