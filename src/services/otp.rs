//! One-time password issuance and verification.
//!
//! A code is six decimal digits. Issuing a code replaces every unverified code
//! for the same `(email, purpose)`, so at most one code is active at a time.
//! A code dies on success, on expiry, or after `max_attempts` wrong guesses.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::config::OtpSettings;
use crate::models::OtpCode;

pub const CODE_LENGTH: usize = 6;

/// Outcome of checking a submitted code against the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Accepted,
    Mismatch { remaining: i32 },
    Exhausted,
    Expired,
    AlreadyUsed,
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:0width$}", rng.gen_range(0..1_000_000u32), width = CODE_LENGTH)
}

pub fn expiry(now: DateTime<Utc>, settings: &OtpSettings) -> DateTime<Utc> {
    now + Duration::from_std(settings.ttl).unwrap_or_else(|_| Duration::minutes(10))
}

/// Seconds the caller must still wait before another code may be issued.
pub fn resend_wait(
    last_issued: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &OtpSettings,
) -> Option<i64> {
    let cooldown = Duration::from_std(settings.resend_cooldown).unwrap_or_else(|_| Duration::zero());
    let ready_at = last_issued + cooldown;
    (now < ready_at).then(|| (ready_at - now).num_seconds().max(1))
}

/// Pure verification step. The caller persists the attempt counter on
/// `Mismatch` and `verified_at` on `Accepted`.
pub fn check(
    otp: &OtpCode,
    submitted: &str,
    settings: &OtpSettings,
    now: DateTime<Utc>,
) -> OtpCheck {
    if otp.verified_at.is_some() {
        return OtpCheck::AlreadyUsed;
    }
    if otp.attempts >= settings.max_attempts {
        return OtpCheck::Exhausted;
    }
    if otp.expires_at <= now {
        return OtpCheck::Expired;
    }

    let submitted = submitted.trim();
    if bool::from(otp.code.as_bytes().ct_eq(submitted.as_bytes())) {
        OtpCheck::Accepted
    } else {
        OtpCheck::Mismatch {
            remaining: (settings.max_attempts - otp.attempts - 1).max(0),
        }
    }
}

/// Codes are short digit strings; anything else is rejected before a lookup.
pub fn is_well_formed(code: &str) -> bool {
    let code = code.trim();
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OtpPurpose;
    use rand::{rngs::StdRng, SeedableRng};
    use uuid::Uuid;

    fn active_code(code: &str, attempts: i32, now: DateTime<Utc>) -> OtpCode {
        OtpCode {
            id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            purpose: OtpPurpose::Login,
            code: code.to_string(),
            attempts,
            expires_at: now + Duration::minutes(10),
            verified_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_code(&mut rng);
            assert!(is_well_formed(&code), "bad code {code}");
        }
    }

    #[test]
    fn test_accepts_matching_code() {
        let now = Utc::now();
        let otp = active_code("042917", 0, now);
        let settings = OtpSettings::default();
        assert_eq!(check(&otp, " 042917 ", &settings, now), OtpCheck::Accepted);
    }

    #[test]
    fn test_mismatch_counts_down() {
        let now = Utc::now();
        let settings = OtpSettings::default();
        let otp = active_code("042917", 0, now);
        assert_eq!(
            check(&otp, "000000", &settings, now),
            OtpCheck::Mismatch { remaining: 4 }
        );

        let otp = active_code("042917", 4, now);
        assert_eq!(
            check(&otp, "000000", &settings, now),
            OtpCheck::Mismatch { remaining: 0 }
        );
    }

    #[test]
    fn test_exhausted_code_rejects_even_correct_guess() {
        let now = Utc::now();
        let settings = OtpSettings::default();
        let otp = active_code("042917", 5, now);
        assert_eq!(check(&otp, "042917", &settings, now), OtpCheck::Exhausted);
    }

    #[test]
    fn test_expired_after_ttl() {
        let issued = Utc::now();
        let settings = OtpSettings::default();
        let otp = OtpCode {
            expires_at: expiry(issued, &settings),
            ..active_code("042917", 0, issued)
        };

        let just_before = issued + Duration::minutes(9) + Duration::seconds(59);
        assert_eq!(check(&otp, "042917", &settings, just_before), OtpCheck::Accepted);

        let at_expiry = issued + Duration::minutes(10);
        assert_eq!(check(&otp, "042917", &settings, at_expiry), OtpCheck::Expired);
    }

    #[test]
    fn test_verified_code_is_single_use() {
        let now = Utc::now();
        let settings = OtpSettings::default();
        let otp = OtpCode {
            verified_at: Some(now),
            ..active_code("042917", 1, now)
        };
        assert_eq!(check(&otp, "042917", &settings, now), OtpCheck::AlreadyUsed);
    }

    #[test]
    fn test_resend_cooldown() {
        let issued = Utc::now();
        let settings = OtpSettings::default();
        assert_eq!(
            resend_wait(issued, issued + Duration::seconds(15), &settings),
            Some(45)
        );
        assert_eq!(resend_wait(issued, issued + Duration::seconds(60), &settings), None);
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("123456"));
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("12a456"));
        assert!(!is_well_formed("1234567"));
    }
}
