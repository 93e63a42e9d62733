//! One-time passcodes.
//!
//! A 6-digit code with a 5-minute expiry gates sensitive account actions.
//! Issuance overwrites any prior live code for the email; there is no rate
//! limit or resend cooldown. Verification is single-use: the record is
//! removed on success and on expiry, and kept only after a mismatch.

use rand::Rng;

use crate::models::OtpRecord;

pub const OTP_TTL_MS: i64 = 5 * 60 * 1000;

/// Uniformly random 6-digit code in [100000, 999999].
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999).to_string()
}

pub fn new_record<R: Rng>(rng: &mut R, now_ms: i64) -> OtpRecord {
    OtpRecord {
        otp: generate_code(rng),
        expires_at: now_ms + OTP_TTL_MS,
    }
}

/// Outcome of checking a submitted code against the stored record. The
/// caller has already taken the record out of the store; `Mismatch` is the
/// only outcome that requires putting it back.
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    Accepted,
    Missing,
    Expired,
    Mismatch,
}

pub fn check(record: Option<&OtpRecord>, submitted: &str, now_ms: i64) -> Verification {
    let Some(record) = record else {
        return Verification::Missing;
    };

    if now_ms > record.expires_at {
        return Verification::Expired;
    }

    if record.otp != submitted {
        return Verification::Mismatch;
    }

    Verification::Accepted
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_code_shape() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);

            let numeric: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&numeric));
        }
    }

    #[test]
    fn test_record_expiry() {
        let mut rng = StdRng::seed_from_u64(7);
        let record = new_record(&mut rng, 1_000);

        assert_eq!(record.expires_at, 1_000 + OTP_TTL_MS);
    }

    #[test]
    fn test_verify_within_expiry() {
        // Issue at T, verify the right code at T+200000: accepted once, then
        // the record is gone and a replay sees Missing.
        let record = OtpRecord {
            otp: "123456".to_string(),
            expires_at: 300_000,
        };

        assert_eq!(
            check(Some(&record), "123456", 200_000),
            Verification::Accepted
        );
        assert_eq!(check(None, "123456", 200_001), Verification::Missing);
    }

    #[test]
    fn test_verify_expired() {
        let record = OtpRecord {
            otp: "123456".to_string(),
            expires_at: 300_000,
        };

        assert_eq!(
            check(Some(&record), "123456", 300_001),
            Verification::Expired
        );
    }

    #[test]
    fn test_verify_mismatch_is_retriable() {
        let record = OtpRecord {
            otp: "123456".to_string(),
            expires_at: 300_000,
        };

        assert_eq!(
            check(Some(&record), "654321", 200_000),
            Verification::Mismatch
        );
        // The record survives a mismatch, so the right code still works.
        assert_eq!(
            check(Some(&record), "123456", 250_000),
            Verification::Accepted
        );
    }

    #[test]
    fn test_verify_exact_boundary() {
        let record = OtpRecord {
            otp: "123456".to_string(),
            expires_at: 300_000,
        };

        // Expiry is strict: now > expires_at, not >=.
        assert_eq!(
            check(Some(&record), "123456", 300_000),
            Verification::Accepted
        );
    }
}
