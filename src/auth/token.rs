use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// A fresh bearer secret. Shown to the client once, stored only as a hash.
pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Pulls the secret out of an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    let well_formed = token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit());
    well_formed.then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_generated_token_parses_as_bearer() {
        let mut rng = StdRng::seed_from_u64(11);
        let token = generate(&mut rng);
        assert_eq!(token.len(), 64);
        assert_eq!(parse_bearer(&format!("Bearer {}", token)), Some(token.as_str()));
        assert_eq!(parse_bearer(&format!("bearer  {}", token)), Some(token.as_str()));
    }

    #[test]
    fn test_parse_bearer_rejects_other_schemes() {
        let token = "ab".repeat(32);
        assert_eq!(parse_bearer(&format!("Basic {}", token)), None);
        assert_eq!(parse_bearer("Bearer short"), None);
        assert_eq!(parse_bearer("Bearer"), None);
    }

    #[test]
    fn test_hash_is_stable_sha256_hex() {
        assert_eq!(
            hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash("abc"), hash("abd"));
    }
}
