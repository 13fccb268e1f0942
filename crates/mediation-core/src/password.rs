//! # Passwords and Tokens
//!
//! Password policy, PBKDF2-SHA256 password hashing and opaque bearer token
//! generation.
//!
//! ## Storage format
//!
//! A [`PasswordHash`] is stored as
//! `pbkdf2_sha256$<iterations>$<salt-hex>$<key-hex>`: a 32-byte key derived
//! with PBKDF2-HMAC-SHA256 from a 16-byte random salt. The iteration count
//! travels with the hash, so raising [`PBKDF2_ROUNDS`] leaves existing
//! hashes verifiable. Verification compares keys with
//! [`subtle::ConstantTimeEq`].
//!
//! Hashes in the older single-round `sha256$<salt-hex>$<digest-hex>` form
//! still load and verify. [`PasswordHash::needs_rehash`] flags them so the
//! caller can replace them after the next successful login.
//!
//! Bearer tokens are 32 random bytes, hex-encoded. Only their digest
//! ([`digest_token`]) is ever stored.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ValidationError;

const SCHEME: &str = "pbkdf2_sha256";
const LEGACY_SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

/// PBKDF2 iteration count for newly hashed passwords.
pub const PBKDF2_ROUNDS: u32 = 600_000;

/// Password length bounds, in characters.
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 32;

const PASSWORD_SYMBOLS: &[char] = &[
    '@', '№', ':', ';', '~', '#', '$', '%', '^', '!', '<', '>', '&', '+', ',', '.', '?', '/',
    '\\', '`', '(', ')', '*', '|', '-', '=',
];

/// Check a candidate password against the password policy.
///
/// # Errors
///
/// Returns [`ValidationError::PasswordPolicy`] when the password is not
/// 8-32 characters drawn from ASCII letters, digits and the permitted
/// symbols.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    let charset_ok = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(&c));
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) || !charset_ok {
        return Err(ValidationError::PasswordPolicy);
    }
    Ok(())
}

/// A salted password hash in its persisted string form.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash `password` with a fresh random salt and [`PBKDF2_ROUNDS`]
    /// iterations.
    pub fn hash(password: &str) -> Self {
        Self::hash_with_rounds(password, PBKDF2_ROUNDS)
    }

    fn hash_with_rounds(password: &str, rounds: u32) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = derive(Scheme::Pbkdf2 { rounds }, &salt, password);
        Self(format!("{SCHEME}${rounds}${}${}", to_hex(&salt), to_hex(&key)))
    }

    /// Rehydrate a stored hash, checking its shape.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedPasswordHash`] if the string is
    /// neither `pbkdf2_sha256$<iterations>$<hex>$<hex>` nor the legacy
    /// `sha256$<hex>$<hex>`.
    pub fn from_stored(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        parse(&s).ok_or(ValidationError::MalformedPasswordHash)?;
        Ok(Self(s))
    }

    /// Constant-time check of `password` against this hash.
    pub fn verify(&self, password: &str) -> bool {
        let Some(parsed) = parse(&self.0) else {
            return false;
        };
        let actual = derive(parsed.scheme, &parsed.salt, password);
        actual.as_slice().ct_eq(parsed.expected.as_slice()).into()
    }

    /// Whether this hash predates the current scheme or iteration count and
    /// should be replaced once the password is known.
    pub fn needs_rehash(&self) -> bool {
        !matches!(
            parse(&self.0).map(|p| p.scheme),
            Some(Scheme::Pbkdf2 { rounds }) if rounds >= PBKDF2_ROUNDS
        )
    }

    /// The persisted string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

/// Generate an opaque bearer token: 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// SHA-256 digest of a bearer token, hex-encoded. Tokens are looked up and
/// persisted by digest only.
pub fn digest_token(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Pbkdf2 { rounds: u32 },
    LegacySha256,
}

struct Parsed {
    scheme: Scheme,
    salt: Vec<u8>,
    expected: Vec<u8>,
}

fn parse(stored: &str) -> Option<Parsed> {
    let parts: Vec<&str> = stored.split('$').collect();
    let (scheme, salt, expected) = match parts.as_slice() {
        [SCHEME, rounds, salt, key] => {
            let rounds = rounds.parse().ok().filter(|r| *r > 0)?;
            (Scheme::Pbkdf2 { rounds }, salt, key)
        }
        [LEGACY_SCHEME, salt, digest] => (Scheme::LegacySha256, salt, digest),
        _ => return None,
    };
    Some(Parsed {
        scheme,
        salt: from_hex(salt)?,
        expected: from_hex(expected)?,
    })
}

fn derive(scheme: Scheme, salt: &[u8], password: &str) -> Vec<u8> {
    match scheme {
        Scheme::Pbkdf2 { rounds } => {
            let mut key = [0u8; KEY_LEN];
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
            key.to_vec()
        }
        Scheme::LegacySha256 => {
            let mut hasher = Sha256::new();
            hasher.update(salt);
            hasher.update(password.as_bytes());
            hasher.finalize().to_vec()
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_accepts_permitted_charset() {
        assert!(validate_password("Secr3t!pass").is_ok());
        assert!(validate_password("a1b2c3d4").is_ok());
        assert!(validate_password("№№№№abcd").is_ok());
    }

    #[test]
    fn policy_rejects_bad_length_and_chars() {
        assert_eq!(validate_password("short1!"), Err(ValidationError::PasswordPolicy));
        assert!(validate_password(&"a".repeat(33)).is_err());
        assert!(validate_password("with space1").is_err());
        assert!(validate_password("пароль1234").is_err());
    }

    #[test]
    fn hash_then_verify() {
        let hash = PasswordHash::hash("Secr3t!pass");
        assert!(hash.verify("Secr3t!pass"));
        assert!(!hash.verify("Secr3t!pasS"));
        assert!(hash
            .as_str()
            .starts_with(&format!("pbkdf2_sha256${PBKDF2_ROUNDS}$")));
        assert!(!hash.needs_rehash());
    }

    #[test]
    fn pbkdf2_matches_reference_vector() {
        // RFC 7914 section 11, PBKDF2-HMAC-SHA256 with c = 1.
        let key = derive(Scheme::Pbkdf2 { rounds: 1 }, b"salt", "passwd");
        assert_eq!(
            to_hex(&key),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(
            PasswordHash::hash_with_rounds("abcdefgh", 1),
            PasswordHash::hash_with_rounds("abcdefgh", 1)
        );
    }

    #[test]
    fn stored_hash_round_trips() {
        let hash = PasswordHash::hash_with_rounds("abcdefgh", 10);
        let restored = PasswordHash::from_stored(hash.as_str()).unwrap();
        assert!(restored.verify("abcdefgh"));
        assert!(!restored.verify("abcdefgi"));
    }

    #[test]
    fn low_iteration_hash_verifies_but_needs_rehash() {
        let hash = PasswordHash::hash_with_rounds("abcdefgh", 10);
        assert!(hash.verify("abcdefgh"));
        assert!(hash.needs_rehash());
    }

    #[test]
    fn legacy_sha256_hash_still_verifies() {
        let salt = [7u8; SALT_LEN];
        let digest = Sha256::new()
            .chain_update(salt)
            .chain_update(b"abcdefgh")
            .finalize();
        let stored = format!("sha256${}${}", to_hex(&salt), to_hex(&digest));

        let legacy = PasswordHash::from_stored(stored).unwrap();
        assert!(legacy.verify("abcdefgh"));
        assert!(!legacy.verify("abcdefgx"));
        assert!(legacy.needs_rehash());
    }

    #[test]
    fn malformed_stored_hash_is_rejected() {
        for bad in [
            "",
            "sha256$zz$00",
            "md5$00$00",
            "sha256$00",
            "sha256$00$00$00",
            "pbkdf2_sha256$0$00$00",
            "pbkdf2_sha256$many$00$00",
            "pbkdf2_sha256$1000$00",
        ] {
            assert_eq!(
                PasswordHash::from_stored(bad),
                Err(ValidationError::MalformedPasswordHash),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn debug_redacts() {
        let hash = PasswordHash::hash_with_rounds("abcdefgh", 1);
        assert_eq!(format!("{hash:?}"), "PasswordHash([REDACTED])");
    }

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_digest_is_stable_and_distinct() {
        let token = generate_token();
        assert_eq!(digest_token(&token), digest_token(&token));
        assert_ne!(digest_token(&token), token);
        assert_eq!(digest_token(&token).len(), 64);
        assert_ne!(digest_token("a"), digest_token("b"));
    }
}
