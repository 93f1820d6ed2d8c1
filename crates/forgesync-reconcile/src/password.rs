//! Initial password generation for created users.
//!
//! The password is never shown to anyone: created accounts carry the
//! directory identity (`extern_uid` + provider) and authenticate
//! through it. The value only has to satisfy the forge's password
//! policy and be unguessable.

use rand::rngs::OsRng;
use rand::Rng;

/// Alphanumeric alphabet (62 characters).
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated passwords.
pub const GENERATED_PASSWORD_LEN: usize = 12;

/// Generate a random alphanumeric password from the OS RNG.
///
/// Sampling uses `gen_range`, which is uniform over the alphabet.
#[must_use]
pub fn generate_password(len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[OsRng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_requested_length() {
        assert_eq!(generate_password(GENERATED_PASSWORD_LEN).len(), 12);
        assert_eq!(generate_password(32).len(), 32);
    }

    #[test]
    fn uses_only_the_alphabet() {
        let password = generate_password(256);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn successive_passwords_differ() {
        // 62^32 possibilities; a collision here means the RNG is wired wrong.
        assert_ne!(generate_password(32), generate_password(32));
    }
}
