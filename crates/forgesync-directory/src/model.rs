//! In-memory identity model built from the directory.
//!
//! All collections are per-run: built once after the two searches,
//! read by the reconciler, and discarded. Name lookups are
//! case-insensitive with original case preserved for display.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use base64::Engine;
use md5::{Digest, Md5};
use regex::Regex;

/// Characters allowed in a forge username. Runs of anything else are
/// collapsed to a single comma by [`slugify_username`].
static USERNAME_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9\-_.]+").expect("USERNAME_DISALLOWED is a valid regex pattern")
});

/// Slugify a raw directory username for use as a forge username.
///
/// Keeps `A-Z a-z 0-9 - _ .`; every run of other characters becomes a
/// single `,`. The input is trimmed first.
#[must_use]
pub fn slugify_username(raw: &str) -> String {
    USERNAME_DISALLOWED.replace_all(raw.trim(), ",").into_owned()
}

/// Compute the md5 fingerprint of an OpenSSH public key line.
///
/// The second whitespace-delimited field is base64-decoded and hashed;
/// the digest is rendered as lower-case hex byte pairs joined by `:`.
/// Returns `None` when the line has no second field or the field is
/// not valid base64.
#[must_use]
pub fn md5_fingerprint(key_text: &str) -> Option<String> {
    let blob = key_text.split_whitespace().nth(1)?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(blob).ok()?;
    let digest = Md5::digest(&decoded);
    Some(
        digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

/// An SSH public key retained from the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKey {
    /// Full OpenSSH key line (`ssh-rsa <base64> [comment]`).
    pub key: String,
    /// md5 fingerprint of the decoded key blob.
    pub fingerprint: String,
}

impl SshKey {
    /// Build from a key line, keeping only `ssh-rsa ` keys with a
    /// computable fingerprint.
    #[must_use]
    pub fn parse(key_text: &str) -> Option<Self> {
        let key_text = key_text.trim();
        if !key_text.starts_with("ssh-rsa ") {
            return None;
        }
        let fingerprint = md5_fingerprint(key_text)?;
        Some(SshKey {
            key: key_text.to_string(),
            fingerprint,
        })
    }

    /// Title for the forge key entry: the key comment when present.
    #[must_use]
    pub fn title(&self) -> &str {
        self.key
            .split_whitespace()
            .nth(2)
            .filter(|comment| !comment.is_empty())
            .unwrap_or("synced-key")
    }
}

/// A user as read and normalized from the directory.
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    /// Distinguished name, non-empty and trimmed.
    pub dn: String,
    /// Slugified login name.
    pub username: String,
    /// Value used to resolve `memberUid`-style group references.
    pub match_id: String,
    pub full_name: String,
    pub email: String,
    pub is_admin: bool,
    pub is_external: bool,
    pub ssh_keys: Vec<SshKey>,
}

/// A group as read from the directory.
///
/// `name` may contain exactly one `/`, encoding `parent/child`.
#[derive(Debug, Clone)]
pub struct DirectoryGroup {
    pub name: String,
    /// Sorted, de-duplicated usernames of resolved members.
    pub members: Vec<String>,
}

/// Map with case-insensitive keys, sorted iteration, and original
/// display values stored inside the entries.
#[derive(Debug, Clone)]
pub struct CiMap<V> {
    inner: BTreeMap<String, V>,
}

impl<V> Default for CiMap<V> {
    fn default() -> Self {
        CiMap {
            inner: BTreeMap::new(),
        }
    }
}

impl<V> CiMap<V> {
    #[must_use]
    pub fn new() -> Self {
        CiMap {
            inner: BTreeMap::new(),
        }
    }

    /// Insert under the lower-cased key. Returns the previous value on
    /// collision.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.inner.insert(key.to_lowercase(), value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.get(&key.to_lowercase())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.inner.get_mut(&key.to_lowercase())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(&key.to_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.inner.remove(&key.to_lowercase())
    }

    /// Entries sorted by lower-cased key.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.inner.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.inner.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The authoritative identity state for one run.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    /// Users keyed by (lower-cased) username.
    pub users: CiMap<DirectoryUser>,
    /// Groups keyed by (lower-cased) name.
    pub groups: CiMap<DirectoryGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_keeps_allowed_characters() {
        assert_eq!(slugify_username("alice"), "alice");
        assert_eq!(slugify_username("alice.smith-2_x"), "alice.smith-2_x");
        assert_eq!(slugify_username("  alice  "), "alice");
    }

    #[test]
    fn slugify_collapses_disallowed_runs_to_single_comma() {
        assert_eq!(slugify_username("Alice O'Brien"), "Alice,O,Brien");
        assert_eq!(slugify_username("a  @@  b"), "a,b");
        assert_eq!(slugify_username("jörg"), "j,rg");
    }

    #[test]
    fn fingerprint_is_colon_separated_hex() {
        // 16-byte digest -> 32 hex chars + 15 colons.
        let fp = md5_fingerprint("ssh-rsa AAAAB3NzaC1yc2EA alice@example").unwrap();
        assert_eq!(fp.len(), 47);
        assert!(fp
            .split(':')
            .all(|pair| pair.len() == 2 && pair.chars().all(|c| c.is_ascii_hexdigit())));
        assert_eq!(fp, fp.to_lowercase());
    }

    #[test]
    fn fingerprint_ignores_comment() {
        let a = md5_fingerprint("ssh-rsa AAAAB3NzaC1yc2EA alice@one").unwrap();
        let b = md5_fingerprint("ssh-rsa AAAAB3NzaC1yc2EA bob@two").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_blobs() {
        let a = md5_fingerprint("ssh-rsa AAAAB3NzaC1yc2EA").unwrap();
        let b = md5_fingerprint("ssh-rsa AAAAC3NzaC1lZDI1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_rejects_malformed_lines() {
        assert!(md5_fingerprint("ssh-rsa").is_none());
        assert!(md5_fingerprint("ssh-rsa !!!not-base64!!!").is_none());
        assert!(md5_fingerprint("").is_none());
    }

    #[test]
    fn ssh_key_parse_filters_non_rsa() {
        assert!(SshKey::parse("ssh-ed25519 AAAAC3NzaC1lZDI1 x@y").is_none());
        assert!(SshKey::parse("ecdsa-sha2-nistp256 AAAA x@y").is_none());

        let key = SshKey::parse("ssh-rsa AAAAB3NzaC1yc2EA alice@example").unwrap();
        assert!(key.key.starts_with("ssh-rsa "));
        assert!(!key.fingerprint.is_empty());
    }

    #[test]
    fn ssh_key_title_falls_back() {
        let with_comment = SshKey::parse("ssh-rsa AAAAB3NzaC1yc2EA alice@laptop").unwrap();
        assert_eq!(with_comment.title(), "alice@laptop");

        let without = SshKey::parse("ssh-rsa AAAAB3NzaC1yc2EA").unwrap();
        assert_eq!(without.title(), "synced-key");
    }

    #[test]
    fn cimap_is_case_insensitive_and_sorted() {
        let mut map = CiMap::new();
        map.insert("Bravo", 2);
        map.insert("alpha", 1);
        assert!(map.contains("BRAVO"));
        assert_eq!(map.get("ALPHA"), Some(&1));

        let keys: Vec<_> = map.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "bravo"]);

        // Collision on case-variant keys replaces and reports.
        assert_eq!(map.insert("ALPHA", 10), Some(1));
        assert_eq!(map.len(), 2);
    }
}
