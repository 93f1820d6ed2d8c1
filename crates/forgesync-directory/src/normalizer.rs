//! Identity normalizer.
//!
//! Transforms raw directory entries into the canonical
//! [`DirectorySnapshot`]: slugification, required-attribute
//! validation, de-duplication, member resolution, and admin/external
//! flag propagation. Entries that fail a rule are logged and skipped;
//! normalization itself never fails a run.

use tracing::{debug, warn};

use forgesync_config::{LdapQueries, SyncOptions};

use crate::client::RawEntry;
use crate::model::{
    slugify_username, CiMap, DirectoryGroup, DirectorySnapshot, DirectoryUser, SshKey,
};

/// How group member values are matched to users, derived from the
/// configured member attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberSchema {
    /// `memberUid`: values are match-ids (or usernames when the match
    /// attribute equals the unique attribute).
    MatchId,
    /// `member` / `uniqueMember`: values are DNs.
    Dn,
    /// Anything else: no matching is attempted.
    Unknown,
}

impl MemberSchema {
    fn from_attribute(attr: &str) -> Self {
        if attr.eq_ignore_ascii_case("memberUid") {
            MemberSchema::MatchId
        } else if attr.eq_ignore_ascii_case("member") || attr.eq_ignore_ascii_case("uniqueMember") {
            MemberSchema::Dn
        } else {
            MemberSchema::Unknown
        }
    }
}

/// Builds a [`DirectorySnapshot`] from raw search results.
pub struct Normalizer<'a> {
    queries: &'a LdapQueries,
    options: &'a SyncOptions,
}

impl<'a> Normalizer<'a> {
    #[must_use]
    pub fn new(queries: &'a LdapQueries, options: &'a SyncOptions) -> Self {
        Self { queries, options }
    }

    /// Normalize users then groups, resolve members, and propagate the
    /// admin/external flags configured on group names.
    #[must_use]
    pub fn build_snapshot(
        &self,
        user_entries: Vec<RawEntry>,
        group_entries: Vec<RawEntry>,
    ) -> DirectorySnapshot {
        let mut users: CiMap<DirectoryUser> = CiMap::new();

        for entry in user_entries {
            let Some(user) = self.normalize_user(&entry) else {
                continue;
            };
            if self.options.ignores_user(&user.username) {
                continue;
            }
            if users.contains(&user.username) {
                warn!(username = %user.username, dn = %entry.dn, "duplicate username in directory, dropping later entry");
                continue;
            }
            users.insert(&user.username.clone(), user);
        }

        let schema = MemberSchema::from_attribute(&self.queries.group_member_attribute);
        if schema == MemberSchema::Unknown {
            warn!(
                attribute = %self.queries.group_member_attribute,
                "unrecognized member attribute schema, group members will not be resolved"
            );
        }

        let mut groups: CiMap<DirectoryGroup> = CiMap::new();

        for entry in group_entries {
            let Some(name) = entry.first_string(&self.queries.group_unique_attribute) else {
                warn!(dn = %entry.dn, "group entry missing unique attribute, skipping");
                continue;
            };
            let name = name.to_string();

            if self.options.ignores_group(&name) {
                continue;
            }
            if groups.contains(&name) {
                warn!(group = %name, dn = %entry.dn, "duplicate group name in directory, dropping later entry");
                continue;
            }

            let members = self.resolve_members(&entry, &name, schema, &users);

            if self.options.grants_admin(&name) {
                for member in &members {
                    if let Some(user) = users.get_mut(member) {
                        user.is_admin = true;
                    }
                }
            }
            if self.options.marks_external(&name) {
                for member in &members {
                    if let Some(user) = users.get_mut(member) {
                        user.is_external = true;
                    }
                }
            }

            groups.insert(&name.clone(), DirectoryGroup { name, members });
        }

        DirectorySnapshot { users, groups }
    }

    /// Normalize one user entry, or `None` when a required rule fails.
    fn normalize_user(&self, entry: &RawEntry) -> Option<DirectoryUser> {
        if entry.dn.trim().is_empty() {
            warn!("user entry with empty DN, skipping");
            return None;
        }
        let dn = entry.dn.trim().to_string();

        let raw_username = entry.first_string(&self.queries.user_unique_attribute).or_else(|| {
            warn!(dn = %dn, attribute = %self.queries.user_unique_attribute, "user entry missing unique attribute, skipping");
            None
        })?;
        let username = slugify_username(raw_username);
        if username != raw_username {
            warn!(raw = %raw_username, slug = %username, "username contains disallowed characters, using slug");
        }

        let match_id = entry
            .first_string(self.queries.effective_match_attribute())
            .or_else(|| {
                warn!(dn = %dn, attribute = %self.queries.effective_match_attribute(), "user entry missing match attribute, skipping");
                None
            })?
            .to_string();

        let full_name = entry
            .first_string(&self.queries.user_name_attribute)
            .or_else(|| {
                warn!(dn = %dn, attribute = %self.queries.user_name_attribute, "user entry missing name attribute, skipping");
                None
            })?
            .to_string();

        let email = entry
            .first_string(&self.queries.user_email_attribute)
            .or_else(|| {
                warn!(dn = %dn, attribute = %self.queries.user_email_attribute, "user entry missing email attribute, skipping");
                None
            })?
            .to_string();

        let is_admin = self
            .queries
            .user_ldap_admin_attribute
            .as_deref()
            .and_then(|attr| entry.first_string(attr))
            .map(parse_bool)
            .unwrap_or(false);

        let ssh_keys = self
            .queries
            .user_ssh_key_attribute
            .as_deref()
            .map(|attr| {
                entry
                    .strings(attr)
                    .into_iter()
                    .filter_map(|text| {
                        if !text.starts_with("ssh-rsa ") {
                            return None;
                        }
                        match SshKey::parse(text) {
                            Some(key) => Some(key),
                            None => {
                                warn!(dn = %dn, "SSH key with undecodable blob, dropping");
                                None
                            }
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(DirectoryUser {
            dn,
            username,
            match_id,
            full_name,
            email,
            is_admin,
            is_external: false,
            ssh_keys,
        })
    }

    /// Resolve the member values of one group entry to usernames.
    fn resolve_members(
        &self,
        entry: &RawEntry,
        group_name: &str,
        schema: MemberSchema,
        users: &CiMap<DirectoryUser>,
    ) -> Vec<String> {
        let values = entry.strings(&self.queries.group_member_attribute);
        if values.is_empty() || schema == MemberSchema::Unknown {
            return Vec::new();
        }

        // When the match attribute is the unique attribute, member
        // values are compared against the (slugified) username itself.
        let match_on_username = self
            .queries
            .effective_match_attribute()
            .eq_ignore_ascii_case(&self.queries.user_unique_attribute);

        let mut members: Vec<String> = Vec::new();
        for value in values {
            let resolved = users.values().find(|user| match schema {
                MemberSchema::MatchId => {
                    if match_on_username {
                        user.username.eq_ignore_ascii_case(value)
                    } else {
                        user.match_id.eq_ignore_ascii_case(value)
                    }
                }
                MemberSchema::Dn => user.dn.eq_ignore_ascii_case(value),
                MemberSchema::Unknown => false,
            });

            match resolved {
                Some(user) => members.push(user.username.clone()),
                None => {
                    debug!(group = %group_name, member = %value, "unresolved group member reference, dropping");
                }
            }
        }

        members.sort();
        members.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        members
    }
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn queries() -> LdapQueries {
        let yaml = r"
baseDn: dc=example,dc=com
userFilter: (objectClass=inetOrgPerson)
groupFilter: (objectClass=groupOfNames)
userUniqueAttribute: uid
userNameAttribute: cn
userEmailAttribute: mail
userLdapAdminAttribute: gitlabAdmin
userSshKeyAttribute: sshPublicKey
groupUniqueAttribute: cn
groupMemberAttribute: member
";
        serde_yaml::from_str(yaml).unwrap()
    }

    fn entry(dn: &str, attrs: &[(&str, &[&str])]) -> RawEntry {
        RawEntry {
            dn: dn.to_string(),
            attrs: attrs
                .iter()
                .map(|(name, values)| {
                    (
                        name.to_lowercase(),
                        values.iter().map(|v| (*v).to_string()).collect(),
                    )
                })
                .collect::<HashMap<_, _>>(),
        }
    }

    fn user_entry(uid: &str) -> RawEntry {
        entry(
            &format!("uid={uid},ou=people,dc=example,dc=com"),
            &[
                ("uid", &[uid]),
                ("cn", &[&format!("{uid} Person")[..]]),
                ("mail", &[&format!("{uid}@example.com")[..]]),
            ],
        )
    }

    #[test]
    fn normalizes_a_complete_user() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let snapshot = normalizer.build_snapshot(vec![user_entry("alice")], vec![]);
        assert_eq!(snapshot.users.len(), 1);

        let alice = snapshot.users.get("alice").unwrap();
        assert_eq!(alice.dn, "uid=alice,ou=people,dc=example,dc=com");
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.match_id, "alice");
        assert_eq!(alice.email, "alice@example.com");
        assert!(!alice.is_admin);
        assert!(!alice.is_external);
    }

    #[test]
    fn slugifies_usernames() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let raw = entry(
            "uid=x,dc=example,dc=com",
            &[
                ("uid", &["Alice O'Brien"]),
                ("cn", &["Alice O'Brien"]),
                ("mail", &["alice@example.com"]),
            ],
        );
        let snapshot = normalizer.build_snapshot(vec![raw], vec![]);
        assert!(snapshot.users.contains("Alice,O,Brien"));
    }

    #[test]
    fn drops_users_missing_required_attributes() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let no_mail = entry(
            "uid=a,dc=x",
            &[("uid", &["a"]), ("cn", &["A"])],
        );
        let no_dn = RawEntry {
            dn: "  ".to_string(),
            attrs: HashMap::new(),
        };
        let snapshot = normalizer.build_snapshot(vec![no_mail, no_dn], vec![]);
        assert!(snapshot.users.is_empty());
    }

    #[test]
    fn drops_later_duplicate_usernames() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let first = user_entry("alice");
        let mut second = user_entry("alice");
        second.attrs.insert("mail".into(), vec!["other@example.com".into()]);

        let snapshot = normalizer.build_snapshot(vec![first, second], vec![]);
        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(snapshot.users.get("alice").unwrap().email, "alice@example.com");
    }

    #[test]
    fn duplicate_detection_is_case_insensitive() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let snapshot =
            normalizer.build_snapshot(vec![user_entry("alice"), user_entry("Alice")], vec![]);
        assert_eq!(snapshot.users.len(), 1);
    }

    #[test]
    fn ignored_users_are_skipped_silently() {
        let q = queries();
        let options = SyncOptions {
            user_names_to_ignore: vec!["ALICE".to_string()],
            ..SyncOptions::default()
        };
        let normalizer = Normalizer::new(&q, &options);

        let snapshot =
            normalizer.build_snapshot(vec![user_entry("alice"), user_entry("bob")], vec![]);
        assert_eq!(snapshot.users.len(), 1);
        assert!(snapshot.users.contains("bob"));
    }

    #[test]
    fn admin_attribute_is_parsed_as_boolean() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let mut admin = user_entry("root-like");
        admin.attrs.insert("gitlabadmin".into(), vec!["TRUE".into()]);
        let mut not_admin = user_entry("plain");
        not_admin.attrs.insert("gitlabadmin".into(), vec!["false".into()]);

        let snapshot = normalizer.build_snapshot(vec![admin, not_admin], vec![]);
        assert!(snapshot.users.get("root-like").unwrap().is_admin);
        assert!(!snapshot.users.get("plain").unwrap().is_admin);
    }

    #[test]
    fn keeps_only_rsa_keys() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let mut user = user_entry("alice");
        user.attrs.insert(
            "sshpublickey".into(),
            vec![
                "ssh-rsa AAAAB3NzaC1yc2EA alice@laptop".into(),
                "ssh-ed25519 AAAAC3NzaC1lZDI1 alice@phone".into(),
                "ssh-rsa !!!broken!!!".into(),
            ],
        );

        let snapshot = normalizer.build_snapshot(vec![user], vec![]);
        let keys = &snapshot.users.get("alice").unwrap().ssh_keys;
        assert_eq!(keys.len(), 1);
        assert!(keys[0].key.contains("alice@laptop"));
    }

    #[test]
    fn resolves_members_by_dn() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let group = entry(
            "cn=devs,ou=groups,dc=example,dc=com",
            &[
                ("cn", &["devs"]),
                (
                    "member",
                    &[
                        "uid=alice,ou=people,dc=example,dc=com",
                        "UID=BOB,OU=PEOPLE,DC=EXAMPLE,DC=COM",
                        "uid=ghost-entry,ou=people,dc=example,dc=com",
                    ],
                ),
            ],
        );

        let snapshot = normalizer
            .build_snapshot(vec![user_entry("alice"), user_entry("bob")], vec![group]);
        let devs = snapshot.groups.get("devs").unwrap();
        assert_eq!(devs.members, vec!["alice", "bob"]);
    }

    #[test]
    fn resolves_members_by_match_id() {
        let mut q = queries();
        q.group_member_attribute = "memberUid".to_string();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let group = entry(
            "cn=devs,dc=example,dc=com",
            &[("cn", &["devs"]), ("memberuid", &["alice", "nobody"])],
        );

        let snapshot = normalizer.build_snapshot(vec![user_entry("alice")], vec![group]);
        assert_eq!(snapshot.groups.get("devs").unwrap().members, vec!["alice"]);
    }

    #[test]
    fn unknown_member_schema_resolves_nothing() {
        let mut q = queries();
        q.group_member_attribute = "roleOccupant".to_string();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let group = entry(
            "cn=devs,dc=example,dc=com",
            &[("cn", &["devs"]), ("roleoccupant", &["alice"])],
        );

        let snapshot = normalizer.build_snapshot(vec![user_entry("alice")], vec![group]);
        assert!(snapshot.groups.get("devs").unwrap().members.is_empty());
    }

    #[test]
    fn admin_and_external_groups_flip_flags_on() {
        let q = queries();
        let options = SyncOptions {
            group_names_of_administrators: vec!["gitlab-admins".to_string()],
            group_names_of_external: vec!["contractors".to_string()],
            ..SyncOptions::default()
        };
        let normalizer = Normalizer::new(&q, &options);

        let admins = entry(
            "cn=GitLab-Admins,dc=example,dc=com",
            &[
                ("cn", &["GitLab-Admins"]),
                ("member", &["uid=alice,ou=people,dc=example,dc=com"]),
            ],
        );
        let contractors = entry(
            "cn=contractors,dc=example,dc=com",
            &[
                ("cn", &["contractors"]),
                ("member", &["uid=bob,ou=people,dc=example,dc=com"]),
            ],
        );

        let snapshot = normalizer.build_snapshot(
            vec![user_entry("alice"), user_entry("bob")],
            vec![admins, contractors],
        );

        assert!(snapshot.users.get("alice").unwrap().is_admin);
        assert!(!snapshot.users.get("alice").unwrap().is_external);
        assert!(snapshot.users.get("bob").unwrap().is_external);
        assert!(!snapshot.users.get("bob").unwrap().is_admin);
    }

    #[test]
    fn ignored_and_duplicate_groups_are_skipped() {
        let q = queries();
        let options = SyncOptions {
            group_names_to_ignore: vec!["Secret".to_string()],
            ..SyncOptions::default()
        };
        let normalizer = Normalizer::new(&q, &options);

        let secret = entry("cn=secret,dc=x", &[("cn", &["secret"])]);
        let devs = entry("cn=devs,dc=x", &[("cn", &["devs"])]);
        let devs_again = entry("cn=devs2,dc=x", &[("cn", &["DEVS"])]);

        let snapshot = normalizer.build_snapshot(vec![], vec![secret, devs, devs_again]);
        assert_eq!(snapshot.groups.len(), 1);
        assert_eq!(snapshot.groups.get("devs").unwrap().name, "devs");
    }

    #[test]
    fn member_lists_are_sorted_and_deduplicated() {
        let q = queries();
        let options = SyncOptions::default();
        let normalizer = Normalizer::new(&q, &options);

        let group = entry(
            "cn=devs,dc=example,dc=com",
            &[
                ("cn", &["devs"]),
                (
                    "member",
                    &[
                        "uid=bob,ou=people,dc=example,dc=com",
                        "uid=alice,ou=people,dc=example,dc=com",
                        "uid=bob,ou=people,dc=example,dc=com",
                    ],
                ),
            ],
        );

        let snapshot = normalizer
            .build_snapshot(vec![user_entry("bob"), user_entry("alice")], vec![group]);
        assert_eq!(snapshot.groups.get("devs").unwrap().members, vec!["alice", "bob"]);
    }
}
