//! Configuration model for forgesync.
//!
//! Loads `config.yml`, applies defaults, and validates every field
//! before any network connection is opened. The YAML uses camelCase
//! keys; the struct tree mirrors the file layout:
//!
//! ```yaml
//! ldap:
//!   server: { host, port, version, encryption, bindDn, bindPassword }
//!   queries: { baseDn, userFilter, ... }
//! gitlab:
//!   options: { userNamesToIgnore, createEmptyGroups, ... }
//!   instances:
//!     main: { url, token, ldapServerName }
//! ```

mod error;

pub use error::{ConfigError, ConfigResult};

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Default configuration file path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config.yml";

/// Suffix of the distributed sample configuration.
pub const DIST_SUFFIX: &str = ".dist";

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ldap: LdapSection,
    pub gitlab: ForgeSection,
}

/// LDAP transport encryption mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    #[default]
    None,
    /// STARTTLS upgrade after a plaintext connect.
    Tls,
    /// Implicit TLS from connection start (ldaps).
    Ssl,
}

impl Encryption {
    /// Default port for this encryption mode.
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Encryption::None | Encryption::Tls => 389,
            Encryption::Ssl => 636,
        }
    }
}

/// `ldap:` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapSection {
    #[serde(default)]
    pub debug: bool,
    /// Disable referral following for servers that mishandle it.
    #[serde(default)]
    pub win_compatibility_mode: bool,
    pub server: LdapServer,
    pub queries: LdapQueries,
}

/// `ldap.server:` connection settings.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapServer {
    pub host: String,
    /// Defaults from the encryption mode when absent.
    pub port: Option<u16>,
    #[serde(default = "default_ldap_version")]
    pub version: u8,
    #[serde(default)]
    pub encryption: Encryption,
    #[serde(default)]
    pub bind_dn: Option<String>,
    #[serde(default)]
    pub bind_password: Option<String>,
}

fn default_ldap_version() -> u8 {
    3
}

impl std::fmt::Debug for LdapServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapServer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("version", &self.version)
            .field("encryption", &self.encryption)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl LdapServer {
    /// Port to connect to, falling back to the encryption default.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.encryption.default_port())
    }

    /// Whether to bind anonymously.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.bind_dn.as_deref().unwrap_or("").is_empty()
    }
}

/// `ldap.queries:` search bases, filters, and attribute names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapQueries {
    pub base_dn: String,
    #[serde(default)]
    pub user_dn: String,
    #[serde(default)]
    pub group_dn: String,
    pub user_filter: String,
    pub group_filter: String,
    pub user_unique_attribute: String,
    /// Defaults to `userUniqueAttribute` when absent.
    #[serde(default)]
    pub user_match_attribute: Option<String>,
    pub user_name_attribute: String,
    pub user_email_attribute: String,
    #[serde(default)]
    pub user_ldap_admin_attribute: Option<String>,
    #[serde(default)]
    pub user_ssh_key_attribute: Option<String>,
    pub group_unique_attribute: String,
    pub group_member_attribute: String,
}

impl LdapQueries {
    /// The attribute used to resolve `memberUid`-style group members.
    #[must_use]
    pub fn effective_match_attribute(&self) -> &str {
        match self.user_match_attribute.as_deref() {
            Some(attr) if !attr.is_empty() => attr,
            _ => &self.user_unique_attribute,
        }
    }

    /// Search base for the user search.
    #[must_use]
    pub fn user_base(&self) -> String {
        join_base(&self.user_dn, &self.base_dn)
    }

    /// Search base for the group search.
    #[must_use]
    pub fn group_base(&self) -> String {
        join_base(&self.group_dn, &self.base_dn)
    }
}

fn join_base(sub: &str, base: &str) -> String {
    if sub.is_empty() {
        base.to_string()
    } else {
        format!("{sub},{base}")
    }
}

/// `gitlab:` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeSection {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub options: SyncOptions,
    pub instances: BTreeMap<String, ForgeInstance>,
}

/// `gitlab.options:` sync behavior switches.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(default)]
    pub user_names_to_ignore: Vec<String>,
    #[serde(default)]
    pub group_names_to_ignore: Vec<String>,
    /// Members of these directory groups become forge administrators.
    #[serde(default)]
    pub group_names_of_administrators: Vec<String>,
    /// Members of these directory groups become external users.
    #[serde(default)]
    pub group_names_of_external: Vec<String>,
    #[serde(default)]
    pub create_empty_groups: bool,
    #[serde(default)]
    pub delete_extra_groups: bool,
    #[serde(default = "default_member_access_level")]
    pub new_member_access_level: u32,
}

fn default_member_access_level() -> u32 {
    30
}

impl SyncOptions {
    /// Case-insensitive ignore-list check for usernames.
    #[must_use]
    pub fn ignores_user(&self, username: &str) -> bool {
        contains_ci(&self.user_names_to_ignore, username)
    }

    /// Case-insensitive ignore-list check for group names.
    #[must_use]
    pub fn ignores_group(&self, name: &str) -> bool {
        contains_ci(&self.group_names_to_ignore, name)
    }

    /// Whether this directory group grants forge admin to its members.
    #[must_use]
    pub fn grants_admin(&self, group_name: &str) -> bool {
        contains_ci(&self.group_names_of_administrators, group_name)
    }

    /// Whether this directory group marks its members external.
    #[must_use]
    pub fn marks_external(&self, group_name: &str) -> bool {
        contains_ci(&self.group_names_of_external, group_name)
    }
}

fn contains_ci(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// One configured forge instance.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeInstance {
    pub url: String,
    pub token: String,
    /// The `provider` value the forge records on synced identities.
    pub ldap_server_name: String,
}

impl std::fmt::Debug for ForgeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeInstance")
            .field("url", &self.url)
            .field("token", &"***")
            .field("ldap_server_name", &self.ldap_server_name)
            .finish()
    }
}

impl Config {
    /// Load and validate the configuration from a YAML file.
    ///
    /// When the file is missing but a `<path>.dist` sample exists, the
    /// error tells the operator to copy it.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let dist = dist_path(path);
            if dist.exists() {
                return Err(ConfigError::NotFoundWithDist {
                    path: path.to_path_buf(),
                    dist,
                });
            }
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all fields. Called by the loaders; public for tests.
    pub fn validate(&self) -> ConfigResult<()> {
        let server = &self.ldap.server;
        if server.host.trim().is_empty() {
            return Err(ConfigError::invalid("ldap.server.host must not be empty"));
        }
        if let Some(port) = server.port {
            if port == 0 {
                return Err(ConfigError::invalid(
                    "ldap.server.port must be between 1 and 65535",
                ));
            }
        }
        if !(1..=3).contains(&server.version) {
            return Err(ConfigError::invalid(
                "ldap.server.version must be between 1 and 3",
            ));
        }
        if server.version < 3 {
            warn!(
                version = server.version,
                "LDAP protocol versions below 3 are spoken as v3 by the transport"
            );
        }

        let queries = &self.ldap.queries;
        for (key, value) in [
            ("ldap.queries.baseDn", &queries.base_dn),
            ("ldap.queries.userFilter", &queries.user_filter),
            ("ldap.queries.groupFilter", &queries.group_filter),
            (
                "ldap.queries.userUniqueAttribute",
                &queries.user_unique_attribute,
            ),
            (
                "ldap.queries.userNameAttribute",
                &queries.user_name_attribute,
            ),
            (
                "ldap.queries.userEmailAttribute",
                &queries.user_email_attribute,
            ),
            (
                "ldap.queries.groupUniqueAttribute",
                &queries.group_unique_attribute,
            ),
            (
                "ldap.queries.groupMemberAttribute",
                &queries.group_member_attribute,
            ),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(format!("{key} must not be empty")));
            }
        }

        for (key, sub) in [
            ("ldap.queries.userDn", &queries.user_dn),
            ("ldap.queries.groupDn", &queries.group_dn),
        ] {
            if !sub.is_empty() && sub.to_lowercase().ends_with(&queries.base_dn.to_lowercase()) {
                warn!(
                    key,
                    value = %sub,
                    "sub-DN already ends with baseDn; it is appended to baseDn verbatim"
                );
            }
        }

        if self.gitlab.instances.is_empty() {
            return Err(ConfigError::invalid(
                "gitlab.instances must define at least one instance",
            ));
        }
        for (name, instance) in &self.gitlab.instances {
            if instance.url.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "gitlab.instances.{name}.url must not be empty"
                )));
            }
            if instance.token.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "gitlab.instances.{name}.token must not be empty"
                )));
            }
            if instance.ldap_server_name.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "gitlab.instances.{name}.ldapServerName must not be empty"
                )));
            }
        }

        Ok(())
    }
}

fn dist_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(DIST_SUFFIX);
    std::path::PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
ldap:
  server:
    host: ldap.example.com
  queries:
    baseDn: dc=example,dc=com
    userFilter: (objectClass=inetOrgPerson)
    groupFilter: (objectClass=groupOfNames)
    userUniqueAttribute: uid
    userNameAttribute: cn
    userEmailAttribute: mail
    groupUniqueAttribute: cn
    groupMemberAttribute: member
gitlab:
  instances:
    main:
      url: https://git.example.com
      token: glpat-secret
      ldapServerName: ldapmain
"#
    }

    #[test]
    fn minimal_config_defaults() {
        let config = Config::from_yaml(minimal_yaml()).unwrap();

        assert!(!config.ldap.debug);
        assert!(!config.ldap.win_compatibility_mode);
        assert_eq!(config.ldap.server.version, 3);
        assert_eq!(config.ldap.server.encryption, Encryption::None);
        assert_eq!(config.ldap.server.effective_port(), 389);
        assert!(config.ldap.server.is_anonymous());
        assert!(!config.gitlab.options.create_empty_groups);
        assert!(!config.gitlab.options.delete_extra_groups);
        assert_eq!(config.gitlab.options.new_member_access_level, 30);
    }

    #[test]
    fn ssl_defaults_to_636() {
        let yaml = minimal_yaml().replace(
            "host: ldap.example.com",
            "host: ldap.example.com\n    encryption: ssl",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.ldap.server.encryption, Encryption::Ssl);
        assert_eq!(config.ldap.server.effective_port(), 636);
    }

    #[test]
    fn explicit_port_wins_over_encryption_default() {
        let yaml = minimal_yaml().replace(
            "host: ldap.example.com",
            "host: ldap.example.com\n    port: 10389",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.ldap.server.effective_port(), 10389);
    }

    #[test]
    fn match_attribute_falls_back_to_unique() {
        let config = Config::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.ldap.queries.effective_match_attribute(), "uid");

        let yaml = minimal_yaml().replace(
            "userUniqueAttribute: uid",
            "userUniqueAttribute: uid\n    userMatchAttribute: entryUUID",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.ldap.queries.effective_match_attribute(), "entryUUID");
    }

    #[test]
    fn search_bases_compose() {
        let yaml = minimal_yaml().replace(
            "baseDn: dc=example,dc=com",
            "baseDn: dc=example,dc=com\n    userDn: ou=people\n    groupDn: ou=groups",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.ldap.queries.user_base(), "ou=people,dc=example,dc=com");
        assert_eq!(config.ldap.queries.group_base(), "ou=groups,dc=example,dc=com");

        let config = Config::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.ldap.queries.user_base(), "dc=example,dc=com");
    }

    #[test]
    fn missing_required_field_fails() {
        let yaml = minimal_yaml().replace("userEmailAttribute: mail", "userEmailAttribute: \"\"");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("userEmailAttribute"));
    }

    #[test]
    fn no_instances_fails() {
        let yaml = r#"
ldap:
  server:
    host: ldap.example.com
  queries:
    baseDn: dc=example,dc=com
    userFilter: (objectClass=person)
    groupFilter: (objectClass=group)
    userUniqueAttribute: uid
    userNameAttribute: cn
    userEmailAttribute: mail
    groupUniqueAttribute: cn
    groupMemberAttribute: member
gitlab:
  instances: {}
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("at least one instance"));
    }

    #[test]
    fn invalid_version_fails() {
        let yaml = minimal_yaml().replace(
            "host: ldap.example.com",
            "host: ldap.example.com\n    version: 4",
        );
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn ignore_lists_are_case_insensitive() {
        let yaml = minimal_yaml().replace(
            "  instances:",
            "  options:\n    userNamesToIgnore: [Svc-Account]\n    groupNamesOfAdministrators: [GitLab-Admins]\n  instances:",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert!(config.gitlab.options.ignores_user("svc-account"));
        assert!(config.gitlab.options.ignores_user("SVC-ACCOUNT"));
        assert!(!config.gitlab.options.ignores_user("other"));
        assert!(config.gitlab.options.grants_admin("gitlab-admins"));
        assert!(!config.gitlab.options.marks_external("gitlab-admins"));
    }

    #[test]
    fn server_debug_redacts_bind_password() {
        let yaml = minimal_yaml().replace(
            "host: ldap.example.com",
            "host: ldap.example.com\n    bindDn: cn=sync,dc=example,dc=com\n    bindPassword: hunter2",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert!(!config.ldap.server.is_anonymous());
        let rendered = format!("{:?}", config.ldap.server);
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn instance_debug_redacts_token() {
        let config = Config::from_yaml(minimal_yaml()).unwrap();
        let instance = config.gitlab.instances.get("main").unwrap();
        let rendered = format!("{instance:?}");
        assert!(!rendered.contains("glpat-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn missing_file_mentions_dist_when_present() {
        let dir = std::env::temp_dir().join("forgesync-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yml");
        let dist = dir.join("config.yml.dist");
        let _ = std::fs::remove_file(&path);
        std::fs::write(&dist, "placeholder").unwrap();

        let err = Config::load(&path).unwrap_err();
        match err {
            ConfigError::NotFoundWithDist { .. } => {}
            other => panic!("expected NotFoundWithDist, got {other:?}"),
        }

        std::fs::remove_file(&dist).unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
