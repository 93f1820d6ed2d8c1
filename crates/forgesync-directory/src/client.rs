//! Directory client.
//!
//! Connects, binds, runs the two configured searches (users, groups),
//! and returns raw attribute maps. The connection lives for exactly
//! the two searches and is then unbound.

use std::collections::HashMap;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use forgesync_config::{Encryption, LdapQueries, LdapSection};

use crate::error::{DirectoryError, DirectoryResult};

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// One directory entry as returned by a search: the DN plus every
/// requested attribute. Attribute names are lower-cased on
/// construction so extraction is case-insensitive.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl RawEntry {
    /// Build from an ldap3 search entry.
    #[must_use]
    pub fn from_search_entry(entry: SearchEntry) -> Self {
        let attrs = entry
            .attrs
            .into_iter()
            .map(|(name, values)| (name.to_lowercase(), values))
            .collect();
        RawEntry {
            dn: entry.dn,
            attrs,
        }
    }

    /// The first non-empty, trimmed value of an attribute.
    ///
    /// This is the single validation point for attribute extraction:
    /// present, list-valued, first element a non-empty string.
    #[must_use]
    pub fn first_string(&self, attr: &str) -> Option<&str> {
        self.attrs
            .get(&attr.to_lowercase())?
            .first()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// All trimmed, non-empty values of an attribute.
    #[must_use]
    pub fn strings(&self, attr: &str) -> Vec<&str> {
        self.attrs
            .get(&attr.to_lowercase())
            .map(|values| {
                values
                    .iter()
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Client for the authoritative directory.
pub struct DirectoryClient {
    ldap: Ldap,
    queries: LdapQueries,
}

impl DirectoryClient {
    /// Connect and bind according to the `ldap` configuration section.
    pub async fn connect(section: &LdapSection) -> DirectoryResult<Self> {
        let server = &section.server;
        let scheme = match server.encryption {
            Encryption::Ssl => "ldaps",
            Encryption::None | Encryption::Tls => "ldap",
        };
        let url = format!("{scheme}://{}:{}", server.host, server.effective_port());

        debug!(url = %url, starttls = matches!(server.encryption, Encryption::Tls), "connecting to directory");

        let settings = LdapConnSettings::new()
            .set_starttls(matches!(server.encryption, Encryption::Tls));

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| DirectoryError::connect(format!("failed to connect to {url}"), e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection driver error");
            }
        });

        if section.win_compatibility_mode {
            // ldap3 never chases referrals, which is exactly the
            // compatibility behavior; nothing to switch off.
            debug!("referral following disabled (compatibility mode)");
        }

        if server.is_anonymous() {
            debug!("binding anonymously");
        } else {
            let bind_dn = server.bind_dn.as_deref().unwrap_or("");
            let bind_password = server.bind_password.as_deref().unwrap_or("");

            debug!(bind_dn = %bind_dn, "binding to directory");

            let result = ldap
                .simple_bind(bind_dn, bind_password)
                .await
                .map_err(|e| DirectoryError::connect("bind request failed", e))?;

            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(DirectoryError::bind(format!(
                    "invalid credentials for {bind_dn}"
                )));
            }
            if result.rc != 0 {
                return Err(DirectoryError::bind(format!(
                    "bind failed with code {}: {}",
                    result.rc, result.text
                )));
            }
        }

        info!(host = %server.host, "directory connection established");

        Ok(Self {
            ldap,
            queries: section.queries.clone(),
        })
    }

    /// Fetch raw user entries with the configured filter and attributes.
    pub async fn fetch_raw_users(&mut self) -> DirectoryResult<Vec<RawEntry>> {
        let queries = self.queries.clone();
        let mut attrs = vec![
            queries.user_unique_attribute.clone(),
            queries.effective_match_attribute().to_string(),
            queries.user_name_attribute.clone(),
            queries.user_email_attribute.clone(),
        ];
        if let Some(admin_attr) = &queries.user_ldap_admin_attribute {
            attrs.push(admin_attr.clone());
        }
        if let Some(key_attr) = &queries.user_ssh_key_attribute {
            attrs.push(key_attr.clone());
        }

        self.search(&queries.user_base(), &queries.user_filter, attrs)
            .await
    }

    /// Fetch raw group entries with the configured filter and attributes.
    pub async fn fetch_raw_groups(&mut self) -> DirectoryResult<Vec<RawEntry>> {
        let queries = self.queries.clone();
        let attrs = vec![
            queries.group_unique_attribute.clone(),
            queries.group_member_attribute.clone(),
        ];

        self.search(&queries.group_base(), &queries.group_filter, attrs)
            .await
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: Vec<String>,
    ) -> DirectoryResult<Vec<RawEntry>> {
        debug!(base = %base, filter = %filter, "searching directory");

        let result = self
            .ldap
            .search(base, Scope::Subtree, filter, attrs)
            .await
            .map_err(|e| DirectoryError::transport(format!("search under {base} failed"), e))?;

        let (entries, _res) = result.success().map_err(|e| {
            DirectoryError::search(format!("search under {base} returned failure: {e}"))
        })?;

        let entries: Vec<RawEntry> = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(RawEntry::from_search_entry)
            .collect();

        info!(base = %base, count = entries.len(), "directory search completed");

        Ok(entries)
    }

    /// Unbind and drop the connection.
    pub async fn unbind(mut self) {
        if let Err(e) = self.ldap.unbind().await {
            warn!(error = %e, "error during directory unbind");
        }
    }
}
