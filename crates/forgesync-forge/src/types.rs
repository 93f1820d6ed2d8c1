//! Forge-side wire types.

use serde::{Deserialize, Deserializer, Serialize};

/// A user account on the forge.
///
/// The attribute fields are `None` when the forge does not expose
/// them to the sync principal; the reconciler only acts on attributes
/// it can actually observe.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgeUser {
    pub id: u64,
    pub username: String,
    /// Derived from the account state reported by the forge.
    #[serde(rename = "state", default, deserialize_with = "blocked_from_state")]
    pub blocked: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "is_admin", default)]
    pub admin: Option<bool>,
    #[serde(default)]
    pub external: Option<bool>,
    #[serde(default)]
    pub can_create_group: Option<bool>,
}

fn blocked_from_state<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let state = String::deserialize(deserializer)?;
    Ok(state == "blocked" || state == "ldap_blocked")
}

/// An SSH key attached to a forge user.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgeSshKey {
    pub id: u64,
    /// Full OpenSSH key line as stored by the forge.
    pub key: String,
}

/// A group on the forge.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgeGroup {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub full_path: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

/// A group membership entry on the forge.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgeMember {
    pub id: u64,
    pub username: String,
    pub access_level: u32,
}

/// Body of a user creation call.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUserPayload {
    pub email: String,
    pub password: String,
    pub username: String,
    pub name: String,
    pub extern_uid: String,
    pub provider: String,
    pub admin: bool,
    pub can_create_group: bool,
    pub external: bool,
    pub skip_confirmation: bool,
    pub reset_password: bool,
}

/// Body of a user update call. Absent fields are left untouched by
/// the forge, which allows both the full update (the creation
/// attributes minus username and password) and the narrow demotion
/// patch applied to blocked users.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateUserPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extern_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_create_group: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_confirmation: Option<bool>,
}

impl UpdateUserPayload {
    /// The patch applied to a user being disabled:
    /// `{admin: false, can_create_group: false, external: true}`.
    #[must_use]
    pub fn demoted() -> Self {
        UpdateUserPayload {
            admin: Some(false),
            can_create_group: Some(false),
            external: Some(true),
            ..UpdateUserPayload::default()
        }
    }
}
