//! Identity and profile models.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Application role, gating which dashboard and actions are shown.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Retailer,
}

impl Role {
    /// Parse a role string case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "customer" => Some(Role::Customer),
            "retailer" => Some(Role::Retailer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Retailer => "retailer",
        }
    }

    /// Landing route after sign-in.
    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Role::Customer => "/customer/dashboard",
            Role::Retailer => "/retailer/dashboard",
        }
    }
}

// Unknown or missing roles degrade to customer rather than failing the row.
impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(Role::parse).unwrap_or_default())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bare credential record from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub user_metadata: HashMap<String, serde_json::Value>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
            user_metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry (builder style).
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.user_metadata.insert(key.to_string(), value.into());
        self
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn metadata_full_name(&self) -> Option<&str> {
        self.metadata_str("full_name")
    }

    /// Role recorded in provider metadata. Unknown strings are ignored.
    pub fn metadata_role(&self) -> Option<Role> {
        self.metadata_str("role").and_then(Role::parse)
    }

    pub fn metadata_phone(&self) -> Option<&str> {
        self.metadata_str("phone")
    }

    /// Local part of the email address, if any.
    pub fn email_local_part(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
    }
}

/// Application-level user record from the `profiles` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub email: String,
    #[serde(alias = "fullName", default, deserialize_with = "super::null_as_default")]
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Profile {
    /// Synthesize a minimal profile from provider metadata.
    ///
    /// Used whenever the profile table cannot be reached in time.
    pub fn from_identity(user: &UserIdentity) -> Self {
        let full_name = user
            .metadata_full_name()
            .or_else(|| user.email_local_part())
            .unwrap_or("User")
            .to_string();

        Self {
            id: user.id.clone(),
            email: user.email.clone().unwrap_or_default(),
            full_name,
            role: user.metadata_role().unwrap_or_default(),
            phone: user.metadata_phone().map(str::to_string),
        }
    }

    pub fn is_retailer(&self) -> bool {
        self.role == Role::Retailer
    }

    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }
}

/// Partial profile update for `profiles`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none() && self.role.is_none()
    }

    /// Apply this update to an existing profile.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.full_name {
            profile.full_name = name.clone();
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(role) = self.role {
            profile.role = role;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("retailer"), Some(Role::Retailer));
        assert_eq!(Role::parse(" Customer "), Some(Role::Customer));
        assert_eq!(Role::parse("admin"), None);

        let role: Role = serde_json::from_value(json!("admin")).unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_profile_from_metadata() {
        let user = UserIdentity::new("u1", "asha@example.com")
            .with_metadata("full_name", "Asha Rao")
            .with_metadata("role", "retailer");

        let profile = Profile::from_identity(&user);
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.full_name, "Asha Rao");
        assert_eq!(profile.role, Role::Retailer);
    }

    #[test]
    fn test_profile_from_bare_identity() {
        let user = UserIdentity::new("u2", "ravi@example.com");
        let profile = Profile::from_identity(&user);

        assert_eq!(profile.full_name, "ravi");
        assert_eq!(profile.role, Role::Customer);

        let anonymous = UserIdentity {
            id: "u3".into(),
            ..Default::default()
        };
        assert_eq!(Profile::from_identity(&anonymous).full_name, "User");
    }

    #[test]
    fn test_profile_accepts_camel_case() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@b.c",
            "fullName": "A B",
            "role": "retailer"
        }))
        .unwrap();

        assert_eq!(profile.full_name, "A B");
        assert!(profile.is_retailer());
    }

    #[test]
    fn test_profile_update_apply() {
        let mut profile = Profile::from_identity(&UserIdentity::new("u1", "a@b.c"));
        let update = ProfileUpdate {
            phone: Some("98765".into()),
            ..Default::default()
        };
        update.apply_to(&mut profile);

        assert_eq!(profile.phone.as_deref(), Some("98765"));
        assert_eq!(profile.full_name, "a");
    }
}
