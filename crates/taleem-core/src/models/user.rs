//! User profile and token payloads exchanged with the auth endpoints.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Account role, decides which dashboard a user lands on.
///
/// Roles the client does not know are kept verbatim in `Other` so the cached
/// `user_data` round-trips unchanged; they land on the student dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Role {
    #[default]
    Student,
    Admin,
    Other(String),
}

impl Role {
    /// Wire name as sent by the backend.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
            Role::Other(name) => name,
        }
    }

    /// Entry page after login.
    pub fn landing_path(&self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Student | Role::Other(_) => "/dashboard",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Role::Student => "Student",
            Role::Admin => "Admin",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        match name.as_str() {
            "student" => Role::Student,
            "admin" => Role::Admin,
            _ => Role::Other(name),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Role::from)
    }
}

/// Cached profile snapshot stored under `user_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "full_name", default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Django serializes primary keys as numbers, older payloads used strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Body of the login and register endpoints.
///
/// Both fields are optional on the wire so a partial payload can be
/// reported as an invalid response instead of a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub tokens: Option<TokenPair>,
    pub user: Option<User>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}
