//! Authentication signal consumed by the cart.
//!
//! The cart does not authenticate anyone. It only needs to know whether the
//! current caller is signed in, whether that answer is still being worked
//! out, and which role the user has. The role arrives as a loose string from
//! the session layer and is decoded once, here, into [`Role`].

use serde::{Deserialize, Deserializer, Serialize};

use super::id::UserId;

/// User role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper.
    #[default]
    Customer,
    /// Store administrator.
    Admin,
}

impl Role {
    /// Decode a role string from the session layer.
    ///
    /// Unknown or missing roles are treated as [`Role::Customer`]; only an
    /// exact `"admin"` grants [`Role::Admin`].
    #[must_use]
    pub fn decode(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::decode(raw.as_deref()))
    }
}

/// The signed-in user as seen by the cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserDescriptor {
    /// Identifier, when the session layer exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    /// Decoded role.
    #[serde(default)]
    pub role: Role,
}

impl UserDescriptor {
    /// Create a descriptor with the given role and no identifier.
    #[must_use]
    pub const fn with_role(role: Role) -> Self {
        Self { id: None, role }
    }

    /// Whether the user is a store administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Authentication signal from the session layer.
///
/// Field names follow the session layer's JSON (`isAuthenticated`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Whether the caller is signed in.
    #[serde(default)]
    pub is_authenticated: bool,
    /// The signed-in user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDescriptor>,
    /// Whether the session layer is still resolving the caller.
    #[serde(default)]
    pub is_loading: bool,
    /// Whether resolving the caller failed.
    #[serde(default)]
    pub is_error: bool,
}

/// Decoded authentication status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// Still loading; neither cart is final yet.
    Unknown,
    /// Anonymous visitor.
    Guest,
    /// Signed-in user.
    Authenticated(UserDescriptor),
}

impl AuthState {
    /// An anonymous visitor.
    #[must_use]
    pub const fn guest() -> Self {
        Self {
            is_authenticated: false,
            user: None,
            is_loading: false,
            is_error: false,
        }
    }

    /// A session whose status is still being resolved.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            is_authenticated: false,
            user: None,
            is_loading: true,
            is_error: false,
        }
    }

    /// A signed-in user.
    #[must_use]
    pub const fn authenticated(user: UserDescriptor) -> Self {
        Self {
            is_authenticated: true,
            user: Some(user),
            is_loading: false,
            is_error: false,
        }
    }

    /// Decode the signal into a status.
    ///
    /// Loading wins over everything else. A failed lookup that did not
    /// authenticate the caller is a guest.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        if self.is_loading {
            AuthStatus::Unknown
        } else if self.is_authenticated {
            AuthStatus::Authenticated(self.user.clone().unwrap_or_default())
        } else {
            AuthStatus::Guest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_decode() {
        assert_eq!(Role::decode(Some("admin")), Role::Admin);
        assert_eq!(Role::decode(Some("customer")), Role::Customer);
        assert_eq!(Role::decode(Some("superuser")), Role::Customer);
        assert_eq!(Role::decode(Some("Admin")), Role::Customer);
        assert_eq!(Role::decode(None), Role::Customer);
    }

    #[test]
    fn test_role_display_round_trip() {
        for role in [Role::Customer, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_auth_state_from_session_json() {
        let raw = r#"{"isAuthenticated":true,"user":{"role":"admin"},"isLoading":false,"isError":false}"#;
        let state: AuthState = serde_json::from_str(raw).unwrap();

        assert_eq!(
            state.status(),
            AuthStatus::Authenticated(UserDescriptor::with_role(Role::Admin))
        );
        assert!(state.user.unwrap().is_admin());
    }

    #[test]
    fn test_user_without_role_is_customer() {
        let raw = r#"{"isAuthenticated":true,"user":{}}"#;
        let state: AuthState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.user.unwrap().role, Role::Customer);

        let raw = r#"{"isAuthenticated":true,"user":{"role":null}}"#;
        let state: AuthState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.user.unwrap().role, Role::Customer);
    }

    #[test]
    fn test_status_loading_wins() {
        let mut state = AuthState::authenticated(UserDescriptor::default());
        state.is_loading = true;
        assert_eq!(state.status(), AuthStatus::Unknown);
    }

    #[test]
    fn test_status_error_without_auth_is_guest() {
        let state = AuthState {
            is_error: true,
            ..AuthState::default()
        };
        assert_eq!(state.status(), AuthStatus::Guest);
        assert_eq!(AuthState::guest().status(), AuthStatus::Guest);
    }
}
