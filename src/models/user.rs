use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Metadata key the login flow writes the active session token to
pub const CURRENT_SESSION_TOKEN_KEY: &str = "current_session_token";

/// Account record returned by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Arbitrary account metadata, null is treated as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_metadata: HashMap<String, Value>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            user_metadata: HashMap::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.set_session_token(Some(token.into()));
        self
    }

    /// Replace (or remove) the account-level session token
    pub fn set_session_token(&mut self, token: Option<String>) {
        match token {
            Some(token) => {
                self.user_metadata
                    .insert(CURRENT_SESSION_TOKEN_KEY.to_string(), Value::String(token));
            }
            None => {
                self.user_metadata.remove(CURRENT_SESSION_TOKEN_KEY);
            }
        }
    }

    /// The token of the most recent login on this account, if one was recorded.
    /// Non-string and empty values count as absent.
    pub fn current_session_token(&self) -> Option<&str> {
        self.user_metadata
            .get(CURRENT_SESSION_TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_user_with_session_token() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "8a7f",
            "email": "coach@liceo.example",
            "aud": "authenticated",
            "user_metadata": {
                "full_name": "Coach",
                "current_session_token": "abc"
            }
        }))
        .unwrap();

        assert_eq!(user.id, "8a7f");
        assert_eq!(user.current_session_token(), Some("abc"));
    }

    #[test]
    fn test_null_metadata_has_no_token() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "8a7f",
            "user_metadata": null
        }))
        .unwrap();

        assert!(user.user_metadata.is_empty());
        assert_eq!(user.current_session_token(), None);
    }

    #[test]
    fn test_empty_or_non_string_token_is_absent() {
        let mut user = AuthUser::new("u1");
        user.user_metadata
            .insert(CURRENT_SESSION_TOKEN_KEY.to_string(), json!(""));
        assert_eq!(user.current_session_token(), None);

        user.user_metadata
            .insert(CURRENT_SESSION_TOKEN_KEY.to_string(), json!(42));
        assert_eq!(user.current_session_token(), None);
    }

    #[test]
    fn test_set_session_token_replaces_and_clears() {
        let mut user = AuthUser::new("u1").with_session_token("abc");
        user.set_session_token(Some("xyz".to_string()));
        assert_eq!(user.current_session_token(), Some("xyz"));

        user.set_session_token(None);
        assert_eq!(user.current_session_token(), None);
    }
}
