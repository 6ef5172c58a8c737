//! Demo session model: a fixed-credential login gate with a per-login
//! request quota. There is no token issuance and no expiry; the session
//! lives exactly as long as the logged-in flag.

use serde::Serialize;
use thiserror::Error;

/// Demo login username.
pub const DEMO_USERNAME: &str = "demo";

/// Demo login password.
pub const DEMO_PASSWORD: &str = "password";

/// Faucet requests granted per login.
pub const DEFAULT_QUOTA: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// The fixed credential pair the guard checks against.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let credentials = Self {
            username: username.into(),
            password: password.into(),
        };
        assert!(
            !credentials.username.is_empty(),
            "Demo username cannot be empty"
        );
        assert!(
            !credentials.password.is_empty(),
            "Demo password cannot be empty"
        );
        credentials
    }

    /// Both fields must match exactly; anything else is a failed login.
    pub fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username == self.username && password == self.password {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEMO_USERNAME, DEMO_PASSWORD)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub requests_left: u32,
}

impl Session {
    pub fn new(username: &str, quota: u32) -> Self {
        assert!(quota > 0, "Login quota must be positive");
        assert!(quota <= 1_000, "Login quota exceeds defensive bound");
        Self {
            username: username.to_string(),
            requests_left: quota,
        }
    }

    /// Consume one quota unit. Returns false when the quota is exhausted,
    /// leaving the counter at zero.
    pub fn consume_request(&mut self) -> bool {
        if self.requests_left == 0 {
            return false;
        }
        self.requests_left -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_exact_match_only() {
        let credentials = Credentials::default();
        assert_eq!(credentials.verify("demo", "password"), Ok(()));
        assert_eq!(
            credentials.verify("demo", "Password"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            credentials.verify("Demo", "password"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            credentials.verify("x", "y"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            credentials.verify("", ""),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn test_session_starts_with_full_quota() {
        let session = Session::new("demo", DEFAULT_QUOTA);
        assert_eq!(session.requests_left, 5);
    }

    #[test]
    fn test_consume_request_stops_at_zero() {
        let mut session = Session::new("demo", 2);
        assert!(session.consume_request());
        assert!(session.consume_request());
        assert!(!session.consume_request());
        assert_eq!(session.requests_left, 0);
    }
}
