//! Cloud identity check. A token is present only when the user is signed in
//! and cloud sync is enabled for this device.

use std::fmt;
use std::sync::Mutex;

#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken(String);

impl IdentityToken {
    pub fn new(value: impl Into<String>) -> Self {
        IdentityToken(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens identify an account; keep them out of logs.
impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityToken([REDACTED])")
    }
}

pub trait CloudIdentity: Send + Sync {
    fn current_identity_token(&self) -> Option<IdentityToken>;
}

/// Identity fixed by the host, switchable to model sign-in and sign-out.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    token: Mutex<Option<IdentityToken>>,
}

impl StaticIdentity {
    pub fn signed_in(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(IdentityToken::new(token))),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<IdentityToken>) {
        *self.token.lock().unwrap_or_else(|p| p.into_inner()) = token;
    }
}

impl CloudIdentity for StaticIdentity {
    fn current_identity_token(&self) -> Option<IdentityToken> {
        self.token.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
