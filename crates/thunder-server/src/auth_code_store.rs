//! One-time authorization-code store (§5 "At-most-once": authorization
//! codes are single-use; the token endpoint deletes the code under lock
//! before emitting tokens, rejecting concurrent redemptions).

use dashmap::DashMap;
use thunder_model::ClaimsRequest;

/// What the flow engine handed off to the token endpoint when an
/// authentication flow completed with an `authorization_code` grant
/// in play (§6 "the authorization server had stored the outcome of the
/// flow (assertion + scopes + app + subject) keyed by `code`").
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub application_id: String,
    pub subject: String,
    pub scopes: Vec<String>,
    pub assertion: String,
    pub claims_request: ClaimsRequest,
    pub redirect_uri: Option<String>,
}

#[derive(Default)]
pub struct AuthCodeStore {
    codes: DashMap<String, AuthorizationGrant>,
}

impl AuthCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, code: impl Into<String>, grant: AuthorizationGrant) {
        self.codes.insert(code.into(), grant);
    }

    /// Redeems `code` at most once. A second call for the same code
    /// returns `None`, which the token endpoint maps to `invalid_grant`.
    pub fn redeem(&self, code: &str) -> Option<AuthorizationGrant> {
        self.codes.remove(code).map(|(_, grant)| grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> AuthorizationGrant {
        AuthorizationGrant {
            application_id: "app-1".into(),
            subject: "U".into(),
            scopes: vec!["openid".into()],
            assertion: "assertion".into(),
            claims_request: ClaimsRequest::default(),
            redirect_uri: None,
        }
    }

    #[test]
    fn second_redemption_fails() {
        let store = AuthCodeStore::new();
        store.issue("code-1", grant());
        assert!(store.redeem("code-1").is_some());
        assert!(store.redeem("code-1").is_none());
    }
}
