//! Token-shaping configuration (§3 `TokenConfig`, `ClaimsRequest`, `OAuthApp`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualClaim {
    #[serde(default)]
    pub essential: Option<bool>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub values: Option<Vec<serde_json::Value>>,
}

impl IndividualClaim {
    /// `true` if unconstrained (no `value`/`values`), meaning any present
    /// attribute value satisfies the request (§4.7 rule 3).
    pub fn is_unconstrained(&self) -> bool {
        self.value.is_none() && self.values.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsRequest {
    #[serde(default)]
    pub userinfo: BTreeMap<String, IndividualClaim>,
    #[serde(default)]
    pub id_token: BTreeMap<String, IndividualClaim>,
}

impl ClaimsRequest {
    pub fn is_empty(&self) -> bool {
        self.userinfo.is_empty() && self.id_token.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenKindConfig {
    #[serde(default)]
    pub validity: Option<i64>,
    #[serde(default)]
    pub user_attributes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppTokenConfig {
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub access_token: Option<TokenKindConfig>,
    #[serde(default)]
    pub id_token: Option<TokenKindConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfoConfig {
    #[serde(default)]
    pub user_attributes: Vec<String>,
}

/// Consumed subset of an OAuth application's configuration (§3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthApp {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub pkce_required: bool,
    #[serde(default)]
    pub public_client: bool,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub token: AppTokenConfig,
    /// scope -> claim names.
    #[serde(default)]
    pub scope_claims: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub user_info: Option<UserInfoConfig>,
}
