//! # thunder-token
//!
//! The token builder and claim resolver (§4.6, §4.7; components C6, C7)
//! that mint Thunder's OAuth2/OIDC access, refresh, and ID tokens.
//!
//! ## Architecture
//!
//! - `claims` - `build_claims`, the scope/explicit-claim resolver (C7)
//! - `builder` - `TokenBuilder`, the three `Build*Token` operations (C6)

mod builder;
mod claims;

pub use builder::{
    AccessTokenContext, ActorClaim, GlobalTokenConfig, IdTokenContext, RefreshTokenContext,
    TokenBuilder, TokenKind, TokenResult,
};
pub use claims::build_claims;
