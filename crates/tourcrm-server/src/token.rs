// SPDX-License-Identifier: Apache-2.0

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tourcrm_core::canonical::{decode_token_payload, encode_token_payload};
use tourcrm_model::Role;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id.
    pub sub: i64,
    /// Organization id the user belongs to.
    pub org: i64,
    pub role: Role,
    /// Issue time, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl TokenError {
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for TokenError {}

fn mac_for(secret: &str) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Malformed)
}

/// `base64url(claims).hex(hmac_sha256(secret, base64url(claims)))`.
pub fn issue_token(secret: &str, claims: &TokenClaims) -> Result<String, String> {
    let payload = encode_token_payload(claims).map_err(|e| e.to_string())?;
    let mut mac = mac_for(secret).map_err(|e| e.to_string())?;
    mac.update(payload.as_bytes());
    Ok(format!("{payload}.{}", hex::encode(mac.finalize().into_bytes())))
}

/// Checks the signature in constant time, then the expiry against `now`.
pub fn verify_token(secret: &str, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
    let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;
    let mut mac = mac_for(secret)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;
    let value = decode_token_payload(payload).map_err(|_| TokenError::Malformed)?;
    let claims: TokenClaims = serde_json::from_value(value).map_err(|_| TokenError::Malformed)?;
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-0123456789";

    fn claims() -> TokenClaims {
        TokenClaims {
            sub: 7,
            org: 3,
            role: Role::Agent,
            iat: 1_000,
            exp: 2_000,
        }
    }

    #[test]
    fn issued_tokens_verify_until_expiry() {
        let token = issue_token(SECRET, &claims()).expect("issue");
        assert_eq!(verify_token(SECRET, &token, 1_500), Ok(claims()));
        assert_eq!(verify_token(SECRET, &token, 2_000), Err(TokenError::Expired));
    }

    #[test]
    fn tampering_is_detected() {
        let token = issue_token(SECRET, &claims()).expect("issue");
        let (_, sig) = token.split_once('.').expect("two parts");
        let forged_claims = TokenClaims {
            role: Role::SuperAdmin,
            ..claims()
        };
        let forged_payload = encode_token_payload(&forged_claims).expect("encode");
        let forged = format!("{forged_payload}.{sig}");
        assert_eq!(
            verify_token(SECRET, &forged, 1_500),
            Err(TokenError::BadSignature)
        );
        assert_eq!(
            verify_token("another-secret-value", &token, 1_500),
            Err(TokenError::BadSignature)
        );
        assert_eq!(verify_token(SECRET, "no-dot", 0), Err(TokenError::Malformed));
        assert_eq!(verify_token(SECRET, "abc.zz", 0), Err(TokenError::Malformed));
    }
}
