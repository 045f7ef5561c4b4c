use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use service_core::authz::Role;

/// Claims carried by a homily API bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct BearerTokenClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
}

/// Read a token's claims without checking the signature.
///
/// Only the shape is checked here; whether the token is still accepted is
/// for the homily API to decide.
pub fn decode_unverified(token: &str) -> Result<BearerTokenClaims, anyhow::Error> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    };

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    serde_json::from_slice(&payload).map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.signature",
            general_purpose::URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_claims() {
        let token = token_with_payload(
            r#"{"sub":"0b5d","email":"editor@parafia.example","role":"EDITOR","exp":9999999999,"iat":1,"jti":"x"}"#,
        );

        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.sub, "0b5d");
        assert_eq!(claims.role, Role::Editor);
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        assert!(decode_unverified("not-a-token").is_err());
        assert!(decode_unverified("a.b.c.d").is_err());
        assert!(decode_unverified("a.!!!.c").is_err());
        assert!(decode_unverified(&token_with_payload(r#"{"sub":"x"}"#)).is_err());
        assert!(decode_unverified(&token_with_payload(
            r#"{"sub":"x","email":"e","role":"OWNER","exp":1}"#
        ))
        .is_err());
    }
}
