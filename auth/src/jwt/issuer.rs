use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::Claims;
use super::claims::RESERVED_CLAIMS;
use super::errors::TokenError;

/// Issues and verifies signed session tokens.
///
/// Tokens are HS256 JWTs. The signing secret is process-wide and read-only
/// after construction, so a single issuer can be shared behind an `Arc`.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Minimum secret length for HS256 (256 bits).
    pub const MIN_SECRET_LEN: usize = 32;

    /// Create a new token issuer with a secret key.
    ///
    /// # Errors
    /// * `WeakSecret` - Secret is shorter than 32 bytes
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.len() < Self::MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret {
                min: Self::MIN_SECRET_LEN,
                actual: secret.len(),
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Sign claims into a token expiring `ttl` from now.
    ///
    /// # Errors
    /// * `Signing` - Token encoding failed
    pub fn generate(&self, claims: &Claims, ttl: Duration) -> Result<String, TokenError> {
        self.generate_at(claims, Utc::now(), ttl)
    }

    /// Sign claims into a token issued at `issued_at` and expiring `ttl` later.
    ///
    /// Any `iat`/`exp` already present on `claims` is replaced.
    ///
    /// # Errors
    /// * `Signing` - Token encoding failed
    pub fn generate_at(
        &self,
        claims: &Claims,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let mut stamped = claims.clone();
        stamped
            .extra
            .retain(|key, _| !RESERVED_CLAIMS.contains(&key.as_str()));
        stamped.iat = Some(issued_at.timestamp());
        stamped.exp = Some((issued_at + ttl).timestamp());

        encode(&Header::new(Algorithm::HS256), &stamped, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    /// * `Malformed` - Token is structurally invalid or lacks `exp`
    /// * `SignatureInvalid` - Signature does not match the payload
    /// * `Expired` - `exp` is in the past
    /// * `Signing` - Verification key is unusable
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_) => TokenError::Signing(e.to_string()),
                _ => TokenError::Malformed(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"my_secret_key_at_least_32_bytes_long!";

    fn session_claims() -> Claims {
        Claims::new()
            .with_subject("user123")
            .with_extra("user_id", "user123")
            .with_extra("role", "buyer")
    }

    #[test]
    fn test_generate_and_parse() {
        let issuer = TokenIssuer::new(SECRET).expect("Failed to create issuer");
        let claims = session_claims();

        let token = issuer
            .generate(&claims, Duration::minutes(5))
            .expect("Failed to generate token");
        assert_eq!(token.split('.').count(), 3);

        let parsed = issuer.parse(&token).expect("Failed to parse token");
        assert_eq!(parsed.sub, claims.sub);
        assert_eq!(parsed.extra, claims.extra);

        let iat = parsed.iat.expect("iat missing");
        let exp = parsed.exp.expect("exp missing");
        assert_eq!(exp - iat, 5 * 60);
    }

    #[test]
    fn test_parse_expired_token() {
        let issuer = TokenIssuer::new(SECRET).expect("Failed to create issuer");
        let issued_at = Utc::now() - Duration::hours(2);

        let token = issuer
            .generate_at(&session_claims(), issued_at, Duration::hours(1))
            .expect("Failed to generate token");

        assert_eq!(issuer.parse(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_reserved_claims_are_overwritten() {
        let issuer = TokenIssuer::new(SECRET).expect("Failed to create issuer");
        let claims = session_claims().with_extra("exp", 1);

        let token = issuer
            .generate(&claims, Duration::minutes(5))
            .expect("Failed to generate token");
        let parsed = issuer.parse(&token).expect("Failed to parse token");

        assert!(parsed.exp.expect("exp missing") > Utc::now().timestamp());
        assert!(!parsed.extra.contains_key("exp"));
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let issuer = TokenIssuer::new(SECRET).expect("Failed to create issuer");

        assert!(matches!(
            issuer.parse("invalid.token.here"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(issuer.parse(""), Err(TokenError::Malformed(_))));
        assert!(matches!(
            issuer.parse("no-dots-at-all"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_with_wrong_secret() {
        let issuer1 = TokenIssuer::new(b"secret1_at_least_32_bytes_long_key!").unwrap();
        let issuer2 = TokenIssuer::new(b"secret2_at_least_32_bytes_long_key!").unwrap();

        let token = issuer1
            .generate(&session_claims(), Duration::minutes(5))
            .expect("Failed to generate token");

        assert_eq!(issuer2.parse(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_flipping_any_character_is_rejected() {
        let issuer = TokenIssuer::new(SECRET).expect("Failed to create issuer");
        let token = issuer
            .generate(&session_claims(), Duration::minutes(5))
            .expect("Failed to generate token");

        for position in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[position] = if bytes[position] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).expect("Token is ASCII");

            let result = issuer.parse(&tampered);
            assert!(
                matches!(
                    result,
                    Err(TokenError::SignatureInvalid) | Err(TokenError::Malformed(_))
                ),
                "position {} produced {:?}",
                position,
                result
            );
        }
    }

    #[test]
    fn test_token_without_exp_is_malformed() {
        let issuer = TokenIssuer::new(SECRET).expect("Failed to create issuer");
        let token = encode(
            &Header::new(Algorithm::HS256),
            &session_claims(),
            &EncodingKey::from_secret(SECRET),
        )
        .expect("Failed to encode token");

        assert!(matches!(issuer.parse(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_weak_secret_rejected() {
        let result = TokenIssuer::new(b"short");

        assert!(matches!(
            result,
            Err(TokenError::WeakSecret { min: 32, actual: 5 })
        ));
        assert!(result.err().map_or(false, |e| e.is_fatal()));
    }
}
