use crate::errors::LavError;
use crate::settings::Keys;
use base64ct::Encoding;
use josekit::jwk::Jwk;
use josekit::jws::{JwsHeader, RS256};
use josekit::jwt::{self, JwtPayload, JwtPayloadValidator};
use rand::RngCore;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Claims carried by a LavControl bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: String,
    pub username: String,
    pub role: String,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct JwksManager {
    issuer: String,
    public_jwks_value: Arc<Value>,
    private_jwk: Arc<Jwk>,
    public_jwk: Arc<Jwk>,
}

impl JwksManager {
    pub async fn new(cfg: Keys, issuer: String) -> Result<Self, LavError> {
        // Ensure parent dirs exist
        if let Some(parent) = cfg.jwks_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = cfg.private_key_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // If private key exists, load it; otherwise generate and persist both private and public
        let private_jwk = if cfg.private_key_path.exists() {
            let s = fs::read_to_string(&cfg.private_key_path)?;
            serde_json::from_str::<Jwk>(&s)?
        } else {
            let mut jwk = Jwk::generate_rsa_key(2048)?;
            let kid = cfg.key_id.clone().unwrap_or_else(random_kid);
            jwk.set_key_id(&kid);
            jwk.set_algorithm(cfg.alg.as_str());
            jwk.set_key_use("sig");
            fs::write(&cfg.private_key_path, serde_json::to_string_pretty(&jwk)?)?;
            tracing::info!(path = %cfg.private_key_path.display(), "Generated new signing key");
            jwk
        };
        let public_jwk = private_jwk.to_public_key()?;

        if !cfg.jwks_path.exists() {
            let jwk_val: Value = serde_json::to_value(&public_jwk)?;
            let jwks = json!({ "keys": [jwk_val] });
            fs::write(&cfg.jwks_path, serde_json::to_string_pretty(&jwks)?)?;
        }

        let public_jwks_value: Value = serde_json::from_str(&fs::read_to_string(&cfg.jwks_path)?)?;

        Ok(Self {
            issuer,
            public_jwks_value: Arc::new(public_jwks_value),
            private_jwk: Arc::new(private_jwk),
            public_jwk: Arc::new(public_jwk),
        })
    }

    pub fn jwks_json(&self) -> Value {
        (*self.public_jwks_value).clone()
    }

    /// Sign a bearer token for the given user, valid for `ttl_secs`.
    pub fn issue_token(
        &self,
        subject: &str,
        username: &str,
        role: &str,
        ttl_secs: i64,
    ) -> Result<(String, i64), LavError> {
        let now = SystemTime::now();
        let expires = now + Duration::from_secs(ttl_secs.max(1) as u64);

        let mut payload = JwtPayload::new();
        payload.set_subject(subject);
        payload.set_issuer(&self.issuer);
        payload.set_issued_at(&now);
        payload.set_expires_at(&expires);
        payload.set_claim("username", Some(Value::String(username.to_string())))?;
        payload.set_claim("role", Some(Value::String(role.to_string())))?;

        let signer = RS256.signer_from_jwk(&self.private_jwk)?;
        let mut header = JwsHeader::new();
        if let Some(kid) = self.private_jwk.key_id() {
            header.set_key_id(kid);
        }
        header.set_algorithm("RS256");
        header.set_token_type("JWT");
        let token = jwt::encode_with_signer(&payload, &header, &signer)?;

        Ok((token, unix_secs(expires)))
    }

    /// Verify signature, issuer and expiry of a bearer token.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, LavError> {
        let invalid = |_| LavError::Unauthorized("Invalid or expired token".to_string());

        let verifier = RS256.verifier_from_jwk(&self.public_jwk)?;
        let (payload, _header) = jwt::decode_with_verifier(token, &verifier).map_err(invalid)?;

        let mut validator = JwtPayloadValidator::new();
        validator.set_base_time(SystemTime::now());
        validator.set_issuer(&self.issuer);
        validator.validate(&payload).map_err(invalid)?;

        let claim_str = |key: &str| {
            payload
                .claim(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let subject = payload
            .subject()
            .map(str::to_string)
            .ok_or_else(|| LavError::Unauthorized("Token has no subject".to_string()))?;
        let expires_at = payload.expires_at().map(unix_secs).unwrap_or_default();

        Ok(TokenClaims {
            subject,
            username: claim_str("username").unwrap_or_default(),
            role: claim_str("role").unwrap_or_default(),
            expires_at,
        })
    }
}

fn unix_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn random_kid() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}
