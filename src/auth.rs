use std::collections::HashMap;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Salted digest in the `sha256$<salt hex>$<digest hex>` form accepted
/// by the user list. The salt is random per call.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    hash_password_with_salt(password, &salt)
}

pub fn hash_password_with_salt(password: &str, salt: &[u8]) -> String {
    format!(
        "{SCHEME}${}${}",
        hex::encode(salt),
        hex::encode(salted_digest(salt, password))
    )
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Compares every byte regardless of where the first mismatch is.
fn ct_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, PartialEq)]
struct StoredHash {
    salt: Vec<u8>,
    digest: [u8; 32],
}

impl StoredHash {
    fn parse(name: &str, encoded: &str) -> Result<Self, AppError> {
        let malformed = || {
            AppError::Config(format!(
                "password hash for {name:?} is not {SCHEME}$<salt hex>$<digest hex>"
            ))
        };

        let mut parts = encoded.trim().split('$');
        let (Some(SCHEME), Some(salt), Some(digest), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let salt = hex::decode(salt).map_err(|_| malformed())?;
        if salt.is_empty() {
            return Err(malformed());
        }
        let digest: [u8; 32] = hex::decode(digest)
            .ok()
            .and_then(|d| d.try_into().ok())
            .ok_or_else(malformed)?;

        Ok(Self { salt, digest })
    }

    fn matches(&self, password: &str) -> bool {
        ct_eq(&salted_digest(&self.salt, password), &self.digest)
    }
}

/// Dashboard users, keyed by name, holding salted password digests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    users: HashMap<String, StoredHash>,
}

impl Credentials {
    /// Parse `name:sha256$salt$digest` entries separated by commas.
    pub fn parse(spec: &str) -> Result<Self, AppError> {
        let mut users = HashMap::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, encoded) = entry.split_once(':').ok_or_else(|| {
                AppError::Config(format!("user entry {entry:?} is not name:hash"))
            })?;
            let name = name.trim();
            users.insert(name.to_string(), StoredHash::parse(name, encoded)?);
        }
        Ok(Self { users })
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|stored| stored.matches(password))
    }

    /// Check an `Authorization: Basic …` header value. The scheme name is
    /// case-insensitive. Returns the user name on success.
    pub fn verify_basic_header(&self, value: &str) -> Option<String> {
        let (scheme, encoded) = value.trim_start().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        self.verify(user, password).then(|| user.to_string())
    }
}

/// Middleware in front of the dashboard API.
/// With no users configured every request passes.
pub async fn require_login(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let users = &state.config.users;
    if users.is_empty() {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match header.and_then(|h| users.verify_basic_header(h)) {
        Some(user) => {
            debug!(%user, path = %request.uri().path(), "Authenticated request");
            Ok(next.run(request).await)
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected unauthenticated request");
            Err(AppError::Unauthorized)
        }
    }
}
