// SPDX-License-Identifier: Apache-2.0

use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tourcrm_core::{OrganizationId, UserId};
use tourcrm_model::{resource_by_name, validate_value, FieldError, Role, SqlValue};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::pool::Ctx;
use crate::row::{fetch_row, Row};

const SALT_BYTES: usize = 16;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: String,
}

/// The identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub organization_id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password: String,
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// `pbkdf2$<iterations>$<salt-hex>$<hash-hex>` with a fresh random salt.
pub fn hash_password(password: &str, iterations: u32) -> Result<String, StoreError> {
    let mut salt = [0u8; SALT_BYTES];
    let mut rng = rand::rng();
    rng.fill(&mut salt);
    let hash = pbkdf2_sha256(password.as_bytes(), &salt, iterations.max(1));
    Ok(format!(
        "pbkdf2${}${}${}",
        iterations.max(1),
        hex::encode(salt),
        hex::encode(hash)
    ))
}

/// Malformed stored hashes never verify.
#[must_use]
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some("pbkdf2"), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (iterations.parse::<u32>(), hex::decode(salt), hex::decode(hash))
    else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let derived = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
    derived.as_slice().ct_eq(&expected).into()
}

fn valid_slug(slug: &str) -> bool {
    (2..=64).contains(&slug.len())
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
}

pub fn create_organization(
    conn: &Connection,
    ctx: &Ctx<'_>,
    name: &str,
    slug: &str,
) -> Result<Organization, StoreError> {
    let name = name.trim();
    let mut errors = Vec::new();
    if name.is_empty() || name.chars().count() > 200 {
        errors.push(FieldError::new("name", "must be 1 to 200 characters"));
    }
    if !valid_slug(slug) {
        errors.push(FieldError::new(
            "slug",
            "must be 2 to 64 lowercase letters, digits or inner hyphens",
        ));
    }
    if !errors.is_empty() {
        return Err(StoreError::Validation(errors));
    }
    let created_at = ctx.clock.now_rfc3339();
    conn.execute(
        "INSERT INTO organizations (name, slug, created_at) VALUES (?1, ?2, ?3)",
        params![name, slug, created_at],
    )?;
    let id = conn.last_insert_rowid();
    info!(organization_id = id, slug, "organization created");
    Ok(Organization {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        created_at,
    })
}

pub fn list_organizations(conn: &Connection) -> Result<Vec<Organization>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, name, slug, created_at FROM organizations ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok(Organization {
            id: r.get(0)?,
            name: r.get(1)?,
            slug: r.get(2)?,
            created_at: r.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn users_descriptor() -> Result<&'static tourcrm_model::ResourceDescriptor, StoreError> {
    resource_by_name("users").ok_or_else(|| StoreError::Sql("users descriptor missing".to_string()))
}

fn validate_password(password: &str) -> Result<(), StoreError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::field(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

/// Creates a user with a hashed password. Email addresses are unique across
/// all tenants among live users.
pub fn create_user(
    conn: &Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    created_by: Option<UserId>,
    user: &NewUser,
) -> Result<Row, StoreError> {
    let desc = users_descriptor()?;
    let mut errors = Vec::new();
    let mut email = String::new();
    let mut name = String::new();
    for (field, raw, slot) in [
        ("email", &user.email, &mut email),
        ("name", &user.name, &mut name),
    ] {
        let Some(column) = desc.column(field) else {
            continue;
        };
        match validate_value(column, &Value::String(raw.clone())) {
            Ok(SqlValue::Text(v)) => *slot = v,
            Ok(_) => errors.push(FieldError::new(field, "must be text")),
            Err(e) => errors.push(e),
        }
    }
    if let Err(StoreError::Validation(mut e)) = validate_password(&user.password) {
        errors.append(&mut e);
    }
    if !errors.is_empty() {
        return Err(StoreError::Validation(errors));
    }
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM organizations WHERE id = ?1)",
        params![org.get()],
        |r| r.get(0),
    )?;
    if !exists {
        return Err(StoreError::not_found("organization", org.get()));
    }
    let hash = hash_password(&user.password, ctx.cfg.password_iterations)?;
    let now = ctx.clock.now_rfc3339();
    conn.execute(
        "INSERT INTO users (organization_id, created_by, created_at, updated_at, email, name, role, password_hash)
         VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7)",
        params![
            org.get(),
            created_by.map(UserId::get),
            now,
            email,
            name,
            user.role.as_str(),
            hash
        ],
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::Conflict { .. } => StoreError::Conflict {
            message: format!("a user with email {email} already exists"),
            conflicting_id: None,
        },
        other => other,
    })?;
    let id = conn.last_insert_rowid();
    info!(user_id = id, organization_id = org.get(), role = user.role.as_str(), "user created");
    fetch_row(conn, desc, org.get(), id)
}

/// Replaces a user's password.
pub fn set_password(
    conn: &Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    user_id: UserId,
    password: &str,
) -> Result<(), StoreError> {
    validate_password(password)?;
    let hash = hash_password(password, ctx.cfg.password_iterations)?;
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3 AND organization_id = ?4 AND deleted_at IS NULL",
        params![hash, ctx.clock.now_rfc3339(), user_id.get(), org.get()],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("users", user_id.get()));
    }
    Ok(())
}

fn auth_user_from(
    id: i64,
    organization_id: i64,
    email: String,
    name: String,
    role: &str,
) -> Result<AuthUser, StoreError> {
    let role = Role::parse(role).map_err(|e| StoreError::Sql(e.to_string()))?;
    Ok(AuthUser {
        id,
        organization_id,
        email,
        name,
        role,
    })
}

/// Checks credentials of an active user and stamps `last_login_at`.
/// Unknown emails, inactive users and wrong passwords are indistinguishable.
pub fn verify_login(
    conn: &Connection,
    ctx: &Ctx<'_>,
    email: &str,
    password: &str,
) -> Result<AuthUser, StoreError> {
    let email = email.trim().to_lowercase();
    let found = conn
        .query_row(
            "SELECT u.id, u.organization_id, u.email, u.name, u.role, u.password_hash
             FROM users u JOIN organizations o ON o.id = u.organization_id
             WHERE u.email = ?1 AND u.deleted_at IS NULL AND u.is_active = 1 AND o.is_active = 1",
            params![email],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, org, email, name, role, hash)) = found else {
        warn!("login rejected: unknown or inactive user");
        return Err(StoreError::InvalidCredentials);
    };
    if !verify_password(password, &hash) {
        warn!(user_id = id, "login rejected: wrong password");
        return Err(StoreError::InvalidCredentials);
    }
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![ctx.clock.now_rfc3339(), id],
    )?;
    auth_user_from(id, org, email, name, &role)
}

/// Whether `password` matches the stored hash of a live user.
pub fn password_matches(
    conn: &Connection,
    user_id: UserId,
    password: &str,
) -> Result<bool, StoreError> {
    let hash: Option<String> = conn
        .query_row(
            "SELECT password_hash FROM users WHERE id = ?1 AND deleted_at IS NULL",
            params![user_id.get()],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hash.is_some_and(|h| verify_password(password, &h)))
}

/// Loads the current identity for a token subject; fails if the user was
/// deleted or deactivated since the token was issued.
pub fn get_auth_user(conn: &Connection, user_id: UserId) -> Result<AuthUser, StoreError> {
    let found = conn
        .query_row(
            "SELECT id, organization_id, email, name, role FROM users
             WHERE id = ?1 AND deleted_at IS NULL AND is_active = 1",
            params![user_id.get()],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((id, org, email, name, role)) = found else {
        return Err(StoreError::not_found("users", user_id.get()));
    };
    auth_user_from(id, org, email, name, &role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_salts_differ() {
        let a = hash_password("correct horse", 10).expect("hash");
        let b = hash_password("correct horse", 10).expect("hash");
        assert_ne!(a, b);
        assert!(a.starts_with("pbkdf2$10$"));
        assert!(verify_password("correct horse", &a));
        assert!(!verify_password("correct horsf", &a));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for encoded in ["", "pbkdf2$x$00$00", "bcrypt$10$00$00", "pbkdf2$0$00$00", "pbkdf2$1$zz$00"] {
            assert!(!verify_password("anything", encoded), "{encoded}");
        }
    }

    #[test]
    fn single_iteration_matches_rfc_vector() {
        // RFC 7914 section 11, first 32 bytes of PBKDF2-HMAC-SHA256("passwd", "salt", 1).
        let out = pbkdf2_sha256(b"passwd", b"salt", 1);
        assert_eq!(
            hex::encode(out),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn truncated_hashes_never_verify() {
        let encoded = hash_password("correct horse", 10).expect("hash");
        let truncated = &encoded[..encoded.len() - 2];
        assert!(!verify_password("correct horse", truncated));
    }

    #[test]
    fn slugs_are_restricted() {
        assert!(valid_slug("acme-tours"));
        assert!(!valid_slug("Acme"));
        assert!(!valid_slug("-acme"));
        assert!(!valid_slug("a"));
    }
}
