//! Organizer service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use photowall_common::{AppError, AppResult, IdGenerator};
use photowall_db::{entities::organizer, repositories::OrganizerRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

/// Organizer service for sign-up and authentication.
#[derive(Clone)]
pub struct OrganizerService {
    organizer_repo: OrganizerRepository,
    id_gen: IdGenerator,
}

/// Input for signing up.
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

/// Input for signing in.
#[derive(Debug, Deserialize, Validate)]
pub struct SignInInput {
    #[validate(length(min = 1, max = 320))]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Session returned after sign-up or sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizerSession {
    pub token: String,
    pub organizer: organizer::Model,
}

impl OrganizerService {
    /// Create a new organizer service.
    #[must_use]
    pub const fn new(organizer_repo: OrganizerRepository) -> Self {
        Self {
            organizer_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new organizer.
    pub async fn sign_up(&self, input: SignUpInput) -> AppResult<OrganizerSession> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        if self.organizer_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let token = self.id_gen.generate_token();

        let model = organizer::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(email),
            name: Set(input.name.trim().to_string()),
            password_hash: Set(password_hash),
            token: Set(token.clone()),
            created_at: Set(Utc::now().into()),
        };

        let organizer = self.organizer_repo.create(model).await?;
        info!(organizer_id = %organizer.id, "Organizer signed up");

        Ok(OrganizerSession { token, organizer })
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, input: SignInInput) -> AppResult<OrganizerSession> {
        input.validate()?;

        let organizer = self
            .organizer_repo
            .find_by_email(&input.email.trim().to_lowercase())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &organizer.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(OrganizerSession {
            token: organizer.token.clone(),
            organizer,
        })
    }

    /// Authenticate an organizer by bearer token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<organizer::Model> {
        self.organizer_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Issue a new token, invalidating the old one.
    pub async fn regenerate_token(&self, organizer_id: &str) -> AppResult<String> {
        let organizer = self
            .organizer_repo
            .find_by_id(organizer_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        let token = self.id_gen.generate_token();

        let mut active: organizer::ActiveModel = organizer.into();
        active.token = Set(token.clone());
        self.organizer_repo.update(active).await?;

        Ok(token)
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
