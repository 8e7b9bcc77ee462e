use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Duration;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::credentials::{CredentialError, CredentialHasher};
use super::domain::{KycStatus, ReviewStatus, User, UserId};
use super::identity::IdentityService;
use super::kyc::KycService;
use super::listings::ListingService;
use super::moderation::ModerationService;
use super::repository::{MarketplaceRepository, RepositoryError};
use super::storage::{ObjectStorage, UploadError};
use super::validation::ValidationError;
use crate::config::{AuthConfig, PasswordCost};

/// Which unique login field a registration collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Mobile,
    Email,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateField::Mobile => f.write_str("mobile number"),
            DuplicateField::Email => f.write_str("email"),
        }
    }
}

/// Error raised by every marketplace operation.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid mobile/email or password")]
    AuthFailure,
    #[error("Permission Denied")]
    PermissionDenied,
    #[error("KYC must be APPROVED to list properties (current status: {})", .0.label())]
    KycNotApproved(KycStatus),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("User already exists with this {0}.")]
    DuplicateUser(DuplicateField),
    #[error("{kind} has already been decided ({})", .status.label())]
    AlreadyDecided {
        kind: &'static str,
        status: ReviewStatus,
    },
    #[error("KYC already submitted (status: {})", .0.label())]
    KycAlreadySubmitted(ReviewStatus),
    #[error("database error")]
    Database(#[from] RepositoryError),
    #[error("upload failed")]
    Upload(#[from] UploadError),
    #[error("credential processing failed")]
    Credentials(#[from] CredentialError),
}

impl MarketplaceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketplaceError::Unauthorized | MarketplaceError::AuthFailure => {
                StatusCode::UNAUTHORIZED
            }
            MarketplaceError::PermissionDenied | MarketplaceError::KycNotApproved(_) => {
                StatusCode::FORBIDDEN
            }
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketplaceError::DuplicateUser(_)
            | MarketplaceError::AlreadyDecided { .. }
            | MarketplaceError::KycAlreadySubmitted(_) => StatusCode::CONFLICT,
            MarketplaceError::Database(_) | MarketplaceError::Credentials(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            MarketplaceError::Upload(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut payload = json!({ "error": self.to_string() });
        if let MarketplaceError::Validation(violation) = &self {
            payload["field"] = json!(violation.field);
        }
        (status, Json(payload)).into_response()
    }
}

/// Logs a failed commit and converts it into the generic database error.
pub(crate) fn storage_failure(
    operation: &'static str,
) -> impl Fn(RepositoryError) -> MarketplaceError {
    move |err| {
        error!(operation, error = %err, "storage write failed");
        MarketplaceError::Database(err)
    }
}

/// Public contact details shown to signed-in viewers and reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactCard {
    pub user_id: UserId,
    pub name: Option<String>,
    pub mobile: String,
}

impl From<&User> for ContactCard {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            mobile: user.mobile.clone(),
        }
    }
}

pub(crate) fn contact_for<R: MarketplaceRepository + ?Sized>(
    repository: &R,
    user_id: &UserId,
) -> Result<Option<ContactCard>, MarketplaceError> {
    Ok(repository.user(user_id)?.as_ref().map(ContactCard::from))
}

/// Knobs shared by the services.
#[derive(Debug, Clone)]
pub struct MarketplaceSettings {
    pub session_ttl: Duration,
    pub password_cost: PasswordCost,
}

impl MarketplaceSettings {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            session_ttl: Duration::hours(i64::from(config.session_ttl_hours)),
            password_cost: config.password_cost,
        }
    }

    /// Cheap hashing and a one-day session; for tests and the demo command.
    pub fn testing() -> Self {
        Self {
            session_ttl: Duration::hours(24),
            password_cost: PasswordCost::Testing,
        }
    }
}

/// Composes the identity, listing, KYC, and moderation services over one
/// repository and one object store.
pub struct Marketplace<R, S> {
    pub identity: IdentityService<R>,
    pub listings: ListingService<R, S>,
    pub kyc: KycService<R, S>,
    pub moderation: ModerationService<R>,
}

impl<R, S> Marketplace<R, S>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    pub fn new(
        repository: Arc<R>,
        storage: Arc<S>,
        settings: MarketplaceSettings,
    ) -> Result<Self, MarketplaceError> {
        let hasher = CredentialHasher::new(settings.password_cost)?;

        Ok(Self {
            identity: IdentityService::new(repository.clone(), hasher, settings.session_ttl),
            listings: ListingService::new(repository.clone(), storage.clone()),
            kyc: KycService::new(repository.clone(), storage),
            moderation: ModerationService::new(repository),
        })
    }
}
