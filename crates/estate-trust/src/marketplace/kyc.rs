use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::domain::{
    Caller, KycProfile, KycProfileId, KycStatus, Review, ReviewStatus, UploadedFile,
};
use super::repository::{MarketplaceRepository, Write};
use super::service::{storage_failure, MarketplaceError};
use super::storage::{content_type_of, object_key, ObjectStorage, UploadScope};
use super::validation::{validate_kyc, ValidationError};

/// Identity details submitted alongside the document.
#[derive(Debug, Clone, Deserialize)]
pub struct KycSubmission {
    pub full_name: String,
    pub email: String,
    pub government_id_type: String,
}

/// Identity verification intake.
pub struct KycService<R, S> {
    repository: Arc<R>,
    storage: Arc<S>,
}

impl<R, S> KycService<R, S>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    pub fn new(repository: Arc<R>, storage: Arc<S>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Uploads the identity document, then writes the PENDING profile and the
    /// user's PENDING status in one commit. A rejected profile is replaced.
    pub fn submit_kyc(
        &self,
        caller: &Caller,
        submission: KycSubmission,
        document: Option<UploadedFile>,
    ) -> Result<KycProfile, MarketplaceError> {
        let KycSubmission {
            full_name,
            email,
            government_id_type,
        } = submission;
        let full_name = full_name.trim().to_string();
        let email = email.trim().to_string();
        let government_id_type = government_id_type.trim().to_string();

        validate_kyc(&full_name, &email, &government_id_type)?;

        let document = document
            .filter(|file| !file.is_blank())
            .ok_or_else(|| ValidationError::new("document", "Document upload is required"))?;
        let content_type = content_type_of(&document);
        if content_type.type_() != mime::IMAGE && content_type != mime::APPLICATION_PDF {
            return Err(ValidationError::new(
                "document",
                "Document must be an image or a PDF",
            )
            .into());
        }

        let user = self
            .repository
            .user(&caller.user_id)?
            .ok_or(MarketplaceError::NotFound("user"))?;
        let existing = self.repository.kyc_profile_for_user(&user.id)?;
        if let Some(existing) = &existing {
            if existing.review.status != ReviewStatus::Rejected {
                return Err(MarketplaceError::KycAlreadySubmitted(existing.review.status));
            }
        }

        let now = Utc::now();
        let profile_id = KycProfileId::generate();
        let key = object_key(
            UploadScope::KycDocument,
            &user.id,
            profile_id.as_str(),
            &document.file_name,
            now,
        );
        let stored = self
            .storage
            .put(&key, &document.bytes, &content_type)
            .map_err(|err| {
                warn!(user_id = %user.id, error = %err, "kyc document upload failed");
                err
            })?;

        let profile = KycProfile {
            id: profile_id,
            user_id: user.id.clone(),
            full_name,
            email,
            government_id_type,
            document_url: stored.url,
            review: Review::pending(),
            created_at: now,
            updated_at: now,
        };

        self.repository
            .commit(vec![
                Write::UpsertKycProfile(profile.clone()),
                Write::SetKycStatus {
                    user_id: user.id.clone(),
                    status: KycStatus::Pending,
                },
            ])
            .map_err(storage_failure("submit_kyc"))?;

        info!(
            user_id = %user.id,
            profile_id = %profile.id,
            resubmission = existing.is_some(),
            "kyc submitted for review"
        );
        Ok(profile)
    }
}
