//! Review workflow shared by listings, KYC profiles, and edit proposals.
//!
//! Every reviewable record moves `PENDING -> APPROVED | REJECTED` exactly once.
//! Only callers whose role passes [`Role::can_moderate`] may decide, and each
//! decision lands in a single repository commit.
//!
//! [`Role::can_moderate`]: super::domain::Role::can_moderate

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Caller, Decision, KycProfile, KycProfileId, Property, PropertyId, PropertyUpdate,
    PropertyUpdateId, Review, ReviewStatus, UserId,
};
use super::repository::{MarketplaceRepository, PropertyFilter, Write};
use super::service::{contact_for, storage_failure, ContactCard, MarketplaceError};

pub const LISTING_REJECTION_REASON: &str = "Does not meet guidelines";
pub const KYC_REJECTION_REASON: &str = "Does not meet requirements";
pub const UPDATE_REJECTION_REASON: &str = "Proposed changes do not meet guidelines";

/// Items returned per kind when the history request names no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct PendingListing {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<String>,
    pub owner: Option<ContactCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingKyc {
    #[serde(flatten)]
    pub profile: KycProfile,
    pub owner: Option<ContactCard>,
}

/// A proposal next to the live listing it would overwrite.
#[derive(Debug, Clone, Serialize)]
pub struct PendingUpdate {
    #[serde(flatten)]
    pub update: PropertyUpdate,
    pub current: Option<Property>,
    pub owner: Option<ContactCard>,
}

/// Everything waiting on a reviewer, oldest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModerationQueue {
    pub properties: Vec<PendingListing>,
    pub kyc: Vec<PendingKyc>,
    pub updates: Vec<PendingUpdate>,
}

impl ModerationQueue {
    pub fn len(&self) -> usize {
        self.properties.len() + self.kyc.len() + self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecidedItem<T> {
    #[serde(flatten)]
    pub item: T,
    pub reviewer: Option<ContactCard>,
}

/// Most recent decisions per kind, newest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModerationHistory {
    pub properties: Vec<DecidedItem<Property>>,
    pub kyc: Vec<DecidedItem<KycProfile>>,
    pub updates: Vec<DecidedItem<PropertyUpdate>>,
}

const DECIDED: [ReviewStatus; 2] = [ReviewStatus::Approved, ReviewStatus::Rejected];

pub struct ModerationService<R> {
    repository: Arc<R>,
}

impl<R> ModerationService<R>
where
    R: MarketplaceRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn decide_listing(
        &self,
        caller: &Caller,
        property_id: &PropertyId,
        decision: Decision,
        reason: Option<&str>,
    ) -> Result<Property, MarketplaceError> {
        authorize(caller)?;

        let mut property = self
            .repository
            .property(property_id)?
            .ok_or(MarketplaceError::NotFound("property"))?;
        ensure_pending("property", property.review.status)?;

        let review = Review::decided(
            decision,
            reason,
            LISTING_REJECTION_REASON,
            &caller.user_id,
            Utc::now(),
        );
        self.repository
            .commit(vec![Write::SetListingReview {
                property_id: property_id.clone(),
                review: review.clone(),
            }])
            .map_err(storage_failure("decide_listing"))?;

        info!(
            property_id = %property_id,
            reviewer = %caller.user_id,
            status = review.status.label(),
            "listing decided"
        );
        stamp(&mut property.updated_at, &review);
        property.review = review;
        Ok(property)
    }

    /// Writes the profile review and the owner's status mirror together.
    pub fn decide_kyc(
        &self,
        caller: &Caller,
        profile_id: &KycProfileId,
        decision: Decision,
        reason: Option<&str>,
    ) -> Result<KycProfile, MarketplaceError> {
        authorize(caller)?;

        let mut profile = self
            .repository
            .kyc_profile(profile_id)?
            .ok_or(MarketplaceError::NotFound("kyc profile"))?;
        ensure_pending("kyc profile", profile.review.status)?;

        let review = Review::decided(
            decision,
            reason,
            KYC_REJECTION_REASON,
            &caller.user_id,
            Utc::now(),
        );
        self.repository
            .commit(vec![
                Write::SetKycReview {
                    profile_id: profile_id.clone(),
                    review: review.clone(),
                },
                Write::SetKycStatus {
                    user_id: profile.user_id.clone(),
                    status: review.status.into(),
                },
            ])
            .map_err(storage_failure("decide_kyc"))?;

        info!(
            profile_id = %profile_id,
            user_id = %profile.user_id,
            reviewer = %caller.user_id,
            status = review.status.label(),
            "kyc decided"
        );
        stamp(&mut profile.updated_at, &review);
        profile.review = review;
        Ok(profile)
    }

    /// Approval copies the proposed fields onto the live listing in the same
    /// commit that closes the proposal. The listing's own review is untouched.
    pub fn decide_listing_update(
        &self,
        caller: &Caller,
        update_id: &PropertyUpdateId,
        decision: Decision,
        reason: Option<&str>,
    ) -> Result<PropertyUpdate, MarketplaceError> {
        authorize(caller)?;

        let mut update = self
            .repository
            .property_update(update_id)?
            .ok_or(MarketplaceError::NotFound("property update"))?;
        ensure_pending("property update", update.review.status)?;

        let now = Utc::now();
        let review = Review::decided(
            decision,
            reason,
            UPDATE_REJECTION_REASON,
            &caller.user_id,
            now,
        );
        let close = Write::SetUpdateReview {
            update_id: update_id.clone(),
            review: review.clone(),
        };

        let writes = match decision {
            Decision::Approve => {
                if self.repository.property(&update.property_id)?.is_none() {
                    warn!(
                        update_id = %update_id,
                        property_id = %update.property_id,
                        "proposal targets a missing listing"
                    );
                    return Err(MarketplaceError::NotFound("property"));
                }
                vec![
                    Write::SetListingFields {
                        property_id: update.property_id.clone(),
                        fields: update.fields.clone(),
                        at: now,
                    },
                    close,
                ]
            }
            Decision::Reject => vec![close],
        };

        self.repository
            .commit(writes)
            .map_err(storage_failure("decide_listing_update"))?;

        info!(
            update_id = %update_id,
            property_id = %update.property_id,
            reviewer = %caller.user_id,
            status = review.status.label(),
            "edit proposal decided"
        );
        stamp(&mut update.updated_at, &review);
        update.review = review;
        Ok(update)
    }

    pub fn queue(&self, caller: &Caller) -> Result<ModerationQueue, MarketplaceError> {
        authorize(caller)?;
        let repository = self.repository.as_ref();

        let mut listings =
            repository.properties(&PropertyFilter::with_status(ReviewStatus::Pending))?;
        listings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let mut properties = Vec::with_capacity(listings.len());
        for property in listings {
            let images = repository
                .images(&property.id)?
                .into_iter()
                .map(|image| image.url)
                .collect();
            let owner = contact_for(repository, &property.owner_id)?;
            properties.push(PendingListing {
                property,
                images,
                owner,
            });
        }

        let mut profiles = repository.kyc_profiles(&[ReviewStatus::Pending])?;
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let mut kyc = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let owner = contact_for(repository, &profile.user_id)?;
            kyc.push(PendingKyc { profile, owner });
        }

        let mut proposals = repository.property_updates(&[ReviewStatus::Pending])?;
        proposals.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        let mut updates = Vec::with_capacity(proposals.len());
        for update in proposals {
            let current = repository.property(&update.property_id)?;
            let owner = match &current {
                Some(property) => contact_for(repository, &property.owner_id)?,
                None => None,
            };
            updates.push(PendingUpdate {
                update,
                current,
                owner,
            });
        }

        Ok(ModerationQueue {
            properties,
            kyc,
            updates,
        })
    }

    pub fn history(
        &self,
        caller: &Caller,
        limit: usize,
    ) -> Result<ModerationHistory, MarketplaceError> {
        authorize(caller)?;
        let repository = self.repository.as_ref();

        let properties = repository.properties(&PropertyFilter {
            statuses: DECIDED.to_vec(),
            owner: None,
        })?;
        let profiles = repository.kyc_profiles(&DECIDED)?;
        let updates = repository.property_updates(&DECIDED)?;

        Ok(ModerationHistory {
            properties: self.latest(properties, limit, |property| &property.review)?,
            kyc: self.latest(profiles, limit, |profile| &profile.review)?,
            updates: self.latest(updates, limit, |update| &update.review)?,
        })
    }

    fn latest<T>(
        &self,
        mut items: Vec<T>,
        limit: usize,
        review: impl Fn(&T) -> &Review,
    ) -> Result<Vec<DecidedItem<T>>, MarketplaceError> {
        items.sort_by(|a, b| reviewed_at(review(b)).cmp(&reviewed_at(review(a))));
        items.truncate(limit);

        let mut decided = Vec::with_capacity(items.len());
        for item in items {
            let reviewer = match review(&item).verified_by.as_ref() {
                Some(reviewer) => self.reviewer(reviewer)?,
                None => None,
            };
            decided.push(DecidedItem { item, reviewer });
        }
        Ok(decided)
    }

    fn reviewer(&self, user_id: &UserId) -> Result<Option<ContactCard>, MarketplaceError> {
        contact_for(self.repository.as_ref(), user_id)
    }
}

fn authorize(caller: &Caller) -> Result<(), MarketplaceError> {
    if caller.can_moderate() {
        Ok(())
    } else {
        warn!(user_id = %caller.user_id, role = caller.role.label(), "moderation attempt denied");
        Err(MarketplaceError::PermissionDenied)
    }
}

fn ensure_pending(kind: &'static str, status: ReviewStatus) -> Result<(), MarketplaceError> {
    if status.is_decided() {
        Err(MarketplaceError::AlreadyDecided { kind, status })
    } else {
        Ok(())
    }
}

fn reviewed_at(review: &Review) -> Option<DateTime<Utc>> {
    review.reviewed_at
}

fn stamp(updated_at: &mut DateTime<Utc>, review: &Review) {
    if let Some(at) = review.reviewed_at {
        *updated_at = at;
    }
}
