use chrono::{DateTime, Utc};

use super::domain::{
    KycProfile, KycProfileId, KycStatus, ListingFields, Property, PropertyId, PropertyImage,
    PropertyUpdate, PropertyUpdateId, Review, ReviewStatus, ShortlistEntry, User, UserId,
};

/// Storage abstraction so the services can be exercised in isolation.
///
/// Reads are individual lookups. Every mutation goes through [`commit`], which
/// must apply the whole batch or none of it.
///
/// [`commit`]: MarketplaceRepository::commit
pub trait MarketplaceRepository: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    /// Looks a user up by mobile number or e-mail address.
    fn user_by_login(&self, identifier: &str) -> Result<Option<User>, RepositoryError>;

    fn property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
    fn properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, RepositoryError>;
    fn images(&self, property_id: &PropertyId) -> Result<Vec<PropertyImage>, RepositoryError>;

    fn kyc_profile(&self, id: &KycProfileId) -> Result<Option<KycProfile>, RepositoryError>;
    fn kyc_profile_for_user(&self, user_id: &UserId)
        -> Result<Option<KycProfile>, RepositoryError>;
    fn kyc_profiles(&self, status: &[ReviewStatus]) -> Result<Vec<KycProfile>, RepositoryError>;

    fn property_update(
        &self,
        id: &PropertyUpdateId,
    ) -> Result<Option<PropertyUpdate>, RepositoryError>;
    fn property_update_for(
        &self,
        property_id: &PropertyId,
    ) -> Result<Option<PropertyUpdate>, RepositoryError>;
    fn property_updates(
        &self,
        status: &[ReviewStatus],
    ) -> Result<Vec<PropertyUpdate>, RepositoryError>;

    fn shortlist(&self, user_id: &UserId) -> Result<Vec<ShortlistEntry>, RepositoryError>;

    /// Applies every write in order as one unit.
    fn commit(&self, writes: Vec<Write>) -> Result<(), RepositoryError>;
}

/// Narrowing applied to property listings. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    pub statuses: Vec<ReviewStatus>,
    pub owner: Option<UserId>,
}

impl PropertyFilter {
    pub fn with_status(status: ReviewStatus) -> Self {
        Self {
            statuses: vec![status],
            owner: None,
        }
    }

    pub fn owned_by(owner: UserId) -> Self {
        Self {
            statuses: Vec::new(),
            owner: Some(owner),
        }
    }

    pub fn matches(&self, property: &Property) -> bool {
        let status_ok =
            self.statuses.is_empty() || self.statuses.contains(&property.review.status);
        let owner_ok = self
            .owner
            .as_ref()
            .map_or(true, |owner| owner == &property.owner_id);
        status_ok && owner_ok
    }
}

/// One mutation inside a committed batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Fails with `Conflict` when the mobile number or e-mail is taken.
    InsertUser(User),
    SetKycStatus {
        user_id: UserId,
        status: KycStatus,
    },
    InsertProperty {
        property: Property,
        images: Vec<PropertyImage>,
    },
    /// Replaces the live listing fields, leaving the review untouched.
    SetListingFields {
        property_id: PropertyId,
        fields: ListingFields,
        at: DateTime<Utc>,
    },
    SetListingReview {
        property_id: PropertyId,
        review: Review,
    },
    IncrementViews {
        property_id: PropertyId,
    },
    /// Replace-if-exists-else-create keyed by `property_id`. The stored record
    /// keeps its original id and creation time when replaced.
    UpsertPropertyUpdate(PropertyUpdate),
    SetUpdateReview {
        update_id: PropertyUpdateId,
        review: Review,
    },
    /// Replace-if-exists-else-create keyed by `user_id`.
    UpsertKycProfile(KycProfile),
    SetKycReview {
        profile_id: KycProfileId,
        review: Review,
    },
    /// Fails with `Conflict` when the pair is already present.
    InsertShortlist(ShortlistEntry),
    DeleteShortlist {
        user_id: UserId,
        property_id: PropertyId,
    },
}

impl Write {
    pub fn label(&self) -> &'static str {
        match self {
            Write::InsertUser(_) => "insert_user",
            Write::SetKycStatus { .. } => "set_kyc_status",
            Write::InsertProperty { .. } => "insert_property",
            Write::SetListingFields { .. } => "set_listing_fields",
            Write::SetListingReview { .. } => "set_listing_review",
            Write::IncrementViews { .. } => "increment_views",
            Write::UpsertPropertyUpdate(_) => "upsert_property_update",
            Write::SetUpdateReview { .. } => "set_update_review",
            Write::UpsertKycProfile(_) => "upsert_kyc_profile",
            Write::SetKycReview { .. } => "set_kyc_review",
            Write::InsertShortlist(_) => "insert_shortlist",
            Write::DeleteShortlist { .. } => "delete_shortlist",
        }
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
