//! Listings, identity verification, and the moderation workflow that gates both.
//!
//! Sellers list properties once their KYC profile is approved; listings, KYC
//! profiles, and edit proposals all wait in a review queue until an admin or
//! verification-team member decides them.

pub mod credentials;
pub mod domain;
pub mod identity;
pub mod kyc;
pub mod listings;
pub mod memory;
pub mod moderation;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    Caller, Decision, KycProfile, KycProfileId, KycStatus, ListingFields, Property, PropertyId,
    PropertyImage, PropertyType, PropertyUpdate, PropertyUpdateId, Review, ReviewStatus, Role,
    ShortlistAction, UploadedFile, User, UserId,
};
pub use identity::{IdentityService, Registration, SessionGrant};
pub use kyc::{KycService, KycSubmission};
pub use listings::{
    Dashboard, ListingCard, ListingDetail, ListingService, ProposalOutcome, SearchQuery,
};
pub use memory::MemoryRepository;
pub use moderation::{
    ModerationHistory, ModerationQueue, ModerationService, DEFAULT_HISTORY_LIMIT,
};
pub use repository::{MarketplaceRepository, PropertyFilter, RepositoryError, Write};
pub use router::marketplace_router;
pub use service::{ContactCard, DuplicateField, Marketplace, MarketplaceError, MarketplaceSettings};
pub use storage::{LocalObjectStorage, MemoryObjectStorage, ObjectStorage, UploadError};
pub use validation::ValidationError;
