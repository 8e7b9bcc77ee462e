use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

record_id!(
    /// Identifier for a registered account.
    UserId
);
record_id!(PropertyId);
record_id!(PropertyImageId);
record_id!(PropertyUpdateId);
record_id!(KycProfileId);

/// Account role; decides who may moderate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Buyer,
    Seller,
    Admin,
    VerificationTeam,
}

impl Role {
    /// The one authorization predicate for every moderation decision.
    pub const fn can_moderate(self) -> bool {
        matches!(self, Role::Admin | Role::VerificationTeam)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::Buyer => "BUYER",
            Role::Seller => "SELLER",
            Role::Admin => "ADMIN",
            Role::VerificationTeam => "VERIFICATION_TEAM",
        }
    }
}

/// User-level mirror of the KYC profile review, gating listing creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub const fn label(self) -> &'static str {
        match self {
            KycStatus::NotSubmitted => "NOT_SUBMITTED",
            KycStatus::Pending => "PENDING",
            KycStatus::Approved => "APPROVED",
            KycStatus::Rejected => "REJECTED",
        }
    }
}

impl From<ReviewStatus> for KycStatus {
    fn from(value: ReviewStatus) -> Self {
        match value {
            ReviewStatus::Pending => KycStatus::Pending,
            ReviewStatus::Approved => KycStatus::Approved,
            ReviewStatus::Rejected => KycStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub mobile: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub kyc_status: KycStatus,
    pub created_at: DateTime<Utc>,
}

/// Explicit caller context handed to every service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn can_moderate(&self) -> bool {
        self.role.can_moderate()
    }
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role,
        }
    }
}

/// Moderation state shared by listings, KYC profiles, and update proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }

    pub const fn is_decided(self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

/// A reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn outcome(self) -> ReviewStatus {
        match self {
            Decision::Approve => ReviewStatus::Approved,
            Decision::Reject => ReviewStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub status: ReviewStatus,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn pending() -> Self {
        Self {
            status: ReviewStatus::Pending,
            rejection_reason: None,
            verified_by: None,
            reviewed_at: None,
        }
    }

    /// Builds the terminal review for `decision`. Blank reasons fall back to
    /// `default_reason`; approvals never carry a reason.
    pub fn decided(
        decision: Decision,
        reason: Option<&str>,
        default_reason: &str,
        reviewer: &UserId,
        at: DateTime<Utc>,
    ) -> Self {
        let rejection_reason = match decision {
            Decision::Approve => None,
            Decision::Reject => Some(
                reason
                    .map(str::trim)
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or(default_reason)
                    .to_string(),
            ),
        };

        Self {
            status: decision.outcome(),
            rejection_reason,
            verified_by: Some(reviewer.clone()),
            reviewed_at: Some(at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    House,
    Apartment,
    Land,
    Commercial,
}

impl PropertyType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HOUSE" => Some(Self::House),
            "APARTMENT" => Some(Self::Apartment),
            "LAND" => Some(Self::Land),
            "COMMERCIAL" => Some(Self::Commercial),
            _ => None,
        }
    }
}

/// The owner-editable part of a listing. Proposals carry a full replacement set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFields {
    pub title: String,
    pub description: String,
    pub price: u64,
    /// Square feet.
    pub area: u32,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub id: PropertyId,
    pub owner_id: UserId,
    #[serde(flatten)]
    pub fields: ListingFields,
    #[serde(flatten)]
    pub review: Review,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn is_public(&self) -> bool {
        self.review.status == ReviewStatus::Approved
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyImage {
    pub id: PropertyImageId,
    pub property_id: PropertyId,
    pub url: String,
}

/// Staged edit awaiting review; the live listing is untouched until approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyUpdate {
    pub id: PropertyUpdateId,
    pub property_id: PropertyId,
    #[serde(flatten)]
    pub fields: ListingFields,
    #[serde(flatten)]
    pub review: Review,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KycProfile {
    pub id: KycProfileId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub government_id_type: String,
    pub document_url: String,
    #[serde(flatten)]
    pub review: Review,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortlistEntry {
    pub user_id: UserId,
    pub property_id: PropertyId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortlistAction {
    Added,
    Removed,
}

/// Raw upload handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Browsers submit an empty part named `undefined` when no file is picked.
    pub fn is_blank(&self) -> bool {
        self.bytes.is_empty() || self.file_name.is_empty() || self.file_name == "undefined"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admins_and_verification_team_moderate() {
        assert!(Role::Admin.can_moderate());
        assert!(Role::VerificationTeam.can_moderate());
        assert!(!Role::Seller.can_moderate());
        assert!(!Role::Buyer.can_moderate());
    }

    #[test]
    fn rejection_falls_back_to_default_reason() {
        let reviewer = UserId::from("reviewer");
        let now = Utc::now();

        let blank = Review::decided(Decision::Reject, Some("   "), "fallback", &reviewer, now);
        assert_eq!(blank.status, ReviewStatus::Rejected);
        assert_eq!(blank.rejection_reason.as_deref(), Some("fallback"));

        let approved = Review::decided(Decision::Approve, Some("ignored"), "x", &reviewer, now);
        assert_eq!(approved.status, ReviewStatus::Approved);
        assert!(approved.rejection_reason.is_none());
        assert_eq!(approved.verified_by, Some(reviewer));
    }

    #[test]
    fn role_and_decision_use_upper_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&Role::VerificationTeam).expect("serialize"),
            "\"VERIFICATION_TEAM\""
        );
        let decision: Decision = serde_json::from_str("\"REJECT\"").expect("deserialize");
        assert_eq!(decision, Decision::Reject);
        assert_eq!(PropertyType::parse(" apartment "), Some(PropertyType::Apartment));
    }
}
