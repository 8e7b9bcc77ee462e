use chrono::Utc;
use estate_trust::marketplace::{
    Caller, Decision, KycStatus, ListingFields, Marketplace, MarketplaceError,
    MarketplaceRepository, ObjectStorage, Property, PropertyFilter, PropertyId, PropertyImage,
    PropertyType, Registration, Review, Role, User, Write,
};
use estate_trust::marketplace::domain::PropertyImageId;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) upload_root: Arc<PathBuf>,
}

/// Shared password for every seeded account.
pub(crate) const SEED_PASSWORD: &str = "password123";

const SEED_ACCOUNTS: [(&str, &str, Role); 4] = [
    ("9000000001", "Admin User", Role::Admin),
    ("9000000002", "Buyer User", Role::Buyer),
    ("9000000003", "Seller User", Role::Seller),
    ("9000000004", "Verification Team", Role::VerificationTeam),
];

const SEED_IMAGE_URL: &str = "https://placehold.co/600x400/2563eb/ffffff?text=Seeded+Property";

#[derive(Debug, Default)]
pub(crate) struct SeedSummary {
    pub(crate) accounts_created: usize,
    pub(crate) listing_created: bool,
}

/// Creates the four KYC-approved demo accounts and one approved listing for
/// the seller. Safe to run against a store that already holds them.
pub(crate) fn seed_marketplace<R, S>(
    marketplace: &Marketplace<R, S>,
    repository: &R,
) -> Result<SeedSummary, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let mut summary = SeedSummary::default();
    let mut seeded: Vec<User> = Vec::with_capacity(SEED_ACCOUNTS.len());

    for (mobile, name, role) in SEED_ACCOUNTS {
        let user = match repository.user_by_login(mobile)? {
            Some(existing) => existing,
            None => {
                summary.accounts_created += 1;
                marketplace.identity.register(Registration {
                    mobile: mobile.to_string(),
                    password: SEED_PASSWORD.to_string(),
                    role: Some(role),
                    email: None,
                    name: Some(name.to_string()),
                })?
            }
        };
        if user.kyc_status != KycStatus::Approved {
            repository.commit(vec![Write::SetKycStatus {
                user_id: user.id.clone(),
                status: KycStatus::Approved,
            }])?;
        }
        info!(mobile, role = role.label(), "seed account ready");
        seeded.push(user);
    }

    let admin = seeded.iter().find(|user| user.role == Role::Admin);
    let seller = seeded.iter().find(|user| user.role == Role::Seller);
    if let (Some(admin), Some(seller)) = (admin, seller) {
        let owned = repository.properties(&PropertyFilter::owned_by(seller.id.clone()))?;
        if owned.is_empty() {
            let now = Utc::now();
            let property = Property {
                id: PropertyId::generate(),
                owner_id: seller.id.clone(),
                fields: ListingFields {
                    title: "Sample Seeded Villa".to_string(),
                    description: "A beautiful seeded villa for testing purposes.".to_string(),
                    price: 15_000_000,
                    area: 2500,
                    property_type: PropertyType::House,
                    address: "100 Seed Lane, Database City".to_string(),
                },
                review: Review::decided(Decision::Approve, None, "", &admin.id, now),
                views: 0,
                created_at: now,
                updated_at: now,
            };
            let image = PropertyImage {
                id: PropertyImageId::generate(),
                property_id: property.id.clone(),
                url: SEED_IMAGE_URL.to_string(),
            };
            repository.commit(vec![Write::InsertProperty {
                property,
                images: vec![image],
            }])?;
            summary.listing_created = true;
            info!(seller = %seller.id, "seeded sample listing");
        }
    }

    Ok(summary)
}

/// Logs a seeded account in and returns its caller context.
pub(crate) fn sign_in<R, S>(
    marketplace: &Marketplace<R, S>,
    mobile: &str,
) -> Result<Caller, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let grant = marketplace.identity.authenticate(mobile, SEED_PASSWORD)?;
    marketplace.identity.resolve_session(&grant.token)
}
