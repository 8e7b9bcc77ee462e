use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::marketplace::domain::{
    Caller, Decision, KycStatus, ListingFields, Property, PropertyType, Role, UploadedFile,
};
use crate::marketplace::identity::Registration;
use crate::marketplace::repository::{MarketplaceRepository, Write};
use crate::marketplace::{
    marketplace_router, Marketplace, MarketplaceSettings, MemoryObjectStorage, MemoryRepository,
};

pub(super) const PASSWORD: &str = "password123";

pub(super) struct Harness {
    pub(super) marketplace: Arc<Marketplace<MemoryRepository, MemoryObjectStorage>>,
    pub(super) repository: MemoryRepository,
    pub(super) storage: MemoryObjectStorage,
}

impl Harness {
    pub(super) fn router(&self) -> axum::Router {
        marketplace_router(self.marketplace.clone())
    }

    /// Registers an account and forces its KYC mirror to `kyc`.
    pub(super) fn account(&self, mobile: &str, role: Role, kyc: KycStatus) -> Caller {
        let user = self
            .marketplace
            .identity
            .register(Registration {
                mobile: mobile.to_string(),
                password: PASSWORD.to_string(),
                role: Some(role),
                email: None,
                name: Some(format!("{} {mobile}", role.label())),
            })
            .expect("register account");
        if kyc != KycStatus::NotSubmitted {
            self.repository
                .commit(vec![Write::SetKycStatus {
                    user_id: user.id.clone(),
                    status: kyc,
                }])
                .expect("set kyc status");
        }
        Caller::from(&user)
    }

    pub(super) fn seller(&self) -> Caller {
        self.account("9000000003", Role::Seller, KycStatus::Approved)
    }

    pub(super) fn reviewer(&self) -> Caller {
        self.account("9000000004", Role::VerificationTeam, KycStatus::Approved)
    }

    pub(super) fn buyer(&self) -> Caller {
        self.account("9000000002", Role::Buyer, KycStatus::NotSubmitted)
    }

    pub(super) fn token(&self, mobile: &str) -> String {
        self.marketplace
            .identity
            .authenticate(mobile, PASSWORD)
            .expect("login")
            .token
    }

    pub(super) fn pending_listing(&self, seller: &Caller) -> Property {
        self.marketplace
            .listings
            .create_listing(seller, listing_fields(), vec![photo("front.jpg")])
            .expect("create listing")
            .property
    }

    pub(super) fn approved_listing(&self, seller: &Caller, reviewer: &Caller) -> Property {
        let property = self.pending_listing(seller);
        self.marketplace
            .moderation
            .decide_listing(reviewer, &property.id, Decision::Approve, None)
            .expect("approve listing")
    }
}

pub(super) fn harness() -> Harness {
    let repository = MemoryRepository::new();
    let storage = MemoryObjectStorage::default();
    let marketplace = Marketplace::new(
        Arc::new(repository.clone()),
        Arc::new(storage.clone()),
        MarketplaceSettings::testing(),
    )
    .expect("marketplace");

    Harness {
        marketplace: Arc::new(marketplace),
        repository,
        storage,
    }
}

pub(super) fn listing_fields() -> ListingFields {
    ListingFields {
        title: "Lake view villa".to_string(),
        description: "Three bedrooms, garden, and a covered porch".to_string(),
        price: 1_500_000,
        area: 2400,
        property_type: PropertyType::House,
        address: "12 Lake Road, Pune".to_string(),
    }
}

pub(super) fn photo(name: &str) -> UploadedFile {
    UploadedFile::new(name, vec![0xFF, 0xD8, 0xFF, 0xE0]).with_content_type("image/jpeg")
}

pub(super) fn id_document() -> UploadedFile {
    UploadedFile::new("passport.pdf", b"%PDF-1.7".to_vec()).with_content_type("application/pdf")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
