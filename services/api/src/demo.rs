use crate::infra::{seed_marketplace, sign_in, SEED_PASSWORD};
use clap::Args;
use estate_trust::error::AppError;
use estate_trust::marketplace::{
    Decision, KycSubmission, ListingFields, Marketplace, MarketplaceError, MarketplaceRepository,
    MarketplaceSettings, MemoryObjectStorage, MemoryRepository, Property, PropertyType,
    Registration, Role, SearchQuery, UploadedFile,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Asking price for the demo listing.
    #[arg(long, default_value_t = 1_500_000)]
    pub(crate) price: u64,
    /// Price the seller proposes in the follow-up edit.
    #[arg(long, default_value_t = 2_000_000)]
    pub(crate) proposed_price: u64,
    /// Reject the edit proposal instead of approving it.
    #[arg(long)]
    pub(crate) reject_edit: bool,
    /// Print the final listing as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

type DemoMarketplace = Marketplace<MemoryRepository, MemoryObjectStorage>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let repository = MemoryRepository::new();
    let marketplace = Marketplace::new(
        Arc::new(repository.clone()),
        Arc::new(MemoryObjectStorage::default()),
        MarketplaceSettings::testing(),
    )?;
    seed_marketplace(&marketplace, &repository)?;

    println!("Estate Trust moderation demo");
    let reviewer = sign_in(&marketplace, "9000000004")?;
    println!("  Reviewer signed in: 9000000004 ({})", reviewer.role.label());

    let newcomer = marketplace.identity.register(Registration {
        mobile: "9000000101".to_string(),
        password: SEED_PASSWORD.to_string(),
        role: Some(Role::Seller),
        email: Some("newcomer@example.com".to_string()),
        name: Some("New Seller".to_string()),
    })?;
    let seller = sign_in(&marketplace, &newcomer.mobile)?;
    println!(
        "  Seller registered: {} (KYC {})",
        newcomer.mobile,
        newcomer.kyc_status.label()
    );

    println!("\nKYC");
    let profile = marketplace.kyc.submit_kyc(
        &seller,
        KycSubmission {
            full_name: "New Seller".to_string(),
            email: "newcomer@example.com".to_string(),
            government_id_type: "PASSPORT".to_string(),
        },
        Some(UploadedFile::new("passport.pdf", b"%PDF-1.7".to_vec())),
    )?;
    println!("  Submitted profile {} -> {}", profile.id, profile.review.status.label());
    let profile = marketplace
        .moderation
        .decide_kyc(&reviewer, &profile.id, Decision::Approve, None)?;
    println!("  Reviewer decision -> {}", profile.review.status.label());

    println!("\nListing");
    let fields = ListingFields {
        title: "Garden cottage".to_string(),
        description: "Two bedrooms, a vegetable garden, and a quiet lane".to_string(),
        price: args.price,
        area: 1400,
        property_type: PropertyType::House,
        address: "27 Orchard Street, Mysuru".to_string(),
    };
    let detail = marketplace.listings.create_listing(
        &seller,
        fields.clone(),
        vec![UploadedFile::new("cottage.jpg", vec![0xFF, 0xD8, 0xFF])],
    )?;
    let property_id = detail.property.id.clone();
    print_listing("Submitted", &detail.property);
    println!("  Searchable: {}", is_searchable(&marketplace, &detail.property)?);

    let approved = marketplace
        .moderation
        .decide_listing(&reviewer, &property_id, Decision::Approve, None)?;
    print_listing("Reviewed", &approved);
    println!("  Searchable: {}", is_searchable(&marketplace, &approved)?);

    println!("\nEdit proposal");
    let outcome = marketplace.listings.propose_listing_update(
        &seller,
        &property_id,
        ListingFields {
            price: args.proposed_price,
            ..fields
        },
    )?;
    println!(
        "  Proposal {} -> {} (price {})",
        outcome.update.id,
        outcome.update.review.status.label(),
        outcome.update.fields.price
    );
    print_listing("Live before review", &current(&repository, &approved)?);

    let decision = if args.reject_edit {
        Decision::Reject
    } else {
        Decision::Approve
    };
    let update = marketplace.moderation.decide_listing_update(
        &reviewer,
        &outcome.update.id,
        decision,
        None,
    )?;
    println!("  Reviewer decision -> {}", update.review.status.label());
    if let Some(reason) = update.review.rejection_reason.as_deref() {
        println!("  Reason: {reason}");
    }

    let live = current(&repository, &approved)?;
    print_listing("Live after review", &live);

    if args.json {
        match serde_json::to_string_pretty(&live) {
            Ok(json) => println!("\n{json}"),
            Err(err) => println!("\n  Listing payload unavailable: {err}"),
        }
    }

    Ok(())
}

fn is_searchable(
    marketplace: &DemoMarketplace,
    property: &Property,
) -> Result<bool, MarketplaceError> {
    Ok(marketplace
        .listings
        .search(None, &SearchQuery::default())?
        .iter()
        .any(|card| card.property.id == property.id))
}

fn current(
    repository: &MemoryRepository,
    property: &Property,
) -> Result<Property, MarketplaceError> {
    repository
        .property(&property.id)?
        .ok_or(MarketplaceError::NotFound("property"))
}

fn print_listing(label: &str, property: &Property) {
    println!(
        "  {label}: {} | {} | price {} | verified by {}",
        property.fields.title,
        property.review.status.label(),
        property.fields.price,
        property
            .review
            .verified_by
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string())
    );
}
