use super::common::*;

use chrono::Utc;

use crate::marketplace::domain::{
    Decision, KycStatus, PropertyId, PropertyType, Review, ReviewStatus, Role, ShortlistAction,
    UploadedFile,
};
use crate::marketplace::listings::SearchQuery;
use crate::marketplace::repository::{MarketplaceRepository, Write};
use crate::marketplace::MarketplaceError;

#[test]
fn pending_listing_is_hidden_until_approved() {
    let harness = harness();
    let seller = harness.seller();
    let reviewer = harness.reviewer();
    let buyer = harness.buyer();
    let property = harness.pending_listing(&seller);
    let listings = &harness.marketplace.listings;

    assert_eq!(property.review.status, ReviewStatus::Pending);
    assert!(listings
        .search(None, &SearchQuery::default())
        .expect("search")
        .is_empty());
    assert!(matches!(
        listings.view_listing(None, &property.id),
        Err(MarketplaceError::NotFound("property"))
    ));
    assert!(matches!(
        listings.view_listing(Some(&buyer), &property.id),
        Err(MarketplaceError::NotFound("property"))
    ));

    let own = listings
        .view_listing(Some(&seller), &property.id)
        .expect("owner sees pending listing");
    assert_eq!(own.property.views, 0);
    assert!(listings.view_listing(Some(&reviewer), &property.id).is_ok());
}

#[test]
fn listing_requires_approved_kyc() {
    let harness = harness();
    let pending = harness.account("9000000009", Role::Seller, KycStatus::Pending);

    let result = harness
        .marketplace
        .listings
        .create_listing(&pending, listing_fields(), Vec::new());

    assert!(matches!(
        result,
        Err(MarketplaceError::KycNotApproved(KycStatus::Pending))
    ));
    assert_eq!(harness.repository.property_count(), 0);
}

#[test]
fn invalid_fields_write_nothing() {
    let harness = harness();
    let seller = harness.seller();
    let mut fields = listing_fields();
    fields.title = "Hut".to_string();

    let err = harness
        .marketplace
        .listings
        .create_listing(&seller, fields, vec![photo("front.jpg")])
        .expect_err("title too short");

    match err {
        MarketplaceError::Validation(violation) => assert_eq!(violation.field, "title"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(harness.repository.property_count(), 0);
    assert!(harness.storage.keys().is_empty());
}

#[test]
fn upload_failure_aborts_without_creating_a_listing() {
    let harness = harness();
    let seller = harness.seller();
    harness.storage.fail_after(1);

    let result = harness.marketplace.listings.create_listing(
        &seller,
        listing_fields(),
        vec![photo("front.jpg"), photo("kitchen.jpg")],
    );

    assert!(matches!(result, Err(MarketplaceError::Upload(_))));
    assert_eq!(harness.repository.property_count(), 0);
    assert_eq!(harness.storage.keys().len(), 1);
}

#[test]
fn images_are_filtered_and_type_checked() {
    let harness = harness();
    let seller = harness.seller();
    let listings = &harness.marketplace.listings;

    let err = listings
        .create_listing(
            &seller,
            listing_fields(),
            vec![UploadedFile::new("brochure.txt", b"hello".to_vec())],
        )
        .expect_err("text is not an image");
    assert!(matches!(err, MarketplaceError::Validation(ref v) if v.field == "images"));

    let detail = listings
        .create_listing(
            &seller,
            listing_fields(),
            vec![
                UploadedFile::new("undefined", Vec::new()),
                UploadedFile::new("porch.png", vec![0x89, 0x50]),
            ],
        )
        .expect("blank part skipped");
    assert_eq!(detail.images.len(), 1);
    assert!(detail.images[0].url.starts_with("memory://properties/"));
}

#[test]
fn shortlist_toggle_twice_restores_membership() {
    let harness = harness();
    let seller = harness.seller();
    let reviewer = harness.reviewer();
    let buyer = harness.buyer();
    let property = harness.approved_listing(&seller, &reviewer);
    let listings = &harness.marketplace.listings;

    assert_eq!(
        listings.toggle_shortlist(&buyer, &property.id).expect("add"),
        ShortlistAction::Added
    );
    let saved = listings.shortlist(&buyer).expect("shortlist");
    assert_eq!(saved.len(), 1);
    assert!(saved[0].shortlisted);

    assert_eq!(
        listings.toggle_shortlist(&buyer, &property.id).expect("remove"),
        ShortlistAction::Removed
    );
    assert!(listings.shortlist(&buyer).expect("shortlist").is_empty());

    assert!(matches!(
        listings.toggle_shortlist(&buyer, &PropertyId::from("missing")),
        Err(MarketplaceError::NotFound("property"))
    ));
}

#[test]
fn unapproved_listings_stay_out_of_other_shortlists() {
    let harness = harness();
    let seller = harness.seller();
    let reviewer = harness.reviewer();
    let buyer = harness.buyer();
    let pending = harness.pending_listing(&seller);
    let listings = &harness.marketplace.listings;

    assert!(matches!(
        listings.toggle_shortlist(&buyer, &pending.id),
        Err(MarketplaceError::NotFound("property"))
    ));
    assert!(listings.shortlist(&buyer).expect("shortlist").is_empty());
    assert!(harness
        .repository
        .shortlist(&buyer.user_id)
        .expect("entries")
        .is_empty());

    assert_eq!(
        listings.toggle_shortlist(&seller, &pending.id).expect("owner"),
        ShortlistAction::Added
    );
    assert_eq!(listings.shortlist(&seller).expect("shortlist").len(), 1);

    let approved = harness.approved_listing(&seller, &reviewer);
    listings
        .toggle_shortlist(&buyer, &approved.id)
        .expect("approved listing");
    assert_eq!(listings.shortlist(&buyer).expect("shortlist").len(), 1);

    harness
        .repository
        .commit(vec![Write::SetListingReview {
            property_id: approved.id.clone(),
            review: Review::decided(
                Decision::Reject,
                Some("Withdrawn"),
                "Does not meet guidelines",
                &reviewer.user_id,
                Utc::now(),
            ),
        }])
        .expect("reject");

    assert!(listings.shortlist(&buyer).expect("shortlist").is_empty());
    assert!(matches!(
        listings.toggle_shortlist(&buyer, &approved.id),
        Err(MarketplaceError::NotFound("property"))
    ));
}

#[test]
fn same_named_images_are_stored_separately() {
    let harness = harness();
    let seller = harness.seller();

    let detail = harness
        .marketplace
        .listings
        .create_listing(
            &seller,
            listing_fields(),
            vec![photo("image.jpg"), photo("image.jpg")],
        )
        .expect("listing");

    assert_eq!(detail.images.len(), 2);
    assert_ne!(detail.images[0].url, detail.images[1].url);
    assert_ne!(detail.images[0].id, detail.images[1].id);
}

#[test]
fn proposals_are_owner_only() {
    let harness = harness();
    let seller = harness.seller();
    let buyer = harness.buyer();
    let property = harness.pending_listing(&seller);
    let listings = &harness.marketplace.listings;

    assert!(matches!(
        listings.propose_listing_update(&buyer, &property.id, listing_fields()),
        Err(MarketplaceError::PermissionDenied)
    ));
    assert!(matches!(
        listings.propose_listing_update(&seller, &PropertyId::from("missing"), listing_fields()),
        Err(MarketplaceError::NotFound("property"))
    ));
}

#[test]
fn newer_proposal_supersedes_pending_one() {
    let harness = harness();
    let seller = harness.seller();
    let reviewer = harness.reviewer();
    let property = harness.approved_listing(&seller, &reviewer);
    let listings = &harness.marketplace.listings;

    let mut first = listing_fields();
    first.price = 1_800_000;
    let opening = listings
        .propose_listing_update(&seller, &property.id, first)
        .expect("first proposal");
    assert!(opening.superseded.is_none());

    let mut second = listing_fields();
    second.price = 2_000_000;
    let replacing = listings
        .propose_listing_update(&seller, &property.id, second)
        .expect("second proposal");

    let superseded = replacing.superseded.expect("pending proposal reported");
    assert_eq!(superseded.fields.price, 1_800_000);
    assert_eq!(replacing.update.id, opening.update.id);
    assert_eq!(replacing.update.fields.price, 2_000_000);

    let stored = harness
        .repository
        .property_update_for(&property.id)
        .expect("read")
        .expect("one proposal per listing");
    assert_eq!(stored.fields.price, 2_000_000);
    assert_eq!(stored.review.status, ReviewStatus::Pending);
}

#[test]
fn search_filters_on_text_type_and_price() {
    let harness = harness();
    let seller = harness.seller();
    let reviewer = harness.reviewer();
    let listings = &harness.marketplace.listings;

    let villa = harness.approved_listing(&seller, &reviewer);
    let mut flat = listing_fields();
    flat.title = "City centre apartment".to_string();
    flat.description = "Two rooms near the metro station".to_string();
    flat.property_type = PropertyType::Apartment;
    flat.price = 600_000;
    let flat = listings
        .create_listing(&seller, flat, Vec::new())
        .expect("create flat")
        .property;
    harness
        .marketplace
        .moderation
        .decide_listing(&reviewer, &flat.id, crate::marketplace::Decision::Approve, None)
        .expect("approve flat");

    let all = listings.search(None, &SearchQuery::default()).expect("search");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].property.id, flat.id, "newest first");

    let by_text = listings
        .search(
            None,
            &SearchQuery {
                q: Some("METRO".to_string()),
                ..SearchQuery::default()
            },
        )
        .expect("search");
    assert_eq!(by_text.len(), 1);
    assert_eq!(by_text[0].property.id, flat.id);

    let by_type = listings
        .search(
            None,
            &SearchQuery {
                property_type: Some("house".to_string()),
                ..SearchQuery::default()
            },
        )
        .expect("search");
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].property.id, villa.id);

    let by_price = listings
        .search(
            None,
            &SearchQuery {
                min_price: Some(500_000),
                max_price: Some(1_000_000),
                ..SearchQuery::default()
            },
        )
        .expect("search");
    assert_eq!(by_price.len(), 1);
    assert_eq!(by_price[0].property.id, flat.id);

    let unknown_type = listings
        .search(
            None,
            &SearchQuery {
                property_type: Some("castle".to_string()),
                ..SearchQuery::default()
            },
        )
        .expect("search");
    assert_eq!(unknown_type.len(), 2);
}

#[test]
fn public_views_count_and_contact_requires_sign_in() {
    let harness = harness();
    let seller = harness.seller();
    let reviewer = harness.reviewer();
    let buyer = harness.buyer();
    let property = harness.approved_listing(&seller, &reviewer);
    let listings = &harness.marketplace.listings;

    let anonymous = listings.view_listing(None, &property.id).expect("view");
    assert_eq!(anonymous.property.views, 1);
    assert!(anonymous.owner_contact.is_none());
    assert!(anonymous.proposal.is_none());

    let signed_in = listings
        .view_listing(Some(&buyer), &property.id)
        .expect("view");
    assert_eq!(signed_in.property.views, 2);
    assert_eq!(
        signed_in.owner_contact.map(|card| card.mobile),
        Some("9000000003".to_string())
    );
}

#[test]
fn dashboard_reports_listings_and_proposal_status() {
    let harness = harness();
    let seller = harness.seller();
    let reviewer = harness.reviewer();
    let approved = harness.approved_listing(&seller, &reviewer);
    let listings = &harness.marketplace.listings;

    listings
        .propose_listing_update(&seller, &approved.id, listing_fields())
        .expect("propose");
    let pending = harness.pending_listing(&seller);

    let dashboard = listings.dashboard(&seller).expect("dashboard");
    assert_eq!(dashboard.user.id, seller.user_id);
    assert_eq!(dashboard.listings.len(), 2);
    assert_eq!(dashboard.listings[0].card.property.id, pending.id);
    assert!(dashboard.listings[0].proposal_status.is_none());
    assert_eq!(
        dashboard.listings[1].proposal_status,
        Some(ReviewStatus::Pending)
    );
}
