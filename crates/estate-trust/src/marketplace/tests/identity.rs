use std::sync::Arc;

use chrono::Duration;

use super::common::*;

use crate::config::PasswordCost;
use crate::marketplace::credentials::CredentialHasher;
use crate::marketplace::domain::{KycStatus, Role};
use crate::marketplace::identity::{IdentityService, Registration};
use crate::marketplace::{DuplicateField, MarketplaceError, MemoryRepository};

fn registration(mobile: &str, email: Option<&str>) -> Registration {
    Registration {
        mobile: mobile.to_string(),
        password: PASSWORD.to_string(),
        role: None,
        email: email.map(str::to_string),
        name: Some("Ravi Kumar".to_string()),
    }
}

#[test]
fn registration_defaults_to_buyer_and_hashes_password() {
    let harness = harness();

    let user = harness
        .marketplace
        .identity
        .register(registration(" 9000000011 ", Some("ravi@example.com")))
        .expect("register");

    assert_eq!(user.mobile, "9000000011");
    assert_eq!(user.role, Role::Buyer);
    assert_eq!(user.kyc_status, KycStatus::NotSubmitted);
    assert!(user.password_hash.starts_with("$argon2id$"));

    let json = serde_json::to_value(&user).expect("serialize");
    assert!(json.get("password_hash").is_none());
}

#[test]
fn duplicate_mobile_or_email_is_rejected() {
    let harness = harness();
    let identity = &harness.marketplace.identity;
    identity
        .register(registration("9000000011", Some("ravi@example.com")))
        .expect("register");

    assert!(matches!(
        identity.register(registration("9000000011", None)),
        Err(MarketplaceError::DuplicateUser(DuplicateField::Mobile))
    ));
    let err = identity
        .register(registration("9000000012", Some("ravi@example.com")))
        .expect_err("email taken");
    assert_eq!(err.to_string(), "User already exists with this email.");
    assert_eq!(harness.repository.user_count(), 1);
}

#[test]
fn login_accepts_mobile_or_email_and_rejects_bad_credentials() {
    let harness = harness();
    let identity = &harness.marketplace.identity;
    let user = identity
        .register(registration("9000000011", Some("ravi@example.com")))
        .expect("register");

    let by_mobile = identity
        .authenticate("9000000011", PASSWORD)
        .expect("mobile login");
    let by_email = identity
        .authenticate("RAVI@example.com", PASSWORD)
        .expect("email login");
    assert_eq!(by_mobile.user.id, user.id);
    assert_eq!(by_email.user.id, user.id);
    assert_ne!(by_mobile.token, by_email.token);

    assert!(matches!(
        identity.authenticate("9000000011", "password124"),
        Err(MarketplaceError::AuthFailure)
    ));
    assert!(matches!(
        identity.authenticate("9999999999", PASSWORD),
        Err(MarketplaceError::AuthFailure)
    ));
    assert!(matches!(
        identity.authenticate("", ""),
        Err(MarketplaceError::AuthFailure)
    ));
}

#[test]
fn sessions_resolve_until_ended() {
    let harness = harness();
    let reviewer = harness.reviewer();
    let identity = &harness.marketplace.identity;
    let token = harness.token("9000000004");

    let caller = identity.resolve_session(&token).expect("live session");
    assert_eq!(caller, reviewer);
    assert!(caller.can_moderate());

    assert!(identity.end_session(&token).expect("logout"));
    assert!(!identity.end_session(&token).expect("second logout"));
    assert!(matches!(
        identity.resolve_session(&token),
        Err(MarketplaceError::Unauthorized)
    ));
}

#[test]
fn expired_sessions_are_unauthorized() {
    let repository = MemoryRepository::new();
    let hasher = CredentialHasher::new(PasswordCost::Testing).expect("hasher");
    let identity = IdentityService::new(Arc::new(repository), hasher, Duration::zero());
    identity
        .register(registration("9000000011", None))
        .expect("register");

    let grant = identity
        .authenticate("9000000011", PASSWORD)
        .expect("login");

    assert!(matches!(
        identity.resolve_session(&grant.token),
        Err(MarketplaceError::Unauthorized)
    ));
}

#[test]
fn oversized_session_lifetime_saturates() {
    let repository = MemoryRepository::new();
    let hasher = CredentialHasher::new(PasswordCost::Testing).expect("hasher");
    let ttl = Duration::hours(i64::from(u32::MAX));
    let identity = IdentityService::new(Arc::new(repository), hasher, ttl);
    identity
        .register(registration("9000000012", None))
        .expect("register");

    let grant = identity
        .authenticate("9000000012", PASSWORD)
        .expect("login");

    assert_eq!(grant.expires_at, chrono::DateTime::<chrono::Utc>::MAX_UTC);
    assert!(identity.resolve_session(&grant.token).is_ok());
}

#[test]
fn short_passwords_fail_validation() {
    let harness = harness();
    let mut weak = registration("9000000011", None);
    weak.password = "12345".to_string();

    match harness.marketplace.identity.register(weak) {
        Err(MarketplaceError::Validation(violation)) => assert_eq!(violation.field, "password"),
        other => panic!("unexpected result: {other:?}"),
    }
}
