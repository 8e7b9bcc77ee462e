use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    KycProfile, KycProfileId, Property, PropertyId, PropertyImage, PropertyUpdate,
    PropertyUpdateId, ReviewStatus, ShortlistEntry, User, UserId,
};
use super::repository::{MarketplaceRepository, PropertyFilter, RepositoryError, Write};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    properties: Vec<Property>,
    images: Vec<PropertyImage>,
    updates: Vec<PropertyUpdate>,
    kyc_profiles: Vec<KycProfile>,
    shortlists: Vec<ShortlistEntry>,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    fail_at_write: Option<usize>,
}

/// In-process store backing the service binary and the test suites.
///
/// Tables keep insertion order. A commit stages its writes on a copy of the
/// tables and swaps the copy in only after the last write succeeded.
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    state: Arc<Mutex<State>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail when it reaches the write at `index`
    /// (zero-based). The injection is consumed by that commit.
    pub fn fail_next_commit_at(&self, index: usize) {
        if let Ok(mut state) = self.lock() {
            state.fail_at_write = Some(index);
        }
    }

    pub fn user_count(&self) -> usize {
        self.lock().map(|state| state.tables.users.len()).unwrap_or(0)
    }

    pub fn property_count(&self) -> usize {
        self.lock()
            .map(|state| state.tables.properties.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl MarketplaceRepository for MemoryRepository {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.tables.users.iter().find(|user| &user.id == id).cloned())
    }

    fn user_by_login(&self, identifier: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .users
            .iter()
            .find(|user| {
                user.mobile == identifier
                    || user
                        .email
                        .as_deref()
                        .is_some_and(|email| email.eq_ignore_ascii_case(identifier))
            })
            .cloned())
    }

    fn property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .properties
            .iter()
            .find(|property| &property.id == id)
            .cloned())
    }

    fn properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .properties
            .iter()
            .filter(|property| filter.matches(property))
            .cloned()
            .collect())
    }

    fn images(&self, property_id: &PropertyId) -> Result<Vec<PropertyImage>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .images
            .iter()
            .filter(|image| &image.property_id == property_id)
            .cloned()
            .collect())
    }

    fn kyc_profile(&self, id: &KycProfileId) -> Result<Option<KycProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .kyc_profiles
            .iter()
            .find(|profile| &profile.id == id)
            .cloned())
    }

    fn kyc_profile_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<KycProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .kyc_profiles
            .iter()
            .find(|profile| &profile.user_id == user_id)
            .cloned())
    }

    fn kyc_profiles(&self, status: &[ReviewStatus]) -> Result<Vec<KycProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .kyc_profiles
            .iter()
            .filter(|profile| status.is_empty() || status.contains(&profile.review.status))
            .cloned()
            .collect())
    }

    fn property_update(
        &self,
        id: &PropertyUpdateId,
    ) -> Result<Option<PropertyUpdate>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .updates
            .iter()
            .find(|update| &update.id == id)
            .cloned())
    }

    fn property_update_for(
        &self,
        property_id: &PropertyId,
    ) -> Result<Option<PropertyUpdate>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .updates
            .iter()
            .find(|update| &update.property_id == property_id)
            .cloned())
    }

    fn property_updates(
        &self,
        status: &[ReviewStatus],
    ) -> Result<Vec<PropertyUpdate>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .updates
            .iter()
            .filter(|update| status.is_empty() || status.contains(&update.review.status))
            .cloned()
            .collect())
    }

    fn shortlist(&self, user_id: &UserId) -> Result<Vec<ShortlistEntry>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .shortlists
            .iter()
            .filter(|entry| &entry.user_id == user_id)
            .cloned()
            .collect())
    }

    fn commit(&self, writes: Vec<Write>) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let fail_at = state.fail_at_write.take();
        let mut staged = state.tables.clone();

        for (index, write) in writes.into_iter().enumerate() {
            if fail_at == Some(index) {
                return Err(RepositoryError::Unavailable(format!(
                    "injected failure at write {index} ({})",
                    write.label()
                )));
            }
            staged.apply(write)?;
        }

        state.tables = staged;
        Ok(())
    }
}

impl Tables {
    fn apply(&mut self, write: Write) -> Result<(), RepositoryError> {
        match write {
            Write::InsertUser(user) => {
                let taken = self.users.iter().any(|existing| {
                    existing.mobile == user.mobile
                        || (user.email.is_some() && existing.email == user.email)
                });
                if taken {
                    return Err(RepositoryError::Conflict(format!("user {}", user.mobile)));
                }
                self.users.push(user);
            }
            Write::SetKycStatus { user_id, status } => {
                let user = self
                    .users
                    .iter_mut()
                    .find(|user| user.id == user_id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("user {user_id}")))?;
                user.kyc_status = status;
            }
            Write::InsertProperty { property, images } => {
                if self.properties.iter().any(|existing| existing.id == property.id) {
                    return Err(RepositoryError::Conflict(format!("property {}", property.id)));
                }
                if !self.users.iter().any(|user| user.id == property.owner_id) {
                    return Err(RepositoryError::NotFound(format!(
                        "user {}",
                        property.owner_id
                    )));
                }
                self.properties.push(property);
                self.images.extend(images);
            }
            Write::SetListingFields {
                property_id,
                fields,
                at,
            } => {
                let property = self.property_mut(&property_id)?;
                property.fields = fields;
                property.updated_at = at;
            }
            Write::SetListingReview {
                property_id,
                review,
            } => {
                let property = self.property_mut(&property_id)?;
                if let Some(at) = review.reviewed_at {
                    property.updated_at = at;
                }
                property.review = review;
            }
            Write::IncrementViews { property_id } => {
                let property = self.property_mut(&property_id)?;
                property.views = property.views.saturating_add(1);
            }
            Write::UpsertPropertyUpdate(update) => {
                if !self
                    .properties
                    .iter()
                    .any(|property| property.id == update.property_id)
                {
                    return Err(RepositoryError::NotFound(format!(
                        "property {}",
                        update.property_id
                    )));
                }
                match self
                    .updates
                    .iter_mut()
                    .find(|existing| existing.property_id == update.property_id)
                {
                    Some(existing) => {
                        existing.fields = update.fields;
                        existing.review = update.review;
                        existing.updated_at = update.updated_at;
                    }
                    None => self.updates.push(update),
                }
            }
            Write::SetUpdateReview { update_id, review } => {
                let update = self
                    .updates
                    .iter_mut()
                    .find(|update| update.id == update_id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("update {update_id}")))?;
                if let Some(at) = review.reviewed_at {
                    update.updated_at = at;
                }
                update.review = review;
            }
            Write::UpsertKycProfile(profile) => {
                if !self.users.iter().any(|user| user.id == profile.user_id) {
                    return Err(RepositoryError::NotFound(format!(
                        "user {}",
                        profile.user_id
                    )));
                }
                match self
                    .kyc_profiles
                    .iter_mut()
                    .find(|existing| existing.user_id == profile.user_id)
                {
                    Some(existing) => *existing = profile,
                    None => self.kyc_profiles.push(profile),
                }
            }
            Write::SetKycReview { profile_id, review } => {
                let profile = self
                    .kyc_profiles
                    .iter_mut()
                    .find(|profile| profile.id == profile_id)
                    .ok_or_else(|| {
                        RepositoryError::NotFound(format!("kyc profile {profile_id}"))
                    })?;
                if let Some(at) = review.reviewed_at {
                    profile.updated_at = at;
                }
                profile.review = review;
            }
            Write::InsertShortlist(entry) => {
                let exists = self.shortlists.iter().any(|existing| {
                    existing.user_id == entry.user_id && existing.property_id == entry.property_id
                });
                if exists {
                    return Err(RepositoryError::Conflict(format!(
                        "shortlist {}/{}",
                        entry.user_id, entry.property_id
                    )));
                }
                self.shortlists.push(entry);
            }
            Write::DeleteShortlist {
                user_id,
                property_id,
            } => {
                let before = self.shortlists.len();
                self.shortlists.retain(|entry| {
                    !(entry.user_id == user_id && entry.property_id == property_id)
                });
                if self.shortlists.len() == before {
                    return Err(RepositoryError::NotFound(format!(
                        "shortlist {user_id}/{property_id}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn property_mut(&mut self, id: &PropertyId) -> Result<&mut Property, RepositoryError> {
        self.properties
            .iter_mut()
            .find(|property| &property.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("property {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{KycStatus, Role};
    use chrono::Utc;

    fn user(mobile: &str, email: Option<&str>) -> User {
        User {
            id: UserId::generate(),
            mobile: mobile.to_string(),
            email: email.map(str::to_string),
            name: None,
            password_hash: "hash".to_string(),
            role: Role::Seller,
            kyc_status: KycStatus::NotSubmitted,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn failed_write_discards_the_whole_batch() {
        let repository = MemoryRepository::new();
        let first = user("9000000001", None);
        let missing = UserId::from("missing");

        let result = repository.commit(vec![
            Write::InsertUser(first.clone()),
            Write::SetKycStatus {
                user_id: missing,
                status: KycStatus::Approved,
            },
        ]);

        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
        assert_eq!(repository.user_count(), 0);
        assert!(repository.user(&first.id).expect("read").is_none());
    }

    #[test]
    fn injected_failure_is_consumed_by_one_commit() {
        let repository = MemoryRepository::new();
        repository.fail_next_commit_at(0);

        let first = repository.commit(vec![Write::InsertUser(user("9000000001", None))]);
        assert!(matches!(first, Err(RepositoryError::Unavailable(_))));

        repository
            .commit(vec![Write::InsertUser(user("9000000001", None))])
            .expect("second commit succeeds");
        assert_eq!(repository.user_count(), 1);
    }

    #[test]
    fn duplicate_mobile_or_email_conflicts() {
        let repository = MemoryRepository::new();
        repository
            .commit(vec![Write::InsertUser(user(
                "9000000001",
                Some("seller@example.com"),
            ))])
            .expect("insert");

        let same_mobile = repository.commit(vec![Write::InsertUser(user("9000000001", None))]);
        assert!(matches!(same_mobile, Err(RepositoryError::Conflict(_))));

        let same_email = repository.commit(vec![Write::InsertUser(user(
            "9000000002",
            Some("seller@example.com"),
        ))]);
        assert!(matches!(same_email, Err(RepositoryError::Conflict(_))));

        let found = repository
            .user_by_login("SELLER@example.com")
            .expect("lookup")
            .expect("found by email");
        assert_eq!(found.mobile, "9000000001");
    }
}
