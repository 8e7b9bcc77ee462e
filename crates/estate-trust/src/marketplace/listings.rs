use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    Caller, KycProfile, KycStatus, ListingFields, Property, PropertyId, PropertyImage,
    PropertyImageId, PropertyType, PropertyUpdate, PropertyUpdateId, Review, ReviewStatus,
    ShortlistAction, ShortlistEntry, UploadedFile, User,
};
use super::repository::{MarketplaceRepository, PropertyFilter, Write};
use super::service::{contact_for, storage_failure, ContactCard, MarketplaceError};
use super::storage::{content_type_of, object_key, ObjectStorage, UploadScope};
use super::validation::{validate_listing, ValidationError};

/// Filters accepted by the public search. Unknown property types are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default, rename = "type")]
    pub property_type: Option<String>,
    #[serde(default)]
    pub min_price: Option<u64>,
    #[serde(default)]
    pub max_price: Option<u64>,
}

impl SearchQuery {
    fn matches(&self, property: &Property) -> bool {
        let text_ok = match self.q.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                [
                    &property.fields.title,
                    &property.fields.description,
                    &property.fields.address,
                ]
                .iter()
                .any(|haystack| haystack.to_lowercase().contains(&needle))
            }
            _ => true,
        };
        let type_ok = self
            .property_type
            .as_deref()
            .and_then(PropertyType::parse)
            .map_or(true, |wanted| wanted == property.fields.property_type);
        let min_ok = self
            .min_price
            .map_or(true, |min| property.fields.price >= min);
        let max_ok = self
            .max_price
            .map_or(true, |max| property.fields.price <= max);

        text_ok && type_ok && min_ok && max_ok
    }
}

/// Listing as shown in grids (search results, shortlist, dashboard).
#[derive(Debug, Clone, Serialize)]
pub struct ListingCard {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<String>,
    pub shortlisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<PropertyImage>,
    pub shortlisted: bool,
    /// Only present for signed-in viewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_contact: Option<ContactCard>,
    /// Only present for the owner and reviewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<PropertyUpdate>,
}

/// Result of an edit proposal. `superseded` holds a still-pending proposal the
/// new one replaced before anyone reviewed it.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalOutcome {
    pub update: PropertyUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded: Option<PropertyUpdate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardListing {
    #[serde(flatten)]
    pub card: ListingCard,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_status: Option<ReviewStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: User,
    pub kyc_profile: Option<KycProfile>,
    pub listings: Vec<DashboardListing>,
}

/// Listing submission, edit proposals, search, detail views, and shortlists.
pub struct ListingService<R, S> {
    repository: Arc<R>,
    storage: Arc<S>,
}

impl<R, S> ListingService<R, S>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    pub fn new(repository: Arc<R>, storage: Arc<S>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Creates a PENDING listing. Images are uploaded first; a failed upload
    /// aborts before anything is written, leaving earlier objects in storage.
    pub fn create_listing(
        &self,
        caller: &Caller,
        fields: ListingFields,
        images: Vec<UploadedFile>,
    ) -> Result<ListingDetail, MarketplaceError> {
        let owner = self
            .repository
            .user(&caller.user_id)?
            .ok_or(MarketplaceError::NotFound("user"))?;
        if owner.kyc_status != KycStatus::Approved {
            return Err(MarketplaceError::KycNotApproved(owner.kyc_status));
        }

        validate_listing(&fields)?;

        let uploads: Vec<UploadedFile> = images
            .into_iter()
            .filter(|file| !file.is_blank())
            .collect();
        for file in &uploads {
            if content_type_of(file).type_() != mime::IMAGE {
                return Err(ValidationError::new(
                    "images",
                    format!("{} is not an image", file.file_name),
                )
                .into());
            }
        }

        let now = Utc::now();
        let property_id = PropertyId::generate();
        let mut stored_images = Vec::with_capacity(uploads.len());
        for file in &uploads {
            let image_id = PropertyImageId::generate();
            let key = object_key(
                UploadScope::PropertyImage,
                &owner.id,
                image_id.as_str(),
                &file.file_name,
                now,
            );
            let stored = self
                .storage
                .put(&key, &file.bytes, &content_type_of(file))
                .map_err(|err| {
                    warn!(property_id = %property_id, error = %err, "image upload failed");
                    err
                })?;
            stored_images.push(PropertyImage {
                id: image_id,
                property_id: property_id.clone(),
                url: stored.url,
            });
        }

        let property = Property {
            id: property_id,
            owner_id: owner.id.clone(),
            fields,
            review: Review::pending(),
            views: 0,
            created_at: now,
            updated_at: now,
        };

        self.repository
            .commit(vec![Write::InsertProperty {
                property: property.clone(),
                images: stored_images.clone(),
            }])
            .map_err(storage_failure("create_listing"))?;

        info!(
            property_id = %property.id,
            owner_id = %owner.id,
            images = stored_images.len(),
            "listing submitted for review"
        );

        Ok(ListingDetail {
            property,
            images: stored_images,
            shortlisted: false,
            owner_contact: Some(ContactCard::from(&owner)),
            proposal: None,
        })
    }

    /// Stages an edit for review; the live listing keeps its current fields.
    pub fn propose_listing_update(
        &self,
        caller: &Caller,
        property_id: &PropertyId,
        fields: ListingFields,
    ) -> Result<ProposalOutcome, MarketplaceError> {
        validate_listing(&fields)?;

        let property = self
            .repository
            .property(property_id)?
            .ok_or(MarketplaceError::NotFound("property"))?;
        if property.owner_id != caller.user_id {
            return Err(MarketplaceError::PermissionDenied);
        }

        let now = Utc::now();
        let existing = self.repository.property_update_for(property_id)?;
        let update = PropertyUpdate {
            id: existing
                .as_ref()
                .map(|existing| existing.id.clone())
                .unwrap_or_else(PropertyUpdateId::generate),
            property_id: property_id.clone(),
            fields,
            review: Review::pending(),
            created_at: existing
                .as_ref()
                .map(|existing| existing.created_at)
                .unwrap_or(now),
            updated_at: now,
        };

        self.repository
            .commit(vec![Write::UpsertPropertyUpdate(update.clone())])
            .map_err(storage_failure("propose_listing_update"))?;

        let superseded =
            existing.filter(|previous| previous.review.status == ReviewStatus::Pending);
        if let Some(previous) = &superseded {
            warn!(
                property_id = %property_id,
                update_id = %previous.id,
                "unreviewed edit proposal replaced by a newer one"
            );
        }
        info!(property_id = %property_id, update_id = %update.id, "edit proposal submitted");

        Ok(ProposalOutcome { update, superseded })
    }

    /// APPROVED listings matching `query`, newest first.
    pub fn search(
        &self,
        viewer: Option<&Caller>,
        query: &SearchQuery,
    ) -> Result<Vec<ListingCard>, MarketplaceError> {
        let mut matches: Vec<Property> = self
            .repository
            .properties(&PropertyFilter::with_status(ReviewStatus::Approved))?
            .into_iter()
            .filter(|property| query.matches(property))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.cards(viewer, matches)
    }

    /// Detail page. Non-public listings are only shown to the owner and
    /// reviewers. Every public view bumps the counter.
    pub fn view_listing(
        &self,
        viewer: Option<&Caller>,
        property_id: &PropertyId,
    ) -> Result<ListingDetail, MarketplaceError> {
        let mut property = self
            .repository
            .property(property_id)?
            .ok_or(MarketplaceError::NotFound("property"))?;

        if !visible_to(&property, viewer) {
            return Err(MarketplaceError::NotFound("property"));
        }
        let privileged = viewer.is_some_and(|caller| {
            caller.user_id == property.owner_id || caller.can_moderate()
        });

        if property.is_public() {
            match self.repository.commit(vec![Write::IncrementViews {
                property_id: property_id.clone(),
            }]) {
                Ok(()) => property.views += 1,
                Err(err) => warn!(property_id = %property_id, error = %err, "failed to count view"),
            }
        }

        let images = self.repository.images(property_id)?;
        let shortlisted = match viewer {
            Some(caller) => self.is_shortlisted(caller, property_id)?,
            None => false,
        };
        let owner_contact = match viewer {
            Some(_) => contact_for(self.repository.as_ref(), &property.owner_id)?,
            None => None,
        };
        let proposal = if privileged {
            self.repository.property_update_for(property_id)?
        } else {
            None
        };

        Ok(ListingDetail {
            property,
            images,
            shortlisted,
            owner_contact,
            proposal,
        })
    }

    pub fn toggle_shortlist(
        &self,
        caller: &Caller,
        property_id: &PropertyId,
    ) -> Result<ShortlistAction, MarketplaceError> {
        let visible = self
            .repository
            .property(property_id)?
            .is_some_and(|property| visible_to(&property, Some(caller)));
        if !visible {
            return Err(MarketplaceError::NotFound("property"));
        }

        let (write, action) = if self.is_shortlisted(caller, property_id)? {
            (
                Write::DeleteShortlist {
                    user_id: caller.user_id.clone(),
                    property_id: property_id.clone(),
                },
                ShortlistAction::Removed,
            )
        } else {
            (
                Write::InsertShortlist(ShortlistEntry {
                    user_id: caller.user_id.clone(),
                    property_id: property_id.clone(),
                    created_at: Utc::now(),
                }),
                ShortlistAction::Added,
            )
        };

        self.repository
            .commit(vec![write])
            .map_err(storage_failure("toggle_shortlist"))?;
        Ok(action)
    }

    /// The caller's shortlisted listings, most recently added first. Entries
    /// whose listing has since left APPROVED stay stored but are not shown.
    pub fn shortlist(&self, caller: &Caller) -> Result<Vec<ListingCard>, MarketplaceError> {
        let mut entries = self.repository.shortlist(&caller.user_id)?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut properties = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(property) = self.repository.property(&entry.property_id)? {
                if visible_to(&property, Some(caller)) {
                    properties.push(property);
                }
            }
        }

        self.cards(Some(caller), properties)
    }

    pub fn dashboard(&self, caller: &Caller) -> Result<Dashboard, MarketplaceError> {
        let user = self
            .repository
            .user(&caller.user_id)?
            .ok_or(MarketplaceError::NotFound("user"))?;
        let kyc_profile = self.repository.kyc_profile_for_user(&caller.user_id)?;

        let mut owned = self
            .repository
            .properties(&PropertyFilter::owned_by(caller.user_id.clone()))?;
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut listings = Vec::with_capacity(owned.len());
        for card in self.cards(Some(caller), owned)? {
            let proposal_status = self
                .repository
                .property_update_for(&card.property.id)?
                .map(|update| update.review.status);
            listings.push(DashboardListing {
                card,
                proposal_status,
            });
        }

        Ok(Dashboard {
            user,
            kyc_profile,
            listings,
        })
    }

    fn is_shortlisted(
        &self,
        caller: &Caller,
        property_id: &PropertyId,
    ) -> Result<bool, MarketplaceError> {
        Ok(self
            .repository
            .shortlist(&caller.user_id)?
            .iter()
            .any(|entry| &entry.property_id == property_id))
    }

    fn cards(
        &self,
        viewer: Option<&Caller>,
        properties: Vec<Property>,
    ) -> Result<Vec<ListingCard>, MarketplaceError> {
        let shortlisted: Vec<PropertyId> = match viewer {
            Some(caller) => self
                .repository
                .shortlist(&caller.user_id)?
                .into_iter()
                .map(|entry| entry.property_id)
                .collect(),
            None => Vec::new(),
        };

        properties
            .into_iter()
            .map(|property| -> Result<ListingCard, MarketplaceError> {
                let images = self
                    .repository
                    .images(&property.id)?
                    .into_iter()
                    .map(|image| image.url)
                    .collect();
                Ok(ListingCard {
                    shortlisted: shortlisted.contains(&property.id),
                    property,
                    images,
                })
            })
            .collect()
    }
}

/// APPROVED listings are public; anything else is limited to its owner and
/// moderators.
fn visible_to(property: &Property, viewer: Option<&Caller>) -> bool {
    property.is_public()
        || viewer.is_some_and(|caller| {
            caller.user_id == property.owner_id || caller.can_moderate()
        })
}
