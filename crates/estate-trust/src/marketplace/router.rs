use std::sync::Arc;

use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Caller, Decision, KycProfileId, ListingFields, PropertyId, PropertyType, PropertyUpdateId,
    UploadedFile,
};
use super::identity::Registration;
use super::kyc::KycSubmission;
use super::listings::SearchQuery;
use super::moderation::DEFAULT_HISTORY_LIMIT;
use super::repository::MarketplaceRepository;
use super::service::{Marketplace, MarketplaceError};
use super::storage::ObjectStorage;
use super::validation::ValidationError;

type Shared<R, S> = State<Arc<Marketplace<R, S>>>;

/// Router builder exposing the marketplace JSON API under `/api/v1`.
pub fn marketplace_router<R, S>(marketplace: Arc<Marketplace<R, S>>) -> Router
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    Router::new()
        .route("/api/v1/users", post(register_handler::<R, S>))
        .route(
            "/api/v1/sessions",
            post(login_handler::<R, S>).delete(logout_handler::<R, S>),
        )
        .route(
            "/api/v1/properties",
            get(search_handler::<R, S>).post(create_listing_handler::<R, S>),
        )
        .route("/api/v1/properties/:id", get(view_listing_handler::<R, S>))
        .route(
            "/api/v1/properties/:id/proposal",
            put(propose_update_handler::<R, S>),
        )
        .route(
            "/api/v1/properties/:id/shortlist",
            post(toggle_shortlist_handler::<R, S>),
        )
        .route("/api/v1/me/dashboard", get(dashboard_handler::<R, S>))
        .route("/api/v1/me/shortlist", get(shortlist_handler::<R, S>))
        .route("/api/v1/kyc", post(submit_kyc_handler::<R, S>))
        .route("/api/v1/moderation/queue", get(queue_handler::<R, S>))
        .route("/api/v1/moderation/history", get(history_handler::<R, S>))
        .route(
            "/api/v1/moderation/properties/:id",
            post(decide_listing_handler::<R, S>),
        )
        .route(
            "/api/v1/moderation/kyc/:id",
            post(decide_kyc_handler::<R, S>),
        )
        .route(
            "/api/v1/moderation/updates/:id",
            post(decide_update_handler::<R, S>),
        )
        .with_state(marketplace)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    identifier: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    decision: Decision,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn require_caller<R, S>(
    marketplace: &Marketplace<R, S>,
    headers: &HeaderMap,
) -> Result<Caller, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let token = bearer_token(headers).ok_or(MarketplaceError::Unauthorized)?;
    marketplace.identity.resolve_session(token)
}

/// Anonymous when no token is sent; a stale token is still rejected.
fn optional_caller<R, S>(
    marketplace: &Marketplace<R, S>,
    headers: &HeaderMap,
) -> Result<Option<Caller>, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    match bearer_token(headers) {
        Some(token) => marketplace.identity.resolve_session(token).map(Some),
        None => Ok(None),
    }
}

pub(crate) async fn register_handler<R, S>(
    State(marketplace): Shared<R, S>,
    Json(registration): Json<Registration>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let user = marketplace.identity.register(registration)?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub(crate) async fn login_handler<R, S>(
    State(marketplace): Shared<R, S>,
    Json(login): Json<LoginRequest>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let grant = marketplace
        .identity
        .authenticate(&login.identifier, &login.password)?;
    Ok((StatusCode::CREATED, Json(grant)).into_response())
}

pub(crate) async fn logout_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let token = bearer_token(&headers).ok_or(MarketplaceError::Unauthorized)?;
    if marketplace.identity.end_session(token)? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(MarketplaceError::Unauthorized)
    }
}

pub(crate) async fn search_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let viewer = optional_caller(&marketplace, &headers)?;
    let results = marketplace.listings.search(viewer.as_ref(), &query)?;
    Ok(Json(json!({ "count": results.len(), "properties": results })).into_response())
}

pub(crate) async fn create_listing_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;

    let mut form = ListingForm::default();
    let mut images = Vec::new();
    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => images.push(read_file(field).await?),
            "title" => form.title = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "price" => form.price = Some(read_text(field).await?),
            "area" => form.area = Some(read_text(field).await?),
            "type" => form.property_type = Some(read_text(field).await?),
            "address" => form.address = Some(read_text(field).await?),
            _ => {}
        }
    }

    let detail = marketplace
        .listings
        .create_listing(&caller, form.into_fields()?, images)?;
    Ok((StatusCode::CREATED, Json(detail)).into_response())
}

pub(crate) async fn view_listing_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let viewer = optional_caller(&marketplace, &headers)?;
    let detail = marketplace
        .listings
        .view_listing(viewer.as_ref(), &PropertyId(property_id))?;
    Ok(Json(detail).into_response())
}

pub(crate) async fn propose_update_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(fields): Json<ListingFields>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    let outcome =
        marketplace
            .listings
            .propose_listing_update(&caller, &PropertyId(property_id), fields)?;
    Ok((StatusCode::ACCEPTED, Json(outcome)).into_response())
}

pub(crate) async fn toggle_shortlist_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    let action = marketplace
        .listings
        .toggle_shortlist(&caller, &PropertyId(property_id))?;
    Ok(Json(json!({ "action": action })).into_response())
}

pub(crate) async fn dashboard_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    Ok(Json(marketplace.listings.dashboard(&caller)?).into_response())
}

pub(crate) async fn shortlist_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    let properties = marketplace.listings.shortlist(&caller)?;
    Ok(Json(json!({ "count": properties.len(), "properties": properties })).into_response())
}

pub(crate) async fn submit_kyc_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;

    let mut submission = KycSubmission {
        full_name: String::new(),
        email: String::new(),
        government_id_type: String::new(),
    };
    let mut document = None;
    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "document" => document = Some(read_file(field).await?),
            "full_name" => submission.full_name = read_text(field).await?,
            "email" => submission.email = read_text(field).await?,
            "government_id_type" => submission.government_id_type = read_text(field).await?,
            _ => {}
        }
    }

    let profile = marketplace.kyc.submit_kyc(&caller, submission, document)?;
    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

pub(crate) async fn queue_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    Ok(Json(marketplace.moderation.queue(&caller)?).into_response())
}

pub(crate) async fn history_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(marketplace.moderation.history(&caller, limit)?).into_response())
}

pub(crate) async fn decide_listing_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    let property = marketplace.moderation.decide_listing(
        &caller,
        &PropertyId(property_id),
        request.decision,
        request.reason.as_deref(),
    )?;
    Ok(Json(property).into_response())
}

pub(crate) async fn decide_kyc_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Path(profile_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    let profile = marketplace.moderation.decide_kyc(
        &caller,
        &KycProfileId(profile_id),
        request.decision,
        request.reason.as_deref(),
    )?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn decide_update_handler<R, S>(
    State(marketplace): Shared<R, S>,
    headers: HeaderMap,
    Path(update_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
    S: ObjectStorage + 'static,
{
    let caller = require_caller(&marketplace, &headers)?;
    let update = marketplace.moderation.decide_listing_update(
        &caller,
        &PropertyUpdateId(update_id),
        request.decision,
        request.reason.as_deref(),
    )?;
    Ok(Json(update).into_response())
}

/// Text parts of the listing form before they are checked.
#[derive(Debug, Default)]
struct ListingForm {
    title: Option<String>,
    description: Option<String>,
    price: Option<String>,
    area: Option<String>,
    property_type: Option<String>,
    address: Option<String>,
}

impl ListingForm {
    fn into_fields(self) -> Result<ListingFields, ValidationError> {
        let price = self
            .price
            .as_deref()
            .map(str::trim)
            .and_then(|price| price.parse::<u64>().ok())
            .ok_or_else(|| ValidationError::new("price", "Price must be positive"))?;
        let area = self
            .area
            .as_deref()
            .map(str::trim)
            .and_then(|area| area.parse::<u32>().ok())
            .ok_or_else(|| ValidationError::new("area", "Area must be positive"))?;
        let property_type = self
            .property_type
            .as_deref()
            .and_then(PropertyType::parse)
            .ok_or_else(|| {
                ValidationError::new(
                    "type",
                    "Type must be one of HOUSE, APARTMENT, LAND, COMMERCIAL",
                )
            })?;

        Ok(ListingFields {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            price,
            area,
            property_type,
            address: self.address.unwrap_or_default(),
        })
    }
}

fn malformed(err: axum::extract::multipart::MultipartError) -> MarketplaceError {
    ValidationError::new("multipart", err.body_text()).into()
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, MarketplaceError> {
    multipart.next_field().await.map_err(malformed)
}

async fn read_text(field: Field<'_>) -> Result<String, MarketplaceError> {
    field.text().await.map_err(malformed)
}

async fn read_file(field: Field<'_>) -> Result<UploadedFile, MarketplaceError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(malformed)?;

    let file = UploadedFile::new(file_name, bytes.to_vec());
    Ok(match content_type {
        Some(content_type) => file.with_content_type(content_type),
        None => file,
    })
}
