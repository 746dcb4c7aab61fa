use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use bidhub_db::encode_timestamp;
use bidhub_db::models::NewListing;
use bidhub_types::api::{CategoryOption, Claims, CreateListingRequest, ListingResponse};
use bidhub_types::models::{Category, Listing};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::images::{ImagePreset, UploadedImage};
use crate::listing_rules::{ValidListing, validate_listing};
use crate::state::AppState;

const MAX_SLUG_STEM_LEN: usize = 60;

/// Validate a draft, upload its images and store it for `owner_id`.
///
/// Nothing is uploaded or written unless the whole draft is valid and the
/// category exists.
pub async fn publish_listing(
    state: &AppState,
    owner_id: Uuid,
    draft: &CreateListingRequest,
) -> Result<ListingResponse, ApiError> {
    let valid = validate_listing(draft, state.clock.now())?;

    let st = state.clone();
    let category_id = valid.category_id.to_string();
    let breadcrumbs = blocking(move || -> anyhow::Result<_> {
        if st.db.get_category(&category_id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(st.db.category_path(&category_id)?))
    })
    .await?
    .ok_or(ApiError::NotFound("category"))?;

    let (images, thumbnail) = upload_images(state, &valid).await?;

    let id = Uuid::new_v4();
    let created_at = state.clock.now();
    let listing = Listing {
        id,
        slug: make_slug(&valid.title, id),
        owner_id,
        category_id: valid.category_id,
        title: valid.title,
        description: valid.description,
        item_name: valid.item_name,
        quantity: valid.quantity,
        pricing_mode: valid.pricing_mode,
        buy_it_now_price: valid.buy_it_now_price,
        starting_bid: valid.starting_bid,
        reserve_price: valid.reserve_price,
        min_bid_increment: valid.min_bid_increment,
        end_time: valid.end_time,
        thumbnail_url: thumbnail.map(|t| t.url),
        images: images.into_iter().map(|i| i.url).collect(),
        created_at,
    };

    let st = state.clone();
    let row = new_listing_row(&listing);
    blocking(move || st.db.create_listing(&row)).await?;

    info!("Listing {} created by {}", listing.slug, owner_id);

    Ok(ListingResponse {
        listing,
        breadcrumbs: breadcrumbs
            .into_iter()
            .map(|c| c.into_category())
            .collect::<anyhow::Result<Vec<Category>>>()?,
    })
}

/// Every image with the listing preset, then the first one again as the thumbnail.
async fn upload_images(
    state: &AppState,
    valid: &ValidListing,
) -> Result<(Vec<UploadedImage>, Option<UploadedImage>), ApiError> {
    let mut uploaded = Vec::with_capacity(valid.images.len());
    for image in &valid.images {
        let stored = state
            .images
            .upload(&image.bytes, ImagePreset::Listing)
            .await
            .map_err(|e| {
                error!("Image upload failed for {}: {:#}", image.filename, e);
                ApiError::Dependency(e)
            })?;
        uploaded.push(stored);
    }

    let thumbnail = match valid.thumbnail_source() {
        Some(source) => Some(
            state
                .images
                .upload(&source.bytes, ImagePreset::ListingThumbnail)
                .await
                .map_err(|e| {
                    error!("Thumbnail upload failed for {}: {:#}", source.filename, e);
                    ApiError::Dependency(e)
                })?,
        ),
        None => None,
    };

    Ok((uploaded, thumbnail))
}

fn new_listing_row(listing: &Listing) -> NewListing {
    NewListing {
        id: listing.id.to_string(),
        slug: listing.slug.clone(),
        owner_id: listing.owner_id.to_string(),
        category_id: listing.category_id.to_string(),
        title: listing.title.clone(),
        description: listing.description.clone(),
        item_name: listing.item_name.clone(),
        quantity: i64::from(listing.quantity),
        buy_it_now_price: listing.buy_it_now_price,
        starting_bid: listing.starting_bid,
        reserve_price: listing.reserve_price,
        min_bid_increment: listing.min_bid_increment,
        end_time: listing.end_time.map(encode_timestamp),
        thumbnail_url: listing.thumbnail_url.clone(),
        images: listing.images.clone(),
        created_at: encode_timestamp(listing.created_at),
    }
}

/// URL slug: the title in lowercase ASCII words joined by dashes, plus a
/// short suffix from the listing id so equal titles stay distinct.
pub fn make_slug(title: &str, id: Uuid) -> String {
    let mut stem = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('-') {
            stem.push('-');
        }
    }
    stem.truncate(MAX_SLUG_STEM_LEN);
    let stem = stem.trim_end_matches('-');
    let stem = if stem.is_empty() { "listing" } else { stem };

    let suffix = id.simple().to_string();
    format!("{}-{}", stem, &suffix[..8])
}

// -- Handlers --

/// POST /listings
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = publish_listing(&state, claims.sub, &req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /listings/{slug}
pub async fn get_listing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let (row, path) = blocking(move || -> anyhow::Result<_> {
        let Some(row) = st.db.get_listing_by_slug(&slug)? else {
            return Ok((None, Vec::new()));
        };
        let path = st.db.category_path(&row.category_id)?;
        Ok((Some(row), path))
    })
    .await?;

    let row = row.ok_or(ApiError::NotFound("listing"))?;
    Ok(Json(ListingResponse {
        listing: row.into_listing()?,
        breadcrumbs: path
            .into_iter()
            .map(|c| c.into_category())
            .collect::<anyhow::Result<Vec<Category>>>()?,
    }))
}

/// GET /categories
///
/// Dropdown options for the listing form.
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let rows = blocking(move || st.db.list_categories()).await?;

    let options = rows
        .into_iter()
        .map(|row| {
            let category = row.into_category()?;
            Ok(CategoryOption {
                value: category.id,
                label: category.name,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(options))
}
