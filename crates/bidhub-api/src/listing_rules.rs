//! Listing draft validation.
//!
//! Turns a submitted [`CreateListingRequest`] into a [`ValidListing`] or the
//! full list of field errors. Pure: no storage, no uploads, the current time
//! is passed in.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bidhub_types::api::{CreateListingRequest, ImageUploadRequest, WireInt};
use bidhub_types::models::PricingMode;

use crate::images::{ImageKind, MAX_IMAGE_SIZE};
use crate::validation::{FieldErrorKind, ValidationErrors, optional_text, required_text};

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_ITEM_NAME_LEN: usize = 100;
pub const MAX_CATEGORY_ID_LEN: usize = 100;

pub const DEFAULT_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 100;

// Amounts are minor currency units.
pub const MAX_BUY_IT_NOW_PRICE: i64 = 10_000_000;
pub const MAX_STARTING_BID: i64 = 100_000;
pub const MAX_RESERVE_PRICE: i64 = 100_000;
pub const MAX_MIN_BID_INCREMENT: i64 = 100;

const MISSING_PRICE: &str = "Either Buy It Now Price or Starting Price must be specified.";

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub filename: String,
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

/// A listing draft that passed every rule, normalized for persistence.
#[derive(Debug, Clone)]
pub struct ValidListing {
    pub title: String,
    pub description: String,
    pub item_name: String,
    pub category_id: Uuid,
    pub quantity: u32,
    pub pricing_mode: PricingMode,
    pub buy_it_now_price: Option<i64>,
    pub starting_bid: Option<i64>,
    pub reserve_price: Option<i64>,
    pub min_bid_increment: Option<i64>,
    pub end_time: Option<DateTime<Utc>>,
    pub images: Vec<ImageFile>,
}

impl ValidListing {
    /// The image the thumbnail is generated from.
    pub fn thumbnail_source(&self) -> Option<&ImageFile> {
        self.images.first()
    }
}

pub fn validate_listing(
    draft: &CreateListingRequest,
    now: DateTime<Utc>,
) -> Result<ValidListing, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = required_text(
        &mut errors,
        "title",
        draft.title.as_deref(),
        MAX_TITLE_LEN,
        "Please enter a title",
    );
    let description = required_text(
        &mut errors,
        "description",
        draft.description.as_deref(),
        MAX_DESCRIPTION_LEN,
        "Please enter a description",
    );
    let item_name = required_text(
        &mut errors,
        "item_name",
        draft.item_name.as_deref(),
        MAX_ITEM_NAME_LEN,
        "Please enter an item name",
    );
    let category_id = required_text(
        &mut errors,
        "category_id",
        draft.category_id.as_deref(),
        MAX_CATEGORY_ID_LEN,
        "Please select a category",
    )
    .and_then(|raw| match Uuid::parse_str(&raw) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push("category_id", FieldErrorKind::Invalid, "Unknown category");
            None
        }
    });

    let quantity = check_quantity(&mut errors, draft.quantity.as_ref());

    let buy_it_now_price = check_amount(
        &mut errors,
        "buy_it_now_price",
        draft.buy_it_now_price.as_ref(),
        MAX_BUY_IT_NOW_PRICE,
    );
    let starting_bid = check_amount(&mut errors, "starting_bid", draft.starting_bid.as_ref(), MAX_STARTING_BID);
    let reserve_price =
        check_amount(
        &mut errors,
        "reserve_price",
        draft.reserve_price.as_ref(),
        MAX_RESERVE_PRICE,
    );
    let min_bid_increment = check_amount(
        &mut errors,
        "min_bid_increment",
        draft.min_bid_increment.as_ref(),
        MAX_MIN_BID_INCREMENT,
    );

    // Presence, not validity: an out-of-range price already has its own error.
    if draft.buy_it_now_price.is_none() && draft.starting_bid.is_none() {
        errors.push("buy_it_now_price", FieldErrorKind::MissingPrice, MISSING_PRICE);
        errors.push("starting_bid", FieldErrorKind::MissingPrice, MISSING_PRICE);
    }

    let end_time = check_end_time(&mut errors, draft.end_time.as_deref(), now);

    let images: Vec<ImageFile> = draft
        .images
        .iter()
        .enumerate()
        .filter_map(|(index, upload)| check_image(&mut errors, format!("images[{index}]"), upload))
        .collect();

    let (
        true,
        Some(title),
        Some(description),
        Some(item_name),
        Some(category_id),
        Some(quantity),
        Some(pricing_mode),
    ) = (
        errors.is_empty(),
        title,
        description,
        item_name,
        category_id,
        quantity,
        PricingMode::from_prices(buy_it_now_price, starting_bid),
    )
    else {
        return Err(errors);
    };

    Ok(ValidListing {
        title,
        description,
        item_name,
        category_id,
        quantity,
        pricing_mode,
        buy_it_now_price,
        starting_bid,
        reserve_price,
        min_bid_increment,
        end_time,
        images,
    })
}

fn check_quantity(errors: &mut ValidationErrors, quantity: Option<&WireInt>) -> Option<u32> {
    let quantity = match quantity {
        None => DEFAULT_QUANTITY,
        Some(raw) => whole_number(errors, "quantity", raw)?,
    };
    if quantity < 1 {
        errors.push("quantity", FieldErrorKind::NotPositive, "Quantity must be at least 1");
        return None;
    }
    if quantity > MAX_QUANTITY {
        errors.push(
            "quantity",
            FieldErrorKind::OutOfRange,
            format!("Quantity must be at most {MAX_QUANTITY}"),
        );
        return None;
    }
    u32::try_from(quantity).ok()
}

/// Absent amounts stay absent; present ones must be whole numbers in `1..=max`.
fn check_amount(
    errors: &mut ValidationErrors,
    field: &str,
    amount: Option<&WireInt>,
    max: i64,
) -> Option<i64> {
    let amount = whole_number(errors, field, amount?)?;
    if amount <= 0 {
        errors.push(field, FieldErrorKind::NotPositive, "Must be greater than zero");
        return None;
    }
    if amount > max {
        errors.push(field, FieldErrorKind::OutOfRange, format!("Must be at most {max}"));
        return None;
    }
    Some(amount)
}

fn whole_number(errors: &mut ValidationErrors, field: &str, raw: &WireInt) -> Option<i64> {
    let number = raw.as_int();
    if number.is_none() {
        errors.push(field, FieldErrorKind::Invalid, "Must be a whole number");
    }
    number
}

fn check_end_time(
    errors: &mut ValidationErrors,
    raw: Option<&str>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let raw = optional_text(errors, "end_time", raw, 64)?;
    let Ok(end_time) = DateTime::parse_from_rfc3339(&raw) else {
        errors.push("end_time", FieldErrorKind::Invalid, "End time is not a valid date");
        return None;
    };
    let end_time = end_time.with_timezone(&Utc);
    if end_time <= now {
        errors.push("end_time", FieldErrorKind::Invalid, "End time must be in the future");
        return None;
    }
    Some(end_time)
}

/// Decode a base64 upload and check its size and type. Shared with avatar
/// uploads.
pub fn check_image(
    errors: &mut ValidationErrors,
    field: String,
    upload: &ImageUploadRequest,
) -> Option<ImageFile> {
    let Ok(bytes) = B64.decode(upload.data.trim()) else {
        errors.push(field, FieldErrorKind::Invalid, "Image data is not valid base64");
        return None;
    };
    if bytes.is_empty() {
        errors.push(field, FieldErrorKind::Required, "Image is empty");
        return None;
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        errors.push(field, FieldErrorKind::OutOfRange, "Image must be 5 MiB or smaller");
        return None;
    }

    let declared = ImageKind::from_content_type(&upload.content_type);
    let actual = ImageKind::sniff(&bytes);
    match (declared, actual) {
        (Some(declared), Some(actual)) if declared == actual => Some(ImageFile {
            filename: upload.filename.clone(),
            kind: actual,
            bytes,
        }),
        _ => {
            errors.push(
                field,
                FieldErrorKind::Invalid,
                "Only JPEG, PNG, GIF and WebP images are accepted",
            );
            None
        }
    }
}
