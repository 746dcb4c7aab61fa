use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Category, Listing};

// -- JWT Claims --

/// JWT claims issued on register, login and password reset, checked by the
/// auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Honeypot field, left empty by real browsers.
    #[serde(default, rename = "name__confirm")]
    pub honeypot: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Password reset --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
    #[serde(default, rename = "name__confirm")]
    pub honeypot: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenStatus {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

// -- Users --

/// Profile edit; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditProfileRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// New avatar image, stored with the avatar preset.
    pub avatar: Option<ImageUploadRequest>,
}

// -- Listings --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageUploadRequest {
    pub filename: String,
    pub content_type: String,
    /// Base64-encoded file contents.
    pub data: String,
}

/// A whole-number field as it arrived. Decimals, strings and other JSON
/// values are kept as `Other` so they can be reported as field errors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireInt {
    Int(i64),
    Other(serde_json::Value),
}

impl WireInt {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Other(_) => None,
        }
    }
}

impl From<i64> for WireInt {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// Listing draft as submitted by the seller. Every field is optional on the
/// wire, and numbers are loosely typed, so that missing or malformed values
/// surface as field errors instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub item_name: Option<String>,
    pub category_id: Option<String>,
    pub quantity: Option<WireInt>,
    pub buy_it_now_price: Option<WireInt>,
    pub starting_bid: Option<WireInt>,
    pub reserve_price: Option<WireInt>,
    pub min_bid_increment: Option<WireInt>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageUploadRequest>,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    #[serde(flatten)]
    pub listing: Listing,
    /// Root-first category path for breadcrumbs.
    pub breadcrumbs: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct CategoryOption {
    pub value: Uuid,
    pub label: String,
}

// -- Errors --

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrorBody {
    pub field: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldErrorBody>,
}
