//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the bidhub-types models so the DB layer stays independent.

use anyhow::{Result, anyhow};
use bidhub_types::models::{Account, Category, Listing, PricingMode};
use uuid::Uuid;

use crate::decode_timestamp;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn into_account(self) -> Result<Account> {
        Ok(Account {
            id: Uuid::parse_str(&self.id)?,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar_url: self.avatar_url,
            created_at: decode_timestamp(&self.created_at)?,
        })
    }
}

/// Profile fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResetTokenRow {
    pub token: String,
    pub email: String,
    pub expires_at: String,
    pub created_at: String,
}

pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<String>,
}

impl CategoryRow {
    pub fn into_category(self) -> Result<Category> {
        Ok(Category {
            id: Uuid::parse_str(&self.id)?,
            name: self.name,
            slug: self.slug,
            parent_id: self.parent_id.as_deref().map(Uuid::parse_str).transpose()?,
        })
    }
}

/// Everything needed to insert a listing and its images in one go.
pub struct NewListing {
    pub id: String,
    pub slug: String,
    pub owner_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub item_name: String,
    pub quantity: i64,
    pub buy_it_now_price: Option<i64>,
    pub starting_bid: Option<i64>,
    pub reserve_price: Option<i64>,
    pub min_bid_increment: Option<i64>,
    pub end_time: Option<String>,
    pub thumbnail_url: Option<String>,
    pub images: Vec<String>,
    pub created_at: String,
}

pub struct ListingRow {
    pub id: String,
    pub slug: String,
    pub owner_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub item_name: String,
    pub quantity: i64,
    pub buy_it_now_price: Option<i64>,
    pub starting_bid: Option<i64>,
    pub reserve_price: Option<i64>,
    pub min_bid_increment: Option<i64>,
    pub end_time: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: String,
    pub images: Vec<String>,
}

impl ListingRow {
    pub fn into_listing(self) -> Result<Listing> {
        let pricing_mode = PricingMode::from_prices(self.buy_it_now_price, self.starting_bid)
            .ok_or_else(|| anyhow!("Listing {} has neither a price nor a starting bid", self.id))?;

        Ok(Listing {
            id: Uuid::parse_str(&self.id)?,
            slug: self.slug,
            owner_id: Uuid::parse_str(&self.owner_id)?,
            category_id: Uuid::parse_str(&self.category_id)?,
            title: self.title,
            description: self.description,
            item_name: self.item_name,
            quantity: u32::try_from(self.quantity)?,
            pricing_mode,
            buy_it_now_price: self.buy_it_now_price,
            starting_bid: self.starting_bid,
            reserve_price: self.reserve_price,
            min_bid_increment: self.min_bid_increment,
            end_time: self.end_time.as_deref().map(decode_timestamp).transpose()?,
            thumbnail_url: self.thumbnail_url,
            images: self.images,
            created_at: decode_timestamp(&self.created_at)?,
        })
    }
}
