use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
}

/// Whether a listing sells at a fixed price, by auction, or offers both.
/// Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    FixedPrice,
    Auction,
    AuctionWithBuyItNow,
}

impl PricingMode {
    pub fn from_prices(buy_it_now_price: Option<i64>, starting_bid: Option<i64>) -> Option<Self> {
        match (buy_it_now_price, starting_bid) {
            (Some(_), None) => Some(Self::FixedPrice),
            (None, Some(_)) => Some(Self::Auction),
            (Some(_), Some(_)) => Some(Self::AuctionWithBuyItNow),
            (None, None) => None,
        }
    }
}

/// A persisted listing. Amounts are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub slug: String,
    pub owner_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub item_name: String,
    pub quantity: u32,
    pub pricing_mode: PricingMode,
    pub buy_it_now_price: Option<i64>,
    pub starting_bid: Option<i64>,
    pub reserve_price: Option<i64>,
    pub min_bid_increment: Option<i64>,
    pub end_time: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}
