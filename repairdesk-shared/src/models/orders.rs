use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Lifecycle state of a repair order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    OnGoing,
    Pending,
    Completed,
    Cancelled,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnGoing => "ON_GOING",
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Completed and rejected orders can no longer change.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "ON_GOING" => Ok(Self::OnGoing),
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err("unknown order status"),
        }
    }
}

/// A single appliance line on an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub id: i64,
    pub order_name: String,
    #[serde(default)]
    pub order_details: String,
    pub quantity: u32,
    /// Decimal rendered as text by the backend.
    pub price: String,
    #[serde(default)]
    pub images: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub customer: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    pub total_price: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Staff status change sent with `PATCH orders/<id>/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Staff price change sent with `PATCH orders/<id>/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateOrderPriceRequest {
    pub total_price: String,
}

/// Admin summary returned by `GET orders/reports/`.
///
/// The backend labels the totals in Nepali; the field names here are the
/// English equivalents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderReport {
    #[serde(rename = "कुल अर्डर")]
    pub total_orders: u64,
    #[serde(rename = "पूरा भएको")]
    pub completed: u64,
    #[serde(rename = "अस्वीकृत")]
    pub rejected: u64,
    #[serde(rename = "प्रक्रियामा")]
    pub pending: u64,
    /// Sum of `total_price` over completed orders.
    #[serde(rename = "जम्मा आम्दानी", deserialize_with = "amount")]
    pub total_revenue: f64,
}

/// Decimal totals arrive as a JSON number or as text depending on the renderer.
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(value) => Ok(value),
        Amount::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
