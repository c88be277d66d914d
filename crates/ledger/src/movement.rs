use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MovementId, ProductId, UserId};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Goods received; increases stock.
    In,
    /// Goods issued; decreases stock.
    Out,
}

impl MovementType {
    /// Returns the wire/storage token (`"in"` or `"out"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a movement type token is neither `in` nor `out`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMovementTypeError {
    pub token: String,
}

impl std::fmt::Display for ParseMovementTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid movement type '{}', must be 'in' or 'out'",
            self.token
        )
    }
}

impl std::error::Error for ParseMovementTypeError {}

impl FromStr for MovementType {
    type Err = ParseMovementTypeError;

    /// Matching is exact: `"IN"` or `" in"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementType::In),
            "out" => Ok(MovementType::Out),
            other => Err(ParseMovementTypeError {
                token: other.to_string(),
            }),
        }
    }
}

/// A product as seen by the ledger: identity plus its live stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: i64,
    /// Quantity on hand. Never negative.
    pub stock: i64,
    /// Bumped on every stock write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Data needed to register a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category_id: i64,
    /// Stock on hand at registration. After this, only movements change it.
    pub opening_stock: i64,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, category_id: i64, opening_stock: i64) -> Self {
        Self {
            name: name.into(),
            category_id,
            opening_stock,
        }
    }
}

/// An immutable ledger entry recording one stock change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// A movement about to be appended; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_parses_exact_tokens() {
        assert_eq!("in".parse::<MovementType>().unwrap(), MovementType::In);
        assert_eq!("out".parse::<MovementType>().unwrap(), MovementType::Out);

        for bad in ["IN", "Out", " in", "inout", ""] {
            let err = bad.parse::<MovementType>().unwrap_err();
            assert_eq!(err.token, bad);
        }
    }

    #[test]
    fn movement_type_display_matches_storage_token() {
        assert_eq!(MovementType::In.to_string(), "in");
        assert_eq!(MovementType::Out.as_str(), "out");
    }

    #[test]
    fn movement_serializes_type_field() {
        let movement = StockMovement {
            id: MovementId::new(1),
            product_id: ProductId::new(2),
            user_id: UserId::new(3),
            movement_type: MovementType::Out,
            quantity: 4,
            note: "sold".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&movement).unwrap();
        assert_eq!(json["type"], "out");
        assert_eq!(json["product_id"], 2);
        assert_eq!(json["user_id"], 3);
    }
}
