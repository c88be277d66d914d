use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::{MovementType, ProductId, StockMovement, UserId};

/// A calendar month bucket, always evaluated in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Creates a month, returning `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Returns the following calendar month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First instant of the month (inclusive lower bound).
    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// First instant of the next month (exclusive upper bound).
    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    /// Returns true if `timestamp` falls within this month.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start() && timestamp < self.end()
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Error returned for a month token that is not `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMonthError {
    pub token: String,
}

impl std::fmt::Display for ParseMonthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid month '{}', expected YYYY-MM", self.token)
    }
}

impl std::error::Error for ParseMonthError {}

impl FromStr for Month {
    type Err = ParseMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMonthError {
            token: s.to_string(),
        };

        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(err());
        }
        let (year, month) = (&s[..4], &s[5..]);
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        Month::new(year, month).ok_or_else(err)
    }
}

/// Filters for a ledger scan.
///
/// Every field is optional and present fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementQuery {
    /// Only movements created in this UTC month.
    pub month: Option<Month>,

    /// Only movements recorded by this user.
    pub user_id: Option<UserId>,

    /// Only movements against this product.
    pub product_id: Option<ProductId>,

    /// Only movements in this direction.
    pub movement_type: Option<MovementType>,
}

impl MovementQuery {
    /// Creates a query that matches every movement.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn month(mut self, month: Month) -> Self {
        self.month = Some(month);
        self
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn product_id(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn movement_type(mut self, movement_type: MovementType) -> Self {
        self.movement_type = Some(movement_type);
        self
    }

    /// Evaluates the query against a single movement.
    pub fn matches(&self, movement: &StockMovement) -> bool {
        if let Some(month) = self.month
            && !month.contains(movement.created_at)
        {
            return false;
        }
        if let Some(user_id) = self.user_id
            && movement.user_id != user_id
        {
            return false;
        }
        if let Some(product_id) = self.product_id
            && movement.product_id != product_id
        {
            return false;
        }
        if let Some(movement_type) = self.movement_type
            && movement.movement_type != movement_type
        {
            return false;
        }
        true
    }
}
