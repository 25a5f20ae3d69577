// 1.0: all the primitives live here. nothing in the ledger works without these types.
// IDs, money, prices, leverage, rates, timestamps. each is a newtype so the compiler catches mixups.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WithdrawalId(pub u64);

// wallet that funded the account. owned by the custody side, opaque here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct-{}", self.0)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wd-{}", self.0)
    }
}

// 1.1: leverage tier chosen at account creation. closed set, nothing else gets in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LeverageTier {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl LeverageTier {
    pub const ALL: [LeverageTier; 3] = [
        LeverageTier::Conservative,
        LeverageTier::Moderate,
        LeverageTier::Aggressive,
    ];

    pub fn multiplier(&self) -> u8 {
        match self {
            LeverageTier::Conservative => 2,
            LeverageTier::Moderate => 3,
            LeverageTier::Aggressive => 5,
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.multiplier())
    }
}

impl TryFrom<u8> for LeverageTier {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(LeverageTier::Conservative),
            3 => Ok(LeverageTier::Moderate),
            5 => Ok(LeverageTier::Aggressive),
            other => Err(other),
        }
    }
}

impl From<LeverageTier> for u8 {
    fn from(tier: LeverageTier) -> Self {
        tier.multiplier()
    }
}

impl fmt::Display for LeverageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

// 1.2: price in quote currency per unit of asset. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: quote currency amount. capital, balances, pnl, fees all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: Quote) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0 - other.0)
    }

    // only for factors <= 1 (rates, percentages); anything that can grow uses checked_mul
    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn checked_mul(&self, factor: Decimal) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    pub fn checked_add(&self, other: Quote) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    // the one place stored money gets rounded. banker's rounding, once, at write time.
    pub fn round_to(&self, scale: u32) -> Self {
        Self(self.0.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven))
    }

    // for caller-facing maxima: never report more than is actually allowed
    pub fn floor_to(&self, scale: u32) -> Self {
        Self(self.0.round_dp_with_strategy(scale, RoundingStrategy::ToZero))
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quote> for Quote {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.4: per-trade leverage multiplier. must be >= 1x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leverage(Decimal);

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ONE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.5: basis points. 100 bps = 1%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bps(u32);

impl Bps {
    pub fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(i64::from(self.0), 4)
    }
}

// 1.6: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

pub const MILLIS_PER_DAY: i64 = 86_400_000;

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + days * MILLIS_PER_DAY)
    }

    // whole days elapsed from `earlier` to self. a clock that went backwards counts as zero.
    pub fn whole_days_since(&self, earlier: Timestamp) -> i64 {
        ((self.0 - earlier.0) / MILLIS_PER_DAY).max(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn leverage_tier_closed_set() {
        assert_eq!(LeverageTier::try_from(2), Ok(LeverageTier::Conservative));
        assert_eq!(LeverageTier::try_from(3), Ok(LeverageTier::Moderate));
        assert_eq!(LeverageTier::try_from(5), Ok(LeverageTier::Aggressive));
        assert_eq!(LeverageTier::try_from(4), Err(4));
        assert_eq!(LeverageTier::try_from(10), Err(10));
        assert_eq!(LeverageTier::default(), LeverageTier::Moderate);
    }

    #[test]
    fn leverage_tier_serde_as_number() {
        let json = serde_json::to_string(&LeverageTier::Aggressive).unwrap();
        assert_eq!(json, "5");
        let parsed: Result<LeverageTier, _> = serde_json::from_str("4");
        assert!(parsed.is_err());
    }

    #[test]
    fn leverage_must_be_at_least_one() {
        assert!(Leverage::new(dec!(1)).is_some());
        assert!(Leverage::new(dec!(2.5)).is_some());
        assert!(Leverage::new(dec!(0.5)).is_none());
    }

    #[test]
    fn bps_conversion() {
        assert_eq!(Bps::new(100).as_fraction(), dec!(0.01)); // 1%
        assert_eq!(Bps::new(50).as_fraction(), dec!(0.005)); // 0.5%
        assert_eq!(Bps::new(10).as_fraction(), dec!(0.001)); // 0.1%
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(Quote::new(dec!(0.125)).round_to(2).value(), dec!(0.12));
        assert_eq!(Quote::new(dec!(0.135)).round_to(2).value(), dec!(0.14));
        assert_eq!(Quote::new(dec!(-0.125)).round_to(2).value(), dec!(-0.12));
        assert_eq!(Quote::new(dec!(38.999)).floor_to(2).value(), dec!(38.99));
    }

    #[test]
    fn quote_serializes_as_string() {
        let json = serde_json::to_string(&Quote::new(dec!(29.70))).unwrap();
        assert_eq!(json, "\"29.70\"");
    }

    #[test]
    fn whole_days_truncate() {
        let start = Timestamp::from_millis(0);
        assert_eq!(Timestamp::from_millis(MILLIS_PER_DAY - 1).whole_days_since(start), 0);
        assert_eq!(start.plus_days(15).whole_days_since(start), 15);
        assert_eq!(start.whole_days_since(start.plus_days(3)), 0);
    }
}
