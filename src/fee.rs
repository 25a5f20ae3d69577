// 5.0: platform revenue ledger. append-only, never updated, only summed.

use crate::types::{AccountId, FeeId, Quote, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeType {
    Trading,
    Leverage,
    Withdrawal,
}

impl FeeType {
    pub const ALL: [FeeType; 3] = [FeeType::Trading, FeeType::Leverage, FeeType::Withdrawal];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::Trading => "TRADING",
            FeeType::Leverage => "LEVERAGE",
            FeeType::Withdrawal => "WITHDRAWAL",
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub id: FeeId,
    pub account_id: AccountId,
    pub fee_type: FeeType,
    pub amount: Quote,
    pub description: String,
    pub collected_at: Timestamp,
}

impl Fee {
    pub fn trading(id: FeeId, account_id: AccountId, amount: Quote, asset: &str, at: Timestamp) -> Self {
        Self::new(id, account_id, FeeType::Trading, amount, format!("Trading fee for {}", asset), at)
    }

    pub fn leverage(id: FeeId, account_id: AccountId, amount: Quote, asset: &str, at: Timestamp) -> Self {
        Self::new(id, account_id, FeeType::Leverage, amount, format!("Leverage fee for {}", asset), at)
    }

    pub fn exit(id: FeeId, account_id: AccountId, amount: Quote, asset: &str, at: Timestamp) -> Self {
        Self::new(id, account_id, FeeType::Trading, amount, format!("Exit fee for {}", asset), at)
    }

    pub fn withdrawal(id: FeeId, account_id: AccountId, amount: Quote, at: Timestamp) -> Self {
        Self::new(id, account_id, FeeType::Withdrawal, amount, "Withdrawal fee".to_string(), at)
    }

    fn new(
        id: FeeId,
        account_id: AccountId,
        fee_type: FeeType,
        amount: Quote,
        description: String,
        collected_at: Timestamp,
    ) -> Self {
        Self {
            id,
            account_id,
            fee_type,
            amount,
            description,
            collected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn exit_fee_is_a_trading_fee() {
        let fee = Fee::exit(FeeId(3), AccountId(1), Quote::new(dec!(5.5)), "SOL", Timestamp::from_millis(0));
        assert_eq!(fee.fee_type, FeeType::Trading);
        assert_eq!(fee.description, "Exit fee for SOL");
    }

    #[test]
    fn fee_type_wire_names() {
        assert_eq!(serde_json::to_string(&FeeType::Leverage).unwrap(), "\"LEVERAGE\"");
        assert_eq!(FeeType::Withdrawal.to_string(), "WITHDRAWAL");
    }
}
