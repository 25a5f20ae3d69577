//! Liquidation conditions.
//!
//! An account is liquidated when its loss ratio against deposited capital
//! reaches its threshold: `(balance - deposited) / deposited * 100 <= threshold`.
//! The check is pure. The engine runs it inside the transaction that moved the
//! balance and flips `is_liquidated`, which is terminal.

use crate::account::Account;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Loss (negative) or gain (positive) in percent of deposited capital.
/// `None` when there is no positive principal to measure against.
pub fn loss_pct(account: &Account) -> Option<Decimal> {
    let deposited = account.deposited_capital.value();
    if deposited <= Decimal::ZERO {
        return None;
    }
    let balance = account.current_balance.value();
    Some((balance - deposited) / deposited * dec!(100))
}

pub fn check_liquidation(account: &Account) -> bool {
    match loss_pct(account) {
        Some(pct) => pct <= account.liquidation_threshold_pct,
        None => false,
    }
}

/// Severity bands for reporting. Only `Liquidatable` has side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationStatus {
    Safe { loss_pct: Decimal },
    AtRisk { loss_pct: Decimal, buffer_pct: Decimal },
    Liquidatable { loss_pct: Decimal },
    Unmeasurable,
}

// within this many points of the threshold counts as at risk
const AT_RISK_BAND_PCT: Decimal = dec!(10);

pub fn evaluate_liquidation(account: &Account) -> LiquidationStatus {
    let Some(pct) = loss_pct(account) else {
        return LiquidationStatus::Unmeasurable;
    };
    let threshold = account.liquidation_threshold_pct;

    if pct <= threshold {
        return LiquidationStatus::Liquidatable { loss_pct: pct };
    }

    let buffer = pct - threshold;
    if buffer <= AT_RISK_BAND_PCT {
        return LiquidationStatus::AtRisk {
            loss_pct: pct,
            buffer_pct: buffer,
        };
    }

    LiquidationStatus::Safe { loss_pct: pct }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::types::{AccountId, Quote, Timestamp, WalletId};

    fn account_with_balance(deposit: Decimal, balance: Decimal) -> Account {
        let mut account = Account::new(
            AccountId(1),
            WalletId(1),
            "user",
            Quote::new(deposit),
            2,
            &LedgerConfig::default(),
            Timestamp::from_millis(0),
        )
        .unwrap();
        account.current_balance = Quote::new(balance);
        account
    }

    #[test]
    fn exactly_at_threshold_liquidates() {
        let account = account_with_balance(dec!(1000), dec!(500));
        assert_eq!(loss_pct(&account), Some(dec!(-50)));
        assert!(check_liquidation(&account));
    }

    #[test]
    fn above_threshold_is_safe() {
        let account = account_with_balance(dec!(1000), dec!(500.01));
        assert!(!check_liquidation(&account));

        let profitable = account_with_balance(dec!(1000), dec!(1187.5));
        assert_eq!(loss_pct(&profitable), Some(dec!(18.75)));
        assert!(!check_liquidation(&profitable));
    }

    #[test]
    fn negative_balance_liquidates() {
        let account = account_with_balance(dec!(1000), dec!(-3));
        assert!(check_liquidation(&account));
    }

    #[test]
    fn no_principal_is_not_liquidatable() {
        let mut account = account_with_balance(dec!(1000), dec!(0));
        account.deposited_capital = Quote::zero();
        assert_eq!(loss_pct(&account), None);
        assert!(!check_liquidation(&account));
        assert_eq!(evaluate_liquidation(&account), LiquidationStatus::Unmeasurable);
    }

    #[test]
    fn custom_threshold_respected() {
        let mut account = account_with_balance(dec!(1000), dec!(700));
        assert!(!check_liquidation(&account));
        account.liquidation_threshold_pct = dec!(-25);
        assert!(check_liquidation(&account));
    }

    #[test]
    fn status_bands() {
        assert!(matches!(
            evaluate_liquidation(&account_with_balance(dec!(1000), dec!(1000))),
            LiquidationStatus::Safe { .. }
        ));
        assert_eq!(
            evaluate_liquidation(&account_with_balance(dec!(1000), dec!(550))),
            LiquidationStatus::AtRisk {
                loss_pct: dec!(-45),
                buffer_pct: dec!(5),
            }
        );
        assert!(matches!(
            evaluate_liquidation(&account_with_balance(dec!(1000), dec!(400))),
            LiquidationStatus::Liquidatable { .. }
        ));
    }
}
