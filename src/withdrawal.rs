//! Profit withdrawals and the rolling withdrawal limit.
//!
//! Only realized net profit can leave an account, and only a slice of it per
//! window: `monthly_withdrawal_limit_pct` of net profit, pro-rated by whole
//! days since the previous withdrawal while still inside the window. A first
//! withdrawal gets the full slice immediately. A second request on the same
//! day pro-rates to zero.

use crate::account::Account;
use crate::config::{FeeConfig, WithdrawalPolicy};
use crate::types::{AccountId, Quote, Timestamp, WithdrawalId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

/// Outcome reported by the external settlement process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    Completed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub account_id: AccountId,
    pub amount: Quote,
    pub fee: Quote,
    pub net_amount: Quote,
    pub status: WithdrawalStatus,
    pub requested_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Withdrawal {
    pub fn pending(id: WithdrawalId, account_id: AccountId, terms: &WithdrawalTerms, at: Timestamp) -> Self {
        Self {
            id,
            account_id,
            amount: terms.amount,
            fee: terms.fee,
            net_amount: terms.net_amount,
            status: WithdrawalStatus::Pending,
            requested_at: at,
            completed_at: None,
        }
    }

    // PENDING -> COMPLETED | REJECTED, once
    pub fn settle(&mut self, outcome: SettlementOutcome, at: Timestamp) -> Result<(), WithdrawalError> {
        if self.status != WithdrawalStatus::Pending {
            return Err(WithdrawalError::NotPending {
                id: self.id,
                status: self.status,
            });
        }
        self.status = match outcome {
            SettlementOutcome::Completed => WithdrawalStatus::Completed,
            SettlementOutcome::Rejected => WithdrawalStatus::Rejected,
        };
        self.completed_at = Some(at);
        Ok(())
    }
}

/// Read-only view of what an account could withdraw right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalQuote {
    pub net_profit: Quote,
    // full-window limit before pro-ration
    pub monthly_limit: Quote,
    // 1 outside the window or on first withdrawal, days/window inside it
    pub proration: Decimal,
    // exact allowance; compare against this, never against a rounded copy
    pub available: Quote,
}

impl WithdrawalQuote {
    pub fn available_floor(&self, money_scale: u32) -> Quote {
        self.available.floor_to(money_scale)
    }
}

pub fn calculate_withdrawal_limit(account: &Account, policy: &WithdrawalPolicy, now: Timestamp) -> WithdrawalQuote {
    let net_profit = account.net_profit();
    if !net_profit.is_positive() {
        return WithdrawalQuote {
            net_profit,
            monthly_limit: Quote::zero(),
            proration: Decimal::ZERO,
            available: Quote::zero(),
        };
    }

    let monthly_limit = net_profit.mul(account.monthly_withdrawal_limit_pct / dec!(100));

    let window = i64::from(policy.window_days);
    let proration = match account.last_withdrawal_at {
        Some(last) => {
            let days = now.whole_days_since(last);
            if days < window {
                Decimal::from(days) / Decimal::from(window)
            } else {
                Decimal::ONE
            }
        }
        None => Decimal::ONE,
    };

    let prorated = monthly_limit.mul(proration);
    let available = prorated.min(net_profit);

    WithdrawalQuote {
        net_profit,
        monthly_limit,
        proration,
        available,
    }
}

/// Accepted withdrawal numbers, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalTerms {
    pub amount: Quote,
    pub fee: Quote,
    pub net_amount: Quote,
}

pub fn evaluate_withdrawal(
    account: &Account,
    amount: Quote,
    policy: &WithdrawalPolicy,
    fees: &FeeConfig,
    money_scale: u32,
    now: Timestamp,
) -> Result<WithdrawalTerms, WithdrawalError> {
    if !amount.is_positive() {
        return Err(WithdrawalError::NonPositiveAmount(amount));
    }

    let quote = calculate_withdrawal_limit(account, policy, now);
    if !quote.net_profit.is_positive() {
        return Err(WithdrawalError::NoProfitToWithdraw {
            net_profit: quote.net_profit,
        });
    }
    if amount > quote.available {
        return Err(WithdrawalError::ExceedsLimit {
            requested: amount,
            available: quote.available_floor(money_scale),
        });
    }

    let fee = amount.mul(fees.withdrawal_rate()).round_to(money_scale);
    Ok(WithdrawalTerms {
        amount,
        fee,
        net_amount: amount.sub(fee),
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WithdrawalError {
    #[error("Withdrawal amount must be positive, got {0}")]
    NonPositiveAmount(Quote),

    #[error("No profits to withdraw (net profit {net_profit})")]
    NoProfitToWithdraw { net_profit: Quote },

    #[error("Withdrawal exceeds limit: requested {requested}, max available {available}")]
    ExceedsLimit { requested: Quote, available: Quote },

    #[error("Withdrawal {id} is not pending (status {status:?})")]
    NotPending { id: WithdrawalId, status: WithdrawalStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::types::WalletId;

    fn profitable_account(profit: Decimal, loss: Decimal) -> Account {
        let mut account = Account::new(
            AccountId(1),
            WalletId(1),
            "user",
            Quote::new(dec!(1000)),
            2,
            &LedgerConfig::default(),
            Timestamp::from_millis(0),
        )
        .unwrap();
        account.total_profit = Quote::new(profit);
        account.total_loss = Quote::new(loss);
        account
    }

    fn evaluate(account: &Account, amount: Decimal, now: Timestamp) -> Result<WithdrawalTerms, WithdrawalError> {
        let config = LedgerConfig::default();
        evaluate_withdrawal(account, Quote::new(amount), &config.withdrawals, &config.fees, 6, now)
    }

    #[test]
    fn first_withdrawal_gets_full_monthly_limit() {
        let account = profitable_account(dec!(194.5), dec!(0));
        let quote = calculate_withdrawal_limit(&account, &WithdrawalPolicy::default(), Timestamp::from_millis(0));

        assert_eq!(quote.net_profit.value(), dec!(194.5));
        assert_eq!(quote.monthly_limit.value(), dec!(38.9));
        assert_eq!(quote.proration, Decimal::ONE);
        assert_eq!(quote.available.value(), dec!(38.9));
    }

    #[test]
    fn over_limit_rejected_under_limit_accepted() {
        let account = profitable_account(dec!(194.5), dec!(0));
        let now = Timestamp::from_millis(0);

        let err = evaluate(&account, dec!(50), now).unwrap_err();
        assert_eq!(
            err,
            WithdrawalError::ExceedsLimit {
                requested: Quote::new(dec!(50)),
                available: Quote::new(dec!(38.9)),
            }
        );

        let terms = evaluate(&account, dec!(30), now).unwrap();
        assert_eq!(terms.fee.value(), dec!(0.30));
        assert_eq!(terms.net_amount.value(), dec!(29.70));
    }

    #[test]
    fn exactly_at_limit_is_allowed() {
        let account = profitable_account(dec!(194.5), dec!(0));
        assert!(evaluate(&account, dec!(38.9), Timestamp::from_millis(0)).is_ok());
    }

    #[test]
    fn no_profit_rejected() {
        let flat = profitable_account(dec!(100), dec!(100));
        assert!(matches!(
            evaluate(&flat, dec!(1), Timestamp::from_millis(0)),
            Err(WithdrawalError::NoProfitToWithdraw { .. })
        ));

        let losing = profitable_account(dec!(10), dec!(100));
        assert!(matches!(
            evaluate(&losing, dec!(1), Timestamp::from_millis(0)),
            Err(WithdrawalError::NoProfitToWithdraw { .. })
        ));
    }

    #[test]
    fn same_day_second_withdrawal_prorates_to_zero() {
        let mut account = profitable_account(dec!(1000), dec!(0));
        let t0 = Timestamp::from_millis(0);
        account.record_withdrawal(Quote::new(dec!(100)), t0);

        let later_same_day = Timestamp::from_millis(3_600_000);
        let quote = calculate_withdrawal_limit(&account, &WithdrawalPolicy::default(), later_same_day);
        assert_eq!(quote.available, Quote::zero());
        assert!(matches!(
            evaluate(&account, dec!(0.01), later_same_day),
            Err(WithdrawalError::ExceedsLimit { .. })
        ));
    }

    #[test]
    fn mid_window_prorates_linearly() {
        let mut account = profitable_account(dec!(1000), dec!(0));
        let t0 = Timestamp::from_millis(0);
        account.record_withdrawal(Quote::new(dec!(10)), t0);

        // 15 of 30 days: half of the 200 monthly limit
        let quote = calculate_withdrawal_limit(&account, &WithdrawalPolicy::default(), t0.plus_days(15));
        assert_eq!(quote.proration, dec!(0.5));
        assert_eq!(quote.available.value(), dec!(100));

        // 30 days and beyond: full limit again
        let quote = calculate_withdrawal_limit(&account, &WithdrawalPolicy::default(), t0.plus_days(30));
        assert_eq!(quote.proration, Decimal::ONE);
        assert_eq!(quote.available.value(), dec!(200));
    }

    #[test]
    fn reported_maximum_is_truncated() {
        let mut account = profitable_account(dec!(100), dec!(0));
        let t0 = Timestamp::from_millis(0);
        account.record_withdrawal(Quote::new(dec!(1)), t0);

        // 20 * 7/30 = 4.6666...
        let err = evaluate(&account, dec!(5), t0.plus_days(7)).unwrap_err();
        assert_eq!(
            err,
            WithdrawalError::ExceedsLimit {
                requested: Quote::new(dec!(5)),
                available: Quote::new(dec!(4.666666)),
            }
        );
        assert!(evaluate(&account, dec!(4.666666), t0.plus_days(7)).is_ok());
    }

    #[test]
    fn non_positive_amount_rejected() {
        let account = profitable_account(dec!(100), dec!(0));
        assert!(matches!(
            evaluate(&account, dec!(0), Timestamp::from_millis(0)),
            Err(WithdrawalError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn settle_only_from_pending() {
        let terms = WithdrawalTerms {
            amount: Quote::new(dec!(30)),
            fee: Quote::new(dec!(0.3)),
            net_amount: Quote::new(dec!(29.7)),
        };
        let mut withdrawal = Withdrawal::pending(WithdrawalId(1), AccountId(1), &terms, Timestamp::from_millis(0));

        withdrawal.settle(SettlementOutcome::Completed, Timestamp::from_millis(10)).unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Completed);
        assert_eq!(withdrawal.completed_at, Some(Timestamp::from_millis(10)));

        let again = withdrawal.settle(SettlementOutcome::Rejected, Timestamp::from_millis(20));
        assert!(matches!(again, Err(WithdrawalError::NotPending { .. })));
        assert_eq!(withdrawal.status, WithdrawalStatus::Completed);
    }
}
