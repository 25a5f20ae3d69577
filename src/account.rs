//! Margin trading accounts.
//!
//! An account is funded once with `deposited_capital` and gets a fixed leverage
//! tier for its lifetime, so `trading_power` is computed at creation and never
//! changes. Everything after that moves `current_balance` and the cumulative
//! profit/loss counters.

use crate::config::LedgerConfig;
use crate::types::{AccountId, LeverageTier, Quote, Timestamp, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub wallet_id: WalletId,
    pub user_id: String,

    pub deposited_capital: Quote,
    pub leverage_tier: LeverageTier,
    pub trading_power: Quote,

    pub current_balance: Quote,
    pub total_profit: Quote,
    pub total_loss: Quote,
    // kept for open-position marking; close-form accounting never writes it
    pub unrealized_pnl: Quote,

    pub total_withdrawn: Quote,
    pub last_withdrawal_at: Option<Timestamp>,
    pub monthly_withdrawal_limit_pct: Decimal,

    pub liquidation_threshold_pct: Decimal,
    pub is_liquidated: bool,

    pub created_at: Timestamp,
    pub last_trade_at: Option<Timestamp>,
}

impl Account {
    pub fn new(
        id: AccountId,
        wallet_id: WalletId,
        user_id: &str,
        deposit_amount: Quote,
        leverage_tier: u8,
        config: &LedgerConfig,
        timestamp: Timestamp,
    ) -> Result<Self, AccountError> {
        if !deposit_amount.is_positive() {
            return Err(AccountError::NonPositiveDeposit(deposit_amount));
        }
        let tier = LeverageTier::try_from(leverage_tier).map_err(AccountError::UnsupportedTier)?;
        let trading_power = calculate_trading_power(deposit_amount, tier)
            .ok_or(AccountError::DepositTooLarge(deposit_amount))?;
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AccountError::EmptyUserId);
        }

        Ok(Self {
            id,
            wallet_id,
            user_id: user_id.to_string(),
            deposited_capital: deposit_amount,
            leverage_tier: tier,
            trading_power,
            current_balance: deposit_amount,
            total_profit: Quote::zero(),
            total_loss: Quote::zero(),
            unrealized_pnl: Quote::zero(),
            total_withdrawn: Quote::zero(),
            last_withdrawal_at: None,
            monthly_withdrawal_limit_pct: config.withdrawals.monthly_limit_pct,
            liquidation_threshold_pct: config.risk.liquidation_threshold_pct,
            is_liquidated: false,
            created_at: timestamp,
            last_trade_at: None,
        })
    }

    // cumulative realized profit minus cumulative realized loss
    pub fn net_profit(&self) -> Quote {
        self.total_profit.sub(self.total_loss)
    }

    pub fn charge_open_fees(&mut self, total_fee: Quote, timestamp: Timestamp) {
        self.current_balance = self.current_balance.sub(total_fee);
        self.last_trade_at = Some(timestamp);
    }

    // zero pnl lands on the loss side, which adds nothing. all-or-nothing on overflow.
    pub fn realize_pnl(&mut self, pnl: Quote) -> Result<(), AccountError> {
        let balance = self.current_balance.checked_add(pnl);
        let (profit, loss) = if pnl.is_positive() {
            (self.total_profit.checked_add(pnl), Some(self.total_loss))
        } else {
            (Some(self.total_profit), self.total_loss.checked_add(pnl.abs()))
        };

        match (balance, profit, loss) {
            (Some(balance), Some(profit), Some(loss)) => {
                self.current_balance = balance;
                self.total_profit = profit;
                self.total_loss = loss;
                Ok(())
            }
            _ => Err(AccountError::BalanceOverflow(pnl)),
        }
    }

    pub fn record_withdrawal(&mut self, amount: Quote, timestamp: Timestamp) {
        self.total_withdrawn = self.total_withdrawn.add(amount);
        self.last_withdrawal_at = Some(timestamp);
    }
}

// None when the product does not fit a decimal
pub fn calculate_trading_power(deposit: Quote, tier: LeverageTier) -> Option<Quote> {
    deposit.checked_mul(tier.as_decimal())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error("Deposit must be positive, got {0}")]
    NonPositiveDeposit(Quote),

    #[error("Unsupported leverage tier {0}x (allowed: 2x, 3x, 5x)")]
    UnsupportedTier(u8),

    #[error("User id must not be empty")]
    EmptyUserId,

    #[error("Deposit {0} is too large for the leverage tier")]
    DepositTooLarge(Quote),

    #[error("Realizing {0} would overflow the account balance")]
    BalanceOverflow(Quote),
}
