// 8.0.2: result types and errors for engine operations.

use crate::account::AccountError;
use crate::config::ConfigError;
use crate::position::{Position, PositionError};
use crate::store::StoreError;
use crate::types::{AccountId, PositionId, Quote, WithdrawalId};
use crate::withdrawal::{WithdrawalError, WithdrawalStatus};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenedPosition {
    pub position: Position,
    pub trading_fee: Quote,
    pub leverage_fee: Quote,
    pub total_fee: Quote,
    pub new_balance: Quote,
    // the post-open check flipped the account to liquidated
    pub liquidated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub position: Position,
    pub leveraged_pnl: Quote,
    pub exit_fee: Quote,
    pub realized_pnl: Quote,
    pub new_balance: Quote,
    pub liquidated: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Position {0} not found or already closed")]
    PositionNotFound(PositionId),

    #[error("Withdrawal {0} not found")]
    WithdrawalNotFound(WithdrawalId),

    #[error("Account {0} is liquidated")]
    AccountLiquidated(AccountId),

    #[error("Insufficient trading power: need {required}, have {available}")]
    InsufficientTradingPower { required: Quote, available: Quote },

    #[error("No profits to withdraw (net profit {net_profit})")]
    NoProfitToWithdraw { net_profit: Quote },

    #[error("Withdrawal exceeds limit: requested {requested}, max available {available}")]
    WithdrawalExceedsLimit { requested: Quote, available: Quote },

    #[error("Withdrawal {id} is not pending (status {status:?})")]
    WithdrawalNotPending { id: WithdrawalId, status: WithdrawalStatus },

    #[error("Account {0} is busy, retry later")]
    AccountBusy(AccountId),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Stable, wire-friendly classification for the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    AccountNotFound,
    PositionNotFound,
    WithdrawalNotFound,
    AccountLiquidated,
    InsufficientTradingPower,
    NoProfitToWithdraw,
    WithdrawalExceedsLimit,
    WithdrawalNotPending,
    AccountBusy,
    InvalidConfig,
}

impl LedgerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            LedgerError::AccountNotFound(_) => ErrorCode::AccountNotFound,
            LedgerError::PositionNotFound(_) => ErrorCode::PositionNotFound,
            LedgerError::WithdrawalNotFound(_) => ErrorCode::WithdrawalNotFound,
            LedgerError::AccountLiquidated(_) => ErrorCode::AccountLiquidated,
            LedgerError::InsufficientTradingPower { .. } => ErrorCode::InsufficientTradingPower,
            LedgerError::NoProfitToWithdraw { .. } => ErrorCode::NoProfitToWithdraw,
            LedgerError::WithdrawalExceedsLimit { .. } => ErrorCode::WithdrawalExceedsLimit,
            LedgerError::WithdrawalNotPending { .. } => ErrorCode::WithdrawalNotPending,
            LedgerError::AccountBusy(_) => ErrorCode::AccountBusy,
            LedgerError::Config(_) => ErrorCode::InvalidConfig,
        }
    }

    // same call may succeed later unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::AccountBusy(_))
    }

    // rejected by policy; may succeed with different parameters
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientTradingPower { .. }
                | LedgerError::NoProfitToWithdraw { .. }
                | LedgerError::WithdrawalExceedsLimit { .. }
        )
    }
}

impl From<AccountError> for LedgerError {
    fn from(err: AccountError) -> Self {
        LedgerError::InvalidArgument(err.to_string())
    }
}

impl From<PositionError> for LedgerError {
    fn from(err: PositionError) -> Self {
        LedgerError::InvalidArgument(err.to_string())
    }
}

impl From<WithdrawalError> for LedgerError {
    fn from(err: WithdrawalError) -> Self {
        match err {
            WithdrawalError::NonPositiveAmount(_) => LedgerError::InvalidArgument(err.to_string()),
            WithdrawalError::NoProfitToWithdraw { net_profit } => {
                LedgerError::NoProfitToWithdraw { net_profit }
            }
            WithdrawalError::ExceedsLimit { requested, available } => {
                LedgerError::WithdrawalExceedsLimit { requested, available }
            }
            WithdrawalError::NotPending { id, status } => LedgerError::WithdrawalNotPending { id, status },
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => LedgerError::AccountNotFound(id),
            StoreError::Busy(id) => LedgerError::AccountBusy(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn only_busy_is_retryable() {
        assert!(LedgerError::AccountBusy(AccountId(1)).is_retryable());
        assert!(!LedgerError::AccountLiquidated(AccountId(1)).is_retryable());
        assert!(!LedgerError::InvalidArgument("x".into()).is_retryable());
    }

    #[test]
    fn business_rejections() {
        let err = LedgerError::InsufficientTradingPower {
            required: Quote::new(dec!(3000)),
            available: Quote::new(dec!(2000)),
        };
        assert!(err.is_business_rejection());
        assert_eq!(err.code(), ErrorCode::InsufficientTradingPower);
        assert!(!LedgerError::PositionNotFound(PositionId(1)).is_business_rejection());
    }

    #[test]
    fn withdrawal_errors_map_onto_taxonomy() {
        let err: LedgerError = WithdrawalError::ExceedsLimit {
            requested: Quote::new(dec!(50)),
            available: Quote::new(dec!(38.9)),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::WithdrawalExceedsLimit);

        let err: LedgerError = WithdrawalError::NonPositiveAmount(Quote::zero()).into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn store_errors_map_onto_taxonomy() {
        let err: LedgerError = StoreError::Busy(AccountId(3)).into();
        assert_eq!(err, LedgerError::AccountBusy(AccountId(3)));
    }

    #[test]
    fn error_code_wire_name() {
        let json = serde_json::to_string(&ErrorCode::AccountBusy).unwrap();
        assert_eq!(json, "\"ACCOUNT_BUSY\"");
    }
}
