// leverage-ledger: leveraged-account ledger engine.
// balance-first architecture: every monetary change is one atomic transaction
// on one account row, and fixed-point decimals everywhere. no floats.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, LeverageTier, Price, Quote, Timestamp
//   1.5  clock.rs: time source, system and manual
//   4.x  position.rs: position struct, open/close quotes
//   5.x  fee.rs: fee ledger rows
//   6.x  liquidation.rs: loss ratio and threshold check
//   7.x  config.rs: fees, withdrawal policy, risk, env presets
//   8.x  engine/: accounts, positions, withdrawals, liquidation flagging
//   9.x  withdrawal.rs: monthly limit, pro-ration, settlement
//   10.x account.rs: account struct, trading power
//   11.x events.rs: committed state changes for audit
//   12.x stats.rs: platform rollups
//   13.x store.rs: tables, row locks, transactions

// domain modules
pub mod account;
pub mod fee;
pub mod liquidation;
pub mod position;
pub mod types;
pub mod withdrawal;

// engine and storage
pub mod engine;
pub mod events;
pub mod stats;
pub mod store;

// integration modules
pub mod clock;
pub mod config;

// re exports for convenience
pub use account::{calculate_trading_power, Account, AccountError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Environment, ExposureLimit, FeeConfig, LedgerConfig, RiskConfig, WithdrawalPolicy};
pub use engine::{ClosedPosition, ErrorCode, LedgerError, LeverageEngine, OpenedPosition};
pub use events::{Event, EventId, EventPayload};
pub use fee::{Fee, FeeType};
pub use liquidation::{check_liquidation, evaluate_liquidation, LiquidationStatus};
pub use position::{Position, PositionStatus};
pub use stats::PlatformStats;
pub use store::LedgerStore;
pub use types::*;
pub use withdrawal::{SettlementOutcome, Withdrawal, WithdrawalQuote, WithdrawalStatus};
