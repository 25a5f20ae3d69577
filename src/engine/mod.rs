// 8.0: ledger engine. coordinates account creation, position open/close,
// withdrawals and liquidation flagging over the ledger store.
// every mutating call is one transaction on one locked account row.

mod core;
mod liquidations;
mod positions;
mod results;
mod withdrawals;

pub use core::LeverageEngine;
pub use results::{ClosedPosition, ErrorCode, LedgerError, OpenedPosition};
