// 7.0 config.rs: all settings in one place. fees, withdrawal policy, risk params, store limits.
// 7.1 FeeConfig is flat bps per fee type. no volume tiers or referral splits.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::types::Bps;

/** 7.2: fee settings in bps. 100 bps = 1% */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    // charged on position_size (quantity * entry_price) at open
    pub trading_fee_bps: u32,
    // charged on effective notional (position_size * leverage) at open
    pub leverage_fee_bps: u32,
    // charged on exit value (quantity * exit_price) at close
    pub exit_fee_bps: u32,
    // charged on the gross withdrawal amount
    pub withdrawal_fee_bps: u32,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            trading_fee_bps: 50,     // 0.5%
            leverage_fee_bps: 10,    // 0.1%
            exit_fee_bps: 50,        // 0.5%
            withdrawal_fee_bps: 100, // 1%
        }
    }
}

impl FeeConfig {
    pub fn trading_rate(&self) -> Decimal {
        Bps::new(self.trading_fee_bps).as_fraction()
    }

    pub fn leverage_rate(&self) -> Decimal {
        Bps::new(self.leverage_fee_bps).as_fraction()
    }

    pub fn exit_rate(&self) -> Decimal {
        Bps::new(self.exit_fee_bps).as_fraction()
    }

    pub fn withdrawal_rate(&self) -> Decimal {
        Bps::new(self.withdrawal_fee_bps).as_fraction()
    }
}

// 7.3: how much realized profit may leave per rolling window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalPolicy {
    // percent of net profit withdrawable per window, copied onto new accounts
    pub monthly_limit_pct: Decimal,
    // window length in whole days; the limit is pro-rated inside it
    pub window_days: u32,
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            monthly_limit_pct: dec!(20),
            window_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    // loss percent (negative) at which an account is liquidated, copied onto new accounts
    pub liquidation_threshold_pct: Decimal,
    pub exposure_limit: ExposureLimit,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            liquidation_threshold_pct: dec!(-50),
            exposure_limit: ExposureLimit::Aggregate,
        }
    }
}

/// What trading power caps when a position is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureLimit {
    // each new position's effective size on its own
    PerPosition,
    // new effective size plus every position still open on the account
    Aggregate,
}

impl FromStr for ExposureLimit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_position" | "per-position" => Ok(ExposureLimit::PerPosition),
            "aggregate" => Ok(ExposureLimit::Aggregate),
            _ => Err(()),
        }
    }
}

// The complete ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub fees: FeeConfig,
    pub withdrawals: WithdrawalPolicy,
    pub risk: RiskConfig,
    // decimal places kept on stored money. 6 = one micro-unit of a USD stablecoin
    pub money_scale: u32,
    // how long a mutating call waits for the account row lock before AccountBusy
    pub lock_timeout_ms: u64,
    // audit journal retention
    pub max_events: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fees: FeeConfig::default(),
            withdrawals: WithdrawalPolicy::default(),
            risk: RiskConfig::default(),
            money_scale: 6,
            lock_timeout_ms: 5_000,
            max_events: 100_000,
        }
    }
}

impl LedgerConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    // Looser limits for local runs
    pub fn development() -> Self {
        let mut config = Self::default();
        config.lock_timeout_ms = 30_000;
        config.max_events = 10_000;
        config
    }

    // Production keeps the default fee schedule but waits less on hot accounts
    pub fn production() -> Self {
        let mut config = Self::default();
        config.lock_timeout_ms = 2_000;
        config.max_events = 1_000_000;
        config
    }

    /// Start from `base` and override any field that has a `LEDGER_*` variable set.
    /// Unparseable values are ignored with a warning and the base value kept.
    pub fn from_env_with(base: LedgerConfig) -> Result<Self, ConfigError> {
        let mut config = base;

        override_from_env("LEDGER_TRADING_FEE_BPS", &mut config.fees.trading_fee_bps);
        override_from_env("LEDGER_LEVERAGE_FEE_BPS", &mut config.fees.leverage_fee_bps);
        override_from_env("LEDGER_EXIT_FEE_BPS", &mut config.fees.exit_fee_bps);
        override_from_env("LEDGER_WITHDRAWAL_FEE_BPS", &mut config.fees.withdrawal_fee_bps);
        override_from_env(
            "LEDGER_MONTHLY_WITHDRAWAL_LIMIT_PCT",
            &mut config.withdrawals.monthly_limit_pct,
        );
        override_from_env("LEDGER_WITHDRAWAL_WINDOW_DAYS", &mut config.withdrawals.window_days);
        override_from_env(
            "LEDGER_LIQUIDATION_THRESHOLD_PCT",
            &mut config.risk.liquidation_threshold_pct,
        );
        override_from_env("LEDGER_EXPOSURE_LIMIT", &mut config.risk.exposure_limit);
        override_from_env("LEDGER_MONEY_SCALE", &mut config.money_scale);
        override_from_env("LEDGER_LOCK_TIMEOUT_MS", &mut config.lock_timeout_ms);
        override_from_env("LEDGER_MAX_EVENTS", &mut config.max_events);

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("LEDGER_ENV") {
            Ok(name) => name
                .parse::<Environment>()
                .map_err(|_| ConfigError::InvalidEnvironment(name))?
                .config(),
            Err(_) => Self::default(),
        };
        Self::from_env_with(base)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // fee checks: anything above 10% is a typo, not a business decision
        for (name, bps) in [
            ("trading", self.fees.trading_fee_bps),
            ("leverage", self.fees.leverage_fee_bps),
            ("exit", self.fees.exit_fee_bps),
            ("withdrawal", self.fees.withdrawal_fee_bps),
        ] {
            if bps > 1_000 {
                return Err(ConfigError::InvalidFees {
                    reason: format!("{} fee {} bps exceeds 1000 bps", name, bps),
                });
            }
        }

        // withdrawal checks
        if self.withdrawals.monthly_limit_pct < Decimal::ZERO
            || self.withdrawals.monthly_limit_pct > dec!(100)
        {
            return Err(ConfigError::InvalidWithdrawalPolicy {
                reason: "monthly limit must be between 0 and 100 percent".to_string(),
            });
        }
        if self.withdrawals.window_days == 0 {
            return Err(ConfigError::InvalidWithdrawalPolicy {
                reason: "window must be at least one day".to_string(),
            });
        }

        // risk checks
        if self.risk.liquidation_threshold_pct >= Decimal::ZERO
            || self.risk.liquidation_threshold_pct < dec!(-100)
        {
            return Err(ConfigError::InvalidRisk {
                reason: "liquidation threshold must be in [-100, 0)".to_string(),
            });
        }

        // store checks
        if self.money_scale > 18 {
            return Err(ConfigError::InvalidStore {
                reason: "money scale above 18 places".to_string(),
            });
        }
        if self.max_events == 0 {
            return Err(ConfigError::InvalidStore {
                reason: "journal must retain at least one event".to_string(),
            });
        }

        Ok(())
    }
}

fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config override"),
        }
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("Invalid withdrawal policy: {reason}")]
    InvalidWithdrawalPolicy { reason: String },

    #[error("Invalid risk settings: {reason}")]
    InvalidRisk { reason: String },

    #[error("Invalid store settings: {reason}")]
    InvalidStore { reason: String },

    #[error("Unknown environment {0:?}")]
    InvalidEnvironment(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn config(&self) -> LedgerConfig {
        match self {
            Environment::Development => LedgerConfig::development(),
            Environment::Staging => LedgerConfig::default(),
            Environment::Production => LedgerConfig::production(),
        }
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}
