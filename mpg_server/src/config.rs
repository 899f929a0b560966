use std::{env, fmt::Display, str::FromStr};

use log::*;
use mpg_common::{helpers::parse_boolean_flag, Paisa};
use mpg_engine::{helpers::DEFAULT_UTC_OFFSET_HOURS, MatchWindow, SettlementConfig};

use crate::errors::ServerError;

const DEFAULT_MPG_HOST: &str = "127.0.0.1";
const DEFAULT_MPG_PORT: u16 = 8360;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
/// In Taka
const DEFAULT_MINIMUM_BALANCE: i64 = 50_000;
/// In Taka
const DEFAULT_MINIMUM_WITHDRAWAL: i64 = 1_000;
const DEFAULT_MATCH_WINDOW_HOURS: i64 = 24;
const DEFAULT_CLOCK_SKEW_MINUTES: i64 = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// In Taka. A withdrawal may never take a merchant's balance below this floor.
    pub minimum_balance: i64,
    /// In Taka.
    pub minimum_withdrawal: i64,
    /// How far before the SMS timestamp a pending request may have been created and still be matched. Zero means no
    /// limit.
    pub match_window_hours: i64,
    /// Tolerance for requests created slightly after the SMS timestamp.
    pub clock_skew_minutes: i64,
    /// The time zone of the timestamps in provider SMS.
    pub sms_utc_offset_hours: i32,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPG_HOST.to_string(),
            port: DEFAULT_MPG_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            minimum_balance: DEFAULT_MINIMUM_BALANCE,
            minimum_withdrawal: DEFAULT_MINIMUM_WITHDRAWAL,
            match_window_hours: DEFAULT_MATCH_WINDOW_HOURS,
            clock_skew_minutes: DEFAULT_CLOCK_SKEW_MINUTES,
            sms_utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPG_HOST").ok().unwrap_or_else(|| DEFAULT_MPG_HOST.into());
        let port = parse_env("MPG_PORT", DEFAULT_MPG_PORT);
        let database_url = env::var("MPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let max_connections = parse_env("MPG_DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let minimum_balance = parse_env("MPG_MINIMUM_BALANCE", DEFAULT_MINIMUM_BALANCE);
        let minimum_withdrawal = parse_env("MPG_MINIMUM_WITHDRAWAL", DEFAULT_MINIMUM_WITHDRAWAL);
        let match_window_hours = parse_env("MPG_SMS_MATCH_WINDOW_HOURS", DEFAULT_MATCH_WINDOW_HOURS);
        let clock_skew_minutes = parse_env("MPG_SMS_CLOCK_SKEW_MINUTES", DEFAULT_CLOCK_SKEW_MINUTES);
        let sms_utc_offset_hours = parse_env("MPG_SMS_UTC_OFFSET_HOURS", DEFAULT_UTC_OFFSET_HOURS);
        let use_x_forwarded_for = parse_boolean_flag(env::var("MPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MPG_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            max_connections,
            minimum_balance,
            minimum_withdrawal,
            match_window_hours,
            clock_skew_minutes,
            sms_utc_offset_hours,
            use_x_forwarded_for,
            use_forwarded,
        }
    }

    /// Checks the configuration before anything is opened or bound.
    pub fn validate(&self) -> Result<(), ServerError> {
        let fail = |msg: String| Err(ServerError::ConfigurationError(msg));
        if self.database_url.trim().is_empty() {
            return fail("MPG_DATABASE_URL must be set".into());
        }
        if self.max_connections == 0 {
            return fail("MPG_DATABASE_MAX_CONNECTIONS must be at least 1".into());
        }
        let limits = self.settlement_config()?;
        if limits.minimum_balance.is_negative() {
            return fail(format!("MPG_MINIMUM_BALANCE cannot be negative, but is {}", limits.minimum_balance));
        }
        if limits.minimum_withdrawal.is_negative() || limits.minimum_withdrawal.is_zero() {
            return fail(format!("MPG_MINIMUM_WITHDRAWAL must be positive, but is {}", limits.minimum_withdrawal));
        }
        if self.match_window_hours < 0 || self.clock_skew_minutes < 0 {
            return fail("The SMS match window and clock skew cannot be negative".into());
        }
        if !(-23..=23).contains(&self.sms_utc_offset_hours) {
            return fail(format!("MPG_SMS_UTC_OFFSET_HOURS must lie in [-23, 23], but is {}", self.sms_utc_offset_hours));
        }
        Ok(())
    }

    pub fn settlement_config(&self) -> Result<SettlementConfig, ServerError> {
        let to_paisa = |taka: i64, name: &str| {
            Paisa::try_from_taka(taka)
                .map_err(|e| ServerError::ConfigurationError(format!("{name} is out of range. {e}")))
        };
        Ok(SettlementConfig {
            minimum_balance: to_paisa(self.minimum_balance, "MPG_MINIMUM_BALANCE")?,
            minimum_withdrawal: to_paisa(self.minimum_withdrawal, "MPG_MINIMUM_WITHDRAWAL")?,
        })
    }

    pub fn match_window(&self) -> MatchWindow {
        MatchWindow::from_config(self.match_window_hours, self.clock_skew_minutes)
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that route handlers need. Generally we try to keep this as small as possible.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
