use std::{env, str::FromStr};

use chrono::Duration;
use log::*;
use rust_decimal::Decimal;
use settlement_common::{Currency, Money};
use settlement_engine::settlement_api::{
    invoice_objects::{InvoiceDefaults, DEFAULT_INVOICE_TTL},
    payment_objects::{OverpaymentAction, PaymentTolerance},
};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/settlement_store.db";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::seconds(60);
const DEFAULT_RATE_TTL: Duration = Duration::seconds(300);
const DEFAULT_ADDRESS_TTL: Duration = Duration::hours(24);
const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How often the expiry sweep runs.
    pub sweep_interval: Duration,
    /// The tolerance and expiry window given to invoices that don't specify their own.
    pub invoice_defaults: InvoiceDefaults,
    /// The size of each event hook's queue. Events published to a full queue are dropped (and logged).
    pub event_buffer_size: usize,
    /// A rate table of the form `USD/BTC=0.000016,EUR/ETH=0.00031`.
    pub exchange_rates: String,
    /// How long a quoted exchange rate remains valid.
    pub rate_ttl: Duration,
    /// Seed for the generated deposit addresses. Changing it changes the address of every new invoice.
    pub address_secret: String,
    pub address_ttl: Duration,
    /// If true, every settlement event is written to the log.
    pub log_events: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            invoice_defaults: InvoiceDefaults::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            exchange_rates: String::default(),
            rate_ttl: DEFAULT_RATE_TTL,
            address_secret: random_secret(),
            address_ttl: DEFAULT_ADDRESS_TTL,
            log_events: true,
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("STL_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ STL_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = env::var("STL_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for STL_MAX_CONNECTIONS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let sweep_interval = duration_from_env("STL_SWEEP_INTERVAL", Duration::seconds, DEFAULT_SWEEP_INTERVAL);
        let invoice_ttl = duration_from_env("STL_INVOICE_TTL", Duration::minutes, DEFAULT_INVOICE_TTL);
        let rate_ttl = duration_from_env("STL_RATE_TTL", Duration::seconds, DEFAULT_RATE_TTL);
        let address_ttl = duration_from_env("STL_ADDRESS_TTL", Duration::hours, DEFAULT_ADDRESS_TTL);
        let payment_tolerance = configure_payment_tolerance();
        let event_buffer_size = env::var("STL_EVENT_BUFFER_SIZE")
            .ok()
            .and_then(|s| match s.parse::<usize>() {
                Ok(0) => {
                    warn!("🪛️ STL_EVENT_BUFFER_SIZE must be at least 1.");
                    None
                },
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("🪛️ Invalid configuration value for STL_EVENT_BUFFER_SIZE. {e}");
                    None
                },
            })
            .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        let exchange_rates = env::var("STL_EXCHANGE_RATES").ok().unwrap_or_else(|| {
            error!(
                "🪛️ STL_EXCHANGE_RATES is not set. No invoices can be issued until it holds a rate table, e.g. \
                 USD/BTC=0.000016,EUR/ETH=0.00031"
            );
            String::default()
        });
        let address_secret = env::var("STL_ADDRESS_SECRET").ok().unwrap_or_else(|| {
            warn!(
                "🚨️🚨️🚨️ STL_ADDRESS_SECRET has not been set. I'm using a random value for this session. Deposit \
                 addresses will not be reproducible across restarts. 🚨️🚨️🚨️"
            );
            random_secret()
        });
        let log_events = env::var("STL_LOG_EVENTS").map(|s| parse_boolean_flag(&s, true)).unwrap_or(true);
        Self {
            database_url,
            max_connections,
            sweep_interval,
            invoice_defaults: InvoiceDefaults { payment_tolerance, invoice_ttl },
            event_buffer_size,
            exchange_rates,
            rate_ttl,
            address_secret,
            address_ttl,
            log_events,
        }
    }
}

/// Reads a flag such as `1`, `true`, `yes`, `0`, `false` or `no`. Anything else yields `default`.
pub fn parse_boolean_flag(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn duration_from_env(name: &str, unit: fn(i64) -> Duration, default: Duration) -> Duration {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {}s.", default.num_seconds()))
        .and_then(|s| parse_duration(&s, unit).map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}")))
        .ok()
        .unwrap_or(default)
}

fn parse_duration(value: &str, unit: fn(i64) -> Duration) -> Result<Duration, String> {
    let n = value.trim().parse::<i64>().map_err(|e| format!("{value} is not a whole number. {e}"))?;
    if n <= 0 {
        return Err(format!("{value} must be greater than zero"));
    }
    Ok(unit(n))
}

fn configure_payment_tolerance() -> PaymentTolerance {
    let defaults = PaymentTolerance::default();
    let underpayment_threshold = env::var("STL_UNDERPAYMENT_TOLERANCE")
        .ok()
        .and_then(|s| parse_fraction(&s).map_err(|e| warn!("🪛️ Invalid STL_UNDERPAYMENT_TOLERANCE. {e}")).ok())
        .unwrap_or(defaults.underpayment_threshold);
    let overpayment_threshold = env::var("STL_OVERPAYMENT_THRESHOLD")
        .ok()
        .and_then(|s| {
            Money::parse(&s, Currency::Usd).map_err(|e| warn!("🪛️ Invalid STL_OVERPAYMENT_THRESHOLD. {e}")).ok()
        })
        .unwrap_or(defaults.overpayment_threshold);
    let overpayment_action = env::var("STL_OVERPAYMENT_ACTION")
        .ok()
        .and_then(|s| {
            OverpaymentAction::from_str(&s).map_err(|e| warn!("🪛️ Invalid STL_OVERPAYMENT_ACTION. {e}")).ok()
        })
        .unwrap_or(defaults.overpayment_action);
    debug!(
        "🪛️ Payment tolerance: underpayment {underpayment_threshold}, overpayment {overpayment_threshold} \
         ({overpayment_action})"
    );
    PaymentTolerance { underpayment_threshold, overpayment_threshold, overpayment_action }
}

fn parse_fraction(value: &str) -> Result<Decimal, String> {
    let fraction = Decimal::from_str(value.trim()).map_err(|e| format!("{value} is not a decimal. {e}"))?;
    if fraction < Decimal::ZERO || fraction >= Decimal::ONE {
        return Err(format!("{value} must lie in [0, 1)"));
    }
    Ok(fraction)
}

fn random_secret() -> String {
    format!("{:032x}", rand::random::<u128>())
}
