use std::collections::HashMap;

use chrono::Duration;
use cucumber::World;
use log::*;
use rust_decimal::Decimal;
use settlement_common::Currency;
use settlement_engine::{
    db_types::Invoice,
    events::EventProducers,
    helpers::{HashedAddressProvider, StaticExchangeRates},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SettlementError,
    SettlementFlowApi,
    SqliteDatabase,
};

pub type SettlementApi = SettlementFlowApi<SqliteDatabase, StaticExchangeRates, HashedAddressProvider, EventProducers>;

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<SettlementSystem>,
    /// Invoices by the alias the scenario gave them
    pub invoices: HashMap<String, Invoice>,
    pub last_error: Option<SettlementError>,
}

#[derive(Debug)]
pub struct SettlementSystem {
    pub db_path: String,
    pub api: SettlementApi,
}

impl SettlementWorld {
    pub fn api(&self) -> &SettlementApi {
        &self.system.as_ref().expect("SettlementFlowApi not initialised").api
    }

    pub fn invoice(&self, alias: &str) -> &Invoice {
        self.invoices.get(alias).unwrap_or_else(|| panic!("No invoice called {alias}"))
    }

    /// Keeps the outcome of a step that is allowed to fail, so that a later step can check it.
    pub fn record<T>(&mut self, result: Result<T, SettlementError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Step failed: {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}

impl SettlementSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("🚀️ Created database: {url}");
        let rates = StaticExchangeRates::new(Duration::minutes(5))
            .with_rate(Currency::Usd, Currency::Btc, Decimal::new(16, 6))
            .with_rate(Currency::Usd, Currency::Usdt, Decimal::ONE)
            .with_rate(Currency::Eur, Currency::Eth, Decimal::new(5, 4));
        let addresses = HashedAddressProvider::new("cucumber", Duration::hours(1));
        let api = SettlementFlowApi::new(db, rates, addresses, EventProducers::default());
        Self { db_path: url, api }
    }
}
