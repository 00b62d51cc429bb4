use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, DataLoadError};
use crate::loader::load_transactions;
use crate::models::{DailyActivity, OrderSummary, TransactionTable};
use crate::projections::{aggregate_daily, aggregate_orders};

/// A loaded transaction log and the views derived from it at load time.
/// Never mutated after construction; reloading builds a new one.
#[derive(Debug)]
pub struct Dataset {
    pub table: TransactionTable,
    pub orders: Vec<OrderSummary>,
    pub daily: Vec<DailyActivity>,
    pub loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub fn from_table(table: TransactionTable) -> Self {
        let orders = aggregate_orders(&table.rows);
        let daily = aggregate_daily(&orders);
        Self {
            table,
            orders,
            daily,
            loaded_at: Utc::now(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DataLoadError> {
        let dataset = Self::from_table(load_transactions(path)?);
        info!(
            orders = dataset.orders.len(),
            days = dataset.daily.len(),
            "Derived order and daily summaries"
        );
        Ok(dataset)
    }

    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.table.date_bounds()
    }
}

/// Shared application state. Requests work on an `Arc<Dataset>` snapshot,
/// so a reload never disturbs a computation already in flight.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    data: Arc<RwLock<Arc<Dataset>>>,
}

impl AppState {
    pub fn new(config: Config, dataset: Dataset) -> Self {
        Self {
            config: Arc::new(config),
            data: Arc::new(RwLock::new(Arc::new(dataset))),
        }
    }

    pub fn snapshot(&self) -> Result<Arc<Dataset>, AppError> {
        let guard = self.data.read().map_err(|_| AppError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Re-read the configured transaction log and swap it in.
    /// On failure the current dataset stays in place.
    pub fn reload(&self) -> Result<Arc<Dataset>, AppError> {
        let fresh = Arc::new(Dataset::load(&self.config.data_path)?);
        let mut guard = self.data.write().map_err(|_| AppError::LockPoisoned)?;
        *guard = Arc::clone(&fresh);
        info!(rows = fresh.table.len(), "Transaction log reloaded");
        Ok(fresh)
    }
}
