//! In-memory monitoring store for tests/dev and the demo worker.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwatch_core::{Clock, Entity, IssueId, ProductId};
use stockwatch_monitoring::{Issue, IssueInput, MonitoringStore, ResolvedBy, StoreError};
use stockwatch_products::Product;
use stockwatch_sales::SaleEvent;

/// Initial contents, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub sales: Vec<SaleEvent>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

pub struct InMemoryMonitoringStore {
    products: RwLock<BTreeMap<ProductId, Product>>,
    sales: RwLock<Vec<SaleEvent>>,
    issues: RwLock<BTreeMap<IssueId, Issue>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMonitoringStore {
    /// `clock` stamps `created_at` on new issues.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            sales: RwLock::new(Vec::new()),
            issues: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    pub fn from_seed(seed: StoreSeed, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let store = Self::new(clock);
        for product in seed.products {
            store.upsert_product(product)?;
        }
        for sale in seed.sales {
            store.record_sale(sale)?;
        }
        for issue in seed.issues {
            store.insert_issue(issue)?;
        }
        Ok(store)
    }

    pub fn upsert_product(&self, product: Product) -> Result<(), StoreError> {
        product.validate()?;
        write(&self.products)?.insert(product.id, product);
        Ok(())
    }

    pub fn record_sale(&self, sale: SaleEvent) -> Result<(), StoreError> {
        sale.validate()?;
        write(&self.sales)?.push(sale);
        Ok(())
    }

    /// Insert an existing record as-is (seeding, replays).
    pub fn insert_issue(&self, issue: Issue) -> Result<(), StoreError> {
        write(&self.issues)?.insert(*issue.id(), issue);
        Ok(())
    }

    pub fn issue(&self, id: IssueId) -> Result<Option<Issue>, StoreError> {
        Ok(read(&self.issues)?.get(&id).cloned())
    }

    /// Every issue, open and resolved, oldest id first.
    pub fn issues(&self) -> Result<Vec<Issue>, StoreError> {
        Ok(read(&self.issues)?.values().cloned().collect())
    }

    /// Every product, active or not.
    pub fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(read(&self.products)?.values().cloned().collect())
    }

    pub fn sales(&self) -> Result<Vec<SaleEvent>, StoreError> {
        Ok(read(&self.sales)?.clone())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::DataAccess("store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::DataAccess("store lock poisoned".to_string()))
}

impl MonitoringStore for InMemoryMonitoringStore {
    fn get_active_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(read(&self.products)?
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    fn get_recent_sale_events(&self, window: usize) -> Result<Vec<SaleEvent>, StoreError> {
        let mut sales = read(&self.sales)?.clone();
        sales.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        sales.truncate(window);
        Ok(sales)
    }

    fn get_open_issues(&self) -> Result<Vec<Issue>, StoreError> {
        Ok(read(&self.issues)?
            .values()
            .filter(|i| i.is_open())
            .cloned()
            .collect())
    }

    fn create_issue(&self, input: IssueInput) -> Result<Issue, StoreError> {
        input.validate()?;
        if let Some(product_id) = input.product_id {
            if !read(&self.products)?.contains_key(&product_id) {
                return Err(StoreError::Validation(format!(
                    "unknown product reference {product_id}"
                )));
            }
        }

        let issue = Issue::open(IssueId::new(), input, self.clock.now())?;
        write(&self.issues)?.insert(*issue.id(), issue.clone());
        Ok(issue)
    }

    fn resolve_issue(&self, id: IssueId, by: ResolvedBy, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut issues = write(&self.issues)?;
        let issue = issues.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        // Already resolved: no-op.
        issue.resolve(by, at);
        Ok(())
    }
}
