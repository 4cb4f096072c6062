use std::collections::HashMap;
use std::sync::Mutex;

use crate::cases::TenantId;

use super::{CreditBalance, CreditError, CreditStore, LedgerEntry};

/// In-memory credit store. One lock covers balances and the ledger, which
/// makes the read-decrement-append unit atomic.
#[derive(Default)]
pub struct InMemoryCreditStore {
    inner: Mutex<CreditInner>,
}

#[derive(Default)]
struct CreditInner {
    balances: HashMap<TenantId, u64>,
    ledger: Vec<LedgerEntry>,
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CreditInner>, CreditError> {
        self.inner
            .lock()
            .map_err(|_| CreditError::Unavailable("credit mutex poisoned".to_string()))
    }
}

impl CreditStore for InMemoryCreditStore {
    fn consume(&self, amount: u64, entry: LedgerEntry) -> Result<CreditBalance, CreditError> {
        let mut inner = self.lock()?;
        let available = inner
            .balances
            .get(&entry.tenant_id)
            .copied()
            .unwrap_or_default();
        if available < amount {
            // Fail closed: no balance write, no ledger entry.
            return Err(CreditError::InsufficientCredits {
                requested: amount,
                available,
            });
        }

        let remaining = available - amount;
        inner.balances.insert(entry.tenant_id.clone(), remaining);
        let tenant_id = entry.tenant_id.clone();
        inner.ledger.push(entry);
        Ok(CreditBalance {
            tenant_id,
            balance: remaining,
        })
    }

    fn grant(&self, amount: u64, entry: LedgerEntry) -> Result<CreditBalance, CreditError> {
        let mut inner = self.lock()?;
        let balance = inner
            .balances
            .get(&entry.tenant_id)
            .copied()
            .unwrap_or_default()
            .saturating_add(amount);
        inner.balances.insert(entry.tenant_id.clone(), balance);
        let tenant_id = entry.tenant_id.clone();
        inner.ledger.push(entry);
        Ok(CreditBalance { tenant_id, balance })
    }

    fn provision(&self, amount: u64, entry: LedgerEntry) -> Result<bool, CreditError> {
        let mut inner = self.lock()?;
        if inner.balances.contains_key(&entry.tenant_id) {
            return Ok(false);
        }
        inner.balances.insert(entry.tenant_id.clone(), amount);
        inner.ledger.push(entry);
        Ok(true)
    }

    fn balance(&self, tenant: &TenantId) -> Result<Option<CreditBalance>, CreditError> {
        let inner = self.lock()?;
        Ok(inner.balances.get(tenant).map(|balance| CreditBalance {
            tenant_id: tenant.clone(),
            balance: *balance,
        }))
    }

    fn history(&self, tenant: &TenantId) -> Result<Vec<LedgerEntry>, CreditError> {
        let inner = self.lock()?;
        Ok(inner
            .ledger
            .iter()
            .filter(|entry| &entry.tenant_id == tenant)
            .cloned()
            .collect())
    }
}
