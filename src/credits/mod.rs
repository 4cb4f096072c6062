//! Per-tenant credit balance with an append-only audit ledger.
//!
//! Metered operations consume independently on every call; retrying an
//! export consumes credits again. Callers wanting spend-once-per-subject
//! semantics layer that on top by checking `history` for an existing entry
//! with the same reason and subject before consuming.

pub mod router;
pub mod store;

pub use router::credit_router;
pub use store::InMemoryCreditStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::cases::TenantId;

/// Reason code recorded when a document export consumes a credit.
pub const REASON_DOCUMENT_EXPORT: &str = "document_export";

/// Reason code recorded when a tenant is provisioned its starting balance.
pub const REASON_INITIAL_GRANT: &str = "initial_grant";

/// Current balance row for a tenant. Non-negative by construction; one row
/// per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub tenant_id: TenantId,
    pub balance: u64,
}

/// Immutable record of a single balance change. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub tenant_id: TenantId,
    pub delta: i64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Error raised by the credit ledger.
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("insufficient credits: requested {requested}, available {available}")]
    InsufficientCredits { requested: u64, available: u64 },
    #[error("credit storage unavailable: {0}")]
    Unavailable(String),
}

impl CreditError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::Unavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }
}

/// Storage abstraction guaranteeing the atomic read-decrement-append unit.
pub trait CreditStore: Send + Sync {
    /// Decrement and append in one unit of work; fail closed with no write
    /// when the balance is below `amount`.
    fn consume(&self, amount: u64, entry: LedgerEntry) -> Result<CreditBalance, CreditError>;

    /// Increment and append in one unit of work.
    fn grant(&self, amount: u64, entry: LedgerEntry) -> Result<CreditBalance, CreditError>;

    /// Create the balance row with `amount` only when the tenant has none
    /// yet; the existence check and the write are one unit of work. Returns
    /// false without writing when the row already exists.
    fn provision(&self, amount: u64, entry: LedgerEntry) -> Result<bool, CreditError>;

    /// Current balance row, `None` when the tenant has never been touched.
    fn balance(&self, tenant: &TenantId) -> Result<Option<CreditBalance>, CreditError>;

    /// Full audit trail for a tenant, oldest first.
    fn history(&self, tenant: &TenantId) -> Result<Vec<LedgerEntry>, CreditError>;
}

/// Credit ledger service: provisioning, metered consumption, audit reads.
pub struct CreditLedger<S> {
    store: Arc<S>,
    starting_credits: u64,
}

impl<S> CreditLedger<S>
where
    S: CreditStore + 'static,
{
    pub fn new(store: Arc<S>, starting_credits: u64) -> Self {
        Self {
            store,
            starting_credits,
        }
    }

    /// Consume `amount` credits for a metered operation.
    pub fn consume(
        &self,
        tenant: &TenantId,
        amount: u64,
        reason: &str,
        actor: Option<String>,
        metadata: Option<Value>,
    ) -> Result<CreditBalance, CreditError> {
        self.ensure_provisioned(tenant)?;
        let entry = LedgerEntry {
            tenant_id: tenant.clone(),
            delta: -(amount as i64),
            reason: reason.to_string(),
            actor,
            metadata,
            created_at: Utc::now(),
        };
        let balance = self.store.consume(amount, entry)?;
        info!(tenant = %tenant.0, amount, reason, remaining = balance.balance, "credits consumed");
        Ok(balance)
    }

    /// Top up a tenant's balance.
    pub fn grant(
        &self,
        tenant: &TenantId,
        amount: u64,
        reason: &str,
        actor: Option<String>,
    ) -> Result<CreditBalance, CreditError> {
        self.ensure_provisioned(tenant)?;
        let entry = LedgerEntry {
            tenant_id: tenant.clone(),
            delta: amount as i64,
            reason: reason.to_string(),
            actor,
            metadata: None,
            created_at: Utc::now(),
        };
        self.store.grant(amount, entry)
    }

    pub fn balance(&self, tenant: &TenantId) -> Result<CreditBalance, CreditError> {
        self.ensure_provisioned(tenant)?;
        Ok(self
            .store
            .balance(tenant)?
            .unwrap_or_else(|| CreditBalance {
                tenant_id: tenant.clone(),
                balance: 0,
            }))
    }

    pub fn history(&self, tenant: &TenantId) -> Result<Vec<LedgerEntry>, CreditError> {
        self.store.history(tenant)
    }

    /// Grant the configured starting balance the first time a tenant touches
    /// the ledger. The store applies the grant conditionally on the balance
    /// row being absent, so two racing first-touch requests cannot both
    /// credit the tenant.
    fn ensure_provisioned(&self, tenant: &TenantId) -> Result<(), CreditError> {
        let entry = LedgerEntry {
            tenant_id: tenant.clone(),
            delta: self.starting_credits as i64,
            reason: REASON_INITIAL_GRANT.to_string(),
            actor: None,
            metadata: None,
            created_at: Utc::now(),
        };
        self.store.provision(self.starting_credits, entry)?;
        Ok(())
    }
}
