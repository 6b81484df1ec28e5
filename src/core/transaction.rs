use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

/// Local transaction id generator
static LOCAL_TRANSACTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Global two-phase-commit transaction branch identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Xid {
    pub format_id: i32,
    pub global_id: Vec<u8>,
    pub branch_qualifier: Vec<u8>,
}

impl Xid {
    pub fn new(format_id: i32, global_id: impl Into<Vec<u8>>, branch_qualifier: impl Into<Vec<u8>>) -> Self {
        Xid {
            format_id,
            global_id: global_id.into(),
            branch_qualifier: branch_qualifier.into(),
        }
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.format_id)?;
        for b in &self.global_id {
            write!(f, "{:02x}", b)?;
        }
        f.write_str(":")?;
        for b in &self.branch_qualifier {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Who owns a set of deltas.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TxIdentity {
    /// Enlisted in an externally managed two-phase-commit transaction
    Global(Xid),
    /// Implicit transaction with commit-on-call semantics
    Local(u64),
}

impl fmt::Display for TxIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxIdentity::Global(xid) => write!(f, "xid:{}", xid),
            TxIdentity::Local(id) => write!(f, "local:{}", id),
        }
    }
}

/// Transaction-scoped handle passed to every engine call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionContext {
    identity: TxIdentity,
}

impl TransactionContext {
    /// A fresh implicit transaction.
    pub fn local() -> Self {
        let id = LOCAL_TRANSACTION_COUNTER.fetch_add(1, Ordering::SeqCst);
        TransactionContext { identity: TxIdentity::Local(id) }
    }

    pub fn global(xid: Xid) -> Self {
        TransactionContext { identity: TxIdentity::Global(xid) }
    }

    pub fn identity(&self) -> &TxIdentity {
        &self.identity
    }

    pub fn xid(&self) -> Option<&Xid> {
        match &self.identity {
            TxIdentity::Global(xid) => Some(xid),
            TxIdentity::Local(_) => None,
        }
    }
}

impl fmt::Display for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.identity.fmt(f)
    }
}
