use crate::core::error::Result;
use crate::core::transaction::Xid;

/// Outcome of the prepare phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Ok,
    /// Nothing to commit; the branch is finished
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFlags {
    /// A new branch
    NoFlags,
    /// Another thread joins an existing branch
    Join,
    /// Continues a suspended branch
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndFlags {
    Success,
    Suspend,
    /// The branch will be rolled back
    Fail,
}

/// Participant side of a two-phase-commit protocol, keyed by branch id.
///
/// `commit` with `one_phase` skips the prepare phase and is only valid for
/// a branch touching a single store.
pub trait Resource: Send + Sync {
    fn start(&self, xid: &Xid, flags: StartFlags) -> Result<()>;

    fn end(&self, xid: &Xid, flags: EndFlags) -> Result<()>;

    fn prepare(&self, xid: &Xid) -> Result<Vote>;

    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<()>;

    fn rollback(&self, xid: &Xid) -> Result<()>;

    /// Branches prepared before a restart and not yet resolved.
    fn recover(&self) -> Result<Vec<Xid>>;

    fn forget(&self, xid: &Xid) -> Result<()>;
}
