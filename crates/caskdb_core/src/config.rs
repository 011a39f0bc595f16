//! Open-time configuration for a datastore.

/// Options accepted by [`Database::open`](crate::Database::open).
///
/// Options fall in two categories: access permission (`ReadOnly` /
/// `ReadWrite`) and durability (`SyncOnPut` / `SyncOnDemand`). The
/// defaults are `ReadOnly` and `SyncOnDemand`; supplying the
/// non-default option of a category switches it on regardless of
/// position, so a write option always wins over a read option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOption {
    /// Open for reading only. Any number of reader processes may share
    /// the datastore, but none may coexist with a writer.
    ReadOnly,
    /// Open for reading and writing. At most one writer may hold the
    /// datastore; creates the directory if it does not exist.
    ReadWrite,
    /// fsync the active segment after every append, so each `put` is
    /// durable before it returns.
    SyncOnPut,
    /// Defer durability to explicit `sync` or to `close` (the default).
    SyncOnDemand,
}

/// Access permission resolved from the option list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Shared, read-only access.
    ReadOnly,
    /// Exclusive, read-write access.
    ReadWrite,
}

/// Durability policy resolved from the option list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Durability deferred to `sync` / `close`.
    OnDemand,
    /// fsync after every append.
    OnPut,
}

/// Options resolved from the list passed to `open`.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Access permission for this handle.
    pub access: AccessMode,
    /// Durability policy for the active segment.
    pub sync: SyncPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            access: AccessMode::ReadOnly,
            sync: SyncPolicy::OnDemand,
        }
    }
}

impl Options {
    /// Resolves an option list against the defaults.
    #[must_use]
    pub fn parse(opts: &[OpenOption]) -> Self {
        let mut options = Self::default();

        for opt in opts {
            match opt {
                OpenOption::ReadWrite => options.access = AccessMode::ReadWrite,
                OpenOption::SyncOnPut => options.sync = SyncPolicy::OnPut,
                // The defaults; accepted for symmetry.
                OpenOption::ReadOnly | OpenOption::SyncOnDemand => {}
            }
        }

        options
    }

    /// Returns true if this handle may write.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.access == AccessMode::ReadWrite
    }

    /// Returns true if every append must be fsynced before returning.
    #[must_use]
    pub fn sync_on_put(&self) -> bool {
        self.sync == SyncPolicy::OnPut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::parse(&[]);
        assert_eq!(options.access, AccessMode::ReadOnly);
        assert_eq!(options.sync, SyncPolicy::OnDemand);
        assert!(!options.is_writable());
        assert!(!options.sync_on_put());
    }

    #[test]
    fn read_write_with_sync() {
        let options = Options::parse(&[OpenOption::ReadWrite, OpenOption::SyncOnPut]);
        assert!(options.is_writable());
        assert!(options.sync_on_put());
    }

    #[test]
    fn write_option_wins_over_read() {
        let options = Options::parse(&[OpenOption::ReadWrite, OpenOption::ReadOnly]);
        assert!(options.is_writable());

        let options = Options::parse(&[OpenOption::ReadOnly, OpenOption::ReadWrite]);
        assert!(options.is_writable());
    }

    #[test]
    fn sync_on_put_wins_over_on_demand() {
        let options = Options::parse(&[OpenOption::SyncOnDemand, OpenOption::SyncOnPut]);
        assert!(options.sync_on_put());
    }
}
