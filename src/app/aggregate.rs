//! Streaming group-by of account rows
//!
//! Stores produce the outer join of a user's accounts and addresses as a flat
//! row stream sorted by account, then address. [`AccountGrouper`] folds that
//! stream into one [`AccountAddresses`] per account without holding more than
//! the account currently being built:
//!
//! ```text
//! NoGroup --row--> GroupOpen --row of next account / end--> flush --> GroupOpen | Done
//!                                                              |
//!                                             visitor Stop ----+---> StoppedEarly
//!                                             visitor Err  ----+---> Aborted
//! ```
//!
//! Rows that are not sorted by account produce split groups; sort order is
//! the store's responsibility.

use super::context::Context;
use super::stores::{StoreError, StoreResult, Visit, VisitResult};
use crate::domain::{AccountAddresses, AccountName, Address};

/// One row of the accounts/addresses outer join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    /// Store-assigned identity of the account
    pub account_id: i64,
    pub account: AccountName,
    /// `None` (or empty) when the account has no addresses
    pub address: Option<Address>,
}

impl AccountRow {
    pub fn new(account_id: i64, account: impl Into<AccountName>, address: Option<Address>) -> Self {
        Self {
            account_id,
            account: account.into(),
            address,
        }
    }
}

/// Folds sorted rows into per-account aggregates and hands each to a visitor
pub struct AccountGrouper<'v> {
    visitor: &'v mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
    current: Option<(i64, AccountAddresses)>,
    delivered: usize,
}

impl<'v> AccountGrouper<'v> {
    pub fn new(visitor: &'v mut (dyn FnMut(AccountAddresses) -> VisitResult + Send)) -> Self {
        Self {
            visitor,
            current: None,
            delivered: 0,
        }
    }

    /// Number of aggregates handed to the visitor so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Feed the next row
    ///
    /// Returns [`Visit::Stop`] once the visitor asked to stop; the caller must
    /// not push further rows after that.
    pub fn push(&mut self, row: AccountRow) -> StoreResult<Visit> {
        let starts_group = match &self.current {
            Some((id, _)) => *id != row.account_id,
            None => true,
        };

        if starts_group {
            if let Some((_, finished)) = self.current.take() {
                if self.flush(finished)? == Visit::Stop {
                    return Ok(Visit::Stop);
                }
            }
            self.current = Some((row.account_id, AccountAddresses::empty(row.account)));
        }

        let address = row.address.filter(|a| !a.as_str().is_empty());
        if let (Some(address), Some((_, group))) = (address, self.current.as_mut()) {
            group.addresses.push(address);
        }

        Ok(Visit::Continue)
    }

    /// Flush the open group, if any, after the last row
    pub fn finish(mut self) -> StoreResult<()> {
        if let Some((_, last)) = self.current.take() {
            self.flush(last)?;
        }
        Ok(())
    }

    fn flush(&mut self, group: AccountAddresses) -> StoreResult<Visit> {
        self.delivered += 1;
        (self.visitor)(group).map_err(StoreError::VisitorAborted)
    }
}

/// Run a sorted row stream through an [`AccountGrouper`]
///
/// Pulls rows lazily, checking the context before each one. Stopping early
/// returns as soon as the visitor asks, dropping the rest of the stream.
pub fn stream_grouped<I>(
    ctx: &Context,
    rows: I,
    visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
) -> StoreResult<()>
where
    I: IntoIterator<Item = StoreResult<AccountRow>>,
{
    let mut grouper = AccountGrouper::new(visitor);

    for row in rows {
        ctx.check()?;
        if grouper.push(row?)? == Visit::Stop {
            tracing::debug!(delivered = grouper.delivered(), "account stream stopped by visitor");
            return Ok(());
        }
    }

    grouper.finish()
}
