//! One-shot completions and cancellation for asynchronous tile loads.
//!
//! Every load gets a [`Ticket`], a [`CancelToken`] shared between the store
//! and the loader, and a [`Completion`] the loader resolves exactly once.
//! Resolving a cancelled completion delivers nothing and hands the value
//! back to the loader. The store also discards results whose ticket no
//! longer matches the entry, so a late result can never mutate state it no
//! longer belongs to.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use vista_core::Tile;

use crate::error::LoadError;

/// Identifier of a single load attempt.
pub type Ticket = u64;

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a loader hands back to stop a load it started.
///
/// Cancelling runs the loader's cancel action at most once; later calls,
/// including calls after the load already finished, do nothing.
pub struct CancelHandle {
    action: Option<Box<dyn FnOnce()>>,
}

impl CancelHandle {
    /// A handle that runs `action` on first cancel.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// A handle that cancels `token`.
    pub fn from_token(token: CancelToken) -> Self {
        Self::new(move || token.cancel())
    }

    /// A handle for loads that have nothing to abort.
    pub fn noop() -> Self {
        Self { action: None }
    }

    pub fn cancel(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("armed", &self.action.is_some())
            .finish()
    }
}

/// A finished load as delivered to the store.
#[derive(Debug)]
pub struct Completed<T> {
    pub ticket: Ticket,
    pub tile: Tile,
    pub result: Result<T, LoadError>,
}

/// One-shot result slot for a load.
///
/// `Completion` is `Send` whenever `T` is, so loaders may resolve it from a
/// worker thread; the result is queued and processed on the store's thread.
/// Dropping it unresolved means the load never completes.
pub struct Completion<T> {
    ticket: Ticket,
    tile: Tile,
    token: CancelToken,
    sender: Sender<Completed<T>>,
}

impl<T> Completion<T> {
    pub fn new(ticket: Ticket, tile: Tile, token: CancelToken, sender: Sender<Completed<T>>) -> Self {
        Self {
            ticket,
            tile,
            token,
            sender,
        }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn tile(&self) -> Tile {
        self.tile
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Deliver `result`.
    ///
    /// When the load was cancelled or the store is gone nothing is
    /// delivered and `result` comes back in the error, so the caller can
    /// release whatever it holds.
    pub fn complete(self, result: Result<T, LoadError>) -> Result<(), Result<T, LoadError>> {
        if self.token.is_cancelled() {
            return Err(result);
        }
        self.sender
            .send(Completed {
                ticket: self.ticket,
                tile: self.tile,
                result,
            })
            .map_err(|err| err.into_inner().result)
    }

    /// Deliver `value`. Returns it back if it was not delivered.
    #[must_use = "an undelivered value must be released by the caller"]
    pub fn succeed(self, value: T) -> Option<T> {
        self.complete(Ok(value)).err().and_then(Result::ok)
    }

    /// Deliver `error`. Returns `false` if it was not delivered.
    pub fn fail(self, error: LoadError) -> bool {
        self.complete(Err(error)).is_ok()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("ticket", &self.ticket)
            .field("tile", &self.tile)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
