//! Delivery of full-sync completions.
//!
//! A full-sync command drains the whole rasterizer pipeline and carries a callback handle plus one
//! argument word. Right before the command reaches the rasterizer, the microcode stores a copy of it
//! in the [`StateRecord`]. Once the rasterizer is idle, it raises the full-sync signal and
//! [`CompletionChannel::service_interrupt()`] runs: it decodes the stored command, acknowledges the
//! signal so the next full-sync can already be processed, and only then invokes the callback.
//!
//! Callbacks are not raw addresses: they are registered in a table and referred to by a
//! [`CallbackHandle`], whose id fits the 24 argument bits of the command's first word.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::channel::oneshot;

use crate::core::state::StateRecord;
use crate::sync::fence::Completion;
use crate::Error;

/// Largest callback id that fits in a full-sync command.
pub const MAX_CALLBACK_ID: u32 = 0x00FF_FFFF;

type Callback = Arc<dyn Fn(u32) + Send + Sync>;

/// Handle to a registered completion callback. Id zero is reserved for "no callback".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    /// The id encoded into the full-sync command.
    pub fn id(&self) -> u32 {
        self.0
    }
}

struct CallbackEntry {
    callback: Callback,
    once: bool,
}

/// Ids are handed out in increasing order and only wrap around after [`MAX_CALLBACK_ID`]
/// registrations, so a full-sync still holding a removed id does not reach a newer callback.
struct CallbackTable {
    entries: HashMap<u32, CallbackEntry>,
    next_id: u32,
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }
}

impl CallbackTable {
    fn insert(&mut self, entry: CallbackEntry) -> Result<CallbackHandle> {
        if self.entries.len() >= MAX_CALLBACK_ID as usize {
            anyhow::bail!(Error::CallbackTableFull);
        }
        let id = loop {
            let id = self.next_id;
            self.next_id = if id == MAX_CALLBACK_ID { 1 } else { id + 1 };
            if !self.entries.contains_key(&id) {
                break id;
            }
        };
        self.entries.insert(id, entry);
        Ok(CallbackHandle(id))
    }

    fn remove(&mut self, handle: CallbackHandle) -> bool {
        self.entries.remove(&handle.0).is_some()
    }

    /// Resolve an id to its callback. One-shot entries are removed on the way out.
    fn resolve(&mut self, id: u32) -> Option<Callback> {
        let entry = self.entries.get(&id)?;
        let callback = entry.callback.clone();
        if entry.once {
            self.entries.remove(&id);
        }
        Some(callback)
    }
}

/// Clears the handler's mask when dropped, so a panicking callback does not lock the handler out.
struct Unmask<'a>(&'a AtomicBool);

impl Drop for Unmask<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Receives full-sync signals and runs the callbacks they carry.
///
/// The channel is shared between the producer, which registers callbacks and issues full-syncs, and
/// whatever services the interrupt. The handler only touches the state record, its own flags and the
/// callback table; it never reaches into recorded blocks.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CompletionChannel {
    #[derivative(Debug = "ignore")]
    state: Arc<StateRecord>,
    #[derivative(Debug = "ignore")]
    callbacks: Mutex<CallbackTable>,
    enabled: AtomicBool,
    pending: AtomicBool,
    masked: AtomicBool,
}

/// Split a stored full-sync command into callback id and argument.
pub fn decode_sync_full(command: u64) -> (u32, u32) {
    let id = ((command >> 32) as u32) & MAX_CALLBACK_ID;
    let argument = command as u32;
    (id, argument)
}

impl CompletionChannel {
    /// Create a channel reading full-sync snapshots from `state`. The interrupt starts out disabled.
    pub fn new(state: Arc<StateRecord>) -> Self {
        Self {
            state,
            callbacks: Mutex::new(CallbackTable::default()),
            enabled: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            masked: AtomicBool::new(false),
        }
    }

    /// Register a callback that runs on every full-sync carrying the returned handle.
    /// # Errors
    /// * Fails if the callback table is full.
    pub fn register(&self, callback: impl Fn(u32) + Send + Sync + 'static) -> Result<CallbackHandle> {
        let mut table = self.callbacks.lock().map_err(|_| Error::PoisonError)?;
        table.insert(CallbackEntry {
            callback: Arc::new(callback),
            once: false,
        })
    }

    /// Register a callback that is removed from the table after it fired once.
    /// # Errors
    /// * Fails if the callback table is full.
    pub fn register_once(&self, callback: impl Fn(u32) + Send + Sync + 'static) -> Result<CallbackHandle> {
        let mut table = self.callbacks.lock().map_err(|_| Error::PoisonError)?;
        table.insert(CallbackEntry {
            callback: Arc::new(callback),
            once: true,
        })
    }

    /// Register a one-shot entry and return a future resolving to the argument of the full-sync
    /// that fires it.
    /// # Errors
    /// * Fails if the callback table is full.
    pub fn register_completion(&self) -> Result<(CallbackHandle, Completion)> {
        let (sender, receiver) = oneshot::channel();
        let sender = Mutex::new(Some(sender));
        let handle = self.register_once(move |argument| {
            if let Some(sender) = sender.lock().ok().and_then(|mut sender| sender.take()) {
                // The receiver may have been dropped, nobody is waiting then.
                let _ = sender.send(argument);
            }
        })?;
        Ok((handle, Completion::new(receiver)))
    }

    /// Remove a callback. Full-syncs already queued with this handle will find nothing to call.
    /// Returns whether the handle was registered.
    /// # Errors
    /// * Fails if the callback table lock is poisoned.
    pub fn unregister(&self, handle: CallbackHandle) -> Result<bool> {
        let mut table = self.callbacks.lock().map_err(|_| Error::PoisonError)?;
        Ok(table.remove(handle))
    }

    /// Enable or disable servicing of the full-sync signal.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Raise the full-sync signal. This is the GPU side's job, after the rasterizer went idle.
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Whether a full-sync signal is waiting to be serviced.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Service the full-sync signal. Returns `false` without doing anything if the interrupt is
    /// disabled or the handler is already running, in which case the signal stays pending.
    /// # Panics
    /// Panics if called while no signal is pending.
    pub fn service_interrupt(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if self.masked.swap(true, Ordering::AcqRel) {
            warn!("Full-sync interrupt raised while its handler is running, leaving it pending.");
            return false;
        }
        let _unmask = Unmask(&self.masked);

        assert!(self.is_pending(), "full-sync interrupt serviced without a pending signal");

        let (id, argument) = decode_sync_full(self.state.sync_full());

        // Acknowledge before running the callback, so further full-syncs are not held up by it.
        self.pending.store(false, Ordering::Release);

        if id != 0 {
            match self.resolve(id) {
                Ok(Some(callback)) => {
                    trace!("Full sync completed, invoking callback #{} with argument {:#x}", id, argument);
                    callback(argument);
                }
                Ok(None) => warn!("Full sync completed with unknown callback #{}", id),
                Err(err) => error!("Full sync completed, but callback #{} could not be looked up: {}", id, err),
            }
        }
        true
    }

    fn resolve(&self, id: u32) -> Result<Option<Callback>> {
        let mut table = self.callbacks.lock().map_err(|_| Error::PoisonError)?;
        Ok(table.resolve(id))
    }
}
