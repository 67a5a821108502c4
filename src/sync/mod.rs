//! The sync module deals with keeping the rasterizer pipeline consistent and with learning when it
//! finished work.
//!
//! - The [`autosync`] module tracks which state categories are in use and decides which sync commands
//! must precede a state change.
//! - The [`completion`] module receives full-sync signals and dispatches them to registered callbacks.
//! - The [`fence`] module provides [`Completion`](fence::Completion), an implementation of
//! [`Future`](std::future::Future) that resolves once a full-sync completed.

pub mod autosync;
pub mod completion;
pub mod fence;
