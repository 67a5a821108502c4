//! The core module holds the pieces every other module builds on: settings, errors, the shared state
//! record and the submission queue interface.

pub mod debug;
pub mod error;
pub mod queue;
pub mod settings;
pub mod state;
