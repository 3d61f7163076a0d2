// src/watch/mod.rs

//! Change-watch engine for the remote configuration store.
//!
//! This module is responsible for:
//! - Fingerprinting entry content so real changes can be told apart from
//!   spurious notifications.
//! - Encoding the watch set for the long-poll listener and decoding the
//!   server's list of possibly-changed entries.
//! - Resolving each notification into `Unchanged` / `Deleted` / `Updated`.
//! - Driving the poll → resolve → dispatch loop until cancelled.
//!
//! It does **not** know what the entries mean; reacting to a change is the
//! job of the [`ChangeHandler`] supplied by the caller.

pub mod fingerprint;
pub mod handler;
pub mod protocol;
pub mod resolver;
pub mod transport;
pub mod watch_loop;
pub mod watch_set;

pub use fingerprint::{fingerprint, Fingerprint};
pub use handler::{ChangeEvent, ChangeHandler, ChangeKind};
pub use resolver::{
    classify, resolve_key, ChangeNotification, ChangeResolver, FetchOutcome, Resolution,
    ResolvedChange,
};
pub use transport::{HttpLongPoll, LongPollTransport};
pub use watch_loop::{CycleReport, WatchLoop, WatchOptions};
pub use watch_set::WatchSet;
