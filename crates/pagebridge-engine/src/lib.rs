// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Pagebridge — Web engine capability abstractions.
//!
//! The bridge core talks to whatever renders the page through the narrow
//! [`traits::Engine`] interface: execute a script, receive posted strings,
//! hop onto the UI thread, and observe document lifecycle events. Each
//! rendering backend implements it once.

pub mod traits;

pub mod headless;

#[cfg(feature = "wry")]
pub mod webview;

pub use headless::HeadlessEngine;
pub use traits::Engine;
