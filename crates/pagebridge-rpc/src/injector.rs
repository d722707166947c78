// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Script injector: the set of scripts that must exist in every document.

use pagebridge_core::types::{FrameScope, LoadTime, ScriptEntry};
use tracing::trace;

#[derive(Debug, Clone)]
struct Slot {
    entry: ScriptEntry,
    /// Pinned scripts (the bridge runtime) cannot be removed.
    pinned: bool,
    /// Handed to the engine, which runs it ahead of page code itself.
    preloaded: bool,
}

/// Insertion-ordered script entries, applied per document lifecycle event.
#[derive(Debug, Clone, Default)]
pub struct ScriptInjector {
    slots: Vec<Slot>,
}

impl ScriptInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry`. Returns `false` if an entry with the same code, timing
    /// and scope is already present.
    pub fn add(&mut self, entry: ScriptEntry) -> bool {
        self.push(entry, false)
    }

    /// Add an entry that [`ScriptInjector::remove`] never touches.
    pub fn add_pinned(&mut self, entry: ScriptEntry) -> bool {
        self.push(entry, true)
    }

    fn push(&mut self, entry: ScriptEntry, pinned: bool) -> bool {
        if self.slots.iter().any(|slot| slot.entry.same_identity(&entry)) {
            trace!(timing = %entry.timing, "duplicate script ignored");
            return false;
        }
        self.slots.push(Slot {
            entry,
            pinned,
            preloaded: false,
        });
        true
    }

    /// Offer persistent creation scripts not yet preloaded to `accept`, as one
    /// joined source. When `accept` takes it, those entries are skipped by
    /// later [`ScriptInjector::materialize`] calls. Returns how many entries
    /// were preloaded.
    pub fn preload<F>(&mut self, accept: F) -> usize
    where
        F: FnOnce(&str) -> bool,
    {
        let due: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                !slot.preloaded
                    && slot.entry.persistent
                    && slot.entry.timing == LoadTime::Creation
            })
            .map(|(index, _)| index)
            .collect();
        if due.is_empty() {
            return 0;
        }

        let source = due
            .iter()
            .map(|&index| wrap(&self.slots[index].entry))
            .collect::<Vec<_>>()
            .join("\n");
        if !accept(&source) {
            return 0;
        }
        for &index in &due {
            self.slots[index].preloaded = true;
        }
        due.len()
    }

    /// Remove every unpinned entry matching `predicate`; returns how many.
    ///
    /// A preloaded entry keeps running in documents the engine creates.
    pub fn remove<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&ScriptEntry) -> bool,
    {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.pinned || !predicate(&slot.entry));
        before - self.slots.len()
    }

    /// Joined source for `timing`, or `None` when nothing is due.
    ///
    /// One-shot entries for `timing` are consumed by this call.
    pub fn materialize(&mut self, timing: LoadTime) -> Option<String> {
        let mut parts = Vec::new();
        for slot in self
            .slots
            .iter()
            .filter(|slot| slot.entry.timing == timing && !slot.preloaded)
        {
            parts.push(wrap(&slot.entry));
        }
        self.slots
            .retain(|slot| slot.entry.timing != timing || slot.entry.persistent);

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.slots.iter().map(|slot| &slot.entry)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn wrap(entry: &ScriptEntry) -> String {
    match entry.scope {
        FrameScope::TopOnly => format!("if (window.self === window.top) {{\n{}\n}}", entry.code),
        FrameScope::AllFrames => format!("{{\n{}\n}}", entry.code),
    }
}
