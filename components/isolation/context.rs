/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The key used to scope an isolated-origin lookup to one decision.

use base::id::BrowserContextId;

/// Identifies which isolation rules apply to a single site-assignment
/// decision: the browser context (profile) making the decision, and the point
/// in time it is anchored to.
///
/// Isolated origins added at runtime only take effect in BrowsingInstances
/// created afterwards. Each BrowsingInstance snapshots the registry
/// generation when it is created; a context bound to that BrowsingInstance
/// only sees entries that were already active at the snapshot, while a
/// context for a future BrowsingInstance sees everything registered so far.
///
/// Contexts are created fresh per decision and own nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IsolationContext {
    browser_context: BrowserContextId,
    /// Registry generation this decision is anchored to; `None` means the
    /// decision is for a BrowsingInstance that does not exist yet.
    generation: Option<u64>,
}

impl IsolationContext {
    /// A context for a decision that will create a new BrowsingInstance.
    pub fn for_future_browsing_instance(browser_context: BrowserContextId) -> IsolationContext {
        IsolationContext {
            browser_context,
            generation: None,
        }
    }

    /// A context anchored to an existing BrowsingInstance's registry
    /// generation snapshot.
    pub fn for_browsing_instance(
        browser_context: BrowserContextId,
        generation: u64,
    ) -> IsolationContext {
        IsolationContext {
            browser_context,
            generation: Some(generation),
        }
    }

    pub fn browser_context(&self) -> BrowserContextId {
        self.browser_context
    }

    /// Whether an entry that became active at `entry_generation` is visible
    /// to this decision.
    pub fn honors_generation(&self, entry_generation: u64) -> bool {
        match self.generation {
            Some(generation) => entry_generation <= generation,
            None => true,
        }
    }
}
