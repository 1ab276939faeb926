/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The process-wide store of isolated-origin declarations.
//!
//! Lookups run on every navigation, so entries are bucketed by the
//! registrable domain of their host: a lookup touches one bucket, not the
//! whole registry. The registry is read-mostly (mutated at startup plus
//! occasional dynamic updates), so it lives behind an `RwLock` and handles
//! are arc-shared; collaborators on other threads may issue read-only
//! queries, while mutation is reserved to the engine's decision sequencer.

use std::collections::HashMap;
use std::sync::Arc;

use base::id::BrowserContextId;
use cordon_url::ImmutableOrigin;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::context::IsolationContext;

/// Where an isolated-origin declaration came from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum IsolatedOriginSource {
    CommandLine,
    FieldTrial,
    Policy,
    BuiltIn,
    /// Added dynamically at runtime, for example in response to a heuristic
    /// like a password being typed on the origin. Also used by tests.
    Runtime,
}

#[derive(Clone, Debug)]
struct IsolatedOriginEntry {
    origin: ImmutableOrigin,
    #[allow(dead_code)]
    source: IsolatedOriginSource,
    /// `None` applies to every browser context.
    browser_context: Option<BrowserContextId>,
    /// Registry generation at which this entry became active. Only
    /// BrowsingInstances created at or after this generation honor it.
    active_from: u64,
}

#[derive(Default)]
struct RegistryState {
    /// Bumped by every successful add; BrowsingInstances snapshot it at
    /// creation to give dynamic additions their forward-only scope.
    generation: u64,
    /// Buckets keyed by the registrable domain of the entry's host.
    entries: HashMap<String, Vec<IsolatedOriginEntry>>,
}

/// Shared handle to the isolated-origin registry. Cloning is cheap and all
/// clones observe the same state.
#[derive(Clone, Default)]
pub struct IsolatedOriginRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl IsolatedOriginRegistry {
    pub fn new() -> IsolatedOriginRegistry {
        Default::default()
    }

    /// Registers `origins` as isolated. Opaque origins are silently dropped:
    /// a malformed entry in an origin list must never poison the rest of the
    /// list or surface an error into the navigation path. Re-adding an
    /// already-present origin is harmless; lookups deduplicate.
    ///
    /// Additions are monotonic for the lifetime of the process; there is no
    /// removal short of [`reset_for_testing`](Self::reset_for_testing).
    ///
    /// Returns the new registry generation.
    pub fn add_isolated_origins(
        &self,
        origins: Vec<ImmutableOrigin>,
        source: IsolatedOriginSource,
        browser_context: Option<BrowserContextId>,
    ) -> u64 {
        let mut state = self.state.write();
        state.generation += 1;
        let generation = state.generation;
        for origin in origins {
            let Some(domain) = origin.registrable_domain() else {
                debug!("Dropping opaque origin from isolated-origin list");
                continue;
            };
            state.entries.entry(domain).or_default().push(IsolatedOriginEntry {
                origin,
                source,
                browser_context,
                active_from: generation,
            });
        }
        generation
    }

    /// The current generation. BrowsingInstances snapshot this at creation.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Whether `origin` matches a registered isolated origin (exactly or as
    /// a subdomain) visible to `context`.
    pub fn is_isolated_origin(&self, context: &IsolationContext, origin: &ImmutableOrigin) -> bool {
        self.isolated_origin_for(context, origin).is_some()
    }

    /// The registered isolated origin that `origin` maps onto, if any, using
    /// longest-registered-match semantics: with both `foo.com` and
    /// `isolated.foo.com` registered, `sub.isolated.foo.com` maps onto
    /// `isolated.foo.com`.
    pub fn isolated_origin_for(
        &self,
        context: &IsolationContext,
        origin: &ImmutableOrigin,
    ) -> Option<ImmutableOrigin> {
        let domain = origin.registrable_domain()?;
        let state = self.state.read();
        let bucket = state.entries.get(&domain)?;
        bucket
            .iter()
            .filter(|entry| {
                entry
                    .browser_context
                    .is_none_or(|profile| profile == context.browser_context())
            })
            .filter(|entry| context.honors_generation(entry.active_from))
            .filter(|entry| origin.is_same_or_subdomain_of(&entry.origin))
            .max_by_key(|entry| entry.origin.host().map_or(0, |host| host.to_string().len()))
            .map(|entry| entry.origin.clone())
    }

    /// Drops every entry and resets the generation counter. Test use only;
    /// production additions are monotonic.
    pub fn reset_for_testing(&self) {
        *self.state.write() = Default::default();
    }
}
