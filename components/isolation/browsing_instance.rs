/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The graph of BrowsingInstances and SiteInstances.
//!
//! A BrowsingInstance groups the SiteInstances that can reach each other
//! through `window.opener`, `window.open`, and frame references; membership
//! decides script reachability, so two same-site frames in one
//! BrowsingInstance must resolve to the same SiteInstance, and every frame
//! must be able to reach every other SiteInstance in its BrowsingInstance at
//! least through a proxy.
//!
//! Ownership is arena-style: the graph owns both maps, ids are the only
//! cross-references, and SiteInstances are kept alive by explicit reference
//! counts held by frames and in-flight navigations.

use std::collections::{HashMap, HashSet};

use base::id::{BrowserContextId, BrowsingInstanceId, ProcessId, SiteInstanceId};
use log::warn;
use uuid::Uuid;

use crate::context::IsolationContext;
use crate::process::ProcessReusePolicy;
use crate::site_info::SiteInfo;
use crate::site_instance::SiteInstance;

/// A group of mutually-scriptable SiteInstances.
#[derive(Debug)]
pub struct BrowsingInstance {
    id: BrowsingInstanceId,
    browser_context: BrowserContextId,
    /// Registry generation snapshotted at creation; isolated origins added
    /// later are invisible to site computations anchored here.
    isolation_generation: u64,
    site_instances: Vec<SiteInstanceId>,
    /// Token for the session-storage namespace shared by documents in this
    /// BrowsingInstance. Carried over on a forced swap so same-origin
    /// storage continuity survives the severed script relationship.
    session_storage_token: Uuid,
}

impl BrowsingInstance {
    pub fn id(&self) -> BrowsingInstanceId {
        self.id
    }

    pub fn browser_context(&self) -> BrowserContextId {
        self.browser_context
    }

    pub fn isolation_generation(&self) -> u64 {
        self.isolation_generation
    }

    pub fn session_storage_token(&self) -> Uuid {
        self.session_storage_token
    }

    pub fn site_instances(&self) -> &[SiteInstanceId] {
        &self.site_instances
    }

    /// The lookup context for decisions inside this BrowsingInstance.
    pub fn isolation_context(&self) -> IsolationContext {
        IsolationContext::for_browsing_instance(self.browser_context, self.isolation_generation)
    }
}

/// What fell out of releasing a SiteInstance reference.
#[derive(Debug, Default)]
pub struct ReleaseOutcome {
    /// Set when the reference was the last one and the SiteInstance died.
    pub destroyed: Option<DestroyedSiteInstance>,
}

#[derive(Debug)]
pub struct DestroyedSiteInstance {
    pub site_instance: SiteInstanceId,
    /// The site/process pair to uncount, when the instance had committed.
    pub committed: Option<(ProcessId, SiteInfo)>,
    /// The process of the destroyed instance, when no surviving
    /// SiteInstance references it any more; the caller should tear the
    /// process entry down.
    pub process_unreferenced: Option<ProcessId>,
    /// Set when this was the last SiteInstance of its BrowsingInstance.
    pub browsing_instance_destroyed: bool,
}

#[derive(Default)]
pub struct BrowsingInstanceGraph {
    browsing_instances: HashMap<BrowsingInstanceId, BrowsingInstance>,
    site_instances: HashMap<SiteInstanceId, SiteInstance>,
    /// Proxy bookkeeping: for each SiteInstance, the other SiteInstances in
    /// its BrowsingInstance it currently holds proxies for.
    proxies: HashMap<SiteInstanceId, HashSet<SiteInstanceId>>,
}

impl BrowsingInstanceGraph {
    pub fn new() -> BrowsingInstanceGraph {
        Default::default()
    }

    pub fn create_browsing_instance(
        &mut self,
        browser_context: BrowserContextId,
        isolation_generation: u64,
    ) -> BrowsingInstanceId {
        let id = BrowsingInstanceId::new();
        self.browsing_instances.insert(
            id,
            BrowsingInstance {
                id,
                browser_context,
                isolation_generation,
                site_instances: Vec::new(),
                session_storage_token: Uuid::new_v4(),
            },
        );
        id
    }

    /// Creates a BrowsingInstance that continues another's session-storage
    /// namespace. Used by the forced-swap path: script relationships are
    /// severed, storage continuity is not.
    pub fn create_browsing_instance_continuing_storage(
        &mut self,
        predecessor: BrowsingInstanceId,
        isolation_generation: u64,
    ) -> Option<BrowsingInstanceId> {
        let old = self.browsing_instances.get(&predecessor)?;
        let browser_context = old.browser_context;
        let token = old.session_storage_token;
        let id = self.create_browsing_instance(browser_context, isolation_generation);
        if let Some(new) = self.browsing_instances.get_mut(&id) {
            new.session_storage_token = token;
        }
        Some(id)
    }

    pub fn browsing_instance(&self, id: BrowsingInstanceId) -> Option<&BrowsingInstance> {
        self.browsing_instances.get(&id)
    }

    pub fn site_instance(&self, id: SiteInstanceId) -> Option<&SiteInstance> {
        self.site_instances.get(&id)
    }

    /// Creates a SiteInstance in `browsing_instance`. Starts unreferenced;
    /// the caller must `add_ref` before yielding control.
    pub fn create_site_instance(
        &mut self,
        browsing_instance: BrowsingInstanceId,
        site: Option<SiteInfo>,
        process_reuse_policy: ProcessReusePolicy,
    ) -> SiteInstanceId {
        let id = SiteInstanceId::new();
        self.site_instances.insert(
            id,
            SiteInstance::new(id, browsing_instance, site, process_reuse_policy),
        );
        if let Some(instance) = self.browsing_instances.get_mut(&browsing_instance) {
            instance.site_instances.push(id);
        } else {
            warn!("SiteInstance {} created in unknown BrowsingInstance", id);
        }
        self.update_proxies(browsing_instance);
        id
    }

    /// Returns the SiteInstance for `target_site` in the same
    /// BrowsingInstance as `existing`, creating it if none exists yet.
    ///
    /// The lookup is what keeps same-origin frames co-located: two `c.com`
    /// iframes under different parents resolve to one SiteInstance and
    /// therefore one process, which same-origin synchronous scripting
    /// requires.
    pub fn get_or_create_related_site_instance(
        &mut self,
        existing: SiteInstanceId,
        target_site: &SiteInfo,
        process_reuse_policy: ProcessReusePolicy,
    ) -> Option<SiteInstanceId> {
        let browsing_instance = self.site_instances.get(&existing)?.browsing_instance();
        let instance = self.browsing_instances.get(&browsing_instance)?;
        let found = instance.site_instances.iter().copied().find(|id| {
            self.site_instances
                .get(id)
                .and_then(SiteInstance::site)
                .is_some_and(|site| site == target_site)
        });
        match found {
            Some(id) => Some(id),
            None => Some(self.create_site_instance(
                browsing_instance,
                Some(target_site.clone()),
                process_reuse_policy,
            )),
        }
    }

    pub fn are_related(&self, a: SiteInstanceId, b: SiteInstanceId) -> bool {
        match (self.site_instances.get(&a), self.site_instances.get(&b)) {
            (Some(a), Some(b)) => a.browsing_instance() == b.browsing_instance(),
            _ => false,
        }
    }

    pub fn set_site(&mut self, id: SiteInstanceId, site: SiteInfo) {
        if let Some(instance) = self.site_instances.get_mut(&id) {
            instance.set_site(site);
        }
    }

    pub fn set_process(&mut self, id: SiteInstanceId, process: ProcessId) {
        if let Some(instance) = self.site_instances.get_mut(&id) {
            instance.set_process(process);
        }
    }

    pub(crate) fn mark_counted_in_process(&mut self, id: SiteInstanceId) -> bool {
        match self.site_instances.get_mut(&id) {
            Some(instance) if !instance.counted_in_process => {
                instance.counted_in_process = true;
                true
            },
            _ => false,
        }
    }

    pub fn add_ref(&mut self, id: SiteInstanceId) {
        match self.site_instances.get_mut(&id) {
            Some(instance) => instance.refcount += 1,
            None => warn!("add_ref on unknown SiteInstance {}", id),
        }
    }

    /// Drops one reference; on the last one, destroys the SiteInstance and
    /// cascades: its BrowsingInstance dies with its last SiteInstance, and
    /// the caller is told when its process lost its last referent.
    pub fn release(&mut self, id: SiteInstanceId) -> ReleaseOutcome {
        let Some(instance) = self.site_instances.get_mut(&id) else {
            warn!("release of unknown SiteInstance {}", id);
            return ReleaseOutcome::default();
        };
        debug_assert!(instance.refcount > 0, "SiteInstance refcount underflow");
        instance.refcount = instance.refcount.saturating_sub(1);
        if instance.refcount > 0 {
            return ReleaseOutcome::default();
        }

        let Some(instance) = self.site_instances.remove(&id) else {
            return ReleaseOutcome::default();
        };
        self.proxies.remove(&id);

        let committed = match (instance.counted_in_process, instance.process(), instance.site()) {
            (true, Some(process), Some(site)) => Some((process, site.clone())),
            _ => None,
        };

        let process_unreferenced = instance.process().filter(|process| {
            !self
                .site_instances
                .values()
                .any(|other| other.process() == Some(*process))
        });

        let browsing_instance = instance.browsing_instance();
        let mut browsing_instance_destroyed = false;
        if let Some(group) = self.browsing_instances.get_mut(&browsing_instance) {
            group.site_instances.retain(|member| *member != id);
            if group.site_instances.is_empty() {
                self.browsing_instances.remove(&browsing_instance);
                browsing_instance_destroyed = true;
            } else {
                self.update_proxies(browsing_instance);
            }
        }

        ReleaseOutcome {
            destroyed: Some(DestroyedSiteInstance {
                site_instance: id,
                committed,
                process_unreferenced,
                browsing_instance_destroyed,
            }),
        }
    }

    /// Whether any live SiteInstance still runs in `process`.
    pub fn process_in_use(&self, process: ProcessId) -> bool {
        self.site_instances
            .values()
            .any(|instance| instance.process() == Some(process))
    }

    /// The proxies a SiteInstance currently holds for its group.
    pub fn proxies_for(&self, id: SiteInstanceId) -> Option<&HashSet<SiteInstanceId>> {
        self.proxies.get(&id)
    }

    /// Recomputes the proxy sets for one BrowsingInstance: every member
    /// holds a proxy for every other member, so cross-process references
    /// like `window.opener.location` stay assignable regardless of which
    /// members ended up in which processes.
    fn update_proxies(&mut self, browsing_instance: BrowsingInstanceId) {
        let Some(group) = self.browsing_instances.get(&browsing_instance) else {
            return;
        };
        let members = group.site_instances.clone();
        for member in &members {
            let others: HashSet<SiteInstanceId> =
                members.iter().copied().filter(|other| other != member).collect();
            self.proxies.insert(*member, others);
        }
    }
}
