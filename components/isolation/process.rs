/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The live registry of renderer processes and the reuse-search that decides
//! whether a navigation gets an existing process or a fresh one.
//!
//! A process's origin lock, once set, holds for the process's lifetime.
//! The allocator must therefore never hand a navigation a process whose lock
//! conflicts with the navigation's site; [`lock_process_if_needed`] treats a
//! conflicting relock as a fatal programming error, because committing into
//! a mismatched lock would be a security-boundary breach.
//!
//! [`lock_process_if_needed`]: ProcessRegistry::lock_process_if_needed

use std::collections::HashMap;

use base::id::ProcessId;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::site_info::SiteInfo;

/// How aggressively a `SiteInstance` tries to reuse an existing process.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ProcessReusePolicy {
    /// Main-frame default: dedicated sites get their own process per
    /// BrowsingInstance; non-dedicated sites share only under budget
    /// pressure.
    Default,
    /// Subframe navigations to isolated origins: reuse any process already
    /// hosting (pending or committed) the same site, even across unrelated
    /// BrowsingInstances, to bound the total isolated-origin process count.
    ReusePendingOrCommittedSite,
}

/// The allocator's view of one renderer process.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    lock: Option<SiteInfo>,
    /// A process stays "unused" until some navigation in it reaches the
    /// response-ready point; until then it remains eligible for reuse by a
    /// concurrently-navigating request.
    is_unused: bool,
    /// Sites about to commit in this process, counted per in-flight
    /// navigation.
    pending_sites: HashMap<SiteInfo, usize>,
    /// Sites committed in this process, counted per live `SiteInstance`.
    committed_sites: HashMap<SiteInfo, usize>,
}

impl Process {
    fn new(id: ProcessId) -> Process {
        Process {
            id,
            lock: None,
            is_unused: true,
            pending_sites: HashMap::new(),
            committed_sites: HashMap::new(),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn lock(&self) -> Option<&SiteInfo> {
        self.lock.as_ref()
    }

    pub fn is_unused(&self) -> bool {
        self.is_unused
    }

    fn hosts_site(&self, site: &SiteInfo) -> bool {
        self.pending_sites.contains_key(site) || self.committed_sites.contains_key(site)
    }

    pub(crate) fn hosts_any_site(&self) -> bool {
        !self.pending_sites.is_empty() || !self.committed_sites.is_empty()
    }

    fn hosts_other_site_than(&self, site: &SiteInfo) -> bool {
        self.pending_sites.keys().any(|hosted| hosted != site) ||
            self.committed_sites.keys().any(|hosted| hosted != site)
    }
}

/// The live process table plus the soft process-count budget.
pub struct ProcessRegistry {
    processes: HashMap<ProcessId, Process>,
    soft_limit: Option<usize>,
}

impl ProcessRegistry {
    pub fn new(soft_limit: Option<usize>) -> ProcessRegistry {
        ProcessRegistry {
            processes: HashMap::new(),
            soft_limit,
        }
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn is_at_soft_limit(&self) -> bool {
        self.soft_limit
            .is_some_and(|limit| self.processes.len() >= limit)
    }

    pub fn get(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    /// The origin lock of a process, for collaborator security checks.
    pub fn origin_lock(&self, id: ProcessId) -> Option<&SiteInfo> {
        self.processes.get(&id).and_then(Process::lock)
    }

    /// Whether `process` may host `site`: false when the process is locked
    /// elsewhere, and false when `site` needs a dedicated process but the
    /// process already hosts, or has started hosting, anything else.
    pub fn is_suitable_host(&self, id: ProcessId, site: &SiteInfo) -> bool {
        let Some(process) = self.processes.get(&id) else {
            return false;
        };
        if let Some(lock) = process.lock() {
            return lock == site;
        }
        if site.requires_dedicated_process() {
            // An unlocked process qualifies for a dedicated site only while
            // nothing else has a claim on it.
            return process.is_unused() && !process.hosts_other_site_than(site);
        }
        // A non-dedicated site must not move into a process that is already
        // committed to becoming someone's dedicated process.
        !process
            .pending_sites
            .keys()
            .chain(process.committed_sites.keys())
            .any(SiteInfo::requires_dedicated_process)
    }

    /// Searches live processes for one this navigation may reuse. Returns
    /// `None` when a fresh process is warranted.
    pub fn find_reusable_process(
        &self,
        site: &SiteInfo,
        reuse_policy: ProcessReusePolicy,
    ) -> Option<ProcessId> {
        // A process already locked to exactly this site can always absorb
        // another same-site document; spawning a second copy would buy no
        // isolation.
        if let Some(process) = self
            .processes
            .values()
            .find(|process| process.lock() == Some(site))
        {
            return Some(process.id);
        }

        if reuse_policy == ProcessReusePolicy::ReusePendingOrCommittedSite {
            // Deliberate memory-over-isolation trade-off: pack same-site
            // isolated documents into one process across unrelated
            // BrowsingInstances rather than spawning another.
            if let Some(process) = self
                .processes
                .values()
                .find(|process| process.hosts_site(site))
            {
                return Some(process.id);
            }
        }

        if !self.is_at_soft_limit() {
            return None;
        }

        // Budget pressure: consolidate onto any suitable host, which only
        // exists for non-dedicated sites at this point.
        if site.requires_dedicated_process() {
            return None;
        }
        self.processes
            .values()
            .find(|process| self.is_suitable_host(process.id, site))
            .map(|process| process.id)
    }

    /// Picks the process for a navigation to `site`: a reusable one when the
    /// search finds it, otherwise a new process. Dedication overrides the
    /// soft budget; a site requiring isolation is never squeezed into an
    /// unsuitable process just because we are "out of processes".
    pub fn allocate_or_reuse(
        &mut self,
        site: &SiteInfo,
        reuse_policy: ProcessReusePolicy,
    ) -> ProcessId {
        if let Some(id) = self.find_reusable_process(site, reuse_policy) {
            debug!("Reusing process {} for site {}", id, site);
            return id;
        }
        if self.is_at_soft_limit() && site.requires_dedicated_process() {
            debug!(
                "Exceeding soft process limit ({} live) for dedicated site {}",
                self.processes.len(),
                site
            );
        }
        let id = ProcessId::new();
        self.processes.insert(id, Process::new(id));
        id
    }

    /// Records that a navigation to `site` intends to commit in `id`.
    /// Balanced by [`remove_pending_site`](Self::remove_pending_site) at
    /// commit or cancellation.
    pub fn add_pending_site(&mut self, id: ProcessId, site: &SiteInfo) {
        if let Some(process) = self.processes.get_mut(&id) {
            *process.pending_sites.entry(site.clone()).or_insert(0) += 1;
        }
    }

    pub fn remove_pending_site(&mut self, id: ProcessId, site: &SiteInfo) {
        let Some(process) = self.processes.get_mut(&id) else {
            return;
        };
        match process.pending_sites.get_mut(site) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                process.pending_sites.remove(site);
            },
            None => warn!("Unbalanced pending-site removal for process {}", id),
        }
    }

    /// Records that a live `SiteInstance` for `site` now resides in `id`.
    /// Balanced by [`remove_committed_site`](Self::remove_committed_site)
    /// when that `SiteInstance` is destroyed.
    pub fn add_committed_site(&mut self, id: ProcessId, site: &SiteInfo) {
        if let Some(process) = self.processes.get_mut(&id) {
            *process.committed_sites.entry(site.clone()).or_insert(0) += 1;
        }
    }

    pub fn remove_committed_site(&mut self, id: ProcessId, site: &SiteInfo) {
        let Some(process) = self.processes.get_mut(&id) else {
            return;
        };
        match process.committed_sites.get_mut(site) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                process.committed_sites.remove(site);
            },
            None => warn!("Unbalanced committed-site removal for process {}", id),
        }
    }

    /// Sets the origin lock the first time a dedicated site claims the
    /// process. A no-op when already locked to the same site.
    ///
    /// Panics on a conflicting relock. The reuse search is required to have
    /// filtered out mismatched processes; reaching this with a different
    /// site means a navigation is about to commit across a security
    /// boundary, which is not a recoverable state.
    pub fn lock_process_if_needed(&mut self, id: ProcessId, site: &SiteInfo) {
        let Some(process) = self.processes.get_mut(&id) else {
            warn!("Attempted to lock unknown process {}", id);
            return;
        };
        if !site.requires_dedicated_process() {
            return;
        }
        match process.lock {
            None => {
                debug!("Locking process {} to {}", id, site);
                process.lock = Some(site.clone());
            },
            Some(ref lock) if lock == site => {},
            Some(ref lock) => {
                panic!(
                    "process {} already locked to {}, refusing conflicting lock to {}",
                    id, lock, site
                );
            },
        }
    }

    /// Transitions the process out of the "unused" state. Called at the
    /// earliest point a navigation's process choice is irrevocable (its
    /// response is ready to commit), not when the navigation starts; a
    /// process that merely started an unrelated navigation is still fair
    /// game for a racing isolated-origin request.
    pub fn mark_used(&mut self, id: ProcessId) {
        if let Some(process) = self.processes.get_mut(&id) {
            process.is_unused = false;
        }
    }

    /// Tears down a process entry once nothing references it.
    pub fn remove_process(&mut self, id: ProcessId) {
        if let Some(process) = self.processes.remove(&id) {
            if process.hosts_any_site() {
                warn!("Removing process {} that still hosts sites", id);
            }
        }
    }
}
