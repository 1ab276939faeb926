/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `SiteInstance`, the unit of address-space partitioning. Every frame holds
//! a reference to exactly one `SiteInstance` at a time; same-site frames in
//! one BrowsingInstance share one.

use base::id::{BrowsingInstanceId, ProcessId, SiteInstanceId};

use crate::process::ProcessReusePolicy;
use crate::site_info::SiteInfo;

/// Stored in the [`BrowsingInstanceGraph`](crate::browsing_instance::BrowsingInstanceGraph)
/// arena; frames and in-flight navigations hold it by id through explicit
/// `add_ref`/`release` calls on the graph rather than by pointer, so that
/// BrowsingInstances and processes can keep weak back-references without
/// ownership cycles.
#[derive(Debug)]
pub struct SiteInstance {
    id: SiteInstanceId,
    browsing_instance: BrowsingInstanceId,
    /// `None` until the first real navigation: a frame showing `about:blank`
    /// has a `SiteInstance` but no site yet.
    site: Option<SiteInfo>,
    /// `None` until a navigation commits here.
    process: Option<ProcessId>,
    process_reuse_policy: ProcessReusePolicy,
    /// Frames plus in-flight navigations currently referencing this
    /// instance. The graph destroys the instance when this drops to zero.
    pub(crate) refcount: usize,
    /// Whether this instance's site is counted in its process's
    /// committed-site multiset (set on first commit, cleared on teardown).
    pub(crate) counted_in_process: bool,
}

impl SiteInstance {
    pub(crate) fn new(
        id: SiteInstanceId,
        browsing_instance: BrowsingInstanceId,
        site: Option<SiteInfo>,
        process_reuse_policy: ProcessReusePolicy,
    ) -> SiteInstance {
        SiteInstance {
            id,
            browsing_instance,
            site,
            process: None,
            process_reuse_policy,
            refcount: 0,
            counted_in_process: false,
        }
    }

    pub fn id(&self) -> SiteInstanceId {
        self.id
    }

    pub fn browsing_instance(&self) -> BrowsingInstanceId {
        self.browsing_instance
    }

    pub fn site(&self) -> Option<&SiteInfo> {
        self.site.as_ref()
    }

    pub fn process(&self) -> Option<ProcessId> {
        self.process
    }

    pub fn process_reuse_policy(&self) -> ProcessReusePolicy {
        self.process_reuse_policy
    }

    /// Assigns the site on first real navigation. The site of a
    /// `SiteInstance` never changes once set; a navigation to a different
    /// site gets a different `SiteInstance`.
    pub(crate) fn set_site(&mut self, site: SiteInfo) {
        debug_assert!(
            self.site.as_ref().is_none_or(|existing| *existing == site),
            "SiteInstance site must not be reassigned"
        );
        if self.site.is_none() {
            self.site = Some(site);
        }
    }

    pub(crate) fn set_process(&mut self, process: ProcessId) {
        debug_assert!(
            self.process.is_none_or(|existing| existing == process),
            "SiteInstance process must not be reassigned"
        );
        self.process = Some(process);
    }
}
