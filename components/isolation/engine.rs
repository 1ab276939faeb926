/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The isolation engine: the single decision sequencer that owns the
//! isolated-origin registry, the process allocator, the BrowsingInstance
//! graph, and the frame tree.
//!
//! All mutation funnels through `&mut self` methods, which serializes the
//! decision sequence per navigation (start, response-ready, commit) against
//! every other navigation's. Concurrency between navigations exists only as
//! interleaving of those stages; a navigation suspends at its network wait
//! and resumes here. The registry handle may additionally be cloned out for
//! read-only diagnostic queries from other threads.
//!
//! There is deliberately no global instance: the engine is created at
//! process startup, passed by reference to collaborators, and dropped at
//! shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use base::id::{
    BrowserContextId, BrowsingInstanceId, FrameTreeNodeId, NavigationId, ProcessId, SiteInstanceId,
};
use cordon_config::Opts;
use cordon_url::{ImmutableOrigin, SiteUrl};
use log::{debug, warn};
use uuid::Uuid;

use crate::browsing_instance::{BrowsingInstanceGraph, ReleaseOutcome};
use crate::context::IsolationContext;
use crate::embedder::{DefaultEmbedderPolicy, EmbedderPolicy};
use crate::frame_tree::FrameTree;
use crate::navigation::{ForcedSwapState, NavigationRequest, NavigationState};
use crate::policy::SiteIsolationPolicy;
use crate::process::{ProcessRegistry, ProcessReusePolicy};
use crate::registry::{IsolatedOriginRegistry, IsolatedOriginSource};
use crate::site_info::SiteInfo;

pub struct IsolationEngine {
    policy: SiteIsolationPolicy,
    registry: IsolatedOriginRegistry,
    processes: ProcessRegistry,
    graph: BrowsingInstanceGraph,
    frames: FrameTree,
    /// In-flight navigations only; entries leave the map on commit or
    /// cancellation, so this never grows with session length.
    navigations: HashMap<NavigationId, NavigationRequest>,
    default_browser_context: BrowserContextId,
}

impl IsolationEngine {
    pub fn new(opts: Opts, embedder: Arc<dyn EmbedderPolicy>) -> IsolationEngine {
        let process_limit = opts.process_limit;
        let policy = SiteIsolationPolicy::new(opts, embedder);
        let registry = IsolatedOriginRegistry::new();
        policy.apply_global_isolated_origins(&registry);
        IsolationEngine {
            policy,
            registry,
            processes: ProcessRegistry::new(process_limit),
            graph: BrowsingInstanceGraph::new(),
            frames: FrameTree::new(),
            navigations: HashMap::new(),
            default_browser_context: BrowserContextId::new(),
        }
    }

    pub fn with_default_embedder(opts: Opts) -> IsolationEngine {
        IsolationEngine::new(opts, Arc::new(DefaultEmbedderPolicy))
    }

    /// A handle to the registry for read-only diagnostic queries from other
    /// execution contexts.
    pub fn registry(&self) -> IsolatedOriginRegistry {
        self.registry.clone()
    }

    pub fn default_browser_context(&self) -> BrowserContextId {
        self.default_browser_context
    }

    // Frame tree surface ---------------------------------------------------

    /// Opens a tab in the default browser context: a fresh BrowsingInstance
    /// with a siteless SiteInstance. No process is assigned until the first
    /// navigation commits.
    pub fn create_tab(&mut self) -> FrameTreeNodeId {
        self.create_tab_in(self.default_browser_context)
    }

    pub fn create_tab_in(&mut self, browser_context: BrowserContextId) -> FrameTreeNodeId {
        let browsing_instance = self
            .graph
            .create_browsing_instance(browser_context, self.registry.generation());
        let site_instance = self.graph.create_site_instance(
            browsing_instance,
            None,
            ProcessReusePolicy::Default,
        );
        self.graph.add_ref(site_instance);
        self.frames.insert_root(site_instance)
    }

    /// Attaches an `about:blank` subframe, which starts out in its parent's
    /// SiteInstance.
    pub fn create_subframe(&mut self, parent: FrameTreeNodeId) -> Option<FrameTreeNodeId> {
        let site_instance = self.frames.get(parent)?.site_instance();
        let child = self.frames.insert_child(parent, site_instance)?;
        self.graph.add_ref(site_instance);
        Some(child)
    }

    /// Opens an `about:blank` popup from `opener`: a new root frame in the
    /// opener's BrowsingInstance, inheriting the opener's SiteInstance.
    pub fn open_popup(&mut self, opener: FrameTreeNodeId) -> Option<FrameTreeNodeId> {
        let site_instance = self.frames.get(opener)?.site_instance();
        self.graph.add_ref(site_instance);
        Some(self.frames.insert_root(site_instance))
    }

    /// Discards `frame` and its subtree, cancelling the subtree's in-flight
    /// navigations and releasing its SiteInstance references.
    pub fn discard_frame(&mut self, frame: FrameTreeNodeId) {
        let subtree = self.frames.subtree_of(frame);
        let pending: Vec<NavigationId> = self
            .navigations
            .values()
            .filter(|navigation| subtree.contains(&navigation.frame))
            .map(|navigation| navigation.id)
            .collect();
        for navigation in pending {
            self.cancel_navigation(navigation);
        }
        for site_instance in self.frames.remove_subtree(frame) {
            let outcome = self.graph.release(site_instance);
            self.apply_release_outcome(outcome);
        }
    }

    /// Discards every child subtree of `frame`, keeping `frame` itself.
    /// Commits run this: the subframes of the replaced document do not
    /// survive into the new one.
    fn discard_children_of(&mut self, frame: FrameTreeNodeId) {
        let children: Vec<FrameTreeNodeId> = self
            .frames
            .get(frame)
            .map(|node| node.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.discard_frame(child);
        }
    }

    // Navigation sequence --------------------------------------------------

    /// Starts a navigation: computes the site, evaluates the forced-swap
    /// candidacy, picks the destination SiteInstance, and holds a process
    /// optimistically. Nothing done here is irrevocable.
    pub fn start_navigation(
        &mut self,
        frame: FrameTreeNodeId,
        url: SiteUrl,
    ) -> Option<NavigationId> {
        let node = self.frames.get(frame)?;
        let is_main_frame = node.is_main_frame();
        let current_site_instance = node.site_instance();
        let browsing_instance = self
            .graph
            .site_instance(current_site_instance)?
            .browsing_instance();
        let group = self.graph.browsing_instance(browsing_instance)?;
        let current_context = group.isolation_context();
        let future_context =
            IsolationContext::for_future_browsing_instance(group.browser_context());

        let site_in_current = SiteInfo::compute(&url, &current_context, &self.policy, &self.registry);
        let site_in_future = SiteInfo::compute(&url, &future_context, &self.policy, &self.registry);

        let mut navigation = NavigationRequest::new(frame, url, is_main_frame);

        // A dynamically added isolated origin can only take effect here by
        // discarding the stale BrowsingInstance, and that is only on the
        // table when no live script relationship would break.
        let swap_candidate = is_main_frame &&
            self.policy.are_dynamic_isolated_origins_enabled() &&
            site_in_future != site_in_current &&
            !self.has_live_script_relationships(frame, Some(navigation.id));

        if swap_candidate {
            navigation.swap_state = ForcedSwapState::CandidateForForcedSwap;
            navigation.site_info = site_in_future;
            if let Some(site) = navigation.site_info.clone() {
                let process = self
                    .processes
                    .allocate_or_reuse(&site, ProcessReusePolicy::Default);
                self.processes.add_pending_site(process, &site);
                navigation.process = Some(process);
            }
        } else {
            navigation.site_info = site_in_current;
            match navigation.site_info.clone() {
                None => {
                    // Siteless target: commits into the current SiteInstance.
                    self.graph.add_ref(current_site_instance);
                    navigation.dest_site_instance = Some(current_site_instance);
                    navigation.holds_site_instance_ref = true;
                },
                Some(site) => {
                    let reuse_policy = Self::reuse_policy_for(&site, is_main_frame);
                    let dest = self.graph.get_or_create_related_site_instance(
                        current_site_instance,
                        &site,
                        reuse_policy,
                    )?;
                    self.graph.add_ref(dest);
                    navigation.dest_site_instance = Some(dest);
                    navigation.holds_site_instance_ref = true;

                    let process = self.process_for_site_instance(dest, &site);
                    self.processes.add_pending_site(process, &site);
                    navigation.process = Some(process);
                },
            }
        }

        let id = navigation.id;
        self.navigations.insert(id, navigation);
        Some(id)
    }

    /// Marks the navigation as a failed load. When error-page isolation
    /// applies to this frame kind, re-targets the navigation at the shared
    /// error-page site before the response-ready stage runs.
    pub fn on_navigation_failed(&mut self, id: NavigationId) {
        let Some(navigation) = self.navigations.get(&id) else {
            return warn!("on_navigation_failed for unknown navigation {}", id);
        };
        if navigation.state != NavigationState::Started {
            return warn!("on_navigation_failed in state {:?}", navigation.state);
        }
        if !self
            .policy
            .is_error_page_isolation_enabled(navigation.is_main_frame)
        {
            return;
        }
        let frame = navigation.frame;
        self.release_navigation_holds(id);

        let error_site = SiteInfo::error_page();
        let Some(current_site_instance) = self.frames.get(frame).map(|node| node.site_instance())
        else {
            return;
        };
        // Error pages pack into one shared process.
        let dest = self.graph.get_or_create_related_site_instance(
            current_site_instance,
            &error_site,
            ProcessReusePolicy::ReusePendingOrCommittedSite,
        );
        let Some(dest) = dest else { return };
        self.graph.add_ref(dest);

        let process = self.process_for_site_instance(dest, &error_site);
        self.processes.add_pending_site(process, &error_site);

        if let Some(navigation) = self.navigations.get_mut(&id) {
            navigation.is_error_page = true;
            navigation.swap_state = ForcedSwapState::Normal;
            navigation.site_info = Some(error_site);
            navigation.dest_site_instance = Some(dest);
            navigation.holds_site_instance_ref = true;
            navigation.process = Some(process);
        }
    }

    /// The response is ready: the earliest point the process choice becomes
    /// irrevocable. Re-validates the forced-swap candidacy (popups may have
    /// appeared since the start), re-validates the held process (another
    /// navigation may have won it and locked it elsewhere, in which case we
    /// transfer), then locks and marks the winner used.
    pub fn on_response_ready(&mut self, id: NavigationId) {
        let Some(navigation) = self.navigations.get(&id) else {
            return warn!("on_response_ready for unknown navigation {}", id);
        };
        if navigation.state != NavigationState::Started {
            return warn!("on_response_ready in state {:?}", navigation.state);
        }
        let frame = navigation.frame;

        if navigation.swap_state == ForcedSwapState::CandidateForForcedSwap &&
            self.has_live_script_relationships(frame, Some(id))
        {
            self.downgrade_forced_swap(id);
        }

        let Some(navigation) = self.navigations.get(&id) else {
            return;
        };
        if let (Some(site), Some(process)) = (navigation.site_info.clone(), navigation.process) {
            if !self.processes.is_suitable_host(process, &site) {
                // Race loss: a concurrent navigation claimed this process
                // and locked it to something incompatible first. Transfer.
                let reuse_policy = navigation
                    .dest_site_instance
                    .and_then(|dest| self.graph.site_instance(dest))
                    .map_or(ProcessReusePolicy::Default, |si| si.process_reuse_policy());
                debug!(
                    "Navigation {} lost process {} to a racing claim; transferring",
                    id, process
                );
                self.processes.remove_pending_site(process, &site);
                self.maybe_remove_orphan_process(process);
                let replacement = self.processes.allocate_or_reuse(&site, reuse_policy);
                self.processes.add_pending_site(replacement, &site);
                if let Some(navigation) = self.navigations.get_mut(&id) {
                    navigation.process = Some(replacement);
                }
            }
            let Some(navigation) = self.navigations.get(&id) else {
                return;
            };
            if let Some(process) = navigation.process {
                self.processes.lock_process_if_needed(process, &site);
                self.processes.mark_used(process);
            }
        }

        if let Some(navigation) = self.navigations.get_mut(&id) {
            navigation.state = NavigationState::ReadyToCommit;
        }
    }

    /// Commits the navigation: tears down the previous document's subframes,
    /// applies the forced swap when the candidacy survived, points the frame
    /// at the destination SiteInstance, and settles the pending/committed
    /// site bookkeeping. Returns the finished record; committed navigations
    /// are no longer tracked afterwards.
    pub fn commit_navigation(&mut self, id: NavigationId) -> Option<NavigationRequest> {
        let Some(navigation) = self.navigations.get(&id) else {
            warn!("commit of unknown navigation {}", id);
            return None;
        };
        if navigation.state != NavigationState::ReadyToCommit {
            warn!("commit in state {:?}", navigation.state);
            return None;
        }
        let frame = navigation.frame;
        let swap_state = navigation.swap_state;
        let site_info = navigation.site_info.clone();
        let process = navigation.process;
        let holds_ref = navigation.holds_site_instance_ref;
        let dest_hint = navigation.dest_site_instance;

        let Some(old_site_instance) = self.frames.get(frame).map(|node| node.site_instance())
        else {
            warn!("commit for unknown frame {}", frame);
            return None;
        };

        // The committed document replaces the previous one wholesale: its
        // subframes are gone, along with their in-flight navigations.
        self.discard_children_of(frame);

        let swapped = swap_state == ForcedSwapState::CandidateForForcedSwap;
        let dest = if swapped {
            let Some(site) = site_info.clone() else {
                warn!("forced-swap candidate without a site");
                return None;
            };
            let old_browsing_instance = self
                .graph
                .site_instance(old_site_instance)
                .map(|si| si.browsing_instance());
            let new_browsing_instance = match old_browsing_instance {
                Some(old) => self
                    .graph
                    .create_browsing_instance_continuing_storage(old, self.registry.generation()),
                None => None,
            };
            let Some(new_browsing_instance) = new_browsing_instance else {
                warn!("forced swap without a live predecessor BrowsingInstance");
                return None;
            };
            let dest = self.graph.create_site_instance(
                new_browsing_instance,
                Some(site),
                ProcessReusePolicy::Default,
            );
            debug!(
                "Navigation {} swapped to fresh BrowsingInstance {}",
                id, new_browsing_instance
            );
            dest
        } else {
            match dest_hint {
                Some(dest) => dest,
                None => {
                    warn!("commit of navigation {} without a destination", id);
                    return None;
                },
            }
        };

        if let Some(site) = site_info.clone() {
            self.graph.set_site(dest, site);
        }
        if let Some(process) = process {
            self.graph.set_process(dest, process);
        }
        if let (Some(site), Some(process)) = (site_info.as_ref(), process) {
            self.processes.remove_pending_site(process, site);
            if self.graph.mark_counted_in_process(dest) {
                self.processes.add_committed_site(process, site);
            }
        }

        // The frame takes its own reference before the navigation's and the
        // previous SiteInstance's are dropped, so a same-instance commit
        // never dips to zero in between.
        self.graph.add_ref(dest);
        self.frames.set_site_instance(frame, dest);
        if holds_ref {
            let outcome = self.graph.release(dest);
            self.apply_release_outcome(outcome);
        }
        let outcome = self.graph.release(old_site_instance);
        self.apply_release_outcome(outcome);

        let mut record = self.navigations.remove(&id)?;
        record.state = NavigationState::Committed;
        if swapped {
            record.swap_state = ForcedSwapState::Swapped;
        }
        record.holds_site_instance_ref = false;
        record.dest_site_instance = Some(dest);
        Some(record)
    }

    /// Cancels an in-flight navigation, releasing the optimistically held
    /// process and SiteInstance reference. Returns the finished record;
    /// cancelled navigations are no longer tracked afterwards.
    pub fn cancel_navigation(&mut self, id: NavigationId) -> Option<NavigationRequest> {
        if !self.navigations.contains_key(&id) {
            warn!("cancel of unknown navigation {}", id);
            return None;
        }
        self.release_navigation_holds(id);
        let mut record = self.navigations.remove(&id)?;
        record.state = NavigationState::Cancelled;
        Some(record)
    }

    /// Runs a full navigation to completion in one call.
    pub fn navigate(&mut self, frame: FrameTreeNodeId, url: SiteUrl) -> Option<NavigationRequest> {
        let id = self.start_navigation(frame, url)?;
        self.on_response_ready(id);
        self.commit_navigation(id)
    }

    /// The in-flight navigation `id`, if it is still live. Committed and
    /// cancelled navigations are dropped from tracking when they finish.
    pub fn navigation(&self, id: NavigationId) -> Option<&NavigationRequest> {
        self.navigations.get(&id)
    }

    // Dynamic policy updates -----------------------------------------------

    /// Adds isolated origins at runtime. New entries only affect future
    /// site computations: existing BrowsingInstances keep their snapshot,
    /// and already-navigated frames never switch processes retroactively.
    pub fn add_isolated_origins(
        &mut self,
        origins: Vec<ImmutableOrigin>,
        source: IsolatedOriginSource,
        browser_context: Option<BrowserContextId>,
    ) {
        if source == IsolatedOriginSource::Runtime &&
            !self.policy.are_dynamic_isolated_origins_enabled()
        {
            return warn!("Dynamic isolated origins are disabled; dropping addition");
        }
        self.registry
            .add_isolated_origins(origins, source, browser_context);
    }

    // Query surface for collaborators --------------------------------------

    pub fn is_isolated_origin(&self, origin: &ImmutableOrigin) -> bool {
        let context = IsolationContext::for_future_browsing_instance(self.default_browser_context);
        self.registry.is_isolated_origin(&context, origin)
    }

    pub fn requires_dedicated_process(&self, url: &SiteUrl) -> bool {
        let context = IsolationContext::for_future_browsing_instance(self.default_browser_context);
        SiteInfo::compute(url, &context, &self.policy, &self.registry)
            .is_some_and(|site| site.requires_dedicated_process())
    }

    /// The origin lock of a process, if any. Collaborators use this to
    /// refuse data requests from a process locked to a different origin.
    pub fn get_origin_lock(&self, process: ProcessId) -> Option<SiteInfo> {
        self.processes.origin_lock(process).cloned()
    }

    /// Whether `process` may be granted access to data belonging to
    /// `origin`: an unlocked process may (it only ever hosts non-isolated
    /// sites), a locked process only for the site it is locked to.
    pub fn can_access_data_for_origin(&self, process: ProcessId, origin: &ImmutableOrigin) -> bool {
        let Some(lock) = self.processes.origin_lock(process) else {
            return true;
        };
        let context = IsolationContext::for_future_browsing_instance(self.default_browser_context);
        SiteInfo::compute_for_origin(origin, &context, &self.policy, &self.registry)
            .is_some_and(|site| &site == lock)
    }

    pub fn site_instance_of(&self, frame: FrameTreeNodeId) -> Option<SiteInstanceId> {
        Some(self.frames.get(frame)?.site_instance())
    }

    pub fn browsing_instance_of(&self, frame: FrameTreeNodeId) -> Option<BrowsingInstanceId> {
        let site_instance = self.site_instance_of(frame)?;
        Some(self.graph.site_instance(site_instance)?.browsing_instance())
    }

    pub fn process_of(&self, frame: FrameTreeNodeId) -> Option<ProcessId> {
        let site_instance = self.site_instance_of(frame)?;
        self.graph.site_instance(site_instance)?.process()
    }

    pub fn site_of(&self, frame: FrameTreeNodeId) -> Option<SiteInfo> {
        let site_instance = self.site_instance_of(frame)?;
        self.graph.site_instance(site_instance)?.site().cloned()
    }

    pub fn are_frames_related(&self, a: FrameTreeNodeId, b: FrameTreeNodeId) -> bool {
        match (self.site_instance_of(a), self.site_instance_of(b)) {
            (Some(a), Some(b)) => self.graph.are_related(a, b),
            _ => false,
        }
    }

    pub fn session_storage_token_of(&self, frame: FrameTreeNodeId) -> Option<Uuid> {
        let browsing_instance = self.browsing_instance_of(frame)?;
        Some(
            self.graph
                .browsing_instance(browsing_instance)?
                .session_storage_token(),
        )
    }

    pub fn process_count(&self) -> usize {
        self.processes.process_count()
    }

    pub fn graph(&self) -> &BrowsingInstanceGraph {
        &self.graph
    }

    // Internals ------------------------------------------------------------

    /// The process for `dest`: its existing assignment when it has one,
    /// otherwise a fresh allocation driven by the reuse policy stored on
    /// the SiteInstance.
    fn process_for_site_instance(&mut self, dest: SiteInstanceId, site: &SiteInfo) -> ProcessId {
        let instance = self.graph.site_instance(dest);
        if let Some(process) = instance.and_then(|si| si.process()) {
            return process;
        }
        let reuse_policy =
            instance.map_or(ProcessReusePolicy::Default, |si| si.process_reuse_policy());
        self.processes.allocate_or_reuse(site, reuse_policy)
    }

    fn reuse_policy_for(site: &SiteInfo, is_main_frame: bool) -> ProcessReusePolicy {
        // Subframes entering an isolated origin pack into an existing
        // process for that origin wherever one lives; main frames get the
        // default placement.
        if site.requires_dedicated_process() && !is_main_frame {
            ProcessReusePolicy::ReusePendingOrCommittedSite
        } else {
            ProcessReusePolicy::Default
        }
    }

    /// Whether anything outside `frame`'s own subtree can still script it:
    /// another frame in the same BrowsingInstance (opener, popup, unrelated
    /// embedder of a shared SiteInstance) or an in-flight navigation bound
    /// for this BrowsingInstance.
    fn has_live_script_relationships(
        &self,
        frame: FrameTreeNodeId,
        exclude_navigation: Option<NavigationId>,
    ) -> bool {
        let Some(browsing_instance) = self.browsing_instance_of(frame) else {
            return false;
        };
        let subtree = self.frames.subtree_of(frame);

        let frame_outside = self.frames.iter().any(|node| {
            !subtree.contains(&node.id()) &&
                self.graph
                    .site_instance(node.site_instance())
                    .is_some_and(|si| si.browsing_instance() == browsing_instance)
        });
        if frame_outside {
            return true;
        }

        // Every tracked navigation is still in flight (finished ones are
        // dropped from the map), so state needs no filtering here.
        self.navigations.values().any(|navigation| {
            Some(navigation.id) != exclude_navigation &&
                !subtree.contains(&navigation.frame) &&
                navigation.dest_site_instance.is_some_and(|dest| {
                    self.graph
                        .site_instance(dest)
                        .is_some_and(|si| si.browsing_instance() == browsing_instance)
                })
        })
    }

    /// Downgrades a forced-swap candidate to a normal in-place navigation:
    /// recomputes the site under the existing BrowsingInstance's snapshot
    /// and re-runs destination and process selection.
    fn downgrade_forced_swap(&mut self, id: NavigationId) {
        debug!(
            "Navigation {} gained a live script relationship; forgoing BrowsingInstance swap",
            id
        );
        self.release_navigation_holds(id);
        let Some(navigation) = self.navigations.get(&id) else {
            return;
        };
        let frame = navigation.frame;
        let is_main_frame = navigation.is_main_frame;
        let url = navigation.url.clone();

        let Some(current_site_instance) = self.frames.get(frame).map(|node| node.site_instance())
        else {
            return;
        };
        let site = self
            .graph
            .site_instance(current_site_instance)
            .and_then(|si| self.graph.browsing_instance(si.browsing_instance()))
            .map(|group| group.isolation_context())
            .and_then(|context| SiteInfo::compute(&url, &context, &self.policy, &self.registry));

        if let Some(navigation) = self.navigations.get_mut(&id) {
            navigation.swap_state = ForcedSwapState::Normal;
            navigation.site_info = site.clone();
        }

        match site {
            None => {
                self.graph.add_ref(current_site_instance);
                if let Some(navigation) = self.navigations.get_mut(&id) {
                    navigation.dest_site_instance = Some(current_site_instance);
                    navigation.holds_site_instance_ref = true;
                    navigation.process = None;
                }
            },
            Some(site) => {
                let reuse_policy = Self::reuse_policy_for(&site, is_main_frame);
                let Some(dest) = self.graph.get_or_create_related_site_instance(
                    current_site_instance,
                    &site,
                    reuse_policy,
                ) else {
                    return;
                };
                self.graph.add_ref(dest);
                let process = self.process_for_site_instance(dest, &site);
                self.processes.add_pending_site(process, &site);
                if let Some(navigation) = self.navigations.get_mut(&id) {
                    navigation.dest_site_instance = Some(dest);
                    navigation.holds_site_instance_ref = true;
                    navigation.process = Some(process);
                }
            },
        }
    }

    /// Releases whatever `id` is holding: its pending-site entry and its
    /// SiteInstance reference. Used by cancellation, failure re-targeting,
    /// and swap downgrades.
    fn release_navigation_holds(&mut self, id: NavigationId) {
        let Some(navigation) = self.navigations.get_mut(&id) else {
            return;
        };
        let site = navigation.site_info.take();
        let process = navigation.process.take();
        let dest = navigation.dest_site_instance.take();
        let holds_ref = navigation.holds_site_instance_ref;
        navigation.holds_site_instance_ref = false;

        if let (Some(site), Some(process)) = (site, process) {
            self.processes.remove_pending_site(process, &site);
            self.maybe_remove_orphan_process(process);
        }
        if holds_ref {
            if let Some(dest) = dest {
                let outcome = self.graph.release(dest);
                self.apply_release_outcome(outcome);
            }
        }
    }

    fn apply_release_outcome(&mut self, outcome: ReleaseOutcome) {
        let Some(destroyed) = outcome.destroyed else {
            return;
        };
        if let Some((process, site)) = destroyed.committed {
            self.processes.remove_committed_site(process, &site);
        }
        if let Some(process) = destroyed.process_unreferenced {
            self.maybe_remove_orphan_process(process);
        }
    }

    /// Tears down a process entry once no SiteInstance references it and it
    /// hosts no pending or committed site.
    fn maybe_remove_orphan_process(&mut self, process: ProcessId) {
        let in_use = self
            .graph
            .process_in_use(process) ||
            self.processes
                .get(process)
                .is_some_and(|entry| entry.hosts_any_site());
        if !in_use {
            debug!("Removing orphaned process {}", process);
            self.processes.remove_process(process);
        }
    }
}
