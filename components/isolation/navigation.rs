/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The per-navigation state machine.
//!
//! A navigation suspends at its network-wait point and resumes on the
//! engine's sequencer: `start` runs the optimistic placement, the
//! response-ready signal runs the irrevocable one (lock, mark-used,
//! transfer-on-race-loss), and the commit applies the result to the frame
//! tree. Cancellation is a terminal transition reachable from every
//! non-terminal state and releases whatever the navigation was holding.

use base::id::{FrameTreeNodeId, NavigationId, ProcessId, SiteInstanceId};

use cordon_url::SiteUrl;

use crate::site_info::SiteInfo;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NavigationState {
    /// Request issued; a process is held optimistically but nothing is
    /// irrevocable yet.
    Started,
    /// The response arrived: the process choice was validated, locked, and
    /// marked used.
    ReadyToCommit,
    Committed,
    Cancelled,
}

/// Where this navigation stands with respect to a dynamically added
/// isolated origin that its BrowsingInstance predates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ForcedSwapState {
    /// No policy change applies; stay in the current BrowsingInstance.
    Normal,
    /// The target origin became isolated after this BrowsingInstance was
    /// created, and the navigating frame had no other live script
    /// relationship when the navigation started. Re-validated at commit
    /// time; a popup appearing in between downgrades to `Normal`,
    /// sacrificing isolation rather than breaking the scripting contract.
    CandidateForForcedSwap,
    /// Committed into a fresh, unrelated BrowsingInstance.
    Swapped,
}

#[derive(Debug)]
pub struct NavigationRequest {
    pub id: NavigationId,
    pub frame: FrameTreeNodeId,
    pub url: SiteUrl,
    pub is_main_frame: bool,
    pub state: NavigationState,
    pub swap_state: ForcedSwapState,
    /// `None` for siteless targets (`about:blank` and friends), which
    /// commit into the frame's current SiteInstance.
    pub site_info: Option<SiteInfo>,
    /// The SiteInstance this navigation will commit into; siteless targets
    /// point at the frame's current one. `None` while a forced-swap
    /// candidate, whose destination only exists at commit.
    pub dest_site_instance: Option<SiteInstanceId>,
    /// Whether this navigation holds a graph reference on
    /// `dest_site_instance`.
    pub holds_site_instance_ref: bool,
    /// The process held for the commit, with a matching pending-site entry
    /// when `site_info` is set.
    pub process: Option<ProcessId>,
    /// Set when this navigation's response turned out to be an error page
    /// and error-page isolation applies to the frame.
    pub is_error_page: bool,
}

impl NavigationRequest {
    pub fn new(frame: FrameTreeNodeId, url: SiteUrl, is_main_frame: bool) -> NavigationRequest {
        NavigationRequest {
            id: NavigationId::new(),
            frame,
            url,
            is_main_frame,
            state: NavigationState::Started,
            swap_state: ForcedSwapState::Normal,
            site_info: None,
            dest_site_instance: None,
            holds_site_instance_ref: false,
            process: None,
            is_error_page: false,
        }
    }
}
