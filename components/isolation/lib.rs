/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Site-isolation policy and process assignment.
//!
//! This crate decides which renderer process a navigation commits into. It
//! tracks the isolated-origin registry, computes the site a URL belongs to
//! under the active policy, groups frames into BrowsingInstances and
//! SiteInstances, and allocates or reuses processes under an origin-lock
//! discipline so that a compromised renderer can never be handed another
//! site's data.
//!
//! The [`IsolationEngine`] is the entry point; everything else hangs off it.

#![deny(unsafe_code)]

mod browsing_instance;
mod context;
mod embedder;
mod engine;
mod frame_tree;
mod navigation;
mod policy;
mod process;
mod registry;
mod site_info;
mod site_instance;

pub use crate::browsing_instance::{
    BrowsingInstance, BrowsingInstanceGraph, DestroyedSiteInstance, ReleaseOutcome,
};
pub use crate::context::IsolationContext;
pub use crate::embedder::{DefaultEmbedderPolicy, EmbedderPolicy};
pub use crate::engine::IsolationEngine;
pub use crate::frame_tree::{FrameTree, FrameTreeNode};
pub use crate::navigation::{ForcedSwapState, NavigationRequest, NavigationState};
pub use crate::policy::{SiteIsolationPolicy, parse_isolated_origins};
pub use crate::process::{Process, ProcessRegistry, ProcessReusePolicy};
pub use crate::registry::{IsolatedOriginRegistry, IsolatedOriginSource};
pub use crate::site_info::SiteInfo;
pub use crate::site_instance::SiteInstance;
