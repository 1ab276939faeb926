/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Process-unique identifiers for the entities the isolation engine tracks.
//!
//! Each id type draws from its own process-global counter, so a freshly
//! created id never collides with a live one. Ids are plain integers and
//! carry no ownership; the engine's maps are the single source of truth for
//! what an id refers to.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! sequential_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(
            Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Allocate the next unused id.
            #[allow(clippy::new_without_default)]
            pub fn new() -> $name {
                static NEXT: AtomicU32 = AtomicU32::new(1);
                let value = NEXT.fetch_add(1, Ordering::Relaxed);
                $name(NonZeroU32::new(value).expect("id counter wrapped around"))
            }

            pub fn index(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "({})", self.0.get())
            }
        }
    };
}

sequential_id!(
    /// The id of a renderer process registered with the process allocator.
    ProcessId
);

sequential_id!(
    /// The id of a `SiteInstance`, the unit of address-space partitioning.
    SiteInstanceId
);

sequential_id!(
    /// The id of a `BrowsingInstance`, the unit of mutual script reachability.
    BrowsingInstanceId
);

sequential_id!(
    /// The id of a node in the frame tree.
    FrameTreeNodeId
);

sequential_id!(
    /// The id of an in-flight navigation.
    NavigationId
);

sequential_id!(
    /// The id of a browser context (profile). Isolated origins may be scoped
    /// to a single browser context instead of applying globally.
    BrowserContextId
);
