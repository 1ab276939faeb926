/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The small capability surface an embedder can implement to influence
//! isolation decisions. Injected once at engine construction.

use cordon_url::ImmutableOrigin;

pub trait EmbedderPolicy: Send + Sync {
    /// Whether failed navigations should commit into a dedicated error-page
    /// process for this frame kind.
    fn should_isolate_error_page(&self, in_main_frame: bool) -> bool;

    /// Origins the embedder ships as requiring a dedicated process, merged
    /// into the registry at startup as built-in entries.
    fn origins_requiring_dedicated_process(&self) -> Vec<ImmutableOrigin>;

    /// An embedder-level opt-out of site isolation. Does not suppress
    /// command-line isolated origins.
    fn should_disable_site_isolation(&self) -> bool;
}

/// Platform defaults: error pages are isolated in main frames only, no
/// built-in origin list, no opt-out.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEmbedderPolicy;

impl EmbedderPolicy for DefaultEmbedderPolicy {
    fn should_isolate_error_page(&self, in_main_frame: bool) -> bool {
        in_main_frame
    }

    fn origins_requiring_dedicated_process(&self) -> Vec<ImmutableOrigin> {
        Vec::new()
    }

    fn should_disable_site_isolation(&self) -> bool {
        false
    }
}
