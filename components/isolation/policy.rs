/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Mode selection for site isolation and the startup path that merges
//! isolated-origin declarations from the command line, a field trial, and
//! the embedder into the registry.

use std::sync::Arc;

use cordon_config::Opts;
use cordon_url::{ImmutableOrigin, SiteUrl};
use log::debug;

use crate::embedder::EmbedderPolicy;
use crate::registry::{IsolatedOriginRegistry, IsolatedOriginSource};

/// Answers the "which isolation mode are we in" questions. Built once from
/// the command-line options and the embedder, then handed to every site
/// computation by reference.
pub struct SiteIsolationPolicy {
    opts: Opts,
    embedder: Arc<dyn EmbedderPolicy>,
}

impl SiteIsolationPolicy {
    pub fn new(opts: Opts, embedder: Arc<dyn EmbedderPolicy>) -> SiteIsolationPolicy {
        SiteIsolationPolicy { opts, embedder }
    }

    fn is_site_isolation_disabled(&self) -> bool {
        self.opts.disable_site_isolation || self.embedder.should_disable_site_isolation()
    }

    /// `--site-per-process`: every site gets a dedicated process. The switch
    /// wins over the opt-out.
    pub fn use_dedicated_processes_for_all_sites(&self) -> bool {
        self.opts.site_per_process
    }

    pub fn is_strict_origin_isolation_enabled(&self) -> bool {
        !self.is_site_isolation_disabled() && self.opts.strict_origin_isolation
    }

    pub fn is_error_page_isolation_enabled(&self, in_main_frame: bool) -> bool {
        self.embedder.should_isolate_error_page(in_main_frame)
    }

    /// Dynamic (runtime) isolated-origin additions are suppressed by the
    /// opt-out, like every non-command-line source.
    pub fn are_dynamic_isolated_origins_enabled(&self) -> bool {
        !self.is_site_isolation_disabled()
    }

    pub fn process_limit(&self) -> Option<usize> {
        self.opts.process_limit
    }

    /// Origins isolated via `--isolate-origins`. These apply regardless of
    /// the opt-out switch.
    fn isolated_origins_from_command_line(&self) -> Vec<ImmutableOrigin> {
        self.opts
            .isolated_origins
            .as_deref()
            .map(parse_isolated_origins)
            .unwrap_or_default()
    }

    /// Origins isolated via the field-trial parameter; suppressed entirely
    /// by the opt-out.
    fn isolated_origins_from_field_trial(&self) -> Vec<ImmutableOrigin> {
        if self.is_site_isolation_disabled() {
            return Vec::new();
        }
        self.opts
            .field_trial_isolated_origins
            .as_deref()
            .map(parse_isolated_origins)
            .unwrap_or_default()
    }

    /// Merges every startup source of isolated origins into `registry`:
    /// command line first, then the field trial, then the embedder's
    /// built-in list. Called once at engine construction.
    pub fn apply_global_isolated_origins(&self, registry: &IsolatedOriginRegistry) {
        let from_cmdline = self.isolated_origins_from_command_line();
        if !from_cmdline.is_empty() {
            debug!("Isolating {} origins from the command line", from_cmdline.len());
            registry.add_isolated_origins(from_cmdline, IsolatedOriginSource::CommandLine, None);
        }

        let from_trial = self.isolated_origins_from_field_trial();
        if !from_trial.is_empty() {
            registry.add_isolated_origins(from_trial, IsolatedOriginSource::FieldTrial, None);
        }

        let from_embedder = self.embedder.origins_requiring_dedicated_process();
        if !from_embedder.is_empty() {
            registry.add_isolated_origins(from_embedder, IsolatedOriginSource::BuiltIn, None);
        }
    }
}

/// Parses a comma-separated origin list. Entries that fail to parse or
/// produce opaque origins are silently skipped; a bad entry in a flag must
/// not take down the rest of the list.
pub fn parse_isolated_origins(arg: &str) -> Vec<ImmutableOrigin> {
    arg.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .filter_map(|piece| match SiteUrl::parse(piece) {
            Ok(url) => {
                let origin = url.origin();
                if origin.is_tuple() {
                    Some(origin)
                } else {
                    debug!("Skipping non-tuple isolated origin {:?}", piece);
                    None
                }
            },
            Err(error) => {
                debug!("Skipping malformed isolated origin {:?} ({})", piece, error);
                None
            },
        })
        .collect()
}
