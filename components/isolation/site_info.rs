/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `SiteInfo`, the process-grouping key: the decision of which "site" a URL
//! belongs to and whether that site must live in a dedicated process.

use std::fmt;

use cordon_url::{ImmutableOrigin, SiteUrl};
use serde::{Deserialize, Serialize};

use crate::context::IsolationContext;
use crate::policy::SiteIsolationPolicy;
use crate::registry::IsolatedOriginRegistry;

/// The key two documents must share to be eligible for the same
/// `SiteInstance` (and hence the same process). Derived deterministically
/// from a URL, an [`IsolationContext`], and the global mode flags.
///
/// `host` is the registrable domain at site granularity, or the full host
/// when the grouping is origin-keyed (isolated origins, strict origin
/// isolation); `port` participates only when origin-keyed and not the
/// scheme's default port.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SiteInfo {
    scheme: String,
    host: String,
    port: Option<u16>,
    requires_dedicated_process: bool,
    is_error_page: bool,
}

impl SiteInfo {
    fn site_keyed(scheme: &str, registrable_domain: String, dedicated: bool) -> SiteInfo {
        SiteInfo {
            scheme: scheme.to_owned(),
            host: registrable_domain,
            port: None,
            requires_dedicated_process: dedicated,
            is_error_page: false,
        }
    }

    fn origin_keyed(origin: &ImmutableOrigin, dedicated: bool) -> Option<SiteInfo> {
        Some(SiteInfo {
            scheme: origin.scheme()?.to_owned(),
            host: origin.host()?.to_string(),
            port: origin.port_unless_default(),
            requires_dedicated_process: dedicated,
            is_error_page: false,
        })
    }

    /// The grouping key for failed navigations when error-page isolation is
    /// on: all error pages share one dedicated process.
    pub fn error_page() -> SiteInfo {
        SiteInfo {
            scheme: "error".to_owned(),
            host: "page".to_owned(),
            port: None,
            requires_dedicated_process: true,
            is_error_page: true,
        }
    }

    /// Computes the `SiteInfo` for a navigation to `url`, or `None` when the
    /// URL cannot carry a site (`about:blank`, `data:`, other non-standard
    /// schemes) and the `SiteInstance` should stay siteless.
    ///
    /// Decision order:
    /// 1. non-standard URL: siteless;
    /// 2. a registered isolated origin matching the URL's origin (longest
    ///    match): the registered origin itself becomes the site, so every
    ///    subdomain of an isolated origin collapses onto one `SiteInfo`;
    /// 3. site-per-process mode: site-keyed, dedicated;
    /// 4. strict origin isolation: origin-keyed, dedicated;
    /// 5. otherwise: site-keyed, dedicated only for embedder built-ins
    ///    (which reach us through the registry, covered by step 2).
    pub fn compute(
        url: &SiteUrl,
        context: &IsolationContext,
        policy: &SiteIsolationPolicy,
        registry: &IsolatedOriginRegistry,
    ) -> Option<SiteInfo> {
        if !url.has_standard_scheme() {
            return None;
        }
        let origin = url.origin();
        if !origin.is_tuple() {
            return None;
        }

        // Isolated origins are checked before --site-per-process: they may
        // isolate at a finer-than-site granularity.
        if let Some(isolated) = registry.isolated_origin_for(context, &origin) {
            return SiteInfo::origin_keyed(&isolated, true);
        }

        let registrable_domain = origin.registrable_domain()?;
        if policy.use_dedicated_processes_for_all_sites() {
            return Some(SiteInfo::site_keyed(url.scheme(), registrable_domain, true));
        }

        if policy.is_strict_origin_isolation_enabled() {
            return SiteInfo::origin_keyed(&origin, true);
        }

        Some(SiteInfo::site_keyed(url.scheme(), registrable_domain, false))
    }

    /// The `SiteInfo` an origin's data is keyed under, for collaborator
    /// checks that only have an origin in hand (cookie and storage access).
    pub fn compute_for_origin(
        origin: &ImmutableOrigin,
        context: &IsolationContext,
        policy: &SiteIsolationPolicy,
        registry: &IsolatedOriginRegistry,
    ) -> Option<SiteInfo> {
        if !origin.is_tuple() {
            return None;
        }
        if let Some(isolated) = registry.isolated_origin_for(context, origin) {
            return SiteInfo::origin_keyed(&isolated, true);
        }
        let registrable_domain = origin.registrable_domain()?;
        let scheme = origin.scheme()?;
        if policy.use_dedicated_processes_for_all_sites() {
            return Some(SiteInfo::site_keyed(scheme, registrable_domain, true));
        }
        if policy.is_strict_origin_isolation_enabled() {
            return SiteInfo::origin_keyed(origin, true);
        }
        Some(SiteInfo::site_keyed(scheme, registrable_domain, false))
    }

    pub fn requires_dedicated_process(&self) -> bool {
        self.requires_dedicated_process
    }

    pub fn is_error_page(&self) -> bool {
        self.is_error_page
    }

    /// Whether two `SiteInfo`s may coexist in one unlocked process. Sites
    /// that require dedication never share; everything else may.
    pub fn may_share_process_with(&self, other: &SiteInfo) -> bool {
        if self == other {
            return true;
        }
        !self.requires_dedicated_process && !other.requires_dedicated_process
    }
}

impl fmt::Display for SiteInfo {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self.port {
            Some(port) => write!(formatter, "{}://{}:{}", self.scheme, self.host, port),
            None => write!(formatter, "{}://{}", self.scheme, self.host),
        }
    }
}
