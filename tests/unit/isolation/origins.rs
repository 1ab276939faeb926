/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;

use base::id::BrowserContextId;
use cordon_config::default_opts;
use cordon_url::SiteUrl;
use isolation::{
    DefaultEmbedderPolicy, IsolatedOriginRegistry, IsolatedOriginSource, IsolationContext,
    SiteInfo, SiteIsolationPolicy,
};

fn url(input: &str) -> SiteUrl {
    SiteUrl::parse(input).expect("bad test url")
}

fn future_context() -> IsolationContext {
    IsolationContext::for_future_browsing_instance(BrowserContextId::new())
}

fn default_policy() -> SiteIsolationPolicy {
    SiteIsolationPolicy::new(default_opts(), Arc::new(DefaultEmbedderPolicy))
}

#[test]
fn lookup_is_idempotent_and_deterministic() {
    let registry = IsolatedOriginRegistry::new();
    registry.add_isolated_origins(
        vec![url("http://isolated.foo.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );
    let context = future_context();
    let origin = url("http://isolated.foo.com/some/path").origin();
    let first = registry.isolated_origin_for(&context, &origin);
    let second = registry.isolated_origin_for(&context, &origin);
    assert_eq!(first, second);
    assert!(first.is_some());
}

#[test]
fn re_adding_an_origin_changes_nothing() {
    let registry = IsolatedOriginRegistry::new();
    let origin = url("http://isolated.foo.com/").origin();
    registry.add_isolated_origins(vec![origin.clone()], IsolatedOriginSource::Runtime, None);
    registry.add_isolated_origins(vec![origin.clone()], IsolatedOriginSource::Policy, None);

    let context = future_context();
    let matched = registry
        .isolated_origin_for(&context, &origin)
        .expect("isolated");
    assert_eq!(matched.ascii_serialization(), "http://isolated.foo.com");
}

#[test]
fn subdomains_inherit_isolation_with_longest_match() {
    let registry = IsolatedOriginRegistry::new();
    registry.add_isolated_origins(
        vec![url("http://foo.com/").origin(), url("http://isolated.foo.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );
    let context = future_context();

    let shallow = registry
        .isolated_origin_for(&context, &url("http://www.foo.com/").origin())
        .expect("isolated");
    assert_eq!(shallow.ascii_serialization(), "http://foo.com");

    let deep = registry
        .isolated_origin_for(&context, &url("http://sub.isolated.foo.com/").origin())
        .expect("isolated");
    assert_eq!(deep.ascii_serialization(), "http://isolated.foo.com");

    // A lookalike suffix is not a subdomain.
    assert!(
        registry
            .isolated_origin_for(&context, &url("http://notisolated.foo.com/").origin())
            .is_some_and(|matched| matched.ascii_serialization() == "http://foo.com")
    );
    assert!(!registry.is_isolated_origin(&context, &url("http://foo.com.evil.com/").origin()));
}

#[test]
fn registry_handles_share_state() {
    let registry = IsolatedOriginRegistry::new();
    let reader = registry.clone();
    let context = future_context();
    let origin = url("http://isolated.foo.com/").origin();
    assert!(!reader.is_isolated_origin(&context, &origin));

    registry.add_isolated_origins(vec![origin.clone()], IsolatedOriginSource::Runtime, None);
    assert!(reader.is_isolated_origin(&context, &origin));
}

#[test]
fn site_info_serializes_stably() {
    let registry = IsolatedOriginRegistry::new();
    let context = future_context();
    let policy = default_policy();
    let site = SiteInfo::compute(&url("http://www.foo.com/"), &context, &policy, &registry)
        .expect("siteful");

    let encoded = serde_json::to_string(&site).expect("serialize");
    let decoded: SiteInfo = serde_json::from_str(&encoded).expect("deserialize");
    assert_eq!(site, decoded);
}
