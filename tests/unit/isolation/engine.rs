/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use base::id::BrowserContextId;
use cordon_config::{Opts, default_opts};
use cordon_url::SiteUrl;
use isolation::{
    ForcedSwapState, IsolatedOriginSource, IsolationEngine, NavigationState, ProcessReusePolicy,
};

fn engine_with(mutate: impl FnOnce(&mut Opts)) -> IsolationEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut opts = default_opts();
    mutate(&mut opts);
    IsolationEngine::with_default_embedder(opts)
}

fn url(input: &str) -> SiteUrl {
    SiteUrl::parse(input).expect("bad test url")
}

#[test]
fn first_navigation_assigns_site_and_process() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    assert!(engine.site_of(tab).is_none());
    assert!(engine.process_of(tab).is_none());

    engine.navigate(tab, url("http://www.foo.com/"));
    let site = engine.site_of(tab).expect("site assigned on commit");
    assert_eq!(site.to_string(), "http://foo.com");
    assert!(engine.process_of(tab).is_some());
    assert_eq!(engine.process_count(), 1);
}

#[test]
fn same_site_subframes_share_one_site_instance() {
    // a(b(c), d(c)): the two c.com frames must be synchronously scriptable,
    // so they must resolve to one SiteInstance and one process.
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));

    let frame_b = engine.create_subframe(tab).expect("subframe");
    engine.navigate(frame_b, url("http://b.com/"));
    let frame_d = engine.create_subframe(tab).expect("subframe");
    engine.navigate(frame_d, url("http://d.com/"));

    let c_under_b = engine.create_subframe(frame_b).expect("subframe");
    engine.navigate(c_under_b, url("http://c.com/one.html"));
    let c_under_d = engine.create_subframe(frame_d).expect("subframe");
    engine.navigate(c_under_d, url("http://c.com/two.html"));

    assert_eq!(
        engine.site_instance_of(c_under_b),
        engine.site_instance_of(c_under_d)
    );
    assert_eq!(engine.process_of(c_under_b), engine.process_of(c_under_d));
    assert!(engine.are_frames_related(c_under_b, tab));
}

#[test]
fn site_per_process_separates_cross_site_subframes() {
    let mut engine = engine_with(|opts| opts.site_per_process = true);
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let child = engine.create_subframe(tab).expect("subframe");
    engine.navigate(child, url("http://b.com/"));

    assert_ne!(engine.site_instance_of(tab), engine.site_instance_of(child));
    assert_ne!(engine.process_of(tab), engine.process_of(child));
    let child_process = engine.process_of(child).expect("process");
    let lock = engine.get_origin_lock(child_process).expect("locked");
    assert_eq!(lock.to_string(), "http://b.com");
}

#[test]
fn isolated_origin_subframe_gets_dedicated_locked_process() {
    let mut engine = engine_with(|opts| {
        opts.isolated_origins = Some("http://isolated.foo.com".to_owned());
    });
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://www.foo.com/page_with_iframe.html"));
    let child = engine.create_subframe(tab).expect("subframe");
    engine.navigate(child, url("http://isolated.foo.com/title1.html"));

    let site = engine.site_of(child).expect("site");
    assert_eq!(site.to_string(), "http://isolated.foo.com");
    assert!(site.requires_dedicated_process());

    let child_process = engine.process_of(child).expect("process");
    assert_ne!(engine.process_of(tab), Some(child_process));
    assert_eq!(
        engine.get_origin_lock(child_process).map(|lock| lock.to_string()),
        Some("http://isolated.foo.com".to_owned())
    );
    // The subframe's SiteInstance carries the aggressive-reuse placement
    // that later navigations to this origin allocate under.
    let instance = engine.site_instance_of(child).expect("instance");
    assert_eq!(
        engine
            .graph()
            .site_instance(instance)
            .expect("live")
            .process_reuse_policy(),
        ProcessReusePolicy::ReusePendingOrCommittedSite
    );
    // The cross-process subframe still shares a BrowsingInstance with its
    // parent and keeps a proxy link to it.
    assert!(engine.are_frames_related(tab, child));
}

#[test]
fn unrelated_tab_reuses_isolated_origin_process() {
    let mut engine = engine_with(|_| {});
    engine.add_isolated_origins(
        vec![url("http://isolated.foo.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );

    let tab_a = engine.create_tab();
    engine.navigate(tab_a, url("http://foo.com/page_with_iframe.html"));
    let child = engine.create_subframe(tab_a).expect("subframe");
    engine.navigate(child, url("http://isolated.foo.com/title1.html"));

    let child_process = engine.process_of(child).expect("process");
    assert_ne!(engine.process_of(tab_a), Some(child_process));
    assert_eq!(
        engine.get_origin_lock(child_process).map(|lock| lock.to_string()),
        Some("http://isolated.foo.com".to_owned())
    );

    let tab_b = engine.create_tab();
    engine.navigate(tab_b, url("http://isolated.foo.com/title1.html"));

    assert_eq!(engine.process_of(tab_b), Some(child_process));
    assert_ne!(engine.site_instance_of(tab_b), engine.site_instance_of(child));
    assert!(!engine.are_frames_related(tab_a, tab_b));
}

#[test]
fn isolation_does_not_apply_retroactively() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://sub.foo.com/"));

    engine.add_isolated_origins(
        vec![url("http://foo.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );

    // The existing BrowsingInstance keeps its snapshot: a subframe
    // navigation to foo.com stays site-keyed and co-located with the parent.
    let child = engine.create_subframe(tab).expect("subframe");
    engine.navigate(child, url("http://foo.com/"));
    assert_eq!(engine.site_instance_of(child), engine.site_instance_of(tab));
    assert!(!engine.site_of(child).expect("site").requires_dedicated_process());

    // A fresh tab sees the new policy.
    let fresh = engine.create_tab();
    engine.navigate(fresh, url("http://foo.com/"));
    assert!(engine.site_of(fresh).expect("site").requires_dedicated_process());
    let process = engine.process_of(fresh).expect("process");
    assert!(engine.get_origin_lock(process).is_some());
}

#[test]
fn newly_isolated_origin_forces_browsing_instance_swap() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let old_group = engine.browsing_instance_of(tab).expect("group");
    let old_token = engine.session_storage_token_of(tab).expect("token");

    engine.add_isolated_origins(
        vec![url("http://b.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );
    let navigation = engine.navigate(tab, url("http://b.com/")).expect("navigation");
    assert_eq!(navigation.state, NavigationState::Committed);
    assert_eq!(navigation.swap_state, ForcedSwapState::Swapped);

    let new_group = engine.browsing_instance_of(tab).expect("group");
    assert_ne!(old_group, new_group);
    // Script relationships are severed; session storage is not.
    assert_eq!(engine.session_storage_token_of(tab), Some(old_token));

    assert!(engine.site_of(tab).expect("site").requires_dedicated_process());
    let process = engine.process_of(tab).expect("process");
    assert_eq!(
        engine.get_origin_lock(process).map(|lock| lock.to_string()),
        Some("http://b.com".to_owned())
    );
    // The a.com process died with the old BrowsingInstance.
    assert_eq!(engine.process_count(), 1);
}

#[test]
fn popup_suppresses_forced_swap() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let popup = engine.open_popup(tab).expect("popup");
    let old_group = engine.browsing_instance_of(tab).expect("group");

    engine.add_isolated_origins(
        vec![url("http://b.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );
    let navigation = engine.navigate(tab, url("http://b.com/")).expect("navigation");
    assert_eq!(navigation.swap_state, ForcedSwapState::Normal);
    assert_eq!(engine.browsing_instance_of(tab), Some(old_group));
    assert!(engine.are_frames_related(tab, popup));
    // Under the old snapshot b.com is an ordinary site: no lock.
    let process = engine.process_of(tab).expect("process");
    assert!(engine.get_origin_lock(process).is_none());
}

#[test]
fn popup_opened_mid_navigation_downgrades_the_swap() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let old_group = engine.browsing_instance_of(tab).expect("group");

    engine.add_isolated_origins(
        vec![url("http://b.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );
    let id = engine
        .start_navigation(tab, url("http://b.com/"))
        .expect("navigation");
    assert_eq!(
        engine.navigation(id).expect("recorded").swap_state,
        ForcedSwapState::CandidateForForcedSwap
    );

    // The popup appears while the response is still in flight; the
    // candidacy must not survive it.
    let popup = engine.open_popup(tab).expect("popup");
    engine.on_response_ready(id);
    let navigation = engine.commit_navigation(id).expect("committed");

    assert_eq!(navigation.swap_state, ForcedSwapState::Normal);
    assert_eq!(engine.browsing_instance_of(tab), Some(old_group));
    assert!(engine.are_frames_related(tab, popup));
}

#[test]
fn budget_consolidates_plain_sites_but_never_isolated_origins() {
    let mut engine = engine_with(|opts| {
        opts.process_limit = Some(1);
        opts.isolated_origins =
            Some("http://isolated.foo.com,http://isolated.bar.com".to_owned());
    });
    let tab_a = engine.create_tab();
    engine.navigate(tab_a, url("http://a.com/"));
    let tab_b = engine.create_tab();
    engine.navigate(tab_b, url("http://b.com/"));
    assert_eq!(engine.process_of(tab_a), engine.process_of(tab_b));
    assert_eq!(engine.process_count(), 1);

    let tab_c = engine.create_tab();
    engine.navigate(tab_c, url("http://isolated.foo.com/"));
    let tab_d = engine.create_tab();
    engine.navigate(tab_d, url("http://isolated.bar.com/"));

    let process_c = engine.process_of(tab_c).expect("process");
    let process_d = engine.process_of(tab_d).expect("process");
    assert_ne!(process_c, process_d);
    assert_ne!(engine.process_of(tab_a), Some(process_c));
    assert_eq!(
        engine.get_origin_lock(process_c).map(|lock| lock.to_string()),
        Some("http://isolated.foo.com".to_owned())
    );
    assert_eq!(
        engine.get_origin_lock(process_d).map(|lock| lock.to_string()),
        Some("http://isolated.bar.com".to_owned())
    );
}

#[test]
fn cancelled_navigation_leaves_no_process_behind() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    let id = engine
        .start_navigation(tab, url("http://a.com/"))
        .expect("navigation");
    assert_eq!(engine.process_count(), 1);

    let cancelled = engine.cancel_navigation(id).expect("cancelled");
    assert_eq!(cancelled.state, NavigationState::Cancelled);
    assert_eq!(engine.process_count(), 0);
    assert!(engine.site_of(tab).is_none());
}

#[test]
fn cancelling_a_finished_navigation_is_a_no_op() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    let committed = engine.navigate(tab, url("http://a.com/")).expect("navigation");
    assert_eq!(committed.state, NavigationState::Committed);

    assert!(engine.cancel_navigation(committed.id).is_none());
    assert_eq!(engine.site_of(tab).expect("site").to_string(), "http://a.com");
    assert_eq!(engine.process_count(), 1);
}

#[test]
fn finished_navigations_are_not_retained() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    let committed = engine.navigate(tab, url("http://a.com/")).expect("navigation");
    assert!(engine.navigation(committed.id).is_none());

    let id = engine
        .start_navigation(tab, url("http://b.com/"))
        .expect("navigation");
    assert!(engine.navigation(id).is_some());
    engine.cancel_navigation(id);
    assert!(engine.navigation(id).is_none());
}

#[test]
fn discarding_a_tab_tears_down_its_process() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let child = engine.create_subframe(tab).expect("subframe");
    engine.navigate(child, url("http://a.com/inner.html"));
    assert_eq!(engine.process_count(), 1);

    engine.discard_frame(tab);
    assert_eq!(engine.process_count(), 0);
    assert!(engine.site_instance_of(tab).is_none());
    assert!(engine.site_instance_of(child).is_none());
}

#[test]
fn commit_replaces_the_previous_documents_subframes() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let child = engine.create_subframe(tab).expect("subframe");
    engine.navigate(child, url("http://b.com/"));
    assert_eq!(engine.process_count(), 2);

    // Navigating the main frame cross-document destroys the old document's
    // iframe and everything only it was keeping alive.
    engine.navigate(tab, url("http://c.com/"));
    assert!(engine.site_instance_of(child).is_none());
    assert_eq!(engine.process_count(), 1);
}

#[test]
fn forced_swap_discards_the_previous_documents_subframes() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let child = engine.create_subframe(tab).expect("subframe");
    engine.navigate(child, url("http://c.com/"));
    let old_group = engine.browsing_instance_of(tab).expect("group");

    engine.add_isolated_origins(
        vec![url("http://b.com/").origin()],
        IsolatedOriginSource::Runtime,
        None,
    );
    let navigation = engine.navigate(tab, url("http://b.com/")).expect("navigation");
    assert_eq!(navigation.swap_state, ForcedSwapState::Swapped);
    assert_ne!(engine.browsing_instance_of(tab), Some(old_group));

    // The subframe dies with the old document rather than lingering in the
    // abandoned BrowsingInstance, and the old processes die with it.
    assert!(engine.site_instance_of(child).is_none());
    assert_eq!(engine.process_count(), 1);
}

#[test]
fn isolated_origins_scope_to_their_browser_context() {
    let mut engine = engine_with(|_| {});
    let other_profile = BrowserContextId::new();
    engine.add_isolated_origins(
        vec![url("http://isolated.foo.com/").origin()],
        IsolatedOriginSource::Runtime,
        Some(other_profile),
    );

    let default_tab = engine.create_tab();
    engine.navigate(default_tab, url("http://isolated.foo.com/"));
    assert!(
        !engine
            .site_of(default_tab)
            .expect("site")
            .requires_dedicated_process()
    );

    let scoped_tab = engine.create_tab_in(other_profile);
    engine.navigate(scoped_tab, url("http://isolated.foo.com/"));
    assert!(
        engine
            .site_of(scoped_tab)
            .expect("site")
            .requires_dedicated_process()
    );
}

#[test]
fn origin_lock_gates_data_access() {
    let mut engine = engine_with(|opts| {
        opts.isolated_origins = Some("http://isolated.foo.com".to_owned());
    });
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://isolated.foo.com/"));
    let locked = engine.process_of(tab).expect("process");

    assert!(engine.can_access_data_for_origin(locked, &url("http://isolated.foo.com/").origin()));
    // Subdomains key their data under the registered origin's site.
    assert!(
        engine.can_access_data_for_origin(locked, &url("http://sub.isolated.foo.com/").origin())
    );
    assert!(!engine.can_access_data_for_origin(locked, &url("http://other.com/").origin()));

    let plain = engine.create_tab();
    engine.navigate(plain, url("http://a.com/"));
    let unlocked = engine.process_of(plain).expect("process");
    assert!(engine.can_access_data_for_origin(unlocked, &url("http://anything.net/").origin()));
}

#[test]
fn failed_main_frame_navigations_share_the_error_process() {
    let mut engine = engine_with(|_| {});
    let tab_a = engine.create_tab();
    let first = engine
        .start_navigation(tab_a, url("http://down.example/"))
        .expect("navigation");
    engine.on_navigation_failed(first);
    engine.on_response_ready(first);
    engine.commit_navigation(first);

    let site = engine.site_of(tab_a).expect("site");
    assert!(site.is_error_page());
    assert!(site.requires_dedicated_process());

    let tab_b = engine.create_tab();
    let second = engine
        .start_navigation(tab_b, url("http://also-down.example/"))
        .expect("navigation");
    engine.on_navigation_failed(second);
    engine.on_response_ready(second);
    engine.commit_navigation(second);

    assert_eq!(engine.process_of(tab_a), engine.process_of(tab_b));
    assert_ne!(engine.site_instance_of(tab_a), engine.site_instance_of(tab_b));
}

#[test]
fn failed_subframe_navigation_keeps_its_destination_site() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let child = engine.create_subframe(tab).expect("subframe");
    let id = engine
        .start_navigation(child, url("http://b.com/missing.html"))
        .expect("navigation");
    engine.on_navigation_failed(id);
    engine.on_response_ready(id);
    engine.commit_navigation(id);

    let site = engine.site_of(child).expect("site");
    assert!(!site.is_error_page());
    assert_eq!(site.to_string(), "http://b.com");
}

#[test]
fn about_blank_commits_into_the_current_site_instance() {
    let mut engine = engine_with(|_| {});
    let tab = engine.create_tab();
    engine.navigate(tab, url("http://a.com/"));
    let instance = engine.site_instance_of(tab);

    engine.navigate(tab, url("about:blank"));
    assert_eq!(engine.site_instance_of(tab), instance);
    assert_eq!(engine.site_of(tab).expect("site").to_string(), "http://a.com");
}
