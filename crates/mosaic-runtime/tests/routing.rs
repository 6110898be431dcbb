//! Routing integration tests: navigation-driven reconciliation, captured
//! listeners and start/stop.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Export, Harness, js_url};
use mosaic_data::{BASENAME_KEY, ROOT_KEY};
use mosaic_host::{Element, HostFunction, HostGlobal, HostValue};
use mosaic_runtime::prelude::*;
use mosaic_test::EventLog;
use serde_json::json;

fn two_apps() -> Harness {
    let h = Harness::new(&[("a", Export::SelfRegistered), ("b", Export::SelfRegistered)]);
    h.mosaic
        .register_many([
            Harness::config("a").active_path("/a"),
            Harness::config("b").active_path("/b"),
        ])
        .unwrap();
    h
}

fn counting(hits: &Arc<AtomicUsize>) -> HostFunction {
    let hits = Arc::clone(hits);
    HostFunction::sync("app-listener", move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(HostValue::Undefined)
    })
}

#[tokio::test]
async fn navigation_swaps_the_active_app() {
    let h = two_apps();
    let log = h.log.clone();
    let (enter, leave) = (log.clone(), log.clone());
    let options = StartOptions::new()
        .on_app_enter(move |app| enter.push(format!("enter:{}", app.name())))
        .on_app_leave(move |app| leave.push(format!("leave:{}", app.name())));
    h.mosaic.start(options).await.unwrap();
    assert_eq!(h.mosaic.status("a"), Some(AppStatus::NotLoaded));

    h.navigate("/a").await;
    assert_eq!(h.mosaic.status("a"), Some(AppStatus::Mounted));

    h.navigate("/b").await;
    assert_eq!(h.mosaic.status("a"), Some(AppStatus::Unmounted));
    assert_eq!(h.mosaic.status("b"), Some(AppStatus::Mounted));

    let at = |entry: &str| log.position(entry).unwrap();
    assert!(at("leave:a") < at("unmount:a"));
    assert!(at("enter:b") < at("mount:b"));
    assert_eq!(log.count("enter:a"), 1);
}

#[tokio::test]
async fn traversal_reactivates_previous_app() {
    let h = two_apps();
    h.mosaic.start(StartOptions::new()).await.unwrap();
    h.navigate("/a").await;
    h.navigate("/b").await;

    assert!(h.host.history().back().await);
    h.mosaic.settled().await;

    assert_eq!(h.mosaic.status("a"), Some(AppStatus::Mounted));
    assert_eq!(h.mosaic.status("b"), Some(AppStatus::Unmounted));
    assert_eq!(h.log.count("mount:a"), 2);
    assert_eq!(h.fetcher.fetch_count(&js_url("a")), 1);
}

#[tokio::test]
async fn start_mounts_apps_active_at_the_current_location() {
    let h = two_apps();
    h.host
        .history()
        .replace_state(HostValue::Null, "/a/detail")
        .unwrap();

    h.mosaic.start(StartOptions::new()).await.unwrap();

    assert!(h.mosaic.is_started());
    assert_eq!(h.mosaic.status("a"), Some(AppStatus::Mounted));
    assert_eq!(h.mosaic.status("b"), Some(AppStatus::NotLoaded));
}

#[tokio::test]
async fn same_location_is_reconciled_once() {
    let h = two_apps();
    let changes = EventLog::new();
    let sink = changes.clone();
    let options = StartOptions::new().on_route_change(move |change| sink.push(change.pathname.clone()));
    h.mosaic.start(options).await.unwrap();

    h.navigate("/a").await;
    h.host.history().replace_state(HostValue::Null, "/a").unwrap();
    h.mosaic.settled().await;

    assert_eq!(changes.entries(), vec!["/", "/a"]);
}

#[tokio::test]
async fn active_apps_callback_sees_the_matching_set() {
    let h = two_apps();
    let seen = EventLog::new();
    let sink = seen.clone();
    let options = StartOptions::new().on_active_apps(move |apps| {
        let names: Vec<_> = apps.iter().map(MicroApp::name).collect();
        sink.push(names.join(","));
    });
    h.mosaic.start(options).await.unwrap();

    h.navigate("/b").await;

    assert_eq!(seen.entries(), vec!["", "b"]);
}

#[tokio::test]
async fn captured_listeners_run_after_reconciliation() {
    let h = two_apps();
    h.mosaic.start(StartOptions::new()).await.unwrap();

    let pops = Arc::new(AtomicUsize::new(0));
    let listener = counting(&pops);
    let global = h.host.global();
    global.add_event_listener("popstate", listener.clone());
    assert_eq!(h.mosaic.router().captured().len("popstate"), 1);
    assert_eq!(global.listener_count("popstate"), 1);

    h.navigate("/a").await;
    assert_eq!(pops.load(Ordering::SeqCst), 1);

    global.remove_event_listener("popstate", &listener);
    h.navigate("/b").await;
    assert_eq!(pops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hash_routes_follow_fragment_changes() {
    let h = Harness::new(&[("orders", Export::SelfRegistered)]);
    h.mosaic
        .register(Harness::config("orders").active_path(PathRule::new("/orders").hash_type()))
        .unwrap();
    h.mosaic.start(StartOptions::new()).await.unwrap();

    let hashes = Arc::new(AtomicUsize::new(0));
    h.host
        .global()
        .add_event_listener("hashchange", counting(&hashes));

    h.host.history().set_hash("/orders").await.unwrap();
    h.mosaic.settled().await;

    assert_eq!(h.mosaic.status("orders"), Some(AppStatus::Mounted));
    assert_eq!(hashes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn basename_and_root_are_shared_with_apps() {
    let h = Harness::new(&[("seller", Export::SelfRegistered)]);
    h.mosaic
        .register(
            Harness::config("seller")
                .active_path("/seller")
                .container("seller-root"),
        )
        .unwrap();
    h.mosaic
        .start(StartOptions::new().basename("/portal"))
        .await
        .unwrap();

    h.navigate("/seller").await;
    assert_eq!(h.mosaic.status("seller"), Some(AppStatus::NotLoaded));

    h.navigate("/portal/seller/list").await;
    assert_eq!(h.mosaic.status("seller"), Some(AppStatus::Mounted));
    assert_eq!(h.mosaic.data().get(BASENAME_KEY), Some(json!("/portal/seller")));
    assert_eq!(h.mosaic.data().get(ROOT_KEY), Some(json!("seller-root")));
}

#[tokio::test]
async fn second_start_is_ignored() {
    let h = two_apps();
    let changes = EventLog::new();
    let sink = changes.clone();
    h.mosaic
        .start(StartOptions::new().on_route_change(move |_| sink.push("change")))
        .await
        .unwrap();

    h.mosaic.start(StartOptions::new()).await.unwrap();
    h.navigate("/a").await;

    assert_eq!(changes.count("change"), 2);
    assert_eq!(h.host.global().listener_count("popstate"), 1);
}

#[tokio::test]
async fn stop_unhooks_and_clears_everything_but_host_assets() {
    let h = two_apps();
    h.host.document().insert_head(
        Element::new("link")
            .with_attr("rel", "stylesheet")
            .with_attr("href", "https://host.test/main.css"),
    );
    h.mosaic.start(StartOptions::new()).await.unwrap();
    h.navigate("/a").await;
    assert_eq!(h.dynamic_count("script"), 1);

    h.mosaic.stop().await;

    assert!(!h.mosaic.is_started());
    assert!(!h.mosaic.router().is_running());
    assert!(h.mosaic.app_names().is_empty());
    assert_eq!(h.log.count("unmount:a"), 1);
    assert_eq!(h.dynamic_count("script"), 0);
    assert_eq!(h.dynamic_count("link"), 0);
    let links = h.host.document().elements("link");
    assert_eq!(links.len(), 1);
    assert!(links[0].1.is_static());
    assert_eq!(h.host.global().listener_count("popstate"), 0);

    // Navigation after stop reaches nobody.
    h.navigate("/b").await;
    assert_eq!(h.log.count("mount:b"), 0);
}

#[tokio::test]
async fn prefetch_on_start_downloads_inactive_apps() {
    let h = Harness::new(&[("later", Export::Global)]);
    h.mosaic
        .register(Harness::config("later").umd().active_path("/later"))
        .unwrap();

    h.mosaic
        .start(StartOptions::new().prefetch(PrefetchPolicy::Names(vec!["later".into()])))
        .await
        .unwrap();
    for _ in 0..50 {
        if h.fetcher.fetch_count(&js_url("later")) > 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(h.fetcher.fetch_count(&js_url("later")), 1);

    h.navigate("/later").await;
    assert_eq!(h.mosaic.status("later"), Some(AppStatus::Mounted));
    assert_eq!(h.fetcher.fetch_count(&js_url("later")), 1);
}
