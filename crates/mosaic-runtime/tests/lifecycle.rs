//! Lifecycle integration tests: activation, unmount, unload and update
//! against an in-memory host.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Export, Harness, bundle_body, css_url, js_url};
use mosaic_assets::html::{MarkerKind, marker_comment};
use mosaic_host::{Element, HostValue, MemoryHost, ModuleNamespace, Scope};
use mosaic_runtime::prelude::*;
use mosaic_sandbox::SandboxOptions;
use mosaic_test::{
    EventLog, MockEngine, MockFetcher, TEST_LOCATION, memory_host, recording_fn,
};

fn private_sandbox() -> SandboxConfig {
    SandboxConfig::Custom(SandboxOptions::default().multi_mode())
}

#[tokio::test]
async fn activation_inserts_tagged_assets_and_mounts() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.mosaic.register(Harness::config("shop")).unwrap();

    h.mosaic.create_app("shop").await.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    assert_eq!(h.dynamic_count("script"), 1);
    assert_eq!(h.dynamic_count("link"), 1);
    assert_eq!(h.log.entries(), vec!["mount:shop"]);
}

#[tokio::test]
async fn lifecycle_without_mount_stops_at_not_mounted() {
    let h = Harness::new(&[]);
    h.fetcher.respond(js_url("bare"), "/* no lifecycle */");
    h.fetcher.respond(css_url("bare"), "body{}");
    h.mosaic.register(Harness::config("bare")).unwrap();

    h.mosaic.create_app("bare").await.unwrap();

    assert_eq!(h.mosaic.status("bare"), Some(AppStatus::NotMounted));
}

#[tokio::test]
async fn create_app_registers_unknown_configs() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);

    h.mosaic.create_app(Harness::config("shop")).await.unwrap();

    assert_eq!(h.mosaic.app_names(), vec!["shop"]);
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let h = Harness::new(&[]);
    h.mosaic.register(Harness::config("shop")).unwrap();
    let err = h.mosaic.register(Harness::config("shop")).unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateName(name) if name == "shop"));
}

#[tokio::test]
async fn concurrent_activations_fetch_once() {
    let fetcher = MockFetcher::new().with_delay(Duration::from_millis(20));
    let h = Harness::with_fetcher(&[("shop", Export::SelfRegistered)], fetcher);
    h.mosaic.register(Harness::config("shop")).unwrap();

    let (first, second) = tokio::join!(h.mosaic.create_app("shop"), h.mosaic.create_app("shop"));
    first.unwrap();
    second.unwrap();

    assert_eq!(h.fetcher.fetch_count(&js_url("shop")), 1);
    assert_eq!(h.log.count("mount:shop"), 1);
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
}

#[tokio::test]
async fn load_finishing_after_unmount_does_not_mount() {
    let fetcher = MockFetcher::new().with_delay(Duration::from_millis(50));
    let h = Harness::with_fetcher(&[("shop", Export::SelfRegistered)], fetcher);
    h.mosaic.register(Harness::config("shop")).unwrap();

    let (activated, unmounted) = tokio::join!(h.mosaic.create_app("shop"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.mosaic.unmount_app("shop").await
    });
    activated.unwrap();
    unmounted.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Unmounted));
    assert_eq!(h.log.count("mount:shop"), 0);
}

#[tokio::test]
async fn stale_sandboxed_load_leaves_no_footprint() {
    let fetcher = MockFetcher::new().with_delay(Duration::from_millis(50));
    let h = Harness::with_fetcher(&[("shop", Export::Global)], fetcher);
    h.mosaic
        .register(Harness::config("shop").sandbox(true))
        .unwrap();
    let before = h.host.memory_global().snapshot();

    let (activated, unmounted) = tokio::join!(h.mosaic.create_app("shop"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.mosaic.unmount_app("shop").await
    });
    activated.unwrap();
    unmounted.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Unmounted));
    assert_eq!(h.log.count("mount:shop"), 0);
    assert!(h.host.global().get("lastLoaded").is_undefined());
    assert!(h.host.global().get("shopApp").is_undefined());
    assert_eq!(h.host.memory_global().snapshot(), before);
    assert_eq!(h.dynamic_count("link"), 0);
    assert_eq!(h.dynamic_count("style"), 0);

    // A later activation starts clean and mounts.
    h.mosaic.create_app("shop").await.unwrap();
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    assert_eq!(h.host.global().get("lastLoaded"), HostValue::from("shop"));
}

#[tokio::test]
async fn entry_markup_lands_in_the_container() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.host.document().add_container("root");
    let markup = format!(
        r#"<div id="app-root">hello</div><script src="{}"></script>"#,
        js_url("shop")
    );
    h.mosaic
        .register(
            AppConfig::new(
                "shop",
                SourceLocator::content(Some("https://x/index.html".to_string()), markup),
            )
            .container("root"),
        )
        .unwrap();

    h.mosaic.create_app("shop").await.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    let html = h.host.document().container_html("root").unwrap();
    assert!(html.contains(r#"<div id="app-root">hello</div>"#));
    assert!(html.contains(&marker_comment("script", &js_url("shop"), MarkerKind::Replaced)));
    assert!(!html.contains("<script"));
    assert_eq!(h.dynamic_count("script"), 1);
}

#[tokio::test]
async fn url_sources_leave_the_container_alone() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.host.document().add_container("root");
    h.mosaic
        .register(Harness::config("shop").container("root"))
        .unwrap();

    h.mosaic.create_app("shop").await.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    assert_eq!(h.host.document().container_html("root").as_deref(), Some(""));
}

fn import_harness(name: &str) -> Harness {
    let log = EventLog::new();
    let namespace: ModuleNamespace = [
        ("mount", HostValue::Function(recording_fn(&log, format!("mount:{name}")))),
        ("unmount", HostValue::Function(recording_fn(&log, format!("unmount:{name}")))),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();
    let engine = MockEngine::new()
        .with_dynamic_import()
        .with_module(js_url(name), namespace);
    let fetcher = MockFetcher::new().with_response(css_url(name), "body{}");
    let host = memory_host(engine, fetcher.clone());
    Harness {
        mosaic: Mosaic::new(host.clone()),
        host,
        fetcher,
        log,
    }
}

fn head_count(h: &Harness, tag: &str, text: &str) -> usize {
    h.host
        .document()
        .elements(tag)
        .iter()
        .filter(|(_, el)| el.text == text)
        .count()
}

#[tokio::test]
async fn import_mode_restores_module_styles_on_remount() {
    let h = import_harness("shop");
    h.mosaic
        .register(Harness::config("shop").load_strategy(LoadStrategy::Import))
        .unwrap();
    h.mosaic.create_app("shop").await.unwrap();
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));

    // Side effects of the module: elements it inserted without runtime tags.
    let document = h.host.document();
    document.insert_head(Element::new("style").with_text(".shop{}"));
    document.insert_head(Element::new("script").with_text("/* shop side effect */"));

    h.mosaic.unmount_app("shop").await.unwrap();
    assert_eq!(head_count(&h, "style", ".shop{}"), 0);
    assert_eq!(head_count(&h, "script", "/* shop side effect */"), 0);
    assert_eq!(h.dynamic_count("style") + h.dynamic_count("link"), 0);

    h.mosaic.create_app("shop").await.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    assert_eq!(h.log.count("mount:shop"), 2);
    assert_eq!(head_count(&h, "style", ".shop{}"), 1);
    assert_eq!(head_count(&h, "script", "/* shop side effect */"), 0);
    // The application's own stylesheet comes back once, from the remount.
    assert_eq!(h.dynamic_count("style") + h.dynamic_count("link"), 1);
}

#[tokio::test]
async fn import_mode_restores_module_styles_on_reload() {
    let h = import_harness("shop");
    h.mosaic
        .register(Harness::config("shop").load_strategy(LoadStrategy::Import))
        .unwrap();
    h.mosaic.create_app("shop").await.unwrap();
    h.host
        .document()
        .insert_head(Element::new("style").with_text(".shop{}"));

    h.mosaic.unload_app("shop").await.unwrap();
    assert_eq!(head_count(&h, "style", ".shop{}"), 0);

    h.mosaic.create_app("shop").await.unwrap();
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    assert_eq!(head_count(&h, "style", ".shop{}"), 1);
}

#[tokio::test]
async fn unmount_twice_is_unmount_once() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.mosaic.register(Harness::config("shop")).unwrap();
    h.mosaic.create_app("shop").await.unwrap();

    h.mosaic.unmount_app("shop").await.unwrap();
    let after_first = (h.mosaic.status("shop"), h.log.entries(), h.dynamic_count("script"));
    h.mosaic.unmount_app("shop").await.unwrap();
    let after_second = (h.mosaic.status("shop"), h.log.entries(), h.dynamic_count("script"));

    assert_eq!(after_first, after_second);
    assert_eq!(after_first.0, Some(AppStatus::Unmounted));
    assert_eq!(h.log.count("unmount:shop"), 1);
    assert_eq!(h.dynamic_count("link"), 0);
}

#[tokio::test]
async fn mount_before_load_does_nothing() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.mosaic.register(Harness::config("shop")).unwrap();

    h.mosaic.mount_app("shop").await.unwrap();
    h.mosaic.unmount_app("shop").await.unwrap();
    h.mosaic.update_app("shop", HostValue::Null).await.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::NotLoaded));
    assert!(h.log.entries().is_empty());
    assert_eq!(h.fetcher.total_fetches(), 0);
}

#[tokio::test]
async fn operations_on_unknown_apps_are_errors() {
    let h = Harness::new(&[]);
    assert!(matches!(
        h.mosaic.create_app("ghost").await,
        Err(RuntimeError::MissingApp(_))
    ));
    assert!(matches!(
        h.mosaic.mount_app("ghost").await,
        Err(RuntimeError::MissingApp(_))
    ));
    assert!(matches!(
        h.mosaic.remove_app("ghost").await,
        Err(RuntimeError::MissingApp(_))
    ));
}

#[tokio::test]
async fn reactivation_remounts_without_refetching_the_bundle() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.mosaic.register(Harness::config("shop")).unwrap();
    h.mosaic.create_app("shop").await.unwrap();
    h.mosaic.unmount_app("shop").await.unwrap();
    assert_eq!(h.dynamic_count("link"), 0);

    h.mosaic.create_app("shop").await.unwrap();

    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    assert_eq!(h.log.count("mount:shop"), 2);
    assert_eq!(h.fetcher.fetch_count(&js_url("shop")), 1);
    assert_eq!(h.dynamic_count("link"), 1);
}

#[tokio::test]
async fn unload_forces_a_fresh_load() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.mosaic.register(Harness::config("shop")).unwrap();
    h.mosaic.create_app("shop").await.unwrap();

    h.mosaic.unload_app("shop").await.unwrap();
    let app = h.mosaic.app("shop").unwrap();
    assert_eq!(app.status(), AppStatus::NotLoaded);
    assert!(app.hooks.is_empty());
    assert!(app.assets.is_none());

    h.mosaic.create_app("shop").await.unwrap();
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::Mounted));
    assert_eq!(h.fetcher.fetch_count(&js_url("shop")), 2);
}

#[tokio::test]
async fn load_failure_reports_and_can_be_retried() {
    let h = Harness::new(&[("broken", Export::Unserved)]);
    h.mosaic.register(Harness::config("broken")).unwrap();
    let errors = mosaic_test::EventLog::new();
    let sink = errors.clone();
    let options = StartOptions::new().on_error(move |app, _| sink.push(format!("error:{app}")));

    h.mosaic.create_app_with("broken", options).await.unwrap();
    assert_eq!(h.mosaic.status("broken"), Some(AppStatus::LoadError));
    assert_eq!(errors.entries(), vec!["error:broken"]);

    h.fetcher.respond(js_url("broken"), bundle_body("broken"));
    h.mosaic.create_app("broken").await.unwrap();
    assert_eq!(h.mosaic.status("broken"), Some(AppStatus::Mounted));
    assert_eq!(errors.entries().len(), 1);
}

#[tokio::test]
async fn throwing_mount_surfaces_as_hook_error() {
    let h = Harness::new(&[("shop", Export::FailingMount)]);
    h.mosaic.register(Harness::config("shop")).unwrap();

    let err = h.mosaic.create_app("shop").await.unwrap_err();

    assert!(matches!(err, RuntimeError::Hook { hook: "mount", ref app, .. } if app == "shop"));
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::NotMounted));
}

#[tokio::test]
async fn update_reaches_mounted_apps_only() {
    let h = Harness::new(&[("editor", Export::Updatable)]);
    h.mosaic.register(Harness::config("editor")).unwrap();

    h.mosaic
        .update_app("editor", HostValue::from("light"))
        .await
        .unwrap();
    assert_eq!(h.log.count("update:editor"), 0);

    h.mosaic.create_app("editor").await.unwrap();
    h.mosaic
        .update_app("editor", HostValue::from("dark"))
        .await
        .unwrap();

    assert_eq!(h.log.count("update:editor"), 1);
    let app = h.mosaic.app("editor").unwrap();
    assert_eq!(app.config.props.as_str(), Some("dark"));
}

#[tokio::test]
async fn bootstrap_runs_once_per_load_cycle() {
    let h = Harness::new(&[("boot", Export::Bootstrapped)]);
    h.mosaic.register(Harness::config("boot")).unwrap();

    h.mosaic.create_app("boot").await.unwrap();
    assert!(h.log.position("bootstrap:boot").unwrap() < h.log.position("mount:boot").unwrap());

    h.mosaic.unmount_app("boot").await.unwrap();
    h.mosaic.create_app("boot").await.unwrap();
    assert_eq!(h.log.count("bootstrap:boot"), 1);
    assert_eq!(h.log.count("mount:boot"), 2);

    h.mosaic.unload_app("boot").await.unwrap();
    h.mosaic.create_app("boot").await.unwrap();
    assert_eq!(h.log.count("bootstrap:boot"), 2);
}

#[tokio::test]
async fn extension_hooks_wrap_lifecycle_calls() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    let log = h.log.clone();
    let before = log.clone();
    let after = log.clone();
    let hooks = ExtensionHooks::new()
        .on(HookStage::BeforeMount, move |app| {
            let (log, name) = (before.clone(), app.name().to_string());
            async move { log.push(format!("before:{name}")) }
        })
        .on(HookStage::AfterUnmount, move |app| {
            let (log, name) = (after.clone(), app.name().to_string());
            async move { log.push(format!("after-unmount:{name}")) }
        });
    h.mosaic
        .register(Harness::config("shop").extension_hooks(hooks))
        .unwrap();

    h.mosaic.create_app("shop").await.unwrap();
    h.mosaic.unmount_app("shop").await.unwrap();

    assert_eq!(
        log.entries(),
        vec!["before:shop", "mount:shop", "unmount:shop", "after-unmount:shop"]
    );
}

#[tokio::test]
async fn sandboxes_are_independent_and_keep_the_host_clean() {
    let h = Harness::new(&[("a", Export::Global), ("b", Export::Global)]);
    h.mosaic
        .register_many([
            Harness::config("a").sandbox(private_sandbox()),
            Harness::config("b").sandbox(private_sandbox()),
        ])
        .unwrap();

    h.mosaic.create_app("a").await.unwrap();
    h.mosaic.create_app("b").await.unwrap();

    let a = h.mosaic.app("a").unwrap();
    let b = h.mosaic.app("b").unwrap();
    assert_eq!(a.status(), AppStatus::Mounted);
    assert_eq!(b.status(), AppStatus::Mounted);
    assert_eq!(a.load_strategy(), LoadStrategy::Fetch);

    let (sa, sb) = (a.sandbox.unwrap(), b.sandbox.unwrap());
    assert!(!Arc::ptr_eq(&sa, &sb));
    assert!(sa.added_properties().contains(&"lastLoaded".to_string()));
    assert!(sb.added_properties().contains(&"lastLoaded".to_string()));
    assert!(h.host.global().get("lastLoaded").is_undefined());

    h.mosaic.unmount_app("a").await.unwrap();
    assert!(h.mosaic.app("a").unwrap().sandbox.is_none());
    assert!(sa.added_properties().is_empty());
    assert!(h.host.global().get("lastLoaded").is_undefined());
}

#[tokio::test]
async fn cached_apps_keep_their_sandbox_across_unmounts() {
    let h = Harness::new(&[("shop", Export::Global)]);
    h.mosaic
        .register(Harness::config("shop").sandbox(true).cached())
        .unwrap();
    h.mosaic.create_app("shop").await.unwrap();
    let sandbox = h.mosaic.app("shop").unwrap().sandbox.unwrap();

    h.mosaic.unmount_app("shop").await.unwrap();
    let kept = h.mosaic.app("shop").unwrap().sandbox.unwrap();
    assert!(Arc::ptr_eq(&sandbox, &kept));

    h.mosaic.create_app("shop").await.unwrap();
    assert_eq!(h.log.count("mount:shop"), 2);
    assert_eq!(h.fetcher.fetch_count(&js_url("shop")), 1);
}

#[tokio::test]
async fn shared_resources_are_fetched_once() {
    let vendor = "https://x/vendor.js";
    let fetcher = MockFetcher::new().with_response(vendor, "/* vendor */");
    let h = Harness::with_fetcher(&[("a", Export::Global), ("b", Export::Global)], fetcher);
    for name in ["a", "b"] {
        h.mosaic
            .register(
                AppConfig::new(name, SourceLocator::urls([vendor.to_string(), js_url(name)])).umd(),
            )
            .unwrap();
    }

    h.mosaic.create_app("a").await.unwrap();
    h.mosaic.create_app("b").await.unwrap();

    assert_eq!(h.fetcher.fetch_count(vendor), 1);
    assert_eq!(h.mosaic.status("a"), Some(AppStatus::Mounted));
    assert_eq!(h.mosaic.status("b"), Some(AppStatus::Mounted));
}

#[tokio::test]
async fn prefetch_warms_the_cache_for_later_loads() {
    let h = Harness::new(&[("shop", Export::Global)]);
    h.mosaic
        .register(Harness::config("shop").umd().active_path("/shop"))
        .unwrap();

    let handles = h.mosaic.prefetch_apps(&PrefetchPolicy::All).unwrap();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(h.fetcher.fetch_count(&js_url("shop")), 1);

    // Inactive at the current location: loads from cache, does not mount.
    h.mosaic.create_app("shop").await.unwrap();
    assert_eq!(h.fetcher.fetch_count(&js_url("shop")), 1);
    assert_eq!(h.mosaic.status("shop"), Some(AppStatus::NotMounted));
}

#[tokio::test]
async fn remove_app_unmounts_and_forgets() {
    let h = Harness::new(&[("shop", Export::SelfRegistered)]);
    h.mosaic.register(Harness::config("shop")).unwrap();
    h.mosaic.create_app("shop").await.unwrap();

    h.mosaic.remove_app("shop").await.unwrap();

    assert!(h.mosaic.app_names().is_empty());
    assert_eq!(h.log.count("unmount:shop"), 1);
    assert_eq!(h.dynamic_count("script"), 0);
}

#[tokio::test]
async fn start_without_any_fetch_is_rejected() {
    let host = MemoryHost::new(TEST_LOCATION, Arc::new(MockEngine::new())).unwrap();
    let mosaic = Mosaic::new(Arc::new(host));

    let err = mosaic.start(StartOptions::new()).await.unwrap_err();

    assert!(matches!(err, RuntimeError::UnsupportedFetch));
    assert!(!mosaic.is_started());
}

#[tokio::test]
async fn second_start_warns_before_checking_fetch() {
    let host = MemoryHost::new(TEST_LOCATION, Arc::new(MockEngine::new())).unwrap();
    let mosaic = Mosaic::new(Arc::new(host));
    mosaic
        .start(StartOptions::new().fetch(Arc::new(MockFetcher::new())))
        .await
        .unwrap();

    mosaic.start(StartOptions::new()).await.unwrap();

    assert!(mosaic.is_started());
}
