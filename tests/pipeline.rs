//! End-to-end tests through the container pipeline, without HTTP.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use valve_engine::builtin::system_registry;
use valve_engine::config::EngineConfig;
use valve_engine::container::{DeployError, Deployer};
use valve_engine::filter::UnitError;
use valve_engine::response::ServletResponse;

mod common;

use common::{app_context, body, deploy, engine_config, filter, get, get_host, mapping, Tracker};

#[test]
fn test_demo_tree() {
    let engine = Deployer::new(system_registry())
        .deploy(&EngineConfig::default())
        .unwrap();

    let hello = get(&engine, "/");
    assert_eq!(hello.status(), 200);
    assert!(body(&hello).starts_with("Hello from"));

    let echo = get(&engine, "/echo/a/b?x=1");
    let text = body(&echo);
    assert!(text.contains("servlet_path: /echo"), "{}", text);
    assert!(text.contains("path_info: /a/b"), "{}", text);
    assert!(text.contains("query_string: x=1"), "{}", text);
}

#[test]
fn test_unknown_host_uses_default() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());
    assert_eq!(get_host(&engine, "unknown.example", "/app/count").status(), 200);
    assert_eq!(get_host(&engine, "127.0.0.1", "/app/count").status(), 200);
}

#[test]
fn test_no_host_is_bad_request() {
    let tracker = Arc::new(Tracker::default());
    let mut config = engine_config(app_context());
    config.engine.default_host = "missing".to_string();
    let engine = common::deployer(&tracker).deploy(&config).unwrap();
    assert_eq!(get_host(&engine, "unknown.example", "/").status(), 400);
}

#[test]
fn test_reserved_paths_are_not_found() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());

    for path in ["/WEB-INF", "/WEB-INF/web.xml", "/meta-inf/MANIFEST.MF", "/app/Web-Inf/x"] {
        assert_eq!(get(&engine, path).status(), 404, "{}", path);
    }
    // Only the exact directory names are protected
    assert_eq!(get(&engine, "/WEB-INFO").status(), 200);
}

#[test]
fn test_handler_instantiated_once() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());
    assert_eq!(tracker.handler_inits(), 0);

    for _ in 0..3 {
        let response = get(&engine, "/app/count");
        assert_eq!(response.status(), 200);
        assert_eq!(body(&response), "counted");
    }
    assert_eq!(tracker.handler_inits(), 1);
}

#[test]
fn test_handler_init_failure_is_server_error() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());
    assert_eq!(get(&engine, "/app/broken").status(), 500);
    assert_eq!(get(&engine, "/app/broken").status(), 500);
}

#[test]
fn test_unavailable_handler_stays_unavailable() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());

    assert_eq!(get(&engine, "/app/down").status(), 503);
    assert_eq!(get(&engine, "/app/down").status(), 503);
    assert_eq!(tracker.events(), vec!["down".to_string()]);
}

#[test]
fn test_unmapped_path_is_not_found() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());
    assert_eq!(get(&engine, "/app/nothing-here").status(), 404);
}

#[test]
fn test_listeners_fire_in_order() {
    let tracker = Arc::new(Tracker::default());
    let mut app = app_context();
    app.listeners = vec!["app::RecorderA".into(), "app::RecorderB".into()];
    let (engine, _) = deploy(&tracker, app);

    assert_eq!(get(&engine, "/app/count").status(), 200);
    assert_eq!(
        tracker.events(),
        vec!["init:a", "init:b", "service", "destroy:a", "destroy:b"]
    );
}

#[test]
fn test_listener_teardown_is_best_effort() {
    let tracker = Arc::new(Tracker::default());
    let mut app = app_context();
    app.listeners = vec![
        "app::RecorderA".into(),
        "app::FailsDestroy".into(),
        "app::RecorderB".into(),
    ];
    let (engine, _) = deploy(&tracker, app);

    let response = get(&engine, "/app/count");
    assert_eq!(
        tracker.events(),
        vec![
            "init:a",
            "init:fails-destroy",
            "init:b",
            "service",
            "destroy:a",
            "destroy:fails-destroy",
            "destroy:b",
        ]
    );
    // The failure is recorded on the request and reported by the host stage
    assert_eq!(response.status(), 500);
}

#[test]
fn test_listener_init_failure_skips_handler() {
    let tracker = Arc::new(Tracker::default());
    let mut app = app_context();
    app.listeners = vec![
        "app::RecorderA".into(),
        "app::FailsInit".into(),
        "app::RecorderB".into(),
    ];
    let (engine, _) = deploy(&tracker, app);

    let response = get(&engine, "/app/count");
    assert_eq!(response.status(), 500);
    assert_eq!(tracker.events(), vec!["init:a", "init:fails-init"]);
}

#[test]
fn test_include_is_isolated() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());

    let response = get(&engine, "/app/inc");
    assert_eq!(response.status(), 200);
    assert!(response.header("x-inner").is_none());
    assert_eq!(
        body(&response),
        "[outer][include_uri=/app/target][after_include=none]"
    );
}

#[test]
fn test_forward_replaces_output() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());

    let response = get(&engine, "/app/fwd?q=1");
    assert_eq!(response.status(), 200);
    assert!(response.is_committed());
    assert_eq!(
        body(&response),
        "servlet_path=/landing path_info=/x query=q=1 forward_uri=/app/fwd"
    );
}

#[test]
fn test_forward_after_commit_fails() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());

    let response = get(&engine, "/app/late");
    assert_eq!(response.status(), 200);
    assert_eq!(body(&response), "discarded");
}

#[test]
fn test_filters_apply_per_dispatcher() {
    let tracker = Arc::new(Tracker::default());
    let mut app = app_context();
    app.filters = vec![filter("request-only", "app::Mark"), filter("include-only", "app::Mark")];
    let mut include_only = mapping("include-only", &["/*"]);
    include_only.dispatchers = vec![valve_engine::filter::DispatcherType::Include];
    app.filter_mappings = vec![mapping("request-only", &["/*"]), include_only];
    let (engine, _) = deploy(&tracker, app);

    // Filters start eagerly
    assert_eq!(tracker.filter_inits(), 2);

    get(&engine, "/app/count");
    assert_eq!(tracker.events(), vec!["filter:request-only", "service"]);

    tracker.clear();
    get(&engine, "/app/inc");
    assert_eq!(
        tracker.events(),
        vec!["filter:request-only", "filter:include-only"]
    );
}

#[test]
fn test_restricted_filter_needs_privilege() {
    let tracker = Arc::new(Tracker::default());
    let mut app = app_context();
    app.filters = vec![filter("dump", "system::RequestDumper")];
    app.filter_mappings = vec![mapping("dump", &["/*"])];

    let err = common::deployer(&tracker)
        .deploy(&engine_config(app.clone()))
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::Unit {
            source: UnitError::Access { .. },
            ..
        }
    ));

    app.privileged = true;
    let (engine, _) = deploy(&tracker, app);
    assert_eq!(get(&engine, "/app/count").status(), 200);
}

#[test]
fn test_reload_keeps_unchanged_filters() {
    let tracker = Arc::new(Tracker::default());
    let mut app = app_context();
    app.filters = vec![filter("mark", "app::Mark")];
    app.filter_mappings = vec![mapping("mark", &["/*"])];
    let (engine, deployer) = deploy(&tracker, app.clone());

    get(&engine, "/app/count");
    assert_eq!(tracker.handler_inits(), 1);
    assert_eq!(tracker.filter_inits(), 1);
    let before = engine
        .find_host("localhost")
        .and_then(|h| h.find_context("/app"))
        .unwrap();

    // Same settings, different servlet parameters: reloaded in place
    app.servlets[0]
        .parameters
        .insert("changed".into(), "yes".into());
    engine
        .apply_config(&engine_config(app), &deployer)
        .unwrap();

    let after = engine
        .find_host("localhost")
        .and_then(|h| h.find_context("/app"))
        .unwrap();
    assert!(Arc::ptr_eq(&before, &after));

    get(&engine, "/app/count");
    assert_eq!(tracker.handler_inits(), 2);
    assert_eq!(tracker.filter_inits(), 1);
}

#[test]
fn test_removed_context_is_gone() {
    let tracker = Arc::new(Tracker::default());
    let (engine, deployer) = deploy(&tracker, app_context());
    assert_eq!(body(&get(&engine, "/app/count")), "counted");

    let config = EngineConfig {
        engine: engine_config(app_context()).engine,
        ..EngineConfig::default()
    };
    engine.apply_config(&config, &deployer).unwrap();

    let host = engine.find_host("localhost").unwrap();
    assert!(host.find_context("/app").is_none());
    // Now served by the root context's default servlet
    assert!(body(&get(&engine, "/app/count")).starts_with("Hello from"));
}

#[test]
fn test_paused_context_holds_requests() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());
    let context = engine
        .find_host("localhost")
        .and_then(|h| h.find_context("/app"))
        .unwrap();

    context.gate().pause();
    let (tx, rx) = mpsc::channel();
    let worker = {
        let engine = engine.clone();
        thread::spawn(move || {
            let response = get(&engine, "/app/count");
            let _ = tx.send(response.status());
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    context.gate().resume();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 200);
    worker.join().unwrap();
}

#[test]
fn test_restricted_handler_is_forbidden() {
    let tracker = Arc::new(Tracker::default());
    let mut app = app_context();
    app.servlets
        .push(common::servlet("info", "system::ContextInfo", &["/info"]));
    app.parameters.insert("region".into(), "eu".into());

    let (engine, _) = deploy(&tracker, app.clone());
    let denied = get(&engine, "/app/info");
    assert_eq!(denied.status(), 403);
    assert!(body(&denied).contains("/app/info"));

    app.privileged = true;
    let (engine, _) = deploy(&tracker, app);
    let allowed = get(&engine, "/app/info");
    assert_eq!(allowed.status(), 200);
    let text = body(&allowed);
    assert!(text.contains("context_path: /app"), "{}", text);
    assert!(text.contains("parameters: region"), "{}", text);
}

#[test]
fn test_dot_segments_cannot_reach_reserved_paths() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());

    for path in [
        "/./WEB-INF/web.xml",
        "/.//WEB-INF/web.xml",
        "/static/../WEB-INF/web.xml",
        "/a//../META-INF/MANIFEST.MF",
        "/%2E/WEB-INF/web.xml",
    ] {
        assert_eq!(get(&engine, path).status(), 404, "{}", path);
    }
    assert_eq!(get(&engine, "/static/./x").status(), 200);
}

#[test]
fn test_stopped_context_does_not_recreate_units() {
    let tracker = Arc::new(Tracker::default());
    let (engine, _) = deploy(&tracker, app_context());
    let context = engine
        .find_host("localhost")
        .and_then(|h| h.find_context("/app"))
        .unwrap();

    context.gate().pause();
    let (tx, rx) = mpsc::channel();
    let worker = {
        let engine = engine.clone();
        thread::spawn(move || {
            let response = get(&engine, "/app/count");
            let _ = tx.send(response.status());
        })
    };
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    // Stopping resumes the gate on its way out
    context.stop();
    assert!(context.is_stopped());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 503);
    worker.join().unwrap();

    assert_eq!(get(&engine, "/app/count").status(), 503);
    assert_eq!(tracker.handler_inits(), 0);
    assert!(!context.wrapper("counter").unwrap().is_loaded());
}

#[test]
fn test_held_request_moves_to_rebuilt_context() {
    let tracker = Arc::new(Tracker::default());
    let app = app_context();
    let (engine, deployer) = deploy(&tracker, app.clone());
    let before = engine
        .find_host("localhost")
        .and_then(|h| h.find_context("/app"))
        .unwrap();

    before.gate().pause();
    let (tx, rx) = mpsc::channel();
    let worker = {
        let engine = engine.clone();
        thread::spawn(move || {
            let response = get(&engine, "/app/count");
            let _ = tx.send((response.status(), body(&response)));
        })
    };
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    // A changed display name forces a rebuild; the old context is stopped
    let mut changed = app;
    changed.display_name = "app v2".into();
    engine
        .apply_config(&engine_config(changed), &deployer)
        .unwrap();

    let after = engine
        .find_host("localhost")
        .and_then(|h| h.find_context("/app"))
        .unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(before.is_stopped());

    let (status, text) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(status, 200);
    assert_eq!(text, "counted");
    worker.join().unwrap();

    assert_eq!(tracker.handler_inits(), 1);
    assert!(!before.wrapper("counter").unwrap().is_loaded());
    assert!(after.wrapper("counter").unwrap().is_loaded());
}
