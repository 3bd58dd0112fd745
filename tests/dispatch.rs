//! End-to-end dispatch: routing, authorization, invocation and rendering,
//! driven through `Dispatcher::handle` without a socket.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use actio::{
    ActionError, ActionResult, Actions, ConfigError, Context, Controller, Dispatcher, Error,
    RolesHeader, Settings, SharedStore, StringRenderer,
};
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde::Deserialize;
use serde_json::{Value, json};
use tempfile::TempDir;

// ── Controllers ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct BarController;

impl Controller for BarController {
    const NAME: &'static str = "BarController";

    fn register(actions: &mut Actions<Self>) {
        actions.action("Foo", Self::foo);
        actions.action("Admin", Self::secret).authorize(["admin"]);
        actions.action("Anyone", Self::secret).authorize_any();
        actions.action("Nobody", Self::secret).authorize(Vec::<String>::new());
        actions.action("Boom", Self::boom);
        actions.action("Panic", Self::panic);
        actions.action("Partial", Self::partial);
        actions.action("Counter", Self::counter);
        actions.action("Echo", Self::echo);
        actions.action("Named", Self::named);
        actions.action("Setting", Self::setting);
        actions.action("Order", Self::order);
        actions.action("Silent", |_, _| Ok(()));
        actions.helper("format_title");
    }
}

impl BarController {
    fn foo(&mut self, ctx: &mut Context) -> ActionResult {
        let who = ctx.query("who").unwrap_or_else(|| "nobody".to_owned());
        ctx.view_with(&json!({ "who": who }))
    }

    fn secret(&mut self, ctx: &mut Context) -> ActionResult {
        ctx.json(r#"{"secret":true}"#);
        Ok(())
    }

    fn boom(&mut self, _ctx: &mut Context) -> ActionResult {
        Err(ActionError::msg("database is on fire"))
    }

    fn panic(&mut self, _ctx: &mut Context) -> ActionResult {
        panic!("unexpected state");
    }

    fn partial(&mut self, ctx: &mut Context) -> ActionResult {
        ctx.view_named("Views/BarController/Foo", &json!({ "who": "half" }))?;
        Err(ActionError::msg("failed after rendering"))
    }

    fn counter(&mut self, ctx: &mut Context) -> ActionResult {
        let hits = ctx.store().get("hits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
        ctx.store().put("hits", json!(hits));
        ctx.json(format!(r#"{{"hits":{hits}}}"#));
        Ok(())
    }

    fn echo(&mut self, ctx: &mut Context) -> ActionResult {
        let body: Value = ctx.json_body()?;
        let reply = json!({
            "got": body,
            "wants_json": ctx.accepts_json(),
            "action": ctx.action_name(),
            "roles": ctx.principal().roles(),
        });
        ctx.json_script(reply.to_string());
        Ok(())
    }

    fn named(&mut self, ctx: &mut Context) -> ActionResult {
        let fragment = ctx.populate_template("Views/Shared/Badge", &json!({ "label": "new" }))?;
        ctx.view_named("Views/Shared/Page", &json!({ "content": fragment }))
    }

    fn setting(&mut self, ctx: &mut Context) -> ActionResult {
        let value = ctx.config_value("site.name").unwrap_or("unset").to_owned();
        ctx.respond(value);
        Ok(())
    }

    fn order(&mut self, ctx: &mut Context) -> ActionResult {
        let order: Order = ctx.params()?;
        ctx.json(json!({ "sku": order.sku, "qty": order.qty, "note": order.note }).to_string());
        Ok(())
    }
}

#[derive(Deserialize)]
struct Order {
    sku: String,
    qty: u32,
    note: Option<String>,
}

#[derive(Default)]
struct TracedController;

impl Controller for TracedController {
    const NAME: &'static str = "TracedController";

    fn register(actions: &mut Actions<Self>) {
        actions.action("Index", |_, ctx: &mut Context| {
            ctx.json("{}");
            Ok(())
        });
    }

    fn trace(&mut self, _ctx: &Context) -> ActionResult {
        Err(ActionError::msg("trace sink unavailable"))
    }
}

#[derive(Default)]
struct PanickyTraceController;

impl Controller for PanickyTraceController {
    const NAME: &'static str = "PanickyTraceController";

    fn register(actions: &mut Actions<Self>) {
        actions.action("Index", |_, ctx: &mut Context| {
            ctx.json(r#"{"ran":true}"#);
            Ok(())
        });
    }

    fn trace(&mut self, _ctx: &Context) -> ActionResult {
        panic!("trace sink exploded");
    }
}

#[derive(Default)]
struct ReportController;

impl Controller for ReportController {
    const NAME: &'static str = "ReportController";
    const MODULE: &'static str = "admin";

    fn register(actions: &mut Actions<Self>) {
        actions.action("Daily", |_, ctx: &mut Context| {
            ctx.json(r#"{"report":"daily"}"#);
            Ok(())
        });
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn templates() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, body: &str| {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    };
    write("Views/BarController/Foo.html", "Foo for {{ who }}");
    write("Views/Shared/Badge.html", "<b>{{ label }}</b>");
    write("Views/Shared/Page.html", "<main>{{ content | safe }}</main>");
    dir
}

fn settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.view.template_root = root.to_path_buf();
    settings
}

fn dispatcher(root: &Path) -> Dispatcher {
    Dispatcher::builder(settings(root))
        .controller::<BarController>()
        .controller::<TracedController>()
        .controller::<PanickyTraceController>()
        .controller::<ReportController>()
        .store(SharedStore::new())
        .principals(RolesHeader::new("x-roles"))
        .build()
        .unwrap()
}

struct Reply {
    status: StatusCode,
    headers: http::HeaderMap,
    body: Bytes,
}

impl Reply {
    fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn header(&self, name: &str) -> &str {
        self.headers.get(name).unwrap().to_str().unwrap()
    }
}

async fn send(d: &Dispatcher, req: http::Request<Full<Bytes>>) -> Reply {
    let res = d.handle(req).await;
    let status = res.status();
    let headers = res.headers().clone();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    Reply { status, headers, body }
}

async fn post_form(d: &Dispatcher, uri: &str, body: &'static str) -> Reply {
    let req = http::Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap();
    send(d, req).await
}

async fn get(d: &Dispatcher, uri: &str, roles: Option<&str>) -> Reply {
    let mut req = http::Request::get(uri);
    if let Some(roles) = roles {
        req = req.header("x-roles", roles);
    }
    send(d, req.body(Full::new(Bytes::new())).unwrap()).await
}

// ── Routing & rendering ───────────────────────────────────────────────────────

#[tokio::test]
async fn open_action_renders_its_default_view() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/app/BarController/Foo.html?who=ann", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "Foo for ann");
    assert_eq!(reply.header("content-type"), "text/html; charset=UTF-8");
    assert_eq!(reply.header("pragma"), "no-cache");
    assert_eq!(reply.header("expires"), "Tue, 03 Jul 1990 06:00:00 GMT");
    assert!(reply.header("cache-control").starts_with("no-store, no-cache, must-revalidate"));
}

#[tokio::test]
async fn extension_and_query_do_not_change_the_route() {
    let dir = templates();
    let d = dispatcher(dir.path());

    for uri in ["/BarController/Foo", "/BarController/Foo.do", "/x/y/BarController/Foo.aspx?z=1"] {
        let reply = get(&d, uri, None).await;
        assert_eq!(reply.status, StatusCode::OK, "{uri}");
        assert_eq!(reply.text(), "Foo for nobody", "{uri}");
    }
}

#[tokio::test]
async fn explicit_views_and_fragments() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/Named", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "<main><b>new</b></main>");
}

#[tokio::test]
async fn silent_action_answers_empty_ok() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/Silent", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_empty());
}

#[tokio::test]
async fn unknown_controller_is_not_found() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/NoSuchController/Index", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json()["status"], 404);
}

#[tokio::test]
async fn single_segment_is_denied() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/Foo.html", None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json(), json!({"status": 403, "message": "Foo is not authorized."}));

    let reply = get(&d, "/", None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn head_runs_the_get_action_without_a_body() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let req = http::Request::head("/BarController/Foo").body(Full::new(Bytes::new())).unwrap();
    let reply = send(&d, req).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header("content-type"), "text/html; charset=UTF-8");
    assert!(reply.body.is_empty());

    let req = http::Request::head("/BarController/Admin").body(Full::new(Bytes::new())).unwrap();
    assert_eq!(send(&d, req).await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn other_methods_are_rejected() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let req = http::Request::delete("/BarController/Foo").body(Full::new(Bytes::new())).unwrap();
    let reply = send(&d, req).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
}

// ── Authorization ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_and_helper_actions_look_unauthorized() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/DoesNotExist", Some("admin")).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["message"], "DoesNotExist is not authorized.");

    let reply = get(&d, "/BarController/format_title", Some("admin")).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["message"], "format_title is not authorized.");
}

#[tokio::test]
async fn role_guarded_action() {
    let dir = templates();
    let d = dispatcher(dir.path());

    assert_eq!(get(&d, "/BarController/Admin", None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(get(&d, "/BarController/Admin", Some("user")).await.status, StatusCode::FORBIDDEN);

    let reply = get(&d, "/BarController/Admin", Some("admin,user")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"secret": true}));
    assert_eq!(reply.header("content-type"), "application/json; charset=UTF-8");
    assert!(reply.headers.get("cache-control").is_none());
}

#[tokio::test]
async fn wildcard_and_empty_role_sets() {
    let dir = templates();
    let d = dispatcher(dir.path());

    for roles in [None, Some("user"), Some("admin")] {
        assert_eq!(get(&d, "/BarController/Anyone", roles).await.status, StatusCode::OK);
        assert_eq!(get(&d, "/BarController/Nobody", roles).await.status, StatusCode::FORBIDDEN);
    }
}

// ── Invocation failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn failing_action_is_a_500_with_its_message() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/Boom", None).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json(), json!({"status": 500, "message": "database is on fire"}));
}

#[tokio::test]
async fn panicking_action_is_a_500_with_the_panic_message() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/Panic", None).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json()["message"], "unexpected state");
}

#[tokio::test]
async fn nothing_rendered_before_a_failure_is_sent() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/Partial", None).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!reply.text().contains("Foo for half"));
    assert_eq!(reply.json()["message"], "failed after rendering");
}

#[tokio::test]
async fn missing_template_is_a_500() {
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/Foo", None).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.json()["message"].as_str().unwrap().contains("Views/BarController/Foo.html"));
}

#[tokio::test]
async fn failing_trace_hook_does_not_abort_the_request() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/TracedController/Index", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "{}");
}

#[tokio::test]
async fn panicking_trace_hook_does_not_abort_the_request() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/PanickyTraceController/Index", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"ran": true}));
}

// ── Request data, shared store, config ────────────────────────────────────────

#[tokio::test]
async fn query_parameters_bind_to_a_model() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = get(&d, "/BarController/Order?sku=A-1&qty=2", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"sku": "A-1", "qty": 2, "note": null}));
}

#[tokio::test]
async fn form_parameters_bind_to_a_model() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = post_form(&d, "/BarController/Order", "sku=B%2F7&qty=4&note=gift+wrap").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"sku": "B/7", "qty": 4, "note": "gift wrap"}));
}

#[tokio::test]
async fn form_parameters_override_query_parameters() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = post_form(&d, "/BarController/Order?sku=A-1&qty=1", "qty=9").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"sku": "A-1", "qty": 9, "note": null}));
}

#[tokio::test]
async fn unbindable_parameters_are_a_500() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let reply = post_form(&d, "/BarController/Order", "sku=A-1&qty=many").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.json()["message"].as_str().unwrap().starts_with("invalid request parameters"));
}

#[tokio::test]
async fn post_body_headers_and_principal_reach_the_action() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let req = http::Request::post("/BarController/Echo")
        .header("accept", "application/json")
        .header("x-roles", "user")
        .body(Full::new(Bytes::from_static(br#"{"n":1}"#)))
        .unwrap();
    let reply = send(&d, req).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header("content-type"), "text/javascript; charset=UTF-8");
    assert_eq!(
        reply.json(),
        json!({"got": {"n": 1}, "wants_json": true, "action": "Echo", "roles": ["user"]})
    );
}

#[tokio::test]
async fn malformed_json_body_is_a_500() {
    let dir = templates();
    let d = dispatcher(dir.path());

    let req = http::Request::post("/BarController/Echo")
        .body(Full::new(Bytes::from_static(b"{nope")))
        .unwrap();
    let reply = send(&d, req).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.json()["message"].as_str().unwrap().starts_with("invalid JSON"));
}

#[tokio::test]
async fn store_outlives_requests() {
    let dir = templates();
    let d = dispatcher(dir.path());

    for expected in 1..=3 {
        let reply = get(&d, "/BarController/Counter", None).await;
        assert_eq!(reply.json(), json!({"hits": expected}));
    }
    assert_eq!(d.store().get("hits"), Some(json!(3)));
}

#[tokio::test]
async fn controller_prefix_selects_the_module() {
    let dir = templates();

    let mut prefixed = settings(dir.path());
    prefixed.dispatch.controller_prefix = Some("admin".to_owned());
    let d = Dispatcher::builder(prefixed)
        .controller::<ReportController>()
        .store(SharedStore::new())
        .build()
        .unwrap();
    let reply = get(&d, "/ReportController/Daily", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"report": "daily"}));

    let unprefixed = dispatcher(dir.path());
    let reply = get(&unprefixed, "/ReportController/Daily", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn extra_config_values_reach_actions() {
    let dir = templates();
    let extra = dir.path().join("extra.toml");
    fs::write(&extra, "[site]\nname = \"Corner Shop\"\n").unwrap();

    let mut with_extra = settings(dir.path());
    with_extra.extra_config = Some(extra);
    let d = Dispatcher::builder(with_extra)
        .controller::<BarController>()
        .store(SharedStore::new())
        .build()
        .unwrap();

    let reply = get(&d, "/BarController/Setting", None).await;
    assert_eq!(reply.text(), "Corner Shop");
    assert_eq!(get(&dispatcher(dir.path()), "/BarController/Setting", None).await.text(), "unset");
}

// ── Startup ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn custom_renderer_replaces_the_configured_one() {
    let d = Dispatcher::builder(Settings::default())
        .controller::<BarController>()
        .renderer(StringRenderer)
        .store(SharedStore::new())
        .build()
        .unwrap();

    let reply = get(&d, "/BarController/Foo?who=zed", None).await;
    assert_eq!(reply.text(), r#"{"who":"zed"}"#);
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn startup_log_names_the_renderer_in_use() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        Dispatcher::builder(Settings::default())
            .renderer(StringRenderer)
            .store(SharedStore::new())
            .build()
            .unwrap();
    });

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let ready = output.lines().find(|l| l.contains("dispatcher ready")).unwrap();
    assert!(ready.contains("actio::view::StringRenderer"), "{ready}");
}

#[test]
fn invalid_settings_abort_startup() {
    let mut settings = Settings::default();
    settings.view.template_extension = "html".to_owned();
    let err = Dispatcher::builder(settings).build().err().unwrap();
    match err {
        Error::Config(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 1, "{errors:?}");
            assert!(errors[0].contains("template_extension"));
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn unknown_renderer_aborts_startup() {
    let mut settings = Settings::default();
    settings.view.renderer = "velocity".to_owned();
    let err = Dispatcher::builder(settings).build().err().unwrap();
    assert!(matches!(err, Error::UnknownRenderer(ref name) if name == "velocity"));
}

#[test]
fn missing_extra_config_aborts_startup() {
    let mut settings = Settings::default();
    settings.extra_config = Some("/no/such/extra.toml".into());
    let err = Dispatcher::builder(settings).build().err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}
