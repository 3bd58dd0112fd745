//! Minimal actio example — two controllers, a role-guarded action, views and
//! JSON.
//!
//! Run from the repository root with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/HomeController/Index.html
//!   curl http://localhost:3000/AccountController/Profile -H 'x-roles: member'
//!   curl http://localhost:3000/AccountController/Close  -H 'x-roles: member'   # 403
//!   curl http://localhost:3000/AccountController/Close  -H 'x-roles: admin'
//!   curl -X POST http://localhost:3000/AccountController/Rename \
//!        -H 'x-roles: member' -d '{"name":"alice"}'

use std::path::Path;

use actio::config::load_settings;
use actio::{ActionError, ActionResult, Actions, Context, Controller, Dispatcher, RolesHeader, Server};
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), actio::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = load_settings(Path::new("demos/actio.toml"))?;
    let server = Server::from_settings(&settings)?;

    let dispatcher = Dispatcher::builder(settings)
        .controller::<HomeController>()
        .controller::<AccountController>()
        .principals(RolesHeader::new("x-roles"))
        .build()?;

    server.serve(dispatcher).await
}

// GET /HomeController/Index → Views/HomeController/Index.html
#[derive(Default)]
struct HomeController;

impl Controller for HomeController {
    const NAME: &'static str = "HomeController";

    fn register(actions: &mut Actions<Self>) {
        actions.action("Index", Self::index);
    }

    fn trace(&mut self, ctx: &Context) -> ActionResult {
        tracing::debug!(path = ctx.request().path(), "home request");
        Ok(())
    }
}

impl HomeController {
    fn index(&mut self, ctx: &mut Context) -> ActionResult {
        let visits = ctx.store().get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
        ctx.store().put("visits", json!(visits));

        let site = ctx.config_value("site.name").unwrap_or("actio").to_owned();
        ctx.view_with(&json!({ "title": "Welcome", "visits": visits, "site": site }))
    }
}

#[derive(Default)]
struct AccountController;

impl Controller for AccountController {
    const NAME: &'static str = "AccountController";

    fn register(actions: &mut Actions<Self>) {
        actions.action("Profile", Self::profile).authorize_any();
        actions.action("Rename", Self::rename).authorize(["member", "admin"]);
        actions.action("Close", Self::close).authorize(["admin"]);
    }
}

#[derive(Deserialize)]
struct Rename {
    name: String,
}

impl AccountController {
    fn profile(&mut self, ctx: &mut Context) -> ActionResult {
        let roles = ctx.principal().roles().clone();
        if ctx.accepts_json() {
            ctx.json(json!({ "roles": roles }).to_string());
            return Ok(());
        }
        ctx.view_with(&json!({ "roles": roles }))
    }

    fn rename(&mut self, ctx: &mut Context) -> ActionResult {
        let Rename { name } = ctx.json_body()?;
        if name.trim().is_empty() {
            ctx.json_error(StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty");
            return Ok(());
        }
        ctx.json(json!({ "renamed": name }).to_string());
        Ok(())
    }

    fn close(&mut self, _ctx: &mut Context) -> ActionResult {
        Err(ActionError::msg("closing accounts is disabled in the demo"))
    }
}
