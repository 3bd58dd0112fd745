//! # actio
//!
//! A front controller for HTTP services: every request is routed by its last
//! two path segments to a controller and an action, checked against the
//! roles the action declares, and answered by whatever the action renders.
//!
//! ```text
//! GET /app/UserController/Show.html?id=4
//!          ^^^^^^^^^^^^^^ ^^^^
//!          controller     action (extension and query ignored)
//! ```
//!
//! What actio deliberately leaves to others:
//!
//! - **Authentication and sessions**: plug a [`PrincipalSource`] in; actio
//!   only reads roles.
//! - **Template language**: [`TemplateRenderer`] delegates to minijinja;
//!   any [`Renderer`] can replace it.
//! - **TLS, rate limiting, body limits**: the reverse proxy's job.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use actio::{ActionResult, Actions, Context, Controller, Dispatcher, RolesHeader, Server, Settings};
//!
//! #[derive(Default)]
//! struct HomeController;
//!
//! impl Controller for HomeController {
//!     const NAME: &'static str = "HomeController";
//!
//!     fn register(actions: &mut Actions<Self>) {
//!         actions.action("Index", Self::index);
//!         actions.action("Admin", Self::admin).authorize(["admin"]);
//!     }
//! }
//!
//! impl HomeController {
//!     // Renders Views/HomeController/Index.html
//!     fn index(&mut self, ctx: &mut Context) -> ActionResult {
//!         ctx.view_with(&serde_json::json!({ "title": "Home" }))
//!     }
//!
//!     fn admin(&mut self, ctx: &mut Context) -> ActionResult {
//!         ctx.json(r#"{"secret":42}"#);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), actio::Error> {
//!     let settings = Settings::default();
//!     let server = Server::from_settings(&settings)?;
//!     let dispatcher = Dispatcher::builder(settings)
//!         .controller::<HomeController>()
//!         .principals(RolesHeader::new("x-roles"))
//!         .build()?;
//!     server.serve(dispatcher).await
//! }
//! ```

mod action;
mod auth;
mod context;
mod dispatch;
mod error;
mod method;
mod request;
mod response;
mod route;
mod server;
mod store;

pub mod config;
pub mod view;

pub use action::{ActionDescriptor, ActionResult, Actions, Authorize, Controller};
pub use auth::{Anonymous, Decision, DenyReason, Principal, PrincipalSource, RolesHeader, WILDCARD, authorize};
pub use config::{ExtraConfig, Settings};
pub use context::Context;
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use error::{ActionError, ConfigError, Error, RenderError};
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use route::Route;
pub use server::Server;
pub use store::SharedStore;
pub use view::{Renderer, StringRenderer, TemplateRenderer};
