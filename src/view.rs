//! View rendering.
//!
//! A [`Renderer`] turns a view name and a model into markup. Two ship with
//! the crate and are chosen by name in [`ViewSettings::renderer`]:
//!
//! | Name | Renderer | Behaviour |
//! |---|---|---|
//! | `template` | [`TemplateRenderer`] | loads `<template_root>/<view><template_extension>` and fills it with the model (minijinja) |
//! | `string` | [`StringRenderer`] | ignores the view name and prints the model |
//!
//! Anything else can be plugged in with
//! [`DispatcherBuilder::renderer`](crate::DispatcherBuilder::renderer).

use minijinja::Environment;
use serde_json::Value;

use crate::config::ViewSettings;
use crate::error::{Error, RenderError};

/// Produces markup from a view name and a model.
///
/// `init` runs once, before the dispatcher serves anything; an error there
/// aborts startup. `render` is called concurrently from many requests.
pub trait Renderer: Send + Sync + 'static {
    fn init(&mut self, settings: &ViewSettings) -> Result<(), RenderError>;

    /// `view` is the full view name, e.g. `Views/HomeController/Index`.
    fn render(&self, view: &str, model: &Value) -> Result<String, RenderError>;

    /// Shown in the startup log.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Builds the renderer registered under `name`, not yet initialised.
pub fn renderer_named(name: &str) -> Result<Box<dyn Renderer>, Error> {
    match name {
        "template" => Ok(Box::new(TemplateRenderer::default())),
        "string"   => Ok(Box::new(StringRenderer)),
        other      => Err(Error::UnknownRenderer(other.to_owned())),
    }
}

// ── TemplateRenderer ──────────────────────────────────────────────────────────

/// Renders minijinja templates from a directory.
///
/// Templates whose extension is `.html`, `.htm` or `.xml` are auto-escaped.
#[derive(Default)]
pub struct TemplateRenderer {
    env: Option<Environment<'static>>,
    extension: String,
}

impl Renderer for TemplateRenderer {
    fn init(&mut self, settings: &ViewSettings) -> Result<(), RenderError> {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(settings.template_root.clone()));
        self.env = Some(env);
        self.extension = settings.template_extension.clone();
        Ok(())
    }

    fn render(&self, view: &str, model: &Value) -> Result<String, RenderError> {
        let env = self.env.as_ref().ok_or(RenderError::Uninitialized)?;
        let name = format!("{}{}", view.trim_start_matches('/'), self.extension);
        let fail = |source| RenderError::Template { view: name.clone(), source };
        env.get_template(&name).map_err(fail)?.render(model).map_err(fail)
    }
}

// ── StringRenderer ────────────────────────────────────────────────────────────

/// Returns the model itself: strings verbatim, `null` as nothing, anything
/// else as compact JSON. The view name is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringRenderer;

impl Renderer for StringRenderer {
    fn init(&mut self, _settings: &ViewSettings) -> Result<(), RenderError> {
        Ok(())
    }

    fn render(&self, _view: &str, model: &Value) -> Result<String, RenderError> {
        Ok(match model {
            Value::Null      => String::new(),
            Value::String(s) => s.clone(),
            other            => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    fn settings(root: &std::path::Path, extension: &str) -> ViewSettings {
        ViewSettings {
            template_root: root.to_path_buf(),
            template_extension: extension.to_owned(),
            ..ViewSettings::default()
        }
    }

    #[test]
    fn template_renderer_fills_model_and_escapes_html() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Views/Home")).unwrap();
        fs::write(
            dir.path().join("Views/Home/Index.html"),
            "<h1>{{ title }}</h1>{% for n in names %}<li>{{ n }}</li>{% endfor %}",
        )
        .unwrap();

        let mut renderer = TemplateRenderer::default();
        renderer.init(&settings(dir.path(), ".html")).unwrap();
        let out = renderer
            .render("Views/Home/Index", &json!({"title": "a<b", "names": ["x", "y"]}))
            .unwrap();
        assert_eq!(out, "<h1>a&lt;b</h1><li>x</li><li>y</li>");
    }

    #[test]
    fn boxed_renderers_report_their_concrete_type() {
        assert_eq!(renderer_named("template").unwrap().name(), "actio::view::TemplateRenderer");
        assert_eq!(renderer_named("string").unwrap().name(), "actio::view::StringRenderer");
    }

    #[test]
    fn template_renderer_uses_configured_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.tpl"), "hello {{ who }}").unwrap();

        let mut renderer = TemplateRenderer::default();
        renderer.init(&settings(dir.path(), ".tpl")).unwrap();
        assert_eq!(renderer.render("page", &json!({"who": "there"})).unwrap(), "hello there");
    }

    #[test]
    fn missing_template_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = TemplateRenderer::default();
        renderer.init(&settings(dir.path(), ".html")).unwrap();

        let err = renderer.render("Views/Nope/Index", &Value::Null).unwrap_err();
        assert!(matches!(err, RenderError::Template { ref view, .. } if view == "Views/Nope/Index.html"));
    }

    #[test]
    fn uninitialized_template_renderer_refuses() {
        let err = TemplateRenderer::default().render("x", &Value::Null).unwrap_err();
        assert!(matches!(err, RenderError::Uninitialized));
    }

    #[test]
    fn string_renderer_prints_the_model() {
        let r = StringRenderer;
        assert_eq!(r.render("ignored", &json!("plain")).unwrap(), "plain");
        assert_eq!(r.render("ignored", &Value::Null).unwrap(), "");
        assert_eq!(r.render("ignored", &json!({"a": 1})).unwrap(), r#"{"a":1}"#);
        assert_eq!(r.render("ignored", &json!(42)).unwrap(), "42");
    }

    #[test]
    fn renderers_are_chosen_by_name() {
        assert!(renderer_named("template").is_ok());
        assert!(renderer_named("string").is_ok());
        assert!(matches!(renderer_named("freemarker"), Err(Error::UnknownRenderer(n)) if n == "freemarker"));
    }
}
