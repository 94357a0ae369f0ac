//! Template engine implementation.
//!
//! The engine wraps minijinja. Partials (named templates loaded from the
//! source tree) are registered on the environment, so `{% include "name" %}`
//! resolves against them. Template functions for secret managers and the
//! like are injected by the caller through [`TemplateEngine::env_mut`]
//! before the source state is read.

use minijinja::Environment;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A template (or partial) failed to parse.
    #[error("{name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    /// A template failed at execution time.
    #[error("{name}: {source}")]
    Execution {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Template engine for rendering source files.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Creates a new template engine.
    ///
    /// Whitespace control follows Jinja2 conventions: newlines after block
    /// tags and leading whitespace on block lines are stripped, and a
    /// trailing newline in the template is preserved in the output.
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Registers a named partial.
    ///
    /// Fails if the partial does not parse; a partial registered twice keeps
    /// the latest definition.
    pub fn add_partial(&mut self, name: &str, source: &str) -> Result<()> {
        self.env
            .add_template_owned(name.to_owned(), source.to_owned())
            .map_err(|source| Error::Parse {
                name: name.to_owned(),
                source,
            })
    }

    /// Returns whether a partial with the given name is registered.
    #[must_use]
    pub fn has_partial(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Access to the underlying environment, for registering functions,
    /// filters, and globals.
    pub fn env_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    /// Renders `source` with `data` as the template context.
    ///
    /// `name` is only used in error messages; it is typically the source
    /// path of the file being rendered.
    pub fn render(&self, name: &str, source: &str, data: &serde_json::Value) -> Result<String> {
        self.env
            .render_str(source, data)
            .map_err(|source| Error::Execution {
                name: name.to_owned(),
                source,
            })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_variables() {
        let engine = TemplateEngine::new();
        let data = json!({"email": "you@example.com"});
        let result = engine.render("test", "email = {{ email }}", &data).unwrap();
        assert_eq!(result, "email = you@example.com");
    }

    #[test]
    fn renders_nested_data() {
        let engine = TemplateEngine::new();
        let data = json!({"user": {"name": "Bob", "uid": 1000}});
        let result = engine
            .render("test", "{{ user.name }}:{{ user.uid }}", &data)
            .unwrap();
        assert_eq!(result, "Bob:1000");
    }

    #[test]
    fn keeps_trailing_newline() {
        let engine = TemplateEngine::new();
        let result = engine.render("test", "hello\n", &json!({})).unwrap();
        assert_eq!(result, "hello\n");
    }

    #[test]
    fn partials_resolve_through_include() {
        let mut engine = TemplateEngine::new();
        engine.add_partial("greeting", "hello {{ name }}").unwrap();
        assert!(engine.has_partial("greeting"));
        let result = engine
            .render("test", "{% include \"greeting\" %}!", &json!({"name": "ada"}))
            .unwrap();
        assert_eq!(result, "hello ada!");
    }

    #[test]
    fn injected_functions_are_callable() {
        let mut engine = TemplateEngine::new();
        engine
            .env_mut()
            .add_function("secret", |key: String| format!("secret:{key}"));
        let result = engine
            .render("test", "{{ secret(\"db\") }}", &json!({}))
            .unwrap();
        assert_eq!(result, "secret:db");
    }

    #[test]
    fn execution_error_carries_name() {
        let engine = TemplateEngine::new();
        let err = engine
            .render("dot_gitconfig.tmpl", "{{ 1 / 0 }}", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("dot_gitconfig.tmpl"));
    }
}
