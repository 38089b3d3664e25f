//! HTML templates embedded into the binary and rendered with minijinja.
//! Templates whose name ends in `.html` are auto-escaped.

use minijinja::Environment;

pub const RESET_PW_EMAIL: &str = "reset_pw_email.html";
pub const CHANGE_PW_PAGE: &str = "change_pw_page.html";

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, vars: serde_json::Value) -> anyhow::Result<String>;
}

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> anyhow::Result<Self> {
        let mut env = Environment::new();
        env.add_template(RESET_PW_EMAIL, include_str!("../templates/reset_pw_email.html"))?;
        env.add_template(CHANGE_PW_PAGE, include_str!("../templates/change_pw_page.html"))?;
        Ok(Self { env })
    }
}

impl TemplateRenderer for Templates {
    fn render(&self, name: &str, vars: serde_json::Value) -> anyhow::Result<String> {
        Ok(self.env.get_template(name)?.render(vars)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reset_email_contains_link_and_escapes_name() {
        let templates = Templates::new().unwrap();
        let body = templates
            .render(
                RESET_PW_EMAIL,
                json!({ "username": "<b>Ann</b>", "reset_link": "http://x/pw/change?token=abc" }),
            )
            .unwrap();

        assert!(body.contains("http://x/pw/change?token=abc"));
        assert!(body.contains("&lt;b&gt;Ann"));
        assert!(!body.contains("<b>Ann"));
    }

    #[test]
    fn change_page_shows_error_only_when_set() {
        let templates = Templates::new().unwrap();

        let plain = templates
            .render(CHANGE_PW_PAGE, json!({ "username": "Ann", "changed": false }))
            .unwrap();
        assert!(plain.contains("<form"));
        assert!(!plain.contains("color: #a33"));

        let failed = templates
            .render(
                CHANGE_PW_PAGE,
                json!({ "username": "Ann", "changed": false, "error": "Passwords do not match" }),
            )
            .unwrap();
        assert!(failed.contains("Passwords do not match"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let templates = Templates::new().unwrap();
        assert!(templates.render("missing.html", json!({})).is_err());
    }
}
