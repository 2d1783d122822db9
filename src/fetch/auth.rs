// src/fetch/auth.rs
//! Heuristic login against a form we know nothing about up front.
//!
//! The first `<form>` on the login page is taken as the login form. Every named
//! input is echoed back (hidden CSRF tokens included) and the username/password
//! fields are found through ordered discovery strategies.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

static FORM: Lazy<Selector> = Lazy::new(|| Selector::parse("form").expect("static selector"));
static INPUT: Lazy<Selector> = Lazy::new(|| Selector::parse("input").expect("static selector"));

pub const USERNAME_CANDIDATES: &[&str] = &["username", "user", "id_username", "j_username"];
pub const PASSWORD_CANDIDATES: &[&str] = &["password", "pass", "id_password"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub name: String,
    /// Lowercased `type` attribute; empty when missing, so an untyped input is
    /// only found by name.
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub action: Url,
    pub inputs: Vec<FormInput>,
}

impl LoginForm {
    /// Seed payload: every named input with its current value. A repeated name
    /// keeps its first position and the last value.
    pub fn payload(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::with_capacity(self.inputs.len());
        for inp in &self.inputs {
            upsert(&mut out, &inp.name, &inp.value);
        }
        out
    }

    fn has_field(&self, name: &str) -> bool {
        self.inputs.iter().any(|i| i.name == name)
    }
}

/// A named, pure field-discovery rule.
#[derive(Clone, Copy)]
pub struct FieldStrategy {
    pub name: &'static str,
    pub find: fn(&LoginForm) -> Option<String>,
}

pub const USERNAME_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy {
        name: "text_or_email_input",
        find: first_text_or_email,
    },
    FieldStrategy {
        name: "candidate_names",
        find: username_candidate,
    },
];

pub const PASSWORD_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy {
        name: "password_input",
        find: last_password_input,
    },
    FieldStrategy {
        name: "candidate_names",
        find: password_candidate,
    },
];

/// First strategy that yields a field name wins.
pub fn discover(strategies: &[FieldStrategy], form: &LoginForm) -> Option<(&'static str, String)> {
    strategies
        .iter()
        .find_map(|s| (s.find)(form).map(|field| (s.name, field)))
}

fn first_text_or_email(form: &LoginForm) -> Option<String> {
    form.inputs
        .iter()
        .find(|i| i.kind == "text" || i.kind == "email")
        .map(|i| i.name.clone())
}

fn last_password_input(form: &LoginForm) -> Option<String> {
    form.inputs
        .iter()
        .rev()
        .find(|i| i.kind == "password")
        .map(|i| i.name.clone())
}

fn username_candidate(form: &LoginForm) -> Option<String> {
    USERNAME_CANDIDATES
        .iter()
        .find(|c| form.has_field(c))
        .map(|c| c.to_string())
}

fn password_candidate(form: &LoginForm) -> Option<String> {
    PASSWORD_CANDIDATES
        .iter()
        .find(|c| form.has_field(c))
        .map(|c| c.to_string())
}

fn upsert(payload: &mut Vec<(String, String)>, key: &str, value: &str) {
    match payload.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value.to_string(),
        None => payload.push((key.to_string(), value.to_string())),
    }
}

/// Parse the first form on `html`, resolving its action against `page_url`.
pub fn parse_login_form(html: &str, page_url: &Url) -> Result<LoginForm> {
    let doc = Html::parse_document(html);
    let form = doc
        .select(&FORM)
        .next()
        .ok_or_else(|| anyhow!("no <form> on login page"))?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(a) if !a.is_empty() => page_url
            .join(a)
            .with_context(|| format!("resolving form action {a:?}"))?,
        _ => page_url.clone(),
    };

    let inputs = form
        .select(&INPUT)
        .filter_map(|inp| {
            let el = inp.value();
            let name = el.attr("name").filter(|n| !n.is_empty())?;
            Some(FormInput {
                name: name.to_string(),
                kind: el.attr("type").unwrap_or_default().to_ascii_lowercase(),
                value: el.attr("value").unwrap_or_default().to_string(),
            })
        })
        .collect();

    Ok(LoginForm { action, inputs })
}

/// What a login attempt discovered and where it posted.
#[derive(Debug, Clone)]
pub struct LoginReport {
    pub action: Url,
    pub username_field: Option<String>,
    pub password_field: Option<String>,
    pub status: u16,
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    timeout: Duration,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl Authenticator {
    /// Log in with `client`, which must keep cookies so the session survives
    /// into the next request. Errors are for the caller to log; the client is
    /// left usable either way.
    pub async fn login(
        &self,
        client: &Client,
        login_url: &str,
        username: &str,
        password: &str,
    ) -> Result<LoginReport> {
        let page_url = Url::parse(login_url).context("parsing login url")?;

        let resp = client
            .get(page_url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .context("GET login page")?;
        if !resp.status().is_success() {
            bail!("login page returned {}", resp.status());
        }
        // Redirects may move us; relative actions resolve against where we landed.
        let landed = resp.url().clone();
        let html = resp.text().await.context("reading login page")?;

        let form = parse_login_form(&html, &landed)?;
        let mut payload = form.payload();

        let user = discover(USERNAME_STRATEGIES, &form);
        let pass = discover(PASSWORD_STRATEGIES, &form);
        if let Some((_, field)) = &user {
            upsert(&mut payload, field, username);
        }
        if let Some((_, field)) = &pass {
            upsert(&mut payload, field, password);
        }
        tracing::debug!(
            target: "fetch",
            action = %form.action,
            user_field = ?user,
            pass_field = ?pass,
            fields = payload.len(),
            "login form discovered"
        );

        let resp = client
            .post(form.action.clone())
            .timeout(self.timeout)
            .form(&payload)
            .send()
            .await
            .context("POST login form")?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            bail!("login POST returned {status}");
        }

        Ok(LoginReport {
            action: form.action,
            username_field: user.map(|(_, f)| f),
            password_field: pass.map(|(_, f)| f),
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://portal.example/ts/view/access").unwrap()
    }

    #[test]
    fn parses_action_and_inputs() {
        let html = r#"<form action="../login" method="post">
            <input type="hidden" name="_csrf" value="tok123">
            <input type="email" name="correo">
            <input type="password" name="clave">
            <input type="submit" value="Entrar">
        </form>"#;
        let form = parse_login_form(html, &base()).unwrap();
        assert_eq!(form.action.as_str(), "https://portal.example/ts/login");
        assert_eq!(form.inputs.len(), 3);
        assert_eq!(
            form.payload(),
            vec![
                ("_csrf".to_string(), "tok123".to_string()),
                ("correo".to_string(), String::new()),
                ("clave".to_string(), String::new()),
            ]
        );
        assert_eq!(
            discover(USERNAME_STRATEGIES, &form),
            Some(("text_or_email_input", "correo".to_string()))
        );
        assert_eq!(
            discover(PASSWORD_STRATEGIES, &form),
            Some(("password_input", "clave".to_string()))
        );
    }

    #[test]
    fn missing_action_posts_back_to_login_page() {
        let form = parse_login_form(r#"<form><input name="a"></form>"#, &base()).unwrap();
        assert_eq!(form.action, base());
    }

    #[test]
    fn candidate_names_when_types_are_unhelpful() {
        let html = r#"<form>
            <input type="hidden" name="j_username" value="">
            <input type="hidden" name="pass" value="">
        </form>"#;
        let form = parse_login_form(html, &base()).unwrap();
        assert_eq!(
            discover(USERNAME_STRATEGIES, &form),
            Some(("candidate_names", "j_username".to_string()))
        );
        assert_eq!(
            discover(PASSWORD_STRATEGIES, &form),
            Some(("candidate_names", "pass".to_string()))
        );
    }

    #[test]
    fn untyped_inputs_are_found_by_name_only() {
        let form = parse_login_form(r#"<form><input name="login"></form>"#, &base()).unwrap();
        assert_eq!(discover(USERNAME_STRATEGIES, &form), None);
        assert_eq!(discover(PASSWORD_STRATEGIES, &form), None);

        let html = r#"<form><input name="login"><input name="user"><input name="password"></form>"#;
        let form = parse_login_form(html, &base()).unwrap();
        assert_eq!(
            discover(USERNAME_STRATEGIES, &form),
            Some(("candidate_names", "user".to_string()))
        );
        assert_eq!(
            discover(PASSWORD_STRATEGIES, &form),
            Some(("candidate_names", "password".to_string()))
        );
    }

    #[test]
    fn no_form_is_an_error() {
        assert!(parse_login_form("<p>mantenimiento</p>", &base()).is_err());
    }

    #[test]
    fn duplicate_names_keep_last_value() {
        let html = r#"<form><input name="x" value="1"><input name="x" value="2"></form>"#;
        let form = parse_login_form(html, &base()).unwrap();
        assert_eq!(form.payload(), vec![("x".to_string(), "2".to_string())]);
    }
}
