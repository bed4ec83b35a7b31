//! Server-rendered pages.

mod account;
mod home;
mod layout;
mod login;

use api::auth::{Flash, LoginForm, Principal};
use api::User;
use dioxus::prelude::*;

pub use account::Account;
pub use home::Home;
pub use login::Login;

/// Wrap the rendered `head` and `body` in the document element.
fn document(page: String) -> String {
    format!("<!DOCTYPE html><html lang=\"en\">{}</html>", page)
}

pub fn render_login(form: LoginForm) -> String {
    document(dioxus_ssr::render_element(rsx! { Login { form } }))
}

pub fn render_home(
    principal: Principal,
    flash: Flash,
    site: String,
    authenticity_token: String,
) -> String {
    document(dioxus_ssr::render_element(rsx! {
        Home { principal, flash, site, authenticity_token }
    }))
}

pub fn render_account(user: User, flash: Flash) -> String {
    document(dioxus_ssr::render_element(rsx! { Account { user, flash } }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_page_is_a_full_document() {
        let html = render_login(LoginForm {
            flash: Flash {
                notice: None,
                error: Some("OpenID verification was canceled".to_string()),
            },
            authenticity_token: "abc123".to_string(),
        });

        assert!(html.starts_with("<!DOCTYPE html><html lang=\"en\">"));
        assert!(html.ends_with("</html>"));
        assert!(html.contains("<head>"));
        assert!(html.contains("Log in · Orb"));
        assert!(html.contains("OpenID verification was canceled"));
        assert!(html.contains("abc123"));
    }

    #[test]
    fn test_anonymous_home_links_to_login() {
        let html = render_home(
            Principal::Anonymous,
            Flash::default(),
            "http://orb.test/".to_string(),
            "abc123".to_string(),
        );

        assert!(html.contains("href=\"/login\""));
        assert!(!html.contains("microid"));
    }
}
