//! Landing page.

use api::auth::{Flash, Principal};
use api::helpers::{gravatar_url, microid};
use dioxus::prelude::*;

use super::layout::Layout;

#[component]
pub fn Home(principal: Principal, flash: Flash, site: String, authenticity_token: String) -> Element {
    let email = principal.user().and_then(|u| u.email.clone());
    let claim = email.as_deref().map(|email| microid(email, &site));

    let body = match principal.user() {
        Some(user) => {
            let name = user.display_name().to_string();
            rsx! {
                {email.as_deref().map(|email| rsx! {
                    img { src: gravatar_url(email, 80), alt: "", width: "80", height: "80" }
                })}
                p { "Welcome back, {name}." }
                p { a { href: "/account", "Your account" } }
                form {
                    action: "/session/destroy",
                    method: "post",
                    input { r#type: "hidden", name: "authenticity_token", value: "{authenticity_token}" }
                    input { class: "btn", r#type: "submit", value: "Log out" }
                }
            }
        }
        None => rsx! {
            p { "You are not logged in." }
            p { a { href: "/login", "Log in with OpenID" } }
        },
    };

    rsx! {
        Layout {
            title: "Home",
            flash,
            meta_tags: rsx! {
                {claim.map(|claim| rsx! { meta { name: "microid", content: "{claim}" } })}
            },

            h1 { style: "font-size: 1.75rem;", "Orb" }

            {body}
        }
    }
}
