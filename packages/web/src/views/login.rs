//! Login page with the OpenID identity form.

use api::auth::LoginForm;
use dioxus::prelude::*;

use super::layout::Layout;

#[component]
pub fn Login(form: LoginForm) -> Element {
    rsx! {
        Layout {
            title: "Log in",
            flash: form.flash.clone(),
            meta_tags: rsx! {},

            h1 {
                style: "margin-bottom: 0.5rem; font-weight: 700; font-size: 1.75rem;",
                "Orb"
            }

            p {
                style: "margin-bottom: 2rem; color: #787774; font-size: 0.9375rem;",
                "Log in with your OpenID identity URL:"
            }

            form {
                action: "/session",
                method: "post",

                input {
                    r#type: "hidden",
                    name: "authenticity_token",
                    value: "{form.authenticity_token}",
                }

                input {
                    class: "openid-input",
                    r#type: "text",
                    name: "openid_url",
                    placeholder: "alice.example.org",
                    autofocus: true,
                }

                input {
                    class: "btn",
                    r#type: "submit",
                    value: "Log in",
                }
            }
        }
    }
}
