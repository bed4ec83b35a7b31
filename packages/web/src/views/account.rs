//! Profile page of the logged-in member.

use api::auth::Flash;
use api::User;
use dioxus::prelude::*;

use super::layout::Layout;

#[component]
pub fn Account(user: User, flash: Flash) -> Element {
    let identity_url = user.identity_url.clone();
    let login = user.login.clone().unwrap_or_default();
    let email = user.email.clone().unwrap_or_default();
    let fullname = user.fullname.clone().unwrap_or_default();
    let member_since = user.created_at.format("%Y-%m-%d").to_string();

    rsx! {
        Layout {
            title: "Account",
            flash,
            meta_tags: rsx! {},

            h1 { style: "font-size: 1.75rem;", "Your account" }

            dl {
                dt { "Identity URL" }
                dd { "{identity_url}" }
                dt { "Login" }
                dd { "{login}" }
                dt { "Email" }
                dd { "{email}" }
                dt { "Full name" }
                dd { "{fullname}" }
                dt { "Member since" }
                dd { "{member_since}" }
            }

            p { a { href: "/", "Back" } }
        }
    }
}
