//! Page shell shared by every view.

use api::auth::Flash;
use dioxus::prelude::*;

/// Document wrapper with the flash banner.
#[component]
pub fn Layout(title: String, flash: Flash, meta_tags: Element, children: Element) -> Element {
    rsx! {
        head {
            meta { charset: "utf-8" }
            title { "{title} · Orb" }
            {meta_tags}
            style {
                r#"
                body {{
                    margin: 0;
                    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif;
                    color: #37352f;
                    background: #ffffff;
                }}

                .page {{
                    max-width: 480px;
                    margin: 4rem auto;
                    padding: 0 1.5rem;
                }}

                .flash {{
                    padding: 0.625rem 1rem;
                    border-radius: 4px;
                    margin-bottom: 1.5rem;
                    font-size: 0.9375rem;
                }}

                .flash.notice {{
                    background: #edf3ec;
                    color: #346538;
                }}

                .flash.error {{
                    background: #fdebec;
                    color: #9f2f2d;
                }}

                .openid-input {{
                    width: 100%;
                    padding: 0.5rem 0.75rem 0.5rem 2rem;
                    border: 1px solid #d3d1cb;
                    border-radius: 4px;
                    font-size: 0.9375rem;
                    box-sizing: border-box;
                }}

                .btn {{
                    margin-top: 0.75rem;
                    padding: 0.625rem 1.25rem;
                    border: none;
                    border-radius: 4px;
                    font-size: 0.9375rem;
                    font-weight: 500;
                    cursor: pointer;
                    background-color: #24292e;
                    color: white;
                }}

                .btn:hover {{
                    opacity: 0.9;
                }}
                "#
            }
        }
        body {
            div {
                class: "page",
                {flash.notice.as_ref().map(|notice| rsx! {
                    p { class: "flash notice", "{notice}" }
                })}
                {flash.error.as_ref().map(|error| rsx! {
                    p { class: "flash error", "{error}" }
                })}
                {children}
            }
        }
    }
}
