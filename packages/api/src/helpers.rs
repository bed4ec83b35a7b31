//! View helpers for member profiles.

use sha2::{Digest, Sha256};

/// MicroID claim tying `email` to the page at `site`.
///
/// `mailto+http:sha1:` followed by `sha1(sha1("mailto:" + email) + sha1(site))`,
/// every digest in lowercase hex.
pub fn microid(email: &str, site: &str) -> String {
    let mailto = sha1_hex(&format!("mailto:{}", email));
    let site = sha1_hex(site);
    format!("mailto+http:sha1:{}", sha1_hex(&format!("{}{}", mailto, site)))
}

fn sha1_hex(input: &str) -> String {
    sha1_smol::Sha1::from(input).digest().to_string()
}

/// Gravatar image URL for `email` at `size` pixels.
pub fn gravatar_url(email: &str, size: u32) -> String {
    let hash = hex::encode(Sha256::digest(email.trim().to_lowercase().as_bytes()));
    format!("https://www.gravatar.com/avatar/{}?s={}&d=identicon", hash, size)
}
