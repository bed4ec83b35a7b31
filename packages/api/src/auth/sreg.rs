//! Simple Registration (sReg) attribute mapping.
//!
//! The provider hands back profile attributes under its own names. They are
//! staged onto local user fields through [`FIELD_MAPPING`]; a missing or blank
//! attribute never overwrites what the member already has.

use std::collections::HashMap;

/// Local field name to provider attribute name.
pub const FIELD_MAPPING: [(&str, &str); 3] = [
    ("login", "nickname"),
    ("email", "email"),
    ("fullname", "fullname"),
];

/// Attributes the login form asks the provider to return.
pub const REQUIRED_FIELDS: [&str; 2] = ["nickname", "email"];
pub const OPTIONAL_FIELDS: [&str; 1] = ["fullname"];

/// Registration attributes as returned by the provider, keyed by sReg name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration(HashMap<String, String>);

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The value of `field` unless it is missing or blank.
    fn present(&self, field: &str) -> Option<String> {
        self.get(field)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Registration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Staged assignments to local profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub login: Option<String>,
    pub email: Option<String>,
    pub fullname: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.login.is_none() && self.email.is_none() && self.fullname.is_none()
    }

    fn field_mut(&mut self, local: &str) -> Option<&mut Option<String>> {
        match local {
            "login" => Some(&mut self.login),
            "email" => Some(&mut self.email),
            "fullname" => Some(&mut self.fullname),
            _ => None,
        }
    }

    pub(crate) fn assign(
        self,
        login: &mut Option<String>,
        email: &mut Option<String>,
        fullname: &mut Option<String>,
    ) {
        if let Some(value) = self.login {
            *login = Some(value);
        }
        if let Some(value) = self.email {
            *email = Some(value);
        }
        if let Some(value) = self.fullname {
            *fullname = Some(value);
        }
    }
}

/// Map provider attributes onto local fields.
pub fn map_registration(registration: &Registration) -> ProfileUpdate {
    let mut update = ProfileUpdate::default();

    for (local, remote) in FIELD_MAPPING {
        let Some(value) = registration.present(remote) else {
            continue;
        };
        if let Some(slot) = update.field_mut(local) {
            *slot = Some(value);
        }
    }

    update
}
