//! Authentication: sReg mapping, the per-request gate and the login flow.

mod context;
mod flow;
mod principal;
mod session;
mod sreg;

pub use context::{url_to_string, user_url_cookie, AuthContext, LOGIN_PATH, USER_URL_COOKIE};
pub use flow::{
    LoginFlow, LoginForm, MSG_BLANK_IDENTIFIER, MSG_CANCELED, MSG_FAILED, MSG_MISSING,
    MSG_NOT_A_MEMBER, MSG_REGISTRATION_FAILED, MSG_UNAVAILABLE, ROOT_PATH,
};
pub use principal::Principal;
pub use session::{
    Flash, SESSION_CSRF_KEY, SESSION_FLASH_KEY, SESSION_RETURN_TO_KEY, SESSION_USER_ID_KEY,
};
pub use sreg::{
    map_registration, ProfileUpdate, Registration, FIELD_MAPPING, OPTIONAL_FIELDS,
    REQUIRED_FIELDS,
};
