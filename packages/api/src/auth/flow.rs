//! # Login flow
//!
//! [`LoginFlow`] drives the three auth actions:
//!
//! - **show the form** — [`login_form`](LoginFlow::login_form) hands the page its
//!   flash messages and anti-forgery token;
//! - **log in** — [`begin`](LoginFlow::begin) sends the member to their OpenID
//!   server, [`complete`](LoginFlow::complete) handles the answer, and
//!   [`finish`](LoginFlow::finish) acts on the single [`Verification`] either leg
//!   produced;
//! - **log out** — [`destroy`](LoginFlow::destroy).
//!
//! Every action ends in a redirect location. Failed logins leave the session
//! untouched apart from a flash error and send the browser back to the form.

use std::collections::HashMap;
use std::sync::Arc;

use super::context::{AuthContext, LOGIN_PATH};
use super::principal::Principal;
use super::session::Flash;
use super::sreg::{map_registration, Registration, OPTIONAL_FIELDS, REQUIRED_FIELDS};
use crate::db::{UserStore, IDENTITY_TAKEN};
use crate::error::{AuthError, StoreError};
use crate::models::{NewUser, User};
use crate::openid::{normalize_identifier, AuthRequest, BeginOutcome, OpenIdProvider, Status, Verification};
use crate::settings::{LoginPolicy, Settings};

/// Where logging out lands.
pub const ROOT_PATH: &str = "/";

pub const MSG_BLANK_IDENTIFIER: &str = "Please enter your OpenID identity URL";
pub const MSG_MISSING: &str = "Sorry, the OpenID server couldn't be found";
pub const MSG_CANCELED: &str = "OpenID verification was canceled";
pub const MSG_FAILED: &str = "Sorry, the OpenID verification failed";
pub const MSG_NOT_A_MEMBER: &str = "Sorry, no user is registered with that OpenID";
pub const MSG_REGISTRATION_FAILED: &str = "Your OpenID profile registration failed: ";
pub const MSG_UNAVAILABLE: &str = "Sorry, login is unavailable right now";

/// What the login page needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub flash: Flash,
    pub authenticity_token: String,
}

pub struct LoginFlow {
    store: Arc<dyn UserStore>,
    provider: Arc<dyn OpenIdProvider>,
    policy: LoginPolicy,
    return_to: String,
    realm: String,
    after_login: String,
}

impl LoginFlow {
    pub fn new(
        store: Arc<dyn UserStore>,
        provider: Arc<dyn OpenIdProvider>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            provider,
            policy: settings.auth.policy,
            return_to: settings.server.return_to(),
            realm: settings.server.realm(),
            after_login: settings.auth.after_login.clone(),
        }
    }

    pub fn policy(&self) -> LoginPolicy {
        self.policy
    }

    pub async fn login_form(&self, ctx: &AuthContext) -> Result<LoginForm, AuthError> {
        Ok(LoginForm {
            flash: ctx.take_flash().await?,
            authenticity_token: ctx.authenticity_token().await?,
        })
    }

    /// Start a login for the identifier typed into the form.
    pub async fn begin(&self, ctx: &mut AuthContext, openid_url: &str) -> Result<String, AuthError> {
        let Some(identifier) = normalize_identifier(openid_url) else {
            return self.failed_login(ctx, MSG_BLANK_IDENTIFIER).await;
        };

        tracing::debug!("starting OpenID login for {}", identifier);
        let request = AuthRequest {
            identifier,
            required: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            optional: OPTIONAL_FIELDS.iter().map(|f| f.to_string()).collect(),
            return_to: self.return_to.clone(),
            realm: self.realm.clone(),
        };

        match self.provider.begin(request).await {
            BeginOutcome::Redirect(location) => Ok(location),
            BeginOutcome::Complete(verification) => self.finish(ctx, verification).await,
        }
    }

    /// Handle the OpenID server's answer.
    pub async fn complete(
        &self,
        ctx: &mut AuthContext,
        params: &HashMap<String, String>,
    ) -> Result<String, AuthError> {
        let verification = self.provider.complete(&self.return_to, params).await;
        self.finish(ctx, verification).await
    }

    /// Act on the outcome of a login attempt.
    pub async fn finish(
        &self,
        ctx: &mut AuthContext,
        verification: Verification,
    ) -> Result<String, AuthError> {
        match verification.status {
            Status::Missing => self.failed_login(ctx, MSG_MISSING).await,
            Status::Canceled => self.failed_login(ctx, MSG_CANCELED).await,
            Status::Failed => self.failed_login(ctx, MSG_FAILED).await,
            Status::Other(message) => self.failed_login(ctx, &message).await,
            Status::Successful => {
                let identity_url = verification
                    .identity_url
                    .as_deref()
                    .and_then(normalize_identifier);
                match identity_url {
                    Some(identity_url) => {
                        self.verified(ctx, identity_url, &verification.registration)
                            .await
                    }
                    None => self.failed_login(ctx, MSG_FAILED).await,
                }
            }
        }
    }

    /// Log out. Harmless when nobody is logged in.
    pub async fn destroy(&self, ctx: &mut AuthContext) -> Result<String, AuthError> {
        if let Some(user) = ctx.current_user().await?.user() {
            tracing::info!(user_id = %user.id, "logged out");
        }
        ctx.set_current_user(Principal::Anonymous).await?;
        Ok(ROOT_PATH.to_string())
    }

    async fn verified(
        &self,
        ctx: &mut AuthContext,
        identity_url: String,
        registration: &Registration,
    ) -> Result<String, AuthError> {
        match self.save_member(identity_url, registration).await {
            Ok(Some(user)) => self.successful_login(ctx, user).await,
            Ok(None) => self.failed_login(ctx, MSG_NOT_A_MEMBER).await,
            Err(StoreError::Invalid(errors)) => {
                let message = format!("{}{}", MSG_REGISTRATION_FAILED, errors.to_sentence());
                self.failed_login(ctx, &message).await
            }
            Err(StoreError::Database(e)) => {
                tracing::error!("user store failed during login: {}", e);
                self.failed_login(ctx, MSG_UNAVAILABLE).await
            }
        }
    }

    /// Find or create the member for `identity_url` and store the fresh profile.
    /// `Ok(None)` means the policy turned an unknown identity away.
    async fn save_member(
        &self,
        identity_url: String,
        registration: &Registration,
    ) -> Result<Option<User>, StoreError> {
        let update = map_registration(registration);

        if let Some(mut user) = self.store.find_by_identity_url(&identity_url).await? {
            user.apply(update);
            return self.store.update(&user).await.map(Some);
        }

        match self.policy {
            LoginPolicy::Open => {
                let mut user = NewUser::new(identity_url.clone());
                user.apply(update.clone());
                match self.store.create(user).await {
                    Ok(user) => {
                        tracing::info!(user_id = %user.id, identity_url = %user.identity_url, "registered new member");
                        Ok(Some(user))
                    }
                    // A concurrent first login created the member in between.
                    Err(StoreError::Invalid(errors))
                        if errors.messages().iter().any(|m| m == IDENTITY_TAKEN) =>
                    {
                        match self.store.find_by_identity_url(&identity_url).await? {
                            Some(mut user) => {
                                user.apply(update);
                                self.store.update(&user).await.map(Some)
                            }
                            None => Err(StoreError::Invalid(errors)),
                        }
                    }
                    Err(e) => Err(e),
                }
            }
            LoginPolicy::MembersOnly => {
                tracing::warn!("{} is not a member", identity_url);
                Ok(None)
            }
        }
    }

    async fn successful_login(&self, ctx: &mut AuthContext, user: User) -> Result<String, AuthError> {
        tracing::info!(user_id = %user.id, identity_url = %user.identity_url, "logged in");
        let notice = format!("Logged in as {}", user.display_name());

        ctx.set_current_user(Principal::Authenticated(user)).await?;
        ctx.flash_notice(notice).await?;
        ctx.redirect_back_or_default(&self.after_login).await
    }

    async fn failed_login(&self, ctx: &mut AuthContext, message: &str) -> Result<String, AuthError> {
        tracing::warn!("login failed: {}", message);
        ctx.flash_error(message).await?;
        Ok(LOGIN_PATH.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tower_sessions::{MemoryStore, Session};
    use uuid::Uuid;

    use super::*;
    use crate::auth::session::SESSION_USER_ID_KEY;
    use crate::db::MemoryUserStore;

    /// Provider double that answers with a scripted verification and counts
    /// how often each leg was used.
    struct ScriptedProvider {
        begin: Mutex<Option<BeginOutcome>>,
        complete: Mutex<Option<Verification>>,
        requests: Mutex<Vec<AuthRequest>>,
        completions: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn completing(verification: Verification) -> Arc<Self> {
            Arc::new(Self {
                begin: Mutex::new(None),
                complete: Mutex::new(Some(verification)),
                requests: Mutex::new(Vec::new()),
                completions: Mutex::new(0),
            })
        }

        fn beginning(outcome: BeginOutcome) -> Arc<Self> {
            Arc::new(Self {
                begin: Mutex::new(Some(outcome)),
                complete: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
                completions: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl OpenIdProvider for ScriptedProvider {
        async fn begin(&self, request: AuthRequest) -> BeginOutcome {
            self.requests.lock().unwrap().push(request);
            self.begin
                .lock()
                .unwrap()
                .take()
                .expect("begin called more than once")
        }

        async fn complete(&self, _return_to: &str, _params: &HashMap<String, String>) -> Verification {
            *self.completions.lock().unwrap() += 1;
            self.complete
                .lock()
                .unwrap()
                .take()
                .expect("complete called more than once")
        }
    }

    struct Harness {
        store: MemoryUserStore,
        ctx: AuthContext,
    }

    fn harness() -> Harness {
        let store = MemoryUserStore::new();
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let ctx = AuthContext::new(session, Arc::new(store.clone()));
        Harness { store, ctx }
    }

    fn flow(store: &MemoryUserStore, provider: Arc<ScriptedProvider>, policy: LoginPolicy) -> LoginFlow {
        let mut settings = Settings::default();
        settings.auth.policy = policy;
        LoginFlow::new(Arc::new(store.clone()), provider, &settings)
    }

    fn alice_registration() -> Registration {
        [
            ("nickname", "alice"),
            ("email", "alice@example.org"),
            ("fullname", "Alice Liddell"),
        ]
        .into_iter()
        .collect()
    }

    fn seed_alice(store: &MemoryUserStore) -> User {
        store.seed(NewUser {
            identity_url: "http://alice.example.org/".to_string(),
            login: Some("alice".to_string()),
            email: Some("alice@example.org".to_string()),
            fullname: Some("Alice".to_string()),
        })
    }

    async fn session_user_id(ctx: &AuthContext) -> Option<String> {
        ctx.session().get(SESSION_USER_ID_KEY).await.unwrap()
    }

    #[tokio::test]
    async fn test_new_identity_is_registered_under_open_policy() {
        let mut h = harness();
        let provider = ScriptedProvider::completing(Verification::successful(
            "http://alice.example.org/",
            alice_registration(),
        ));
        let flow = flow(&h.store, provider.clone(), LoginPolicy::Open);

        let location = flow.complete(&mut h.ctx, &HashMap::new()).await.unwrap();

        assert_eq!(location, "/");
        assert_eq!(h.store.len(), 1);
        let user = h
            .store
            .find_by_identity_url("http://alice.example.org/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.login.as_deref(), Some("alice"));
        assert_eq!(user.fullname.as_deref(), Some("Alice Liddell"));
        assert_eq!(session_user_id(&h.ctx).await, Some(user.id.to_string()));
        assert_eq!(
            h.ctx.take_flash().await.unwrap().notice.as_deref(),
            Some("Logged in as alice")
        );
        assert_eq!(*provider.completions.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_new_identity_is_refused_under_members_only_policy() {
        let mut h = harness();
        let provider = ScriptedProvider::completing(Verification::successful(
            "http://alice.example.org/",
            alice_registration(),
        ));
        let flow = flow(&h.store, provider, LoginPolicy::MembersOnly);

        let location = flow.complete(&mut h.ctx, &HashMap::new()).await.unwrap();

        assert_eq!(location, LOGIN_PATH);
        assert!(h.store.is_empty());
        assert_eq!(session_user_id(&h.ctx).await, None);
        assert_eq!(
            h.ctx.take_flash().await.unwrap().error.as_deref(),
            Some(MSG_NOT_A_MEMBER)
        );
    }

    #[tokio::test]
    async fn test_existing_member_gets_non_blank_updates() {
        for policy in [LoginPolicy::Open, LoginPolicy::MembersOnly] {
            let mut h = harness();
            let alice = seed_alice(&h.store);
            let registration: Registration = [
                ("nickname", ""),
                ("email", "alice@wonderland.example"),
                ("fullname", "   "),
            ]
            .into_iter()
            .collect();
            let provider = ScriptedProvider::completing(Verification::successful(
                "http://alice.example.org/",
                registration,
            ));
            let flow = flow(&h.store, provider, policy);

            let location = flow.complete(&mut h.ctx, &HashMap::new()).await.unwrap();
            assert_eq!(location, "/");

            let user = h.store.find_by_id(alice.id).await.unwrap().unwrap();
            assert_eq!(user.login.as_deref(), Some("alice"));
            assert_eq!(user.email.as_deref(), Some("alice@wonderland.example"));
            assert_eq!(user.fullname.as_deref(), Some("Alice"));
            assert_eq!(h.store.len(), 1);
            assert_eq!(session_user_id(&h.ctx).await, Some(alice.id.to_string()));
        }
    }

    #[tokio::test]
    async fn test_unsuccessful_statuses_leave_session_alone() {
        let cases = [
            (Status::Missing, MSG_MISSING.to_string()),
            (Status::Canceled, MSG_CANCELED.to_string()),
            (Status::Failed, MSG_FAILED.to_string()),
            (
                Status::Other("Server is down".to_string()),
                "Server is down".to_string(),
            ),
        ];

        for (status, message) in cases {
            let mut h = harness();
            let alice = seed_alice(&h.store);
            let provider = ScriptedProvider::completing(Verification::new(status));
            let flow = flow(&h.store, provider, LoginPolicy::Open);

            let location = flow.complete(&mut h.ctx, &HashMap::new()).await.unwrap();

            assert_eq!(location, LOGIN_PATH);
            assert_eq!(session_user_id(&h.ctx).await, None);
            assert_eq!(h.store.len(), 1);
            assert_eq!(h.store.find_by_id(alice.id).await.unwrap(), Some(alice));
            assert_eq!(h.ctx.take_flash().await.unwrap().error, Some(message));
        }
    }

    #[tokio::test]
    async fn test_invalid_profile_reports_validation_errors() {
        let mut h = harness();
        let provider = ScriptedProvider::completing(Verification::successful(
            "http://bob.example.org/",
            [("fullname", "Bob")].into_iter().collect(),
        ));
        let flow = flow(&h.store, provider, LoginPolicy::Open);

        let location = flow.complete(&mut h.ctx, &HashMap::new()).await.unwrap();

        assert_eq!(location, LOGIN_PATH);
        assert!(h.store.is_empty());
        assert_eq!(session_user_id(&h.ctx).await, None);
        assert_eq!(
            h.ctx.take_flash().await.unwrap().error.as_deref(),
            Some("Your OpenID profile registration failed: Login can't be blank and Email can't be blank")
        );
    }

    #[tokio::test]
    async fn test_begin_redirects_to_provider() {
        let mut h = harness();
        let provider = ScriptedProvider::beginning(BeginOutcome::Redirect(
            "http://op.example.org/auth?openid.mode=checkid_setup".to_string(),
        ));
        let flow = flow(&h.store, provider.clone(), LoginPolicy::Open);

        let location = flow.begin(&mut h.ctx, "alice.example.org").await.unwrap();

        assert_eq!(location, "http://op.example.org/auth?openid.mode=checkid_setup");
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].identifier, "http://alice.example.org/");
        assert_eq!(requests[0].required, ["nickname", "email"]);
        assert_eq!(requests[0].optional, ["fullname"]);
        assert_eq!(requests[0].return_to, "http://localhost:8080/session");
        assert_eq!(requests[0].realm, "http://localhost:8080/");
    }

    #[tokio::test]
    async fn test_begin_with_immediate_answer() {
        let mut h = harness();
        let provider =
            ScriptedProvider::beginning(BeginOutcome::Complete(Verification::new(Status::Missing)));
        let flow = flow(&h.store, provider, LoginPolicy::Open);

        let location = flow.begin(&mut h.ctx, "nobody.example.org").await.unwrap();

        assert_eq!(location, LOGIN_PATH);
        assert_eq!(
            h.ctx.take_flash().await.unwrap().error.as_deref(),
            Some(MSG_MISSING)
        );
    }

    #[tokio::test]
    async fn test_begin_with_blank_identifier() {
        let mut h = harness();
        let provider = ScriptedProvider::beginning(BeginOutcome::Redirect("unused".to_string()));
        let flow = flow(&h.store, provider.clone(), LoginPolicy::Open);

        let location = flow.begin(&mut h.ctx, "   ").await.unwrap();

        assert_eq!(location, LOGIN_PATH);
        assert!(provider.requests.lock().unwrap().is_empty());
        assert_eq!(
            h.ctx.take_flash().await.unwrap().error.as_deref(),
            Some(MSG_BLANK_IDENTIFIER)
        );
    }

    #[tokio::test]
    async fn test_login_returns_to_protected_page() {
        let mut h = harness();
        seed_alice(&h.store);
        let provider = ScriptedProvider::completing(Verification::successful(
            "http://alice.example.org/",
            Registration::new(),
        ));
        let flow = flow(&h.store, provider, LoginPolicy::Open);

        assert_eq!(
            h.ctx.require_login("/protected").await.unwrap().as_deref(),
            Some(LOGIN_PATH)
        );

        let location = flow.complete(&mut h.ctx, &HashMap::new()).await.unwrap();
        assert_eq!(location, "/protected");
        assert_eq!(h.ctx.redirect_back_or_default("/").await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_destroy() {
        let mut h = harness();
        let alice = seed_alice(&h.store);
        let provider = ScriptedProvider::completing(Verification::new(Status::Failed));
        let flow = flow(&h.store, provider, LoginPolicy::Open);

        // Anonymous: just a redirect.
        assert_eq!(flow.destroy(&mut h.ctx).await.unwrap(), ROOT_PATH);
        assert_eq!(session_user_id(&h.ctx).await, None);

        h.ctx
            .set_current_user(Principal::Authenticated(alice))
            .await
            .unwrap();
        assert_eq!(flow.destroy(&mut h.ctx).await.unwrap(), ROOT_PATH);
        assert!(!h.ctx.is_logged_in().await.unwrap());
        assert_eq!(session_user_id(&h.ctx).await, None);
    }

    #[tokio::test]
    async fn test_login_form_consumes_flash() {
        let h = harness();
        let provider = ScriptedProvider::completing(Verification::new(Status::Failed));
        let flow = flow(&h.store, provider, LoginPolicy::Open);

        h.ctx.flash_error(MSG_CANCELED).await.unwrap();
        let form = flow.login_form(&h.ctx).await.unwrap();
        assert_eq!(form.flash.error.as_deref(), Some(MSG_CANCELED));
        assert!(!form.authenticity_token.is_empty());

        let again = flow.login_form(&h.ctx).await.unwrap();
        assert!(again.flash.is_empty());
        assert_eq!(again.authenticity_token, form.authenticity_token);
    }

    /// Store whose first identity lookup misses while another login inserts
    /// the same member.
    struct RacingStore {
        inner: MemoryUserStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_identity_url(&self, identity_url: &str) -> Result<Option<User>, StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.seed(NewUser::new(identity_url));
                return Ok(None);
            }
            self.inner.find_by_identity_url(identity_url).await
        }

        async fn create(&self, user: NewUser) -> Result<User, StoreError> {
            self.inner.create(user).await
        }

        async fn update(&self, user: &User) -> Result<User, StoreError> {
            self.inner.update(user).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_login_logs_in_existing_member() {
        let mut h = harness();
        let store = Arc::new(RacingStore {
            inner: h.store.clone(),
            raced: AtomicBool::new(false),
        });
        let provider = ScriptedProvider::completing(Verification::successful(
            "http://alice.example.org/",
            alice_registration(),
        ));
        let flow = LoginFlow::new(store, provider, &Settings::default());

        let location = flow.complete(&mut h.ctx, &HashMap::new()).await.unwrap();

        assert_eq!(location, "/");
        assert_eq!(h.store.len(), 1);
        let user = h
            .store
            .find_by_identity_url("http://alice.example.org/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.login.as_deref(), Some("alice"));
        assert_eq!(session_user_id(&h.ctx).await, Some(user.id.to_string()));
        let flash = h.ctx.take_flash().await.unwrap();
        assert_eq!(flash.notice.as_deref(), Some("Logged in as alice"));
        assert_eq!(flash.error, None);
    }
}
