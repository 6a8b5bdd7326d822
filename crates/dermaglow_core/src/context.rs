//! crates/dermaglow_core/src/context.rs
//!
//! The session synchronizer: a single authoritative view of the current
//! session, user profile, and assessment-completion flag, kept consistent
//! with the auth collaborator's notification stream.
//!
//! Every session transition advances a generation counter. The profile and
//! assessment loads spawned for a transition are tagged with the generation
//! they were issued under and discarded if a newer transition lands first,
//! so a slow load can never overwrite state that belongs to a later session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::domain::{
    AuthChange, AuthUser, AvatarUpload, ProfileUpdate, Session, SignUpInfo, UserProfile,
};
use crate::ports::{AssessmentService, AuthService, PortError};

/// Upper bound on the initial session fetch. If the collaborator has not
/// answered by then, the context settles anonymous rather than blocking.
const INITIAL_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced by the context's mutation operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthContextError {
    #[error("No user logged in")]
    NotAuthenticated,
    /// A collaborator call failed; the message is passed through for display.
    #[error("{0}")]
    Remote(String),
}

impl AuthContextError {
    fn remote(err: PortError) -> Self {
        Self::Remote(err.to_string())
    }
}

/// A point-in-time copy of the synchronizer's state.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
    pub has_completed_assessment: bool,
    /// True until the initial session fetch resolves or times out.
    pub loading: bool,
}

impl AuthSnapshot {
    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

struct Inner {
    session: Option<Session>,
    profile: Option<UserProfile>,
    has_completed_assessment: bool,
    loading: bool,
    generation: u64,
}

/// The session synchronizer. Cheap to clone; all clones share one state.
///
/// Constructed once at process start via [`AuthContext::start`]. Teardown is
/// the caller's responsibility: [`AuthContext::shutdown`] stops the event
/// loop and abandons any pending bootstrap fetch.
#[derive(Clone)]
pub struct AuthContext {
    auth: Arc<dyn AuthService>,
    assessments: Arc<dyn AssessmentService>,
    inner: Arc<Mutex<Inner>>,
    shutdown: CancellationToken,
}

impl AuthContext {
    /// Creates the context, subscribes to the auth-state stream, and kicks
    /// off the bounded initial session fetch.
    pub fn start(auth: Arc<dyn AuthService>, assessments: Arc<dyn AssessmentService>) -> Self {
        let ctx = Self {
            inner: Arc::new(Mutex::new(Inner {
                session: None,
                profile: None,
                has_completed_assessment: false,
                loading: true,
                generation: 0,
            })),
            shutdown: CancellationToken::new(),
            auth,
            assessments,
        };

        let events = ctx.auth.subscribe();
        tokio::spawn(ctx.clone().run_event_loop(events));
        tokio::spawn(ctx.clone().bootstrap());

        ctx
    }

    /// Stops the event loop and any pending bootstrap fetch. Safe to call
    /// more than once.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> AuthSnapshot {
        let inner = self.inner.lock().expect("auth context state poisoned");
        AuthSnapshot {
            session: inner.session.clone(),
            profile: inner.profile.clone(),
            has_completed_assessment: inner.has_completed_assessment,
            loading: inner.loading,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    //=====================================================================================
    // Event handling
    //=====================================================================================

    async fn run_event_loop(self, mut events: mpsc::UnboundedReceiver<AuthChange>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                change = events.recv() => match change {
                    Some(change) => {
                        debug!(event = ?change.event, "auth state changed");
                        self.apply_session(change.session);
                    }
                    // Stream closed by the collaborator; nothing more to sync.
                    None => break,
                },
            }
        }
    }

    async fn bootstrap(self) {
        let issued_gen = self.inner.lock().expect("auth context state poisoned").generation;

        let fetch = tokio::time::timeout(INITIAL_SESSION_TIMEOUT, self.auth.current_session());
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            result = fetch => result,
        };

        match result {
            Ok(Ok(session)) => {
                // An auth event may have arrived while we were fetching; the
                // newer state wins and the initial result is dropped.
                let current_gen =
                    self.inner.lock().expect("auth context state poisoned").generation;
                if current_gen == issued_gen {
                    self.apply_session(session);
                } else {
                    debug!("discarding initial session fetch superseded by an auth event");
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "initial session fetch failed; treating as anonymous");
                self.finish_loading();
            }
            Err(_) => {
                warn!("auth loading timeout reached; treating as anonymous");
                self.finish_loading();
            }
        }
    }

    fn finish_loading(&self) {
        self.inner.lock().expect("auth context state poisoned").loading = false;
    }

    /// Replaces the session wholesale and schedules the dependent loads.
    /// With no session, profile and flag are cleared synchronously.
    fn apply_session(&self, session: Option<Session>) {
        let (generation, user_id) = {
            let mut inner = self.inner.lock().expect("auth context state poisoned");
            inner.generation += 1;
            inner.loading = false;

            match &session {
                Some(new) => {
                    // A different identity invalidates the previous user's
                    // derived state immediately; a token refresh keeps it
                    // visible while the reload runs.
                    let same_user = inner
                        .session
                        .as_ref()
                        .is_some_and(|old| old.user.id == new.user.id);
                    if !same_user {
                        inner.profile = None;
                        inner.has_completed_assessment = false;
                    }
                    inner.session = Some(new.clone());
                }
                None => {
                    inner.session = None;
                    inner.profile = None;
                    inner.has_completed_assessment = false;
                }
            }

            (inner.generation, session.as_ref().map(|s| s.user.id))
        };

        if let Some(user_id) = user_id {
            // Independent loads; either may finish first.
            let ctx = self.clone();
            tokio::spawn(async move { ctx.load_profile(user_id, generation).await });
            let ctx = self.clone();
            tokio::spawn(async move { ctx.check_assessment(user_id, generation).await });
        }
    }

    /// Loads the profile for `user_id` and applies it only if the context is
    /// still on the generation the load was issued under.
    async fn load_profile(&self, user_id: Uuid, issued_gen: u64) {
        let result = self.auth.get_user_profile(user_id).await;

        let mut inner = self.inner.lock().expect("auth context state poisoned");
        if inner.generation != issued_gen {
            debug!(user_id = %user_id, "discarding stale profile load");
            return;
        }
        match result {
            Ok(profile) => inner.profile = profile,
            // Best effort: keep whatever profile was there before.
            Err(e) => warn!(error = %e, user_id = %user_id, "failed to load user profile"),
        }
    }

    /// Recomputes the assessment flag for `user_id`. A missing record and a
    /// query failure both resolve to `false`.
    async fn check_assessment(&self, user_id: Uuid, issued_gen: u64) {
        let completed = match self.assessments.latest_for_user(user_id).await {
            Ok(latest) => latest.is_some(),
            Err(e) => {
                warn!(error = %e, user_id = %user_id, "assessment status query failed");
                false
            }
        };

        let mut inner = self.inner.lock().expect("auth context state poisoned");
        if inner.generation != issued_gen {
            debug!(user_id = %user_id, "discarding stale assessment check");
            return;
        }
        inner.has_completed_assessment = completed;
    }

    fn current_user(&self) -> Option<(Uuid, u64)> {
        let inner = self.inner.lock().expect("auth context state poisoned");
        inner
            .session
            .as_ref()
            .map(|s| (s.user.id, inner.generation))
    }

    fn require_user(&self) -> Result<(Uuid, u64), AuthContextError> {
        self.current_user().ok_or(AuthContextError::NotAuthenticated)
    }

    //=====================================================================================
    // Operations
    //=====================================================================================

    /// Registers a new account. The caller signs in separately afterwards.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        info: Option<SignUpInfo>,
    ) -> Result<(), AuthContextError> {
        self.auth
            .sign_up(email, password, info)
            .await
            .map_err(AuthContextError::remote)
    }

    /// Signs in with email and password. The resulting state arrives via the
    /// notification stream, not this call's return.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthContextError> {
        self.auth
            .sign_in(email, password)
            .await
            .map_err(AuthContextError::remote)
    }

    /// Starts the Google OAuth flow and returns the authorize URL. The
    /// session, if the redirect completes, arrives via the stream.
    pub async fn sign_in_with_google(&self) -> Result<String, AuthContextError> {
        self.auth
            .sign_in_with_google()
            .await
            .map_err(AuthContextError::remote)
    }

    /// Signs out. Local state is cleared immediately, before the remote call
    /// resolves; a remote failure is logged and swallowed so the caller
    /// never observes an authenticated-looking state after this returns.
    pub async fn sign_out(&self) {
        {
            let mut inner = self.inner.lock().expect("auth context state poisoned");
            // Advancing the generation discards any in-flight loads that
            // belonged to the session being discarded.
            inner.generation += 1;
            inner.session = None;
            inner.profile = None;
            inner.has_completed_assessment = false;
            inner.loading = false;
        }

        if let Err(e) = self.auth.sign_out().await {
            error!(error = %e, "remote sign-out failed; local state already cleared");
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthContextError> {
        self.auth
            .reset_password(email)
            .await
            .map_err(AuthContextError::remote)
    }

    pub async fn update_password(&self, new_password: &str) -> Result<(), AuthContextError> {
        self.auth
            .update_password(new_password)
            .await
            .map_err(AuthContextError::remote)
    }

    pub async fn resend_email_verification(&self) -> Result<(), AuthContextError> {
        self.auth
            .resend_email_verification()
            .await
            .map_err(AuthContextError::remote)
    }

    /// Applies a partial profile update and replaces the in-memory profile
    /// with the collaborator's canonical copy. Never merges locally.
    pub async fn update_profile(
        &self,
        updates: ProfileUpdate,
    ) -> Result<UserProfile, AuthContextError> {
        let (user_id, issued_gen) = self.require_user()?;

        let profile = self
            .auth
            .update_user_profile(user_id, updates)
            .await
            .map_err(AuthContextError::remote)?;

        let mut inner = self.inner.lock().expect("auth context state poisoned");
        if inner.generation == issued_gen {
            inner.profile = Some(profile.clone());
        }
        Ok(profile)
    }

    /// Uploads an avatar and reloads the full profile afterwards, so any
    /// server-side side effects are picked up rather than patched locally.
    pub async fn upload_avatar(&self, upload: AvatarUpload) -> Result<String, AuthContextError> {
        let (user_id, _) = self.require_user()?;

        let url = self
            .auth
            .upload_avatar(user_id, upload)
            .await
            .map_err(AuthContextError::remote)?;

        self.refresh_profile().await;
        Ok(url)
    }

    /// Reloads and replaces the profile. Errors are logged, not thrown; the
    /// previous value stays in place. A no-op when anonymous.
    pub async fn refresh_profile(&self) {
        if let Some((user_id, generation)) = self.current_user() {
            self.load_profile(user_id, generation).await;
        }
    }

    /// Recomputes the assessment flag. Degrades to `false` on absence or
    /// failure. A no-op when anonymous.
    pub async fn refresh_assessment_status(&self) {
        if let Some((user_id, generation)) = self.current_user() {
            self.check_assessment(user_id, generation).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthEvent, SkinAssessment};
    use crate::ports::{PortResult, AssessmentService};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn session_for(user_id: Uuid, email: &str) -> Session {
        Session {
            access_token: format!("token-{user_id}"),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            user: AuthUser {
                id: user_id,
                email: email.to_string(),
            },
        }
    }

    fn profile_for(user_id: Uuid, name: &str) -> UserProfile {
        UserProfile {
            id: user_id,
            email: Some(format!("{name}@example.com")),
            full_name: Some(name.to_string()),
            username: Some(name.to_lowercase()),
            avatar_url: None,
            updated_at: None,
        }
    }

    #[derive(Default)]
    struct MockAuth {
        senders: Mutex<Vec<mpsc::UnboundedSender<AuthChange>>>,
        initial_session: Mutex<Option<Session>>,
        hang_initial_fetch: bool,
        profiles: Mutex<HashMap<Uuid, UserProfile>>,
        profile_gate: Mutex<Option<Arc<Notify>>>,
        profile_loads: AtomicUsize,
        password_updates: AtomicUsize,
        verification_resends: AtomicUsize,
        fail_sign_out: AtomicBool,
    }

    impl MockAuth {
        fn emit(&self, event: AuthEvent, session: Option<Session>) {
            let senders = self.senders.lock().unwrap();
            for tx in senders.iter() {
                let _ = tx.send(AuthChange {
                    event,
                    session: session.clone(),
                });
            }
        }

        fn set_profile(&self, profile: UserProfile) {
            self.profiles.lock().unwrap().insert(profile.id, profile);
        }
    }

    #[async_trait]
    impl AuthService for MockAuth {
        async fn sign_up(
            &self,
            _email: &str,
            _password: &str,
            _info: Option<SignUpInfo>,
        ) -> PortResult<()> {
            Ok(())
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> PortResult<()> {
            Ok(())
        }

        async fn sign_in_with_google(&self) -> PortResult<String> {
            Ok("https://example.com/authorize?provider=google".to_string())
        }

        async fn sign_out(&self) -> PortResult<()> {
            if self.fail_sign_out.load(Ordering::SeqCst) {
                Err(PortError::Unexpected("network down".to_string()))
            } else {
                Ok(())
            }
        }

        async fn reset_password(&self, _email: &str) -> PortResult<()> {
            Ok(())
        }

        async fn update_password(&self, _new_password: &str) -> PortResult<()> {
            self.password_updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn resend_email_verification(&self) -> PortResult<()> {
            self.verification_resends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn current_session(&self) -> PortResult<Option<Session>> {
            if self.hang_initial_fetch {
                std::future::pending::<()>().await;
            }
            Ok(self.initial_session.lock().unwrap().clone())
        }

        fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthChange> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.senders.lock().unwrap().push(tx);
            rx
        }

        async fn get_user_profile(&self, user_id: Uuid) -> PortResult<Option<UserProfile>> {
            let gate = self.profile_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.profile_loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
        }

        async fn update_user_profile(
            &self,
            user_id: Uuid,
            updates: ProfileUpdate,
        ) -> PortResult<UserProfile> {
            let mut profiles = self.profiles.lock().unwrap();
            let profile = profiles
                .entry(user_id)
                .or_insert_with(|| profile_for(user_id, "entry"));
            if let Some(name) = updates.full_name {
                profile.full_name = Some(name);
            }
            if let Some(username) = updates.username {
                profile.username = Some(username);
            }
            if let Some(url) = updates.avatar_url {
                profile.avatar_url = Some(url);
            }
            Ok(profile.clone())
        }

        async fn upload_avatar(
            &self,
            user_id: Uuid,
            upload: AvatarUpload,
        ) -> PortResult<String> {
            let url = format!("https://cdn.example.com/avatars/{user_id}/{}", upload.file_name);
            let mut profiles = self.profiles.lock().unwrap();
            if let Some(profile) = profiles.get_mut(&user_id) {
                profile.avatar_url = Some(url.clone());
            }
            Ok(url)
        }
    }

    #[derive(Default)]
    struct MockAssessments {
        completed: Mutex<HashMap<Uuid, bool>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl AssessmentService for MockAssessments {
        async fn latest_for_user(&self, user_id: Uuid) -> PortResult<Option<SkinAssessment>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("query failed".to_string()));
            }
            let completed = self
                .completed
                .lock()
                .unwrap()
                .get(&user_id)
                .copied()
                .unwrap_or(false);
            Ok(completed.then(|| SkinAssessment {
                id: Uuid::new_v4(),
                skin_type: "Oily".to_string(),
                hydration_level: Some("Low".to_string()),
                created_at: Utc::now(),
            }))
        }
    }

    async fn wait_until<F: Fn(&AuthSnapshot) -> bool>(ctx: &AuthContext, pred: F) {
        for _ in 0..200 {
            if pred(&ctx.snapshot()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached: final snapshot {:?}", ctx.snapshot());
    }

    #[tokio::test]
    async fn final_state_matches_last_notification() {
        let auth = Arc::new(MockAuth::default());
        let assessments = Arc::new(MockAssessments::default());
        let ctx = AuthContext::start(auth.clone(), assessments);

        wait_until(&ctx, |s| !s.loading).await;

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        auth.set_profile(profile_for(alice, "Alice"));
        auth.set_profile(profile_for(bob, "Bob"));

        auth.emit(AuthEvent::SignedIn, Some(session_for(alice, "alice@example.com")));
        auth.emit(AuthEvent::SignedOut, None);
        auth.emit(AuthEvent::SignedIn, Some(session_for(bob, "bob@example.com")));

        wait_until(&ctx, |s| {
            s.user().map(|u| u.id) == Some(bob)
                && s.profile.as_ref().and_then(|p| p.full_name.clone())
                    == Some("Bob".to_string())
        })
        .await;

        ctx.shutdown();
    }

    #[tokio::test]
    async fn session_event_loads_profile_and_assessment_flag() {
        let auth = Arc::new(MockAuth::default());
        let assessments = Arc::new(MockAssessments::default());
        let user_id = Uuid::new_v4();
        auth.set_profile(profile_for(user_id, "Alice"));
        assessments.completed.lock().unwrap().insert(user_id, true);

        let ctx = AuthContext::start(auth.clone(), assessments);
        auth.emit(AuthEvent::SignedIn, Some(session_for(user_id, "alice@example.com")));

        wait_until(&ctx, |s| {
            s.is_authenticated() && s.profile.is_some() && s.has_completed_assessment
        })
        .await;

        ctx.shutdown();
    }

    #[tokio::test]
    async fn sign_out_clears_everything_even_when_remote_fails() {
        let auth = Arc::new(MockAuth::default());
        let assessments = Arc::new(MockAssessments::default());
        let user_id = Uuid::new_v4();
        auth.set_profile(profile_for(user_id, "Alice"));
        assessments.completed.lock().unwrap().insert(user_id, true);

        let ctx = AuthContext::start(auth.clone(), assessments);
        auth.emit(AuthEvent::SignedIn, Some(session_for(user_id, "alice@example.com")));
        wait_until(&ctx, |s| s.profile.is_some() && s.has_completed_assessment).await;

        auth.fail_sign_out.store(true, Ordering::SeqCst);
        ctx.sign_out().await;

        let snapshot = ctx.snapshot();
        assert!(snapshot.session.is_none());
        assert!(snapshot.user().is_none());
        assert!(snapshot.profile.is_none());
        assert!(!snapshot.has_completed_assessment);
        assert!(!snapshot.loading);

        ctx.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn initial_fetch_timeout_settles_anonymous() {
        let auth = Arc::new(MockAuth {
            hang_initial_fetch: true,
            ..Default::default()
        });
        let ctx = AuthContext::start(auth, Arc::new(MockAssessments::default()));

        assert!(ctx.snapshot().loading);

        tokio::time::sleep(Duration::from_secs(11)).await;

        let snapshot = ctx.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.session.is_none());

        ctx.shutdown();
    }

    #[tokio::test]
    async fn update_profile_without_user_is_rejected() {
        let auth = Arc::new(MockAuth::default());
        let ctx = AuthContext::start(auth, Arc::new(MockAssessments::default()));
        wait_until(&ctx, |s| !s.loading).await;

        let result = ctx
            .update_profile(ProfileUpdate {
                full_name: Some("Nobody".to_string()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(AuthContextError::NotAuthenticated)));
        assert!(ctx.snapshot().profile.is_none());

        ctx.shutdown();
    }

    #[tokio::test]
    async fn stale_profile_load_is_discarded_after_sign_out() {
        let auth = Arc::new(MockAuth::default());
        let user_id = Uuid::new_v4();
        auth.set_profile(profile_for(user_id, "Alice"));

        let gate = Arc::new(Notify::new());
        *auth.profile_gate.lock().unwrap() = Some(gate.clone());

        let ctx = AuthContext::start(auth.clone(), Arc::new(MockAssessments::default()));
        wait_until(&ctx, |s| !s.loading).await;

        // The profile load for this sign-in blocks on the gate.
        auth.emit(AuthEvent::SignedIn, Some(session_for(user_id, "alice@example.com")));
        wait_until(&ctx, |s| s.is_authenticated()).await;

        // Sign out before the load resolves, then release it.
        auth.emit(AuthEvent::SignedOut, None);
        wait_until(&ctx, |s| !s.is_authenticated()).await;
        gate.notify_waiters();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = ctx.snapshot();
        assert!(snapshot.profile.is_none(), "stale load resurrected a profile");
        assert!(!snapshot.has_completed_assessment);

        ctx.shutdown();
    }

    #[tokio::test]
    async fn upload_avatar_reloads_the_full_profile() {
        let auth = Arc::new(MockAuth::default());
        let user_id = Uuid::new_v4();
        auth.set_profile(profile_for(user_id, "Alice"));

        let ctx = AuthContext::start(auth.clone(), Arc::new(MockAssessments::default()));
        auth.emit(AuthEvent::SignedIn, Some(session_for(user_id, "alice@example.com")));
        wait_until(&ctx, |s| s.profile.is_some()).await;

        let loads_before = auth.profile_loads.load(Ordering::SeqCst);
        let url = ctx
            .upload_avatar(AvatarUpload {
                file_name: "me.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: bytes::Bytes::from_static(b"\x89PNG"),
            })
            .await
            .unwrap();

        assert!(url.contains("me.png"));
        assert!(auth.profile_loads.load(Ordering::SeqCst) > loads_before);
        assert_eq!(
            ctx.snapshot().profile.and_then(|p| p.avatar_url),
            Some(url)
        );

        ctx.shutdown();
    }

    #[tokio::test]
    async fn password_maintenance_delegates_to_the_collaborator() {
        let auth = Arc::new(MockAuth::default());
        let user_id = Uuid::new_v4();

        let ctx = AuthContext::start(auth.clone(), Arc::new(MockAssessments::default()));
        auth.emit(AuthEvent::SignedIn, Some(session_for(user_id, "alice@example.com")));
        wait_until(&ctx, |s| s.is_authenticated()).await;

        ctx.update_password("correct-horse-battery").await.unwrap();
        ctx.resend_email_verification().await.unwrap();

        assert_eq!(auth.password_updates.load(Ordering::SeqCst), 1);
        assert_eq!(auth.verification_resends.load(Ordering::SeqCst), 1);
        // Neither operation disturbs the held session.
        assert!(ctx.is_authenticated());

        ctx.shutdown();
    }

    #[tokio::test]
    async fn assessment_query_failure_degrades_to_false() {
        let auth = Arc::new(MockAuth::default());
        let assessments = Arc::new(MockAssessments::default());
        let user_id = Uuid::new_v4();
        auth.set_profile(profile_for(user_id, "Alice"));
        assessments.completed.lock().unwrap().insert(user_id, true);

        let ctx = AuthContext::start(auth.clone(), assessments.clone());
        auth.emit(AuthEvent::SignedIn, Some(session_for(user_id, "alice@example.com")));
        wait_until(&ctx, |s| s.has_completed_assessment).await;

        assessments.fail.store(true, Ordering::SeqCst);
        ctx.refresh_assessment_status().await;
        assert!(!ctx.snapshot().has_completed_assessment);

        ctx.shutdown();
    }

    #[tokio::test]
    async fn update_profile_replaces_with_canonical_copy() {
        let auth = Arc::new(MockAuth::default());
        let user_id = Uuid::new_v4();
        auth.set_profile(profile_for(user_id, "Alice"));

        let ctx = AuthContext::start(auth.clone(), Arc::new(MockAssessments::default()));
        auth.emit(AuthEvent::SignedIn, Some(session_for(user_id, "alice@example.com")));
        wait_until(&ctx, |s| s.profile.is_some()).await;

        let updated = ctx
            .update_profile(ProfileUpdate {
                full_name: Some("Alice Liddell".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.full_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(
            ctx.snapshot().profile.and_then(|p| p.full_name),
            Some("Alice Liddell".to_string())
        );

        ctx.shutdown();
    }
}
