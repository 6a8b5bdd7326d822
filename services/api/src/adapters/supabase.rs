//! services/api/src/adapters/supabase.rs
//!
//! This module contains the adapter for the hosted backend-as-a-service. It
//! implements the `AuthService` and `AssessmentService` ports from the `core`
//! crate over the service's REST surface: GoTrue-style auth endpoints,
//! PostgREST table access, and the storage API for avatar uploads.
//!
//! Like the vendor's own SDK, the adapter holds the current token bundle and
//! is the source of the auth-state notification stream: every successful
//! sign-in, sign-out, and user update is fanned out to all live subscribers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dermaglow_core::domain::{
    AuthChange, AuthEvent, AuthUser, AvatarUpload, ProfileUpdate, Session, SignUpInfo,
    SkinAssessment, UserProfile,
};
use dermaglow_core::ports::{AssessmentService, AuthService, PortError, PortResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `AuthService` and `AssessmentService` ports
/// against a Supabase-compatible REST backend.
#[derive(Clone)]
pub struct SupabaseAuthAdapter {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Mutex<Option<Session>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<AuthChange>>>>,
}

impl SupabaseAuthAdapter {
    /// Creates a new `SupabaseAuthAdapter` for the project at `base_url`,
    /// authenticating every request with the project's anon key.
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(anon_key) {
            headers.insert("apikey", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Arc::new(Mutex::new(None)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1{}", self.base_url, path)
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1{}", self.base_url, path)
    }

    fn stored_session(&self) -> Option<Session> {
        self.session.lock().expect("session store poisoned").clone()
    }

    fn access_token(&self) -> PortResult<String> {
        self.stored_session()
            .map(|s| s.access_token)
            .ok_or(PortError::Unauthorized)
    }

    /// Replaces the stored session and notifies every live subscriber.
    /// Subscribers whose receiver has been dropped are pruned.
    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.lock().expect("session store poisoned") = session.clone();

        let mut subscribers = self.subscribers.lock().expect("subscriber list poisoned");
        subscribers.retain(|tx| {
            tx.send(AuthChange {
                event,
                session: session.clone(),
            })
            .is_ok()
        });
    }

    /// Maps a non-success HTTP response to a `PortError`, extracting the
    /// server's message from the JSON body when one is present.
    async fn error_from_response(resp: reqwest::Response) -> PortError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("HTTP {} from auth backend", status.as_u16()));

        match status.as_u16() {
            401 | 403 => PortError::Unauthorized,
            404 => PortError::NotFound(message),
            _ => PortError::Unexpected(message),
        }
    }

    async fn json_or_error<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> PortResult<T> {
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }
        resp.json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed response body: {e}")))
    }

    async fn ok_or_error(resp: reqwest::Response) -> PortResult<()> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }
}

/// Pulls a human-readable message out of a GoTrue/PostgREST error body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    for key in ["msg", "message", "error_description", "error"] {
        if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
    }
    None
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
}

#[derive(Deserialize)]
struct SessionRecord {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserRecord,
}

impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in),
            user: AuthUser {
                id: self.user.id,
                email: self.user.email.unwrap_or_default(),
            },
        }
    }
}

#[derive(Deserialize)]
struct ProfileRecord {
    id: Uuid,
    email: Option<String>,
    full_name: Option<String>,
    username: Option<String>,
    avatar_url: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            username: self.username,
            avatar_url: self.avatar_url,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Serialize)]
struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct AssessmentRecord {
    id: Uuid,
    skin_type: String,
    hydration_level: Option<String>,
    created_at: DateTime<Utc>,
}

impl AssessmentRecord {
    fn to_domain(self) -> SkinAssessment {
        SkinAssessment {
            id: self.id,
            skin_type: self.skin_type,
            hydration_level: self.hydration_level,
            created_at: self.created_at,
        }
    }
}

#[derive(Serialize)]
struct SignUpPayload<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    data: serde_json::Value,
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for SupabaseAuthAdapter {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        info: Option<SignUpInfo>,
    ) -> PortResult<()> {
        let data = match info {
            Some(info) => serde_json::json!({
                "full_name": info.full_name,
                "username": info.username,
            }),
            None => serde_json::Value::Null,
        };

        let resp = self
            .http
            .post(self.auth_url("/signup"))
            .json(&SignUpPayload {
                email,
                password,
                data,
            })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Depending on project settings the response may or may not carry a
        // session; the caller signs in separately either way.
        Self::ok_or_error(resp).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<()> {
        let resp = self
            .http
            .post(self.auth_url("/token?grant_type=password"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let record: SessionRecord = Self::json_or_error(resp).await?;
        self.emit(AuthEvent::SignedIn, Some(record.to_domain()));
        Ok(())
    }

    async fn sign_in_with_google(&self) -> PortResult<String> {
        // Redirect-driven flow: the caller navigates to this URL and the
        // session, if granted, arrives through the notification stream.
        Ok(self.auth_url("/authorize?provider=google"))
    }

    async fn sign_out(&self) -> PortResult<()> {
        let token = self.stored_session().map(|s| s.access_token);

        // The local bundle is dropped and subscribers notified before the
        // remote call, mirroring the vendor SDK's behavior.
        self.emit(AuthEvent::SignedOut, None);

        if let Some(token) = token {
            let resp = self
                .http
                .post(self.auth_url("/logout"))
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            Self::ok_or_error(resp).await?;
        }
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> PortResult<()> {
        let resp = self
            .http
            .post(self.auth_url("/recover"))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Self::ok_or_error(resp).await
    }

    async fn update_password(&self, new_password: &str) -> PortResult<()> {
        let token = self.access_token()?;
        let resp = self
            .http
            .put(self.auth_url("/user"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "password": new_password }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Self::ok_or_error(resp).await?;

        self.emit(AuthEvent::UserUpdated, self.stored_session());
        Ok(())
    }

    async fn resend_email_verification(&self) -> PortResult<()> {
        let session = self.stored_session().ok_or(PortError::Unauthorized)?;
        let resp = self
            .http
            .post(self.auth_url("/resend"))
            .json(&serde_json::json!({
                "type": "signup",
                "email": session.user.email,
            }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Self::ok_or_error(resp).await
    }

    async fn current_session(&self) -> PortResult<Option<Session>> {
        Ok(self.stored_session())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber list poisoned")
            .push(tx);
        rx
    }

    async fn get_user_profile(&self, user_id: Uuid) -> PortResult<Option<UserProfile>> {
        let token = self.access_token()?;
        let resp = self
            .http
            .get(self.rest_url("/profiles"))
            .bearer_auth(token)
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut records: Vec<ProfileRecord> = Self::json_or_error(resp).await?;
        Ok(records.pop().map(ProfileRecord::to_domain))
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        updates: ProfileUpdate,
    ) -> PortResult<UserProfile> {
        let token = self.access_token()?;
        let resp = self
            .http
            .patch(self.rest_url("/profiles"))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{user_id}"))])
            .json(&ProfilePatch {
                full_name: updates.full_name,
                username: updates.username,
                avatar_url: updates.avatar_url,
                updated_at: Utc::now(),
            })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut records: Vec<ProfileRecord> = Self::json_or_error(resp).await?;
        records
            .pop()
            .map(ProfileRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn upload_avatar(&self, user_id: Uuid, upload: AvatarUpload) -> PortResult<String> {
        let token = self.access_token()?;
        let object_path = format!("/avatars/{}/{}", user_id, upload.file_name);

        let resp = self
            .http
            .post(self.storage_url(&format!("/object{object_path}")))
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, upload.content_type)
            .header("x-upsert", "true")
            .body(upload.bytes)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Self::ok_or_error(resp).await?;

        // The bucket is public, so the object URL is derived, not returned.
        let public_url = self.storage_url(&format!("/object/public{object_path}"));

        self.update_user_profile(
            user_id,
            ProfileUpdate {
                avatar_url: Some(public_url.clone()),
                ..Default::default()
            },
        )
        .await?;

        Ok(public_url)
    }
}

//=========================================================================================
// `AssessmentService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssessmentService for SupabaseAuthAdapter {
    /// Fetches the single most recent assessment record for the user.
    async fn latest_for_user(&self, user_id: Uuid) -> PortResult<Option<SkinAssessment>> {
        let token = self.access_token()?;
        let resp = self
            .http
            .get(self.rest_url("/skin_assessments"))
            .bearer_auth(token)
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("select", "id,skin_type,hydration_level,created_at".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut records: Vec<AssessmentRecord> = Self::json_or_error(resp).await?;
        Ok(records.pop().map(AssessmentRecord::to_domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SupabaseAuthAdapter {
        SupabaseAuthAdapter::new("https://proj.supabase.co/", "anon-key")
    }

    #[test]
    fn url_building_strips_trailing_slash() {
        let adapter = adapter();
        assert_eq!(
            adapter.auth_url("/token?grant_type=password"),
            "https://proj.supabase.co/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            adapter.rest_url("/profiles"),
            "https://proj.supabase.co/rest/v1/profiles"
        );
        assert_eq!(
            adapter.storage_url("/object/public/avatars/u/a.png"),
            "https://proj.supabase.co/storage/v1/object/public/avatars/u/a.png"
        );
    }

    #[test]
    fn error_message_extraction_prefers_known_keys() {
        assert_eq!(
            extract_error_message(r#"{"msg":"Invalid login credentials"}"#).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(
            extract_error_message(r#"{"error_description":"Bad refresh token"}"#).as_deref(),
            Some("Bad refresh token")
        );
        assert_eq!(
            extract_error_message(r#"{"message":"row level security"}"#).as_deref(),
            Some("row level security")
        );
        assert_eq!(extract_error_message("not json"), None);
    }

    #[test]
    fn session_record_maps_to_domain() {
        let record: SessionRecord = serde_json::from_str(
            r#"{
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "user": { "id": "8f9d8a5e-3a64-4bdc-9c2d-111111111111", "email": "a@b.co" }
            }"#,
        )
        .unwrap();
        let session = record.to_domain();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.user.email, "a@b.co");
        assert!(session.expires_at > Utc::now());
    }

    #[test]
    fn profile_record_tolerates_missing_fields() {
        let record: ProfileRecord = serde_json::from_str(
            r#"{ "id": "8f9d8a5e-3a64-4bdc-9c2d-111111111111" }"#,
        )
        .unwrap();
        let profile = record.to_domain();
        assert!(profile.full_name.is_none());
        assert!(profile.avatar_url.is_none());
    }

    #[test]
    fn profile_patch_skips_unset_fields() {
        let patch = ProfilePatch {
            full_name: Some("Alice".to_string()),
            username: None,
            avatar_url: None,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["full_name"], "Alice");
        assert!(json.get("username").is_none());
        assert!(json.get("avatar_url").is_none());
    }

    #[tokio::test]
    async fn authed_calls_without_session_are_unauthorized() {
        let adapter = adapter();
        let result = adapter.get_user_profile(Uuid::new_v4()).await;
        assert!(matches!(result, Err(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_changes_in_order() {
        let adapter = adapter();
        let mut rx = adapter.subscribe();

        let session = SessionRecord {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_in: 3600,
            user: UserRecord {
                id: Uuid::new_v4(),
                email: Some("a@b.co".to_string()),
            },
        }
        .to_domain();

        adapter.emit(AuthEvent::SignedIn, Some(session));
        adapter.emit(AuthEvent::SignedOut, None);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, AuthEvent::SignedIn);
        assert!(first.session.is_some());

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, AuthEvent::SignedOut);
        assert!(second.session.is_none());
    }

    #[tokio::test]
    async fn closed_subscribers_are_pruned() {
        let adapter = adapter();
        let rx = adapter.subscribe();
        drop(rx);

        adapter.emit(AuthEvent::SignedOut, None);
        assert!(adapter.subscribers.lock().unwrap().is_empty());
    }
}
