//! Account calls. `login` and `refresh` store the issued token; `logout`
//! only forgets it locally.

use crate::MemochatClient;
use memochat_transport::RequestOptions;
use memochat_types::{Credential, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredUser {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

/// Fields of the profile to change. `None` fields are left as they are.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// What a successful login or refresh reports, minus the token itself,
/// which goes straight into the token store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub user: Option<User>,
}

#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    user: Option<User>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

pub struct AuthApi<'a> {
    client: &'a MemochatClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a MemochatClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Propagates transport errors; a taken username is a `RequestFailed` (409).
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser> {
        self.client
            .executor()
            .execute_json(
                "/auth/register",
                RequestOptions::post(serde_json::to_value(request)?),
            )
            .await
    }

    /// Logs in and stores the issued token.
    ///
    /// # Errors
    ///
    /// Propagates transport errors, and storage errors from persisting the token.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let grant: TokenGrant = self
            .client
            .executor()
            .execute_json(
                "/auth/login",
                RequestOptions::post(json!({ "username": username, "password": password })),
            )
            .await?;
        let session = self.store(grant)?;
        tracing::info!(
            user_id = session.user.as_ref().map(|u| u.id),
            "logged in"
        );
        Ok(session)
    }

    /// Forgets the local token. The server keeps no session to end.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the persisted token could not be removed;
    /// the in-memory token is gone regardless.
    pub fn logout(&self) -> Result<()> {
        self.client.tokens().clear()
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn me(&self) -> Result<User> {
        self.client
            .executor()
            .execute_json("/auth/me", RequestOptions::get())
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn update_me(&self, update: &UpdateProfile) -> Result<User> {
        self.client
            .executor()
            .execute_json(
                "/auth/me",
                RequestOptions::put(serde_json::to_value(update)?),
            )
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors. A wrong old password is rejected by the
    /// server with 401, which ends the session like any other 401.
    pub async fn update_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        self.client
            .executor()
            .execute(
                "/auth/password",
                RequestOptions::put(json!({
                    "old_password": old_password,
                    "new_password": new_password,
                })),
            )
            .await
            .map(drop)
    }

    /// Exchanges the current token for a fresh one and stores it.
    ///
    /// # Errors
    ///
    /// Propagates transport and storage errors.
    pub async fn refresh(&self) -> Result<Session> {
        let grant: TokenGrant = self
            .client
            .executor()
            .execute_json("/auth/refresh", RequestOptions::post(json!({})))
            .await?;
        self.store(grant)
    }

    fn store(&self, grant: TokenGrant) -> Result<Session> {
        self.client
            .tokens()
            .set(Some(Credential::new(grant.access_token)))?;
        Ok(Session {
            token_type: grant.token_type,
            expires_in: grant.expires_in,
            user: grant.user,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::client_for;
    use super::*;
    use memochat_types::TransportError;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope(data: serde_json::Value) -> serde_json::Value {
        json!({"success": true, "message": "ok", "data": data, "timestamp": "2024-01-01T00:00:00Z"})
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"username": "ann", "password": "hunter22"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "access_token": "jwt-1",
                "token_type": "Bearer",
                "expires_in": 86400,
                "user": {"id": 1, "username": "ann", "email": "ann@example.com"}
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let t = client_for(&server);
        let session = t.client.auth().login("ann", "hunter22").await.unwrap();
        assert_eq!(session.expires_in, Some(86400));
        assert_eq!(session.user.unwrap().username, "ann");
        assert_eq!(t.client.tokens().get().unwrap().expose(), "jwt-1");
    }

    #[tokio::test]
    async fn test_token_is_sent_after_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(envelope(json!({"access_token": "jwt-2"}))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("authorization", "Bearer jwt-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "id": 3, "username": "bo", "email": "bo@example.com",
                "created_at": "2024-05-01 10:00:00"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let t = client_for(&server);
        t.client.auth().login("bo", "pw").await.unwrap();
        let me = t.client.auth().me().await.unwrap();
        assert_eq!(me.id, 3);
        assert_eq!(me.created_at.as_deref(), Some("2024-05-01 10:00:00"));
    }

    #[tokio::test]
    async fn test_failed_login_keeps_no_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false, "message": "invalid username or password",
                "error_code": "VALIDATION_ERROR"
            })))
            .mount(&server)
            .await;

        let t = client_for(&server);
        let err = t.client.auth().login("ann", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid username or password");
        assert!(t.client.tokens().get().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_token() {
        let server = MockServer::start().await;
        let t = client_for(&server);
        t.client.tokens().set(Some(Credential::new("x"))).unwrap();
        t.client.auth().logout().unwrap();
        assert!(!t.client.tokens().is_authenticated());
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "success": false, "message": "username or email already exists",
                "error_code": "USERNAME_EXISTS"
            })))
            .mount(&server)
            .await;

        let t = client_for(&server);
        let err = t
            .client
            .auth()
            .register(&RegisterRequest {
                username: "ann".into(),
                email: "ann@example.com".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::RequestFailed { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_update_me_sends_only_set_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/auth/me"))
            .and(body_json(json!({"email": "new@example.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "id": 1, "username": "ann", "email": "new@example.com"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let t = client_for(&server);
        let user = t
            .client
            .auth()
            .update_me(&UpdateProfile {
                email: Some("new@example.com".into()),
                ..UpdateProfile::default()
            })
            .await
            .unwrap();
        assert_eq!(user.email, "new@example.com");
    }

    #[tokio::test]
    async fn test_wrong_old_password_ends_session() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/auth/password"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false, "message": "wrong password", "error_code": "INVALID_PASSWORD"
            })))
            .mount(&server)
            .await;

        let t = client_for(&server);
        t.client.tokens().set(Some(Credential::new("x"))).unwrap();
        let err = t
            .client
            .auth()
            .update_password("old", "new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::AuthExpired));
        assert!(t.client.tokens().get().is_none());
        assert_eq!(t.redirect.redirect_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .and(header("authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "access_token": "new", "token_type": "Bearer", "expires_in": 60
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let t = client_for(&server);
        t.client.tokens().set(Some(Credential::new("old"))).unwrap();
        let session = t.client.auth().refresh().await.unwrap();
        assert_eq!(session.token_type, "Bearer");
        assert_eq!(t.client.tokens().get().unwrap().expose(), "new");
    }
}
