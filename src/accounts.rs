// src/accounts.rs
use crate::auth::password::{self, PasswordError};
use crate::auth::TokenService;
use crate::error::ApiError;
use crate::models::{LoginRequest, PublicUser, SignupRequest, User};
use crate::store::{Store, StoreError};
use log::{error, info, warn};
use uuid::Uuid;

/// Issued token plus the public view of the account that logged in.
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

/// Registers a new account. No token is issued; the caller logs in next.
pub async fn signup(store: &dyn Store, request: SignupRequest) -> Result<(), ApiError> {
    let SignupRequest {
        name,
        email,
        phone,
        password,
    } = request;

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        phone,
        password_hash,
    };
    let user_id = user.id.clone();

    // Two concurrent signups can both pass the lookup; the store settles it.
    store.insert_user(user).await.map_err(|e| match e {
        StoreError::DuplicateKey => ApiError::DuplicateEmail,
        other => other.into(),
    })?;

    info!("Created account {}", user_id);
    Ok(())
}

/// Checks credentials and issues a token.
///
/// An unknown email and a wrong password fail identically.
pub async fn login(
    store: &dyn Store,
    tokens: &TokenService,
    request: LoginRequest,
) -> Result<Session, ApiError> {
    let user = store
        .find_user_by_email(&request.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let password = request.password;
    let stored_hash = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || password::verify_password(&password, &stored_hash))
            .await
            .map_err(|e| ApiError::Internal(format!("verification task failed: {}", e)))?;

    match verified {
        Ok(()) => {}
        Err(PasswordError::InvalidHashFormat) => {
            error!("Account {} has an unreadable password hash", user.id);
            return Err(ApiError::InvalidCredentials);
        }
        Err(e) => {
            warn!("Failed login for account {}: {}", user.id, e);
            return Err(ApiError::InvalidCredentials);
        }
    }

    let token = tokens
        .issue(&user.id, &user.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Account {} logged in", user.id);
    Ok(Session {
        token,
        user: PublicUser::from(&user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn signup_request(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: "A".to_string(),
            email: email.to_string(),
            phone: "1".to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_stores_hash_not_password() {
        let store = MemoryStore::new();
        signup(&store, signup_request("a@x.com", "pw")).await.unwrap();

        let user = store.find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "pw");
        assert!(password::verify_password("pw", &user.password_hash).is_ok());
        assert_eq!(user.phone, "1");
    }

    #[tokio::test]
    async fn test_signup_twice_is_duplicate() {
        let store = MemoryStore::new();
        signup(&store, signup_request("a@x.com", "pw")).await.unwrap();

        let again = signup(&store, signup_request("a@x.com", "other")).await;
        assert!(matches!(again, Err(ApiError::DuplicateEmail)));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_signups_create_one_account() {
        let store = MemoryStore::new();

        let (first, second) = tokio::join!(
            signup(&store, signup_request("a@x.com", "pw")),
            signup(&store, signup_request("a@x.com", "other")),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(ApiError::DuplicateEmail)))
                .count(),
            1
        );
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_login_issues_token_for_user() {
        let store = MemoryStore::new();
        let tokens = TokenService::new("test-secret");
        signup(&store, signup_request("a@x.com", "pw")).await.unwrap();

        let session = login(&store, &tokens, login_request("a@x.com", "pw"))
            .await
            .unwrap();

        let claims = tokens.verify(&session.token).unwrap();
        assert_eq!(claims.user_id, session.user.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(session.user.name, "A");
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let store = MemoryStore::new();
        let tokens = TokenService::new("test-secret");
        signup(&store, signup_request("a@x.com", "pw")).await.unwrap();

        let wrong_password = login(&store, &tokens, login_request("a@x.com", "nope"))
            .await
            .err()
            .unwrap();
        let unknown_email = login(&store, &tokens, login_request("b@x.com", "pw"))
            .await
            .err()
            .unwrap();

        assert!(matches!(wrong_password, ApiError::InvalidCredentials));
        assert!(matches!(unknown_email, ApiError::InvalidCredentials));
        assert_eq!(wrong_password.status(), unknown_email.status());
        assert_eq!(
            wrong_password.public_message(),
            unknown_email.public_message()
        );
    }

    #[tokio::test]
    async fn test_login_with_corrupt_hash_is_invalid_credentials() {
        let store = MemoryStore::new();
        let tokens = TokenService::new("test-secret");
        store
            .insert_user(User {
                id: "u-1".to_string(),
                name: "A".to_string(),
                email: "a@x.com".to_string(),
                phone: "1".to_string(),
                password_hash: "pw".to_string(),
            })
            .await
            .unwrap();

        let result = login(&store, &tokens, login_request("a@x.com", "pw")).await;
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
    }
}
