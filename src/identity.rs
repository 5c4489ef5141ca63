//! Signing up, logging in and out, and resolving the logged in user.
//!
//! The session token is the logged in user's normalized email address. Its
//! presence in storage is the only thing that makes a user "logged in": there
//! is no expiry.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Email, Error, PasswordHash,
    storage::{Table, TableStorage, generate_id},
    user::{User, UserId, UserProfile, normalize_name},
};

/// The user that operations are performed on behalf of.
///
/// Category and transaction records are owned by the identity's email.
pub type Identity = UserProfile;

/// The session handed back by a successful [IdentityStore::login].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The token that identifies the session.
    pub access_token: String,
    /// Always "bearer".
    pub token_type: String,
}

/// Creates users and manages the session of the logged in user.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    storage: TableStorage,
    password_hash_cost: u32,
}

impl IdentityStore {
    /// Create an identity store that hashes passwords with `password_hash_cost`.
    pub fn new(storage: TableStorage, password_hash_cost: u32) -> Self {
        Self {
            storage,
            password_hash_cost,
        }
    }

    /// Register a new user.
    ///
    /// The name is trimmed (blank names become "User") and the email is trimmed
    /// and lowercased. No password policy is enforced.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::DuplicateEmail] if a user with the same email, ignoring case, exists,
    /// - [Error::HashingError] if the password could not be hashed,
    /// - or another [Error] if the user could not be stored.
    pub fn signup(&self, name: &str, email: &str, password: &str) -> Result<UserProfile, Error> {
        let email = Email::new(email);
        let password_hash = PasswordHash::new(password, self.password_hash_cost)?;

        let profile = self.storage.update(Table::Users, |users: &mut Vec<User>| {
            if users.iter().any(|user| user.email.matches(email.as_ref())) {
                return Err(Error::DuplicateEmail);
            }

            let id = generate_id(|id| users.iter().any(|user| user.id.as_i64() == id));
            let user = User {
                id: UserId::new(id),
                name: normalize_name(name),
                email,
                password_hash,
                created_at: OffsetDateTime::now_utc(),
            };
            let profile = user.profile();
            users.push(user);

            Ok(profile)
        })??;

        tracing::info!("Signed up user {} ({})", profile.id, profile.email);

        Ok(profile)
    }

    /// Log in as the user registered with `email`.
    ///
    /// On success the session token is persisted, replacing any previous session.
    /// On failure the persisted session is left as it was.
    ///
    /// # Errors
    /// This function will return an [Error::InvalidCredentials] if no user has the
    /// email (ignoring case) or the password does not match, or another [Error] if
    /// the session could not be stored.
    pub fn login(&self, email: &str, password: &str) -> Result<Session, Error> {
        let user = self
            .find_by_email(email)
            .filter(|user| user.password_hash.verify(password))
            .ok_or(Error::InvalidCredentials)?;

        let token = user.email.to_string();
        self.storage.set_value(Table::Token, &token)?;

        tracing::info!("User {} logged in", user.id);

        Ok(Session {
            access_token: token,
            token_type: "bearer".to_owned(),
        })
    }

    /// Clear the session. Logging out without a session is not an error.
    ///
    /// # Errors
    /// Returns an error if the session could not be removed from storage.
    pub fn logout(&self) -> Result<(), Error> {
        self.storage.remove(Table::Token)?;
        tracing::debug!("Logged out");

        Ok(())
    }

    /// Whether a session token is present.
    pub fn is_authenticated(&self) -> bool {
        !self.token().is_empty()
    }

    /// The persisted session token, or an empty string if there is none.
    pub fn token(&self) -> String {
        self.storage
            .get_value::<String>(Table::Token)
            .unwrap_or_default()
    }

    /// Resolve the session token to the logged in user.
    ///
    /// Returns `None` if nobody is logged in or the token does not belong to a
    /// registered user.
    pub fn current_user(&self) -> Option<Identity> {
        let token = self.token();

        if token.is_empty() {
            return None;
        }

        let user = self.find_by_email(&token);

        if user.is_none() {
            tracing::warn!("Session token {token:?} does not belong to a registered user");
        }

        user.map(|user| user.profile())
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        self.storage
            .get::<User>(Table::Users)
            .into_iter()
            .find(|user| user.email.matches(email))
    }
}


#[cfg(test)]
mod identity_tests {
    use crate::{Error, storage::Table, user::User};

    use super::{
        IdentityStore,
        test_utils::{TEST_COST, get_storage},
    };

    fn get_store() -> IdentityStore {
        IdentityStore::new(get_storage(), TEST_COST)
    }

    #[test]
    fn signup_returns_profile() {
        let store = get_store();

        let profile = store.signup(" Ann ", " Ann@X.com", "secret1").unwrap();

        assert_eq!(profile.name, "Ann");
        assert_eq!(profile.email.as_ref(), "ann@x.com");
    }

    #[test]
    fn signup_stores_hashed_password() {
        let store = get_store();
        store.signup("Ann", "ann@x.com", "secret1").unwrap();

        let users: Vec<User> = store.storage.get(Table::Users);

        assert_eq!(users.len(), 1);
        assert_ne!(users[0].password_hash.to_string(), "secret1");
        assert!(users[0].password_hash.verify("secret1"));
    }

    #[test]
    fn signup_with_blank_name_uses_default() {
        let store = get_store();

        let profile = store.signup("  ", "ann@x.com", "secret1").unwrap();

        assert_eq!(profile.name, "User");
    }

    #[test]
    fn signup_fails_on_duplicate_email_differing_by_case() {
        let store = get_store();
        store.signup("Ann", "ann@x.com", "secret1").unwrap();

        let result = store.signup("Other Ann", "ANN@x.com", "secret2");

        assert_eq!(result, Err(Error::DuplicateEmail));
        assert_eq!(store.storage.get::<User>(Table::Users).len(), 1);
    }

    #[test]
    fn signed_up_users_get_distinct_ids() {
        let store = get_store();

        let ann = store.signup("Ann", "ann@x.com", "secret1").unwrap();
        let bob = store.signup("Bob", "bob@x.com", "secret1").unwrap();

        assert_ne!(ann.id, bob.id);
    }

    #[test]
    fn login_succeeds_and_authenticates() {
        let store = get_store();
        store.signup("Ann", "ann@x.com", "secret1").unwrap();
        assert!(!store.is_authenticated());

        let session = store.login("ann@x.com", "secret1").unwrap();

        assert_eq!(session.access_token, "ann@x.com");
        assert_eq!(session.token_type, "bearer");
        assert!(store.is_authenticated());
    }

    #[test]
    fn login_ignores_email_case() {
        let store = get_store();
        store.signup("Ann", "ann@x.com", "secret1").unwrap();

        assert!(store.login("ANN@X.COM", "secret1").is_ok());
    }

    #[test]
    fn login_with_wrong_password_fails_and_keeps_state() {
        let store = get_store();
        store.signup("Ann", "ann@x.com", "secret1").unwrap();

        let result = store.login("ann@x.com", "wrong");

        assert_eq!(result, Err(Error::InvalidCredentials));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn failed_login_does_not_replace_existing_session() {
        let store = get_store();
        store.signup("Ann", "ann@x.com", "secret1").unwrap();
        store.signup("Bob", "bob@x.com", "secret2").unwrap();
        store.login("ann@x.com", "secret1").unwrap();

        let result = store.login("bob@x.com", "wrong");

        assert_eq!(result, Err(Error::InvalidCredentials));
        assert_eq!(store.current_user().unwrap().email.as_ref(), "ann@x.com");
    }

    #[test]
    fn login_with_unknown_email_fails() {
        let store = get_store();

        assert_eq!(
            store.login("nobody@x.com", "secret1"),
            Err(Error::InvalidCredentials)
        );
    }

    #[test]
    fn logout_clears_session_and_is_idempotent() {
        let store = get_store();
        store.signup("Ann", "ann@x.com", "secret1").unwrap();
        store.login("ann@x.com", "secret1").unwrap();

        store.logout().unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.current_user(), None);

        assert!(store.logout().is_ok());
    }

    #[test]
    fn current_user_resolves_token() {
        let store = get_store();
        let profile = store.signup("Ann", "ann@x.com", "secret1").unwrap();
        store.login("ann@x.com", "secret1").unwrap();

        assert_eq!(store.current_user(), Some(profile));
    }

    #[test]
    fn current_user_is_none_for_unknown_token() {
        let store = get_store();
        store
            .storage
            .set_value(Table::Token, &"ghost@x.com".to_owned())
            .unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.current_user(), None);
    }

    #[test]
    fn empty_token_is_not_authenticated() {
        let store = get_store();
        store.storage.set_value(Table::Token, &String::new()).unwrap();

        assert!(!store.is_authenticated());
    }
}
