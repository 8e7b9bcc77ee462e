use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::credentials::CredentialHasher;
use super::domain::{Caller, KycStatus, Role, User, UserId};
use super::repository::{MarketplaceRepository, RepositoryError, Write};
use super::service::{storage_failure, DuplicateField, MarketplaceError};
use super::validation::validate_registration;

/// Sign-up form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub mobile: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Bearer token handed out by a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// Registration, credential checks, and session issuance.
pub struct IdentityService<R> {
    repository: Arc<R>,
    hasher: CredentialHasher,
    sessions: Mutex<HashMap<String, Session>>,
    session_ttl: Duration,
}

impl<R> IdentityService<R>
where
    R: MarketplaceRepository + 'static,
{
    pub fn new(repository: Arc<R>, hasher: CredentialHasher, session_ttl: Duration) -> Self {
        Self {
            repository,
            hasher,
            sessions: Mutex::new(HashMap::new()),
            session_ttl,
        }
    }

    pub fn register(&self, registration: Registration) -> Result<User, MarketplaceError> {
        let Registration {
            mobile,
            password,
            role,
            email,
            name,
        } = registration;

        let mobile = mobile.trim().to_string();
        let email = email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        validate_registration(&mobile, &password, email.as_deref())?;

        if self.repository.user_by_login(&mobile)?.is_some() {
            return Err(MarketplaceError::DuplicateUser(DuplicateField::Mobile));
        }
        if let Some(email) = email.as_deref() {
            if self.repository.user_by_login(email)?.is_some() {
                return Err(MarketplaceError::DuplicateUser(DuplicateField::Email));
            }
        }

        let user = User {
            id: UserId::generate(),
            mobile,
            email,
            name,
            password_hash: self.hasher.hash(&password)?,
            role: role.unwrap_or_default(),
            kyc_status: KycStatus::NotSubmitted,
            created_at: Utc::now(),
        };

        self.repository
            .commit(vec![Write::InsertUser(user.clone())])
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => {
                    MarketplaceError::DuplicateUser(DuplicateField::Mobile)
                }
                other => storage_failure("register_user")(other),
            })?;

        info!(user_id = %user.id, role = user.role.label(), "user registered");
        Ok(user)
    }

    /// `identifier` is a mobile number or an e-mail address.
    pub fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<SessionGrant, MarketplaceError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(MarketplaceError::AuthFailure);
        }

        let Some(user) = self.repository.user_by_login(identifier)? else {
            warn!("login attempt for unknown account");
            return Err(MarketplaceError::AuthFailure);
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login attempt with wrong password");
            return Err(MarketplaceError::AuthFailure);
        }

        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.session_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.sessions()?.insert(
            token.clone(),
            Session {
                user_id: user.id.clone(),
                expires_at,
            },
        );

        info!(user_id = %user.id, "session issued");
        Ok(SessionGrant {
            token,
            expires_at,
            user,
        })
    }

    /// Resolves a bearer token into the caller context, reading the current
    /// role from the store so role changes apply to live sessions.
    pub fn resolve_session(&self, token: &str) -> Result<Caller, MarketplaceError> {
        let user_id = {
            let mut sessions = self.sessions()?;
            let live = sessions
                .get(token)
                .map(|session| (session.user_id.clone(), session.expires_at > Utc::now()));
            match live {
                Some((user_id, true)) => user_id,
                Some((_, false)) => {
                    sessions.remove(token);
                    return Err(MarketplaceError::Unauthorized);
                }
                None => return Err(MarketplaceError::Unauthorized),
            }
        };

        let user = self
            .repository
            .user(&user_id)?
            .ok_or(MarketplaceError::Unauthorized)?;
        Ok(Caller::from(&user))
    }

    /// Returns whether a session was actually revoked.
    pub fn end_session(&self, token: &str) -> Result<bool, MarketplaceError> {
        Ok(self.sessions()?.remove(token).is_some())
    }

    /// Looks up the caller's own record.
    pub fn current_user(&self, caller: &Caller) -> Result<User, MarketplaceError> {
        self.repository
            .user(&caller.user_id)?
            .ok_or(MarketplaceError::NotFound("user"))
    }

    fn sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, MarketplaceError> {
        self.sessions.lock().map_err(|_| {
            MarketplaceError::Database(RepositoryError::Unavailable(
                "session store poisoned".to_string(),
            ))
        })
    }
}
