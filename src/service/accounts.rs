use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::{Role, UserProfile};
use crate::db::sqlite::InventoryStorage;
use crate::db::users::NewUser;
use crate::error::InvenError;
use crate::service::passwords::{hash_secret, verify_secret};
use crate::service::sessions::{SessionStore, SessionUser};
use crate::service::validation::{
    validate_email, validate_password, validate_phone, validate_username,
};
use crate::types::local_now;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    storage: InventoryStorage,
    sessions: SessionStore,
}

impl AccountService {
    pub fn new(storage: InventoryStorage, sessions: SessionStore) -> Self {
        Self { storage, sessions }
    }

    /// Open self-registration. Only the very first account may be created this
    /// way, and it must be a Manager.
    pub async fn bootstrap(&self, req: RegisterRequest) -> Result<UserProfile, InvenError> {
        if self.storage.count_users().await? > 0 {
            return Err(registration_closed());
        }
        let role: Role = req.role.parse()?;
        if role != Role::Manager {
            return Err(InvenError::validation("role", "the first account must be a Manager"));
        }
        let user = self.new_user(req).await?;
        let Some(id) = self.storage.insert_first_user(&user, local_now()).await? else {
            return Err(registration_closed());
        };
        info!(user_id = id, username = %user.username, "first manager registered");
        Ok(self.storage.get_user(id).await?.into())
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile, InvenError> {
        let user = self.new_user(req).await?;
        let id = self.storage.insert_user(&user, local_now()).await?;
        info!(user_id = id, username = %user.username, role = %user.role, "user registered");
        Ok(self.storage.get_user(id).await?.into())
    }

    async fn new_user(&self, req: RegisterRequest) -> Result<NewUser, InvenError> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();
        let phone = req.phone.trim().to_string();
        let role: Role = req.role.parse()?;

        validate_username(&username)?;
        validate_email(&email)?;
        validate_phone(&phone)?;
        validate_password(&req.password)?;
        if req.password != req.confirm_password {
            return Err(InvenError::validation("confirm_password", "passwords do not match"));
        }

        if let Some(field) = self
            .storage
            .conflicting_user_field(&username, &email, &phone, None)
            .await?
        {
            return Err(InvenError::Conflict(format!("{field} is already registered")));
        }

        let password_hash = hash_secret(req.password).await?;
        Ok(NewUser {
            username,
            email,
            phone,
            password_hash,
            role,
        })
    }

    /// Unknown e-mail and wrong password fail identically.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, InvenError> {
        let email = req.email.trim();
        if email.is_empty() || req.password.is_empty() {
            return Err(InvenError::InvalidCredentials);
        }
        let Some(user) = self.storage.find_user_by_email(email).await? else {
            return Err(InvenError::InvalidCredentials);
        };
        if !verify_secret(req.password, user.password_hash.clone()).await? {
            return Err(InvenError::InvalidCredentials);
        }

        let token = self.sessions.create(SessionUser::from(&user)).await;
        info!(user_id = user.id, role = %user.role, "login");
        Ok(LoginResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token).await
    }

    pub async fn profile(&self, user_id: i64) -> Result<UserProfile, InvenError> {
        Ok(self.storage.get_user(user_id).await?.into())
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<UserProfile, InvenError> {
        let current = self.storage.get_user(user_id).await?;

        let username = match update.username.as_deref().map(str::trim) {
            Some(name) if name != current.username => {
                validate_username(name)?;
                if self
                    .storage
                    .conflicting_user_field(name, "", "", Some(user_id))
                    .await?
                    .is_some()
                {
                    return Err(InvenError::Conflict(format!("username '{name}' already taken")));
                }
                name.to_string()
            }
            _ => current.username.clone(),
        };

        let password_hash = match update.password {
            Some(password) => {
                validate_password(&password)?;
                if update.confirm_password.as_deref() != Some(password.as_str()) {
                    return Err(InvenError::validation("confirm_password", "passwords do not match"));
                }
                hash_secret(password).await?
            }
            None => current.password_hash.clone(),
        };

        self.storage
            .update_user_credentials(user_id, &username, &password_hash)
            .await?;
        if username != current.username {
            self.sessions.rename_user(user_id, &username).await;
        }
        info!(user_id, "profile updated");
        self.profile(user_id).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, InvenError> {
        Ok(self
            .storage
            .list_users()
            .await?
            .into_iter()
            .map(UserProfile::from)
            .collect())
    }

    /// Past sales stay on record with no cashier attached.
    pub async fn delete_user(&self, acting_user: i64, user_id: i64) -> Result<(), InvenError> {
        if acting_user == user_id {
            return Err(InvenError::NotAllowed(
                "you cannot delete your own account".to_string(),
            ));
        }
        self.storage.delete_user(user_id).await?;
        let dropped = self.sessions.revoke_user(user_id).await;
        info!(user_id, sessions_dropped = dropped, "user deleted");
        Ok(())
    }

    pub async fn admin_emails(&self) -> Result<Vec<String>, InvenError> {
        self.storage.admin_emails().await
    }
}

fn registration_closed() -> InvenError {
    InvenError::NotAllowed("registration is closed; ask a Manager to create your account".to_string())
}
