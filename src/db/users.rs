use chrono::NaiveDateTime;

use crate::db::models::{DbUser, Role};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;

const USER_COLUMNS: &str = "id, username, email, phone, password_hash, role, created_at";

/// A validated user ready to be written; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
}

impl InventoryStorage {
    pub async fn count_users(&self) -> Result<i64, InvenError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    /// Name the first field of `(username, email, phone)` already taken by another user.
    pub async fn conflicting_user_field(
        &self,
        username: &str,
        email: &str,
        phone: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<&'static str>, InvenError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            r#"SELECT username, email, phone FROM users
               WHERE (username = ? OR email = ? OR phone = ?) AND id != ?
               LIMIT 1"#,
        )
        .bind(username)
        .bind(email)
        .bind(phone)
        .bind(exclude_id.unwrap_or(-1))
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|(u, e, p)| {
            if u == username {
                "username"
            } else if e.eq_ignore_ascii_case(email) {
                "email"
            } else if p == phone {
                "phone"
            } else {
                "user"
            }
        }))
    }

    /// Insert a user and return its id. Uniqueness races surface as `Conflict`.
    pub async fn insert_user(&self, user: &NewUser, now: NaiveDateTime) -> Result<i64, InvenError> {
        let result = sqlx::query(
            r#"INSERT INTO users (username, email, phone, password_hash, role, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(InvenError::from);

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(e) if e.is_unique_violation() => Err(InvenError::Conflict(
                "username, email or phone already registered".to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Insert `user` only while the table is empty, in a single statement.
    /// `None` means another account got there first.
    pub async fn insert_first_user(
        &self,
        user: &NewUser,
        now: NaiveDateTime,
    ) -> Result<Option<i64>, InvenError> {
        let done = sqlx::query(
            r#"INSERT INTO users (username, email, phone, password_hash, role, created_at)
               SELECT ?, ?, ?, ?, ?, ?
               WHERE NOT EXISTS (SELECT 1 FROM users)"#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok((done.rows_affected() > 0).then(|| done.last_insert_rowid()))
    }

    pub async fn get_user(&self, id: i64) -> Result<DbUser, InvenError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, DbUser>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| InvenError::not_found(format!("user {id}")))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<DbUser>, InvenError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let user = sqlx::query_as::<_, DbUser>(&query)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<DbUser>, InvenError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let users = sqlx::query_as::<_, DbUser>(&query)
            .fetch_all(self.pool())
            .await?;
        Ok(users)
    }

    pub async fn update_user_credentials(
        &self,
        id: i64,
        username: &str,
        password_hash: &str,
    ) -> Result<(), InvenError> {
        let result = sqlx::query("UPDATE users SET username = ?, password_hash = ? WHERE id = ?")
            .bind(username)
            .bind(password_hash)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(InvenError::from);

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(InvenError::not_found(format!("user {id}"))),
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => {
                Err(InvenError::Conflict(format!("username '{username}' already taken")))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), InvenError> {
        let done = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(InvenError::not_found(format!("user {id}")));
        }
        Ok(())
    }

    /// Addresses of every Admin, recipients of low-stock notices.
    pub async fn admin_emails(&self) -> Result<Vec<String>, InvenError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT email FROM users WHERE role = ? AND email != '' ORDER BY id")
                .bind(Role::Admin)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(e,)| e).collect())
    }
}
