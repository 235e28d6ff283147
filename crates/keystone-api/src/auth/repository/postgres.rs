use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_core::{
    Account, AccountRepository, AccountUpdate, DatabaseConfig, IdentityField, NewAccount,
    RepositoryError, Role,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, created_at, updated_at";

/// Account row as stored in PostgreSQL
#[derive(Debug, Clone, sqlx::FromRow)]
struct AccountRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRecord> for Account {
    type Error = RepositoryError;

    fn try_from(record: AccountRecord) -> Result<Self, Self::Error> {
        let role = record
            .role
            .parse::<Role>()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(Account {
            id: record.id,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            role,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn into_account(record: Option<AccountRecord>) -> Result<Option<Account>, RepositoryError> {
    record.map(Account::try_from).transpose()
}

/// Map driver errors, turning unique violations into identity conflicts
fn map_db_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("accounts_username_unique") => IdentityField::Username,
                _ => IdentityField::Email,
            };
            return RepositoryError::Conflict(field);
        }
    }
    RepositoryError::Database(err.to_string())
}

/// PostgreSQL-backed account repository
#[derive(Debug, Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool for the configured database
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url)
            .await
            .map_err(map_db_error)?;

        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Migration failed: {e}")))
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        // An email match wins over a username match on another row
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1 OR username = $2 \
             ORDER BY (email = $1) DESC LIMIT 1"
        );

        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(email)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_account(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");

        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_account(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");

        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_account(record)
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let query = format!(
            "INSERT INTO accounts (id, username, email, password_hash, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(account.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        Account::try_from(record)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: AccountUpdate,
    ) -> Result<Option<Account>, RepositoryError> {
        let query = format!(
            "UPDATE accounts SET \
                username = COALESCE($2, username), \
                email = COALESCE($3, email), \
                role = COALESCE($4, role), \
                is_active = COALESCE($5, is_active), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(id)
            .bind(update.username)
            .bind(update.email)
            .bind(update.role.map(|r| r.as_str()))
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_account(record)
    }

    async fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at, id");

        sqlx::query_as::<_, AccountRecord>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_role(&self, role: Role) -> Result<u64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(count.max(0) as u64)
    }
}
