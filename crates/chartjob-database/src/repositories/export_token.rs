//! Export access token repository.

use sqlx::PgPool;
use uuid::Uuid;

use chartjob_core::error::{AppError, ErrorKind};
use chartjob_core::result::AppResult;
use chartjob_entity::token::ExportToken;

/// Repository for the `export_tokens` table.
#[derive(Debug, Clone)]
pub struct ExportTokenRepository {
    pool: PgPool,
}

impl ExportTokenRepository {
    /// Create a new export token repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issue a new token for a chart and user.
    pub async fn create(&self, chart_id: &str, user_id: i64) -> AppResult<ExportToken> {
        let token = generate_token();
        sqlx::query_as::<_, ExportToken>(
            "INSERT INTO export_tokens (token, chart_id, user_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&token)
        .bind(chart_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create export token", e)
        })
    }

    /// Hard-delete a token. Returns whether a row was removed.
    pub async fn destroy(&self, token: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM export_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete export token", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}

/// 64 hex characters of randomness.
pub(crate) fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
