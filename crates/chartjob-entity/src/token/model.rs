//! Export access token model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A short-lived credential letting an export worker read one chart on
/// behalf of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExportToken {
    /// The opaque token value.
    pub token: String,
    /// Chart the token grants access to.
    pub chart_id: String,
    /// User the token acts for.
    pub user_id: i64,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
}
