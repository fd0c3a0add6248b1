//! User model, reduced to what polling needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Local user ID (also used as document ID)
    pub user_id: String,
    /// Display name
    pub display_name: String,
    /// Account enabled
    pub active: bool,
    /// Whether a remote-API credential is currently bound to this user
    pub source_account_linked: bool,
    /// When the credential was linked
    pub linked_at: Option<DateTime<Utc>>,
}

impl User {
    /// Users with a live credential binding take part in the scheduled sweep.
    pub fn is_eligible(&self) -> bool {
        self.active && self.source_account_linked
    }
}
