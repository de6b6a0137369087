//! Port for the social platform that owns the follower graph.

use async_trait::async_trait;

/// Login failures, classified so each one maps to its own user-facing reply.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("two-factor authentication required")]
    TwoFactorRequired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

/// Failures after a successful login.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub username: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Accounts that follow the profile.
    Followers,
    /// Accounts the profile follows.
    Followees,
}

/// One page of a follower/followee listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionPage {
    pub usernames: Vec<String>,
    /// `None` when this was the last page.
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Authenticate and return a session bound to that login.
    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn DirectorySession>, AuthError>;
}

#[async_trait]
pub trait DirectorySession: Send + Sync {
    async fn load_profile(&self, username: &str) -> Result<Profile, DirectoryError>;

    /// Fetch one page; pass the previous page's `next_cursor` to continue.
    async fn list_page(
        &self,
        profile: &Profile,
        relation: Relation,
        cursor: Option<&str>,
    ) -> Result<ConnectionPage, DirectoryError>;
}
