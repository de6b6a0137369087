use std::{collections::BTreeSet, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    cipher::CredentialCipher,
    directory::{
        AuthError, DirectoryError, DirectorySession, Profile, ProfileDirectory, Relation,
    },
};

/// Passwords shorter than this are rejected before any network call.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("credentials could not be decrypted")]
    Decryption,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("two-factor authentication required")]
    TwoFactorRequired,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("unexpected error: {0}")]
    Unknown(String),

    #[error("profile load error: {0}")]
    ProfileLoad(String),

    #[error("cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Text shown to the user (the dispatcher prefixes it with `Error: `).
    pub fn user_message(&self) -> String {
        match self {
            ResolveError::Decryption => {
                "Something went wrong while handling your credentials. Please try again."
                    .to_string()
            }
            ResolveError::InvalidCredentials => {
                "Invalid username or password. Please try again.".to_string()
            }
            ResolveError::TwoFactorRequired => "Two-factor authentication is enabled on your \
account. Please disable 2FA and try again."
                .to_string(),
            ResolveError::Connection(_) => "Connection error. Please check your network.".to_string(),
            ResolveError::Unknown(m) => format!("An unexpected error occurred: {m}"),
            ResolveError::ProfileLoad(m) => format!("Error loading profile: {m}"),
            ResolveError::Cancelled => "The operation has been stopped.".to_string(),
        }
    }
}

impl From<AuthError> for ResolveError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TwoFactorRequired => ResolveError::TwoFactorRequired,
            AuthError::InvalidCredentials => ResolveError::InvalidCredentials,
            AuthError::Connection(m) => ResolveError::Connection(m),
            AuthError::Other(m) => ResolveError::Unknown(m),
        }
    }
}

/// Computes "followees minus followers" for one account.
pub struct NonFollowerResolver {
    directory: Arc<dyn ProfileDirectory>,
    cipher: Arc<CredentialCipher>,
}

impl NonFollowerResolver {
    pub fn new(directory: Arc<dyn ProfileDirectory>, cipher: Arc<CredentialCipher>) -> Self {
        Self { directory, cipher }
    }

    /// Log in as `username` and return the accounts it follows that do not
    /// follow it back, sorted.
    ///
    /// An empty set is a success. `cancel` is checked before every network
    /// step; once it fires the call returns [`ResolveError::Cancelled`].
    pub async fn resolve(
        &self,
        username: &str,
        encrypted_password: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>, ResolveError> {
        let password = self
            .cipher
            .decrypt(encrypted_password)
            .map_err(|_| ResolveError::Decryption)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ResolveError::InvalidCredentials);
        }

        ensure_live(cancel)?;
        let session = self.directory.login(username, &password).await?;
        drop(password);
        tracing::info!(username, "login successful");

        ensure_live(cancel)?;
        let profile = session
            .load_profile(username)
            .await
            .map_err(|e| ResolveError::ProfileLoad(e.to_string()))?;
        tracing::info!(username = %profile.username, "profile loaded");

        let followers = fetch_all(session.as_ref(), &profile, Relation::Followers, cancel).await?;
        let followees = fetch_all(session.as_ref(), &profile, Relation::Followees, cancel).await?;
        tracing::info!(
            username = %profile.username,
            followers = followers.len(),
            followees = followees.len(),
            "connections fetched"
        );

        Ok(followees.difference(&followers).cloned().collect())
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), ResolveError> {
    if cancel.is_cancelled() {
        return Err(ResolveError::Cancelled);
    }
    Ok(())
}

async fn fetch_all(
    session: &dyn DirectorySession,
    profile: &Profile,
    relation: Relation,
    cancel: &CancellationToken,
) -> Result<BTreeSet<String>, ResolveError> {
    let mut out = BTreeSet::new();
    let mut cursor: Option<String> = None;

    loop {
        ensure_live(cancel)?;
        let page = session
            .list_page(profile, relation, cursor.as_deref())
            .await
            .map_err(|e| match e {
                DirectoryError::Connection(m) => ResolveError::Connection(m),
                other => ResolveError::Unknown(other.to_string()),
            })?;
        out.extend(page.usernames);

        match page.next_cursor {
            None => return Ok(out),
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(ResolveError::Unknown(format!(
                    "{relation:?} pagination did not advance"
                )));
            }
            Some(next) => cursor = Some(next),
        }
    }
}
