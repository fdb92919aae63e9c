use nw_core::{Error, Result, User, UserStore};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invitation {
    /// A new account was created; the token must be handed to the user
    Created(User),
    /// The email already had an account, which is now unblocked
    Reactivated(User),
}

fn require_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::Validation("Email is required".to_string()));
    }
    if !email.contains('@') {
        return Err(Error::Validation(format!("Invalid email address: {}", email)));
    }
    Ok(email)
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn invite(&self, email: &str) -> Result<Invitation> {
        let email = require_email(email)?;
        if let Some(mut existing) = self.users.find_by_email(email).await? {
            self.users.set_blocked(email, false).await?;
            existing.blocked = false;
            info!(email, "account reactivated");
            return Ok(Invitation::Reactivated(existing));
        }
        let user = self.users.create_user(email, Some(email)).await?;
        info!(email, user = user.id, "account created");
        Ok(Invitation::Created(user))
    }

    pub async fn block(&self, email: &str) -> Result<()> {
        self.set_blocked(email, true).await
    }

    pub async fn unblock(&self, email: &str) -> Result<()> {
        self.set_blocked(email, false).await
    }

    async fn set_blocked(&self, email: &str, blocked: bool) -> Result<()> {
        let email = require_email(email)?;
        if !self.users.set_blocked(email, blocked).await? {
            return Err(Error::NotFound(format!("No account for {}", email)));
        }
        info!(email, blocked, "account status changed");
        Ok(())
    }

    /// Resolve an API token to an active user
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let user = self
            .users
            .find_by_token(token)
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid token.".to_string()))?;
        if user.blocked {
            return Err(Error::Forbidden("User account is blocked.".to_string()));
        }
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.users.list_users().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nw_storage::InMemoryStorage;

    fn service() -> AccountService {
        AccountService::new(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_invite_creates_then_reactivates() {
        let accounts = service();
        let created = match accounts.invite("dana@example.com").await.unwrap() {
            Invitation::Created(user) => user,
            other => panic!("expected a new account, got {:?}", other),
        };
        assert_eq!(created.email.as_deref(), Some("dana@example.com"));

        accounts.block("dana@example.com").await.unwrap();
        assert!(matches!(accounts.authenticate(&created.token).await, Err(Error::Forbidden(_))));

        match accounts.invite("dana@example.com").await.unwrap() {
            Invitation::Reactivated(user) => {
                assert_eq!(user.id, created.id);
                assert!(!user.blocked);
            }
            other => panic!("expected reactivation, got {:?}", other),
        }
        assert_eq!(accounts.authenticate(&created.token).await.unwrap().id, created.id);
        assert_eq!(accounts.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invite_requires_email() {
        let accounts = service();
        assert!(matches!(accounts.invite("").await, Err(Error::Validation(_))));
        assert!(matches!(accounts.invite("not-an-email").await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_block_unknown_email() {
        let accounts = service();
        assert!(matches!(accounts.block("ghost@example.com").await, Err(Error::NotFound(_))));
        assert!(matches!(accounts.unblock("ghost@example.com").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let accounts = service();
        assert!(matches!(accounts.authenticate("nope").await, Err(Error::Unauthorized(_))));
    }
}
