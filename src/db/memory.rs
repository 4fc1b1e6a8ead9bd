//! In-process account and history stores.
//!
//! Used when no database is configured and throughout the tests. Records are
//! kept in insertion order, so listings reverse the vectors for newest first.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    AuditRepository, DocumentRecord, NewDocumentRecord, NewPackRecord, PackRecord, StoreError,
    UserRepository,
};
use crate::auth::{NewUser, Role, User};

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.users.read().len() as i64)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(user.email));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            active: true,
            created_at: Utc::now(),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().iter().rev().cloned().collect())
    }

    async fn update(
        &self,
        id: Uuid,
        active: Option<bool>,
        role: Option<Role>,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(active) = active {
            user.active = active;
        }
        if let Some(role) = role {
            user.role = role;
        }
        Ok(user.clone())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditRepository {
    documents: RwLock<Vec<DocumentRecord>>,
    packs: RwLock<Vec<PackRecord>>,
}

impl MemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for MemoryAuditRepository {
    async fn record_document(&self, record: NewDocumentRecord) -> Result<DocumentRecord, StoreError> {
        let stored = DocumentRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            template_type: record.template_type,
            filename: record.filename,
            storage_path: record.storage_path,
            email_sent: record.email_sent,
            email_error: record.email_error,
            created_at: Utc::now(),
        };
        self.documents.write().push(stored.clone());
        Ok(stored)
    }

    async fn record_pack(&self, record: NewPackRecord) -> Result<PackRecord, StoreError> {
        let stored = PackRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            pack_id: record.pack_id,
            zip_name: record.zip_name,
            zip_path: record.zip_path,
            email_sent: record.email_sent,
            email_error: record.email_error,
            created_at: Utc::now(),
        };
        self.packs.write().push(stored.clone());
        Ok(stored)
    }

    async fn documents_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentRecord>, StoreError> {
        Ok(self
            .documents
            .read()
            .iter()
            .rev()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn packs_for_user(&self, user_id: Uuid) -> Result<Vec<PackRecord>, StoreError> {
        Ok(self
            .packs
            .read()
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn all_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        Ok(self.documents.read().iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = MemoryUserRepository::new();
        repo.create(new_user("a@example.com")).await.unwrap();
        let err = repo.create(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_list_newest_first_and_update() {
        let repo = MemoryUserRepository::new();
        let first = repo.create(new_user("a@example.com")).await.unwrap();
        repo.create(new_user("b@example.com")).await.unwrap();

        let emails: Vec<_> = repo.list().await.unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["b@example.com", "a@example.com"]);

        let updated = repo.update(first.id, Some(false), Some(Role::Admin)).await.unwrap();
        assert!(!updated.active);
        assert_eq!(updated.role, Role::Admin);

        let err = repo.update(Uuid::new_v4(), Some(true), None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_history_is_scoped_per_user() {
        let repo = MemoryAuditRepository::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for (user_id, name) in [(alice, "a1.docx"), (bob, "b1.docx"), (alice, "a2.docx")] {
            repo.record_document(NewDocumentRecord {
                user_id,
                template_type: "t".to_string(),
                filename: name.to_string(),
                storage_path: format!("/out/{}", name),
                email_sent: false,
                email_error: None,
            })
            .await
            .unwrap();
        }

        let mine: Vec<_> = repo
            .documents_for_user(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.filename)
            .collect();
        assert_eq!(mine, vec!["a2.docx", "a1.docx"]);
        assert_eq!(repo.all_documents().await.unwrap().len(), 3);
        assert!(repo.packs_for_user(alice).await.unwrap().is_empty());
    }
}
