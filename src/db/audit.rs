//! Generation history on Postgres

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AuditRepository, DocumentRecord, NewDocumentRecord, NewPackRecord, PackRecord, StoreError,
};

const DOCUMENT_COLUMNS: &str =
    "id, user_id, template_type, filename, storage_path, email_sent, email_error, created_at";
const PACK_COLUMNS: &str =
    "id, user_id, pack_id, zip_name, zip_path, email_sent, email_error, created_at";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    user_id: Uuid,
    template_type: String,
    filename: String,
    storage_path: String,
    email_sent: bool,
    email_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            template_type: row.template_type,
            filename: row.filename,
            storage_path: row.storage_path,
            email_sent: row.email_sent,
            email_error: row.email_error,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PackRow {
    id: Uuid,
    user_id: Uuid,
    pack_id: String,
    zip_name: String,
    zip_path: String,
    email_sent: bool,
    email_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PackRow> for PackRecord {
    fn from(row: PackRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            pack_id: row.pack_id,
            zip_name: row.zip_name,
            zip_path: row.zip_path,
            email_sent: row.email_sent,
            email_error: row.email_error,
            created_at: row.created_at,
        }
    }
}

pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn record_document(&self, record: NewDocumentRecord) -> Result<DocumentRecord, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            INSERT INTO documents (user_id, template_type, filename, storage_path, email_sent, email_error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(record.user_id)
        .bind(&record.template_type)
        .bind(&record.filename)
        .bind(&record.storage_path)
        .bind(record.email_sent)
        .bind(&record.email_error)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn record_pack(&self, record: NewPackRecord) -> Result<PackRecord, StoreError> {
        let row = sqlx::query_as::<_, PackRow>(&format!(
            r#"
            INSERT INTO generated_packs (user_id, pack_id, zip_name, zip_path, email_sent, email_error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PACK_COLUMNS
        ))
        .bind(record.user_id)
        .bind(&record.pack_id)
        .bind(&record.zip_name)
        .bind(&record.zip_path)
        .bind(record.email_sent)
        .bind(&record.email_error)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn documents_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE user_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn packs_for_user(&self, user_id: Uuid) -> Result<Vec<PackRecord>, StoreError> {
        let rows = sqlx::query_as::<_, PackRow>(&format!(
            "SELECT {} FROM generated_packs WHERE user_id = $1 ORDER BY created_at DESC",
            PACK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn all_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
