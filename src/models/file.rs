use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::utils::format::{DisplaySize, SizeFormatter};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    /// Blob store location, internal only.
    #[serde(skip_serializing)]
    pub file_path: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub size: i64,
}

/// A file as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    #[schema(value_type = f64)]
    pub size: DisplaySize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileView {
    pub fn new(record: &FileRecord, formatter: SizeFormatter) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            file_name: record.file_name.clone(),
            size: formatter.format(record.size),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Raw pagination parameters; unparsable values fall back to the defaults.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    #[param(value_type = Option<i64>)]
    pub page: Option<String>,
    #[param(value_type = Option<i64>)]
    pub page_size: Option<String>,
}

impl ListQuery {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    pub fn page(&self) -> i64 {
        match self.page.as_deref().and_then(|p| p.trim().parse::<i64>().ok()) {
            Some(page) if page >= 1 => page,
            _ => 1,
        }
    }

    pub fn page_size(&self) -> i64 {
        match self.page_size.as_deref().and_then(|p| p.trim().parse::<i64>().ok()) {
            Some(size) if (1..=Self::MAX_PAGE_SIZE).contains(&size) => size,
            _ => Self::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(total_items: i64, current_page: i64, page_size: i64) -> Self {
        let total_pages = (total_items + page_size - 1) / page_size;
        Self {
            total_items,
            total_pages,
            current_page,
            page_size,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub file: FileView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    pub file: FileView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileView>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Multipart body accepted by the upload endpoint.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults_and_bounds() {
        let query = ListQuery::default();
        assert_eq!((query.page(), query.page_size()), (1, 10));

        let query = ListQuery { page: Some("0".into()), page_size: Some("101".into()) };
        assert_eq!((query.page(), query.page_size()), (1, 10));

        let query = ListQuery { page: Some("abc".into()), page_size: Some("-5".into()) };
        assert_eq!((query.page(), query.page_size()), (1, 10));

        let query = ListQuery { page: Some("3".into()), page_size: Some("25".into()) };
        assert_eq!((query.page(), query.page_size()), (3, 25));
    }

    #[test]
    fn test_pagination_metadata() {
        let pagination = Pagination::new(25, 2, 10);
        assert_eq!(pagination.total_pages, 3);
        assert!(pagination.has_next);
        assert!(pagination.has_prev);

        let empty = Pagination::new(0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn test_file_path_is_never_serialized() {
        let record = FileRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            file_name: "report.pdf".to_string(),
            file_path: "alice/report.pdf".to_string(),
            size: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("file_path").is_none());
        assert_eq!(json["file_name"], "report.pdf");
    }
}
