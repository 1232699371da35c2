use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{employees::repo_types::Employee, error::AppError, state::AppState};

/// One file taken from a multipart request.
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: String,
}

/// Persists the blob, then points the employee's `image` at it.
///
/// The record is only touched after the backend confirmed the write. If the
/// employee is gone by then the blob stays behind in the backend.
pub async fn upload_and_link_image(
    st: &AppState,
    employee_id: Uuid,
    item: UploadItem,
) -> Result<(Employee, String), AppError> {
    let url = st
        .storage
        .store(item.body, &item.content_type, &item.file_name)
        .await
        .map_err(AppError::UploadFailed)?;

    match st.employees.set_image(employee_id, &url).await? {
        Some(employee) => {
            info!(%employee_id, backend = st.storage.backend(), url = %url, "image linked");
            Ok((employee, url))
        }
        None => {
            warn!(%employee_id, url = %url, "employee vanished after upload; blob orphaned");
            Err(AppError::NotFound("Employee not found".into()))
        }
    }
}

#[cfg(test)]
mod image_tests {
    use std::sync::Arc;

    use super::*;
    use crate::{employees::repo_types::NewEmployee, storage::fake::FakeBlobStore};

    fn item() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"png-bytes"),
            content_type: "image/png".into(),
            file_name: "face.png".into(),
        }
    }

    #[tokio::test]
    async fn upload_sets_image_on_employee() {
        let storage = Arc::new(FakeBlobStore::default());
        let st = AppState::fake_with_storage(storage.clone());
        let bob = st
            .employees
            .create(NewEmployee {
                name: "Bob".into(),
                position: "Eng".into(),
            })
            .await
            .unwrap();

        let (employee, url) = upload_and_link_image(&st, bob.id, item()).await.unwrap();

        assert_eq!(employee.image.as_deref(), Some(url.as_str()));
        let stored = st.employees.find_by_id(bob.id).await.unwrap().unwrap();
        assert_eq!(stored.image, Some(url));
        let calls = storage.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].content_type, "image/png");
        assert_eq!(calls[0].len, 9);
    }

    #[tokio::test]
    async fn upload_for_missing_employee_orphans_blob() {
        let storage = Arc::new(FakeBlobStore::default());
        let st = AppState::fake_with_storage(storage.clone());

        let err = upload_and_link_image(&st, Uuid::new_v4(), item())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(storage.calls().len(), 1, "blob was persisted before the lookup");
    }

    #[tokio::test]
    async fn backend_failure_leaves_record_untouched() {
        let st = AppState::fake_with_storage(Arc::new(FakeBlobStore::failing()));
        let bob = st
            .employees
            .create(NewEmployee {
                name: "Bob".into(),
                position: "Eng".into(),
            })
            .await
            .unwrap();

        let err = upload_and_link_image(&st, bob.id, item()).await.unwrap_err();

        assert!(matches!(err, AppError::UploadFailed(_)));
        let stored = st.employees.find_by_id(bob.id).await.unwrap().unwrap();
        assert!(stored.image.is_none());
    }
}
