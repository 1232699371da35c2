use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::RepoError,
    employees::repo_types::{Employee, EmployeePatch, NewEmployee},
};

/// Plain CRUD over the employee collection. Lookups that miss return `None`.
#[async_trait]
pub trait EmployeeRepo: Send + Sync {
    async fn create(&self, new: NewEmployee) -> Result<Employee, RepoError>;
    async fn list(&self) -> Result<Vec<Employee>, RepoError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, RepoError>;
    async fn update_by_id(&self, id: Uuid, patch: EmployeePatch)
        -> Result<Option<Employee>, RepoError>;
    async fn delete_by_id(&self, id: Uuid) -> Result<Option<Employee>, RepoError>;
    async fn set_image(&self, id: Uuid, image: &str) -> Result<Option<Employee>, RepoError>;
}

#[derive(Clone)]
pub struct PgEmployeeRepo {
    db: PgPool,
}

impl PgEmployeeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EmployeeRepo for PgEmployeeRepo {
    async fn create(&self, new: NewEmployee) -> Result<Employee, RepoError> {
        let row = sqlx::query_as::<_, Employee>(
            r#"
            INSERT INTO employees (name, position)
            VALUES ($1, $2)
            RETURNING id, name, position, image
            "#,
        )
        .bind(&new.name)
        .bind(&new.position)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Employee>, RepoError> {
        let rows = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, name, position, image
            FROM employees
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, RepoError> {
        let row = sqlx::query_as::<_, Employee>(
            r#"SELECT id, name, position, image FROM employees WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        patch: EmployeePatch,
    ) -> Result<Option<Employee>, RepoError> {
        let row = sqlx::query_as::<_, Employee>(
            r#"
            UPDATE employees
               SET name = COALESCE($2, name),
                   position = COALESCE($3, position)
             WHERE id = $1
         RETURNING id, name, position, image
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.position)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<Option<Employee>, RepoError> {
        let row = sqlx::query_as::<_, Employee>(
            r#"DELETE FROM employees WHERE id = $1 RETURNING id, name, position, image"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn set_image(&self, id: Uuid, image: &str) -> Result<Option<Employee>, RepoError> {
        let row = sqlx::query_as::<_, Employee>(
            r#"
            UPDATE employees SET image = $2
             WHERE id = $1
         RETURNING id, name, position, image
            "#,
        )
        .bind(id)
        .bind(image)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use super::*;

    /// Insertion ordered, like the `created_at` ordering of the Postgres repo.
    #[derive(Default)]
    pub struct MemoryEmployeeRepo {
        rows: Mutex<Vec<Employee>>,
    }

    #[async_trait]
    impl EmployeeRepo for MemoryEmployeeRepo {
        async fn create(&self, new: NewEmployee) -> Result<Employee, RepoError> {
            let row = Employee {
                id: Uuid::new_v4(),
                name: new.name,
                position: new.position,
                image: None,
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn list(&self) -> Result<Vec<Employee>, RepoError> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, RepoError> {
            Ok(self.rows.lock().unwrap().iter().find(|e| e.id == id).cloned())
        }

        async fn update_by_id(
            &self,
            id: Uuid,
            patch: EmployeePatch,
        ) -> Result<Option<Employee>, RepoError> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.iter_mut().find(|e| e.id == id) else {
                return Ok(None);
            };
            if let Some(name) = patch.name {
                row.name = name;
            }
            if let Some(position) = patch.position {
                row.position = position;
            }
            Ok(Some(row.clone()))
        }

        async fn delete_by_id(&self, id: Uuid) -> Result<Option<Employee>, RepoError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .position(|e| e.id == id)
                .map(|idx| rows.remove(idx)))
        }

        async fn set_image(&self, id: Uuid, image: &str) -> Result<Option<Employee>, RepoError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.iter_mut().find(|e| e.id == id).map(|row| {
                row.image = Some(image.to_string());
                row.clone()
            }))
        }
    }

    #[tokio::test]
    async fn patch_keeps_unset_fields() {
        let repo = MemoryEmployeeRepo::default();
        let bob = repo
            .create(NewEmployee {
                name: "Bob".into(),
                position: "Eng".into(),
            })
            .await
            .unwrap();
        let patch = EmployeePatch {
            position: Some("Senior Eng".into()),
            ..Default::default()
        };
        let updated = repo.update_by_id(bob.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.name, "Bob");
        assert_eq!(updated.position, "Senior Eng");
    }

    #[tokio::test]
    async fn misses_are_none() {
        let repo = MemoryEmployeeRepo::default();
        let id = Uuid::new_v4();
        assert!(repo.find_by_id(id).await.unwrap().is_none());
        assert!(repo.delete_by_id(id).await.unwrap().is_none());
        assert!(repo.set_image(id, "x").await.unwrap().is_none());
    }
}
