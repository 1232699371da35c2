use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>, // locator of the uploaded blob
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub name: String,
    pub position: String,
}

/// Fields a PUT may change. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub position: Option<String>,
}
