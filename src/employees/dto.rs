use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateEmployeeRequest {
    pub name: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    pub position: Option<String>,
}

/// `{ "message": ..., "data": ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: &'static str,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub id: Uuid,
    pub name: String,
    pub position: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}
