use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    employees::{
        dto::{CreateEmployeeRequest, Envelope, UpdateEmployeeRequest, UploadedImage},
        repo_types::{Employee, EmployeePatch, NewEmployee},
    },
    error::AppError,
    images::{upload_and_link_image, UploadItem},
    state::AppState,
    validation::{optional, required},
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn crud_routes() -> Router<AppState> {
    Router::new()
        .route("/employees", post(create_employee).get(list_employees))
        .route(
            "/employees/:id",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/employees/:id/upload", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Ids that are not UUIDs cannot name a record.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| not_found())
}

fn not_found() -> AppError {
    AppError::NotFound("Employee not found".into())
}

/// Body limit hits surface as stream errors; keep their 413.
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Image exceeds the 10 MiB upload limit".into())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

#[instrument(skip(state, payload))]
pub async fn create_employee(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateEmployeeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Employee>>), AppError> {
    let Json(payload) = payload?;
    let new = NewEmployee {
        name: required(payload.name, "name")?,
        position: required(payload.position, "position")?,
    };

    let employee = state.employees.create(new).await?;

    info!(%user_id, employee_id = %employee.id, "employee created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            message: "Employee created",
            data: employee,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_employees(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Envelope<Vec<Employee>>>, AppError> {
    let employees = state.employees.list().await?;
    Ok(Json(Envelope {
        message: "Employees fetched",
        data: employees,
    }))
}

#[instrument(skip(state))]
pub async fn get_employee(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Employee>>, AppError> {
    let id = parse_id(&id)?;
    let employee = state.employees.find_by_id(id).await?.ok_or_else(not_found)?;
    Ok(Json(Envelope {
        message: "Employee fetched",
        data: employee,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_employee(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateEmployeeRequest>, JsonRejection>,
) -> Result<Json<Envelope<Employee>>, AppError> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let patch = EmployeePatch {
        name: optional(payload.name, "name")?,
        position: optional(payload.position, "position")?,
    };

    let employee = state
        .employees
        .update_by_id(id, patch)
        .await?
        .ok_or_else(not_found)?;

    info!(%user_id, employee_id = %employee.id, "employee updated");
    Ok(Json(Envelope {
        message: "Employee updated",
        data: employee,
    }))
}

#[instrument(skip(state))]
pub async fn delete_employee(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Employee>>, AppError> {
    let id = parse_id(&id)?;
    let employee = state.employees.delete_by_id(id).await?.ok_or_else(not_found)?;

    info!(%user_id, employee_id = %employee.id, "employee deleted");
    Ok(Json(Envelope {
        message: "Employee deleted",
        data: employee,
    }))
}

/// POST /employees/:id/upload (multipart, file field `image`)
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<UploadedImage>>, AppError> {
    let id = parse_id(&id)?;
    let no_file = || AppError::BadRequest("No image file uploaded".into());
    let mut mp = mp.map_err(|_| no_file())?;

    let mut file: Option<UploadItem> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        // Only a file part named `image` counts; plain form values do not.
        let file_name = match (field.name(), field.file_name()) {
            (Some("image"), Some(file_name)) => file_name.to_string(),
            _ => continue,
        };
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        if !body.is_empty() {
            file = Some(UploadItem {
                body,
                content_type,
                file_name,
            });
            break;
        }
    }
    let file = file.ok_or_else(no_file)?;

    let (employee, image_url) = upload_and_link_image(&state, id, file).await?;

    info!(%user_id, employee_id = %employee.id, "employee image uploaded");
    Ok(Json(Envelope {
        message: "Image uploaded",
        data: UploadedImage {
            id: employee.id,
            name: employee.name,
            position: employee.position,
            image_url,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_uuid_ids_are_not_found() {
        assert!(matches!(parse_id("42"), Err(AppError::NotFound(_))));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn upload_reply_uses_image_url_key() {
        let json = serde_json::to_value(UploadedImage {
            id: Uuid::nil(),
            name: "Bob".into(),
            position: "Eng".into(),
            image_url: "http://h/uploads/a.png".into(),
        })
        .unwrap();
        assert_eq!(json["imageUrl"], "http://h/uploads/a.png");
    }
}
