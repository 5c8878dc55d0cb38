use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::Json;
use model::entities::{course, course_student, sale, sale_detail, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{hash_password, AuthUser};
use crate::error::{ApiError, FieldErrors};
use crate::schemas::{AppState, MessageResponse};

/// Storage namespace for uploaded profile images
const AVATAR_NAMESPACE: &str = "users";

/// Upper bound for uploaded profile images (2048 KB)
const MAX_IMAGE_BYTES: usize = 2048 * 1024;

/// Wire format for `created_at` timestamps
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Public profile fields of the authenticated user
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileUserData {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub profession: String,
    pub description: String,
    /// Absolute URL of the stored avatar, if any
    pub avatar: Option<String>,
}

/// Course summary nested inside enrollment and sale entries
#[derive(Debug, Serialize, ToSchema)]
pub struct CourseSummary {
    pub id: i32,
    pub title: String,
    /// Absolute URL of the course cover image, if any
    pub image: Option<String>,
    pub count_class: Option<i32>,
}

/// One enrollment together with its computed progress
#[derive(Debug, Serialize, ToSchema)]
pub struct EnrolledCourseData {
    pub id: i32,
    /// Ids of the classes the student marked complete
    pub clases_checkeds: Vec<String>,
    /// Completion percentage, rounded to two decimals
    pub percentage: f64,
    pub course: Option<CourseSummary>,
}

/// One purchased line item
#[derive(Debug, Serialize, ToSchema)]
pub struct SaleDetailData {
    pub id: i32,
    pub review: Option<String>,
    pub course: Option<CourseSummary>,
    pub created_at: String,
}

/// One purchase transaction
#[derive(Debug, Serialize, ToSchema)]
pub struct SaleData {
    pub id: i32,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub created_at: String,
}

/// Aggregated profile payload for the authenticated student
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: ProfileUserData,
    pub enrolled_course_count: u64,
    pub active_course_count: u64,
    pub termined_course_count: u64,
    pub enrolled_courses: Vec<EnrolledCourseData>,
    pub active_courses: Vec<EnrolledCourseData>,
    pub termined_courses: Vec<EnrolledCourseData>,
    pub sale_details: Vec<SaleDetailData>,
    pub sales: Vec<SaleData>,
}

/// Build the public URL for a file stored under the blob store root.
fn storage_url(base_url: &str, relative: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}storage/{relative}")
    } else {
        format!("{base_url}/storage/{relative}")
    }
}

/// Split a comma-separated checked-class list. Null and empty both mean
/// "nothing checked yet".
fn split_checked_classes(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(value) if !value.is_empty() => value.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Completion percentage rounded to two decimals.
///
/// A course without a class count yields exactly 0. Checked counts above
/// the expected total are reported as-is, above 100.
fn completion_percentage(checked_count: usize, count_class: Option<i32>) -> f64 {
    let total = count_class.unwrap_or(0);
    if total <= 0 {
        return 0.0;
    }
    let ratio = checked_count as f64 / total as f64;
    (ratio * 100.0 * 100.0).round() / 100.0
}

fn format_user_data(user: &user::Model, base_url: &str) -> ProfileUserData {
    ProfileUserData {
        name: user.name.clone(),
        surname: user.surname.clone().unwrap_or_default(),
        email: user.email.clone(),
        phone: user.phone.clone().unwrap_or_default(),
        profession: user.profession.clone().unwrap_or_default(),
        description: user.description.clone().unwrap_or_default(),
        avatar: user
            .avatar
            .as_deref()
            .map(|path| storage_url(base_url, path)),
    }
}

fn format_course_summary(course: &course::Model, base_url: &str) -> CourseSummary {
    CourseSummary {
        id: course.id,
        title: course.title.clone(),
        image: course
            .image
            .as_deref()
            .map(|path| storage_url(base_url, path)),
        count_class: course.count_class,
    }
}

fn format_courses(
    rows: &[(course_student::Model, Option<course::Model>)],
    base_url: &str,
) -> Vec<EnrolledCourseData> {
    rows.iter()
        .map(|(enrollment, course)| {
            let clases_checkeds = split_checked_classes(enrollment.clases_checkeds.as_deref());
            let percentage = completion_percentage(
                clases_checkeds.len(),
                course.as_ref().and_then(|c| c.count_class),
            );
            EnrolledCourseData {
                id: enrollment.id,
                clases_checkeds,
                percentage,
                course: course.as_ref().map(|c| format_course_summary(c, base_url)),
            }
        })
        .collect()
}

fn format_sale_details(
    rows: &[(sale_detail::Model, Option<course::Model>)],
    base_url: &str,
) -> Vec<SaleDetailData> {
    rows.iter()
        .map(|(detail, course)| SaleDetailData {
            id: detail.id,
            review: detail.review.clone(),
            course: course.as_ref().map(|c| format_course_summary(c, base_url)),
            created_at: detail.created_at.format(TIMESTAMP_FORMAT).to_string(),
        })
        .collect()
}

fn format_sales(rows: &[sale::Model]) -> Vec<SaleData> {
    rows.iter()
        .map(|sale| SaleData {
            id: sale.id,
            total: sale.total,
            created_at: sale.created_at.format(TIMESTAMP_FORMAT).to_string(),
        })
        .collect()
}

/// Get the authenticated student's profile summary
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ProfileResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    trace!("Entering profile function");

    let user = user::Entity::find_by_id(auth.id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    debug!("Assembling profile for user {}", user.id);

    let by_user = course_student::Column::UserId.eq(user.id);
    let active = Condition::all()
        .add(course_student::Column::ClasesCheckeds.is_not_null())
        .add(course_student::Column::ClasesCheckeds.ne(""));
    let terminated = course_student::Column::State.eq(course_student::STATE_TERMINATED);

    let enrolled_course_count = course_student::Entity::find()
        .filter(by_user.clone())
        .count(&state.db)
        .await?;
    let active_course_count = course_student::Entity::find()
        .filter(by_user.clone())
        .filter(active.clone())
        .count(&state.db)
        .await?;
    let termined_course_count = course_student::Entity::find()
        .filter(by_user.clone())
        .filter(terminated.clone())
        .count(&state.db)
        .await?;

    let enrolled_courses = course_student::Entity::find()
        .filter(by_user.clone())
        .find_also_related(course::Entity)
        .all(&state.db)
        .await?;
    let active_courses = course_student::Entity::find()
        .filter(by_user.clone())
        .filter(active)
        .find_also_related(course::Entity)
        .all(&state.db)
        .await?;
    let termined_courses = course_student::Entity::find()
        .filter(by_user)
        .filter(terminated)
        .find_also_related(course::Entity)
        .all(&state.db)
        .await?;

    let sale_details = sale_detail::Entity::find()
        .join(JoinType::InnerJoin, sale_detail::Relation::Sale.def())
        .filter(sale::Column::UserId.eq(user.id))
        .order_by_desc(sale_detail::Column::Id)
        .find_also_related(course::Entity)
        .all(&state.db)
        .await?;

    let sales = sale::Entity::find()
        .filter(sale::Column::UserId.eq(user.id))
        .order_by_desc(sale::Column::Id)
        .all(&state.db)
        .await?;

    let base_url = state.config.app_url.as_str();
    info!(
        "Profile assembled for user {}: {} enrollments, {} sales",
        user.id,
        enrolled_course_count,
        sales.len()
    );

    Ok(Json(ProfileResponse {
        user: format_user_data(&user, base_url),
        enrolled_course_count,
        active_course_count,
        termined_course_count,
        enrolled_courses: format_courses(&enrolled_courses, base_url),
        active_courses: format_courses(&active_courses, base_url),
        termined_courses: format_courses(&termined_courses, base_url),
        sale_details: format_sale_details(&sale_details, base_url),
        sales: format_sales(&sales),
    }))
}

/// Optional profile fields accepted by the update endpoint. Absent
/// fields leave the stored value unchanged.
#[derive(Debug, Default, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 255, message = "The name may not be greater than 255 characters."))]
    pub name: Option<String>,
    #[validate(length(
        max = 255,
        message = "The surname may not be greater than 255 characters."
    ))]
    pub surname: Option<String>,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: Option<String>,
    #[validate(length(max = 20, message = "The phone may not be greater than 20 characters."))]
    pub phone: Option<String>,
    #[validate(length(
        max = 255,
        message = "The profession may not be greater than 255 characters."
    ))]
    pub profession: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 6, message = "The new password must be at least 6 characters."))]
    pub new_password: Option<String>,
}

/// Image file received through a multipart update
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Update payload accepted as either JSON or multipart form data. The
/// image field is only reachable through multipart.
#[derive(Debug, Default)]
pub struct UpdateProfilePayload {
    pub fields: UpdateProfileRequest,
    pub image: Option<UploadedImage>,
}

impl UpdateProfilePayload {
    fn set_text_field(&mut self, name: &str, value: String) {
        let fields = &mut self.fields;
        match name {
            "name" => fields.name = Some(value),
            "surname" => fields.surname = Some(value),
            "email" => fields.email = Some(value),
            "phone" => fields.phone = Some(value),
            "profession" => fields.profession = Some(value),
            "description" => fields.description = Some(value),
            "new_password" => fields.new_password = Some(value),
            _ => trace!("Ignoring unknown form field {}", name),
        }
    }
}

#[async_trait]
impl FromRequest<AppState> for UpdateProfilePayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|_| ApiError::validation("body", "The request body could not be parsed."))?;

            let mut payload = UpdateProfilePayload::default();
            while let Some(field) = multipart.next_field().await.map_err(|_| {
                ApiError::validation("body", "The request body could not be parsed.")
            })? {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                if name == "image" {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(|_| {
                        ApiError::validation("image", "The image could not be read.")
                    })?;
                    payload.image = Some(UploadedImage {
                        content_type,
                        data: data.to_vec(),
                    });
                } else {
                    let value = field.text().await.map_err(|_| {
                        ApiError::validation("body", "The request body could not be parsed.")
                    })?;
                    payload.set_text_field(&name, value);
                }
            }
            Ok(payload)
        } else {
            let Json(fields) = Json::<UpdateProfileRequest>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::validation("body", &rejection.body_text()))?;
            Ok(UpdateProfilePayload {
                fields,
                image: None,
            })
        }
    }
}

/// Map an accepted image content type to the stored file extension.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Run every present field against its constraint. Returns an empty map
/// when the payload is acceptable.
fn collect_field_errors(request: &UpdateProfileRequest, image: Option<&UploadedImage>) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if let Err(validation) = request.validate() {
        for (field, field_errors) in validation.field_errors() {
            let messages = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("The {field} field is invalid."))
                })
                .collect();
            errors.insert(field.to_string(), messages);
        }
    }

    if let Some(image) = image {
        if image_extension(&image.content_type).is_none() {
            errors
                .entry("image".to_string())
                .or_default()
                .push("The image must be a file of type: jpeg, png, jpg, gif.".to_string());
        }
        if image.data.len() > MAX_IMAGE_BYTES {
            errors
                .entry("image".to_string())
                .or_default()
                .push("The image may not be greater than 2048 kilobytes.".to_string());
        }
    }

    errors
}

/// Apply a partial update to the authenticated student's profile
#[utoipa::path(
    put,
    path = "/update_client",
    tag = "profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated successfully", body = MessageResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::schemas::ErrorResponse),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn update_client(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: UpdateProfilePayload,
) -> Result<Json<MessageResponse>, ApiError> {
    trace!("Entering update_client function");

    let user = user::Entity::find_by_id(auth.id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let UpdateProfilePayload { fields, image } = payload;

    let mut errors = collect_field_errors(&fields, image.as_ref());

    // Email must stay unique among users, excluding the caller's own row
    if let Some(email) = fields.email.as_deref() {
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .filter(user::Column::Id.ne(user.id))
            .count(&state.db)
            .await?
            > 0;
        if taken {
            errors
                .entry("email".to_string())
                .or_default()
                .push("The email has already been taken.".to_string());
        }
    }

    if !errors.is_empty() {
        debug!(
            "Rejecting profile update for user {}: invalid fields {:?}",
            user.id,
            errors.keys().collect::<Vec<_>>()
        );
        return Err(ApiError::Validation(errors));
    }

    let previous_avatar = user.avatar.clone();
    let mut active: user::ActiveModel = user.into();

    if let Some(name) = fields.name {
        active.name = Set(name);
    }
    if let Some(surname) = fields.surname {
        active.surname = Set(Some(surname));
    }
    if let Some(email) = fields.email {
        active.email = Set(email);
    }
    if let Some(phone) = fields.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(profession) = fields.profession {
        active.profession = Set(Some(profession));
    }
    if let Some(description) = fields.description {
        active.description = Set(Some(description));
    }
    if let Some(new_password) = fields.new_password {
        active.password = Set(hash_password(&new_password)?);
    }

    if let Some(image) = image {
        // The old file goes away best-effort; a failed delete must not
        // block the update.
        if let Some(old) = previous_avatar {
            state.storage.delete(&old).await;
        }
        let extension = image_extension(&image.content_type).unwrap_or("jpg");
        let path = state
            .storage
            .put(AVATAR_NAMESPACE, extension, &image.data)
            .await?;
        active.avatar = Set(Some(path));
    }

    if active.is_changed() {
        active.update(&state.db).await?;
    }

    info!("Profile updated successfully for user {}", auth.id);
    Ok(Json(MessageResponse {
        message: "Profile updated successfully".to_string(),
        status: 200,
    }))
}
