//! services/studio/src/web/rest.rs
//!
//! Contains the Axum handlers for the admin REST endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every mutation goes through the `Workspace`: it updates the in-memory
//! state, writes the local cache and schedules a debounced push. The
//! `.../save` endpoints push immediately and report the result.

use crate::sync::{summarize, EntityGroup, FailureKind, PushOutcome, WorkspaceError};
use crate::web::state::AppState;
use crate::web::{auth, public};
use arunika_core::domain::{
    Asset, AssetKind, Category, EditError, Module, ModuleKind, RemoteConfig, SocialLinks,
};
use arunika_core::ports::{PortError, Table};
use arunika_core::share::course_link;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        public::public_branding_handler,
        public::public_course_handler,
        list_courses_handler,
        create_course_handler,
        get_course_handler,
        update_course_handler,
        delete_course_handler,
        add_module_handler,
        update_module_handler,
        remove_module_handler,
        move_module_handler,
        add_asset_handler,
        remove_asset_handler,
        save_course_handler,
        share_course_handler,
        get_branding_handler,
        update_branding_handler,
        save_branding_handler,
        get_mentor_handler,
        update_mentor_handler,
        save_mentor_handler,
        get_remote_settings_handler,
        update_remote_settings_handler,
        import_link_handler,
        analytics_handler,
    ),
    components(
        schemas(
            auth::LoginRequest,
            auth::AuthResponse,
            CourseUpdate,
            ModuleInput,
            MoveModuleRequest,
            AssetInput,
            CategoryInput,
            BrandingUpdate,
            MentorUpdate,
            RemoteSettingsRequest,
            RemoteSettingsResponse,
            ImportLinkRequest,
            ImportLinkResponse,
            ShareLinkResponse,
            SaveResponse,
        )
    ),
    tags(
        (name = "Arunika Studio API", description = "Course authoring, publishing and sync endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    /// Ids from the branding category dictionary; unknown ids are dropped.
    pub category_ids: Option<Vec<String>>,
}

/// Fields of a module. On add, missing fields take the editor defaults.
#[derive(Deserialize, ToSchema, Default)]
pub struct ModuleInput {
    pub title: Option<String>,
    #[serde(rename = "type")]
    #[schema(value_type = Option<String>, example = "video")]
    pub kind: Option<ModuleKind>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
}

impl ModuleInput {
    fn apply(self, module: &mut Module) {
        if let Some(title) = self.title {
            module.title = title;
        }
        if let Some(kind) = self.kind {
            module.kind = kind;
        }
        if let Some(content) = self.content {
            module.content = content;
        }
        if let Some(description) = self.description {
            module.description = description;
        }
        if let Some(duration) = self.duration {
            module.duration = Some(duration);
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct MoveModuleRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetInput {
    pub name: String,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "link")]
    pub kind: AssetKind,
    /// A link, or a data URI for files.
    pub url: String,
    pub file_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CategoryInput {
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrandingUpdate {
    pub site_name: Option<String>,
    pub logo: Option<String>,
    pub categories: Option<Vec<CategoryInput>>,
}

#[derive(Deserialize, ToSchema)]
pub struct MentorUpdate {
    pub name: Option<String>,
    pub role: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub socials: Option<SocialLinks>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettingsRequest {
    pub endpoint_url: String,
    pub api_key: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettingsResponse {
    pub endpoint_url: String,
    pub api_key_set: bool,
    pub connected: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ImportLinkRequest {
    pub link: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportLinkResponse {
    pub course_id: String,
    pub adopted_credentials: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ShareLinkResponse {
    pub url: String,
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    /// `pushed`, `nothing_to_push` or `local_only`.
    pub status: String,
    pub rows: usize,
}

impl From<PushOutcome> for SaveResponse {
    fn from(outcome: PushOutcome) -> Self {
        let (status, rows) = match outcome {
            PushOutcome::Pushed(rows) => ("pushed", rows),
            PushOutcome::NothingToPush => ("nothing_to_push", 0),
            PushOutcome::LocalOnly => ("local_only", 0),
        };
        Self {
            status: status.to_string(),
            rows,
        }
    }
}

//=========================================================================================
// Error mapping
//=========================================================================================

/// Maps a workspace failure onto an HTTP status and an actionable message.
pub fn map_workspace_error(error: WorkspaceError) -> (StatusCode, String) {
    match error {
        WorkspaceError::NotConfigured => (StatusCode::PRECONDITION_FAILED, error.to_string()),
        WorkspaceError::CourseNotFound(_) => (StatusCode::NOT_FOUND, error.to_string()),
        WorkspaceError::Edit(EditError::OutOfRange(_)) => (StatusCode::BAD_REQUEST, error.to_string()),
        WorkspaceError::Edit(_) => (StatusCode::NOT_FOUND, error.to_string()),
        WorkspaceError::ShareLink(_) => (StatusCode::BAD_REQUEST, error.to_string()),
        WorkspaceError::Remote(e) => map_port_error(&e),
    }
}

fn map_port_error(error: &PortError) -> (StatusCode, String) {
    let kind = FailureKind::of(error);
    let status = match kind {
        FailureKind::SchemaOutdated => StatusCode::CONFLICT,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::Generic => StatusCode::BAD_GATEWAY,
    };
    error!("Remote store request failed: {}", error);
    (status, format!("{} ({})", kind.advice(), error))
}

fn course_not_found(id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Course {id} not found"))
}

//=========================================================================================
// Course Handlers
//=========================================================================================

/// List all courses in display order.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "The course list"), (status = 401, description = "Not logged in"))
)]
pub async fn list_courses_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.workspace.courses().await)
}

/// Add a course with editor defaults.
#[utoipa::path(
    post,
    path = "/courses",
    responses((status = 201, description = "The new course"), (status = 401, description = "Not logged in"))
)]
pub async fn create_course_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(state.workspace.create_course().await))
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    responses((status = 200, description = "The course"), (status = 404, description = "Unknown course"))
)]
pub async fn get_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .workspace
        .course(&id)
        .await
        .map(Json)
        .ok_or_else(|| course_not_found(&id))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    request_body = CourseUpdate,
    responses((status = 200, description = "The updated course"), (status = 404, description = "Unknown course"))
)]
pub async fn update_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<CourseUpdate>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let branding = state.workspace.branding().await;
    let course = state
        .workspace
        .update_course(&id, |course| {
            if let Some(title) = update.title {
                course.title = title;
            }
            if let Some(description) = update.description {
                course.description = description;
            }
            if let Some(cover_image) = update.cover_image {
                course.cover_image = cover_image;
            }
            if let Some(category_ids) = update.category_ids {
                course.category_ids = category_ids;
                course.retain_known_categories(&branding);
            }
            Ok(())
        })
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(course))
}

/// Delete a course locally and in the remote store.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 404, description = "Unknown course"),
        (status = 502, description = "Remote delete failed")
    )
)]
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .workspace
        .delete_course(&id)
        .await
        .map_err(map_workspace_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Module & Asset Handlers
//=========================================================================================

/// Append a module to the curriculum.
#[utoipa::path(
    post,
    path = "/courses/{id}/modules",
    params(("id" = String, Path, description = "Course id")),
    request_body = ModuleInput,
    responses((status = 201, description = "The updated course"), (status = 404, description = "Unknown course"))
)]
pub async fn add_module_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<ModuleInput>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut module = Module::new();
    input.apply(&mut module);
    let course = state
        .workspace
        .update_course(&id, |course| {
            course.add_module(module);
            Ok(())
        })
        .await
        .map_err(map_workspace_error)?;
    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    put,
    path = "/courses/{id}/modules/{module_id}",
    params(
        ("id" = String, Path, description = "Course id"),
        ("module_id" = String, Path, description = "Module id")
    ),
    request_body = ModuleInput,
    responses((status = 200, description = "The updated course"), (status = 404, description = "Unknown course or module"))
)]
pub async fn update_module_handler(
    State(state): State<Arc<AppState>>,
    Path((id, module_id)): Path<(String, String)>,
    Json(input): Json<ModuleInput>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .workspace
        .update_course(&id, |course| {
            course.update_module(&module_id, |module| input.apply(module))?;
            Ok(())
        })
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(course))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}/modules/{module_id}",
    params(
        ("id" = String, Path, description = "Course id"),
        ("module_id" = String, Path, description = "Module id")
    ),
    responses((status = 200, description = "The updated course"), (status = 404, description = "Unknown course or module"))
)]
pub async fn remove_module_handler(
    State(state): State<Arc<AppState>>,
    Path((id, module_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .workspace
        .update_course(&id, |course| course.remove_module(&module_id).map(|_| ()))
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(course))
}

/// Move the module at `from` to position `to`.
#[utoipa::path(
    post,
    path = "/courses/{id}/modules/move",
    params(("id" = String, Path, description = "Course id")),
    request_body = MoveModuleRequest,
    responses(
        (status = 200, description = "The updated course"),
        (status = 400, description = "Position out of range"),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn move_module_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MoveModuleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .workspace
        .update_course(&id, |course| course.move_module(req.from, req.to))
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(course))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/assets",
    params(("id" = String, Path, description = "Course id")),
    request_body = AssetInput,
    responses(
        (status = 201, description = "The updated course"),
        (status = 400, description = "File asset without a file name"),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn add_asset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<AssetInput>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let asset = match (input.kind, input.file_name) {
        (AssetKind::Link, _) => Asset::link(&input.name, &input.url),
        (AssetKind::File, Some(file_name)) => Asset::file(&input.name, &input.url, &file_name),
        (AssetKind::File, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                "File assets need a fileName".to_string(),
            ))
        }
    };
    let course = state
        .workspace
        .update_course(&id, |course| {
            course.add_asset(asset);
            Ok(())
        })
        .await
        .map_err(map_workspace_error)?;
    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}/assets/{asset_id}",
    params(
        ("id" = String, Path, description = "Course id"),
        ("asset_id" = String, Path, description = "Asset id")
    ),
    responses((status = 200, description = "The updated course"), (status = 404, description = "Unknown course or asset"))
)]
pub async fn remove_asset_handler(
    State(state): State<Arc<AppState>>,
    Path((id, asset_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .workspace
        .update_course(&id, |course| course.remove_asset(&asset_id).map(|_| ()))
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(course))
}

//=========================================================================================
// Save & Share Handlers
//=========================================================================================

/// Push the course to the remote store now.
#[utoipa::path(
    post,
    path = "/courses/{id}/save",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Saved", body = SaveResponse),
        (status = 404, description = "Unknown course"),
        (status = 409, description = "Remote schema is out of date"),
        (status = 412, description = "Remote store is not configured"),
        (status = 502, description = "Remote store rejected the write"),
        (status = 504, description = "Remote store timed out")
    )
)]
pub async fn save_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .workspace
        .save_course(&id)
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(SaveResponse::from(outcome)))
}

/// The public link of a course, carrying the remote credentials when configured.
#[utoipa::path(
    get,
    path = "/courses/{id}/share",
    params(("id" = String, Path, description = "Course id")),
    responses((status = 200, description = "The shareable link", body = ShareLinkResponse), (status = 404, description = "Unknown course"))
)]
pub async fn share_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.workspace.course(&id).await.is_none() {
        return Err(course_not_found(&id));
    }
    let remote = state.workspace.remote_config().await;
    let url = course_link(&state.config.public_base_url, &id, Some(&remote));
    Ok(Json(ShareLinkResponse { url }))
}

async fn save_group(state: &AppState, group: EntityGroup) -> Result<Json<SaveResponse>, (StatusCode, String)> {
    let outcome = state
        .workspace
        .save(group)
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(SaveResponse::from(outcome)))
}

//=========================================================================================
// Branding & Mentor Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/branding",
    responses((status = 200, description = "Site name, logo and category dictionary"))
)]
pub async fn get_branding_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.workspace.branding().await)
}

#[utoipa::path(
    put,
    path = "/branding",
    request_body = BrandingUpdate,
    responses((status = 200, description = "The updated branding"))
)]
pub async fn update_branding_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<BrandingUpdate>,
) -> impl IntoResponse {
    let branding = state
        .workspace
        .update_branding(|branding| {
            if let Some(site_name) = update.site_name {
                branding.site_name = site_name;
            }
            if let Some(logo) = update.logo {
                branding.logo = logo;
            }
            if let Some(categories) = update.categories {
                branding.categories = categories
                    .into_iter()
                    .map(|c| {
                        let mut category = Category::new(&c.label, &c.color);
                        if let Some(id) = c.id.filter(|id| !id.is_empty()) {
                            category.id = id;
                        }
                        category
                    })
                    .collect();
            }
        })
        .await;
    Json(branding)
}

#[utoipa::path(
    post,
    path = "/branding/save",
    responses(
        (status = 200, description = "Saved", body = SaveResponse),
        (status = 412, description = "Remote store is not configured")
    )
)]
pub async fn save_branding_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    save_group(&state, EntityGroup::Branding).await
}

#[utoipa::path(
    get,
    path = "/mentor",
    responses((status = 200, description = "The mentor profile"))
)]
pub async fn get_mentor_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.workspace.mentor().await)
}

#[utoipa::path(
    put,
    path = "/mentor",
    request_body = MentorUpdate,
    responses((status = 200, description = "The updated mentor profile"))
)]
pub async fn update_mentor_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<MentorUpdate>,
) -> impl IntoResponse {
    let mentor = state
        .workspace
        .update_mentor(|mentor| {
            if let Some(name) = update.name {
                mentor.name = name;
            }
            if let Some(role) = update.role {
                mentor.role = role;
            }
            if let Some(bio) = update.bio {
                mentor.bio = bio;
            }
            if let Some(photo) = update.photo {
                mentor.photo = photo;
            }
            if let Some(socials) = update.socials {
                mentor.socials = socials;
            }
        })
        .await;
    Json(mentor)
}

#[utoipa::path(
    post,
    path = "/mentor/save",
    responses(
        (status = 200, description = "Saved", body = SaveResponse),
        (status = 412, description = "Remote store is not configured")
    )
)]
pub async fn save_mentor_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    save_group(&state, EntityGroup::Mentor).await
}

//=========================================================================================
// Remote Settings Handlers
//=========================================================================================

async fn remote_settings(state: &AppState) -> RemoteSettingsResponse {
    let remote = state.workspace.remote_config().await;
    RemoteSettingsResponse {
        endpoint_url: remote.endpoint_url,
        api_key_set: !remote.api_key.trim().is_empty(),
        connected: state.workspace.is_synced().await,
    }
}

#[utoipa::path(
    get,
    path = "/settings/remote",
    responses((status = 200, description = "Current remote store settings", body = RemoteSettingsResponse))
)]
pub async fn get_remote_settings_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(remote_settings(&state).await)
}

/// Store new credentials, reconnect and refetch. Empty values switch to local-only mode.
#[utoipa::path(
    put,
    path = "/settings/remote",
    request_body = RemoteSettingsRequest,
    responses(
        (status = 200, description = "Settings stored", body = RemoteSettingsResponse),
        (status = 502, description = "Could not reach the remote store"),
        (status = 504, description = "Remote store timed out")
    )
)]
pub async fn update_remote_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemoteSettingsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .workspace
        .set_remote_config(RemoteConfig::new(req.endpoint_url, req.api_key))
        .await
        .map_err(map_workspace_error)?;
    Ok(Json(remote_settings(&state).await))
}

/// Read a shared course link and adopt its credentials if none are configured.
#[utoipa::path(
    post,
    path = "/settings/remote/import-link",
    request_body = ImportLinkRequest,
    responses(
        (status = 200, description = "Link accepted", body = ImportLinkResponse),
        (status = 400, description = "Not a valid course link")
    )
)]
pub async fn import_link_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImportLinkRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let before = state.workspace.remote_config().await;
    let shared = state
        .workspace
        .adopt_shared_link(&req.link)
        .await
        .map_err(map_workspace_error)?;
    let adopted_credentials = state.workspace.remote_config().await != before;
    Ok(Json(ImportLinkResponse {
        course_id: shared.course_id,
        adopted_credentials,
    }))
}

//=========================================================================================
// Analytics Handler
//=========================================================================================

/// Visit totals computed from the recorded page views.
#[utoipa::path(
    get,
    path = "/analytics",
    responses(
        (status = 200, description = "Totals, distinct visitors and per-course, per-device and per-source counts"),
        (status = 412, description = "Remote store is not configured")
    )
)]
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let client = state
        .workspace
        .client()
        .await
        .ok_or_else(|| map_workspace_error(WorkspaceError::NotConfigured))?;
    let rows = client
        .select_all(Table::Events)
        .await
        .map_err(|e| map_port_error(&e))?;

    let events: Vec<_> = rows
        .into_iter()
        .filter_map(|row| match crate::sync::rows::event_from_row(row) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Skipping unreadable event row: {}", e);
                None
            }
        })
        .collect();
    Ok(Json(summarize(&events)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_map_to_actionable_statuses() {
        let schema = WorkspaceError::Remote(PortError::SchemaMismatch(
            "column \"categories\" does not exist".to_string(),
        ));
        let (status, message) = map_workspace_error(schema);
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(message.contains("schema is out of date"));

        let (status, _) = map_workspace_error(WorkspaceError::Remote(PortError::Timeout("t".into())));
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let (status, _) = map_workspace_error(WorkspaceError::Remote(PortError::Unauthorized));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn local_failures_map_to_client_errors() {
        assert_eq!(
            map_workspace_error(WorkspaceError::NotConfigured).0,
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            map_workspace_error(WorkspaceError::CourseNotFound("c".into())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            map_workspace_error(WorkspaceError::Edit(EditError::OutOfRange(4))).0,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn module_input_only_touches_given_fields() {
        let mut module = Module::new();
        let input: ModuleInput =
            serde_json::from_str(r#"{"type":"text","content":"Hello"}"#).unwrap();
        input.apply(&mut module);
        assert_eq!(module.kind, ModuleKind::Text);
        assert_eq!(module.content, "Hello");
        assert_eq!(module.title, "New module");
    }
}
