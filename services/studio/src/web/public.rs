//! services/studio/src/web/public.rs
//!
//! Endpoints of the learner-facing viewer. No login required.

use arunika_core::domain::{Branding, Category, Course, Mentor, ModuleKind};
use arunika_core::media::{youtube_embed_url, youtube_video_id};
use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::sync::VisitRequest;
use crate::web::{auth::cookie_value, state::AppState};

const VISITOR_COOKIE: &str = "visitor";
const VISITOR_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 365;

//=========================================================================================
// View Structs
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEmbed {
    pub module_id: String,
    pub video_id: String,
    pub embed_url: String,
}

/// Everything the viewer needs to render one course.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCourse {
    pub course: Course,
    pub mentor: Mentor,
    pub site_name: String,
    pub logo: String,
    /// The course's categories resolved against the branding dictionary.
    pub categories: Vec<Category>,
    pub videos: Vec<VideoEmbed>,
}

impl PublicCourse {
    pub fn new(course: Course, mentor: Mentor, branding: Branding) -> Self {
        let categories = course
            .category_ids
            .iter()
            .filter_map(|id| branding.category(id).cloned())
            .collect();
        let videos = course
            .modules
            .iter()
            .filter(|m| m.kind == ModuleKind::Video)
            .filter_map(|m| {
                Some(VideoEmbed {
                    module_id: m.id.clone(),
                    video_id: youtube_video_id(&m.content)?,
                    embed_url: youtube_embed_url(&m.content)?,
                })
            })
            .collect();
        Self {
            course,
            mentor,
            site_name: branding.site_name,
            logo: branding.logo,
            categories,
            videos,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/public/branding",
    responses((status = 200, description = "Site name, logo and category dictionary"))
)]
pub async fn public_branding_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.workspace.branding().await)
}

/// Render data for one course. Records a page view for the visitor.
#[utoipa::path(
    get,
    path = "/public/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course, mentor, resolved categories and video embeds"),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn public_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .workspace
        .course(&id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Course {id} not found")))?;

    let (visitor_id, new_visitor_cookie) = match cookie_value(&headers, VISITOR_COOKIE) {
        Some(visitor_id) => (visitor_id.to_string(), None),
        None => {
            let visitor_id = Uuid::new_v4().to_string();
            let cookie = format!(
                "{VISITOR_COOKIE}={visitor_id}; SameSite=Lax; Path=/; Max-Age={VISITOR_MAX_AGE_SECS}"
            );
            (visitor_id, Some(cookie))
        }
    };
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let full_path = match query {
        Some(query) => format!("/#/course/{id}?{query}"),
        None => format!("/#/course/{id}"),
    };
    let client = state.workspace.client().await;
    state.visits.record(
        client,
        VisitRequest {
            course_id: id,
            visitor_id,
            user_agent: header_text(header::USER_AGENT),
            referrer: header_text(header::REFERER),
            full_path,
        },
    );

    let view = PublicCourse::new(
        course,
        state.workspace.mentor().await,
        state.workspace.branding().await,
    );
    Ok((
        AppendHeaders(new_visitor_cookie.map(|c| (header::SET_COOKIE, c))),
        Json(view),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arunika_core::domain::{Module, MENTOR_ID};

    #[test]
    fn view_resolves_categories_and_videos() {
        let mut branding = Branding::default();
        branding.categories.push(Category::new("Design", "#8B5CF6"));

        let mut course = Course::new(MENTOR_ID);
        course.category_ids = vec!["design".to_string(), "removed".to_string()];
        let mut video = Module::new();
        video.content = "https://youtu.be/dQw4w9WgXcQ".to_string();
        let mut text = Module::new();
        text.kind = ModuleKind::Text;
        text.content = "# Notes".to_string();
        course.add_module(video);
        course.add_module(text);

        let view = PublicCourse::new(course, Mentor::default(), branding);
        assert_eq!(view.categories.len(), 1);
        assert_eq!(view.categories[0].label, "Design");
        assert_eq!(view.videos.len(), 1);
        assert_eq!(view.videos[0].video_id, "dQw4w9WgXcQ");
        assert_eq!(view.videos[0].embed_url, "https://www.youtube.com/embed/dQw4w9WgXcQ");
    }
}
