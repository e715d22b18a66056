//! services/studio/src/sync/rows.rs
//!
//! Row shapes of the remote tables and their conversion to and from the
//! domain types. The remote schema uses snake_case columns and stores the
//! embedded modules, assets and categories as JSON.

use arunika_core::domain::{
    deserialize_category_ids, Asset, Branding, Category, Course, Mentor, Module, SocialLinks,
    VisitEvent, BRANDING_ID, MENTOR_ID,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

//=========================================================================================
// Row Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct BrandingRow {
    id: String,
    #[serde(default)]
    site_name: String,
    #[serde(default)]
    logo: String,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default = "epoch")]
    updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct MentorRow {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    photo: String,
    #[serde(default)]
    socials: SocialLinks,
    #[serde(default = "epoch")]
    updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct CourseRow {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cover_image: String,
    #[serde(default)]
    modules: Vec<Module>,
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default, deserialize_with = "deserialize_category_ids")]
    categories: Vec<String>,
    #[serde(default)]
    mentor_id: String,
    #[serde(default = "epoch")]
    created_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    updated_at: DateTime<Utc>,
}

//=========================================================================================
// Conversions
//=========================================================================================

pub fn branding_to_row(branding: &Branding) -> Value {
    let row = BrandingRow {
        id: BRANDING_ID.to_string(),
        site_name: branding.site_name.clone(),
        logo: branding.logo.clone(),
        categories: branding.categories.clone(),
        updated_at: branding.updated_at,
    };
    // Plain strings, lists and timestamps always serialize.
    serde_json::to_value(row).unwrap_or(Value::Null)
}

pub fn branding_from_row(row: Value) -> Result<Branding, serde_json::Error> {
    let row: BrandingRow = serde_json::from_value(row)?;
    Ok(Branding {
        logo: row.logo,
        site_name: row.site_name,
        categories: row.categories,
        updated_at: row.updated_at,
    })
}

pub fn mentor_to_row(mentor: &Mentor) -> Value {
    let row = MentorRow {
        id: MENTOR_ID.to_string(),
        name: mentor.name.clone(),
        role: mentor.role.clone(),
        bio: mentor.bio.clone(),
        photo: mentor.photo.clone(),
        socials: mentor.socials.clone(),
        updated_at: mentor.updated_at,
    };
    serde_json::to_value(row).unwrap_or(Value::Null)
}

pub fn mentor_from_row(row: Value) -> Result<Mentor, serde_json::Error> {
    let row: MentorRow = serde_json::from_value(row)?;
    Ok(Mentor {
        name: row.name,
        role: row.role,
        bio: row.bio,
        photo: row.photo,
        socials: row.socials,
        updated_at: row.updated_at,
    })
}

pub fn course_to_row(course: &Course) -> Value {
    let row = CourseRow {
        id: course.id.clone(),
        title: course.title.clone(),
        description: course.description.clone(),
        cover_image: course.cover_image.clone(),
        modules: course.modules.clone(),
        assets: course.assets.clone(),
        categories: course.category_ids.clone(),
        mentor_id: course.mentor_id.clone(),
        created_at: course.created_at,
        updated_at: course.updated_at,
    };
    serde_json::to_value(row).unwrap_or(Value::Null)
}

pub fn course_from_row(row: Value) -> Result<Course, serde_json::Error> {
    let row: CourseRow = serde_json::from_value(row)?;
    Ok(Course {
        id: row.id,
        title: row.title,
        description: row.description,
        cover_image: row.cover_image,
        modules: row.modules,
        assets: row.assets,
        category_ids: row.categories,
        mentor_id: row.mentor_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Visit events map one-to-one onto the `events` columns.
pub fn event_to_row(event: &VisitEvent) -> Value {
    serde_json::to_value(event).unwrap_or(Value::Null)
}

pub fn event_from_row(row: Value) -> Result<VisitEvent, serde_json::Error> {
    serde_json::from_value(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arunika_core::domain::{Module, ModuleKind};
    use serde_json::json;

    #[test]
    fn course_row_uses_remote_column_names() {
        let mut course = Course::new(MENTOR_ID);
        course.category_ids = vec!["design".to_string()];
        let mut module = Module::new();
        module.content = "https://youtube.com/watch?v=abc12345678".to_string();
        course.add_module(module);

        let row = course_to_row(&course);
        assert_eq!(row["id"], course.id.as_str());
        assert_eq!(row["cover_image"], course.cover_image.as_str());
        assert_eq!(row["categories"], json!(["design"]));
        assert_eq!(row["modules"][0]["type"], "video");

        let back = course_from_row(row).unwrap();
        assert_eq!(back, course);
        assert_eq!(back.modules[0].kind, ModuleKind::Video);
    }

    #[test]
    fn course_row_without_categories_column() {
        let course = course_from_row(json!({
            "id": "course-1",
            "title": "Old schema",
            "modules": [],
            "assets": [],
            "mentor_id": "profile"
        }))
        .unwrap();
        assert!(course.category_ids.is_empty());
    }

    #[test]
    fn singleton_rows_use_fixed_ids() {
        assert_eq!(branding_to_row(&Branding::default())["id"], "config");
        assert_eq!(mentor_to_row(&Mentor::default())["id"], "profile");
    }

    #[test]
    fn branding_row_round_trip() {
        let mut branding = Branding::default();
        branding.categories.push(Category::new("UI Design", "#8B5CF6"));
        let back = branding_from_row(branding_to_row(&branding)).unwrap();
        assert_eq!(back, branding);
    }
}
