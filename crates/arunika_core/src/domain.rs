//! crates/arunika_core/src/domain.rs
//!
//! Defines the core data structures of the course studio: the branding and
//! mentor singletons, courses with their embedded modules and assets, the
//! remote credentials and the visit events written by the public viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Well-known remote id of the branding singleton.
pub const BRANDING_ID: &str = "config";
/// Well-known remote id of the mentor singleton.
pub const MENTOR_ID: &str = "profile";

const DEFAULT_LOGO: &str = "https://api.dicebear.com/7.x/shapes/svg?seed=arunika";
const DEFAULT_COVER: &str = "https://picsum.photos/seed/new/800/450";

//=========================================================================================
// Session
//=========================================================================================

/// The admin session flag. Owned by this client, never sent to the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub authenticated: bool,
}

//=========================================================================================
// Branding & Mentor (singletons)
//=========================================================================================

/// A category in the deployment-wide dictionary. Courses reference it by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub color: String,
}

impl Category {
    pub fn new(label: &str, color: &str) -> Self {
        Self {
            id: slugify(label),
            label: label.to_string(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    pub logo: String,
    pub site_name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default = "epoch")]
    pub updated_at: DateTime<Utc>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            logo: DEFAULT_LOGO.to_string(),
            site_name: "Arunika Learning".to_string(),
            categories: Vec::new(),
            updated_at: epoch(),
        }
    }
}

impl Branding {
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mentor {
    pub name: String,
    pub role: String,
    pub bio: String,
    pub photo: String,
    #[serde(default)]
    pub socials: SocialLinks,
    #[serde(default = "epoch")]
    pub updated_at: DateTime<Utc>,
}

impl Default for Mentor {
    fn default() -> Self {
        Self {
            name: "Alex Rivera".to_string(),
            role: "Senior Product Designer".to_string(),
            bio: "Helping creative minds build better digital products for over 10 years."
                .to_string(),
            photo: "https://picsum.photos/seed/mentor1/300/300".to_string(),
            socials: SocialLinks {
                instagram: Some("alexrivera".to_string()),
                linkedin: Some("alex-rivera".to_string()),
                website: Some("https://alexdesign.io".to_string()),
                ..Default::default()
            },
            updated_at: epoch(),
        }
    }
}

//=========================================================================================
// Courses
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Video,
    Text,
}

/// A single lesson in a course curriculum. Position in `Course::modules` is
/// the curriculum order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ModuleKind,
    /// YouTube URL for video modules, markdown for text modules.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Module {
    pub fn new() -> Self {
        Self {
            id: new_id("m"),
            title: "New module".to_string(),
            kind: ModuleKind::Video,
            content: String::new(),
            description: String::new(),
            duration: Some("00:00".to_string()),
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Link,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// A link, or a data URI for embedded files.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Asset {
    pub fn link(name: &str, url: &str) -> Self {
        Self {
            id: new_id("a"),
            name: name.to_string(),
            kind: AssetKind::Link,
            url: url.to_string(),
            file_name: None,
        }
    }

    pub fn file(name: &str, data_uri: &str, file_name: &str) -> Self {
        Self {
            id: new_id("a"),
            name: name.to_string(),
            kind: AssetKind::File,
            url: data_uri.to_string(),
            file_name: Some(file_name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(
        default,
        alias = "categories",
        deserialize_with = "deserialize_category_ids"
    )]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub mentor_id: String,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub updated_at: DateTime<Utc>,
}

/// Errors from editing the embedded parts of a course.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Module {0} not found")]
    ModuleNotFound(String),
    #[error("Asset {0} not found")]
    AssetNotFound(String),
    #[error("Position {0} is out of range")]
    OutOfRange(usize),
}

impl Course {
    /// Creates a course with a fresh client-generated id and editor defaults.
    pub fn new(mentor_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("course"),
            title: "New course".to_string(),
            description: "A short description of the new course...".to_string(),
            cover_image: DEFAULT_COVER.to_string(),
            modules: Vec::new(),
            assets: Vec::new(),
            category_ids: Vec::new(),
            mentor_id: mentor_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    /// Appends a module to the end of the curriculum.
    pub fn add_module(&mut self, module: Module) -> &Module {
        self.modules.push(module);
        &self.modules[self.modules.len() - 1]
    }

    pub fn update_module(
        &mut self,
        module_id: &str,
        edit: impl FnOnce(&mut Module),
    ) -> Result<&Module, EditError> {
        let module = self
            .modules
            .iter_mut()
            .find(|m| m.id == module_id)
            .ok_or_else(|| EditError::ModuleNotFound(module_id.to_string()))?;
        edit(module);
        // The id is the identity within the course and must not change.
        module.id = module_id.to_string();
        Ok(module)
    }

    pub fn remove_module(&mut self, module_id: &str) -> Result<Module, EditError> {
        let index = self
            .modules
            .iter()
            .position(|m| m.id == module_id)
            .ok_or_else(|| EditError::ModuleNotFound(module_id.to_string()))?;
        Ok(self.modules.remove(index))
    }

    /// Moves the module at `from` to position `to`, shifting the others.
    pub fn move_module(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        if from >= self.modules.len() {
            return Err(EditError::OutOfRange(from));
        }
        if to >= self.modules.len() {
            return Err(EditError::OutOfRange(to));
        }
        let module = self.modules.remove(from);
        self.modules.insert(to, module);
        Ok(())
    }

    pub fn add_asset(&mut self, asset: Asset) -> &Asset {
        self.assets.push(asset);
        &self.assets[self.assets.len() - 1]
    }

    pub fn remove_asset(&mut self, asset_id: &str) -> Result<Asset, EditError> {
        let index = self
            .assets
            .iter()
            .position(|a| a.id == asset_id)
            .ok_or_else(|| EditError::AssetNotFound(asset_id.to_string()))?;
        Ok(self.assets.remove(index))
    }

    /// Drops category ids that the branding dictionary does not know.
    pub fn retain_known_categories(&mut self, branding: &Branding) {
        self.category_ids.retain(|id| branding.category(id).is_some());
    }
}

//=========================================================================================
// Remote configuration
//=========================================================================================

/// Credentials of the hosted backend. Incomplete credentials mean local-only mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub endpoint_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl RemoteConfig {
    pub fn new(endpoint_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.endpoint_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

//=========================================================================================
// Visit events
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    /// Rough classification from a `User-Agent` header.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let android_tablet = ua.contains("android") && !ua.contains("mobile");
        if ua.contains("ipad") || ua.contains("tablet") || android_tablet {
            DeviceType::Tablet
        } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
            DeviceType::Mobile
        } else {
            DeviceType::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

/// A page view recorded by the public viewer. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub id: Uuid,
    pub event_name: String,
    pub course_id: String,
    pub visitor_id: String,
    pub device_type: DeviceType,
    pub user_agent: String,
    pub referrer: String,
    pub source: String,
    pub full_path: String,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Returns a fresh opaque id such as `course-6f1c...`.
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Reads a course's category list. Older revisions stored `{label, color}`
/// objects embedded in each course; those are folded into ids so every course
/// references the branding dictionary.
pub fn deserialize_category_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CategoryRef {
        Id(String),
        Embedded {
            #[serde(default)]
            id: Option<String>,
            label: String,
        },
    }

    let refs = Option::<Vec<CategoryRef>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(refs
        .into_iter()
        .map(|r| match r {
            CategoryRef::Id(id) => id,
            CategoryRef::Embedded { id: Some(id), .. } => id,
            CategoryRef::Embedded { id: None, label } => slugify(&label),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn move_module_keeps_curriculum_order() {
        let mut course = Course::new(MENTOR_ID);
        let ids: Vec<String> = (0..3)
            .map(|i| {
                let mut m = Module::new();
                m.title = format!("Lesson {i}");
                course.add_module(m).id.clone()
            })
            .collect();

        course.move_module(2, 0).unwrap();
        let order: Vec<&str> = course.modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, vec![ids[2].as_str(), ids[0].as_str(), ids[1].as_str()]);

        assert_eq!(course.move_module(3, 0), Err(EditError::OutOfRange(3)));
    }

    #[test]
    fn update_module_cannot_change_identity() {
        let mut course = Course::new(MENTOR_ID);
        let id = course.add_module(Module::new()).id.clone();
        let module = course
            .update_module(&id, |m| {
                m.title = "Renamed".to_string();
                m.id = "hijacked".to_string();
            })
            .unwrap();
        assert_eq!(module.id, id);
        assert_eq!(module.title, "Renamed");
    }

    #[test]
    fn legacy_embedded_categories_become_ids() {
        let course: Course = serde_json::from_value(json!({
            "id": "course-1",
            "title": "Legacy",
            "categories": [{ "label": "UI Design", "color": "#8B5CF6" }, "marketing"]
        }))
        .unwrap();
        assert_eq!(course.category_ids, vec!["ui-design", "marketing"]);

        let drifted: Course = serde_json::from_value(json!({
            "id": "course-2",
            "title": "Drifted",
            "categoryIds": ["ui-design"]
        }))
        .unwrap();
        assert_eq!(drifted.category_ids, vec!["ui-design"]);
    }

    #[test]
    fn module_serializes_type_tag() {
        let mut module = Module::new();
        module.content = "https://youtube.com/watch?v=abc12345678".to_string();
        let value = serde_json::to_value(&module).unwrap();
        assert_eq!(value["type"], "video");
        assert_eq!(value["content"], "https://youtube.com/watch?v=abc12345678");
    }

    #[test]
    fn device_type_from_user_agent() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";
        let ipad = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)";
        let linux = "Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0";
        assert_eq!(DeviceType::from_user_agent(iphone), DeviceType::Mobile);
        assert_eq!(DeviceType::from_user_agent(ipad), DeviceType::Tablet);
        assert_eq!(DeviceType::from_user_agent(linux), DeviceType::Desktop);
    }

    #[test]
    fn remote_config_requires_both_fields() {
        assert!(!RemoteConfig::default().is_complete());
        assert!(!RemoteConfig::new("postgres://db", "  ").is_complete());
        assert!(RemoteConfig::new("postgres://db", "secret").is_complete());
    }
}
