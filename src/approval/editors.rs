use crate::notifications::RecipientDirectory;
use crate::workflow::engine::ReviewerWorkload;
use crate::workflow::types::{ContentType, EditorId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Registration data for an editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorProfile {
    pub id: EditorId,
    pub name: String,
    pub content_types: Vec<ContentType>,
    pub languages: Vec<String>,
    pub max_workload: u32,
    /// May decide on workflows assigned to someone else
    #[serde(default)]
    pub can_override: bool,
}

impl EditorProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EditorId::new(id),
            name: name.into(),
            content_types: ContentType::ALL.to_vec(),
            languages: vec!["en".to_string()],
            max_workload: 5,
            can_override: false,
        }
    }

    pub fn with_content_types(mut self, content_types: &[ContentType]) -> Self {
        self.content_types = content_types.to_vec();
        self
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_max_workload(mut self, max_workload: u32) -> Self {
        self.max_workload = max_workload;
        self
    }

    pub fn with_override(mut self) -> Self {
        self.can_override = true;
        self
    }
}

/// Point-in-time view of an editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSnapshot {
    pub id: EditorId,
    pub name: String,
    pub current_workload: u32,
    pub max_workload: u32,
    pub available: bool,
    pub can_override: bool,
}

/// A registered editor. Workload changes are atomic so concurrent
/// assignments never push an editor past `max_workload`.
#[derive(Debug)]
pub struct Editor {
    pub id: EditorId,
    pub name: String,
    content_types: HashSet<ContentType>,
    languages: HashSet<String>,
    pub max_workload: u32,
    pub can_override: bool,
    current_workload: AtomicU32,
    available: AtomicBool,
}

impl Editor {
    fn from_profile(profile: EditorProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            content_types: profile.content_types.into_iter().collect(),
            languages: profile
                .languages
                .into_iter()
                .map(|l| l.to_ascii_lowercase())
                .collect(),
            max_workload: profile.max_workload,
            can_override: profile.can_override,
            current_workload: AtomicU32::new(0),
            available: AtomicBool::new(true),
        }
    }

    pub fn workload(&self) -> u32 {
        self.current_workload.load(Ordering::Acquire)
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn handles(&self, content_type: ContentType, language_code: &str) -> bool {
        self.content_types.contains(&content_type)
            && self.languages.contains(&language_code.to_ascii_lowercase())
    }

    /// Available, qualified, and below capacity
    pub fn is_eligible(&self, content_type: ContentType, language_code: &str) -> bool {
        self.is_available()
            && self.handles(content_type, language_code)
            && self.workload() < self.max_workload
    }

    /// Take one unit of workload if capacity remains. Returns the new workload.
    pub fn try_reserve(&self) -> Option<u32> {
        self.current_workload
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max_workload).then_some(current + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    /// Take one unit of workload regardless of capacity
    pub fn force_reserve(&self) -> u32 {
        self.current_workload.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Give back one unit of workload, never going below zero
    pub fn release(&self) -> u32 {
        let previous = self
            .current_workload
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            current_workload: self.workload(),
            max_workload: self.max_workload,
            available: self.is_available(),
            can_override: self.can_override,
        }
    }
}

#[derive(Debug, Default)]
pub struct EditorRegistry {
    editors: RwLock<HashMap<EditorId, Arc<Editor>>>,
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an editor. Replacing resets the workload.
    pub async fn register(&self, profile: EditorProfile) -> Arc<Editor> {
        let editor = Arc::new(Editor::from_profile(profile));
        info!(
            editor_id = %editor.id,
            max_workload = editor.max_workload,
            "Editor registered"
        );
        self.editors
            .write()
            .await
            .insert(editor.id.clone(), editor.clone());
        editor
    }

    pub async fn get(&self, id: &EditorId) -> Option<Arc<Editor>> {
        self.editors.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<EditorSnapshot> {
        let mut editors: Vec<EditorSnapshot> = self
            .editors
            .read()
            .await
            .values()
            .map(|editor| editor.snapshot())
            .collect();
        editors.sort_by(|a, b| a.id.cmp(&b.id));
        editors
    }

    /// Returns false when the editor is unknown
    pub async fn set_availability(&self, id: &EditorId, available: bool) -> bool {
        match self.get(id).await {
            Some(editor) => {
                editor.available.store(available, Ordering::Release);
                debug!(editor_id = %id, available, "Editor availability changed");
                true
            }
            None => false,
        }
    }

    /// Editors that could take a new review right now
    pub async fn eligible(&self, content_type: ContentType, language_code: &str) -> Vec<Arc<Editor>> {
        self.editors
            .read()
            .await
            .values()
            .filter(|editor| editor.is_eligible(content_type, language_code))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecipientDirectory for EditorRegistry {
    async fn reviewers_for(&self, content_type: ContentType, language_code: &str) -> Vec<EditorId> {
        let mut reviewers: Vec<EditorId> = self
            .editors
            .read()
            .await
            .values()
            .filter(|editor| editor.is_available() && editor.handles(content_type, language_code))
            .map(|editor| editor.id.clone())
            .collect();
        reviewers.sort();
        reviewers
    }
}

#[async_trait]
impl ReviewerWorkload for EditorRegistry {
    async fn claim(&self, editor_id: &EditorId) -> Option<u32> {
        let editor = self.get(editor_id).await?;
        let workload = editor.force_reserve();
        if workload > editor.max_workload {
            warn!(
                editor_id = %editor_id,
                workload,
                max_workload = editor.max_workload,
                "Named reviewer exceeds editor capacity"
            );
        }
        Some(workload)
    }

    async fn release(&self, editor_id: &EditorId) {
        if let Some(editor) = self.get(editor_id).await {
            let workload = editor.release();
            debug!(editor_id = %editor_id, workload, "Editor workload released");
        }
    }
}
