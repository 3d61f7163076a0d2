// src/mirror/skill.rs

//! Skills: how a skill is laid out in the store and on disk.
//!
//! Store layout, all in group `skill_<name>`:
//! - `skill.json`: `{name, description, instruction, uniformId, resources: [{name, type}]}`
//! - `resource_<type>_<name with "." → "__">.json`: `{name, type, content, uniformId}`
//!
//! Disk layout under `<output_dir>/<name>/`:
//! - `SKILL.md` (YAML front matter + instruction)
//! - `<type>/<resource name>` for each resource (type-less resources at the root)

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{Result, SkillwatchError};
use crate::fs::FileSystem;
use crate::mirror::Mirror;
use crate::store::ConfigStore;
use crate::types::{BoxFuture, ConfigKey};

/// Data-id of the entry describing a skill.
pub const SKILL_DATA_ID: &str = "skill.json";

/// Group prefix for skill records.
pub const GROUP_PREFIX: &str = "skill_";

/// Name of the generated description file.
pub const SKILL_MD: &str = "SKILL.md";

pub fn skill_group(name: &str) -> String {
    format!("{GROUP_PREFIX}{name}")
}

/// The `skill.json` entry of a skill.
pub fn skill_key(name: &str, namespace: &str) -> ConfigKey {
    ConfigKey::new(SKILL_DATA_ID, skill_group(name), namespace)
}

/// Inverse of [`skill_group`]; `None` for groups that are not skills.
pub fn skill_name_from_group(group: &str) -> Option<&str> {
    group
        .strip_prefix(GROUP_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Data-id of a resource entry (`init_skill.py` → `resource_scripts_init_skill__py.json`).
pub fn resource_data_id(kind: &str, name: &str) -> String {
    format!("resource_{}_{}.json", kind, name.replace('.', "__"))
}

/// Parsed `skill.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruction: String,
    /// String or number depending on the publisher.
    #[serde(default)]
    pub uniform_id: Option<Value>,
    #[serde(default)]
    pub resources: Vec<ResourceRef>,
}

/// Resource listing inside `skill.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRef {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Parsed resource entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDocument {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
    #[serde(default)]
    uniform_id: Option<Value>,
}

/// Render a `uniformId` as text: numbers without a fractional part, strings
/// as-is, missing as empty.
pub fn normalize_uniform_id(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// Render `SKILL.md`.
pub fn render_skill_md(skill: &SkillDocument) -> String {
    format!(
        "---\nname: {}\ndescription: \"{}\"\n---\n\n{}\n",
        skill.name, skill.description, skill.instruction
    )
}

/// Blake3 digest of file content, used to skip rewriting identical files.
fn content_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// A single path component that cannot escape its parent directory.
fn is_plain_component(s: &str) -> bool {
    let mut components = Path::new(s).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Retry policy for materialization attempts that hit a `uniformId`
/// mismatch (the publisher is usually still midway through an update).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Mirror of skills under `output_dir`.
#[derive(Debug)]
pub struct SkillMirror<S, F> {
    store: S,
    fs: F,
    output_dir: PathBuf,
    namespace: String,
    retry: RetryPolicy,
}

impl<S: ConfigStore, F: FileSystem> SkillMirror<S, F> {
    pub fn new(store: S, fs: F, output_dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            fs,
            output_dir: output_dir.into(),
            namespace: namespace.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn materialize_with_retry(&self, name: &str) -> Result<PathBuf> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.materialize_once(name).await {
                Err(err @ SkillwatchError::UniformIdMismatch { .. }) if attempt < attempts => {
                    warn!(
                        skill = %name,
                        attempt,
                        attempts,
                        error = %err,
                        "inconsistent skill snapshot; retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn materialize_once(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_component(name) {
            return Err(SkillwatchError::ConfigError(format!(
                "invalid skill name '{name}'"
            )));
        }

        let key = skill_key(name, &self.namespace);
        let raw = self.store.fetch(&key).await?;
        let skill: SkillDocument = serde_json::from_str(&raw)?;
        let skill_uniform_id = normalize_uniform_id(skill.uniform_id.as_ref());

        let skill_dir = self.output_dir.join(name);
        self.fs.create_dir_all(&skill_dir)?;

        let mut written = 0usize;
        for resource in &skill.resources {
            if resource.name.is_empty() {
                continue;
            }

            let key = ConfigKey::new(
                resource_data_id(&resource.kind, &resource.name),
                skill_group(name),
                self.namespace.clone(),
            );
            let raw = match self.store.fetch(&key).await {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(skill = %name, resource = %resource.name, error = %e, "skipping unfetchable resource");
                    continue;
                }
            };
            let doc: ResourceDocument = match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    debug!(skill = %name, resource = %resource.name, error = %e, "skipping unparsable resource");
                    continue;
                }
            };

            let resource_uniform_id = normalize_uniform_id(doc.uniform_id.as_ref());
            if !skill_uniform_id.is_empty()
                && !resource_uniform_id.is_empty()
                && resource_uniform_id != skill_uniform_id
            {
                return Err(SkillwatchError::UniformIdMismatch {
                    skill: skill_uniform_id,
                    resource: resource.name.clone(),
                    found: resource_uniform_id,
                });
            }

            let (Some(file_name), Some(kind), Some(content)) = (doc.name, doc.kind, doc.content)
            else {
                continue;
            };

            if !is_plain_component(&file_name) || !(kind.is_empty() || is_plain_component(&kind)) {
                warn!(skill = %name, resource = %file_name, kind = %kind, "resource path escapes the skill directory; skipping");
                continue;
            }

            let dir = if kind.is_empty() {
                skill_dir.clone()
            } else {
                skill_dir.join(&kind)
            };
            if self.write_if_changed(&dir.join(&file_name), content.as_bytes())? {
                written += 1;
            }
        }

        if self.write_if_changed(&skill_dir.join(SKILL_MD), render_skill_md(&skill).as_bytes())? {
            written += 1;
        }

        info!(skill = %name, path = ?skill_dir, files_written = written, "skill materialized");
        Ok(skill_dir)
    }

    /// Write `contents` unless the file already holds exactly these bytes.
    fn write_if_changed(&self, path: &Path, contents: &[u8]) -> Result<bool> {
        if self.fs.is_file(path) {
            let existing = self.fs.read(path)?;
            if content_digest(&existing) == content_digest(contents) {
                debug!(path = ?path, "content unchanged; not rewriting");
                return Ok(false);
            }
        }
        self.fs.write(path, contents)?;
        Ok(true)
    }
}

impl<S: ConfigStore, F: FileSystem> Mirror for SkillMirror<S, F> {
    fn materialize<'a>(&'a self, record: &'a str) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(self.materialize_with_retry(record))
    }

    fn remove(&self, record: &str) -> Result<bool> {
        if !is_plain_component(record) {
            return Err(SkillwatchError::ConfigError(format!(
                "invalid skill name '{record}'"
            )));
        }
        let path = self.record_path(record);
        if !self.fs.is_dir(&path) {
            return Ok(false);
        }
        self.fs.remove_dir_all(&path)?;
        info!(skill = %record, path = ?path, "local skill removed");
        Ok(true)
    }

    fn record_path(&self, record: &str) -> PathBuf {
        self.output_dir.join(record)
    }

    fn exists(&self, record: &str) -> bool {
        self.fs.is_dir(&self.record_path(record))
    }
}
