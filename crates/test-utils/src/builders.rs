#![allow(dead_code)]

use serde_json::{json, Value};
use skillwatch::mirror::{resource_data_id, skill_group, skill_key};
use skillwatch::types::ConfigKey;

use crate::fakes::MemoryStore;

/// Builder for a skill as it is published to the store: one `skill.json`
/// plus one entry per resource.
#[derive(Debug, Clone)]
pub struct SkillFixture {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub uniform_id: Option<Value>,
    pub resources: Vec<ResourceFixture>,
}

#[derive(Debug, Clone)]
pub struct ResourceFixture {
    pub name: String,
    pub kind: String,
    pub content: String,
    /// Overrides the skill's `uniformId` for this resource.
    pub uniform_id: Option<Value>,
}

impl SkillFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("{name} description"),
            instruction: format!("Use {name} wisely."),
            uniform_id: None,
            resources: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn instruction(mut self, instruction: &str) -> Self {
        self.instruction = instruction.to_string();
        self
    }

    pub fn uniform_id(mut self, id: impl Into<Value>) -> Self {
        self.uniform_id = Some(id.into());
        self
    }

    pub fn resource(mut self, kind: &str, name: &str, content: &str) -> Self {
        self.resources.push(ResourceFixture {
            name: name.to_string(),
            kind: kind.to_string(),
            content: content.to_string(),
            uniform_id: None,
        });
        self
    }

    /// Resource whose `uniformId` differs from the skill's.
    pub fn stale_resource(mut self, kind: &str, name: &str, content: &str, id: impl Into<Value>) -> Self {
        self.resources.push(ResourceFixture {
            name: name.to_string(),
            kind: kind.to_string(),
            content: content.to_string(),
            uniform_id: Some(id.into()),
        });
        self
    }

    pub fn key(&self, namespace: &str) -> ConfigKey {
        skill_key(&self.name, namespace)
    }

    pub fn skill_json(&self) -> String {
        let resources: Vec<Value> = self
            .resources
            .iter()
            .map(|r| json!({ "name": r.name, "type": r.kind }))
            .collect();
        let mut doc = json!({
            "name": self.name,
            "description": self.description,
            "instruction": self.instruction,
            "resources": resources,
        });
        if let Some(id) = &self.uniform_id {
            doc["uniformId"] = id.clone();
        }
        doc.to_string()
    }

    /// `(key, json)` for every resource entry.
    pub fn resource_entries(&self, namespace: &str) -> Vec<(ConfigKey, String)> {
        self.resources
            .iter()
            .map(|r| {
                let key = ConfigKey::new(
                    resource_data_id(&r.kind, &r.name),
                    skill_group(&self.name),
                    namespace,
                );
                let mut doc = json!({
                    "name": r.name,
                    "type": r.kind,
                    "content": r.content,
                });
                if let Some(id) = r.uniform_id.as_ref().or(self.uniform_id.as_ref()) {
                    doc["uniformId"] = id.clone();
                }
                (key, doc.to_string())
            })
            .collect()
    }

    /// Write `skill.json` and all resources into `store`.
    pub fn publish(&self, store: &MemoryStore, namespace: &str) {
        for (key, json) in self.resource_entries(namespace) {
            store.set(&key, json);
        }
        store.set(&self.key(namespace), self.skill_json());
    }

    /// Remove `skill.json` from `store` (resources are left behind).
    pub fn unpublish(&self, store: &MemoryStore, namespace: &str) {
        store.remove(&self.key(namespace));
    }
}
