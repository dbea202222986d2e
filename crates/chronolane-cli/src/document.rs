//! JSON scenario documents.
//!
//! A document lists entities by key and names the roots to lay out:
//!
//! ```json
//! {
//!   "roots": ["plan"],
//!   "entities": [
//!     { "key": "plan", "children": ["a", "b"] },
//!     { "key": "a", "interval": { "start": 0, "end": 10 } },
//!     { "key": "b", "interval": { "start": 10, "end": 15 },
//!       "constraint": { "kind": "starts_after", "anchor": "a" } }
//!   ]
//! }
//! ```
//!
//! The document plays the persistence collaborator: changed intervals are
//! written back into it and the file is rewritten.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chronolane_core::error::Result;
use chronolane_core::{
    ComponentSource, Constraint, CoreError, EntityGraph, EntityId, GraphError, Interval, Persist,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintDoc {
    StartsWith { anchor: String },
    StartsAfter { anchor: String },
    EndsWith { anchor: String },
    Within { anchor: String },
    SpansChildren,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDoc {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ConstraintDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDocument {
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntityDoc>,
}

impl ScenarioDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content + "\n")?;
        Ok(())
    }

    /// Build the entity graph and resolve the root keys.
    ///
    /// Unknown child or root keys are errors. A constraint whose anchor is
    /// unknown is dropped from the graph with a warning; the document keeps it.
    pub fn to_graph(&self) -> Result<(EntityGraph, Vec<EntityId>)> {
        let mut graph = EntityGraph::new();
        for doc in &self.entities {
            let id = graph.add_entity(doc.key.as_str())?;
            if let Some(name) = &doc.name {
                graph.set_name(id, name.as_str())?;
            }
            graph.set_interval(id, doc.interval)?;
        }

        for doc in &self.entities {
            let id = graph.require(&doc.key)?;
            for child in &doc.children {
                let child = graph.require(child)?;
                graph.add_child(id, child)?;
            }
            if let Some(constraint) = &doc.constraint {
                match constraint_from_doc(&graph, constraint) {
                    Some(constraint) => graph.set_constraint(id, Some(constraint))?,
                    None => tracing::warn!(
                        entity = %doc.key,
                        ?constraint,
                        "constraint anchor not found, ignoring constraint"
                    ),
                }
            }
        }

        let roots = self
            .roots
            .iter()
            .map(|key| graph.require(key))
            .collect::<Result<Vec<_>, GraphError>>()?;
        Ok((graph, roots))
    }

    /// Copy the current intervals of `changed` from `graph` into the document.
    pub fn apply_changes(&mut self, graph: &EntityGraph, changed: &BTreeSet<EntityId>) -> usize {
        let mut written = 0;
        for id in changed {
            let Some(key) = graph.key(*id) else {
                continue;
            };
            if let Some(doc) = self.entities.iter_mut().find(|e| e.key == key) {
                doc.interval = graph.interval(*id);
                written += 1;
            }
        }
        written
    }
}

fn constraint_from_doc(graph: &EntityGraph, doc: &ConstraintDoc) -> Option<Constraint> {
    Some(match doc {
        ConstraintDoc::StartsWith { anchor } => Constraint::StartsWith(graph.id_of(anchor)?),
        ConstraintDoc::StartsAfter { anchor } => Constraint::StartsAfter(graph.id_of(anchor)?),
        ConstraintDoc::EndsWith { anchor } => Constraint::EndsWith(graph.id_of(anchor)?),
        ConstraintDoc::Within { anchor } => Constraint::Within(graph.id_of(anchor)?),
        ConstraintDoc::SpansChildren => Constraint::SpansChildren,
    })
}

/// A document on disk acting as the persistence layer.
pub struct DocumentStore {
    path: PathBuf,
    document: ScenarioDocument,
    dry_run: bool,
}

impl DocumentStore {
    pub fn open(path: &Path, dry_run: bool) -> Result<Self> {
        let document = ScenarioDocument::load(path).map_err(|e| {
            CoreError::Custom(format!("failed to load {}: {e}", path.display()))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
            dry_run,
        })
    }

    pub fn document(&self) -> &ScenarioDocument {
        &self.document
    }
}

impl Persist for DocumentStore {
    fn persist(&mut self, graph: &EntityGraph, changed: &BTreeSet<EntityId>) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }
        let written = self.document.apply_changes(graph, changed);
        if self.dry_run {
            tracing::info!(written, "dry run, document not saved");
            return Ok(());
        }
        self.document.save(&self.path)?;
        tracing::info!(written, path = %self.path.display(), "document saved");
        Ok(())
    }
}
