//! Level fixtures: the tables, challenge and reference solution of each level.
//!
//! A catalogue file is JSON, either `{ "levels": [...] }`, a bare array of
//! levels, or a single level object. Level ids may be numbers (`1`) or
//! strings (`"3.5"`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::table::TableSet;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("invalid fixture file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read fixture file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Level '{id}' not found. Available levels: {}", .available.join(", "))]
    UnknownLevel { id: String, available: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fixture {
    #[serde(deserialize_with = "level_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub hint: String,
    pub solution: String,
    pub tables: TableSet,
}

fn level_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LevelId {
        Number(u64),
        Text(String),
    }

    Ok(match LevelId::deserialize(deserializer)? {
        LevelId::Number(n) => n.to_string(),
        LevelId::Text(s) => s,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalogue {
    levels: Vec<Fixture>,
}

impl Catalogue {
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        #[derive(Deserialize)]
        struct Document {
            levels: Vec<Fixture>,
        }

        let doc: serde_json::Value = serde_json::from_str(json)?;
        let levels = match doc {
            serde_json::Value::Array(_) => serde_json::from_value(doc)?,
            serde_json::Value::Object(ref fields) if fields.contains_key("levels") => {
                serde_json::from_value::<Document>(doc)?.levels
            }
            _ => vec![serde_json::from_value(doc)?],
        };
        Ok(Self { levels })
    }

    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let json = fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Looks a level up by id.
    pub fn find(&self, id: &str) -> Result<&Fixture, FixtureError> {
        let id = id.trim();
        self.levels
            .iter()
            .find(|level| level.id == id)
            .ok_or_else(|| FixtureError::UnknownLevel {
                id: id.to_string(),
                available: self.levels.iter().map(|l| l.id.clone()).collect(),
            })
    }

    pub fn first(&self) -> Option<&Fixture> {
        self.levels.first()
    }

    pub fn levels(&self) -> &[Fixture] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
