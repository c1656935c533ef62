//! Serialized shapes of the JSON content files.

use serde::Deserialize;

use crate::app::Orientation;
use crate::script::commands::CommandDef;
use crate::script::Value;

fn default_true() -> bool {
    true
}

/// One line of a script: the command and how deep it is nested.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptEntry {
    #[serde(default)]
    pub indent: usize,
    #[serde(flatten)]
    pub command: CommandDef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommonsFile {
    pub hero: ObjectFileDef,
    #[serde(default)]
    pub common_reactions: Vec<CommonReactionDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommonReactionDef {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub blocking_hero: bool,
    pub commands: Vec<ScriptEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapFile {
    pub id: u32,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub hero_start: PositionDef,
    #[serde(default)]
    pub hero_orientation: Orientation,
    #[serde(default)]
    pub objects: Vec<ObjectFileDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionDef {
    pub x: i32,
    pub y: i32,
}

/// A map object, or the hero model when it appears in the commons file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectFileDef {
    #[serde(default)]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub through: bool,
    #[serde(default)]
    pub only_one_event_per_frame: bool,
    #[serde(default = "default_true")]
    pub can_be_triggered_by_another_object: bool,
    /// Active states at load; defaults to the first declared state.
    #[serde(default)]
    pub initial_states: Option<Vec<u32>>,
    #[serde(default)]
    pub states: Vec<StateFileDef>,
    #[serde(default)]
    pub events: Vec<EventFileDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateFileDef {
    pub id: u32,
    #[serde(default)]
    pub direction_fix: bool,
    #[serde(default)]
    pub route: Vec<ScriptEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventFileDef {
    #[serde(default)]
    pub system: bool,
    pub event_id: u32,
    #[serde(default)]
    pub parameters: Vec<Option<Value>>,
    pub reactions: Vec<ReactionFileDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionFileDef {
    pub state: u32,
    #[serde(default = "default_true")]
    pub blocking_hero: bool,
    pub commands: Vec<ScriptEntry>,
}
