use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::de::DeserializeOwned;

use crate::app::{EventHandler, ObjectModel, ObjectStateDef, TilePos, HERO_ID, ObjectId};
use crate::script::commands::CommandDef;
use crate::script::{CommandTree, NodeId, Reaction, Value, EVENT_TIME};

use super::database::{ContentDatabase, MapDef, PlacedObject};
use super::types::{CommonsFile, MapFile, ObjectFileDef, ScriptEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    JsonMalformed,
    InvalidIndent,
    OrphanElse,
    OrphanChoice,
    OrphanBreak,
    ChoiceCountMismatch,
    UnknownCommonReaction,
    UnknownMap,
    DuplicateId,
    InvalidValue,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
    /// Position inside the JSON document, e.g. `objects[2].events[0]`.
    pub json_path: Option<String>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {} (file={}", self.code, self.message, self.file_path.display())?;
        if let Some(path) = &self.json_path {
            write!(f, ", at={path}")?;
        }
        if let Some(loc) = self.location {
            write!(f, ", line={}, column={}", loc.line, loc.column)?;
        }
        f.write_str(")")
    }
}

impl std::error::Error for ContentCompileError {}

/// Raw text of one content file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Ids every script may refer to, gathered before any script compiles.
struct Scope<'a> {
    file_path: &'a Path,
    common_ids: &'a BTreeSet<u32>,
    map_ids: &'a BTreeSet<u32>,
}

impl Scope<'_> {
    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        json_path: String,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: None,
            json_path: Some(json_path),
        }
    }
}

pub fn compile_content(
    commons: &SourceFile,
    maps: &[SourceFile],
) -> Result<ContentDatabase, ContentCompileError> {
    let commons_file: CommonsFile = parse_json(commons)?;

    let mut common_ids = BTreeSet::new();
    for (index, common) in commons_file.common_reactions.iter().enumerate() {
        if !common_ids.insert(common.id) {
            return Err(ContentCompileError {
                code: ContentErrorCode::DuplicateId,
                message: format!("common reaction id {} is defined twice", common.id),
                file_path: commons.path.clone(),
                location: None,
                json_path: Some(format!("common_reactions[{index}]")),
            });
        }
    }

    let mut map_files = Vec::with_capacity(maps.len());
    let mut map_ids = BTreeSet::new();
    for source in maps {
        let map: MapFile = parse_json(source)?;
        if !map_ids.insert(map.id) {
            return Err(ContentCompileError {
                code: ContentErrorCode::DuplicateId,
                message: format!("map id {} is defined by more than one file", map.id),
                file_path: source.path.clone(),
                location: None,
                json_path: Some("id".to_string()),
            });
        }
        map_files.push((source, map));
    }

    let scope = Scope {
        file_path: &commons.path,
        common_ids: &common_ids,
        map_ids: &map_ids,
    };
    let mut compiled_commons = BTreeMap::new();
    for (index, common) in commons_file.common_reactions.iter().enumerate() {
        let reaction = compile_script(
            &scope,
            &common.name,
            &common.commands,
            common.blocking_hero,
            &format!("common_reactions[{index}].commands"),
        )?;
        compiled_commons.insert(common.id, Rc::new(reaction));
    }
    let hero = compile_object_model(&scope, &commons_file.hero, "hero")?;

    let mut compiled_maps = BTreeMap::new();
    for (source, map) in map_files {
        let scope = Scope {
            file_path: &source.path,
            common_ids: &common_ids,
            map_ids: &map_ids,
        };
        compiled_maps.insert(map.id, compile_map(&scope, map)?);
    }

    Ok(ContentDatabase::new(
        compiled_commons,
        compiled_maps,
        Some(Rc::new(hero)),
    ))
}

fn parse_json<T: DeserializeOwned>(source: &SourceFile) -> Result<T, ContentCompileError> {
    let mut deserializer = serde_json::Deserializer::from_str(&source.text);
    let parsed = serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let json_path = error.path().to_string();
        let inner = error.into_inner();
        ContentCompileError {
            code: ContentErrorCode::JsonMalformed,
            message: format!("invalid content JSON: {inner}"),
            file_path: source.path.clone(),
            location: Some(SourceLocation {
                line: inner.line(),
                column: inner.column(),
            }),
            json_path: (json_path != ".").then_some(json_path),
        }
    })?;
    deserializer.end().map_err(|error| ContentCompileError {
        code: ContentErrorCode::JsonMalformed,
        message: format!("trailing characters after content JSON: {error}"),
        file_path: source.path.clone(),
        location: Some(SourceLocation {
            line: error.line(),
            column: error.column(),
        }),
        json_path: None,
    })?;
    Ok(parsed)
}

fn compile_map(scope: &Scope<'_>, map: MapFile) -> Result<MapDef, ContentCompileError> {
    if map.width <= 0 || map.height <= 0 {
        return Err(scope.error(
            ContentErrorCode::InvalidValue,
            format!("map size {}x{} must be positive", map.width, map.height),
            "width".to_string(),
        ));
    }
    let in_bounds = |x: i32, y: i32| (0..map.width).contains(&x) && (0..map.height).contains(&y);
    if !in_bounds(map.hero_start.x, map.hero_start.y) {
        return Err(scope.error(
            ContentErrorCode::InvalidValue,
            "hero start lies outside the map".to_string(),
            "hero_start".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    let mut objects = Vec::with_capacity(map.objects.len());
    for (index, def) in map.objects.iter().enumerate() {
        let path = format!("objects[{index}]");
        let id = ObjectId(def.id);
        if id == HERO_ID || !seen.insert(id) {
            return Err(scope.error(
                ContentErrorCode::DuplicateId,
                format!("object id {id} is already taken on map {}", map.id),
                format!("{path}.id"),
            ));
        }
        if !in_bounds(def.x, def.y) {
            return Err(scope.error(
                ContentErrorCode::InvalidValue,
                format!("object '{}' lies outside the map", def.name),
                path,
            ));
        }
        let model = compile_object_model(scope, def, &path)?;
        let initial_states = match &def.initial_states {
            Some(states) => {
                if let Some(unknown) = states.iter().find(|state| !model.has_state(**state)) {
                    return Err(scope.error(
                        ContentErrorCode::InvalidValue,
                        format!("initial state {unknown} is not declared by '{}'", def.name),
                        format!("{path}.initial_states"),
                    ));
                }
                states.clone()
            }
            None => model.states.first().map_or_else(Vec::new, |state| vec![state.id]),
        };
        objects.push(PlacedObject {
            id,
            name: def.name.clone(),
            position: TilePos::new(def.x, def.y),
            orientation: def.orientation,
            initial_states,
            model: Rc::new(model),
        });
    }

    Ok(MapDef {
        id: map.id,
        name: map.name,
        width: map.width,
        height: map.height,
        hero_start: TilePos::new(map.hero_start.x, map.hero_start.y),
        hero_orientation: map.hero_orientation,
        objects,
    })
}

fn compile_object_model(
    scope: &Scope<'_>,
    def: &ObjectFileDef,
    path: &str,
) -> Result<ObjectModel, ContentCompileError> {
    let mut states = Vec::with_capacity(def.states.len());
    for (index, state) in def.states.iter().enumerate() {
        let state_path = format!("{path}.states[{index}]");
        if states.iter().any(|known: &ObjectStateDef| known.id == state.id) {
            return Err(scope.error(
                ContentErrorCode::DuplicateId,
                format!("state {} of '{}' is declared twice", state.id, def.name),
                state_path,
            ));
        }
        let route = if state.route.is_empty() {
            None
        } else {
            let name = format!("{} route (state {})", def.name, state.id);
            let route_path = format!("{state_path}.route");
            let reaction = compile_script(scope, &name, &state.route, false, &route_path)?;
            Some(Rc::new(reaction))
        };
        states.push(ObjectStateDef {
            id: state.id,
            direction_fix: state.direction_fix,
            route,
        });
    }

    let mut handlers = Vec::with_capacity(def.events.len());
    for (index, event) in def.events.iter().enumerate() {
        let event_path = format!("{path}.events[{index}]");
        if event.system && event.event_id == EVENT_TIME {
            validate_time_parameters(scope, &event.parameters, &event_path)?;
        }
        let mut reactions = BTreeMap::new();
        for (reaction_index, reaction) in event.reactions.iter().enumerate() {
            let reaction_path = format!("{event_path}.reactions[{reaction_index}]");
            if !states.iter().any(|state| state.id == reaction.state) {
                return Err(scope.error(
                    ContentErrorCode::InvalidValue,
                    format!("'{}' has no state {}", def.name, reaction.state),
                    format!("{reaction_path}.state"),
                ));
            }
            let name = format!("{} event {} (state {})", def.name, event.event_id, reaction.state);
            let compiled = compile_script(
                scope,
                &name,
                &reaction.commands,
                reaction.blocking_hero,
                &format!("{reaction_path}.commands"),
            )?;
            if reactions.insert(reaction.state, Rc::new(compiled)).is_some() {
                return Err(scope.error(
                    ContentErrorCode::DuplicateId,
                    format!("state {} has two reactions for one event", reaction.state),
                    reaction_path,
                ));
            }
        }
        handlers.push(EventHandler {
            is_system: event.system,
            event_id: event.event_id,
            parameters: event.parameters.clone(),
            reactions,
        });
    }

    Ok(ObjectModel {
        states,
        handlers,
        only_one_event_per_frame: def.only_one_event_per_frame,
        can_be_triggered_by_another_object: def.can_be_triggered_by_another_object,
        through: def.through,
    })
}

fn validate_time_parameters(
    scope: &Scope<'_>,
    parameters: &[Option<Value>],
    path: &str,
) -> Result<(), ContentCompileError> {
    let valid = matches!(
        parameters,
        [Some(Value::Number(interval)), Some(Value::Bool(_))] if *interval >= 0.0
    );
    if valid {
        return Ok(());
    }
    Err(scope.error(
        ContentErrorCode::InvalidValue,
        "time events take [interval_ticks >= 0, repeat]".to_string(),
        format!("{path}.parameters"),
    ))
}

/// Rebuilds the command tree from pre-order entries. Each entry nests under
/// the closest earlier entry one indent level up.
fn compile_script(
    scope: &Scope<'_>,
    name: &str,
    entries: &[ScriptEntry],
    blocking_hero: bool,
    path: &str,
) -> Result<Reaction, ContentCompileError> {
    let mut tree = CommandTree::new();
    let mut parents = vec![tree.root()];
    let mut last_added: Option<NodeId> = None;
    let mut menus: Vec<(NodeId, usize, String)> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let entry_path = format!("{path}[{index}]");
        let depth = entry.indent;
        if depth == parents.len() {
            match last_added {
                Some(node) => parents.push(node),
                None => {
                    return Err(scope.error(
                        ContentErrorCode::InvalidIndent,
                        "script must start at indent 0".to_string(),
                        entry_path,
                    ))
                }
            }
        } else if depth > parents.len() {
            return Err(scope.error(
                ContentErrorCode::InvalidIndent,
                format!("indent jumps from {} to {depth}", parents.len() - 1),
                entry_path,
            ));
        } else {
            parents.truncate(depth + 1);
        }
        let parent = parents[depth];
        let parent_kind = (!tree.is_root(parent)).then(|| tree.command(parent).kind_name());

        match &entry.command {
            CommandDef::Else => {
                let previous = tree.last_child(parent).map(|node| tree.command(node).kind_name());
                if previous != Some("if") {
                    return Err(scope.error(
                        ContentErrorCode::OrphanElse,
                        "else must directly follow an if at the same indent".to_string(),
                        entry_path,
                    ));
                }
            }
            CommandDef::Choice => {
                if parent_kind != Some("display_choice") {
                    return Err(scope.error(
                        ContentErrorCode::OrphanChoice,
                        "choice must be nested under display_choice".to_string(),
                        entry_path,
                    ));
                }
            }
            CommandDef::Break => {
                let in_loop = std::iter::once(parent)
                    .chain(tree.ancestors(parent))
                    .any(|node| !tree.is_root(node) && tree.command(node).kind_name() == "while");
                if !in_loop {
                    return Err(scope.error(
                        ContentErrorCode::OrphanBreak,
                        "break must be inside a while loop".to_string(),
                        entry_path,
                    ));
                }
            }
            CommandDef::CallCommon { id, .. } if !scope.common_ids.contains(id) => {
                return Err(scope.error(
                    ContentErrorCode::UnknownCommonReaction,
                    format!("common reaction {id} does not exist"),
                    entry_path,
                ));
            }
            CommandDef::Teleport { map_id, .. } if !scope.map_ids.contains(map_id) => {
                return Err(scope.error(
                    ContentErrorCode::UnknownMap,
                    format!("map {map_id} does not exist"),
                    entry_path,
                ));
            }
            CommandDef::DisplayChoice {
                choices,
                cancel_index,
            } => {
                if cancel_index.is_some_and(|cancel| cancel >= choices.len()) {
                    return Err(scope.error(
                        ContentErrorCode::InvalidValue,
                        format!("cancel_index is out of range for {} choices", choices.len()),
                        entry_path,
                    ));
                }
            }
            _ => {}
        }
        if parent_kind == Some("display_choice") && !matches!(entry.command, CommandDef::Choice) {
            return Err(scope.error(
                ContentErrorCode::ChoiceCountMismatch,
                "display_choice may only contain choice branches".to_string(),
                entry_path,
            ));
        }

        let followed_by_else = matches!(entry.command, CommandDef::If { .. })
            && entries[index + 1..]
                .iter()
                .find(|later| later.indent <= depth)
                .is_some_and(|later| {
                    later.indent == depth && matches!(later.command, CommandDef::Else)
                });
        let expected_choices = match &entry.command {
            CommandDef::DisplayChoice { choices, .. } => Some(choices.len()),
            _ => None,
        };

        let node = tree.add_boxed(parent, entry.command.clone().build(followed_by_else));
        if let Some(expected) = expected_choices {
            menus.push((node, expected, entry_path));
        }
        last_added = Some(node);
    }

    for (node, expected, entry_path) in menus {
        let found = tree.children(node).count();
        if found != expected {
            return Err(scope.error(
                ContentErrorCode::ChoiceCountMismatch,
                format!("display_choice lists {expected} choices but has {found} branches"),
                entry_path,
            ));
        }
    }

    Ok(Reaction::new(name, tree, blocking_hero))
}
