use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::content::ContentDatabase;
use crate::script::{Reaction, Value, EVENT_TIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The player-controlled object keeps this id on every map.
pub const HERO_ID: ObjectId = ObjectId(0);

/// Tile coordinates; `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Orientation) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Orientation {
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Orientation::Up => (0, -1),
            Orientation::Down => (0, 1),
            Orientation::Left => (-1, 0),
            Orientation::Right => (1, 0),
        }
    }

    /// Direction from `from` toward `to`, preferring the dominant axis.
    pub fn towards(from: TilePos, to: TilePos) -> Option<Self> {
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        if dx == 0 && dy == 0 {
            return None;
        }
        Some(if dx.abs() > dy.abs() {
            if dx > 0 {
                Orientation::Right
            } else {
                Orientation::Left
            }
        } else if dy > 0 {
            Orientation::Down
        } else {
            Orientation::Up
        })
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStateDef {
    pub id: u32,
    pub direction_fix: bool,
    /// Movement reaction replayed while the state is active.
    pub route: Option<Rc<Reaction>>,
}

impl ObjectStateDef {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            direction_fix: false,
            route: None,
        }
    }
}

/// Binds an event to one reaction per object state.
#[derive(Debug, Clone)]
pub struct EventHandler {
    pub is_system: bool,
    pub event_id: u32,
    /// Filter per parameter position; `None` accepts anything.
    pub parameters: Vec<Option<Value>>,
    pub reactions: BTreeMap<u32, Rc<Reaction>>,
}

impl EventHandler {
    pub fn matches(&self, is_system: bool, event_id: u32, parameters: &[Value]) -> bool {
        self.is_system == is_system
            && self.event_id == event_id
            && self
                .parameters
                .iter()
                .enumerate()
                .all(|(index, filter)| match filter {
                    Some(expected) => parameters.get(index) == Some(expected),
                    None => true,
                })
    }
}

/// Shared behaviour of an object: its states and what it reacts to.
#[derive(Debug, Clone)]
pub struct ObjectModel {
    pub states: Vec<ObjectStateDef>,
    pub handlers: Vec<EventHandler>,
    pub only_one_event_per_frame: bool,
    pub can_be_triggered_by_another_object: bool,
    /// Other objects may share its tile.
    pub through: bool,
}

impl Default for ObjectModel {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            handlers: Vec::new(),
            only_one_event_per_frame: false,
            can_be_triggered_by_another_object: true,
            through: false,
        }
    }
}

impl ObjectModel {
    pub fn state(&self, id: u32) -> Option<&ObjectStateDef> {
        self.states.iter().find(|state| state.id == id)
    }

    pub fn has_state(&self, id: u32) -> bool {
        self.state(id).is_some()
    }

    pub fn reactions_for<'a>(
        &'a self,
        is_system: bool,
        event_id: u32,
        state: u32,
        parameters: &'a [Value],
    ) -> impl Iterator<Item = &'a Rc<Reaction>> + 'a {
        self.handlers
            .iter()
            .filter(move |handler| handler.matches(is_system, event_id, parameters))
            .filter_map(move |handler| handler.reactions.get(&state))
    }

    fn time_clocks(&self) -> Vec<TimeClock> {
        self.handlers
            .iter()
            .filter(|handler| handler.is_system && handler.event_id == EVENT_TIME)
            .map(|handler| {
                let parameters: Vec<Value> = handler
                    .parameters
                    .iter()
                    .map(|filter| filter.clone().unwrap_or_default())
                    .collect();
                TimeClock::new(parameters)
            })
            .collect()
    }
}

/// Counts ticks toward one time event of an object.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeClock {
    interval_ticks: u32,
    repeat: bool,
    elapsed: u32,
    parameters: Vec<Value>,
}

impl TimeClock {
    fn new(parameters: Vec<Value>) -> Self {
        let interval_ticks = parameters
            .first()
            .and_then(Value::as_number)
            .map_or(0, |ticks| ticks.max(0.0).round() as u32);
        let repeat = parameters.get(1).and_then(Value::as_bool).unwrap_or(false);
        Self {
            interval_ticks,
            repeat,
            elapsed: 0,
            parameters,
        }
    }

    pub fn is_due(&self) -> bool {
        self.elapsed >= self.interval_ticks
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}

#[derive(Debug)]
pub struct MapObject {
    pub id: ObjectId,
    pub name: String,
    pub position: TilePos,
    pub orientation: Orientation,
    states: Vec<u32>,
    model: Rc<ObjectModel>,
    pause_count: u32,
    received_one_event: bool,
    removed: bool,
    clocks: Vec<TimeClock>,
}

impl MapObject {
    pub fn new(
        id: ObjectId,
        name: impl Into<String>,
        position: TilePos,
        model: Rc<ObjectModel>,
    ) -> Self {
        let states = model.states.first().map_or_else(Vec::new, |state| vec![state.id]);
        let clocks = model.time_clocks();
        Self {
            id,
            name: name.into(),
            position,
            orientation: Orientation::default(),
            states,
            model,
            pause_count: 0,
            received_one_event: false,
            removed: false,
            clocks,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn model(&self) -> &Rc<ObjectModel> {
        &self.model
    }

    pub fn states(&self) -> &[u32] {
        &self.states
    }

    pub fn set_states(&mut self, states: Vec<u32>) {
        self.states = states;
    }

    pub fn add_state(&mut self, state: u32) {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
    }

    pub fn remove_state(&mut self, state: u32) {
        self.states.retain(|active| *active != state);
    }

    /// The first active state; it decides route and facing rules.
    pub fn current_state(&self) -> Option<&ObjectStateDef> {
        self.states.first().and_then(|id| self.model.state(*id))
    }

    pub fn direction_fix(&self) -> bool {
        self.current_state().is_some_and(|state| state.direction_fix)
    }

    pub fn route(&self) -> Option<Rc<Reaction>> {
        self.current_state().and_then(|state| state.route.clone())
    }

    pub fn face_towards(&mut self, target: TilePos) {
        if let Some(orientation) = Orientation::towards(self.position, target) {
            self.orientation = orientation;
        }
    }

    /// Each running reaction bound to the object holds its movement once.
    pub fn hold_pause(&mut self) {
        self.pause_count = self.pause_count.saturating_add(1);
    }

    pub fn release_pause(&mut self) {
        self.pause_count = self.pause_count.saturating_sub(1);
    }

    pub fn is_paused(&self) -> bool {
        self.pause_count > 0
    }

    pub fn pause_count(&self) -> u32 {
        self.pause_count
    }

    pub fn received_one_event(&self) -> bool {
        self.received_one_event
    }

    pub fn mark_received_event(&mut self) {
        self.received_one_event = true;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn advance_clocks(&mut self) {
        for clock in &mut self.clocks {
            clock.elapsed = clock.elapsed.saturating_add(1);
        }
    }

    /// Indices and parameters of every time event ready to fire.
    pub fn due_clocks(&self) -> Vec<(usize, Vec<Value>)> {
        self.clocks
            .iter()
            .enumerate()
            .filter(|(_, clock)| clock.is_due())
            .map(|(index, clock)| (index, clock.parameters.clone()))
            .collect()
    }

    /// Restarts repeating clocks that fired and drops the others.
    pub fn clocks_fired(&mut self, fired: &[usize]) {
        let mut fired = fired.to_vec();
        fired.sort_unstable();
        fired.dedup();
        for index in fired.into_iter().rev() {
            let Some(clock) = self.clocks.get_mut(index) else {
                continue;
            };
            if clock.repeat {
                clock.elapsed = 0;
            } else {
                self.clocks.remove(index);
            }
        }
    }

    pub fn clocks(&self) -> &[TimeClock] {
        &self.clocks
    }
}

/// Everything a map scene's scripts can see and change.
#[derive(Debug, Default)]
pub struct SceneWorld {
    map_id: Option<u32>,
    objects: BTreeMap<ObjectId, MapObject>,
    pending_removals: Vec<ObjectId>,
    variables: BTreeMap<u32, Value>,
    hero: Option<ObjectId>,
    size: Option<(i32, i32)>,
    content: Option<Rc<ContentDatabase>>,
}

impl SceneWorld {
    pub fn map_id(&self) -> Option<u32> {
        self.map_id
    }

    pub fn set_map_id(&mut self, map_id: u32) {
        self.map_id = Some(map_id);
    }

    pub fn insert_object(&mut self, object: MapObject) {
        self.objects.insert(object.id, object);
    }

    pub fn object(&self, id: ObjectId) -> Option<&MapObject> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut MapObject> {
        self.objects.get_mut(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &MapObject> {
        self.objects.values()
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn objects_at(&self, position: TilePos) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|object| !object.removed && object.position == position)
            .map(|object| object.id)
            .collect()
    }

    pub fn set_hero(&mut self, id: ObjectId) {
        self.hero = Some(id);
    }

    pub fn hero_id(&self) -> Option<ObjectId> {
        self.hero
    }

    pub fn hero(&self) -> Option<&MapObject> {
        self.hero.and_then(|id| self.object(id))
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        self.size = Some((width, height));
    }

    pub fn in_bounds(&self, position: TilePos) -> bool {
        match self.size {
            Some((width, height)) => {
                (0..width).contains(&position.x) && (0..height).contains(&position.y)
            }
            None => true,
        }
    }

    /// Whether `mover` may step onto `position`.
    pub fn is_passable(&self, position: TilePos, mover: ObjectId) -> bool {
        self.in_bounds(position)
            && self.objects.values().all(|object| {
                object.id == mover
                    || object.removed
                    || object.model.through
                    || object.position != position
            })
    }

    /// Marks the object removed; it leaves the world at [`SceneWorld::apply_pending`].
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        object.removed = true;
        self.pending_removals.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        for id in self.pending_removals.drain(..) {
            self.objects.remove(&id);
        }
    }

    /// Clears per-frame event flags and applies pending removals.
    pub fn end_frame(&mut self) {
        for object in self.objects.values_mut() {
            object.received_one_event = false;
        }
        self.apply_pending();
    }

    pub fn variable(&self, id: u32) -> Value {
        self.variables.get(&id).cloned().unwrap_or_default()
    }

    pub fn set_variable(&mut self, id: u32, value: Value) {
        self.variables.insert(id, value);
    }

    pub fn variables(&self) -> &BTreeMap<u32, Value> {
        &self.variables
    }

    pub fn set_variables(&mut self, variables: BTreeMap<u32, Value>) {
        self.variables = variables;
    }

    pub fn take_variables(&mut self) -> BTreeMap<u32, Value> {
        std::mem::take(&mut self.variables)
    }

    pub fn set_content(&mut self, content: Rc<ContentDatabase>) {
        self.content = Some(content);
    }

    pub fn content(&self) -> Option<&Rc<ContentDatabase>> {
        self.content.as_ref()
    }

    pub fn common_reaction(&self, id: u32) -> Option<Rc<Reaction>> {
        self.content
            .as_ref()
            .and_then(|content| content.common_reaction(id))
    }

    pub fn clear(&mut self) {
        self.map_id = None;
        self.objects.clear();
        self.pending_removals.clear();
        self.hero = None;
        self.size = None;
    }
}
