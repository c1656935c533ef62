use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::script::{
    receive_event, Diagnostic, SceneRequest, SceneScheduler, Trigger, EVENT_ACTION, EVENT_TIME,
};

use super::{
    HudFrame, InputEvent, InputKey, InputSnapshot, MapObject, ObjectId, Orientation, Scene,
    SceneCommand, SceneWorld, TilePos, HERO_ID,
};

/// Ticks the hero waits between two steps while a direction is held.
pub const HERO_STEP_TICKS: u32 = 4;

const MOVE_KEYS: [(InputKey, Orientation); 4] = [
    (InputKey::Up, Orientation::Up),
    (InputKey::Down, Orientation::Down),
    (InputKey::Left, Orientation::Left),
    (InputKey::Right, Orientation::Right),
];

/// A loaded map: its objects, the hero and the reactions running on them.
pub struct MapScene {
    map_id: u32,
    entry: Option<(TilePos, Option<Orientation>)>,
    scheduler: SceneScheduler,
    diagnostics: Vec<Diagnostic>,
    step_cooldown: u32,
}

impl MapScene {
    pub fn new(map_id: u32) -> Self {
        Self {
            map_id,
            entry: None,
            scheduler: SceneScheduler::new(),
            diagnostics: Vec::new(),
            step_cooldown: 0,
        }
    }

    /// The map as entered through a teleport.
    pub fn entering(map_id: u32, position: TilePos, orientation: Option<Orientation>) -> Self {
        Self {
            entry: Some((position, orientation)),
            ..Self::new(map_id)
        }
    }

    pub fn map_id(&self) -> u32 {
        self.map_id
    }

    pub fn scheduler(&self) -> &SceneScheduler {
        &self.scheduler
    }

    fn fire_time_events(&mut self, world: &mut SceneWorld) {
        let ids: Vec<ObjectId> = world.object_ids().collect();
        for id in ids {
            let Some(object) = world.object_mut(id) else {
                continue;
            };
            if object.is_removed() {
                continue;
            }
            object.advance_clocks();
            let due = object.due_clocks();
            if due.is_empty() {
                continue;
            }

            // A clock that could not start its reaction stays due for the next tick.
            let mut fired = Vec::with_capacity(due.len());
            for (index, parameters) in due {
                if !receive_event(
                    &mut self.scheduler,
                    world,
                    Some(id),
                    id,
                    true,
                    EVENT_TIME,
                    &parameters,
                ) {
                    break;
                }
                fired.push(index);
            }
            if let Some(object) = world.object_mut(id) {
                object.clocks_fired(&fired);
            }
        }
    }

    fn start_routes(&mut self, world: &mut SceneWorld) {
        let ids: Vec<ObjectId> = world.object_ids().collect();
        for id in ids {
            let Some(object) = world.object(id) else {
                continue;
            };
            if object.is_removed() || object.is_paused() {
                continue;
            }
            let Some(route) = object.route() else {
                continue;
            };
            if self.scheduler.is_running(Some(id), &route) {
                continue;
            }
            self.scheduler
                .add_reaction(world, &route, Trigger::for_object(id), true);
        }
    }

    fn move_hero(&mut self, input: &InputSnapshot, world: &mut SceneWorld) {
        if self.step_cooldown > 0 {
            self.step_cooldown -= 1;
            return;
        }
        let Some(direction) = MOVE_KEYS
            .iter()
            .find(|(key, _)| input.is_down(*key))
            .map(|(_, direction)| *direction)
        else {
            return;
        };
        let Some(hero_id) = world.hero_id() else {
            return;
        };
        let Some(hero) = world.object(hero_id) else {
            return;
        };
        let target = hero.position.step(direction);
        let passable = world.is_passable(target, hero_id);
        let Some(hero) = world.object_mut(hero_id) else {
            return;
        };
        if !hero.direction_fix() {
            hero.orientation = direction;
        }
        if passable {
            hero.position = target;
            self.step_cooldown = HERO_STEP_TICKS - 1;
        }
    }

    /// Sends the action event to whatever stands in front of the hero, or
    /// failing that, to what shares the hero's tile.
    fn hero_action(&mut self, world: &mut SceneWorld) {
        let Some(hero) = world.hero() else {
            return;
        };
        let hero_id = hero.id;
        let here = hero.position;
        let front = here.step(hero.orientation);

        let others = |position| {
            let mut ids = world.objects_at(position);
            ids.retain(|id| *id != hero_id);
            ids
        };
        let mut targets = others(front);
        if targets.is_empty() {
            targets = others(here);
        }
        debug!(targets = targets.len(), x = front.x, y = front.y, "hero_action");

        for target in targets {
            receive_event(
                &mut self.scheduler,
                world,
                Some(hero_id),
                target,
                true,
                EVENT_ACTION,
                &[],
            );
        }
    }
}

impl Scene for MapScene {
    fn name(&self) -> String {
        format!("map_{:04}", self.map_id)
    }

    fn load(&mut self, world: &mut SceneWorld) {
        let Some(content) = world.content().cloned() else {
            warn!(map_id = self.map_id, "map_load_without_content");
            return;
        };
        let Some(map) = content.map(self.map_id) else {
            warn!(map_id = self.map_id, "map_not_found");
            return;
        };

        world.set_map_id(map.id);
        world.set_size(map.width, map.height);
        for placed in &map.objects {
            let mut object = MapObject::new(
                placed.id,
                placed.name.clone(),
                placed.position,
                Rc::clone(&placed.model),
            )
            .with_orientation(placed.orientation);
            object.set_states(placed.initial_states.clone());
            world.insert_object(object);
        }

        let (position, orientation) = match self.entry {
            Some((position, orientation)) => {
                (position, orientation.unwrap_or(map.hero_orientation))
            }
            None => (map.hero_start, map.hero_orientation),
        };
        world.insert_object(
            MapObject::new(HERO_ID, "Hero", position, content.hero_model())
                .with_orientation(orientation),
        );
        world.set_hero(HERO_ID);
        info!(
            map_id = map.id,
            map_name = %map.name,
            hero_x = position.x,
            hero_y = position.y,
            "map_loaded"
        );
    }

    fn update(&mut self, input: &InputSnapshot, world: &mut SceneWorld) -> SceneCommand {
        self.fire_time_events(world);
        self.start_routes(world);

        let request = self.scheduler.update(world);
        self.diagnostics.extend(self.scheduler.take_diagnostics());

        let command = match request {
            Some(SceneRequest::Teleport {
                map_id,
                position,
                orientation,
            }) => {
                info!(
                    from_map = self.map_id,
                    to_map = map_id,
                    x = position.x,
                    y = position.y,
                    "map_transfer"
                );
                SceneCommand::Replace(Box::new(MapScene::entering(map_id, position, orientation)))
            }
            None => {
                if !self.scheduler.blocking_hero() {
                    self.move_hero(input, world);
                }
                SceneCommand::None
            }
        };
        world.end_frame();
        command
    }

    fn on_input(&mut self, event: &InputEvent, world: &mut SceneWorld) {
        self.scheduler.on_input(event);
        if matches!(event, InputEvent::KeyPressed { key: InputKey::Action })
            && !self.scheduler.blocking_hero()
        {
            self.hero_action(world);
        }
    }

    fn draw_hud(&self, _world: &SceneWorld, hud: &mut HudFrame) {
        self.scheduler.draw_hud(hud);
    }

    fn close(&mut self, world: &mut SceneWorld) {
        self.scheduler.close(world);
        world.clear();
    }

    fn interpreter_counts(&self) -> (usize, usize) {
        (self.scheduler.blocking_count(), self.scheduler.parallel_count())
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{compile_content, SourceFile};
    use crate::script::Value;

    const COMMONS: &str = r#"{
        "hero": {"name": "Hero", "states": [{"id": 1}]},
        "common_reactions": []
    }"#;

    const VILLAGE: &str = r#"{
        "id": 1, "name": "Village", "width": 10, "height": 10,
        "hero_start": {"x": 2, "y": 2}, "hero_orientation": "right",
        "objects": [
            {"id": 1, "name": "Elder", "x": 3, "y": 2,
             "states": [{"id": 1}],
             "events": [{"system": true, "event_id": 0, "reactions": [{"state": 1, "commands": [
                {"kind": "show_text", "speaker": "Elder", "text": "Welcome."},
                {"kind": "set_variable", "variable": 1, "value": 1}
             ]}]}]},
            {"id": 2, "name": "Bell", "x": 9, "y": 9,
             "states": [{"id": 1}],
             "events": [{"system": true, "event_id": 1, "parameters": [3, true],
                "reactions": [{"state": 1, "blocking_hero": false, "commands": [
                    {"kind": "set_variable", "variable": 2, "operation": "add", "value": 1}
                ]}]}]},
            {"id": 3, "name": "Guard", "x": 0, "y": 5,
             "states": [{"id": 1, "route": [
                {"kind": "move_object", "steps": ["right"], "frames_per_step": 1}
             ]}]},
            {"id": 4, "name": "Door", "x": 2, "y": 3, "through": true,
             "states": [{"id": 1}],
             "events": [{"system": true, "event_id": 0, "reactions": [{"state": 1, "commands": [
                {"kind": "teleport", "map_id": 2, "x": 1, "y": 1, "orientation": "up"}
             ]}]}]}
        ]
    }"#;

    const HOUSE: &str = r#"{
        "id": 2, "name": "House", "width": 4, "height": 4, "hero_start": {"x": 0, "y": 0}
    }"#;

    fn loaded_village() -> (MapScene, SceneWorld) {
        let content = compile_content(
            &SourceFile::new("commons.json", COMMONS),
            &[
                SourceFile::new("map_0001.json", VILLAGE),
                SourceFile::new("map_0002.json", HOUSE),
            ],
        )
        .expect("compile village");
        let mut world = SceneWorld::default();
        world.set_content(Rc::new(content));
        let mut scene = MapScene::new(1);
        scene.load(&mut world);
        (scene, world)
    }

    fn press(scene: &mut MapScene, world: &mut SceneWorld, key: InputKey) {
        scene.on_input(&InputEvent::KeyPressed { key }, world);
    }

    fn tick(scene: &mut MapScene, world: &mut SceneWorld) -> SceneCommand {
        scene.update(&InputSnapshot::empty(), world)
    }

    #[test]
    fn load_places_objects_and_hero() {
        let (_scene, world) = loaded_village();
        assert_eq!(world.map_id(), Some(1));
        assert_eq!(world.object_count(), 5);
        let hero = world.hero().expect("hero");
        assert_eq!(hero.position, TilePos::new(2, 2));
        assert_eq!(hero.orientation, Orientation::Right);
    }

    #[test]
    fn action_talks_to_the_object_in_front() {
        let (mut scene, mut world) = loaded_village();
        press(&mut scene, &mut world, InputKey::Action);
        tick(&mut scene, &mut world);

        let mut hud = HudFrame::default();
        scene.draw_hud(&world, &mut hud);
        assert_eq!(hud.lines(), ["Elder: Welcome."]);
        assert!(scene.scheduler().blocking_hero());
        assert_eq!(
            world.object(ObjectId(1)).expect("elder").orientation,
            Orientation::Left
        );

        press(&mut scene, &mut world, InputKey::Action);
        tick(&mut scene, &mut world);
        assert!(scene.scheduler().blocking_hero());
        tick(&mut scene, &mut world);
        assert_eq!(world.variable(1), Value::Number(1.0));
        tick(&mut scene, &mut world);
        assert!(!scene.scheduler().blocking_hero());
    }

    #[test]
    fn hero_cannot_walk_while_blocked() {
        let (mut scene, mut world) = loaded_village();
        press(&mut scene, &mut world, InputKey::Action);
        tick(&mut scene, &mut world);

        let held = InputSnapshot::empty().with_key_down(InputKey::Up, true);
        scene.update(&held, &mut world);
        assert_eq!(world.hero().expect("hero").position, TilePos::new(2, 2));
    }

    #[test]
    fn held_direction_walks_on_a_cadence() {
        let (mut scene, mut world) = loaded_village();
        let held = InputSnapshot::empty().with_key_down(InputKey::Up, true);
        for _ in 0..HERO_STEP_TICKS {
            scene.update(&held, &mut world);
        }
        assert_eq!(world.hero().expect("hero").position, TilePos::new(2, 1));
        scene.update(&held, &mut world);
        assert_eq!(world.hero().expect("hero").position, TilePos::new(2, 0));
        assert_eq!(world.hero().expect("hero").orientation, Orientation::Up);
    }

    #[test]
    fn time_event_repeats_on_its_interval() {
        let (mut scene, mut world) = loaded_village();
        for _ in 0..3 {
            tick(&mut scene, &mut world);
        }
        assert_eq!(world.variable(2), Value::Number(1.0));
        for _ in 0..3 {
            tick(&mut scene, &mut world);
        }
        assert_eq!(world.variable(2), Value::Number(2.0));
    }

    #[test]
    fn routes_restart_after_each_lap() {
        let (mut scene, mut world) = loaded_village();
        for _ in 0..6 {
            tick(&mut scene, &mut world);
        }
        let guard = world.object(ObjectId(3)).expect("guard");
        assert!(guard.position.x >= 2, "guard at {:?}", guard.position);
        assert_eq!(guard.pause_count(), 0);
    }

    #[test]
    fn action_on_own_tile_teleports() {
        let (mut scene, mut world) = loaded_village();
        world.object_mut(HERO_ID).expect("hero").orientation = Orientation::Up;
        world.object_mut(HERO_ID).expect("hero").position = TilePos::new(2, 3);
        press(&mut scene, &mut world, InputKey::Action);

        match tick(&mut scene, &mut world) {
            SceneCommand::Replace(next) => assert_eq!(next.name(), "map_0002"),
            _ => panic!("expected a map transfer"),
        }
    }

    #[test]
    fn close_force_finishes_and_clears() {
        let (mut scene, mut world) = loaded_village();
        press(&mut scene, &mut world, InputKey::Action);
        tick(&mut scene, &mut world);
        scene.close(&mut world);

        assert_eq!(scene.interpreter_counts(), (0, 0));
        assert_eq!(world.object_count(), 0);
    }
}
