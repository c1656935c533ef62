use std::collections::BTreeMap;
use std::rc::Rc;

use crate::app::{ObjectId, ObjectModel, Orientation, TilePos};
use crate::script::Reaction;

/// An object as it is placed when its map loads.
#[derive(Debug, Clone)]
pub struct PlacedObject {
    pub id: ObjectId,
    pub name: String,
    pub position: TilePos,
    pub orientation: Orientation,
    pub initial_states: Vec<u32>,
    pub model: Rc<ObjectModel>,
}

#[derive(Debug, Clone)]
pub struct MapDef {
    pub id: u32,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub hero_start: TilePos,
    pub hero_orientation: Orientation,
    pub objects: Vec<PlacedObject>,
}

/// Compiled game content shared by every scene.
#[derive(Debug, Default)]
pub struct ContentDatabase {
    commons: BTreeMap<u32, Rc<Reaction>>,
    maps: BTreeMap<u32, MapDef>,
    hero: Option<Rc<ObjectModel>>,
}

impl ContentDatabase {
    pub fn new(
        commons: BTreeMap<u32, Rc<Reaction>>,
        maps: BTreeMap<u32, MapDef>,
        hero: Option<Rc<ObjectModel>>,
    ) -> Self {
        Self {
            commons,
            maps,
            hero,
        }
    }

    pub fn common_reaction(&self, id: u32) -> Option<Rc<Reaction>> {
        self.commons.get(&id).cloned()
    }

    pub fn common_reaction_count(&self) -> usize {
        self.commons.len()
    }

    pub fn map(&self, id: u32) -> Option<&MapDef> {
        self.maps.get(&id)
    }

    pub fn map_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.maps.keys().copied()
    }

    pub fn hero_model(&self) -> Rc<ObjectModel> {
        self.hero.clone().unwrap_or_default()
    }
}
