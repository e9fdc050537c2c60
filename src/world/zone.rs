use std::collections::HashMap;

use bitflags::bitflags;

use crate::{common::Location, network::ClientId};

use super::WorldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    Lobby,
    Casino,
    MyRoom,
    Field,
    Quest,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MapFlags: u32 {
        const MULTI_PARTY_AREA = 0x1;
        const UNKNOWN1 = 0x4;
    }
}

/// Inputs for a procedurally generated map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationParams {
    pub seed: u32,
    pub x_size: u32,
    pub y_size: u32,
}

/// Names a map inside an instance. Sessions hold this instead of a reference to the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapRef {
    pub instance: String,
    pub map: String,
}

impl MapRef {
    pub fn new(instance: &str, map: &str) -> Self {
        Self {
            instance: instance.to_string(),
            map: map.to_string(),
        }
    }
}

impl std::fmt::Display for MapRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.instance, self.map)
    }
}

/// One playable area.
#[derive(Debug, Clone)]
pub struct Map {
    pub name: String,
    pub zone_id: u32,
    pub variant_id: u32,
    pub map_type: MapType,
    pub flags: MapFlags,
    pub generation: Option<GenerationParams>,
    /// Where clients appear when they are moved here.
    pub default_location: Location,
    instance_name: String,
    clients: Vec<ClientId>,
}

impl Map {
    pub fn new(
        name: &str,
        zone_id: u32,
        variant_id: u32,
        map_type: MapType,
        flags: MapFlags,
    ) -> Self {
        Self {
            name: name.to_string(),
            zone_id,
            variant_id,
            map_type,
            flags,
            generation: None,
            default_location: Location::default(),
            instance_name: String::new(),
            clients: Vec::new(),
        }
    }

    pub fn with_generation(mut self, generation: GenerationParams) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Name of the instance this map belongs to.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn clients(&self) -> &[ClientId] {
        &self.clients
    }
}

/// Named group of maps sharing a lifetime and a player counter.
#[derive(Debug)]
pub struct Instance {
    pub name: String,
    maps: Vec<Map>,
    player_count: u32,
}

impl Instance {
    pub fn maps(&self) -> &[Map] {
        &self.maps
    }

    pub fn player_count(&self) -> u32 {
        self.player_count
    }

    fn map_mut(&mut self, name: &str) -> Option<&mut Map> {
        self.maps.iter_mut().find(|map| map.name == name)
    }
}

/// All instances on this ship, keyed by their unique name.
#[derive(Debug)]
pub struct ZoneManager {
    instances: HashMap<String, Instance>,
}

impl Default for ZoneManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneManager {
    pub const LOBBY: &'static str = "lobby";

    /// Starts with the lobby instance, which holds the lobby and the casino.
    pub fn new() -> Self {
        let mut manager = Self {
            instances: HashMap::new(),
        };

        manager.new_instance(
            Self::LOBBY,
            Map::new("lobby", 106, 0, MapType::Lobby, MapFlags::empty()),
        );
        manager
            .add_map_to_instance(
                Self::LOBBY,
                Map::new(
                    "casino",
                    104,
                    0,
                    MapType::Casino,
                    MapFlags::MULTI_PARTY_AREA | MapFlags::UNKNOWN1,
                ),
            )
            .expect("the lobby instance was just created");

        manager
    }

    pub fn instance_exists(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    /// Creates an instance holding `map`. Does nothing and returns false if the name is taken.
    pub fn new_instance(&mut self, name: &str, mut map: Map) -> bool {
        if self.instances.contains_key(name) {
            return false;
        }

        map.instance_name = name.to_string();
        self.instances.insert(
            name.to_string(),
            Instance {
                name: name.to_string(),
                maps: vec![map],
                player_count: 0,
            },
        );
        tracing::info!("Created instance {name}");

        true
    }

    /// Appends `map` unless the instance already has a map with that name.
    pub fn add_map_to_instance(&mut self, instance: &str, mut map: Map) -> Result<(), WorldError> {
        let Some(target) = self.instances.get_mut(instance) else {
            return Err(WorldError::InstanceNotFound(instance.to_string()));
        };

        if target.maps.iter().any(|existing| existing.name == map.name) {
            return Ok(());
        }

        map.instance_name = instance.to_string();
        target.maps.push(map);

        Ok(())
    }

    pub fn map(&self, map: &MapRef) -> Result<&Map, WorldError> {
        let instance = self
            .instances
            .get(&map.instance)
            .ok_or_else(|| WorldError::InstanceNotFound(map.instance.clone()))?;

        instance
            .maps
            .iter()
            .find(|candidate| candidate.name == map.map)
            .ok_or_else(|| WorldError::MapNotFound(map.clone()))
    }

    /// Puts `client` into the map and returns where it should appear.
    pub fn spawn_client(&mut self, map: &MapRef, client: ClientId) -> Result<Location, WorldError> {
        let instance = self
            .instances
            .get_mut(&map.instance)
            .ok_or_else(|| WorldError::InstanceNotFound(map.instance.clone()))?;
        let target = instance
            .map_mut(&map.map)
            .ok_or_else(|| WorldError::MapNotFound(map.clone()))?;

        let location = target.default_location;
        if !target.clients.contains(&client) {
            target.clients.push(client);
            instance.player_count += 1;
        }

        Ok(location)
    }

    /// Takes `client` out of the map, if it was there.
    pub fn remove_client(&mut self, map: &MapRef, client: ClientId) {
        let Some(instance) = self.instances.get_mut(&map.instance) else {
            tracing::warn!("{client} left {map}, but that instance does not exist");
            return;
        };
        let Some(target) = instance.map_mut(&map.map) else {
            tracing::warn!("{client} left {map}, but that map does not exist");
            return;
        };

        let before = target.clients.len();
        target.clients.retain(|existing| *existing != client);
        if target.clients.len() != before {
            instance.player_count = instance.player_count.saturating_sub(1);
        }
    }
}
