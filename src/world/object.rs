use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::common::GameObject;

/// Zone name used by procedurally generated maps, which have no static objects.
pub const GENERATED_MAP_NAME: &str = "tpmap";

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed object json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed object packet: {0}")]
    Binrw(#[from] binrw::Error),
}

/// Every known object, loaded lazily per zone from `<resources>/objects/<zone>/`.
#[derive(Debug)]
pub struct ObjectManager {
    objects_path: PathBuf,
    all_objects: HashMap<u64, GameObject>,
    /// Object ids per loaded zone, in load order.
    zone_objects: HashMap<String, Vec<u64>>,
}

impl ObjectManager {
    pub fn new(resources: impl AsRef<Path>) -> Self {
        Self {
            objects_path: resources.as_ref().join("objects"),
            all_objects: HashMap::new(),
            zone_objects: HashMap::new(),
        }
    }

    /// Reads one object file. Files that are neither `.bin` captures nor `.json` are not objects.
    fn load_object(path: &Path) -> Result<Option<GameObject>, ObjectError> {
        let object = match path.extension().and_then(|extension| extension.to_str()) {
            Some("bin") => GameObject::from_packet_bin(&std::fs::read(path)?)?,
            Some("json") => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            _ => return Ok(None),
        };

        Ok(Some(object))
    }

    fn load_zone(&mut self, zone: &str) -> Vec<u64> {
        let directory = self.objects_path.join(zone);

        let mut paths: Vec<PathBuf> = match std::fs::read_dir(&directory) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .collect(),
            Err(_) => {
                tracing::debug!("No objects for zone {zone} in {}", directory.display());
                Vec::new()
            }
        };
        paths.sort();

        let mut ids = Vec::new();
        for path in paths {
            let object = match Self::load_object(&path) {
                Ok(Some(object)) => object,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!("Failed to load object from {}: {err}", path.display());
                    continue;
                }
            };

            if self.all_objects.contains_key(&object.id()) {
                tracing::warn!(
                    "Skipping object {} from {}, that id is already taken",
                    object.id(),
                    path.display()
                );
                continue;
            }

            let position = object.location.position;
            tracing::info!(
                "Loaded object {} ({}) for {zone} at ({}, {}, {})",
                object.id(),
                object.name,
                position.x,
                position.y,
                position.z
            );

            ids.push(object.id());
            self.all_objects.insert(object.id(), object);
        }

        ids
    }

    fn ensure_loaded(&mut self, zone: &str) {
        if !self.zone_objects.contains_key(zone) {
            let ids = if zone == GENERATED_MAP_NAME {
                Vec::new()
            } else {
                self.load_zone(zone)
            };
            self.zone_objects.insert(zone.to_string(), ids);
        }
    }

    /// Objects belonging to `zone`, loading them on first use.
    pub fn get_objects_for_zone(&mut self, zone: &str) -> Vec<&GameObject> {
        if zone == GENERATED_MAP_NAME {
            return Vec::new();
        }

        self.ensure_loaded(zone);

        self.zone_objects
            .get(zone)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.all_objects.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Looks up any known object. Never fails: unknown ids get a placeholder.
    pub fn get_object_by_id(&self, id: u64) -> GameObject {
        match self.all_objects.get(&id) {
            Some(object) => object.clone(),
            None => {
                tracing::warn!("Requested object {id}, which we don't know about");
                GameObject::placeholder(id)
            }
        }
    }

    /// Like `get_object_by_id`, but makes sure `zone` is loaded first.
    pub fn get_object_in_zone(&mut self, zone: &str, id: u64) -> GameObject {
        self.ensure_loaded(zone);
        self.get_object_by_id(id)
    }

    /// Registers an object created at runtime. Returns false if the id is taken.
    pub fn insert(&mut self, zone: &str, object: GameObject) -> bool {
        self.ensure_loaded(zone);
        if self.all_objects.contains_key(&object.id()) {
            return false;
        }

        self.zone_objects
            .entry(zone.to_string())
            .or_default()
            .push(object.id());
        self.all_objects.insert(object.id(), object);

        true
    }

    /// An id no known object uses, for objects created at runtime.
    pub fn unused_id(&self) -> u64 {
        loop {
            let id = fastrand::u64(0x1000_0000..u64::MAX);
            if !self.all_objects.contains_key(&id) {
                return id;
            }
        }
    }
}
