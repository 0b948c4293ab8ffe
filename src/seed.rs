use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{Engine, EngineError, NewRoom};

/// One room in a JSON seed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub max_occupancy: u32,
    #[serde(default = "enabled")]
    pub is_available: bool,
}

fn enabled() -> bool {
    true
}

impl From<RoomSeed> for NewRoom {
    fn from(seed: RoomSeed) -> Self {
        NewRoom {
            name: seed.name,
            description: seed.description,
            max_occupancy: seed.max_occupancy,
            is_available: seed.is_available,
        }
    }
}

/// Parse a JSON array of rooms.
pub fn load_room_seeds(path: &Path) -> io::Result<Vec<RoomSeed>> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        )
    })
}

/// The cottage as it is let out: three bedrooms or the whole house.
pub fn default_rooms() -> Vec<RoomSeed> {
    let room = |name: &str, description: &str, max_occupancy| RoomSeed {
        name: name.into(),
        description: Some(description.into()),
        max_occupancy,
        is_available: true,
    };
    vec![
        room(
            "Bedroom 1",
            "Cozy bedroom with queen bed and garden view. Perfect for couples.",
            2,
        ),
        room(
            "Bedroom 2",
            "Spacious bedroom with twin beds and lake view. Great for friends or family.",
            2,
        ),
        room(
            "Bedroom 3",
            "Master bedroom with king bed, ensuite bathroom, and private balcony.",
            2,
        ),
        room(
            "Entire Cottage",
            "The whole 3-bedroom cottage with full kitchen, living room and outdoor deck.",
            6,
        ),
    ]
}

/// Create `seeds` when the engine holds no rooms yet. Returns how many were created.
pub async fn seed_if_empty(engine: &Engine, seeds: Vec<RoomSeed>) -> Result<usize, EngineError> {
    if engine.room_count() > 0 {
        return Ok(0);
    }
    let count = seeds.len();
    for seed in seeds {
        engine.create_room(seed.into()).await?;
    }
    info!("seeded {count} rooms");
    Ok(count)
}
