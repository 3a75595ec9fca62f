//! Map service: loads Tiled maps at startup and exposes immutable views of
//! tiles, collision, chunks, and spawn points. Maps never change at runtime,
//! so everything here is read-only after [`MapManager::load_dir`].

pub mod tiled;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use common::protocol::{ChunkLayerView, ChunkView};

pub use tiled::{SpawnPoint, TileLayer, TilesetRef};

/// Tiles per chunk edge.
pub const CHUNK_SIZE: i32 = 16;

/// Boolean collision grid, row-major. `true` means blocked.
#[derive(Debug, Clone)]
pub struct CollisionGrid {
    width: i32,
    height: i32,
    blocked: Vec<bool>,
}

impl CollisionGrid {
    pub fn new(width: i32, height: i32, blocked: Vec<bool>) -> CollisionGrid {
        debug_assert_eq!(blocked.len(), (width * height) as usize);
        CollisionGrid {
            width,
            height,
            blocked,
        }
    }

    /// All-walkable grid, mostly for tests.
    pub fn open(width: i32, height: i32) -> CollisionGrid {
        CollisionGrid::new(width, height, vec![false; (width * height) as usize])
    }

    /// Build from `rows[y][x]` (the shape integration fixtures use).
    pub fn from_rows(rows: &[Vec<bool>]) -> CollisionGrid {
        let height = rows.len() as i32;
        let width = rows.first().map(|r| r.len() as i32).unwrap_or(0);
        let mut blocked = Vec::with_capacity((width * height) as usize);
        for row in rows {
            blocked.extend_from_slice(row);
        }
        CollisionGrid::new(width, height, blocked)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Out-of-bounds tiles are blocked.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return true;
        }
        self.blocked[(y * self.width + x) as usize]
    }

    pub fn set_blocked(&mut self, x: i32, y: i32, value: bool) {
        if self.in_bounds(x, y) {
            self.blocked[(y * self.width + x) as usize] = value;
        }
    }
}

/// One loaded map.
#[derive(Debug, Clone)]
pub struct TileMap {
    pub map_id: String,
    pub width: i32,
    pub height: i32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<TileLayer>,
    pub tilesets: Vec<TilesetRef>,
    pub spawn_points: Vec<SpawnPoint>,
    grid: CollisionGrid,
    player_spawn: (i32, i32),
}

impl TileMap {
    pub fn from_parsed(map_id: String, parsed: tiled::ParsedMap) -> TileMap {
        let width = parsed.width as i32;
        let height = parsed.height as i32;
        let grid = CollisionGrid::new(width, height, parsed.blocked);
        let player_spawn = parsed.player_spawn.unwrap_or((width / 2, height / 2));
        TileMap {
            map_id,
            width,
            height,
            tile_width: parsed.tile_width,
            tile_height: parsed.tile_height,
            layers: parsed.layers,
            tilesets: parsed.tilesets,
            spawn_points: parsed.spawn_points,
            grid,
            player_spawn,
        }
    }

    /// Test constructor: open map with no layers or spawns.
    pub fn test_map(map_id: &str, width: i32, height: i32) -> TileMap {
        TileMap {
            map_id: map_id.to_string(),
            width,
            height,
            tile_width: 32,
            tile_height: 32,
            layers: Vec::new(),
            tilesets: Vec::new(),
            spawn_points: Vec::new(),
            grid: CollisionGrid::open(width, height),
            player_spawn: (width / 2, height / 2),
        }
    }

    pub fn collision_grid(&self) -> &CollisionGrid {
        &self.grid
    }

    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.grid.is_blocked(x, y)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.grid.in_bounds(x, y)
    }

    /// Ground-layer tile id at a position, 0 if out of bounds or layerless.
    pub fn tile_at(&self, x: i32, y: i32) -> u32 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        self.layers
            .first()
            .map(|layer| layer.tiles[(y * self.width + x) as usize])
            .unwrap_or(0)
    }

    pub fn player_spawn(&self) -> (i32, i32) {
        self.player_spawn
    }

    /// Chunk coordinate of a tile position.
    pub fn chunk_of(x: i32, y: i32) -> (i32, i32) {
        (x.div_euclid(CHUNK_SIZE), y.div_euclid(CHUNK_SIZE))
    }

    /// Extract one 16x16 chunk across all layers. Tiles outside the map are
    /// filled with 0 so edge chunks are always full-size.
    pub fn chunk(&self, cx: i32, cy: i32) -> Option<ChunkView> {
        let base_x = cx * CHUNK_SIZE;
        let base_y = cy * CHUNK_SIZE;
        if base_x >= self.width || base_y >= self.height || cx < 0 || cy < 0 {
            return None;
        }

        let mut layers = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let mut tiles = Vec::with_capacity((CHUNK_SIZE * CHUNK_SIZE) as usize);
            for dy in 0..CHUNK_SIZE {
                for dx in 0..CHUNK_SIZE {
                    let x = base_x + dx;
                    let y = base_y + dy;
                    let gid = if self.in_bounds(x, y) {
                        layer.tiles[(y * self.width + x) as usize]
                    } else {
                        0
                    };
                    tiles.push(gid);
                }
            }
            layers.push(ChunkLayerView {
                name: layer.name.clone(),
                tiles,
            });
        }

        Some(ChunkView { cx, cy, layers })
    }
}

/// All loaded maps, immutable after startup.
pub struct MapManager {
    maps: HashMap<String, TileMap>,
}

impl MapManager {
    pub fn new() -> MapManager {
        MapManager {
            maps: HashMap::new(),
        }
    }

    /// Load every `.tmx` file under `dir`; the file stem is the map id.
    pub fn load_dir(dir: &Path) -> Result<MapManager> {
        let mut manager = MapManager::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("read maps directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry.context("read maps directory entry")?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("tmx") {
                continue;
            }
            let map_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let xml = std::fs::read_to_string(&path)
                .with_context(|| format!("read map {}", path.display()))?;
            let parsed = tiled::parse_tmx(&xml)
                .with_context(|| format!("parse map {}", path.display()))?;
            let map = TileMap::from_parsed(map_id.clone(), parsed);
            log::info!(
                "Loaded map '{}' ({}x{}, {} layers, {} spawn points)",
                map_id,
                map.width,
                map.height,
                map.layers.len(),
                map.spawn_points.len()
            );
            manager.maps.insert(map_id, map);
        }
        if manager.maps.is_empty() {
            log::warn!("No maps found in {}", dir.display());
        }
        Ok(manager)
    }

    pub fn insert(&mut self, map: TileMap) {
        self.maps.insert(map.map_id.clone(), map);
    }

    pub fn get(&self, map_id: &str) -> Option<&TileMap> {
        self.maps.get(map_id)
    }

    pub fn map_ids(&self) -> Vec<String> {
        self.maps.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl Default for MapManager {
    fn default() -> Self {
        MapManager::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_is_blocked() {
        let grid = CollisionGrid::open(10, 10);
        assert!(grid.is_blocked(-1, 0));
        assert!(grid.is_blocked(0, -1));
        assert!(grid.is_blocked(10, 0));
        assert!(!grid.is_blocked(9, 9));
    }

    #[test]
    fn test_from_rows_matches_indexing() {
        let rows = vec![
            vec![false, true],
            vec![false, false],
        ];
        let grid = CollisionGrid::from_rows(&rows);
        assert!(grid.is_blocked(1, 0));
        assert!(!grid.is_blocked(0, 0));
        assert!(!grid.is_blocked(1, 1));
    }

    #[test]
    fn test_chunk_coordinates() {
        assert_eq!(TileMap::chunk_of(0, 0), (0, 0));
        assert_eq!(TileMap::chunk_of(15, 15), (0, 0));
        assert_eq!(TileMap::chunk_of(16, 15), (1, 0));
        assert_eq!(TileMap::chunk_of(33, 47), (2, 2));
    }

    #[test]
    fn test_chunk_extraction_pads_edges() {
        let xml = r#"<?xml version="1.0"?>
<map width="20" height="20" tilewidth="32" tileheight="32">
 <layer name="ground" width="20" height="20">
  <data encoding="csv">"#
            .to_string()
            + &vec!["7"; 400].join(",")
            + r#"</data>
 </layer>
</map>"#;
        let map = TileMap::from_parsed("t".to_string(), tiled::parse_tmx(&xml).unwrap());

        let chunk = map.chunk(1, 1).unwrap();
        assert_eq!(chunk.layers.len(), 1);
        let tiles = &chunk.layers[0].tiles;
        assert_eq!(tiles.len(), 256);
        // Columns 16..19 exist (value 7); 20..31 are padding zeros.
        assert_eq!(tiles[0], 7);
        assert_eq!(tiles[4], 0);

        assert!(map.chunk(2, 0).is_none());
        assert!(map.chunk(-1, 0).is_none());

        assert_eq!(map.tile_at(5, 5), 7);
        assert_eq!(map.tile_at(25, 5), 0);
    }
}
