//! Tiled (.tmx) map parsing.
//!
//! Only the subset of the TMX format the server needs: map dimensions,
//! CSV-encoded tile layers, tileset references, and the object layer that
//! carries entity spawn points. The layer named `collision` becomes the
//! boolean collision grid; any non-zero tile blocks movement.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TmxMap {
    #[serde(rename = "@width")]
    width: u32,
    #[serde(rename = "@height")]
    height: u32,
    #[serde(rename = "@tilewidth")]
    tile_width: u32,
    #[serde(rename = "@tileheight")]
    tile_height: u32,
    #[serde(rename = "tileset", default)]
    tilesets: Vec<TmxTileset>,
    #[serde(rename = "layer", default)]
    layers: Vec<TmxLayer>,
    #[serde(rename = "objectgroup", default)]
    object_groups: Vec<TmxObjectGroup>,
}

#[derive(Debug, Deserialize)]
struct TmxTileset {
    #[serde(rename = "@firstgid")]
    first_gid: u32,
    #[serde(rename = "@source", default)]
    source: Option<String>,
    #[serde(rename = "@name", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmxLayer {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@width")]
    width: u32,
    #[serde(rename = "@height")]
    height: u32,
    data: TmxData,
}

#[derive(Debug, Deserialize)]
struct TmxData {
    #[serde(rename = "@encoding", default)]
    encoding: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TmxObjectGroup {
    #[serde(rename = "object", default)]
    objects: Vec<TmxObject>,
}

#[derive(Debug, Deserialize)]
struct TmxObject {
    #[serde(rename = "@id")]
    id: u32,
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
    #[serde(default)]
    properties: Option<TmxProperties>,
}

#[derive(Debug, Deserialize)]
struct TmxProperties {
    #[serde(rename = "property", default)]
    properties: Vec<TmxProperty>,
}

#[derive(Debug, Deserialize)]
struct TmxProperty {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

/// One parsed tile layer, row-major.
#[derive(Debug, Clone)]
pub struct TileLayer {
    pub name: String,
    pub tiles: Vec<u32>,
}

/// Tileset reference exposed as metadata to the client.
#[derive(Debug, Clone)]
pub struct TilesetRef {
    pub first_gid: u32,
    pub source: String,
}

/// Named entity spawn point from the object layer.
#[derive(Debug, Clone)]
pub struct SpawnPoint {
    pub id: u32,
    pub template_name: String,
    pub x: i32,
    pub y: i32,
    pub wander_radius: i32,
    pub aggro_override: Option<i32>,
    pub disengage_override: Option<i32>,
}

/// Fully parsed map, ready to be wrapped by [`crate::map::TileMap`].
#[derive(Debug, Clone)]
pub struct ParsedMap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<TileLayer>,
    pub blocked: Vec<bool>,
    pub tilesets: Vec<TilesetRef>,
    pub spawn_points: Vec<SpawnPoint>,
    pub player_spawn: Option<(i32, i32)>,
}

/// Parse TMX XML text into a [`ParsedMap`].
pub fn parse_tmx(xml: &str) -> Result<ParsedMap> {
    let tmx: TmxMap = quick_xml::de::from_str(xml).context("parse TMX document")?;

    let width = tmx.width;
    let height = tmx.height;
    if width == 0 || height == 0 {
        bail!("map has zero dimension ({width}x{height})");
    }

    let mut layers = Vec::new();
    let mut blocked = vec![false; (width * height) as usize];
    let mut saw_collision = false;

    for layer in &tmx.layers {
        if layer.width != width || layer.height != height {
            bail!(
                "layer '{}' is {}x{}, map is {width}x{height}",
                layer.name,
                layer.width,
                layer.height
            );
        }
        let encoding = layer.data.encoding.as_deref().unwrap_or("csv");
        if encoding != "csv" {
            bail!("layer '{}' uses unsupported encoding '{encoding}'", layer.name);
        }
        let tiles = parse_csv_tiles(&layer.data.text, (width * height) as usize)
            .with_context(|| format!("layer '{}' tile data", layer.name))?;

        if layer.name.eq_ignore_ascii_case("collision") {
            saw_collision = true;
            for (i, gid) in tiles.iter().enumerate() {
                blocked[i] = *gid != 0;
            }
        }
        layers.push(TileLayer {
            name: layer.name.clone(),
            tiles,
        });
    }

    if !saw_collision {
        log::warn!("map has no collision layer; all tiles walkable");
    }

    let tilesets = tmx
        .tilesets
        .iter()
        .map(|t| TilesetRef {
            first_gid: t.first_gid,
            source: t
                .source
                .clone()
                .or_else(|| t.name.clone())
                .unwrap_or_default(),
        })
        .collect();

    let mut spawn_points = Vec::new();
    let mut player_spawn = None;
    for group in &tmx.object_groups {
        for object in &group.objects {
            let tile_x = (object.x / f64::from(tmx.tile_width)).floor() as i32;
            let tile_y = (object.y / f64::from(tmx.tile_height)).floor() as i32;

            if object.name.as_deref() == Some("player_spawn") {
                player_spawn = Some((tile_x, tile_y));
                continue;
            }

            let props = object
                .properties
                .as_ref()
                .map(|p| p.properties.as_slice())
                .unwrap_or(&[]);
            let Some(entity_id) = prop_str(props, "entity_id") else {
                continue;
            };

            spawn_points.push(SpawnPoint {
                id: object.id,
                template_name: entity_id.to_string(),
                x: tile_x,
                y: tile_y,
                wander_radius: prop_int(props, "wander_radius").unwrap_or(0),
                aggro_override: prop_int(props, "aggro_override"),
                disengage_override: prop_int(props, "disengage_override"),
            });
        }
    }

    Ok(ParsedMap {
        width,
        height,
        tile_width: tmx.tile_width,
        tile_height: tmx.tile_height,
        layers,
        blocked,
        tilesets,
        spawn_points,
        player_spawn,
    })
}

fn parse_csv_tiles(text: &str, expected: usize) -> Result<Vec<u32>> {
    let mut tiles = Vec::with_capacity(expected);
    for token in text.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let gid: u32 = token
            .parse()
            .with_context(|| format!("bad tile id '{token}'"))?;
        tiles.push(gid);
    }
    if tiles.len() != expected {
        bail!("expected {expected} tiles, found {}", tiles.len());
    }
    Ok(tiles)
}

fn prop_str<'a>(props: &'a [TmxProperty], name: &str) -> Option<&'a str> {
    props
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.value.as_str())
}

fn prop_int(props: &[TmxProperty], name: &str) -> Option<i32> {
    prop_str(props, name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="4" height="3" tilewidth="32" tileheight="32">
 <tileset firstgid="1" source="overworld.tsx"/>
 <layer id="1" name="ground" width="4" height="3">
  <data encoding="csv">
1,1,1,1,
1,1,1,1,
1,1,1,1
  </data>
 </layer>
 <layer id="2" name="collision" width="4" height="3">
  <data encoding="csv">
0,0,0,0,
0,9,9,0,
0,0,0,0
  </data>
 </layer>
 <objectgroup id="3" name="entities">
  <object id="5" name="goblin_spawn" x="64" y="32">
   <properties>
    <property name="entity_id" value="goblin"/>
    <property name="wander_radius" type="int" value="5"/>
    <property name="aggro_override" type="int" value="8"/>
   </properties>
  </object>
  <object id="6" name="player_spawn" x="0" y="0"/>
 </objectgroup>
</map>"#;

    #[test]
    fn test_parses_dimensions_and_layers() {
        let map = parse_tmx(SAMPLE).unwrap();
        assert_eq!(map.width, 4);
        assert_eq!(map.height, 3);
        assert_eq!(map.tile_width, 32);
        assert_eq!(map.layers.len(), 2);
        assert_eq!(map.layers[0].name, "ground");
        assert_eq!(map.layers[0].tiles.len(), 12);
    }

    #[test]
    fn test_collision_layer_becomes_grid() {
        let map = parse_tmx(SAMPLE).unwrap();
        // Row 1, columns 1 and 2 hold non-zero tiles.
        assert!(!map.blocked[0]);
        assert!(map.blocked[(1 * 4 + 1) as usize]);
        assert!(map.blocked[(1 * 4 + 2) as usize]);
        assert!(!map.blocked[(1 * 4 + 3) as usize]);
    }

    #[test]
    fn test_spawn_points_with_overrides() {
        let map = parse_tmx(SAMPLE).unwrap();
        assert_eq!(map.spawn_points.len(), 1);
        let sp = &map.spawn_points[0];
        assert_eq!(sp.template_name, "goblin");
        assert_eq!((sp.x, sp.y), (2, 1));
        assert_eq!(sp.wander_radius, 5);
        assert_eq!(sp.aggro_override, Some(8));
        assert_eq!(sp.disengage_override, None);
    }

    #[test]
    fn test_player_spawn_object() {
        let map = parse_tmx(SAMPLE).unwrap();
        assert_eq!(map.player_spawn, Some((0, 0)));
    }

    #[test]
    fn test_tileset_reference() {
        let map = parse_tmx(SAMPLE).unwrap();
        assert_eq!(map.tilesets.len(), 1);
        assert_eq!(map.tilesets[0].first_gid, 1);
        assert_eq!(map.tilesets[0].source, "overworld.tsx");
    }

    #[test]
    fn test_wrong_tile_count_rejected() {
        let bad = SAMPLE.replace("1,1,1,1,\n1,1,1,1,\n1,1,1,1", "1,1,1");
        assert!(parse_tmx(&bad).is_err());
    }
}
