//! Terrain generator: seeded tile grids with biome weighting, a smoothing
//! pass, and named regions of interest.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::pcg::seed::GenerationContext;
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator};

const MIN_DIMENSION: u64 = 8;
const MAX_DIMENSION: u64 = 512;
const DEFAULT_DIMENSION: u64 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Plains,
    Forest,
    Hills,
    Water,
    Mountain,
    Swamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Temperate,
    Highland,
    Wetland,
    Frontier,
}

impl Biome {
    pub fn parse(s: &str) -> Result<Biome> {
        match s {
            "temperate" => Ok(Biome::Temperate),
            "highland" => Ok(Biome::Highland),
            "wetland" => Ok(Biome::Wetland),
            "frontier" => Ok(Biome::Frontier),
            other => Err(EngineError::Validation(format!("unknown biome '{other}'"))),
        }
    }

    /// Tile weights for this biome; order matches `TileKind` declaration.
    fn weights(&self) -> [(TileKind, u32); 6] {
        match self {
            Biome::Temperate => [
                (TileKind::Plains, 40),
                (TileKind::Forest, 30),
                (TileKind::Hills, 15),
                (TileKind::Water, 8),
                (TileKind::Mountain, 5),
                (TileKind::Swamp, 2),
            ],
            Biome::Highland => [
                (TileKind::Plains, 15),
                (TileKind::Forest, 15),
                (TileKind::Hills, 35),
                (TileKind::Water, 5),
                (TileKind::Mountain, 28),
                (TileKind::Swamp, 2),
            ],
            Biome::Wetland => [
                (TileKind::Plains, 20),
                (TileKind::Forest, 20),
                (TileKind::Hills, 5),
                (TileKind::Water, 25),
                (TileKind::Mountain, 2),
                (TileKind::Swamp, 28),
            ],
            Biome::Frontier => [
                (TileKind::Plains, 30),
                (TileKind::Forest, 25),
                (TileKind::Hills, 20),
                (TileKind::Water, 10),
                (TileKind::Mountain, 10),
                (TileKind::Swamp, 5),
            ],
        }
    }
}

/// A named point of interest on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub tile: TileKind,
}

/// Generated terrain artifact. Tiles are stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainMap {
    pub id: String,
    pub biome: Biome,
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<TileKind>,
    pub regions: Vec<Region>,
}

impl TerrainMap {
    pub fn tile_at(&self, x: u32, y: u32) -> Option<TileKind> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.tiles.get((y * self.width + x) as usize).copied()
    }
}

const REGION_NAMES: &[&str] = &[
    "Raven's Pass",
    "the Sunken Crypt",
    "Blackbriar Forest",
    "the Old Watchtower",
    "the Salt Mines",
    "Harrow Fen",
    "the Standing Stones",
    "Fort Elder",
];

pub struct TerrainGenerator;

impl TerrainGenerator {
    pub fn new() -> Self {
        Self
    }

    fn dimensions(params: &GenerationParams) -> Result<(u64, u64)> {
        let width = params.constraint_u64("width").unwrap_or(DEFAULT_DIMENSION);
        let height = params.constraint_u64("height").unwrap_or(DEFAULT_DIMENSION);
        for (axis, value) in [("width", width), ("height", height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                return Err(EngineError::Validation(format!(
                    "{axis} {value} outside [{MIN_DIMENSION}, {MAX_DIMENSION}]"
                )));
            }
        }
        Ok((width, height))
    }

    fn draw_tile(rng: &mut StdRng, weights: &[(TileKind, u32); 6]) -> TileKind {
        let total: u32 = weights.iter().map(|(_, w)| w).sum();
        let mut roll = rng.random_range(0..total);
        for (tile, weight) in weights {
            if roll < *weight {
                return *tile;
            }
            roll -= weight;
        }
        TileKind::Plains
    }
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for TerrainGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Terrain
    }

    fn version(&self) -> &'static str {
        "1.0.1"
    }

    fn validate(&self, params: &GenerationParams) -> Result<()> {
        params.validate()?;
        Self::dimensions(params)?;
        if let Some(s) = params.constraint_str("biome") {
            Biome::parse(s)?;
        }
        Ok(())
    }

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent> {
        let params = ctx.params().clone();
        let (width, height) = Self::dimensions(&params)?;
        let biome = match params.constraint_str("biome") {
            Some(s) => Biome::parse(s)?,
            None => Biome::Temperate,
        };
        debug!(width, height, ?biome, "generating terrain");

        let id = ctx.next_id("terrain");
        let weights = biome.weights();
        let mut tiles = Vec::with_capacity((width * height) as usize);

        for _y in 0..height {
            ctx.check_cancelled()?;
            let rng = ctx.rng();
            for _x in 0..width {
                tiles.push(Self::draw_tile(rng, &weights));
            }
            tokio::task::yield_now().await;
        }

        // One smoothing pass: a tile matching neither horizontal neighbor
        // adopts the left one, which knits stray singletons into fields.
        let w = width as usize;
        for y in 0..height as usize {
            ctx.check_cancelled()?;
            for x in 1..w.saturating_sub(1) {
                let idx = y * w + x;
                let left = tiles[idx - 1];
                let right = tiles[idx + 1];
                if tiles[idx] != left && tiles[idx] != right && left == right {
                    tiles[idx] = left;
                }
            }
        }

        let region_count = (2 + usize::from(params.difficulty) / 4).min(REGION_NAMES.len());
        let mut regions = Vec::with_capacity(region_count);
        let mut used = Vec::new();
        for _ in 0..region_count {
            ctx.check_cancelled()?;
            let rng = ctx.rng();
            let mut name_idx = rng.random_range(0..REGION_NAMES.len());
            while used.contains(&name_idx) {
                name_idx = (name_idx + 1) % REGION_NAMES.len();
            }
            used.push(name_idx);
            let x = rng.random_range(0..width as u32);
            let y = rng.random_range(0..height as u32);
            let tile = tiles[(y as usize) * w + x as usize];
            regions.push(Region {
                name: REGION_NAMES[name_idx].to_string(),
                x,
                y,
                tile,
            });
        }

        Ok(GeneratedContent::Terrain(TerrainMap {
            id,
            biome,
            width: width as u32,
            height: height as u32,
            tiles,
            regions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn context(seed: i64, params: GenerationParams) -> GenerationContext {
        GenerationContext::new(
            ContentType::Terrain,
            "pcg.terrain",
            seed,
            params,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn terrain_is_deterministic_per_seed() {
        let generator = TerrainGenerator::new();
        let params = GenerationParams::new(4)
            .with_difficulty(8)
            .with_constraint("width", 16u64)
            .with_constraint("height", 16u64);

        let a = generator
            .generate(&mut context(51, params.clone()))
            .await
            .unwrap();
        let b = generator.generate(&mut context(51, params)).await.unwrap();
        match (a, b) {
            (GeneratedContent::Terrain(a), GeneratedContent::Terrain(b)) => assert_eq!(a, b),
            other => panic!("unexpected artifacts: {other:?}"),
        }
    }

    #[tokio::test]
    async fn map_has_expected_shape_and_regions() {
        let generator = TerrainGenerator::new();
        let params = GenerationParams::new(4)
            .with_difficulty(12)
            .with_constraint("width", 24u64)
            .with_constraint("height", 10u64)
            .with_constraint("biome", "wetland");

        let map = match generator.generate(&mut context(3, params)).await.unwrap() {
            GeneratedContent::Terrain(map) => map,
            other => panic!("unexpected artifact: {other:?}"),
        };

        assert_eq!(map.width, 24);
        assert_eq!(map.height, 10);
        assert_eq!(map.tiles.len(), 240);
        assert_eq!(map.biome, Biome::Wetland);
        // difficulty 12 yields 5 regions, all in bounds with unique names
        assert_eq!(map.regions.len(), 5);
        let mut names: Vec<_> = map.regions.iter().map(|r| r.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
        for region in &map.regions {
            assert!(map.tile_at(region.x, region.y).is_some());
        }
    }

    #[test]
    fn dimension_and_biome_validation() {
        let generator = TerrainGenerator::new();
        assert!(generator
            .validate(&GenerationParams::new(1).with_constraint("width", 4u64))
            .is_err());
        assert!(generator
            .validate(&GenerationParams::new(1).with_constraint("height", 4096u64))
            .is_err());
        assert!(generator
            .validate(&GenerationParams::new(1).with_constraint("biome", "lunar"))
            .is_err());
        assert!(generator.validate(&GenerationParams::new(1)).is_ok());
    }

    #[tokio::test]
    async fn cancellation_aborts_row_generation() {
        let generator = TerrainGenerator::new();
        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = GenerationContext::new(
            ContentType::Terrain,
            "pcg.terrain",
            3,
            GenerationParams::new(4),
            token,
        );
        assert!(generator.generate(&mut ctx).await.is_err());
    }
}
