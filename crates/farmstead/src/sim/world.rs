use std::fmt;

use engine::{Aabb, Grid, GridError};
use serde::{Deserialize, Serialize};

use crate::clock::TimestampMs;

use super::config::SimConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Sky,
    Grass,
    Dirt,
    Tilled,
    CropPlanted,
    CropGrown,
}

impl TileKind {
    pub fn is_solid(self) -> bool {
        self != Self::Sky
    }

    pub fn holds_crop(self) -> bool {
        matches!(self, Self::CropPlanted | Self::CropGrown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CropKind {
    Wheat,
    Corn,
    Carrot,
}

impl CropKind {
    pub const ALL: [CropKind; 3] = [Self::Wheat, Self::Corn, Self::Carrot];

    pub fn name(self) -> &'static str {
        match self {
            Self::Wheat => "wheat",
            Self::Corn => "corn",
            Self::Carrot => "carrot",
        }
    }
}

impl fmt::Display for CropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CropStage {
    Seed,
    Young,
    Mature,
}

impl CropStage {
    pub fn index(self) -> u32 {
        match self {
            Self::Seed => 0,
            Self::Young => 1,
            Self::Mature => 2,
        }
    }

    pub fn next(self) -> Option<CropStage> {
        match self {
            Self::Seed => Some(Self::Young),
            Self::Young => Some(Self::Mature),
            Self::Mature => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub kind: CropKind,
    pub stage: CropStage,
    pub planted_at: TimestampMs,
}

/// One grid cell. Fields are private so a crop can only exist on a
/// planted or grown tile, and a grown tile always carries a mature crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    kind: TileKind,
    crop: Option<Crop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileShapeError {
    CropOnBareTile(TileKind),
    MissingCrop(TileKind),
    GrownButNotMature(CropStage),
    MatureButNotGrown,
}

impl fmt::Display for TileShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CropOnBareTile(kind) => write!(f, "crop present on {kind:?} tile"),
            Self::MissingCrop(kind) => write!(f, "{kind:?} tile has no crop"),
            Self::GrownButNotMature(stage) => {
                write!(f, "CropGrown tile carries {stage:?} crop")
            }
            Self::MatureButNotGrown => f.write_str("Mature crop on CropPlanted tile"),
        }
    }
}

impl Tile {
    pub const fn bare(kind: TileKind) -> Self {
        Self { kind, crop: None }
    }

    pub fn sky() -> Self {
        Self::bare(TileKind::Sky)
    }

    pub fn tilled() -> Self {
        Self::bare(TileKind::Tilled)
    }

    pub fn planted(kind: CropKind, planted_at: TimestampMs) -> Self {
        Self {
            kind: TileKind::CropPlanted,
            crop: Some(Crop {
                kind,
                stage: CropStage::Seed,
                planted_at,
            }),
        }
    }

    /// Rebuilds a tile from stored parts, rejecting shapes a running
    /// simulation can never produce.
    pub fn from_parts(kind: TileKind, crop: Option<Crop>) -> Result<Self, TileShapeError> {
        match (kind, crop) {
            (TileKind::CropGrown, Some(crop)) if crop.stage != CropStage::Mature => {
                Err(TileShapeError::GrownButNotMature(crop.stage))
            }
            (TileKind::CropPlanted, Some(crop)) if crop.stage == CropStage::Mature => {
                Err(TileShapeError::MatureButNotGrown)
            }
            (kind, Some(_)) if !kind.holds_crop() => Err(TileShapeError::CropOnBareTile(kind)),
            (kind, None) if kind.holds_crop() => Err(TileShapeError::MissingCrop(kind)),
            (kind, crop) => Ok(Self { kind, crop }),
        }
    }

    pub fn kind(&self) -> TileKind {
        self.kind
    }

    pub fn crop(&self) -> Option<&Crop> {
        self.crop.as_ref()
    }

    /// Moves the crop forward through every stage whose cumulative threshold
    /// has elapsed. Returns true when the stage changed.
    pub(crate) fn advance_growth(&mut self, now: TimestampMs, stage_duration_ms: i64) -> bool {
        let Some(crop) = self.crop.as_mut() else {
            return false;
        };
        let elapsed = now.millis_since(crop.planted_at).max(0);
        let mut advanced = false;
        while let Some(next) = crop.stage.next() {
            let threshold = stage_duration_ms.saturating_mul(i64::from(crop.stage.index() + 1));
            if elapsed < threshold {
                break;
            }
            crop.stage = next;
            advanced = true;
        }
        if crop.stage == CropStage::Mature {
            self.kind = TileKind::CropGrown;
        }
        advanced
    }
}

/// Fixed-shape tile map. Coordinates outside the grid read as `None` and
/// writes to them are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldGrid {
    tiles: Grid<Tile>,
    tile_size: f32,
    ground_row: u32,
}

impl WorldGrid {
    /// Sky above the ground row, grass on it, dirt below.
    pub fn generate(config: &SimConfig) -> Self {
        let ground_row = config.ground_row();
        let tiles = Grid::from_fn(config.world_width_tiles, config.world_height_tiles, |_, y| {
            if y < ground_row {
                Tile::sky()
            } else if y == ground_row {
                Tile::bare(TileKind::Grass)
            } else {
                Tile::bare(TileKind::Dirt)
            }
        });
        Self {
            tiles,
            tile_size: config.tile_size,
            ground_row,
        }
    }

    pub fn from_tiles(
        width: u32,
        height: u32,
        tiles: Vec<Tile>,
        tile_size: f32,
        ground_row: u32,
    ) -> Result<Self, GridError> {
        Ok(Self {
            tiles: Grid::new(width, height, tiles)?,
            tile_size,
            ground_row,
        })
    }

    pub fn width(&self) -> u32 {
        self.tiles.width()
    }

    pub fn height(&self) -> u32 {
        self.tiles.height()
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn ground_row(&self) -> u32 {
        self.ground_row
    }

    pub fn width_px(&self) -> f32 {
        self.width() as f32 * self.tile_size
    }

    pub fn height_px(&self) -> f32 {
        self.height() as f32 * self.tile_size
    }

    /// Pixel y of the top edge of the ground row.
    pub fn ground_surface_y(&self) -> f32 {
        self.tile_to_pixel(i64::from(self.ground_row))
    }

    pub fn get_tile(&self, x: i64, y: i64) -> Option<&Tile> {
        self.tiles.get(x, y)
    }

    pub fn set_tile(&mut self, x: i64, y: i64, tile: Tile) -> bool {
        self.tiles.set(x, y, tile)
    }

    pub(crate) fn tile_mut(&mut self, x: i64, y: i64) -> Option<&mut Tile> {
        self.tiles.get_mut(x, y)
    }

    pub fn tile_to_pixel(&self, index: i64) -> f32 {
        index as f32 * self.tile_size
    }

    pub fn pixel_to_tile(&self, pixel: f32) -> i64 {
        (pixel / self.tile_size).floor() as i64
    }

    pub fn tile_rect(&self, x: i64, y: i64) -> Aabb {
        Aabb::new(
            self.tile_to_pixel(x),
            self.tile_to_pixel(y),
            self.tile_size,
            self.tile_size,
        )
    }

    /// Row-major copy order, matching `Grid`.
    pub fn tiles(&self) -> &[Tile] {
        self.tiles.cells()
    }

    pub(crate) fn tiles_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut Tile)> {
        self.tiles.iter_mut()
    }
}
