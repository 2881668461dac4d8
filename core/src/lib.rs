//! Single-player Minesweeper board engine.
//!
//! The engine owns all authoritative game state: mine placement, adjacency
//! counts, flood-fill reveals, win/loss detection, and the persisted save
//! format. A presentation layer drives it through [`Session`] (or directly
//! through [`Board`]) and renders from the returned [`RevealResult`] deltas.

use core::fmt;
use core::ops::Index;
use core::str::FromStr;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use cell::*;
pub use engine::*;
pub use error::*;
pub use save::*;
pub use session::*;
pub use types::*;

mod cell;
mod engine;
mod error;
mod save;
mod session;
mod types;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Board dimensions as `(rows, cols)`.
    pub size: Coord2,
    pub mines: CellCount,
}

impl GameConfig {
    pub const fn new_unchecked(size: Coord2, mines: CellCount) -> Self {
        Self { size, mines }
    }

    /// Builds a config, rejecting empty boards and boards without a safe cell.
    pub fn new(size: Coord2, mines: CellCount) -> Result<Self> {
        Self::new_unchecked(size, mines).validate()
    }

    pub fn validate(self) -> Result<Self> {
        if self.size.0 == 0 || self.size.1 == 0 || self.mines >= self.total_cells() {
            Err(GameError::InvalidConfiguration)
        } else {
            Ok(self)
        }
    }

    pub const fn rows(&self) -> Coord {
        self.size.0
    }

    pub const fn cols(&self) -> Coord {
        self.size.1
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }

    pub const fn safe_cells(&self) -> CellCount {
        self.total_cells().saturating_sub(self.mines)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Difficulty::default().config()
    }
}

impl From<Difficulty> for GameConfig {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.config()
    }
}

/// The fixed presets offered to players.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub const fn config(self) -> GameConfig {
        match self {
            Self::Easy => GameConfig::new_unchecked((8, 8), 10),
            Self::Medium => GameConfig::new_unchecked((16, 16), 40),
            Self::Hard => GameConfig::new_unchecked((24, 24), 99),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|difficulty| difficulty.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(GameError::InvalidConfiguration)
    }
}

/// The fixed set of mined cells of one board.
///
/// Only serialized; boards are read back through [`SaveData`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MineLayout {
    mine_mask: Array2<bool>,
    mine_count: CellCount,
}

impl MineLayout {
    /// Places `config.mines` mines uniformly without replacement.
    ///
    /// Samples distinct flat cell indices, so placement never retries on
    /// duplicates and stays bounded by `rows * cols` regardless of density.
    pub fn random<R: Rng + ?Sized>(config: GameConfig, rng: &mut R) -> Result<Self> {
        let config = config.validate()?;
        let mut mine_mask: Array2<bool> = Array2::default(config.size.to_nd_index());

        let sampled = rand::seq::index::sample(
            rng,
            usize::from(config.total_cells()),
            usize::from(config.mines),
        );
        for index in sampled.into_iter() {
            mine_mask[from_flat_index(index, config.cols()).to_nd_index()] = true;
        }

        log::debug!(
            "Placed {} mines on a {}x{} board",
            config.mines,
            config.rows(),
            config.cols()
        );
        Ok(Self {
            mine_mask,
            mine_count: config.mines,
        })
    }

    /// Builds a layout from explicit mine coordinates.
    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let config = GameConfig::new(size, mine_coords.len().try_into().unwrap_or(CellCount::MAX))?;
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());

        for &coords in mine_coords {
            if !in_bounds(coords, size) {
                return Err(GameError::OutOfBounds);
            }
            let cell = &mut mine_mask[coords.to_nd_index()];
            if *cell {
                return Err(GameError::InvalidConfiguration);
            }
            *cell = true;
        }

        Ok(Self {
            mine_mask,
            mine_count: config.mines,
        })
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig::new_unchecked(self.size(), self.mine_count)
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        if in_bounds(coords, self.size()) {
            Ok(coords)
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    pub fn size(&self) -> Coord2 {
        let (rows, cols) = self.mine_mask.dim();
        (rows as Coord, cols as Coord)
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells().saturating_sub(self.mine_count)
    }

    pub fn total_cells(&self) -> CellCount {
        self.mine_mask.len() as CellCount
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    /// Whether `coords` holds a mine; out-of-bounds cells never do.
    pub fn contains_mine(&self, coords: Coord2) -> bool {
        self.mine_mask
            .get(coords.to_nd_index())
            .copied()
            .unwrap_or(false)
    }

    /// Mine coordinates in row-major order.
    pub fn mines(&self) -> impl Iterator<Item = Coord2> + '_ {
        self.mine_mask
            .indexed_iter()
            .filter(|&(_, &is_mine)| is_mine)
            .map(|((row, col), _)| (row as Coord, col as Coord))
    }

    /// Counts mines in the Moore neighborhood of `coords`, excluding the cell itself.
    pub fn adjacent_mine_count(&self, coords: Coord2) -> Result<u8> {
        let coords = self.validate_coords(coords)?;
        Ok(self.count_adjacent(coords))
    }

    pub(crate) fn count_adjacent(&self, coords: Coord2) -> u8 {
        self.iter_neighbors(coords).filter(|&pos| self[pos]).count() as u8
    }

    pub(crate) fn iter_neighbors(&self, coords: Coord2) -> NeighborIter {
        self.mine_mask.iter_neighbors(coords)
    }
}

impl Index<Coord2> for MineLayout {
    type Output = bool;

    fn index(&self, coords: Coord2) -> &Self::Output {
        &self.mine_mask[coords.to_nd_index()]
    }
}

/// Places mines for `config` using `rng`, see [`MineLayout::random`].
pub fn place_mines<R: Rng + ?Sized>(config: GameConfig, rng: &mut R) -> Result<MineLayout> {
    MineLayout::random(config, rng)
}
