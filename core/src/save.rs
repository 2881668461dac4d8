use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::*;

/// Persisted form of a [`Board`].
///
/// Square boards written as `grid_size` are read as well, and `status` and
/// `elapsed_secs` may be absent, in which case they are derived or zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<Coord>,
    pub num_mines: CellCount,
    pub mines: Vec<Coord2>,
    pub revealed: Vec<Coord2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatus>,
    #[serde(default)]
    pub elapsed_secs: u32,
}

impl SaveData {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|err| {
            log::warn!("Rejected save data: {}", err);
            GameError::CorruptSaveData("malformed save data")
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| {
            log::warn!("Could not encode save data: {}", err);
            GameError::CorruptSaveData("unencodable save data")
        })
    }

    /// Board dimensions as `(rows, cols)`.
    pub fn size(&self) -> Result<Coord2> {
        match (self.rows, self.cols, self.grid_size) {
            (Some(rows), Some(cols), _) => Ok((rows, cols)),
            (None, None, Some(grid_size)) => Ok((grid_size, grid_size)),
            _ => Err(GameError::CorruptSaveData("missing board dimensions")),
        }
    }
}

impl From<Board> for SaveData {
    fn from(board: Board) -> Self {
        board.to_save_data()
    }
}

impl TryFrom<SaveData> for Board {
    type Error = GameError;

    fn try_from(data: SaveData) -> Result<Self> {
        Board::from_save_data(&data)
    }
}

impl Board {
    pub fn to_save_data(&self) -> SaveData {
        let (rows, cols) = self.size();
        SaveData {
            rows: Some(rows),
            cols: Some(cols),
            grid_size: None,
            num_mines: self.total_mines(),
            mines: self.mine_layout().mines().collect(),
            revealed: self.revealed().collect(),
            status: Some(self.status()),
            elapsed_secs: self.elapsed_secs(),
        }
    }

    /// Rebuilds a board, rejecting data that would produce an inconsistent one.
    ///
    /// Revealed cells are restored directly, never replayed through
    /// [`Board::reveal`], so the restored set is exactly the saved one.
    pub fn from_save_data(data: &SaveData) -> Result<Self> {
        Self::restore(data, Utc::now()).inspect_err(|err| log::warn!("Rejected save data: {}", err))
    }

    fn restore(data: &SaveData, now: DateTime<Utc>) -> Result<Self> {
        let size = data.size()?;
        GameConfig::new(size, data.num_mines)
            .map_err(|_| GameError::CorruptSaveData("invalid board configuration"))?;

        if data.mines.len() != usize::from(data.num_mines) {
            return Err(GameError::CorruptSaveData(
                "mine list does not match mine count",
            ));
        }
        let mine_layout = MineLayout::from_mine_coords(size, &data.mines).map_err(|err| match err {
            GameError::OutOfBounds => GameError::CorruptSaveData("mine outside the board"),
            _ => GameError::CorruptSaveData("duplicate mine"),
        })?;

        let mut seen = BTreeSet::new();
        for &coords in &data.revealed {
            if !in_bounds(coords, size) {
                return Err(GameError::CorruptSaveData("revealed cell outside the board"));
            }
            if !seen.insert(coords) {
                return Err(GameError::CorruptSaveData("duplicate revealed cell"));
            }
        }

        let mut board = Board::new(mine_layout);
        for &coords in &data.revealed {
            board.restore_cell(coords)?;
        }
        board.settle_restored_status();

        if data.status.is_some_and(|status| status != board.status()) {
            return Err(GameError::CorruptSaveData(
                "saved status contradicts revealed cells",
            ));
        }
        board.restore_timer(data.elapsed_secs, now);

        log::debug!(
            "Loaded {}x{} board, {} cells revealed, {:?}",
            size.0,
            size.1,
            data.revealed.len(),
            board.status()
        );
        Ok(board)
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        self.to_save_data().to_bytes()
    }

    pub fn load(bytes: &[u8]) -> Result<Self> {
        Self::from_save_data(&SaveData::from_bytes(bytes)?)
    }
}
