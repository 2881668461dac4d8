use chrono::{DateTime, Utc};
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::*;

/// Valid transitions:
/// - InProgress -> Won
/// - InProgress -> Lost
/// - Won | Lost -> InProgress, only through [`Board::reset`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    InProgress,
    Won,
    Lost,
}

impl GameStatus {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// What a single top-level reveal changed, for delta rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealResult {
    pub status: GameStatus,
    /// Every cell revealed by this call, the clicked cell first.
    pub revealed: Vec<Coord2>,
    /// The mine that was hit, if this call lost the game.
    pub exploded: Option<Coord2>,
}

impl RevealResult {
    fn unchanged(status: GameStatus) -> Self {
        Self {
            status,
            revealed: Vec::new(),
            exploded: None,
        }
    }

    /// Whether this result could have caused an update to the board.
    pub fn has_update(&self) -> bool {
        !self.revealed.is_empty()
    }
}

/// A game from first click to win or loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SaveData", into = "SaveData")]
pub struct Board {
    mine_layout: MineLayout,
    cells: Array2<EngineCell>,
    revealed_count: CellCount,
    status: GameStatus,
    exploded: Option<Coord2>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Board {
    pub fn new(mine_layout: MineLayout) -> Self {
        let size = mine_layout.size();
        Self {
            mine_layout,
            cells: Array2::default(size.to_nd_index()),
            revealed_count: 0,
            status: GameStatus::default(),
            exploded: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Creates a board with freshly placed mines.
    pub fn random<R: Rng + ?Sized>(config: GameConfig, rng: &mut R) -> Result<Self> {
        Ok(Self::new(MineLayout::random(config, rng)?))
    }

    /// Discards all state and starts over with new mines for `config`.
    ///
    /// The board is left untouched when `config` is invalid.
    pub fn reset<R: Rng + ?Sized>(&mut self, config: GameConfig, rng: &mut R) -> Result<()> {
        *self = Self::random(config, rng)?;
        log::debug!("Board reset to {:?}", config);
        Ok(())
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn size(&self) -> Coord2 {
        self.mine_layout.size()
    }

    pub fn config(&self) -> GameConfig {
        self.mine_layout.game_config()
    }

    pub fn mine_layout(&self) -> &MineLayout {
        &self.mine_layout
    }

    pub fn total_mines(&self) -> CellCount {
        self.mine_layout.mine_count()
    }

    pub fn revealed_count(&self) -> CellCount {
        self.revealed_count
    }

    /// The mine that ended the game, if it was lost.
    pub fn exploded(&self) -> Option<Coord2> {
        self.exploded
    }

    pub fn cell_at(&self, coords: Coord2) -> Result<EngineCell> {
        let coords = self.mine_layout.validate_coords(coords)?;
        Ok(self.cells[coords.to_nd_index()])
    }

    pub fn is_revealed(&self, coords: Coord2) -> Result<bool> {
        Ok(self.cell_at(coords)?.is_revealed())
    }

    /// Revealed cells in row-major order, the exploded mine included.
    pub fn revealed(&self) -> impl Iterator<Item = Coord2> + '_ {
        self.cells
            .indexed_iter()
            .filter(|&(_, cell)| cell.is_revealed())
            .map(|((row, col), _)| (row as Coord, col as Coord))
    }

    pub fn adjacent_mine_count(&self, coords: Coord2) -> Result<u8> {
        self.mine_layout.adjacent_mine_count(coords)
    }

    /// Whole seconds since the first reveal, frozen once the game ends.
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs_at(Utc::now())
    }

    pub fn elapsed_secs_at(&self, now: DateTime<Utc>) -> u32 {
        match self.started_at {
            Some(started_at) => (self.ended_at.unwrap_or(now) - started_at)
                .num_seconds()
                .clamp(0, u32::MAX.into()) as u32,
            None => 0,
        }
    }

    /// Reveals `coords`, flooding outward through zero-count cells.
    ///
    /// Revealing an already revealed cell, or any cell once the game has
    /// ended, changes nothing.
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealResult> {
        let coords = self.mine_layout.validate_coords(coords)?;

        if self.status.is_finished() || self.cells[coords.to_nd_index()].is_revealed() {
            return Ok(RevealResult::unchanged(self.status));
        }

        self.mark_started();

        if self.mine_layout[coords] {
            self.cells[coords.to_nd_index()] = EngineCell::Exploded;
            self.exploded = Some(coords);
            log::debug!("Hit mine at {:?}", coords);
            self.end_game(GameStatus::Lost);
            return Ok(RevealResult {
                status: self.status,
                revealed: vec![coords],
                exploded: Some(coords),
            });
        }

        let revealed = self.flood_reveal(coords);

        if self.revealed_count == self.mine_layout.safe_cell_count() {
            self.end_game(GameStatus::Won);
        }

        Ok(RevealResult {
            status: self.status,
            revealed,
            exploded: None,
        })
    }

    /// Opens a hidden safe cell and, if it has no adjacent mines, the
    /// connected zero region around it plus that region's border.
    fn flood_reveal(&mut self, start: Coord2) -> Vec<Coord2> {
        let mut revealed = Vec::new();
        let mut to_visit = VecDeque::from([start]);

        while let Some(visit_coords) = to_visit.pop_front() {
            if self.cells[visit_coords.to_nd_index()].is_revealed() {
                continue;
            }
            debug_assert!(!self.mine_layout[visit_coords]);

            let count = self.mine_layout.count_adjacent(visit_coords);
            self.cells[visit_coords.to_nd_index()] = EngineCell::Revealed(count);
            self.revealed_count += 1;
            revealed.push(visit_coords);
            log::trace!("Opened cell at {:?}, mine count: {}", visit_coords, count);

            // zero cells have no mined neighbors, so the cascade never reaches a mine
            if count == 0 {
                to_visit.extend(
                    self.mine_layout
                        .iter_neighbors(visit_coords)
                        .filter(|&pos| self.cells[pos.to_nd_index()].is_hidden()),
                );
            }
        }

        revealed
    }

    /// Marks a single cell as revealed without cascading or touching the timer.
    ///
    /// A mined cell becomes the exploded cell. The status is then recomputed
    /// from the cells alone, so restoring never produces a status the cells
    /// do not imply. A finished board is left untouched. Returns whether the
    /// cell changed.
    pub fn restore_revealed(&mut self, coords: Coord2) -> Result<bool> {
        let coords = self.mine_layout.validate_coords(coords)?;
        if self.status.is_finished() {
            return Ok(false);
        }

        let changed = self.restore_cell(coords)?;
        self.status = self.implied_status();
        Ok(changed)
    }

    /// Marks an in-bounds cell as revealed, leaving the status alone.
    pub(crate) fn restore_cell(&mut self, coords: Coord2) -> Result<bool> {
        if self.cells[coords.to_nd_index()].is_revealed() {
            return Ok(false);
        }

        if self.mine_layout[coords] {
            if self.exploded.is_some() {
                return Err(GameError::CorruptSaveData("more than one revealed mine"));
            }
            self.cells[coords.to_nd_index()] = EngineCell::Exploded;
            self.exploded = Some(coords);
        } else {
            let count = self.mine_layout.count_adjacent(coords);
            self.cells[coords.to_nd_index()] = EngineCell::Revealed(count);
            self.revealed_count += 1;
        }
        Ok(true)
    }

    /// Recomputes the status from the cells once a whole save has been restored.
    pub(crate) fn settle_restored_status(&mut self) {
        self.status = self.implied_status();
    }

    fn implied_status(&self) -> GameStatus {
        if self.exploded.is_some() {
            GameStatus::Lost
        } else if self.revealed_count == self.mine_layout.safe_cell_count() {
            GameStatus::Won
        } else {
            GameStatus::InProgress
        }
    }

    /// Sets the timer as if the game had been running for `elapsed_secs` up to `now`.
    pub(crate) fn restore_timer(&mut self, elapsed_secs: u32, now: DateTime<Utc>) {
        if self.revealed_count == 0 && self.exploded.is_none() {
            self.started_at = None;
            self.ended_at = None;
            return;
        }
        self.started_at = Some(now - chrono::Duration::seconds(elapsed_secs.into()));
        self.ended_at = self.status.is_finished().then_some(now);
    }

    fn mark_started(&mut self) {
        if self.started_at.is_none() {
            let now = Utc::now();
            log::debug!("started at {}", now);
            self.started_at = Some(now);
        }
    }

    fn end_game(&mut self, status: GameStatus) {
        if self.status.is_finished() {
            return;
        }
        self.status = status;
        let now = Utc::now();
        self.ended_at = Some(now);
        log::debug!("ended at {} with {:?}", now, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::BTreeSet;

    fn board(size: Coord2, mines: &[Coord2]) -> Board {
        Board::new(MineLayout::from_mine_coords(size, mines).unwrap())
    }

    fn revealed_set(board: &Board) -> BTreeSet<Coord2> {
        board.revealed().collect()
    }

    #[test]
    fn reveal_hits_mine_and_sets_exploded_cell() {
        let mut board = board((2, 2), &[(0, 0)]);

        let result = board.reveal((0, 0)).unwrap();

        assert_eq!(result.status, GameStatus::Lost);
        assert_eq!(result.exploded, Some((0, 0)));
        assert_eq!(result.revealed, vec![(0, 0)]);
        assert_eq!(board.status(), GameStatus::Lost);
        assert_eq!(board.exploded(), Some((0, 0)));
        assert_eq!(board.cell_at((0, 0)), Ok(EngineCell::Exploded));
        assert_eq!(revealed_set(&board), BTreeSet::from([(0, 0)]));
    }

    #[test]
    fn reveal_mine_does_not_cascade() {
        let mut board = board((3, 3), &[(1, 1)]);
        board.reveal((0, 0)).unwrap();
        let before = board.revealed_count();

        let result = board.reveal((1, 1)).unwrap();

        assert_eq!(result.revealed.len(), 1);
        assert_eq!(board.revealed_count(), before);
        assert_eq!(board.revealed().count(), usize::from(before) + 1);
    }

    #[test]
    fn reveal_flood_fill_opens_zero_region() {
        let mut board = board((3, 3), &[(2, 2)]);

        let result = board.reveal((0, 0)).unwrap();

        assert_eq!(result.status, GameStatus::Won);
        assert_eq!(result.revealed.len(), 8);
        assert_eq!(result.revealed[0], (0, 0));
        assert_eq!(board.cell_at((0, 0)), Ok(EngineCell::Revealed(0)));
        assert_eq!(board.cell_at((1, 1)), Ok(EngineCell::Revealed(1)));
        assert_eq!(board.cell_at((2, 2)), Ok(EngineCell::Hidden));
    }

    #[test]
    fn flood_fill_stops_at_numbered_border() {
        // column 2 is a wall of mines, so the zero region is column 0
        let mut board = board((3, 4), &[(0, 2), (1, 2), (2, 2)]);

        let result = board.reveal((1, 0)).unwrap();

        assert_eq!(result.status, GameStatus::InProgress);
        let opened: BTreeSet<_> = result.revealed.into_iter().collect();
        assert_eq!(
            opened,
            BTreeSet::from([(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)])
        );
        assert_eq!(board.cell_at((1, 3)), Ok(EngineCell::Hidden));
    }

    #[test]
    fn numbered_cell_reveals_only_itself() {
        let mut board = board((3, 3), &[(0, 0)]);

        let result = board.reveal((1, 1)).unwrap();

        assert_eq!(result.revealed, vec![(1, 1)]);
        assert_eq!(board.cell_at((1, 1)), Ok(EngineCell::Revealed(1)));
        assert_eq!(board.status(), GameStatus::InProgress);
    }

    #[test]
    fn reveal_is_idempotent() {
        let mut board = board((4, 4), &[(3, 3)]);
        board.reveal((2, 3)).unwrap();
        let snapshot = board.clone();

        let result = board.reveal((2, 3)).unwrap();

        assert!(!result.has_update());
        assert_eq!(result.status, GameStatus::InProgress);
        assert_eq!(board, snapshot);
    }

    #[test]
    fn mine_free_board_wins_on_first_reveal() {
        let mut board = board((5, 7), &[]);

        let result = board.reveal((4, 6)).unwrap();

        assert_eq!(result.status, GameStatus::Won);
        assert_eq!(result.revealed.len(), 35);
        assert_eq!(board.revealed_count(), 35);
    }

    #[test]
    fn winning_board_transitions_to_won_state() {
        let mut board = board((1, 2), &[(0, 0)]);

        let result = board.reveal((0, 1)).unwrap();

        assert_eq!(result.status, GameStatus::Won);
        assert!(board.is_finished());
        assert_eq!(board.exploded(), None);
    }

    #[test]
    fn win_is_only_detected_on_the_last_safe_cell() {
        let mut board = board((1, 4), &[(0, 0), (0, 3)]);

        assert_eq!(board.reveal((0, 1)).unwrap().status, GameStatus::InProgress);
        assert_eq!(board.reveal((0, 2)).unwrap().status, GameStatus::Won);
    }

    #[test]
    fn finished_board_ignores_reveals() {
        let mut board = board((2, 2), &[(0, 0)]);
        board.reveal((0, 0)).unwrap();
        let snapshot = board.clone();

        let result = board.reveal((1, 1)).unwrap();

        assert_eq!(result, RevealResult::unchanged(GameStatus::Lost));
        assert_eq!(board, snapshot);
    }

    #[test]
    fn won_board_ignores_reveals() {
        let mut board = board((2, 2), &[(0, 0)]);
        board.reveal((0, 1)).unwrap();
        board.reveal((1, 0)).unwrap();
        assert_eq!(board.reveal((1, 1)).unwrap().status, GameStatus::Won);
        let snapshot = board.clone();

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealResult::unchanged(GameStatus::Won));
        assert_eq!(board.reveal((1, 1)).unwrap(), RevealResult::unchanged(GameStatus::Won));
        assert_eq!(board, snapshot);
        assert_eq!(board.exploded(), None);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut board = board((2, 3), &[]);

        assert_eq!(board.reveal((2, 0)), Err(GameError::OutOfBounds));
        assert_eq!(board.reveal((0, 3)), Err(GameError::OutOfBounds));
        assert_eq!(board.adjacent_mine_count((5, 5)), Err(GameError::OutOfBounds));
        assert_eq!(board.cell_at((2, 3)), Err(GameError::OutOfBounds));
    }

    #[test]
    fn reset_clears_state_and_replaces_mines() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut board = board((2, 2), &[(0, 0)]);
        board.reveal((0, 0)).unwrap();

        board.reset(Difficulty::Easy.config(), &mut rng).unwrap();

        assert_eq!(board.status(), GameStatus::InProgress);
        assert_eq!(board.size(), (8, 8));
        assert_eq!(board.total_mines(), 10);
        assert_eq!(board.revealed().count(), 0);
        assert_eq!(board.exploded(), None);
        assert_eq!(board.elapsed_secs(), 0);
    }

    #[test]
    fn reset_with_invalid_config_keeps_board() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut board = board((2, 2), &[(0, 0)]);
        let snapshot = board.clone();

        let result = board.reset(GameConfig::new_unchecked((2, 2), 4), &mut rng);

        assert_eq!(result, Err(GameError::InvalidConfiguration));
        assert_eq!(board, snapshot);
    }

    #[test]
    fn timer_starts_on_first_reveal_and_freezes_at_end() {
        let mut board = board((1, 4), &[(0, 0), (0, 2)]);
        assert_eq!(board.elapsed_secs(), 0);

        board.reveal((0, 3)).unwrap();
        assert_eq!(board.status(), GameStatus::InProgress);
        let started_at = board.started_at.unwrap();
        assert_eq!(
            board.elapsed_secs_at(started_at + chrono::Duration::seconds(5)),
            5
        );

        assert_eq!(board.reveal((0, 1)).unwrap().status, GameStatus::Won);
        let ended_at = board.ended_at.unwrap();
        let frozen = board.elapsed_secs_at(ended_at + chrono::Duration::seconds(60));
        assert_eq!(frozen, board.elapsed_secs_at(ended_at));
    }

    #[test]
    fn restore_revealed_does_not_cascade() {
        let mut board = board((3, 3), &[(2, 2)]);

        assert_eq!(board.restore_revealed((0, 0)), Ok(true));
        assert_eq!(board.restore_revealed((0, 0)), Ok(false));

        assert_eq!(revealed_set(&board), BTreeSet::from([(0, 0)]));
        assert_eq!(board.status(), GameStatus::InProgress);
        assert_eq!(board.elapsed_secs(), 0);
    }

    #[test]
    fn restore_revealed_reconciles_status() {
        let mut won = board((1, 2), &[(0, 0)]);
        won.restore_revealed((0, 1)).unwrap();
        assert_eq!(won.status(), GameStatus::Won);

        let mut lost = board((1, 3), &[(0, 0), (0, 2)]);
        lost.restore_revealed((0, 0)).unwrap();
        assert_eq!(lost.status(), GameStatus::Lost);
        assert_eq!(lost.exploded(), Some((0, 0)));
        assert_eq!(
            lost.restore_cell((0, 2)),
            Err(GameError::CorruptSaveData("more than one revealed mine"))
        );
    }

    #[test]
    fn restore_revealed_leaves_finished_boards_alone() {
        let mut won = board((1, 2), &[(0, 0)]);
        assert_eq!(won.reveal((0, 1)).unwrap().status, GameStatus::Won);
        let snapshot = won.clone();

        assert_eq!(won.restore_revealed((0, 0)), Ok(false));
        assert_eq!(won, snapshot);
        assert_eq!(won.exploded(), None);

        let mut lost = board((1, 3), &[(0, 0), (0, 2)]);
        lost.reveal((0, 0)).unwrap();
        let snapshot = lost.clone();

        assert_eq!(lost.restore_revealed((0, 1)), Ok(false));
        assert_eq!(lost.restore_revealed((0, 2)), Ok(false));
        assert_eq!(lost, snapshot);
        assert_eq!(lost.restore_revealed((0, 3)), Err(GameError::OutOfBounds));
    }
}
