use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::*;

/// The surface a presentation layer drives: one board plus the randomness
/// used to lay out every new game.
#[derive(Clone, Debug)]
pub struct Session<R = SmallRng> {
    rng: R,
    board: Board,
}

impl Session<SmallRng> {
    /// Creates a session whose every layout is reproducible from `seed`.
    pub fn from_seed(config: GameConfig, seed: u64) -> Result<Self> {
        log::debug!("seed: {}", seed);
        Self::new(config, SmallRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Session<R> {
    pub fn new(config: GameConfig, mut rng: R) -> Result<Self> {
        let board = Board::random(config, &mut rng)?;
        Ok(Self { rng, board })
    }

    /// Starts over with a preset or custom configuration.
    pub fn new_game(&mut self, config: impl Into<GameConfig>) -> Result<()> {
        self.board.reset(config.into(), &mut self.rng)
    }

    /// Starts over with the current configuration.
    pub fn restart(&mut self) -> Result<()> {
        self.new_game(self.board.config())
    }

    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealResult> {
        let result = self.board.reveal(coords)?;
        if result.has_update() {
            log::debug!(
                "Revealed {} cells from {:?}, status {:?}",
                result.revealed.len(),
                coords,
                result.status
            );
        }
        Ok(result)
    }

    pub fn adjacent_mine_count(&self, coords: Coord2) -> Result<u8> {
        self.board.adjacent_mine_count(coords)
    }

    pub fn status(&self) -> GameStatus {
        self.board.status()
    }

    pub fn config(&self) -> GameConfig {
        self.board.config()
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.board.elapsed_secs()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        self.board.save()
    }

    /// Replaces the current board with a saved one; on error the current board is kept.
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        self.board = Board::load(bytes)?;
        Ok(())
    }
}
