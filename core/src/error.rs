use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid board configuration")]
    InvalidConfiguration,
    #[error("Coordinates are outside the board")]
    OutOfBounds,
    #[error("Corrupt save data: {0}")]
    CorruptSaveData(&'static str),
}

pub type Result<T> = core::result::Result<T, GameError>;
