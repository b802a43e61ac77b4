use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not enough points: costs {cost}, balance {balance} (short by {shortfall})")]
    InsufficientFunds {
        cost: u32,
        balance: u32,
        shortfall: u32,
    },

    #[error("Task '{0}' not found")]
    NotFound(String),
}

impl GameError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        GameError::Validation(msg.into())
    }
}

pub type GameResult<T> = Result<T, GameError>;
