use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid operand: {0}")]
    InvalidOperandKind(String),

    #[error("Cycle detected in the graph at node a{0}. Nodes can only depend on nodes created before them.")]
    CyclicGraphDetected(u32),

    #[error("Invalid direction option {0:?}, expected \"LR\" or \"TB\"")]
    InvalidDirectionOption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
