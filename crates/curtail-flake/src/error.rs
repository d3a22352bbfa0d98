use jiff::Timestamp;
use thiserror::Error;

/// Errors returned by Flake initialization and ID generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid machine id {machine_id}; expected 0..={max_machine_id}")]
    InvalidMachineId { machine_id: u16, max_machine_id: u16 },
    #[error("epoch is ahead of current clock time: epoch={epoch}, now={now}")]
    EpochAhead { epoch: Timestamp, now: Timestamp },
    #[error("elapsed time no longer fits the 42-bit timestamp field")]
    OverTimeLimit,
}
