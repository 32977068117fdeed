use nix::errno::Errno;

pub mod config;
pub mod deadline;
pub mod permit;
pub mod runner;
pub mod semaphore;
pub mod status;

pub use permit::Permit;
pub use semaphore::CountingSemaphore;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("out of memory allocating semaphore")]
    OutOfMemory,
    #[error("semaphore has not been created")]
    NotInitialized,
    #[error("semaphore has already been created")]
    AlreadyInitialized,
    #[error("timed out waiting for semaphore")]
    TimedOut,
    #[error("semaphore operation failed: {0}")]
    Os(Errno),
}

pub type SemResult<T> = Result<T, SemaphoreError>;
