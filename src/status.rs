//! Translation between errno values, [`SemaphoreError`] and the framework's
//! integer status space.

use libc::c_int;
use nix::errno::Errno;

use crate::{SemResult, SemaphoreError};

pub const NO_ERROR: i32 = 0;
pub const BAD_VALUE: i32 = -libc::EINVAL;
pub const NO_MEMORY: i32 = -libc::ENOMEM;
pub const NO_INIT: i32 = -libc::ENODEV;
pub const ALREADY_EXISTS: i32 = -libc::EEXIST;
pub const TIMED_OUT: i32 = -libc::ETIMEDOUT;

pub fn translate(errno: Errno) -> SemaphoreError {
    match errno {
        Errno::EINVAL => SemaphoreError::InvalidArgument,
        Errno::ENOMEM => SemaphoreError::OutOfMemory,
        Errno::ETIMEDOUT => SemaphoreError::TimedOut,
        other => SemaphoreError::Os(other),
    }
}

/// Maps the return value of a `sem_*` call, reading `errno` on failure.
#[inline]
pub fn check(ret: c_int) -> SemResult<()> {
    match ret {
        0 => Ok(()),
        _ => Err(translate(Errno::last())),
    }
}

impl SemaphoreError {
    pub fn status(&self) -> i32 {
        match self {
            SemaphoreError::InvalidArgument => BAD_VALUE,
            SemaphoreError::OutOfMemory => NO_MEMORY,
            SemaphoreError::NotInitialized => NO_INIT,
            SemaphoreError::AlreadyInitialized => ALREADY_EXISTS,
            SemaphoreError::TimedOut => TIMED_OUT,
            SemaphoreError::Os(errno) => -(*errno as i32),
        }
    }
}

impl From<SemaphoreError> for i32 {
    fn from(err: SemaphoreError) -> i32 {
        err.status()
    }
}

pub fn status_of(result: SemResult<()>) -> i32 {
    match result {
        Ok(()) => NO_ERROR,
        Err(e) => e.status(),
    }
}
