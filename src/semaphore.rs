use std::{
    alloc::{self, Layout},
    ptr::NonNull,
    time::Duration,
};

use libc::{c_int, c_uint, sem_t, timespec};
use nix::errno::Errno;

use crate::{deadline, permit::Permit, status, SemResult, SemaphoreError};

/// Heap-pinned, initialized `sem_t`. The primitive must not move once
/// `sem_init` has run, so it never lives inline in the wrapper.
struct Handle {
    ptr: NonNull<sem_t>,
}

unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    fn layout() -> Layout {
        Layout::new::<sem_t>()
    }

    fn init(count: c_uint) -> SemResult<Handle> {
        let raw = unsafe { alloc::alloc(Self::layout()) } as *mut sem_t;
        let ptr = NonNull::new(raw).ok_or(SemaphoreError::OutOfMemory)?;

        if let Err(e) = status::check(unsafe { libc::sem_init(ptr.as_ptr(), 0, count) }) {
            unsafe { alloc::dealloc(ptr.as_ptr() as *mut u8, Self::layout()) };
            return Err(e);
        }

        Ok(Handle { ptr })
    }

    #[inline]
    fn as_ptr(&self) -> *mut sem_t {
        self.ptr.as_ptr()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = status::check(unsafe { libc::sem_destroy(self.as_ptr()) }) {
            log::warn!("sem_destroy failed: {}", e);
        }
        unsafe { alloc::dealloc(self.as_ptr() as *mut u8, Self::layout()) };
    }
}

/// A counting semaphore backed by an unnamed POSIX semaphore.
///
/// The instance starts out uninitialized; every operation except
/// [`create`](CountingSemaphore::create) reports
/// [`SemaphoreError::NotInitialized`] until creation succeeds. The OS handle
/// is released when the semaphore is dropped. Dropping takes `&mut self`, so
/// a semaphore shared through an `Arc` cannot be destroyed while another
/// thread is blocked on it.
#[derive(Default)]
pub struct CountingSemaphore {
    handle: Option<Handle>,
}

impl CountingSemaphore {
    pub fn new() -> CountingSemaphore {
        CountingSemaphore { handle: None }
    }

    pub fn with_count(initial_count: i32) -> SemResult<CountingSemaphore> {
        let mut sem = CountingSemaphore::new();
        sem.create(initial_count)?;
        Ok(sem)
    }

    /// Initializes the OS semaphore with `initial_count`.
    ///
    /// Fails with `InvalidArgument` for a negative count and with
    /// `AlreadyInitialized` on a second call. If the OS refuses the
    /// initialization the allocation is released and the instance stays
    /// uninitialized.
    pub fn create(&mut self, initial_count: i32) -> SemResult<()> {
        if initial_count < 0 {
            return Err(SemaphoreError::InvalidArgument);
        }

        if self.handle.is_some() {
            return Err(SemaphoreError::AlreadyInitialized);
        }

        let handle = Handle::init(initial_count as c_uint)?;
        log::debug!("created semaphore {:p} with count {}", handle.as_ptr(), initial_count);
        self.handle = Some(handle);

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    #[inline]
    fn handle(&self) -> SemResult<&Handle> {
        self.handle.as_ref().ok_or(SemaphoreError::NotInitialized)
    }

    /// Blocks until the count is positive, then decrements it.
    ///
    /// An interrupted wait is returned to the caller as `Os(EINTR)`.
    pub fn wait(&self) -> SemResult<()> {
        let handle = self.handle()?;
        log::trace!("wait on {:p}", handle.as_ptr());
        status::check(unsafe { libc::sem_wait(handle.as_ptr()) })
    }

    /// Increments the count, waking one blocked waiter if there is one.
    pub fn signal(&self) -> SemResult<()> {
        let handle = self.handle()?;
        log::trace!("signal on {:p}", handle.as_ptr());
        status::check(unsafe { libc::sem_post(handle.as_ptr()) })
    }

    /// Snapshot of the current count. It may be stale as soon as it returns.
    pub fn count(&self) -> SemResult<u32> {
        let handle = self.handle()?;
        let mut value: c_int = 0;
        status::check(unsafe { libc::sem_getvalue(handle.as_ptr(), &mut value) })?;

        Ok(u32::try_from(value).unwrap_or(0))
    }

    /// Like [`wait`](Self::wait), giving up with `TimedOut` after
    /// `timeout_micros` microseconds. A timed out wait leaves the count as is.
    pub fn wait_timeout(&self, timeout_micros: u64) -> SemResult<()> {
        let handle = self.handle()?;
        Self::wait_until(handle, deadline::after_micros(timeout_micros)?)
    }

    pub fn wait_for(&self, timeout: Duration) -> SemResult<()> {
        let handle = self.handle()?;
        Self::wait_until(handle, deadline::after(timeout)?)
    }

    fn wait_until(handle: &Handle, deadline: timespec) -> SemResult<()> {
        log::trace!(
            "timed wait on {:p} until {}.{:09}",
            handle.as_ptr(),
            deadline.tv_sec,
            deadline.tv_nsec
        );
        status::check(unsafe { libc::sem_timedwait(handle.as_ptr(), &deadline) })
    }

    /// Decrements the count if it is positive. Returns `false` instead of
    /// blocking when it is zero.
    pub fn try_wait(&self) -> SemResult<bool> {
        let handle = self.handle()?;
        match unsafe { libc::sem_trywait(handle.as_ptr()) } {
            0 => Ok(true),
            _ => match Errno::last() {
                Errno::EAGAIN => Ok(false),
                errno => Err(status::translate(errno)),
            },
        }
    }

    /// Waits, then hands out a [`Permit`] that signals again on drop.
    pub fn acquire(&self) -> SemResult<Permit<'_>> {
        self.wait()?;
        Ok(Permit::new(self))
    }
}

impl Drop for CountingSemaphore {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::debug!("destroying semaphore {:p}", handle.as_ptr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_count() {
        for n in [0, 1, 7, 1024] {
            let sem = CountingSemaphore::with_count(n).unwrap();
            assert_eq!(sem.count(), Ok(n as u32));
        }
    }

    #[test]
    fn negative_count_is_rejected() {
        let mut sem = CountingSemaphore::new();
        assert_eq!(sem.create(-1), Err(SemaphoreError::InvalidArgument));
        assert_eq!(sem.create(i32::MIN), Err(SemaphoreError::InvalidArgument));
        assert!(!sem.is_initialized());
        assert_eq!(sem.wait(), Err(SemaphoreError::NotInitialized));
        assert_eq!(sem.signal(), Err(SemaphoreError::NotInitialized));
        assert_eq!(sem.count(), Err(SemaphoreError::NotInitialized));
        assert_eq!(sem.wait_timeout(10), Err(SemaphoreError::NotInitialized));
    }

    #[test]
    fn uninitialized_operations_fail_uniformly() {
        let sem = CountingSemaphore::new();
        assert_eq!(sem.wait(), Err(SemaphoreError::NotInitialized));
        assert_eq!(sem.signal(), Err(SemaphoreError::NotInitialized));
        assert_eq!(sem.count(), Err(SemaphoreError::NotInitialized));
        assert_eq!(sem.wait_timeout(0), Err(SemaphoreError::NotInitialized));
        assert_eq!(
            sem.wait_for(Duration::from_millis(1)),
            Err(SemaphoreError::NotInitialized)
        );
        assert_eq!(sem.try_wait(), Err(SemaphoreError::NotInitialized));
        assert!(sem.acquire().is_err());
    }

    #[test]
    fn second_create_is_refused() {
        let mut sem = CountingSemaphore::with_count(2).unwrap();
        assert_eq!(sem.create(5), Err(SemaphoreError::AlreadyInitialized));
        assert_eq!(sem.count(), Ok(2));
    }

    #[test]
    fn signal_then_wait_does_not_block() {
        let sem = CountingSemaphore::with_count(0).unwrap();
        sem.signal().unwrap();
        assert_eq!(sem.count(), Ok(1));
        sem.wait().unwrap();
        assert_eq!(sem.count(), Ok(0));
    }

    #[test]
    fn signal_at_max_count_reports_overflow() {
        let sem = CountingSemaphore::with_count(i32::MAX).unwrap();
        assert_eq!(sem.signal(), Err(SemaphoreError::Os(Errno::EOVERFLOW)));
        assert_eq!(sem.count(), Ok(i32::MAX as u32));
        assert_eq!(sem.try_wait(), Ok(true));
        assert_eq!(sem.signal(), Ok(()));
    }

    #[test]
    fn try_wait_reports_empty() {
        let sem = CountingSemaphore::with_count(1).unwrap();
        assert_eq!(sem.try_wait(), Ok(true));
        assert_eq!(sem.try_wait(), Ok(false));
        assert_eq!(sem.count(), Ok(0));
    }

    #[test]
    fn timed_wait_succeeds_when_available() {
        let sem = CountingSemaphore::with_count(1).unwrap();
        assert_eq!(sem.wait_timeout(0), Ok(()));
        assert_eq!(sem.count(), Ok(0));
    }

    #[test]
    fn dropping_uncreated_is_noop() {
        drop(CountingSemaphore::new());
        drop(CountingSemaphore::default());
    }
}
