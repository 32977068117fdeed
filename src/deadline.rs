//! `sem_timedwait` takes an absolute `CLOCK_REALTIME` deadline, not a
//! relative duration.

use std::{mem::MaybeUninit, time::Duration};

use libc::{time_t, timespec};

use crate::{status, SemResult};

const NANOS_PER_SEC: i64 = 1_000_000_000;

pub fn now() -> SemResult<timespec> {
    let mut ts = MaybeUninit::<timespec>::uninit();
    status::check(unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, ts.as_mut_ptr()) })?;
    Ok(unsafe { ts.assume_init() })
}

/// Adds `timeout` to `base`, saturating at the largest representable time.
pub fn offset(base: timespec, timeout: Duration) -> timespec {
    let secs = time_t::try_from(timeout.as_secs()).unwrap_or(time_t::MAX);
    let mut nsec = base.tv_nsec as i64 + i64::from(timeout.subsec_nanos());
    let mut sec = base.tv_sec.saturating_add(secs);

    if nsec >= NANOS_PER_SEC {
        nsec -= NANOS_PER_SEC;
        sec = sec.saturating_add(1);
    }

    if sec == time_t::MAX {
        nsec = nsec.min(NANOS_PER_SEC - 1);
    }

    timespec {
        tv_sec: sec,
        tv_nsec: nsec as _,
    }
}

pub fn after(timeout: Duration) -> SemResult<timespec> {
    Ok(offset(now()?, timeout))
}

pub fn after_micros(timeout_micros: u64) -> SemResult<timespec> {
    after(Duration::from_micros(timeout_micros))
}
