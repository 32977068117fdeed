use crate::CountingSemaphore;

/// One unit taken from a [`CountingSemaphore`], returned when dropped.
#[must_use = "dropping the permit signals the semaphore immediately"]
pub struct Permit<'a> {
    semaphore: Option<&'a CountingSemaphore>,
}

impl<'a> Permit<'a> {
    pub(crate) fn new(semaphore: &'a CountingSemaphore) -> Permit<'a> {
        Permit {
            semaphore: Some(semaphore),
        }
    }

    /// Keeps the unit taken: the semaphore is not signalled.
    pub fn forget(mut self) {
        self.semaphore = None;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Some(semaphore) = self.semaphore.take() {
            if let Err(e) = semaphore.signal() {
                log::warn!("failed to return permit: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::CountingSemaphore;

    #[test]
    fn drop_returns_the_unit() {
        let sem = CountingSemaphore::with_count(2).unwrap();
        {
            let _a = sem.acquire().unwrap();
            let _b = sem.acquire().unwrap();
            assert_eq!(sem.count(), Ok(0));
        }
        assert_eq!(sem.count(), Ok(2));
    }

    #[test]
    fn forget_keeps_the_unit() {
        let sem = CountingSemaphore::with_count(1).unwrap();
        sem.acquire().unwrap().forget();
        assert_eq!(sem.count(), Ok(0));
    }
}
