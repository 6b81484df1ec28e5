use std::fs::{File, OpenOptions};
use crate::core::error::{Error, Result};
use crate::storage::layout::StoreLayout;

/// One process owns a store's index directory at a time
pub struct FileLock {
    pub file: File,
}

impl FileLock {
    pub fn acquire(layout: &StoreLayout) -> Result<Self> {
        let lock_path = layout.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();
            // SAFETY: fd is a valid descriptor owned by `file` for the duration of the call
            let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
            if rc != 0 {
                return Err(Error::storage(format!(
                    "index directory {} is locked by another process",
                    layout.base_dir.display()
                )));
            }
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            // SAFETY: see acquire
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}
