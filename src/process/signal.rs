//! Thin wrappers over `kill(2)`.

/// Send `signal` to every process in the group led by `pgid`.
///
/// Returns false when the group no longer exists.
pub fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    match i32::try_from(pgid) {
        // pgid 0 would address our own group
        Ok(pgid) if pgid > 0 => unsafe { libc::kill(-pgid, signal) == 0 },
        _ => false,
    }
}

/// Whether any process in the group led by `pgid` is still alive.
pub fn is_group_alive(pgid: u32) -> bool {
    signal_group(pgid, 0)
}

/// Whether a process with this pid exists.
pub fn is_pid_alive(pid: u32) -> bool {
    match i32::try_from(pid) {
        Ok(pid) if pid > 0 => unsafe { libc::kill(pid, 0) == 0 },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_pid_is_never_signalled() {
        assert!(!signal_group(0, 0));
        assert!(!is_pid_alive(0));
    }

    #[test]
    fn test_own_pid_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn test_out_of_range_pid() {
        assert!(!is_pid_alive(u32::MAX));
        assert!(!signal_group(u32::MAX, 0));
    }
}
