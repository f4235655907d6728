use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use nix::unistd::{geteuid, getuid, seteuid, setuid, Uid};

static DROPPED_FOR_GOOD: AtomicBool = AtomicBool::new(false);

/// Temporarily drop a setuid-root effective uid back to the invoking user.
///
/// Call this first thing in `main`, before option parsing. The saved
/// set-user-id keeps root re-acquirable until [`ElevatedScope`] performs
/// the permanent drop.
pub fn drop_effective_privileges() {
    let _ = seteuid(getuid());
}

/// Scoped window of elevated rights.
///
/// `acquire` restores effective uid 0 (possible on a setuid-root install,
/// or when the invoking user already is root). The scope ends in exactly
/// one way: a permanent drop of all three uids to the invoking user, after
/// which root cannot be regained for the lifetime of the process. Every
/// exit path, including early failures that unwind past the guard, takes
/// that drop through `Drop`.
pub struct ElevatedScope {
    real: Uid,
    elevated: bool,
}

impl ElevatedScope {
    pub fn acquire() -> Self {
        let real = getuid();
        // Fails harmlessly when the binary is not setuid root; opening the
        // device may still succeed through group permissions.
        let elevated = seteuid(Uid::from_raw(0)).is_ok();

        if !elevated {
            debug!("could not raise effective uid, continuing unprivileged");
        }

        Self { real, elevated }
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// Relinquish elevated rights irrecoverably. A repeated drop (from any
    /// scope in the process) is a no-op.
    pub fn drop_for_good(mut self) {
        self.drop_inner();
    }

    fn drop_inner(&mut self) {
        if DROPPED_FOR_GOOD.swap(true, Ordering::SeqCst) {
            self.elevated = false;
            return;
        }

        // setuid with euid 0 resets real, effective and saved uid at once,
        // so the kernel refuses any later seteuid(0).
        if setuid(self.real).is_err() {
            let _ = seteuid(self.real);
        }
        self.elevated = false;
    }
}

impl Drop for ElevatedScope {
    fn drop(&mut self) {
        self.drop_inner();
    }
}

/// Whether the process holds, or can still re-acquire, elevated rights.
///
/// The sampling loop must never run while this is true for a non-root
/// invoking user.
pub fn can_reacquire_root() -> bool {
    match nix::unistd::getresuid() {
        Ok(res) => res.effective.is_root() || res.saved.is_root(),
        Err(_) => geteuid().is_root(),
    }
}
