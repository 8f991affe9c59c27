//! Real-time process setup on Linux: memory locking and SCHED_FIFO.
//!
//! Both steps are best effort. A failure is logged and the move still runs
//! under the normal scheduler.

use crate::cli::{RtArgs, RtLock};

#[cfg(target_os = "linux")]
pub fn setup_rt_once(args: RtArgs) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !args.rt {
        return;
    }
    let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
    RT_ONCE.get_or_init(|| {
        match lock_memory(lock) {
            Ok(()) => tracing::info!(?lock, "rt memory lock applied"),
            Err(err) => tracing::warn!(?lock, error = %err, "mlockall failed"),
        }
        match apply_fifo(args.rt_prio) {
            Ok(prio) => tracing::info!(prio, "rt SCHED_FIFO applied"),
            Err(err) => tracing::warn!(requested = ?args.rt_prio, error = %err, "SCHED_FIFO not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(args: RtArgs) {
    if args.rt {
        tracing::warn!("real-time mode is only supported on Linux; ignoring --rt");
    }
}

#[cfg(target_os = "linux")]
fn memlock_limit_hint() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit writes a full rlimit on success.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 above.
    let r = unsafe { rlim.assume_init() };
    Some(if r.rlim_cur == libc::RLIM_INFINITY {
        "memlock limit: unlimited".to_owned()
    } else {
        format!("memlock limit: {} KiB", r.rlim_cur / 1024)
    })
}

#[cfg(target_os = "linux")]
fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    // SAFETY: plain syscall wrapper with no pointer arguments.
    if unsafe { libc::mlockall(flags) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(target_os = "linux")]
fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => libc::MCL_CURRENT,
        RtLock::All => libc::MCL_CURRENT | libc::MCL_FUTURE,
    };
    let Err(err) = mlockall(flags) else {
        return Ok(());
    };
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);

    // current|future can fail on a tight memlock limit where current alone fits
    if lock == RtLock::All && retryable && mlockall(libc::MCL_CURRENT).is_ok() {
        tracing::warn!(error = %err, "mlockall(current|future) failed; locked current pages only");
        return Ok(());
    }

    let mut msg = format!("mlockall({lock:?}) failed: {err}");
    if retryable {
        if let Some(h) = memlock_limit_hint() {
            msg.push_str("; ");
            msg.push_str(&h);
        }
        msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

/// Switch the process to SCHED_FIFO at `prio` (default: system max),
/// clamped to the allowed range. Returns the priority applied.
#[cfg(target_os = "linux")]
fn apply_fifo(prio: Option<i32>) -> eyre::Result<i32> {
    // SAFETY: no arguments beyond the policy constant.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let prio = prio.unwrap_or(max).clamp(min, max);
    let param = libc::sched_param {
        sched_priority: prio,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling process.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            eyre::bail!(
                "{err}; hint: run as root or grant CAP_SYS_NICE: 'sudo setcap cap_sys_nice=ep /path/to/stepgen'"
            );
        }
        return Err(eyre::eyre!(err));
    }
    Ok(prio)
}
