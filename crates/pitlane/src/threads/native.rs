//! OS scheduling hints: pthread priority and CPU affinity.
//!
//! Priority mapping within the thread's current policy's range:
//!
//! | Priority   | Policy           | Value                 |
//! |------------|------------------|-----------------------|
//! | `Low`      | current          | min                   |
//! | `Normal`   | current          | (min + max) / 2       |
//! | `High`     | current          | max - 1, at least min |
//! | `RealTime` | `SCHED_RR`       | max                   |

#![allow(unsafe_code)]

use std::thread::JoinHandle;

use super::types::{NativeHint, ThreadPriority};

/// Applies `priority` to the thread behind `handle`.
#[cfg(unix)]
pub(crate) fn apply_priority<T>(handle: &JoinHandle<T>, priority: ThreadPriority) -> NativeHint {
    use std::os::unix::thread::JoinHandleExt;

    let thread = handle.as_pthread_t();

    // SAFETY: `thread` is a valid pthread handle until `handle` is joined,
    // and `handle` is borrowed for the whole block.
    unsafe {
        let mut policy: libc::c_int = 0;
        let mut param: libc::sched_param = std::mem::zeroed();
        let rc = libc::pthread_getschedparam(thread, &mut policy, &mut param);
        if rc != 0 {
            return NativeHint::Rejected { code: rc };
        }

        if priority == ThreadPriority::RealTime {
            policy = libc::SCHED_RR;
        }

        let min = libc::sched_get_priority_min(policy);
        let max = libc::sched_get_priority_max(policy);
        if min < 0 || max < 0 {
            return NativeHint::Unsupported;
        }

        param.sched_priority = match priority {
            ThreadPriority::Low => min,
            ThreadPriority::Normal => (min + max) / 2,
            ThreadPriority::High => (max - 1).max(min),
            ThreadPriority::RealTime => max,
        };

        match libc::pthread_setschedparam(thread, policy, &param) {
            0 => NativeHint::Applied,
            code => NativeHint::Rejected { code },
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn apply_priority<T>(_handle: &JoinHandle<T>, _priority: ThreadPriority) -> NativeHint {
    NativeHint::Unsupported
}

/// Restricts the thread behind `handle` to the cores set in `core_mask`
/// (bit N = core N).
#[cfg(target_os = "linux")]
pub(crate) fn apply_affinity<T>(handle: &JoinHandle<T>, core_mask: u64) -> NativeHint {
    use std::os::unix::thread::JoinHandleExt;

    if core_mask == 0 {
        return NativeHint::Rejected { code: libc::EINVAL };
    }

    // SAFETY: same handle validity as `apply_priority`; `set` is a plain
    // bitset initialized by CPU_ZERO before use.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        for core in 0..64_usize {
            if core_mask & (1_u64 << core) != 0 {
                libc::CPU_SET(core, &mut set);
            }
        }

        match libc::pthread_setaffinity_np(
            handle.as_pthread_t(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        ) {
            0 => NativeHint::Applied,
            code => NativeHint::Rejected { code },
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn apply_affinity<T>(_handle: &JoinHandle<T>, _core_mask: u64) -> NativeHint {
    NativeHint::Unsupported
}
