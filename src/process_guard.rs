//! Lifecycle management for installer child processes
//!
//! Fallback installers run as child processes and can block for a long time.
//! If the operator interrupts benchkit, those children must not keep running
//! unattended in the background.
//!
//! - On Unix, installers are spawned in their own process group with a
//!   parent-death signal, so the whole installer tree can be signalled.
//! - Every running installer PID is tracked in a global registry.
//! - On SIGINT/SIGTERM/SIGHUP (or when the [`ProcessGuard`] is dropped) all
//!   registered installers get SIGTERM, then SIGKILL after a grace period.
//!
//! On other platforms the registry is still maintained, but console control
//! events already reach children sharing the console, so termination is
//! left to the OS.

use std::collections::HashSet;
use std::process::{Command, ExitStatus};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Global registry of running installer PIDs
static INSTALLER_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking spawned installer processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Prevents double cleanup when both a signal and Drop fire
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        INSTALLER_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        tracing::debug!("Registered installer process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        tracing::debug!("Unregistered installer process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked installers.
    /// Sends SIGTERM to each process group, waits up to `grace_period`, then SIGKILL.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            tracing::debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            tracing::debug!("No installer processes to terminate");
            return;
        }

        tracing::info!("Terminating {} installer process(es)...", self.pids.len());

        #[cfg(unix)]
        {
            let pids: Vec<u32> = self.pids.iter().copied().collect();
            for &pid in &pids {
                if let Err(e) = send_signal_to_group(pid, Signal::SIGTERM) {
                    tracing::warn!("Failed to send SIGTERM to process group {}: {}", pid, e);
                    let _ = send_signal(pid, Signal::SIGTERM);
                }
            }

            let start = std::time::Instant::now();
            while start.elapsed() < grace_period {
                if pids.iter().all(|&pid| !is_process_alive(pid)) {
                    tracing::info!("All installer processes terminated gracefully");
                    self.pids.clear();
                    return;
                }
                std::thread::sleep(Duration::from_millis(100));
            }

            for &pid in &pids {
                if is_process_alive(pid) {
                    tracing::warn!("Process group {} did not terminate, sending SIGKILL", pid);
                    if send_signal_to_group(pid, Signal::SIGKILL).is_err() {
                        let _ = send_signal(pid, Signal::SIGKILL);
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = grace_period;
            tracing::warn!(
                "Leaving {} installer process(es) to the OS console shutdown",
                self.pids.len()
            );
        }

        self.pids.clear();
        tracing::info!("Installer process cleanup complete");
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Negative PID signals every process in the group, including whatever the
/// installer itself spawned
#[cfg(unix)]
fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Alive means it exists and is not a zombie
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    true
}

/// RAII guard that terminates running installers when the run ends
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    /// Create a guard attached to the global registry
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        tracing::debug!("ProcessGuard dropped, initiating cleanup");
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Install SIGINT/SIGTERM/SIGHUP handlers that kill running installers and exit.
/// Call once at program start.
///
/// The process exits without unwinding, so `Drop` impls on the main thread do
/// not run; `on_interrupt` gets the signal name right before the exit.
#[cfg(unix)]
pub fn init_signal_handlers<F>(on_interrupt: F) -> Result<(), std::io::Error>
where
    F: FnOnce(&str) + Send + 'static,
{
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };

            tracing::warn!("Received {}, stopping installers...", signal_name);

            // Held until exit: `run_registered` on the main thread blocks on
            // unregister, so the killed installer is never reported as a failure
            let registry = ChildRegistry::global();
            let mut locked = registry.lock();
            if let Ok(children) = locked.as_mut() {
                children.terminate_all(Duration::from_secs(3));
            }

            on_interrupt(signal_name);
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
pub fn init_signal_handlers<F>(_on_interrupt: F) -> Result<(), std::io::Error>
where
    F: FnOnce(&str) + Send + 'static,
{
    Ok(())
}

/// Extension trait for `std::process::Command` to isolate installer process trees
pub trait CommandProcessGroup {
    /// Run the command as leader of its own process group (no-op off Unix)
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for Command {
    #[cfg(unix)]
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        // SAFETY: the closure only calls async-signal-safe functions
        // (setpgid, prctl) between fork and exec.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::from)?;
                set_parent_death_signal()
            });
        }
        self
    }

    #[cfg(not(unix))]
    fn in_new_process_group(&mut self) -> &mut Self {
        self
    }
}

/// Installer dies with benchkit instead of continuing orphaned
#[cfg(target_os = "linux")]
fn set_parent_death_signal() -> std::io::Result<()> {
    use nix::libc;

    // SAFETY: prctl with PR_SET_PDEATHSIG only reads its integer arguments.
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn set_parent_death_signal() -> std::io::Result<()> {
    Ok(())
}

/// Spawn `cmd` in its own process group, track it in the global registry,
/// and block until it exits.
pub fn run_registered(cmd: &mut Command) -> std::io::Result<ExitStatus> {
    let mut child = cmd.in_new_process_group().spawn()?;
    let pid = child.id();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }

    let status = child.wait();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }

    status
}
