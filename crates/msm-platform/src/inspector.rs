//! Cross-platform process liveness/cpu/memory inspection.
//!
//! Grounded on `crates/services/src/services/process_inspector/sysinfo_impl.rs`
//! (`SysinfoProcessInspector`); generalized here from "associate OS processes
//! with kanban tasks" to "report the `status()` operation's liveness, cpu,
//! and memory for one managed server pid".

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub alive: bool,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Refreshes only the requested pid rather than the whole process table, to
/// stay well under the tens-of-milliseconds budget `is_alive` is held to.
pub fn snapshot(pid: u32) -> ProcessSnapshot {
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::everything(),
    );

    match system.process(sys_pid) {
        Some(process) => ProcessSnapshot {
            pid,
            alive: true,
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
        },
        None => ProcessSnapshot {
            pid,
            alive: false,
            cpu_percent: 0.0,
            memory_bytes: 0,
        },
    }
}

pub fn is_alive(pid: u32) -> bool {
    snapshot(pid).alive
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_reported_alive() {
        let pid = std::process::id();
        let snap = snapshot(pid);
        assert!(snap.alive);
        assert_eq!(snap.pid, pid);
    }

    #[test]
    fn implausible_pid_is_reported_dead() {
        let snap = snapshot(u32::MAX);
        assert!(!snap.alive);
    }
}
