//! `free_port` (§4.1): bind-then-close on loopback, with a best-effort
//! holder-pid lookup on Linux via `/proc/net/tcp`. Other platforms report
//! `free: false, holder_pid: None` on conflict rather than guessing.

use std::net::TcpListener;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PortCheck {
    pub free: bool,
    pub holder_pid: Option<u32>,
}

pub fn check(tcp_port: u16) -> PortCheck {
    match TcpListener::bind(("127.0.0.1", tcp_port)) {
        Ok(listener) => {
            drop(listener);
            PortCheck { free: true, holder_pid: None }
        }
        Err(_) => PortCheck {
            free: false,
            holder_pid: holder_pid_linux(tcp_port),
        },
    }
}

#[cfg(target_os = "linux")]
fn holder_pid_linux(tcp_port: u16) -> Option<u32> {
    let target_hex = format!("{tcp_port:04X}");
    let inode = find_inode_for_port(&target_hex)?;
    find_pid_owning_inode(inode)
}

#[cfg(target_os = "linux")]
fn find_inode_for_port(target_hex: &str) -> Option<String> {
    let contents = std::fs::read_to_string("/proc/net/tcp").ok()?;
    for line in contents.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(local_addr) = fields.first() else { continue };
        let Some((_, port_hex)) = local_addr.split_once(':') else { continue };
        if port_hex.eq_ignore_ascii_case(target_hex) {
            if let Some(inode) = fields.get(9) {
                return Some((*inode).to_string());
            }
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn find_pid_owning_inode(inode: String) -> Option<u32> {
    let needle = format!("socket:[{inode}]");
    let proc_dir = std::fs::read_dir("/proc").ok()?;
    for entry in proc_dir.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else { continue };
        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else { continue };
        for fd in fds.flatten() {
            if let Ok(link) = std::fs::read_link(fd.path()) {
                if link.to_string_lossy() == needle {
                    return Some(pid);
                }
            }
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn holder_pid_linux(_tcp_port: u16) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_already_bound_port_is_reported_not_free() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = check(port);
        assert!(!result.free);

        drop(listener);
    }

    #[test]
    fn an_unused_high_port_is_reported_free() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = check(port);
        assert!(result.free);
    }
}
