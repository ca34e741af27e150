//! Opt-in recovery for a UDP port held by a stale process. Linux `/proc` only.

use log::{info, warn};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use sysinfo::{Pid, Signal, System};

const UDP_TABLES: [&str; 2] = ["/proc/net/udp", "/proc/net/udp6"];
const RELEASE_WAIT: Duration = Duration::from_secs(1);

/// Socket inodes bound to local UDP `port`.
pub fn socket_inodes(port: u16) -> Vec<u64> {
    UDP_TABLES
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok())
        .flat_map(|table| parse_udp_table(&table, port))
        .collect()
}

fn parse_udp_table(table: &str, port: u16) -> Vec<u64> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (_, port_hex) = fields.get(1)?.rsplit_once(':')?;
            let local_port = u16::from_str_radix(port_hex, 16).ok()?;
            if local_port != port {
                return None;
            }
            fields.get(9)?.parse().ok()
        })
        .filter(|&inode| inode != 0)
        .collect()
}

/// Processes with an open descriptor on any of `inodes`, excluding this one.
pub fn socket_holders(inodes: &[u64]) -> Vec<u32> {
    let own = std::process::id();
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter(|&pid| pid != own)
        .filter(|&pid| holds_any(&Path::new("/proc").join(pid.to_string()).join("fd"), inodes))
        .collect()
}

fn holds_any(fd_dir: &Path, inodes: &[u64]) -> bool {
    let Ok(descriptors) = fs::read_dir(fd_dir) else {
        return false;
    };
    descriptors
        .filter_map(Result::ok)
        .filter_map(|fd| fs::read_link(fd.path()).ok())
        .filter_map(|target| socket_inode(&target.to_string_lossy()))
        .any(|inode| inodes.contains(&inode))
}

fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

/// Terminates every other process bound to UDP `port` and waits for the port to
/// be released. Returns how many processes were signalled.
pub fn reclaim_udp_port(port: u16) -> usize {
    let inodes = socket_inodes(port);
    if inodes.is_empty() {
        info!("no socket found on UDP port {}", port);
        return 0;
    }
    let holders = socket_holders(&inodes);
    let mut system = System::new();
    system.refresh_processes();

    let mut signalled = 0;
    for pid in holders {
        let Some(process) = system.process(Pid::from_u32(pid)) else {
            continue;
        };
        warn!(
            "terminating process {} ({}) holding UDP port {}",
            pid,
            process.name(),
            port
        );
        let delivered = process
            .kill_with(Signal::Term)
            .unwrap_or_else(|| process.kill());
        if delivered {
            signalled += 1;
        } else {
            warn!("could not signal process {}", pid);
        }
    }
    if signalled > 0 {
        thread::sleep(RELEASE_WAIT);
    }
    signalled
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
   sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops
  312: 1E21A8C0:1000 00000000:0000 07 00000000:00000000 00:00000000 00000000  1000        0 48213 2 0000000000000000 0
  313: 0100007F:1002 00000000:0000 07 00000000:00000000 00:00000000 00000000  1000        0 48214 2 0000000000000000 0
";

    #[test]
    fn udp_table_matches_local_port() {
        assert_eq!(parse_udp_table(TABLE, 4096), vec![48213]);
        assert_eq!(parse_udp_table(TABLE, 4098), vec![48214]);
        assert!(parse_udp_table(TABLE, 9000).is_empty());
    }

    #[test]
    fn socket_links_yield_inodes() {
        assert_eq!(socket_inode("socket:[48213]"), Some(48213));
        assert_eq!(socket_inode("pipe:[12]"), None);
        assert_eq!(socket_inode("/dev/null"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn own_socket_is_never_a_reclaim_target() {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();
        let inodes = socket_inodes(port);
        assert!(!inodes.is_empty());
        assert!(socket_holders(&inodes).is_empty());
    }
}
