//! Host network helpers.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Distinct local IPv4 addresses usable as bind addresses, as strings,
/// sorted lexicographically. Always includes the wildcard `0.0.0.0`.
pub fn valid_networks() -> Vec<String> {
    let mut networks: BTreeSet<String> = BTreeSet::new();
    networks.insert("0.0.0.0".to_string());

    for addr in local_ipv4_addresses() {
        networks.insert(addr.to_string());
    }

    networks.into_iter().collect()
}

/// Enumerate IPv4 addresses of all local interfaces.
#[cfg(target_os = "linux")]
pub fn local_ipv4_addresses() -> Vec<Ipv4Addr> {
    let mut addresses = Vec::new();

    let entries = match std::fs::read_dir("/sys/class/net") {
        Ok(entries) => entries,
        Err(_) => return addresses,
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(addr) = ipv4_address_ioctl(&name) {
            addresses.push(addr);
        }
    }

    addresses
}

#[cfg(not(target_os = "linux"))]
pub fn local_ipv4_addresses() -> Vec<Ipv4Addr> {
    vec![]
}

/// Query one interface's IPv4 address via SIOCGIFADDR.
#[cfg(target_os = "linux")]
fn ipv4_address_ioctl(name: &str) -> Option<Ipv4Addr> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::fd::AsRawFd;

    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    let fd = socket.as_raw_fd();

    let mut ifr: libc::ifreq = unsafe { MaybeUninit::zeroed().assume_init() };
    let name_bytes = name.as_bytes();
    if name_bytes.len() >= libc::IFNAMSIZ {
        return None;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(
            name_bytes.as_ptr(),
            ifr.ifr_name.as_mut_ptr() as *mut u8,
            name_bytes.len(),
        );
    }

    let ret = unsafe { libc::ioctl(fd, libc::SIOCGIFADDR, &mut ifr) };
    if ret != 0 {
        return None;
    }

    let addr = unsafe {
        let sockaddr = &ifr.ifr_ifru.ifru_addr as *const _ as *const libc::sockaddr_in;
        Ipv4Addr::from(u32::from_be((*sockaddr).sin_addr.s_addr))
    };

    Some(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_networks_includes_wildcard() {
        let networks = valid_networks();
        assert!(networks.contains(&"0.0.0.0".to_string()));
    }

    #[test]
    fn test_valid_networks_sorted_and_distinct() {
        let networks = valid_networks();

        let mut sorted = networks.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(networks, sorted);
    }
}
