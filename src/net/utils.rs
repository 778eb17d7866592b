//! Address conversion and descriptor flag helpers.

use libc::{
    AF_INET, AF_INET6, F_GETFD, F_GETFL, F_SETFD, F_SETFL, FD_CLOEXEC, O_NONBLOCK, c_int, fcntl,
    sa_family_t, sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t,
};
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::RawFd;
use std::ptr;

/// Turns `O_NONBLOCK` on or off for `file_descriptor`.
pub fn set_nonblocking(file_descriptor: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = unsafe { fcntl(file_descriptor, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let flags = if nonblocking {
        flags | O_NONBLOCK
    } else {
        flags & !O_NONBLOCK
    };

    if unsafe { fcntl(file_descriptor, F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Marks `file_descriptor` close-on-exec.
pub fn set_cloexec(file_descriptor: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(file_descriptor, F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { fcntl(file_descriptor, F_SETFD, flags | FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

pub(crate) fn domain_of(address: &SocketAddr) -> c_int {
    match address {
        SocketAddr::V4(_) => AF_INET,
        SocketAddr::V6(_) => AF_INET6,
    }
}

pub(crate) fn socket_addr_to_raw(address: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    let length = match address {
        SocketAddr::V4(v4) => {
            let mut raw: sockaddr_in = unsafe { mem::zeroed() };
            raw.sin_family = AF_INET as sa_family_t;
            raw.sin_port = v4.port().to_be();
            raw.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            #[cfg(any(target_os = "macos", target_os = "ios"))]
            {
                raw.sin_len = mem::size_of::<sockaddr_in>() as u8;
            }

            unsafe { ptr::write(&mut storage as *mut _ as *mut sockaddr_in, raw) };
            mem::size_of::<sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let mut raw: sockaddr_in6 = unsafe { mem::zeroed() };
            raw.sin6_family = AF_INET6 as sa_family_t;
            raw.sin6_port = v6.port().to_be();
            raw.sin6_flowinfo = v6.flowinfo();
            raw.sin6_addr.s6_addr = v6.ip().octets();
            raw.sin6_scope_id = v6.scope_id();
            #[cfg(any(target_os = "macos", target_os = "ios"))]
            {
                raw.sin6_len = mem::size_of::<sockaddr_in6>() as u8;
            }

            unsafe { ptr::write(&mut storage as *mut _ as *mut sockaddr_in6, raw) };
            mem::size_of::<sockaddr_in6>()
        }
    };

    (storage, length as socklen_t)
}

pub(crate) fn raw_to_socket_addr(
    storage: &sockaddr_storage,
    length: socklen_t,
) -> io::Result<SocketAddr> {
    match storage.ss_family as c_int {
        AF_INET if length as usize >= mem::size_of::<sockaddr_in>() => {
            let raw = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes());

            Ok(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(raw.sin_port))))
        }
        AF_INET6 if length as usize >= mem::size_of::<sockaddr_in6>() => {
            let raw = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(raw.sin6_addr.s6_addr);

            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(raw.sin6_port),
                raw.sin6_flowinfo,
                raw.sin6_scope_id,
            )))
        }
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "unsupported socket address family",
        )),
    }
}
