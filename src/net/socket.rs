//! Owned non-blocking TCP socket.
//!
//! [`Socket`] closes its descriptor on drop. Every socket it creates or
//! accepts is non-blocking and close-on-exec.

use crate::net::utils::{domain_of, raw_to_socket_addr, socket_addr_to_raw};

use libc::{
    IPPROTO_TCP, SO_REUSEADDR, SO_REUSEPORT, SOCK_STREAM, SOL_SOCKET, c_int, sockaddr,
    sockaddr_storage, socklen_t,
};
use std::io;
use std::mem;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// A TCP socket that owns its descriptor.
#[derive(Debug)]
pub struct Socket {
    file_descriptor: OwnedFd,
}

impl Socket {
    /// Creates a non-blocking stream socket for `address`'s family.
    pub fn new_nonblocking(address: &SocketAddr) -> io::Result<Self> {
        #[cfg(target_os = "linux")]
        let file_descriptor = unsafe {
            libc::socket(
                domain_of(address),
                SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                IPPROTO_TCP,
            )
        };

        #[cfg(not(target_os = "linux"))]
        let file_descriptor = unsafe { libc::socket(domain_of(address), SOCK_STREAM, IPPROTO_TCP) };

        if file_descriptor < 0 {
            return Err(io::Error::last_os_error());
        }

        let socket = unsafe { Self::from_raw_fd(file_descriptor) };

        #[cfg(not(target_os = "linux"))]
        {
            crate::net::utils::set_nonblocking(file_descriptor, true)?;
            crate::net::utils::set_cloexec(file_descriptor)?;
        }

        Ok(socket)
    }

    /// Binds the socket to a local address.
    ///
    /// # Arguments
    /// * `address` - The address to bind; port 0 lets the kernel pick one
    pub fn bind(&self, address: &SocketAddr) -> io::Result<()> {
        let (storage, length) = socket_addr_to_raw(address);
        let result = unsafe {
            libc::bind(
                self.as_raw_fd(),
                &storage as *const sockaddr_storage as *const sockaddr,
                length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Marks the socket as passive so it can accept connections.
    ///
    /// # Arguments
    /// * `backlog` - Maximum length of the pending-connection queue
    pub fn listen(&self, backlog: c_int) -> io::Result<()> {
        if unsafe { libc::listen(self.as_raw_fd(), backlog) } < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Accepts one pending connection.
    ///
    /// Returns `WouldBlock` when the accept queue is empty.
    pub fn accept(&self) -> io::Result<(Socket, SocketAddr)> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

        #[cfg(target_os = "linux")]
        let file_descriptor = unsafe {
            libc::accept4(
                self.as_raw_fd(),
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
                libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            )
        };

        #[cfg(not(target_os = "linux"))]
        let file_descriptor = unsafe {
            libc::accept(
                self.as_raw_fd(),
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        };

        if file_descriptor < 0 {
            return Err(io::Error::last_os_error());
        }

        let socket = unsafe { Self::from_raw_fd(file_descriptor) };

        #[cfg(not(target_os = "linux"))]
        {
            crate::net::utils::set_nonblocking(file_descriptor, true)?;
            crate::net::utils::set_cloexec(file_descriptor)?;
        }

        let peer = raw_to_socket_addr(&storage, length)?;

        Ok((socket, peer))
    }

    /// Returns the address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;
        let result = unsafe {
            libc::getsockname(
                self.as_raw_fd(),
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        raw_to_socket_addr(&storage, length)
    }

    /// Returns the address of the connected peer.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;
        let result = unsafe {
            libc::getpeername(
                self.as_raw_fd(),
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        raw_to_socket_addr(&storage, length)
    }

    /// Sets `SO_REUSEADDR`, letting a restarted server rebind a port still
    /// in `TIME_WAIT`.
    pub fn set_reuse_addr(&self, on: bool) -> io::Result<()> {
        self.set_flag(SOL_SOCKET, SO_REUSEADDR, on)
    }

    /// Sets `SO_REUSEPORT`. Must be set before `bind` on every socket that
    /// shares the address.
    pub fn set_reuse_port(&self, on: bool) -> io::Result<()> {
        self.set_flag(SOL_SOCKET, SO_REUSEPORT, on)
    }

    fn set_flag(&self, level: c_int, name: c_int, on: bool) -> io::Result<()> {
        let value: c_int = on.into();
        let result = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                level,
                name,
                &value as *const c_int as *const libc::c_void,
                mem::size_of::<c_int>() as socklen_t,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor.as_raw_fd()
    }
}

impl AsFd for Socket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file_descriptor.as_fd()
    }
}

impl IntoRawFd for Socket {
    fn into_raw_fd(self) -> RawFd {
        self.file_descriptor.into_raw_fd()
    }
}

impl FromRawFd for Socket {
    /// # Safety
    ///
    /// `file_descriptor` must be an open socket that nothing else owns.
    unsafe fn from_raw_fd(file_descriptor: RawFd) -> Self {
        Self {
            file_descriptor: unsafe { OwnedFd::from_raw_fd(file_descriptor) },
        }
    }
}

impl From<Socket> for OwnedFd {
    fn from(socket: Socket) -> Self {
        socket.file_descriptor
    }
}

impl From<Socket> for TcpStream {
    fn from(socket: Socket) -> Self {
        TcpStream::from(socket.file_descriptor)
    }
}
