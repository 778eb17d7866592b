use netbase::net::utils::set_nonblocking;
use netbase::{Buffer, BufferObserver};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::{Arc, Mutex};

fn pipe() -> (OwnedFd, OwnedFd) {
    let mut fds = [0i32; 2];
    let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(res, 0, "pipe() failed");

    unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
}

fn write_all(fd: &OwnedFd, bytes: &[u8]) {
    let wrote = unsafe { libc::write(fd.as_raw_fd(), bytes.as_ptr().cast(), bytes.len()) };
    assert_eq!(wrote, bytes.len() as isize);
}

fn read_exact(fd: &OwnedFd, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = unsafe {
            libc::read(
                fd.as_raw_fd(),
                out[filled..].as_mut_ptr().cast(),
                len - filled,
            )
        };
        assert!(n > 0, "read() failed");
        filled += n as usize;
    }
    out
}

#[test]
fn read_from_pipe_appends_pending_bytes() {
    let (reader, writer) = pipe();
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let observer = Arc::new(move |old: usize, new: usize| sink.lock().unwrap().push((old, new)));
    let mut buffer = Buffer::new();
    buffer.set_observer(&observer);
    buffer.append(b">").unwrap();

    write_all(&writer, b"ping\n");
    let n = buffer.read_from(reader.as_raw_fd(), None).unwrap();

    assert_eq!(n, 5);
    assert_eq!(buffer.data(), b">ping\n");
    assert_eq!(*changes.lock().unwrap(), vec![(0, 1), (1, 6)]);
}

#[test]
fn read_from_closed_pipe_returns_zero() {
    let (reader, writer) = pipe();
    drop(writer);
    let mut buffer = Buffer::new();

    let n = buffer.read_from(reader.as_raw_fd(), None).unwrap();

    assert_eq!(n, 0);
    assert!(buffer.is_empty());
}

#[test]
fn read_from_empty_nonblocking_pipe_would_block() {
    let (reader, _writer) = pipe();
    set_nonblocking(reader.as_raw_fd(), true).unwrap();
    let mut buffer = Buffer::new();

    let error = buffer.read_from(reader.as_raw_fd(), None).unwrap_err();

    assert!(error.is_would_block());
    assert!(buffer.is_empty());
}

#[test]
fn size_hint_limits_a_single_read() {
    let (reader, writer) = pipe();
    write_all(&writer, &[b'z'; 100]);
    let mut buffer = Buffer::new();

    assert_eq!(buffer.read_from(reader.as_raw_fd(), Some(10)).unwrap(), 10);
    assert_eq!(buffer.read_from(reader.as_raw_fd(), Some(0)).unwrap(), 1);
    assert_eq!(buffer.read_from(reader.as_raw_fd(), Some(500)).unwrap(), 89);
    assert_eq!(buffer.len(), 100);
}

#[test]
fn large_backlog_is_read_in_capacity_bounded_steps() {
    let (reader, writer) = pipe();
    write_all(&writer, &[b'q'; 16000]);
    let mut buffer = Buffer::new();

    let first = buffer.read_from(reader.as_raw_fd(), None).unwrap();
    assert_eq!(first, 4096);
    assert_eq!(buffer.capacity(), 4096);

    let second = buffer.read_from(reader.as_raw_fd(), None).unwrap();
    assert_eq!(second, 16000 - 4096);
    assert_eq!(buffer.len(), 16000);
}

#[test]
fn write_to_pipe_drains_what_was_written() {
    let (reader, writer) = pipe();
    let mut buffer = Buffer::new();
    buffer.append(b"HTTP/1.0 200 OK\r\n\r\n").unwrap();

    let n = buffer.write_to(writer.as_raw_fd()).unwrap();

    assert_eq!(n, 19);
    assert!(buffer.is_empty());
    assert_eq!(read_exact(&reader, 19), b"HTTP/1.0 200 OK\r\n\r\n");
}

#[test]
fn write_to_full_pipe_would_block_and_keeps_data() {
    let (_reader, writer) = pipe();
    set_nonblocking(writer.as_raw_fd(), true).unwrap();
    let mut buffer = Buffer::new();
    buffer.append(&vec![b'f'; 1 << 20]).unwrap();

    let mut written = 0;
    let error = loop {
        match buffer.write_to(writer.as_raw_fd()) {
            Ok(n) => written += n,
            Err(error) => break error,
        }
    };

    assert!(error.is_would_block());
    assert!(written > 0);
    assert_eq!(buffer.len(), (1 << 20) - written);
}

struct Counter(Mutex<usize>);

impl BufferObserver for Counter {
    fn on_change(&self, _: usize, _: usize) {
        *self.0.lock().unwrap() += 1;
    }
}

#[test]
fn failed_read_does_not_notify() {
    let (reader, _writer) = pipe();
    set_nonblocking(reader.as_raw_fd(), true).unwrap();
    let counter = Arc::new(Counter(Mutex::new(0)));
    let mut buffer = Buffer::new();
    buffer.set_observer(&counter);

    assert!(buffer.read_from(reader.as_raw_fd(), None).is_err());
    assert_eq!(*counter.0.lock().unwrap(), 0);
}
