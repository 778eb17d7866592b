use std::os::fd::RawFd;

/// One readiness report from [`Poller::poll`](super::Poller::poll).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub file_descriptor: RawFd,
    pub readable: bool,
    pub writable: bool,
    /// The peer hung up or the descriptor was shut down.
    pub hangup: bool,
    pub error: bool,
}

impl Event {
    pub(crate) const EMPTY: Self = Self {
        file_descriptor: -1,
        readable: false,
        writable: false,
        hangup: false,
        error: false,
    };

    pub(crate) fn new(file_descriptor: RawFd) -> Self {
        Self {
            file_descriptor,
            ..Self::EMPTY
        }
    }
}
