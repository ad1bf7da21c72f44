//! Session identity.

use std::fmt;

/// Identity of a client session.
///
/// One session owns exactly one submission ring and one completion ring.
/// Normally derived from the client's process id; several in-process
/// clients pick distinct raw values with [`SessionId::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SessionId(pub u32);

impl SessionId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Session id of the calling process.
    #[inline]
    pub fn current() -> Self {
        Self(std::process::id())
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

impl From<u32> for SessionId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
