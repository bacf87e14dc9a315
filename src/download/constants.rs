//! Constants for the transport layer (timeouts).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle limit between body reads, in seconds.
pub const READ_TIMEOUT_SECS: u64 = 300;
