//! Sequence counter coordination between genuine and injected traffic.
//!
//! The server enforces a strictly increasing counter on every frame the
//! client sends. When the bridge injects client-to-server frames the client
//! never wrote, every later genuine frame must be shifted so the server
//! still sees one gapless sequence:
//!
//! ```text
//! client sends   5        6        7
//! injected            [6]
//! server sees    5   6    7        8
//! ```
//!
//! All counter state for a session lives in [`SequenceState`] and is only
//! touched from that session's loop.

/// Counter bookkeeping for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceState {
    /// Counter of the last client-to-server frame the server received.
    last_server_seen: u32,
    /// Synthetic frames sent toward the server.
    injected_toward_server: u64,
    /// Synthetic frames sent toward the client.
    injected_toward_client: u64,
}

impl SequenceState {
    /// Fresh state: nothing seen, nothing injected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter of the last frame the server received from this bridge.
    #[inline]
    pub fn last_server_seen(&self) -> u32 {
        self.last_server_seen
    }

    /// Number of synthetic frames sent toward the server.
    #[inline]
    pub fn injected_toward_server(&self) -> u64 {
        self.injected_toward_server
    }

    /// Number of synthetic frames sent toward the client.
    #[inline]
    pub fn injected_toward_client(&self) -> u64 {
        self.injected_toward_client
    }

    /// The counter the next injected server-bound frame will carry.
    #[inline]
    pub fn next_counter(&self) -> u32 {
        self.last_server_seen.wrapping_add(1)
    }

    /// Shift applied to genuine client counters, recomputed on every call.
    #[inline]
    pub fn offset(&self) -> i64 {
        self.injected_toward_server as i64 - self.injected_toward_client as i64
    }

    /// Claim a counter for a synthetic server-bound message.
    pub fn assign_toward_server(&mut self) -> u32 {
        let counter = self.next_counter();
        self.last_server_seen = counter;
        self.injected_toward_server += 1;
        counter
    }

    /// Account for a pre-built raw frame sent toward the server.
    ///
    /// The caller is expected to have stamped it with [`next_counter`].
    ///
    /// [`next_counter`]: SequenceState::next_counter
    pub fn record_raw_toward_server(&mut self) {
        self.assign_toward_server();
    }

    /// Account for a synthetic frame sent toward the client.
    pub fn record_toward_client(&mut self) {
        self.injected_toward_client += 1;
    }

    /// Rewrite the counter of a genuine client frame before it is forwarded.
    pub fn rewrite_genuine(&mut self, original: u32) -> u32 {
        let shifted = (i64::from(original) + self.offset()).rem_euclid(1 << 32) as u32;
        self.last_server_seen = shifted;
        shifted
    }
}
