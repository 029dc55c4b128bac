//! Process-wide resource version mill.
//!
//! Versions are snowflake-style 64-bit tokens: 41 bits of millisecond
//! timestamp, 10 bits of node id, 12 bits of per-millisecond sequence.
//! Later calls always return strictly greater values, from any thread.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;

use crate::constants::RV_MAX_NODE_ID;
use crate::constants::RV_NODE_BITS;
use crate::constants::RV_SEQUENCE_BITS;
use crate::constants::RV_SEQUENCE_MASK;
use crate::InitError;

#[derive(Debug)]
pub struct RvGenerator {
    node_id: u64,
    state: Mutex<GeneratorState>,
}

#[derive(Debug)]
struct GeneratorState {
    last_millis: u64,
    sequence: u64,
}

impl RvGenerator {
    /// Misconfiguration fails here, once, never inside `next`.
    pub fn new(node_id: u16) -> Result<Self, InitError> {
        if node_id > RV_MAX_NODE_ID {
            return Err(InitError::NodeIdOutOfRange(node_id));
        }
        Ok(Self {
            node_id: node_id as u64,
            state: Mutex::new(GeneratorState {
                last_millis: now_millis(),
                sequence: 0,
            }),
        })
    }

    /// Returns the next resource version. Never repeats, never decreases.
    pub fn next(&self) -> u64 {
        let mut state = self.state.lock();
        let mut millis = now_millis();

        // A clock that ran backwards must not produce a smaller token.
        if millis < state.last_millis {
            millis = state.last_millis;
        }

        if millis == state.last_millis {
            state.sequence = (state.sequence + 1) & RV_SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence space for this millisecond is spent; spin forward.
                while millis <= state.last_millis {
                    millis = now_millis().max(state.last_millis + 1);
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_millis = millis;
        (millis << (RV_NODE_BITS + RV_SEQUENCE_BITS)) | (self.node_id << RV_SEQUENCE_BITS) | state.sequence
    }

    /// The most recent token handed out, without advancing.
    pub fn current(&self) -> u64 {
        let state = self.state.lock();
        (state.last_millis << (RV_NODE_BITS + RV_SEQUENCE_BITS))
            | (self.node_id << RV_SEQUENCE_BITS)
            | state.sequence
    }
}

/// Milliseconds since the unix epoch.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
