//! Distributed snowflake id generation (§4.7).
//!
//! 41-bit millisecond timestamp (epoch 2024-01-01 UTC) | 10-bit node id |
//! 12-bit sequence. Monotonic per node. Constructed once at startup with a
//! fallible initializer and threaded through [`crate::gateway::state::AppState`] —
//! the one piece of process-wide state this crate tolerates (§9).

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const NODE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const NODE_MAX: u64 = (1 << NODE_BITS) - 1;
const SEQUENCE_MAX: u64 = (1 << SEQUENCE_BITS) - 1;
const TIME_SHIFT: u64 = NODE_BITS + SEQUENCE_BITS;
const NODE_SHIFT: u64 = SEQUENCE_BITS;

/// 2024-01-01T00:00:00Z in epoch milliseconds.
const EPOCH_MS: i64 = 1_704_067_200_000;

#[derive(Debug, thiserror::Error)]
pub enum SnowflakeError {
    #[error("node id {0} out of range, must be 0..={NODE_MAX}")]
    NodeIdOutOfRange(u16),
}

struct State {
    last_time_ms: i64,
    sequence: u64,
}

/// A single-node snowflake generator. Safe to share behind an `Arc` across
/// tasks; internal state is guarded by a plain mutex since each `generate`
/// call is a handful of integer operations, never an await point.
pub struct SnowflakeGenerator {
    node_id: u64,
    state: Mutex<State>,
}

impl SnowflakeGenerator {
    pub fn new(node_id: u16) -> Result<Self, SnowflakeError> {
        if node_id as u64 > NODE_MAX {
            return Err(SnowflakeError::NodeIdOutOfRange(node_id));
        }
        Ok(Self {
            node_id: node_id as u64,
            state: Mutex::new(State {
                last_time_ms: 0,
                sequence: 0,
            }),
        })
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as i64
    }

    /// Generate the next monotonic id for this node. Busy-waits for the next
    /// millisecond when the sequence space is exhausted within one tick.
    pub fn generate(&self) -> u64 {
        let mut state = self.state.lock().expect("snowflake mutex poisoned");
        let mut now = Self::now_ms();

        if now == state.last_time_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MAX;
            if state.sequence == 0 {
                while now <= state.last_time_ms {
                    now = Self::now_ms();
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_time_ms = now;

        let elapsed = (now - EPOCH_MS).max(0) as u64;
        (elapsed << TIME_SHIFT) | (self.node_id << NODE_SHIFT) | state.sequence
    }

    pub fn generate_ticket(&self) -> String {
        format!("TK{}", self.generate())
    }

    pub fn generate_order_no(&self) -> String {
        format!("FS{}", self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn rejects_out_of_range_node_id() {
        assert!(SnowflakeGenerator::new(1024).is_err());
        assert!(SnowflakeGenerator::new(1023).is_ok());
    }

    #[test]
    fn ids_are_strictly_increasing_single_threaded() {
        let generator = SnowflakeGenerator::new(1).unwrap();
        let mut prev = generator.generate();
        for _ in 0..10_000 {
            let next = generator.generate();
            assert!(next > prev, "ids must be strictly increasing");
            prev = next;
        }
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let generator = Arc::new(SnowflakeGenerator::new(2).unwrap());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = generator.clone();
            handles.push(std::thread::spawn(move || {
                (0..2_000).map(|_| generator.generate()).collect::<Vec<_>>()
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        let unique: std::collections::HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len(), "snowflake must never repeat an id");
    }

    #[test]
    fn ticket_and_order_no_formats() {
        let generator = SnowflakeGenerator::new(3).unwrap();
        assert!(generator.generate_ticket().starts_with("TK"));
        assert!(generator.generate_order_no().starts_with("FS"));
    }
}
