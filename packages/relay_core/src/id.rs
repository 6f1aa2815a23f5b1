//! Connection identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::message::TransportKind;

/// Length of a framed-transport identifier.
const FRAMED_ID_LEN: usize = 20;

/// Length of the random part of a raw-transport identifier (after `ws_`).
const RAW_ID_LEN: usize = 11;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of identifiers for connections that did not supply their own.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, transport: TransportKind) -> String;
}

/// Random, collision-resistant identifiers.
///
/// Framed connections get a 20-character alphanumeric token; raw connections
/// get `ws_` followed by a base-36 token.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self, transport: TransportKind) -> String {
        let mut rng = rand::rng();
        match transport {
            TransportKind::Framed => (0..FRAMED_ID_LEN)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect(),
            TransportKind::Raw => {
                let token: String = (0..RAW_ID_LEN)
                    .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
                    .collect();
                format!("ws_{token}")
            }
        }
    }
}

/// Deterministic identifiers (`framed-1`, `raw-2`, ...) for tests.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self, transport: TransportKind) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", transport.as_str(), n)
    }
}
