use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kinds of identifiers the service hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    CheckoutSession,
    LineItem,
    Order,
    VaultToken,
}

pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: IdKind) -> String;
}

/// Monotonic per-kind counters: `csn_000001`, `line_000001`, `ord_000001`, `vt_0000000000000001`.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    sessions: AtomicU64,
    line_items: AtomicU64,
    orders: AtomicU64,
    tokens: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, kind: IdKind) -> String {
        match kind {
            IdKind::CheckoutSession => format!("csn_{:06}", Self::bump(&self.sessions)),
            IdKind::LineItem => format!("line_{:06}", Self::bump(&self.line_items)),
            IdKind::Order => format!("ord_{:06}", Self::bump(&self.orders)),
            IdKind::VaultToken => format!("vt_{:016x}", Self::bump(&self.tokens)),
        }
    }
}

/// Sequential ids for sessions, lines and orders; unguessable vault token ids.
#[derive(Debug, Default)]
pub struct ProductionIdGenerator {
    sequential: SequentialIdGenerator,
}

impl ProductionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for ProductionIdGenerator {
    fn next_id(&self, kind: IdKind) -> String {
        match kind {
            IdKind::VaultToken => {
                let bits: u64 = rand::thread_rng().gen();
                format!("vt_{:016x}", bits)
            }
            other => self.sequential.next_id(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_per_kind_and_zero_padded() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id(IdKind::CheckoutSession), "csn_000001");
        assert_eq!(ids.next_id(IdKind::CheckoutSession), "csn_000002");
        assert_eq!(ids.next_id(IdKind::LineItem), "line_000001");
        assert_eq!(ids.next_id(IdKind::Order), "ord_000001");
        assert_eq!(ids.next_id(IdKind::VaultToken), "vt_0000000000000001");
    }

    #[test]
    fn production_token_ids_are_sixteen_hex_digits() {
        let ids = ProductionIdGenerator::new();
        let token = ids.next_id(IdKind::VaultToken);
        let hex = token.strip_prefix("vt_").unwrap();
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ids.next_id(IdKind::Order), "ord_000001");
    }
}
