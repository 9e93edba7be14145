//! Destination resolution for outgoing messages.
//!
//! Addressing is a property of the program semantics, not of the network:
//! the network hands every sent payload to the router it was built with and
//! delivers one copy per resolved destination.

use gpnet_env::Value;

/// Maps a sent payload to its destination nodes.
pub trait Router: Send + Sync {
    /// Appends the destinations of a message sent by `from` to `out`.
    ///
    /// `out` is cleared by the caller. Destinations outside
    /// `0..node_count` are ignored by the network.
    fn resolve(&self, from: usize, payload: &[Value], node_count: usize, out: &mut Vec<usize>);
}

impl<F> Router for F
where
    F: Fn(usize, &[Value], usize, &mut Vec<usize>) + Send + Sync,
{
    fn resolve(&self, from: usize, payload: &[Value], node_count: usize, out: &mut Vec<usize>) {
        self(from, payload, node_count, out)
    }
}

/// Every node except the sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct Broadcast;

impl Router for Broadcast {
    fn resolve(&self, from: usize, _payload: &[Value], node_count: usize, out: &mut Vec<usize>) {
        out.extend((0..node_count).filter(|&i| i != from));
    }
}

/// The sender's successor on a unidirectional ring.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ring;

impl Router for Ring {
    fn resolve(&self, from: usize, _payload: &[Value], node_count: usize, out: &mut Vec<usize>) {
        if node_count > 1 {
            out.push((from + 1) % node_count);
        }
    }
}

/// Point-to-point: the payload word at `offset` names the destination.
///
/// The word is reduced modulo the node count; messages addressed to the
/// sender itself are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Directed {
    pub offset: usize,
}

impl Router for Directed {
    fn resolve(&self, from: usize, payload: &[Value], node_count: usize, out: &mut Vec<usize>) {
        let Some(&word) = payload.get(self.offset) else {
            return;
        };
        if node_count == 0 {
            return;
        }
        let dest = word.rem_euclid(node_count as Value) as usize;
        if dest != from {
            out.push(dest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(router: &dyn Router, from: usize, payload: &[Value], n: usize) -> Vec<usize> {
        let mut out = Vec::new();
        router.resolve(from, payload, n, &mut out);
        out
    }

    #[test]
    fn test_broadcast_skips_sender() {
        assert_eq!(resolve(&Broadcast, 1, &[0], 4), vec![0, 2, 3]);
        assert!(resolve(&Broadcast, 0, &[0], 1).is_empty());
    }

    #[test]
    fn test_ring_successor() {
        assert_eq!(resolve(&Ring, 0, &[0], 3), vec![1]);
        assert_eq!(resolve(&Ring, 2, &[0], 3), vec![0]);
        assert!(resolve(&Ring, 0, &[0], 1).is_empty());
    }

    #[test]
    fn test_directed_wraps_and_drops_self() {
        let router = Directed { offset: 1 };

        assert_eq!(resolve(&router, 0, &[9, 2], 3), vec![2]);
        assert_eq!(resolve(&router, 0, &[9, -1], 3), vec![2]);
        assert_eq!(resolve(&router, 0, &[9, 4], 3), vec![1]);
        assert!(resolve(&router, 1, &[9, 1], 3).is_empty());
        assert!(resolve(&router, 0, &[9], 3).is_empty());
    }

    #[test]
    fn test_closure_router() {
        let to_zero = |_from: usize, _p: &[Value], _n: usize, out: &mut Vec<usize>| out.push(0);
        assert_eq!(resolve(&to_zero, 2, &[], 3), vec![0]);
    }
}
