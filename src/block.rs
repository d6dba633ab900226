//! The 16-bit block counter and its wrap-around policy.

use crate::packet::Block;

/// What follows block 65535.
///
/// RFC 1350 does not say; deployed implementations disagree, so this is
/// chosen per transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WrapPolicy {
    /// 65535 is followed by 0.
    WrapToZero,

    /// 65535 is followed by 1.
    WrapToOne,
}

impl Default for WrapPolicy {
    fn default() -> Self {
        WrapPolicy::WrapToZero
    }
}

/// How far back a block number may lie and still count as already seen.
///
/// Half the number space, so that old and future blocks stay distinguishable.
const LOOKBACK: u16 = 0x7fff;

/// Hands out consecutive block numbers, starting after 0.
#[derive(Clone, Copy, Debug)]
pub struct BlockCounter {
    current: u16,
    issued: u64,
    policy: WrapPolicy,
}

impl BlockCounter {
    pub fn new(policy: WrapPolicy) -> Self {
        Self {
            current: 0,
            issued: 0,
            policy,
        }
    }

    /// The most recently issued block, or block 0 if none was issued yet.
    pub fn current(&self) -> Block {
        Block::new(self.current)
    }

    /// The block number that follows the current one.
    pub fn peek_next(&self) -> Block {
        Block::new(self.successor(self.current))
    }

    /// Advances the counter and returns the new block number.
    pub fn advance(&mut self) -> Block {
        self.current = self.successor(self.current);
        self.issued += 1;
        self.current()
    }

    /// How many blocks `block` lies behind the current one.
    ///
    /// `None` for blocks that were never issued: anything further back than
    /// block 0 or than [`LOOKBACK`], which includes every future block.
    pub fn distance_behind(&self, block: Block) -> Option<u16> {
        let distance = self.current.wrapping_sub(block.get());
        let reach = self.issued.min(u64::from(LOOKBACK));

        if u64::from(distance) <= reach {
            Some(distance)
        } else {
            None
        }
    }

    fn successor(&self, n: u16) -> u16 {
        match (n.checked_add(1), self.policy) {
            (Some(next), _) => next,
            (None, WrapPolicy::WrapToZero) => 0,
            (None, WrapPolicy::WrapToOne) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence_around_wrap(policy: WrapPolicy) -> Vec<u16> {
        let mut counter = BlockCounter::new(policy);
        counter.current = 65533;

        (0..4).map(|_| counter.advance().get()).collect()
    }

    #[test]
    fn test_starts_at_one() {
        let mut counter = BlockCounter::new(WrapPolicy::WrapToOne);
        assert_eq!(counter.current(), Block::new(0));
        assert_eq!(counter.peek_next(), Block::new(1));
        assert_eq!(counter.advance(), Block::new(1));
        assert_eq!(counter.advance(), Block::new(2));
    }

    #[test]
    fn test_distance_behind() {
        let mut counter = BlockCounter::new(WrapPolicy::WrapToZero);
        assert_eq!(counter.distance_behind(Block::new(0)), Some(0));
        assert_eq!(counter.distance_behind(Block::new(1)), None);

        for _ in 0..3 {
            counter.advance();
        }
        assert_eq!(counter.distance_behind(Block::new(3)), Some(0));
        assert_eq!(counter.distance_behind(Block::new(1)), Some(2));
        assert_eq!(counter.distance_behind(Block::new(0)), Some(3));
        assert_eq!(counter.distance_behind(Block::new(4)), None);
        assert_eq!(counter.distance_behind(Block::new(65535)), None);
    }

    #[test]
    fn test_distance_behind_across_wrap() {
        let mut counter = BlockCounter::new(WrapPolicy::WrapToZero);
        for _ in 0..65538 {
            counter.advance();
        }

        assert_eq!(counter.current(), Block::new(2));
        assert_eq!(counter.distance_behind(Block::new(65535)), Some(3));
        assert_eq!(counter.distance_behind(Block::new(3)), None);
        // Too far back to tell apart from a future block.
        assert_eq!(counter.distance_behind(Block::new(32770)), None);
    }

    #[test]
    fn test_wrap_to_zero() {
        assert_eq!(
            sequence_around_wrap(WrapPolicy::WrapToZero),
            vec![65534, 65535, 0, 1]
        );
    }

    #[test]
    fn test_wrap_to_one() {
        assert_eq!(
            sequence_around_wrap(WrapPolicy::WrapToOne),
            vec![65534, 65535, 1, 2]
        );
    }
}
