//! Per-block difficulty retargeting
//!
//! Two algorithms, chosen by network mode:
//! - DarkGravityWave (v3) on normal networks: a weighted average of the last
//!   24 targets scaled by how long those blocks actually took.
//! - LWMA3 on min-difficulty networks: linearly weighted solve times over the
//!   last 25 blocks, later blocks weighted more.
//!
//! Every function here is total. Missing history or malformed input degrades
//! to the applicable power limit instead of failing, and results never exceed
//! that limit. Bit-for-bit output matters: other nodes must compute the same
//! compact value or the chain forks.

use super::compact::CompactTarget;
use super::params::{ConsensusParams, Limit};
use crate::chain::{BlockHeader, BlockRef};
use crate::pow::{mul_div, narrow_saturating, widen, U256, U512};
use tracing::trace;

/// DarkGravityWave window
pub const DGW_PAST_BLOCKS: u64 = 24;

/// LWMA3 window
pub const LWMA_WINDOW: i64 = 25;

/// Height below which min-difficulty networks stay on the relaxed limit
pub const LWMA_ACTIVATION_HEIGHT: u64 = 25;

/// Candidate gap after which min-difficulty networks drop to the limit
const MIN_DIFFICULTY_RESET_SECS: i64 = 2 * 60 * 60;

/// Retargeting rule in force for the block after `last`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetargetAlgorithm {
    /// Not enough history; use a power limit as-is
    Floor(Limit),
    DarkGravityWave,
    Lwma3,
}

impl RetargetAlgorithm {
    /// Pure selection from network mode and available history
    pub fn select(last: Option<BlockRef<'_>>, params: &ConsensusParams) -> Self {
        let Some(last) = last else {
            return RetargetAlgorithm::Floor(Limit::Primary);
        };

        if params.allow_min_difficulty_blocks {
            if last.height() < LWMA_ACTIVATION_HEIGHT {
                return RetargetAlgorithm::Floor(Limit::Relaxed);
            }
            return RetargetAlgorithm::Lwma3;
        }

        // need a full averaging interval behind `last`
        let mut first = last;
        for _ in 1..params.averaging_interval {
            match first.prev() {
                Some(prev) => first = prev,
                None => return RetargetAlgorithm::Floor(Limit::Primary),
            }
        }

        RetargetAlgorithm::DarkGravityWave
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetargetAlgorithm::Floor(Limit::Primary) => "floor(pow_limit)",
            RetargetAlgorithm::Floor(Limit::Relaxed) => "floor(pow_limit_relaxed)",
            RetargetAlgorithm::DarkGravityWave => "dgw",
            RetargetAlgorithm::Lwma3 => "lwma3",
        }
    }
}

/// Compact target required for the block following `last`
pub fn next_work_required(
    last: Option<BlockRef<'_>>,
    candidate: &BlockHeader,
    params: &ConsensusParams,
) -> CompactTarget {
    let algorithm = RetargetAlgorithm::select(last, params);
    let bits = match (algorithm, last) {
        (RetargetAlgorithm::Floor(which), _) => CompactTarget::encode(params.limit(which)),
        (RetargetAlgorithm::DarkGravityWave, Some(last)) => {
            dark_gravity_wave(Some(last), Some(candidate), params)
        }
        (RetargetAlgorithm::Lwma3, Some(last)) => lwma3(last, params),
        // select() only picks an algorithm when `last` exists
        (_, None) => CompactTarget::encode(&params.pow_limit),
    };

    trace!(
        height = last.map(|l| l.height() + 1),
        algorithm = algorithm.as_str(),
        bits = %bits,
        "next work required"
    );
    bits
}

/// DarkGravityWave v3
///
/// The running average is `(avg * k + target) / (k + 1)` for the k-th block,
/// which is not a true mean. The timespan runs from `last` to the block one
/// past the averaged window. Both quirks are consensus behaviour and stay.
pub fn dark_gravity_wave(
    last: Option<BlockRef<'_>>,
    candidate: Option<&BlockHeader>,
    params: &ConsensusParams,
) -> CompactTarget {
    let pow_limit = &params.pow_limit;
    let limit_bits = CompactTarget::encode(pow_limit);

    let (Some(last), Some(candidate)) = (last, candidate) else {
        return limit_bits;
    };
    if last.height() < DGW_PAST_BLOCKS {
        return limit_bits;
    }

    if params.allow_min_difficulty_blocks {
        let candidate_time = i64::from(candidate.time);
        if candidate_time > last.time().saturating_add(MIN_DIFFICULTY_RESET_SECS) {
            return limit_bits;
        }
        if candidate_time > last.time().saturating_add(params.target_spacing.saturating_mul(4)) {
            let eased = mul_div(&last.bits().to_target(), 10, 1);
            return CompactTarget::encode(&eased.min(*pow_limit));
        }
    }

    let mut block = last;
    let mut past_target_avg = U512::zero();
    for count in 1..=DGW_PAST_BLOCKS {
        let target = widen(&block.bits().to_target());
        past_target_avg = if count == 1 {
            target
        } else {
            (past_target_avg * U512::from(count) + target) / U512::from(count + 1)
        };

        match block.prev() {
            Some(prev) => block = prev,
            None => break,
        }
    }

    let target_timespan = (DGW_PAST_BLOCKS as i64).saturating_mul(params.target_spacing);
    if target_timespan <= 0 {
        return limit_bits;
    }
    let actual_timespan = last
        .time()
        .saturating_sub(block.time())
        .max(target_timespan / 3)
        .min(target_timespan.saturating_mul(3));

    let retargeted = past_target_avg * U512::from(actual_timespan as u64)
        / U512::from(target_timespan as u64);
    let new_target = narrow_saturating(&retargeted).min(*pow_limit);

    trace!(
        height = last.height() + 1,
        actual_timespan,
        target_timespan,
        "dgw retarget"
    );
    CompactTarget::encode(&new_target)
}

/// LWMA3 over the last 25 blocks, capped at the relaxed limit
pub fn lwma3(last: BlockRef<'_>, params: &ConsensusParams) -> CompactTarget {
    let pow_limit = &params.pow_limit_relaxed;
    let limit_bits = CompactTarget::encode(pow_limit);

    let t = params.target_spacing;
    let n = LWMA_WINDOW;
    let height = last.height() as i64;

    if height < n {
        return limit_bits;
    }
    // k = N(N+1)T/2; spacings too large for the weights fall back to the limit
    let Some(k) = t.checked_mul(n * (n + 1)).map(|v| v / 2).filter(|&k| k > 0) else {
        return limit_bits;
    };
    let Some(divisor) = k.checked_mul(n) else {
        return limit_bits;
    };
    let divisor = U256::from(divisor as u64);
    let max_solvetime = t.saturating_mul(6);

    let Some(first) = last.ancestor((height - n) as u64) else {
        return limit_bits;
    };
    let mut previous_timestamp = first.time();

    let mut weighted_solvetimes: i64 = 0;
    let mut sum_target = U512::zero();
    for (j, i) in ((height - n + 1)..=height).enumerate() {
        let Some(block) = last.ancestor(i as u64) else {
            return limit_bits;
        };
        let this_timestamp = if block.time() > previous_timestamp {
            block.time()
        } else {
            previous_timestamp.saturating_add(1)
        };
        let solvetime = max_solvetime.min(this_timestamp.saturating_sub(previous_timestamp));
        previous_timestamp = this_timestamp;

        weighted_solvetimes =
            weighted_solvetimes.saturating_add(solvetime.saturating_mul(j as i64 + 1));
        sum_target = sum_target + widen(&(block.bits().to_target() / divisor));
    }

    let next_target = sum_target * U512::from(weighted_solvetimes.max(0) as u64);
    let next_target = narrow_saturating(&next_target).min(*pow_limit);

    trace!(height = height + 1, weighted_solvetimes, "lwma3 retarget");
    CompactTarget::encode(&next_target)
}

/// Difficulty relative to `pow_limit` (1.0 at the limit), for display
pub fn target_to_difficulty(target: &U256, pow_limit: &U256) -> f64 {
    if target.is_zero() {
        return f64::INFINITY;
    }
    u256_to_f64(pow_limit) / u256_to_f64(target)
}

fn u256_to_f64(v: &U256) -> f64 {
    v.0.iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 18_446_744_073_709_551_616.0 + limb as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainIndex;
    use crate::consensus_pow::NetworkKind;

    const BITS: CompactTarget = CompactTarget(0x1d00ffff);

    fn mainnet() -> ConsensusParams {
        NetworkKind::Mainnet.params()
    }

    fn testnet() -> ConsensusParams {
        NetworkKind::Testnet.params()
    }

    /// `len` blocks spaced `spacing` seconds apart, all at `bits`
    fn steady_chain(len: usize, spacing: i64, bits: CompactTarget) -> ChainIndex {
        ChainIndex::from_timeline(
            (0..len).map(|i| (u32::try_from(1_600_000_000 + i as i64 * spacing).unwrap(), bits)),
        )
    }

    fn candidate_after(chain: &ChainIndex, secs: i64) -> BlockHeader {
        let tip = chain.tip().unwrap();
        BlockHeader::candidate(tip.hash(), u32::try_from(tip.time() + secs).unwrap(), tip.bits())
    }

    #[test]
    fn test_dgw_missing_inputs_return_limit() {
        let params = mainnet();
        let limit = CompactTarget::encode(&params.pow_limit);
        let chain = steady_chain(30, 120, BITS);
        let candidate = candidate_after(&chain, 120);

        assert_eq!(dark_gravity_wave(None, Some(&candidate), &params), limit);
        assert_eq!(dark_gravity_wave(chain.tip(), None, &params), limit);
    }

    #[test]
    fn test_dgw_short_history_returns_limit() {
        let params = mainnet();
        let limit = CompactTarget::encode(&params.pow_limit);

        // tip height 23
        let chain = steady_chain(24, 120, BITS);
        let candidate = candidate_after(&chain, 120);
        assert_eq!(dark_gravity_wave(chain.tip(), Some(&candidate), &params), limit);

        // tip height 24 retargets
        let chain = steady_chain(25, 120, BITS);
        let candidate = candidate_after(&chain, 120);
        assert_eq!(dark_gravity_wave(chain.tip(), Some(&candidate), &params), BITS);
    }

    #[test]
    fn test_dgw_steady_state_keeps_target() {
        let params = mainnet();
        let chain = steady_chain(60, params.target_spacing, BITS);
        let candidate = candidate_after(&chain, params.target_spacing);
        assert_eq!(dark_gravity_wave(chain.tip(), Some(&candidate), &params), BITS);
    }

    #[test]
    fn test_dgw_equal_targets_average_stays_put() {
        // equal targets keep the running average unchanged, so a retarget at
        // exactly the target timespan reproduces the input target
        let params = mainnet();
        let target = U256::from(0x00ff_ff00u64) << 160usize;
        let bits = CompactTarget::encode(&target);
        let chain = steady_chain(25, params.target_spacing, bits);
        let candidate = candidate_after(&chain, params.target_spacing);

        let next = dark_gravity_wave(chain.tip(), Some(&candidate), &params);
        assert_eq!(next.to_target(), target);
    }

    #[test]
    fn test_dgw_fast_blocks_get_harder() {
        let params = mainnet();
        let chain = steady_chain(60, params.target_spacing / 2, BITS);
        let candidate = candidate_after(&chain, 10);
        let next = dark_gravity_wave(chain.tip(), Some(&candidate), &params);
        assert_eq!(next.to_target(), BITS.to_target() / U256::from(2u64));
    }

    #[test]
    fn test_dgw_timespan_clamped() {
        let params = mainnet();

        // blocks 10x too slow: clamped to 3x
        let chain = steady_chain(60, params.target_spacing * 10, BITS);
        let candidate = candidate_after(&chain, 10);
        let next = dark_gravity_wave(chain.tip(), Some(&candidate), &params);
        assert_eq!(next.to_target(), BITS.to_target() * U256::from(3u64));

        // all blocks at the same second: clamped to 1/3
        let chain = steady_chain(60, 0, BITS);
        let candidate = candidate_after(&chain, 10);
        let next = dark_gravity_wave(chain.tip(), Some(&candidate), &params);
        assert_eq!(next.to_target(), BITS.to_target() / U256::from(3u64));
    }

    #[test]
    fn test_dgw_weighted_average_is_not_a_mean() {
        let params = mainnet();
        let low = U256::from(0x10_0000u64) << 160usize;
        let high = U256::from(0x40_0000u64) << 160usize;

        // tip at `high`, everything else at `low`
        let mut timeline: Vec<(u32, CompactTarget)> = (0..25i64)
            .map(|i| {
                let time = u32::try_from(1_600_000_000 + i * params.target_spacing).unwrap();
                (time, CompactTarget::encode(&low))
            })
            .collect();
        timeline[24].1 = CompactTarget::encode(&high);
        let chain = ChainIndex::from_timeline(timeline);
        let candidate = candidate_after(&chain, params.target_spacing);

        let mut avg = widen(&high);
        for count in 2..=24u64 {
            avg = (avg * U512::from(count) + widen(&low)) / U512::from(count + 1);
        }
        let expected = CompactTarget::encode(&narrow_saturating(&avg));

        let next = dark_gravity_wave(chain.tip(), Some(&candidate), &params);
        assert_eq!(next, expected);

        // a true mean would give (high + 23 * low) / 24
        let mean = (high + low * U256::from(23u64)) / U256::from(24u64);
        assert_ne!(next, CompactTarget::encode(&mean));
    }

    #[test]
    fn test_dgw_never_exceeds_limit() {
        let params = mainnet();
        let limit_bits = CompactTarget::encode(&params.pow_limit);
        let chain = steady_chain(60, params.target_spacing * 5, limit_bits);
        let candidate = candidate_after(&chain, 10);
        assert_eq!(dark_gravity_wave(chain.tip(), Some(&candidate), &params), limit_bits);

        // out-of-range history bits still clamp
        let chain = steady_chain(60, params.target_spacing, CompactTarget(0x2100ffff));
        let candidate = candidate_after(&chain, 10);
        let next = dark_gravity_wave(chain.tip(), Some(&candidate), &params);
        assert!(next.to_target() <= params.pow_limit);
    }

    #[test]
    fn test_dgw_min_difficulty_rules() {
        let mut params = mainnet();
        params.allow_min_difficulty_blocks = true;
        let limit_bits = CompactTarget::encode(&params.pow_limit);
        let chain = steady_chain(30, params.target_spacing, BITS);

        // more than two hours since the tip
        let candidate = candidate_after(&chain, MIN_DIFFICULTY_RESET_SECS + 1);
        assert_eq!(dark_gravity_wave(chain.tip(), Some(&candidate), &params), limit_bits);

        // more than four spacings: ten times easier
        let candidate = candidate_after(&chain, params.target_spacing * 4 + 1);
        let next = dark_gravity_wave(chain.tip(), Some(&candidate), &params);
        assert_eq!(next.to_target(), BITS.to_target() * U256::from(10u64));

        // exactly four spacings is still a normal retarget
        let candidate = candidate_after(&chain, params.target_spacing * 4);
        assert_eq!(dark_gravity_wave(chain.tip(), Some(&candidate), &params), BITS);
    }

    #[test]
    fn test_dgw_min_difficulty_easing_clamps() {
        let mut params = mainnet();
        params.allow_min_difficulty_blocks = true;
        let limit_bits = CompactTarget::encode(&params.pow_limit);
        let chain = steady_chain(30, params.target_spacing, limit_bits);
        let candidate = candidate_after(&chain, params.target_spacing * 5);
        assert_eq!(dark_gravity_wave(chain.tip(), Some(&candidate), &params), limit_bits);
    }

    #[test]
    fn test_lwma3_short_history_returns_relaxed_limit() {
        let params = testnet();
        let relaxed = CompactTarget::encode(&params.pow_limit_relaxed);
        for len in [1usize, 10, 25] {
            let chain = steady_chain(len, params.target_spacing, BITS);
            assert_eq!(lwma3(chain.tip().unwrap(), &params), relaxed, "len {len}");
        }
    }

    #[test]
    fn test_lwma3_steady_state_is_close_to_input() {
        let params = testnet();
        let chain = steady_chain(40, params.target_spacing, BITS);
        let next = lwma3(chain.tip().unwrap(), &params).to_target();
        let input = BITS.to_target();

        // pre-division rounding only ever loses a little
        assert!(next <= input);
        assert!(next >= input - input / U256::from(1000u64));
    }

    #[test]
    fn test_lwma3_responds_to_solve_times() {
        let params = testnet();
        let steady = lwma3(
            steady_chain(40, params.target_spacing, BITS).tip().unwrap(),
            &params,
        )
        .to_target();

        let fast = lwma3(
            steady_chain(40, params.target_spacing / 2, BITS).tip().unwrap(),
            &params,
        )
        .to_target();
        assert!(fast < steady);

        let slow = lwma3(
            steady_chain(40, params.target_spacing * 2, BITS).tip().unwrap(),
            &params,
        )
        .to_target();
        assert!(slow > steady);
    }

    #[test]
    fn test_lwma3_clamps_solvetime_and_limit() {
        let params = testnet();

        // solve times past 6T count as 6T
        let a = lwma3(
            steady_chain(40, params.target_spacing * 6, BITS).tip().unwrap(),
            &params,
        );
        let b = lwma3(
            steady_chain(40, params.target_spacing * 50, BITS).tip().unwrap(),
            &params,
        );
        assert_eq!(a, b);

        let relaxed_bits = CompactTarget::encode(&params.pow_limit_relaxed);
        let chain = steady_chain(40, params.target_spacing * 6, relaxed_bits);
        assert_eq!(lwma3(chain.tip().unwrap(), &params), relaxed_bits);
    }

    #[test]
    fn test_lwma3_non_increasing_timestamps() {
        let params = testnet();
        // every block at the same second: each solvetime forced to 1
        let chain = steady_chain(40, 0, BITS);
        let next = lwma3(chain.tip().unwrap(), &params).to_target();

        let n = LWMA_WINDOW as u64;
        let k = n * (n + 1) * params.target_spacing as u64 / 2;
        let per_block = BITS.to_target() / U256::from(k * n);
        let expected = per_block * U256::from(n) * U256::from(n * (n + 1) / 2);
        assert_eq!(next, CompactTarget::encode(&expected).to_target());
    }

    #[test]
    fn test_select_algorithm() {
        let main = mainnet();
        let test = testnet();

        assert_eq!(
            RetargetAlgorithm::select(None, &main),
            RetargetAlgorithm::Floor(Limit::Primary)
        );

        let short = steady_chain(10, 120, BITS);
        assert_eq!(
            RetargetAlgorithm::select(short.tip(), &main),
            RetargetAlgorithm::Floor(Limit::Primary)
        );
        assert_eq!(
            RetargetAlgorithm::select(short.tip(), &test),
            RetargetAlgorithm::Floor(Limit::Relaxed)
        );

        // averaging_interval = 24 needs 23 predecessors
        let exact = steady_chain(24, 120, BITS);
        assert_eq!(
            RetargetAlgorithm::select(exact.tip(), &main),
            RetargetAlgorithm::DarkGravityWave
        );
        let under = steady_chain(23, 120, BITS);
        assert_eq!(
            RetargetAlgorithm::select(under.tip(), &main),
            RetargetAlgorithm::Floor(Limit::Primary)
        );

        let long = steady_chain(26, 120, BITS);
        assert_eq!(RetargetAlgorithm::select(long.tip(), &test), RetargetAlgorithm::Lwma3);
        let edge = steady_chain(25, 120, BITS);
        assert_eq!(
            RetargetAlgorithm::select(edge.tip(), &test),
            RetargetAlgorithm::Floor(Limit::Relaxed)
        );
    }

    #[test]
    fn test_retarget_at_timestamp_extremes() {
        // genesis at zero, then everything jammed at the last representable second
        let timeline = (0..40u32).map(|i| (if i == 0 { 0 } else { u32::MAX }, BITS));
        let chain = ChainIndex::from_timeline(timeline);
        let tip = chain.tip().unwrap();
        let candidate = BlockHeader::candidate(tip.hash(), u32::MAX, BITS);

        let params = mainnet();
        let next = dark_gravity_wave(Some(tip), Some(&candidate), &params);
        assert!(next.to_target() <= params.pow_limit);

        // whole window stuck at u32::MAX: timestamps are forced past it
        let relaxed = testnet();
        let next = lwma3(tip, &relaxed);
        assert!(next.to_target() <= relaxed.pow_limit_relaxed);

        // timespan from genesis to the tip clamps at 3x: easier than before
        let timeline = (0..25u32).map(|i| (if i == 24 { u32::MAX } else { i }, BITS));
        let chain = ChainIndex::from_timeline(timeline);
        let tip = chain.tip().unwrap();
        let candidate = BlockHeader::candidate(tip.hash(), u32::MAX, BITS);
        let next = dark_gravity_wave(Some(tip), Some(&candidate), &params);
        assert_eq!(next.to_target(), BITS.to_target() * U256::from(3u64));
    }

    #[test]
    fn test_lwma3_oversized_spacing_returns_relaxed_limit() {
        let mut params = testnet();
        params.target_spacing = 10_i64.pow(16);
        let chain = steady_chain(40, 120, BITS);
        assert_eq!(
            lwma3(chain.tip().unwrap(), &params),
            CompactTarget::encode(&params.pow_limit_relaxed)
        );

        params.target_spacing = i64::MAX;
        assert_eq!(
            lwma3(chain.tip().unwrap(), &params),
            CompactTarget::encode(&params.pow_limit_relaxed)
        );
    }

    #[test]
    fn test_next_work_genesis_case() {
        let params = mainnet();
        let candidate = BlockHeader::candidate(U256::zero(), 1_600_000_000, BITS);
        assert_eq!(
            next_work_required(None, &candidate, &params),
            CompactTarget::encode(&params.pow_limit)
        );
    }

    #[test]
    fn test_next_work_dispatches() {
        let params = mainnet();
        let chain = steady_chain(60, params.target_spacing / 2, BITS);
        let candidate = candidate_after(&chain, 10);
        assert_eq!(
            next_work_required(chain.tip(), &candidate, &params),
            dark_gravity_wave(chain.tip(), Some(&candidate), &params)
        );

        let params = testnet();
        let chain = steady_chain(60, params.target_spacing / 2, BITS);
        let candidate = candidate_after(&chain, 10);
        assert_eq!(
            next_work_required(chain.tip(), &candidate, &params),
            lwma3(chain.tip().unwrap(), &params)
        );
    }

    #[test]
    fn test_target_to_difficulty() {
        let limit = U256::from(1u64) << 200usize;
        assert_eq!(target_to_difficulty(&limit, &limit), 1.0);
        let half = limit / U256::from(2u64);
        assert_eq!(target_to_difficulty(&half, &limit), 2.0);
        assert!(target_to_difficulty(&U256::zero(), &limit).is_infinite());
    }
}
