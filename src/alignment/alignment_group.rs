use crate::msa::alignment_element::Position;
use crate::utils::math_utils::{MathUtils, DEFAULT_LIKELIHOOD_ERROR, LN_ONE_THIRD};

/// Caller-supplied early-stop filter: alignment terminates once the stop
/// summary crosses `cap + fraction * read_len`. No wall-clock component.
#[derive(Debug, Clone, Copy)]
pub struct EarlyStop {
    pub cap: f64,
    pub fraction: f64,
}

impl EarlyStop {
    pub fn new(cap: f64, fraction: f64) -> EarlyStop {
        EarlyStop { cap, fraction }
    }

    pub fn unlimited() -> EarlyStop {
        EarlyStop {
            cap: f64::INFINITY,
            fraction: 0.0,
        }
    }

    pub fn threshold(&self, read_len: usize) -> f64 {
        self.cap + self.fraction * read_len as f64
    }
}

/// Which map the per-read reducer should keep when several anchor positions
/// produced one each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    /// Keep the map whose per-allele minimum is the smallest (mismatches).
    SmallestMinimum,
    /// Keep the map whose per-allele maximum is the largest (likelihoods).
    LargestMaximum,
}

/// The small algebra parameterizing the read aligner: an identity
/// accumulator, a fold for one observed mismatch, an associative combine and
/// a monotone stop summary. The same traversal computes mismatch counts,
/// mismatch lists or quality-weighted log-likelihoods depending on the
/// instance, monomorphized at each call site.
pub trait AlignmentGroup {
    type Acc: Clone + PartialEq + Send + Sync + std::fmt::Debug;
    type Stop;

    fn zero(&self) -> Self::Acc;

    /// Fold `weight` mismatched columns into the accumulator. `ref_pos` is
    /// the reference position of the first column, `read_pos` the read
    /// cursor there; penalties for unmatched read spans use the same entry
    /// point with `weight` covering the span.
    fn incr(&self, acc: &Self::Acc, ref_pos: Position, read_pos: usize, weight: usize)
        -> Self::Acc;

    fn merge(&self, a: &Self::Acc, b: &Self::Acc) -> Self::Acc;

    fn acc_to_string(&self, acc: &Self::Acc) -> String;

    fn init_stop(&self) -> Self::Stop;
    fn update_stop(&self, stop: &mut Self::Stop, acc: &Self::Acc);
    fn should_stop(&self, threshold: f64, stop: &Self::Stop) -> bool;

    /// Scalar rank of an accumulator, in the direction of `preference`.
    fn rank(&self, acc: &Self::Acc) -> f64;
    fn preference(&self) -> Preference;
}

/// Plain mismatch totals per allele.
#[derive(Debug, Clone, Copy, Default)]
pub struct MismatchCount;

impl AlignmentGroup for MismatchCount {
    type Acc = usize;
    type Stop = usize;

    fn zero(&self) -> usize {
        0
    }

    fn incr(&self, acc: &usize, _ref_pos: Position, _read_pos: usize, weight: usize) -> usize {
        acc + weight
    }

    fn merge(&self, a: &usize, b: &usize) -> usize {
        a + b
    }

    fn acc_to_string(&self, acc: &usize) -> String {
        format!("{}", acc)
    }

    fn init_stop(&self) -> usize {
        0
    }

    fn update_stop(&self, stop: &mut usize, acc: &usize) {
        *stop = (*stop).max(*acc);
    }

    fn should_stop(&self, threshold: f64, stop: &usize) -> bool {
        *stop as f64 > threshold
    }

    fn rank(&self, acc: &usize) -> f64 {
        *acc as f64
    }

    fn preference(&self) -> Preference {
        Preference::SmallestMinimum
    }
}

/// Mismatch positions with their weights, for inspection of where an allele
/// disagrees with the read stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct MismatchList;

impl AlignmentGroup for MismatchList {
    type Acc = Vec<(Position, usize)>;
    type Stop = usize;

    fn zero(&self) -> Vec<(Position, usize)> {
        Vec::new()
    }

    fn incr(
        &self,
        acc: &Vec<(Position, usize)>,
        ref_pos: Position,
        _read_pos: usize,
        weight: usize,
    ) -> Vec<(Position, usize)> {
        let mut out = acc.clone();
        out.push((ref_pos, weight));
        out
    }

    fn merge(&self, a: &Vec<(Position, usize)>, b: &Vec<(Position, usize)>) -> Vec<(Position, usize)> {
        let mut out = a.clone();
        out.extend_from_slice(b);
        out
    }

    fn acc_to_string(&self, acc: &Vec<(Position, usize)>) -> String {
        let entries: Vec<String> = acc
            .iter()
            .map(|(pos, weight)| format!("{}:{}", pos, weight))
            .collect();
        format!("[{}]", entries.join(","))
    }

    fn init_stop(&self) -> usize {
        0
    }

    fn update_stop(&self, stop: &mut usize, acc: &Vec<(Position, usize)>) {
        *stop = (*stop).max(acc.len());
    }

    fn should_stop(&self, threshold: f64, stop: &usize) -> bool {
        *stop as f64 > threshold
    }

    fn rank(&self, acc: &Vec<(Position, usize)>) -> f64 {
        acc.iter().map(|(_, weight)| *weight).sum::<usize>() as f64
    }

    fn preference(&self) -> Preference {
        Preference::SmallestMinimum
    }
}

/// Quality-weighted log-likelihood penalties. The accumulator is the summed
/// difference between mismatching and matching a base, priced by that base's
/// Phred-derived error probability; the full-match baseline is added back by
/// the aggregator so that merging penalties stays associative.
#[derive(Debug, Clone)]
pub struct PhredLikelihood {
    error_probs: Vec<f64>,
    penalty_per_mismatch: f64,
}

impl PhredLikelihood {
    pub fn new(error_probs: Vec<f64>) -> PhredLikelihood {
        let er = DEFAULT_LIKELIHOOD_ERROR;
        PhredLikelihood {
            error_probs,
            // The error mass spreads uniformly over the three other bases.
            penalty_per_mismatch: er.ln() + *LN_ONE_THIRD - (1.0 - er).ln(),
        }
    }

    /// Log-likelihood of a perfect match over the whole read.
    pub fn baseline(&self) -> f64 {
        self.error_probs.iter().map(|e| (1.0 - e).ln()).sum()
    }

    fn penalty_at(&self, read_pos: usize) -> f64 {
        let e = self.error_probs[read_pos];
        e.ln() + *LN_ONE_THIRD - (1.0 - e).ln()
    }
}

impl AlignmentGroup for PhredLikelihood {
    type Acc = f64;
    type Stop = f64;

    fn zero(&self) -> f64 {
        0.0
    }

    fn incr(&self, acc: &f64, _ref_pos: Position, read_pos: usize, weight: usize) -> f64 {
        let end = (read_pos + weight).min(self.error_probs.len());
        let mut out = *acc;
        for pos in read_pos..end {
            out += self.penalty_at(pos);
        }
        out
    }

    fn merge(&self, a: &f64, b: &f64) -> f64 {
        a + b
    }

    fn acc_to_string(&self, acc: &f64) -> String {
        format!("{:.4}", acc)
    }

    fn init_stop(&self) -> f64 {
        0.0
    }

    fn update_stop(&self, stop: &mut f64, acc: &f64) {
        *stop = stop.min(*acc);
    }

    fn should_stop(&self, threshold: f64, stop: &f64) -> bool {
        // Threshold is in mismatch equivalents; convert to log-likelihood.
        *stop < threshold * self.penalty_per_mismatch
    }

    fn rank(&self, acc: &f64) -> f64 {
        *acc
    }

    fn preference(&self) -> Preference {
        Preference::LargestMaximum
    }
}

/// Likelihood a read with this many mismatches came from a given allele
/// under a uniform error model. Kept next to the groups that feed it.
pub fn read_likelihood(error_rate: f64, read_len: usize, mismatches: usize) -> f64 {
    MathUtils::read_log_likelihood(error_rate, read_len, mismatches as f64).exp()
}
