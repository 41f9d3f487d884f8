use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::alignment::alignment_group::{
    read_likelihood, AlignmentGroup, EarlyStop, MismatchCount, MismatchList, PhredLikelihood,
};
use crate::alignment::per_read_reducer::reduce_anchors;
use crate::alignment::read_aligner::{align, AlignmentOutcome};
use crate::graphs::kmer_index::KmerIndex;
use crate::graphs::AlleleGraph;
use crate::model::allele_map::AlleleMap;
use crate::msa::alignment_element::Position;
use crate::reads::fastq_converter::ReadInput;
use crate::utils::errors::TypingError;
use crate::utils::math_utils::MathUtils;

const READ_CHUNK: usize = 256;

/// A statistical model folding per-read per-allele alignment results into a
/// running per-allele score. `combine` must be associative and commutative:
/// the read stream is partitioned across threads and partial scoreboards
/// merged, which has to agree with whole-stream aggregation.
pub trait ScoreModel: Sync {
    type Group: AlignmentGroup;
    type Score: Clone + Send + Sync + std::fmt::Debug;

    fn group_for(&self, read: &ReadInput) -> Self::Group;
    fn zero(&self) -> Self::Score;
    fn fold(
        &self,
        score: &mut Self::Score,
        group: &Self::Group,
        acc: &<Self::Group as AlignmentGroup>::Acc,
        read_len: usize,
    );
    fn combine(&self, mine: &mut Self::Score, other: &Self::Score);
}

/// Sum of mismatch counts over all reads.
pub struct MismatchesModel;

impl ScoreModel for MismatchesModel {
    type Group = MismatchCount;
    type Score = usize;

    fn group_for(&self, _read: &ReadInput) -> MismatchCount {
        MismatchCount
    }

    fn zero(&self) -> usize {
        0
    }

    fn fold(&self, score: &mut usize, _group: &MismatchCount, acc: &usize, _read_len: usize) {
        *score += acc;
    }

    fn combine(&self, mine: &mut usize, other: &usize) {
        *mine += other;
    }
}

/// Concatenated per-position mismatch lists over all reads. Output order
/// within the list is unspecified; consumers sort before comparison.
pub struct MismatchListModel;

impl ScoreModel for MismatchListModel {
    type Group = MismatchList;
    type Score = Vec<(Position, usize)>;

    fn group_for(&self, _read: &ReadInput) -> MismatchList {
        MismatchList
    }

    fn zero(&self) -> Vec<(Position, usize)> {
        Vec::new()
    }

    fn fold(
        &self,
        score: &mut Vec<(Position, usize)>,
        _group: &MismatchList,
        acc: &Vec<(Position, usize)>,
        _read_len: usize,
    ) {
        score.extend_from_slice(acc);
    }

    fn combine(&self, mine: &mut Vec<(Position, usize)>, other: &Vec<(Position, usize)>) {
        mine.extend_from_slice(other);
    }
}

/// Product of per-read likelihoods under a uniform error model.
pub struct LikelihoodModel {
    pub error_rate: f64,
}

impl ScoreModel for LikelihoodModel {
    type Group = MismatchCount;
    type Score = f64;

    fn group_for(&self, _read: &ReadInput) -> MismatchCount {
        MismatchCount
    }

    fn zero(&self) -> f64 {
        1.0
    }

    fn fold(&self, score: &mut f64, _group: &MismatchCount, acc: &usize, read_len: usize) {
        *score *= read_likelihood(self.error_rate, read_len, *acc);
    }

    fn combine(&self, mine: &mut f64, other: &f64) {
        *mine *= other;
    }
}

/// Sum of per-read log-likelihoods under a uniform error model.
pub struct LogLikelihoodModel {
    pub error_rate: f64,
}

impl ScoreModel for LogLikelihoodModel {
    type Group = MismatchCount;
    type Score = f64;

    fn group_for(&self, _read: &ReadInput) -> MismatchCount {
        MismatchCount
    }

    fn zero(&self) -> f64 {
        0.0
    }

    fn fold(&self, score: &mut f64, _group: &MismatchCount, acc: &usize, read_len: usize) {
        *score += MathUtils::read_log_likelihood(self.error_rate, read_len, *acc as f64);
    }

    fn combine(&self, mine: &mut f64, other: &f64) {
        *mine += other;
    }
}

/// Sum of per-read quality-weighted log-likelihoods: the perfect-match
/// baseline for the read plus the accumulated mismatch penalties.
pub struct PhredLikelihoodModel;

impl ScoreModel for PhredLikelihoodModel {
    type Group = PhredLikelihood;
    type Score = f64;

    fn group_for(&self, read: &ReadInput) -> PhredLikelihood {
        let probs = read
            .error_probs
            .clone()
            .expect("phred model requires reads converted with qualities");
        PhredLikelihood::new(probs)
    }

    fn zero(&self) -> f64 {
        0.0
    }

    fn fold(&self, score: &mut f64, group: &PhredLikelihood, acc: &f64, _read_len: usize) {
        *score += group.baseline() + acc;
    }

    fn combine(&self, mine: &mut f64, other: &f64) {
        *mine += other;
    }
}

/// Final scoreboard for a run: the aggregated per-allele scores, the reads
/// that contributed, and every per-read error encountered on the way.
#[derive(Debug)]
pub struct AggregateOutcome<S> {
    pub scores: AlleleMap<S>,
    pub reads_used: usize,
    pub errors: Vec<(String, TypingError)>,
}

/// Fold the read stream into a per-allele scoreboard. Each read is anchored
/// by the index, aligned once per anchor position, reduced to one map and
/// folded in; per-read failures are recorded and the stream continues.
pub fn aggregate_reads<M: ScoreModel>(
    model: &M,
    graph: &AlleleGraph,
    index: &KmerIndex,
    early_stop: &EarlyStop,
    reads: &[ReadInput],
    progress: Option<&ProgressBar>,
) -> AggregateOutcome<M::Score> {
    let size = graph.allele_index.size();

    let (scores, reads_used, errors) = reads
        .par_chunks(READ_CHUNK)
        .map(|chunk| {
            let mut scores = AlleleMap::make(size, model.zero());
            let mut used = 0usize;
            let mut errors = Vec::new();
            for read in chunk {
                match score_one_read(model, graph, index, early_stop, read) {
                    Ok((group, reduced_scores)) => {
                        for (allele, acc) in reduced_scores.iter() {
                            model.fold(scores.get_mut(allele), &group, acc, read.len());
                        }
                        used += 1;
                    }
                    Err(e) => errors.push((read.id.clone(), e)),
                }
                if let Some(bar) = progress {
                    bar.inc(1);
                }
            }
            (scores, used, errors)
        })
        .reduce(
            || (AlleleMap::make(size, model.zero()), 0usize, Vec::new()),
            |(mut scores_a, used_a, mut errors_a), (scores_b, used_b, errors_b)| {
                scores_a.update_from(&scores_b, |mine, theirs| model.combine(mine, theirs));
                errors_a.extend(errors_b);
                (scores_a, used_a + used_b, errors_a)
            },
        );

    AggregateOutcome {
        scores,
        reads_used,
        errors,
    }
}

type ReducedRead<M> = (
    <M as ScoreModel>::Group,
    AlleleMap<<<M as ScoreModel>::Group as AlignmentGroup>::Acc>,
);

fn score_one_read<M: ScoreModel>(
    model: &M,
    graph: &AlleleGraph,
    index: &KmerIndex,
    early_stop: &EarlyStop,
    read: &ReadInput,
) -> Result<ReducedRead<M>, TypingError> {
    let group = model.group_for(read);
    let anchors = index.lookup(&read.seq)?;

    let mut outcomes: Vec<AlignmentOutcome<<M::Group as AlignmentGroup>::Acc>> =
        Vec::with_capacity(anchors.len());
    for anchor in anchors {
        outcomes.push(align(graph, &group, early_stop, &read.seq, anchor)?);
    }

    let reduced = reduce_anchors(&group, outcomes)?;
    Ok((group, reduced))
}
