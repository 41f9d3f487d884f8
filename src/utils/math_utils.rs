use ordered_float::OrderedFloat;

lazy_static! {
    pub static ref LN_ONE_THIRD: f64 = -(3.0_f64).ln();
}

/// Residues a mismatched base could have been instead of the reference one.
pub const ALPHABET_SIZE: usize = 4;

/// Default per-base sequencing error rate for the uniform likelihood models.
pub const DEFAULT_LIKELIHOOD_ERROR: f64 = 0.025;

const PHRED_OFFSET: u8 = 33;

pub struct MathUtils {}

impl MathUtils {
    /**
     * Log-likelihood of observing m mismatches over a read of the given
     * length under a uniform per-base error rate, with the error mass spread
     * over the remaining residues of the alphabet.
     */
    pub fn read_log_likelihood(error_rate: f64, read_len: usize, mismatches: f64) -> f64 {
        let matches = read_len as f64 - mismatches;
        matches * (1.0 - error_rate).ln()
            + mismatches * (error_rate / (ALPHABET_SIZE as f64 - 1.0)).ln()
    }

    /// Decode one Phred+33 quality byte to an error probability.
    pub fn phred_to_error_prob(qual: u8) -> f64 {
        let q = qual.saturating_sub(PHRED_OFFSET) as f64;
        10.0_f64.powf(-q / 10.0)
    }

    /**
     * ln(sum(exp(values))) without leaving log space, scaled by the maximum
     * element for numeric stability.
     */
    pub fn ln_sum_ln(values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NEG_INFINITY;
        }

        let max_value = Self::max_f64(values);
        if max_value == f64::NEG_INFINITY {
            return max_value;
        }

        let sum_tot = values.iter().map(|value| (value - max_value).exp()).sum::<f64>();

        if sum_tot.is_nan() || sum_tot == f64::INFINITY {
            panic!("ln p: values must be non-infinite and non-NaN");
        }

        max_value + sum_tot.ln()
    }

    /**
     * Normalize an array of natural-log values into real-space probabilities
     * summing to one.
     */
    pub fn normalize_ln(values: &[f64]) -> Vec<f64> {
        let total = Self::ln_sum_ln(values);
        values.iter().map(|v| (v - total).exp()).collect()
    }

    /// Normalize a real-space non-negative array so it sums to one.
    pub fn normalize_sum_to_one(mut array: Vec<f64>) -> Vec<f64> {
        if array.is_empty() {
            return array;
        }

        let sum = array.iter().sum::<f64>();
        assert!(
            sum >= 0.0,
            "Values in probability array sum to a negative number"
        );
        if sum > 0.0 {
            array.iter_mut().for_each(|x| *x /= sum);
        }

        array
    }

    pub fn max_f64(values: &[f64]) -> f64 {
        *values
            .iter()
            .max_by_key(|x| OrderedFloat(**x))
            .unwrap_or(&f64::NAN)
    }
}
