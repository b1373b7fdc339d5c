//! Folding per-file outcomes into one outcome per record type.

use crate::models::Outcome;

/// Fold `outcomes` into a single [`Outcome`].
///
/// Counters and `duration` are summed, `errors` and `responses` are
/// concatenated in order and `record_type` is taken from the last input.
///
/// `eps` and `rps` are a running pairwise mean: the first input's rate is
/// taken as-is and every further input is averaged with the running value.
/// This is order-sensitive and not weighted by volume.
pub fn summarize<'a, I>(outcomes: I) -> Outcome
where
    I: IntoIterator<Item = &'a Outcome>,
{
    let mut acc = Outcome::default();
    let mut folded = 0usize;

    for outcome in outcomes {
        acc.record_type = outcome.record_type;
        acc.total += outcome.total;
        acc.success += outcome.success;
        acc.failed += outcome.failed;
        acc.empty += outcome.empty;
        acc.duplicates += outcome.duplicates;
        acc.batches += outcome.batches;
        acc.requests += outcome.requests;
        acc.retries += outcome.retries;
        acc.duration += outcome.duration;

        if folded == 0 {
            acc.eps = outcome.eps;
            acc.rps = outcome.rps;
        } else {
            acc.eps = (acc.eps + outcome.eps) / 2.0;
            acc.rps = (acc.rps + outcome.rps) / 2.0;
        }

        acc.errors.extend(outcome.errors.iter().cloned());
        acc.responses.extend(outcome.responses.iter().cloned());
        folded += 1;
    }

    acc
}
