//! Concurrent transform batches.
//!
//! A batch runs `round_size` transforms of the same size, each on its own
//! buffer so rounds can proceed independently. The strategy picks how much
//! of the batch is in flight at once and where the host joins, which is the
//! throughput knob a saturated queue responds to.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use ark_bn254::Fr;
use ark_std::UniformRand;
use tracing::instrument;

use crate::{
    device::{DeviceBuffer, Queue, Token, copy_to_device},
    errors::NttError,
    ntt::{RoundLayout, six_step_ntt},
};

/// How the rounds of a batch overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    /// Every round transforms the same input vector; all rounds are in
    /// flight at once with one join at the end.
    SharedInput,
    /// Distinct inputs, issued in cohorts of `width` rounds with a full
    /// join between cohorts.
    Cohort { width: usize },
    /// Distinct inputs, everything in flight at once, joined round by round
    /// in issue order so each buffer is released as soon as it drains.
    IndependentInput,
}

/// Input and result of one round, for inspection after the batch completes.
#[derive(Debug)]
pub struct RoundOutput {
    pub input: Arc<Vec<Fr>>,
    pub output: Vec<Fr>,
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub elapsed: Duration,
    pub rounds: Vec<RoundOutput>,
}

impl BatchReport {
    #[must_use]
    pub fn elapsed_micros(&self) -> u128 {
        self.elapsed.as_micros()
    }
}

/// Issues batches of transforms against one queue.
#[derive(Debug, Clone, Copy)]
pub struct BatchExecutor {
    strategy: BatchStrategy,
}

/// One in-flight round: its buffer, input, and completion token.
struct InFlight {
    buf: Arc<DeviceBuffer>,
    input: Arc<Vec<Fr>>,
    done: Token,
}

impl InFlight {
    fn submit(
        queue: &Queue,
        layout: &RoundLayout,
        input: Arc<Vec<Fr>>,
        wg_size: usize,
    ) -> Result<Self, NttError> {
        let buf = DeviceBuffer::alloc(layout.total_len())?;
        let load = copy_to_device(queue, Arc::clone(&input), Arc::clone(&buf), 0, &[]);
        let done = six_step_ntt(queue, &buf, layout.dim, wg_size, &[load])?;
        Ok(Self { buf, input, done })
    }

    fn join(self, dim: usize) -> Result<RoundOutput, NttError> {
        self.done.wait()?;
        let output = self.buf.read(0, dim);
        Ok(RoundOutput { input: self.input, output })
    }
}

impl BatchExecutor {
    #[must_use]
    pub const fn new(strategy: BatchStrategy) -> Self {
        Self { strategy }
    }

    /// Run `round_size` transforms of size `dim` and report the outputs and
    /// the wall-clock time spent with work in flight.
    ///
    /// Input generation happens before the clock starts, so the elapsed time
    /// covers submission and execution only.
    #[instrument(skip(self, queue), fields(strategy = ?self.strategy))]
    pub fn run(
        &self,
        queue: &Queue,
        round_size: usize,
        dim: usize,
        wg_size: usize,
    ) -> Result<BatchReport, NttError> {
        if round_size == 0 {
            return Err(NttError::EmptyBatch);
        }
        let layout = RoundLayout::for_dim(dim)?;

        let start;
        let rounds = match self.strategy {
            BatchStrategy::SharedInput => {
                let input = Arc::new(random_vector(dim));
                start = Instant::now();
                let in_flight: Vec<InFlight> = (0..round_size)
                    .map(|_| InFlight::submit(queue, &layout, Arc::clone(&input), wg_size))
                    .collect::<Result<_, _>>()?;
                in_flight
                    .into_iter()
                    .map(|round| round.join(dim))
                    .collect::<Result<_, _>>()?
            }
            BatchStrategy::Cohort { width } => {
                let width = width.max(1);
                let inputs = distinct_inputs(round_size, dim);
                start = Instant::now();
                let mut rounds = Vec::with_capacity(round_size);
                for cohort in inputs.chunks(width) {
                    let in_flight: Vec<InFlight> = cohort
                        .iter()
                        .map(|input| {
                            InFlight::submit(queue, &layout, Arc::clone(input), wg_size)
                        })
                        .collect::<Result<_, _>>()?;
                    for round in in_flight {
                        rounds.push(round.join(dim)?);
                    }
                }
                rounds
            }
            BatchStrategy::IndependentInput => {
                let inputs = distinct_inputs(round_size, dim);
                start = Instant::now();
                let in_flight: Vec<InFlight> = inputs
                    .into_iter()
                    .map(|input| InFlight::submit(queue, &layout, input, wg_size))
                    .collect::<Result<_, _>>()?;
                in_flight
                    .into_iter()
                    .map(|round| round.join(dim))
                    .collect::<Result<_, _>>()?
            }
        };
        let elapsed = start.elapsed();
        Ok(BatchReport { elapsed, rounds })
    }
}

fn random_vector(dim: usize) -> Vec<Fr> {
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| Fr::rand(&mut rng)).collect()
}

fn distinct_inputs(round_size: usize, dim: usize) -> Vec<Arc<Vec<Fr>>> {
    (0..round_size).map(|_| Arc::new(random_vector(dim))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntt::six_step_ntt_blocking;

    fn check_rounds(report: &BatchReport, queue: &Queue, wg_size: usize) {
        for (i, round) in report.rounds.iter().enumerate() {
            let expected = six_step_ntt_blocking(queue, &round.input, wg_size).unwrap();
            assert_eq!(round.output, expected, "round {i}");
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        let queue = Queue::new();
        let err = BatchExecutor::new(BatchStrategy::SharedInput)
            .run(&queue, 0, 16, 4)
            .unwrap_err();
        assert_eq!(err, NttError::EmptyBatch);
    }

    #[test]
    fn single_round_matches_blocking_transform() {
        let queue = Queue::new();
        let report = BatchExecutor::new(BatchStrategy::IndependentInput)
            .run(&queue, 1, 64, 8)
            .unwrap();
        assert_eq!(report.rounds.len(), 1);
        check_rounds(&report, &queue, 8);
    }

    #[test]
    fn shared_input_rounds_agree() {
        let queue = Queue::new();
        let report = BatchExecutor::new(BatchStrategy::SharedInput)
            .run(&queue, 4, 128, 8)
            .unwrap();
        assert_eq!(report.rounds.len(), 4);
        // Same input, same output, for every round.
        let first = &report.rounds[0];
        for round in &report.rounds[1..] {
            assert!(Arc::ptr_eq(&first.input, &round.input));
            assert_eq!(round.output, first.output);
        }
        check_rounds(&report, &queue, 8);
    }

    #[test]
    fn cohort_processes_every_round() {
        let queue = Queue::new();
        // Width does not divide the round count; the tail cohort is short.
        let report = BatchExecutor::new(BatchStrategy::Cohort { width: 3 })
            .run(&queue, 7, 64, 4)
            .unwrap();
        assert_eq!(report.rounds.len(), 7);
        check_rounds(&report, &queue, 4);
    }

    #[test]
    fn independent_inputs_are_distinct() {
        let queue = Queue::new();
        let report = BatchExecutor::new(BatchStrategy::IndependentInput)
            .run(&queue, 3, 64, 8)
            .unwrap();
        assert!(!Arc::ptr_eq(&report.rounds[0].input, &report.rounds[1].input));
        check_rounds(&report, &queue, 8);
    }

    #[test]
    fn invalid_dimension_is_rejected() {
        let queue = Queue::new();
        let err = BatchExecutor::new(BatchStrategy::SharedInput)
            .run(&queue, 2, 12, 4)
            .unwrap_err();
        assert_eq!(err, NttError::NotPowerOfTwo(12));
    }
}
