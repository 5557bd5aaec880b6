use std::time::{Duration, Instant};

use deepspeaker_triplet::{AudioLoader, BatchBuilder, CorpusIndex, SlicePin, TripletError};
use rand::Rng;
use tracing::{debug, info};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::TrainConfig;
use crate::error::TrainError;
use crate::model::SpeakerModel;

/// Outcome of one training step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Step count after this step.
    pub step: u64,
    pub loss: f32,
    /// Tensor shape fed to the model.
    pub shape: [usize; 4],
    pub elapsed: Duration,
    /// Checkpoint written after this step, if any.
    pub checkpoint: Option<Checkpoint>,
}

/// Drives batch construction, model updates and checkpointing.
///
/// Single-threaded: each batch is sampled, loaded and consumed before the
/// next one starts. Any error ends the run.
pub struct Trainer<L, M, R> {
    corpus: CorpusIndex,
    builder: BatchBuilder<L>,
    model: M,
    store: CheckpointStore,
    pin: SlicePin,
    rng: R,
    step: u64,
    checkpoint_every: u64,
}

impl<L, M, R> Trainer<L, M, R>
where
    L: AudioLoader,
    M: SpeakerModel,
    R: Rng,
{
    /// Fails on an invalid configuration, or when `cfg.num_slices` pins a
    /// count the configured window can never produce.
    pub fn new(cfg: &TrainConfig, corpus: CorpusIndex, loader: L, model: M, rng: R) -> Result<Self, TrainError> {
        cfg.validate()?;
        let builder = BatchBuilder::new(cfg.batch_config(), loader)?;
        let pin = match cfg.num_slices {
            Some(n) => {
                let expected = builder.expected_slices();
                if n != expected {
                    return Err(TripletError::ShapeMismatch { expected: n, got: expected }.into());
                }
                SlicePin::fixed(n)
            }
            None => SlicePin::new(),
        };
        Ok(Self {
            corpus,
            builder,
            model,
            store: CheckpointStore::new(&cfg.checkpoint_dir),
            pin,
            rng,
            step: 0,
            checkpoint_every: cfg.checkpoint_every,
        })
    }

    /// Completed steps, including those restored from a checkpoint.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Slice count per utterance fixed for this run, once known.
    pub fn num_slices(&self) -> Option<usize> {
        self.pin.get()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Draws one batch to fix the per-utterance slice count of the run.
    ///
    /// Does nothing if the count is already known.
    pub fn pin_shape(&mut self) -> Result<usize, TrainError> {
        if let Some(n) = self.pin.get() {
            return Ok(n);
        }
        let batch = self.builder.build(&self.corpus, &mut self.rng)?;
        let n = self.pin.check(batch.num_slices().unwrap_or(0))?;
        let items = self.builder.config().batch_items();
        info!("num_slices = {n}");
        info!("batch shape: [{}, 32, 32, 3]", items * n);
        info!("batch size: {items}");
        Ok(n)
    }

    /// Restores the model from the latest checkpoint, if one exists.
    pub fn resume(&mut self) -> Result<Option<Checkpoint>, TrainError> {
        let Some(ckpt) = self.store.latest()? else {
            return Ok(None);
        };
        info!("found checkpoint [{}], resuming", ckpt.path.display());
        self.store.restore(&ckpt, &mut self.model)?;
        self.step = ckpt.step;
        Ok(Some(ckpt))
    }

    /// Runs one step: build a batch, train on it, checkpoint if due.
    pub fn train_step(&mut self) -> Result<StepReport, TrainError> {
        let start = Instant::now();
        let batch = self.builder.build(&self.corpus, &mut self.rng)?;
        self.pin.check(batch.num_slices().unwrap_or(0))?;

        let x = batch.to_tensor()?;
        debug!("x.shape = {:?}", x.shape());
        let targets = vec![0.0f32; x.rows()];

        debug!("presenting batch #{}: {:?}", self.step, batch.speaker_ids());
        let loss = self.model.train_on_batch(&x, &targets)?;
        self.step += 1;
        let elapsed = start.elapsed();
        info!(
            "== step {} processed in {:.2}s, training loss = {loss}",
            self.step,
            elapsed.as_secs_f64()
        );

        let checkpoint = if self.step % self.checkpoint_every == 0 {
            Some(self.store.save(self.step, loss, &self.model)?)
        } else {
            None
        };

        Ok(StepReport {
            step: self.step,
            loss,
            shape: x.shape(),
            elapsed,
            checkpoint,
        })
    }

    /// Pins the input shape, resumes from the latest checkpoint and trains.
    ///
    /// Runs until `max_steps` further steps are done, or forever when `None`.
    pub fn run(&mut self, max_steps: Option<u64>) -> Result<u64, TrainError> {
        self.pin_shape()?;
        self.resume()?;

        info!("starting training at step {}", self.step);
        let mut done = 0u64;
        while max_steps.is_none_or(|max| done < max) {
            self.train_step()?;
            done += 1;
        }
        Ok(self.step)
    }
}
