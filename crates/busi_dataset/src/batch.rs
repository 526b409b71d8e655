//! Batch iteration over a [`BusiDataset`].

use crate::dataset::BusiDataset;
use crate::types::{DatasetError, DatasetResult, ImageTensor, LabeledExample};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    /// Seeds both the visit order and every per-sample augmentation draw.
    pub seed: Option<u64>,
    pub drop_last: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }
}

impl BatchConfig {
    /// Sequential, unshuffled batches for evaluation.
    pub fn eval(batch_size: usize) -> Self {
        Self {
            batch_size,
            shuffle: false,
            seed: None,
            drop_last: false,
        }
    }
}

/// Flat, row-major batch data ready for a tensor backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[N, C, H, W]`
    pub images: Vec<f32>,
    pub image_shape: [usize; 4],
    pub labels: Vec<i64>,
    /// `[N, 1, H, W]` when the dataset yields masks.
    pub masks: Option<Vec<f32>>,
    pub mask_shape: Option<[usize; 4]>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(feature = "burn-runtime")]
pub struct BurnBatch<B: burn::tensor::backend::Backend> {
    pub images: burn::tensor::Tensor<B, 4>,
    pub labels: burn::tensor::Tensor<B, 1, burn::tensor::Int>,
    pub masks: Option<burn::tensor::Tensor<B, 4>>,
}

#[cfg(feature = "burn-runtime")]
impl Batch {
    pub fn to_burn<B: burn::tensor::backend::Backend>(&self, device: &B::Device) -> BurnBatch<B> {
        use burn::tensor::{Int, Tensor, TensorData};
        let images = Tensor::<B, 1>::from_floats(self.images.as_slice(), device)
            .reshape(self.image_shape);
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(self.labels.clone(), [self.labels.len()]),
            device,
        );
        let masks = match (&self.masks, self.mask_shape) {
            (Some(buf), Some(shape)) => {
                Some(Tensor::<B, 1>::from_floats(buf.as_slice(), device).reshape(shape))
            }
            _ => None,
        };
        BurnBatch {
            images,
            labels,
            masks,
        }
    }
}

pub struct BatchIter {
    dataset: BusiDataset,
    cfg: BatchConfig,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
    processed_batches: usize,
    processed_samples: usize,
    total_load_time: Duration,
}

impl BatchIter {
    pub fn new(dataset: BusiDataset, cfg: BatchConfig) -> DatasetResult<Self> {
        if cfg.batch_size == 0 {
            return Err(DatasetError::InvalidConfig(
                "batch_size must be > 0".to_string(),
            ));
        }
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let mut iter = Self {
            order: (0..dataset.len()).collect(),
            dataset,
            cfg,
            cursor: 0,
            rng,
            processed_batches: 0,
            processed_samples: 0,
            total_load_time: Duration::ZERO,
        };
        iter.reset();
        Ok(iter)
    }

    /// Start a new epoch, reshuffling when configured.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.cfg.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    pub fn num_batches(&self) -> usize {
        let n = self.order.len();
        if self.cfg.drop_last {
            n / self.cfg.batch_size
        } else {
            n.div_ceil(self.cfg.batch_size)
        }
    }

    pub fn next_batch(&mut self) -> DatasetResult<Option<Batch>> {
        let remaining = self.order.len() - self.cursor;
        if remaining == 0 || (self.cfg.drop_last && remaining < self.cfg.batch_size) {
            return Ok(None);
        }
        let end = (self.cursor + self.cfg.batch_size).min(self.order.len());
        let jobs: Vec<(usize, u64)> = self.order[self.cursor..end]
            .iter()
            .map(|&i| (i, self.rng.random()))
            .collect();
        self.cursor = end;

        let t_load = Instant::now();
        let dataset = &self.dataset;
        let loaded: Vec<_> = jobs
            .par_iter()
            .map(|&(i, seed)| dataset.get_with_seed(i, seed))
            .collect::<DatasetResult<_>>()?;
        let load_elapsed = t_load.elapsed();

        let batch = assemble(loaded)?;
        self.processed_batches += 1;
        self.processed_samples += batch.len();
        self.total_load_time += load_elapsed;
        tracing::debug!(
            batch = self.processed_batches,
            samples = batch.len(),
            load_ms = load_elapsed.as_secs_f64() * 1000.0,
            "assembled batch"
        );
        if self.cursor == self.order.len() {
            tracing::info!(
                batches = self.processed_batches,
                samples = self.processed_samples,
                avg_load_ms = self.total_load_time.as_secs_f64() * 1000.0
                    / self.processed_batches.max(1) as f64,
                "epoch complete"
            );
        }
        Ok(Some(batch))
    }
}

impl Iterator for BatchIter {
    type Item = DatasetResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

fn assemble(examples: Vec<LabeledExample>) -> DatasetResult<Batch> {
    let n = examples.len();
    let Some(first) = examples.first() else {
        return Err(DatasetError::InvalidConfig("empty batch".to_string()));
    };
    let [c, h, w] = first.image.shape;
    let mask_shape = first.mask.as_ref().map(|m| m.shape);

    let mut images = Vec::with_capacity(n * c * h * w);
    let mut labels = Vec::with_capacity(n);
    let mut masks = mask_shape.map(|[mc, mh, mw]| Vec::with_capacity(n * mc * mh * mw));
    for ex in examples {
        check_shape(&ex.image, [c, h, w])?;
        images.extend_from_slice(&ex.image.data);
        labels.push(ex.label_id as i64);
        match (masks.as_mut(), ex.mask, mask_shape) {
            (Some(buf), Some(mask), Some(shape)) => {
                check_shape(&mask, shape)?;
                buf.extend_from_slice(&mask.data);
            }
            (None, None, None) => {}
            _ => {
                return Err(DatasetError::InvalidConfig(
                    "batch mixes samples with and without masks".to_string(),
                ))
            }
        }
    }
    Ok(Batch {
        images,
        image_shape: [n, c, h, w],
        labels,
        masks,
        mask_shape: mask_shape.map(|[mc, mh, mw]| [n, mc, mh, mw]),
    })
}

fn check_shape(t: &ImageTensor, expected: [usize; 3]) -> DatasetResult<()> {
    if t.shape != expected {
        return Err(DatasetError::InvalidConfig(format!(
            "batch contains varying tensor shapes: {:?} vs {:?}",
            t.shape, expected
        )));
    }
    Ok(())
}
