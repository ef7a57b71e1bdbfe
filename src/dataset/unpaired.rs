use std::sync::Arc;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tch::Tensor;

/// One batch as a training loop sees it: `xb` holds the inputs and `yb` the targets.
#[derive(Debug)]
pub struct Batch {
    pub xb: Vec<Tensor>,
    pub yb: Vec<Tensor>,
}

impl Batch {
    /// Leading dimension of the first target tensor.
    pub fn size(&self) -> i64 {
        self.yb
            .first()
            .or_else(|| self.xb.first())
            .map(|t| t.size()[0])
            .unwrap_or(0)
    }
}

/// Images from two domains with no pairing between them.
///
/// The dataset is as long as the larger domain; the smaller one wraps around. Each batch has
/// the domain-A images as its single input and the domain-B images as its single target.
#[derive(Debug, Clone)]
pub struct UnpairedDataset {
    pub domain_a: Vec<Arc<Tensor>>,
    pub domain_b: Vec<Arc<Tensor>>,
    pub batch_size: usize,
    pub shuffle_b: Option<u64>,
}

impl UnpairedDataset {
    pub fn from_tensors(
        domain_a: Vec<Arc<Tensor>>,
        domain_b: Vec<Arc<Tensor>>,
        batch_size: usize,
    ) -> Self {
        Self {
            domain_a,
            domain_b,
            batch_size,
            shuffle_b: None,
        }
    }

    /// Split the leading dimension of two image stacks into single images.
    pub fn from_stacks(domain_a: &Tensor, domain_b: &Tensor, batch_size: usize) -> Self {
        let split = |stack: &Tensor| {
            (0..stack.size()[0])
                .map(|i| Arc::new(stack.get(i)))
                .collect::<Vec<_>>()
        };
        Self::from_tensors(split(domain_a), split(domain_b), batch_size)
    }

    /// Draw the domain-B pairing from a permutation seeded with `seed`.
    pub fn shuffle_b(mut self, seed: u64) -> Self {
        self.shuffle_b = Some(seed);
        self
    }

    pub fn size(&self) -> usize {
        if self.domain_a.is_empty() || self.domain_b.is_empty() {
            0
        } else {
            self.domain_a.len().max(self.domain_b.len())
        }
    }

    pub fn num_batches(&self) -> usize {
        if self.batch_size == 0 {
            0
        } else {
            (self.size() + self.batch_size - 1) / self.batch_size
        }
    }

    fn b_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.domain_b.len()).collect();
        if let Some(seed) = self.shuffle_b {
            order.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        order
    }

    /// Collate the dataset into batches. The last batch may be smaller.
    pub fn batches(&self) -> Vec<Batch> {
        let size = self.size();
        if size == 0 || self.batch_size == 0 {
            return Vec::new();
        }
        let b_order = self.b_order();
        (0..size)
            .step_by(self.batch_size)
            .map(|start| {
                let end = (start + self.batch_size).min(size);
                let a: Vec<_> = (start..end)
                    .map(|i| self.domain_a[i % self.domain_a.len()].clone())
                    .collect();
                let b: Vec<_> = (start..end)
                    .map(|i| self.domain_b[b_order[i % b_order.len()]].clone())
                    .collect();
                Batch {
                    xb: vec![Tensor::stack(&a, 0)],
                    yb: vec![Tensor::stack(&b, 0)],
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tch::{Device, Kind};

    use super::*;

    fn images(n: usize, value: f64) -> Vec<Arc<Tensor>> {
        (0..n)
            .map(|i| {
                Arc::new(Tensor::full(
                    &[1, 2, 2],
                    value + i as f64,
                    (Kind::Float, Device::Cpu),
                ))
            })
            .collect()
    }

    #[test]
    fn shorter_domain_wraps() {
        let dataset = UnpairedDataset::from_tensors(images(5, 0.), images(2, 100.), 2);
        assert_eq!(dataset.size(), 5);
        assert_eq!(dataset.num_batches(), 3);
        let batches = dataset.batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].xb[0].size(), vec![2, 1, 2, 2]);
        assert_eq!(batches[2].size(), 1);
        // Index 4 of domain B wraps to image 0.
        assert_eq!(crate::core::scalar(&batches[2].yb[0].get(0).get(0).get(0).get(0)), 100.);
    }

    #[test]
    fn shuffling_is_seeded() {
        let first = UnpairedDataset::from_tensors(images(4, 0.), images(4, 10.), 4).shuffle_b(7);
        let second = first.clone();
        crate::assert_tensor_eq!(&first.batches()[0].yb[0], &second.batches()[0].yb[0]);
    }

    #[test]
    fn empty_domain_yields_nothing() {
        let dataset = UnpairedDataset::from_tensors(images(3, 0.), Vec::new(), 2);
        assert!(dataset.batches().is_empty());
    }
}
