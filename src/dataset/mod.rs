pub use normalize::*;
pub use unpaired::*;

pub mod normalize;
pub mod unpaired;

/// The training and (optional) validation data of a learner, with the normalization applied
/// to both so that metrics can undo it.
#[derive(Debug)]
pub struct DataLoaders {
    pub train: UnpairedDataset,
    pub valid: Option<UnpairedDataset>,
    pub normalize: Option<Normalize>,
}

impl DataLoaders {
    pub fn new(train: UnpairedDataset, valid: Option<UnpairedDataset>) -> Self {
        Self {
            train,
            valid,
            normalize: None,
        }
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = Some(normalize);
        self
    }

    /// Reverse the normalization of a batch tensor. Identity when no normalization is set.
    pub fn decode(&self, tensor: &tch::Tensor) -> tch::Tensor {
        match &self.normalize {
            Some(normalize) => normalize.decode(tensor),
            None => tensor.shallow_clone(),
        }
    }

    /// Batches of the training set, normalized.
    pub fn train_batches(&self) -> Vec<Batch> {
        self.normalized(self.train.batches())
    }

    /// Batches of the validation set, normalized. Empty without a validation set.
    pub fn valid_batches(&self) -> Vec<Batch> {
        match &self.valid {
            Some(valid) => self.normalized(valid.batches()),
            None => Vec::new(),
        }
    }

    fn normalized(&self, batches: Vec<Batch>) -> Vec<Batch> {
        match &self.normalize {
            Some(normalize) => batches
                .into_iter()
                .map(|batch| Batch {
                    xb: batch.xb.iter().map(|x| normalize.encode(x)).collect(),
                    yb: batch.yb.iter().map(|y| normalize.encode(y)).collect(),
                })
                .collect(),
            None => batches,
        }
    }
}
