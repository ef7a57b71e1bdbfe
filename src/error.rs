use thiserror::Error;

/// Errors raised while building or driving a CycleGAN training run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown curve type `{0}`, expected one of `linear`, `cosine`, `exponential`")]
    InvalidCurveType(String),

    #[error("unknown adversarial base loss `{0}`, expected `mse` or `bce`")]
    InvalidBaseLoss(String),

    #[error("flat proportion must lie in [0, 1], got {0}")]
    InvalidPct(f64),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("loss function called before `set_input` received a batch")]
    MissingInput,

    #[error("loss function is not bound to a model")]
    UnboundLoss,

    #[error("no optimizer has been created for this learner")]
    MissingOptimizer,

    #[error("no prediction is available for the current batch")]
    MissingPrediction,

    #[error("expected {expected} tensor(s) in {what}, got {actual}")]
    Arity {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cannot copy hyperparameters of {source_groups} group(s) onto an optimizer with {target_groups} group(s)")]
    HyperGroups {
        source_groups: usize,
        target_groups: usize,
    },

    #[error(transparent)]
    Tch(#[from] tch::TchError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check that `tensors` holds exactly `expected` entries.
pub(crate) fn check_arity<T>(what: &'static str, tensors: &[T], expected: usize) -> Result<()> {
    if tensors.len() == expected {
        Ok(())
    } else {
        Err(Error::Arity {
            what,
            expected,
            actual: tensors.len(),
        })
    }
}
