mod gradients;
mod learner;
mod param_manager;
mod supervised;

pub use gradients::{
    GradientSlots, distribute_grads, distribute_sparse_grads, flatten_grads, flatten_grads_into,
};
pub use learner::{Evaluation, Learner};
pub use param_manager::{BackIter, FrontIter, ParamManager, ParamSlot};
pub use supervised::SupervisedLearner;
