use std::mem;

use super::GradientSlots;
use crate::{MlErr, Result, optimization::Optimizer};

/// A single trainable tensor living inside the flat parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    name: String,
    shape: Vec<usize>,
}

impl ParamSlot {
    /// Creates a new `ParamSlot`.
    ///
    /// # Arguments
    /// * `name` - A human readable name, e.g. `dense0.weight`.
    /// * `shape` - The shape of the tensor.
    ///
    /// # Returns
    /// A new `ParamSlot` instance.
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the amount of scalars in this slot.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns the model's parameters and their gradient as two flat buffers.
///
/// Both buffers are laid out following `slots`, in the order the model's layers
/// are traversed forward. Layers never own their parameters, they get views into
/// these buffers through the `FrontIter` and the `BackIter`.
#[derive(Debug, Clone)]
pub struct ParamManager {
    params: Vec<f32>,
    grad: Vec<f32>,
    slots: Vec<ParamSlot>,
}

impl ParamManager {
    /// Creates a new `ParamManager`.
    ///
    /// # Arguments
    /// * `slots` - The layout of the parameters.
    /// * `params` - The initial value of the parameters.
    ///
    /// # Returns
    /// A new `ParamManager` instance or an error if `params` doesn't match the layout's size.
    pub fn new(slots: Vec<ParamSlot>, params: Vec<f32>) -> Result<Self> {
        let expected = slots.iter().map(ParamSlot::len).sum();

        if params.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "parameters",
                got: params.len(),
                expected,
            });
        }

        Ok(Self {
            grad: vec![0.0; expected],
            params,
            slots,
        })
    }

    /// Creates a new `ParamManager` with every parameter set to zero.
    pub fn zeros(slots: Vec<ParamSlot>) -> Self {
        let len = slots.iter().map(ParamSlot::len).sum();

        Self {
            params: vec![0.0; len],
            grad: vec![0.0; len],
            slots,
        }
    }

    /// Returns the total amount of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    pub fn grad_mut(&mut self) -> &mut [f32] {
        &mut self.grad
    }

    /// Zeros out the gradient.
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    /// Applies the current gradient onto the parameters.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the parameters.
    pub fn optimize<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) -> Result<()> {
        optimizer.update_params(&mut self.params, &self.grad)
    }

    /// Creates a new `FrontIter` parameter iterator.
    ///
    /// The returned iterator iterates the model's layers forward.
    pub fn front(&self) -> FrontIter<'_> {
        FrontIter {
            params: &self.params,
        }
    }

    /// Creates a new `BackIter` parameter iterator.
    ///
    /// The returned iterator iterates the model's layers backwards.
    pub fn back(&mut self) -> BackIter<'_> {
        BackIter {
            params: &self.params,
            grad: &mut self.grad,
        }
    }
}

impl GradientSlots for ParamManager {
    fn grad_slots(&self) -> Vec<&[f32]> {
        let mut rest = self.grad.as_slice();

        self.slots
            .iter()
            .map(|slot| {
                let (head, tail) = rest.split_at(slot.len());
                rest = tail;
                head
            })
            .collect()
    }

    fn grad_slots_mut(&mut self) -> Vec<&mut [f32]> {
        let mut rest = self.grad.as_mut_slice();

        self.slots
            .iter()
            .map(|slot| {
                let (head, tail) = mem::take(&mut rest).split_at_mut(slot.len());
                rest = tail;
                head
            })
            .collect()
    }
}

/// A model's layer iterator.
///
/// This iterator iterates the layers of a model from the front.
pub struct FrontIter<'pm> {
    params: &'pm [f32],
}

impl<'pm> FrontIter<'pm> {
    /// Takes the next `n` parameters.
    ///
    /// # Returns
    /// A slice of parameters or `None` if there are less than `n` left.
    pub fn take(&mut self, n: usize) -> Option<&'pm [f32]> {
        if n > self.params.len() {
            return None;
        }

        let (head, tail) = self.params.split_at(n);
        self.params = tail;
        Some(head)
    }
}

/// A model's layer iterator.
///
/// This iterator iterates the layers of a model from the back.
pub struct BackIter<'pm> {
    params: &'pm [f32],
    grad: &'pm mut [f32],
}

impl<'pm> BackIter<'pm> {
    /// Takes the last `n` parameters and their gradient.
    ///
    /// # Returns
    /// A tuple of parameters and gradient or `None` if there are less than `n` left.
    pub fn take(&mut self, n: usize) -> Option<(&'pm [f32], &'pm mut [f32])> {
        let len = self.params.len();
        if n > len {
            return None;
        }

        let (params, params_tail) = self.params.split_at(len - n);
        let (grad, grad_tail) = mem::take(&mut self.grad).split_at_mut(len - n);
        self.params = params;
        self.grad = grad;

        Some((params_tail, grad_tail))
    }
}
