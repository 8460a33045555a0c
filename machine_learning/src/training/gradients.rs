//! Moving gradients between a model's per-parameter slots and a single flat vector.

use crate::{MlErr, Result};

/// Gives access to the gradient of every trainable tensor of a model.
///
/// Implementations must always yield the slots in the same order, since the flat
/// gradient vector is only meaningful relative to that ordering.
pub trait GradientSlots {
    /// Returns a view of each gradient slot, in a stable order.
    fn grad_slots(&self) -> Vec<&[f32]>;

    /// Returns a mutable view of each gradient slot, in the same order as `grad_slots`.
    fn grad_slots_mut(&mut self) -> Vec<&mut [f32]>;
}

/// Flattens the model's current gradient into a single vector.
///
/// # Arguments
/// * `model` - The model to read the gradient from.
///
/// # Returns
/// The concatenation of every gradient slot.
pub fn flatten_grads<G: GradientSlots + ?Sized>(model: &G) -> Vec<f32> {
    let mut flat = Vec::new();
    flatten_grads_into(model, &mut flat);
    flat
}

/// Same as `flatten_grads` but reuses `out`'s allocation.
pub fn flatten_grads_into<G: GradientSlots + ?Sized>(model: &G, out: &mut Vec<f32>) {
    out.clear();

    for slot in model.grad_slots() {
        out.extend_from_slice(slot);
    }
}

/// Writes a full length flat gradient back into the model's gradient slots.
///
/// # Arguments
/// * `grads` - The flat gradient, as produced by `flatten_grads`.
/// * `model` - The model whose gradient is going to be overwritten.
///
/// # Returns
/// An error if the length of `grads` doesn't match the amount of parameters of the model.
pub fn distribute_grads<G: GradientSlots + ?Sized>(grads: &[f32], model: &mut G) -> Result<()> {
    let mut slots = model.grad_slots_mut();
    let expected = slots.iter().map(|s| s.len()).sum();

    if grads.len() != expected {
        return Err(MlErr::SizeMismatch {
            what: "flat gradient",
            got: grads.len(),
            expected,
        });
    }

    let mut rest = grads;
    for slot in slots.iter_mut() {
        let (head, tail) = rest.split_at(slot.len());
        slot.copy_from_slice(head);
        rest = tail;
    }

    Ok(())
}

/// Writes a sparse gradient into the model's gradient slots.
///
/// Every entry not named in `indices` is set to zero.
///
/// # Arguments
/// * `values` - The gradient values that are present.
/// * `indices` - The position of each value in the flat gradient.
/// * `model` - The model whose gradient is going to be overwritten.
///
/// # Returns
/// An error if `values` and `indices` differ in length or any index is out of range.
pub fn distribute_sparse_grads<G: GradientSlots + ?Sized>(
    values: &[f32],
    indices: &[usize],
    model: &mut G,
) -> Result<()> {
    if values.len() != indices.len() {
        return Err(MlErr::SizeMismatch {
            what: "sparse gradient indices",
            got: indices.len(),
            expected: values.len(),
        });
    }

    let mut slots = model.grad_slots_mut();

    // offsets[i] is the flat index of the first element of slot i.
    let mut offsets = Vec::with_capacity(slots.len());
    let mut len = 0;
    for slot in slots.iter() {
        offsets.push(len);
        len += slot.len();
    }

    if let Some(&index) = indices.iter().find(|&&i| i >= len) {
        return Err(MlErr::IndexOutOfBounds {
            what: "flat gradient",
            index,
            len,
        });
    }

    for slot in slots.iter_mut() {
        slot.fill(0.0);
    }

    for (&value, &index) in values.iter().zip(indices) {
        let slot = offsets.partition_point(|&start| start <= index) - 1;
        slots[slot][index - offsets[slot]] = value;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ParamManager, ParamSlot};

    fn model() -> ParamManager {
        let slots = vec![
            ParamSlot::new("dense0.weight", vec![2, 3]),
            ParamSlot::new("dense0.bias", vec![3]),
            ParamSlot::new("dense1.weight", vec![3, 1]),
            ParamSlot::new("dense1.bias", vec![1]),
        ];

        let mut model = ParamManager::zeros(slots);
        for (i, g) in model.grad_mut().iter_mut().enumerate() {
            *g = (i as f32 * 0.37).sin();
        }

        model
    }

    #[test]
    fn flatten_follows_slot_order() {
        let model = model();
        assert_eq!(flatten_grads(&model), model.grad());
    }

    #[test]
    fn distribute_of_extract_is_identity() {
        let mut model = model();
        let before = flatten_grads(&model);

        distribute_grads(&before, &mut model).unwrap();
        assert_eq!(flatten_grads(&model), before);
    }

    #[test]
    fn distribute_overwrites_every_slot() {
        let mut model = model();
        let grads: Vec<f32> = (0..model.len()).map(|i| i as f32).collect();

        distribute_grads(&grads, &mut model).unwrap();

        let slots = model.grad_slots();
        assert_eq!(slots[0], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(slots[1], &[6.0, 7.0, 8.0]);
        assert_eq!(slots[2], &[9.0, 10.0, 11.0]);
        assert_eq!(slots[3], &[12.0]);
    }

    #[test]
    fn distribute_rejects_wrong_length() {
        let mut model = model();
        let err = distribute_grads(&[1.0; 3], &mut model).unwrap_err();
        assert!(matches!(
            err,
            MlErr::SizeMismatch {
                got: 3,
                expected: 13,
                ..
            }
        ));
    }

    #[test]
    fn sparse_distribute_zero_fills_missing_entries() {
        let mut model = model();

        distribute_sparse_grads(&[1.5, -2.0, 4.0], &[12, 0, 7], &mut model).unwrap();

        let mut expected = vec![0.0; 13];
        expected[0] = -2.0;
        expected[7] = 4.0;
        expected[12] = 1.5;
        assert_eq!(flatten_grads(&model), expected);
    }

    #[test]
    fn sparse_distribute_rejects_bad_input() {
        let mut model = model();

        assert!(distribute_sparse_grads(&[1.0], &[13], &mut model).is_err());
        assert!(distribute_sparse_grads(&[1.0, 2.0], &[0], &mut model).is_err());
    }

    #[test]
    fn sparse_distribute_leaves_grads_untouched_on_error() {
        let mut model = model();
        let before = flatten_grads(&model);

        let err = distribute_sparse_grads(&[1.0, 2.0], &[3, 13], &mut model).unwrap_err();
        assert!(matches!(
            err,
            MlErr::IndexOutOfBounds {
                index: 13,
                len: 13,
                ..
            }
        ));
        assert_eq!(flatten_grads(&model), before);
    }
}
