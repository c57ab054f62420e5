use ndarray::{ArrayD, Axis};

use crate::ndlist::NdArray;

/// Element types a score tensor can carry, compared in their own precision.
pub(crate) trait Score: Copy + PartialOrd {
    fn is_nan(self) -> bool {
        false
    }
}

impl Score for f32 {
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

impl Score for f64 {
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

impl Score for i64 {}

impl Score for i32 {}

/// Index of the largest score, first occurrence on ties.
///
/// A NaN compares above every number, so the first NaN in the row wins.
/// Returns `None` for an empty row.
pub(crate) fn argmax<'a, T: Score + 'a>(row: impl IntoIterator<Item = &'a T>) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, &value) in row.into_iter().enumerate() {
        match best {
            Some((_, current)) if current.is_nan() || !(value.is_nan() || value > current) => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

/// Argmax along the last axis of `scores`, one entry per lane in logical
/// (row-major) order of the leading axes.
pub(crate) fn argmax_lanes(scores: &NdArray) -> Vec<Option<usize>> {
    match scores {
        NdArray::Int64(a) => lanes(a),
        NdArray::Int32(a) => lanes(a),
        NdArray::Float32(a) => lanes(a),
        NdArray::Float64(a) => lanes(a),
    }
}

fn lanes<T: Score>(scores: &ArrayD<T>) -> Vec<Option<usize>> {
    match scores.ndim() {
        0 => Vec::new(),
        n => scores.lanes(Axis(n - 1)).into_iter().map(|lane| argmax(lane)).collect(),
    }
}
