//! Tree edit distance kernels and the cost models that drive them.

pub mod apted;
pub mod zhang_shasha;

use crate::parsing::ParsedTree;
pub use apted::Apted;

/// Single-node edit costs consumed by the distance algorithms.
///
/// Implementations must return non-negative costs; the dynamic programs
/// only add and take minima, so a negative cost silently produces a
/// meaningless distance.
pub trait CostModel {
    type Data;

    /// Cost of deleting a node.
    fn del(&self, n: &Self::Data) -> f64;
    /// Cost of inserting a node.
    fn ins(&self, n: &Self::Data) -> f64;
    /// Cost of renaming `a` into `b`.
    fn ren(&self, a: &Self::Data, b: &Self::Data) -> f64;
}

/// Unit-cost model over string labels: delete and insert cost 1, rename
/// is free for equal labels and costs 1 otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringCostModel;

impl CostModel for StringCostModel {
    type Data = String;

    fn del(&self, _n: &String) -> f64 {
        1.0
    }

    fn ins(&self, _n: &String) -> f64 {
        1.0
    }

    fn ren(&self, a: &String, b: &String) -> f64 {
        if a == b {
            0.0
        } else {
            1.0
        }
    }
}

/// Edit distance between two parsed trees under the unit-cost string model.
pub fn edit_distance(t1: &ParsedTree, t2: &ParsedTree) -> f64 {
    let mut apted = Apted::new(StringCostModel);
    apted.compute_edit_distance(t1, t2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_cost_model() {
        let model = StringCostModel;
        let a = "a".to_owned();
        let b = "b".to_owned();
        assert_eq!(model.del(&a), 1.0);
        assert_eq!(model.ins(&b), 1.0);
        assert_eq!(model.ren(&a, &a), 0.0);
        assert_eq!(model.ren(&a, &b), 1.0);
    }
}
