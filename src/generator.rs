//! Random bracket-notation tree generator for test inputs. Seedable so
//! generated fixtures are reproducible.

use crate::parsing::tree_to_string;
use indextree::Arena;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

pub struct TreeGenerator {
    rng: Xoshiro256PlusPlus,
}

impl TreeGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    fn random_label(&mut self) -> char {
        (b'a' + self.rng.gen_range(0..26)) as char
    }

    /// Random tree in bracket notation with at most `depth` levels below
    /// the root; every node gets zero to two children.
    pub fn bracket_tree(&mut self, depth: u32) -> String {
        let label = self.random_label();
        self.subtree(depth, label)
    }

    fn subtree(&mut self, depth: u32, label: char) -> String {
        let mut tree = String::from("{");
        tree.push(label);

        if depth > 0 {
            let num_children = self.rng.gen_range(0..3);
            for _ in 0..num_children {
                let child_label = self.random_label();
                let child = self.subtree(depth - 1, child_label);
                tree.push_str(&child);
            }
        }

        tree.push('}');
        tree
    }

    /// Random tree with exactly `num_nodes` nodes, grown by attaching
    /// each new node under a uniformly chosen existing one.
    pub fn bracket_tree_with_nodes(&mut self, num_nodes: usize) -> String {
        assert!(num_nodes > 0, "a tree needs at least its root");

        let mut tree = Arena::new();
        let root = tree.new_node(self.random_label().to_string());
        let mut nodes = vec![root];
        for _ in 1..num_nodes {
            let parent = nodes[self.rng.gen_range(0..nodes.len())];
            let node = tree.new_node(self.random_label().to_string());
            parent.append(node, &mut tree);
            nodes.push(node);
        }

        tree_to_string(&tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_tree;

    #[test]
    fn test_generated_trees_parse() {
        let mut generator = TreeGenerator::with_seed(42);
        for _ in 0..50 {
            let bracket = generator.bracket_tree(4);
            let tree = parse_tree(&bracket).expect("generated tree must parse");
            assert!(tree.count() >= 1);
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let mut first = TreeGenerator::with_seed(7);
        let mut second = TreeGenerator::with_seed(7);
        for _ in 0..10 {
            assert_eq!(first.bracket_tree(3), second.bracket_tree(3));
        }
    }

    #[test]
    fn test_exact_node_count() {
        let mut generator = TreeGenerator::with_seed(99);
        for n in 1..30 {
            let bracket = generator.bracket_tree_with_nodes(n);
            let tree = parse_tree(&bracket).unwrap();
            assert_eq!(tree.count(), n);
        }
    }

    #[test]
    fn test_depth_bound_is_respected() {
        let mut generator = TreeGenerator::with_seed(5);
        for _ in 0..20 {
            let bracket = generator.bracket_tree(2);
            // Depth 2 means at most 3 levels, so at most 3 nested braces.
            let mut depth = 0usize;
            let mut max_depth = 0usize;
            for b in bracket.bytes() {
                match b {
                    b'{' => {
                        depth += 1;
                        max_depth = max_depth.max(depth);
                    }
                    b'}' => depth -= 1,
                    _ => {}
                }
            }
            assert!(max_depth <= 3);
        }
    }
}
