//! Node indexer for the APTED algorithm. For each input tree it
//! precomputes the four traversal orders (left/right pre/postorder),
//! the translations between them, and the per-subtree aggregates the
//! strategy selection and single-path functions depend on.

use crate::ted::CostModel;
use indextree::{Arena, NodeId};

/// Precomputed indices of one input tree.
///
/// Nodes are identified by their left-to-right preorder id (`preL`)
/// unless an array name says otherwise. Ids are `i32` with `-1` as the
/// null sentinel.
pub struct AptedIndex<'a, D> {
    pub tree_size: i32,

    // structure indices
    pub sizes: Vec<i32>,
    pub parents: Vec<i32>,
    pub children: Vec<Vec<i32>>,

    pub postl_to_lld: Vec<i32>,
    pub postr_to_rld: Vec<i32>,
    /// Nearest leaf strictly before the node in preL order, `-1` if none.
    pub prel_to_ln: Vec<i32>,
    /// Nearest leaf strictly before the node in preR order, `-1` if none.
    pub prer_to_ln: Vec<i32>,

    pub prel_to_label: Vec<&'a D>,
    /// True iff the node is the leftmost child of its parent.
    pub node_type_l: Vec<bool>,
    /// True iff the node is the rightmost child of its parent.
    pub node_type_r: Vec<bool>,

    // traversal translation indices
    pub prel_to_prer: Vec<i32>,
    pub prer_to_prel: Vec<i32>,
    pub prel_to_postl: Vec<i32>,
    pub prel_to_postr: Vec<i32>,
    pub postl_to_prel: Vec<i32>,
    pub postr_to_prel: Vec<i32>,

    // cost indices
    pub prel_to_kr_sum: Vec<i32>,
    pub prel_to_rev_kr_sum: Vec<i32>,
    pub prel_to_desc_sum: Vec<i32>,
    pub prel_to_sum_del_cost: Vec<f64>,
    pub prel_to_sum_ins_cost: Vec<f64>,

    /// Root of the subtree the distance driver is currently scoped to.
    pub current_node: i32,
    /// Number of leaves that are the leftmost child of their parent.
    pub lchl: i32,
    /// Number of leaves that are the rightmost child of their parent.
    pub rchl: i32,
}

impl<'a, D> AptedIndex<'a, D> {
    pub fn new<C: CostModel<Data = D>>(tree: &'a Arena<D>, cost_model: &C) -> Self {
        let n = tree.count();
        assert!(n > 0, "cannot index an empty tree");
        let Some(root) = tree.iter().next() else {
            panic!("Unable to get root but tree is not empty!");
        };
        let root_id = tree.get_node_id(root).unwrap();

        let prel_to_label = root_id
            .descendants(tree)
            .map(|nid| tree.get(nid).unwrap().get())
            .collect();

        let mut index = Self {
            tree_size: n as i32,
            sizes: vec![0; n],
            parents: vec![0; n],
            children: vec![Vec::new(); n],
            postl_to_lld: vec![0; n],
            postr_to_rld: vec![0; n],
            prel_to_ln: vec![0; n],
            prer_to_ln: vec![0; n],
            prel_to_label,
            node_type_l: vec![false; n],
            node_type_r: vec![false; n],
            prel_to_prer: vec![0; n],
            prer_to_prel: vec![0; n],
            prel_to_postl: vec![0; n],
            prel_to_postr: vec![0; n],
            postl_to_prel: vec![0; n],
            postr_to_prel: vec![0; n],
            prel_to_kr_sum: vec![0; n],
            prel_to_rev_kr_sum: vec![0; n],
            prel_to_desc_sum: vec![0; n],
            prel_to_sum_del_cost: vec![0.0; n],
            prel_to_sum_ins_cost: vec![0.0; n],
            current_node: 0,
            lchl: 0,
            rchl: 0,
        };
        index.parents[0] = -1;

        let mut next_preorder = 0;
        index.index_nodes(tree, root_id, -1, &mut next_preorder);
        index.post_traversal_indexing(cost_model);

        index
    }

    /// First pass: recursive pre/postorder walk assigning both preorder
    /// ids, filling the translation arrays and the subtree aggregates.
    /// Returns `(postorder, size - 1, desc_sizes, kr_sum, rev_kr_sum)` of
    /// the subtree just indexed, for the parent to fold in.
    fn index_nodes(
        &mut self,
        tree: &'a Arena<D>,
        nid: NodeId,
        mut postorder: i32,
        next_preorder: &mut i32,
    ) -> (i32, i32, i32, i32, i32) {
        let mut current_size = 0;
        let mut desc_sizes = 0;
        let mut kr_sizes_sum = 0;
        let mut rev_kr_sizes_sum = 0;
        let preorder = *next_preorder;
        *next_preorder += 1;

        let child_nodes: Vec<NodeId> = nid.children(tree).collect();
        let child_count = child_nodes.len();
        for (i, cnid) in child_nodes.into_iter().enumerate() {
            let current_preorder = *next_preorder;
            self.parents[current_preorder as usize] = preorder;

            let (po, c_size, c_desc, c_kr, c_rev_kr) =
                self.index_nodes(tree, cnid, postorder, next_preorder);
            postorder = po;
            self.children[preorder as usize].push(current_preorder);

            current_size += 1 + c_size;
            desc_sizes += c_desc;

            if i > 0 {
                kr_sizes_sum += c_kr + c_size + 1;
            } else {
                kr_sizes_sum += c_kr;
                self.node_type_l[current_preorder as usize] = true;
            }

            if i < child_count - 1 {
                rev_kr_sizes_sum += c_rev_kr + c_size + 1;
            } else {
                rev_kr_sizes_sum += c_rev_kr;
                self.node_type_r[current_preorder as usize] = true;
            }
        }

        postorder += 1;

        let current_desc_sizes = desc_sizes + current_size + 1;

        // n(n+3)/2 counts the ancestor/descendant pairs of a subtree with
        // n nodes. Widen before multiplying; a result that does not fit
        // the index type is fatal.
        let n = i64::from(current_size) + 1;
        let desc_sum = n
            .checked_mul(n + 3)
            .map(|pairs| pairs / 2 - i64::from(current_desc_sizes))
            .and_then(|sum| i32::try_from(sum).ok())
            .unwrap_or_else(|| {
                panic!("desc_sum overflow for subtree of {n} nodes in {}", module_path!())
            });
        self.prel_to_desc_sum[preorder as usize] = desc_sum;
        self.prel_to_kr_sum[preorder as usize] = kr_sizes_sum + current_size + 1;
        self.prel_to_rev_kr_sum[preorder as usize] = rev_kr_sizes_sum + current_size + 1;

        self.sizes[preorder as usize] = current_size + 1;
        let preorder_r = self.tree_size - 1 - postorder;
        self.prel_to_prer[preorder as usize] = preorder_r;
        self.prer_to_prel[preorder_r as usize] = preorder;

        self.postl_to_prel[postorder as usize] = preorder;
        self.prel_to_postl[preorder as usize] = postorder;
        self.prel_to_postr[preorder as usize] = self.tree_size - 1 - preorder;
        self.postr_to_prel[(self.tree_size - 1 - preorder) as usize] = preorder;

        (postorder, current_size, current_desc_sizes, kr_sizes_sum, rev_kr_sizes_sum)
    }

    /// Second pass: one linear sweep whose counter is interpreted as
    /// postL, postR, preL and reverse preL at once, filling the leaf
    /// descendant arrays, the nearest-leaf lists, the subtree cost sums
    /// and the `lchl`/`rchl` counters.
    fn post_traversal_indexing<C: CostModel<Data = D>>(&mut self, cost_model: &C) {
        let tree_size = self.tree_size;
        let mut current_leaf = -1;

        for i in 0..tree_size {
            self.prel_to_ln[i as usize] = current_leaf;
            if self.is_leaf(i) {
                current_leaf = i;
            }

            // Leftmost leaf descendants, the counter taken as postL.
            let postl = i;
            let preorder = self.postl_to_prel[postl as usize];
            if self.sizes[preorder as usize] == 1 {
                self.postl_to_lld[postl as usize] = postl;
            } else {
                let first_child = self.children[preorder as usize][0];
                self.postl_to_lld[postl as usize] =
                    self.postl_to_lld[self.prel_to_postl[first_child as usize] as usize];
            }

            // Rightmost leaf descendants, the counter taken as postR.
            let postr = i;
            let preorder = self.postr_to_prel[postr as usize];
            if self.sizes[preorder as usize] == 1 {
                self.postr_to_rld[postr as usize] = postr;
            } else {
                let last_child = *self.children[preorder as usize].last().unwrap();
                self.postr_to_rld[postr as usize] =
                    self.postr_to_rld[self.prel_to_postr[last_child as usize] as usize];
            }

            // lchl/rchl counters, the counter taken as preL.
            if self.sizes[i as usize] == 1 {
                let parent = self.parents[i as usize];
                if parent > -1 {
                    if parent + 1 == i {
                        self.lchl += 1;
                    } else if self.prel_to_prer[parent as usize] + 1 == self.prel_to_prer[i as usize]
                    {
                        self.rchl += 1;
                    }
                }
            }

            // Subtree cost sums, the counter taken as reverse preL so
            // children are folded before their parents.
            let node_for_sum = (tree_size - i - 1) as usize;
            let parent_for_sum = self.parents[node_for_sum];
            self.prel_to_sum_del_cost[node_for_sum] += cost_model.del(self.prel_to_label[node_for_sum]);
            self.prel_to_sum_ins_cost[node_for_sum] += cost_model.ins(self.prel_to_label[node_for_sum]);
            if parent_for_sum > -1 {
                let del_sum = self.prel_to_sum_del_cost[node_for_sum];
                let ins_sum = self.prel_to_sum_ins_cost[node_for_sum];
                self.prel_to_sum_del_cost[parent_for_sum as usize] += del_sum;
                self.prel_to_sum_ins_cost[parent_for_sum as usize] += ins_sum;
            }
        }

        current_leaf = -1;
        for i in 0..self.sizes[0] {
            self.prer_to_ln[i as usize] = current_leaf;
            if self.is_leaf(self.prer_to_prel[i as usize]) {
                current_leaf = i;
            }
        }
    }

    pub fn get_size(&self) -> i32 {
        self.tree_size
    }

    pub fn is_leaf(&self, node: i32) -> bool {
        self.sizes[node as usize] == 1
    }

    /// preL of the leftmost leaf descendant of a node given in preL.
    pub fn prel_to_lld(&self, prel: i32) -> i32 {
        self.postl_to_prel[self.postl_to_lld[self.prel_to_postl[prel as usize] as usize] as usize]
    }

    /// preL of the rightmost leaf descendant of a node given in preL.
    pub fn prel_to_rld(&self, prel: i32) -> i32 {
        self.postr_to_prel[self.postr_to_rld[self.prel_to_postr[prel as usize] as usize] as usize]
    }

    pub fn postl_to_label(&self, postl: i32) -> &'a D {
        self.prel_to_label[self.postl_to_prel[postl as usize] as usize]
    }

    pub fn postr_to_label(&self, postr: i32) -> &'a D {
        self.prel_to_label[self.postr_to_prel[postr as usize] as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_tree;
    use crate::ted::StringCostModel;

    #[test]
    fn test_three_node_tree() {
        let tree = parse_tree("{a{b}{c}}").unwrap();
        let idx = AptedIndex::new(&tree, &StringCostModel);

        assert_eq!(idx.tree_size, 3);
        assert_eq!(idx.sizes, vec![3, 1, 1]);
        assert_eq!(idx.parents, vec![-1, 0, 0]);
        assert_eq!(idx.children, vec![vec![1, 2], vec![], vec![]]);

        assert_eq!(idx.prel_to_postl, vec![2, 0, 1]);
        assert_eq!(idx.postl_to_prel, vec![1, 2, 0]);
        assert_eq!(idx.prel_to_prer, vec![0, 2, 1]);
        assert_eq!(idx.prer_to_prel, vec![0, 2, 1]);
        assert_eq!(idx.prel_to_postr, vec![2, 1, 0]);
        assert_eq!(idx.postr_to_prel, vec![2, 1, 0]);

        assert_eq!(idx.postl_to_lld, vec![0, 1, 0]);
        assert_eq!(idx.postr_to_rld, vec![0, 1, 0]);
        assert_eq!(idx.prel_to_ln, vec![-1, -1, 1]);
        assert_eq!(idx.prer_to_ln, vec![-1, -1, 1]);

        assert_eq!(idx.node_type_l, vec![false, true, false]);
        assert_eq!(idx.node_type_r, vec![false, false, true]);

        assert_eq!(idx.prel_to_kr_sum, vec![4, 1, 1]);
        assert_eq!(idx.prel_to_rev_kr_sum, vec![4, 1, 1]);
        assert_eq!(idx.prel_to_desc_sum, vec![4, 1, 1]);

        assert_eq!(idx.prel_to_sum_del_cost, vec![3.0, 1.0, 1.0]);
        assert_eq!(idx.prel_to_sum_ins_cost, vec![3.0, 1.0, 1.0]);

        assert_eq!(idx.lchl, 1);
        assert_eq!(idx.rchl, 1);

        assert_eq!(idx.prel_to_lld(0), 1);
        assert_eq!(idx.prel_to_rld(0), 2);
    }

    #[test]
    fn test_translation_arrays_are_mutual_inverses() {
        let tree = parse_tree("{a{b{e}{f}}{c{g}}{d{h}{i}}}").unwrap();
        let idx = AptedIndex::new(&tree, &StringCostModel);

        for v in 0..idx.tree_size {
            let vu = v as usize;
            assert_eq!(idx.prer_to_prel[idx.prel_to_prer[vu] as usize], v);
            assert_eq!(idx.postl_to_prel[idx.prel_to_postl[vu] as usize], v);
            assert_eq!(idx.postr_to_prel[idx.prel_to_postr[vu] as usize], v);
            assert_eq!(idx.prel_to_prer[idx.prer_to_prel[vu] as usize], v);
            assert_eq!(idx.prel_to_postl[idx.postl_to_prel[vu] as usize], v);
            assert_eq!(idx.prel_to_postr[idx.postr_to_prel[vu] as usize], v);
        }
    }

    #[test]
    fn test_sizes_sum_consistently() {
        let inputs = [
            "{a}",
            "{f{d{a}{c{b}}}{e}}",
            "{a{b{e}{f}}{c{g}}{d{h}{i}}}",
            "{x{x{x{x{x}}}}}",
        ];
        for input in inputs {
            let tree = parse_tree(input).unwrap();
            let idx = AptedIndex::new(&tree, &StringCostModel);
            for v in 0..idx.tree_size {
                let children_sum: i32 = idx.children[v as usize]
                    .iter()
                    .map(|&c| idx.sizes[c as usize])
                    .sum();
                assert_eq!(idx.sizes[v as usize], 1 + children_sum, "node {v} of {input}");
            }
        }
    }

    #[test]
    fn test_cost_sums_recurse() {
        let tree = parse_tree("{f{d{a}{c{b}}}{e}}").unwrap();
        let idx = AptedIndex::new(&tree, &StringCostModel);
        let model = StringCostModel;

        for v in 0..idx.tree_size {
            let vu = v as usize;
            let del_children: f64 = idx.children[vu]
                .iter()
                .map(|&c| idx.prel_to_sum_del_cost[c as usize])
                .sum();
            let ins_children: f64 = idx.children[vu]
                .iter()
                .map(|&c| idx.prel_to_sum_ins_cost[c as usize])
                .sum();
            assert_eq!(
                idx.prel_to_sum_del_cost[vu],
                model.del(idx.prel_to_label[vu]) + del_children
            );
            assert_eq!(
                idx.prel_to_sum_ins_cost[vu],
                model.ins(idx.prel_to_label[vu]) + ins_children
            );
        }
    }

    #[test]
    fn test_nine_node_tree_counters() {
        let tree = parse_tree("{a{b{e}{f}}{c{g}}{d{h}{i}}}").unwrap();
        let idx = AptedIndex::new(&tree, &StringCostModel);

        // Leaves e, g, h are leftmost children; f and i are rightmost.
        assert_eq!(idx.lchl, 3);
        assert_eq!(idx.rchl, 2);

        // Root lld is leaf "e" (preL 2), rld is leaf "i" (preL 8).
        assert_eq!(idx.prel_to_lld(0), 2);
        assert_eq!(idx.prel_to_rld(0), 8);
    }
}
