//! All-path tree edit distance after Pawlik and Augsten.
//!
//! For every pair of subtrees an optimal root-leaf strategy path is
//! selected up front; the distance is then computed by single-path
//! functions recursing along those paths, sharing one `delta` memo of
//! subtree-pair distances.
//!
//! References:
//! [1] M. Pawlik and N. Augsten. Efficient Computation of the Tree Edit
//!     Distance. ACM Transactions on Database Systems (TODS) 40(1). 2015.
//! [2] M. Pawlik and N. Augsten. Tree edit distance: Robust and memory-
//!     efficient. Information Systems 56. 2016.

use crate::indexing::AptedIndex;
use crate::ted::CostModel;
use indextree::Arena;

const LEFT: i32 = 0;
const RIGHT: i32 = 1;
const INNER: i32 = 2;

/// The APTED algorithm over a caller-provided cost model.
///
/// `delta` is keyed by (preL of tree 1, preL of tree 2). During the
/// strategy phase each entry holds an encoded path id; the single-path
/// functions later overwrite subtree-aligned entries with the true
/// distance of that pair. The two phases are strictly sequential, so the
/// storage is shared.
pub struct Apted<C: CostModel> {
    cost_model: C,
    delta: Vec<Vec<f64>>,
    q: Vec<f64>,
    /// Next live position in the inner tree's forest order, dense
    /// array-backed linked list. The extra last slot heads the list.
    fnext: Vec<i32>,
    /// First live position after a node, companion of `fnext`.
    ftop: Vec<i32>,
}

impl<C: CostModel> Apted<C> {
    pub fn new(cost_model: C) -> Self {
        Self {
            cost_model,
            delta: Vec::new(),
            q: Vec::new(),
            fnext: Vec::new(),
            ftop: Vec::new(),
        }
    }

    /// Computes the tree edit distance between two trees.
    pub fn compute_edit_distance(&mut self, t1: &Arena<C::Data>, t2: &Arena<C::Data>) -> f64 {
        let mut it1 = AptedIndex::new(t1, &self.cost_model);
        let mut it2 = AptedIndex::new(t2, &self.cost_model);

        // Sweep direction heuristic of [2, Section 5.3].
        if it1.lchl < it1.rchl {
            self.compute_opt_strategy_post_l(&it1, &it2);
        } else {
            self.compute_opt_strategy_post_r(&it1, &it2);
        }
        self.ted_init(&it1, &it2);
        self.gted(&mut it1, &mut it2)
    }

    /// Left-to-right postorder strategy sweep. The rolling cost rows of
    /// tree 1 are keyed by postL ids so a parent's row can be reused the
    /// moment its last child is done.
    fn compute_opt_strategy_post_l(&mut self, it1: &AptedIndex<C::Data>, it2: &AptedIndex<C::Data>) {
        let size1 = it1.tree_size;
        let size2 = it2.tree_size;
        self.delta = vec![vec![0.0; size2 as usize]; size1 as usize];

        let mut cost1_l: Vec<Vec<f64>> = vec![Vec::new(); size1 as usize];
        let mut cost1_r: Vec<Vec<f64>> = vec![Vec::new(); size1 as usize];
        let mut cost1_i: Vec<Vec<f64>> = vec![Vec::new(); size1 as usize];
        let mut cost2_l = vec![0.0f64; size2 as usize];
        let mut cost2_r = vec![0.0f64; size2 as usize];
        let mut cost2_i = vec![0.0f64; size2 as usize];
        let mut cost2_path = vec![0i32; size2 as usize];
        let path_id_offset = size1;

        let mut rows_to_reuse_l: Vec<Vec<f64>> = Vec::new();
        let mut rows_to_reuse_r: Vec<Vec<f64>> = Vec::new();
        let mut rows_to_reuse_i: Vec<Vec<f64>> = Vec::new();

        for v in 0..size1 {
            let vu = v as usize;
            let v_in_prel = it1.postl_to_prel[vu];
            let vp = v_in_prel as usize;

            let is_v_leaf = it1.is_leaf(v_in_prel);
            let parent_v_prel = it1.parents[vp];
            let parent_v_postl = if parent_v_prel == -1 {
                -1
            } else {
                it1.prel_to_postl[parent_v_prel as usize]
            };

            let size_v = it1.sizes[vp];
            let left_path_v =
                -(it1.prer_to_prel[(it1.prel_to_prer[vp] + size_v - 1) as usize] + 1);
            let right_path_v = v_in_prel + size_v - 1 + 1;
            let kr_sum_v = it1.prel_to_kr_sum[vp];
            let rev_kr_sum_v = it1.prel_to_rev_kr_sum[vp];
            let desc_sum_v = it1.prel_to_desc_sum[vp];

            if is_v_leaf {
                cost1_l[vu] = vec![0.0; size2 as usize];
                cost1_r[vu] = vec![0.0; size2 as usize];
                cost1_i[vu] = vec![0.0; size2 as usize];
                for i in 0..size2 {
                    self.delta[vp][it2.postl_to_prel[i as usize] as usize] = v_in_prel as f64;
                }
            }

            if parent_v_prel != -1 && cost1_l[parent_v_postl as usize].is_empty() {
                let pu = parent_v_postl as usize;
                if rows_to_reuse_l.is_empty() {
                    cost1_l[pu] = vec![0.0; size2 as usize];
                    cost1_r[pu] = vec![0.0; size2 as usize];
                    cost1_i[pu] = vec![0.0; size2 as usize];
                } else {
                    cost1_l[pu] = rows_to_reuse_l.pop().unwrap();
                    cost1_r[pu] = rows_to_reuse_r.pop().unwrap();
                    cost1_i[pu] = rows_to_reuse_i.pop().unwrap();
                }
            }

            cost2_l.fill(0.0);
            cost2_r.fill(0.0);
            cost2_i.fill(0.0);
            cost2_path.fill(0);

            for w in 0..size2 {
                let wu = w as usize;
                let w_in_prel = it2.postl_to_prel[wu];
                let wp = w_in_prel as usize;

                let parent_w_prel = it2.parents[wp];
                let parent_w_postl = if parent_w_prel == -1 {
                    -1
                } else {
                    it2.prel_to_postl[parent_w_prel as usize]
                };

                let size_w = it2.sizes[wp];
                if it2.is_leaf(w_in_prel) {
                    cost2_l[wu] = 0.0;
                    cost2_r[wu] = 0.0;
                    cost2_i[wu] = 0.0;
                    cost2_path[wu] = w_in_prel;
                }

                let mut min_cost = f64::INFINITY;
                let mut strategy_path = -1i32;

                if size_v <= 1 || size_w <= 1 {
                    min_cost = size_v.max(size_w) as f64;
                } else {
                    let mut tmp_cost =
                        size_v as f64 * it2.prel_to_kr_sum[wp] as f64 + cost1_l[vu][wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = left_path_v;
                    }
                    tmp_cost = size_v as f64 * it2.prel_to_rev_kr_sum[wp] as f64 + cost1_r[vu][wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = right_path_v;
                    }
                    tmp_cost = size_v as f64 * it2.prel_to_desc_sum[wp] as f64 + cost1_i[vu][wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = self.delta[vp][wp] as i32 + 1;
                    }
                    tmp_cost = size_w as f64 * kr_sum_v as f64 + cost2_l[wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = -(it2.prer_to_prel
                            [(it2.prel_to_prer[wp] + size_w - 1) as usize]
                            + path_id_offset
                            + 1);
                    }
                    tmp_cost = size_w as f64 * rev_kr_sum_v as f64 + cost2_r[wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = w_in_prel + size_w - 1 + path_id_offset + 1;
                    }
                    tmp_cost = size_w as f64 * desc_sum_v as f64 + cost2_i[wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = cost2_path[wu] + path_id_offset + 1;
                    }
                }

                if parent_v_prel != -1 {
                    let pu = parent_v_postl as usize;
                    cost1_r[pu][wu] += min_cost;
                    let tmp_cost = -min_cost + cost1_i[vu][wu];
                    if tmp_cost < cost1_i[pu][wu] {
                        cost1_i[pu][wu] = tmp_cost;
                        let tag = self.delta[vp][wp];
                        self.delta[parent_v_prel as usize][wp] = tag;
                    }
                    if it1.node_type_r[vp] {
                        cost1_i[pu][wu] += cost1_r[pu][wu];
                        let carry = cost1_r[vu][wu] - min_cost;
                        cost1_r[pu][wu] += carry;
                    }
                    if it1.node_type_l[vp] {
                        let carry = cost1_l[vu][wu];
                        cost1_l[pu][wu] += carry;
                    } else {
                        cost1_l[pu][wu] += min_cost;
                    }
                }
                if parent_w_prel != -1 {
                    let pw = parent_w_postl as usize;
                    cost2_r[pw] += min_cost;
                    let tmp_cost = -min_cost + cost2_i[wu];
                    if tmp_cost < cost2_i[pw] {
                        cost2_i[pw] = tmp_cost;
                        cost2_path[pw] = cost2_path[wu];
                    }
                    if it2.node_type_r[wp] {
                        cost2_i[pw] += cost2_r[pw];
                        let carry = cost2_r[wu] - min_cost;
                        cost2_r[pw] += carry;
                    }
                    if it2.node_type_l[wp] {
                        let carry = cost2_l[wu];
                        cost2_l[pw] += carry;
                    } else {
                        cost2_l[pw] += min_cost;
                    }
                }

                self.delta[vp][wp] = strategy_path as f64;
            }

            if !is_v_leaf {
                cost1_l[vu].fill(0.0);
                cost1_r[vu].fill(0.0);
                cost1_i[vu].fill(0.0);
                rows_to_reuse_l.push(std::mem::take(&mut cost1_l[vu]));
                rows_to_reuse_r.push(std::mem::take(&mut cost1_r[vu]));
                rows_to_reuse_i.push(std::mem::take(&mut cost1_i[vu]));
            }
        }
    }

    /// Right-to-left preorder strategy sweep; the mirror of
    /// `compute_opt_strategy_post_l` with the rolling rows keyed by preL.
    fn compute_opt_strategy_post_r(&mut self, it1: &AptedIndex<C::Data>, it2: &AptedIndex<C::Data>) {
        let size1 = it1.tree_size;
        let size2 = it2.tree_size;
        self.delta = vec![vec![0.0; size2 as usize]; size1 as usize];

        let mut cost1_l: Vec<Vec<f64>> = vec![Vec::new(); size1 as usize];
        let mut cost1_r: Vec<Vec<f64>> = vec![Vec::new(); size1 as usize];
        let mut cost1_i: Vec<Vec<f64>> = vec![Vec::new(); size1 as usize];
        let mut cost2_l = vec![0.0f64; size2 as usize];
        let mut cost2_r = vec![0.0f64; size2 as usize];
        let mut cost2_i = vec![0.0f64; size2 as usize];
        let mut cost2_path = vec![0i32; size2 as usize];
        let path_id_offset = size1;

        let mut rows_to_reuse_l: Vec<Vec<f64>> = Vec::new();
        let mut rows_to_reuse_r: Vec<Vec<f64>> = Vec::new();
        let mut rows_to_reuse_i: Vec<Vec<f64>> = Vec::new();

        for v in (0..size1).rev() {
            let vu = v as usize;
            let is_v_leaf = it1.is_leaf(v);
            let parent_v = it1.parents[vu];

            let size_v = it1.sizes[vu];
            let left_path_v =
                -(it1.prer_to_prel[(it1.prel_to_prer[vu] + size_v - 1) as usize] + 1);
            let right_path_v = v + size_v - 1 + 1;
            let kr_sum_v = it1.prel_to_kr_sum[vu];
            let rev_kr_sum_v = it1.prel_to_rev_kr_sum[vu];
            let desc_sum_v = it1.prel_to_desc_sum[vu];

            if is_v_leaf {
                cost1_l[vu] = vec![0.0; size2 as usize];
                cost1_r[vu] = vec![0.0; size2 as usize];
                cost1_i[vu] = vec![0.0; size2 as usize];
                for i in 0..size2 as usize {
                    self.delta[vu][i] = v as f64;
                }
            }

            if parent_v != -1 && cost1_l[parent_v as usize].is_empty() {
                let pu = parent_v as usize;
                if rows_to_reuse_l.is_empty() {
                    cost1_l[pu] = vec![0.0; size2 as usize];
                    cost1_r[pu] = vec![0.0; size2 as usize];
                    cost1_i[pu] = vec![0.0; size2 as usize];
                } else {
                    cost1_l[pu] = rows_to_reuse_l.pop().unwrap();
                    cost1_r[pu] = rows_to_reuse_r.pop().unwrap();
                    cost1_i[pu] = rows_to_reuse_i.pop().unwrap();
                }
            }

            cost2_l.fill(0.0);
            cost2_r.fill(0.0);
            cost2_i.fill(0.0);
            cost2_path.fill(0);

            for w in (0..size2).rev() {
                let wu = w as usize;
                let size_w = it2.sizes[wu];
                if it2.is_leaf(w) {
                    cost2_l[wu] = 0.0;
                    cost2_r[wu] = 0.0;
                    cost2_i[wu] = 0.0;
                    cost2_path[wu] = w;
                }

                let mut min_cost = f64::INFINITY;
                let mut strategy_path = -1i32;

                if size_v <= 1 || size_w <= 1 {
                    min_cost = size_v.max(size_w) as f64;
                } else {
                    let mut tmp_cost =
                        size_v as f64 * it2.prel_to_kr_sum[wu] as f64 + cost1_l[vu][wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = left_path_v;
                    }
                    tmp_cost = size_v as f64 * it2.prel_to_rev_kr_sum[wu] as f64 + cost1_r[vu][wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = right_path_v;
                    }
                    tmp_cost = size_v as f64 * it2.prel_to_desc_sum[wu] as f64 + cost1_i[vu][wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = self.delta[vu][wu] as i32 + 1;
                    }
                    tmp_cost = size_w as f64 * kr_sum_v as f64 + cost2_l[wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = -(it2.prer_to_prel
                            [(it2.prel_to_prer[wu] + size_w - 1) as usize]
                            + path_id_offset
                            + 1);
                    }
                    tmp_cost = size_w as f64 * rev_kr_sum_v as f64 + cost2_r[wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = w + size_w - 1 + path_id_offset + 1;
                    }
                    tmp_cost = size_w as f64 * desc_sum_v as f64 + cost2_i[wu];
                    if tmp_cost < min_cost {
                        min_cost = tmp_cost;
                        strategy_path = cost2_path[wu] + path_id_offset + 1;
                    }
                }

                if parent_v != -1 {
                    let pu = parent_v as usize;
                    cost1_l[pu][wu] += min_cost;
                    let tmp_cost = -min_cost + cost1_i[vu][wu];
                    if tmp_cost < cost1_i[pu][wu] {
                        cost1_i[pu][wu] = tmp_cost;
                        let tag = self.delta[vu][wu];
                        self.delta[pu][wu] = tag;
                    }
                    if it1.node_type_l[vu] {
                        cost1_i[pu][wu] += cost1_l[pu][wu];
                        let carry = cost1_l[vu][wu] - min_cost;
                        cost1_l[pu][wu] += carry;
                    }
                    if it1.node_type_r[vu] {
                        let carry = cost1_r[vu][wu];
                        cost1_r[pu][wu] += carry;
                    } else {
                        cost1_r[pu][wu] += min_cost;
                    }
                }
                let parent_w = it2.parents[wu];
                if parent_w != -1 {
                    let pw = parent_w as usize;
                    cost2_l[pw] += min_cost;
                    let tmp_cost = -min_cost + cost2_i[wu];
                    if tmp_cost < cost2_i[pw] {
                        cost2_i[pw] = tmp_cost;
                        cost2_path[pw] = cost2_path[wu];
                    }
                    if it2.node_type_l[wu] {
                        cost2_i[pw] += cost2_l[pw];
                        let carry = cost2_l[wu] - min_cost;
                        cost2_l[pw] += carry;
                    }
                    if it2.node_type_r[wu] {
                        let carry = cost2_r[wu];
                        cost2_r[pw] += carry;
                    } else {
                        cost2_r[pw] += min_cost;
                    }
                }

                self.delta[vu][wu] = strategy_path as f64;
            }

            if !is_v_leaf {
                cost1_l[vu].fill(0.0);
                cost1_r[vu].fill(0.0);
                cost1_i[vu].fill(0.0);
                rows_to_reuse_l.push(std::mem::take(&mut cost1_l[vu]));
                rows_to_reuse_r.push(std::mem::take(&mut cost1_r[vu]));
                rows_to_reuse_i.push(std::mem::take(&mut cost1_i[vu]));
            }
        }
    }

    /// Sizes the scratch arrays and seeds `delta` with the closed-form
    /// distances of all pairs where either subtree is a single node,
    /// without the root nodes themselves.
    fn ted_init(&mut self, it1: &AptedIndex<C::Data>, it2: &AptedIndex<C::Data>) {
        let size1 = it1.tree_size;
        let size2 = it2.tree_size;
        let max_size = size1.max(size2) + 1;

        self.q = vec![0.0; max_size as usize];
        self.fnext = vec![-1; max_size as usize + 1];
        self.ftop = vec![-1; max_size as usize + 1];

        for x in 0..size1 {
            let xu = x as usize;
            let size_x = it1.sizes[xu];
            for y in 0..size2 {
                let yu = y as usize;
                let size_y = it2.sizes[yu];

                if size_x == 1 && size_y == 1 {
                    self.delta[xu][yu] = 0.0;
                } else if size_x == 1 {
                    self.delta[xu][yu] = it2.prel_to_sum_ins_cost[yu]
                        - self.cost_model.ins(it2.prel_to_label[yu]);
                } else if size_y == 1 {
                    self.delta[xu][yu] = it1.prel_to_sum_del_cost[xu]
                        - self.cost_model.del(it1.prel_to_label[xu]);
                }
            }
        }
    }

    /// The general tree edit distance driver: decodes the strategy path
    /// of the current subtree pair, recurses into every subtree hanging
    /// off that path, then runs the matching single-path function.
    fn gted(&mut self, it1: &mut AptedIndex<C::Data>, it2: &mut AptedIndex<C::Data>) -> f64 {
        let current_subtree1 = it1.current_node;
        let current_subtree2 = it2.current_node;
        let subtree_size1 = it1.sizes[current_subtree1 as usize];
        let subtree_size2 = it2.sizes[current_subtree2 as usize];

        if subtree_size1 == 1 || subtree_size2 == 1 {
            return self.spf1(it1, current_subtree1, it2, current_subtree2);
        }

        let strategy_path_id =
            self.delta[current_subtree1 as usize][current_subtree2 as usize] as i32;
        let path_id_offset = it1.tree_size;
        let mut current_path_node = strategy_path_id.abs() - 1;

        if current_path_node < path_id_offset {
            // The strategy path lies in tree 1.
            let path_type = strategy_path_type(
                strategy_path_id,
                path_id_offset,
                current_subtree1,
                subtree_size1,
            );
            loop {
                let parent = it1.parents[current_path_node as usize];
                if parent < current_subtree1 {
                    break;
                }
                let siblings = it1.children[parent as usize].clone();
                for child in siblings {
                    if child != current_path_node {
                        it1.current_node = child;
                        self.gted(it1, it2);
                    }
                }
                current_path_node = parent;
            }
            it1.current_node = current_subtree1;

            return match path_type {
                LEFT => self.spf_l(it1, it2, false),
                RIGHT => self.spf_r(it1, it2, false),
                _ => self.spf_a(it1, it2, strategy_path_id.abs() - 1, path_type, false),
            };
        }

        // The strategy path lies in tree 2. The single-path functions get
        // the trees in swapped order and compensate by transposing their
        // `delta` accesses and exchanging delete and insert costs.
        current_path_node -= path_id_offset;
        let path_type = strategy_path_type(
            strategy_path_id,
            path_id_offset,
            current_subtree2,
            subtree_size2,
        );
        loop {
            let parent = it2.parents[current_path_node as usize];
            if parent < current_subtree2 {
                break;
            }
            let siblings = it2.children[parent as usize].clone();
            for child in siblings {
                if child != current_path_node {
                    it2.current_node = child;
                    self.gted(it1, it2);
                }
            }
            current_path_node = parent;
        }
        it2.current_node = current_subtree2;

        match path_type {
            LEFT => self.spf_l(it2, it1, true),
            RIGHT => self.spf_r(it2, it1, true),
            _ => self.spf_a(
                it2,
                it1,
                strategy_path_id.abs() - path_id_offset - 1,
                path_type,
                true,
            ),
        }
    }

    /// Closed form for pairs where at least one subtree is a single node.
    fn spf1(
        &self,
        ni1: &AptedIndex<C::Data>,
        subtree_root1: i32,
        ni2: &AptedIndex<C::Data>,
        subtree_root2: i32,
    ) -> f64 {
        let subtree_size1 = ni1.sizes[subtree_root1 as usize];
        let subtree_size2 = ni2.sizes[subtree_root2 as usize];

        if subtree_size1 == 1 && subtree_size2 == 1 {
            let n1 = ni1.prel_to_label[subtree_root1 as usize];
            let n2 = ni2.prel_to_label[subtree_root2 as usize];
            let max_cost = self.cost_model.del(n1) + self.cost_model.ins(n2);
            let ren_cost = self.cost_model.ren(n1, n2);
            return if ren_cost < max_cost { ren_cost } else { max_cost };
        }

        if subtree_size1 == 1 {
            // Either delete the single node and insert all of the other
            // subtree, or keep it renamed to its best match in there.
            let n1 = ni1.prel_to_label[subtree_root1 as usize];
            let mut cost = ni2.prel_to_sum_ins_cost[subtree_root2 as usize];
            let max_cost = cost + self.cost_model.del(n1);
            let mut min_ren_minus_ins = cost;
            for i in subtree_root2..subtree_root2 + subtree_size2 {
                let n2 = ni2.prel_to_label[i as usize];
                let node_ren_minus_ins = self.cost_model.ren(n1, n2) - self.cost_model.ins(n2);
                if node_ren_minus_ins < min_ren_minus_ins {
                    min_ren_minus_ins = node_ren_minus_ins;
                }
            }
            cost += min_ren_minus_ins;
            return if cost < max_cost { cost } else { max_cost };
        }

        if subtree_size2 == 1 {
            let n2 = ni2.prel_to_label[subtree_root2 as usize];
            let mut cost = ni1.prel_to_sum_del_cost[subtree_root1 as usize];
            let max_cost = cost + self.cost_model.ins(n2);
            let mut min_ren_minus_del = cost;
            for i in subtree_root1..subtree_root1 + subtree_size1 {
                let n1 = ni1.prel_to_label[i as usize];
                let node_ren_minus_del = self.cost_model.ren(n1, n2) - self.cost_model.del(n1);
                if node_ren_minus_del < min_ren_minus_del {
                    min_ren_minus_del = node_ren_minus_del;
                }
            }
            cost += min_ren_minus_del;
            return if cost < max_cost { cost } else { max_cost };
        }

        unreachable!("spf1 called on two non-singleton subtrees")
    }

    /// Single-path function for a leftmost strategy path: key roots of
    /// the right-hand subtree, each processed by the forest-distance DP.
    fn spf_l(
        &mut self,
        it1: &AptedIndex<C::Data>,
        it2: &AptedIndex<C::Data>,
        trees_swapped: bool,
    ) -> f64 {
        let subtree_size1 = it1.sizes[it1.current_node as usize] as usize;
        let subtree_size2 = it2.sizes[it2.current_node as usize] as usize;

        let mut key_roots = vec![-1i32; subtree_size2];
        let path_id = it2.prel_to_lld(it2.current_node);
        let first_key_root =
            compute_key_roots(it2, it2.current_node, path_id, &mut key_roots, 0);

        let mut forestdist = vec![vec![0.0f64; subtree_size2 + 1]; subtree_size1 + 1];
        for i in (0..first_key_root).rev() {
            self.tree_edit_dist(
                it1,
                it2,
                it1.current_node,
                key_roots[i as usize],
                &mut forestdist,
                trees_swapped,
            );
        }

        forestdist[subtree_size1][subtree_size2]
    }

    /// Forest-distance DP over left-to-right postorder, updating `delta`
    /// at subtree-aligned cells.
    fn tree_edit_dist(
        &mut self,
        it1: &AptedIndex<C::Data>,
        it2: &AptedIndex<C::Data>,
        it1subtree: i32,
        it2subtree: i32,
        forestdist: &mut [Vec<f64>],
        trees_swapped: bool,
    ) {
        // Translate the subtree roots to left-to-right postorder.
        let i = it1.prel_to_postl[it1subtree as usize];
        let j = it2.prel_to_postl[it2subtree as usize];

        // Offsets map the original postorder ids into forestdist, whose
        // indices run from 0 to the subtree size.
        let ioff = it1.postl_to_lld[i as usize] - 1;
        let joff = it2.postl_to_lld[j as usize] - 1;

        forestdist[0][0] = 0.0;
        for i1 in 1..=i - ioff {
            let node = it1.postl_to_label(i1 + ioff);
            forestdist[i1 as usize][0] = forestdist[(i1 - 1) as usize][0]
                + if trees_swapped {
                    self.cost_model.ins(node)
                } else {
                    self.cost_model.del(node)
                };
        }
        for j1 in 1..=j - joff {
            let node = it2.postl_to_label(j1 + joff);
            forestdist[0][j1 as usize] = forestdist[0][(j1 - 1) as usize]
                + if trees_swapped {
                    self.cost_model.del(node)
                } else {
                    self.cost_model.ins(node)
                };
        }

        for i1 in 1..=i - ioff {
            for j1 in 1..=j - joff {
                let n1 = it1.postl_to_label(i1 + ioff);
                let n2 = it2.postl_to_label(j1 + joff);
                let u = if trees_swapped {
                    self.cost_model.ren(n2, n1)
                } else {
                    self.cost_model.ren(n1, n2)
                };
                let da = forestdist[(i1 - 1) as usize][j1 as usize]
                    + if trees_swapped {
                        self.cost_model.ins(n1)
                    } else {
                        self.cost_model.del(n1)
                    };
                let db = forestdist[i1 as usize][(j1 - 1) as usize]
                    + if trees_swapped {
                        self.cost_model.del(n2)
                    } else {
                        self.cost_model.ins(n2)
                    };

                let prel1 = it1.postl_to_prel[(i1 + ioff) as usize] as usize;
                let prel2 = it2.postl_to_prel[(j1 + joff) as usize] as usize;
                let dc = if it1.postl_to_lld[(i1 + ioff) as usize] == it1.postl_to_lld[i as usize]
                    && it2.postl_to_lld[(j1 + joff) as usize] == it2.postl_to_lld[j as usize]
                {
                    // Both suffixes are subtrees; remember their distance.
                    let dist = forestdist[(i1 - 1) as usize][(j1 - 1) as usize];
                    if trees_swapped {
                        self.delta[prel2][prel1] = dist;
                    } else {
                        self.delta[prel1][prel2] = dist;
                    }
                    dist + u
                } else {
                    let fd = forestdist[(it1.postl_to_lld[(i1 + ioff) as usize] - 1 - ioff)
                        as usize][(it2.postl_to_lld[(j1 + joff) as usize] - 1 - joff) as usize];
                    let memo = if trees_swapped {
                        self.delta[prel2][prel1]
                    } else {
                        self.delta[prel1][prel2]
                    };
                    fd + memo + u
                };

                forestdist[i1 as usize][j1 as usize] = da.min(db).min(dc);
            }
        }
    }

    /// Single-path function for a rightmost strategy path; the mirror of
    /// `spf_l` over right-to-left postorder.
    fn spf_r(
        &mut self,
        it1: &AptedIndex<C::Data>,
        it2: &AptedIndex<C::Data>,
        trees_swapped: bool,
    ) -> f64 {
        let subtree_size1 = it1.sizes[it1.current_node as usize] as usize;
        let subtree_size2 = it2.sizes[it2.current_node as usize] as usize;

        let mut rev_key_roots = vec![-1i32; subtree_size2];
        let path_id = it2.prel_to_rld(it2.current_node);
        let first_key_root =
            compute_rev_key_roots(it2, it2.current_node, path_id, &mut rev_key_roots, 0);

        let mut forestdist = vec![vec![0.0f64; subtree_size2 + 1]; subtree_size1 + 1];
        for i in (0..first_key_root).rev() {
            self.rev_tree_edit_dist(
                it1,
                it2,
                it1.current_node,
                rev_key_roots[i as usize],
                &mut forestdist,
                trees_swapped,
            );
        }

        forestdist[subtree_size1][subtree_size2]
    }

    /// Forest-distance DP over right-to-left postorder.
    fn rev_tree_edit_dist(
        &mut self,
        it1: &AptedIndex<C::Data>,
        it2: &AptedIndex<C::Data>,
        it1subtree: i32,
        it2subtree: i32,
        forestdist: &mut [Vec<f64>],
        trees_swapped: bool,
    ) {
        let i = it1.prel_to_postr[it1subtree as usize];
        let j = it2.prel_to_postr[it2subtree as usize];

        let ioff = it1.postr_to_rld[i as usize] - 1;
        let joff = it2.postr_to_rld[j as usize] - 1;

        forestdist[0][0] = 0.0;
        for i1 in 1..=i - ioff {
            let node = it1.postr_to_label(i1 + ioff);
            forestdist[i1 as usize][0] = forestdist[(i1 - 1) as usize][0]
                + if trees_swapped {
                    self.cost_model.ins(node)
                } else {
                    self.cost_model.del(node)
                };
        }
        for j1 in 1..=j - joff {
            let node = it2.postr_to_label(j1 + joff);
            forestdist[0][j1 as usize] = forestdist[0][(j1 - 1) as usize]
                + if trees_swapped {
                    self.cost_model.del(node)
                } else {
                    self.cost_model.ins(node)
                };
        }

        for i1 in 1..=i - ioff {
            for j1 in 1..=j - joff {
                let n1 = it1.postr_to_label(i1 + ioff);
                let n2 = it2.postr_to_label(j1 + joff);
                let u = if trees_swapped {
                    self.cost_model.ren(n2, n1)
                } else {
                    self.cost_model.ren(n1, n2)
                };
                let da = forestdist[(i1 - 1) as usize][j1 as usize]
                    + if trees_swapped {
                        self.cost_model.ins(n1)
                    } else {
                        self.cost_model.del(n1)
                    };
                let db = forestdist[i1 as usize][(j1 - 1) as usize]
                    + if trees_swapped {
                        self.cost_model.del(n2)
                    } else {
                        self.cost_model.ins(n2)
                    };

                let prel1 = it1.postr_to_prel[(i1 + ioff) as usize] as usize;
                let prel2 = it2.postr_to_prel[(j1 + joff) as usize] as usize;
                let dc = if it1.postr_to_rld[(i1 + ioff) as usize] == it1.postr_to_rld[i as usize]
                    && it2.postr_to_rld[(j1 + joff) as usize] == it2.postr_to_rld[j as usize]
                {
                    let dist = forestdist[(i1 - 1) as usize][(j1 - 1) as usize];
                    if trees_swapped {
                        self.delta[prel2][prel1] = dist;
                    } else {
                        self.delta[prel1][prel2] = dist;
                    }
                    dist + u
                } else {
                    let fd = forestdist[(it1.postr_to_rld[(i1 + ioff) as usize] - 1 - ioff)
                        as usize][(it2.postr_to_rld[(j1 + joff) as usize] - 1 - joff) as usize];
                    let memo = if trees_swapped {
                        self.delta[prel2][prel1]
                    } else {
                        self.delta[prel1][prel2]
                    };
                    fd + memo + u
                };

                forestdist[i1 as usize][j1 as usize] = da.min(db).min(dc);
            }
        }
    }

    fn update_fnext(&mut self, ln_for_node: i32, node: i32, current_subtree_prel: i32) {
        let last = self.fnext.len() - 1;
        if ln_for_node >= current_subtree_prel {
            self.fnext[node as usize] = self.fnext[ln_for_node as usize];
            self.fnext[ln_for_node as usize] = node;
        } else {
            self.fnext[node as usize] = self.fnext[last];
            self.fnext[last] = node;
        }
    }

    fn update_ftop(&mut self, ln_for_node: i32, node: i32) {
        self.ftop[node as usize] = ln_for_node;
        let next = self.fnext[node as usize];
        if next > -1 {
            self.ftop[next as usize] = node;
        }
    }

    /// Single-path function for an inner strategy path [1, Algorithm 3].
    ///
    /// Walks up the path from its leaf `path_id`; at each path node the
    /// forest to the left and the forest to the right of the path are
    /// handled by separate sub-DPs over the inner tree's forest orders.
    fn spf_a(
        &mut self,
        it1: &AptedIndex<C::Data>,
        it2: &AptedIndex<C::Data>,
        path_id: i32,
        path_type: i32,
        trees_swapped: bool,
    ) -> f64 {
        let current_subtree_prel1 = it1.current_node;
        let current_subtree_prel2 = it2.current_node;
        let subtree_size1 = it1.sizes[current_subtree_prel1 as usize];
        let subtree_size2 = it2.sizes[current_subtree_prel2 as usize];

        // t: distances of the inner subforests with the top node fixed.
        // s: the running sub-DP grid of the current path node.
        let mut t = vec![vec![0.0f64; subtree_size2 as usize + 1]; subtree_size2 as usize + 1];
        let mut s = vec![vec![0.0f64; subtree_size2 as usize + 1]; subtree_size1 as usize + 1];

        let mut min_cost = -1.0f64;
        let mut sp1: f64;
        let mut sp2: f64;
        let mut sp3: f64;
        let mut start_path_node = -1i32;
        let mut end_path_node = path_id;
        let it2_prel_off = current_subtree_prel2;
        let it2_prer_off = it2.prel_to_prer[it2_prel_off as usize];

        let mut current_forest_cost1 = 0.0f64;
        let mut current_forest_cost2: f64;
        let mut current_forest_size2: i32;
        let mut tmp_forest_cost1: f64;

        // Loop A [1, Algorithm 3] - walk up the path.
        while end_path_node >= current_subtree_prel1 {
            let it1_prel_off = end_path_node;
            let it1_prer_off = it1.prel_to_prer[end_path_node as usize];
            let end_path_node_in_prer = it1.prel_to_prer[end_path_node as usize];
            let start_path_node_in_prer = if start_path_node == -1 {
                i32::MAX
            } else {
                it1.prel_to_prer[start_path_node as usize]
            };
            let parent_of_end_path_node = it1.parents[end_path_node as usize];

            let left_part = start_path_node - end_path_node > 1;
            let right_part =
                start_path_node >= 0 && start_path_node_in_prer - end_path_node_in_prer > 1;

            // Deal with the nodes to the left of the path.
            if path_type == RIGHT || (path_type == INNER && left_part) {
                let (l_f_first, r_f_first) = if start_path_node == -1 {
                    (end_path_node, end_path_node_in_prer)
                } else {
                    (start_path_node - 1, start_path_node_in_prer)
                };
                let r_f_last = if right_part { -1 } else { end_path_node_in_prer };
                let r_g_last = it2.prel_to_prer[current_subtree_prel2 as usize];
                let r_g_first = r_g_last + subtree_size2 - 1;
                let l_f_last = if right_part { end_path_node + 1 } else { end_path_node };

                let last = self.fnext.len() - 1;
                self.fnext[last] = -1;
                for i in current_subtree_prel2..current_subtree_prel2 + subtree_size2 {
                    self.fnext[i as usize] = -1;
                    self.ftop[i as usize] = -1;
                }

                tmp_forest_cost1 = current_forest_cost1;

                // Loop B [1, Algorithm 3] - for all nodes in G.
                for r_g in (r_g_last..=r_g_first).rev() {
                    let l_g_first = it2.prer_to_prel[r_g as usize];
                    let r_g_minus1_in_prel = if r_g <= it2.prel_to_prer[current_subtree_prel2 as usize]
                    {
                        i32::MAX
                    } else {
                        it2.prer_to_prel[(r_g - 1) as usize]
                    };
                    let parent_of_r_g_in_prel = it2.parents[l_g_first as usize];
                    // Decides the last lG node of Loop D.
                    let l_g_last = if path_type == RIGHT {
                        if l_g_first == current_subtree_prel2
                            || r_g_minus1_in_prel != parent_of_r_g_in_prel
                        {
                            l_g_first
                        } else {
                            it2.parents[l_g_first as usize] + 1
                        }
                    } else if l_g_first == current_subtree_prel2 {
                        l_g_first
                    } else {
                        current_subtree_prel2 + 1
                    };

                    self.update_fnext(
                        it2.prel_to_ln[l_g_first as usize],
                        l_g_first,
                        current_subtree_prel2,
                    );
                    self.update_ftop(it2.prel_to_ln[l_g_first as usize], l_g_first);
                    let mut r_f = r_f_first;

                    current_forest_cost1 = tmp_forest_cost1;

                    // Loop C [1, Algorithm 3] - nodes to the left of the path node.
                    for l_f in (l_f_last..=l_f_first).rev() {
                        // Fixes the rF node.
                        if l_f == l_f_last && !right_part {
                            r_f = r_f_last;
                        }
                        let l_f_node = it1.prel_to_label[l_f as usize];
                        current_forest_cost1 += if trees_swapped {
                            self.cost_model.ins(l_f_node)
                        } else {
                            self.cost_model.del(l_f_node)
                        };
                        current_forest_size2 = it2.sizes[l_g_first as usize];
                        current_forest_cost2 = if trees_swapped {
                            it2.prel_to_sum_del_cost[l_g_first as usize]
                        } else {
                            it2.prel_to_sum_ins_cost[l_g_first as usize]
                        };
                        let l_f_in_prer = it1.prel_to_prer[l_f as usize];
                        let f_forest_is_tree = l_f_in_prer == r_f;
                        let l_f_subtree_size = it1.sizes[l_f as usize];
                        let l_f_is_consecutive_path_node = start_path_node - l_f == 1;
                        let l_f_is_left_sibling_of_path_node =
                            l_f + l_f_subtree_size == start_path_node;

                        let sp1s_row = (l_f + 1 - it1_prel_off) as usize;
                        let sp2s_row = (l_f - it1_prel_off) as usize;
                        let mut sp3s_row = 0usize;
                        let swrite_row = (l_f - it1_prel_off) as usize;

                        // Which arrays the sp1 and sp3 terms of the
                        // recursive formula [1, Figures 12,13] read from.
                        let mut sp1_source = 1;
                        let mut sp3_source = 1;
                        if f_forest_is_tree {
                            if l_f_subtree_size == 1 {
                                sp1_source = 3;
                            } else if l_f_is_consecutive_path_node {
                                sp1_source = 2;
                            }
                            sp3 = 0.0;
                            sp3_source = 2;
                        } else {
                            if l_f_is_consecutive_path_node {
                                sp1_source = 2;
                            }
                            sp3 = current_forest_cost1
                                - if trees_swapped {
                                    it1.prel_to_sum_ins_cost[l_f as usize]
                                } else {
                                    it1.prel_to_sum_del_cost[l_f as usize]
                                };
                            if l_f_is_left_sibling_of_path_node {
                                sp3_source = 3;
                            }
                        }
                        if sp3_source == 1 {
                            sp3s_row = (l_f + l_f_subtree_size - it1_prel_off) as usize;
                        }

                        let mut l_g = l_g_first;

                        // First lG node; it differs from the consecutive
                        // ones handled in Loop D.
                        sp1 = match sp1_source {
                            1 => s[sp1s_row][(l_g - it2_prel_off) as usize],
                            2 => t[(l_g - it2_prel_off) as usize][(r_g - it2_prer_off) as usize],
                            _ => current_forest_cost2,
                        };
                        sp1 += if trees_swapped {
                            self.cost_model.ins(l_f_node)
                        } else {
                            self.cost_model.del(l_f_node)
                        };
                        min_cost = sp1;

                        sp2 = if current_forest_size2 == 1 {
                            current_forest_cost1
                        } else {
                            self.q[l_f as usize]
                        };
                        let l_g_node = it2.prel_to_label[l_g as usize];
                        sp2 += if trees_swapped {
                            self.cost_model.del(l_g_node)
                        } else {
                            self.cost_model.ins(l_g_node)
                        };
                        if sp2 < min_cost {
                            min_cost = sp2;
                        }

                        if sp3 < min_cost {
                            sp3 += if trees_swapped {
                                self.delta[l_g as usize][l_f as usize]
                            } else {
                                self.delta[l_f as usize][l_g as usize]
                            };
                            if sp3 < min_cost {
                                sp3 += if trees_swapped {
                                    self.cost_model.ren(l_g_node, l_f_node)
                                } else {
                                    self.cost_model.ren(l_f_node, l_g_node)
                                };
                                if sp3 < min_cost {
                                    min_cost = sp3;
                                }
                            }
                        }

                        s[swrite_row][(l_g - it2_prel_off) as usize] = min_cost;
                        l_g = self.ftop[l_g as usize];

                        // Loop D [1, Algorithm 3] - nodes to the left of rG.
                        while l_g >= l_g_last {
                            let l_g_node = it2.prel_to_label[l_g as usize];
                            current_forest_cost2 += if trees_swapped {
                                self.cost_model.del(l_g_node)
                            } else {
                                self.cost_model.ins(l_g_node)
                            };
                            let del_l_f = if trees_swapped {
                                self.cost_model.ins(l_f_node)
                            } else {
                                self.cost_model.del(l_f_node)
                            };
                            sp1 = del_l_f
                                + match sp1_source {
                                    1 => s[sp1s_row][(l_g - it2_prel_off) as usize],
                                    2 => t[(l_g - it2_prel_off) as usize]
                                        [(r_g - it2_prer_off) as usize],
                                    _ => current_forest_cost2,
                                };
                            sp2 = s[sp2s_row]
                                [(self.fnext[l_g as usize] - it2_prel_off) as usize]
                                + if trees_swapped {
                                    self.cost_model.del(l_g_node)
                                } else {
                                    self.cost_model.ins(l_g_node)
                                };
                            min_cost = if sp2 < sp1 { sp2 } else { sp1 };

                            sp3 = if trees_swapped {
                                self.delta[l_g as usize][l_f as usize]
                            } else {
                                self.delta[l_f as usize][l_g as usize]
                            };
                            if sp3 < min_cost {
                                sp3 += match sp3_source {
                                    1 => {
                                        let live = self.fnext
                                            [(l_g + it2.sizes[l_g as usize] - 1) as usize];
                                        s[sp3s_row][(live - it2_prel_off) as usize]
                                    }
                                    2 => {
                                        current_forest_cost2
                                            - if trees_swapped {
                                                it2.prel_to_sum_del_cost[l_g as usize]
                                            } else {
                                                it2.prel_to_sum_ins_cost[l_g as usize]
                                            }
                                    }
                                    _ => {
                                        let live = self.fnext
                                            [(l_g + it2.sizes[l_g as usize] - 1) as usize];
                                        t[(live - it2_prel_off) as usize]
                                            [(r_g - it2_prer_off) as usize]
                                    }
                                };
                                if sp3 < min_cost {
                                    sp3 += if trees_swapped {
                                        self.cost_model.ren(l_g_node, l_f_node)
                                    } else {
                                        self.cost_model.ren(l_f_node, l_g_node)
                                    };
                                    if sp3 < min_cost {
                                        min_cost = sp3;
                                    }
                                }
                            }

                            s[swrite_row][(l_g - it2_prel_off) as usize] = min_cost;
                            l_g = self.ftop[l_g as usize];
                        }
                    }

                    // The inner forest closed to a subtree; propagate into
                    // delta and refresh q for the next path node.
                    if r_g_minus1_in_prel == parent_of_r_g_in_prel {
                        if !right_part {
                            if left_part {
                                let dist = s[(l_f_last + 1 - it1_prel_off) as usize]
                                    [(r_g_minus1_in_prel + 1 - it2_prel_off) as usize];
                                if trees_swapped {
                                    self.delta[parent_of_r_g_in_prel as usize]
                                        [end_path_node as usize] = dist;
                                } else {
                                    self.delta[end_path_node as usize]
                                        [parent_of_r_g_in_prel as usize] = dist;
                                }
                            }
                            if end_path_node > 0
                                && end_path_node == parent_of_end_path_node + 1
                                && end_path_node_in_prer
                                    == it1.prel_to_prer[parent_of_end_path_node as usize] + 1
                            {
                                let dist = s[(l_f_last - it1_prel_off) as usize]
                                    [(r_g_minus1_in_prel + 1 - it2_prel_off) as usize];
                                if trees_swapped {
                                    self.delta[parent_of_r_g_in_prel as usize]
                                        [parent_of_end_path_node as usize] = dist;
                                } else {
                                    self.delta[parent_of_end_path_node as usize]
                                        [parent_of_r_g_in_prel as usize] = dist;
                                }
                            }
                        }
                        for l_f in (l_f_last..=l_f_first).rev() {
                            self.q[l_f as usize] = s[(l_f - it1_prel_off) as usize]
                                [(parent_of_r_g_in_prel + 1 - it2_prel_off) as usize];
                        }
                    }

                    let mut l_g = l_g_first;
                    while l_g >= l_g_last {
                        t[(l_g - it2_prel_off) as usize][(r_g - it2_prer_off) as usize] =
                            s[(l_f_last - it1_prel_off) as usize][(l_g - it2_prel_off) as usize];
                        l_g = self.ftop[l_g as usize];
                    }
                }
            }

            // Deal with the nodes to the right of the path.
            if path_type == LEFT
                || (path_type == INNER && right_part)
                || (path_type == INNER && !left_part && !right_part)
            {
                let (l_f_first, r_f_first) = if start_path_node == -1 {
                    (end_path_node, it1.prel_to_prer[end_path_node as usize])
                } else {
                    (
                        end_path_node + 1,
                        it1.prel_to_prer[start_path_node as usize] - 1,
                    )
                };
                let l_f_last = end_path_node;
                let l_g_last = current_subtree_prel2;
                let l_g_first = l_g_last + subtree_size2 - 1;
                let r_f_last = it1.prel_to_prer[end_path_node as usize];

                let last = self.fnext.len() - 1;
                self.fnext[last] = -1;
                for i in current_subtree_prel2..current_subtree_prel2 + subtree_size2 {
                    self.fnext[i as usize] = -1;
                    self.ftop[i as usize] = -1;
                }

                tmp_forest_cost1 = current_forest_cost1;

                // Loop B' [1, Algorithm 3] - for all nodes in G.
                for l_g in (l_g_last..=l_g_first).rev() {
                    let r_g_first = it2.prel_to_prer[l_g as usize];
                    self.update_fnext(
                        it2.prer_to_ln[r_g_first as usize],
                        r_g_first,
                        it2.prel_to_prer[current_subtree_prel2 as usize],
                    );
                    self.update_ftop(it2.prer_to_ln[r_g_first as usize], r_g_first);
                    let mut l_f = l_f_first;
                    let l_g_minus1_in_prer = if l_g <= current_subtree_prel2 {
                        i32::MAX
                    } else {
                        it2.prel_to_prer[(l_g - 1) as usize]
                    };
                    let parent_of_l_g = it2.parents[l_g as usize];
                    let parent_of_l_g_in_prer = if parent_of_l_g == -1 {
                        -1
                    } else {
                        it2.prel_to_prer[parent_of_l_g as usize]
                    };

                    current_forest_cost1 = tmp_forest_cost1;

                    let r_g_last = if path_type == LEFT {
                        if l_g == current_subtree_prel2
                            || it2.children[parent_of_l_g as usize][0] != l_g
                        {
                            r_g_first
                        } else {
                            it2.prel_to_prer[parent_of_l_g as usize] + 1
                        }
                    } else if r_g_first == it2.prel_to_prer[current_subtree_prel2 as usize] {
                        r_g_first
                    } else {
                        it2.prel_to_prer[current_subtree_prel2 as usize]
                    };

                    // Loop C' [1, Algorithm 3] - nodes to the right of the path node.
                    for r_f in (r_f_last..=r_f_first).rev() {
                        if r_f == r_f_last {
                            l_f = l_f_last;
                        }
                        let r_f_in_prel = it1.prer_to_prel[r_f as usize];
                        let r_f_node = it1.prel_to_label[r_f_in_prel as usize];
                        current_forest_cost1 += if trees_swapped {
                            self.cost_model.ins(r_f_node)
                        } else {
                            self.cost_model.del(r_f_node)
                        };
                        current_forest_size2 = it2.sizes[l_g as usize];
                        current_forest_cost2 = if trees_swapped {
                            it2.prel_to_sum_del_cost[l_g as usize]
                        } else {
                            it2.prel_to_sum_ins_cost[l_g as usize]
                        };
                        let r_f_subtree_size = it1.sizes[r_f_in_prel as usize];
                        let (r_f_is_consecutive_path_node, r_f_is_right_sibling_of_path_node) =
                            if start_path_node > 0 {
                                (
                                    start_path_node_in_prer - r_f == 1,
                                    r_f + r_f_subtree_size == start_path_node_in_prer,
                                )
                            } else {
                                (false, false)
                            };
                        let f_forest_is_tree = r_f_in_prel == l_f;

                        let sp1s_row = (r_f + 1 - it1_prer_off) as usize;
                        let sp2s_row = (r_f - it1_prer_off) as usize;
                        let mut sp3s_row = 0usize;
                        let swrite_row = (r_f - it1_prer_off) as usize;
                        let t_row = (l_g - it2_prel_off) as usize;

                        let mut sp1_source = 1;
                        let mut sp3_source = 1;
                        if f_forest_is_tree {
                            if r_f_subtree_size == 1 {
                                sp1_source = 3;
                            } else if r_f_is_consecutive_path_node {
                                sp1_source = 2;
                            }
                            sp3 = 0.0;
                            sp3_source = 2;
                        } else {
                            if r_f_is_consecutive_path_node {
                                sp1_source = 2;
                            }
                            sp3 = current_forest_cost1
                                - if trees_swapped {
                                    it1.prel_to_sum_ins_cost[r_f_in_prel as usize]
                                } else {
                                    it1.prel_to_sum_del_cost[r_f_in_prel as usize]
                                };
                            if r_f_is_right_sibling_of_path_node {
                                sp3_source = 3;
                            }
                        }
                        if sp3_source == 1 {
                            sp3s_row = (r_f + r_f_subtree_size - it1_prer_off) as usize;
                        }

                        sp2 = if current_forest_size2 == 1 {
                            current_forest_cost1
                        } else {
                            self.q[r_f as usize]
                        };

                        let mut r_g = r_g_first;
                        let r_g_first_in_prel = it2.prer_to_prel[r_g_first as usize];

                        sp1 = match sp1_source {
                            1 => s[sp1s_row][(r_g - it2_prer_off) as usize],
                            2 => t[t_row][(r_g - it2_prer_off) as usize],
                            _ => current_forest_cost2,
                        };
                        sp1 += if trees_swapped {
                            self.cost_model.ins(r_f_node)
                        } else {
                            self.cost_model.del(r_f_node)
                        };
                        min_cost = sp1;

                        let r_g_node = it2.prel_to_label[r_g_first_in_prel as usize];
                        sp2 += if trees_swapped {
                            self.cost_model.del(r_g_node)
                        } else {
                            self.cost_model.ins(r_g_node)
                        };
                        if sp2 < min_cost {
                            min_cost = sp2;
                        }

                        if sp3 < min_cost {
                            sp3 += if trees_swapped {
                                self.delta[r_g_first_in_prel as usize][r_f_in_prel as usize]
                            } else {
                                self.delta[r_f_in_prel as usize][r_g_first_in_prel as usize]
                            };
                            if sp3 < min_cost {
                                sp3 += if trees_swapped {
                                    self.cost_model.ren(r_g_node, r_f_node)
                                } else {
                                    self.cost_model.ren(r_f_node, r_g_node)
                                };
                                if sp3 < min_cost {
                                    min_cost = sp3;
                                }
                            }
                        }

                        s[swrite_row][(r_g - it2_prer_off) as usize] = min_cost;
                        r_g = self.ftop[r_g as usize];

                        // Loop D' [1, Algorithm 3] - nodes to the right of lG.
                        while r_g >= r_g_last {
                            let r_g_in_prel = it2.prer_to_prel[r_g as usize];
                            let r_g_node = it2.prel_to_label[r_g_in_prel as usize];
                            current_forest_cost2 += if trees_swapped {
                                self.cost_model.del(r_g_node)
                            } else {
                                self.cost_model.ins(r_g_node)
                            };
                            let del_r_f = if trees_swapped {
                                self.cost_model.ins(r_f_node)
                            } else {
                                self.cost_model.del(r_f_node)
                            };
                            sp1 = del_r_f
                                + match sp1_source {
                                    1 => s[sp1s_row][(r_g - it2_prer_off) as usize],
                                    2 => t[t_row][(r_g - it2_prer_off) as usize],
                                    _ => current_forest_cost2,
                                };
                            sp2 = s[sp2s_row]
                                [(self.fnext[r_g as usize] - it2_prer_off) as usize]
                                + if trees_swapped {
                                    self.cost_model.del(r_g_node)
                                } else {
                                    self.cost_model.ins(r_g_node)
                                };
                            min_cost = if sp2 < sp1 { sp2 } else { sp1 };

                            sp3 = if trees_swapped {
                                self.delta[r_g_in_prel as usize][r_f_in_prel as usize]
                            } else {
                                self.delta[r_f_in_prel as usize][r_g_in_prel as usize]
                            };
                            if sp3 < min_cost {
                                sp3 += match sp3_source {
                                    1 => {
                                        let live = self.fnext[(r_g
                                            + it2.sizes[r_g_in_prel as usize]
                                            - 1)
                                            as usize];
                                        s[sp3s_row][(live - it2_prer_off) as usize]
                                    }
                                    2 => {
                                        current_forest_cost2
                                            - if trees_swapped {
                                                it2.prel_to_sum_del_cost[r_g_in_prel as usize]
                                            } else {
                                                it2.prel_to_sum_ins_cost[r_g_in_prel as usize]
                                            }
                                    }
                                    _ => {
                                        let live = self.fnext[(r_g
                                            + it2.sizes[r_g_in_prel as usize]
                                            - 1)
                                            as usize];
                                        t[t_row][(live - it2_prer_off) as usize]
                                    }
                                };
                                if sp3 < min_cost {
                                    sp3 += if trees_swapped {
                                        self.cost_model.ren(r_g_node, r_f_node)
                                    } else {
                                        self.cost_model.ren(r_f_node, r_g_node)
                                    };
                                    if sp3 < min_cost {
                                        min_cost = sp3;
                                    }
                                }
                            }

                            s[swrite_row][(r_g - it2_prer_off) as usize] = min_cost;
                            r_g = self.ftop[r_g as usize];
                        }
                    }

                    if l_g > current_subtree_prel2 && l_g - 1 == parent_of_l_g {
                        if right_part {
                            let dist = s[(r_f_last + 1 - it1_prer_off) as usize]
                                [(l_g_minus1_in_prer + 1 - it2_prer_off) as usize];
                            if trees_swapped {
                                self.delta[parent_of_l_g as usize][end_path_node as usize] = dist;
                            } else {
                                self.delta[end_path_node as usize][parent_of_l_g as usize] = dist;
                            }
                        }
                        if end_path_node > 0
                            && end_path_node == parent_of_end_path_node + 1
                            && end_path_node_in_prer
                                == it1.prel_to_prer[parent_of_end_path_node as usize] + 1
                        {
                            let dist = s[(r_f_last - it1_prer_off) as usize]
                                [(l_g_minus1_in_prer + 1 - it2_prer_off) as usize];
                            if trees_swapped {
                                self.delta[parent_of_l_g as usize]
                                    [parent_of_end_path_node as usize] = dist;
                            } else {
                                self.delta[parent_of_end_path_node as usize]
                                    [parent_of_l_g as usize] = dist;
                            }
                        }
                        for r_f in (r_f_last..=r_f_first).rev() {
                            self.q[r_f as usize] = s[(r_f - it1_prer_off) as usize]
                                [(parent_of_l_g_in_prer + 1 - it2_prer_off) as usize];
                        }
                    }

                    let mut r_g = r_g_first;
                    while r_g >= r_g_last {
                        t[(l_g - it2_prel_off) as usize][(r_g - it2_prer_off) as usize] = s
                            [(r_f_last - it1_prer_off) as usize][(r_g - it2_prer_off) as usize];
                        r_g = self.ftop[r_g as usize];
                    }
                }
            }

            // Walk up the path by one node.
            start_path_node = end_path_node;
            end_path_node = it1.parents[end_path_node as usize];
        }

        min_cost
    }
}

/// Decodes the path type out of an encoded strategy path id.
fn strategy_path_type(
    path_id_with_offset: i32,
    path_id_offset: i32,
    current_root_prel: i32,
    current_subtree_size: i32,
) -> i32 {
    if path_id_with_offset.signum() == -1 {
        return LEFT;
    }
    let mut path_id = path_id_with_offset.abs() - 1;
    if path_id >= path_id_offset {
        path_id -= path_id_offset;
    }
    if path_id == current_root_prel + current_subtree_size - 1 {
        return RIGHT;
    }
    INNER
}

/// Collects the key roots of the subtree: the root itself plus every
/// right sibling of every node on its leftmost path, recursively.
fn compute_key_roots<D>(
    it2: &AptedIndex<D>,
    subtree_root_node: i32,
    path_id: i32,
    key_roots: &mut [i32],
    mut index: i32,
) -> i32 {
    key_roots[index as usize] = subtree_root_node;
    index += 1;

    let mut path_node = path_id;
    while path_node > subtree_root_node {
        let parent = it2.parents[path_node as usize];
        for &child in &it2.children[parent as usize] {
            if child != path_node {
                index = compute_key_roots(it2, child, it2.prel_to_lld(child), key_roots, index);
            }
        }
        path_node = parent;
    }

    index
}

/// The mirror of `compute_key_roots` over rightmost paths.
fn compute_rev_key_roots<D>(
    it2: &AptedIndex<D>,
    subtree_root_node: i32,
    path_id: i32,
    rev_key_roots: &mut [i32],
    mut index: i32,
) -> i32 {
    rev_key_roots[index as usize] = subtree_root_node;
    index += 1;

    let mut path_node = path_id;
    while path_node > subtree_root_node {
        let parent = it2.parents[path_node as usize];
        for &child in &it2.children[parent as usize] {
            if child != path_node {
                index =
                    compute_rev_key_roots(it2, child, it2.prel_to_rld(child), rev_key_roots, index);
            }
        }
        path_node = parent;
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_tree;
    use crate::ted::{edit_distance, zhang_shasha, StringCostModel};
    use proptest::prelude::*;

    fn ted_str(t1: &str, t2: &str) -> f64 {
        let t1 = parse_tree(t1).unwrap();
        let t2 = parse_tree(t2).unwrap();
        edit_distance(&t1, &t2)
    }

    /// Runs the full pipeline with a forced strategy sweep direction.
    fn ted_with_sweep(t1: &str, t2: &str, post_l: bool) -> f64 {
        let t1 = parse_tree(t1).unwrap();
        let t2 = parse_tree(t2).unwrap();
        let mut apted = Apted::new(StringCostModel);
        let mut it1 = AptedIndex::new(&t1, &StringCostModel);
        let mut it2 = AptedIndex::new(&t2, &StringCostModel);
        if post_l {
            apted.compute_opt_strategy_post_l(&it1, &it2);
        } else {
            apted.compute_opt_strategy_post_r(&it1, &it2);
        }
        apted.ted_init(&it1, &it2);
        apted.gted(&mut it1, &mut it2)
    }

    #[test]
    fn test_identical_singletons() {
        assert_eq!(ted_str("{a}", "{a}"), 0.0);
    }

    #[test]
    fn test_renamed_singletons() {
        assert_eq!(ted_str("{a}", "{b}"), 1.0);
    }

    #[test]
    fn test_swapped_children() {
        assert_eq!(ted_str("{a{b}{c}}", "{a{c}{b}}"), 2.0);
    }

    #[test]
    fn test_moved_leaf() {
        assert_eq!(ted_str("{a{b{d}}{c}}", "{a{b}{c{d}}}"), 2.0);
    }

    #[test]
    fn test_paper_example() {
        // The canonical example from the APTED paper.
        assert_eq!(ted_str("{f{d{a}{c{b}}}{e}}", "{f{c{d{a}{b}}}{e}}"), 2.0);
    }

    #[test]
    fn test_singleton_against_star() {
        assert_eq!(ted_str("{a}", "{a{b}{c}{d}}"), 3.0);
    }

    #[test]
    fn test_pure_deletions() {
        assert_eq!(ted_str("{a{b}{c}}", "{a}"), 2.0);
        assert_eq!(ted_str("{a{b{c{d}}}}", "{a{b}}"), 2.0);
    }

    #[test]
    fn test_disjoint_labels_cost_everything() {
        // No shared label: delete all of one, insert all of the other,
        // minus the renames that are always at least as good.
        assert_eq!(ted_str("{a{b}{c}}", "{x{y}{z}}"), 3.0);
    }

    #[test]
    fn test_both_sweep_directions_agree() {
        let pairs = [
            ("{f{d{a}{c{b}}}{e}}", "{f{c{d{a}{b}}}{e}}"),
            ("{a{b{c}{d}}{e{f}}}", "{a{e{f}}{b{c}{d}}}"),
            ("{a{b{e}{f}}{c{g}}{d{h}{i}}}", "{a{b{e}}{c{f}{g}}{d{h}{i}}}"),
            ("{x{x{x{x}}}}", "{x{x}{x}{x}}"),
        ];
        for (t1, t2) in pairs {
            let post_l = ted_with_sweep(t1, t2, true);
            let post_r = ted_with_sweep(t1, t2, false);
            assert_eq!(post_l, post_r, "sweeps disagree on ({t1}, {t2})");
        }
    }

    #[test]
    fn test_deep_chains() {
        assert_eq!(ted_str("{a{a{a{a{a}}}}}", "{a{a{a{a{a}}}}}"), 0.0);
        assert_eq!(ted_str("{a{a{a{a{a}}}}}", "{b{b{b{b{b}}}}}"), 5.0);
    }

    fn tree_strategy() -> impl Strategy<Value = String> {
        let leaf = prop::char::range('a', 'd').prop_map(|l| format!("{{{l}}}"));
        leaf.prop_recursive(3, 20, 3, |inner| {
            (prop::char::range('a', 'd'), prop::collection::vec(inner, 0..3))
                .prop_map(|(l, children)| format!("{{{}{}}}", l, children.concat()))
        })
    }

    fn node_count(bracket: &str) -> i64 {
        bracket.bytes().filter(|&b| b == b'{').count() as i64
    }

    proptest! {
        #[test]
        fn prop_identity(t in tree_strategy()) {
            prop_assert_eq!(ted_str(&t, &t), 0.0);
        }

        #[test]
        fn prop_non_negative(t1 in tree_strategy(), t2 in tree_strategy()) {
            prop_assert!(ted_str(&t1, &t2) >= 0.0);
        }

        #[test]
        fn prop_symmetry(t1 in tree_strategy(), t2 in tree_strategy()) {
            prop_assert_eq!(ted_str(&t1, &t2), ted_str(&t2, &t1));
        }

        #[test]
        fn prop_triangle_inequality(
            t1 in tree_strategy(),
            t2 in tree_strategy(),
            t3 in tree_strategy(),
        ) {
            let d13 = ted_str(&t1, &t3);
            let d12 = ted_str(&t1, &t2);
            let d23 = ted_str(&t2, &t3);
            prop_assert!(d13 <= d12 + d23 + 1e-9);
        }

        #[test]
        fn prop_size_bounds(t1 in tree_strategy(), t2 in tree_strategy()) {
            let n1 = node_count(&t1);
            let n2 = node_count(&t2);
            let d = ted_str(&t1, &t2);
            prop_assert!(d >= (n1 - n2).abs() as f64);
            prop_assert!(d <= (n1 + n2) as f64);
        }

        #[test]
        fn prop_agrees_with_zhang_shasha(t1 in tree_strategy(), t2 in tree_strategy()) {
            let a1 = parse_tree(&t1).unwrap();
            let a2 = parse_tree(&t2).unwrap();
            prop_assume!(a1.count() <= 40 && a2.count() <= 40);
            let apted = edit_distance(&a1, &a2);
            let baseline = zhang_shasha::ted(&a1, &a2);
            prop_assert_eq!(apted, baseline as f64);
        }
    }
}
