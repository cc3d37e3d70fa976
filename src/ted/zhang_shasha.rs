//! Classical Zhang-Shasha tree edit distance over string-labeled trees,
//! kept as a self-contained baseline for the all-path algorithm. Unit
//! costs, O(n*m) forest-distance DP at the LR-keyroots.

use crate::parsing::{tree_root, ParsedTree};
use indextree::NodeId;

/// Tree edit distance between two parsed trees under unit costs.
pub fn ted(t1: &ParsedTree, t2: &ParsedTree) -> usize {
    let f1 = PostorderIndex::new(t1);
    let f2 = PostorderIndex::new(t2);
    let key_roots1 = key_roots(&f1.lld);
    let key_roots2 = key_roots(&f2.lld);

    let mut tree_dist = vec![vec![0usize; f2.len() + 1]; f1.len() + 1];
    for &i in &key_roots1 {
        for &j in &key_roots2 {
            forest_dist(&f1, &f2, i, j, &mut tree_dist);
        }
    }

    tree_dist[f1.len()][f2.len()]
}

/// Labels and leftmost-leaf descendants in postorder, 1-based so the DP
/// below reads like the original formulation.
struct PostorderIndex<'a> {
    labels: Vec<&'a str>,
    lld: Vec<usize>,
}

impl<'a> PostorderIndex<'a> {
    fn new(tree: &'a ParsedTree) -> Self {
        let mut index = PostorderIndex {
            labels: vec![""],
            lld: vec![0],
        };
        index.walk(tree, tree_root(tree));
        index
    }

    fn walk(&mut self, tree: &'a ParsedTree, nid: NodeId) -> usize {
        let mut leftmost = None;
        for cnid in nid.children(tree) {
            let child_idx = self.walk(tree, cnid);
            if leftmost.is_none() {
                leftmost = Some(self.lld[child_idx]);
            }
        }
        let idx = self.labels.len();
        self.labels.push(tree.get(nid).unwrap().get());
        self.lld.push(leftmost.unwrap_or(idx));
        idx
    }

    fn len(&self) -> usize {
        self.labels.len() - 1
    }
}

/// A node is an LR-keyroot iff no node with a larger postorder id shares
/// its leftmost leaf descendant.
fn key_roots(lld: &[usize]) -> Vec<usize> {
    let n = lld.len() - 1;
    let mut last_with_lld = vec![0usize; n + 1];
    for i in 1..=n {
        last_with_lld[lld[i]] = i;
    }
    (1..=n).filter(|&i| last_with_lld[lld[i]] == i).collect()
}

fn forest_dist(
    f1: &PostorderIndex,
    f2: &PostorderIndex,
    i: usize,
    j: usize,
    tree_dist: &mut [Vec<usize>],
) {
    let li = f1.lld[i];
    let lj = f2.lld[j];
    let m = i - li + 2;
    let n = j - lj + 2;

    let mut fd = vec![vec![0usize; n]; m];
    for x in 1..m {
        fd[x][0] = fd[x - 1][0] + 1;
    }
    for y in 1..n {
        fd[0][y] = fd[0][y - 1] + 1;
    }

    for x in 1..m {
        for y in 1..n {
            let i1 = li + x - 1;
            let j1 = lj + y - 1;
            if f1.lld[i1] == li && f2.lld[j1] == lj {
                let rename = usize::from(f1.labels[i1] != f2.labels[j1]);
                fd[x][y] = (fd[x - 1][y] + 1)
                    .min(fd[x][y - 1] + 1)
                    .min(fd[x - 1][y - 1] + rename);
                tree_dist[i1][j1] = fd[x][y];
            } else {
                fd[x][y] = (fd[x - 1][y] + 1)
                    .min(fd[x][y - 1] + 1)
                    .min(fd[f1.lld[i1] - li][f2.lld[j1] - lj] + tree_dist[i1][j1]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_tree;

    fn zs(t1: &str, t2: &str) -> usize {
        let t1 = parse_tree(t1).unwrap();
        let t2 = parse_tree(t2).unwrap();
        ted(&t1, &t2)
    }

    #[test]
    fn test_known_distances() {
        assert_eq!(zs("{a}", "{a}"), 0);
        assert_eq!(zs("{a}", "{b}"), 1);
        assert_eq!(zs("{a{b}{c}}", "{a{c}{b}}"), 2);
        assert_eq!(zs("{a{b{d}}{c}}", "{a{b}{c{d}}}"), 2);
        assert_eq!(zs("{f{d{a}{c{b}}}{e}}", "{f{c{d{a}{b}}}{e}}"), 2);
        assert_eq!(zs("{a}", "{a{b}{c}{d}}"), 3);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("{a{b}{c}}", "{a}"),
            ("{f{d{a}{c{b}}}{e}}", "{f{c{d{a}{b}}}{e}}"),
            ("{x{y{z}}}", "{z{y{x}}}"),
        ];
        for (t1, t2) in pairs {
            assert_eq!(zs(t1, t2), zs(t2, t1));
        }
    }

    #[test]
    fn test_postorder_index() {
        let tree = parse_tree("{f{d{a}{c{b}}}{e}}").unwrap();
        let idx = PostorderIndex::new(&tree);
        assert_eq!(idx.labels[1..], ["a", "b", "c", "d", "e", "f"]);
        assert_eq!(idx.lld[1..], [1, 2, 2, 1, 5, 1]);
    }

    #[test]
    fn test_key_roots() {
        let tree = parse_tree("{f{d{a}{c{b}}}{e}}").unwrap();
        let idx = PostorderIndex::new(&tree);
        assert_eq!(key_roots(&idx.lld), vec![3, 5, 6]);
    }
}
