use indextree::{Arena, NodeId};
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader};
use std::iter::Peekable;
use std::path::Path;
use std::str::CharIndices;
use thiserror::Error;

pub type ParsedTree = Arena<String>;

#[derive(Error, Debug)]
pub enum DatasetParseError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Parse { line: usize, source: TreeParseError },
}

/// Reads a dataset file with one bracket-notation tree per line.
pub fn parse_dataset(dataset_file: &Path) -> Result<Vec<ParsedTree>, DatasetParseError> {
    let f = File::open(dataset_file)?;
    let reader = BufReader::new(f);

    let mut trees = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let tree = parse_tree(&line).map_err(|source| DatasetParseError::Parse {
            line: line_no + 1,
            source,
        })?;
        trees.push(tree);
    }

    Ok(trees)
}

#[derive(Error, Debug)]
pub enum TreeParseError {
    #[error("expected '{{' at byte {at}")]
    MissingOpen { at: usize },
    #[error("expected '}}' at byte {at}")]
    MissingClose { at: usize },
    #[error("input ended inside a tree")]
    UnexpectedEnd,
    #[error("unexpected input after the root tree at byte {at}")]
    TrailingInput { at: usize },
}

/// Parses a tree in bracket notation, e.g. `{a{b}{c}}`, by recursive
/// descent. A label is any run of characters up to the next `{` or `}`;
/// a backslash escapes the following character into the label. The
/// whole input must be one balanced tree.
pub fn parse_tree(input: &str) -> Result<ParsedTree, TreeParseError> {
    let mut tree = Arena::new();
    let mut chars = input.char_indices().peekable();

    parse_subtree(&mut chars, &mut tree, None)?;
    if let Some(&(at, _)) = chars.peek() {
        return Err(TreeParseError::TrailingInput { at });
    }

    Ok(tree)
}

fn parse_subtree(
    chars: &mut Peekable<CharIndices<'_>>,
    tree: &mut ParsedTree,
    parent: Option<NodeId>,
) -> Result<(), TreeParseError> {
    match chars.next() {
        Some((_, '{')) => {}
        Some((at, _)) => return Err(TreeParseError::MissingOpen { at }),
        None => return Err(TreeParseError::UnexpectedEnd),
    }

    let mut label = String::new();
    loop {
        match chars.peek().copied() {
            Some((_, '\\')) => {
                chars.next();
                match chars.next() {
                    Some((_, escaped)) => label.push(escaped),
                    None => return Err(TreeParseError::UnexpectedEnd),
                }
            }
            Some((_, '{' | '}')) => break,
            Some((_, c)) => {
                label.push(c);
                chars.next();
            }
            None => return Err(TreeParseError::UnexpectedEnd),
        }
    }

    let node = tree.new_node(label);
    if let Some(parent) = parent {
        parent.append(node, tree);
    }

    while matches!(chars.peek(), Some((_, '{'))) {
        parse_subtree(chars, tree, Some(node))?;
    }

    match chars.next() {
        Some((_, '}')) => Ok(()),
        Some((at, _)) => Err(TreeParseError::MissingClose { at }),
        None => Err(TreeParseError::UnexpectedEnd),
    }
}

/// Root of a parsed tree. Panics on an empty arena, which `parse_tree`
/// never produces.
pub fn tree_root(tree: &ParsedTree) -> NodeId {
    let Some(root) = tree.iter().next() else {
        panic!("Unable to get root but tree is not empty!");
    };
    tree.get_node_id(root).unwrap()
}

/// Serializes a tree back into bracket notation, escaping braces and
/// backslashes inside labels so the output reparses to the same tree.
pub fn tree_to_string(tree: &ParsedTree) -> String {
    let mut out = String::new();
    write_subtree(tree, tree_root(tree), &mut out);
    out
}

fn write_subtree(tree: &ParsedTree, nid: NodeId, out: &mut String) {
    out.push('{');
    for c in tree.get(nid).unwrap().get().chars() {
        if matches!(c, '{' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    for cnid in nid.children(tree) {
        write_subtree(tree, cnid, out);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(tree: &ParsedTree) -> Vec<String> {
        tree.iter().map(|node| node.get().clone()).collect()
    }

    #[test]
    fn test_parses_nested_tree() {
        let tree = parse_tree("{query{select{name}}{from{users}}}").unwrap();
        assert_eq!(tree.count(), 5);
        assert_eq!(labels(&tree), ["query", "select", "name", "from", "users"]);
    }

    #[test]
    fn test_escaped_braces_land_in_the_label() {
        let tree = parse_tree(r"{dict{key{\{id\}}}{value{42}}}").unwrap();
        assert_eq!(tree.count(), 5);
        assert_eq!(labels(&tree), ["dict", "key", "{id}", "value", "42"]);
    }

    #[test]
    fn test_unicode_labels() {
        let tree = parse_tree("{straße{café}{α}}").unwrap();
        assert_eq!(labels(&tree), ["straße", "café", "α"]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            parse_tree("no brackets here"),
            Err(TreeParseError::MissingOpen { at: 0 })
        ));
        assert!(matches!(parse_tree("{a"), Err(TreeParseError::UnexpectedEnd)));
        assert!(matches!(parse_tree("{a{b}"), Err(TreeParseError::UnexpectedEnd)));
        assert!(matches!(
            parse_tree("{a}{b}"),
            Err(TreeParseError::TrailingInput { at: 3 })
        ));
        assert!(matches!(
            parse_tree("{a{b}x}"),
            Err(TreeParseError::MissingClose { at: 5 })
        ));
    }

    #[test]
    fn test_round_trips() {
        for input in ["{f{d{a}{c{b}}}{e}}", r"{a\{b{c}}", "{}"] {
            let tree = parse_tree(input).unwrap();
            assert_eq!(tree_to_string(&tree), input);
        }
    }

    #[test]
    fn test_descendants_follow_preorder() {
        let tree = parse_tree("{root{alpha{beta}{gamma{delta}}}{omega}}").unwrap();
        let visited: Vec<_> = tree_root(&tree)
            .descendants(&tree)
            .map(|nid| tree.get(nid).unwrap().get().as_str())
            .collect();
        assert_eq!(visited, ["root", "alpha", "beta", "gamma", "delta", "omega"]);
    }
}
