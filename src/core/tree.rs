//! Flattening of expandable trees into list rows

use std::collections::BTreeSet;

pub trait TreeItem: Sized {
    /// Stable key used for expansion state (a path).
    fn key(&self) -> &str;
    fn label(&self) -> &str;
    fn is_folder(&self) -> bool;
    fn children(&self) -> &[Self];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    pub key: String,
    pub label: String,
    pub depth: usize,
    pub is_folder: bool,
    pub expanded: bool,
    /// Child indexes from the roots down to this node
    pub index_path: Vec<usize>,
}

/// Depth-first rows; children appear only under expanded folders.
pub fn flatten<T: TreeItem>(roots: &[T], expanded: &BTreeSet<String>) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    let mut path = Vec::new();
    push_rows(roots, expanded, 0, &mut path, &mut rows);
    rows
}

fn push_rows<T: TreeItem>(
    nodes: &[T],
    expanded: &BTreeSet<String>,
    depth: usize,
    path: &mut Vec<usize>,
    rows: &mut Vec<FlatRow>,
) {
    for (index, node) in nodes.iter().enumerate() {
        path.push(index);
        let is_expanded = node.is_folder() && expanded.contains(node.key());
        rows.push(FlatRow {
            key: node.key().to_string(),
            label: node.label().to_string(),
            depth,
            is_folder: node.is_folder(),
            expanded: is_expanded,
            index_path: path.clone(),
        });
        if is_expanded {
            push_rows(node.children(), expanded, depth + 1, path, rows);
        }
        path.pop();
    }
}

/// Flip expansion for `key`; returns whether it is now expanded.
pub fn toggle(expanded: &mut BTreeSet<String>, key: &str) -> bool {
    if expanded.remove(key) {
        false
    } else {
        expanded.insert(key.to_string());
        true
    }
}

pub fn resolve<'a, T: TreeItem>(roots: &'a [T], index_path: &[usize]) -> Option<&'a T> {
    let (first, rest) = index_path.split_first()?;
    let mut node = roots.get(*first)?;
    for index in rest {
        node = node.children().get(*index)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        path: String,
        children: Vec<Node>,
        folder: bool,
    }

    impl TreeItem for Node {
        fn key(&self) -> &str {
            &self.path
        }
        fn label(&self) -> &str {
            self.path.rsplit('/').next().unwrap_or(&self.path)
        }
        fn is_folder(&self) -> bool {
            self.folder
        }
        fn children(&self) -> &[Self] {
            &self.children
        }
    }

    fn leaf(path: &str) -> Node {
        Node {
            path: path.into(),
            children: Vec::new(),
            folder: false,
        }
    }

    fn folder(path: &str, children: Vec<Node>) -> Node {
        Node {
            path: path.into(),
            children,
            folder: true,
        }
    }

    fn sample() -> Vec<Node> {
        vec![
            folder(
                "shared",
                vec![
                    folder("shared/team", vec![leaf("shared/team/bugs")]),
                    leaf("shared/active"),
                ],
            ),
            leaf("mine"),
        ]
    }

    fn keys(rows: &[FlatRow]) -> Vec<&str> {
        rows.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_collapsed_hides_descendants() {
        let rows = flatten(&sample(), &BTreeSet::new());
        assert_eq!(keys(&rows), vec!["shared", "mine"]);
    }

    #[test]
    fn test_expanded_shows_direct_children_only() {
        let mut expanded = BTreeSet::new();
        assert!(toggle(&mut expanded, "shared"));
        let rows = flatten(&sample(), &expanded);
        assert_eq!(
            keys(&rows),
            vec!["shared", "shared/team", "shared/active", "mine"]
        );
        assert_eq!(rows[1].depth, 1);
        assert!(!rows[1].expanded);
    }

    #[test]
    fn test_double_toggle_restores_state() {
        let roots = sample();
        let mut expanded = BTreeSet::new();
        toggle(&mut expanded, "shared");
        let before = flatten(&roots, &expanded);
        toggle(&mut expanded, "shared/team");
        toggle(&mut expanded, "shared/team");
        assert_eq!(flatten(&roots, &expanded), before);
    }

    #[test]
    fn test_resolve_by_index_path() {
        let roots = sample();
        let mut expanded = BTreeSet::new();
        toggle(&mut expanded, "shared");
        toggle(&mut expanded, "shared/team");
        let rows = flatten(&roots, &expanded);
        let bugs = rows.iter().find(|r| r.key == "shared/team/bugs").expect("row");
        assert_eq!(bugs.index_path, vec![0, 0, 0]);
        assert_eq!(
            resolve(&roots, &bugs.index_path).map(|n| n.key()),
            Some("shared/team/bugs")
        );
        assert!(resolve(&roots, &[5]).is_none());
    }
}
