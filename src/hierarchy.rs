// Presentation hierarchy storage and depth computation
use crate::taxonomy::Taxonomy;
use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;

/// Edges grouped per parent, parents kept in first-seen order.
#[derive(Debug, Clone)]
pub struct Relationships<T> {
    index: AHashMap<CompactString, usize>,
    groups: Vec<(CompactString, Vec<T>)>,
}

impl<T> Default for Relationships<T> {
    fn default() -> Self {
        Self {
            index: AHashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl<T> Relationships<T> {
    pub(crate) fn push(&mut self, parent: &CompactString, item: T) {
        let slot = match self.index.get(parent) {
            Some(&slot) => slot,
            None => {
                self.groups.push((parent.clone(), Vec::new()));
                self.index.insert(parent.clone(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[slot].1.push(item);
    }

    pub fn get(&self, parent: &str) -> &[T] {
        self.index
            .get(parent)
            .map(|&slot| self.groups[slot].1.as_slice())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.groups
            .iter()
            .map(|(parent, items)| (parent.as_str(), items.as_slice()))
    }

    pub fn parent_count(&self) -> usize {
        self.groups.len()
    }

    pub fn edge_count(&self) -> usize {
        self.groups.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Nesting depth of elements in the presentation hierarchy.
///
/// Roots sit at depth 0 and every other element one below its deepest
/// parent. A parent that is already on the path being walked (a cycle)
/// counts as depth 0. Only depths reached without cutting a cycle are
/// memoised; those do not depend on where the walk started.
pub struct Depths<'a> {
    taxonomy: &'a Taxonomy,
    memo: AHashMap<usize, usize>,
}

struct Frame {
    idx: usize,
    parents: Vec<usize>,
    next: usize,
    depth: usize,
    cut: bool,
}

impl<'a> Depths<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self {
            taxonomy,
            memo: AHashMap::new(),
        }
    }

    pub fn depth_of(&mut self, name: &str) -> usize {
        match self.taxonomy.index_of(name) {
            Some(idx) => self.depth(idx),
            None => 0,
        }
    }

    pub fn depth(&mut self, start: usize) -> usize {
        if let Some(&depth) = self.memo.get(&start) {
            return depth;
        }

        let mut on_path: AHashSet<usize> = AHashSet::new();
        on_path.insert(start);
        let mut stack = vec![self.frame(start)];

        loop {
            let Some(top) = stack.last_mut() else {
                return 0;
            };

            if top.next < top.parents.len() {
                let parent = top.parents[top.next];
                top.next += 1;
                if let Some(&depth) = self.memo.get(&parent) {
                    top.depth = top.depth.max(depth + 1);
                } else if on_path.contains(&parent) {
                    top.depth = top.depth.max(1);
                    top.cut = true;
                } else {
                    on_path.insert(parent);
                    stack.push(self.frame(parent));
                }
                continue;
            }

            let Some(done) = stack.pop() else {
                return 0;
            };
            on_path.remove(&done.idx);
            if !done.cut {
                self.memo.insert(done.idx, done.depth);
            }
            match stack.last_mut() {
                Some(caller) => {
                    caller.depth = caller.depth.max(done.depth + 1);
                    caller.cut |= done.cut;
                }
                None => return done.depth,
            }
        }
    }

    fn frame(&self, idx: usize) -> Frame {
        Frame {
            idx,
            parents: self.taxonomy.parent_indices(idx).collect(),
            next: 0,
            depth: 0,
            cut: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Element;

    fn taxonomy(elements: &[&str], edges: &[(&str, &str)]) -> Taxonomy {
        let mut taxonomy = Taxonomy::default();
        for name in elements {
            taxonomy.insert(Element::new(*name));
        }
        for (order, (parent, child)) in edges.iter().enumerate() {
            let parent = taxonomy.index_of(parent).unwrap();
            let child = taxonomy.index_of(child).unwrap();
            taxonomy.link_presentation(parent, child, order as f64, None);
        }
        taxonomy
    }

    #[test]
    fn test_relationships_group_by_parent_in_first_seen_order() {
        let mut rels: Relationships<u32> = Relationships::default();
        let a = CompactString::new("A");
        let b = CompactString::new("B");
        rels.push(&b, 1);
        rels.push(&a, 2);
        rels.push(&b, 3);

        let parents: Vec<&str> = rels.iter().map(|(p, _)| p).collect();
        assert_eq!(parents, vec!["B", "A"]);
        assert_eq!(rels.get("B"), &[1, 3]);
        assert_eq!(rels.get("missing"), &[] as &[u32]);
        assert_eq!(rels.parent_count(), 2);
        assert_eq!(rels.edge_count(), 3);
    }

    #[test]
    fn test_depth_of_roots_and_chains() {
        let taxonomy = taxonomy(
            &["Root", "Mid", "Leaf", "Other"],
            &[("Root", "Mid"), ("Mid", "Leaf"), ("Root", "Leaf")],
        );
        let mut depths = Depths::new(&taxonomy);
        assert_eq!(depths.depth_of("Root"), 0);
        assert_eq!(depths.depth_of("Other"), 0);
        assert_eq!(depths.depth_of("Mid"), 1);
        // one below its deepest parent
        assert_eq!(depths.depth_of("Leaf"), 2);
        assert_eq!(depths.depth_of("Unknown"), 0);
    }

    #[test]
    fn test_depth_is_finite_on_cycles() {
        let taxonomy = taxonomy(
            &["A", "B", "C", "Self"],
            &[("A", "B"), ("B", "C"), ("C", "A"), ("Self", "Self")],
        );
        let mut depths = Depths::new(&taxonomy);
        assert_eq!(depths.depth_of("A"), 3);
        assert_eq!(depths.depth_of("B"), 3);
        assert_eq!(depths.depth_of("C"), 3);
        assert_eq!(depths.depth_of("Self"), 1);
    }

    #[test]
    fn test_depth_does_not_depend_on_query_order() {
        let names = ["A", "B", "C", "D"];
        let taxonomy = taxonomy(&names, &[("A", "B"), ("B", "C"), ("C", "A"), ("B", "D")]);

        let mut forward = Depths::new(&taxonomy);
        let forward: Vec<usize> = names.iter().map(|n| forward.depth_of(n)).collect();
        let mut backward = Depths::new(&taxonomy);
        let mut reversed: Vec<usize> = names.iter().rev().map(|n| backward.depth_of(n)).collect();
        reversed.reverse();

        assert_eq!(forward, reversed);
        assert_eq!(forward, vec![3, 3, 3, 4]);
    }

    #[test]
    fn test_acyclic_depths_survive_memoisation() {
        let taxonomy = taxonomy(
            &["Root", "Mid", "Leaf", "Tail"],
            &[("Root", "Mid"), ("Mid", "Leaf"), ("Leaf", "Tail"), ("Root", "Tail")],
        );
        let mut depths = Depths::new(&taxonomy);
        assert_eq!(depths.depth_of("Leaf"), 2);
        assert_eq!(depths.depth_of("Tail"), 3);
        assert_eq!(Depths::new(&taxonomy).depth_of("Tail"), 3);
    }
}
