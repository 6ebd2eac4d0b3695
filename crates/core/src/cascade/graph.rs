use std::collections::{BTreeMap, BTreeSet};

use super::{CascadeEdge, CascadeTrigger};
use crate::record::EntityType;

/// Edges leaving `parent` that fire on `trigger`.
pub fn edges_for<'a>(
    edges: &'a [CascadeEdge],
    parent: &'a EntityType,
    trigger: CascadeTrigger,
) -> impl Iterator<Item = &'a CascadeEdge> + 'a {
    edges
        .iter()
        .filter(move |e| &e.parent == parent && e.trigger == trigger)
}

/// Finds cycles in the parent -> child graph.
///
/// Each cycle is reported once, rotated so its smallest entity type comes
/// first. Self-referencing edges are cycles of length one.
pub fn find_cycles(edges: &[CascadeEdge]) -> Vec<Vec<EntityType>> {
    let mut graph: BTreeMap<&EntityType, BTreeSet<&EntityType>> = BTreeMap::new();
    for edge in edges {
        graph.entry(&edge.parent).or_default().insert(&edge.child);
    }

    let mut found: BTreeSet<Vec<EntityType>> = BTreeSet::new();
    for start in graph.keys() {
        let mut path = vec![*start];
        walk(&graph, &mut path, &mut found);
    }
    found.into_iter().collect()
}

fn walk<'a>(
    graph: &BTreeMap<&'a EntityType, BTreeSet<&'a EntityType>>,
    path: &mut Vec<&'a EntityType>,
    found: &mut BTreeSet<Vec<EntityType>>,
) {
    let Some(current) = path.last().copied() else {
        return;
    };
    let Some(children) = graph.get(current) else {
        return;
    };

    for child in children {
        if let Some(pos) = path.iter().position(|node| node == child) {
            found.insert(canonical(&path[pos..]));
            continue;
        }
        path.push(*child);
        walk(graph, path, found);
        path.pop();
    }
}

fn canonical(cycle: &[&EntityType]) -> Vec<EntityType> {
    let min = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, node)| **node)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[min..]
        .iter()
        .chain(cycle[..min].iter())
        .map(|node| (*node).clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cycle: &[EntityType]) -> Vec<&str> {
        cycle.iter().map(EntityType::as_str).collect()
    }

    #[test]
    fn test_edges_for_filters_parent_and_trigger() {
        let edges = vec![
            CascadeEdge::soft_delete("store", "storeAssignment", "storeId"),
            CascadeEdge::soft_delete("saleTransaction", "saleTransactionHistory", "transactionId"),
        ];
        let parent = EntityType::new("store");
        let hits: Vec<_> = edges_for(&edges, &parent, CascadeTrigger::OnDelete).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].child.as_str(), "storeAssignment");
        assert_eq!(edges_for(&edges, &parent, CascadeTrigger::OnUpdate).count(), 0);
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let edges = vec![
            CascadeEdge::soft_delete("a", "b", "aId"),
            CascadeEdge::soft_delete("b", "c", "bId"),
            CascadeEdge::soft_delete("a", "c", "aId"),
        ];
        assert!(find_cycles(&edges).is_empty());
    }

    #[test]
    fn test_cycle_reported_once() {
        let edges = vec![
            CascadeEdge::soft_delete("b", "c", "bId"),
            CascadeEdge::soft_delete("c", "a", "cId"),
            CascadeEdge::soft_delete("a", "b", "aId"),
        ];
        let cycles = find_cycles(&edges);
        assert_eq!(cycles.len(), 1);
        assert_eq!(names(&cycles[0]), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let edges = vec![CascadeEdge::soft_delete("category", "category", "parentId")];
        let cycles = find_cycles(&edges);
        assert_eq!(cycles.len(), 1);
        assert_eq!(names(&cycles[0]), vec!["category"]);
    }
}
