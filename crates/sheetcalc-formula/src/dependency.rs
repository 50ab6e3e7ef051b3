//! Dependency tracking for cache invalidation
//!
//! Edges are recorded while formulas are evaluated: every cell or area a
//! formula cell reads becomes one of its precedents. Area edges are kept
//! whole, so a write anywhere inside a full-column range reaches the formulas
//! reading it without one edge per cell.

use ahash::{AHashMap, AHashSet};
use sheetcalc_core::{CellAddress, RangeAddress};
use std::collections::VecDeque;

/// Something a formula cell read during its last evaluation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Precedent {
    Cell(CellAddress),
    Area(RangeAddress),
}

/// Dependency graph for formula cells
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → formula cells that read it directly
    dependents: AHashMap<CellAddress, AHashSet<CellAddress>>,
    /// Area → formula cells that read it
    area_dependents: AHashMap<RangeAddress, AHashSet<CellAddress>>,
    /// Formula cell → what it read
    precedents: AHashMap<CellAddress, AHashSet<Precedent>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `dependent` read `precedent`
    pub fn add_dependency(&mut self, precedent: Precedent, dependent: CellAddress) {
        match &precedent {
            Precedent::Cell(cell) => {
                self.dependents
                    .entry(cell.clone())
                    .or_default()
                    .insert(dependent.clone());
            }
            Precedent::Area(area) => {
                self.area_dependents
                    .entry(area.clone())
                    .or_default()
                    .insert(dependent.clone());
            }
        }
        self.precedents.entry(dependent).or_default().insert(precedent);
    }

    /// Forget everything `cell` read
    ///
    /// Edges from other formulas to `cell` are kept.
    pub fn clear_precedents(&mut self, cell: &CellAddress) {
        let Some(precedents) = self.precedents.remove(cell) else {
            return;
        };
        for precedent in precedents {
            match precedent {
                Precedent::Cell(p) => remove_edge(&mut self.dependents, &p, cell),
                Precedent::Area(p) => remove_edge(&mut self.area_dependents, &p, cell),
            }
        }
    }

    /// What `cell` read during its last evaluation
    pub fn get_precedents(&self, cell: &CellAddress) -> impl Iterator<Item = &Precedent> + '_ {
        self.precedents.get(cell).into_iter().flatten()
    }

    /// Formula cells that read `cell` directly or through an area
    pub fn direct_dependents(&self, cell: &CellAddress) -> Vec<CellAddress> {
        let mut result: Vec<CellAddress> = self
            .dependents
            .get(cell)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        for (area, readers) in &self.area_dependents {
            if area.contains(cell) {
                result.extend(readers.iter().cloned());
            }
        }
        result
    }

    /// Every formula cell whose value may change when `changed` changes
    ///
    /// Breadth-first, nearest dependents first. Cycles are followed once;
    /// `changed` itself is included only when it sits on a cycle.
    pub fn transitive_dependents(&self, changed: &CellAddress) -> Vec<CellAddress> {
        let mut result = Vec::new();
        let mut visited = AHashSet::new();
        let mut queue = VecDeque::from([changed.clone()]);

        while let Some(cell) = queue.pop_front() {
            for dependent in self.direct_dependents(&cell) {
                if visited.insert(dependent.clone()) {
                    result.push(dependent.clone());
                    queue.push_back(dependent);
                }
            }
        }

        result
    }

    /// Number of formula cells with recorded precedents
    pub fn len(&self) -> usize {
        self.precedents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    /// Remove every edge
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.area_dependents.clear();
        self.precedents.clear();
    }
}

fn remove_edge<K: std::hash::Hash + Eq>(
    map: &mut AHashMap<K, AHashSet<CellAddress>>,
    key: &K,
    dependent: &CellAddress,
) {
    if let Some(set) = map.get_mut(key) {
        set.remove(dependent);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32, col: u32) -> CellAddress {
        CellAddress::new("Sheet1", row, col)
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();

        // A1 = B1 + C1
        graph.add_dependency(Precedent::Cell(cell(1, 2)), cell(1, 1));
        graph.add_dependency(Precedent::Cell(cell(1, 3)), cell(1, 1));

        assert_eq!(graph.direct_dependents(&cell(1, 2)), vec![cell(1, 1)]);
        assert_eq!(graph.get_precedents(&cell(1, 1)).count(), 2);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_transitive_dependents() {
        let mut graph = DependencyGraph::new();

        // A1 = B1, B1 = C1
        graph.add_dependency(Precedent::Cell(cell(1, 2)), cell(1, 1));
        graph.add_dependency(Precedent::Cell(cell(1, 3)), cell(1, 2));

        assert_eq!(
            graph.transitive_dependents(&cell(1, 3)),
            vec![cell(1, 2), cell(1, 1)]
        );
        assert!(graph.transitive_dependents(&cell(1, 1)).is_empty());
    }

    #[test]
    fn test_area_dependents() {
        let mut graph = DependencyGraph::new();

        // D1 = SUM(A:A)
        let column = RangeAddress::full_columns("Sheet1", 1, 1);
        graph.add_dependency(Precedent::Area(column), cell(1, 4));

        assert_eq!(graph.direct_dependents(&cell(50_000, 1)), vec![cell(1, 4)]);
        assert!(graph.direct_dependents(&cell(1, 2)).is_empty());
        assert!(graph
            .direct_dependents(&CellAddress::new("Other", 1, 1))
            .is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let mut graph = DependencyGraph::new();

        // A1 = B1, B1 = A1
        graph.add_dependency(Precedent::Cell(cell(1, 2)), cell(1, 1));
        graph.add_dependency(Precedent::Cell(cell(1, 1)), cell(1, 2));

        let dirty = graph.transitive_dependents(&cell(1, 1));
        assert_eq!(dirty.len(), 2);
        assert!(dirty.contains(&cell(1, 1)));
    }

    #[test]
    fn test_clear_precedents() {
        let mut graph = DependencyGraph::new();

        graph.add_dependency(Precedent::Cell(cell(1, 2)), cell(1, 1));
        graph.add_dependency(
            Precedent::Area(RangeAddress::from_indices("Sheet1", 1, 3, 5, 3)),
            cell(1, 1),
        );
        // C9 = A1
        graph.add_dependency(Precedent::Cell(cell(1, 1)), cell(9, 3));

        graph.clear_precedents(&cell(1, 1));

        assert!(graph.direct_dependents(&cell(1, 2)).is_empty());
        assert!(graph.direct_dependents(&cell(3, 3)).is_empty());
        assert_eq!(graph.direct_dependents(&cell(1, 1)), vec![cell(9, 3)]);

        graph.clear();
        assert!(graph.is_empty());
    }
}
