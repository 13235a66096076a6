use crate::calculations::CalculationError;
use crate::component::{Calculation, Component};
use chrono::NaiveDate;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// The dependency graph of everything that must be evaluated on one date.
///
/// Nodes are component indices into the caller's slice; edges run
/// dependency -> dependent. Beyond the firing set itself, the graph pulls
/// in every component reachable through `dependencies` that has a
/// calculation on the date, so a dependency participates even when it
/// does not fire.
pub struct DependencyDag<'a> {
    pub graph: DiGraph<usize, ()>,
    pub id_to_node: HashMap<&'a str, NodeIndex>,
    /// Per component index: the value-map period key and calculation in
    /// effect on the date.
    pub calculations: HashMap<usize, (&'a str, &'a Calculation)>,
}

impl<'a> DependencyDag<'a> {
    /// Builds the graph for `date`, starting from the firing component
    /// indices and following dependency ids outward.
    ///
    /// A dependency id that is unknown, or that names a component with no
    /// calculation on this date, fails with `DependencyNotFound` naming
    /// the referrer.
    pub fn build(
        components: &'a [Component],
        by_id: &HashMap<&'a str, usize>,
        date: NaiveDate,
        firing: &[usize],
    ) -> Result<Self, CalculationError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut id_to_node: HashMap<&'a str, NodeIndex> = HashMap::new();
        let mut calculations: HashMap<usize, (&'a str, &'a Calculation)> = HashMap::new();

        // The firing components are known to have a calculation today.
        let mut pending: Vec<usize> = firing.to_vec();
        while let Some(index) = pending.pop() {
            let component = &components[index];
            if id_to_node.contains_key(component.id.as_str()) {
                continue;
            }
            let Some((period_key, calculation)) = component.calculation_on(date) else {
                // Only reachable for firing entries, which always resolve;
                // dependencies are checked before they are queued.
                continue;
            };
            let node = graph.add_node(index);
            id_to_node.insert(component.id.as_str(), node);
            calculations.insert(index, (period_key, calculation));

            for dependency_id in &calculation.dependencies {
                let resolved = by_id.get(dependency_id.as_str()).and_then(|&dep_index| {
                    components[dep_index]
                        .calculation_on(date)
                        .map(|found| (dep_index, found))
                });
                let Some((dep_index, (dep_key, dep_calculation))) = resolved else {
                    return Err(CalculationError::DependencyNotFound {
                        id: dependency_id.clone(),
                        referrer: component.id.clone(),
                    });
                };
                calculations.insert(dep_index, (dep_key, dep_calculation));
                pending.push(dep_index);
            }
        }

        // Edges in a second sweep, once every node exists. Walking nodes in
        // insertion order keeps the graph, and with it the evaluation
        // order, deterministic.
        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for dependent in nodes {
            let index = graph[dependent];
            let (_, calculation) = calculations[&index];
            for dependency_id in &calculation.dependencies {
                let dependency = id_to_node[dependency_id.as_str()];
                graph.update_edge(dependency, dependent, ());
            }
        }

        Ok(Self {
            graph,
            id_to_node,
            calculations,
        })
    }
}
