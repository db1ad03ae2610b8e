use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LabelMap, TaskSpec};

/// Prerequisites of one task after label resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPrerequisites {
    /// Durable ids of tasks created in the same batch.
    pub in_batch: Vec<Uuid>,
    /// Durable ids referenced directly; these must already exist.
    pub external: Vec<Uuid>,
}

impl ResolvedPrerequisites {
    pub fn len(&self) -> usize {
        self.in_batch.len() + self.external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_batch.is_empty() && self.external.is_empty()
    }
}

/// Service for validating batches and rewriting batch labels into durable ids
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|&label| label == neighbor) {
                    path.drain(0..cycle_start);
                    path.push(neighbor);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Check a batch before any identifier is assigned.
    ///
    /// Labels must be non-empty and unique, and the in-batch prerequisite
    /// graph must be acyclic (a task listing itself counts as a cycle).
    pub fn validate_batch(&self, specs: &[TaskSpec]) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for spec in specs {
            if spec.label.trim().is_empty() {
                return Err(DomainError::ValidationFailed(
                    "Batch task label cannot be empty".to_string(),
                ));
            }
            if !seen.insert(spec.label.as_str()) {
                return Err(DomainError::ValidationFailed(format!(
                    "Duplicate batch label: {}",
                    spec.label
                )));
            }
        }

        if let Some(cycle) = self.detect_cycle(specs) {
            return Err(DomainError::DependencyCycle(cycle));
        }

        Ok(())
    }

    /// Detect circular dependencies among the labels of a batch.
    ///
    /// Returns the cycle as a closed label path, e.g. `[a, b, a]`.
    pub fn detect_cycle(&self, specs: &[TaskSpec]) -> Option<Vec<String>> {
        let labels: HashSet<&str> = specs.iter().map(|s| s.label.as_str()).collect();

        // Build adjacency list over in-batch references only
        let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
        for spec in specs {
            graph.entry(spec.label.as_str()).or_default().extend(
                spec.prerequisites
                    .iter()
                    .map(String::as_str)
                    .filter(|p| labels.contains(p)),
            );
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        // Walk in submission order so the reported cycle is deterministic
        for spec in specs {
            let label = spec.label.as_str();
            if !visited.contains(label)
                && detect_cycle_util(label, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.into_iter().map(String::from).collect());
            }
        }

        None
    }

    /// Rewrite prerequisite labels into durable ids.
    ///
    /// Labels present in `map` become in-batch ids. Labels absent from the
    /// map are left as given and must therefore be durable ids of existing
    /// tasks; anything else is an unknown reference. Duplicates collapse.
    pub fn resolve(&self, labels: &[String], map: &LabelMap) -> DomainResult<ResolvedPrerequisites> {
        let mut resolved = ResolvedPrerequisites::default();

        for label in labels {
            if let Some(id) = map.get(label) {
                if !resolved.in_batch.contains(&id) {
                    resolved.in_batch.push(id);
                }
                continue;
            }

            let id = Uuid::parse_str(label.trim()).map_err(|_| {
                DomainError::ValidationFailed(format!("Unknown prerequisite: {label}"))
            })?;
            if !resolved.external.contains(&id) && !resolved.in_batch.contains(&id) {
                resolved.external.push(id);
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(label: &str, after: &[&str]) -> TaskSpec {
        let mut s = TaskSpec::new(label, 1, Uuid::new_v4());
        s.prerequisites = after.iter().map(|p| (*p).to_string()).collect();
        s
    }

    #[test]
    fn test_validate_batch_accepts_dag() {
        let resolver = DependencyResolver::new();
        let specs = vec![spec("a", &[]), spec("b", &["a"]), spec("c", &["a", "b"])];
        assert!(resolver.validate_batch(&specs).is_ok());
    }

    #[test]
    fn test_validate_batch_rejects_duplicate_label() {
        let resolver = DependencyResolver::new();
        let specs = vec![spec("a", &[]), spec("a", &[])];
        assert!(matches!(
            resolver.validate_batch(&specs),
            Err(DomainError::ValidationFailed(msg)) if msg.contains("Duplicate")
        ));
    }

    #[test]
    fn test_detect_cycle_with_cycle() {
        let resolver = DependencyResolver::new();
        let specs = vec![spec("a", &["c"]), spec("b", &["a"]), spec("c", &["b"])];
        let cycle = resolver.detect_cycle(&specs).unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let resolver = DependencyResolver::new();
        let specs = vec![spec("a", &["a"])];
        assert!(matches!(
            resolver.validate_batch(&specs),
            Err(DomainError::DependencyCycle(path)) if path == vec!["a".to_string(), "a".to_string()]
        ));
    }

    #[test]
    fn test_external_references_do_not_form_cycles() {
        let resolver = DependencyResolver::new();
        let external = Uuid::new_v4().to_string();
        let specs = vec![spec("a", &[&external])];
        assert!(resolver.detect_cycle(&specs).is_none());
    }

    #[test]
    fn test_resolve_maps_labels_and_passes_ids_through() {
        let resolver = DependencyResolver::new();
        let mut map = LabelMap::new();
        let a = Uuid::new_v4();
        map.insert("a", a);
        let existing = Uuid::new_v4();

        let labels = vec!["a".to_string(), existing.to_string(), "a".to_string()];
        let resolved = resolver.resolve(&labels, &map).unwrap();

        assert_eq!(resolved.in_batch, vec![a]);
        assert_eq!(resolved.external, vec![existing]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_resolve_rejects_unknown_label() {
        let resolver = DependencyResolver::new();
        let err = resolver
            .resolve(&["ghost".to_string()], &LabelMap::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(msg) if msg.contains("ghost")));
    }
}
