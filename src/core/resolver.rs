// src/core/resolver.rs

use crate::models::{Script, ScriptId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Dependency '{name}' was not found in any script directory (referenced by: {})", .referenced_by.join(", "))]
    Unresolved {
        name: String,
        referenced_by: Vec<String>,
    },
    #[error("Circular dependency detected among: {}. Scripts ordered before the cycle: [{}]", .remaining.join(", "), .ordered.join(", "))]
    Cycle {
        ordered: Vec<String>,
        remaining: Vec<String>,
    },
}

/// A `requires` annotation with its script reference resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequirement {
    pub source: ScriptId,
    /// The reference as written in the annotation, for messages.
    pub declared: String,
    pub variables: Vec<String>,
}

/// A selected script whose required script is not part of the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRequirement {
    pub script: String,
    pub required: String,
}

/// The discovered scripts in execution order, with every reference resolved.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub ordered: Vec<Script>,
    dependencies: HashMap<ScriptId, Vec<ScriptId>>,
    requirements: HashMap<ScriptId, Vec<ResolvedRequirement>>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn get(&self, id: &ScriptId) -> Option<&Script> {
        self.ordered.iter().find(|s| &s.id == id)
    }

    /// Identities this script runs after (`after` and `requires` together).
    pub fn dependencies_of(&self, id: &ScriptId) -> &[ScriptId] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn requirements_of(&self, id: &ScriptId) -> &[ResolvedRequirement] {
        self.requirements.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// The scripts whose identity is in `keys`, in execution order. Unknown keys are ignored.
    pub fn select(&self, keys: &[String]) -> Vec<Script> {
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        self.ordered
            .iter()
            .filter(|s| wanted.contains(s.id.to_string().as_str()))
            .cloned()
            .collect()
    }

    /// Requirements of `selected` scripts that point outside the selection.
    pub fn missing_requirements(&self, selected: &[Script]) -> Vec<MissingRequirement> {
        let ids: HashSet<&ScriptId> = selected.iter().map(|s| &s.id).collect();
        selected
            .iter()
            .flat_map(|script| {
                self.requirements_of(&script.id)
                    .iter()
                    .filter(|req| !ids.contains(&req.source))
                    .map(|req| MissingRequirement {
                        script: script.name.clone(),
                        required: req.declared.clone(),
                    })
            })
            .collect()
    }
}

/// Resolves a dependency name by probing `dirs` in priority order; the first directory
/// holding a discovered script with that file name wins.
pub fn resolve_name(name: &str, dirs: &[PathBuf], known: &HashSet<ScriptId>) -> Option<ScriptId> {
    dirs.iter()
        .map(|dir| ScriptId::new(dir.clone(), name))
        .find(|candidate| known.contains(candidate))
}

/// Orders `scripts` (given in discovery order) so every script runs after its
/// dependencies. Scripts without a constraint between them keep discovery order.
pub fn resolve(scripts: Vec<Script>, dirs: &[PathBuf]) -> Result<Resolution, ResolveError> {
    let known: HashSet<ScriptId> = scripts.iter().map(|s| s.id.clone()).collect();
    let index: HashMap<&ScriptId, usize> = scripts.iter().enumerate().map(|(i, s)| (&s.id, i)).collect();

    // --- 1. Resolve every distinct name once ---
    let mut referenced_by: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for script in &scripts {
        let names = script
            .dependency_names
            .iter()
            .map(String::as_str)
            .chain(script.requires.iter().map(|r| r.script.as_str()));
        for name in names {
            let entry = referenced_by.entry(name).or_default();
            if entry.is_empty() {
                first_seen.push(name);
            }
            if !entry.contains(&script.name) {
                entry.push(script.name.clone());
            }
        }
    }

    let mut resolved: HashMap<&str, ScriptId> = HashMap::new();
    for name in first_seen {
        match resolve_name(name, dirs, &known) {
            Some(id) => {
                log::debug!("Resolved dependency '{}' -> {}", name, id);
                resolved.insert(name, id);
            }
            None => {
                return Err(ResolveError::Unresolved {
                    name: name.to_string(),
                    referenced_by: referenced_by.remove(name).unwrap_or_default(),
                });
            }
        }
    }

    // --- 2. Build the graph: edge dependency -> dependent ---
    let count = scripts.len();
    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
    let mut dependencies: HashMap<ScriptId, Vec<ScriptId>> = HashMap::new();
    let mut requirements: HashMap<ScriptId, Vec<ResolvedRequirement>> = HashMap::new();

    for (dependent, script) in scripts.iter().enumerate() {
        let mut deps: Vec<ScriptId> = Vec::new();
        let names = script
            .dependency_names
            .iter()
            .chain(script.requires.iter().map(|r| &r.script));
        for name in names {
            let Some(id) = resolved.get(name.as_str()) else {
                continue;
            };
            if let Some(&dependency) = index.get(id)
                && let Some(edges) = successors.get_mut(dependency)
            {
                edges.insert(dependent);
            }
            if !deps.contains(id) {
                deps.push(id.clone());
            }
        }

        let reqs: Vec<ResolvedRequirement> = script
            .requires
            .iter()
            .filter_map(|req| {
                resolved.get(req.script.as_str()).map(|id| ResolvedRequirement {
                    source: id.clone(),
                    declared: req.script.clone(),
                    variables: req.variables.clone(),
                })
            })
            .collect();

        dependencies.insert(script.id.clone(), deps);
        if !reqs.is_empty() {
            requirements.insert(script.id.clone(), reqs);
        }
    }

    // --- 3. Kahn's algorithm, FIFO, seeded in discovery order ---
    let mut in_degree = vec![0usize; count];
    for edges in &successors {
        for &to in edges {
            if let Some(degree) = in_degree.get_mut(to) {
                *degree += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| i)
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(count);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in successors.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    // --- 4. Anything left over sits on or behind a cycle ---
    if order.len() < count {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let name_of = |i: &usize| scripts.get(*i).map(|s| s.name.clone()).unwrap_or_default();
        return Err(ResolveError::Cycle {
            ordered: order.iter().map(name_of).collect(),
            remaining: (0..count)
                .filter(|i| !placed.contains(i))
                .map(|i| name_of(&i))
                .collect(),
        });
    }

    let mut slots: Vec<Option<Script>> = scripts.into_iter().map(Some).collect();
    let ordered: Vec<Script> = order
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect();
    log::debug!(
        "Execution order: {:?}",
        ordered.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
    );

    Ok(Resolution {
        ordered,
        dependencies,
        requirements,
    })
}
