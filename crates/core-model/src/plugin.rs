// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-field/type plugin configuration.
//!
//! Plugins are applied in an order derived from their `before`/`after`
//! constraints: the `*` sentinel pins a plugin before (or after) everything
//! else, the rest form a dependency graph resolved by topological sort.
//! Unconstrained plugins keep their insertion order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Sentinel usable in `before`/`after` constraints: every other plugin.
pub const ALL: &str = "*";

const BEFORE_KEY: &str = "before";
const AFTER_KEY: &str = "after";

#[derive(Error, Debug)]
pub enum PluginOrderError {
    #[error("Circular dependency between plugins: {}", .0.join(", "))]
    CircularDependency(Vec<String>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PluginSetting {
    Enabled(bool),
    Settings(serde_json::Map<String, Value>),
}

impl PluginSetting {
    pub fn is_excluded(&self) -> bool {
        matches!(self, PluginSetting::Enabled(false))
    }

    pub fn settings(&self) -> serde_json::Map<String, Value> {
        match self {
            PluginSetting::Enabled(_) => serde_json::Map::new(),
            PluginSetting::Settings(map) => map.clone(),
        }
    }
}

/// Serializes as the bare map, so a config position holding plugins is
/// written `{ "paginate": { ... } }` with no wrapper key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct PluginConfig {
    plugins: IndexMap<String, PluginSetting>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, plugin_id: &str, setting: PluginSetting) {
        self.plugins.insert(plugin_id.to_string(), setting);
    }

    pub fn enable(&mut self, plugin_id: &str) {
        self.set(plugin_id, PluginSetting::Enabled(true));
    }

    pub fn get(&self, plugin_id: &str) -> Option<&PluginSetting> {
        self.plugins.get(plugin_id)
    }

    pub fn has(&self, plugin_id: &str) -> bool {
        self.plugins
            .get(plugin_id)
            .map(|setting| !setting.is_excluded())
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PluginSetting)> {
        self.plugins.iter()
    }

    /// Merges `explicit` over `self`. An explicit entry wins, but nested
    /// settings objects are deep-merged rather than replaced wholesale.
    pub fn merge(&mut self, explicit: &PluginConfig) {
        for (plugin_id, setting) in explicit.plugins.iter() {
            match (self.plugins.get_mut(plugin_id), setting) {
                (
                    Some(PluginSetting::Settings(existing)),
                    PluginSetting::Settings(incoming),
                ) => {
                    deep_merge(existing, incoming);
                }
                (_, setting) => {
                    self.plugins.insert(plugin_id.clone(), setting.clone());
                }
            }
        }
    }

    /// Resolves the application order.
    ///
    /// Plugins excluded with `false` are removed first and never invoked.
    pub fn sorted_plugins(
        &self,
    ) -> Result<Vec<(String, serde_json::Map<String, Value>)>, PluginOrderError> {
        let active: IndexMap<&str, serde_json::Map<String, Value>> = self
            .plugins
            .iter()
            .filter(|(_, setting)| !setting.is_excluded())
            .map(|(id, setting)| (id.as_str(), setting.settings()))
            .collect();

        let mut head = vec![];
        let mut tail = vec![];
        let mut middle = vec![];

        for (id, settings) in active.iter() {
            if constraint(settings, BEFORE_KEY).contains_all() {
                head.push(*id);
            } else if constraint(settings, AFTER_KEY).contains_all() {
                tail.push(*id);
            } else {
                middle.push(*id);
            }
        }

        // Dependency edges among the middle bucket: `a` must run before `b`.
        // Constraints naming an absent plugin are ignored.
        let mut dependencies: IndexMap<&str, Vec<&str>> =
            middle.iter().map(|id| (*id, vec![])).collect();
        for id in middle.iter() {
            let settings = &active[*id];
            for after in constraint(settings, AFTER_KEY).names() {
                if let Some(after) = middle.iter().find(|m| **m == after) {
                    dependencies[*id].push(*after);
                }
            }
            for before in constraint(settings, BEFORE_KEY).names() {
                if middle.iter().any(|m| *m == before) {
                    dependencies[before.as_str()].push(*id);
                }
            }
        }

        let sorted_middle = topological_sort(&middle, &dependencies)?;

        Ok(head
            .into_iter()
            .chain(sorted_middle)
            .chain(tail)
            .map(|id| (id.to_string(), active[id].clone()))
            .collect())
    }
}

enum OrderConstraint {
    None,
    All,
    Names(Vec<String>),
}

impl OrderConstraint {
    fn contains_all(&self) -> bool {
        matches!(self, OrderConstraint::All)
    }

    fn names(&self) -> Vec<String> {
        match self {
            OrderConstraint::Names(names) => names.clone(),
            _ => vec![],
        }
    }
}

fn constraint(settings: &serde_json::Map<String, Value>, key: &str) -> OrderConstraint {
    match settings.get(key) {
        None => OrderConstraint::None,
        Some(Value::String(s)) if s == ALL => OrderConstraint::All,
        Some(Value::String(s)) => OrderConstraint::Names(vec![s.clone()]),
        Some(Value::Array(items)) => OrderConstraint::Names(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        Some(_) => OrderConstraint::None,
    }
}

/// Kahn's algorithm; ties resolved by insertion order so the result is
/// deterministic for a fixed configuration.
fn topological_sort<'a>(
    nodes: &[&'a str],
    dependencies: &IndexMap<&'a str, Vec<&'a str>>,
) -> Result<Vec<&'a str>, PluginOrderError> {
    let mut sorted = vec![];
    let mut remaining: Vec<&str> = nodes.to_vec();

    while !remaining.is_empty() {
        let next = remaining.iter().position(|node| {
            dependencies[*node]
                .iter()
                .all(|dep| !remaining.contains(dep))
        });

        match next {
            Some(index) => sorted.push(remaining.remove(index)),
            None => {
                return Err(PluginOrderError::CircularDependency(trace_cycle(
                    &remaining,
                    dependencies,
                )));
            }
        }
    }

    Ok(sorted)
}

/// Walks unresolved dependency edges from a stuck node until one repeats;
/// the repeated node closes the cycle. Plugins merely downstream of the
/// cycle are not cycle members and are left out of the report.
fn trace_cycle(remaining: &[&str], dependencies: &IndexMap<&str, Vec<&str>>) -> Vec<String> {
    let mut path: Vec<&str> = vec![];
    let mut node = remaining[0];
    loop {
        if let Some(start) = path.iter().position(|seen| *seen == node) {
            return path[start..].iter().map(|s| s.to_string()).collect();
        }
        path.push(node);
        // a stalled sort guarantees every remaining node has an unresolved
        // dependency, so the walk always reaches the cycle
        let unresolved = dependencies[node]
            .iter()
            .copied()
            .find(|dep| remaining.contains(dep));
        node = match unresolved {
            Some(dep) => dep,
            None => return remaining.iter().map(|s| s.to_string()).collect(),
        };
    }
}

fn deep_merge(existing: &mut serde_json::Map<String, Value>, incoming: &serde_json::Map<String, Value>) {
    for (key, value) in incoming.iter() {
        match (existing.get_mut(key), value) {
            (Some(Value::Object(existing_obj)), Value::Object(incoming_obj)) => {
                deep_merge(existing_obj, incoming_obj);
            }
            _ => {
                existing.insert(key.clone(), value.clone());
            }
        }
    }
}
