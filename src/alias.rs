//! Alias indirection
//!
//! The graph stores every alias already resolved to its terminal target, so a
//! lookup is a single map probe. Insertions keep that invariant: a single
//! [`AliasGraph::add`] repoints the aliases it supersedes, and
//! [`AliasGraph::extend`] re-resolves the whole proposed map in one linear,
//! iterative pass.

use crate::{DiError, Result};
use ahash::RandomState;
use std::collections::{HashMap, HashSet};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Alias name → resolved target name.
#[derive(Debug, Clone, Default)]
pub struct AliasGraph {
    aliases: HashMap<String, String, RandomState>,
}

impl AliasGraph {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether `name` is an alias.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// The stored (terminal) target of `alias`, if it is one.
    #[inline]
    pub fn target(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Iterate over `(alias, target)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, t)| (a.as_str(), t.as_str()))
    }

    /// Follow alias edges from `name` to the first name that is not an alias.
    ///
    /// Returns `name` itself when it is not an alias.
    pub fn resolve<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        let mut current = name;
        let mut seen: Vec<&str> = Vec::new();

        while let Some(next) = self.aliases.get(current) {
            if let Some(pos) = seen.iter().position(|s| *s == current) {
                let mut cycle = seen[pos..].to_vec();
                cycle.push(current);
                return Err(DiError::cyclic_alias(cycle));
            }
            seen.push(current);
            current = next.as_str();
        }

        Ok(current)
    }

    /// Register `alias -> target`.
    ///
    /// `target` is resolved through the existing aliases first. Aliases that
    /// used to point at `alias` are repointed at the new terminal target. On a
    /// cycle nothing is changed.
    pub fn add(&mut self, alias: &str, target: &str) -> Result<()> {
        let resolved = self.target(target).unwrap_or(target).to_owned();

        if resolved == alias {
            let cycle = if target == alias {
                vec![alias, alias]
            } else {
                vec![alias, target, alias]
            };
            return Err(DiError::cyclic_alias(cycle));
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "service_locator",
            alias = alias,
            resolved = resolved.as_str(),
            "Mapping alias"
        );

        for existing in self.aliases.values_mut() {
            if existing == alias {
                existing.clone_from(&resolved);
            }
        }
        self.aliases.insert(alias.to_owned(), resolved);

        Ok(())
    }

    /// Merge `incoming` over the current aliases and re-resolve everything.
    ///
    /// Incoming entries win over existing ones. Either the whole batch is
    /// applied or, on a cycle, the graph is left untouched.
    pub fn extend<I, A, T>(&mut self, incoming: I) -> Result<()>
    where
        I: IntoIterator<Item = (A, T)>,
        A: Into<String>,
        T: Into<String>,
    {
        let mut proposed = self.aliases.clone();
        for (alias, target) in incoming {
            proposed.insert(alias.into(), target.into());
        }

        self.aliases = Self::bulk_resolve(&proposed)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            alias_count = self.aliases.len(),
            "Alias definitions resolved"
        );

        Ok(())
    }

    /// Resolve every alias of `raw` to its terminal target.
    ///
    /// Each walk tracks the names on its own path; reaching one of them again
    /// is a cycle. Names resolved by an earlier walk are tagged and end any
    /// later walk that reaches them, so every alias is visited once.
    pub fn bulk_resolve(
        raw: &HashMap<String, String, RandomState>,
    ) -> Result<HashMap<String, String, RandomState>> {
        let mut resolved: HashMap<String, String, RandomState> =
            HashMap::with_capacity_and_hasher(raw.len(), RandomState::new());

        for start in raw.keys() {
            if resolved.contains_key(start) {
                continue;
            }

            let mut path: Vec<&str> = Vec::new();
            let mut on_path: HashSet<&str, RandomState> = HashSet::default();
            let mut cursor = start.as_str();

            let terminal = loop {
                if let Some(done) = resolved.get(cursor) {
                    break done.clone();
                }
                let Some(next) = raw.get(cursor) else {
                    break cursor.to_owned();
                };
                if !on_path.insert(cursor) {
                    let pos = path.iter().position(|n| *n == cursor).unwrap_or(0);
                    let mut cycle: Vec<&str> = path[pos..].to_vec();
                    cycle.push(cursor);
                    return Err(DiError::cyclic_alias(cycle));
                }
                path.push(cursor);
                cursor = next.as_str();
            };

            for alias in path {
                resolved.insert(alias.to_owned(), terminal.clone());
            }
        }

        Ok(resolved)
    }
}
