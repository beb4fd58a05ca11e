//! Interning for dotted attribute paths. Every structure keyed per-path
//! (attribute indexes, change buffers, watchers) uses a small copyable
//! `PathId` instead of the path string.

use dashmap::DashMap;
use quarryql::ast::PathExpr;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(u32);

#[derive(Debug)]
struct PathSpec {
    expr: PathExpr,
    parent: Option<PathId>,
}

/// Path interner. Paths are discovered dynamically while walking object
/// graphs, so interning happens on first sight.
#[derive(Debug, Default)]
pub(crate) struct PathTable {
    ids: DashMap<String, PathId>,
    specs: RwLock<Vec<PathSpec>>,
}

impl PathTable {
    pub fn intern(&self, expr: &PathExpr) -> PathId {
        let key = expr.to_string();
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        // parents are interned first so extension checks can walk the chain
        let parent = match expr.steps() {
            [] | [_] => None,
            steps => Some(self.intern(&PathExpr::new(steps[..steps.len() - 1].to_vec()))),
        };
        *self.ids.entry(key).or_insert_with(|| {
            let mut specs = self.specs.write().unwrap();
            let id = PathId(specs.len() as u32);
            specs.push(PathSpec { expr: expr.clone(), parent });
            id
        })
    }

    /// Intern `prefix` extended by one step.
    pub fn join(&self, prefix: Option<PathId>, step: &str) -> PathId {
        let expr = match prefix {
            Some(prefix) => self.expr(prefix).join(step),
            None => PathExpr::new(vec![step.to_string()]),
        };
        self.intern(&expr)
    }

    pub fn lookup(&self, expr: &PathExpr) -> Option<PathId> { self.ids.get(&expr.to_string()).map(|id| *id) }

    pub fn expr(&self, id: PathId) -> PathExpr { self.specs.read().unwrap()[id.0 as usize].expr.clone() }

    /// Is `path` a strict extension of `prefix` (`a.b.c` extends `a.b`)?
    pub fn extends(&self, path: PathId, prefix: PathId) -> bool {
        let specs = self.specs.read().unwrap();
        let mut current = specs[path.0 as usize].parent;
        while let Some(p) = current {
            if p == prefix {
                return true;
            }
            current = specs[p.0 as usize].parent;
        }
        false
    }
}
