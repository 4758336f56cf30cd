//! Local variables of a function body.
//!
//! A [`LocalTable`] owns every variable an instruction can define or use: parameters, declared
//! names, synthetic temporaries created by instruction lowering, and SSA versions created by the
//! SSA former. Versions keep a back-reference to the variable they were renamed from, so
//! consumers can always recover the source-level identity.

use std::{collections::HashMap, fmt, ops::Index};

/// Identifier of a local in a [`LocalTable`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub(crate) usize);

impl LocalId {
    /// Creates a local identifier from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        LocalId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// Where a local comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalKind {
    /// Function parameter with its position
    Parameter(usize),
    /// Source-level name (declared or free)
    Declared,
    /// Compiler-introduced temporary without a source name
    Temporary,
}

/// A local variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    /// Source name, or `%tN` for temporaries
    pub name: String,
    /// Origin of the variable
    pub kind: LocalKind,
    /// SSA version, `0` for the original variable
    pub version: u32,
    /// The original variable of an SSA version
    pub original: Option<LocalId>,
}

impl Local {
    /// Returns `true` for SSA versions.
    #[must_use]
    pub fn is_version(&self) -> bool {
        self.original.is_some()
    }
}

/// Arena of the locals of one body.
#[derive(Debug, Clone, Default)]
pub struct LocalTable {
    locals: Vec<Local>,
    by_name: HashMap<String, LocalId>,
    next_temporary: usize,
}

impl LocalTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, local: Local) -> LocalId {
        let id = LocalId(self.locals.len());
        self.locals.push(local);
        id
    }

    /// Registers parameter `index` under `name`.
    pub fn parameter(&mut self, name: &str, index: usize) -> LocalId {
        let id = self.push(Local {
            name: name.to_string(),
            kind: LocalKind::Parameter(index),
            version: 0,
            original: None,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Returns the local named `name`, creating a declared local if it does not exist yet.
    pub fn declare(&mut self, name: &str) -> LocalId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = self.push(Local {
            name: name.to_string(),
            kind: LocalKind::Declared,
            version: 0,
            original: None,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Looks up a source-level name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<LocalId> {
        self.by_name.get(name).copied()
    }

    /// Creates a fresh synthetic temporary.
    pub fn temporary(&mut self) -> LocalId {
        let name = format!("%t{}", self.next_temporary);
        self.next_temporary += 1;
        self.push(Local {
            name,
            kind: LocalKind::Temporary,
            version: 0,
            original: None,
        })
    }

    /// Creates SSA version `version` of `original`.
    pub fn version(&mut self, original: LocalId, version: u32) -> LocalId {
        let root = self.original(original);
        let source = &self.locals[root.0];
        let local = Local {
            name: source.name.clone(),
            kind: source.kind,
            version,
            original: Some(root),
        };
        self.push(local)
    }

    /// Returns the local behind `id`.
    #[must_use]
    pub fn get(&self, id: LocalId) -> Option<&Local> {
        self.locals.get(id.0)
    }

    /// Returns `true` if `id` is a synthetic temporary (or a version of one).
    #[must_use]
    pub fn is_temporary(&self, id: LocalId) -> bool {
        self.get(id)
            .is_some_and(|local| local.kind == LocalKind::Temporary)
    }

    /// Returns the pre-SSA variable of `id` (itself for originals).
    #[must_use]
    pub fn original(&self, id: LocalId) -> LocalId {
        self.get(id).and_then(|local| local.original).unwrap_or(id)
    }

    /// All SSA versions of `original`, in creation order.
    #[must_use]
    pub fn versions_of(&self, original: LocalId) -> Vec<LocalId> {
        self.iter()
            .filter(|(_, local)| local.original == Some(original))
            .map(|(id, _)| id)
            .collect()
    }

    /// Human readable name, `x#2` for versions.
    #[must_use]
    pub fn display(&self, id: LocalId) -> String {
        match self.get(id) {
            Some(local) if local.version > 0 => format!("{}#{}", local.name, local.version),
            Some(local) => local.name.clone(),
            None => id.to_string(),
        }
    }

    /// Number of locals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locals.len()
    }

    /// Returns `true` if the table holds no locals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    /// Iterates over all locals.
    pub fn iter(&self) -> impl Iterator<Item = (LocalId, &Local)> {
        self.locals
            .iter()
            .enumerate()
            .map(|(index, local)| (LocalId(index), local))
    }
}

impl Index<LocalId> for LocalTable {
    type Output = Local;

    fn index(&self, id: LocalId) -> &Self::Output {
        &self.locals[id.0]
    }
}
