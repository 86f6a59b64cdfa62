//! Hierarchical names, hash-consed.
//!
//! A name is a path of string and numeric components. Interning makes name
//! equality an id comparison, which the attribute tables and the
//! specialization cache rely on.

use minuet_utils::arena::*;
use std::ops::Index;

new_key_type! {
    pub struct NameId;
}

/// One component of a hierarchical name, linked to its prefix.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum NameNode {
    Root,
    Str(NameId, String),
    Num(NameId, u64),
}

pub struct NameArena {
    intern: ArenaIntern<NameId, NameNode>,
    root: NameId,
}

impl Index<&NameId> for NameArena {
    type Output = NameNode;
    fn index(&self, id: &NameId) -> &Self::Output {
        &self.intern[id]
    }
}

impl NameArena {
    pub fn new(allocator: IndexAlloc<usize>) -> Self {
        let mut intern = ArenaIntern::new(allocator);
        let root = intern.intern(NameNode::Root);
        NameArena { intern, root }
    }

    pub fn root(&self) -> NameId {
        self.root
    }

    pub fn str(&mut self, prefix: NameId, part: impl Into<String>) -> NameId {
        self.intern.intern(NameNode::Str(prefix, part.into()))
    }

    pub fn num(&mut self, prefix: NameId, part: u64) -> NameId {
        self.intern.intern(NameNode::Num(prefix, part))
    }

    /// A single-component name under the root.
    pub fn simple(&mut self, part: impl Into<String>) -> NameId {
        let root = self.root;
        self.str(root, part)
    }

    pub fn prefix(&self, name: NameId) -> Option<NameId> {
        match &self.intern[&name] {
            | NameNode::Root => None,
            | NameNode::Str(prefix, _) | NameNode::Num(prefix, _) => Some(*prefix),
        }
    }

    pub fn is_atomic(&self, name: NameId) -> bool {
        self.prefix(name) == Some(self.root)
    }

    /// Whether any component is compiler-generated, i.e. starts with `_`.
    pub fn is_internal(&self, name: NameId) -> bool {
        let mut cur = name;
        loop {
            match &self.intern[&cur] {
                | NameNode::Root => return false,
                | NameNode::Str(prefix, part) => {
                    if part.starts_with('_') {
                        return true;
                    }
                    cur = *prefix;
                }
                | NameNode::Num(prefix, _) => cur = *prefix,
            }
        }
    }

    /// The last component, when it is a string.
    pub fn last_str(&self, name: NameId) -> Option<&str> {
        match &self.intern[&name] {
            | NameNode::Str(_, part) => Some(part),
            | _ => None,
        }
    }

    /// Appends all components of `ext` onto `base`.
    pub fn join(&mut self, base: NameId, ext: NameId) -> NameId {
        match self.intern[&ext].clone() {
            | NameNode::Root => base,
            | NameNode::Str(prefix, part) => {
                let prefix = self.join(base, prefix);
                self.str(prefix, part)
            }
            | NameNode::Num(prefix, part) => {
                let prefix = self.join(base, prefix);
                self.num(prefix, part)
            }
        }
    }

    /// Suffixes the last string component with `_idx`; falls back to a fresh
    /// `_idx` component when the last one is not a string.
    pub fn append_after(&mut self, name: NameId, idx: u64) -> NameId {
        match self.intern[&name].clone() {
            | NameNode::Str(prefix, part) => self.str(prefix, format!("{}_{}", part, idx)),
            | _ => self.str(name, format!("_{}", idx)),
        }
    }

    pub fn display(&self, name: NameId) -> String {
        let mut parts = Vec::new();
        let mut cur = name;
        loop {
            match &self.intern[&cur] {
                | NameNode::Root => break,
                | NameNode::Str(prefix, part) => {
                    parts.push(part.clone());
                    cur = *prefix;
                }
                | NameNode::Num(prefix, part) => {
                    parts.push(format!("{}", part));
                    cur = *prefix;
                }
            }
        }
        if parts.is_empty() {
            return "[anonymous]".to_string();
        }
        parts.reverse();
        parts.join(".")
    }
}
