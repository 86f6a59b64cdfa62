//! The environment.
//!
//! An explicit value threaded through every pass: declaration lookup, case
//! registries, attributes, and the persistent specialization tables. Passes
//! take it and hand back the updated copy, so downstream compilation units
//! see everything recorded here.

use crate::{arena::*, err::*, syntax::*};
use indexmap::IndexMap;
use minuet_syntax::NameArena;
use std::collections::{HashMap, HashSet};

/* ------------------------------ Declarations ------------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstKind {
    Defn,
    Axiom,
    Ctor,
}

#[derive(Clone, Debug)]
pub struct ConstInfo {
    pub name: NameId,
    pub ty: ExprId,
    /// compiled body for definitions
    pub value: Option<ExprId>,
    pub kind: ConstKind,
}

impl ConstInfo {
    pub fn is_definition(&self) -> bool {
        matches!(self.kind, ConstKind::Defn) && self.value.is_some()
    }
}

/// Argument positions of the minor premises in a fully applied case head.
/// Everything before `minors_begin` is parameters, motive, and scrutinee.
#[derive(Clone, Copy, Debug)]
pub struct CasesInfo {
    pub minors_begin: usize,
    pub minors_end: usize,
}

/* ------------------------------ Specialization ----------------------------- */

/// What the specializer may assume about each parameter position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// first-order data, fixed across recursive calls; not specialized
    Fixed,
    /// computationally irrelevant: types, type formers, propositions, proofs
    FixedNeutral,
    /// higher-order, fixed across recursive calls
    FixedHO,
    /// class instance, fixed across recursive calls
    FixedInst,
    /// everything else
    Other,
}

impl ArgKind {
    pub fn code(self) -> char {
        match self {
            | ArgKind::Fixed => 'F',
            | ArgKind::FixedNeutral => 'N',
            | ArgKind::FixedHO => 'H',
            | ArgKind::FixedInst => 'I',
            | ArgKind::Other => 'X',
        }
    }
}

/// Per-declaration specialization header: the group it was compiled with and
/// one kind per leading lambda.
#[derive(Clone, Debug)]
pub struct SpecInfo {
    pub mutuals: Vec<NameId>,
    pub kinds: Vec<ArgKind>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecAttr {
    Specialize,
    Nospecialize,
}

impl SpecAttr {
    pub fn as_str(self) -> &'static str {
        match self {
            | SpecAttr::Specialize => "specialize",
            | SpecAttr::Nospecialize => "nospecialize",
        }
    }
}

/* ------------------------------- Environment ------------------------------- */

#[derive(Clone, Default)]
pub struct Env {
    consts: IndexMap<NameId, ConstInfo>,
    cases: HashMap<NameId, CasesInfo>,
    instances: HashSet<NameId>,
    specialize_attr: HashSet<NameId>,
    nospecialize_attr: HashSet<NameId>,
    spec_info: HashMap<NameId, SpecInfo>,
    spec_cache: IndexMap<ExprId, NameId>,
}

/// A point in the environment's growth. The tables that grow while a pass
/// runs, declarations and the specialization cache, are append-only, so a
/// pair of lengths pins a snapshot that [`Env::revert`] can return to.
#[derive(Clone, Copy, Debug)]
pub struct EnvMark {
    consts: usize,
    spec_cache: usize,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: NameId) -> Option<&ConstInfo> {
        self.consts.get(&name)
    }

    pub fn contains(&self, name: NameId) -> bool {
        self.consts.contains_key(&name)
    }

    pub fn is_definition(&self, name: NameId) -> bool {
        self.find(name).is_some_and(|info| info.is_definition())
    }

    /// Registers a constant. Both faces must be closed terms; this is where
    /// generated clones get checked before they become visible.
    pub fn add_decl(&mut self, names: &NameArena, exprs: &ExprArena, info: ConstInfo) -> Result<()> {
        let open_ty = !exprs.is_closed(info.ty);
        let open_value = info.value.is_some_and(|value| !exprs.is_closed(value));
        if open_ty || open_value {
            Err(Error::OpenDeclaration { name: names.display(info.name) })?
        }
        if self.consts.contains_key(&info.name) {
            Err(Error::DuplicateConstant { name: names.display(info.name) })?
        }
        log::trace!("declare {}", names.display(info.name));
        self.consts.insert(info.name, info);
        Ok(())
    }

    /* --------------------------------- Cases ---------------------------------- */

    pub fn register_cases(&mut self, name: NameId, info: CasesInfo) {
        self.cases.insert(name, info);
    }

    pub fn cases_info(&self, name: NameId) -> Option<CasesInfo> {
        self.cases.get(&name).copied()
    }

    /// Whether `expr` is an application of a registered case head.
    pub fn is_cases_app(&self, exprs: &ExprArena, expr: ExprId) -> Option<(NameId, CasesInfo)> {
        let head = exprs.app_fn(expr);
        let name = exprs.const_name(head)?;
        Some((name, self.cases_info(name)?))
    }

    /// Whether `expr` is headed by a constructor of some data type.
    pub fn is_ctor_app(&self, exprs: &ExprArena, expr: ExprId) -> bool {
        let head = exprs.app_fn(expr);
        match exprs.const_name(head) {
            | Some(name) => self.find(name).is_some_and(|info| info.kind == ConstKind::Ctor),
            | None => false,
        }
    }

    /* ------------------------------- Attributes -------------------------------- */

    pub fn register_instance(&mut self, name: NameId) {
        self.instances.insert(name);
    }

    pub fn is_instance(&self, name: NameId) -> bool {
        self.instances.contains(&name)
    }

    pub fn set_attr(&mut self, names: &NameArena, attr: SpecAttr, name: NameId) -> Result<()> {
        if !self.is_definition(name) {
            Err(Error::AttrOnNonDefinition { attr: attr.as_str(), name: names.display(name) })?
        }
        match attr {
            | SpecAttr::Specialize => self.specialize_attr.insert(name),
            | SpecAttr::Nospecialize => self.nospecialize_attr.insert(name),
        };
        Ok(())
    }

    /// Internal names (e.g. `f._lam.1`) inherit the attribute of the
    /// user-facing declaration they were generated from.
    fn has_attr(&self, names: &NameArena, set: &HashSet<NameId>, name: NameId) -> bool {
        let mut cur = name;
        loop {
            if set.contains(&cur) {
                return true;
            }
            if names.is_internal(cur) && !names.is_atomic(cur) {
                let Some(prefix) = names.prefix(cur) else { return false };
                cur = prefix;
            } else {
                return false;
            }
        }
    }

    pub fn has_specialize_attr(&self, names: &NameArena, name: NameId) -> bool {
        self.has_attr(names, &self.specialize_attr, name)
    }

    pub fn has_nospecialize_attr(&self, names: &NameArena, name: NameId) -> bool {
        self.has_attr(names, &self.nospecialize_attr, name)
    }

    /* ---------------------------- Specialization ------------------------------- */

    pub fn spec_info(&self, name: NameId) -> Option<&SpecInfo> {
        self.spec_info.get(&name)
    }

    pub fn insert_spec_info(&mut self, name: NameId, info: SpecInfo) {
        self.spec_info.insert(name, info);
    }

    /// Durable tier of the specialization cache, keyed by closed structural
    /// keys only.
    pub fn spec_cache_get(&self, key: ExprId) -> Option<NameId> {
        self.spec_cache.get(&key).copied()
    }

    pub fn spec_cache_insert(&mut self, key: ExprId, name: NameId) {
        self.spec_cache.insert(key, name);
    }

    /* -------------------------------- Unwinding -------------------------------- */

    pub fn mark(&self) -> EnvMark {
        EnvMark { consts: self.consts.len(), spec_cache: self.spec_cache.len() }
    }

    /// Drops every declaration and cache entry recorded since `mark`.
    pub fn revert(&mut self, mark: EnvMark) {
        self.consts.truncate(mark.consts);
        self.spec_cache.truncate(mark.spec_cache);
    }
}
