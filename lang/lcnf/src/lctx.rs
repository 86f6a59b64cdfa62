//! Local typing contexts.
//!
//! A context maps free variables to their declarations. Backed by a
//! persistent map so traversals can snapshot it, extend freely, and restore
//! the snapshot when leaving a scope.

use crate::{arena::*, syntax::*};

/// A local declaration; let-bound when `value` is present.
#[derive(Clone, Debug)]
pub struct LocalDecl {
    /// insertion order; younger declarations have larger indices
    pub index: usize,
    pub name: NameId,
    pub ty: ExprId,
    pub value: Option<ExprId>,
    pub info: BinderInfo,
}

#[derive(Clone, Default)]
pub struct LocalCtx {
    defs: im::HashMap<FVarId, LocalDecl>,
    next_index: usize,
}

impl LocalCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, fvar: FVarId) -> Option<&LocalDecl> {
        self.defs.get(&fvar)
    }

    /// The let value of a local, when it has one.
    pub fn value_of(&self, fvar: FVarId) -> Option<ExprId> {
        self.find(fvar).and_then(|decl| decl.value)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn mk_local_decl(
        &mut self, fvars: &mut FVarGen, name: NameId, ty: ExprId, info: BinderInfo,
    ) -> FVarId {
        let fvar = fvars.fresh();
        self.push_existing(fvar, name, ty, None, info);
        fvar
    }

    pub fn mk_let_decl(
        &mut self, fvars: &mut FVarGen, name: NameId, ty: ExprId, value: ExprId,
    ) -> FVarId {
        let fvar = fvars.fresh();
        self.push_existing(fvar, name, ty, Some(value), BinderInfo::Explicit);
        fvar
    }

    /// Registers a pre-made free variable; used when a traversal has handed
    /// out the id before knowing its declaration.
    pub fn push_existing(
        &mut self, fvar: FVarId, name: NameId, ty: ExprId, value: Option<ExprId>, info: BinderInfo,
    ) {
        let index = self.next_index;
        self.next_index += 1;
        self.defs.insert(fvar, LocalDecl { index, name, ty, value, info });
    }

    /// Stable order by declaration depth, oldest first. The canonical order
    /// for closure abstraction.
    pub fn sort_fvars(&self, fvars: &mut Vec<FVarId>) {
        fvars.sort_by_key(|fvar| match self.find(*fvar) {
            | Some(decl) => decl.index,
            | None => unreachable!(),
        });
    }

    /// Re-abstracts `fvars` (outermost first) over `body`, rebuilding lambda
    /// binders for plain declarations and lets for valued ones.
    pub fn mk_lambda(&self, exprs: &mut ExprArena, fvars: &[FVarId], body: ExprId) -> ExprId {
        self.mk_binding(exprs, fvars, body, false)
    }

    /// Same as [`LocalCtx::mk_lambda`] with pi binders.
    pub fn mk_pi(&self, exprs: &mut ExprArena, fvars: &[FVarId], body: ExprId) -> ExprId {
        self.mk_binding(exprs, fvars, body, true)
    }

    fn mk_binding(
        &self, exprs: &mut ExprArena, fvars: &[FVarId], body: ExprId, pi: bool,
    ) -> ExprId {
        let mut res = exprs.abstract_fvars(body, fvars);
        for i in (0..fvars.len()).rev() {
            let Some(decl) = self.find(fvars[i]) else { unreachable!() };
            let LocalDecl { name, ty, value, info, .. } = decl.clone();
            let ty = exprs.abstract_fvars(ty, &fvars[..i]);
            res = match value {
                | Some(value) => {
                    let value = exprs.abstract_fvars(value, &fvars[..i]);
                    exprs.let_bind(name, ty, value, res)
                }
                | None if pi => exprs.pi(name, ty, res, info),
                | None => exprs.lam(name, ty, res, info),
            };
        }
        res
    }
}
