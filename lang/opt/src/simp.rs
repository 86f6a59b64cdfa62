//! A modest cleanup pass for freshly generated code.
//!
//! Specialized clones come out of the builder full of administrative
//! redexes: lambdas applied on the spot, lets binding atoms, lets whose
//! binding nothing uses anymore. This pass folds those away. Anything
//! smarter (inlining across declarations, case-of-known-constructor) is
//! out of scope here.

use minuet_lcnf::prelude::*;

#[derive(Clone, Debug)]
pub struct SimpConfig {
    /// inline `let x := a; e` when `a` is an atom
    pub zeta_atom: bool,
    /// drop unused lets whose value cannot diverge
    pub dead_let: bool,
    /// fold lambdas applied to their arguments
    pub beta: bool,
}

impl Default for SimpConfig {
    fn default() -> Self {
        SimpConfig { zeta_atom: true, dead_let: true, beta: true }
    }
}

/// Simplifies a locally closed value.
pub fn simp(store: &mut TermStore, cfg: &SimpConfig, expr: ExprId) -> ExprId {
    let mut simp = Simp { store, lctx: LocalCtx::new(), cfg };
    simp.visit(expr)
}

struct Simp<'a> {
    store: &'a mut TermStore,
    lctx: LocalCtx,
    cfg: &'a SimpConfig,
}

impl Simp<'_> {
    fn visit(&mut self, expr: ExprId) -> ExprId {
        match self.store.exprs[&expr].clone() {
            | Expr::Lam(_) => self.visit_lambda(expr),
            | Expr::Let(bind) => self.visit_let(bind),
            | Expr::App(_) => self.visit_app(expr),
            | _ => expr,
        }
    }

    fn visit_lambda(&mut self, expr: ExprId) -> ExprId {
        let mut fvars = Vec::new();
        let mut body = expr;
        while let Expr::Lam(binder) = self.store.exprs[&body].clone() {
            let fvar = self.lctx.mk_local_decl(
                &mut self.store.fvars,
                binder.name,
                binder.ty,
                binder.info,
            );
            let fv = self.store.exprs.fvar(fvar);
            fvars.push(fvar);
            body = self.store.exprs.instantiate1(binder.body, fv);
        }
        let body = self.visit(body);
        self.lctx.mk_lambda(&mut self.store.exprs, &fvars, body)
    }

    fn visit_let(&mut self, bind: LetBind<ExprId>) -> ExprId {
        let value = self.visit(bind.value);
        if self.cfg.zeta_atom && self.store.exprs.is_atom(value) {
            let body = self.store.exprs.instantiate1(bind.body, value);
            return self.visit(body);
        }
        let fvar =
            self.lctx.mk_let_decl(&mut self.store.fvars, bind.name, bind.ty, value);
        let fv = self.store.exprs.fvar(fvar);
        let body = self.store.exprs.instantiate1(bind.body, fv);
        let body = self.visit(body);
        let inert = self.store.exprs.is_atom(value) || self.store.exprs.is_lam(value);
        if self.cfg.dead_let && inert && !self.store.exprs.contains_fvar(body, fvar) {
            return body;
        }
        self.lctx.mk_lambda(&mut self.store.exprs, &[fvar], body)
    }

    fn visit_app(&mut self, expr: ExprId) -> ExprId {
        let (fun, args) = self.store.exprs.app_fn_args(expr);
        let fun = self.visit(fun);
        let args = args.iter().map(|arg| self.visit(*arg)).collect::<Vec<_>>();
        let packed = self.store.exprs.app_spine(fun, &args);
        if self.cfg.beta && self.store.exprs.is_lam(fun) {
            let reduced = self.store.exprs.cheap_beta_reduce(packed);
            if reduced != packed {
                return self.visit(reduced);
            }
        }
        packed
    }
}
