//! A lightweight type checker over compiled terms.
//!
//! Nothing here validates user programs; the front end did that long ago.
//! The passes need just enough typing to classify parameters, detect
//! irrelevant values, and synthesize binder types for generated clones.

use crate::{arena::*, env::*, err::*, fmt::*, lctx::*, syntax::*};

pub struct TypeChecker<'a> {
    store: &'a mut TermStore,
    env: &'a Env,
    lctx: LocalCtx,
}

impl<'a> TypeChecker<'a> {
    /// Works on a private copy of the context so scratch locals minted while
    /// inferring never leak into the caller's view.
    pub fn new(store: &'a mut TermStore, env: &'a Env, lctx: LocalCtx) -> Self {
        TypeChecker { store, env, lctx }
    }

    fn render(&self, expr: ExprId) -> String {
        let f = Formatter::with_lctx(self.store, &self.lctx);
        expr.ugly(&f)
    }

    /* ------------------------------- Reduction -------------------------------- */

    /// Weak head normal form under beta, delta, and zeta.
    pub fn whnf(&mut self, expr: ExprId) -> ExprId {
        let mut cur = expr;
        while let Some(next) = self.whnf_step(cur) {
            cur = next;
        }
        cur
    }

    fn whnf_step(&mut self, expr: ExprId) -> Option<ExprId> {
        match self.store.exprs[&expr].clone() {
            | Expr::FVar(fvar) => self.lctx.value_of(fvar),
            | Expr::Const(Const(name)) => {
                let info = self.env.find(name)?;
                if info.is_definition() {
                    info.value
                } else {
                    None
                }
            }
            | Expr::Let(bind) => Some(self.store.exprs.instantiate1(bind.body, bind.value)),
            | Expr::App(_) => {
                let (fun, args) = self.store.exprs.app_fn_args(expr);
                let fun = self.whnf(fun);
                let packed = self.store.exprs.app_spine(fun, &args);
                if self.store.exprs.is_lam(fun) {
                    Some(self.store.exprs.cheap_beta_reduce(packed))
                } else if packed != expr {
                    Some(packed)
                } else {
                    None
                }
            }
            | _ => None,
        }
    }

    /* ------------------------------- Inference -------------------------------- */

    pub fn infer(&mut self, expr: ExprId) -> Result<ExprId> {
        match self.store.exprs[&expr].clone() {
            | Expr::BVar(BVar(idx)) => Err(Error::LooseBVar { index: idx }),
            | Expr::FVar(fvar) => match self.lctx.find(fvar) {
                | Some(decl) => Ok(decl.ty),
                | None => Err(Error::UnknownFreeVar { fvar: fvar.concise() }),
            },
            | Expr::Sort(Sort(lvl)) => Ok(self.store.exprs.sort(lvl + 1)),
            | Expr::Const(Const(name)) => match self.env.find(name) {
                | Some(info) => Ok(info.ty),
                | None => Err(Error::UnknownConstant { name: self.store.names.display(name) }),
            },
            | Expr::App(App(fun, arg)) => {
                let fun_ty = self.infer(fun)?;
                let fun_ty = self.whnf(fun_ty);
                match self.store.exprs[&fun_ty].clone() {
                    | Expr::Pi(binder) => Ok(self.store.exprs.instantiate1(binder.body, arg)),
                    | _ => Err(Error::FunctionExpected { found: self.render(fun_ty) }),
                }
            }
            | Expr::Lam(binder) => {
                let fvar = self.push_binder(&binder);
                let fv = self.store.exprs.fvar(fvar);
                let body = self.store.exprs.instantiate1(binder.body, fv);
                let body_ty = self.infer(body)?;
                Ok(self.lctx.mk_pi(&mut self.store.exprs, &[fvar], body_ty))
            }
            | Expr::Pi(binder) => {
                let dom = self.sort_level(binder.ty)?;
                let fvar = self.push_binder(&binder);
                let fv = self.store.exprs.fvar(fvar);
                let body = self.store.exprs.instantiate1(binder.body, fv);
                let cod = self.sort_level(body)?;
                Ok(self.store.exprs.sort(imax(dom, cod)))
            }
            | Expr::Let(bind) => {
                let fvar =
                    self.lctx.mk_let_decl(&mut self.store.fvars, bind.name, bind.ty, bind.value);
                let fv = self.store.exprs.fvar(fvar);
                let body = self.store.exprs.instantiate1(bind.body, fv);
                let body_ty = self.infer(body)?;
                // the result must not mention the local; unfold it away
                Ok(self.store.exprs.replace_fvar(body_ty, fvar, bind.value))
            }
            | Expr::Lit(Literal::Nat(_)) => Ok(self.store.exprs.constant(self.store.prims.nat)),
            | Expr::Lit(Literal::Str(_)) => Ok(self.store.exprs.constant(self.store.prims.string)),
            | Expr::Hole(Hole) => Err(Error::StrayHole),
        }
    }

    fn push_binder(&mut self, binder: &Binder<ExprId>) -> FVarId {
        self.lctx.mk_local_decl(&mut self.store.fvars, binder.name, binder.ty, binder.info)
    }

    /// The universe of `ty`, i.e. `l` where `ty : Sort l`.
    fn sort_level(&mut self, ty: ExprId) -> Result<u32> {
        let sort = self.infer(ty)?;
        let sort = self.whnf(sort);
        match self.store.exprs[&sort] {
            | Expr::Sort(Sort(lvl)) => Ok(lvl),
            | _ => Err(Error::SortExpected { found: self.render(sort) }),
        }
    }

    /* ------------------------------ Irrelevance -------------------------------- */

    /// Whether `expr` is a proof, i.e. its type lives in `Prop`.
    pub fn is_prop(&mut self, expr: ExprId) -> Result<bool> {
        let ty = self.infer(expr)?;
        let ty = self.whnf(ty);
        let prop = self.store.exprs.prop();
        Ok(ty == prop)
    }

    /// Whether values of `ty` carry no runtime content: sorts, type formers,
    /// and propositions.
    pub fn is_irrelevant_type(&mut self, ty: ExprId) -> Result<bool> {
        let mut ty = self.whnf(ty);
        loop {
            match self.store.exprs[&ty].clone() {
                | Expr::Sort(_) => return Ok(true),
                | Expr::Pi(binder) => {
                    let fvar = self.push_binder(&binder);
                    let fv = self.store.exprs.fvar(fvar);
                    let body = self.store.exprs.instantiate1(binder.body, fv);
                    ty = self.whnf(body);
                }
                | _ => return self.is_prop(ty),
            }
        }
    }
}

fn imax(dom: u32, cod: u32) -> u32 {
    if cod == 0 {
        0
    } else {
        dom.max(cod)
    }
}
