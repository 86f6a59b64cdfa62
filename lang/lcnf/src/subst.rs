//! Substitution walkers.
//!
//! Exposed terms are locally closed: anything substituted for a bound
//! variable carries no loose indices of its own, so instantiation never
//! lifts. Walks memoize on `(node, depth)` and skip subtrees whose cached
//! flags show nothing to rewrite, which keeps shared subtrees linear.

use crate::{arena::*, syntax::*};
use std::collections::{HashMap, HashSet};

impl ExprArena {
    /// Replaces the `subst.len()` innermost loose indices, outermost binder
    /// first: index 0 maps to the last element of `subst`.
    pub fn instantiate_rev(&mut self, expr: ExprId, subst: &[ExprId]) -> ExprId {
        if subst.is_empty() || self.loose_bvars(expr) == 0 {
            return expr;
        }
        let mut memo = HashMap::new();
        self.instantiate_core(expr, subst, 0, &mut memo)
    }

    pub fn instantiate1(&mut self, expr: ExprId, arg: ExprId) -> ExprId {
        self.instantiate_rev(expr, &[arg])
    }

    fn instantiate_core(
        &mut self, expr: ExprId, subst: &[ExprId], depth: u32,
        memo: &mut HashMap<(ExprId, u32), ExprId>,
    ) -> ExprId {
        if self.loose_bvars(expr) <= depth {
            return expr;
        }
        if let Some(done) = memo.get(&(expr, depth)) {
            return *done;
        }
        let done = match self[&expr].clone() {
            | Expr::BVar(BVar(idx)) => {
                let rel = (idx - depth) as usize;
                if rel < subst.len() {
                    subst[subst.len() - 1 - rel]
                } else {
                    self.bvar(idx - subst.len() as u32)
                }
            }
            | Expr::App(App(fun, arg)) => {
                let fun = self.instantiate_core(fun, subst, depth, memo);
                let arg = self.instantiate_core(arg, subst, depth, memo);
                self.app(fun, arg)
            }
            | Expr::Lam(Binder { name, ty, body, info }) => {
                let ty = self.instantiate_core(ty, subst, depth, memo);
                let body = self.instantiate_core(body, subst, depth + 1, memo);
                self.lam(name, ty, body, info)
            }
            | Expr::Pi(Binder { name, ty, body, info }) => {
                let ty = self.instantiate_core(ty, subst, depth, memo);
                let body = self.instantiate_core(body, subst, depth + 1, memo);
                self.pi(name, ty, body, info)
            }
            | Expr::Let(LetBind { name, ty, value, body }) => {
                let ty = self.instantiate_core(ty, subst, depth, memo);
                let value = self.instantiate_core(value, subst, depth, memo);
                let body = self.instantiate_core(body, subst, depth + 1, memo);
                self.let_bind(name, ty, value, body)
            }
            | Expr::FVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => expr,
        };
        memo.insert((expr, depth), done);
        done
    }

    /// Turns the listed free variables into loose indices, `fvars[i]` mapping
    /// to index `fvars.len() - 1 - i` at the top, ready to be wrapped in
    /// binders with `fvars[0]` outermost.
    pub fn abstract_fvars(&mut self, expr: ExprId, fvars: &[FVarId]) -> ExprId {
        if fvars.is_empty() || !self.has_fvar(expr) {
            return expr;
        }
        let mut memo = HashMap::new();
        self.abstract_core(expr, fvars, 0, &mut memo)
    }

    fn abstract_core(
        &mut self, expr: ExprId, fvars: &[FVarId], depth: u32,
        memo: &mut HashMap<(ExprId, u32), ExprId>,
    ) -> ExprId {
        if !self.has_fvar(expr) {
            return expr;
        }
        if let Some(done) = memo.get(&(expr, depth)) {
            return *done;
        }
        let done = match self[&expr].clone() {
            | Expr::FVar(fvar) => match fvars.iter().position(|x| *x == fvar) {
                | Some(i) => self.bvar(depth + (fvars.len() - 1 - i) as u32),
                | None => expr,
            },
            | Expr::App(App(fun, arg)) => {
                let fun = self.abstract_core(fun, fvars, depth, memo);
                let arg = self.abstract_core(arg, fvars, depth, memo);
                self.app(fun, arg)
            }
            | Expr::Lam(Binder { name, ty, body, info }) => {
                let ty = self.abstract_core(ty, fvars, depth, memo);
                let body = self.abstract_core(body, fvars, depth + 1, memo);
                self.lam(name, ty, body, info)
            }
            | Expr::Pi(Binder { name, ty, body, info }) => {
                let ty = self.abstract_core(ty, fvars, depth, memo);
                let body = self.abstract_core(body, fvars, depth + 1, memo);
                self.pi(name, ty, body, info)
            }
            | Expr::Let(LetBind { name, ty, value, body }) => {
                let ty = self.abstract_core(ty, fvars, depth, memo);
                let value = self.abstract_core(value, fvars, depth, memo);
                let body = self.abstract_core(body, fvars, depth + 1, memo);
                self.let_bind(name, ty, value, body)
            }
            | Expr::BVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => expr,
        };
        memo.insert((expr, depth), done);
        done
    }

    /// Substitutes one free variable by a locally closed term.
    pub fn replace_fvar(&mut self, expr: ExprId, fvar: FVarId, value: ExprId) -> ExprId {
        if !self.has_fvar(expr) {
            return expr;
        }
        let mut memo = HashMap::new();
        self.replace_fvar_core(expr, fvar, value, &mut memo)
    }

    fn replace_fvar_core(
        &mut self, expr: ExprId, fvar: FVarId, value: ExprId, memo: &mut HashMap<ExprId, ExprId>,
    ) -> ExprId {
        if !self.has_fvar(expr) {
            return expr;
        }
        if let Some(done) = memo.get(&expr) {
            return *done;
        }
        let done = match self[&expr].clone() {
            | Expr::FVar(x) if x == fvar => value,
            | Expr::FVar(_) => expr,
            | Expr::App(App(fun, arg)) => {
                let fun = self.replace_fvar_core(fun, fvar, value, memo);
                let arg = self.replace_fvar_core(arg, fvar, value, memo);
                self.app(fun, arg)
            }
            | Expr::Lam(Binder { name, ty, body, info }) => {
                let ty = self.replace_fvar_core(ty, fvar, value, memo);
                let body = self.replace_fvar_core(body, fvar, value, memo);
                self.lam(name, ty, body, info)
            }
            | Expr::Pi(Binder { name, ty, body, info }) => {
                let ty = self.replace_fvar_core(ty, fvar, value, memo);
                let body = self.replace_fvar_core(body, fvar, value, memo);
                self.pi(name, ty, body, info)
            }
            | Expr::Let(LetBind { name, ty, value: v, body }) => {
                let ty = self.replace_fvar_core(ty, fvar, value, memo);
                let v = self.replace_fvar_core(v, fvar, value, memo);
                let body = self.replace_fvar_core(body, fvar, value, memo);
                self.let_bind(name, ty, v, body)
            }
            | Expr::BVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => expr,
        };
        memo.insert(expr, done);
        done
    }

    /// Whether the loose index `idx` occurs (relative to the top of `expr`).
    pub fn has_loose_bvar(&self, expr: ExprId, idx: u32) -> bool {
        let mut memo = HashMap::new();
        self.has_loose_bvar_core(expr, idx, &mut memo)
    }

    fn has_loose_bvar_core(
        &self, expr: ExprId, idx: u32, memo: &mut HashMap<(ExprId, u32), bool>,
    ) -> bool {
        if self.loose_bvars(expr) <= idx {
            return false;
        }
        if let Some(done) = memo.get(&(expr, idx)) {
            return *done;
        }
        let done = match &self[&expr] {
            | Expr::BVar(BVar(i)) => *i == idx,
            | Expr::App(App(fun, arg)) => {
                let (fun, arg) = (*fun, *arg);
                self.has_loose_bvar_core(fun, idx, memo) || self.has_loose_bvar_core(arg, idx, memo)
            }
            | Expr::Lam(Binder { ty, body, .. }) | Expr::Pi(Binder { ty, body, .. }) => {
                let (ty, body) = (*ty, *body);
                self.has_loose_bvar_core(ty, idx, memo)
                    || self.has_loose_bvar_core(body, idx + 1, memo)
            }
            | Expr::Let(LetBind { ty, value, body, .. }) => {
                let (ty, value, body) = (*ty, *value, *body);
                self.has_loose_bvar_core(ty, idx, memo)
                    || self.has_loose_bvar_core(value, idx, memo)
                    || self.has_loose_bvar_core(body, idx + 1, memo)
            }
            | Expr::FVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => {
                false
            }
        };
        memo.insert((expr, idx), done);
        done
    }

    /// Whether one particular free variable occurs in `expr`.
    pub fn contains_fvar(&self, expr: ExprId, fvar: FVarId) -> bool {
        let mut seen = HashSet::new();
        self.contains_fvar_core(expr, fvar, &mut seen)
    }

    fn contains_fvar_core(&self, expr: ExprId, fvar: FVarId, seen: &mut HashSet<ExprId>) -> bool {
        // a revisited node already came up false, or we would have bailed out
        if !self.has_fvar(expr) || !seen.insert(expr) {
            return false;
        }
        match &self[&expr] {
            | Expr::FVar(x) => *x == fvar,
            | Expr::App(App(fun, arg)) => {
                let (fun, arg) = (*fun, *arg);
                self.contains_fvar_core(fun, fvar, seen) || self.contains_fvar_core(arg, fvar, seen)
            }
            | Expr::Lam(Binder { ty, body, .. }) | Expr::Pi(Binder { ty, body, .. }) => {
                let (ty, body) = (*ty, *body);
                self.contains_fvar_core(ty, fvar, seen) || self.contains_fvar_core(body, fvar, seen)
            }
            | Expr::Let(LetBind { ty, value, body, .. }) => {
                let (ty, value, body) = (*ty, *value, *body);
                self.contains_fvar_core(ty, fvar, seen)
                    || self.contains_fvar_core(value, fvar, seen)
                    || self.contains_fvar_core(body, fvar, seen)
            }
            | Expr::BVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => {
                false
            }
        }
    }

    /// Lowers every loose index by `n`. The caller guarantees the `n` lowest
    /// loose indices do not occur.
    pub fn lower_loose_bvars(&mut self, expr: ExprId, n: u32) -> ExprId {
        if n == 0 || self.loose_bvars(expr) == 0 {
            return expr;
        }
        let mut memo = HashMap::new();
        self.lower_core(expr, n, 0, &mut memo)
    }

    fn lower_core(
        &mut self, expr: ExprId, n: u32, depth: u32, memo: &mut HashMap<(ExprId, u32), ExprId>,
    ) -> ExprId {
        if self.loose_bvars(expr) <= depth {
            return expr;
        }
        if let Some(done) = memo.get(&(expr, depth)) {
            return *done;
        }
        let done = match self[&expr].clone() {
            | Expr::BVar(BVar(idx)) => self.bvar(idx - n),
            | Expr::App(App(fun, arg)) => {
                let fun = self.lower_core(fun, n, depth, memo);
                let arg = self.lower_core(arg, n, depth, memo);
                self.app(fun, arg)
            }
            | Expr::Lam(Binder { name, ty, body, info }) => {
                let ty = self.lower_core(ty, n, depth, memo);
                let body = self.lower_core(body, n, depth + 1, memo);
                self.lam(name, ty, body, info)
            }
            | Expr::Pi(Binder { name, ty, body, info }) => {
                let ty = self.lower_core(ty, n, depth, memo);
                let body = self.lower_core(body, n, depth + 1, memo);
                self.pi(name, ty, body, info)
            }
            | Expr::Let(LetBind { name, ty, value, body }) => {
                let ty = self.lower_core(ty, n, depth, memo);
                let value = self.lower_core(value, n, depth, memo);
                let body = self.lower_core(body, n, depth + 1, memo);
                self.let_bind(name, ty, value, body)
            }
            | Expr::FVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => expr,
        };
        memo.insert((expr, depth), done);
        done
    }

    /// Beta-reduces the head redex without visiting subterms.
    pub fn cheap_beta_reduce(&mut self, expr: ExprId) -> ExprId {
        let (fun, args) = self.app_fn_args(expr);
        if args.is_empty() || !self.is_lam(fun) {
            return expr;
        }
        let mut consumed = 0;
        let mut body = fun;
        while consumed < args.len() {
            match self[&body] {
                | Expr::Lam(Binder { body: inner, .. }) => {
                    body = inner;
                    consumed += 1;
                }
                | _ => break,
            }
        }
        let body = self.instantiate_rev(body, &args[..consumed]);
        self.app_spine(body, &args[consumed..])
    }
}
