//! Parameter classification for the specializer.
//!
//! Each formal of a compiled declaration gets an [`ArgKind`] from its binder
//! info and domain type, then the bodies of the mutual group are scanned and
//! every position a recursive call does not forward verbatim is downgraded
//! to `Other`. The result is stored on the environment so later compilation
//! units can specialize calls into this group.

use minuet_lcnf::prelude::*;
use std::collections::HashSet;

/// Classifies and refines the whole mutual group, recording one
/// [`SpecInfo`] per declaration.
pub fn collect_spec_info(store: &mut TermStore, mut env: Env, decls: &[Decl]) -> Result<Env> {
    let mutuals = decls.iter().map(|decl| decl.name).collect::<Vec<_>>();
    let mut buffer = Vec::new();
    for decl in decls {
        let kinds = classify_params(store, &env, decl.code)?;
        buffer.push((decl.name, kinds));
    }

    // Bind every lambda formal to one shared marker and every let to another;
    // a recursive call keeps a position only when the argument it passes is
    // the lambda marker, i.e. some binder-bound variable forwarded as-is.
    let lam_marker = store.fvars.fresh();
    let lam_marker = store.exprs.fvar(lam_marker);
    let let_marker = store.fvars.fresh();
    let let_marker = store.exprs.fvar(let_marker);
    let mut refine = Refine {
        store,
        env: &env,
        buffer: &mut buffer,
        lam_marker,
        let_marker,
        seen: HashSet::new(),
    };
    for decl in decls {
        refine.visit(decl.code);
    }

    for (name, kinds) in buffer {
        let f = Formatter::new(store);
        log::trace!(
            "spec info {}:{}",
            name.ugly(&f),
            kinds.iter().map(|kind| format!(" {}", kind.code())).collect::<String>()
        );
        env.insert_spec_info(name, SpecInfo { mutuals: mutuals.clone(), kinds });
    }
    Ok(env)
}

fn classify_params(store: &mut TermStore, env: &Env, code: ExprId) -> Result<Vec<ArgKind>> {
    let mut lctx = LocalCtx::new();
    let mut kinds = Vec::new();
    let mut code = code;
    while let Expr::Lam(binder) = store.exprs[&code].clone() {
        let kind = if binder.info.is_inst_implicit() {
            ArgKind::FixedInst
        } else {
            classify_domain(store, env, &mut lctx, binder.ty)?
        };
        kinds.push(kind);
        let fvar = lctx.mk_local_decl(&mut store.fvars, binder.name, binder.ty, binder.info);
        let fv = store.exprs.fvar(fvar);
        code = store.exprs.instantiate1(binder.body, fv);
    }
    Ok(kinds)
}

fn classify_domain(
    store: &mut TermStore, env: &Env, lctx: &mut LocalCtx, domain: ExprId,
) -> Result<ArgKind> {
    let mut ty = TypeChecker::new(store, env, lctx.clone()).whnf(domain);
    if store.exprs.is_sort(ty) || TypeChecker::new(store, env, lctx.clone()).is_prop(ty)? {
        return Ok(ArgKind::FixedNeutral);
    }
    if !store.exprs.is_pi(ty) {
        return Ok(ArgKind::Fixed);
    }
    while let Expr::Pi(binder) = store.exprs[&ty].clone() {
        let fvar = lctx.mk_local_decl(&mut store.fvars, binder.name, binder.ty, binder.info);
        let fv = store.exprs.fvar(fvar);
        let body = store.exprs.instantiate1(binder.body, fv);
        ty = TypeChecker::new(store, env, lctx.clone()).whnf(body);
    }
    if store.exprs.is_sort(ty) {
        // functions producing types carry no runtime content
        Ok(ArgKind::FixedNeutral)
    } else {
        Ok(ArgKind::FixedHO)
    }
}

struct Refine<'a> {
    store: &'a mut TermStore,
    env: &'a Env,
    buffer: &'a mut Vec<(NameId, Vec<ArgKind>)>,
    lam_marker: ExprId,
    let_marker: ExprId,
    seen: HashSet<ExprId>,
}

impl Refine<'_> {
    fn visit(&mut self, expr: ExprId) {
        if !self.seen.insert(expr) {
            return;
        }
        match self.store.exprs[&expr].clone() {
            | Expr::Lam(binder) => {
                let body = self.store.exprs.instantiate1(binder.body, self.lam_marker);
                self.visit(body);
            }
            | Expr::Let(bind) => {
                self.visit(bind.value);
                let body = self.store.exprs.instantiate1(bind.body, self.let_marker);
                self.visit(body);
            }
            | Expr::App(_) => self.visit_app(expr),
            | _ => {}
        }
    }

    fn visit_app(&mut self, expr: ExprId) {
        if let Some((_, info)) = self.env.is_cases_app(&self.store.exprs, expr) {
            let args = self.store.exprs.app_args(expr);
            let end = info.minors_end.min(args.len());
            let begin = info.minors_begin.min(end);
            for arg in &args[begin..end] {
                self.visit(*arg);
            }
            return;
        }
        let (fun, args) = self.store.exprs.app_fn_args(expr);
        let Some(name) = self.store.exprs.const_name(fun) else { return };
        let Some((_, kinds)) = self.buffer.iter_mut().find(|(n, _)| *n == name) else { return };
        for (i, kind) in kinds.iter_mut().enumerate() {
            let forwarded = args.get(i).is_some_and(|arg| *arg == self.lam_marker);
            if !forwarded {
                *kind = ArgKind::Other;
            }
        }
    }
}
