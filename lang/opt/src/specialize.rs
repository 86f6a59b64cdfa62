//! Call-site code specialization.
//!
//! A call that passes type class instances or closures in fixed argument
//! positions is rewritten to call a fresh clone of the callee with those
//! arguments built in, which puts dictionary projections and higher-order
//! parameters in reach of the simplifier. The clone closes over the part of
//! the local context its captured arguments depend on, and recursive calls
//! inside the clone tie back to the clone itself. Within one attempt clones
//! are shared through a structural cache; captures whose values are closed
//! terms are shared across the whole compilation through the environment.

use crate::info::collect_spec_info;
use crate::simp::{simp, SimpConfig};
use minuet_lcnf::prelude::*;
use minuet_syntax::NameArena;
use std::collections::{HashMap, HashSet};

/* ------------------------------ Configuration ------------------------------ */

/// Tunables for the specialization pass.
#[derive(Clone, Debug)]
pub struct SpecConfig {
    /// cleanup applied to freshly built clone bodies
    pub simp: SimpConfig,
    /// bound on clone-builder recursion while tying recursive knots
    pub max_depth: usize,
}

impl Default for SpecConfig {
    fn default() -> Self {
        SpecConfig { simp: SimpConfig::default(), max_depth: 100 }
    }
}

/* ------------------------------- Pass driver ------------------------------- */

/// Specializes every call site in a group of compiled declarations.
///
/// Classifies and refines the group's parameters first, then visits each
/// declaration. Returns the extended environment and the new declaration
/// list; clones precede the rewritten declaration that spawned them.
pub fn specialize_decls(
    store: &mut TermStore, env: Env, decls: &[Decl], cfg: &SpecConfig,
) -> Result<(Env, Vec<Decl>)> {
    let mut env = collect_spec_info(store, env, decls)?;
    let mut out = Vec::new();
    for decl in decls {
        {
            let f = Formatter::new(store);
            log::trace!("specialize input {} := {}", decl.name.ugly(&f), decl.code.ugly(&f));
        }
        let mut spec = Specializer::new(store, env, cfg, decl.name);
        let code = spec.visit(decl.code);
        let Specializer { env: spec_env, mut new_decls, .. } = spec;
        env = spec_env;
        out.append(&mut new_decls);
        out.push(Decl::new(decl.name, code));
    }
    Ok((env, out))
}

/* ------------------------------ Capture masks ------------------------------ */

/// Marks the argument positions a call would capture, walking right to
/// left. An instance position always captures and unlocks the higher-order
/// and neutral positions to its left; without one those capture only for
/// functions carrying the specialize attribute. The mask is cut after the
/// rightmost captured position, so trailing arguments stay ordinary.
fn to_bool_mask(kinds: &[ArgKind], args_len: usize, has_attr: bool) -> Vec<bool> {
    let len = kinds.len().min(args_len);
    let mut mask = vec![false; len];
    let mut keep = 0;
    let mut found_inst = false;
    for i in (0..len).rev() {
        let capture = match kinds[i] {
            | ArgKind::FixedInst => {
                found_inst = true;
                true
            }
            | ArgKind::FixedHO | ArgKind::FixedNeutral => has_attr || found_inst,
            | ArgKind::Fixed | ArgKind::Other => false,
        };
        if capture {
            mask[i] = true;
            if keep == 0 {
                keep = i + 1;
            }
        }
    }
    mask.truncate(keep);
    mask
}

/* ----------------------------- Attempt context ----------------------------- */

/// State of one specialization attempt: the mutual group being cloned into,
/// the closure of locals the captured arguments depend on, the clone bodies
/// built so far, and a cache keyed on placeholder applications so recursive
/// preprocessing finds clones already underway.
struct SpecCtx {
    mutuals: Vec<NameId>,
    /// every local the clone must close over, oldest first
    vars: Vec<FVarId>,
    /// the subset that stays a formal parameter of the clone
    params: Vec<FVarId>,
    cache: HashMap<ExprId, NameId>,
    pre_decls: Vec<Decl>,
}

impl SpecCtx {
    fn new(mutuals: Vec<NameId>) -> Self {
        SpecCtx {
            mutuals,
            vars: Vec::new(),
            params: Vec::new(),
            cache: HashMap::new(),
            pre_decls: Vec::new(),
        }
    }

    fn in_mutual_group(&self, name: NameId) -> bool {
        self.mutuals.contains(&name)
    }
}

/* ---------------------------- Closure collection --------------------------- */

fn is_join_point(names: &NameArena, name: NameId) -> bool {
    names.last_str(name).is_some_and(|part| part.starts_with("_jp"))
}

/// Walks the captured arguments and records which locals the clone must
/// close over. A local seen outside any binder keeps its let value inside
/// the clone; one seen under a binder is promoted to a parameter instead,
/// except join points, which must stay let-bound to remain jumps.
struct DepCollector<'a> {
    store: &'a TermStore,
    lctx: &'a LocalCtx,
    ctx: &'a mut SpecCtx,
    seen_outside: HashSet<FVarId>,
    seen_inside: HashSet<FVarId>,
}

impl DepCollector<'_> {
    fn collect(&mut self, expr: ExprId, in_binder: bool) {
        let mut e = expr;
        let mut in_binder = in_binder;
        loop {
            if !self.store.exprs.has_fvar(e) {
                return;
            }
            match self.store.exprs[&e].clone() {
                | Expr::BVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_)
                | Expr::Hole(_) => return,
                | Expr::FVar(fvar) => {
                    self.collect_fvar(fvar, in_binder);
                    return;
                }
                | Expr::App(App(fun, arg)) => {
                    self.collect(arg, in_binder);
                    e = fun;
                }
                | Expr::Lam(binder) | Expr::Pi(binder) => {
                    self.collect(binder.ty, in_binder);
                    e = binder.body;
                    in_binder = true;
                }
                | Expr::Let(bind) => {
                    self.collect(bind.ty, in_binder);
                    self.collect(bind.value, in_binder);
                    e = bind.body;
                }
            }
        }
    }

    fn collect_fvar(&mut self, fvar: FVarId, in_binder: bool) {
        if in_binder {
            self.collect_fvar_inside(fvar)
        } else {
            self.collect_fvar_outside(fvar)
        }
    }

    fn collect_fvar_outside(&mut self, fvar: FVarId) {
        if !self.seen_outside.insert(fvar) {
            return;
        }
        let Some(decl) = self.lctx.find(fvar) else { return };
        let (ty, value) = (decl.ty, decl.value);
        if !self.seen_inside.contains(&fvar) {
            self.ctx.vars.push(fvar);
            if value.is_none() {
                self.ctx.params.push(fvar);
            }
        }
        self.collect(ty, false);
        if let Some(value) = value {
            self.collect(value, false);
        }
    }

    fn collect_fvar_inside(&mut self, fvar: FVarId) {
        if !self.seen_inside.insert(fvar) {
            return;
        }
        let Some(decl) = self.lctx.find(fvar) else { return };
        let (name, ty) = (decl.name, decl.ty);
        let mut value = decl.value;
        let jp = is_join_point(&self.store.names, name);
        if self.seen_outside.contains(&fvar) {
            // already in vars; a promoted let drops its value dependencies
            if value.is_some() && !jp {
                self.ctx.params.push(fvar);
                value = None;
            }
        } else {
            self.ctx.vars.push(fvar);
            if value.is_none() || !jp {
                self.ctx.params.push(fvar);
                value = None;
            }
        }
        self.collect(ty, true);
        if let Some(value) = value {
            self.collect(value, true);
        }
    }
}

/* ------------------------------ The specializer ---------------------------- */

/// One specializer per top-level declaration; clone names count up from the
/// declaration's name.
struct Specializer<'a> {
    store: &'a mut TermStore,
    env: Env,
    cfg: &'a SpecConfig,
    lctx: LocalCtx,
    new_decls: Vec<Decl>,
    base_name: NameId,
    at_name: NameId,
    spec_name: NameId,
    next_idx: u64,
    depth: usize,
}

impl<'a> Specializer<'a> {
    fn new(store: &'a mut TermStore, env: Env, cfg: &'a SpecConfig, base_name: NameId) -> Self {
        let at_name = store.names.simple("_at");
        let spec_name = store.names.simple("_spec");
        Specializer {
            store,
            env,
            cfg,
            lctx: LocalCtx::new(),
            new_decls: Vec::new(),
            base_name,
            at_name,
            spec_name,
            next_idx: 1,
            depth: 0,
        }
    }

    /// Runs `f` with the context restored afterwards, whatever it added.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.lctx.clone();
        let result = f(self);
        self.lctx = saved;
        result
    }

    /* ------------------------------- Traversal ------------------------------ */

    fn visit(&mut self, expr: ExprId) -> ExprId {
        match self.store.exprs[&expr].clone() {
            | Expr::App(_) => self.visit_app(expr),
            | Expr::Lam(_) => self.visit_lambda(expr),
            | Expr::Let(_) => self.visit_let(expr),
            | _ => expr,
        }
    }

    fn visit_lambda(&mut self, expr: ExprId) -> ExprId {
        self.scoped(|this| {
            let mut fvars = Vec::new();
            let mut body = expr;
            while let Expr::Lam(binder) = this.store.exprs[&body].clone() {
                let fvar = this.lctx.mk_local_decl(
                    &mut this.store.fvars,
                    binder.name,
                    binder.ty,
                    binder.info,
                );
                let fv = this.store.exprs.fvar(fvar);
                fvars.push(fvar);
                body = this.store.exprs.instantiate1(binder.body, fv);
            }
            let body = this.visit(body);
            this.lctx.mk_lambda(&mut this.store.exprs, &fvars, body)
        })
    }

    fn visit_let(&mut self, expr: ExprId) -> ExprId {
        self.scoped(|this| {
            let mut fvars = Vec::new();
            let mut body = expr;
            while let Expr::Let(bind) = this.store.exprs[&body].clone() {
                let value = this.visit(bind.value);
                let fvar =
                    this.lctx.mk_let_decl(&mut this.store.fvars, bind.name, bind.ty, value);
                let fv = this.store.exprs.fvar(fvar);
                fvars.push(fvar);
                body = this.store.exprs.instantiate1(bind.body, fv);
            }
            let body = this.visit(body);
            this.lctx.mk_lambda(&mut this.store.exprs, &fvars, body)
        })
    }

    fn visit_app(&mut self, expr: ExprId) -> ExprId {
        if let Some((_, info)) = self.env.is_cases_app(&self.store.exprs, expr) {
            let (fun, mut args) = self.store.exprs.app_fn_args(expr);
            let end = info.minors_end.min(args.len());
            let begin = info.minors_begin.min(end);
            for i in begin..end {
                args[i] = self.visit(args[i]);
            }
            return self.store.exprs.app_spine(fun, &args);
        }
        let (fun, args) = self.store.exprs.app_fn_args(expr);
        let Some(name) = self.store.exprs.const_name(fun) else { return expr };
        if self.env.has_nospecialize_attr(&self.store.names, name) {
            return expr;
        }
        // instances are only specialized on request; unfolding them
        // everywhere duplicates every method
        if self.env.is_instance(name) && !self.env.has_specialize_attr(&self.store.names, name) {
            return expr;
        }
        let Some(info) = self.env.spec_info(name) else { return expr };
        let mut ctx = SpecCtx::new(info.mutuals.clone());
        match self.specialize(name, &args, &mut ctx) {
            | Some(call) => call,
            | None => expr,
        }
    }

    /* ------------------------------ Call analysis --------------------------- */

    /// Chases a local through its let values down to the defining term.
    fn find_value(&self, expr: ExprId) -> ExprId {
        let mut cur = expr;
        while let Some(fvar) = self.store.exprs.fvar_id(cur) {
            match self.lctx.value_of(fvar) {
                | Some(value) => cur = value,
                | None => break,
            }
        }
        cur
    }

    /// A call is worth cloning when some captured position receives an
    /// argument with usable structure: an instance that normalizes to a
    /// constructor or closure, or a higher-order argument whose value is a
    /// lambda or a named function.
    fn is_candidate(&mut self, fn_name: NameId, args: &[ExprId]) -> bool {
        let Some(info) = self.env.spec_info(fn_name) else { return false };
        let kinds = info.kinds.clone();
        let has_attr = self.env.has_specialize_attr(&self.store.names, fn_name);
        let has_inst = kinds.iter().any(|kind| matches!(kind, ArgKind::FixedInst));
        if !has_attr && !has_inst {
            return false;
        }
        if kinds.iter().all(|kind| matches!(kind, ArgKind::Other)) {
            return false;
        }
        for (i, kind) in kinds.iter().enumerate() {
            if i >= args.len() {
                break;
            }
            match kind {
                | ArgKind::FixedInst => {
                    let w = TypeChecker::new(self.store, &self.env, self.lctx.clone())
                        .whnf(args[i]);
                    if self.env.is_ctor_app(&self.store.exprs, w) || self.store.exprs.is_lam(w) {
                        return true;
                    }
                }
                | ArgKind::FixedHO => {
                    let v = self.find_value(args[i]);
                    let head = self.store.exprs.app_fn(v);
                    if self.store.exprs.is_lam(v) || self.store.exprs.const_name(head).is_some() {
                        return true;
                    }
                }
                // TODO: accept constructor and literal arguments once a
                // profitability check keeps plain data from cloning every
                // call site
                | ArgKind::Fixed => {}
                | ArgKind::FixedNeutral | ArgKind::Other => {}
            }
        }
        false
    }

    /// Seeds the attempt's closure from the arguments the mask would
    /// capture, then fixes a deterministic order by context depth.
    fn collect_closure(&mut self, fn_name: NameId, args: &[ExprId], ctx: &mut SpecCtx) {
        let Some(info) = self.env.spec_info(fn_name) else { return };
        let kinds = info.kinds.clone();
        let has_attr = self.env.has_specialize_attr(&self.store.names, fn_name);
        let mut collector = DepCollector {
            store: &*self.store,
            lctx: &self.lctx,
            ctx: &mut *ctx,
            seen_outside: HashSet::new(),
            seen_inside: HashSet::new(),
        };
        let len = kinds.len().min(args.len());
        let mut found_inst = false;
        for i in (0..len).rev() {
            match kinds[i] {
                | ArgKind::FixedInst => {
                    collector.collect(args[i], false);
                    found_inst = true;
                }
                | ArgKind::FixedHO | ArgKind::FixedNeutral => {
                    if has_attr || found_inst {
                        collector.collect(args[i], false);
                    }
                }
                | ArgKind::Fixed | ArgKind::Other => {}
            }
        }
        self.lctx.sort_fvars(&mut ctx.vars);
        self.lctx.sort_fvars(&mut ctx.params);
        let f = Formatter::with_lctx(&*self.store, &self.lctx);
        log::trace!(
            "candidate: {}{}\n  closure:{}\n  params:{}",
            fn_name.ugly(&f),
            args.iter().map(|arg| format!(" {}", arg.ugly(&f))).collect::<String>(),
            ctx.vars.iter().map(|var| format!(" {}", var.ugly(&f))).collect::<String>(),
            ctx.params.iter().map(|param| format!(" {}", param.ugly(&f))).collect::<String>(),
        );
    }

    fn bool_mask(&self, fn_name: NameId, args_len: usize) -> Vec<bool> {
        let Some(info) = self.env.spec_info(fn_name) else { return Vec::new() };
        let has_attr = self.env.has_specialize_attr(&self.store.names, fn_name);
        to_bool_mask(&info.kinds, args_len, has_attr)
    }

    /* ----------------------------- Clone building --------------------------- */

    /// `fn ++ "_at" ++ <enclosing declaration> ++ "_spec_<idx>"`
    fn mk_spec_name(&mut self, fn_name: NameId) -> NameId {
        let names = &mut self.store.names;
        let name = names.join(fn_name, self.at_name);
        let name = names.join(name, self.base_name);
        let tag = names.append_after(self.spec_name, self.next_idx);
        self.next_idx += 1;
        names.join(name, tag)
    }

    /// The callee applied per mask slot to its placeholder, or to a hole
    /// where nothing is captured. Purely structural; never typed.
    fn mk_cache_key(&mut self, fn_name: NameId, mask: &[Option<ExprId>]) -> ExprId {
        let mut key = self.store.exprs.constant(fn_name);
        for slot in mask {
            let arg = match slot {
                | Some(placeholder) => *placeholder,
                | None => self.store.exprs.hole(),
            };
            key = self.store.exprs.app(key, arg);
        }
        key
    }

    /// Rebuilds `expr` with every let-bound local replaced by its value.
    /// `None` when a value-less local remains and the term cannot be closed.
    fn get_closed(&mut self, expr: ExprId) -> Option<ExprId> {
        if !self.store.exprs.has_fvar(expr) {
            return Some(expr);
        }
        match self.store.exprs[&expr].clone() {
            | Expr::BVar(_) | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => {
                Some(expr)
            }
            | Expr::FVar(fvar) => {
                let value = self.lctx.value_of(fvar)?;
                self.get_closed(value)
            }
            | Expr::App(App(fun, arg)) => {
                let fun = self.get_closed(fun)?;
                let arg = self.get_closed(arg)?;
                Some(self.store.exprs.app(fun, arg))
            }
            | Expr::Lam(binder) => {
                let ty = self.get_closed(binder.ty)?;
                let body = self.get_closed(binder.body)?;
                Some(self.store.exprs.lam(binder.name, ty, body, binder.info))
            }
            | Expr::Pi(binder) => {
                let ty = self.get_closed(binder.ty)?;
                let body = self.get_closed(binder.body)?;
                Some(self.store.exprs.pi(binder.name, ty, body, binder.info))
            }
            | Expr::Let(bind) => {
                let ty = self.get_closed(bind.ty)?;
                let value = self.get_closed(bind.value)?;
                let body = self.get_closed(bind.body)?;
                Some(self.store.exprs.let_bind(bind.name, ty, value, body))
            }
        }
    }

    /// Specializes one call. `None` leaves the call as it was; neither a
    /// partial rewrite nor a half-built clone group ever escapes.
    fn specialize(&mut self, fn_name: NameId, args: &[ExprId], ctx: &mut SpecCtx) -> Option<ExprId> {
        if !self.is_candidate(fn_name, args) {
            return None;
        }
        self.collect_closure(fn_name, args, ctx);
        let bmask = self.bool_mask(fn_name, args.len());
        if !bmask.iter().any(|bit| *bit) {
            // nothing would be captured; a clone would only rename the callee
            return None;
        }
        let mut mask: Vec<Option<ExprId>> = Vec::new();
        let mut fvars: Vec<FVarId> = Vec::new();
        let mut fvar_vals: Vec<ExprId> = Vec::new();
        let mut key_args: Vec<ExprId> = Vec::new();
        let mut global = true;
        for (i, bit) in bmask.iter().enumerate() {
            if *bit {
                // a capture whose value is not closed keeps the clone out of
                // the cross-unit cache
                if global {
                    match self.get_closed(args[i]) {
                        | Some(closed) => key_args.push(closed),
                        | None => global = false,
                    }
                }
                let placeholder = self.store.fvars.fresh();
                let fv = self.store.exprs.fvar(placeholder);
                fvars.push(placeholder);
                fvar_vals.push(args[i]);
                mask.push(Some(fv));
            } else {
                mask.push(None);
                if global {
                    let hole = self.store.exprs.hole();
                    key_args.push(hole);
                }
            }
        }
        let key = if global {
            let fun = self.store.exprs.constant(fn_name);
            Some(self.store.exprs.app_spine(fun, &key_args))
        } else {
            None
        };
        let cached = key.and_then(|key| self.env.spec_cache_get(key));
        let new_name = match cached {
            | Some(name) => name,
            | None => {
                let env_mark = self.env.mark();
                let decls_mark = self.new_decls.len();
                match self.mk_spec_group(fn_name, &mask, &fvars, &fvar_vals, ctx) {
                    | Some(name) => {
                        if let Some(key) = key {
                            self.env.spec_cache_insert(key, name);
                        }
                        name
                    }
                    | None => {
                        // unwind the siblings that already landed
                        self.new_decls.truncate(decls_mark);
                        self.env.revert(env_mark);
                        return None;
                    }
                }
            }
        };
        let mut call = self.store.exprs.constant(new_name);
        for param in &ctx.params {
            let fv = self.store.exprs.fvar(*param);
            call = self.store.exprs.app(call, fv);
        }
        for (i, arg) in args.iter().enumerate() {
            if i >= bmask.len() || !bmask[i] {
                call = self.store.exprs.app(call, *arg);
            }
        }
        Some(call)
    }

    /// One whole attempt: preprocesses the callee's group, then finishes
    /// every buffered sibling. `None` means some sibling could not be
    /// built; the caller unwinds whatever the others already recorded.
    fn mk_spec_group(
        &mut self, fn_name: NameId, mask: &[Option<ExprId>], fvars: &[FVarId],
        fvar_vals: &[ExprId], ctx: &mut SpecCtx,
    ) -> Option<NameId> {
        let name = self.spec_preprocess(fn_name, mask, ctx)?;
        let pre_decls = ctx.pre_decls.clone();
        for pre_decl in &pre_decls {
            self.mk_new_decl(pre_decl, fvars, fvar_vals, ctx)?;
        }
        Some(name)
    }

    /// Builds the clone body for `fn_name` under `mask`: captured formals
    /// are substituted by their placeholders, the rest stay parameters, and
    /// recursive calls are redirected. The clone is named and cached before
    /// its body is built so knots tie back to it.
    fn spec_preprocess(
        &mut self, fn_name: NameId, mask: &[Option<ExprId>], ctx: &mut SpecCtx,
    ) -> Option<NameId> {
        if self.depth >= self.cfg.max_depth {
            return None;
        }
        self.depth += 1;
        let result = self.spec_preprocess_core(fn_name, mask, ctx);
        self.depth -= 1;
        result
    }

    fn spec_preprocess_core(
        &mut self, fn_name: NameId, mask: &[Option<ExprId>], ctx: &mut SpecCtx,
    ) -> Option<NameId> {
        let key = self.mk_cache_key(fn_name, mask);
        if let Some(cached) = ctx.cache.get(&key) {
            return Some(*cached);
        }
        let value = match self.env.find(fn_name) {
            | Some(info) if info.is_definition() => info.value?,
            | _ => return None,
        };
        let new_name = self.mk_spec_name(fn_name);
        ctx.cache.insert(key, new_name);
        self.scoped(|this| {
            let mut subst: Vec<ExprId> = Vec::new();
            let mut new_fvars: Vec<FVarId> = Vec::new();
            let mut code = value;
            for slot in mask {
                let Expr::Lam(binder) = this.store.exprs[&code].clone() else { return None };
                match slot {
                    | Some(placeholder) => subst.push(*placeholder),
                    | None => {
                        let ty = this.store.exprs.instantiate_rev(binder.ty, &subst);
                        let fvar = this.lctx.mk_local_decl(
                            &mut this.store.fvars,
                            binder.name,
                            ty,
                            binder.info,
                        );
                        new_fvars.push(fvar);
                        let fv = this.store.exprs.fvar(fvar);
                        subst.push(fv);
                    }
                }
                code = binder.body;
            }
            let code = this.store.exprs.instantiate_rev(code, &subst);
            let code = this.adjust_rec_apps(code, mask, ctx)?;
            let code = this.lctx.mk_lambda(&mut this.store.exprs, &new_fvars, code);
            ctx.pre_decls.push(Decl::new(new_name, code));
            Some(new_name)
        })
    }

    /// Redirects calls into the mutual group whose captured positions
    /// forward the placeholders in `mask`, cloning the callees as needed.
    /// Any failure aborts the whole attempt.
    fn adjust_rec_apps(
        &mut self, expr: ExprId, mask: &[Option<ExprId>], ctx: &mut SpecCtx,
    ) -> Option<ExprId> {
        match self.store.exprs[&expr].clone() {
            | Expr::App(_) => {
                if let Some((_, info)) = self.env.is_cases_app(&self.store.exprs, expr) {
                    let (fun, mut args) = self.store.exprs.app_fn_args(expr);
                    let end = info.minors_end.min(args.len());
                    let begin = info.minors_begin.min(end);
                    for i in begin..end {
                        args[i] = self.adjust_rec_apps(args[i], mask, ctx)?;
                    }
                    return Some(self.store.exprs.app_spine(fun, &args));
                }
                let (fun, args) = self.store.exprs.app_fn_args(expr);
                let Some(name) = self.store.exprs.const_name(fun) else { return Some(expr) };
                if !ctx.in_mutual_group(name) {
                    return Some(expr);
                }
                let bmask = self.bool_mask(name, args.len());
                let mut new_mask: Vec<Option<ExprId>> = Vec::new();
                let mut found = false;
                for (i, bit) in bmask.iter().enumerate() {
                    let forwarded =
                        *bit && mask.iter().flatten().any(|placeholder| *placeholder == args[i]);
                    if forwarded {
                        new_mask.push(Some(args[i]));
                        found = true;
                    } else {
                        new_mask.push(None);
                    }
                }
                if !found {
                    return Some(expr);
                }
                let new_name = self.spec_preprocess(name, &new_mask, ctx)?;
                let mut call = self.store.exprs.constant(new_name);
                for param in &ctx.params {
                    let fv = self.store.exprs.fvar(*param);
                    call = self.store.exprs.app(call, fv);
                }
                for (i, arg) in args.iter().enumerate() {
                    let captured = i < new_mask.len() && new_mask[i].is_some();
                    if !captured {
                        call = self.store.exprs.app(call, *arg);
                    }
                }
                Some(call)
            }
            | Expr::Lam(_) => {
                let mut binders: Vec<Binder<ExprId>> = Vec::new();
                let mut body = expr;
                while let Expr::Lam(binder) = self.store.exprs[&body].clone() {
                    body = binder.body;
                    binders.push(binder);
                }
                let mut res = self.adjust_rec_apps(body, mask, ctx)?;
                for binder in binders.iter().rev() {
                    res = self.store.exprs.lam(binder.name, binder.ty, res, binder.info);
                }
                Some(res)
            }
            | Expr::Let(_) => {
                let mut binds: Vec<LetBind<ExprId>> = Vec::new();
                let mut body = expr;
                while let Expr::Let(bind) = self.store.exprs[&body].clone() {
                    body = bind.body;
                    binds.push(bind);
                }
                for bind in &mut binds {
                    bind.value = self.adjust_rec_apps(bind.value, mask, ctx)?;
                }
                let mut res = self.adjust_rec_apps(body, mask, ctx)?;
                for bind in binds.iter().rev() {
                    res = self.store.exprs.let_bind(bind.name, bind.ty, bind.value, res);
                }
                Some(res)
            }
            | _ => Some(expr),
        }
    }

    /// Finishes one buffered clone: binds the placeholders to the captured
    /// values, closes over the collected context, registers the signature,
    /// then cleans the body and visits it for nested opportunities.
    fn mk_new_decl(
        &mut self, pre_decl: &Decl, fvars: &[FVarId], fvar_vals: &[ExprId], ctx: &SpecCtx,
    ) -> Option<()> {
        let code = self.scoped(|this| {
            let mut code = pre_decl.code;
            let mut new_let_decls: Vec<FVarId> = Vec::new();
            let y_name = this.store.names.simple("_y");
            for i in 0..fvars.len() {
                let ty = TypeChecker::new(this.store, &this.env, this.lctx.clone())
                    .infer(fvar_vals[i])
                    .ok()?;
                let irrelevant = TypeChecker::new(this.store, &this.env, this.lctx.clone())
                    .is_irrelevant_type(ty)
                    .ok()?;
                if irrelevant {
                    // types and proofs are substituted outright; a let would
                    // keep runtime-irrelevant code alive
                    code = this.store.exprs.replace_fvar(code, fvars[i], fvar_vals[i]);
                } else {
                    let user_name = this.store.names.append_after(y_name, (i + 1) as u64);
                    this.lctx.push_existing(
                        fvars[i],
                        user_name,
                        ty,
                        Some(fvar_vals[i]),
                        BinderInfo::Explicit,
                    );
                    new_let_decls.push(fvars[i]);
                }
            }
            let code = this.lctx.mk_lambda(&mut this.store.exprs, &new_let_decls, code);
            Some(this.abstract_spec_ctx(ctx, code))
        })?;
        if !self.store.exprs.is_closed(code) {
            return None;
        }
        // later clone bodies and the re-visit below need this signature
        let ty = TypeChecker::new(self.store, &self.env, LocalCtx::new()).infer(code).ok()?;
        let ty = self.store.exprs.cheap_beta_reduce(ty);
        self.env
            .add_decl(
                &self.store.names,
                &self.store.exprs,
                ConstInfo { name: pre_decl.name, ty, value: None, kind: ConstKind::Axiom },
            )
            .ok()?;
        let code = simp(self.store, &self.cfg.simp, code);
        let code = self.visit(code);
        let code = self.eta_expand_specialization(code);
        {
            let f = Formatter::new(self.store);
            log::trace!("new specialization {} := {}", pre_decl.name.ugly(&f), code.ugly(&f));
        }
        self.new_decls.push(Decl::new(pre_decl.name, code));
        Some(())
    }

    /// Closes `code` over the collected context. Locals promoted to
    /// parameters rebind as lambdas even when they carry a value; the
    /// remaining valued locals keep their defining lets.
    fn abstract_spec_ctx(&mut self, ctx: &SpecCtx, code: ExprId) -> ExprId {
        let promoted: HashSet<FVarId> = ctx
            .params
            .iter()
            .copied()
            .filter(|param| self.lctx.value_of(*param).is_some())
            .collect();
        let vars = &ctx.vars;
        let mut res = self.store.exprs.abstract_fvars(code, vars);
        for i in (0..vars.len()).rev() {
            let Some(decl) = self.lctx.find(vars[i]) else { unreachable!() };
            let LocalDecl { name, ty, value, info, .. } = decl.clone();
            let ty = self.store.exprs.abstract_fvars(ty, &vars[..i]);
            res = match value {
                | Some(value) if !promoted.contains(&vars[i]) => {
                    let value = self.store.exprs.abstract_fvars(value, &vars[..i]);
                    self.store.exprs.let_bind(name, ty, value, res)
                }
                | _ => self.store.exprs.lam(name, ty, res, info),
            };
        }
        res
    }

    /* ------------------------------ Eta expansion --------------------------- */

    /// Canonicalizes a finished clone: one syntactic lambda per arrow of
    /// its inferred type, with the lets of the original chain rebound
    /// underneath. Formal types come from the inferred type, where let
    /// values are already unfolded. When the type cannot be inferred the
    /// code is returned unchanged.
    fn eta_expand_specialization(&mut self, code: ExprId) -> ExprId {
        match self.try_eta_expand(code) {
            | Ok(expanded) => expanded,
            | Err(_) => code,
        }
    }

    fn try_eta_expand(&mut self, code: ExprId) -> Result<ExprId> {
        let mut lctx = LocalCtx::new();
        let ty = TypeChecker::new(self.store, &self.env, lctx.clone()).infer(code)?;
        let mut ty = TypeChecker::new(self.store, &self.env, lctx.clone()).whnf(ty);
        let mut args: Vec<FVarId> = Vec::new();
        while let Expr::Pi(binder) = self.store.exprs[&ty].clone() {
            let fvar =
                lctx.mk_local_decl(&mut self.store.fvars, binder.name, binder.ty, binder.info);
            let fv = self.store.exprs.fvar(fvar);
            args.push(fvar);
            let inst = self.store.exprs.instantiate1(binder.body, fv);
            ty = TypeChecker::new(self.store, &self.env, lctx.clone()).whnf(inst);
        }
        if args.is_empty() {
            return Ok(code);
        }
        let mut chain = code;
        let mut lets: Vec<FVarId> = Vec::new();
        let mut applied = None;
        for i in 0..args.len() {
            while let Expr::Let(bind) = self.store.exprs[&chain].clone() {
                let fvar =
                    lctx.mk_let_decl(&mut self.store.fvars, bind.name, bind.ty, bind.value);
                let fv = self.store.exprs.fvar(fvar);
                lets.push(fvar);
                chain = self.store.exprs.instantiate1(bind.body, fv);
            }
            match self.store.exprs[&chain].clone() {
                | Expr::Lam(binder) => {
                    let fv = self.store.exprs.fvar(args[i]);
                    chain = self.store.exprs.instantiate1(binder.body, fv);
                }
                | _ => {
                    // fewer lambdas than arrows; the tail takes the leftover
                    // formals
                    let head = if self.store.exprs.is_atom(chain) {
                        chain
                    } else {
                        let head_ty =
                            TypeChecker::new(self.store, &self.env, lctx.clone()).infer(chain)?;
                        let e_name = self.store.names.simple("_e");
                        let fvar =
                            lctx.mk_let_decl(&mut self.store.fvars, e_name, head_ty, chain);
                        lets.push(fvar);
                        self.store.exprs.fvar(fvar)
                    };
                    let rest = args[i..]
                        .iter()
                        .map(|arg| self.store.exprs.fvar(*arg))
                        .collect::<Vec<_>>();
                    applied = Some(self.store.exprs.app_spine(head, &rest));
                    break;
                }
            }
        }
        let body = applied.unwrap_or(chain);
        let mut binders = args;
        binders.extend(lets.iter().copied());
        Ok(lctx.mk_lambda(&mut self.store.exprs, &binders, body))
    }
}
