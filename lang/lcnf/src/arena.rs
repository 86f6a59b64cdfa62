use crate::syntax::*;
use minuet_syntax::NameArena;
use minuet_utils::arena::*;
use std::ops::Index;

/* ---------------------------------- Flags --------------------------------- */

/// Structural facts cached per node when it is first allocated.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flags {
    /// whether any free variable occurs in the term
    pub has_fvar: bool,
    /// one past the largest loose de Bruijn index; 0 means bvar-closed
    pub loose_bvars: u32,
}

/* ---------------------------------- Arena --------------------------------- */

/// Hash-consed term storage. Structurally equal terms share an id, so id
/// equality is structural equality; the specialization caches key on this.
pub struct ExprArena {
    intern: ArenaIntern<ExprId, Expr>,
    flags: Vec<Flags>,
}

impl Index<&ExprId> for ExprArena {
    type Output = Expr;
    fn index(&self, id: &ExprId) -> &Self::Output {
        &self.intern[id]
    }
}

impl ExprArena {
    pub fn new(allocator: IndexAlloc<usize>) -> Self {
        ExprArena { intern: ArenaIntern::new(allocator), flags: Vec::new() }
    }

    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let flags = self.compute_flags(&expr);
        let before = self.intern.len();
        let id = self.intern.intern(expr);
        if self.intern.len() > before {
            self.flags.push(flags);
        }
        id
    }

    fn compute_flags(&self, expr: &Expr) -> Flags {
        match expr {
            | Expr::BVar(BVar(idx)) => Flags { has_fvar: false, loose_bvars: idx + 1 },
            | Expr::FVar(_) => Flags { has_fvar: true, loose_bvars: 0 },
            | Expr::Sort(_) | Expr::Const(_) | Expr::Lit(_) | Expr::Hole(_) => Flags::default(),
            | Expr::App(App(fun, arg)) => {
                let fun = self.flags(*fun);
                let arg = self.flags(*arg);
                Flags {
                    has_fvar: fun.has_fvar || arg.has_fvar,
                    loose_bvars: fun.loose_bvars.max(arg.loose_bvars),
                }
            }
            | Expr::Lam(Binder { ty, body, .. }) | Expr::Pi(Binder { ty, body, .. }) => {
                let ty = self.flags(*ty);
                let body = self.flags(*body);
                Flags {
                    has_fvar: ty.has_fvar || body.has_fvar,
                    loose_bvars: ty.loose_bvars.max(body.loose_bvars.saturating_sub(1)),
                }
            }
            | Expr::Let(LetBind { ty, value, body, .. }) => {
                let ty = self.flags(*ty);
                let value = self.flags(*value);
                let body = self.flags(*body);
                Flags {
                    has_fvar: ty.has_fvar || value.has_fvar || body.has_fvar,
                    loose_bvars: ty
                        .loose_bvars
                        .max(value.loose_bvars)
                        .max(body.loose_bvars.saturating_sub(1)),
                }
            }
        }
    }

    pub fn flags(&self, id: ExprId) -> Flags {
        self.flags[id.index()]
    }
    pub fn has_fvar(&self, id: ExprId) -> bool {
        self.flags(id).has_fvar
    }
    pub fn loose_bvars(&self, id: ExprId) -> u32 {
        self.flags(id).loose_bvars
    }
    pub fn is_closed(&self, id: ExprId) -> bool {
        let flags = self.flags(id);
        !flags.has_fvar && flags.loose_bvars == 0
    }

    /* ------------------------------ Constructors ------------------------------ */

    pub fn bvar(&mut self, idx: u32) -> ExprId {
        self.alloc(Expr::BVar(BVar(idx)))
    }
    pub fn fvar(&mut self, fvar: FVarId) -> ExprId {
        self.alloc(Expr::FVar(fvar))
    }
    pub fn sort(&mut self, level: u32) -> ExprId {
        self.alloc(Expr::Sort(Sort(level)))
    }
    pub fn prop(&mut self) -> ExprId {
        self.sort(0)
    }
    pub fn constant(&mut self, name: NameId) -> ExprId {
        self.alloc(Expr::Const(Const(name)))
    }
    pub fn app(&mut self, fun: ExprId, arg: ExprId) -> ExprId {
        self.alloc(Expr::App(App(fun, arg)))
    }
    pub fn app_spine(&mut self, fun: ExprId, args: &[ExprId]) -> ExprId {
        let mut res = fun;
        for arg in args {
            res = self.app(res, *arg);
        }
        res
    }
    pub fn lam(&mut self, name: NameId, ty: ExprId, body: ExprId, info: BinderInfo) -> ExprId {
        self.alloc(Expr::Lam(Binder { name, ty, body, info }))
    }
    pub fn pi(&mut self, name: NameId, ty: ExprId, body: ExprId, info: BinderInfo) -> ExprId {
        self.alloc(Expr::Pi(Binder { name, ty, body, info }))
    }
    pub fn let_bind(&mut self, name: NameId, ty: ExprId, value: ExprId, body: ExprId) -> ExprId {
        self.alloc(Expr::Let(LetBind { name, ty, value, body }))
    }
    pub fn lit(&mut self, lit: Literal) -> ExprId {
        self.alloc(Expr::Lit(lit))
    }
    pub fn hole(&mut self) -> ExprId {
        self.alloc(Expr::Hole(Hole))
    }

    /* -------------------------------- Queries --------------------------------- */

    pub fn is_lam(&self, id: ExprId) -> bool {
        matches!(self[&id], Expr::Lam(_))
    }
    pub fn is_pi(&self, id: ExprId) -> bool {
        matches!(self[&id], Expr::Pi(_))
    }
    pub fn is_let(&self, id: ExprId) -> bool {
        matches!(self[&id], Expr::Let(_))
    }
    pub fn is_fvar(&self, id: ExprId) -> bool {
        matches!(self[&id], Expr::FVar(_))
    }
    pub fn is_sort(&self, id: ExprId) -> bool {
        matches!(self[&id], Expr::Sort(_))
    }
    /// LCNF keeps arguments and let values in atomic position.
    pub fn is_atom(&self, id: ExprId) -> bool {
        matches!(self[&id], Expr::FVar(_) | Expr::Const(_) | Expr::Lit(_))
    }
    pub fn const_name(&self, id: ExprId) -> Option<NameId> {
        match self[&id] {
            | Expr::Const(Const(name)) => Some(name),
            | _ => None,
        }
    }
    pub fn fvar_id(&self, id: ExprId) -> Option<FVarId> {
        match self[&id] {
            | Expr::FVar(fvar) => Some(fvar),
            | _ => None,
        }
    }

    /// Head of an application spine.
    pub fn app_fn(&self, expr: ExprId) -> ExprId {
        let mut e = expr;
        while let Expr::App(App(fun, _)) = &self[&e] {
            e = *fun;
        }
        e
    }

    /// Arguments of an application spine, outermost first.
    pub fn app_args(&self, expr: ExprId) -> Vec<ExprId> {
        let mut args = Vec::new();
        let mut e = expr;
        while let Expr::App(App(fun, arg)) = &self[&e] {
            args.push(*arg);
            e = *fun;
        }
        args.reverse();
        args
    }

    pub fn app_fn_args(&self, expr: ExprId) -> (ExprId, Vec<ExprId>) {
        (self.app_fn(expr), self.app_args(expr))
    }

    /// Length of the leading lambda chain.
    pub fn lam_arity(&self, expr: ExprId) -> usize {
        let mut arity = 0;
        let mut e = expr;
        while let Expr::Lam(Binder { body, .. }) = &self[&e] {
            arity += 1;
            e = *body;
        }
        arity
    }
}

/* ------------------------------- Fresh fvars ------------------------------- */

pub struct FVarGen(IndexAlloc<usize>);

impl FVarGen {
    pub fn new(allocator: IndexAlloc<usize>) -> Self {
        FVarGen(allocator)
    }
    pub fn fresh(&mut self) -> FVarId {
        let (meta, idx) = self.0.next().unwrap();
        IndexLike::new(meta, idx)
    }
}

/* ---------------------------------- Store ---------------------------------- */

/// Names the literal types resolve to.
pub struct Prims {
    pub nat: NameId,
    pub string: NameId,
}

/// Shared storage for one compilation session: names, terms, fresh local ids.
pub struct TermStore {
    pub names: NameArena,
    pub exprs: ExprArena,
    pub fvars: FVarGen,
    pub prims: Prims,
}

impl TermStore {
    pub fn new() -> Self {
        let mut global = GlobalAlloc::new();
        let mut names = NameArena::new(global.alloc());
        let exprs = ExprArena::new(global.alloc());
        let fvars = FVarGen::new(global.alloc());
        let nat = names.simple("Nat");
        let string = names.simple("String");
        TermStore { names, exprs, fvars, prims: Prims { nat, string } }
    }
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}
