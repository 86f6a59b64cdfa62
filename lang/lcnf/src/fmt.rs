//! Readable renderings of terms and declarations, used by traces and error
//! messages. Mechanical output, no layout.

use crate::{arena::*, env::*, lctx::*, syntax::*};
pub use minuet_syntax::Ugly;

pub struct Formatter<'arena> {
    pub store: &'arena TermStore,
    pub lctx: Option<&'arena LocalCtx>,
}

impl<'arena> Formatter<'arena> {
    pub fn new(store: &'arena TermStore) -> Self {
        Formatter { store, lctx: None }
    }
    pub fn with_lctx(store: &'arena TermStore, lctx: &'arena LocalCtx) -> Self {
        Formatter { store, lctx: Some(lctx) }
    }
}

impl<'a> Ugly<'a, Formatter<'a>> for NameId {
    fn ugly(&self, f: &'a Formatter<'a>) -> String {
        f.store.names.display(*self)
    }
}

impl<'a> Ugly<'a, Formatter<'a>> for FVarId {
    fn ugly(&self, f: &'a Formatter<'a>) -> String {
        let mut s = String::new();
        if let Some(decl) = f.lctx.and_then(|lctx| lctx.find(*self)) {
            s += &decl.name.ugly(f);
        }
        s += &self.concise();
        s
    }
}

impl<'a> Ugly<'a, Formatter<'a>> for ExprId {
    fn ugly(&self, f: &'a Formatter<'a>) -> String {
        match &f.store.exprs[self] {
            | Expr::BVar(BVar(idx)) => format!("#{}", idx),
            | Expr::FVar(fvar) => fvar.ugly(f),
            | Expr::Sort(Sort(0)) => "Prop".to_string(),
            | Expr::Sort(Sort(lvl)) => format!("Sort {}", lvl),
            | Expr::Const(Const(name)) => name.ugly(f),
            | Expr::App(App(fun, arg)) => {
                format!("({} {})", fun.ugly(f), arg.ugly(f))
            }
            | Expr::Lam(binder) => {
                let Binder { name, ty, body, info } = binder;
                let (op, cl) = binder_brackets(*info);
                format!("fun {}{} : {}{} => {}", op, name.ugly(f), ty.ugly(f), cl, body.ugly(f))
            }
            | Expr::Pi(binder) => {
                let Binder { name, ty, body, info } = binder;
                let (op, cl) = binder_brackets(*info);
                format!("{}{} : {}{} -> {}", op, name.ugly(f), ty.ugly(f), cl, body.ugly(f))
            }
            | Expr::Let(bind) => {
                let LetBind { name, ty, value, body } = bind;
                format!(
                    "let {} : {} := {}; {}",
                    name.ugly(f),
                    ty.ugly(f),
                    value.ugly(f),
                    body.ugly(f)
                )
            }
            | Expr::Lit(Literal::Nat(n)) => format!("{}", n),
            | Expr::Lit(Literal::Str(s)) => format!("{:?}", s),
            | Expr::Hole(Hole) => "_".to_string(),
        }
    }
}

fn binder_brackets(info: BinderInfo) -> (&'static str, &'static str) {
    match info {
        | BinderInfo::Explicit => ("(", ")"),
        | BinderInfo::Implicit => ("{", "}"),
        | BinderInfo::InstImplicit => ("[", "]"),
    }
}

impl<'a> Ugly<'a, Formatter<'a>> for Decl {
    fn ugly(&self, f: &'a Formatter<'a>) -> String {
        let Decl { name, code } = self;
        format!("def {} := {}", name.ugly(f), code.ugly(f))
    }
}

impl<'a> Ugly<'a, Formatter<'a>> for ArgKind {
    fn ugly(&self, _f: &'a Formatter<'a>) -> String {
        self.code().to_string()
    }
}

impl<'a> Ugly<'a, Formatter<'a>> for SpecInfo {
    fn ugly(&self, f: &'a Formatter<'a>) -> String {
        let SpecInfo { mutuals, kinds } = self;
        let mutuals =
            mutuals.iter().map(|name| name.ugly(f)).collect::<Vec<_>>().join(", ");
        let kinds = kinds.iter().map(|kind| kind.ugly(f)).collect::<String>();
        format!("[{}] {}", kinds, mutuals)
    }
}
