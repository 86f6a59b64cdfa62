//! Shared fixtures for end-to-end tests of the middle end.
//!
//! Every test starts from [`fixtures::base_world`]: a compiled prelude with
//! `Nat`, `List`, their constructors, a cases function, and a specializable
//! `map` whose unit has already been through parameter classification.

pub mod fixtures {
    use minuet_lcnf::prelude::*;
    use minuet_opt::prelude::*;

    pub fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// One compilation session: shared term storage plus the environment
    /// accumulated by the units compiled so far.
    pub struct World {
        pub store: TermStore,
        pub env: Env,
    }

    /// `Nat -> Nat`
    pub fn nat_fn_ty(store: &mut TermStore) -> ExprId {
        let a = store.names.simple("a");
        let nat = store.prims.nat;
        let nat_e = store.exprs.constant(nat);
        store.exprs.pi(a, nat_e, nat_e, BinderInfo::Explicit)
    }

    /// `fun (x : Nat) => succ x`
    pub fn succ_closure(store: &mut TermStore) -> ExprId {
        let x = store.names.simple("x");
        let nat = store.prims.nat;
        let nat_e = store.exprs.constant(nat);
        let succ = store.names.simple("succ");
        let succ_e = store.exprs.constant(succ);
        let b0 = store.exprs.bvar(0);
        let body = store.exprs.app(succ_e, b0);
        store.exprs.lam(x, nat_e, body, BinderInfo::Explicit)
    }

    /// `<name> = fun (xs : List) => let f := (fun x => succ x);
    ///    let r := <callee> f xs; r`
    pub fn closure_caller(store: &mut TermStore, name: NameId, callee: NameId) -> Decl {
        let list = store.names.simple("List");
        let list_e = store.exprs.constant(list);
        let xs = store.names.simple("xs");
        let f = store.names.simple("f");
        let r = store.names.simple("r");
        let callee_e = store.exprs.constant(callee);
        let f_to_f = nat_fn_ty(store);
        let clos = succ_closure(store);
        let b0 = store.exprs.bvar(0);
        let b1 = store.exprs.bvar(1);
        let r_v = store.exprs.app_spine(callee_e, &[b0, b1]);
        let tail = store.exprs.let_bind(r, list_e, r_v, b0);
        let tail = store.exprs.let_bind(f, f_to_f, clos, tail);
        let code = store.exprs.lam(xs, list_e, tail, BinderInfo::Explicit);
        Decl::new(name, code)
    }

    /// `map = fun (f : Nat -> Nat) (xs : List) => casesList xs nil
    ///    (fun (h : Nat) (t : List) =>
    ///       let fh := f h; let r := map f t; let c := cons fh r; c)`
    ///
    /// `map` carries the specialize attribute, and its unit has been
    /// classified, so later units can specialize calls into it.
    pub fn base_world() -> World {
        init_logs();
        let mut store = TermStore::new();
        let mut env = Env::new();
        let nat = store.prims.nat;
        let nat_e = store.exprs.constant(nat);
        let type0 = store.exprs.sort(1);
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: nat, ty: type0, value: None, kind: ConstKind::Axiom },
        )
        .unwrap();
        let zero = store.names.simple("zero");
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: zero, ty: nat_e, value: None, kind: ConstKind::Ctor },
        )
        .unwrap();
        let succ = store.names.simple("succ");
        let succ_ty = nat_fn_ty(&mut store);
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: succ, ty: succ_ty, value: None, kind: ConstKind::Ctor },
        )
        .unwrap();
        let list = store.names.simple("List");
        let list_e = store.exprs.constant(list);
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: list, ty: type0, value: None, kind: ConstKind::Axiom },
        )
        .unwrap();
        let a = store.names.simple("a");
        let nil = store.names.simple("nil");
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: nil, ty: list_e, value: None, kind: ConstKind::Ctor },
        )
        .unwrap();
        let cons = store.names.simple("cons");
        let l_to_l = store.exprs.pi(a, list_e, list_e, BinderInfo::Explicit);
        let cons_ty = store.exprs.pi(a, nat_e, l_to_l, BinderInfo::Explicit);
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: cons, ty: cons_ty, value: None, kind: ConstKind::Ctor },
        )
        .unwrap();
        // casesList : List -> List -> (Nat -> List -> List) -> List
        let cases = store.names.simple("casesList");
        let minor_ty = {
            let inner = store.exprs.pi(a, list_e, list_e, BinderInfo::Explicit);
            store.exprs.pi(a, nat_e, inner, BinderInfo::Explicit)
        };
        let cases_ty = {
            let ret = store.exprs.pi(a, minor_ty, list_e, BinderInfo::Explicit);
            let ret = store.exprs.pi(a, list_e, ret, BinderInfo::Explicit);
            store.exprs.pi(a, list_e, ret, BinderInfo::Explicit)
        };
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: cases, ty: cases_ty, value: None, kind: ConstKind::Axiom },
        )
        .unwrap();
        env.register_cases(cases, CasesInfo { minors_begin: 1, minors_end: 3 });

        let map = store.names.simple("map");
        let f_to_f = nat_fn_ty(&mut store);
        let map_ty = {
            let ret = store.exprs.pi(a, list_e, list_e, BinderInfo::Explicit);
            store.exprs.pi(a, f_to_f, ret, BinderInfo::Explicit)
        };
        let code = {
            let names = ["f", "xs", "h", "t", "fh", "r", "c"].map(|n| store.names.simple(n));
            let [f, xs, h, t, fh, r, c] = names;
            let b0 = store.exprs.bvar(0);
            let b1 = store.exprs.bvar(1);
            let b3 = store.exprs.bvar(3);
            let b4 = store.exprs.bvar(4);
            let fh_v = store.exprs.app(b3, b1);
            let map_e = store.exprs.constant(map);
            let r_v = store.exprs.app_spine(map_e, &[b4, b1]);
            let cons_e = store.exprs.constant(cons);
            let c_v = store.exprs.app_spine(cons_e, &[b1, b0]);
            let tail = store.exprs.let_bind(c, list_e, c_v, b0);
            let tail = store.exprs.let_bind(r, list_e, r_v, tail);
            let tail = store.exprs.let_bind(fh, nat_e, fh_v, tail);
            let minor = store.exprs.lam(t, list_e, tail, BinderInfo::Explicit);
            let minor = store.exprs.lam(h, nat_e, minor, BinderInfo::Explicit);
            let nil_e = store.exprs.constant(nil);
            let cases_e = store.exprs.constant(cases);
            let body = store.exprs.app_spine(cases_e, &[b0, nil_e, minor]);
            let body = store.exprs.lam(xs, list_e, body, BinderInfo::Explicit);
            store.exprs.lam(f, f_to_f, body, BinderInfo::Explicit)
        };
        env.add_decl(
            &store.names,
            &store.exprs,
            ConstInfo { name: map, ty: map_ty, value: Some(code), kind: ConstKind::Defn },
        )
        .unwrap();
        env.set_attr(&store.names, SpecAttr::Specialize, map).unwrap();
        let env = collect_spec_info(&mut store, env, &[Decl::new(map, code)]).unwrap();
        World { store, env }
    }
}
