//! End-to-end runs over the public API: streams of parsed commands in,
//! environments and message logs out.

use lean0_rs::elab::pexpr::keys;
use lean0_rs::{
  BinderInfo, BuiltinKind, CoreCommand, Elaborator, Environment, ExprKind, KvValue, LinedString,
  MessageLog, Name, NotationId, Options, RbMap, Syntax, SyntaxStream,
};

fn elab(commands: Vec<Syntax>) -> (Environment, MessageLog) {
  Elaborator::new("test.lean".into(), LinedString::from(""), Options::default())
    .run(&mut SyntaxStream::new(commands))
}

fn texts(log: &MessageLog) -> Vec<&str> { log.iter().map(|m| m.text.as_str()).collect() }

fn namespace(name: &str) -> Syntax {
  Syntax::node(BuiltinKind::Namespace, vec![Syntax::ident(name)])
}

fn section(label: Option<&str>) -> Syntax {
  Syntax::node(BuiltinKind::Section, label.map(Syntax::ident).into_iter().collect())
}

fn end(label: Option<&str>) -> Syntax {
  Syntax::node(BuiltinKind::End, label.map(Syntax::ident).into_iter().collect())
}

fn def(name: &str, value: Syntax) -> Syntax {
  Syntax::node(
    BuiltinKind::Declaration,
    vec![
      Syntax::node(BuiltinKind::DeclModifiers, vec![]),
      Syntax::atom("def"),
      Syntax::ident(name),
      Syntax::node(BuiltinKind::DeclSig, vec![]),
      value,
    ],
  )
}

fn open_ns(ns: &str) -> Syntax {
  Syntax::node(BuiltinKind::Open, vec![Syntax::node(BuiltinKind::OpenSpec, vec![Syntax::ident(ns)])])
}

fn check(term: Syntax) -> Syntax { Syntax::node(BuiltinKind::Check, vec![term]) }

fn prop() -> Syntax { Syntax::node(BuiltinKind::Sort, vec![Syntax::atom("Prop")]) }

#[test]
fn map_iteration_is_sorted_with_the_last_insert_winning() {
  let mut m = RbMap::new();
  for (k, v) in [(5u32, "a"), (1, "b"), (9, "c"), (3, "d"), (1, "e"), (7, "f")] {
    m = m.insert(k, v)
  }
  let keys: Vec<u32> = m.iter().map(|(k, _)| *k).collect();
  assert_eq!(keys, [1, 3, 5, 7, 9]);
  assert_eq!(m.get(&1), Some(&"e"));
}

#[test]
fn older_maps_are_unaffected_by_later_inserts() {
  let mut m1 = RbMap::new();
  for k in 0u32..100 {
    m1 = m1.insert(k, k * 2)
  }
  let before: Vec<Option<u32>> = (0..110).map(|k| m1.get(&k).copied()).collect();
  let m2 = m1.insert(50, 999);
  let m3 = m1.insert(105, 1);
  let after: Vec<Option<u32>> = (0..110).map(|k| m1.get(&k).copied()).collect();
  assert_eq!(before, after);
  assert_eq!(m2.get(&50), Some(&999));
  assert_eq!(m3.get(&105), Some(&1));
  assert_eq!(m1.get(&105), None);
}

#[test]
fn ambiguous_identifiers_list_candidates_in_open_order() {
  let (env, log) = elab(vec![
    namespace("A"),
    def("x", prop()),
    end(Some("A")),
    namespace("B"),
    def("x", prop()),
    end(Some("B")),
    open_ns("A"),
    open_ns("B"),
    check(Syntax::ident("x")),
  ]);
  assert!(log.is_empty(), "{:?}", texts(&log));
  let [.., CoreCommand::Check(e)] = env.commands() else { panic!("expected a trailing check") };
  assert_eq!(e.annotation(&keys::CHOICE), Some(&KvValue::Nat(2u32.into())));
  let ExprKind::Choice(alts) = e.unwrap_annotations().kind() else { panic!("expected a choice") };
  let names: Vec<&Name> = alts
    .iter()
    .map(|a| match a.kind() {
      ExprKind::Const(n, _) => n,
      k => panic!("expected consts, got {k:?}"),
    })
    .collect();
  assert_eq!(names, [&Name::from("A.x"), &Name::from("B.x")]);
}

#[test]
fn a_root_escape_bypasses_the_open_namespaces() {
  let (env, log) = elab(vec![
    def("foo", prop()),
    namespace("A"),
    def("foo", prop()),
    end(Some("A")),
    open_ns("A"),
    check(Syntax::ident("_root_.foo")),
  ]);
  assert!(log.is_empty(), "{:?}", texts(&log));
  let [.., CoreCommand::Check(e)] = env.commands() else { panic!("expected a trailing check") };
  let ExprKind::Const(name, _) = e.unwrap_annotations().kind() else { panic!("expected a const") };
  assert_eq!(name, &Name::from("foo"));
}

#[test]
fn a_mismatched_end_still_pops_the_scope() {
  let (env, log) =
    elab(vec![namespace("N"), def("a", prop()), end(Some("M")), def("b", prop())]);
  assert_eq!(texts(&log), ["invalid end of namespace, expected name 'N'"]);
  assert!(env.contains(&Name::from("N.a")));
  assert!(env.contains(&Name::from("b")));
}

#[test]
fn notation_kinds_are_minted_per_command() {
  let tilde = |template| {
    Syntax::node(
      BuiltinKind::Notation,
      vec![
        Syntax::node(BuiltinKind::NotaLiteral, vec![Syntax::atom("~")]),
        Syntax::node(BuiltinKind::NotaSlot, vec![Syntax::ident("a")]),
        template,
      ],
    )
  };
  let (env, log) = elab(vec![
    def("foo", prop()),
    tilde(Syntax::ident("a")),
    tilde(Syntax::ident("foo")),
    check(Syntax::node(NotationId(2), vec![Syntax::ident("x")])),
    check(Syntax::node(NotationId(3), vec![Syntax::ident("x")])),
  ]);
  assert!(log.is_empty(), "{:?}", texts(&log));
  let [_, CoreCommand::Check(first), CoreCommand::Check(second)] = env.commands() else {
    panic!("expected two checks")
  };
  // two character-for-character identical specs got distinct kinds: the
  // earlier one still expands to its argument, the later one to `foo`
  assert_eq!(first.annotation(&keys::PRERESOLVED), Some(&KvValue::Bool(false)));
  let ExprKind::Const(name, _) = second.unwrap_annotations().kind() else {
    panic!("expected a const")
  };
  assert_eq!(name, &Name::from("foo"));
}

#[test]
fn section_variables_thread_into_defs_and_expire() {
  let variables = Syntax::node(
    BuiltinKind::Variables,
    vec![Syntax::node(
      BuiltinKind::BinderExplicit,
      vec![Syntax::ident("x"), Syntax::node(BuiltinKind::TypeAscription, vec![prop()])],
    )],
  );
  let (env, log) = elab(vec![
    section(Some("foo")),
    variables,
    def("id", Syntax::ident("x")),
    end(Some("foo")),
    def("k", prop()),
  ]);
  assert!(log.is_empty(), "{:?}", texts(&log));
  let [CoreCommand::Defs(id), CoreCommand::Defs(k)] = env.commands() else {
    panic!("expected two defs")
  };
  assert_eq!(id.name, Name::from("id"));
  // the used variable is threaded as an implicit binder around the value
  let ExprKind::Lambda(info, name, ty, body) = id.value.unwrap_annotations().kind() else {
    panic!("expected a lambda, got {:?}", id.value)
  };
  assert_eq!(*info, BinderInfo::Implicit);
  assert_eq!(name, &Name::from("x"));
  assert!(matches!(ty.unwrap_annotations().kind(), ExprKind::Sort(_)));
  assert!(
    matches!(body.unwrap_annotations().kind(), ExprKind::Local(n) if *n == Name::from("x"))
  );
  // past `end foo` the variable no longer threads
  assert!(matches!(k.value.unwrap_annotations().kind(), ExprKind::Sort(_)));
}

#[test]
fn fuel_bounds_a_run() {
  let commands: Vec<Syntax> =
    (0..10001).map(|_| Syntax::node(BuiltinKind::InitQuot, vec![])).collect();
  let (env, log) = elab(commands);
  assert_eq!(texts(&log), ["out of fuel"]);
  assert_eq!(env.commands().len(), 10000);
}

#[test]
fn an_ambiguous_attribute_target_does_not_poison_the_run() {
  let attribute = Syntax::node(
    BuiltinKind::Attribute,
    vec![Syntax::node(BuiltinKind::AttrNames, vec![Syntax::ident("simp")]), Syntax::ident("f")],
  );
  let (env, log) = elab(vec![
    namespace("A"),
    def("f", prop()),
    end(Some("A")),
    namespace("B"),
    def("f", prop()),
    end(Some("B")),
    open_ns("A"),
    open_ns("B"),
    attribute,
    def("g", prop()),
  ]);
  assert_eq!(texts(&log), ["identifier 'f' is ambiguous"]);
  assert!(env.contains(&Name::from("g")));
  assert!(!env.commands().iter().any(|c| matches!(c, CoreCommand::Attribute { .. })));
}
