//! The per-command elaborators.
//!
//! Each `elab_*` method takes the syntax node of one top-level command and
//! either extends the elaborator state (scopes, options, parser
//! configuration) or appends a core command to the environment. Errors
//! returned here abort the current command only; the driver reports them
//! and pulls the next command.
//!
//! Scope entry and exit (`namespace`, `section`, `end`) are not here: they
//! drive the command loop itself and live with it.

use crate::elab::notation::{NotationExpander, NotationSpec};
use crate::elab::pexpr::{binder_info, Binder, ExprBuilder};
use crate::elab::resolve::{root_name, VarDecl};
use crate::elab::{ElabError, Elaborator, Result};
use crate::env::{
  CoreCommand, DefKind, DefsCommand, ExportDecl, Modifiers, OpenDecl, OptionValue,
};
use crate::syntax::{BuiltinKind, SyntaxNode};
use crate::{
  BinderInfo, Expr, ExprKind, Level, LevelKind, Name, NotationId, NotationRule, Span, Syntax,
};
use if_chain::if_chain;
use num::BigUint;
use std::collections::HashSet;

/// What kind of declaration a keyword introduces.
#[derive(Clone, Copy, Debug)]
enum DeclHead {
  Def(DefKind),
  Constant,
  Inductive,
  Structure,
}

fn decl_head(kw: &[u8]) -> Option<DeclHead> {
  match kw {
    b"def" => Some(DeclHead::Def(DefKind::Def)),
    b"theorem" => Some(DeclHead::Def(DefKind::Theorem)),
    b"example" => Some(DeclHead::Def(DefKind::Example)),
    b"abbreviation" => Some(DeclHead::Def(DefKind::Abbreviation)),
    b"constant" | b"axiom" => Some(DeclHead::Constant),
    b"inductive" => Some(DeclHead::Inductive),
    b"structure" => Some(DeclHead::Structure),
    _ => None,
  }
}

fn ident_names(args: &[Syntax]) -> Option<Vec<Name>> {
  args.iter().map(|a| a.as_ident().map(|i| i.name.clone())).collect()
}

/// Collects the names of `Local` nodes under `e`.
fn collect_locals(e: &Expr, out: &mut HashSet<Name>) {
  match e.kind() {
    ExprKind::Local(n) => {
      out.insert(n.clone());
    }
    ExprKind::App(f, a) => {
      collect_locals(f, out);
      collect_locals(a, out);
    }
    ExprKind::Lambda(_, _, t, b) | ExprKind::Pi(_, _, t, b) => {
      collect_locals(t, out);
      collect_locals(b, out);
    }
    ExprKind::Let(_, t, v, b) => {
      collect_locals(t, out);
      collect_locals(v, out);
      collect_locals(b, out);
    }
    ExprKind::Mdata(_, e) => collect_locals(e, out),
    ExprKind::Choice(es) => es.iter().for_each(|e| collect_locals(e, out)),
    _ => {}
  }
}

fn level_params(l: &Level, out: &mut HashSet<Name>) {
  match l.kind() {
    LevelKind::Param(n) => {
      out.insert(n.clone());
    }
    LevelKind::Succ(l) => level_params(l, out),
    LevelKind::Max(a, b) | LevelKind::Imax(a, b) => {
      level_params(a, out);
      level_params(b, out);
    }
    LevelKind::Zero | LevelKind::Mvar(_) => {}
  }
}

/// Collects the universe parameter names mentioned under `e`.
fn collect_level_params(e: &Expr, out: &mut HashSet<Name>) {
  match e.kind() {
    ExprKind::Sort(l) => level_params(l, out),
    ExprKind::Const(_, ls) => ls.iter().for_each(|l| level_params(l, out)),
    ExprKind::App(f, a) => {
      collect_level_params(f, out);
      collect_level_params(a, out);
    }
    ExprKind::Lambda(_, _, t, b) | ExprKind::Pi(_, _, t, b) => {
      collect_level_params(t, out);
      collect_level_params(b, out);
    }
    ExprKind::Let(_, t, v, b) => {
      collect_level_params(t, out);
      collect_level_params(v, out);
      collect_level_params(b, out);
    }
    ExprKind::Mdata(_, e) => collect_level_params(e, out),
    ExprKind::Choice(es) => es.iter().for_each(|e| collect_level_params(e, out)),
    _ => {}
  }
}

impl Elaborator {
  fn builder(&mut self) -> ExprBuilder<'_> {
    ExprBuilder::new(&self.file, &self.scopes, &self.notations, &mut self.ngen, self.command_span)
  }

  /// `universe u v ...` declares universe parameters in the current scope.
  /// Redeclaring in the same scope is an error; an inner scope may shadow.
  pub(crate) fn elab_universe(&mut self, n: &SyntaxNode) -> Result<()> {
    if n.args.is_empty() {
      return Err(self.ill_node(n, "universe command"))
    }
    for arg in &n.args {
      let Some(i) = arg.as_ident() else { return Err(self.ill(arg, "universe command")) };
      if let Some(prev) = self.scopes.univ_declared_here(&i.name) {
        let mut e = ElabError::new_e(
          self.stx_pos(arg),
          format!("universe '{}' has already been declared", i.name),
        );
        if let Some(sp) = prev {
          e = e.with_note(*sp, "previously declared here");
        }
        return Err(e)
      }
      self.scopes.add_univ(i.name.clone(), arg.get_pos());
    }
    Ok(())
  }

  /// `variables (a : T) {B : Type} ...` records binders for later
  /// declarations to pick up. The types stay as syntax and are elaborated
  /// afresh in each declaration that uses them.
  pub(crate) fn elab_variables(&mut self, n: &SyntaxNode) -> Result<()> {
    if n.args.is_empty() {
      return Err(self.ill_node(n, "variables command"))
    }
    for g in &n.args {
      let Some(gn) = g.as_node() else { return Err(self.ill(g, "binder")) };
      let Some(info) = binder_info(gn.kind) else { return Err(self.ill(g, "binder")) };
      let mut idents = vec![];
      let mut args = gn.args.iter().peekable();
      while let Some(i) = args.peek().and_then(|a| a.as_ident()) {
        idents.push(i);
        args.next();
      }
      let ty = match args.next() {
        None => Syntax::node(BuiltinKind::Hole, vec![]),
        Some(t) => {
          let Some(asc) = t.as_kind(BuiltinKind::TypeAscription) else {
            return Err(self.ill(g, "binder"))
          };
          let [ty] = &*asc.args else { return Err(self.ill(g, "binder")) };
          if args.next().is_some() {
            return Err(self.ill(g, "binder"))
          }
          ty.clone()
        }
      };
      if idents.is_empty() {
        if info != BinderInfo::InstImplicit {
          return Err(self.ill(g, "binder"))
        }
        let name = self.ngen.fresh();
        self.scopes.add_var(VarDecl { pos: gn.span, name, info, ty });
      } else {
        for i in idents {
          if let Some(prev) = self.scopes.find_var(&i.name).map(|v| v.info) {
            if prev != info {
              self.report(ElabError::new_e(
                self.stx_pos(g),
                format!(
                  "variable '{}' has already been declared with a different binder annotation",
                  i.name
                ),
              ));
              continue
            }
          }
          self.scopes.add_var(VarDecl {
            pos: i.span.or(gn.span),
            name: i.name.clone(),
            info,
            ty: ty.clone(),
          });
        }
      }
    }
    Ok(())
  }

  /// `include a b ...` forces the named variables into every following
  /// declaration of the scope, referenced or not.
  pub(crate) fn elab_include(&mut self, n: &SyntaxNode) -> Result<()> {
    if n.args.is_empty() {
      return Err(self.ill_node(n, "include command"))
    }
    for arg in &n.args {
      let Some(i) = arg.as_ident() else { return Err(self.ill(arg, "include command")) };
      if self.scopes.find_var(&i.name).is_none() {
        self.report(ElabError::new_e(
          self.stx_pos(arg),
          format!("invalid include, variable '{}' has not been declared", i.name),
        ));
      } else {
        self.scopes.include_var(i.name.clone());
      }
    }
    Ok(())
  }

  fn parse_modifiers(&self, stx: &Syntax) -> Result<(Modifiers, Option<String>)> {
    let Some(n) = stx.as_kind(BuiltinKind::DeclModifiers) else {
      return Err(self.ill(stx, "declaration"))
    };
    let mut mods = Modifiers::empty();
    let mut doc = None;
    for arg in &n.args {
      if let Some(sn) = arg.as_kind(BuiltinKind::StrLit) {
        if_chain! {
          if let [s] = &*sn.args;
          if let Some(s) = s.as_atom();
          if doc.replace(s.val.as_str().to_owned()).is_none();
          then {}
          else { return Err(self.ill(arg, "doc comment")) }
        }
      } else if let Some(a) = arg.as_atom() {
        let Some(m) = Modifiers::from_keyword(&a.val) else {
          return Err(ElabError::new_e(
            self.stx_pos(arg),
            format!("unknown modifier '{}'", a.val),
          ))
        };
        if mods.contains(m) {
          return Err(ElabError::new_e(
            self.stx_pos(arg),
            format!("duplicate modifier '{}'", a.val),
          ))
        }
        mods |= m;
      } else {
        return Err(self.ill(arg, "declaration modifier"))
      }
    }
    Ok((mods, doc))
  }

  /// Elaborates a declaration command: `def`, `theorem`, `example`,
  /// `abbreviation`, `constant`/`axiom`, `inductive`, or `structure`.
  ///
  /// The name is installed in the environment and the current scope frame
  /// before the body is elaborated, so the body can refer to it. Scope
  /// variables are re-elaborated in the declaration's own context; the
  /// ones the declaration mentions (plus included ones, closed over the
  /// variables their types mention) are prepended as binders, explicit
  /// variables becoming implicit. A `structure` is lowered to an
  /// inductive with a single `mk` constructor taking the fields.
  pub(crate) fn elab_declaration(&mut self, n: &SyntaxNode) -> Result<()> {
    let [mods_stx, kw_stx, name_stx, sig_stx, tail @ ..] = &*n.args else {
      return Err(self.ill_node(n, "declaration"))
    };
    let (mods, doc) = self.parse_modifiers(mods_stx)?;
    let Some(kw) = kw_stx.as_atom() else { return Err(self.ill_node(n, "declaration")) };
    let Some(head) = decl_head(&kw.val) else {
      return Err(ElabError::new_e(
        self.stx_pos(kw_stx),
        format!("unknown declaration kind '{}'", kw.val),
      ))
    };
    let Some(name_id) = name_stx.as_ident() else { return Err(self.ill_node(n, "declaration")) };
    let is_example = matches!(head, DeclHead::Def(DefKind::Example));

    // examples are anonymous and never enter the environment's name set
    let full = if is_example {
      Name::anon()
    } else {
      let base = self.scopes.ns().append(&name_id.name);
      let full = if mods.contains(Modifiers::PRIVATE) {
        Name::simple("_private").append(&base)
      } else {
        base
      };
      if !self.env.declare(full.clone()) {
        return Err(ElabError::new_e(
          self.stx_pos(name_stx),
          format!("'{full}' has already been declared"),
        ))
      }
      self.scopes.declare(name_id.name.clone(), full.clone());
      full
    };

    // resolve against the state that now includes the new name
    let sig = self.scopes.preresolve(&self.env, sig_stx);
    let tail: Vec<Syntax> =
      tail.iter().map(|t| self.scopes.preresolve(&self.env, t)).collect();
    let vars: Vec<VarDecl> = self
      .scopes
      .vars_in_scope()
      .into_iter()
      .map(|v| {
        let mut v = v.clone();
        v.ty = self.scopes.preresolve(&self.env, &v.ty);
        v
      })
      .collect();
    let included: Vec<Name> = vars
      .iter()
      .map(|v| v.name.clone())
      .filter(|nm| self.scopes.is_included(nm))
      .collect();
    let univ_names: Vec<Name> = self.scopes.univs_in_scope().cloned().collect();
    let cpos = self.command_span;

    // signature shape: binder groups, then an optional result type
    let Some(sig_node) = sig.as_kind(BuiltinKind::DeclSig) else {
      return Err(self.ill(&sig, "declaration signature"))
    };
    let mut groups: &[Syntax] = &sig_node.args;
    let mut ret_stx: Option<&Syntax> = None;
    if let Some((last, init)) = sig_node.args.split_last() {
      if let Some(asc) = last.as_kind(BuiltinKind::TypeAscription) {
        let [ty] = &*asc.args else { return Err(self.ill(last, "declaration signature")) };
        groups = init;
        ret_stx = Some(ty);
      }
    }

    enum Tail {
      Value(DefKind, Expr),
      Constant,
      Rules(Vec<(Name, Option<Span>, Expr)>),
      Fields(Vec<Binder>),
    }

    let (cmd, ctors) = {
      let mut bld = self.builder();
      let pos = |stx: &Syntax| stx.get_pos().unwrap_or(cpos);

      // scope variables enter the local context first, in declaration
      // order, each type seeing the variables before it
      let mut var_binders = vec![];
      for v in &vars {
        let ty = bld.to_pexpr(&v.ty)?;
        bld.push_local(v.name.clone());
        var_binders.push(Binder { pos: v.pos, info: v.info, name: v.name.clone(), ty });
      }
      let mut sig_binders = vec![];
      for g in groups {
        sig_binders.extend(bld.binder_group(g)?);
      }
      let ret_ty = match ret_stx {
        Some(t) => Some(bld.to_pexpr(t)?),
        None => None,
      };

      let tail_out = match head {
        DeclHead::Def(kind) => {
          let [value] = &*tail else { return Err(ElabError::new_e(cpos, "ill-formed declaration")) };
          Tail::Value(kind, bld.to_pexpr(value)?)
        }
        DeclHead::Constant => {
          if !tail.is_empty() {
            return Err(ElabError::new_e(cpos, "ill-formed constant"))
          }
          Tail::Constant
        }
        DeclHead::Inductive => {
          // the inductive's own name is in scope in its rules
          bld.push_local(name_id.name.clone());
          let mut rules = vec![];
          for r in &tail {
            let rule = if_chain! {
              if let Some(rn) = r.as_kind(BuiltinKind::IntroRule);
              if let [rid, rty] = &*rn.args;
              if let Some(rid) = rid.as_ident();
              then { (rid.name.clone(), rid.span, bld.to_pexpr(rty)?) }
              else { return Err(ElabError::new_e(pos(r), "ill-formed introduction rule")) }
            };
            rules.push(rule);
          }
          Tail::Rules(rules)
        }
        DeclHead::Structure => {
          let mut fields = vec![];
          for g in &tail {
            fields.extend(bld.binder_group(g)?);
          }
          Tail::Fields(fields)
        }
      };

      // which variables does the declaration use?
      let mut used = HashSet::new();
      for b in &sig_binders {
        collect_locals(&b.ty, &mut used);
      }
      if let Some(t) = &ret_ty {
        collect_locals(t, &mut used);
      }
      match &tail_out {
        Tail::Value(_, v) => collect_locals(v, &mut used),
        Tail::Constant => {}
        Tail::Rules(rs) => rs.iter().for_each(|(_, _, t)| collect_locals(t, &mut used)),
        Tail::Fields(fs) => fs.iter().for_each(|b| collect_locals(&b.ty, &mut used)),
      }
      used.extend(included.iter().cloned());
      loop {
        let mut changed = false;
        for b in &var_binders {
          if used.contains(&b.name) {
            let before = used.len();
            collect_locals(&b.ty, &mut used);
            changed |= used.len() != before;
          }
        }
        if !changed {
          break
        }
      }

      let mut binders: Vec<Binder> = var_binders
        .iter()
        .filter(|b| used.contains(&b.name))
        .map(|b| Binder {
          pos: b.pos,
          info: if b.info == BinderInfo::Default { BinderInfo::Implicit } else { b.info },
          name: b.name.clone(),
          ty: b.ty.clone(),
        })
        .collect();
      binders.extend(sig_binders);

      // universe parameters, in declaration order, filtered by use
      let mut lparams = HashSet::new();
      for b in &binders {
        collect_level_params(&b.ty, &mut lparams);
      }
      if let Some(t) = &ret_ty {
        collect_level_params(t, &mut lparams);
      }
      match &tail_out {
        Tail::Value(_, v) => collect_level_params(v, &mut lparams),
        Tail::Constant => {}
        Tail::Rules(rs) => rs.iter().for_each(|(_, _, t)| collect_level_params(t, &mut lparams)),
        Tail::Fields(fs) => fs.iter().for_each(|b| collect_level_params(&b.ty, &mut lparams)),
      }
      let univ_params: Vec<Name> =
        univ_names.iter().filter(|u| lparams.contains(*u)).cloned().collect();

      let ty = ret_ty.clone().map(|t| ExprBuilder::bind_telescope(binders.clone(), t, true));
      match tail_out {
        Tail::Value(kind, value) => {
          let value = ExprBuilder::bind_telescope(binders, value, false);
          let cmd = CoreCommand::Defs(DefsCommand {
            kind,
            modifiers: mods,
            doc,
            name: full.clone(),
            univ_params,
            ty,
            value,
          });
          (cmd, vec![])
        }
        Tail::Constant => {
          let Some(ty) = ty else {
            return Err(ElabError::new_e(
              cpos,
              format!("constant '{}' requires a type", name_id.name),
            ))
          };
          (CoreCommand::Constant { modifiers: mods, name: full.clone(), univ_params, ty }, vec![])
        }
        Tail::Rules(rules) => {
          let ind_ty = ty.unwrap_or_else(|| {
            ExprBuilder::bind_telescope(binders.clone(), Expr::sort(bld.fresh_level()), true)
          });
          let mut intro_rules = vec![];
          let mut ctors = vec![];
          for (rname, rspan, rty) in rules {
            intro_rules
              .push((rname.clone(), ExprBuilder::bind_telescope(binders.clone(), rty, true)));
            ctors.push((rname.clone(), rspan, full.append(&rname)));
          }
          let cmd = CoreCommand::Inductive {
            modifiers: mods,
            name: full.clone(),
            univ_params,
            ty: ind_ty,
            intro_rules,
          };
          (cmd, ctors)
        }
        Tail::Fields(fields) => {
          let ind_ty = ty.unwrap_or_else(|| {
            ExprBuilder::bind_telescope(binders.clone(), Expr::sort(bld.fresh_level()), true)
          });
          let ret_app = Expr::apps(
            Expr::const_(full.clone(), vec![]),
            binders.iter().map(|b| Expr::local(b.name.clone())),
          );
          let mut mk_binders = binders.clone();
          mk_binders.extend(fields);
          let mk_ty = ExprBuilder::bind_telescope(mk_binders, ret_app, true);
          let mk = Name::simple("mk");
          let cmd = CoreCommand::Inductive {
            modifiers: mods,
            name: full.clone(),
            univ_params,
            ty: ind_ty,
            intro_rules: vec![(mk.clone(), mk_ty)],
          };
          (cmd, vec![(mk.clone(), None, full.append(&mk))])
        }
      }
    };

    for (short, span, full_ctor) in ctors {
      if !self.env.declare(full_ctor.clone()) {
        return Err(ElabError::new_e(
          span.unwrap_or(self.command_span),
          format!("'{full_ctor}' has already been declared"),
        ))
      }
      self.scopes.declare(short, full_ctor);
    }
    self.env.push_command(cmd);
    Ok(())
  }

  /// `notation ... := t` and `reserve notation ...`. Mints a fresh syntax
  /// kind (or claims a matching reservation), folds the rule into the
  /// parser configuration, and for a plain notation registers the
  /// expansion template, resolved against the current scope.
  pub(crate) fn elab_notation(&mut self, n: &SyntaxNode, reserve: bool) -> Result<()> {
    let (spec_args, template) = if reserve {
      (&n.args[..], None)
    } else {
      let Some((tmpl, init)) = n.args.split_last() else {
        return Err(self.ill_node(n, "notation"))
      };
      (init, Some(tmpl))
    };
    let spec = NotationSpec::parse(spec_args, self.command_span)?;
    for sp in &spec.fold_spans {
      self.report(ElabError::new_e(
        sp.unwrap_or(self.command_span),
        "notation folds are not supported; the fold item is ignored",
      ));
    }
    if spec.items.is_empty() {
      return Err(self.ill_node(n, "notation"))
    }

    let matching: Vec<NotationRule> =
      self.cfg.reserved_rules().filter(|r| spec.matches(r)).cloned().collect();
    let (id, items) = match &*matching {
      [] => (NotationId(self.command_idx), spec.resolve(None, reserve)),
      // re-reserving updates in place; a notation claims the reservation
      [r] => (r.id, spec.resolve(Some(r), reserve)),
      _ => {
        return Err(ElabError::new_e(self.node_pos(n), "matches multiple reserved notations"))
      }
    };
    let rule = NotationRule { id, items, reserved: reserve };
    self.cfg.register(rule);

    if let Some(tmpl) = template {
      let params = spec.params();
      let tmpl = self.scopes.preresolve(&self.env, tmpl);
      self.notations.register(id.name(), NotationExpander::new(params, tmpl));
      log::debug!("registered notation {}", id.name());
    } else {
      log::debug!("reserved notation {}", id.name());
    }
    Ok(())
  }

  /// `attribute [attr, ...] t ...` and its `local` form. Attribute names
  /// are recorded as written; each target must resolve to exactly one
  /// declaration.
  pub(crate) fn elab_attribute(&mut self, n: &SyntaxNode) -> Result<()> {
    let mut rest: &[Syntax] = &n.args;
    let mut local = false;
    if let Some(a) = rest.first().and_then(Syntax::as_atom) {
      if *a.val != *b"local" {
        return Err(self.ill_node(n, "attribute command"))
      }
      local = true;
      rest = &rest[1..];
    }
    let Some((names_stx, targets)) = rest.split_first() else {
      return Err(self.ill_node(n, "attribute command"))
    };
    let Some(names_node) = names_stx.as_kind(BuiltinKind::AttrNames) else {
      return Err(self.ill(names_stx, "attribute command"))
    };
    let Some(attrs) = ident_names(&names_node.args) else {
      return Err(self.ill(names_stx, "attribute command"))
    };
    if attrs.is_empty() || targets.is_empty() {
      return Err(self.ill_node(n, "attribute command"))
    }
    let mut resolved = vec![];
    for t in targets {
      let Some(i) = t.as_ident() else { return Err(self.ill(t, "attribute target")) };
      let cands = self.scopes.resolve(&self.env, &i.name);
      match &*cands {
        // an unknown target is embedded as written for downstream reporting
        [] => resolved.push(root_name(&i.name)),
        [c] => resolved.push(c.clone()),
        _ => {
          return Err(ElabError::new_e(
            self.stx_pos(t),
            format!("identifier '{}' is ambiguous", i.name),
          ))
        }
      }
    }
    self.env.push_command(CoreCommand::Attribute { local, attrs, targets: resolved });
    Ok(())
  }

  fn parse_open_specs(&mut self, n: &SyntaxNode) -> Result<Vec<OpenDecl>> {
    if n.args.is_empty() {
      return Err(self.ill_node(n, "open command"))
    }
    let mut out = vec![];
    for spec in &n.args {
      let Some(sn) = spec.as_kind(BuiltinKind::OpenSpec) else {
        return Err(self.ill(spec, "open specification"))
      };
      let mut args = sn.args.iter();
      let ns = match args.next().and_then(Syntax::as_ident) {
        Some(i) => root_name(&i.name),
        None => return Err(self.ill(spec, "open specification")),
      };
      let mut decl = OpenDecl::plain(ns);
      for clause in args {
        if let Some(c) = clause.as_kind(BuiltinKind::AsClause) {
          if_chain! {
            if let [id] = &*c.args;
            if let Some(id) = id.as_ident();
            if decl.as_prefix.replace(id.name.clone()).is_none();
            then {}
            else { return Err(self.ill(clause, "open specification")) }
          }
        } else if let Some(c) = clause.as_kind(BuiltinKind::OnlyClause) {
          let Some(names) = ident_names(&c.args) else {
            return Err(self.ill(clause, "open specification"))
          };
          if names.is_empty() || decl.only.replace(names).is_some() {
            return Err(self.ill(clause, "open specification"))
          }
        } else if let Some(c) = clause.as_kind(BuiltinKind::HidingClause) {
          let Some(names) = ident_names(&c.args) else {
            return Err(self.ill(clause, "open specification"))
          };
          if names.is_empty() || !decl.hiding.is_empty() {
            return Err(self.ill(clause, "open specification"))
          }
          decl.hiding = names;
        } else {
          return Err(self.ill(clause, "open specification"))
        }
      }
      out.push(decl);
    }
    Ok(out)
  }

  /// `open ns (as x) (only ...) (hiding ...)` extends the current frame's
  /// open list.
  pub(crate) fn elab_open(&mut self, n: &SyntaxNode) -> Result<()> {
    for decl in self.parse_open_specs(n)? {
      self.scopes.record_open(decl);
    }
    Ok(())
  }

  /// `export` records the same specification shape in the environment,
  /// tagged with the namespace it was written in. Exports do not feed
  /// back into this elaborator's own resolution.
  pub(crate) fn elab_export(&mut self, n: &SyntaxNode) -> Result<()> {
    let in_ns = self.scopes.ns().clone();
    for spec in self.parse_open_specs(n)? {
      self.env.push_export(ExportDecl { in_ns: in_ns.clone(), spec });
    }
    Ok(())
  }

  /// `#check t`.
  pub(crate) fn elab_check(&mut self, n: &SyntaxNode) -> Result<()> {
    let [term] = &*n.args else { return Err(self.ill_node(n, "#check command")) };
    self.check_term(term)
  }

  /// A bare term at the top level elaborates as `#check`. Scope variables
  /// are visible to the term as locals.
  pub(crate) fn check_term(&mut self, term: &Syntax) -> Result<()> {
    let term = self.scopes.preresolve(&self.env, term);
    let vars: Vec<Name> =
      self.scopes.vars_in_scope().into_iter().map(|v| v.name.clone()).collect();
    let e = {
      let mut bld = self.builder();
      for v in vars {
        bld.push_local(v)
      }
      bld.to_pexpr(&term)?
    };
    self.env.push_command(CoreCommand::Check(e));
    Ok(())
  }

  /// `set_option name value`. Unknown options and ill-typed values are
  /// reported but do not abort the command stream.
  pub(crate) fn elab_set_option(&mut self, n: &SyntaxNode) -> Result<()> {
    let (name_stx, value) = match &*n.args {
      [name] => (name, None),
      [name, value] => (name, Some(value)),
      _ => return Err(self.ill_node(n, "set_option command")),
    };
    let Some(id) = name_stx.as_ident() else {
      return Err(self.ill(name_stx, "set_option command"))
    };
    let Some(current) = self.options.get(&id.name).cloned() else {
      self.report(ElabError::new_e(
        self.stx_pos(name_stx),
        format!("unknown option '{}'", id.name),
      ));
      return Ok(())
    };
    let new = match (&current, value) {
      // a bare boolean option turns it on
      (OptionValue::Bool(_), None) => Some(OptionValue::Bool(true)),
      (OptionValue::Bool(_), Some(v)) => v.as_atom().and_then(|a| {
        if *a.val == *b"true" {
          Some(OptionValue::Bool(true))
        } else if *a.val == *b"false" {
          Some(OptionValue::Bool(false))
        } else {
          None
        }
      }),
      (OptionValue::Nat(_), Some(v)) => v
        .as_kind(BuiltinKind::Number)
        .and_then(|num| if let [a] = &*num.args { a.as_atom() } else { None })
        .and_then(|a| BigUint::parse_bytes(&a.val, 10))
        .and_then(|b| u64::try_from(&b).ok())
        .map(OptionValue::Nat),
      (OptionValue::Str(_), Some(v)) => v
        .as_kind(BuiltinKind::StrLit)
        .and_then(|sn| if let [a] = &*sn.args { a.as_atom() } else { None })
        .map(|a| OptionValue::Str(a.val.as_str().to_owned())),
      (_, None) => None,
    };
    match new {
      None => self.report(ElabError::new_e(
        self.node_pos(n),
        format!(
          "invalid value for option '{}', expected a {} value",
          id.name,
          current.kind_name()
        ),
      )),
      Some(v) => self.options.set(id.name.clone(), v),
    }
    Ok(())
  }

  /// `init_quot`.
  pub(crate) fn elab_init_quot(&mut self, n: &SyntaxNode) -> Result<()> {
    if !n.args.is_empty() {
      return Err(self.ill_node(n, "init_quot command"))
    }
    self.env.push_command(CoreCommand::InitQuot);
    Ok(())
  }
}
