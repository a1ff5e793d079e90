//! The resolution engine's main loop.
//!
//! An explicit worklist plus an explicit alternative stack instead of a
//! recursive `solve`, flattened to one concrete loop with one kind of goal
//! and one kind of answer rather than a generic proof-search abstraction —
//! the extra indirection a multi-backend solver would want buys nothing
//! here.
//!
//! `Ctx` bundles the mutable state every dispatch needs (database,
//! environment, variable counter, config, output sink) behind one
//! `reborrow()`-able handle: builtins and meta-predicates that need to run
//! a *nested* resolution (negation, `findall`, `forall`, `maplist`,
//! if-then-else's condition) reborrow the same handles into a fresh
//! [`Solve`] rather than owning a second copy of the world.

use crate::builtins;
use crate::choicepoint::{Alternative, Choicepoint};
use crate::config::EngineConfig;
use crate::goal::{Goal, QueuedGoal};
use crate::meta;
use prolog_ir::database::{ClauseRef, Database};
use prolog_ir::env::{Answer, Environment, VarCounter};
use prolog_ir::error::PrologError;
use prolog_ir::symbol::{well_known, Symbol};
use prolog_ir::term::Term;
use prolog_solve::unify_rollback;
use std::collections::VecDeque;
use std::io::Write;

/// A source of externally-supplied terms for `read/1`: it blocks on a line
/// source until a period-terminated term is available. The engine never
/// parses text itself — that's `prolog-syntax`'s job, kept out of this
/// crate — so a host wires this trait to its own parser. `Ok(None)` signals
/// end of input, the same as `read/1`'s `end_of_file` atom.
pub trait TermSource {
    fn next_term(&mut self) -> Result<Option<Term>, PrologError>;
}

/// The default source: always at end of file. Used when a host runs the
/// engine without wiring up a real line reader (e.g. most tests).
pub struct NoTermSource;

impl TermSource for NoTermSource {
    fn next_term(&mut self) -> Result<Option<Term>, PrologError> {
        Ok(None)
    }
}

/// What a built-in predicate reports back to the main loop.
pub enum BuiltinOutcome {
    /// Succeeded deterministically; no choicepoint needed.
    Success,
    Failure,
    /// Succeeded with more than one way to satisfy the goal:
    /// commits to the first set of equations now, leaves the rest as a
    /// choicepoint.
    Choice(Vec<Vec<(Term, Term)>>),
    /// Couldn't yet decide because an argument is unbound; retried
    /// from the back of the goal queue until `defer_budget` is exhausted.
    Defer,
}

/// The mutable state every dispatch step needs, bundled so it can be
/// reborrowed into a nested [`Solve`] without duplicating ownership.
pub struct Ctx<'a> {
    pub db: &'a mut Database,
    pub env: &'a mut Environment,
    pub counter: &'a mut VarCounter,
    pub config: &'a EngineConfig,
    pub sink: &'a mut dyn Write,
    pub source: &'a mut dyn TermSource,
}

impl<'a> Ctx<'a> {
    pub fn reborrow(&mut self) -> Ctx<'_> {
        Ctx {
            db: self.db,
            env: self.env,
            counter: self.counter,
            config: self.config,
            sink: self.sink,
            source: self.source,
        }
    }
}

/// Owns the persistent state of one running program: the clause database,
/// the shared binding environment, and the variable-id source. A top-level
/// query borrows all three into a [`Solve`] for the duration of its
/// iteration.
pub struct Engine {
    pub database: Database,
    pub env: Environment,
    pub counter: VarCounter,
    pub config: EngineConfig,
    pub sink: Box<dyn Write>,
    pub source: Box<dyn TermSource>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            database: Database::new(),
            env: Environment::with_max_walk_depth(config.max_walk_depth),
            counter: VarCounter::new(),
            config,
            sink: Box::new(std::io::stdout()),
            source: Box::new(NoTermSource),
        }
    }

    pub fn with_sink(config: EngineConfig, sink: Box<dyn Write>) -> Self {
        Engine {
            database: Database::new(),
            env: Environment::with_max_walk_depth(config.max_walk_depth),
            counter: VarCounter::new(),
            config,
            sink,
            source: Box::new(NoTermSource),
        }
    }

    /// Wires a `read/1` term source into the engine — the engine is
    /// agnostic to how these are produced. The host supplies this,
    /// typically backed by `prolog-syntax`'s reader over its line editor's
    /// input.
    pub fn with_source(mut self, source: Box<dyn TermSource>) -> Self {
        self.source = source;
        self
    }

    /// The engine's own variable-id source. A host reading source text with
    /// `prolog-syntax` must mint every variable it parses from this same
    /// counter — consult-time clause variables and solve-time query
    /// variables share one id space with whatever the engine renames
    /// clauses into internally, so two different `X`s never collide on the
    /// same raw id by coincidence.
    pub fn counter_mut(&mut self) -> &mut VarCounter {
        &mut self.counter
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    fn ctx(&mut self) -> Ctx<'_> {
        Ctx {
            db: &mut self.database,
            env: &mut self.env,
            counter: &mut self.counter,
            config: &self.config,
            sink: &mut *self.sink,
            source: &mut *self.source,
        }
    }

    /// Starts resolving `goal` against a snapshot of its free variables
    /// (`query_vars`, as `(surface_name, id)` pairs) so returned [`Answer`]s
    /// use the names the query was written with.
    pub fn solve<'a>(&'a mut self, goal: Term, query_vars: Vec<(String, prolog_ir::term::VarId)>) -> Solve<'a> {
        let mut ids = Vec::new();
        collect_vars(&goal, &mut ids);
        for id in ids {
            self.env.register(id);
        }
        let depth = 0;
        let mut goals = VecDeque::new();
        goals.push_back(QueuedGoal::new(goal, depth, self.config.deferred_retry_limit));
        Solve {
            ctx: self.ctx(),
            goals,
            choicepoints: Vec::new(),
            query_vars,
            just_succeeded: false,
            done: false,
        }
    }
}

/// One running resolution: the goal queue, the choicepoint stack, and a
/// reborrowed [`Ctx`]. Implements [`Iterator`] over successive [`Answer`]s:
/// a query yields zero or more answers, produced on demand.
pub struct Solve<'a> {
    ctx: Ctx<'a>,
    goals: VecDeque<QueuedGoal>,
    choicepoints: Vec<Choicepoint>,
    query_vars: Vec<(String, prolog_ir::term::VarId)>,
    just_succeeded: bool,
    done: bool,
}

impl<'a> Solve<'a> {
    /// A nested resolution sharing this one's environment/database, used by
    /// negation, if-then-else's condition, and the meta-predicates. `depth`
    /// is the new cut barrier: a `!` inside `goal` must not escape past it.
    pub fn nested(ctx: Ctx<'_>, goal: Term, depth: usize, defer_budget: u8) -> Solve<'_> {
        let mut goals = VecDeque::new();
        goals.push_back(QueuedGoal::new(goal, depth, defer_budget));
        Solve {
            ctx,
            goals,
            choicepoints: Vec::new(),
            query_vars: Vec::new(),
            just_succeeded: false,
            done: false,
        }
    }

    pub fn ctx(&mut self) -> Ctx<'_> {
        self.ctx.reborrow()
    }

    /// The choicepoint-stack depth right now — the cut barrier a freshly
    /// entered nested resolution (a meta-predicate's sub-goal) should use so
    /// a `!` inside it can't escape into the caller's alternatives.
    pub fn barrier_depth(&self) -> usize {
        self.choicepoints.len()
    }

    pub fn defer_budget(&self) -> u8 {
        self.ctx.config.deferred_retry_limit
    }

    fn step(&mut self, qgoal: QueuedGoal) -> Result<StepResult, PrologError> {
        match qgoal.goal {
            Goal::CommitChoicepoints(depth) => {
                self.choicepoints.truncate(depth);
                Ok(StepResult::Progress)
            }
            Goal::User(term) => self.dispatch(qgoal.depth, qgoal.defer_budget, term),
        }
    }

    fn dispatch(&mut self, depth: usize, defer_budget: u8, term: Term) -> Result<StepResult, PrologError> {
        let resolved = self.ctx.env.lookup(&term)?;
        let (name, arity) = match &resolved {
            Term::Var(_) => return Err(PrologError::instantiation("a goal")),
            Term::Atom(_) if resolved.as_number().is_some() => {
                return Err(PrologError::type_error("callable", format!("{resolved:?}")))
            }
            _ => resolved.principal_functor().expect("atom or compound"),
        };
        let args = resolved.args();

        if name == well_known::comma() && arity == 2 {
            self.goals.push_front(QueuedGoal::new(args[1].clone(), depth, defer_budget));
            self.goals.push_front(QueuedGoal::new(args[0].clone(), depth, defer_budget));
            return Ok(StepResult::Progress);
        }
        if name == well_known::semicolon() && arity == 2 {
            return Ok(self.dispatch_disjunction(depth, defer_budget, &args[0], &args[1]));
        }
        if name == well_known::arrow() && arity == 2 {
            // A bare if-then (no else) fails like `(Cond -> Then ; fail)`.
            self.dispatch_if_then_else(depth, defer_budget, &args[0], &args[1], Term::atom(well_known::fail()));
            return Ok(StepResult::Progress);
        }
        if name == well_known::cut() && arity == 0 {
            self.choicepoints.truncate(depth);
            return Ok(StepResult::Progress);
        }
        if name == well_known::r#true() && arity == 0 {
            return Ok(StepResult::Progress);
        }
        if name == well_known::fail() && arity == 0 || name == Symbol::intern("false") && arity == 0 {
            return Ok(StepResult::Failed);
        }
        if (name == well_known::not() || name == well_known::not_alt()) && arity == 1 {
            return self.dispatch_negation(&args[0]);
        }

        if let Some(outcome) = builtins::dispatch(self.ctx.reborrow(), name, args)? {
            return Ok(self.apply_builtin_outcome(depth, outcome));
        }

        if let Some(success) = meta::dispatch(self, depth, name, args)? {
            return Ok(if success { StepResult::Progress } else { StepResult::Failed });
        }

        self.call_user_predicate(depth, resolved.clone(), name, arity)
    }

    fn dispatch_disjunction(&mut self, depth: usize, defer_budget: u8, lhs: &Term, rhs: &Term) -> StepResult {
        if let Some((_, then_args)) = as_functor(lhs, well_known::arrow(), 2) {
            let (cond, then) = (then_args[0].clone(), then_args[1].clone());
            self.dispatch_if_then_else(depth, defer_budget, &cond, &then, rhs.clone());
            return StepResult::Progress;
        }
        let cp = Choicepoint {
            mark: self.ctx.env.mark(),
            depth,
            rest_goals: self.goals.clone(),
            alt: Alternative::Disjunction { goal: rhs.clone() },
        };
        self.choicepoints.push(cp);
        self.goals.push_front(QueuedGoal::new(lhs.clone(), depth, defer_budget));
        StepResult::Progress
    }

    fn dispatch_if_then_else(&mut self, depth: usize, defer_budget: u8, cond: &Term, then: &Term, els: Term) {
        let commit_at = self.choicepoints.len();
        let cp = Choicepoint {
            mark: self.ctx.env.mark(),
            depth,
            rest_goals: self.goals.clone(),
            alt: Alternative::Disjunction { goal: els },
        };
        self.choicepoints.push(cp);
        self.goals.push_front(QueuedGoal::new(then.clone(), depth, defer_budget));
        self.goals.push_front(QueuedGoal::commit(commit_at));
        // Cond gets its own cut barrier: a `!` inside it must not reach past
        // the choicepoints it itself may create, but also must not be able
        // to remove the `Else` choicepoint above before commit runs.
        self.goals
            .push_front(QueuedGoal::new(cond.clone(), commit_at + 1, defer_budget));
    }

    fn dispatch_negation(&mut self, goal: &Term) -> Result<StepResult, PrologError> {
        let mark = self.ctx.env.mark();
        let depth = self.choicepoints.len();
        let defer_budget = self.ctx.config.deferred_retry_limit;
        let found = {
            let mut sub = Solve::nested(self.ctx.reborrow(), goal.clone(), depth, defer_budget);
            sub.next()
        };
        self.ctx.env.undo_to(mark);
        match found {
            Some(Ok(_)) => Ok(StepResult::Failed),
            Some(Err(e)) => Err(e),
            None => Ok(StepResult::Progress),
        }
    }

    fn apply_builtin_outcome(&mut self, depth: usize, outcome: BuiltinOutcome) -> StepResult {
        match outcome {
            BuiltinOutcome::Success => StepResult::Progress,
            BuiltinOutcome::Failure => StepResult::Failed,
            BuiltinOutcome::Defer => StepResult::Defer,
            BuiltinOutcome::Choice(mut alternatives) => {
                if alternatives.is_empty() {
                    return StepResult::Failed;
                }
                let first = alternatives.remove(0);
                if !alternatives.is_empty() {
                    let cp = Choicepoint {
                        mark: self.ctx.env.mark(),
                        depth,
                        rest_goals: self.goals.clone(),
                        alt: Alternative::Equations { remaining: alternatives },
                    };
                    self.choicepoints.push(cp);
                }
                match apply_equations(&mut self.ctx, &first) {
                    Ok(true) => StepResult::Progress,
                    Ok(false) => StepResult::Failed,
                    // Equations built from already-resolved terms never
                    // raise; see `builtins` for why this can't happen.
                    Err(_) => StepResult::Failed,
                }
            }
        }
    }

    fn call_user_predicate(&mut self, depth: usize, goal: Term, name: Symbol, arity: usize) -> Result<StepResult, PrologError> {
        if !self.ctx.db.is_defined(name, arity) {
            return Err(PrologError::unknown_predicate(name.to_string(), arity));
        }
        let candidates = self.ctx.db.candidates(name, arity).to_vec();
        self.try_clauses(depth, goal, candidates)
    }

    /// Tries `candidates` in order against `goal`, stopping at the first
    /// clause whose head unifies. On success, pushes a choicepoint for any
    /// clauses left untried and queues the matched clause's body.
    fn try_clauses(&mut self, depth: usize, goal: Term, mut candidates: Vec<ClauseRef>) -> Result<StepResult, PrologError> {
        while !candidates.is_empty() {
            let clause = candidates.remove(0);
            let mark = self.ctx.env.mark();
            let (renamed, _) = clause.rename(self.ctx.counter);
            for v in renamed_vars(&renamed) {
                self.ctx.env.register(v);
            }
            if unify_rollback(self.ctx.env, &goal, &renamed.head)? {
                let body_depth = self.choicepoints.len();
                if !candidates.is_empty() {
                    let cp = Choicepoint {
                        mark,
                        depth,
                        rest_goals: self.goals.clone(),
                        alt: Alternative::Clauses { goal, remaining: candidates },
                    };
                    self.choicepoints.push(cp);
                }
                for g in renamed.body.into_iter().rev() {
                    self.goals
                        .push_front(QueuedGoal::new(g, body_depth, self.ctx.config.deferred_retry_limit));
                }
                return Ok(StepResult::Progress);
            }
        }
        Ok(StepResult::Failed)
    }

    /// Pops the top choicepoint and retries its alternative; pops further
    /// choicepoints if that alternative is itself exhausted. Returns `false`
    /// once no choicepoint remains (the query is finished).
    fn backtrack(&mut self) -> Result<bool, PrologError> {
        while let Some(cp) = self.choicepoints.pop() {
            self.ctx.env.undo_to(cp.mark);
            match cp.alt {
                Alternative::Clauses { goal, remaining } => {
                    self.goals = cp.rest_goals;
                    if matches!(self.try_clauses(cp.depth, goal, remaining)?, StepResult::Progress) {
                        return Ok(true);
                    }
                }
                Alternative::Disjunction { goal } => {
                    self.goals = cp.rest_goals;
                    self.goals
                        .push_front(QueuedGoal::new(goal, cp.depth, self.ctx.config.deferred_retry_limit));
                    return Ok(true);
                }
                Alternative::Equations { mut remaining } => {
                    while let Some(eqs) = remaining.pop() {
                        let mark = self.ctx.env.mark();
                        match apply_equations(&mut self.ctx, &eqs) {
                            Ok(true) => {
                                self.goals = cp.rest_goals.clone();
                                if !remaining.is_empty() {
                                    self.choicepoints.push(Choicepoint {
                                        mark,
                                        depth: cp.depth,
                                        rest_goals: cp.rest_goals.clone(),
                                        alt: Alternative::Equations { remaining },
                                    });
                                }
                                return Ok(true);
                            }
                            Ok(false) => {
                                self.ctx.env.undo_to(mark);
                                continue;
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }
        Ok(false)
    }

    fn requeue_deferred(&mut self, mut qgoal: QueuedGoal) -> Result<(), PrologError> {
        if qgoal.defer_budget == 0 {
            return Err(PrologError::instantiation("a deferred arithmetic comparison"));
        }
        qgoal.defer_budget -= 1;
        self.goals.push_back(qgoal);
        Ok(())
    }
}

/// What dispatching one queued goal accomplished, before the main loop
/// decides whether to keep going, backtrack, or requeue.
enum StepResult {
    Progress,
    Failed,
    Defer,
}

impl<'a> Iterator for Solve<'a> {
    type Item = Result<Answer, PrologError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.just_succeeded {
            self.just_succeeded = false;
            match self.backtrack() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        loop {
            match self.goals.pop_front() {
                None => {
                    self.just_succeeded = true;
                    return Some(self.ctx.env.project(&self.query_vars));
                }
                Some(qgoal) => {
                    let requeue = qgoal.clone();
                    match self.step(qgoal) {
                        Ok(StepResult::Progress) => continue,
                        Ok(StepResult::Defer) => {
                            if let Err(e) = self.requeue_deferred(requeue) {
                                self.done = true;
                                return Some(Err(e));
                            }
                            continue;
                        }
                        Ok(StepResult::Failed) => match self.backtrack() {
                            Ok(true) => continue,
                            Ok(false) => {
                                self.done = true;
                                return None;
                            }
                            Err(e) => {
                                self.done = true;
                                return Some(Err(e));
                            }
                        },
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
            }
        }
    }
}

fn apply_equations(ctx: &mut Ctx<'_>, eqs: &[(Term, Term)]) -> Result<bool, PrologError> {
    for (a, b) in eqs {
        if !unify_rollback(ctx.env, a, b)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn as_functor<'t>(term: &'t Term, name: Symbol, arity: usize) -> Option<(Symbol, &'t [Term])> {
    match term {
        Term::Compound(n, args) if *n == name && args.len() == arity => Some((*n, args)),
        _ => None,
    }
}

fn renamed_vars(clause: &prolog_ir::database::Clause) -> Vec<prolog_ir::term::VarId> {
    let mut ids = Vec::new();
    collect_vars(&clause.head, &mut ids);
    for g in &clause.body {
        collect_vars(g, &mut ids);
    }
    ids
}

fn collect_vars(term: &Term, out: &mut Vec<prolog_ir::term::VarId>) {
    match term {
        Term::Var(id) => out.push(*id),
        Term::Atom(_) => {}
        Term::Compound(_, args) => {
            for a in args.iter() {
                collect_vars(a, out);
            }
        }
    }
}
