//! A REPL and batch-goal CLI over the resolution core: load a program,
//! drop into a `?-` prompt (or run `--goal`s non-interactively), print
//! answers one at a time and let the user ask for more with `;`.

use std::fs;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use prolog_engine::{Engine, EngineConfig, TermSource};
use prolog_ir::database::Clause;
use prolog_ir::error::PrologError;
use prolog_ir::term::Term;
use prolog_syntax::{read_program, read_term, Item};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use thiserror::Error;

#[derive(ClapParser, Debug)]
#[command(name = "prolog-repl", about = "Interactive host for the Prolog resolution core")]
struct Args {
    /// Consults a program file before entering the REPL (or running --goal).
    #[arg(long)]
    program: Option<String>,

    /// Evaluates a goal non-interactively and exits. May be given more than once.
    #[arg(long)]
    goal: Vec<String>,

    /// Enables trace-level logging of unification and engine dispatch.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Error)]
enum ReplError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] prolog_syntax::ParseError),
    #[error(transparent)]
    Prolog(#[from] PrologError),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

/// Backs `read/1` with real console input: each call blocks on a line of
/// stdin and parses it as one term. Its own `VarCounter` is local and
/// disposable — the variables it mints never reach the environment
/// directly, `read/1`'s implementation renumbers through the engine's
/// counter before unifying.
struct StdinTermSource;

impl TermSource for StdinTermSource {
    fn next_term(&mut self) -> Result<Option<Term>, PrologError> {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            return Ok(None);
        }
        let mut counter = prolog_ir::env::VarCounter::new();
        match read_term(&line, &mut counter) {
            Ok(Some((term, _))) => Ok(Some(term)),
            Ok(None) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.trace {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("trace"))
            .init();
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), ReplError> {
    let mut engine = Engine::new(EngineConfig::default()).with_source(Box::new(StdinTermSource));

    if let Some(path) = &args.program {
        consult(&mut engine, path)?;
    }

    if args.goal.is_empty() {
        repl(&mut engine)
    } else {
        for goal in &args.goal {
            run_goal_once(&mut engine, goal)?;
        }
        Ok(())
    }
}

/// Loads every clause/directive in `path` into the engine, running ordinary
/// directives (`:- Goal.`) immediately as they're encountered but deferring
/// `:- initialization(Goal).` ones until the file has finished loading.
fn consult(engine: &mut Engine, path: &str) -> Result<(), ReplError> {
    let text = fs::read_to_string(path)?;
    let items = read_program(&text, engine.counter_mut())?;
    let mut deferred = Vec::new();
    for item in items {
        match item {
            Item::Fact(head) => engine.database_mut().assertz(Clause::fact(head)),
            Item::Rule(head, body) => engine.database_mut().assertz(Clause::rule(head, vec![body])),
            Item::Directive(goal) => match initialization_goal(&goal) {
                Some(inner) => deferred.push(inner),
                None => run_directive(engine, goal)?,
            },
        }
    }
    for goal in deferred {
        run_directive(engine, goal)?;
    }
    Ok(())
}

/// Unwraps `initialization(Goal)` to `Goal`, leaving every other directive
/// shape alone.
fn initialization_goal(goal: &Term) -> Option<Term> {
    match goal.principal_functor() {
        Some((name, 1)) if name.as_str() == "initialization" => Some(goal.args()[0].clone()),
        _ => None,
    }
}

fn run_directive(engine: &mut Engine, goal: Term) -> Result<(), ReplError> {
    let mut solve = engine.solve(goal, Vec::new());
    match solve.next() {
        Some(Err(e)) => Err(e.into()),
        Some(Ok(_)) | None => Ok(()),
    }
}

/// `--goal` batch mode: print only the first answer (one solve per flag
/// occurrence, no interactive retry).
fn run_goal_once(engine: &mut Engine, text: &str) -> Result<(), ReplError> {
    let (goal, vars) = match read_term(text, engine.counter_mut())? {
        Some(parsed) => parsed,
        None => return Ok(()),
    };
    let mut solve = engine.solve(goal, vars);
    match solve.next() {
        None => println!("No possible solution."),
        Some(Err(e)) => return Err(e.into()),
        Some(Ok(answer)) => println!("{answer}."),
    }
    Ok(())
}

fn repl(engine: &mut Engine) -> Result<(), ReplError> {
    help();
    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("?- ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed).ok();
                if let Err(e) = process(engine, &mut rl, trimmed) {
                    eprintln!("error: {e}");
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn process(engine: &mut Engine, rl: &mut DefaultEditor, command: &str) -> Result<(), ReplError> {
    if command == "help" || command == "h" {
        help();
    } else if let Some(rest) = command.strip_prefix("load ") {
        consult(engine, rest.trim())?;
        println!("loaded {}", rest.trim());
    } else if command == "listing" {
        listing(engine);
    } else {
        let goal_text = if command.ends_with('.') {
            command.to_string()
        } else {
            format!("{command}.")
        };
        let (goal, vars) = match read_term(&goal_text, engine.counter_mut())? {
            Some(parsed) => parsed,
            None => return Ok(()),
        };
        run_goal_interactively(engine, rl, goal, vars)?;
    }
    Ok(())
}

/// Prints answers one at a time, prompting after each for `;` (more) or
/// anything else (stop) — the classic top-level query loop.
fn run_goal_interactively(
    engine: &mut Engine,
    rl: &mut DefaultEditor,
    goal: Term,
    vars: Vec<(String, prolog_ir::term::VarId)>,
) -> Result<(), ReplError> {
    let mut solve = engine.solve(goal, vars);
    let mut any = false;
    loop {
        match solve.next() {
            None => {
                println!("{}", if any { "No more solutions." } else { "false." });
                break;
            }
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(answer)) => {
                any = true;
                print!("{answer}");
                match rl.readline(" ") {
                    Ok(reply) if reply.trim_start().starts_with(';') => {
                        println!(";");
                        continue;
                    }
                    _ => {
                        println!(".");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

fn listing(engine: &mut Engine) {
    for clause in engine.database_mut().clauses() {
        if clause.body.is_empty() {
            println!("{:?}.", clause.head);
        } else {
            let body = clause
                .body
                .iter()
                .map(|g| format!("{g:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("{:?} :- {body}.", clause.head);
        }
    }
}

fn help() {
    println!("Commands:");
    println!("  help          print this output");
    println!("  load <file>   consult a program file");
    println!("  listing       print every loaded clause");
    println!("  <goal>.       solve <goal>; reply ; for the next answer");
}
