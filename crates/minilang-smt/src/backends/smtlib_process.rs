//! External solvers driven through an SMT-LIB2 pipe.
//!
//! The session runs with `:print-success`, so every command is answered
//! and a rejected declaration or assertion is reported against the command
//! that caused it. A reply is read line by line until its parentheses
//! balance, so multi-line `get-value` output from either solver is
//! accepted. The solver's stderr is discarded.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;
use tracing::{debug, trace};

use crate::backends::smtlib_printer::{sort_to_smtlib, symbol_to_smtlib, to_smtlib};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Logic announced to the solver; products of variables make it non-linear.
const LOGIC: &str = "QF_NIA";

#[derive(Debug, Error)]
pub enum SmtLibError {
    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("pipe to solver failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program} closed its output while answering `{command}`")]
    Closed { program: String, command: String },
    #[error("{program} rejected `{command}`: {reply}")]
    Rejected {
        program: String,
        command: String,
        reply: String,
    },
    #[error("unexpected reply to `{command}`: {reply}")]
    UnexpectedReply { command: String, reply: String },
}

/// One running solver process in incremental mode.
pub struct SmtLibProcess {
    program: String,
    child: Child,
    input: ChildStdin,
    output: BufReader<ChildStdout>,
}

impl SmtLibProcess {
    /// `z3 -in`, with a per-query soft timeout when `timeout_secs > 0`.
    pub fn z3(timeout_secs: u64) -> Result<Self, SmtLibError> {
        let mut args = vec!["-in".to_string(), "-smt2".to_string()];
        if timeout_secs > 0 {
            args.push(format!("-t:{}", timeout_secs.saturating_mul(1000)));
        }
        Self::spawn("z3", &args)
    }

    /// `cvc5` reading SMT-LIB2 incrementally.
    pub fn cvc5(timeout_secs: u64) -> Result<Self, SmtLibError> {
        let mut args: Vec<String> = ["--lang", "smt2", "--incremental", "--produce-models"]
            .into_iter()
            .map(String::from)
            .collect();
        if timeout_secs > 0 {
            args.push(format!("--tlimit-per={}", timeout_secs.saturating_mul(1000)));
        }
        Self::spawn("cvc5", &args)
    }

    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SmtLibError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SmtLibError::Spawn {
                program: program.to_string(),
                source,
            })?;
        let (Some(input), Some(output)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(SmtLibError::Closed {
                program: program.to_string(),
                command: "start-up".to_string(),
            });
        };

        let mut solver = Self {
            program: program.to_string(),
            child,
            input,
            output: BufReader::new(output),
        };
        solver.configure()?;
        debug!(solver = program, "started SMT-LIB solver process");
        Ok(solver)
    }

    fn configure(&mut self) -> Result<(), SmtLibError> {
        self.command("(set-option :print-success true)")?;
        self.command("(set-option :produce-models true)")?;
        self.command(&format!("(set-logic {LOGIC})"))
    }

    /// Send a command whose only expected answer is `success`.
    fn command(&mut self, command: &str) -> Result<(), SmtLibError> {
        match self.query(command)?.as_str() {
            "success" => Ok(()),
            other => Err(SmtLibError::UnexpectedReply {
                command: command.to_string(),
                reply: other.to_string(),
            }),
        }
    }

    /// Send `command` and read one balanced reply.
    fn query(&mut self, command: &str) -> Result<String, SmtLibError> {
        trace!(solver = %self.program, command, "send");
        writeln!(self.input, "{command}")?;
        self.input.flush()?;

        let mut reply = String::new();
        let mut depth: i64 = 0;
        loop {
            let mut line = String::new();
            if self.output.read_line(&mut line)? == 0 {
                return Err(SmtLibError::Closed {
                    program: self.program.clone(),
                    command: command.to_string(),
                });
            }
            depth += paren_balance(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !reply.is_empty() {
                reply.push(' ');
            }
            reply.push_str(line);
            if depth <= 0 {
                break;
            }
        }
        trace!(solver = %self.program, reply = %reply, "recv");
        if reply.starts_with("(error") {
            return Err(SmtLibError::Rejected {
                program: self.program.clone(),
                command: command.to_string(),
                reply,
            });
        }
        Ok(reply)
    }

}

impl Drop for SmtLibProcess {
    fn drop(&mut self) {
        let _ = writeln!(self.input, "(exit)");
        let _ = self.input.flush();
        let _ = self.child.wait();
    }
}

impl SmtSolver for SmtLibProcess {
    type Error = SmtLibError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), SmtLibError> {
        self.command(&format!(
            "(declare-const {} {})",
            symbol_to_smtlib(name),
            sort_to_smtlib(sort)
        ))
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), SmtLibError> {
        self.command(&format!("(assert {})", to_smtlib(term)))
    }

    fn push(&mut self) -> Result<(), SmtLibError> {
        self.command("(push 1)")
    }

    fn pop(&mut self) -> Result<(), SmtLibError> {
        self.command("(pop 1)")
    }

    fn check_sat(&mut self) -> Result<SatResult, SmtLibError> {
        let reply = self.query("(check-sat)")?;
        match reply.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown(format!("{} returned unknown", self.program))),
            other => Err(SmtLibError::UnexpectedReply {
                command: "(check-sat)".to_string(),
                reply: other.to_string(),
            }),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), SmtLibError> {
        let verdict = self.check_sat()?;
        if verdict != SatResult::Sat {
            return Ok((verdict, None));
        }
        if var_names.is_empty() {
            return Ok((verdict, Some(Model::default())));
        }

        let names: Vec<String> = var_names.iter().map(|(name, _)| symbol_to_smtlib(name)).collect();
        let command = format!("(get-value ({}))", names.join(" "));
        let reply = self.query(&command)?;
        let bindings = parse_bindings(&reply).ok_or_else(|| SmtLibError::UnexpectedReply {
            command: command.clone(),
            reply: reply.clone(),
        })?;

        let mut values = HashMap::new();
        for &(name, sort) in var_names {
            let value = bindings
                .get(name)
                .and_then(|raw| parse_value(raw, sort))
                .ok_or_else(|| SmtLibError::UnexpectedReply {
                    command: command.clone(),
                    reply: reply.clone(),
                })?;
            values.insert(name.to_string(), value);
        }
        Ok((SatResult::Sat, Some(Model { values })))
    }

    /// `reset-assertions` drops scopes and declarations but keeps the
    /// options and logic set at start-up.
    fn reset(&mut self) -> Result<(), SmtLibError> {
        self.command("(reset-assertions)")
    }
}

fn paren_balance(line: &str) -> i64 {
    line.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// Split a `get-value` reply such as `((|x| 42) (y (- 7)))` into
/// `name -> value text`, with symbol bars removed.
fn parse_bindings(reply: &str) -> Option<HashMap<String, String>> {
    let body = reply.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut bindings = HashMap::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in body.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    start = Some(i + 1);
                }
                depth += 1;
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let pair = body[start.take()?..i].trim();
                    let (name, value) = pair.split_once(char::is_whitespace)?;
                    let name = name.strip_prefix('|').and_then(|n| n.strip_suffix('|')).unwrap_or(name);
                    bindings.insert(name.to_string(), value.trim().to_string());
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(bindings)
}

/// Read one SMT-LIB value: `42`, `(- 7)`, `true`.
fn parse_value(raw: &str, sort: &SmtSort) -> Option<ModelValue> {
    match sort {
        SmtSort::Bool => match raw {
            "true" => Some(ModelValue::Bool(true)),
            "false" => Some(ModelValue::Bool(false)),
            _ => None,
        },
        SmtSort::Int => {
            let (negative, digits) = match raw.strip_prefix("(-") {
                Some(rest) => (true, rest.strip_suffix(')')?.trim()),
                None => (false, raw),
            };
            let magnitude: i128 = digits.parse().ok()?;
            i64::try_from(if negative { -magnitude } else { magnitude })
                .ok()
                .map(ModelValue::Int)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_from_multi_variable_reply() {
        let bindings = parse_bindings("((x_1 42) (y_2 (- 7)) (p true))").unwrap();
        assert_eq!(bindings["x_1"], "42");
        assert_eq!(bindings["y_2"], "(- 7)");
        assert_eq!(bindings["p"], "true");
    }

    #[test]
    fn quoted_symbols_lose_their_bars() {
        let bindings = parse_bindings("((|true| 3)\n (|div| (- 1)))").unwrap();
        assert_eq!(bindings["true"], "3");
        assert_eq!(bindings["div"], "(- 1)");
    }

    #[test]
    fn values_by_sort() {
        assert_eq!(parse_value("42", &SmtSort::Int), Some(ModelValue::Int(42)));
        assert_eq!(parse_value("(- 7)", &SmtSort::Int), Some(ModelValue::Int(-7)));
        assert_eq!(
            parse_value("(- 9223372036854775808)", &SmtSort::Int),
            Some(ModelValue::Int(i64::MIN))
        );
        assert_eq!(parse_value("false", &SmtSort::Bool), Some(ModelValue::Bool(false)));
    }

    #[test]
    fn malformed_replies_are_rejected() {
        assert!(parse_bindings("(error \"x\")").unwrap().is_empty());
        assert!(parse_bindings("((x 1)").is_none());
        assert_eq!(parse_value("99999999999999999999", &SmtSort::Int), None);
        assert_eq!(parse_value("maybe", &SmtSort::Bool), None);
    }

    #[test]
    fn balance_counts_open_parens() {
        assert_eq!(paren_balance("((x 1)"), 1);
        assert_eq!(paren_balance(" (y 2))"), -1);
        assert_eq!(paren_balance("sat"), 0);
    }

    /// A shell stand-in that acknowledges everything except commands
    /// mentioning `bogus`.
    #[cfg(unix)]
    fn scripted_solver() -> SmtLibProcess {
        let script = r#"while read -r line; do
            case "$line" in
                *exit*) exit 0 ;;
                *bogus*) echo '(error "unknown constant bogus")' ;;
                *) echo success ;;
            esac
        done"#;
        SmtLibProcess::spawn("sh", &["-c".to_string(), script.to_string()]).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn rejected_assertion_is_reported_against_the_assert() {
        let mut solver = scripted_solver();
        solver.declare_var("x", &SmtSort::Int).unwrap();
        let err = solver
            .assert(&SmtTerm::var("bogus").gt(SmtTerm::int(0)))
            .unwrap_err();
        let SmtLibError::Rejected { command, reply, .. } = err else {
            panic!("expected a rejection, got {err:?}");
        };
        assert_eq!(command, "(assert (> |bogus| 0))");
        assert!(reply.starts_with("(error"));
        solver.push().unwrap();
        solver.reset().unwrap();
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let err = SmtLibProcess::spawn("minilang-no-such-solver", &[])
            .err()
            .expect("spawning a missing binary fails");
        assert!(matches!(err, SmtLibError::Spawn { .. }));
    }
}
