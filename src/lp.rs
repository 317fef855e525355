use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use microlp::{ComparisonOp, OptimizationDirection, Problem};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
}

/// Variable domain. All variables are non-negative in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Continuous,
    Integer,
}

/// A dense row `coeffs · x (<= | >=) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub coeffs: Vec<f64>,
    pub relation: Relation,
    pub rhs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    pub sense: Sense,
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
    pub domain: Domain,
    /// Optional per-variable upper bounds; `None` means unbounded above.
    pub upper_bounds: Vec<Option<f64>>,
}

impl LinearProgram {
    pub fn new(sense: Sense, objective: Vec<f64>, domain: Domain) -> Self {
        let n = objective.len();
        Self {
            sense,
            objective,
            constraints: Vec::new(),
            domain,
            upper_bounds: vec![None; n],
        }
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    pub fn with_constraint(mut self, coeffs: Vec<f64>, relation: Relation, rhs: f64) -> Self {
        debug_assert_eq!(coeffs.len(), self.objective.len());
        self.constraints.push(Constraint {
            coeffs,
            relation,
            rhs,
        });
        self
    }

    pub fn with_upper_bounds(mut self, upper_bounds: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(upper_bounds.len(), self.objective.len());
        self.upper_bounds = upper_bounds;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub values: Vec<f64>,
    pub objective: f64,
    /// Shadow price of each constraint (change of the optimal objective per
    /// unit increase of its rhs). Only produced for continuous programs.
    pub duals: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("problem is infeasible")]
    Infeasible,
    #[error("problem is unbounded")]
    Unbounded,
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("time limit reached")]
    TimedOut,
}

/// Solver boundary for the master and pricing programs.
pub trait LpSolver {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, SolveError>;

    /// Like [`LpSolver::solve`], but gives up with [`SolveError::TimedOut`]
    /// once `deadline` passes. Backends that cannot be preempted only check
    /// the deadline before starting.
    fn solve_until(&self, lp: &LinearProgram, deadline: Instant) -> Result<LpSolution, SolveError> {
        if Instant::now() >= deadline {
            return Err(SolveError::TimedOut);
        }
        self.solve(lp)
    }
}

impl<S: LpSolver + ?Sized> LpSolver for &S {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, SolveError> {
        (**self).solve(lp)
    }

    fn solve_until(&self, lp: &LinearProgram, deadline: Instant) -> Result<LpSolution, SolveError> {
        (**self).solve_until(lp, deadline)
    }
}

/// Adapter over `microlp`. Dual values are obtained by solving the dual program
/// of the `>=`-normalized minimization form.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLp;

impl LpSolver for MicroLp {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, SolveError> {
        let (values, objective) = solve_primal(lp)?;
        let duals = match lp.domain {
            Domain::Continuous => Some(solve_duals(lp)?),
            Domain::Integer => None,
        };
        Ok(LpSolution {
            values,
            objective,
            duals,
        })
    }

    /// Integer programs run on a worker thread so the caller can stop waiting
    /// at the deadline. microlp cannot be interrupted: a search that misses
    /// the deadline runs to completion in the background and is discarded.
    fn solve_until(&self, lp: &LinearProgram, deadline: Instant) -> Result<LpSolution, SolveError> {
        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            return Err(SolveError::TimedOut);
        }
        if lp.domain == Domain::Continuous {
            return self.solve(lp);
        }

        let (tx, rx) = mpsc::channel();
        let program = lp.clone();
        let solver = *self;
        thread::spawn(move || {
            let _ = tx.send(solver.solve(&program));
        });
        match rx.recv_timeout(budget) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SolveError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => {
                Err(SolveError::Numerical("integer search aborted".to_string()))
            }
        }
    }
}

fn solve_primal(lp: &LinearProgram) -> Result<(Vec<f64>, f64), SolveError> {
    let direction = match lp.sense {
        Sense::Minimize => OptimizationDirection::Minimize,
        Sense::Maximize => OptimizationDirection::Maximize,
    };
    let mut problem = Problem::new(direction);
    let vars: Vec<_> = lp
        .objective
        .iter()
        .zip(&lp.upper_bounds)
        .map(|(&c, &ub)| match lp.domain {
            Domain::Continuous => problem.add_var(c, (0.0, ub.unwrap_or(f64::INFINITY))),
            Domain::Integer => {
                let ub = ub.map_or(i32::MAX, |u| u.floor().min(i32::MAX as f64) as i32);
                problem.add_integer_var(c, (0, ub))
            }
        })
        .collect();

    for row in &lp.constraints {
        let terms: Vec<_> = vars
            .iter()
            .zip(&row.coeffs)
            .filter(|(_, c)| **c != 0.0)
            .map(|(&v, &c)| (v, c))
            .collect();
        if terms.is_empty() {
            let holds = match row.relation {
                Relation::Le => 0.0 <= row.rhs,
                Relation::Ge => 0.0 >= row.rhs,
            };
            if !holds {
                return Err(SolveError::Infeasible);
            }
            continue;
        }
        let op = match row.relation {
            Relation::Le => ComparisonOp::Le,
            Relation::Ge => ComparisonOp::Ge,
        };
        problem.add_constraint(terms, op, row.rhs);
    }

    let solution = problem.solve().map_err(map_error)?;
    let values = vars
        .iter()
        .map(|&v| {
            let x = *solution.var_value(v);
            match lp.domain {
                Domain::Continuous => x,
                Domain::Integer => x.round(),
            }
        })
        .collect();
    Ok((values, solution.objective()))
}

/// Dual of `min c'x s.t. Gx >= h, 0 <= x <= u`: upper bounds become extra
/// `-x_j >= -u_j` rows, then `max h'y s.t. G'y <= c', y >= 0`.
fn solve_duals(lp: &LinearProgram) -> Result<Vec<f64>, SolveError> {
    let flip = match lp.sense {
        Sense::Minimize => 1.0,
        Sense::Maximize => -1.0,
    };
    let n = lp.num_vars();

    let mut rows: Vec<(Vec<f64>, f64, f64)> = lp
        .constraints
        .iter()
        .map(|row| {
            let sign = match row.relation {
                Relation::Ge => 1.0,
                Relation::Le => -1.0,
            };
            (row.coeffs.iter().map(|a| sign * a).collect(), sign * row.rhs, sign)
        })
        .collect();
    for (j, ub) in lp.upper_bounds.iter().enumerate() {
        if let Some(u) = ub {
            let mut coeffs = vec![0.0; n];
            coeffs[j] = -1.0;
            rows.push((coeffs, -u, -1.0));
        }
    }

    let mut dual = Problem::new(OptimizationDirection::Maximize);
    let ys: Vec<_> = rows
        .iter()
        .map(|(_, rhs, _)| dual.add_var(*rhs, (0.0, f64::INFINITY)))
        .collect();
    for j in 0..n {
        let terms: Vec<_> = ys
            .iter()
            .zip(&rows)
            .filter(|(_, (coeffs, _, _))| coeffs[j] != 0.0)
            .map(|(&y, (coeffs, _, _))| (y, coeffs[j]))
            .collect();
        if terms.is_empty() {
            continue;
        }
        dual.add_constraint(terms, ComparisonOp::Le, flip * lp.objective[j]);
    }

    let solution = dual.solve().map_err(|e| match e {
        // The primal was solved to optimality, so an unusable dual is numerical.
        microlp::Error::InternalError(msg) => SolveError::Numerical(msg),
        other => SolveError::Numerical(format!("dual program: {other}")),
    })?;

    Ok(ys
        .iter()
        .zip(&rows)
        .take(lp.constraints.len())
        .map(|(&y, (_, _, sign))| flip * sign * *solution.var_value(y))
        .collect())
}

fn map_error(err: microlp::Error) -> SolveError {
    match err {
        microlp::Error::Infeasible => SolveError::Infeasible,
        microlp::Error::Unbounded => SolveError::Unbounded,
        microlp::Error::InternalError(msg) => SolveError::Numerical(msg),
    }
}
