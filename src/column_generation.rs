use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::demand::DemandTable;
use crate::error::{Error, Result, Stage};
use crate::lp::{Domain, LinearProgram, LpSolution, LpSolver, Relation, Sense, SolveError};
use crate::pricing;
use crate::types::Rect;

/// How many pieces of each item type one sheet yields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern(Vec<u32>);

impl Pattern {
    pub fn new(counts: Vec<u32>) -> Self {
        Self(counts)
    }

    pub fn unit(len: usize, item: usize) -> Self {
        let mut counts = vec![0; len];
        counts[item] = 1;
        Self(counts)
    }

    pub fn counts(&self) -> &[u32] {
        &self.0
    }

    pub fn count(&self, item: usize) -> u32 {
        self.0[item]
    }

    /// `(item, count)` for every item the pattern actually yields.
    pub fn items(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(i, &c)| (i, c))
    }
}

/// Ordered, duplicate-free pattern pool. Patterns are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct PatternPool {
    patterns: Vec<Pattern>,
    seen: HashSet<Pattern>,
}

impl PatternPool {
    /// One single-piece pattern per item type.
    pub fn identity(items: usize) -> Self {
        let mut pool = Self::default();
        for i in 0..items {
            pool.push(Pattern::unit(items, i));
        }
        pool
    }

    /// Appends `pattern` unless it is already present; returns whether it was added.
    pub fn push(&mut self, pattern: Pattern) -> bool {
        if !self.seen.insert(pattern.clone()) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Pattern {
        &self.patterns[idx]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pattern> {
        self.patterns.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Pricing found no pattern with negative reduced cost.
    Converged,
    /// Pricing produced a pattern that is already in the pool.
    DuplicatePattern,
    IterationLimit,
    TimeLimit,
}

#[derive(Debug, Clone)]
pub struct MasterSolution {
    pub pool: PatternPool,
    /// Sheets cut with each pattern, parallel to `pool`.
    pub usage: Vec<u32>,
    pub sheets: u32,
    /// Objective of the last LP relaxation, a lower bound on `sheets`
    /// for the final pool.
    pub lp_bound: f64,
    pub iterations: usize,
    pub stop: StopReason,
    /// The integer master ran out of time and `usage` is the rounded-up
    /// relaxation instead of an integer optimum.
    pub rounded: bool,
}

impl MasterSolution {
    /// Patterns with positive usage, in pool order.
    pub fn active(&self) -> impl Iterator<Item = (&Pattern, u32)> + '_ {
        self.pool
            .iter()
            .zip(&self.usage)
            .filter(|&(_, &u)| u > 0)
            .map(|(p, &u)| (p, u))
    }

    /// Pieces of each item type produced by the chosen patterns.
    pub fn produced(&self, items: usize) -> Vec<u64> {
        let mut produced = vec![0u64; items];
        for (pattern, usage) in self.active() {
            for (i, c) in pattern.items() {
                produced[i] += c as u64 * usage as u64;
            }
        }
        produced
    }

    pub fn covers(&self, required: &[u32]) -> bool {
        self.produced(required.len())
            .iter()
            .zip(required)
            .all(|(&made, &need)| made >= need as u64)
    }
}

/// Column generation over the restricted master covering problem.
pub struct ColumnGeneration<'a, S> {
    solver: &'a S,
    config: &'a SolverConfig,
}

impl<'a, S: LpSolver> ColumnGeneration<'a, S> {
    pub fn new(solver: &'a S, config: &'a SolverConfig) -> Self {
        Self { solver, config }
    }

    /// Grows a pattern pool for `demand` on sheets of size `sheet` and returns
    /// the integer master solution over it.
    pub fn run(&self, demand: &DemandTable, sheet: Rect) -> Result<MasterSolution> {
        let n = demand.len();
        let required = demand.required();
        let dims = demand.dimensions();
        let mut pool = PatternPool::identity(n);

        if n == 0 {
            return Ok(MasterSolution {
                pool,
                usage: vec![],
                sheets: 0,
                lp_bound: 0.0,
                iterations: 0,
                stop: StopReason::Converged,
                rounded: false,
            });
        }

        let started = Instant::now();
        // Pricing gets three quarters of the budget, the integer master the rest.
        let deadline = self.config.time_limit().map(|limit| started + limit);
        let pricing_deadline = self.config.time_limit().map(|limit| started + limit * 3 / 4);
        let mut iterations = 0;
        let stop;
        let mut relaxation;

        loop {
            relaxation = self.solve_master(&pool, &required, Domain::Continuous)?;
            let duals = relaxation.duals.as_deref().ok_or_else(|| Error::Solver {
                stage: Stage::MasterRelaxation,
                message: "solver returned no dual values".to_string(),
            })?;

            if iterations >= self.config.max_iterations {
                warn!(iterations, pool = pool.len(), "column generation hit iteration limit");
                stop = StopReason::IterationLimit;
                break;
            }
            if pricing_deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(iterations, pool = pool.len(), "column generation hit time limit");
                stop = StopReason::TimeLimit;
                break;
            }
            iterations += 1;

            let priced = match pricing_deadline {
                Some(deadline) => pricing::price(
                    &Bounded {
                        solver: self.solver,
                        deadline,
                    },
                    duals,
                    &dims,
                    sheet,
                    self.config.capacity,
                ),
                None => pricing::price(self.solver, duals, &dims, sheet, self.config.capacity),
            };
            match priced {
                Ok(None) => {
                    stop = StopReason::Converged;
                    break;
                }
                Ok(Some(pattern)) => {
                    debug!(iteration = iterations, lp_bound = relaxation.objective, ?pattern, "adding pattern");
                    if !pool.push(pattern) {
                        warn!(iterations, "pricing repeated a pooled pattern, stopping");
                        stop = StopReason::DuplicatePattern;
                        break;
                    }
                }
                Err(Error::TimedOut { .. }) => {
                    warn!(iterations, pool = pool.len(), "pricing ran out of time");
                    stop = StopReason::TimeLimit;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        // The last relaxation was solved over the final pool.
        let lp_bound = relaxation.objective;
        let (usage, rounded) = match self.solve_integer_master(&pool, &required, deadline) {
            Ok(usage) => (usage, false),
            Err(Error::TimedOut { .. }) => {
                warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "integer master ran out of time, rounding up the relaxation"
                );
                (round_up(&relaxation.values, &pool, &required), true)
            }
            Err(e) => return Err(e),
        };
        let sheets = usage.iter().sum();

        let solution = MasterSolution {
            pool,
            usage,
            sheets,
            lp_bound,
            iterations,
            stop,
            rounded,
        };
        if !solution.covers(&required) {
            return Err(Error::Solver {
                stage: Stage::MasterInteger,
                message: "integer solution does not cover the demand".to_string(),
            });
        }
        debug!(
            sheets,
            lp_bound,
            patterns = solution.pool.len(),
            ?stop,
            rounded,
            "column generation finished"
        );
        Ok(solution)
    }

    fn solve_integer_master(
        &self,
        pool: &PatternPool,
        required: &[u32],
        deadline: Option<Instant>,
    ) -> Result<Vec<u32>> {
        let lp = master_program(pool, required, Domain::Integer);
        let solved = match deadline {
            Some(deadline) => self.solver.solve_until(&lp, deadline),
            None => self.solver.solve(&lp),
        };
        let integer = solved.map_err(|e| Error::from_solve(Stage::MasterInteger, e))?;
        Ok(integer
            .values
            .iter()
            .map(|v| v.max(0.0).round() as u32)
            .collect())
    }

    fn solve_master(&self, pool: &PatternPool, required: &[u32], domain: Domain) -> Result<LpSolution> {
        let stage = match domain {
            Domain::Continuous => Stage::MasterRelaxation,
            Domain::Integer => Stage::MasterInteger,
        };
        let lp = master_program(pool, required, domain);
        self.solver
            .solve(&lp)
            .map_err(|e| Error::from_solve(stage, e))
    }
}

/// Forwards every solve to `solve_until` with a fixed deadline.
struct Bounded<'a, S> {
    solver: &'a S,
    deadline: Instant,
}

impl<S: LpSolver> LpSolver for Bounded<'_, S> {
    fn solve(&self, lp: &LinearProgram) -> std::result::Result<LpSolution, SolveError> {
        self.solver.solve_until(lp, self.deadline)
    }
}

/// Rounds every relaxed usage up, which keeps demand covered, then drops
/// surplus sheets pattern by pattern in pool order while coverage holds.
pub fn round_up(values: &[f64], pool: &PatternPool, required: &[u32]) -> Vec<u32> {
    let mut usage: Vec<u32> = values.iter().map(|v| v.max(0.0).ceil() as u32).collect();
    let mut produced = vec![0u64; required.len()];
    for (pattern, &u) in pool.iter().zip(&usage) {
        for (i, c) in pattern.items() {
            produced[i] += c as u64 * u as u64;
        }
    }
    for (idx, pattern) in pool.iter().enumerate() {
        while usage[idx] > 0
            && pattern
                .items()
                .all(|(i, c)| produced[i] - c as u64 >= required[i] as u64)
        {
            usage[idx] -= 1;
            for (i, c) in pattern.items() {
                produced[i] -= c as u64;
            }
        }
    }
    usage
}

/// `min Σ λ_p` s.t. `Σ_p λ_p · p[i] >= required[i]` for every item, `λ >= 0`.
fn master_program(pool: &PatternPool, required: &[u32], domain: Domain) -> LinearProgram {
    let mut lp = LinearProgram::new(Sense::Minimize, vec![1.0; pool.len()], domain);
    for (i, &need) in required.iter().enumerate() {
        let coeffs = pool.iter().map(|p| p.count(i) as f64).collect();
        lp = lp.with_constraint(coeffs, Relation::Ge, need as f64);
    }
    if domain == Domain::Integer {
        // Cutting a pattern more often than its scarcest useful item needs is never optimal.
        let bounds = pool
            .iter()
            .map(|p| {
                let most = p
                    .items()
                    .map(|(i, c)| required[i].div_ceil(c))
                    .max()
                    .unwrap_or(0);
                Some(most as f64)
            })
            .collect();
        lp = lp.with_upper_bounds(bounds);
    }
    lp
}
