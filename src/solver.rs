use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column_generation::{ColumnGeneration, MasterSolution};
use crate::config::SolverConfig;
use crate::demand::{self, DemandTable};
use crate::error::Result;
use crate::lp::{LpSolver, MicroLp};
use crate::placement;
use crate::sheet::{Occupancy, Sheet};
use crate::types::{Action, ItemRecord, Rect};

/// Everything a decision call sees: the remaining products and the live stocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub products: Vec<ItemRecord>,
    pub stocks: Vec<Sheet>,
}

/// Inputs derived once at the start of a decision call and shared, read-only,
/// by every later stage of that call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub demand: DemandTable,
    pub pricing_sheet: Rect,
}

/// Stateless decision routine: every call rebuilds patterns from scratch.
pub struct Solver<S = MicroLp> {
    config: SolverConfig,
    backend: S,
}

impl Solver<MicroLp> {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_backend(config, MicroLp)
    }
}

impl<S: LpSolver> Solver<S> {
    pub fn with_backend(config: SolverConfig, backend: S) -> Self {
        Self { config, backend }
    }

    pub fn context<O: Occupancy>(&self, products: &[ItemRecord], stocks: &[O]) -> Result<CallContext> {
        let demand = demand::extract(products)?;
        let pricing_sheet = self.config.pricing_sheet.unwrap_or_else(|| {
            stocks
                .iter()
                .map(Occupancy::extent)
                .max_by_key(Rect::area)
                .unwrap_or(Rect::new(0, 0))
        });
        Ok(CallContext {
            demand,
            pricing_sheet,
        })
    }

    pub fn solve_patterns(&self, ctx: &CallContext) -> Result<MasterSolution> {
        ColumnGeneration::new(&self.backend, &self.config).run(&ctx.demand, ctx.pricing_sheet)
    }

    /// One cut: the placement of a single piece, or [`Action::NONE`] when no
    /// remaining piece fits anywhere.
    pub fn decide<O, R>(&self, products: &[ItemRecord], stocks: &[O], rng: &mut R) -> Result<Action>
    where
        O: Occupancy,
        R: Rng + ?Sized,
    {
        let ctx = self.context(products, stocks)?;
        let solution = self.solve_patterns(&ctx)?;
        let action = placement::plan(&solution, &ctx.demand, stocks, &self.config, rng);
        debug!(
            remaining = ctx.demand.total_required(),
            sheets = solution.sheets,
            patterns = solution.pool.len(),
            stock_idx = action.stock_idx,
            "decision"
        );
        Ok(action)
    }

    pub fn decide_observation<R: Rng + ?Sized>(&self, obs: &Observation, rng: &mut R) -> Result<Action> {
        self.decide(&obs.products, &obs.stocks, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapacityPolicy, SearchStrategy};
    use crate::error::Error;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Validates one action against the sheets it was planned on:
    /// 1. It targets an existing sheet
    /// 2. The piece lies inside the usable area
    /// 3. No claimed cell is covered
    fn assert_action_valid(action: &Action, sheets: &[Sheet]) {
        assert!(action.stock_idx >= 0, "expected a placement, got the sentinel");
        let idx = action.stock_idx as usize;
        assert!(idx < sheets.len(), "stock {idx} does not exist");
        let sheet = &sheets[idx];
        let rect = action.rect();
        let (x, y) = action.position;
        assert!(
            x + rect.w <= sheet.width(),
            "{rect} @ ({x},{y}) exceeds sheet width {}",
            sheet.width()
        );
        assert!(
            y + rect.h <= sheet.height(),
            "{rect} @ ({x},{y}) exceeds sheet height {}",
            sheet.height()
        );
        assert!(sheet.is_free(x, y, rect), "{rect} @ ({x},{y}) overlaps");
    }

    /// Plays decisions against the sheets until the sentinel, decrementing the
    /// matching product after each placement. Returns the number of pieces cut.
    fn run_episode(solver: &Solver, products: &mut [ItemRecord], sheets: &mut [Sheet], seed: u64) -> u32 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cut = 0;
        loop {
            let action = solver.decide(&*products, &*sheets, &mut rng).unwrap();
            if action.is_none() {
                return cut;
            }
            assert_action_valid(&action, sheets);
            let (x, y) = action.position;
            let rect = action.rect();
            let product = products
                .iter()
                .position(|p| {
                    p.quantity.unwrap_or(0) > 0
                        && (p.size == Some((rect.w, rect.h)) || p.size == Some((rect.h, rect.w)))
                })
                .expect("action names a product with remaining demand");
            assert!(sheets[action.stock_idx as usize].occupy(x, y, rect, product as i32));
            products[product].quantity = products[product].quantity.map(|q| q - 1);
            cut += 1;
            assert!(cut < 500, "episode did not terminate");
        }
    }

    #[test]
    fn test_first_call_on_empty_sheets() {
        let solver = Solver::new(SolverConfig::default());
        let products = vec![ItemRecord::new(2, 2, 3), ItemRecord::new(1, 1, 4)];
        let sheets = vec![Sheet::new(4, 4); 3];

        let ctx = solver.context(&products, &sheets).unwrap();
        assert_eq!(ctx.pricing_sheet, Rect::new(4, 4));
        let sol = solver.solve_patterns(&ctx).unwrap();
        assert!(sol.covers(&ctx.demand.required()));
        assert!(sol.sheets >= 1);

        let mut rng = StdRng::seed_from_u64(1);
        let action = solver.decide(&products, &sheets, &mut rng).unwrap();
        assert_eq!(action.stock_idx, 0);
        assert_eq!(action.size, (2, 2));
        assert_action_valid(&action, &sheets);
    }

    #[test]
    fn test_zero_demand_returns_sentinel() {
        let solver = Solver::new(SolverConfig::default());
        let products = vec![ItemRecord::new(2, 2, 0), ItemRecord::new(1, 1, 0)];
        let sheets = vec![Sheet::new(4, 4); 2];

        let ctx = solver.context(&products, &sheets).unwrap();
        let sol = solver.solve_patterns(&ctx).unwrap();
        assert!(sol.usage.iter().all(|&u| u == 0));

        let mut rng = StdRng::seed_from_u64(1);
        let action = solver.decide(&products, &sheets, &mut rng).unwrap();
        assert_eq!(action, Action::NONE);
    }

    #[test]
    fn test_oversized_item_returns_sentinel() {
        let solver = Solver::new(SolverConfig::default());
        let products = vec![ItemRecord::new(6, 9, 1)];
        let sheets = vec![Sheet::new(5, 5), Sheet::new(8, 4)];
        let mut rng = StdRng::seed_from_u64(1);
        let action = solver.decide(&products, &sheets, &mut rng).unwrap();
        assert_eq!(action, Action::NONE);
    }

    #[test]
    fn test_malformed_product_aborts_call() {
        let solver = Solver::new(SolverConfig::default());
        let products = vec![
            ItemRecord::new(1, 1, 1),
            ItemRecord {
                size: Some((2, 2)),
                quantity: None,
            },
        ];
        let sheets = vec![Sheet::new(4, 4)];
        let mut rng = StdRng::seed_from_u64(1);
        let err = solver.decide(&products, &sheets, &mut rng).unwrap_err();
        assert!(matches!(err, Error::MalformedItem { index: 1, .. }));
        // the sheet is untouched
        assert!(!sheets[0].is_used());
    }

    #[test]
    fn test_explicit_pricing_sheet() {
        let solver = Solver::new(SolverConfig::default().with_pricing_sheet(Rect::new(10, 10)));
        let products = vec![ItemRecord::new(1, 1, 1)];
        let sheets = vec![Sheet::new(4, 4), Sheet::new(20, 2)];
        let ctx = solver.context(&products, &sheets).unwrap();
        assert_eq!(ctx.pricing_sheet, Rect::new(10, 10));

        let default = Solver::new(SolverConfig::default());
        let ctx = default.context(&products, &sheets).unwrap();
        assert_eq!(ctx.pricing_sheet, Rect::new(20, 2));
    }

    #[test]
    fn test_full_episode_row_major() {
        let solver = Solver::new(SolverConfig::default());
        let mut products = vec![
            ItemRecord::new(2, 2, 3),
            ItemRecord::new(1, 1, 4),
            ItemRecord::new(3, 1, 2),
        ];
        let mut sheets = vec![Sheet::new(4, 4); 3];
        let cut = run_episode(&solver, &mut products, &mut sheets, 0);
        assert_eq!(cut, 9);
        assert!(products.iter().all(|p| p.quantity == Some(0)));
    }

    #[test]
    fn test_full_episode_random_either_orientation() {
        let config = SolverConfig::default()
            .with_search(SearchStrategy::Random { attempts: 200 })
            .with_capacity(CapacityPolicy::EitherOrientation);
        let solver = Solver::new(config);
        let mut products = vec![
            ItemRecord::new(1, 4, 3),
            ItemRecord::new(2, 3, 2),
            ItemRecord::new(1, 1, 5),
        ];
        let mut sheets = vec![Sheet::new(5, 4); 4];
        let cut = run_episode(&solver, &mut products, &mut sheets, 11);
        let total = 3 + 2 + 5;
        assert!(cut <= total);
        assert!(cut > 0);
    }

    #[test]
    fn test_episode_stops_when_sheets_run_out() {
        let solver = Solver::new(SolverConfig::default().with_rotation(false));
        let mut products = vec![ItemRecord::new(3, 3, 5)];
        let mut sheets = vec![Sheet::new(4, 4), Sheet::new(4, 4)];
        let cut = run_episode(&solver, &mut products, &mut sheets, 0);
        assert_eq!(cut, 2);
        assert_eq!(products[0].quantity, Some(3));
    }

    #[test]
    fn test_observation_round_trip_through_json() {
        let json = serde_json::json!({
            "products": [{"size": [2, 2], "quantity": 3}, {"size": [1, 1], "quantity": 4.0}],
            "stocks": [[[-1, -1, -2], [-1, -1, -2], [-2, -2, -2]]]
        });
        let obs: Observation = serde_json::from_value(json).unwrap();
        assert_eq!(obs.stocks[0].extent(), Rect::new(2, 2));
        let solver = Solver::new(SolverConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let action = solver.decide_observation(&obs, &mut rng).unwrap();
        assert_eq!(action, Action::new(0, Rect::new(2, 2), 0, 0));
    }
}
