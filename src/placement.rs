use std::cmp::Reverse;

use rand::Rng;

use crate::column_generation::MasterSolution;
use crate::config::{PieceOrder, SearchStrategy, SolverConfig};
use crate::demand::DemandTable;
use crate::sheet::Occupancy;
use crate::types::{Action, Rect};

/// Picks the next piece to cut.
///
/// Sheets are visited in index order. On each sheet the candidate pieces are
/// tried first as given and then, when rotation is allowed, with width and
/// height swapped; the first free position found is returned. The sheets are
/// only read.
pub fn plan<O, R>(
    solution: &MasterSolution,
    demand: &DemandTable,
    sheets: &[O],
    config: &SolverConfig,
    rng: &mut R,
) -> Action
where
    O: Occupancy,
    R: Rng + ?Sized,
{
    let candidates = candidates(solution, demand, config.order);
    for (stock_idx, sheet) in sheets.iter().enumerate() {
        for &item in &candidates {
            let rect = demand.items[item].rect;
            if let Some((x, y)) = find_position(sheet, rect, config.search, rng) {
                return Action::new(stock_idx, rect, x, y);
            }
            if config.allow_rotate && !rect.is_square() {
                let rotated = rect.rotated();
                if let Some((x, y)) = find_position(sheet, rotated, config.search, rng) {
                    return Action::new(stock_idx, rotated, x, y);
                }
            }
        }
    }
    Action::NONE
}

/// Item types cut by patterns with positive usage that still have demand,
/// each listed once.
pub fn candidates(solution: &MasterSolution, demand: &DemandTable, order: PieceOrder) -> Vec<usize> {
    let mut seen = vec![false; demand.len()];
    let mut items = Vec::new();
    for (pattern, _) in solution.active() {
        for (item, _) in pattern.items() {
            if !seen[item] && demand.items[item].qty > 0 {
                seen[item] = true;
                items.push(item);
            }
        }
    }
    if order == PieceOrder::LargestFirst {
        items.sort_by_key(|&i| Reverse(demand.items[i].rect.area()));
    }
    items
}

/// Top-left corner where `rect` lies inside `sheet` without touching a claimed cell.
pub fn find_position<O, R>(sheet: &O, rect: Rect, search: SearchStrategy, rng: &mut R) -> Option<(u32, u32)>
where
    O: Occupancy + ?Sized,
    R: Rng + ?Sized,
{
    let extent = sheet.extent();
    if !rect.fits_in(&extent) {
        return None;
    }
    let max_x = extent.w - rect.w;
    let max_y = extent.h - rect.h;

    match search {
        SearchStrategy::RowMajor => (0..=max_y)
            .flat_map(|y| (0..=max_x).map(move |x| (x, y)))
            .find(|&(x, y)| sheet.is_free(x, y, rect)),
        SearchStrategy::Random { attempts } => (0..attempts)
            .map(|_| (rng.gen_range(0..=max_x), rng.gen_range(0..=max_y)))
            .find(|&(x, y)| sheet.is_free(x, y, rect)),
    }
}
