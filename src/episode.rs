use thiserror::Error;
use tracing::{debug, info};

use crate::sheet::Sheet;
use crate::types::{Action, ItemRecord};

/// Why an action was not applied to the episode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("stock {0} does not exist")]
    UnknownStock(i64),
    #[error("no remaining product of size {w}x{h}")]
    NoMatchingProduct { w: u32, h: u32 },
    #[error("stock {stock_idx} is not free at ({x}, {y})")]
    Occupied { stock_idx: usize, x: u32, y: u32 },
}

/// Local stand-in for the cutting environment: the remaining products plus
/// the sheets the pieces are cut from.
#[derive(Debug, Clone)]
pub struct Episode {
    pub products: Vec<ItemRecord>,
    pub sheets: Vec<Sheet>,
    steps: usize,
}

impl Episode {
    pub fn new(products: Vec<ItemRecord>, sheets: Vec<Sheet>) -> Self {
        Self {
            products,
            sheets,
            steps: 0,
        }
    }

    /// Applies one cut. A product matches when its size equals the action's
    /// size in either orientation and it still has pieces left.
    pub fn step(&mut self, action: &Action) -> Result<(), StepError> {
        let sheet = usize::try_from(action.stock_idx)
            .ok()
            .filter(|&idx| idx < self.sheets.len())
            .ok_or(StepError::UnknownStock(action.stock_idx))?;
        let rect = action.rect();
        let product = self
            .products
            .iter()
            .position(|p| {
                p.quantity.unwrap_or(0) > 0
                    && (p.size == Some((rect.w, rect.h)) || p.size == Some((rect.h, rect.w)))
            })
            .ok_or(StepError::NoMatchingProduct {
                w: rect.w,
                h: rect.h,
            })?;

        let (x, y) = action.position;
        if !self.sheets[sheet].occupy(x, y, rect, product as i32) {
            return Err(StepError::Occupied {
                stock_idx: sheet,
                x,
                y,
            });
        }
        if let Some(q) = self.products[product].quantity.as_mut() {
            *q -= 1;
        }
        self.steps += 1;
        debug!(sheet, product, x, y, "cut {rect}");
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    pub fn remaining(&self) -> u64 {
        self.products
            .iter()
            .map(|p| p.quantity.unwrap_or(0) as u64)
            .sum()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn sheets_used(&self) -> usize {
        self.sheets.iter().filter(|s| s.is_used()).count()
    }

    /// Share of the usable area of used sheets that is covered by pieces.
    pub fn fill_percent(&self) -> f64 {
        let (used, total) = self
            .sheets
            .iter()
            .filter(|s| s.is_used())
            .fold((0u64, 0u64), |(used, total), s| {
                (used + s.used_area(), total + s.width() as u64 * s.height() as u64)
            });
        if total == 0 {
            return 0.0;
        }
        used as f64 / total as f64 * 100.0
    }

    pub fn log_summary(&self) {
        info!(
            steps = self.steps,
            sheets_used = self.sheets_used(),
            remaining = self.remaining(),
            "episode finished with {:.1}% fill",
            self.fill_percent()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;

    fn episode() -> Episode {
        Episode::new(
            vec![ItemRecord::new(2, 1, 2), ItemRecord::new(1, 1, 1)],
            vec![Sheet::new(3, 3); 2],
        )
    }

    #[test]
    fn test_step_decrements_matching_product() {
        let mut ep = episode();
        ep.step(&Action::new(0, Rect::new(2, 1), 0, 0)).unwrap();
        assert_eq!(ep.products[0].quantity, Some(1));
        assert_eq!(ep.remaining(), 2);
        assert_eq!(ep.steps(), 1);
        assert_eq!(ep.sheets_used(), 1);
    }

    #[test]
    fn test_step_matches_rotated_size() {
        let mut ep = episode();
        ep.step(&Action::new(1, Rect::new(1, 2), 2, 1)).unwrap();
        assert_eq!(ep.products[0].quantity, Some(1));
        assert_eq!(ep.sheets[1].cell(2, 2), Some(0));
    }

    #[test]
    fn test_step_rejects_invalid_actions() {
        let mut ep = episode();
        assert_eq!(ep.step(&Action::NONE), Err(StepError::UnknownStock(-1)));
        assert_eq!(
            ep.step(&Action::new(5, Rect::new(1, 1), 0, 0)),
            Err(StepError::UnknownStock(5))
        );
        assert_eq!(
            ep.step(&Action::new(0, Rect::new(3, 3), 0, 0)),
            Err(StepError::NoMatchingProduct { w: 3, h: 3 })
        );
        ep.step(&Action::new(0, Rect::new(1, 1), 0, 0)).unwrap();
        // the 1x1 product is exhausted now
        assert!(ep.step(&Action::new(0, Rect::new(1, 1), 2, 2)).is_err());
        assert_eq!(
            ep.step(&Action::new(0, Rect::new(2, 1), 0, 0)),
            Err(StepError::Occupied {
                stock_idx: 0,
                x: 0,
                y: 0
            })
        );
        assert_eq!(ep.products[0].quantity, Some(2));
    }

    #[test]
    fn test_step_error_messages() {
        assert_eq!(StepError::UnknownStock(-1).to_string(), "stock -1 does not exist");
        assert_eq!(
            StepError::NoMatchingProduct { w: 3, h: 2 }.to_string(),
            "no remaining product of size 3x2"
        );
        let err = StepError::Occupied {
            stock_idx: 1,
            x: 4,
            y: 0,
        };
        assert_eq!(err.to_string(), "stock 1 is not free at (4, 0)");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_done_and_fill() {
        let mut ep = episode();
        assert!(!ep.is_done());
        assert_eq!(ep.fill_percent(), 0.0);
        ep.step(&Action::new(0, Rect::new(2, 1), 0, 0)).unwrap();
        ep.step(&Action::new(0, Rect::new(2, 1), 0, 1)).unwrap();
        ep.step(&Action::new(0, Rect::new(1, 1), 2, 0)).unwrap();
        assert!(ep.is_done());
        assert_eq!(ep.sheets_used(), 1);
        assert!((ep.fill_percent() - 500.0 / 9.0).abs() < 1e-9);
    }
}
