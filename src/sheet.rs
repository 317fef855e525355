use serde::{Deserialize, Serialize};

use crate::types::Rect;

pub const FREE: i32 = -1;
pub const UNUSABLE: i32 = -2;

/// Read access to a stock sheet's live occupancy.
pub trait Occupancy {
    /// Usable width and height.
    fn extent(&self) -> Rect;

    /// True when the rectangle at `(x, y)` lies inside the usable area and
    /// covers no claimed cell.
    fn is_free(&self, x: u32, y: u32, size: Rect) -> bool;
}

/// A stock sheet as a cell grid indexed `[x][y]`. `-1` is free, `-2` lies
/// outside the usable area, anything else is claimed by a placed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<i32>>", into = "Vec<Vec<i32>>")]
pub struct Sheet {
    cells: Vec<Vec<i32>>,
    width: u32,
    height: u32,
}

impl Sheet {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            cells: vec![vec![FREE; height as usize]; width as usize],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<i32> {
        self.cells
            .get(x as usize)
            .and_then(|col| col.get(y as usize))
            .copied()
    }

    /// Claims the rectangle for `label`. Returns false, leaving the sheet
    /// untouched, when the rectangle is not free.
    pub fn occupy(&mut self, x: u32, y: u32, size: Rect, label: i32) -> bool {
        if !self.is_free(x, y, size) {
            return false;
        }
        for col in &mut self.cells[x as usize..(x + size.w) as usize] {
            for cell in &mut col[y as usize..(y + size.h) as usize] {
                *cell = label;
            }
        }
        true
    }

    pub fn used_area(&self) -> u64 {
        self.cells
            .iter()
            .flatten()
            .filter(|&&c| c != FREE && c != UNUSABLE)
            .count() as u64
    }

    pub fn is_used(&self) -> bool {
        self.used_area() > 0
    }
}

impl Occupancy for Sheet {
    fn extent(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    fn is_free(&self, x: u32, y: u32, size: Rect) -> bool {
        let (Some(x_end), Some(y_end)) = (x.checked_add(size.w), y.checked_add(size.h)) else {
            return false;
        };
        if x_end > self.width || y_end > self.height {
            return false;
        }
        self.cells[x as usize..x_end as usize]
            .iter()
            .all(|col| col[y as usize..y_end as usize].iter().all(|&c| c == FREE))
    }
}

impl TryFrom<Vec<Vec<i32>>> for Sheet {
    type Error = String;

    fn try_from(cells: Vec<Vec<i32>>) -> Result<Self, Self::Error> {
        let rows = cells.first().map_or(0, Vec::len);
        if cells.iter().any(|col| col.len() != rows) {
            return Err("stock grid must be rectangular".to_string());
        }
        // Usable extent: columns and rows that hold any cell inside the usable area.
        let width = cells
            .iter()
            .filter(|col| col.iter().any(|&c| c != UNUSABLE))
            .count() as u32;
        let height = (0..rows)
            .filter(|&y| cells.iter().any(|col| col[y] != UNUSABLE))
            .count() as u32;
        Ok(Self {
            cells,
            width,
            height,
        })
    }
}

impl From<Sheet> for Vec<Vec<i32>> {
    fn from(sheet: Sheet) -> Self {
        sheet.cells
    }
}
