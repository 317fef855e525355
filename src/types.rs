use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }

    pub fn is_square(&self) -> bool {
        self.w == self.h
    }

    pub fn short_side(&self) -> u32 {
        self.w.min(self.h)
    }

    pub fn long_side(&self) -> u32 {
        self.w.max(self.h)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// One item type to cut: its size and how many pieces are still required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    pub rect: Rect,
    pub qty: u32,
}

/// A raw product entry as supplied by the caller. Both fields are optional
/// on the wire so that malformed records can be reported by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default)]
    pub size: Option<(u32, u32)>,
    #[serde(default, deserialize_with = "deserialize_opt_u32_from_number")]
    pub quantity: Option<u32>,
}

impl ItemRecord {
    pub fn new(w: u32, h: u32, quantity: u32) -> Self {
        Self {
            size: Some((w, h)),
            quantity: Some(quantity),
        }
    }
}

/// A single cut decision: place an item of `size` with its top-left corner at
/// `position` on stock `stock_idx`. `stock_idx == -1` means nothing can be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub stock_idx: i64,
    pub size: (u32, u32),
    pub position: (u32, u32),
}

impl Action {
    pub const NONE: Action = Action {
        stock_idx: -1,
        size: (0, 0),
        position: (0, 0),
    };

    pub fn new(stock_idx: usize, rect: Rect, x: u32, y: u32) -> Self {
        Self {
            stock_idx: stock_idx as i64,
            size: (rect.w, rect.h),
            position: (x, y),
        }
    }

    pub fn is_none(&self) -> bool {
        self.stock_idx < 0
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.size.0, self.size.1)
    }
}

/// Accepts `3` as well as `3.0`; some producers emit every number as a float.
pub fn deserialize_opt_u32_from_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        Some(value) => number_to_u32(value).map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}

fn number_to_u32(value: f64) -> Result<u32, String> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(format!("expected a non-negative integer, got {value}"));
    }
    Ok(value as u32)
}
