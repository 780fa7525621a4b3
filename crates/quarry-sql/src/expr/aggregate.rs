//! Aggregate functions and their accumulators.
//!
//! Aggregation runs in two phases. During the accumulate phase, every
//! aggregate node in a projection feeds one [`Accumulator`] per node, walked
//! in expression order; during the finalize phase the same walk reads the
//! results back. [`AggState`] carries the accumulators and the walk cursor
//! between the two phases.

use std::fmt;

use quarry_codec::Datum;
use quarry_common::error::{QuarryError, QuarryResult};

/// An aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    /// `COUNT(x)` / `COUNT(*)`.
    Count,
    /// `SUM(x)`.
    Sum,
    /// `AVG(x)`.
    Avg,
    /// `MIN(x)`.
    Min,
    /// `MAX(x)`.
    Max,
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        };
        write!(f, "{name}")
    }
}

/// Running state for one aggregate call over one group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    func: AggFunc,
    /// Non-NULL inputs seen.
    rows: u64,
    sum_int: i64,
    sum_float: f64,
    /// Set once the sum leaves the integer domain.
    float_mode: bool,
    extreme: Option<Datum>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new(func: AggFunc) -> Self {
        Self {
            func,
            rows: 0,
            sum_int: 0,
            sum_float: 0.0,
            float_mode: false,
            extreme: None,
        }
    }

    /// Feeds one input value. NULL inputs are skipped for every function.
    pub fn update(&mut self, value: &Datum) -> QuarryResult<()> {
        if value.is_null() {
            return Ok(());
        }
        self.rows += 1;
        match self.func {
            AggFunc::Count => {}
            AggFunc::Sum | AggFunc::Avg => self.add(value)?,
            AggFunc::Min => {
                let replace = match &self.extreme {
                    Some(current) => value.cmp_order(current) == std::cmp::Ordering::Less,
                    None => true,
                };
                if replace {
                    self.extreme = Some(value.clone());
                }
            }
            AggFunc::Max => {
                let replace = match &self.extreme {
                    Some(current) => value.cmp_order(current) == std::cmp::Ordering::Greater,
                    None => true,
                };
                if replace {
                    self.extreme = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn add(&mut self, value: &Datum) -> QuarryResult<()> {
        if !self.float_mode {
            if let Datum::I64(v) = value {
                match self.sum_int.checked_add(*v) {
                    Some(sum) => {
                        self.sum_int = sum;
                        return Ok(());
                    }
                    None => {
                        self.float_mode = true;
                        self.sum_float = self.sum_int as f64;
                    }
                }
            } else {
                self.float_mode = true;
                self.sum_float = self.sum_int as f64;
            }
        }
        let v = value.to_f64().ok_or_else(|| {
            QuarryError::expression(format!("cannot sum non-numeric value {value}"))
        })?;
        self.sum_float += v;
        Ok(())
    }

    /// Produces the aggregate result. The aggregate of an empty set is 0 for
    /// COUNT and NULL otherwise.
    #[must_use]
    pub fn result(&self) -> Datum {
        match self.func {
            AggFunc::Count => Datum::I64(self.rows as i64),
            AggFunc::Sum => {
                if self.rows == 0 {
                    Datum::Null
                } else if self.float_mode {
                    Datum::F64(self.sum_float)
                } else {
                    Datum::I64(self.sum_int)
                }
            }
            AggFunc::Avg => {
                if self.rows == 0 {
                    Datum::Null
                } else {
                    let total = if self.float_mode {
                        self.sum_float
                    } else {
                        self.sum_int as f64
                    };
                    Datum::F64(total / self.rows as f64)
                }
            }
            AggFunc::Min | AggFunc::Max => self.extreme.clone().unwrap_or(Datum::Null),
        }
    }
}

/// Accumulators for one group, shared between the accumulate and finalize
/// walks over the projection expressions.
#[derive(Debug, Default)]
pub struct AggState {
    cursor: usize,
    accumulators: Vec<Accumulator>,
}

impl AggState {
    /// Rewinds the walk cursor. Call before each accumulate pass over a row
    /// and before the finalize pass.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Feeds `input` into the accumulator at the cursor, allocating it on
    /// the first row, and advances the cursor.
    pub fn accumulate(&mut self, func: AggFunc, input: &Datum) -> QuarryResult<()> {
        if self.cursor == self.accumulators.len() {
            self.accumulators.push(Accumulator::new(func));
        }
        self.accumulators[self.cursor].update(input)?;
        self.cursor += 1;
        Ok(())
    }

    /// Reads the result at the cursor and advances. Allocates an empty
    /// accumulator when no row was ever accumulated (aggregate over the
    /// empty set).
    pub fn finalize(&mut self, func: AggFunc) -> Datum {
        if self.cursor == self.accumulators.len() {
            self.accumulators.push(Accumulator::new(func));
        }
        let result = self.accumulators[self.cursor].result();
        self.cursor += 1;
        result
    }
}
