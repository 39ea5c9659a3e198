//! Communication-free row partitioning and bin construction sampling.
//!
//! Every machine seeds a [`UnitSelector`] with the same `data_random_seed`
//! and walks the rows in file order. One decision is drawn per unit (a row,
//! or a whole query group when boundaries are known) and the unit is kept
//! when the draw equals the machine's rank. Identical seeds and identical
//! boundary tables give every machine the same sequence of draws, so the
//! shards are disjoint and cover all units without any message exchange.

use crate::core::error::{LightGBMError, Result};
use crate::core::random::Random;
use crate::core::types::DataSize;

/// Decides which rows belong to this machine.
#[derive(Debug, Clone)]
pub struct UnitSelector<'a> {
    random: Random,
    rank: i32,
    num_machines: i32,
    query_boundaries: Option<&'a [DataSize]>,
    qid: usize,
    current_keep: bool,
    started: bool,
}

impl<'a> UnitSelector<'a> {
    /// Selector for machine `rank` of `num_machines`.
    ///
    /// With `query_boundaries` whole groups are kept or dropped together.
    pub fn new(
        seed: i32,
        rank: usize,
        num_machines: usize,
        query_boundaries: Option<&'a [DataSize]>,
    ) -> Self {
        UnitSelector {
            random: Random::with_seed(seed),
            rank: rank as i32,
            num_machines: num_machines.max(1) as i32,
            query_boundaries: query_boundaries.filter(|b| !b.is_empty()),
            qid: 0,
            current_keep: false,
            started: false,
        }
    }

    fn draw(&mut self) -> bool {
        self.random.next_int(0, self.num_machines) == self.rank
    }

    /// Whether `row` is kept. Rows must be visited in ascending order.
    pub fn select(&mut self, row: DataSize) -> Result<bool> {
        let Some(boundaries) = self.query_boundaries else {
            return Ok(self.draw());
        };
        let num_queries = boundaries.len() - 1;
        // skip empty groups and groups already passed; each one entered gets one draw
        while !self.started || (self.qid < num_queries && row >= boundaries[self.qid + 1]) {
            if self.started {
                self.qid += 1;
            }
            self.started = true;
            if self.qid < num_queries && boundaries[self.qid + 1] > boundaries[self.qid] {
                self.current_keep = self.draw();
            }
        }
        if self.qid >= num_queries {
            return Err(LightGBMError::dataset(format!(
                "Current query exceeds the range of the query file, \
                 please ensure the query file is correct (row {}, {} queries)",
                row, num_queries
            )));
        }
        Ok(self.current_keep)
    }

    /// Global indices of the kept rows among `num_rows`.
    pub fn select_all(&mut self, num_rows: DataSize) -> Result<Vec<DataSize>> {
        let mut used = Vec::new();
        for row in 0..num_rows {
            if self.select(row)? {
                used.push(row);
            }
        }
        Ok(used)
    }
}

/// Sample at most `sample_cnt` rows from an in-memory row list.
pub fn sample_from_memory<'a>(
    random: &mut Random,
    lines: &'a [String],
    sample_cnt: usize,
) -> Vec<&'a str> {
    random
        .sample_indices(lines.len(), sample_cnt)
        .into_iter()
        .map(|i| lines[i].as_str())
        .collect()
}
