//! Search windows restricting which cost-matrix cells DTW may visit.

use std::ops::Range;

use crate::path::WarpingPath;

/// Per-row column ranges of the cost matrix that alignment is allowed to visit.
///
/// Every row holds one contiguous, non-empty range. Row starts and row ends are
/// non-decreasing, row 0 starts at column 0, the last row ends at the last
/// column, and each row starts no later than one past the previous row's end, so
/// a monotone path from `(0, 0)` to `(n-1, m-1)` always exists inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWindow {
    n: usize,
    cols: usize,
    /// Inclusive `(first, last)` column per row.
    rows: Vec<(usize, usize)>,
}

impl SearchWindow {
    /// Window covering the whole `n x m` matrix.
    #[must_use]
    pub fn full(n: usize, m: usize) -> Self {
        if n == 0 || m == 0 {
            return Self::degenerate(n, m);
        }
        Self {
            n,
            cols: m,
            rows: vec![(0, m - 1); n],
        }
    }

    /// Sakoe-Chiba band of the given radius around the (length-scaled) diagonal.
    ///
    /// For equal lengths this is exactly `|i - j| <= radius`. For unequal lengths
    /// the band follows the straight line from `(0, 0)` to `(n-1, m-1)`.
    #[must_use]
    pub fn sakoe_chiba(n: usize, m: usize, radius: usize) -> Self {
        if n == 0 || m == 0 {
            return Self::degenerate(n, m);
        }
        let rows = (0..n)
            .map(|i| {
                let center = if n == 1 {
                    0
                } else {
                    ((i * (m - 1)) as f64 / (n - 1) as f64).round() as usize
                };
                (center.saturating_sub(radius), (center + radius).min(m - 1))
            })
            .collect();
        Self::normalized(m, rows)
    }

    /// Project a coarse warp path onto the full-resolution matrix and dilate it.
    ///
    /// `blocks_a[k]` and `blocks_b[k]` give how many full-resolution points coarse
    /// point `k` of each series stands for. Each coarse cell expands to the
    /// block rectangle it covers; diagonal coarse moves also mark the two corner
    /// cells between consecutive rectangles so the projection stays connected.
    /// The result is then widened by `radius` cells in every direction.
    #[must_use]
    pub fn from_coarse_path(
        coarse: &WarpingPath,
        blocks_a: &[usize],
        blocks_b: &[usize],
        radius: usize,
    ) -> Self {
        let n: usize = blocks_a.iter().sum();
        let m: usize = blocks_b.iter().sum();
        if n == 0 || m == 0 {
            return Self::degenerate(n, m);
        }

        let mut marked: Vec<Option<(usize, usize)>> = vec![None; n];
        let mut mark = |i: usize, j: usize| {
            if i >= n || j >= m {
                return;
            }
            marked[i] = Some(match marked[i] {
                Some((lo, hi)) => (lo.min(j), hi.max(j)),
                None => (j, j),
            });
        };

        let mut current_i = 0usize;
        let mut current_j = 0usize;
        let mut last: Option<(usize, usize)> = None;
        for step in coarse {
            let (block_i, block_j) = (blocks_a[step.a], blocks_b[step.b]);
            let mut moved_i = false;
            let mut moved_j = false;
            if let Some((last_a, last_b)) = last {
                if step.a > last_a {
                    current_i += blocks_a[last_a];
                    moved_i = true;
                }
                if step.b > last_b {
                    current_j += blocks_b[last_b];
                    moved_j = true;
                }
            }
            if moved_i && moved_j {
                mark(current_i - 1, current_j);
                mark(current_i, current_j - 1);
            }
            for x in 0..block_i {
                mark(current_i + x, current_j);
                mark(current_i + x, current_j + block_j - 1);
            }
            last = Some((step.a, step.b));
        }

        // Chebyshev dilation: row i takes the hull of rows i-r..=i+r widened by r.
        let rows = (0..n)
            .map(|i| {
                let from = i.saturating_sub(radius);
                let to = (i + radius).min(n - 1);
                let hull = marked[from..=to]
                    .iter()
                    .flatten()
                    .fold(None, |acc: Option<(usize, usize)>, &(lo, hi)| {
                        Some(match acc {
                            Some((a, b)) => (a.min(lo), b.max(hi)),
                            None => (lo, hi),
                        })
                    });
                match hull {
                    Some((lo, hi)) => (lo.saturating_sub(radius), (hi + radius).min(m - 1)),
                    // Unmarked rows are repaired by normalization.
                    None => (m - 1, 0),
                }
            })
            .collect();
        Self::normalized(m, rows)
    }

    fn degenerate(n: usize, m: usize) -> Self {
        Self {
            n,
            cols: m,
            rows: Vec::new(),
        }
    }

    /// Repair per-row bounds into a connected, monotone window.
    fn normalized(m: usize, mut rows: Vec<(usize, usize)>) -> Self {
        let n = rows.len();
        rows[0].0 = 0;
        for i in (0..n - 1).rev() {
            rows[i].0 = rows[i].0.min(rows[i + 1].0);
        }
        rows[0].1 = rows[0].1.max(rows[0].0);
        for i in 1..n {
            let prev_end = rows[i - 1].1;
            rows[i].0 = rows[i].0.min(prev_end + 1);
            rows[i].1 = rows[i].1.max(prev_end).max(rows[i].0);
        }
        rows[n - 1].1 = m - 1;
        Self { n, cols: m, rows }
    }

    /// Number of rows (length of the first series).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.n
    }

    /// Number of columns (length of the second series).
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Allowed columns of `row` as a half-open range.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.rows()`.
    #[must_use]
    pub fn column_range(&self, row: usize) -> Range<usize> {
        let (lo, hi) = self.rows[row];
        lo..hi + 1
    }

    /// Widest row of the window; the stride of a banded cost matrix.
    #[must_use]
    pub fn max_width(&self) -> usize {
        self.rows.iter().map(|&(lo, hi)| hi - lo + 1).max().unwrap_or(0)
    }

    /// Total number of cells inside the window.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|&(lo, hi)| hi - lo + 1).sum()
    }
}
