//! Elastic alignment of multi-dimensional time series.
//!
//! Pure math library with zero I/O. Provides validated time series with
//! linear-interpolation resampling, weighted local costs, exact Dynamic Time
//! Warping over an optional search window (with per-point weights), warping
//! path extraction, and the multi-resolution FastDTW approximation built on
//! piecewise aggregate approximation.

mod cost;
mod distance;
mod dtw;
mod error;
mod fast;
mod paa;
mod path;
mod series;
mod window;

pub use cost::{CoordWeights, CostFunction};
pub use distance::DtwDistance;
pub use dtw::Dtw;
pub use error::DtwError;
pub use fast::{Alignment, DEFAULT_RADIUS, FastDtw};
pub use paa::Paa;
pub use path::{WarpingPath, WarpingStep};
pub use series::{TimeSeries, TimeSeriesView};
pub use window::SearchWindow;
