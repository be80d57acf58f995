//! Split-axis strategies.
//!
//! The builder asks a chooser for one axis per popped work item (leaves
//! included), so a pinned sequence reproduces a build exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::aabb::{Aabb, Axis};

/// Configured split-axis policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAxis {
    /// Uniformly random axis per node.
    #[default]
    Random,
    /// Longest extent of the node's box.
    LongestExtent,
}

impl SplitAxis {
    /// Instantiate the chooser for one build.
    pub fn chooser(self, seed: Option<u64>) -> Box<dyn AxisChooser> {
        match self {
            SplitAxis::Random => Box::new(match seed {
                Some(seed) => RandomAxis::seeded(seed),
                None => RandomAxis::from_entropy(),
            }),
            SplitAxis::LongestExtent => Box::new(LongestExtent),
        }
    }
}

/// Picks the axis a work item is sorted and split along.
pub trait AxisChooser {
    fn choose_axis(&mut self, bounds: &Aabb) -> Axis;
}

impl<F: FnMut(&Aabb) -> Axis> AxisChooser for F {
    fn choose_axis(&mut self, bounds: &Aabb) -> Axis {
        self(bounds)
    }
}

/// Uniformly random axis.
pub struct RandomAxis {
    rng: StdRng,
}

impl RandomAxis {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl AxisChooser for RandomAxis {
    fn choose_axis(&mut self, _bounds: &Aabb) -> Axis {
        Axis::from_index(self.rng.gen_range(0..3))
    }
}

/// Longest extent of the item's box.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestExtent;

impl AxisChooser for LongestExtent {
    fn choose_axis(&mut self, bounds: &Aabb) -> Axis {
        bounds.longest_axis()
    }
}

/// Fixed, cycling axis sequence. Pins the axis choice for reproducible builds.
#[derive(Debug, Clone)]
pub struct AxisSequence {
    axes: Vec<Axis>,
    next: usize,
}

impl AxisSequence {
    /// Sequence cycling through `axes`. An empty list behaves like `[X]`.
    pub fn new(axes: impl Into<Vec<Axis>>) -> Self {
        let mut axes = axes.into();
        if axes.is_empty() {
            axes.push(Axis::X);
        }
        Self { axes, next: 0 }
    }
}

impl AxisChooser for AxisSequence {
    fn choose_axis(&mut self, _bounds: &Aabb) -> Axis {
        let axis = self.axes[self.next % self.axes.len()];
        self.next += 1;
        axis
    }
}
