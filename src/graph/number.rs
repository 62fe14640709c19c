use crate::graph::{Geometry, Image};
use std::sync::Arc;

/// Region reducers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    Min,
    Max,
}

impl Reducer {
    /// Reduce a set of valid pixel values, `None` if there are none
    pub fn reduce(&self, values: impl Iterator<Item = f64>) -> Option<f64> {
        let mut count = 0usize;
        let mut acc = match self {
            Reducer::Mean => 0.0,
            Reducer::Min => f64::INFINITY,
            Reducer::Max => f64::NEG_INFINITY,
        };
        for v in values {
            count += 1;
            acc = match self {
                Reducer::Mean => acc + v,
                Reducer::Min => acc.min(v),
                Reducer::Max => acc.max(v),
            };
        }
        if count == 0 {
            return None;
        }
        match self {
            Reducer::Mean => Some(acc / count as f64),
            Reducer::Min | Reducer::Max => Some(acc),
        }
    }
}

/// Expression node behind a [`Number`]
#[derive(Debug)]
pub enum NumberNode {
    Constant(f64),
    ReduceRegion {
        image: Image,
        reducer: Reducer,
        geometry: Geometry,
        /// Nominal pixel size of the reduction in meters
        scale: f64,
        band: String,
    },
}

/// Lazy scalar
#[derive(Debug, Clone)]
pub struct Number(Arc<NumberNode>);

impl Number {
    pub fn constant(value: f64) -> Self {
        Number(Arc::new(NumberNode::Constant(value)))
    }

    pub fn node(&self) -> &NumberNode {
        &self.0
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::constant(value)
    }
}

/// Pending `reduce_region` result, keyed by band name
#[derive(Debug, Clone)]
pub struct RegionReduction {
    image: Image,
    reducer: Reducer,
    geometry: Geometry,
    scale: f64,
}

impl RegionReduction {
    pub(crate) fn new(image: Image, reducer: Reducer, geometry: Geometry, scale: f64) -> Self {
        Self {
            image,
            reducer,
            geometry,
            scale,
        }
    }

    /// Reduced value of one band
    pub fn get(&self, band: impl Into<String>) -> Number {
        Number(Arc::new(NumberNode::ReduceRegion {
            image: self.image.clone(),
            reducer: self.reducer,
            geometry: self.geometry.clone(),
            scale: self.scale,
            band: band.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducers() {
        let values = [1.0, 2.0, 6.0];
        assert_eq!(Reducer::Mean.reduce(values.iter().copied()), Some(3.0));
        assert_eq!(Reducer::Min.reduce(values.iter().copied()), Some(1.0));
        assert_eq!(Reducer::Max.reduce(values.iter().copied()), Some(6.0));
        assert_eq!(Reducer::Mean.reduce(std::iter::empty()), None);
    }
}
