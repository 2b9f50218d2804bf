//! Image arithmetic over masked regions
//!
//! Every entry point reads the masked pixels out of the input image(s),
//! runs the element-wise operator on that region and splices the result
//! into a copy of the (left) input. Pixels outside the mask pass through
//! unchanged and the caller's arrays are never modified.

use crate::core::aggregate::{AggregateParams, Aggregator, Statistic};
use crate::core::dq::QualityFlags;
use crate::core::image::ImageCube;
use crate::core::value::{BinaryOp, UnaryOp, Value, ValueKind};
use crate::types::{DqError, DqResult, Mask, Side};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Image operator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOpParams {
    /// Allow per-pixel closures to run on the rayon pool
    pub parallel: bool,
    /// Masked pixel count at which per-pixel closures go parallel
    pub min_parallel_pixels: usize,
}

impl Default for ImageOpParams {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_pixels: 4096,
        }
    }
}

/// Entry points for image arithmetic and region statistics
#[derive(Debug, Clone, Default)]
pub struct ImageOperator {
    params: ImageOpParams,
}

impl ImageOperator {
    pub fn new(params: ImageOpParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(ImageOpParams::default())
    }

    /// Apply a unary operator to the masked pixels.
    pub fn apply_unary(&self, image: &ImageCube, mask: &Mask, op: UnaryOp) -> DqResult<ImageCube> {
        let region = image.extract(mask)?;
        log::info!(
            "Applying {} to {} masked pixels of {:?} image",
            op.name(),
            region.shape()[0],
            image.dims()
        );

        let result = region.unary(op);
        Self::report(&region, &result);
        image.splice(mask, &result)
    }

    /// Combine two images of identical shape over the masked pixels.
    /// Unmasked pixels are taken from `a`.
    pub fn apply_binary(
        &self,
        a: &ImageCube,
        b: &ImageCube,
        mask: &Mask,
        op: BinaryOp,
    ) -> DqResult<ImageCube> {
        if a.dims() != b.dims() {
            return Err(DqError::mismatch(a.n.shape(), b.n.shape()));
        }
        let left = a.extract(mask)?;
        let right = b.extract(mask)?;
        log::info!(
            "Applying image {} image to {} masked pixels of {:?} image",
            op.symbol(),
            left.shape()[0],
            a.dims()
        );

        let result = left.binary(op, &right)?;
        Self::report(&left, &result);
        a.splice(mask, &result)
    }

    /// Combine an image with a constant over the masked pixels.
    ///
    /// `constant` is either a scalar, applied to every band, or a vector
    /// with one element per band. `side` says which operand it is.
    pub fn apply_binary_scalar(
        &self,
        image: &ImageCube,
        constant: &Value,
        mask: &Mask,
        op: BinaryOp,
        side: Side,
    ) -> DqResult<ImageCube> {
        let region = image.extract(mask)?;
        let constant = Self::expand_constant(constant, region.shape())?;
        log::info!(
            "Applying {} with constant on the {} to {} masked pixels",
            op.symbol(),
            side,
            region.shape()[0]
        );

        let result = match side {
            Side::Left => constant.binary(op, &region)?,
            Side::Right => region.binary(op, &constant)?,
        };
        Self::report(&region, &result);
        image.splice(mask, &result)
    }

    /// Apply an arbitrary function to each masked pixel, seen as a vector
    /// over bands. A scalar result is written to every band.
    pub fn map_pixels<F>(&self, image: &ImageCube, mask: &Mask, f: F) -> DqResult<ImageCube>
    where
        F: Fn(&Value) -> DqResult<Value> + Sync + Send,
    {
        image.check_mask(mask)?;
        let pixels = ImageCube::masked_pixels(mask);
        let bands = image.bands();
        let run = |&(r, c): &(usize, usize)| -> DqResult<Value> {
            let px = image
                .pixel(r, c)?
                .ok_or_else(|| DqError::InvalidShape(format!("pixel ({}, {}) out of range", r, c)))?;
            let out = f(&px)?;
            Self::fit_bands(out, bands)
        };

        let results: Vec<Value> = if self.params.parallel
            && cfg!(feature = "parallel")
            && pixels.len() >= self.params.min_parallel_pixels
        {
            use rayon::prelude::*;
            log::debug!("Mapping {} pixels on {} threads", pixels.len(), rayon::current_num_threads());
            pixels.par_iter().map(run).collect::<DqResult<_>>()?
        } else {
            pixels.iter().map(run).collect::<DqResult<_>>()?
        };

        let cells = results.iter().flat_map(|v| v.iter()).collect();
        let region = Value::from_scalars(&[pixels.len(), bands], cells)?;
        image.splice(mask, &region)
    }

    /// Statistic over the masked pixels, reduced per the given parameters.
    pub fn aggregate(
        &self,
        image: &ImageCube,
        mask: &Mask,
        stat: Statistic,
        params: AggregateParams,
    ) -> DqResult<Value> {
        Aggregator::new(params).reduce_image(stat, image, mask)
    }

    /// Broadcast a scalar or per-band constant over an (npix x bands) region.
    fn expand_constant(constant: &Value, region_shape: &[usize]) -> DqResult<Value> {
        let bands = region_shape[1];
        match constant.kind() {
            ValueKind::Scalar => Ok(constant.clone()),
            ValueKind::Vector if constant.len() == bands => {
                let dim = IxDyn(region_shape);
                let broadcast = |a: &ArrayD<_>| {
                    a.broadcast(dim.clone())
                        .map(|view| view.to_owned())
                        .ok_or_else(|| DqError::mismatch(a.shape(), region_shape))
                };
                let n = broadcast(constant.n())?;
                let u = broadcast(constant.u())?;
                let dq: ArrayD<QualityFlags> = constant
                    .dq()
                    .broadcast(dim.clone())
                    .map(|view| view.to_owned())
                    .ok_or_else(|| DqError::mismatch(constant.shape(), region_shape))?;
                Value::from_parts(n, Some(u), Some(dq))
            }
            _ => Err(DqError::mismatch(constant.shape(), &[bands])),
        }
    }

    /// Per-pixel results must be scalar or have one element per band.
    fn fit_bands(value: Value, bands: usize) -> DqResult<Value> {
        match value.kind() {
            ValueKind::Scalar => {
                let v = value.split();
                Value::from_scalars(&[bands], vec![v[0]; bands])
            }
            ValueKind::Vector if value.len() == bands => Ok(value),
            _ => Err(DqError::InvalidShape(format!(
                "per-pixel result has shape {:?}, expected {} bands",
                value.shape(),
                bands
            ))),
        }
    }

    fn report(input: &Value, output: &Value) {
        let raised = QualityFlags::DIVIDE_BY_ZERO | QualityFlags::UNDEFINED | QualityFlags::COMPLEX_RESULT;
        let before = input.dq().iter().filter(|d| d.intersects(raised)).count();
        let after = output.dq().iter().filter(|d| d.intersects(raised)).count();
        if after > before {
            log::debug!("{} elements newly flagged by operation", after - before);
        }
    }
}
