//! Masked multi-band image planes
//!
//! An [`ImageCube`] is the (nominal, uncertainty, flags) triple of
//! rows x cols x bands arrays handed over by the image layer. Operations
//! read the masked pixels out as an (npix x bands) [`Value`], work on that
//! and splice the result back into a copy; unmasked pixels are untouched.

use crate::core::dq::QualityFlags;
use crate::core::value::Value;
use crate::types::{BandArray, DqArray, DqError, DqResult, Mask, Nominal};
use ndarray::{s, Array2, Axis, Ix2};

/// Nominal, uncertainty and flag planes of one image (rows x cols x bands)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCube {
    pub n: BandArray,
    pub u: BandArray,
    pub dq: DqArray,
}

impl ImageCube {
    pub fn new(n: BandArray, u: BandArray, dq: DqArray) -> DqResult<Self> {
        if n.shape() != u.shape() {
            return Err(DqError::mismatch(n.shape(), u.shape()));
        }
        if n.shape() != dq.shape() {
            return Err(DqError::mismatch(n.shape(), dq.shape()));
        }
        Ok(Self { n, u, dq })
    }

    /// Single-band image from 2D planes
    pub fn from_band(
        n: Array2<Nominal>,
        u: Array2<Nominal>,
        dq: Array2<u16>,
    ) -> DqResult<Self> {
        Self::new(
            n.insert_axis(Axis(2)),
            u.insert_axis(Axis(2)),
            dq.insert_axis(Axis(2)),
        )
    }

    /// Nominal-only image: zero uncertainty, NOUNCERTAINTY everywhere
    pub fn nominal_only(n: BandArray) -> Self {
        let u = BandArray::zeros(n.raw_dim());
        let dq = DqArray::from_elem(n.raw_dim(), QualityFlags::NOUNCERTAINTY.bits());
        Self { n, u, dq }
    }

    /// (rows, cols, bands)
    pub fn dims(&self) -> (usize, usize, usize) {
        self.n.dim()
    }

    pub fn bands(&self) -> usize {
        self.n.dim().2
    }

    pub fn full_mask(&self) -> Mask {
        let (rows, cols, _) = self.dims();
        Mask::from_elem((rows, cols), true)
    }

    pub fn check_mask(&self, mask: &Mask) -> DqResult<()> {
        let (rows, cols, _) = self.dims();
        if mask.dim() != (rows, cols) {
            return Err(DqError::InvalidShape(format!(
                "mask is {:?}, image is {}x{}",
                mask.shape(),
                rows,
                cols
            )));
        }
        Ok(())
    }

    /// Pixel as a vector over bands, `None` outside the image
    pub fn pixel(&self, row: usize, col: usize) -> DqResult<Option<Value>> {
        let (rows, cols, _) = self.dims();
        if row >= rows || col >= cols {
            return Ok(None);
        }
        let n = self.n.slice(s![row, col, ..]).to_owned().into_dyn();
        let u = self.u.slice(s![row, col, ..]).to_owned().into_dyn();
        let dq = self
            .dq
            .slice(s![row, col, ..])
            .mapv(QualityFlags::from_raw)
            .into_dyn();
        Value::from_parts(n, Some(u), Some(dq)).map(Some)
    }

    /// Masked pixel coordinates in row-major order
    pub fn masked_pixels(mask: &Mask) -> Vec<(usize, usize)> {
        mask.indexed_iter()
            .filter(|&(_, &m)| m)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Masked pixels as an (npix x bands) value, rows in row-major pixel order.
    pub fn extract(&self, mask: &Mask) -> DqResult<Value> {
        self.check_mask(mask)?;
        let pixels = Self::masked_pixels(mask);
        let bands = self.bands();

        let n = Array2::from_shape_fn((pixels.len(), bands), |(k, b)| {
            let (r, c) = pixels[k];
            self.n[[r, c, b]]
        });
        let u = Array2::from_shape_fn((pixels.len(), bands), |(k, b)| {
            let (r, c) = pixels[k];
            self.u[[r, c, b]]
        });
        let dq = Array2::from_shape_fn((pixels.len(), bands), |(k, b)| {
            let (r, c) = pixels[k];
            QualityFlags::from_raw(self.dq[[r, c, b]])
        });

        Value::from_parts(n.into_dyn(), Some(u.into_dyn()), Some(dq.into_dyn()))
    }

    /// Copy of this image with the masked pixels replaced by `value`,
    /// which must be laid out as [`ImageCube::extract`] returns.
    pub fn splice(&self, mask: &Mask, value: &Value) -> DqResult<ImageCube> {
        self.check_mask(mask)?;
        let pixels = Self::masked_pixels(mask);
        let bands = self.bands();
        let expected = [pixels.len(), bands];
        if value.shape() != &expected[..] {
            return Err(DqError::mismatch(&expected, value.shape()));
        }

        let n = value.n().view().into_dimensionality::<Ix2>()?;
        let u = value.u().view().into_dimensionality::<Ix2>()?;
        let dq = value.dq().view().into_dimensionality::<Ix2>()?;

        let mut out = self.clone();
        for (k, &(r, c)) in pixels.iter().enumerate() {
            for b in 0..bands {
                out.n[[r, c, b]] = n[[k, b]];
                out.u[[r, c, b]] = u[[k, b]];
                out.dq[[r, c, b]] = dq[[k, b]].bits();
            }
        }
        Ok(out)
    }

    /// Count of masked pixel-bands carrying any of `flags`
    pub fn count_flagged(&self, mask: &Mask, flags: QualityFlags) -> usize {
        let bits = flags.bits();
        self.dq
            .indexed_iter()
            .filter(|&((r, c, _), &d)| d & bits != 0 && mask.get((r, c)).copied().unwrap_or(false))
            .count()
    }
}
