use super::coco::{RleCounts, Segmentation};
use ndarray::Array2;

/// Encode a mask as uncompressed COCO RLE.
///
/// Pixels are read column by column (COCO's Fortran order) and the first run
/// always counts background, so it is zero when the top-left pixel is set.
pub fn encode_rle(bitmap: &Array2<bool>) -> Segmentation {
    let (height, width) = bitmap.dim();
    let mut counts = Vec::new();
    let mut current = false;
    let mut run: u64 = 0;

    for &on in bitmap.t().iter() {
        if on != current {
            counts.push(run);
            run = 0;
            current = on;
        }
        run += 1;
    }
    counts.push(run);

    Segmentation::Rle {
        size: [height as u32, width as u32],
        counts: RleCounts::Uncompressed(counts),
    }
}
