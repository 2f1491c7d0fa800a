//! COCO dataset assembly, writing and merging.

mod assembler;
pub mod coco;
mod merge;
mod rle;
mod writer;

pub use assembler::{export, export_range, ExportAssembler};
pub use coco::{AnnotationEntry, CategoryEntry, Dataset, DatasetInfo, ImageEntry, RleCounts, Segmentation};
pub use merge::{merge_datasets, MergeSummary};
pub use rle::encode_rle;
pub use writer::{read_dataset, CocoJsonWriter, DatasetWriter};
