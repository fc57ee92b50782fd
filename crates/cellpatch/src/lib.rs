//! # cellpatch
//!
//! Patch cells of one worksheet inside an existing XLSX (Office Open XML)
//! workbook, leaving every other part of the archive as it was.
//!
//! Each record maps column letters to values and is written into the next
//! data row of the sheet:
//!
//! ```no_run
//! use cellpatch::{update_with_options, Record, UpdateOptions};
//!
//! let records: Vec<Record> = serde_json::from_str(
//!     r#"[{"J": "Mumbai", "K": "India", "L": 76.5, "M": 88.3}]"#,
//! )?;
//!
//! let report = update_with_options(
//!     "test.xlsx",
//!     "updated_test.xlsx",
//!     &records,
//!     "Data Sheet",
//!     &UpdateOptions::default(),
//! )?;
//! println!("updated rows {:?}", report.updated_rows);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod address;
pub mod archive;
pub mod error;
pub mod inspect;
pub mod patcher;
pub mod shared_strings;
pub mod update;
pub mod value;
pub mod workbook;

pub use address::CellRef;
pub use archive::ExtractedArchive;
pub use error::{PatchError, PatchResult};
pub use inspect::{read_manifest, read_sheet_cells, CellRecord};
pub use patcher::{patch_worksheet, PatchOutcome};
pub use shared_strings::SharedStrings;
pub use update::{update, update_with_options, UpdateOptions, UpdateReport};
pub use value::{CellValue, Record};
pub use workbook::{Manifest, SheetEntry, SheetLookup};
