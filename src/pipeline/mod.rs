//! Pipeline stages for the client-side conversion workflow.
//!
//! Each submodule implements exactly one step so it can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//!                       ┌─▶ layout ──▶ merge ──┐
//! input ──▶ classify ───┤                      ├──▶ save
//! (paths)   (partition) └─▶ upload ────────────┘   (local files)
//!                           (relay)
//! ```
//!
//! 1. [`input`]:    read user-selected paths into [`input::SelectedFile`]s
//! 2. [`classify`]: split the selection into images, office documents and
//!    unsupported files, keeping selection order
//! 3. [`layout`]:   fit each image into the page's printable area
//! 4. [`merge`]:    append one page per image to a single PDF; CPU-bound,
//!    so the workflow runs it in `spawn_blocking`
//! 5. [`upload`]:   post each office document to the relay; the only stage
//!    with network I/O
//! 6. [`save`]:     atomically write the merged PDF and each converted PDF

pub mod classify;
pub mod input;
pub mod layout;
pub mod merge;
pub mod save;
pub mod upload;
