//! listfeed app - keeps list views in step with a changing record store
//!
//! ```text
//! CreateItemCommand ──insert+commit──▶ RecordStore
//!                                          │ one StoreChange per commit
//!                                          ▼
//!                                   ChangeObserver ──Snapshot──▶ Dynamic cell
//!                                                                    │
//!                      ListView ◀──batch── ListReconciler ◀──apply───┘
//!                                              │
//!                                        CellPresenter
//! ```
//!
//! The observer runs on its own tokio task. The reconciler and its view
//! belong to one owner; other tasks reach it through [`queue::ApplyQueue`].

#![forbid(unsafe_code)]

pub mod command;
pub mod feeder;
pub mod index;
pub mod observer;
pub mod presentation;
pub mod queue;
pub mod reconciler;
pub mod view;

pub use command::CreateItemCommand;
pub use feeder::{PersistentListFeeder, StaticListFeeder};
pub use index::RecordIndex;
pub use observer::{ChangeObserver, ObserverHandle, RecordSection, RecordSnapshot};
pub use presentation::{CellContent, CellPresenter, CellStyle, IntegerCellPresenter, RecordCellPresenter};
pub use queue::{apply_queue, ApplyQueue, ApplySender};
pub use reconciler::{ApplyReport, ListReconciler};
pub use view::{CellMap, ListView, MemoryListView, ViewEvent};
