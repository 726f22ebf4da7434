pub mod assembly;
pub mod editor;
pub mod service;

pub use assembly::{assemble, build_document, AssembledLine, ProformaDocument};
pub use editor::{reduce, DraftLine, EditorAction};
pub use service::{
    create_quotation, delete_quotation, recalculate_packing, update_quotation, PackingReport,
};
