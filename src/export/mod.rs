pub mod plan;
pub mod writer;

pub use plan::{file_name, plan_outputs, OutputConditions, OutputKind, PlannedOutput};
pub use writer::{build_table, export_outputs, write_table, ExportContext, ExportedFile, Table};
