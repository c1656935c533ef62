mod compiler;
mod database;
mod pipeline;
mod types;

pub use compiler::{
    compile_content, ContentCompileError, ContentErrorCode, SourceFile, SourceLocation,
};
pub use database::{ContentDatabase, MapDef, PlacedObject};
pub use pipeline::{load_content_database, ContentPipelineError, COMMONS_FILE_NAME};
pub use types::{
    CommonReactionDef, CommonsFile, EventFileDef, MapFile, ObjectFileDef, PositionDef,
    ReactionFileDef, ScriptEntry, StateFileDef,
};
