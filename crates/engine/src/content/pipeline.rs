use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::AppPaths;

use super::compiler::{compile_content, ContentCompileError, ContentErrorCode, SourceFile};
use super::database::ContentDatabase;

pub const COMMONS_FILE_NAME: &str = "commons.json";

#[derive(Debug, Error)]
pub enum ContentPipelineError {
    #[error("failed to list content directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Compile(#[from] ContentCompileError),
}

/// Reads `commons.json` and every map under `maps/`, then compiles them into
/// one database. Maps are read in file-name order.
pub fn load_content_database(
    app_paths: &AppPaths,
) -> Result<ContentDatabase, ContentPipelineError> {
    let started = Instant::now();
    let commons = read_source(&app_paths.base_content_dir.join(COMMONS_FILE_NAME))?;
    let map_paths = collect_json_files_sorted(&app_paths.maps_dir)?;
    let maps = map_paths
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>, _>>()?;

    let database = compile_content(&commons, &maps)?;
    info!(
        content_dir = %app_paths.base_content_dir.display(),
        map_count = maps.len(),
        common_reaction_count = database.common_reaction_count(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "content_loaded"
    );
    Ok(database)
}

fn read_source(path: &Path) -> Result<SourceFile, ContentCompileError> {
    let text = fs::read_to_string(path).map_err(|source| read_error(path, &source))?;
    Ok(SourceFile::new(path, text))
}

fn read_error(path: &Path, source: &std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content file: {source}"),
        file_path: path.to_path_buf(),
        location: None,
        json_path: None,
    }
}

/// A missing maps directory means no maps.
fn collect_json_files_sorted(dir: &Path) -> Result<Vec<PathBuf>, ContentPipelineError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|source| ContentPipelineError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ContentPipelineError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && is_json_file(&path) {
            files.push(path);
        }
    }
    files.sort_by_key(|path| normalize_file_name(path));
    Ok(files)
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn normalize_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const COMMONS: &str = r#"{
        "hero": {"name": "Hero", "states": [{"id": 1}]},
        "common_reactions": [
            {"id": 1, "name": "nod", "commands": [{"kind": "wait", "ticks": 1}]}
        ]
    }"#;

    fn setup_app_paths(root: &Path) -> AppPaths {
        let base = root.join("assets").join("base");
        let maps = base.join("maps");
        fs::create_dir_all(&maps).expect("maps");
        AppPaths {
            root: root.to_path_buf(),
            base_content_dir: base,
            maps_dir: maps,
        }
    }

    fn write_json(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent");
        }
        fs::write(path, content).expect("write json");
    }

    fn map_json(id: u32, teleport_to: u32) -> String {
        format!(
            r#"{{
                "id": {id}, "name": "Map {id}", "width": 5, "height": 5,
                "hero_start": {{"x": 0, "y": 0}},
                "objects": [{{
                    "id": 1, "name": "Door", "x": 4, "y": 4, "through": true,
                    "states": [{{"id": 1}}],
                    "events": [{{"system": true, "event_id": 0, "reactions": [
                        {{"state": 1, "commands": [
                            {{"kind": "teleport", "map_id": {teleport_to}, "x": 1, "y": 1}}
                        ]}}
                    ]}}]
                }}]
            }}"#
        )
    }

    #[test]
    fn loads_commons_and_maps_that_reference_each_other() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = setup_app_paths(temp.path());
        write_json(&app_paths.base_content_dir.join(COMMONS_FILE_NAME), COMMONS);
        write_json(&app_paths.maps_dir.join("map_0002.json"), &map_json(2, 1));
        write_json(&app_paths.maps_dir.join("map_0001.json"), &map_json(1, 2));
        write_json(&app_paths.maps_dir.join("notes.txt"), "not content");

        let database = load_content_database(&app_paths).expect("load");
        assert_eq!(database.map_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(database.common_reaction_count(), 1);
        assert!(database.common_reaction(1).is_some());
        assert!(database.map(1).expect("map 1").objects[0].model.through);
    }

    #[test]
    fn missing_commons_reports_read_error() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = setup_app_paths(temp.path());

        let error = load_content_database(&app_paths).expect_err("missing commons");
        match error {
            ContentPipelineError::Compile(error) => {
                assert_eq!(error.code, ContentErrorCode::ReadFile);
                assert!(error.file_path.ends_with(COMMONS_FILE_NAME));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_maps_dir_loads_no_maps() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = setup_app_paths(temp.path());
        fs::remove_dir_all(&app_paths.maps_dir).expect("remove maps");
        write_json(&app_paths.base_content_dir.join(COMMONS_FILE_NAME), COMMONS);

        let database = load_content_database(&app_paths).expect("load");
        assert_eq!(database.map_ids().count(), 0);
    }

    #[test]
    fn compile_errors_name_the_map_file() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = setup_app_paths(temp.path());
        write_json(&app_paths.base_content_dir.join(COMMONS_FILE_NAME), COMMONS);
        write_json(&app_paths.maps_dir.join("map_0001.json"), &map_json(1, 9));

        let error = load_content_database(&app_paths).expect_err("unknown map");
        let ContentPipelineError::Compile(error) = error else {
            panic!("expected a compile error");
        };
        assert_eq!(error.code, ContentErrorCode::UnknownMap);
        assert!(error.file_path.ends_with("map_0001.json"));
    }
}
