use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::geometry::Geometry;
use crate::survey::SurveyResult;
use crate::universe::GeometryType;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryInput;
    use serde_json::Value;

    const TWO_UNIVERSES: &str = r#"
[[surfaces]]
id = 1
type = "sphere"
x0 = 0.0
y0 = 0.0
z0 = 0.0
r = 2.0

[[cells]]
id = 1
region = [-1]

[[cells]]
id = 2
region = [1]

[[cells]]
id = 3
universe = 4
region = [-1]

[[universes]]
id = 4
geom_type = "dag"
"#;

    #[test]
    fn universes_file_layout() {
        let input: GeometryInput = toml::from_str(TWO_UNIVERSES).unwrap();
        let geom = Geometry::from_input(input).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");

        let path = write_universes(&geom, &out).unwrap();
        assert_eq!(path, out.join("universes.json"));

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let universes = &value["geometry"]["universes"];
        assert_eq!(universes["universe 0"]["geom_type"], "csg");
        assert_eq!(universes["universe 0"]["cells"], serde_json::json!([1, 2]));
        assert_eq!(universes["universe 4"]["geom_type"], "dag");
        assert_eq!(universes["universe 4"]["cells"], serde_json::json!([3]));
    }

    #[test]
    fn survey_file() {
        let result = SurveyResult {
            samples: 10,
            found: 9,
            lost: 1,
            mismatches: Some(0),
            mean_candidates: 2.5,
            universe_cells: 12,
            accelerated_secs: 0.01,
            linear_secs: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = write_survey(&result, dir.path()).unwrap();
        let value: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["samples"], 10);
        assert_eq!(value["lost"], 1);
        assert_eq!(value["mean_candidates"], 2.5);
        assert!(value["linear_secs"].is_null());
    }
}

/// Universe entry in `universes.json`, keyed by `"universe <id>"`.
#[derive(Debug, Serialize)]
struct UniverseEntry<'a> {
    geom_type: GeometryType,
    cells: &'a [i32],
}

/// Writes the identity and cell membership of every universe to
/// `<directory>/universes.json`.
///
/// Partitioners are not written since they are rebuilt from the cells.
pub fn write_universes(geom: &Geometry, directory: &Path) -> Result<PathBuf> {
    let records = geom.records();
    let universes: BTreeMap<String, UniverseEntry> = records
        .iter()
        .map(|record| {
            (
                format!("universe {}", record.id),
                UniverseEntry {
                    geom_type: record.geom_type,
                    cells: &record.cells,
                },
            )
        })
        .collect();

    let document = json!({ "geometry": { "universes": universes } });
    write_json(&document, directory, "universes.json")
}

/// Writes the survey summary to `<directory>/survey.json`.
pub fn write_survey(result: &SurveyResult, directory: &Path) -> Result<PathBuf> {
    write_json(result, directory, "survey.json")
}

fn write_json<T: Serialize + ?Sized>(value: &T, directory: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(directory)
        .with_context(|| format!("creating output directory {:?}", directory))?;
    let path = directory.join(name);

    let file = File::create(&path).with_context(|| format!("creating {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;

    info!("wrote {:?}", path);
    Ok(path)
}
