//! JSON input files.

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use rosterline_core::{PlayerId, TeamId};
use rosterline_log::RawRecord;
use rosterline_replay::ReplayConfig;
use rosterline_storage::RosterState;
use rosterline_validate::GroundTruthSnapshot;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let bytes = std::fs::read(path).wrap_err_with(|| format!("failed to read {} file {}", what, path.display()))?;
    serde_json::from_slice(&bytes).wrap_err_with(|| format!("failed to parse {} file {}", what, path.display()))
}

/// Raw transaction records, a JSON array tagged by `source`
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    read_json(path, "events")
}

/// Preseason rosters, a JSON object of team id to player ids
pub fn load_seed(path: &Path) -> Result<BTreeMap<TeamId, RosterState>> {
    let raw: BTreeMap<TeamId, Vec<PlayerId>> = read_json(path, "seed")?;
    Ok(raw
        .into_iter()
        .map(|(team, players)| (team, players.into_iter().collect()))
        .collect())
}

/// Replay configuration; missing fields take defaults
pub fn load_config(path: Option<&Path>) -> Result<ReplayConfig> {
    match path {
        Some(path) => read_json(path, "config"),
        None => Ok(ReplayConfig::default()),
    }
}

/// Ground-truth captures, a JSON array
pub fn load_truths(path: &Path) -> Result<Vec<GroundTruthSnapshot>> {
    read_json(path, "ground truth")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_records_both_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "events.json",
            r#"[
                {"source": "canonical", "event_id": "c1", "effective_date": "2025-06-02",
                 "team_id": 1, "player_id": 10, "action": "ADD"},
                {"source": "activity", "id": "m1", "date": 1749056400000, "type": "ROSTER_DROP",
                 "targetId": 10, "from": 1, "to": -1}
            ]"#,
        );
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[1], RawRecord::Activity(_)));
    }

    #[test]
    fn test_load_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "seed.json", r#"{"1": [10, 11], "2": []}"#);
        let seed = load_seed(&path).unwrap();
        assert_eq!(seed[&TeamId::new(1)].len(), 2);
        assert!(seed[&TeamId::new(2)].is_empty());
    }

    #[test]
    fn test_load_config_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.json", r#"{"season_start": "2025-03-27"}"#);
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.season_start.unwrap().to_string(), "2025-03-27");
        assert!(config.parallel_teams);
        assert_eq!(load_config(None).unwrap(), ReplayConfig::default());
    }

    #[test]
    fn test_load_truths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "truth.json", r#"[{"team_id": 2, "date": "2025-06-14", "players": [3, 1]}]"#);
        let truths = load_truths(&path).unwrap();
        assert_eq!(truths[0].players.len(), 2);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_records(&dir.path().join("absent.json")).is_err());
    }
}
