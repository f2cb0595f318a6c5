//! Binary checkpoint save/load.
//!
//! Little-endian, version-gated layout:
//!
//! ```text
//! u32  version (= 4)
//! i32  completed_iterations
//! u64  node_count
//! per node:
//!   u64    key_len, then key bytes (UTF-8)
//!   u64    action_count = k
//!   k ×    (i32 action_kind, f64 value, i32 unit)
//!   f64[k] regret_sum
//!   f64[k] strategy_sum
//!   i32    visit_count
//! i64  total_nodes_created
//! ```
//!
//! Saves go through a temporary file plus an atomic rename so a crash
//! mid-write leaves the previous checkpoint intact. Regret and strategy
//! values round-trip bitwise.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::info;

use crate::abstraction::{ActionSpec, SizingUnit};
use crate::error::SolverError;
use crate::game::ActionKind;
use crate::node::{Node, NodeTable};

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 4;

/// Upper bound on a stored key length; anything larger means corruption.
const MAX_KEY_LEN: u64 = 4096;

/// Upper bound on per-node action counts; anything larger means corruption.
const MAX_ACTION_COUNT: u64 = 64;

/// Write the full node table to `path`.
///
/// # Errors
/// I/O failures. The caller decides whether a failed periodic save is fatal
/// (it is not, during training).
pub fn save(path: &Path, table: &NodeTable, completed_iterations: i32) -> Result<(), SolverError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_u32::<LittleEndian>(CHECKPOINT_VERSION)?;
    writer.write_i32::<LittleEndian>(completed_iterations)?;

    let snapshot = table.snapshot();
    writer.write_u64::<LittleEndian>(snapshot.len() as u64)?;

    for (key, node) in &snapshot {
        writer.write_u64::<LittleEndian>(key.len() as u64)?;
        writer.write_all(key.as_bytes())?;

        let actions = node.legal_actions();
        writer.write_u64::<LittleEndian>(actions.len() as u64)?;
        for spec in actions {
            writer.write_i32::<LittleEndian>(spec.kind.as_i32())?;
            writer.write_f64::<LittleEndian>(spec.value)?;
            writer.write_i32::<LittleEndian>(spec.unit.as_i32())?;
        }

        let values = node.lock_values();
        for &regret in &values.regret_sum {
            writer.write_f64::<LittleEndian>(regret)?;
        }
        for &strategy in &values.strategy_sum {
            writer.write_f64::<LittleEndian>(strategy)?;
        }
        drop(values);

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let visits = node.visit_count().min(i64::from(i32::MAX) as u64) as i32;
        writer.write_i32::<LittleEndian>(visits)?;
    }

    #[allow(clippy::cast_possible_wrap)]
    writer.write_i64::<LittleEndian>(table.total_created() as i64)?;
    writer.flush()?;
    Ok(())
}

/// Save to `<path><tmp_suffix>`, then atomically rename over `path`.
///
/// # Errors
/// I/O failures; the temporary file is removed on a failed write so it
/// cannot be mistaken for a good checkpoint.
pub fn save_atomic(
    path: &Path,
    tmp_suffix: &str,
    table: &NodeTable,
    completed_iterations: i32,
) -> Result<(), SolverError> {
    let tmp = suffixed_path(path, tmp_suffix);
    if let Err(error) = save(&tmp, table, completed_iterations) {
        let _ = fs::remove_file(&tmp);
        return Err(error);
    }
    fs::rename(&tmp, path)?;
    info!("checkpoint saved to {}", path.display());
    Ok(())
}

fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Result of a successful checkpoint load.
#[derive(Debug, Clone, Copy)]
pub struct LoadedCheckpoint {
    pub completed_iterations: i32,
    pub node_count: u64,
}

/// Replace the table's contents with the checkpoint at `path`.
///
/// The table is only touched after the whole file parses, so a corrupt
/// checkpoint leaves the in-memory state untouched.
///
/// # Errors
/// Version mismatch, truncation, or corrupt field values.
pub fn load(path: &Path, table: &NodeTable) -> Result<LoadedCheckpoint, SolverError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let version = reader.read_u32::<LittleEndian>()?;
    if version != CHECKPOINT_VERSION {
        return Err(SolverError::CheckpointVersion {
            expected: CHECKPOINT_VERSION,
            actual: version,
        });
    }

    let completed_iterations = reader.read_i32::<LittleEndian>()?;
    if completed_iterations < 0 {
        return Err(SolverError::Checkpoint(format!(
            "negative completed_iterations: {completed_iterations}"
        )));
    }

    let node_count = reader.read_u64::<LittleEndian>()?;
    let mut loaded: Vec<(String, Node)> = Vec::new();

    for _ in 0..node_count {
        let key_len = reader.read_u64::<LittleEndian>()?;
        if key_len > MAX_KEY_LEN {
            return Err(SolverError::Checkpoint(format!(
                "implausible key length {key_len}"
            )));
        }
        let mut key_bytes = vec![0_u8; usize::try_from(key_len).expect("bounded above")];
        reader.read_exact(&mut key_bytes)?;
        let key = String::from_utf8(key_bytes)
            .map_err(|_| SolverError::Checkpoint("key is not valid UTF-8".into()))?;

        let action_count = reader.read_u64::<LittleEndian>()?;
        if action_count > MAX_ACTION_COUNT {
            return Err(SolverError::Checkpoint(format!(
                "implausible action count {action_count} for key {key}"
            )));
        }
        let k = usize::try_from(action_count).expect("bounded above");

        let mut actions = Vec::with_capacity(k);
        for _ in 0..k {
            let kind_code = reader.read_i32::<LittleEndian>()?;
            let value = reader.read_f64::<LittleEndian>()?;
            let unit_code = reader.read_i32::<LittleEndian>()?;
            let kind = ActionKind::from_i32(kind_code).ok_or_else(|| {
                SolverError::Checkpoint(format!("unknown action kind {kind_code}"))
            })?;
            let unit = SizingUnit::from_i32(unit_code).ok_or_else(|| {
                SolverError::Checkpoint(format!("unknown sizing unit {unit_code}"))
            })?;
            actions.push(ActionSpec { kind, value, unit });
        }

        let mut regret_sum = vec![0.0_f64; k];
        for slot in &mut regret_sum {
            *slot = reader.read_f64::<LittleEndian>()?;
        }
        let mut strategy_sum = vec![0.0_f64; k];
        for slot in &mut strategy_sum {
            *slot = reader.read_f64::<LittleEndian>()?;
        }

        let visits = reader.read_i32::<LittleEndian>()?;
        let visits = u64::try_from(visits.max(0)).expect("clamped non-negative");

        loaded.push((key, Node::from_saved(actions, regret_sum, strategy_sum, visits)));
    }

    let total_created = reader.read_i64::<LittleEndian>()?;
    #[allow(clippy::cast_sign_loss)]
    let total_created = total_created.max(0) as u64;
    if total_created != node_count {
        // Nodes are never deallocated during training, so these can only
        // disagree if the file is corrupt.
        return Err(SolverError::Checkpoint(format!(
            "total_nodes_created ({total_created}) disagrees with node count ({node_count})"
        )));
    }

    table.clear();
    for (key, node) in loaded {
        table.insert(key, node);
    }
    table.set_total_created(total_created);

    info!(
        "checkpoint loaded from {}: {} iterations, {} nodes",
        path.display(),
        completed_iterations,
        node_count
    );
    Ok(LoadedCheckpoint {
        completed_iterations,
        node_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_table() -> NodeTable {
        let table = NodeTable::new();
        let node = table.get_or_create("P0:KsAs|0|0----------|s/b/", || {
            Node::new(vec![
                ActionSpec::call(),
                ActionSpec::raise(3.0, SizingUnit::BigBlinds),
                ActionSpec::raise(4.0, SizingUnit::BigBlinds),
            ])
        });
        {
            let mut values = node.lock_values();
            values.regret_sum[0] = 0.123_456_789_012_345;
            values.regret_sum[1] = -7.25;
            values.regret_sum[2] = 1e-300;
            values.strategy_sum[0] = 42.0;
            values.strategy_sum[2] = std::f64::consts::PI;
        }
        node.record_visit();
        node.record_visit();
        table.get_or_create("P1:QdQh|0|0----------|s/b/r6/", || {
            Node::new(vec![ActionSpec::fold(), ActionSpec::all_in()])
        });
        table
    }

    #[test]
    fn roundtrip_is_bitwise_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("solver.ckpt");
        let table = sample_table();

        save(&path, &table, 123).unwrap();

        let restored = NodeTable::new();
        let loaded = load(&path, &restored).unwrap();
        assert_eq!(loaded.completed_iterations, 123);
        assert_eq!(restored.len(), table.len());
        assert_eq!(restored.total_created(), table.total_created());

        for (key, original) in table.snapshot() {
            let copy = restored.get(&key).expect("key survives the round trip");
            assert_eq!(copy.legal_actions(), original.legal_actions());
            assert_eq!(copy.visit_count(), original.visit_count());
            let original_values = original.lock_values();
            let copy_values = copy.lock_values();
            for (a, b) in original_values
                .regret_sum
                .iter()
                .zip(copy_values.regret_sum.iter())
            {
                assert_eq!(a.to_bits(), b.to_bits(), "regret must round-trip bitwise");
            }
            for (a, b) in original_values
                .strategy_sum
                .iter()
                .zip(copy_values.strategy_sum.iter())
            {
                assert_eq!(a.to_bits(), b.to_bits(), "strategy must round-trip bitwise");
            }
        }
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad-version.ckpt");
        {
            let mut writer = BufWriter::new(File::create(&path).unwrap());
            writer.write_u32::<LittleEndian>(99).unwrap();
            writer.write_i32::<LittleEndian>(0).unwrap();
            writer.write_u64::<LittleEndian>(0).unwrap();
            writer.write_i64::<LittleEndian>(0).unwrap();
        }
        let table = NodeTable::new();
        assert!(matches!(
            load(&path, &table),
            Err(SolverError::CheckpointVersion { expected: 4, actual: 99 })
        ));
    }

    #[test]
    fn truncated_file_is_rejected_and_table_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncated.ckpt");
        let table = sample_table();
        save(&path, &table, 7).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let restored = NodeTable::new();
        restored.get_or_create("sentinel", || Node::new(vec![ActionSpec::fold()]));
        assert!(load(&path, &restored).is_err());
        assert!(
            restored.get("sentinel").is_some(),
            "a failed load must leave the table as it was"
        );
    }

    #[test]
    fn corrupt_action_kind_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad-kind.ckpt");
        {
            let mut writer = BufWriter::new(File::create(&path).unwrap());
            writer.write_u32::<LittleEndian>(CHECKPOINT_VERSION).unwrap();
            writer.write_i32::<LittleEndian>(1).unwrap();
            writer.write_u64::<LittleEndian>(1).unwrap();
            writer.write_u64::<LittleEndian>(1).unwrap();
            writer.write_all(b"k").unwrap();
            writer.write_u64::<LittleEndian>(1).unwrap();
            writer.write_i32::<LittleEndian>(42).unwrap(); // bogus kind
            writer.write_f64::<LittleEndian>(0.0).unwrap();
            writer.write_i32::<LittleEndian>(0).unwrap();
        }
        let table = NodeTable::new();
        assert!(matches!(
            load(&path, &table),
            Err(SolverError::Checkpoint(_))
        ));
    }

    #[test]
    fn save_atomic_replaces_previous_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("solver.ckpt");
        let table = sample_table();

        save_atomic(&path, ".tmp", &table, 10).unwrap();
        save_atomic(&path, ".tmp", &table, 20).unwrap();

        let restored = NodeTable::new();
        let loaded = load(&path, &restored).unwrap();
        assert_eq!(loaded.completed_iterations, 20);
        assert!(!suffixed_path(&path, ".tmp").exists());
    }

    #[test]
    fn visit_counts_saturate_at_i32_max() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saturate.ckpt");
        let table = NodeTable::new();
        let node = table.get_or_create("k", || Node::new(vec![ActionSpec::fold()]));
        for _ in 0..3 {
            node.record_visit();
        }
        save(&path, &table, 1).unwrap();
        let restored = NodeTable::new();
        load(&path, &restored).unwrap();
        assert_eq!(restored.get("k").unwrap().visit_count(), 3);
    }
}
