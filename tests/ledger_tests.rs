//! Hash Chain Ledger Integration Tests
//!
//! Tests for the ledger across process boundaries (simulated by reopening
//! from the same directory):
//! - Chain continuity over reopen
//! - Tamper detection on the on-disk mirror
//! - Quarantine of unreadable mirrors
//! - Summary aggregation over mixed operation types

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use ledger_hub::ledger::HashChainLedger;
use ledger_hub::types::{LedgerEntry, OperationType, PeerSystem};

#[test]
fn test_chain_survives_reopen_and_keeps_linking() {
    let temp_dir = TempDir::new().unwrap();

    let tail_hash = {
        let ledger = HashChainLedger::open(temp_dir.path(), "ops", "writer_a").unwrap();
        ledger
            .record_monitoring(PeerSystem::KayGee, "latency", "p99_ms", json!(300), None)
            .unwrap();
        ledger
            .record_authority_command(
                PeerSystem::KayGee,
                "throttle",
                "p99 over budget",
                Some(json!({"rate": 0.5})),
                "command",
            )
            .unwrap();
        ledger.tail_hash()
    };

    // A fresh handle on the same directory continues the same chain.
    let reopened = HashChainLedger::open(temp_dir.path(), "ops", "writer_b").unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.tail_hash(), tail_hash);
    assert_eq!(reopened.verify_chain(), (true, 0));

    let third = reopened
        .record_capability_evolution("adaptive_backoff", 0.7, json!({"from": "latency"}), None)
        .unwrap();
    assert_eq!(third.sequence_number, 3);
    assert_eq!(third.previous_hash, tail_hash);
    assert_eq!(third.writer_id, "writer_b");
}

#[test]
fn test_on_disk_tamper_detected_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = {
        let ledger = HashChainLedger::open(temp_dir.path(), "ops", "writer").unwrap();
        for i in 0..4i64 {
            ledger
                .record_monitoring(PeerSystem::CaliXOne, "load", "cpu", json!(i), None)
                .unwrap();
        }
        ledger.path().to_path_buf()
    };

    // Edit entry 2's content directly in the mirror, leaving its hash stale.
    let mirror = fs::read_to_string(&path).unwrap();
    let lines: Vec<String> = mirror
        .lines()
        .map(|line| {
            let mut entry = LedgerEntry::from_json_line(line).unwrap();
            if entry.sequence_number == 2 {
                entry.content.insert("cpu".to_string(), json!(9999));
            }
            entry.to_json_line().unwrap()
        })
        .collect();
    fs::write(&path, lines.join("\n") + "\n").unwrap();

    let reopened = HashChainLedger::open(temp_dir.path(), "ops", "writer").unwrap();
    let (intact, first_bad) = reopened.verify_chain();
    assert!(!intact);
    assert_eq!(first_bad, 2);
}

#[test]
fn test_unreadable_mirror_quarantined_not_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ops.ledger.jsonl");
    fs::write(&path, "garbage that is not a ledger\n").unwrap();

    let ledger = HashChainLedger::open(temp_dir.path(), "ops", "writer").unwrap();
    assert!(ledger.is_empty());

    // The damaged file was moved aside, and its bytes survive for forensics.
    let quarantined: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        .collect();
    assert_eq!(quarantined.len(), 1);
    let preserved = fs::read_to_string(quarantined[0].path()).unwrap();
    assert!(preserved.contains("garbage"));

    // The fresh chain starts at sequence 1 with an empty previous hash.
    let first = ledger
        .record_monitoring(PeerSystem::CaleonGenesis, "uptime", "days", json!(12), None)
        .unwrap();
    assert_eq!(first.sequence_number, 1);
    assert_eq!(first.previous_hash, "");
}

#[test]
fn test_summary_over_mixed_operations() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = HashChainLedger::open(temp_dir.path(), "ops", "writer").unwrap();

    for _ in 0..3 {
        ledger
            .record_monitoring(PeerSystem::KayGee, "latency", "p99_ms", json!(100), None)
            .unwrap();
    }
    ledger
        .record_authority_command(PeerSystem::UcmCoreEcm, "drain", "maintenance", None, "command")
        .unwrap();
    ledger
        .record_capability_evolution("drain_playbook", 0.5, json!({}), None)
        .unwrap();

    let summary = ledger.operational_summary();
    assert_eq!(summary.total_entries, 5);
    assert_eq!(summary.last_sequence, 5);
    assert_eq!(summary.operation_counts.get("monitoring_detected"), Some(&3));
    assert_eq!(summary.operation_counts.get("authority_asserted"), Some(&1));
    assert_eq!(summary.operation_counts.get("capability_evolved"), Some(&1));
    assert_eq!(summary.peer_interactions.get("kay_gee"), Some(&3));
    assert_eq!(summary.peer_interactions.get("ucm_core_ecm"), Some(&1));
}

#[test]
fn test_separate_ledger_ids_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let ops = HashChainLedger::open(temp_dir.path(), "ops", "writer").unwrap();
    let audit = HashChainLedger::open(temp_dir.path(), "audit", "writer").unwrap();

    ops.record_monitoring(PeerSystem::KayGee, "latency", "p99_ms", json!(1), None)
        .unwrap();

    assert_eq!(ops.len(), 1);
    assert!(audit.is_empty());
    assert_ne!(ops.path(), audit.path());

    // Each file reloads into its own chain.
    let ops2 = HashChainLedger::open(temp_dir.path(), "ops", "writer").unwrap();
    let audit2 = HashChainLedger::open(temp_dir.path(), "audit", "writer").unwrap();
    assert_eq!(ops2.len(), 1);
    assert!(audit2.is_empty());
}

#[test]
fn test_mirror_lines_parse_with_expected_fields() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = HashChainLedger::open(temp_dir.path(), "ops", "peer_orchestrator").unwrap();
    ledger
        .record_authority_command(
            PeerSystem::CaliXOne,
            "reroute",
            "link flapping",
            Some(json!({"path": "secondary"})),
            "command",
        )
        .unwrap();

    let mirror = fs::read_to_string(ledger.path()).unwrap();
    let entry = LedgerEntry::from_json_line(mirror.lines().next().unwrap()).unwrap();

    assert_eq!(entry.operation_type, OperationType::AuthorityAsserted);
    assert_eq!(entry.sibling_target, Some(PeerSystem::CaliXOne));
    assert_eq!(entry.writer_id, "peer_orchestrator");
    assert_eq!(entry.assertion_level, "command");
    assert_eq!(entry.entry_hash, entry.compute_hash());
    assert_eq!(entry.content.get("action_taken"), Some(&json!("reroute")));
}
