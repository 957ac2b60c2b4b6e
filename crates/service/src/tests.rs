use camino::Utf8PathBuf;
use merklesync_merkle::{internal_hash, leaf_hash, MerkleError};
use tempfile::tempdir;

use super::*;

fn block(id: &str, payload: &str) -> DataBlock {
    DataBlock::new(id, payload.as_bytes().to_vec())
}

fn service() -> MerkleService {
    MerkleService::new(ServiceConfig::default())
}

#[test]
fn test_empty_service_has_no_root() {
    let service = service();
    let info = service.root(None);

    assert_eq!(info.root_hash, None);
    assert_eq!(info.leaf_count, 0);
    assert_eq!(info.block_count, 0);
    assert_eq!(info.generation, 0);
}

#[test]
fn test_submit_returns_receipt_for_new_root() {
    let service = service();

    let first = service.submit(block("1", "data1")).unwrap();
    assert_eq!(first.leaf_hash, leaf_hash(b"data1"));
    assert_eq!(first.root_hash, leaf_hash(b"data1"));
    assert_eq!(first.leaf_count, 1);

    let second = service.submit(block("2", "data2")).unwrap();
    assert_eq!(
        second.root_hash,
        internal_hash(&leaf_hash(b"data1"), &leaf_hash(b"data2"))
    );
    assert_eq!(second.leaf_count, 2);
    assert_eq!(service.root(None).generation, 2);
}

#[test]
fn test_duplicate_block_is_rejected() {
    let service = service();
    let _receipt = service.submit(block("1", "data1")).unwrap();

    let err = service.submit(block("1", "other")).unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateBlock(id) if id.as_str() == "1"));
    assert_eq!(service.root(None).leaf_count, 1);
}

#[test]
fn test_empty_block_id_is_rejected() {
    let service = service();

    let err = service.submit(block("", "data")).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidBlockId(_)));

    let err = service
        .submit_batch(vec![block("1", "a"), block("", "b")])
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidBlockId(_)));

    assert_eq!(service.root(None).leaf_count, 0);
    assert_eq!(service.root(None).generation, 0);
}

#[test]
fn test_batch_is_all_or_nothing() {
    let service = service();
    let _receipt = service.submit(block("1", "data1")).unwrap();

    let err = service
        .submit_batch(vec![block("2", "data2"), block("1", "again")])
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateBlock(_)));

    let err = service
        .submit_batch(vec![block("3", "x"), block("3", "y")])
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateBlock(_)));

    assert_eq!(service.root(None).leaf_count, 1);

    let receipt = service
        .submit_batch(vec![block("2", "data2"), block("3", "data3")])
        .unwrap();
    assert_eq!(receipt.accepted, 2);
    assert_eq!(receipt.leaf_count, 3);
    assert_eq!(service.root(None).generation, 2);
}

#[test]
fn test_root_counts_blocks_per_table() {
    let service = service();
    let _receipt = service
        .submit_batch(vec![
            block("1", "a").with_table("orders"),
            block("2", "b").with_table("users"),
            block("3", "c").with_table("orders"),
        ])
        .unwrap();

    assert_eq!(service.root(Some("orders")).block_count, 2);
    assert_eq!(service.root(Some("users")).block_count, 1);
    assert_eq!(service.root(Some("missing")).block_count, 0);
    assert_eq!(service.root(None).block_count, 3);
    assert_eq!(service.root(Some("orders")).leaf_count, 3);
}

#[test]
fn test_empty_payload_is_filled_from_metadata() {
    let service = service();
    let receipt = service
        .submit(DataBlock::new("1", Vec::new()).with_metadata("op", "insert"))
        .unwrap();

    assert_eq!(receipt.leaf_hash, leaf_hash(br#"{"op":"insert"}"#));
}

#[test]
fn test_proof_round_trip_through_service() {
    let service = service();
    let _receipt = service
        .submit_batch(vec![
            block("1", "data1"),
            block("2", "data2"),
            block("3", "data3"),
            block("4", "data4"),
        ])
        .unwrap();

    let proof = service.generate_proof(["2", "3"]).unwrap();
    let root = service.root(None).root_hash.unwrap();
    let leaves = [
        (BlockId::from("2"), b"data2".to_vec()),
        (BlockId::from("3"), b"data3".to_vec()),
    ];

    assert!(MerkleService::verify_proof(&root, &leaves, &proof).unwrap());

    let bundle = service.prove_bundle(["4"]).unwrap();
    assert_eq!(bundle.root_hash, root);
    assert!(bundle.verify().unwrap());
}

#[test]
fn test_proof_request_limit() {
    let service = MerkleService::new(ServiceConfig::new(2));
    let _receipt = service
        .submit_batch(vec![block("1", "a"), block("2", "b"), block("3", "c")])
        .unwrap();

    let err = service.generate_proof(["1", "2", "3"]).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ProofRequestTooLarge {
            requested: 3,
            limit: 2
        }
    ));

    let _proof = service.generate_proof(["1", "3"]).unwrap();
}

#[test]
fn test_proof_errors_surface_from_engine() {
    let service = service();
    assert!(matches!(
        service.generate_proof(["1"]),
        Err(ServiceError::Merkle(MerkleError::EmptyTree))
    ));

    let _receipt = service.submit(block("1", "a")).unwrap();
    assert!(matches!(
        service.generate_proof(["nope"]),
        Err(ServiceError::Merkle(MerkleError::NotFound(_)))
    ));
}

#[test]
fn test_snapshot_outlives_later_submissions() {
    let service = service();
    let _receipt = service.submit(block("1", "a")).unwrap();

    let before = service.snapshot();
    let _receipt = service.submit(block("2", "b")).unwrap();

    assert_eq!(before.tree().leaf_count(), 1);
    assert_eq!(service.snapshot().tree().leaf_count(), 2);
}

#[test]
fn test_diff_against_remote_tree() {
    let service = service();
    let _receipt = service
        .submit_batch(vec![block("1", "a"), block("2", "b")])
        .unwrap();

    let same = MerkleTree::from_blocks(&[block("1", "a"), block("2", "b")]);
    assert!(service.diff(&same).is_empty());

    let changed = MerkleTree::from_blocks(&[block("1", "a"), block("2", "B")]);
    let result = service.diff(&changed);
    assert_eq!(result.len(), 2);
    assert_eq!(result.entries()[0].position, 1);
}

#[test]
fn test_open_replays_journal() {
    let dir = tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("blocks.jsonl")).unwrap();

    let root = {
        let service =
            MerkleService::open(ServiceConfig::default(), Journal::open(&path).unwrap()).unwrap();
        let _receipt = service.submit(block("1", "data1")).unwrap();
        service
            .submit_batch(vec![block("2", "data2"), block("3", "data3")])
            .unwrap()
            .root_hash
    };

    let reopened =
        MerkleService::open(ServiceConfig::default(), Journal::open(&path).unwrap()).unwrap();
    assert_eq!(reopened.root(None).root_hash, root);
    assert_eq!(reopened.root(None).leaf_count, 3);

    assert!(matches!(
        reopened.submit(block("2", "again")),
        Err(ServiceError::DuplicateBlock(_))
    ));
}

#[test]
fn test_rejected_batch_is_not_journaled() {
    let dir = tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("blocks.jsonl")).unwrap();

    let service =
        MerkleService::open(ServiceConfig::default(), Journal::open(&path).unwrap()).unwrap();
    let _receipt = service.submit(block("1", "a")).unwrap();
    let _err = service
        .submit_batch(vec![block("2", "b"), block("1", "c")])
        .unwrap_err();

    assert_eq!(journal::read_blocks(&path).unwrap().len(), 1);
}

#[test]
fn test_interrupted_append_does_not_block_resubmission() {
    let dir = tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("blocks.jsonl")).unwrap();

    let root = {
        let service =
            MerkleService::open(ServiceConfig::default(), Journal::open(&path).unwrap()).unwrap();
        service.submit(block("1", "data1")).unwrap().root_hash
    };

    let mut torn = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    std::io::Write::write_all(&mut torn, b"{\"id\":\"2\",\"payl").unwrap();
    drop(torn);

    let reopened =
        MerkleService::open(ServiceConfig::default(), Journal::open(&path).unwrap()).unwrap();
    assert_eq!(reopened.root(None).root_hash, Some(root));
    assert_eq!(reopened.root(None).leaf_count, 1);

    let receipt = reopened.submit(block("2", "data2")).unwrap();
    assert_eq!(receipt.leaf_count, 2);
    assert_eq!(journal::read_blocks(&path).unwrap().len(), 2);
}

#[test]
fn test_config_defaults_when_field_missing() {
    let config: ServiceConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, ServiceConfig::default());
    assert_eq!(config.max_proof_leaves, DEFAULT_MAX_PROOF_LEAVES);
}
