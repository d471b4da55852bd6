//! End-to-end ingestion scenarios against a scripted stand-in for tshark.

use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::decoding::TsharkDecoder;
use crate::ingestion::{sha256_file, FolderAllocator, Ingestor, Upload};
use crate::storage::{AnalysisStore, DatabaseStorage, PageRequest};

const MAX_UPLOAD_BYTES: u64 = 64;

const THREE_PACKETS: &str = r#"[
  {
    "_index": "packets-2024-01-01",
    "_source": {
      "layers": {
        "frame": {
          "frame.number": "1",
          "frame.time_epoch": "1700000000.100000000",
          "frame.len": "74",
          "frame.protocols": "eth:ethertype:ip:tcp"
        },
        "ip": { "ip.src": "10.0.0.1", "ip.dst": "10.0.0.2" },
        "tcp": { "tcp.srcport": "51514", "tcp.dstport": "443", "tcp.flags": "0x0002" }
      }
    }
  },
  {
    "_source": {
      "layers": {
        "_ws.col.Protocol": "TCP",
        "frame": { "frame.number": "2", "frame.time_epoch": "1700000000.200000000", "frame.len": "74" },
        "ip": { "ip.src": "10.0.0.2", "ip.dst": "10.0.0.1" },
        "tcp": { "tcp.srcport": "443", "tcp.dstport": "51514", "tcp.flags": "0x0012" }
      }
    }
  },
  {
    "_source": {
      "layers": {
        "frame": {
          "frame.number": "3",
          "frame.time_epoch": "1700000000.300000000",
          "frame.len": "90",
          "frame.protocols": "eth:ethertype:ip:udp"
        },
        "ip": [{ "ip.src": "10.0.0.3", "ip.dst": "10.0.0.1" }],
        "udp": { "udp.srcport": "5353", "udp.dstport": "53" }
      }
    }
  }
]"#;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    ingestor: Ingestor<DatabaseStorage>,
}

impl Fixture {
    fn storage_dir(&self) -> PathBuf {
        self.root.join("pcaps")
    }

    fn marker(&self) -> PathBuf {
        self.root.join("decoder-ran")
    }

    fn upload(&self, name: &str, bytes: &[u8]) -> Upload {
        let incoming = self.root.join("incoming");
        fs::create_dir_all(&incoming).unwrap();
        let path = incoming.join(format!("{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&path, bytes).unwrap();
        Upload {
            path,
            original_name: name.to_string(),
            uploaded_by_id: None,
        }
    }
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// `decoder_body` is shell; `{root}` expands to the fixture directory.
async fn fixture(decoder_body: &str, timeout: Option<Duration>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(root.join("frames.json"), THREE_PACKETS).unwrap();

    let script = root.join("fake-tshark");
    #[cfg(unix)]
    write_script(
        &script,
        &decoder_body.replace("{root}", &root.display().to_string()),
    );

    let store = DatabaseStorage::open(root.join("db").join("pcapvault.sqlite3"))
        .await
        .unwrap();
    let ingestor = Ingestor::new(
        Arc::new(store),
        TsharkDecoder::new(script).with_timeout(timeout),
        FolderAllocator::new(root.join("pcaps"), "pcap").unwrap(),
        MAX_UPLOAD_BYTES,
    );
    Fixture {
        _dir: dir,
        root,
        ingestor,
    }
}

const CAT_FRAMES: &str = "touch '{root}/decoder-ran'\ncat '{root}/frames.json'";

async fn stored_count(fx: &Fixture) -> usize {
    fx.ingestor
        .store()
        .list_pcaps(PageRequest {
            limit: Some(200),
            cursor: None,
        })
        .await
        .unwrap()
        .len()
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_three_packet_capture_is_ingested() {
    let fx = fixture(CAT_FRAMES, None).await;
    let mut upload = fx.upload("office trace.pcap", b"fake capture one");
    upload.uploaded_by_id = Some(42);
    let source = upload.path.clone();

    let ingested = fx.ingestor.ingest(upload).await.unwrap();

    assert_eq!(ingested.folder, "pcap1");
    assert_eq!(
        ingested.stored_path,
        fx.storage_dir().join("pcap1").join("office_trace.pcap")
    );
    assert!(!source.exists());
    assert_eq!(fs::read(&ingested.stored_path).unwrap(), b"fake capture one");

    let analysis = &ingested.analysis;
    assert_eq!(analysis.sha256, sha256_file(&ingested.stored_path).unwrap());
    assert_eq!(analysis.original_name, "office trace.pcap");
    assert_eq!(analysis.size, 16);
    assert_eq!(analysis.packet_count, 3);
    assert_eq!(analysis.protocols.get("TCP"), Some(&2));
    assert_eq!(analysis.protocols.get("UDP"), Some(&1));
    assert_eq!(analysis.top_talkers[0], ("10.0.0.1".to_string(), 3));
    assert_eq!(analysis.top_connections.len(), 3);
    assert_eq!(analysis.preview.len(), 3);
    assert_eq!(analysis.preview[0].info.as_deref(), Some("TCP 51514->443 [SYN]"));
    assert_eq!(
        analysis.preview[1].info.as_deref(),
        Some("TCP 443->51514 [SYN,ACK]")
    );
    assert_eq!(analysis.preview[2].info.as_deref(), Some("UDP 5353->53"));
    assert_eq!(analysis.preview[2].length, 90);

    let record = fx
        .ingestor
        .store()
        .find_by_sha256(&analysis.sha256)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.id, ingested.record_id);
    assert_eq!(&record.summary, analysis);
    assert_eq!(record.uploaded_by_id, Some(42));
    assert_eq!(record.folder_name.as_deref(), Some("pcap1"));

    let json = serde_json::to_value(analysis).unwrap();
    assert_eq!(json["packetCount"], 3);
    assert_eq!(json["topTalkers"][0][0], "10.0.0.1");
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_unsupported_extension_has_no_side_effects() {
    let fx = fixture(CAT_FRAMES, None).await;
    let upload = fx.upload("notes.txt", b"hello");
    let source = upload.path.clone();

    let err = fx.ingestor.ingest(upload).await.unwrap_err();

    assert_eq!(err.code(), "unsupported_extension");
    assert_eq!(
        err.to_string(),
        "Unsupported file type for notes.txt. Only .pcap and .pcapng are allowed."
    );
    assert!(source.exists());
    assert!(!fx.storage_dir().exists());
    assert!(!fx.marker().exists());
    assert_eq!(stored_count(&fx).await, 0);
}

#[tokio::test]
#[serial]
async fn test_missing_upload_with_wrong_extension() {
    let fx = fixture(CAT_FRAMES, None).await;
    let upload = Upload {
        path: fx.root.join("incoming").join("gone.txt"),
        original_name: "missing.txt".to_string(),
        uploaded_by_id: None,
    };

    let err = fx.ingestor.ingest(upload).await.unwrap_err();

    assert_eq!(err.code(), "unsupported_extension");
    assert!(!fx.storage_dir().exists());
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_oversized_upload_is_rejected() {
    let fx = fixture(CAT_FRAMES, None).await;
    let upload = fx.upload("big.pcapng", &[0u8; MAX_UPLOAD_BYTES as usize + 1]);

    let err = fx.ingestor.ingest(upload).await.unwrap_err();

    assert_eq!(err.code(), "file_too_large");
    assert!(err.is_validation());
    assert!(!fx.storage_dir().exists());
    assert!(!fx.marker().exists());
}

#[tokio::test]
#[serial]
async fn test_missing_decoder_persists_nothing() {
    let fx = fixture(CAT_FRAMES, None).await;
    let ingestor = Ingestor::new(
        Arc::new(
            DatabaseStorage::open(fx.root.join("other.sqlite3"))
                .await
                .unwrap(),
        ),
        TsharkDecoder::new(fx.root.join("not-installed-tshark")),
        FolderAllocator::new(fx.storage_dir(), "pcap").unwrap(),
        MAX_UPLOAD_BYTES,
    );

    let err = ingestor
        .ingest(fx.upload("trace.pcap", b"bytes"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "decoder_not_found");
    assert!(err.to_string().starts_with("decoder not found"));
    assert!(err.to_string().contains("TSHARK_PATH"));
    // The folder was reserved before decoding and is not reclaimed.
    assert!(fx.storage_dir().join("pcap1").join("trace.pcap").is_file());
    assert!(ingestor
        .store()
        .list_pcaps(PageRequest::default())
        .await
        .unwrap()
        .is_empty());
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_decoder_exit_failure() {
    let fx = fixture("exit 2", None).await;
    let err = fx
        .ingestor
        .ingest(fx.upload("trace.pcap", b"bytes"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "decoder_exit_failure");
    assert_eq!(err.to_string(), "decoder exited with failure status, code=2");
    assert_eq!(stored_count(&fx).await, 0);
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_decoder_unparseable_output() {
    let fx = fixture("echo 'Capturing on eth0'", None).await;
    let err = fx
        .ingestor
        .ingest(fx.upload("trace.pcap", b"bytes"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "decoder_unparseable");
    assert!(err
        .to_string()
        .starts_with("decoder produced unparseable output"));
    assert_eq!(stored_count(&fx).await, 0);
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_decoder_timeout() {
    let fx = fixture("exec sleep 5", Some(Duration::from_millis(300))).await;
    let started = Instant::now();

    let err = fx
        .ingestor
        .ingest(fx.upload("slow.pcap", b"bytes"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "decoder_timeout");
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(stored_count(&fx).await, 0);
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_reingest_same_bytes_upserts() {
    let fx = fixture(CAT_FRAMES, None).await;
    let mut first_upload = fx.upload("first.pcap", b"same bytes");
    first_upload.uploaded_by_id = Some(7);

    let first = fx.ingestor.ingest(first_upload).await.unwrap();
    let second = fx
        .ingestor
        .ingest(fx.upload("second.pcap", b"same bytes"))
        .await
        .unwrap();

    assert_eq!(first.analysis.sha256, second.analysis.sha256);
    assert_eq!(first.record_id, second.record_id);
    assert_eq!(first.analysis.packet_count, 3);
    assert_eq!(first.analysis.packet_count, second.analysis.packet_count);
    assert_eq!(first.analysis.protocols, second.analysis.protocols);
    assert_eq!(first.analysis.top_talkers, second.analysis.top_talkers);
    assert_eq!(first.analysis.top_connections, second.analysis.top_connections);
    assert_eq!(first.analysis.preview, second.analysis.preview);
    assert_eq!(first.folder, "pcap1");
    assert_eq!(second.folder, "pcap2");
    assert_eq!(stored_count(&fx).await, 1);

    let record = fx
        .ingestor
        .store()
        .find_by_sha256(&second.analysis.sha256)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.original_name, "second.pcap");
    assert_eq!(record.folder_name.as_deref(), Some("pcap2"));
    assert_eq!(record.uploaded_by_id, Some(7));
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_analyze_file_does_not_store() {
    let fx = fixture(CAT_FRAMES, None).await;
    let upload = fx.upload("in-place.pcap", b"abc");

    let analysis = fx
        .ingestor
        .analyze_file(&upload.path, &upload.original_name)
        .await
        .unwrap();

    assert_eq!(
        analysis.sha256,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(analysis.packet_count, 3);
    assert!(upload.path.exists());
    assert!(!fx.storage_dir().exists());
    assert_eq!(stored_count(&fx).await, 0);
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_locate_stored_file() {
    let fx = fixture(CAT_FRAMES, None).await;
    let ingested = fx
        .ingestor
        .ingest(fx.upload("trace one.pcap", b"locate me"))
        .await
        .unwrap();

    let located = fx.ingestor.locate_stored_file("pcap1").await.unwrap();
    assert_eq!(located, ingested.stored_path);

    let invalid = fx.ingestor.locate_stored_file("../pcap1").await.unwrap_err();
    assert_eq!(invalid.code(), "invalid_folder_name");

    let unknown = fx.ingestor.locate_stored_file("pcap9").await.unwrap_err();
    assert_eq!(unknown.code(), "not_found");

    fs::remove_file(&located).unwrap();
    let missing = fx.ingestor.locate_stored_file("pcap1").await.unwrap_err();
    assert_eq!(missing.code(), "stored_file_missing");
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_ingestions_get_distinct_folders() {
    let fx = fixture(CAT_FRAMES, None).await;
    let mut handles = Vec::new();
    for i in 0..8 {
        let ingestor = fx.ingestor.clone();
        let upload = fx.upload(&format!("capture-{}.pcap", i), format!("bytes {}", i).as_bytes());
        handles.push(tokio::spawn(async move { ingestor.ingest(upload).await }));
    }

    let mut folders = Vec::new();
    for handle in handles {
        folders.push(handle.await.unwrap().unwrap().folder);
    }
    folders.sort();
    folders.dedup();

    assert_eq!(folders.len(), 8);
    assert!(folders.iter().all(|f| fx.ingestor.allocator().is_folder_name(f)));
    assert_eq!(stored_count(&fx).await, 8);
}
