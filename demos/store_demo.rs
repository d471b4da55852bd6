use env_logger::Env;
use log::info;
use pcapvault::analysis::{summarize, AnalysisResult};
use pcapvault::decoding::PacketRecord;
use pcapvault::storage::{AnalysisStore, DatabaseStorage, FolderOrder, PageRequest, UploadMeta};
use std::env;
use std::path::PathBuf;

fn record(no: u64, src: &str, dst: &str, protocol: &str) -> PacketRecord {
    PacketRecord {
        no,
        time: 1_700_000_000.0 + no as f64,
        source: src.to_string(),
        destination: dst.to_string(),
        protocol: protocol.to_string(),
        length: 60,
        info: None,
    }
}

#[tokio::main]
async fn main() {
    // RUST_LOG can override; default to info
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    let db_path: PathBuf = env::var("PCAP_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("target").join("store_demo").join("demo.sqlite3"));
    let store = DatabaseStorage::open(&db_path).await.expect("open store");
    info!("Using analysis store at {}", db_path.display());

    let summary = summarize(vec![
        record(1, "10.0.0.1", "10.0.0.2", "TCP"),
        record(2, "10.0.0.2", "10.0.0.1", "TCP"),
        record(3, "10.0.0.3", "10.0.0.1", "DNS"),
    ]);
    let analysis = AnalysisResult::new("00".repeat(32), "demo.pcap".to_string(), 180, summary);

    let meta = UploadMeta {
        uploaded_by_id: Some(1),
        folder_name: Some("pcap1".to_string()),
    };
    let stored = store.upsert_analysis(&analysis, &meta).await.expect("upsert");
    info!("Stored record {} ({} packets)", stored.id, stored.summary.packet_count);

    let page = store.list_pcaps(PageRequest::default()).await.expect("list");
    info!("{} record(s) in store", page.len());

    for listing in store.list_folders(FolderOrder::Asc, None).await.expect("folders") {
        info!(
            "{} -> {} (created {})",
            listing.folder_name.unwrap_or_default(),
            listing.original_name,
            listing.created_at
        );
    }
}
