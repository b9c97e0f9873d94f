use chrono::NaiveDate;
use equitysync::backup::{BackupError, BackupSink, MemoryBackupSink};
use equitysync::datasource::{AnalysisProvider, DataSourceError, MarketDataProvider, MockDataSource};
use equitysync::db::init_db;
use equitysync::domain::{
    AlertKind, Decimal, LiveMetrics, LotDraft, LotId, LotValidationError, Ticker, TimeMs,
};
use equitysync::engine::{ScreenMetric, ScreenSide};
use equitysync::orchestration::{AlertDraft, PortfolioService, ServiceError};
use equitysync::Repository;
use std::sync::Arc;
use tempfile::TempDir;

struct TestService {
    service: PortfolioService,
    repo: Arc<Repository>,
    provider: Arc<MockDataSource>,
    _temp: TempDir,
}

async fn setup(provider: MockDataSource, backup: Option<Arc<dyn BackupSink>>) -> TestService {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let provider = Arc::new(provider);

    let service = load(&repo, &provider, backup).await;
    TestService {
        service,
        repo,
        provider,
        _temp: temp_dir,
    }
}

async fn load(
    repo: &Arc<Repository>,
    provider: &Arc<MockDataSource>,
    backup: Option<Arc<dyn BackupSink>>,
) -> PortfolioService {
    let market: Arc<dyn MarketDataProvider> = provider.clone();
    let analyst: Arc<dyn AnalysisProvider> = provider.clone();
    PortfolioService::load(repo.clone(), market, analyst, backup)
        .await
        .expect("service load failed")
}

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn date(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn draft(ticker: &str, price: &str, qty: &str, on: NaiveDate) -> LotDraft {
    LotDraft {
        ticker: ticker.to_string(),
        purchase_date: on,
        price: d(price),
        quantity: d(qty),
        pe: d("20"),
        pb: d("4"),
        eps: d("8"),
        note: None,
    }
}

fn now() -> TimeMs {
    TimeMs::from_date(date(2025, 1, 1))
}

#[tokio::test]
async fn test_add_lot_seeds_price_only_when_unknown() {
    let t = setup(MockDataSource::new(), None).await;

    t.service
        .add_lot(draft("abc", "100", "10", date(2024, 1, 1)))
        .await
        .unwrap();
    t.service
        .add_lot(draft("ABC ", "200", "10", date(2024, 6, 1)))
        .await
        .unwrap();

    let report = t.service.holdings(now()).await.unwrap();
    assert_eq!(report.holdings.len(), 1);
    let h = &report.holdings[0];
    assert_eq!(h.ticker.as_str(), "ABC");
    assert_eq!(h.lot_count, 2);
    assert_eq!(h.total_quantity, d("20"));
    assert_eq!(h.total_invested, d("3000"));
    assert_eq!(h.weighted_avg_price, d("150"));
    // seeded from the first lot, not overwritten by the second
    assert_eq!(h.current_price, d("100"));
}

#[tokio::test]
async fn test_invalid_lot_is_rejected() {
    let t = setup(MockDataSource::new(), None).await;
    let err = t
        .service
        .add_lot(draft("ABC", "100", "0", date(2024, 1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidLot(_)));

    let err = t
        .service
        .add_lot(draft("ABC", "1e15", "1e15", date(2024, 1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidLot(LotValidationError::InvestedOutOfRange { .. })
    ));
    assert!(t.service.list_lots().await.is_empty());
    assert!(t.service.holdings(now()).await.unwrap().holdings.is_empty());
}

#[tokio::test]
async fn test_reads_share_one_view_per_version() {
    let t = setup(MockDataSource::new(), None).await;
    t.service
        .add_lot(draft("ABC", "100", "10", date(2024, 1, 1)))
        .await
        .unwrap();

    let later = TimeMs::new(now().as_ms() + 3_600_000);
    t.service.holdings(now()).await.unwrap();
    t.service.portfolio(later).await;
    t.service.screen(later, ScreenSide::Buy, ScreenMetric::All).await;
    assert_eq!(t.service.holdings_recomputations().await, 1);

    t.service.set_price("ABC", d("120")).await.unwrap();
    let summary = t.service.portfolio(later).await;
    assert_eq!(summary.stats.total_current_value, d("1200"));
    t.service.holdings(later).await.unwrap();
    assert_eq!(t.service.holdings_recomputations().await, 2);
}

#[tokio::test]
async fn test_update_and_remove_lot() {
    let t = setup(MockDataSource::new(), None).await;
    let lot = t
        .service
        .add_lot(draft("ABC", "100", "10", date(2024, 1, 1)))
        .await
        .unwrap();

    let updated = t
        .service
        .update_lot(lot.id, draft("ABC", "110", "12", date(2024, 1, 2)))
        .await
        .unwrap();
    assert_eq!(updated.id, lot.id);
    assert_eq!(t.service.list_lots().await[0].quantity, d("12"));

    let missing = t
        .service
        .update_lot(LotId::generate(), draft("ABC", "1", "1", date(2024, 1, 1)))
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    t.service.remove_lot(lot.id).await.unwrap();
    assert!(t.service.list_lots().await.is_empty());
    assert!(matches!(
        t.service.remove_lot(lot.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_state_survives_reload() {
    let t = setup(MockDataSource::new(), None).await;
    t.service
        .add_lot(draft("INFY", "1400", "5", date(2024, 2, 1)))
        .await
        .unwrap();
    t.service.set_price("infy", d("1500")).await.unwrap();
    t.service
        .add_alert(AlertDraft {
            ticker: "infy".to_string(),
            kind: AlertKind::PriceBelow,
            threshold: 1000.0,
        })
        .await
        .unwrap();

    let reloaded = load(&t.repo, &t.provider, None).await;
    assert_eq!(reloaded.list_lots().await, t.service.list_lots().await);
    assert_eq!(reloaded.list_alerts(Some("INFY")).await.len(), 1);
    let report = reloaded.holdings(now()).await.unwrap();
    assert_eq!(report.holdings[0].current_price, d("1500"));
}

#[tokio::test]
async fn test_alert_fires_once_and_persists() {
    let t = setup(MockDataSource::new(), None).await;
    t.service
        .add_lot(draft("ABC", "100", "5", date(2024, 1, 1)))
        .await
        .unwrap();
    t.service.set_price("ABC", d("130")).await.unwrap();
    t.service
        .add_alert(AlertDraft {
            ticker: "abc".to_string(),
            kind: AlertKind::PriceAbove,
            threshold: 120.0,
        })
        .await
        .unwrap();
    assert_eq!(t.service.portfolio(now()).await.active_alerts, 1);

    let first = t.service.holdings(now()).await.unwrap();
    assert_eq!(first.triggered.len(), 1);
    assert_eq!(first.triggered[0].message, "Alert: ABC price above 120");

    let second = t.service.holdings(now()).await.unwrap();
    assert!(second.triggered.is_empty());
    assert_eq!(t.service.portfolio(now()).await.active_alerts, 0);

    let reloaded = load(&t.repo, &t.provider, None).await;
    let alerts = reloaded.list_alerts(None).await;
    assert!(!alerts[0].is_active);
    assert!(alerts[0].triggered_at.is_some());
}

#[tokio::test]
async fn test_sync_market_merges_quotes() {
    let provider = MockDataSource::new()
        .with_metrics(
            "ABC",
            d("140"),
            LiveMetrics {
                pe: Some(d("15")),
                pb: None,
                eps: None,
            },
        )
        .with_price("ZZZ", d("1"));
    let t = setup(provider, None).await;
    t.service
        .add_lot(draft("ABC", "100", "5", date(2024, 1, 1)))
        .await
        .unwrap();
    t.service
        .add_lot(draft("XYZ", "50", "5", date(2024, 1, 1)))
        .await
        .unwrap();
    t.service
        .set_metrics(
            "ABC",
            LiveMetrics {
                pe: None,
                pb: Some(d("3")),
                eps: None,
            },
        )
        .await
        .unwrap();

    let report = t.service.sync_market().await.unwrap();
    assert_eq!(report.requested, 2);
    assert_eq!(report.updated, 1);

    let holdings = t.service.holdings(now()).await.unwrap().holdings;
    let abc = holdings.iter().find(|h| h.ticker.as_str() == "ABC").unwrap();
    let xyz = holdings.iter().find(|h| h.ticker.as_str() == "XYZ").unwrap();
    assert_eq!(abc.current_price, d("140"));
    assert_eq!(xyz.current_price, d("50"));

    let metrics = t.service.metrics().await;
    let live = metrics[&Ticker::normalize("ABC")];
    assert_eq!(live.pe, Some(d("15")));
    assert_eq!(live.pb, Some(d("3")));
}

#[tokio::test]
async fn test_sync_failure_keeps_prices() {
    let provider = MockDataSource::new().failing(DataSourceError::RateLimited);
    let t = setup(provider, None).await;
    t.service
        .add_lot(draft("ABC", "100", "5", date(2024, 1, 1)))
        .await
        .unwrap();

    let report = t.service.sync_market().await.unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(t.provider.calls(), 1);
    let h = &t.service.holdings(now()).await.unwrap().holdings[0];
    assert_eq!(h.current_price, d("100"));
}

#[tokio::test]
async fn test_sync_without_lots_skips_provider() {
    let t = setup(MockDataSource::new(), None).await;
    let report = t.service.sync_market().await.unwrap();
    assert_eq!(report.requested, 0);
    assert_eq!(t.provider.calls(), 0);
}

#[tokio::test]
async fn test_analysis_uses_provider_or_fallback() {
    let t = setup(MockDataSource::new().with_analysis("Concentrated", "Diversify"), None).await;
    let empty = t.service.analysis(now()).await;
    assert_eq!(empty.summary, "Unable to generate analysis at this time.");
    assert_eq!(t.provider.calls(), 0);

    t.service
        .add_lot(draft("ABC", "100", "5", date(2024, 1, 1)))
        .await
        .unwrap();
    let analysis = t.service.analysis(now()).await;
    assert_eq!(analysis.summary, "Concentrated");

    let failing = setup(MockDataSource::new().failing(DataSourceError::RateLimited), None).await;
    failing
        .service
        .add_lot(draft("ABC", "100", "5", date(2024, 1, 1)))
        .await
        .unwrap();
    let fallback = failing.service.analysis(now()).await;
    assert_eq!(fallback.advice, "Try again after adding more data points.");
}

#[tokio::test]
async fn test_import_appends_lots() {
    let t = setup(MockDataSource::new(), None).await;
    t.service
        .add_lot(draft("INFY", "1400", "5", date(2024, 1, 1)))
        .await
        .unwrap();

    let csv = "Instrument,Qty.,Avg. cost\nINFY,10,\"1,450\"\nTCS,2,3200\nTOTAL,12,0\n";
    let report = t.service.import(csv, date(2025, 1, 1)).await.unwrap();
    assert_eq!(report.accepted, 2);
    assert_eq!(report.skipped, 1);

    let lots = t.service.list_lots().await;
    assert_eq!(lots.len(), 3);
    let holdings = t.service.holdings(now()).await.unwrap().holdings;
    let tcs = holdings.iter().find(|h| h.ticker.as_str() == "TCS").unwrap();
    assert_eq!(tcs.current_price, d("3200"));

    let err = t.service.import("nonsense", date(2025, 1, 1)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Import(_)));
}

#[tokio::test]
async fn test_screen_uses_live_metrics() {
    let t = setup(MockDataSource::new(), None).await;
    t.service
        .add_lot(draft("ABC", "100", "5", date(2024, 1, 1)))
        .await
        .unwrap();
    t.service
        .set_metrics(
            "ABC",
            LiveMetrics {
                pe: Some(d("15")),
                pb: Some(d("5")),
                eps: None,
            },
        )
        .await
        .unwrap();

    let buys = t.service.screen(now(), ScreenSide::Buy, ScreenMetric::All).await;
    assert_eq!(buys.len(), 1);
    assert_eq!(buys[0].pe_diff, 25.0);
    assert!(!buys[0].dual);

    let sells = t.service.screen(now(), ScreenSide::Sell, ScreenMetric::Pb).await;
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].pb_premium, 25.0);
}

#[tokio::test]
async fn test_backup_requires_sink() {
    let t = setup(MockDataSource::new(), None).await;
    let err = t.service.backup().await.unwrap_err();
    assert!(matches!(err, ServiceError::Backup(BackupError::NotConfigured)));

    let sink = Arc::new(MemoryBackupSink::new());
    let with_sink = setup(MockDataSource::new(), Some(sink.clone() as Arc<dyn BackupSink>)).await;
    with_sink
        .service
        .add_lot(draft("ABC", "100", "5", date(2024, 1, 1)))
        .await
        .unwrap();
    let receipt = with_sink.service.backup().await.unwrap();

    let uploads = sink.uploads().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(receipt.bytes, uploads[0].len());
    let body: serde_json::Value = serde_json::from_slice(&uploads[0]).unwrap();
    assert_eq!(body["purchases"][0]["name"], "ABC");
    assert_eq!(body["currentPrices"]["ABC"], 100.0);
}
