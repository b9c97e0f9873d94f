pub mod api;
pub mod backup;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod import;
pub mod orchestration;

pub use config::Config;
pub use datasource::{
    AnalysisProvider, DataSourceError, HttpMarketDataSource, MarketDataProvider, MockDataSource,
};
pub use db::{init_db, Repository};
pub use domain::{Alert, AlertKind, Decimal, LotDraft, PurchaseLot, Ticker, TimeMs};
pub use error::AppError;
pub use orchestration::{PortfolioService, ServiceError};
