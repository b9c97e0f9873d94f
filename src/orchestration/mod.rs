pub mod service;

pub use service::{
    AlertDraft, HoldingsReport, PortfolioService, PortfolioSummary, ServiceError, SyncReport,
};
