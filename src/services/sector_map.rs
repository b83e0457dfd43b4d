use crate::models::QuoteType;

/// Sector key used when the provider has no classification.
pub const UNCLASSIFIED_SECTOR: &str = "未分類";

pub const ETF_SECTOR: &str = "ETF";

/// Provider (GICS-style English) sector names to the local label set.
const SECTOR_LABELS: &[(&str, &str)] = &[
    ("Technology", "情報技術"),
    ("Information Technology", "情報技術"),
    ("Communication Services", "通信サービス"),
    ("Consumer Cyclical", "一般消費財"),
    ("Consumer Discretionary", "一般消費財"),
    ("Consumer Defensive", "生活必需品"),
    ("Consumer Staples", "生活必需品"),
    ("Healthcare", "ヘルスケア"),
    ("Health Care", "ヘルスケア"),
    ("Financial Services", "金融"),
    ("Financials", "金融"),
    ("Industrials", "資本財"),
    ("Basic Materials", "素材"),
    ("Materials", "素材"),
    ("Energy", "エネルギー"),
    ("Utilities", "公益事業"),
    ("Real Estate", "不動産"),
];

/// Maps a provider sector to its local label. ETFs always land in the
/// dedicated ETF sector; unmapped names pass through unchanged.
pub fn localize_sector(sector: Option<&str>, quote_type: QuoteType) -> Option<String> {
    if quote_type == QuoteType::Etf {
        return Some(ETF_SECTOR.to_string());
    }
    let sector = sector.map(str::trim).filter(|s| !s.is_empty())?;
    let label = SECTOR_LABELS
        .iter()
        .find(|(en, _)| en.eq_ignore_ascii_case(sector))
        .map(|(_, local)| *local)
        .unwrap_or(sector);
    Some(label.to_string())
}

/// Grouping key for per-sector aggregation.
pub fn sector_key(sector: Option<&str>) -> String {
    sector
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNCLASSIFIED_SECTOR)
        .to_string()
}
