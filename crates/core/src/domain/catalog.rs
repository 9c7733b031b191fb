use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Sector {
    pub name: &'static str,
    pub tickers: &'static [&'static str],
}

const SECTORS: &[Sector] = &[
    Sector {
        name: "Consumer Discretionary",
        tickers: &["TSLA", "NKE", "MCD", "AMZN", "HD"],
    },
    Sector {
        name: "Consumer Staples",
        tickers: &["PG", "KO", "PEP", "WMT", "COST"],
    },
    Sector {
        name: "Energy",
        tickers: &["XOM", "CVX", "BP", "COP", "SLB"],
    },
    Sector {
        name: "Financials",
        tickers: &["JPM", "BAC", "GS", "MS", "WFC"],
    },
    Sector {
        name: "Health Care",
        tickers: &["JNJ", "PFE", "MRNA", "UNH", "ABBV"],
    },
    Sector {
        name: "Industrials",
        tickers: &["BA", "CAT", "LMT", "UPS", "GE"],
    },
    Sector {
        name: "Information Technology",
        tickers: &["AAPL", "MSFT", "NVDA", "GOOGL", "META"],
    },
    Sector {
        name: "Materials",
        tickers: &["BHP", "LIN", "RIO", "FCX", "APD"],
    },
    Sector {
        name: "Real Estate",
        tickers: &["AMT", "SPG", "PLD", "CBRE", "EQIX"],
    },
    Sector {
        name: "Telecommunication Services",
        tickers: &["VZ", "T", "TMUS", "CHTR", "CMCSA"],
    },
    Sector {
        name: "Utilities",
        tickers: &["NEE", "DUK", "SO", "EXC", "AEP"],
    },
];

pub fn sectors() -> &'static [Sector] {
    SECTORS
}

pub fn find(sector: &str) -> Option<&'static Sector> {
    let wanted = sector.trim();
    SECTORS.iter().find(|s| s.name.eq_ignore_ascii_case(wanted))
}

pub fn tickers_for(sector: &str) -> Option<&'static [&'static str]> {
    find(sector).map(|s| s.tickers)
}
