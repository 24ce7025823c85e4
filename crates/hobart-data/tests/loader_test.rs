//! Loading a panel from files on disk.

use chrono::NaiveDate;
use hobart_data::{DataError, load_market_data};
use std::fs;
use std::path::PathBuf;

fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hobart-data-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_market_data() {
    let prices = write_fixture(
        "prices.csv",
        "date,symbol,price,market_cap,volume\n\
         2024-01-02,AAA,10.0,1000,100\n\
         2024-01-03,AAA,10.5,1050,120\n\
         2024-01-04,AAA,10.0,1000,90\n\
         2024-01-02,BBB,50.0,5000,10\n\
         2024-01-04,BBB,51.0,5100,12\n",
    );
    let factors = write_fixture(
        "factors.csv",
        "date,market,size\n\
         2024-01-02,0.001,0.0\n\
         2024-01-03,0.002,0.001\n\
         2024-01-04,-0.001,0.002\n",
    );

    let data = load_market_data(&prices, &factors).unwrap();
    assert_eq!(data.symbols(), vec!["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(data.trading_dates().len(), 3);
    assert_eq!(data.factors().names().len(), 2);

    let jan4 = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
    // BBB has no observation on the 3rd: its return on the 4th spans two days.
    let r = data.asset_return("BBB", jan4).unwrap();
    assert!((r - 0.02).abs() < 1e-12);

    let frame = data.to_frame().unwrap();
    assert_eq!(frame.height(), 5);
}

#[test]
fn test_missing_file() {
    let missing = std::env::temp_dir().join("hobart-data-does-not-exist.csv");
    let result = load_market_data(&missing, &missing);
    assert!(matches!(result, Err(DataError::Io(_))));
}
