//! Load bond static data and price histories from CSV

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use csv::Reader;

use super::{parse_coupon_anchors, Bond, InstrumentType, PriceSeries};

/// Raw CSV row matching the bond info sheet columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "TYPE")]
    instrument_type: String,
    #[serde(rename = "ISSUE DATE")]
    issue_date: String,
    #[serde(rename = "REDEMPTION DATE")]
    redemption_date: String,
    #[serde(rename = "COUPON")]
    coupon: Option<f64>,
    #[serde(rename = "INDEX LINKED COUP")]
    index_linked_coupon: Option<f64>,
    #[serde(rename = "COUPON DATES", default)]
    coupon_dates: Option<String>,
}

/// A bond from the static data together with its instrument type
#[derive(Debug, Clone)]
pub struct BondRecord {
    pub instrument_type: InstrumentType,
    pub bond: Bond,
}

impl CsvRow {
    fn to_record(self) -> Result<BondRecord> {
        let instrument_type = InstrumentType::from_code(&self.instrument_type)
            .ok_or_else(|| anyhow!("Unknown TYPE for bond {}: {}", self.id, self.instrument_type))?;

        let issue_date = parse_static_date(&self.issue_date)
            .with_context(|| format!("ISSUE DATE of bond {}", self.id))?;
        let redemption_date = parse_static_date(&self.redemption_date)
            .with_context(|| format!("REDEMPTION DATE of bond {}", self.id))?;

        // ILBs quote their real coupon separately from the nominal column
        let coupon = match instrument_type {
            InstrumentType::Nominal => self.coupon,
            InstrumentType::InflationLinked => self.index_linked_coupon.or(self.coupon),
        }
        .unwrap_or(0.0);

        let anchors = parse_coupon_anchors(self.coupon_dates.as_deref().unwrap_or(""))
            .with_context(|| format!("COUPON DATES of bond {}", self.id))?;

        let bond = Bond::new(self.id, self.name, issue_date, redemption_date, coupon, anchors)?;

        Ok(BondRecord { instrument_type, bond })
    }
}

/// Parse a `dd/mm/YYYY` date, also accepting a two digit year
pub fn parse_static_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    let year_digits = value.rsplit('/').next().map(str::len).unwrap_or(0);
    let format = if year_digits == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(value, format)
        .with_context(|| format!("invalid date '{}', expected dd/mm/yyyy", value))
}

/// Load all bonds from a CSV file
pub fn load_bonds<P: AsRef<Path>>(path: P) -> Result<Vec<BondRecord>> {
    let path = path.as_ref();
    let reader = Reader::from_path(path)
        .with_context(|| format!("opening bond info {}", path.display()))?;
    read_bonds(reader)
}

/// Load bonds from any reader (e.g., string buffer, network stream)
pub fn load_bonds_from_reader<R: Read>(reader: R) -> Result<Vec<BondRecord>> {
    read_bonds(Reader::from_reader(reader))
}

fn read_bonds<R: Read>(mut reader: Reader<R>) -> Result<Vec<BondRecord>> {
    let mut bonds = Vec::new();

    for result in reader.deserialize() {
        let row: CsvRow = result?;
        bonds.push(row.to_record()?);
    }

    log::debug!("Loaded {} bonds", bonds.len());
    Ok(bonds)
}

/// Load a wide price sheet: a DATE column followed by one column per bond id.
/// Blank cells are gaps in the history.
pub fn load_prices<P: AsRef<Path>>(path: P) -> Result<HashMap<String, PriceSeries>> {
    let path = path.as_ref();
    let reader = Reader::from_path(path)
        .with_context(|| format!("opening price history {}", path.display()))?;
    read_prices(reader)
}

/// Load a wide price sheet from any reader
pub fn load_prices_from_reader<R: Read>(reader: R) -> Result<HashMap<String, PriceSeries>> {
    read_prices(Reader::from_reader(reader))
}

fn read_prices<R: Read>(mut reader: Reader<R>) -> Result<HashMap<String, PriceSeries>> {
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        bail!("price sheet needs a date column and at least one bond column");
    }

    let ids: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    let mut series: HashMap<String, PriceSeries> =
        ids.iter().map(|id| (id.clone(), PriceSeries::new())).collect();

    for result in reader.records() {
        let record = result?;
        let date = NaiveDate::parse_from_str(record[0].trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid price date '{}'", &record[0]))?;

        for (id, cell) in ids.iter().zip(record.iter().skip(1)) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            let price: f64 = cell
                .parse()
                .with_context(|| format!("invalid price '{}' for bond {} on {}", cell, id, date))?;
            if let Some(prices) = series.get_mut(id) {
                prices.insert(date, price);
            }
        }
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = "\
ID,NAME,TYPE,ISSUE DATE,REDEMPTION DATE,COUPON,INDEX LINKED COUP,COUPON DATES
597973,CANADA 4 1/4% 01/12/26,ILB,10/12/1995,01/12/2026,,4.25,\"01/06,01/12\"
100200,CANADA 5% 01/06/37,NOM,01/06/2004,01/06/37,5.0,,\"01/06,01/12\"
300400,CANADA ZERO 2030,NOM,01/01/2020,01/01/2030,,,
";

    const PRICES: &str = "\
DATE,597973,100200
2020-05-01,150.25,120.5
2020-05-04,,121.0
2020-05-05,151.0,
";

    #[test]
    fn test_load_bonds() {
        let records = load_bonds_from_reader(INFO.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        let ilb = &records[0];
        assert_eq!(ilb.instrument_type, InstrumentType::InflationLinked);
        assert_eq!(ilb.bond.coupon_rate, 4.25);
        assert_eq!(ilb.bond.frequency(), 2);
        assert_eq!(ilb.bond.issue_date, NaiveDate::from_ymd_opt(1995, 12, 10).unwrap());

        let nominal = &records[1];
        assert_eq!(nominal.instrument_type, InstrumentType::Nominal);
        assert_eq!(nominal.bond.redemption_date, NaiveDate::from_ymd_opt(2037, 6, 1).unwrap());

        let zero = &records[2];
        assert!(zero.bond.is_zero_coupon());
        assert_eq!(zero.bond.coupon_rate, 0.0);
    }

    #[test]
    fn test_load_bonds_rejects_unknown_type() {
        let info = "ID,NAME,TYPE,ISSUE DATE,REDEMPTION DATE,COUPON,INDEX LINKED COUP,COUPON DATES\n\
                    1,X,FRN,01/01/2020,01/01/2025,1.0,,\n";
        assert!(load_bonds_from_reader(info.as_bytes()).is_err());
    }

    #[test]
    fn test_load_prices() {
        let prices = load_prices_from_reader(PRICES.as_bytes()).unwrap();
        assert_eq!(prices.len(), 2);

        let ilb = &prices["597973"];
        assert_eq!(ilb.len(), 2);
        assert_eq!(ilb.get(NaiveDate::from_ymd_opt(2020, 5, 4).unwrap()), None);

        let nominal = &prices["100200"];
        assert_eq!(nominal.get(NaiveDate::from_ymd_opt(2020, 5, 4).unwrap()), Some(121.0));
    }

    #[test]
    fn test_parse_static_date() {
        let expected = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        assert_eq!(parse_static_date("01/12/2026").unwrap(), expected);
        assert_eq!(parse_static_date("01/12/26").unwrap(), expected);
        assert!(parse_static_date("2026-12-01").is_err());
    }
}
