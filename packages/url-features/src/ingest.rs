//! Tabular ingestion: URL rows in, feature rows out.
//!
//! Reads a CSV with a URL column (and optionally a label column), runs the
//! URLs through a [`BatchScheduler`], and writes `F1..F22` plus the label.

use std::io::{Read, Write};
use tracing::{info, warn};

use crate::error::IngestError;
use crate::pipeline::{BatchResult, BatchScheduler};
use crate::types::feature::{Feature, FeatureVector};

/// One input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRow {
    /// `None` when the cell is missing or blank
    pub url: Option<String>,
    pub label: Option<String>,
}

/// One output row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub features: FeatureVector,
    pub label: Option<String>,
}

/// Decode a cell as UTF-8, falling back to Latin-1.
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn column_index(headers: &csv::ByteRecord, name: &str) -> Result<usize, IngestError> {
    headers
        .iter()
        .position(|h| decode(h).trim() == name)
        .ok_or_else(|| IngestError::MissingColumn(name.to_string()))
}

/// Read URL rows from CSV with a header row.
pub fn read_url_rows<R: Read>(
    reader: R,
    url_column: &str,
    label_column: Option<&str>,
) -> Result<Vec<UrlRow>, IngestError> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv.byte_headers()?.clone();
    let url_index = column_index(&headers, url_column)?;
    let label_index = label_column
        .map(|name| column_index(&headers, name))
        .transpose()?;

    let mut rows = Vec::new();
    for record in csv.byte_records() {
        let record = record?;
        let url = record
            .get(url_index)
            .map(decode)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let label = label_index.and_then(|i| record.get(i)).map(decode);
        rows.push(UrlRow { url, label });
    }

    info!(rows = rows.len(), "loaded URL rows");
    Ok(rows)
}

/// Extract features for every row, in row order.
///
/// Rows without a URL get a zero vector without being scheduled.
///
/// The returned [`BatchResult::failed`] holds row positions, not positions
/// in the scheduled URL list.
pub async fn extract_rows(scheduler: &BatchScheduler, rows: &[UrlRow]) -> (Vec<FeatureRow>, BatchResult) {
    let (positions, urls): (Vec<usize>, Vec<String>) = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.url.clone().map(|url| (i, url)))
        .unzip();
    let missing = rows.len() - urls.len();
    if missing > 0 {
        warn!(missing, "rows without a URL get neutral features");
    }

    let mut batch = scheduler.run(&urls).await;
    batch.failed = batch.failed.iter().map(|&i| positions[i]).collect();

    let mut vectors = batch.vectors.iter();
    let features = rows
        .iter()
        .map(|row| FeatureRow {
            features: match row.url {
                Some(_) => vectors.next().copied().unwrap_or_default(),
                None => FeatureVector::neutral(),
            },
            label: row.label.clone(),
        })
        .collect();

    (features, batch)
}

/// Write `F1..F22` (and `label` when requested) with a header row.
pub fn write_feature_rows<W: Write>(
    writer: W,
    rows: &[FeatureRow],
    with_label: bool,
) -> Result<(), IngestError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = Feature::ALL.iter().map(|f| f.column()).collect();
    if with_label {
        header.push("label".to_string());
    }
    csv.write_record(&header)?;

    for row in rows {
        let mut record: Vec<String> = row.features.values().iter().map(|v| v.to_string()).collect();
        if with_label {
            record.push(row.label.clone().unwrap_or_default());
        }
        csv.write_record(&record)?;
    }

    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FeatureExtractor;
    use crate::testing::{MockFetcher, MockResolver, MockSearchBackend, RecordingPacer};
    use crate::types::config::{BatchConfig, ExtractorConfig};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_read_url_rows() {
        let data = "id,url,label\n1,http://a.com,0\n2,,1\n3,  http://b.com  ,1\n";
        let rows = read_url_rows(data.as_bytes(), "url", Some("label")).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].url.as_deref(), Some("http://a.com"));
        assert_eq!(rows[1].url, None);
        assert_eq!(rows[1].label.as_deref(), Some("1"));
        assert_eq!(rows[2].url.as_deref(), Some("http://b.com"));
    }

    #[test]
    fn test_read_url_rows_latin1_and_missing_column() {
        let mut data = b"url\nhttp://caf".to_vec();
        data.push(0xE9); // é in Latin-1
        data.extend_from_slice(b".fr\n");

        let rows = read_url_rows(data.as_slice(), "url", None).unwrap();
        assert_eq!(rows[0].url.as_deref(), Some("http://café.fr"));
        assert_eq!(rows[0].label, None);

        assert!(matches!(
            read_url_rows("a,b\n1,2\n".as_bytes(), "url", None),
            Err(IngestError::MissingColumn(c)) if c == "url"
        ));
    }

    #[test]
    fn test_write_feature_rows() {
        let mut features = FeatureVector::neutral();
        features.set(Feature::IpAddress, crate::types::feature::Signal::Suspicious);
        let rows = vec![FeatureRow {
            features,
            label: Some("1".to_string()),
        }];

        let mut out = Vec::new();
        write_feature_rows(&mut out, &rows, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("F1,F2,"));
        assert!(header.ends_with("F22,label"));
        assert!(lines.next().unwrap().starts_with("-1,"));
    }

    #[tokio::test]
    async fn test_extract_rows_keeps_row_order() {
        let extractor = FeatureExtractor::builder(ExtractorConfig::default())
            .resolver(Arc::new(MockResolver::new()))
            .registry_backends(vec![])
            .fetcher(Arc::new(MockFetcher::new()))
            .search_backends(vec![Arc::new(MockSearchBackend::new())])
            .build()
            .unwrap();
        let scheduler = BatchScheduler::new(
            Arc::new(extractor),
            Arc::new(RecordingPacer::new()),
            BatchConfig::default(),
        );

        let rows = vec![
            UrlRow { url: Some("http://10.0.0.1/".to_string()), label: Some("1".to_string()) },
            UrlRow { url: None, label: Some("0".to_string()) },
            UrlRow { url: Some("http://plain.invalid/".to_string()), label: None },
        ];
        let (features, batch) = extract_rows(&scheduler, &rows).await;

        assert_eq!(batch.vectors.len(), 2);
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].features.get(Feature::IpAddress).value(), -1);
        assert_eq!(features[1].features, FeatureVector::neutral());
        assert_eq!(features[1].label.as_deref(), Some("0"));
        assert_eq!(features[2].features.get(Feature::IpAddress).value(), 1);
    }

    #[tokio::test]
    async fn test_extract_rows_reports_failures_by_row() {
        let extractor = FeatureExtractor::builder(ExtractorConfig::default())
            .resolver(Arc::new(MockResolver::new().with_host("slow.example", "93.184.216.34")))
            .registry_backends(vec![])
            .fetcher(Arc::new(
                MockFetcher::new()
                    .with_page("http://slow.example/", "<html></html>")
                    .with_delay(Duration::from_millis(500)),
            ))
            .search_backends(vec![Arc::new(MockSearchBackend::new())])
            .build()
            .unwrap();
        let scheduler = BatchScheduler::new(
            Arc::new(extractor),
            Arc::new(RecordingPacer::new()),
            BatchConfig::new().with_url_timeout(Duration::from_millis(100)),
        );

        let rows = vec![
            UrlRow { url: None, label: None },
            UrlRow { url: Some("http://slow.example/".to_string()), label: None },
        ];
        let (_, batch) = extract_rows(&scheduler, &rows).await;

        assert_eq!(batch.failed.iter().copied().collect::<Vec<_>>(), vec![1]);
    }
}
