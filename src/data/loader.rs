use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float32Array, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::fits;
use super::model::{is_wave_column, MetadataValue, SpectralTable, TableKind};
use crate::synth::units::{parse_flux_unit, parse_wave_unit};
use crate::synth::{SourceSpectrum, SpectralElement};

/// Field-metadata key holding a Parquet column's unit.
const UNIT_KEY: &str = "unit";
/// Schema-metadata key holding a Parquet table's name.
const NAME_KEY: &str = "name";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a spectral table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.fits` / `.fit` – binary table with `WAVELENGTH` and `FLUX`/`THROUGHPUT`
/// * `.parquet`       – flat `wave` and `flux`/`throughput` columns
/// * `.json`          – `{ "waveunits": .., "wave": [...], "flux": [...] }`
/// * `.csv`           – `wave[unit]` and `flux[unit]`/`throughput` columns
pub fn load_table(path: &Path) -> Result<SpectralTable> {
    let table = match extension(path).as_str() {
        "fits" | "fit" => fits::read_table(path)
            .with_context(|| format!("reading FITS file {}", path.display()))?,
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    log::debug!(
        "loaded {} rows of {:?} from {}",
        table.len(),
        table.kind,
        path.display()
    );
    Ok(table)
}

/// Load a source spectrum; unnamed tables are named after the file.
pub fn load_spectrum(path: &Path) -> Result<SourceSpectrum> {
    let mut table = load_table(path)?;
    if table.name.is_none() {
        table.name = file_stem(path);
    }
    table
        .into_spectrum()
        .with_context(|| format!("building spectrum from {}", path.display()))
}

/// Load a bandpass; unnamed tables are named after the file.
pub fn load_bandpass(path: &Path) -> Result<SpectralElement> {
    let mut table = load_table(path)?;
    if table.name.is_none() {
        table.name = file_stem(path);
    }
    table
        .into_bandpass()
        .with_context(|| format!("building bandpass from {}", path.display()))
}

/// Write a spectral table.  Dispatch by extension, same formats as [`load_table`].
pub fn save_table(path: &Path, table: &SpectralTable) -> Result<()> {
    match extension(path).as_str() {
        "fits" | "fit" => fits::write_table(path, table)
            .with_context(|| format!("writing FITS file {}", path.display()))?,
        "parquet" | "pq" => save_parquet(path, table)?,
        "json" => save_json(path, table)?,
        "csv" => save_csv(path, table)?,
        other => bail!("Unsupported file extension: .{other}"),
    }
    log::info!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Expected JSON schema:
///
/// ```json
/// {
///   "name": "vega",
///   "waveunits": "nm",
///   "fluxunits": "flam",
///   "wave": [400.0, 401.0, ...],
///   "flux": [1.2e-9, 1.3e-9, ...],
///   "observer": "Alice"
/// }
/// ```
///
/// A `throughput` array replaces `flux` for bandpasses. Unknown keys are kept
/// as metadata.
#[derive(Debug, Serialize, Deserialize)]
struct JsonTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    waveunits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fluxunits: Option<String>,
    wave: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flux: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    throughput: Option<Vec<f64>>,
    #[serde(flatten)]
    extra: BTreeMap<String, JsonValue>,
}

fn load_json(path: &Path) -> Result<SpectralTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let raw: JsonTable = serde_json::from_str(&text).context("parsing JSON")?;

    let (kind, values) = match (raw.flux, raw.throughput) {
        (Some(flux), None) => (TableKind::Flux, flux),
        (None, Some(throughput)) => (TableKind::Throughput, throughput),
        (Some(_), Some(_)) => bail!("JSON has both 'flux' and 'throughput'"),
        (None, None) => bail!("JSON missing 'flux' or 'throughput' array"),
    };
    if raw.wave.len() != values.len() {
        bail!(
            "'wave' has {} values but the value array has {}",
            raw.wave.len(),
            values.len()
        );
    }

    let waveunits = raw
        .waveunits
        .as_deref()
        .map(parse_wave_unit)
        .transpose()
        .context("JSON 'waveunits'")?;
    let fluxunits = match kind {
        TableKind::Flux => raw
            .fluxunits
            .as_deref()
            .map(parse_flux_unit)
            .transpose()
            .context("JSON 'fluxunits'")?,
        TableKind::Throughput => None,
    };

    Ok(SpectralTable {
        wave: raw.wave,
        values,
        kind,
        waveunits,
        fluxunits,
        name: raw.name,
        metadata: raw
            .extra
            .iter()
            .map(|(key, val)| (key.clone(), json_to_metadata(val)))
            .collect(),
    })
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

fn metadata_to_json(val: &MetadataValue) -> JsonValue {
    match val {
        MetadataValue::String(s) => JsonValue::from(s.clone()),
        MetadataValue::Integer(i) => JsonValue::from(*i),
        MetadataValue::Float(f) => JsonValue::from(*f),
        MetadataValue::Bool(b) => JsonValue::from(*b),
        MetadataValue::Null => JsonValue::Null,
    }
}

fn save_json(path: &Path, table: &SpectralTable) -> Result<()> {
    let (flux, throughput) = match table.kind {
        TableKind::Flux => (Some(table.values.clone()), None),
        TableKind::Throughput => (None, Some(table.values.clone())),
    };
    let raw = JsonTable {
        name: table.name.clone(),
        waveunits: table.waveunits.map(|u| u.to_string()),
        fluxunits: table.fluxunits.map(|u| u.to_string()),
        wave: table.wave.clone(),
        flux,
        throughput,
        extra: table
            .metadata
            .iter()
            .map(|(key, val)| (key.clone(), metadata_to_json(val)))
            .collect(),
    };
    let text = serde_json::to_string_pretty(&raw).context("serializing JSON")?;
    std::fs::write(path, text).context("writing JSON file")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Split a header such as `wave[nm]` into `("wave", Some("nm"))`.
fn split_header(header: &str) -> (&str, Option<&str>) {
    match header.split_once('[') {
        Some((name, rest)) => {
            let unit = rest.trim_end().trim_end_matches(']').trim();
            (name.trim(), (!unit.is_empty()).then_some(unit))
        }
        None => (header.trim(), None),
    }
}

/// CSV layout:  header row with column names, one row per wavelength.
/// The wavelength column is `wave` or `wavelength`, the value column `flux`
/// or `throughput`; units may follow in brackets: `wave[nm],flux[flam]`.
/// Other columns are ignored.
fn load_csv(path: &Path) -> Result<SpectralTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let wave_idx = headers
        .iter()
        .position(|h| is_wave_column(split_header(h).0))
        .context("CSV missing 'wave' column")?;
    let (value_idx, kind) = headers
        .iter()
        .enumerate()
        .find_map(|(i, h)| TableKind::from_column_name(split_header(h).0).map(|k| (i, k)))
        .context("CSV missing 'flux' or 'throughput' column")?;

    let waveunits = split_header(&headers[wave_idx])
        .1
        .map(parse_wave_unit)
        .transpose()
        .context("CSV wavelength unit")?;
    let fluxunits = match kind {
        TableKind::Flux => split_header(&headers[value_idx])
            .1
            .map(parse_flux_unit)
            .transpose()
            .context("CSV flux unit")?,
        TableKind::Throughput => None,
    };

    let mut wave = Vec::new();
    let mut values = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        wave.push(parse_cell(record.get(wave_idx), row_no, "wave")?);
        values.push(parse_cell(record.get(value_idx), row_no, kind.column_name())?);
    }

    Ok(SpectralTable {
        wave,
        values,
        kind,
        waveunits,
        fluxunits,
        name: None,
        metadata: BTreeMap::new(),
    })
}

fn parse_cell(cell: Option<&str>, row: usize, col: &str) -> Result<f64> {
    let tok = cell.unwrap_or("").trim();
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{tok}' is not a number"))
}

fn save_csv(path: &Path, table: &SpectralTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let wave_header = match table.waveunits {
        Some(unit) => format!("wave[{unit}]"),
        None => "wave".to_string(),
    };
    let value_name = table.kind.column_name().to_ascii_lowercase();
    let value_header = match table.fluxunits {
        Some(unit) => format!("{value_name}[{unit}]"),
        None => value_name,
    };
    writer
        .write_record([wave_header, value_header])
        .context("writing CSV header")?;
    for (w, v) in table.wave.iter().zip(&table.values) {
        writer
            .write_record([w.to_string(), v.to_string()])
            .context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Load a Parquet file containing one spectral table.
///
/// Expected schema:
/// - `wave`: Float64 or Float32, field metadata `unit` optional
/// - `flux` or `throughput`: Float64 or Float32, field metadata `unit` optional
/// - schema metadata `name` optional
fn load_parquet(path: &Path) -> Result<SpectralTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let wave_idx = schema
        .fields()
        .iter()
        .position(|f| is_wave_column(f.name()))
        .context("Parquet file missing 'wave' column")?;
    let (value_idx, kind) = schema
        .fields()
        .iter()
        .enumerate()
        .find_map(|(i, f)| TableKind::from_column_name(f.name()).map(|k| (i, k)))
        .context("Parquet file missing 'flux' or 'throughput' column")?;

    let field_unit = |idx: usize| schema.field(idx).metadata().get(UNIT_KEY).cloned();
    let waveunits = field_unit(wave_idx)
        .as_deref()
        .map(parse_wave_unit)
        .transpose()
        .context("Parquet wavelength unit")?;
    let fluxunits = match kind {
        TableKind::Flux => field_unit(value_idx)
            .as_deref()
            .map(parse_flux_unit)
            .transpose()
            .context("Parquet flux unit")?,
        TableKind::Throughput => None,
    };

    let mut wave = Vec::new();
    let mut values = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        wave.extend(extract_f64_column(batch.column(wave_idx)).context("reading 'wave'")?);
        values.extend(
            extract_f64_column(batch.column(value_idx))
                .with_context(|| format!("reading '{}'", schema.field(value_idx).name()))?,
        );
    }

    Ok(SpectralTable {
        wave,
        values,
        kind,
        waveunits,
        fluxunits,
        name: schema.metadata().get(NAME_KEY).cloned(),
        metadata: BTreeMap::new(),
    })
}

/// Extract a `Vec<f64>` from a Float64 or Float32 column.
fn extract_f64_column(col: &ArrayRef) -> Result<Vec<f64>> {
    if col.null_count() > 0 {
        bail!("null value in numeric column");
    }
    if let Some(f64_arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.values().to_vec())
    } else if let Some(f32_arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.values().iter().map(|&v| v as f64).collect())
    } else {
        bail!(
            "column type is {:?}, expected Float64 or Float32",
            col.data_type()
        )
    }
}

fn save_parquet(path: &Path, table: &SpectralTable) -> Result<()> {
    let unit_metadata = |unit: Option<String>| -> HashMap<String, String> {
        unit.map(|u| HashMap::from([(UNIT_KEY.to_string(), u)]))
            .unwrap_or_default()
    };
    let wave_field = Field::new("wave", DataType::Float64, false)
        .with_metadata(unit_metadata(table.waveunits.map(|u| u.to_string())));
    let value_field = Field::new(
        table.kind.column_name().to_ascii_lowercase(),
        DataType::Float64,
        false,
    )
    .with_metadata(unit_metadata(table.fluxunits.map(|u| u.to_string())));

    let mut schema_metadata = HashMap::new();
    if let Some(name) = &table.name {
        schema_metadata.insert(NAME_KEY.to_string(), name.clone());
    }
    let schema = Arc::new(Schema::new_with_metadata(
        vec![wave_field, value_field],
        schema_metadata,
    ));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(table.wave.clone())),
            Arc::new(Float64Array::from(table.values.clone())),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
