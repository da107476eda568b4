//! FITS support for spectral tables, on top of `fitsio`.
//!
//! Reads the first table extension of a file and pulls out a `WAVELENGTH`
//! column plus a `FLUX` or `THROUGHPUT` column; writes the same layout back
//! (empty primary HDU followed by one binary table named `SPECTRUM`).
//!
//! # Invariants
//! - Wavelength units come from `TUNITn`. A flux unit or an unknown string
//!   there is an error, never silently reinterpreted.
//! - Header values written by this module are ASCII and fit a single card.

use std::collections::BTreeMap;
use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::tables::{ColumnDataType, ColumnDescription};
use fitsio::FitsFile;

use super::model::{is_wave_column, MetadataValue, SpectralTable, TableKind};
use crate::error::{Result, SynphotError};
use crate::synth::units::{parse_flux_unit, parse_wave_unit};
use crate::synth::{Observation, SourceSpectrum, SpectralElement};

/// Longest string value a single header card holds, quotes doubled.
pub const MAX_STRING_VALUE: usize = 68;

/// Extension name of the written table.
const EXTNAME: &str = "SPECTRUM";

/// Keywords describing layout rather than content; not copied into metadata.
const STRUCTURAL_KEYS: &[&str] = &[
    "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "EXTEND", "XTENSION", "PCOUNT", "GCOUNT",
    "TFIELDS", "EXTNAME", "OBJECT",
];

/// cfitsio buffers hold at most one card plus the terminator.
const CARD_BUFFER: usize = 81;

// ---------------------------------------------------------------------------
// Header values
// ---------------------------------------------------------------------------

/// Parse the value field of a card as cfitsio returns it.
fn parse_value(field: &str) -> MetadataValue {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                    continue;
                }
                break;
            }
            value.push(c);
        }
        return MetadataValue::String(value.trim_end().to_string());
    }

    let token = field.split('/').next().unwrap_or("").trim();
    match token {
        "" => MetadataValue::Null,
        "T" => MetadataValue::Bool(true),
        "F" => MetadataValue::Bool(false),
        _ => {
            if let Ok(i) = token.parse::<i64>() {
                MetadataValue::Integer(i)
            } else if let Ok(f) = token.replace('D', "E").parse::<f64>() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(token.to_string())
            }
        }
    }
}

/// Make a string value fit one card.
///
/// Non-ASCII text is rejected. Long values are cut so that, with embedded
/// quotes doubled, at most [`MAX_STRING_VALUE`] characters remain.
pub fn card_string(key: &str, value: &str) -> Result<String> {
    if !value.is_ascii() {
        return Err(SynphotError::fits(format!(
            "{key} value '{value}' is not ASCII"
        )));
    }
    let mut fitted = String::with_capacity(value.len());
    let mut width = 0;
    for c in value.chars() {
        let cost = if c == '\'' { 2 } else { 1 };
        if width + cost > MAX_STRING_VALUE {
            log::warn!("{key} value truncated to {MAX_STRING_VALUE} characters");
            break;
        }
        width += cost;
        fitted.push(c);
    }
    Ok(fitted)
}

/// Keys that fit a FITS card: up to 8 of `A-Z 0-9 - _`.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 8
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn status_error(call: &str, status: c_int) -> SynphotError {
    SynphotError::fits(format!("{call} failed with cfitsio status {status}"))
}

/// Every keyword card of the current HDU, value field unparsed.
fn header_cards(fptr: &mut FitsFile) -> Result<Vec<(String, String)>> {
    let mut exists: c_int = 0;
    let mut more: c_int = 0;
    let mut status: c_int = 0;
    // SAFETY: `fptr` owns an open fitsfile and the out-pointers are live locals.
    unsafe {
        fitsio::sys::ffghsp(fptr.as_raw(), &mut exists, &mut more, &mut status);
    }
    if status != 0 {
        return Err(status_error("ffghsp", status));
    }

    let mut cards = Vec::with_capacity(usize::try_from(exists).unwrap_or(0));
    for n in 1..=exists {
        let mut key = [0 as c_char; CARD_BUFFER];
        let mut value = [0 as c_char; CARD_BUFFER];
        let mut comment = [0 as c_char; CARD_BUFFER];
        // SAFETY: each buffer is larger than cfitsio's FLEN_* limits and is
        // NUL-terminated by the call on success.
        let (key, value) = unsafe {
            fitsio::sys::ffgkyn(
                fptr.as_raw(),
                n,
                key.as_mut_ptr(),
                value.as_mut_ptr(),
                comment.as_mut_ptr(),
                &mut status,
            );
            if status != 0 {
                return Err(status_error("ffgkyn", status));
            }
            (
                CStr::from_ptr(key.as_ptr()).to_string_lossy().into_owned(),
                CStr::from_ptr(value.as_ptr()).to_string_lossy().into_owned(),
            )
        };
        cards.push((key, value));
    }
    Ok(cards)
}

/// Write a logical keyword, which `fitsio` has no safe writer for.
fn write_bool_key(fptr: &mut FitsFile, key: &str, value: bool) -> Result<()> {
    let name = CString::new(key).map_err(|_| SynphotError::fits("keyword contains NUL"))?;
    let mut status: c_int = 0;
    // SAFETY: `name` outlives the call and a null comment is accepted.
    unsafe {
        fitsio::sys::ffpkyl(
            fptr.as_raw(),
            name.as_ptr(),
            c_int::from(value),
            std::ptr::null(),
            &mut status,
        );
    }
    if status != 0 {
        return Err(status_error("ffpkyl", status));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn read_unit(fptr: &mut FitsFile, hdu: &FitsHdu, index: usize) -> Option<String> {
    hdu.read_key::<String>(fptr, &format!("TUNIT{}", index + 1))
        .ok()
        .map(|unit| unit.trim().to_string())
        .filter(|unit| !unit.is_empty())
}

fn parse_table(fptr: &mut FitsFile, hdu: &FitsHdu) -> Result<Option<SpectralTable>> {
    let HduInfo::TableInfo {
        column_descriptions,
        ..
    } = &hdu.info
    else {
        return Ok(None);
    };
    let names: Vec<&str> = column_descriptions.iter().map(|c| c.name.as_str()).collect();

    let wave_idx = names
        .iter()
        .position(|n| is_wave_column(n))
        .ok_or_else(|| SynphotError::fits("no WAVELENGTH column"))?;
    let (value_idx, kind) = names
        .iter()
        .enumerate()
        .find_map(|(i, n)| TableKind::from_column_name(n).map(|kind| (i, kind)))
        .ok_or_else(|| SynphotError::fits("no FLUX or THROUGHPUT column"))?;

    let waveunits = read_unit(fptr, hdu, wave_idx)
        .as_deref()
        .map(parse_wave_unit)
        .transpose()?;
    let fluxunits = match kind {
        TableKind::Flux => read_unit(fptr, hdu, value_idx)
            .as_deref()
            .map(parse_flux_unit)
            .transpose()?,
        TableKind::Throughput => None,
    };

    Ok(Some(SpectralTable {
        wave: hdu.read_col::<f64>(fptr, names[wave_idx])?,
        values: hdu.read_col::<f64>(fptr, names[value_idx])?,
        kind,
        waveunits,
        fluxunits,
        name: None,
        metadata: BTreeMap::new(),
    }))
}

/// Read a spectral table from a FITS file.
///
/// Primary header keywords become metadata; `OBJECT` becomes the name.
pub fn read_table(path: &Path) -> Result<SpectralTable> {
    let mut fptr = FitsFile::open(path)?;
    fptr.primary_hdu()?;
    let primary = header_cards(&mut fptr)?;

    let mut index: usize = 1;
    let mut table = loop {
        let hdu = match fptr.hdu(index) {
            Ok(hdu) => hdu,
            Err(_) => return Err(SynphotError::fits("no BINTABLE extension")),
        };
        if let Some(table) = parse_table(&mut fptr, &hdu)? {
            break table;
        }
        log::debug!("skipping non-table HDU {index}");
        index += 1;
    };

    for (key, value) in primary {
        let value = parse_value(&value);
        if key == "OBJECT" {
            table.name = value
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        } else if value != MetadataValue::Null
            && !STRUCTURAL_KEYS.contains(&key.as_str())
            && is_valid_key(&key)
        {
            table.metadata.insert(key, value);
        }
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Header values checked and fitted before the file is touched.
enum Card {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

fn prepare_cards(table: &SpectralTable) -> Result<Vec<(String, Card)>> {
    let mut cards = Vec::new();
    if let Some(name) = &table.name {
        cards.push(("OBJECT".to_string(), Card::Text(card_string("OBJECT", name)?)));
    }
    for (key, value) in &table.metadata {
        if !is_valid_key(key) || STRUCTURAL_KEYS.contains(&key.as_str()) {
            log::debug!("metadata key {key} does not fit a FITS card; skipped");
            continue;
        }
        let card = match value {
            MetadataValue::String(s) => Card::Text(card_string(key, s)?),
            MetadataValue::Integer(i) => Card::Integer(*i),
            MetadataValue::Float(f) => Card::Float(*f),
            MetadataValue::Bool(b) => Card::Bool(*b),
            MetadataValue::Null => continue,
        };
        cards.push((key.clone(), card));
    }
    Ok(cards)
}

fn unit_name(unit: impl ToString) -> String {
    unit.to_string().to_uppercase()
}

fn write_fits(path: &Path, table: &SpectralTable, overwrite: bool) -> Result<()> {
    let cards = prepare_cards(table)?;
    if !overwrite && path.exists() {
        return Err(SynphotError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }

    let mut fptr = if overwrite {
        FitsFile::create(path).overwrite().open()?
    } else {
        FitsFile::create(path).open()?
    };

    let primary = fptr.primary_hdu()?;
    for (key, card) in &cards {
        match card {
            Card::Text(s) => primary.write_key(&mut fptr, key, s.as_str())?,
            Card::Integer(i) => primary.write_key(&mut fptr, key, *i)?,
            Card::Float(f) => primary.write_key(&mut fptr, key, *f)?,
            Card::Bool(b) => write_bool_key(&mut fptr, key, *b)?,
        }
    }

    let value_column = table.kind.column_name();
    let columns = [
        ColumnDescription::new("WAVELENGTH")
            .with_type(ColumnDataType::Double)
            .create()?,
        ColumnDescription::new(value_column)
            .with_type(ColumnDataType::Double)
            .create()?,
    ];
    let hdu = fptr.create_table(EXTNAME.to_string(), &columns)?;
    hdu.write_col(&mut fptr, "WAVELENGTH", &table.wave)?;
    hdu.write_col(&mut fptr, value_column, &table.values)?;
    if let Some(unit) = table.waveunits {
        hdu.write_key(&mut fptr, "TUNIT1", unit_name(unit))?;
    }
    if let (TableKind::Flux, Some(unit)) = (table.kind, table.fluxunits) {
        hdu.write_key(&mut fptr, "TUNIT2", unit_name(unit))?;
    }
    Ok(())
}

/// Write a spectral table to a FITS file, replacing any existing file.
pub fn write_table(path: &Path, table: &SpectralTable) -> Result<()> {
    write_fits(path, table, true)
}

/// How models are written to FITS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Replace an existing file.
    pub overwrite: bool,
    /// Drop leading and trailing zero-valued rows.
    pub trimzero: bool,
    /// Write an observation's binned flux instead of its native flux.
    pub binned: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            overwrite: true,
            trimzero: true,
            binned: false,
        }
    }
}

impl WriteOptions {
    /// Defaults for observations: binned flux.
    pub fn observation() -> Self {
        WriteOptions {
            binned: true,
            ..Self::default()
        }
    }
}

fn write_with_options(path: &Path, mut table: SpectralTable, options: WriteOptions) -> Result<()> {
    if options.trimzero {
        table.trim_zeros();
    }
    write_fits(path, &table, options.overwrite)
}

/// Write a source spectrum on its own grid, in its display units.
pub fn write_spectrum(path: &Path, spectrum: &SourceSpectrum, options: WriteOptions) -> Result<()> {
    write_with_options(path, SpectralTable::from_spectrum(spectrum), options)
}

/// Write a bandpass throughput table.
pub fn write_bandpass(path: &Path, band: &SpectralElement, options: WriteOptions) -> Result<()> {
    write_with_options(path, SpectralTable::from_bandpass(band), options)
}

/// Write an observation; `options.binned` selects binned or native flux.
pub fn write_observation(path: &Path, obs: &Observation, options: WriteOptions) -> Result<()> {
    write_with_options(path, SpectralTable::from_observation(obs, options.binned), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{FluxUnit, WaveUnit};

    fn sample_table() -> SpectralTable {
        let mut metadata = BTreeMap::new();
        metadata.insert("TELESCOP".to_string(), MetadataValue::String("HST".into()));
        metadata.insert("EXPTIME".to_string(), MetadataValue::Float(1.5e3));
        metadata.insert("NCOMBINE".to_string(), MetadataValue::Integer(3));
        metadata.insert("CALIBRAT".to_string(), MetadataValue::Bool(true));
        SpectralTable {
            wave: vec![4000.0, 5000.0, 6000.0],
            values: vec![1e-15, 2e-15, 3e-15],
            kind: TableKind::Flux,
            waveunits: Some(WaveUnit::Angstrom),
            fluxunits: Some(FluxUnit::Flam),
            name: Some("vega's twin".to_string()),
            metadata,
        }
    }

    /// Write a table whose wavelength column carries an arbitrary `TUNIT1`.
    fn file_with_wave_unit(dir: &Path, unit: &str) -> std::path::PathBuf {
        let path = dir.join("unit.fits");
        let mut table = sample_table();
        table.waveunits = None;
        write_table(&path, &table).unwrap();
        let mut fptr = FitsFile::edit(&path).unwrap();
        let hdu = fptr.hdu(EXTNAME).unwrap();
        hdu.write_key(&mut fptr, "TUNIT1", unit).unwrap();
        path
    }

    #[test]
    fn test_write_read_preserves_columns_units_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.fits");
        let table = sample_table();
        write_table(&path, &table).unwrap();
        let decoded = read_table(&path).unwrap();
        assert_eq!(decoded.wave, table.wave);
        assert_eq!(decoded.values, table.values);
        assert_eq!(decoded.kind, TableKind::Flux);
        assert_eq!(decoded.waveunits, Some(WaveUnit::Angstrom));
        assert_eq!(decoded.fluxunits, Some(FluxUnit::Flam));
        assert_eq!(decoded.name.as_deref(), Some("vega's twin"));
        assert_eq!(
            decoded.metadata.get("TELESCOP"),
            Some(&MetadataValue::String("HST".into()))
        );
        assert_eq!(decoded.metadata.get("EXPTIME").and_then(MetadataValue::as_f64), Some(1500.0));
        assert_eq!(decoded.metadata.get("NCOMBINE"), Some(&MetadataValue::Integer(3)));
        assert_eq!(decoded.metadata.get("CALIBRAT"), Some(&MetadataValue::Bool(true)));
    }

    #[test]
    fn test_float32_columns_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.fits");
        let mut fptr = FitsFile::create(&path).open().unwrap();
        let columns = [
            ColumnDescription::new("WAVELENGTH")
                .with_type(ColumnDataType::Float)
                .create()
                .unwrap(),
            ColumnDescription::new("THROUGHPUT")
                .with_type(ColumnDataType::Float)
                .create()
                .unwrap(),
        ];
        let hdu = fptr.create_table("BAND".to_string(), &columns).unwrap();
        hdu.write_col(&mut fptr, "WAVELENGTH", &[400.0f32, 500.0, 600.0])
            .unwrap();
        hdu.write_col(&mut fptr, "THROUGHPUT", &[0.25f32, 0.5, 0.75])
            .unwrap();
        hdu.write_key(&mut fptr, "TUNIT1", "nm").unwrap();
        drop(fptr);

        let table = read_table(&path).unwrap();
        assert_eq!(table.kind, TableKind::Throughput);
        assert_eq!(table.wave, vec![400.0, 500.0, 600.0]);
        assert_eq!(table.values, vec![0.25, 0.5, 0.75]);
        assert_eq!(table.waveunits, Some(WaveUnit::Nanometer));
    }

    #[test]
    fn test_wave_unit_in_nanometers_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let decoded = read_table(&file_with_wave_unit(dir.path(), "nm")).unwrap();
        assert_eq!(decoded.waveunits, Some(WaveUnit::Nanometer));
    }

    #[test]
    fn test_flux_unit_in_wave_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&file_with_wave_unit(dir.path(), "FLAM")).unwrap_err();
        assert!(matches!(err, SynphotError::NotAWaveUnit { .. }));
    }

    #[test]
    fn test_unknown_wave_unit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&file_with_wave_unit(dir.path(), "parsecs")).unwrap_err();
        assert!(matches!(err, SynphotError::UnknownUnit(_)));
    }

    #[test]
    fn test_missing_wave_unit_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.fits");
        let mut table = sample_table();
        table.waveunits = None;
        write_table(&path, &table).unwrap();
        assert_eq!(read_table(&path).unwrap().waveunits, None);
    }

    #[test]
    fn test_parse_value_variants() {
        assert_eq!(parse_value("                   T"), MetadataValue::Bool(true));
        assert_eq!(parse_value("  42 / answer"), MetadataValue::Integer(42));
        assert_eq!(parse_value(" 1.5D2"), MetadataValue::Float(150.0));
        assert_eq!(
            parse_value("'O''Brien '           / name"),
            MetadataValue::String("O'Brien".into())
        );
        assert_eq!(parse_value("   "), MetadataValue::Null);
    }

    #[test]
    fn test_non_ascii_name_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vega.fits");
        let mut table = sample_table();
        table.name = Some("Vega \u{3b1} Lyr".to_string());
        let err = write_table(&path, &table).unwrap_err();
        assert!(matches!(err, SynphotError::Fits(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_long_strings_are_cut_to_one_card() {
        let long = "x".repeat(100);
        assert_eq!(card_string("OBJECT", &long).unwrap().len(), MAX_STRING_VALUE);
        let quoted = "'".repeat(40);
        assert_eq!(card_string("OBJECT", &quoted).unwrap().len(), MAX_STRING_VALUE / 2);
        assert_eq!(card_string("OBJECT", "vega").unwrap(), "vega");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.fits");
        let mut table = sample_table();
        table
            .metadata
            .insert("REMARKS".to_string(), MetadataValue::String("ab'c".repeat(30)));
        write_table(&path, &table).unwrap();
        let value = read_table(&path).unwrap().metadata["REMARKS"].clone();
        let text = value.as_str().unwrap();
        assert!(text.starts_with("ab'cab'c"));
        assert!(text.len() + text.matches('\'').count() <= MAX_STRING_VALUE);
    }

    #[test]
    fn test_write_spectrum_trims_zero_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trim.fits");
        let sp = SourceSpectrum::tabular(
            vec![1000.0, 2000.0, 3000.0, 4000.0],
            vec![0.0, 1.0, 2.0, 0.0],
            WaveUnit::Angstrom,
            FluxUnit::Photlam,
        )
        .unwrap();
        write_spectrum(&path, &sp, WriteOptions::default()).unwrap();
        let table = read_table(&path).unwrap();
        assert_eq!(table.wave, vec![2000.0, 3000.0]);
        assert_eq!(table.fluxunits, Some(FluxUnit::Photlam));

        let keep = WriteOptions {
            trimzero: false,
            ..WriteOptions::default()
        };
        write_spectrum(&path, &sp, keep).unwrap();
        assert_eq!(read_table(&path).unwrap().len(), 4);
    }

    #[test]
    fn test_write_without_overwrite_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.fits");
        let band = SpectralElement::box_filter(5000.0, 100.0, WaveUnit::Angstrom).unwrap();
        let options = WriteOptions {
            overwrite: false,
            ..WriteOptions::default()
        };
        write_bandpass(&path, &band, options).unwrap();
        assert!(matches!(
            write_bandpass(&path, &band, options),
            Err(SynphotError::Io(_))
        ));
    }

    #[test]
    fn test_write_observation_defaults_to_binned_flux() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.fits");
        let sp = SourceSpectrum::flat(1.0, FluxUnit::Photlam).unwrap();
        let band = SpectralElement::box_filter(5000.0, 100.0, WaveUnit::Angstrom)
            .unwrap()
            .with_binset(vec![4950.0, 5000.0, 5050.0])
            .unwrap();
        let obs = band.observe(&sp, None, None).unwrap();
        write_observation(&path, &obs, WriteOptions::observation()).unwrap();
        let table = read_table(&path).unwrap();
        assert_eq!(table.wave, vec![4950.0, 5000.0, 5050.0]);
    }

    /// Lay out header cards in 2880-byte blocks.
    fn raw_header(cards: &[&str]) -> Vec<u8> {
        let mut text = String::new();
        for card in cards.iter().chain(std::iter::once(&"END")) {
            text.push_str(&format!("{card:<80}"));
        }
        let mut bytes = text.into_bytes();
        bytes.resize(bytes.len().div_ceil(2880) * 2880, b' ');
        bytes
    }

    #[test]
    fn test_garbage_and_oversized_headers_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.fits");
        std::fs::write(&path, b"not a fits file").unwrap();
        assert!(read_table(&path).is_err());

        let huge = raw_header(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =           4294967296",
            "NAXIS2  =           4294967296",
        ]);
        std::fs::write(&path, huge).unwrap();
        assert!(read_table(&path).is_err());
    }
}
