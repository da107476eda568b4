use std::path::Path;

use rusty_synphot::data::fits::{self, WriteOptions};
use rusty_synphot::data::model::{SpectralTable, TableKind};
use rusty_synphot::{
    load_bandpass, load_spectrum, load_table, save_table, FluxUnit, SourceSpectrum,
    SpectralElement, SynphotError, WaveUnit,
};

fn spectrum() -> SourceSpectrum {
    SourceSpectrum::tabular(
        vec![400.0, 450.0, 500.0, 550.0],
        vec![1e-15, 2e-15, 1.5e-15, 1.2e-15],
        WaveUnit::Nanometer,
        FluxUnit::Flam,
    )
    .unwrap()
    .with_name("sample")
}

#[test]
fn spectrum_survives_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let original = spectrum();
    for ext in ["fits", "fit", "json", "csv", "parquet"] {
        let path = dir.path().join(format!("sample.{ext}"));
        save_table(&path, &SpectralTable::from_spectrum(&original)).unwrap();
        let loaded = load_spectrum(&path).unwrap();
        assert_eq!(loaded.waveunits(), WaveUnit::Nanometer, "{ext}");
        assert_eq!(loaded.fluxunits(), FluxUnit::Flam, "{ext}");
        assert_eq!(loaded.wave_angstrom(), original.wave_angstrom(), "{ext}");
        for (a, b) in loaded.flux().iter().zip(original.flux()) {
            assert!((a - b).abs() <= 1e-12 * b.abs(), "{ext}: {a} vs {b}");
        }
    }
}

#[test]
fn bandpass_survives_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let band = SpectralElement::box_filter(5500.0, 880.0, WaveUnit::Angstrom).unwrap();
    for ext in ["fits", "fit", "json", "csv", "parquet"] {
        let path = dir.path().join(format!("band.{ext}"));
        save_table(&path, &SpectralTable::from_bandpass(&band)).unwrap();
        let loaded = load_bandpass(&path).unwrap();
        assert!((loaded.equivwidth() - band.equivwidth()).abs() < 1e-9, "{ext}");
        assert_eq!(loaded.name(), Some("band"), "{ext}");
    }
}

fn fits_with_wave_unit(dir: &Path, unit: Option<WaveUnit>, flux: Option<FluxUnit>) -> std::path::PathBuf {
    let mut table = SpectralTable::from_spectrum(&spectrum());
    table.waveunits = unit;
    table.fluxunits = flux;
    let path = dir.join("policy.fits");
    fits::write_table(&path, &table).unwrap();
    path
}

#[test]
fn fits_wave_units_are_converted() {
    let dir = tempfile::tempdir().unwrap();
    let path = fits_with_wave_unit(dir.path(), Some(WaveUnit::Micron), Some(FluxUnit::Flam));
    let loaded = load_spectrum(&path).unwrap();
    assert_eq!(loaded.waveunits(), WaveUnit::Micron);
    assert_eq!(loaded.wave_angstrom()[0], 400.0 * 1e4);
}

#[test]
fn fits_without_units_defaults_to_angstrom_and_flam() {
    let dir = tempfile::tempdir().unwrap();
    let path = fits_with_wave_unit(dir.path(), None, None);
    let table = load_table(&path).unwrap();
    assert_eq!(table.waveunits, None);
    let loaded = table.into_spectrum().unwrap();
    assert_eq!(loaded.waveunits(), WaveUnit::Angstrom);
    assert_eq!(loaded.fluxunits(), FluxUnit::Flam);
    assert_eq!(loaded.wave_angstrom()[0], 400.0);
}

#[test]
fn unit_errors_surface_through_anyhow_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "wave[abmag],flux\n1,2\n3,4\n").unwrap();
    let err = load_table(&path).unwrap_err();
    let cause = err.downcast_ref::<SynphotError>().unwrap();
    assert!(cause.is_unit_error());

    std::fs::write(&path, "wave[nm],flux[nm]\n1,2\n3,4\n").unwrap();
    let err = load_table(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SynphotError>(),
        Some(SynphotError::NotAFluxUnit { .. })
    ));
}

#[test]
fn observation_export_writes_binned_flux() {
    let dir = tempfile::tempdir().unwrap();
    let band = SpectralElement::box_filter(4750.0, 100.0, WaveUnit::Angstrom)
        .unwrap()
        .with_binset(vec![4700.0, 4725.0, 4750.0, 4775.0, 4800.0])
        .unwrap();
    let obs = band.observe(&spectrum(), None, None).unwrap();
    let path = dir.path().join("obs.fits");
    fits::write_observation(&path, &obs, WriteOptions::observation()).unwrap();
    let table = load_table(&path).unwrap();
    assert_eq!(table.kind, TableKind::Flux);
    assert_eq!(table.waveunits, Some(WaveUnit::Nanometer));
    assert_eq!(table.wave.len(), 5);
}
